use std::ffi::CString;
use std::path::PathBuf;

use godbg::compile::prepare_debuggee;
use godbg::dbginfo::DebugInfo;
use godbg::debugger::Debugger;
use godbg::errors::DebuggerError;
use godbg::ui::cli::CliUi;

use clap::Parser;
use tracing::debug;

/// Launch the source-level debugger
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Debuggee source file (compiled on the fly) or prebuilt binary
    target: PathBuf,
}

fn main() -> Result<(), DebuggerError> {
    setup_logger();
    debug!("set up the logger");

    let args = Args::parse();

    let binary = prepare_debuggee(&args.target)?;
    let dbginfo = DebugInfo::build(&binary)?;

    let ui = CliUi::build()?;
    let mut debugger = Debugger::build(ui, dbginfo);

    let debuggee_args = vec![CString::new(binary.to_string_lossy().as_ref())?];
    debugger.launch(&binary, &debuggee_args)?;
    debugger.run()?;

    Ok(())
}

fn setup_logger() {
    // LOG_LEVEL=DEBUG raises the verbosity from the default INFO
    let level = if std::env::var("LOG_LEVEL").is_ok_and(|v| v == "DEBUG") {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("could not setup logger");
}
