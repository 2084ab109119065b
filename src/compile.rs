//! Building the debuggee from source.
//!
//! When the user points the debugger at a C source file it is compiled with
//! the host compiler, optimizations off and frame pointers kept, so the
//! debug information matches the source line by line. `-no-pie` keeps the
//! link addresses equal to the runtime addresses (ASLR is disabled for the
//! child separately).

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::errors::{DebuggerError, Result};

const SOURCE_EXTENSIONS: [&str; 3] = ["c", "cc", "cpp"];

/// Returns the binary to debug for the given CLI argument: source files are
/// compiled first, anything else is used as a prebuilt binary.
///
/// # Errors
///
/// Fails if the compiler cannot be spawned or exits unsuccessfully.
pub fn prepare_debuggee(path: &Path) -> Result<PathBuf> {
    let is_source = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e));

    if is_source {
        build_with_debug_info(path)
    } else {
        debug!("{} is treated as a prebuilt binary", path.display());
        Ok(path.to_path_buf())
    }
}

fn build_with_debug_info(source: &Path) -> Result<PathBuf> {
    let output = format!("__debug_{}", std::process::id());
    info!("compiling {} to {output}", source.display());

    let status = Command::new("cc")
        .args([
            "-g",
            "-O0",
            "-fno-omit-frame-pointer",
            // keep the call-frame information in .debug_frame instead of
            // .eh_frame
            "-fno-asynchronous-unwind-tables",
            "-no-pie",
            "-o",
        ])
        .arg(&output)
        .arg(source)
        .status()?;

    if !status.success() {
        return Err(DebuggerError::CompileFailed(status));
    }

    Ok(std::fs::canonicalize(output)?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_prebuilt_binary_is_passed_through() {
        let path = Path::new("/bin/true");
        assert_eq!(prepare_debuggee(path).unwrap(), PathBuf::from("/bin/true"));
    }

    #[test]
    fn test_extension_detection() {
        for name in ["a.c", "dir/b.cc", "x.cpp"] {
            let path = Path::new(name);
            let is_source = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e));
            assert!(is_source, "{name}");
        }
        assert!(Path::new("a.out").extension().is_some_and(|e| e == "out"));
    }
}
