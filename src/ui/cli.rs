//! The interactive command line: a rustyline editor with history and a
//! prefix-matched command language.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{error, warn};

use super::{BreakLocation, DebuggerUI, Status};
use crate::errors::{DebuggerError, Result};
use crate::feedback::Feedback;
use crate::Addr;

pub const PROMPT: &str = "godbg> ";

pub struct CliUi {
    editor: DefaultEditor,
}

impl CliUi {
    /// # Errors
    ///
    /// Fails when the terminal cannot be set up for line editing.
    pub fn build() -> Result<Self> {
        Ok(CliUi {
            editor: DefaultEditor::new()?,
        })
    }
}

impl DebuggerUI for CliUi {
    fn process(&mut self, feedback: Feedback) -> Result<Status> {
        match &feedback {
            Feedback::Error(e) => warn!("{e}"),
            Feedback::Ok => (),
            other => println!("{other}"),
        }

        loop {
            let line = match self.editor.readline(PROMPT) {
                Ok(line) => line,
                Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                    return Ok(Status::DebuggerQuit)
                }
                Err(e) => return Err(e.into()),
            };

            match parse_command(&line) {
                Ok(Some(status)) => {
                    self.editor.add_history_entry(&line)?;
                    return Ok(status);
                }
                Ok(None) => continue,
                Err(e) => {
                    error!("{e}");
                    continue;
                }
            }
        }
    }
}

/// Parses one input line. The first token is prefix-matched against the
/// command names; `Ok(None)` means the line was empty.
pub(crate) fn parse_command(line: &str) -> Result<Option<Status>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(&cmd) = tokens.first() else {
        return Ok(None);
    };

    if "continue".starts_with(cmd) {
        return Ok(Some(Status::Continue));
    }
    if "quit".starts_with(cmd) {
        return Ok(Some(Status::DebuggerQuit));
    }
    if "break".starts_with(cmd) {
        return parse_break(&tokens[1..]).map(Some);
    }
    if "register".starts_with(cmd) {
        if tokens.get(1).copied() == Some("dump") {
            return Ok(Some(Status::DumpRegisters));
        }
        return Err(DebuggerError::ParseStr(
            "register takes the subcommand 'dump'".to_string(),
        ));
    }
    if "si".starts_with(cmd) {
        return Ok(Some(Status::StepSingle));
    }
    if "stepin".starts_with(cmd) {
        return Ok(Some(Status::StepIn));
    }
    if "next".starts_with(cmd) {
        return Ok(Some(Status::StepOver));
    }
    if "stepout".starts_with(cmd) {
        return Ok(Some(Status::StepOut));
    }
    if "backtrace".starts_with(cmd) {
        return Ok(Some(Status::Backtrace));
    }
    if "variables".starts_with(cmd) {
        return Ok(Some(Status::Variables));
    }

    Err(DebuggerError::ParseStr(format!("unknown command: {cmd}")))
}

fn parse_break(args: &[&str]) -> Result<Status> {
    match args {
        [location] => {
            if let Ok(addr) = parse_hex(location) {
                Ok(Status::SetBreakpoint(BreakLocation::Address(Addr::from(
                    addr,
                ))))
            } else {
                Ok(Status::SetBreakpoint(BreakLocation::Function(
                    (*location).to_string(),
                )))
            }
        }
        [file, line] => {
            let line: u64 = line.parse()?;
            Ok(Status::SetBreakpoint(BreakLocation::Line(
                (*file).to_string(),
                line,
            )))
        }
        _ => Err(DebuggerError::ParseStr(
            "break takes an address, a function name, or FILE LINE".to_string(),
        )),
    }
}

fn parse_hex(mut raw: &str) -> Result<u64> {
    if let Some(stripped) = raw.strip_prefix("0x") {
        raw = stripped;
    }
    Ok(u64::from_str_radix(raw, 16)?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("19").unwrap(), 0x19);
        assert_eq!(parse_hex("0x19").unwrap(), 0x19);
        assert_eq!(parse_hex("0x00401136").unwrap(), 0x401136);
        assert!(parse_hex("main").is_err());
    }

    #[test]
    fn test_prefix_matching() {
        assert_eq!(parse_command("c").unwrap(), Some(Status::Continue));
        assert_eq!(parse_command("cont").unwrap(), Some(Status::Continue));
        assert_eq!(parse_command("q").unwrap(), Some(Status::DebuggerQuit));
        // "s" resolves to si, the first command it prefixes
        assert_eq!(parse_command("s").unwrap(), Some(Status::StepSingle));
        assert_eq!(parse_command("stepi").unwrap(), Some(Status::StepIn));
        assert_eq!(parse_command("stepo").unwrap(), Some(Status::StepOut));
        assert_eq!(parse_command("n").unwrap(), Some(Status::StepOver));
        assert_eq!(parse_command("back").unwrap(), Some(Status::Backtrace));
        assert_eq!(parse_command("var").unwrap(), Some(Status::Variables));
    }

    #[test]
    fn test_break_by_address() {
        assert_eq!(
            parse_command("break 0x401136").unwrap(),
            Some(Status::SetBreakpoint(BreakLocation::Address(Addr::from(
                0x401136usize
            ))))
        );
    }

    #[test]
    fn test_break_by_function_name() {
        assert_eq!(
            parse_command("b main").unwrap(),
            Some(Status::SetBreakpoint(BreakLocation::Function(
                "main".to_string()
            )))
        );
        assert_eq!(
            parse_command("break main.main").unwrap(),
            Some(Status::SetBreakpoint(BreakLocation::Function(
                "main.main".to_string()
            )))
        );
    }

    #[test]
    fn test_break_by_file_and_line() {
        assert_eq!(
            parse_command("break hello.c 7").unwrap(),
            Some(Status::SetBreakpoint(BreakLocation::Line(
                "hello.c".to_string(),
                7
            )))
        );
    }

    #[test]
    fn test_break_arity_errors() {
        assert!(parse_command("break").is_err());
        assert!(parse_command("break hello.c 7 extra").is_err());
        assert!(parse_command("break hello.c seven").is_err());
    }

    #[test]
    fn test_register_needs_dump() {
        assert_eq!(
            parse_command("register dump").unwrap(),
            Some(Status::DumpRegisters)
        );
        assert_eq!(parse_command("reg dump").unwrap(), Some(Status::DumpRegisters));
        assert!(parse_command("register").is_err());
        assert!(parse_command("register write").is_err());
    }

    #[test]
    fn test_empty_and_unknown_input() {
        assert_eq!(parse_command("").unwrap(), None);
        assert_eq!(parse_command("   ").unwrap(), None);
        assert!(parse_command("frobnicate").is_err());
    }
}
