//! Results the debugger hands back to the UI after a command.

use std::fmt::Display;

use crate::dbginfo::Variable;
use crate::errors::DebuggerError;

#[derive(Debug)]
pub enum Feedback {
    Ok,
    Error(DebuggerError),
    /// The inferior is gone; its exit code, or -1 when a signal killed it.
    Exit(i32),
    Registers(Vec<(&'static str, u64)>),
    Variables(Vec<Variable>),
    Text(String),
}

impl Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feedback::Ok => write!(f, "Ok")?,
            Feedback::Error(e) => write!(f, "Error: {e}")?,
            Feedback::Exit(code) => write!(f, "process exited with code {code}")?,
            Feedback::Registers(regs) => {
                for (name, value) in regs {
                    writeln!(f, "{name}: {value:#x}")?;
                }
            }
            Feedback::Variables(vars) => {
                if vars.is_empty() {
                    write!(f, "no variables in scope")?;
                }
                for var in vars {
                    writeln!(f, "{}: {} at {}", var.name, var.type_name, var.address)?;
                }
            }
            Feedback::Text(t) => write!(f, "{t}")?,
        }

        Ok(())
    }
}

impl From<Result<Feedback, DebuggerError>> for Feedback {
    fn from(value: Result<Feedback, DebuggerError>) -> Self {
        match value {
            Ok(feedback) => feedback,
            Err(e) => Feedback::Error(e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_register_dump_format() {
        let feedback = Feedback::Registers(vec![("rip", 0x401008), ("rsp", 0x7fffffffe000)]);
        let rendered = feedback.to_string();
        assert!(rendered.contains("rip: 0x401008\n"));
        assert!(rendered.contains("rsp: 0x7fffffffe000\n"));
    }

    #[test]
    fn test_error_result_becomes_error_feedback() {
        let result: Result<Feedback, DebuggerError> = Err(DebuggerError::NoDebuggee);
        assert!(matches!(Feedback::from(result), Feedback::Error(_)));
    }
}
