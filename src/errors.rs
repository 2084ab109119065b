//! # Error Types
//!
//! Defines the error type and a result alias used throughout the [crate].
//!
//! Everything that can go wrong while debugging is a [`DebuggerError`],
//! defined with the [thiserror] crate. The command handler decides which of
//! these are fatal: parse errors in the debug information at startup abort the
//! debugger, everything after that is reported and the session stays live
//! unless the inferior itself is gone.

use thiserror::Error;

use crate::Addr;

/// Type alias for Results returned by godbg functions
pub type Result<T> = std::result::Result<T, DebuggerError>;

#[derive(Error, Debug)]
pub enum DebuggerError {
    #[error("Os error: {0}")]
    Os(#[from] nix::Error),
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Executable does not exist: {0}")]
    ExecutableDoesNotExist(String),
    #[error("Executable is not a file: {0}")]
    ExecutableIsNotAFile(String),
    #[error("Could not convert to CString: {0}")]
    CStringConv(#[from] std::ffi::NulError),
    #[error("No debuggee configured")]
    NoDebuggee,
    #[error("Tried to enable breakpoint again")]
    BreakpointIsAlreadyEnabled,
    #[error("Tried to disable breakpoint again")]
    BreakpointIsAlreadyDisabled,
    #[error("Could not parse integer: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
    #[error("Could not parse command: {0}")]
    ParseStr(String),
    #[error("Error while reading information from the executable file: {0}")]
    Object(#[from] object::Error),
    #[error("Error while working with the DWARF debug information: {0}")]
    Dwarf(#[from] gimli::Error),
    #[error("Required section is missing from the executable: {0}")]
    MissingSection(&'static str),
    #[error("Error while reading user input: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
    #[error("No register is named {0:?}")]
    InvalidRegister(String),
    #[error("DWARF register number {0} is not supported by this debugger")]
    UnimplementedRegister(u16),
    #[error("No function is named {0}")]
    FunctionNotFound(String),
    #[error("No statement is at {file}:{line}")]
    LineNotFound { file: String, line: u64 },
    #[error("No prologue end found for function {0}")]
    NoPrologueEnd(String),
    #[error("No line information for address {0}")]
    NoLineInfo(Addr),
    #[error("The debuggee is currently not in a known function")]
    NotInFunction,
    #[error("A subprogram has a high PC but no low PC")]
    HighPcWithoutLowPc,
    #[error("No call frame information covers address {0}")]
    NoFrameInfo(Addr),
    #[error("CFA rules encoded as DWARF expressions are not supported")]
    UnsupportedCfaRule,
    #[error("Location expression uses unsupported opcode {0:#04x}")]
    UnsupportedOpcode(u8),
    #[error("Location expression ended unexpectedly")]
    TruncatedExpression,
    #[error("Location expression left an empty stack")]
    EmptyStack,
    #[error("Location expression needs a CFA but none was established")]
    NoCfa,
    #[error("Compiling the debuggee failed with {0}")]
    CompileFailed(std::process::ExitStatus),
}
