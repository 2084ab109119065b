//! The seam between the debugger core and whatever drives it.

use crate::errors::Result;
use crate::feedback::Feedback;
use crate::Addr;

pub mod cli;

/// Where a breakpoint should go, as the user expressed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakLocation {
    /// an absolute address, given in hex
    Address(Addr),
    /// the prologue end of a named function
    Function(String),
    /// the first statement at FILE:LINE
    Line(String, u64),
}

/// A parsed user command for the debugger core.
#[derive(Debug, PartialEq, Eq)]
pub enum Status {
    DebuggerQuit,
    Continue,
    SetBreakpoint(BreakLocation),
    DumpRegisters,
    StepSingle,
    StepIn,
    StepOver,
    StepOut,
    Backtrace,
    Variables,
}

/// A source of commands for the debugger.
///
/// [`process`](DebuggerUI::process) receives the feedback of the previous
/// command and blocks until the user has decided on the next one.
pub trait DebuggerUI {
    /// # Errors
    ///
    /// Fails when the input channel breaks down; the debugger gives up then.
    fn process(&mut self, feedback: Feedback) -> Result<Status>;
}
