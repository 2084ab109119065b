//! # godbg
//!
//! An interactive source-level debugger for compiled native executables on
//! Linux/x86-64. The inferior is controlled with ptrace; its debug information
//! (symbol table, DWARF line-number program, call-frame information, location
//! expressions) is decoded from the ELF file it was loaded from.

use nix::sys::ptrace;
use nix::unistd::Pid;

use crate::errors::Result;

pub mod addr;
pub mod breakpoint;
pub mod compile;
pub mod consts;
pub mod dbginfo;
pub mod debuggee;
pub mod debugger;
pub mod errors;
pub mod feedback;
pub mod locexpr;
pub mod regs;
pub mod source;
pub mod ui;

pub use addr::Addr;

/// A machine word of the inferior, as ptrace hands it out.
pub type Word = i64;

/// Reads one word from the inferior's memory.
///
/// # Errors
///
/// Fails with the underlying OS error if the ptrace request fails.
pub fn mem_read_word(pid: Pid, addr: Addr) -> Result<Word> {
    Ok(ptrace::read(pid, addr.raw_pointer())?)
}

/// Writes one word into the inferior's memory.
///
/// # Errors
///
/// Fails with the underlying OS error if the ptrace request fails.
pub fn mem_write_word(pid: Pid, addr: Addr, value: Word) -> Result<()> {
    Ok(ptrace::write(pid, addr.raw_pointer(), value)?)
}
