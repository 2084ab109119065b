//! Named access to the inferior's general purpose and segment registers.
//!
//! The register file is exposed as a fixed enum backed by a hand written
//! match over the fields of [`user_regs_struct`]. Reads fetch the whole
//! snapshot with one ptrace request; writes fetch, mutate one field and store
//! the snapshot back, so unchanged registers are preserved.

use std::fmt::Display;
use std::str::FromStr;

use nix::libc::user_regs_struct;
use nix::sys::ptrace;
use nix::unistd::Pid;

use crate::errors::{DebuggerError, Result};

/// The 27 registers ptrace exposes for x86-64, in [`user_regs_struct`] field
/// order.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    r15,
    r14,
    r13,
    r12,
    rbp,
    rbx,
    r11,
    r10,
    r9,
    r8,
    rax,
    rcx,
    rdx,
    rsi,
    rdi,
    orig_rax,
    rip,
    cs,
    eflags,
    rsp,
    ss,
    fs_base,
    gs_base,
    ds,
    es,
    fs,
    gs,
}

/// All registers, in dump order.
pub const REGISTERS: [Register; 27] = [
    Register::r15,
    Register::r14,
    Register::r13,
    Register::r12,
    Register::rbp,
    Register::rbx,
    Register::r11,
    Register::r10,
    Register::r9,
    Register::r8,
    Register::rax,
    Register::rcx,
    Register::rdx,
    Register::rsi,
    Register::rdi,
    Register::orig_rax,
    Register::rip,
    Register::cs,
    Register::eflags,
    Register::rsp,
    Register::ss,
    Register::fs_base,
    Register::gs_base,
    Register::ds,
    Register::es,
    Register::fs,
    Register::gs,
];

impl Register {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Register::r15 => "r15",
            Register::r14 => "r14",
            Register::r13 => "r13",
            Register::r12 => "r12",
            Register::rbp => "rbp",
            Register::rbx => "rbx",
            Register::r11 => "r11",
            Register::r10 => "r10",
            Register::r9 => "r9",
            Register::r8 => "r8",
            Register::rax => "rax",
            Register::rcx => "rcx",
            Register::rdx => "rdx",
            Register::rsi => "rsi",
            Register::rdi => "rdi",
            Register::orig_rax => "orig_rax",
            Register::rip => "rip",
            Register::cs => "cs",
            Register::eflags => "eflags",
            Register::rsp => "rsp",
            Register::ss => "ss",
            Register::fs_base => "fs_base",
            Register::gs_base => "gs_base",
            Register::ds => "ds",
            Register::es => "es",
            Register::fs => "fs",
            Register::gs => "gs",
        }
    }

    /// Reads this register from a snapshot.
    #[must_use]
    pub fn read_from(self, regs: &user_regs_struct) -> u64 {
        match self {
            Register::r15 => regs.r15,
            Register::r14 => regs.r14,
            Register::r13 => regs.r13,
            Register::r12 => regs.r12,
            Register::rbp => regs.rbp,
            Register::rbx => regs.rbx,
            Register::r11 => regs.r11,
            Register::r10 => regs.r10,
            Register::r9 => regs.r9,
            Register::r8 => regs.r8,
            Register::rax => regs.rax,
            Register::rcx => regs.rcx,
            Register::rdx => regs.rdx,
            Register::rsi => regs.rsi,
            Register::rdi => regs.rdi,
            Register::orig_rax => regs.orig_rax,
            Register::rip => regs.rip,
            Register::cs => regs.cs,
            Register::eflags => regs.eflags,
            Register::rsp => regs.rsp,
            Register::ss => regs.ss,
            Register::fs_base => regs.fs_base,
            Register::gs_base => regs.gs_base,
            Register::ds => regs.ds,
            Register::es => regs.es,
            Register::fs => regs.fs,
            Register::gs => regs.gs,
        }
    }

    /// Writes this register into a snapshot.
    pub fn write_to(self, regs: &mut user_regs_struct, value: u64) {
        match self {
            Register::r15 => regs.r15 = value,
            Register::r14 => regs.r14 = value,
            Register::r13 => regs.r13 = value,
            Register::r12 => regs.r12 = value,
            Register::rbp => regs.rbp = value,
            Register::rbx => regs.rbx = value,
            Register::r11 => regs.r11 = value,
            Register::r10 => regs.r10 = value,
            Register::r9 => regs.r9 = value,
            Register::r8 => regs.r8 = value,
            Register::rax => regs.rax = value,
            Register::rcx => regs.rcx = value,
            Register::rdx => regs.rdx = value,
            Register::rsi => regs.rsi = value,
            Register::rdi => regs.rdi = value,
            Register::orig_rax => regs.orig_rax = value,
            Register::rip => regs.rip = value,
            Register::cs => regs.cs = value,
            Register::eflags => regs.eflags = value,
            Register::rsp => regs.rsp = value,
            Register::ss => regs.ss = value,
            Register::fs_base => regs.fs_base = value,
            Register::gs_base => regs.gs_base = value,
            Register::ds => regs.ds = value,
            Register::es => regs.es = value,
            Register::fs => regs.fs = value,
            Register::gs => regs.gs = value,
        }
    }
}

impl Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Register {
    type Err = DebuggerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        REGISTERS
            .iter()
            .find(|r| r.name() == s)
            .copied()
            .ok_or_else(|| DebuggerError::InvalidRegister(s.to_string()))
    }
}

impl TryFrom<gimli::Register> for Register {
    type Error = DebuggerError;

    /// Maps a DWARF register number (as used by CFA rules) to a [`Register`].
    fn try_from(value: gimli::Register) -> std::result::Result<Self, Self::Error> {
        Ok(match value {
            gimli::X86_64::RAX => Register::rax,
            gimli::X86_64::RDX => Register::rdx,
            gimli::X86_64::RCX => Register::rcx,
            gimli::X86_64::RBX => Register::rbx,
            gimli::X86_64::RSI => Register::rsi,
            gimli::X86_64::RDI => Register::rdi,
            gimli::X86_64::RBP => Register::rbp,
            gimli::X86_64::RSP => Register::rsp,
            gimli::X86_64::R8 => Register::r8,
            gimli::X86_64::R9 => Register::r9,
            gimli::X86_64::R10 => Register::r10,
            gimli::X86_64::R11 => Register::r11,
            gimli::X86_64::R12 => Register::r12,
            gimli::X86_64::R13 => Register::r13,
            gimli::X86_64::R14 => Register::r14,
            gimli::X86_64::R15 => Register::r15,
            gimli::X86_64::RA => Register::rip,
            other => return Err(DebuggerError::UnimplementedRegister(other.0)),
        })
    }
}

/// Fetches the full register snapshot of the inferior.
///
/// # Errors
///
/// Fails with the underlying OS error if the ptrace request fails.
pub fn snapshot(pid: Pid) -> Result<user_regs_struct> {
    Ok(ptrace::getregs(pid)?)
}

/// Reads one register of the inferior.
///
/// # Errors
///
/// Fails with the underlying OS error if the ptrace request fails.
pub fn get_reg(pid: Pid, r: Register) -> Result<u64> {
    Ok(r.read_from(&ptrace::getregs(pid)?))
}

/// Writes one register of the inferior, leaving all others as they were.
///
/// # Errors
///
/// Fails with the underlying OS error if a ptrace request fails.
pub fn set_reg(pid: Pid, r: Register, value: u64) -> Result<()> {
    let mut regs = ptrace::getregs(pid)?;
    r.write_to(&mut regs, value);
    ptrace::setregs(pid, regs)?;
    Ok(())
}

/// All registers of a snapshot as `(name, value)` pairs, in dump order.
#[must_use]
pub fn dump(regs: &user_regs_struct) -> Vec<(&'static str, u64)> {
    REGISTERS
        .iter()
        .map(|r| (r.name(), r.read_from(regs)))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn empty_snapshot() -> user_regs_struct {
        // plain data, all fields are u64
        unsafe { std::mem::zeroed() }
    }

    #[test]
    fn test_register_from_str() {
        assert_eq!(Register::from_str("rip").unwrap(), Register::rip);
        assert_eq!(Register::from_str("orig_rax").unwrap(), Register::orig_rax);
        assert!(matches!(
            Register::from_str("xyz"),
            Err(DebuggerError::InvalidRegister(_))
        ));
    }

    #[test]
    fn test_read_write_round_trip() {
        let mut regs = empty_snapshot();
        for (i, r) in REGISTERS.iter().enumerate() {
            r.write_to(&mut regs, i as u64 + 1);
        }
        for (i, r) in REGISTERS.iter().enumerate() {
            assert_eq!(r.read_from(&regs), i as u64 + 1, "register {r}");
        }
    }

    #[test]
    fn test_set_get_is_noop() {
        let mut regs = empty_snapshot();
        regs.rip = 0x401122;
        regs.rsp = 0x7fffffffe000;
        let before = regs;
        for r in REGISTERS {
            let v = r.read_from(&regs);
            r.write_to(&mut regs, v);
        }
        assert_eq!(dump(&before), dump(&regs));
    }

    #[test]
    fn test_dump_order_and_names() {
        let regs = empty_snapshot();
        let dumped = dump(&regs);
        assert_eq!(dumped.len(), 27);
        assert_eq!(dumped[0].0, "r15");
        assert_eq!(dumped[16].0, "rip");
        assert_eq!(dumped[26].0, "gs");
    }

    #[test]
    fn test_dwarf_register_mapping() {
        assert_eq!(
            Register::try_from(gimli::X86_64::RSP).unwrap(),
            Register::rsp
        );
        assert_eq!(
            Register::try_from(gimli::X86_64::RBP).unwrap(),
            Register::rbp
        );
        assert!(matches!(
            Register::try_from(gimli::Register(103)),
            Err(DebuggerError::UnimplementedRegister(103))
        ));
    }
}
