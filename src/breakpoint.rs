//! Software breakpoints: one byte of the inferior's text patched to INT3.

use nix::unistd::Pid;

use crate::errors::{DebuggerError, Result};
use crate::{mem_read_word, mem_write_word, Addr, Word};

/// The INT3 instruction, raises SIGTRAP in the tracee when executed.
pub const INT3_BYTE: u8 = 0xcc;

const LOW_BYTE_MASK: Word = 0xff;

/// Replaces the low byte of a word, leaving the other seven untouched.
fn patch_low_byte(word: Word, byte: u8) -> Word {
    (word & !LOW_BYTE_MASK) | Word::from(byte)
}

/// A software breakpoint in the inferior.
///
/// While enabled, the instruction byte at `addr` is [`INT3_BYTE`] and the
/// original byte is kept in `saved_data`. ptrace memory access is word
/// granular, so enabling and disabling is a read-modify-write of the whole
/// word around the patched byte.
#[derive(Debug)]
pub struct Breakpoint {
    pid: Pid,
    addr: Addr,
    saved_data: Option<u8>,
}

impl Breakpoint {
    /// Creates a new, disabled breakpoint.
    #[must_use]
    pub fn new(pid: Pid, addr: Addr) -> Self {
        Self {
            pid,
            addr,
            saved_data: None,
        }
    }

    #[must_use]
    pub fn addr(&self) -> Addr {
        self.addr
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.saved_data.is_some()
    }

    /// The byte that was at [`Self::addr`] before the trap was patched in,
    /// if the breakpoint is enabled.
    #[must_use]
    pub fn saved_data(&self) -> Option<u8> {
        self.saved_data
    }

    /// Patches the trap instruction into the inferior, saving the original
    /// byte.
    ///
    /// # Errors
    ///
    /// Fails if the breakpoint is already enabled or the inferior's memory
    /// cannot be accessed.
    pub fn enable(&mut self) -> Result<()> {
        if self.saved_data.is_some() {
            return Err(DebuggerError::BreakpointIsAlreadyEnabled);
        }

        let word = mem_read_word(self.pid, self.addr)?;
        self.saved_data = Some((word & LOW_BYTE_MASK) as u8);
        mem_write_word(self.pid, self.addr, patch_low_byte(word, INT3_BYTE))?;

        Ok(())
    }

    /// Restores the original byte in the inferior.
    ///
    /// # Errors
    ///
    /// Fails if the breakpoint is already disabled or the inferior's memory
    /// cannot be accessed.
    pub fn disable(&mut self) -> Result<()> {
        let saved = self
            .saved_data
            .ok_or(DebuggerError::BreakpointIsAlreadyDisabled)?;

        let word = mem_read_word(self.pid, self.addr)?;
        mem_write_word(self.pid, self.addr, patch_low_byte(word, saved))?;
        self.saved_data = None;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_patch_low_byte() {
        let word: Word = 0x1122334455667788;
        assert_eq!(patch_low_byte(word, INT3_BYTE), 0x11223344556677cc);
        assert_eq!(patch_low_byte(word, 0x00), 0x1122334455667700);
    }

    #[test]
    fn test_patch_round_trip() {
        let word: Word = 0x00007f55e3b2c1aa_u64 as Word;
        let saved = (word & LOW_BYTE_MASK) as u8;
        let trapped = patch_low_byte(word, INT3_BYTE);
        assert_eq!(trapped & LOW_BYTE_MASK, Word::from(INT3_BYTE));
        assert_eq!(patch_low_byte(trapped, saved), word);
    }

    #[test]
    fn test_patch_negative_word() {
        // ptrace words are signed, the high bit must survive the patch
        let word: Word = -2;
        let saved = (word & LOW_BYTE_MASK) as u8;
        let trapped = patch_low_byte(word, INT3_BYTE);
        assert_eq!(patch_low_byte(trapped, saved), word);
    }
}
