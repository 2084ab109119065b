//! Interpreter for the subset of DWARF location expressions that unoptimized,
//! frame-pointer based code emits for its locals.
//!
//! A location expression is a little stack program; the value left on top of
//! the stack is the variable's address in the inferior. The frame base and
//! the CFA are threaded through as explicit parameters. The frame base is
//! taken to equal the CFA, which holds whenever the subprogram's frame-base
//! attribute is `DW_OP_call_frame_cfa` (the callers check that).

use gimli::DwOp;

use crate::errors::{DebuggerError, Result};
use crate::Addr;

/// Evaluates a location expression down to an address in the inferior.
///
/// # Errors
///
/// Fails with [`DebuggerError::UnsupportedOpcode`] on any opcode outside the
/// supported subset, [`DebuggerError::NoCfa`] when the program needs a CFA
/// that was not established, and [`DebuggerError::EmptyStack`] when the
/// program leaves nothing behind.
pub fn evaluate(program: &[u8], cfa: Option<Addr>, frame_base: Option<Addr>) -> Result<Addr> {
    let mut ops = Cursor::new(program);
    let mut stack: Vec<i64> = Vec::with_capacity(4);

    while let Some(opcode) = ops.next_byte() {
        match DwOp(opcode) {
            gimli::DW_OP_addr => stack.push(ops.read_u64()? as i64),
            gimli::DW_OP_call_frame_cfa => {
                stack.push(cfa.ok_or(DebuggerError::NoCfa)?.u64() as i64);
            }
            gimli::DW_OP_fbreg => {
                let offset = ops.read_sleb128()?;
                let base = frame_base.ok_or(DebuggerError::NoCfa)?.u64() as i64;
                stack.push(base.wrapping_add(offset));
            }
            gimli::DW_OP_plus => {
                let rhs = stack.pop().ok_or(DebuggerError::EmptyStack)?;
                let lhs = stack.pop().ok_or(DebuggerError::EmptyStack)?;
                stack.push(lhs.wrapping_add(rhs));
            }
            gimli::DW_OP_consts => stack.push(ops.read_sleb128()?),
            gimli::DW_OP_plus_uconst => {
                let addend = ops.read_uleb128()? as i64;
                let top = stack.last_mut().ok_or(DebuggerError::EmptyStack)?;
                *top = top.wrapping_add(addend);
            }
            _ => return Err(DebuggerError::UnsupportedOpcode(opcode)),
        }
    }

    stack
        .last()
        .map(|v| Addr::from(*v as u64))
        .ok_or(DebuggerError::EmptyStack)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn next_byte(&mut self) -> Option<u8> {
        let b = self.bytes.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn read_u64(&mut self) -> Result<u64> {
        let end = self.pos + 8;
        let bytes = self
            .bytes
            .get(self.pos..end)
            .ok_or(DebuggerError::TruncatedExpression)?;
        self.pos = end;
        Ok(u64::from_le_bytes(bytes.try_into().expect("8 byte slice")))
    }

    fn read_uleb128(&mut self) -> Result<u64> {
        let mut result: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = self
                .next_byte()
                .ok_or(DebuggerError::TruncatedExpression)?;
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    fn read_sleb128(&mut self) -> Result<i64> {
        let mut result: i64 = 0;
        let mut shift = 0;
        loop {
            let byte = self
                .next_byte()
                .ok_or(DebuggerError::TruncatedExpression)?;
            result |= i64::from(byte & 0x7f) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    // sign extend
                    result |= -1i64 << shift;
                }
                return Ok(result);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cfa() -> Addr {
        Addr::from(0x7fff_ffff_e000usize)
    }

    fn eval(program: &[u8]) -> Result<Addr> {
        evaluate(program, Some(cfa()), Some(cfa()))
    }

    #[test]
    fn test_uleb128() {
        assert_eq!(Cursor::new(&[0x00]).read_uleb128().unwrap(), 0);
        assert_eq!(Cursor::new(&[0x7f]).read_uleb128().unwrap(), 127);
        assert_eq!(Cursor::new(&[0x80, 0x01]).read_uleb128().unwrap(), 128);
        assert_eq!(
            Cursor::new(&[0xe5, 0x8e, 0x26]).read_uleb128().unwrap(),
            624_485
        );
    }

    #[test]
    fn test_sleb128() {
        assert_eq!(Cursor::new(&[0x00]).read_sleb128().unwrap(), 0);
        assert_eq!(Cursor::new(&[0x02]).read_sleb128().unwrap(), 2);
        assert_eq!(Cursor::new(&[0x7e]).read_sleb128().unwrap(), -2);
        assert_eq!(Cursor::new(&[0x70]).read_sleb128().unwrap(), -16);
        assert_eq!(
            Cursor::new(&[0xc0, 0xbb, 0x78]).read_sleb128().unwrap(),
            -123_456
        );
    }

    #[test]
    fn test_fbreg_is_frame_base_plus_offset() {
        // DW_OP_fbreg -16
        let addr = eval(&[0x91, 0x70]).unwrap();
        assert_eq!(addr, cfa() - 16usize);
    }

    #[test]
    fn test_call_frame_cfa() {
        let addr = eval(&[0x9c]).unwrap();
        assert_eq!(addr, cfa());
    }

    #[test]
    fn test_addr_pushes_literal() {
        let mut program = vec![0x03];
        program.extend_from_slice(&0x4040a0u64.to_le_bytes());
        assert_eq!(eval(&program).unwrap(), Addr::from(0x4040a0u64));
    }

    #[test]
    fn test_consts_plus() {
        // 0x1000, 0x234, plus
        let addr = eval(&[0x11, 0x80, 0x20, 0x11, 0xb4, 0x04, 0x22]).unwrap();
        assert_eq!(addr, Addr::from(0x1234usize));
    }

    #[test]
    fn test_plus_uconst() {
        // cfa, plus_uconst 24
        let addr = eval(&[0x9c, 0x23, 0x18]).unwrap();
        assert_eq!(addr, cfa() + 24usize);
    }

    #[test]
    fn test_missing_cfa_fails() {
        assert!(matches!(
            evaluate(&[0x9c], None, None),
            Err(DebuggerError::NoCfa)
        ));
        assert!(matches!(
            evaluate(&[0x91, 0x70], None, None),
            Err(DebuggerError::NoCfa)
        ));
    }

    #[test]
    fn test_empty_program_leaves_empty_stack() {
        assert!(matches!(eval(&[]), Err(DebuggerError::EmptyStack)));
    }

    #[test]
    fn test_plus_on_short_stack_fails() {
        assert!(matches!(eval(&[0x22]), Err(DebuggerError::EmptyStack)));
    }

    #[test]
    fn test_unsupported_opcode() {
        // DW_OP_drop
        assert!(matches!(
            eval(&[0x13]),
            Err(DebuggerError::UnsupportedOpcode(0x13))
        ));
    }

    #[test]
    fn test_truncated_expression() {
        // DW_OP_addr with too few bytes
        assert!(matches!(
            eval(&[0x03, 0x01, 0x02]),
            Err(DebuggerError::TruncatedExpression)
        ));
    }
}
