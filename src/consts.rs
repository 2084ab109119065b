//! Siginfo codes for SIGTRAP. These live deep in the kernel uapi headers and
//! are not exposed by nix or the libc bindings.
//!
//! Source: <https://elixir.bootlin.com/linux/v6.13.1/source/include/uapi/asm-generic/siginfo.h#L227>

/// Sent by the kernel, the code INT3 traps arrive with
pub const SI_KERNEL: i32 = 0x80;

/// Process breakpoint
pub const TRAP_BRKPT: i32 = 0x1;
/// Process trace trap, reported after a completed single step
pub const TRAP_TRACE: i32 = 0x2;
