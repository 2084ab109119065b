//! Spawning and owning the traced child process.

use std::collections::HashMap;
use std::ffi::CString;
use std::path::Path;

use nix::sys::personality::{self, Persona};
use nix::sys::ptrace;
use nix::unistd::{execv, fork, ForkResult, Pid};
use tracing::error;

use crate::breakpoint::Breakpoint;
use crate::errors::{DebuggerError, Result};
use crate::Addr;

/// The inferior: a freshly launched child process under trace.
///
/// The child is stopped by the kernel before its first user instruction (the
/// post-execve SIGTRAP) and stays under control of the debugger until it exits
/// or is detached.
pub struct Debuggee {
    pub(crate) pid: Pid,
    pub(crate) breakpoints: HashMap<Addr, Breakpoint>,
}

impl Debuggee {
    /// Forks and turns the child into the debuggee.
    ///
    /// The child disables ASLR for itself so that the addresses from the
    /// debug information are valid run to run, requests tracing with
    /// PTRACE_TRACEME and execs the target. The debugger runs on a single
    /// thread, so the tracer identity the kernel binds the child to stays
    /// stable for the whole session.
    ///
    /// # Errors
    ///
    /// Fails if the path does not point to an existing file or the fork
    /// fails. Errors in the child (personality, traceme, execv) terminate the
    /// child with a diagnostic on stderr.
    pub fn launch(path: impl AsRef<Path>, args: &[CString]) -> Result<Self> {
        let path: &Path = path.as_ref();
        if !path.exists() {
            let err = DebuggerError::ExecutableDoesNotExist(path.to_string_lossy().to_string());
            error!("{err}");
            return Err(err);
        }
        if !path.is_file() {
            let err = DebuggerError::ExecutableIsNotAFile(path.to_string_lossy().to_string());
            error!("{err}");
            return Err(err);
        }

        match unsafe { fork() } {
            Err(e) => {
                error!("could not fork the debuggee: {e}");
                Err(e.into())
            }
            Ok(ForkResult::Parent { child }) => Ok(Self {
                pid: child,
                breakpoints: HashMap::new(),
            }),
            Ok(ForkResult::Child) => {
                if let Err(e) = Self::become_traced(path, args) {
                    eprintln!("could not become the debuggee: {e}");
                }
                // only reached when something before or in execv failed
                std::process::exit(1);
            }
        }
    }

    fn become_traced(path: &Path, args: &[CString]) -> Result<()> {
        let persona = personality::get()?;
        personality::set(persona | Persona::ADDR_NO_RANDOMIZE)?;
        ptrace::traceme()?;
        let cpath = CString::new(path.to_string_lossy().as_ref())?;
        execv(&cpath, args)?;
        unreachable!("execv only returns on error")
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Detaches from the inferior, letting it run free.
    ///
    /// All breakpoints must be disabled before this, otherwise the inferior
    /// is left with stray trap instructions in its text.
    ///
    /// # Errors
    ///
    /// Fails with the underlying OS error if the ptrace request fails.
    pub fn detach(&self) -> Result<()> {
        ptrace::detach(self.pid, None)?;
        Ok(())
    }

    /// Restores the original byte of every enabled breakpoint.
    ///
    /// # Errors
    ///
    /// Fails with the underlying OS error if the inferior's memory cannot be
    /// written.
    pub fn disable_all_breakpoints(&mut self) -> Result<()> {
        for bp in self.breakpoints.values_mut() {
            if bp.is_enabled() {
                bp.disable()?;
            }
        }
        Ok(())
    }
}
