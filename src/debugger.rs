//! The debugger core: owns the inferior, classifies stops, implements the
//! resume and stepping primitives and keeps the breakpoint map.

use std::ffi::CString;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use tracing::{debug, error, info, trace, warn};

use crate::breakpoint::Breakpoint;
use crate::consts::{SI_KERNEL, TRAP_BRKPT, TRAP_TRACE};
use crate::dbginfo::DebugInfo;
use crate::debuggee::Debuggee;
use crate::errors::{DebuggerError, Result};
use crate::feedback::Feedback;
use crate::regs::{self, Register};
use crate::ui::{BreakLocation, DebuggerUI, Status};
use crate::{mem_read_word, source, Addr};

/// Why the last wait returned.
#[derive(Debug)]
enum Stop {
    /// the inferior is gone, exit code or -1 for death by signal
    Exited(i32),
    /// SIGTRAP, classified and handled; the inferior is stopped
    Trapped,
    /// some other signal stopped the inferior; it has not seen it yet
    Signaled(Signal),
}

/// Signals that must reach the inferior on the next resume instead of being
/// swallowed by the debugger.
const FORWARDED_SIGNALS: [Signal; 5] = [
    Signal::SIGILL,
    Signal::SIGBUS,
    Signal::SIGFPE,
    Signal::SIGSEGV,
    Signal::SIGSTKFLT,
];

pub struct Debugger<UI: DebuggerUI> {
    debuggee: Option<Debuggee>,
    ui: UI,
    dbginfo: DebugInfo,
    /// signal to deliver with the next resume so the inferior observes it
    pending_signal: Option<Signal>,
}

impl<UI: DebuggerUI> Debugger<UI> {
    pub fn build(ui: UI, dbginfo: DebugInfo) -> Self {
        Debugger {
            debuggee: None,
            ui,
            dbginfo,
            pending_signal: None,
        }
    }

    /// Spawns the debuggee and waits for its initial stop, so the REPL
    /// starts with the inferior halted before its first user instruction.
    ///
    /// # Errors
    ///
    /// Fails when the child cannot be spawned or the initial wait fails.
    pub fn launch(&mut self, path: impl AsRef<Path>, args: &[CString]) -> Result<()> {
        let path = path.as_ref();
        let dbge = Debuggee::launch(path, args)?;
        let pid = dbge.pid();
        self.debuggee = Some(dbge);
        self.wait_stop()?;
        info!("debugging {} (pid {pid})", path.display());
        Ok(())
    }

    /// Drives the REPL until quit or inferior exit.
    ///
    /// # Errors
    ///
    /// Fails when the UI breaks down or detaching on quit fails.
    pub fn run(&mut self) -> Result<()> {
        let mut feedback = Feedback::Ok;
        loop {
            let status = match self.ui.process(feedback) {
                Err(e) => {
                    error!("{e}");
                    return Err(e);
                }
                Ok(s) => s,
            };

            if matches!(status, Status::DebuggerQuit) {
                self.quit()?;
                return Ok(());
            }

            feedback = match status {
                Status::Continue => self.cont(),
                Status::SetBreakpoint(location) => self.set_breakpoint(location),
                Status::DumpRegisters => self.dump_regs(),
                Status::StepSingle => self.single_step(),
                Status::StepIn => self.step_in(),
                Status::StepOver => self.step_over(),
                Status::StepOut => self.step_out(),
                Status::Backtrace => Ok(Feedback::Text(
                    "backtrace is not implemented".to_string(),
                )),
                Status::Variables => self.variables(),
                Status::DebuggerQuit => unreachable!("handled above"),
            }
            .into();

            // the inferior going away ends the session, whatever the command
            if let Feedback::Exit(_) = feedback {
                self.debuggee = None;
                println!("process exited");
                return Ok(());
            }
            if let Feedback::Error(DebuggerError::Os(Errno::ESRCH)) = feedback {
                error!("the debuggee is gone");
                self.debuggee = None;
                return Ok(());
            }
        }
    }

    /// Resumes the inferior until the next stop.
    ///
    /// Runs the step-over dance first so a breakpoint under the current RIP
    /// does not immediately re-fire. Benign signals (SIGURG) are re-injected
    /// and waited through; everything else stops.
    pub fn cont(&mut self) -> Result<Feedback> {
        if let Feedback::Exit(code) = self.step_over_breakpoint()? {
            return Ok(Feedback::Exit(code));
        }

        // the dance can land us on another armed breakpoint; resuming now
        // would skip its instruction, so just report where we are
        let rip = self.get_current_addr()?;
        let dbge = self.debuggee.as_ref().ok_or(DebuggerError::NoDebuggee)?;
        if dbge
            .breakpoints
            .get(&rip)
            .is_some_and(Breakpoint::is_enabled)
        {
            info!("hit breakpoint at address {rip}");
            self.show_source_at(rip);
            return Ok(Feedback::Ok);
        }

        let pid = dbge.pid();
        let mut signal = self.pending_signal.take();
        loop {
            ptrace::cont(pid, signal)?;
            match self.wait_stop()? {
                Stop::Exited(code) => return Ok(Feedback::Exit(code)),
                Stop::Trapped => return Ok(Feedback::Ok),
                Stop::Signaled(Signal::SIGURG) => {
                    // benign runtime-internal signal: hand it over and keep
                    // going
                    trace!("re-delivering SIGURG");
                    signal = Some(Signal::SIGURG);
                }
                Stop::Signaled(sig) => {
                    self.pending_signal = Some(sig);
                    return Ok(Feedback::Ok);
                }
            }
        }
    }

    /// Executes exactly one instruction of the inferior.
    pub fn single_step(&mut self) -> Result<Feedback> {
        let rip = self.get_current_addr()?;
        let dbge = self.debuggee.as_ref().ok_or(DebuggerError::NoDebuggee)?;
        if dbge
            .breakpoints
            .get(&rip)
            .is_some_and(Breakpoint::is_enabled)
        {
            trace!("stepping over the instruction under a breakpoint");
            return self.step_over_breakpoint();
        }

        let signal = self.pending_signal.take();
        self.single_step_raw(signal)
    }

    /// Source-level step into: single-steps until the PC maps to a different
    /// source line.
    pub fn step_in(&mut self) -> Result<Feedback> {
        let start_rip = self.get_current_addr()?;
        let start = match self.dbginfo.pc_to_line(start_rip) {
            Some((file, line)) => (file.to_path_buf(), line),
            None => return Err(DebuggerError::NoLineInfo(start_rip)),
        };

        loop {
            if let Feedback::Exit(code) = self.single_step()? {
                return Ok(Feedback::Exit(code));
            }
            let rip = self.get_current_addr()?;
            match self.dbginfo.pc_to_line(rip) {
                Some((file, line)) if file == start.0.as_path() && line == start.1 => continue,
                Some((file, line)) => {
                    let file = file.to_path_buf();
                    trace!("stepped to {}:{line}", file.display());
                    self.show_source_at(rip);
                    return Ok(Feedback::Ok);
                }
                None => {
                    debug!("stepped into code without line information at {rip}");
                    return Ok(Feedback::Ok);
                }
            }
        }
    }

    /// Continues until the current frame returns: a transient breakpoint on
    /// the return address at `[rbp + 8]`.
    pub fn step_out(&mut self) -> Result<Feedback> {
        let pid = self.pid()?;
        let frame_pointer: Addr = self.get_reg(Register::rbp)?.into();
        let return_addr: Addr = (mem_read_word(pid, frame_pointer + 8usize)? as u64).into();
        trace!("frame pointer {frame_pointer}, return address {return_addr}");

        let transient = self.plant_transient(return_addr)?;
        let feedback = self.cont()?;
        if !matches!(feedback, Feedback::Exit(_)) {
            if let Some(addr) = transient {
                self.remove_breakpoint(addr)?;
            }
        }
        Ok(feedback)
    }

    /// Source-level step over: transient breakpoints on every other
    /// statement line of the enclosing function plus the caller's return
    /// address, then continue.
    pub fn step_over(&mut self) -> Result<Feedback> {
        let pid = self.pid()?;
        let rip = self.get_current_addr()?;
        let (first_line, last_line) = self.dbginfo.func_line_range(rip)?;
        let (file, current_line) = match self.dbginfo.pc_to_line(rip) {
            Some((file, line)) => (file.to_path_buf(), line),
            None => return Err(DebuggerError::NoLineInfo(rip)),
        };
        trace!(
            "next over {}:{current_line}, planting on lines {first_line}..={last_line}",
            file.display()
        );

        let mut transients: Vec<Addr> = Vec::new();
        for line in first_line..=last_line {
            if line == current_line {
                continue;
            }
            // lines without a statement (blanks, braces) resolve to nothing
            let Ok(addr) = self.dbginfo.statement_address(&file, line) else {
                continue;
            };
            if !transients.contains(&addr) {
                if let Some(addr) = self.plant_transient(addr)? {
                    transients.push(addr);
                }
            }
        }

        // the current line may be the last one; catch returning to the
        // caller as well
        let frame_pointer: Addr = self.get_reg(Register::rbp)?.into();
        let caller_addr = mem_read_word(pid, frame_pointer)? as u64;
        if caller_addr != 0 && Addr::from(caller_addr) < self.dbginfo.etext() {
            if let Some(addr) = self.plant_transient(Addr::from(caller_addr))? {
                transients.push(addr);
            }
        } else {
            trace!("rejecting caller address {caller_addr:#x}");
        }

        let feedback = self.cont()?;
        if !matches!(feedback, Feedback::Exit(_)) {
            for addr in transients {
                self.remove_breakpoint(addr)?;
            }
        }
        Ok(feedback)
    }

    /// Sets a user breakpoint at an address, a function's prologue end, or a
    /// FILE:LINE statement.
    pub fn set_breakpoint(&mut self, location: BreakLocation) -> Result<Feedback> {
        let addr = match location {
            BreakLocation::Address(addr) => addr,
            BreakLocation::Function(name) => {
                let func = self.dbginfo.lookup_func(&name)?;
                self.dbginfo.prologue_end_address(func)?
            }
            BreakLocation::Line(file, line) => self
                .dbginfo
                .statement_address(&PathBuf::from(file), line)?,
        };

        self.plant_breakpoint(addr)?;
        info!("set breakpoint at address {addr}");
        Ok(Feedback::Ok)
    }

    /// All registers of the stopped inferior.
    pub fn dump_regs(&self) -> Result<Feedback> {
        let pid = self.pid()?;
        let snapshot = regs::snapshot(pid)?;
        Ok(Feedback::Registers(regs::dump(&snapshot)))
    }

    /// Every local variable and parameter in scope at the stopped PC,
    /// resolved to addresses via the CFA.
    pub fn variables(&self) -> Result<Feedback> {
        let pid = self.pid()?;
        let snapshot = regs::snapshot(pid)?;
        let rip: Addr = Register::rip.read_from(&snapshot).into();
        let vars = self.dbginfo.variables_in_scope(rip, &snapshot)?;
        Ok(Feedback::Variables(vars))
    }

    /// Disables every breakpoint, detaches and lets the inferior run free.
    ///
    /// # Errors
    ///
    /// A failing detach surfaces the OS error.
    pub fn quit(&mut self) -> Result<()> {
        if let Some(dbge) = self.debuggee.as_mut() {
            debug!("disabling all breakpoints before detaching");
            dbge.disable_all_breakpoints()?;
            dbge.detach()?;
            info!("detached from {}", dbge.pid());
        }
        self.debuggee = None;
        Ok(())
    }

    /// The step-over-breakpoint dance: disable the breakpoint under RIP,
    /// single-step the original instruction, re-enable.
    ///
    /// A missing or disabled breakpoint at RIP is a no-op.
    fn step_over_breakpoint(&mut self) -> Result<Feedback> {
        let rip = self.get_current_addr()?;
        let dbge = self.debuggee.as_mut().ok_or(DebuggerError::NoDebuggee)?;
        match dbge.breakpoints.get_mut(&rip) {
            None => return Ok(Feedback::Ok),
            Some(bp) if !bp.is_enabled() => return Ok(Feedback::Ok),
            Some(bp) => {
                trace!("disabling the breakpoint at {rip} for the step over");
                bp.disable()?;
            }
        }

        let feedback = self.step_until_trap()?;
        if let Feedback::Exit(_) = feedback {
            // nothing left to re-arm
            return Ok(feedback);
        }

        if let Some(bp) = self
            .debuggee
            .as_mut()
            .ok_or(DebuggerError::NoDebuggee)?
            .breakpoints
            .get_mut(&rip)
        {
            trace!("re-enabling the stepped-over breakpoint");
            bp.enable()?;
        }
        Ok(Feedback::Ok)
    }

    /// One hardware step, one wait. A non-trap stop leaves the signal
    /// pending for the next resume and returns control, exactly one
    /// instruction was executed either way.
    fn single_step_raw(&mut self, signal: Option<Signal>) -> Result<Feedback> {
        let pid = self.pid()?;
        ptrace::step(pid, signal)?;
        match self.wait_stop()? {
            Stop::Exited(code) => Ok(Feedback::Exit(code)),
            Stop::Trapped => Ok(Feedback::Ok),
            Stop::Signaled(sig) => {
                self.pending_signal = Some(sig);
                Ok(Feedback::Ok)
            }
        }
    }

    /// The dance's single step: loops until SIGTRAP arrives, carrying
    /// intervening signals into the next step so the inferior observes them.
    fn step_until_trap(&mut self) -> Result<Feedback> {
        let pid = self.pid()?;
        let mut signal = None;
        loop {
            ptrace::step(pid, signal)?;
            match self.wait_stop()? {
                Stop::Exited(code) => return Ok(Feedback::Exit(code)),
                Stop::Trapped => return Ok(Feedback::Ok),
                Stop::Signaled(sig) => {
                    trace!("carrying {} into the next step", sig.as_str());
                    signal = Some(sig);
                }
            }
        }
    }

    /// Waits for the inferior and classifies the stop.
    fn wait_stop(&self) -> Result<Stop> {
        let pid = self.pid()?;
        let status = waitpid(pid, Some(WaitPidFlag::__WALL))?;
        match status {
            WaitStatus::Exited(_, exit_code) => {
                info!("process exited with code {exit_code}");
                Ok(Stop::Exited(exit_code))
            }
            WaitStatus::Signaled(_, signal, _) => {
                info!("process terminated by {}", signal.as_str());
                Ok(Stop::Exited(-1))
            }
            WaitStatus::Stopped(_, _) => {
                let siginfo = ptrace::getsiginfo(pid)?;
                let signal = Signal::try_from(siginfo.si_signo)?;
                match signal {
                    Signal::SIGTRAP => {
                        self.handle_sigtrap(siginfo.si_code)?;
                        Ok(Stop::Trapped)
                    }
                    sig => {
                        if FORWARDED_SIGNALS.contains(&sig) {
                            info!("debuggee received {}: {}", sig.as_str(), siginfo.si_code);
                        } else {
                            debug!("debuggee received {}: {}", sig.as_str(), siginfo.si_code);
                        }
                        Ok(Stop::Signaled(sig))
                    }
                }
            }
            other => {
                warn!("unexpected wait status: {other:?}");
                Ok(Stop::Trapped)
            }
        }
    }

    /// SIGTRAP classification per siginfo code.
    ///
    /// A breakpoint leaves RIP one byte past the INT3; the rewind here makes
    /// every later primitive see the breakpoint's own address.
    fn handle_sigtrap(&self, si_code: i32) -> Result<()> {
        match si_code {
            SI_KERNEL | TRAP_BRKPT => {
                let rip = self.get_current_addr()? - 1usize;
                self.set_reg(Register::rip, rip.u64())?;
                info!("hit breakpoint at address {rip}");
                if let Some(func) = self.dbginfo.function_name_at(rip) {
                    debug!("stopped in {func}");
                }
                self.show_source_at(rip);
            }
            TRAP_TRACE => trace!("single step completed"),
            code => trace!("SIGTRAP with code {code}"),
        }
        Ok(())
    }

    /// Prints the source window for an address. Missing line info or source
    /// files are logged, never fatal.
    fn show_source_at(&self, addr: Addr) {
        let Some((file, line)) = self.dbginfo.pc_to_line(addr) else {
            debug!("no line information for {addr}");
            return;
        };
        if let Err(e) = source::show(file, line) {
            warn!("could not display {}:{line}: {e}", file.display());
        }
    }

    fn plant_breakpoint(&mut self, addr: Addr) -> Result<()> {
        let dbge = self.debuggee.as_mut().ok_or(DebuggerError::NoDebuggee)?;
        // planting over an existing breakpoint would save the trap byte as
        // the "original" instruction and corrupt the text on restore
        if dbge.breakpoints.contains_key(&addr) {
            warn!("a breakpoint at {addr} already exists");
            return Ok(());
        }
        let mut bp = Breakpoint::new(dbge.pid(), addr);
        bp.enable()?;
        dbge.breakpoints.insert(addr, bp);
        Ok(())
    }

    /// Plants a breakpoint for internal use, unless the user already has one
    /// there. Returns the address when a transient was actually planted, so
    /// the caller knows what to clean up.
    fn plant_transient(&mut self, addr: Addr) -> Result<Option<Addr>> {
        let dbge = self.debuggee.as_ref().ok_or(DebuggerError::NoDebuggee)?;
        if dbge.breakpoints.contains_key(&addr) {
            return Ok(None);
        }
        self.plant_breakpoint(addr)?;
        Ok(Some(addr))
    }

    /// Disables and removes a breakpoint so the inferior's text is left
    /// intact.
    fn remove_breakpoint(&mut self, addr: Addr) -> Result<()> {
        let dbge = self.debuggee.as_mut().ok_or(DebuggerError::NoDebuggee)?;
        match dbge.breakpoints.remove(&addr) {
            Some(mut bp) => {
                if bp.is_enabled() {
                    bp.disable()?;
                }
            }
            None => warn!("removed a breakpoint at {addr} that did not exist"),
        }
        Ok(())
    }

    fn get_current_addr(&self) -> Result<Addr> {
        Ok(self.get_reg(Register::rip)?.into())
    }

    fn get_reg(&self, r: Register) -> Result<u64> {
        regs::get_reg(self.pid()?, r)
    }

    fn set_reg(&self, r: Register, value: u64) -> Result<()> {
        regs::set_reg(self.pid()?, r, value)
    }

    fn pid(&self) -> Result<nix::unistd::Pid> {
        Ok(self
            .debuggee
            .as_ref()
            .ok_or(DebuggerError::NoDebuggee)?
            .pid())
    }
}
