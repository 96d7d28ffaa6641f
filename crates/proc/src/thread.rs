//! Per-thread execution control
//!
//! A [`Thread`] wraps the OS handle of one traced thread and resumes it without
//! losing breakpoints: when stopped on a trap, the original bytes are put back
//! for the duration of the resume and the trap is rewritten afterwards.

use crate::breakpoints::Breakpoint;
use crate::error::{Error, Result};
use crate::process::Process;
use crate::target::{Registers, ThreadId, ThreadIo, WaitStatus};
use std::sync::Arc;
use tracing::{debug, error, trace};

/// How a thread is resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMode {
    /// Run until the next stop
    Resume,
    /// Execute exactly one instruction
    StepInstruction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CurrentBreakpoint {
    addr: u64,
    temp: bool,
}

/// A traced OS thread.
pub struct Thread<O: ThreadIo> {
    pub id: ThreadId,
    /// Result of the last wait
    pub status: Option<WaitStatus>,
    pub(crate) process: Arc<Process>,
    pub(crate) os: O,
    current_breakpoint: Option<CurrentBreakpoint>,
    breakpoint_condition_met: bool,
    breakpoint_condition_error: Option<Error>,
    single_stepping: bool,
    running: bool,
}

/// Rewrites the trap at `addr` when dropped.
struct Reinstate<'a> {
    process: &'a Process,
    mem: &'a dyn ThreadIo,
    thread: ThreadId,
    addr: u64,
}

impl Drop for Reinstate<'_> {
    fn drop(&mut self) {
        let attempts = self.process.config().reinstate_attempts.max(1);
        let mut last_err = None;
        for _ in 0..attempts {
            match self.process.reinstate(self.mem, self.addr) {
                Ok(()) => return,
                Err(err) => last_err = Some(err),
            }
        }
        if let Some(err) = last_err {
            error!(
                thread = %self.thread,
                addr = format_args!("{:#x}", self.addr),
                error = %err,
                "could not restore breakpoint on thread"
            );
            self.process.mark_unarmed(self.addr);
        }
    }
}

/// Clears the stepping flags when dropped.
struct SingleStepping<'a> {
    single_stepping: &'a mut bool,
    running: &'a mut bool,
}

impl<'a> SingleStepping<'a> {
    fn enter(single_stepping: &'a mut bool, running: &'a mut bool) -> Self {
        *single_stepping = true;
        Self {
            single_stepping,
            running,
        }
    }
}

impl Drop for SingleStepping<'_> {
    fn drop(&mut self) {
        *self.single_stepping = false;
        *self.running = false;
    }
}

impl<O: ThreadIo> Thread<O> {
    pub fn new(id: i32, process: Arc<Process>, os: O) -> Self {
        Self {
            id: ThreadId(id),
            status: None,
            process,
            os,
            current_breakpoint: None,
            breakpoint_condition_met: false,
            breakpoint_condition_error: None,
            single_stepping: false,
            running: false,
        }
    }

    pub fn process(&self) -> &Arc<Process> {
        &self.process
    }

    pub fn os(&self) -> &O {
        &self.os
    }

    pub fn registers(&self) -> Result<Registers> {
        self.os.registers()
    }

    pub fn pc(&self) -> Result<u64> {
        Ok(self.os.registers()?.pc)
    }

    pub fn set_pc(&self, pc: u64) -> Result<()> {
        self.os.set_pc(pc)
    }

    pub fn stopped(&self) -> bool {
        self.os.stopped()
    }

    pub fn blocked(&self) -> bool {
        self.os.blocked()
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn single_stepping(&self) -> bool {
        self.single_stepping
    }

    /// Snapshot of the breakpoint the thread is stopped at
    pub fn current_breakpoint(&self) -> Option<Breakpoint> {
        self.current_breakpoint
            .and_then(|current| self.process.breakpoint_at(current.addr))
    }

    pub fn current_breakpoint_addr(&self) -> Option<u64> {
        self.current_breakpoint.map(|current| current.addr)
    }

    pub fn breakpoint_condition_met(&self) -> bool {
        self.breakpoint_condition_met
    }

    pub fn breakpoint_condition_error(&self) -> Option<&Error> {
        self.breakpoint_condition_error.as_ref()
    }

    /// Resume the thread until the next stop.
    pub fn continue_(&mut self) -> Result<()> {
        self.resume(ResumeMode::Resume, 0)
    }

    /// Resume the thread, delivering `sig`.
    pub fn continue_with_signal(&mut self, sig: i32) -> Result<()> {
        self.resume(ResumeMode::Resume, sig)
    }

    /// Execute a single instruction.
    pub fn step_instruction(&mut self) -> Result<()> {
        self.resume(ResumeMode::StepInstruction, 0)
    }

    fn resume(&mut self, mode: ResumeMode, sig: i32) -> Result<()> {
        // Stopped on a trap: run the original instruction and put the trap back
        // once the thread is past it.
        let _reinstate = match self.current_breakpoint {
            Some(current) => {
                if self.process.restore_original(&self.os, current.addr)? {
                    Some(Reinstate {
                        process: &self.process,
                        mem: &self.os,
                        thread: self.id,
                        addr: current.addr,
                    })
                } else {
                    None
                }
            }
            None => None,
        };

        self.current_breakpoint = None;
        self.breakpoint_condition_met = false;
        self.breakpoint_condition_error = None;
        self.running = true;

        trace!(thread = %self.id, ?mode, sig, "resuming thread");
        match mode {
            ResumeMode::StepInstruction => {
                let _flags = SingleStepping::enter(&mut self.single_stepping, &mut self.running);
                self.os.single_step()
            }
            ResumeMode::Resume => self.os.resume_with_signal(sig),
        }
    }

    /// Stop the thread if it is running.
    pub fn halt(&mut self) -> Result<()> {
        if !self.os.stopped() {
            self.os.halt()?;
        }
        self.running = false;
        Ok(())
    }

    /// Address the current function returns to.
    pub fn return_address(&self) -> Result<u64> {
        let frames = self.process.unwinder().stacktrace(&self.os, 1)?;
        match frames.get(1) {
            Some(caller) => Ok(caller.location.pc),
            None => Err(Error::NoReturnAddr {
                function: frames
                    .first()
                    .and_then(|frame| frame.location.function_name())
                    .unwrap_or("?")
                    .to_string(),
            }),
        }
    }

    /// Determine whether the thread just stopped at a breakpoint.
    ///
    /// On a hit the PC is rewound to the breakpoint address, the condition is
    /// evaluated and, if it holds, the hit counters are incremented. State is
    /// only written on a hit; resuming clears it. Calling again at the same
    /// stop leaves it untouched.
    pub fn set_current_breakpoint(&mut self) -> Result<()> {
        let pc = self.pc()?;
        if self.current_breakpoint.map_or(false, |current| current.addr == pc) {
            return Ok(());
        }
        let trap_size = self.process.arch().breakpoint_size() as u64;
        let Some(bp) = self.process.breakpoint_at(pc.wrapping_sub(trap_size)) else {
            return Ok(());
        };

        self.set_pc(bp.addr)?;
        self.current_breakpoint = Some(CurrentBreakpoint {
            addr: bp.addr,
            temp: bp.temp,
        });
        match bp.check_condition(self) {
            Ok(met) => self.breakpoint_condition_met = met,
            Err(err) => self.breakpoint_condition_error = Some(err),
        }

        if self.breakpoint_condition_met {
            let goroutine = match self.get_g() {
                Ok(g) => Some(g.id),
                Err(err) => {
                    debug!(thread = %self.id, error = %err, "could not resolve goroutine for hit count");
                    None
                }
            };
            self.process.record_hit(bp.addr, goroutine);
            debug!(
                thread = %self.id,
                addr = format_args!("{:#x}", bp.addr),
                goroutine = goroutine.unwrap_or(0),
                "breakpoint hit"
            );
        }
        Ok(())
    }

    /// Stopped at a breakpoint whose condition holds
    pub fn on_triggered_breakpoint(&self) -> bool {
        self.current_breakpoint.is_some() && self.breakpoint_condition_met
    }

    /// Stopped at a temporary breakpoint whose condition holds
    pub fn on_triggered_temp_breakpoint(&self) -> bool {
        self.on_triggered_breakpoint()
            && self.current_breakpoint.map_or(false, |current| current.temp)
    }

    /// Stopped inside the runtime's compiled-in breakpoint function
    pub fn on_runtime_breakpoint(&self) -> bool {
        let symbol = &self.process.config().breakpoint_symbol;
        match (self.process.debug_info().lookup_func(symbol), self.pc()) {
            (Some(func), Ok(pc)) => func.contains(pc),
            _ => false,
        }
    }

    /// Whether this thread runs the goroutine the active stepping operation is
    /// waiting for.
    pub fn on_next_goroutine(&self) -> Result<bool> {
        let first = self.process.lock_breakpoints().first_temp().cloned();
        match first {
            Some(bp) => bp.check_condition(self),
            None => Ok(false),
        }
    }
}
