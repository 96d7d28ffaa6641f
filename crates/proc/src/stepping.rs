//! Source-level stepping over the current line
//!
//! `next` plants temporary breakpoints on every other line of the current
//! function and on the return address, then lets the thread run. Only the
//! goroutine that requested the step can trigger them.

use crate::breakpoints::{Condition, StepId};
use crate::error::{Error, Result};
use crate::goroutine::G;
use crate::location::Location;
use crate::process::Process;
use crate::target::ThreadIo;
use crate::thread::Thread;
use debuginfo::FrameDescriptor;
use std::path::Path;
use tracing::{debug, warn};

/// An in-flight stepping operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOperation {
    pub id: StepId,
    /// Goroutine the temporary breakpoints are conditioned on
    pub goroutine: i64,
    /// The goroutine is returning into the runtime exit path; its temporary
    /// breakpoints carry no condition.
    pub exiting: bool,
}

/// Keeps an address out of the step targets until dropped.
struct Reservation<'a> {
    process: &'a Process,
    addr: u64,
}

impl<'a> Reservation<'a> {
    fn hold(process: &'a Process, addr: u64) -> Option<Self> {
        if process.reserve(addr) {
            Some(Self { process, addr })
        } else {
            None
        }
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.process.release(self.addr);
    }
}

/// Removes a temporary breakpoint when dropped, unless kept.
struct TempBreakpoint<'a> {
    process: &'a Process,
    mem: &'a dyn ThreadIo,
    addr: u64,
    kept: bool,
}

impl TempBreakpoint<'_> {
    fn keep(mut self) {
        self.kept = true;
    }
}

impl Drop for TempBreakpoint<'_> {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        if let Err(err) = self.process.clear_breakpoint(self.mem, self.addr) {
            warn!(addr = format_args!("{:#x}", self.addr), error = %err, "could not remove deferred breakpoint");
        }
    }
}

fn is_managed(file: &str, extension: &str) -> bool {
    Path::new(file).extension().and_then(|ext| ext.to_str()) == Some(extension)
}

impl<O: ThreadIo> Thread<O> {
    /// Install the temporary breakpoints for stepping over the current line.
    pub fn set_next_breakpoints(&self) -> Result<()> {
        if self.blocked() {
            return Err(Error::ThreadBlocked);
        }

        let loc = self.location()?;
        let fde = self
            .process
            .debug_info()
            .fde_for_pc(loc.pc)
            .ok_or(Error::NoFrameDescriptor { pc: loc.pc })?;

        if is_managed(&loc.file, &self.process.config().managed_extension) {
            self.next(&loc, &fde)
        } else {
            self.cnext(loc.pc, &fde, &loc.file)
        }
    }

    fn next(&self, loc: &Location, fde: &FrameDescriptor) -> Result<()> {
        let process = self.process.as_ref();
        let debug_info = process.debug_info();
        let mut pcs = debug_info.all_pcs_between(fde.begin(), fde.end(), &loc.file);

        let g = self.get_g()?;
        // The deferred call itself must not become a step target
        let _reservation = match g.defer_pc {
            0 => None,
            pc => Reservation::hold(process, pc),
        };
        let deferred = match g.defer_pc {
            0 => None,
            _ => self.set_deferred_breakpoint(&g)?,
        };

        let ret = self.return_address()?;

        let covered = pcs.iter().any(|&pc| fde.cover(pc));
        if !covered {
            let returns_to_exit = debug_info
                .pc_to_func(ret)
                .map_or(false, |f| f.name == process.config().goexit_symbol);
            if returns_to_exit {
                return Err(Error::GoroutineExiting { goroutine_id: g.id });
            }
        }

        pcs.push(ret);
        self.set_next_temp_breakpoints(loc.pc, &pcs)?;
        if let Some(guard) = deferred {
            guard.keep();
        }
        Ok(())
    }

    /// Breakpoint on the first line with code after the start of the pending
    /// deferred call, so a step stops inside it when it runs.
    fn set_deferred_breakpoint(&self, g: &G) -> Result<Option<TempBreakpoint<'_>>> {
        let Some(pc) = self.deferred_call_target(g.defer_pc) else {
            return Ok(None);
        };
        match self.process.set_temp_breakpoint(&self.os, pc) {
            Ok(_) => Ok(Some(TempBreakpoint {
                process: &self.process,
                mem: &self.os,
                addr: pc,
                kept: false,
            })),
            Err(err) if err.is_breakpoint_exists() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn deferred_call_target(&self, defer_pc: u64) -> Option<u64> {
        let debug_info = self.process.debug_info();
        let limit = self.process.config().defer_scan_limit;
        let Some(info) = debug_info.pc_to_line(defer_pc) else {
            warn!(thread = %self.id, defer_pc = format_args!("{:#x}", defer_pc), "no line for deferred call");
            return None;
        };

        let mut line = info.line;
        for _ in 0..limit {
            line = line.saturating_add(1);
            if let Some(pc) = debug_info.line_to_pc(&info.file, line) {
                return Some(pc);
            }
        }
        warn!(
            thread = %self.id,
            defer_pc = format_args!("{:#x}", defer_pc),
            limit,
            "no code after deferred call"
        );
        None
    }

    fn cnext(&self, pc: u64, fde: &FrameDescriptor, file: &str) -> Result<()> {
        let mut pcs = self
            .process
            .debug_info()
            .all_pcs_between(fde.begin(), fde.end(), file);
        let ret = self.return_address()?;
        pcs.push(ret);
        self.set_next_temp_breakpoints(pc, &pcs)
    }

    fn set_next_temp_breakpoints(&self, cur: u64, pcs: &[u64]) -> Result<()> {
        for &pc in pcs {
            if pc == cur || pc == cur.wrapping_sub(1) {
                continue;
            }
            match self.process.set_temp_breakpoint(&self.os, pc) {
                Ok(_) => {}
                Err(err) if err.is_breakpoint_exists() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Begin stepping over the current line.
    ///
    /// On return the temporary breakpoints are installed and conditioned on
    /// the current goroutine; the caller resumes the process and calls
    /// [`Thread::finish_step`] on the thread that stops.
    pub fn next_step(&mut self) -> Result<StepOperation> {
        let id = self.process.begin_step()?;
        let g = match self.get_g() {
            Ok(g) => g,
            Err(err) => {
                // Nothing was installed yet
                self.process.cancel_step(&self.os)?;
                return Err(err);
            }
        };

        let mut exiting = false;
        if let Err(err) = self.set_next_breakpoints() {
            match err {
                Error::ThreadBlocked | Error::NoReturnAddr { .. } => {
                    debug!(thread = %self.id, error = %err, "nothing to step over");
                }
                Error::GoroutineExiting { goroutine_id } => exiting = goroutine_id == g.id,
                err => {
                    if let Err(clear_err) = self.process.cancel_step(&self.os) {
                        warn!(thread = %self.id, error = %clear_err, "could not clear temp breakpoints");
                    }
                    return Err(err);
                }
            }
        }

        if !self.process.has_temp_breakpoints() {
            self.process.cancel_step(&self.os)?;
        } else if !exiting {
            self.process.set_step_condition(id, Condition::Goroutine(g.id));
        }

        debug!(thread = %self.id, goroutine = g.id, exiting, "step started");
        Ok(StepOperation {
            id,
            goroutine: g.id,
            exiting,
        })
    }

    /// Complete the stepping operation if this thread stopped on one of its
    /// breakpoints. Returns whether it did.
    pub fn finish_step(&mut self) -> Result<bool> {
        if !self.on_triggered_temp_breakpoint() {
            return Ok(false);
        }
        self.process.cancel_step(&self.os)?;
        Ok(true)
    }
}
