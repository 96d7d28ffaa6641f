//! Process-wide state shared by all threads of a target

use crate::arch::Arch;
use crate::breakpoints::{Breakpoint, BreakpointTable, Condition, StepId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::target::{ThreadIo, Unwinder, ValueDecoder};
use debuginfo::{DebugInfoProvider, TypeDesc};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, warn};

/// A traced process.
///
/// Threads share one `Process` through an `Arc`. The breakpoint table sits
/// behind a mutex; table updates and the matching memory writes happen under
/// the same lock.
pub struct Process {
    arch: Arch,
    config: Config,
    debug_info: Arc<dyn DebugInfoProvider>,
    decoder: Box<dyn ValueDecoder>,
    unwinder: Box<dyn Unwinder>,
    breakpoints: Mutex<BreakpointTable>,
}

impl Process {
    pub fn new(
        arch: Arch,
        debug_info: Arc<dyn DebugInfoProvider>,
        decoder: Box<dyn ValueDecoder>,
        unwinder: Box<dyn Unwinder>,
    ) -> Self {
        Self {
            arch,
            config: Config::default(),
            debug_info,
            decoder,
            unwinder,
            breakpoints: Mutex::new(BreakpointTable::new()),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn arch(&self) -> &Arch {
        &self.arch
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn debug_info(&self) -> &dyn DebugInfoProvider {
        self.debug_info.as_ref()
    }

    pub fn decoder(&self) -> &dyn ValueDecoder {
        self.decoder.as_ref()
    }

    pub fn unwinder(&self) -> &dyn Unwinder {
        self.unwinder.as_ref()
    }

    pub fn find_type(&self, name: &str) -> Result<TypeDesc> {
        self.debug_info
            .find_type(name)
            .ok_or_else(|| Error::TypeNotFound(name.to_string()))
    }

    pub(crate) fn lock_breakpoints(&self) -> MutexGuard<'_, BreakpointTable> {
        self.breakpoints.lock()
    }

    /// Snapshot of the breakpoint at `addr`
    pub fn breakpoint_at(&self, addr: u64) -> Option<Breakpoint> {
        self.breakpoints.lock().get(addr).cloned()
    }

    /// Snapshot of every breakpoint, lowest address first
    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.lock().iter().cloned().collect()
    }

    /// Install a user breakpoint.
    pub fn set_breakpoint(&self, mem: &dyn ThreadIo, addr: u64) -> Result<Breakpoint> {
        self.insert_breakpoint(mem, addr, false)
    }

    /// Install a temporary breakpoint owned by the active stepping operation.
    pub fn set_temp_breakpoint(&self, mem: &dyn ThreadIo, addr: u64) -> Result<Breakpoint> {
        self.insert_breakpoint(mem, addr, true)
    }

    fn insert_breakpoint(&self, mem: &dyn ThreadIo, addr: u64, temp: bool) -> Result<Breakpoint> {
        let mut table = self.breakpoints.lock();
        if table.is_occupied(addr) {
            return Err(Error::BreakpointExists { addr });
        }

        let trap = self.arch.breakpoint_instruction();
        let original_data = mem.read_memory(addr, trap.len())?;
        mem.write_memory(addr, trap)?;

        let (file, line, function_name) = match self.debug_info.pc_to_line(addr) {
            Some(info) => (
                info.file,
                info.line,
                info.function.map(|f| f.name).unwrap_or_default(),
            ),
            None => (String::new(), 0, String::new()),
        };
        let mut bp = Breakpoint::new(addr, file, line, function_name, temp);
        bp.original_data = original_data;
        if temp {
            bp.step = table.active_step();
        }
        table.insert(bp.clone())?;
        debug!(addr = format_args!("{:#x}", addr), temp, "breakpoint installed");
        Ok(bp)
    }

    /// Remove the breakpoint at `addr` and restore the original bytes.
    pub fn clear_breakpoint(&self, mem: &dyn ThreadIo, addr: u64) -> Result<Breakpoint> {
        let mut table = self.breakpoints.lock();
        let bp = table.get(addr).ok_or(Error::NoBreakpoint { addr })?;
        mem.write_memory(addr, &bp.original_data)?;
        table.remove(addr).ok_or(Error::NoBreakpoint { addr })
    }

    pub fn has_temp_breakpoints(&self) -> bool {
        self.breakpoints.lock().has_temp()
    }

    /// Remove every temporary breakpoint. Entries whose memory could not be
    /// restored stay in the table; the first such error is returned.
    pub fn clear_temp_breakpoints(&self, mem: &dyn ThreadIo) -> Result<()> {
        let mut table = self.breakpoints.lock();
        let mut first_err = None;
        for addr in table.temp_addrs() {
            let restored = match table.get(addr) {
                Some(bp) => mem.write_memory(addr, &bp.original_data),
                None => continue,
            };
            match restored {
                Ok(()) => {
                    table.remove(addr);
                }
                Err(err) => {
                    warn!(addr = format_args!("{:#x}", addr), error = %err, "could not clear temp breakpoint");
                    first_err.get_or_insert(err);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Open a stepping operation.
    pub fn begin_step(&self) -> Result<StepId> {
        self.breakpoints.lock().begin_step()
    }

    /// Close the active stepping operation and drop its temporary breakpoints.
    pub fn cancel_step(&self, mem: &dyn ThreadIo) -> Result<()> {
        let result = self.clear_temp_breakpoints(mem);
        self.breakpoints.lock().end_step();
        result
    }

    pub fn active_step(&self) -> Option<StepId> {
        self.breakpoints.lock().active_step()
    }

    pub(crate) fn set_step_condition(&self, step: StepId, cond: Condition) {
        self.breakpoints.lock().set_step_condition(step, cond);
    }

    pub fn set_condition(&self, addr: u64, cond: Option<Condition>) -> Result<()> {
        let mut table = self.breakpoints.lock();
        let bp = table.get_mut(addr).ok_or(Error::NoBreakpoint { addr })?;
        bp.cond = cond;
        Ok(())
    }

    /// Hold `addr` back from step targets without writing a trap.
    pub(crate) fn reserve(&self, addr: u64) -> bool {
        self.breakpoints.lock().reserve(addr)
    }

    pub(crate) fn release(&self, addr: u64) {
        self.breakpoints.lock().release(addr);
    }

    pub(crate) fn record_hit(&self, addr: u64, goroutine: Option<i64>) {
        self.breakpoints.lock().record_hit(addr, goroutine);
    }

    /// Put the original bytes back while the breakpoint stays in the table.
    /// Returns false if no breakpoint exists at `addr`.
    pub(crate) fn restore_original(&self, mem: &dyn ThreadIo, addr: u64) -> Result<bool> {
        let table = self.breakpoints.lock();
        match table.get(addr) {
            Some(bp) => {
                mem.write_memory(addr, &bp.original_data)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Rewrite the trap at `addr`. A breakpoint removed in the meantime is
    /// left alone.
    pub(crate) fn reinstate(&self, mem: &dyn ThreadIo, addr: u64) -> Result<()> {
        let mut table = self.breakpoints.lock();
        let Some(bp) = table.get_mut(addr) else {
            return Ok(());
        };
        mem.write_memory(addr, self.arch.breakpoint_instruction())?;
        bp.armed = true;
        Ok(())
    }

    pub(crate) fn mark_unarmed(&self, addr: u64) {
        if let Some(bp) = self.breakpoints.lock().get_mut(addr) {
            bp.armed = false;
        }
    }

    /// Addresses whose trap is known to be missing from memory
    pub fn unarmed_breakpoints(&self) -> Vec<u64> {
        self.breakpoints.lock().unarmed()
    }

    /// Retry writing every missing trap. Returns how many were rearmed.
    pub fn rearm_breakpoints(&self, mem: &dyn ThreadIo) -> Result<usize> {
        let mut table = self.breakpoints.lock();
        let trap = self.arch.breakpoint_instruction();
        let mut rearmed = 0;
        for addr in table.unarmed() {
            mem.write_memory(addr, trap)?;
            if let Some(bp) = table.get_mut(addr) {
                bp.armed = true;
            }
            rearmed += 1;
        }
        Ok(rearmed)
    }
}
