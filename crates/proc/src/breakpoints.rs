//! Breakpoints and the process-wide breakpoint table

use crate::error::{Error, Result};
use crate::location::EvalScope;
use crate::target::ThreadIo;
use crate::thread::Thread;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Identifier of one stepping operation; temporary breakpoints carry the id of
/// the operation that installed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(pub u64);

/// Predicate evaluated against a stopped thread by an external evaluator.
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, scope: &EvalScope) -> Result<bool>;
}

/// Breakpoint condition
#[derive(Clone)]
pub enum Condition {
    /// True when the stopped thread is running the given goroutine
    Goroutine(i64),
    /// Arbitrary predicate over the innermost frame
    Custom(Arc<dyn ConditionEvaluator>),
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Goroutine(id) => write!(f, "Goroutine({})", id),
            Condition::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// A software breakpoint
#[derive(Debug, Clone)]
pub struct Breakpoint {
    /// Address the trap is written at
    pub addr: u64,
    /// Source file of the address
    pub file: String,
    /// Source line of the address
    pub line: u32,
    /// Function containing the address
    pub function_name: String,
    /// Installed by a stepping operation and removed once that operation ends
    pub temp: bool,
    /// Stepping operation owning a temporary breakpoint
    pub step: Option<StepId>,
    /// Hits per goroutine id
    pub hit_count: HashMap<i64, u64>,
    pub total_hit_count: u64,
    /// Evaluated on every stop; absent means always true
    pub cond: Option<Condition>,
    /// Bytes replaced by the trap instruction
    pub original_data: Vec<u8>,
    /// False while the trap is known to be missing from memory
    pub armed: bool,
}

impl Breakpoint {
    pub fn new(addr: u64, file: String, line: u32, function_name: String, temp: bool) -> Self {
        Self {
            addr,
            file,
            line,
            function_name,
            temp,
            step: None,
            hit_count: HashMap::new(),
            total_hit_count: 0,
            cond: None,
            original_data: Vec::new(),
            armed: true,
        }
    }

    /// Evaluate the condition against a thread stopped at this breakpoint.
    pub fn check_condition<O: ThreadIo>(&self, thread: &Thread<O>) -> Result<bool> {
        match &self.cond {
            None => Ok(true),
            Some(Condition::Goroutine(id)) => Ok(thread.get_g()?.id == *id),
            Some(Condition::Custom(evaluator)) => evaluator.evaluate(&thread.scope()?),
        }
    }
}

/// Address-keyed breakpoint table; at most one breakpoint per address.
#[derive(Debug, Default)]
pub(crate) struct BreakpointTable {
    breakpoints: BTreeMap<u64, Breakpoint>,
    /// Addresses held back from step targets without writing a trap
    reserved: BTreeSet<u64>,
    active_step: Option<StepId>,
    next_step: u64,
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, addr: u64) -> Option<&Breakpoint> {
        self.breakpoints.get(&addr)
    }

    pub fn get_mut(&mut self, addr: u64) -> Option<&mut Breakpoint> {
        self.breakpoints.get_mut(&addr)
    }

    /// Whether the address holds a breakpoint or a reservation
    pub fn is_occupied(&self, addr: u64) -> bool {
        self.breakpoints.contains_key(&addr) || self.is_reserved(addr)
    }

    pub fn insert(&mut self, bp: Breakpoint) -> Result<()> {
        if self.is_occupied(bp.addr) {
            return Err(Error::BreakpointExists { addr: bp.addr });
        }
        self.breakpoints.insert(bp.addr, bp);
        Ok(())
    }

    pub fn remove(&mut self, addr: u64) -> Option<Breakpoint> {
        self.breakpoints.remove(&addr)
    }

    /// Breakpoints in ascending address order
    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.values()
    }

    pub fn temp_addrs(&self) -> Vec<u64> {
        self.iter().filter(|bp| bp.temp).map(|bp| bp.addr).collect()
    }

    pub fn has_temp(&self) -> bool {
        self.iter().any(|bp| bp.temp)
    }

    /// First temporary breakpoint, restricted to the active stepping operation
    /// when there is one.
    pub fn first_temp(&self) -> Option<&Breakpoint> {
        self.iter()
            .filter(|bp| bp.temp)
            .find(|bp| self.active_step.is_none() || bp.step == self.active_step)
    }

    /// Returns false if the address is already occupied.
    pub fn reserve(&mut self, addr: u64) -> bool {
        if self.is_occupied(addr) {
            return false;
        }
        self.reserved.insert(addr)
    }

    pub fn release(&mut self, addr: u64) {
        self.reserved.remove(&addr);
    }

    pub fn is_reserved(&self, addr: u64) -> bool {
        self.reserved.contains(&addr)
    }

    /// Open a stepping operation. Fails while another one is active or any
    /// temporary breakpoint is still installed.
    pub fn begin_step(&mut self) -> Result<StepId> {
        if self.active_step.is_some() || self.has_temp() {
            return Err(Error::StepInProgress);
        }
        self.next_step += 1;
        let id = StepId(self.next_step);
        self.active_step = Some(id);
        Ok(id)
    }

    pub fn end_step(&mut self) {
        self.active_step = None;
    }

    pub fn active_step(&self) -> Option<StepId> {
        self.active_step
    }

    /// Attach `cond` to every temporary breakpoint owned by `step`
    pub fn set_step_condition(&mut self, step: StepId, cond: Condition) {
        for bp in self.breakpoints.values_mut() {
            if bp.temp && bp.step == Some(step) {
                bp.cond = Some(cond.clone());
            }
        }
    }

    /// Count a condition-true stop.
    pub fn record_hit(&mut self, addr: u64, goroutine: Option<i64>) {
        if let Some(bp) = self.breakpoints.get_mut(&addr) {
            if let Some(id) = goroutine {
                *bp.hit_count.entry(id).or_insert(0) += 1;
            }
            bp.total_hit_count += 1;
        }
    }

    pub fn unarmed(&self) -> Vec<u64> {
        self.iter().filter(|bp| !bp.armed).map(|bp| bp.addr).collect()
    }
}
