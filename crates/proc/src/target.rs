//! Interfaces to the collaborators that sit below thread control
//!
//! [`ThreadIo`] abstracts over platform-specific thread control (e.g. ptrace on
//! Linux), so the stepping logic stays platform-independent. [`Unwinder`] and
//! [`ValueDecoder`] stand in for the stack unwinder and the typed memory decoder.

use crate::error::Result;
use crate::goroutine::{Variable, G};
use crate::location::Location;
use std::fmt;

/// Identifier of a traced OS thread (thread id or mach port)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub i32);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registers needed for execution control
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    /// Program counter
    pub pc: u64,
    /// Stack pointer
    pub sp: u64,
    /// Base of the thread-local storage block
    pub tls: u64,
}

/// Result of the last wait on a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Stopped by a signal (SIGTRAP for breakpoints and single steps)
    Stopped(i32),
    /// Exited normally with status code
    Exited(i32),
    /// Killed by signal
    Signaled(i32),
    /// Resumed by SIGCONT
    Continued,
}

/// OS-level control of one traced thread.
///
/// All operations act on a thread that the caller has already stopped, except
/// [`ThreadIo::halt`] and the state queries.
pub trait ThreadIo {
    /// Read the registers of the stopped thread.
    fn registers(&self) -> Result<Registers>;

    /// Overwrite the program counter.
    fn set_pc(&self, pc: u64) -> Result<()>;

    /// Read `size` bytes of process memory at `addr`.
    fn read_memory(&self, addr: u64, size: usize) -> Result<Vec<u8>>;

    /// Write process memory at `addr`.
    fn write_memory(&self, addr: u64, data: &[u8]) -> Result<()>;

    /// Execute exactly one instruction and wait for the resulting stop.
    fn single_step(&self) -> Result<()>;

    /// Resume the thread, delivering `sig` (0 for none).
    fn resume_with_signal(&self, sig: i32) -> Result<()>;

    /// Request that the running thread stop.
    fn halt(&self) -> Result<()>;

    /// Whether the thread is stopped at the OS level.
    fn stopped(&self) -> bool;

    /// Whether the thread is parked inside the runtime scheduler.
    fn blocked(&self) -> bool;
}

/// One unwound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stackframe {
    /// Where the frame is currently executing
    pub location: Location,
    /// Canonical frame address
    pub cfa: u64,
}

/// Stack unwinder.
pub trait Unwinder: Send + Sync {
    /// Unwind at most `depth` frames above the innermost one, innermost first.
    fn stacktrace(&self, io: &dyn ThreadIo, depth: usize) -> Result<Vec<Stackframe>>;
}

/// Decoder for typed values in process memory.
pub trait ValueDecoder: Send + Sync {
    /// Decode the goroutine control block that `var` refers to.
    fn parse_g(&self, io: &dyn ThreadIo, var: &Variable) -> Result<G>;
}
