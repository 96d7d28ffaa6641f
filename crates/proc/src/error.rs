//! Error types for thread control and stepping

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Stepping was requested while the thread is parked in the runtime scheduler.
    #[error("thread is blocked in the scheduler")]
    ThreadBlocked,

    /// The goroutine being stepped is returning into the runtime exit path.
    #[error("goroutine {goroutine_id} is exiting")]
    GoroutineExiting { goroutine_id: i64 },

    #[error("breakpoint exists at {addr:#x}")]
    BreakpointExists { addr: u64 },

    #[error("no breakpoint at {addr:#x}")]
    NoBreakpoint { addr: u64 },

    #[error("next while nexting")]
    StepInProgress,

    #[error("could not find return address for {function}")]
    NoReturnAddr { function: String },

    #[error("could not find frame descriptor for {pc:#x}")]
    NoFrameDescriptor { pc: u64 },

    #[error("could not decode first frame")]
    NoFrames,

    #[error("g struct offset not initialized")]
    GStructOffsetUninitialized,

    #[error("no G executing on thread {thread}")]
    NoG { thread: i32 },

    #[error("could not find type {0}")]
    TypeNotFound(String),

    #[error("memory access error at {addr:#x}: {message}")]
    Memory { addr: u64, message: String },

    #[error("register access error: {0}")]
    Registers(String),

    #[error("thread control error: {0}")]
    Os(String),

    #[error("condition evaluation failed: {0}")]
    Condition(String),

    #[error("could not decode goroutine: {0}")]
    Decode(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_thread_blocked(&self) -> bool {
        matches!(self, Error::ThreadBlocked)
    }

    pub fn is_goroutine_exiting(&self) -> bool {
        matches!(self, Error::GoroutineExiting { .. })
    }

    pub fn is_breakpoint_exists(&self) -> bool {
        matches!(self, Error::BreakpointExists { .. })
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
