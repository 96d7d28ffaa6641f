//! Goroutine-aware execution control for gostep
//!
//! This crate resumes, single-steps and source-steps the threads of a traced
//! Go process while keeping software breakpoints intact, and resolves the
//! goroutine running on each thread.
//!
//! The main types are:
//! - [`Process`] - Shared process state and the breakpoint table
//! - [`Thread`] - One traced thread and its execution control
//! - [`Breakpoint`] - Software breakpoint with condition and hit counts
//! - [`ThreadIo`] - OS-level thread control implemented per platform

pub mod arch;
pub mod breakpoints;
pub mod config;
pub mod error;
pub mod goroutine;
pub mod location;
pub mod process;
pub mod stepping;
pub mod target;
pub mod thread;


pub use arch::Arch;
pub use breakpoints::{Breakpoint, Condition, ConditionEvaluator, StepId};
pub use config::Config;
pub use error::{Error, Result};
pub use goroutine::{Variable, G};
pub use location::{EvalScope, Location};
pub use process::Process;
pub use stepping::StepOperation;
pub use target::{Registers, Stackframe, ThreadId, ThreadIo, Unwinder, ValueDecoder, WaitStatus};
pub use thread::{ResumeMode, Thread};
