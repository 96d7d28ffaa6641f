//! Source locations and evaluation scopes for a stopped thread

use crate::error::{Error, Result};
use crate::target::{ThreadId, ThreadIo};
use crate::thread::Thread;
use debuginfo::{DebugInfoProvider, Function};
use std::fmt;

/// Location of a thread: instruction address, file:line and function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub pc: u64,
    pub file: String,
    pub line: u32,
    pub function: Option<Function>,
}

impl Location {
    /// Resolve `pc` against debug information. Unknown addresses get an empty
    /// file, line 0 and no function.
    pub fn resolve(debug_info: &dyn DebugInfoProvider, pc: u64) -> Self {
        match debug_info.pc_to_line(pc) {
            Some(info) => Location {
                pc,
                file: info.file,
                line: info.line,
                function: info.function,
            },
            None => Location {
                pc,
                file: String::new(),
                line: 0,
                function: None,
            },
        }
    }

    /// Name of the enclosing function, if known
    pub fn function_name(&self) -> Option<&str> {
        self.function.as_ref().map(|f| f.name.as_str())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#x} - {}:{} {}",
            self.pc,
            self.file,
            self.line,
            self.function_name().unwrap_or("")
        )
    }
}

/// Scope in which expressions are evaluated: the innermost frame of a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalScope {
    pub thread: ThreadId,
    pub pc: u64,
    pub cfa: u64,
    pub location: Location,
}

impl<O: ThreadIo> Thread<O> {
    /// Current instruction address plus the file:line and function it belongs to.
    pub fn location(&self) -> Result<Location> {
        let pc = self.pc()?;
        Ok(self.location_for_pc(pc))
    }

    pub(crate) fn location_for_pc(&self, pc: u64) -> Location {
        Location::resolve(self.process.debug_info(), pc)
    }

    /// Evaluation scope for the innermost frame.
    pub fn scope(&self) -> Result<EvalScope> {
        let frames = self.process.unwinder().stacktrace(&self.os, 0)?;
        let frame = frames.into_iter().next().ok_or(Error::NoFrames)?;
        Ok(EvalScope {
            thread: self.id,
            pc: frame.location.pc,
            cfa: frame.cfa,
            location: frame.location,
        })
    }
}
