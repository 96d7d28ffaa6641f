//! Resolving the goroutine running on a thread

use crate::error::{Error, Result};
use crate::target::{ThreadId, ThreadIo};
use crate::thread::Thread;
use debuginfo::TypeDesc;

/// Goroutine control block as seen by the debugger
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct G {
    pub id: i64,
    /// Saved PC while descheduled
    pub pc: u64,
    /// Saved SP while descheduled
    pub sp: u64,
    /// PC of the go statement that created the goroutine
    pub go_pc: u64,
    /// Entry of the innermost pending deferred call; 0 if there is none
    pub defer_pc: u64,
    pub status: u64,
    pub wait_reason: String,
    /// Thread currently running the goroutine
    pub thread: Option<ThreadId>,
}

/// A typed value in process memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub addr: u64,
    pub typ: TypeDesc,
}

fn read_uint_le(bytes: &[u8]) -> u64 {
    bytes.iter().rev().fold(0, |acc, b| (acc << 8) | u64::from(*b))
}

impl<O: ThreadIo> Thread<O> {
    /// Variable describing the goroutine control block of this thread.
    ///
    /// The g pointer lives at a fixed offset from the TLS base. On targets where
    /// that slot holds a pointer to the g pointer, the returned variable has
    /// pointer type and must be dereferenced once more.
    pub fn get_g_variable(&self) -> Result<Variable> {
        let arch = self.process.arch();
        let offset = arch.g_struct_offset();
        if offset == 0 {
            return Err(Error::GStructOffsetUninitialized);
        }

        let regs = self.os.registers()?;
        let bytes = self.os.read_memory(regs.tls.wrapping_add(offset), arch.ptr_size)?;
        if bytes.len() != arch.ptr_size {
            return Err(Error::Memory {
                addr: regs.tls.wrapping_add(offset),
                message: format!("short read of {} bytes", bytes.len()),
            });
        }
        self.new_g_variable(read_uint_le(&bytes), arch.deref_g)
    }

    fn new_g_variable(&self, gaddr: u64, deref: bool) -> Result<Variable> {
        let config = self.process.config();
        let typ = self.process.find_type(&config.g_type_name)?;
        if deref {
            Ok(Variable {
                name: String::new(),
                addr: gaddr,
                typ: TypeDesc::pointer_to(typ, self.process.arch().ptr_size as u64),
            })
        } else {
            Ok(Variable {
                name: config.curg_name.clone(),
                addr: gaddr,
                typ,
            })
        }
    }

    /// Goroutine currently running on this thread.
    pub fn get_g(&self) -> Result<G> {
        let var = self.get_g_variable()?;
        if var.addr == 0 {
            return Err(Error::NoG { thread: self.id.0 });
        }
        let gaddr = if var.typ.is_pointer() {
            let size = self.process.arch().ptr_size;
            read_uint_le(&self.os.read_memory(var.addr, size)?)
        } else {
            var.addr
        };
        if gaddr == 0 {
            return Err(Error::NoG { thread: self.id.0 });
        }

        let mut g = self.process.decoder().parse_g(&self.os, &var)?;
        g.thread = Some(self.id);
        Ok(g)
    }
}
