//! Fake target shared by the integration tests

#![allow(dead_code)]

use debuginfo::{DebugInfo, DebugInfoBuilder, Field, LineFlags, TypeDesc, TypeKind};
use gostep_proc::{
    Arch, Error, Location, Process, Registers, Result, Stackframe, ThreadIo, Unwinder,
    ValueDecoder, Variable, G,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const MAIN_GO: &str = "/work/svc/server.go";
pub const ASM: &str = "/usr/lib/go/src/runtime/asm_amd64.s";

pub const SP: u64 = 0xc000_0100;
pub const TLS: u64 = 0x7f00_0000;
pub const GADDR: u64 = 0xc000_2000;

/// `defer` target: line 42 has no statement, line 43 starts at 0x640
pub const DEFER_PC: u64 = 0x600;
pub const LINE_43_PC: u64 = 0x640;

/// Inside main.worker, whose frame has no line table rows
pub const WORKER_PC: u64 = 0x410;
/// Inside runtime.goexit
pub const GOEXIT_RET: u64 = 0x804;

pub fn debug_info() -> DebugInfo {
    let mut b = DebugInfoBuilder::new();
    let src = b.add_source(MAIN_GO);
    let asm = b.add_source(ASM);
    let stmt = LineFlags::STATEMENT;

    b.add_function("main.handle", 0x100, 0x200);
    b.add_line(0x110, src, 11, stmt);
    b.add_line(0x130, src, 12, stmt);
    b.add_line(0x150, src, 13, stmt);
    b.add_line(0x200, src, 13, LineFlags::END_SEQUENCE);

    b.add_function("main.serve", 0x280, 0x380);
    b.add_line(0x280, src, 30, stmt);
    b.add_line(0x300, src, 31, stmt);
    b.add_line(0x380, src, 31, LineFlags::END_SEQUENCE);

    // The only row before main.worker's frame belongs to no function
    b.add_function("main.worker", 0x400, 0x440);
    b.add_line(0x3f0, src, 50, stmt);
    b.add_line(0x440, src, 50, LineFlags::END_SEQUENCE);

    b.add_function("main.handle.func1", 0x600, 0x680);
    b.add_line(0x600, src, 42, LineFlags::empty());
    b.add_line(LINE_43_PC, src, 43, stmt);
    b.add_line(0x680, src, 43, LineFlags::END_SEQUENCE);

    b.add_function("runtime.goexit", 0x800, 0x810);
    b.add_line(0x800, asm, 1650, stmt);
    b.add_line(0x810, asm, 1650, LineFlags::END_SEQUENCE);

    b.add_type(TypeDesc {
        name: "runtime.g".to_string(),
        size: 16,
        kind: TypeKind::Struct(vec![
            Field {
                name: "goid".to_string(),
                offset: 0,
                size: 8,
            },
            Field {
                name: "deferpc".to_string(),
                offset: 8,
                size: 8,
            },
        ]),
    });
    b.build()
}

pub fn process_for(arch: Arch) -> Arc<Process> {
    arch.set_g_struct_offset((-16i64) as u64);
    let debug_info = Arc::new(debug_info());
    Arc::new(Process::new(
        arch,
        debug_info.clone(),
        Box::new(FakeDecoder),
        Box::new(FakeUnwinder { debug_info }),
    ))
}

pub fn process() -> Arc<Process> {
    process_for(Arch::amd64())
}

fn read_word(io: &dyn ThreadIo, addr: u64) -> Result<u64> {
    let bytes = io.read_memory(addr, 8)?;
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes);
    Ok(u64::from_le_bytes(word))
}

/// Return addresses live in consecutive words from SP up to a zero word.
pub struct FakeUnwinder {
    debug_info: Arc<DebugInfo>,
}

impl Unwinder for FakeUnwinder {
    fn stacktrace(&self, io: &dyn ThreadIo, depth: usize) -> Result<Vec<Stackframe>> {
        let regs = io.registers()?;
        let mut frames = vec![Stackframe {
            location: Location::resolve(self.debug_info.as_ref(), regs.pc),
            cfa: regs.sp + 8,
        }];
        for i in 0..depth as u64 {
            let ret = read_word(io, regs.sp + 8 * i)?;
            if ret == 0 {
                break;
            }
            frames.push(Stackframe {
                location: Location::resolve(self.debug_info.as_ref(), ret),
                cfa: regs.sp + 8 * (i + 2),
            });
        }
        Ok(frames)
    }
}

pub struct FakeDecoder;

impl ValueDecoder for FakeDecoder {
    fn parse_g(&self, io: &dyn ThreadIo, var: &Variable) -> Result<G> {
        Ok(G {
            id: read_word(io, var.addr)? as i64,
            defer_pc: read_word(io, var.addr + 8)?,
            ..G::default()
        })
    }
}

#[derive(Default)]
struct Inner {
    regs: Registers,
    memory: HashMap<u64, u8>,
    unmapped: HashSet<u64>,
    blocked: bool,
    /// Bytes at PC each time the thread ran
    executed: Vec<Vec<u8>>,
    /// Where the thread stops after running
    stop_at: Option<u64>,
}

/// Scripted thread with sparse memory; unwritten bytes read as zero.
#[derive(Default)]
pub struct FakeThread {
    inner: Mutex<Inner>,
}

impl FakeThread {
    pub fn at(pc: u64) -> Self {
        let thread = Self::default();
        thread.inner.lock().regs = Registers { pc, sp: SP, tls: 0 };
        thread
    }

    pub fn set_pc_and_sp(&self, pc: u64, sp: u64) {
        let mut inner = self.inner.lock();
        inner.regs.pc = pc;
        inner.regs.sp = sp;
    }

    pub fn with_goroutine(self, goid: i64, defer_pc: u64) -> Self {
        self.set_goroutine(TLS, GADDR, goid, defer_pc);
        self
    }

    pub fn set_goroutine(&self, tls: u64, gaddr: u64, goid: i64, defer_pc: u64) {
        self.inner.lock().regs.tls = tls;
        self.write(tls.wrapping_sub(16), &gaddr.to_le_bytes());
        self.write(gaddr, &(goid as u64).to_le_bytes());
        self.write(gaddr + 8, &defer_pc.to_le_bytes());
    }

    pub fn with_return_addresses(self, addrs: &[u64]) -> Self {
        let sp = self.inner.lock().regs.sp;
        for (i, ret) in addrs.iter().chain(&[0]).enumerate() {
            self.write(sp + 8 * i as u64, &ret.to_le_bytes());
        }
        self
    }

    pub fn set_blocked(&self, blocked: bool) {
        self.inner.lock().blocked = blocked;
    }

    pub fn stop_at(&self, pc: u64) {
        self.inner.lock().stop_at = Some(pc);
    }

    pub fn unmap(&self, addr: u64) {
        self.inner.lock().unmapped.insert(addr);
    }

    pub fn write(&self, addr: u64, data: &[u8]) {
        let mut inner = self.inner.lock();
        for (i, b) in data.iter().enumerate() {
            inner.memory.insert(addr + i as u64, *b);
        }
    }

    pub fn read(&self, addr: u64, size: usize) -> Vec<u8> {
        let inner = self.inner.lock();
        (0..size as u64)
            .map(|i| inner.memory.get(&(addr + i)).copied().unwrap_or(0))
            .collect()
    }

    pub fn executed(&self) -> Vec<Vec<u8>> {
        self.inner.lock().executed.clone()
    }

    fn run(&self, default_stop: Option<u64>) {
        let pc = self.inner.lock().regs.pc;
        let bytes = self.read(pc, 4);
        let mut inner = self.inner.lock();
        inner.executed.push(bytes);
        if let Some(stop) = inner.stop_at.take().or(default_stop) {
            inner.regs.pc = stop;
        }
    }
}

impl ThreadIo for FakeThread {
    fn registers(&self) -> Result<Registers> {
        Ok(self.inner.lock().regs)
    }

    fn set_pc(&self, pc: u64) -> Result<()> {
        self.inner.lock().regs.pc = pc;
        Ok(())
    }

    fn read_memory(&self, addr: u64, size: usize) -> Result<Vec<u8>> {
        {
            let inner = self.inner.lock();
            if let Some(bad) = (addr..addr + size as u64).find(|a| inner.unmapped.contains(a)) {
                return Err(Error::Memory {
                    addr: bad,
                    message: "unmapped".to_string(),
                });
            }
        }
        Ok(self.read(addr, size))
    }

    fn write_memory(&self, addr: u64, data: &[u8]) -> Result<()> {
        self.read_memory(addr, data.len())?;
        self.write(addr, data);
        Ok(())
    }

    fn single_step(&self) -> Result<()> {
        let next = self.inner.lock().regs.pc + 1;
        self.run(Some(next));
        Ok(())
    }

    fn resume_with_signal(&self, _sig: i32) -> Result<()> {
        self.run(None);
        Ok(())
    }

    fn halt(&self) -> Result<()> {
        Ok(())
    }

    fn stopped(&self) -> bool {
        true
    }

    fn blocked(&self) -> bool {
        self.inner.lock().blocked
    }
}
