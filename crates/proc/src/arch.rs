//! Architecture abstraction for breakpoint traps and goroutine lookup.

use std::sync::atomic::{AtomicU64, Ordering};

/// Architecture-specific information for debugging.
#[derive(Debug)]
pub struct Arch {
    /// Architecture name (e.g. "amd64", "arm64")
    pub name: &'static str,
    /// Size of a pointer in bytes
    pub ptr_size: usize,
    /// Trap instruction written over breakpoint addresses
    breakpoint_instruction: &'static [u8],
    /// Whether the TLS slot holds a pointer to the g pointer instead of the g pointer
    pub deref_g: bool,
    /// Offset of the g pointer from the TLS base; 0 until the runtime is inspected
    g_struct_offset: AtomicU64,
}

/// INT3
static AMD64_BREAKPOINT: [u8; 1] = [0xcc];

/// BRK #0
static ARM64_BREAKPOINT: [u8; 4] = [0x00, 0x00, 0x20, 0xd4];

impl Arch {
    /// x86-64 on Linux and macOS.
    pub fn amd64() -> Self {
        Self {
            name: "amd64",
            ptr_size: 8,
            breakpoint_instruction: &AMD64_BREAKPOINT,
            deref_g: false,
            g_struct_offset: AtomicU64::new(0),
        }
    }

    /// x86-64 on Windows, where the TLS slot points at the g pointer.
    pub fn amd64_windows() -> Self {
        Self {
            deref_g: true,
            ..Self::amd64()
        }
    }

    /// AArch64.
    pub fn arm64() -> Self {
        Self {
            name: "arm64",
            ptr_size: 8,
            breakpoint_instruction: &ARM64_BREAKPOINT,
            deref_g: false,
            g_struct_offset: AtomicU64::new(0),
        }
    }

    pub fn breakpoint_instruction(&self) -> &'static [u8] {
        self.breakpoint_instruction
    }

    /// Number of bytes the PC advances past when a trap fires.
    pub fn breakpoint_size(&self) -> usize {
        self.breakpoint_instruction.len()
    }

    pub fn g_struct_offset(&self) -> u64 {
        self.g_struct_offset.load(Ordering::Acquire)
    }

    /// Record the TLS offset of the g pointer once a thread has been set up far
    /// enough to compute it.
    pub fn set_g_struct_offset(&self, offset: u64) {
        self.g_struct_offset.store(offset, Ordering::Release);
    }
}
