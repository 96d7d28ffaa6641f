//! Query interface over debug information
//!
//! The [`DebugInfoProvider`] trait is what the execution-control core consumes.
//! [`DebugInfo`] implements it over in-memory tables; other backends (for example
//! a DWARF reader) can implement it the same way.

use crate::types::{
    DebugInfo, FrameDescriptor, Function, LineEntry, LineFlags, LineInfo, SourceFile, TypeDesc,
};

/// Read-only debug information queries used while controlling threads.
pub trait DebugInfoProvider: Send + Sync {
    /// Resolve a program counter to file, line and enclosing function.
    fn pc_to_line(&self, pc: u64) -> Option<LineInfo>;

    /// Lowest statement address for `file:line`, if the line has code.
    fn line_to_pc(&self, file: &str, line: u32) -> Option<u64>;

    /// Function whose body contains `pc`.
    fn pc_to_func(&self, pc: u64) -> Option<Function>;

    /// Function with the given qualified name.
    fn lookup_func(&self, name: &str) -> Option<Function>;

    /// Every line-table address of `file` in `[begin, end)`, ascending and deduplicated.
    fn all_pcs_between(&self, begin: u64, end: u64, file: &str) -> Vec<u64>;

    /// Frame descriptor covering `pc`.
    fn fde_for_pc(&self, pc: u64) -> Option<FrameDescriptor>;

    /// Type descriptor with the given qualified name.
    fn find_type(&self, name: &str) -> Option<TypeDesc>;
}

impl DebugInfo {
    fn source(&self, id: u32) -> Option<&SourceFile> {
        self.sources.iter().find(|s| s.id == id)
    }

    fn source_by_path(&self, path: &str) -> Option<&SourceFile> {
        self.sources.iter().find(|s| s.path == path)
    }

    /// Find the row describing `pc`: the one with the largest address <= pc
    fn row_for_pc(&self, pc: u64) -> Option<&LineEntry> {
        let mut best: Option<&LineEntry> = None;
        for row in &self.line_table {
            if row.addr <= pc && best.map_or(true, |b| row.addr >= b.addr) {
                best = Some(row);
            }
        }
        best.filter(|row| !row.flags.contains(LineFlags::END_SEQUENCE))
    }
}

impl DebugInfoProvider for DebugInfo {
    fn pc_to_line(&self, pc: u64) -> Option<LineInfo> {
        let row = self.row_for_pc(pc)?;
        let source = self.source(row.source_id)?;
        Some(LineInfo {
            file: source.path.clone(),
            line: row.line,
            function: self.pc_to_func(pc),
        })
    }

    fn line_to_pc(&self, file: &str, line: u32) -> Option<u64> {
        let source_id = self.source_by_path(file)?.id;
        self.line_table
            .iter()
            .filter(|row| {
                row.source_id == source_id
                    && row.line == line
                    && row.flags.contains(LineFlags::STATEMENT)
            })
            .map(|row| row.addr)
            .min()
    }

    fn pc_to_func(&self, pc: u64) -> Option<Function> {
        self.functions.iter().find(|f| f.contains(pc)).cloned()
    }

    fn lookup_func(&self, name: &str) -> Option<Function> {
        self.functions.iter().find(|f| f.name == name).cloned()
    }

    fn all_pcs_between(&self, begin: u64, end: u64, file: &str) -> Vec<u64> {
        let source_id = match self.source_by_path(file) {
            Some(s) => s.id,
            None => return Vec::new(),
        };

        let mut pcs: Vec<u64> = self
            .line_table
            .iter()
            .filter(|row| {
                row.source_id == source_id
                    && row.addr >= begin
                    && row.addr < end
                    && !row.flags.contains(LineFlags::END_SEQUENCE)
            })
            .map(|row| row.addr)
            .collect();
        pcs.sort_unstable();
        pcs.dedup();
        pcs
    }

    fn fde_for_pc(&self, pc: u64) -> Option<FrameDescriptor> {
        self.frames.iter().find(|fde| fde.cover(pc)).copied()
    }

    fn find_type(&self, name: &str) -> Option<TypeDesc> {
        self.types.iter().find(|t| t.name == name).cloned()
    }
}
