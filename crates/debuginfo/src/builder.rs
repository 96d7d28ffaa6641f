//! Debug information builder

use crate::types::{DebugInfo, FrameDescriptor, Function, LineEntry, LineFlags, SourceFile, TypeDesc};
use std::collections::HashMap;

/// Builder for constructing DebugInfo
#[derive(Debug, Default)]
pub struct DebugInfoBuilder {
    /// Source files by path
    source_map: HashMap<String, u32>,
    /// Source files in order
    sources: Vec<SourceFile>,
    functions: Vec<Function>,
    line_table: Vec<LineEntry>,
    frames: Vec<FrameDescriptor>,
    types: Vec<TypeDesc>,
}

impl DebugInfoBuilder {
    /// Create a new debug info builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `path` in the source table, interning it on first use.
    pub fn add_source(&mut self, path: &str) -> u32 {
        if let Some(&id) = self.source_map.get(path) {
            return id;
        }
        let id = self.sources.len() as u32;
        self.source_map.insert(path.to_string(), id);
        self.sources.push(SourceFile {
            id,
            path: path.to_string(),
        });
        id
    }

    /// Add a function covering `[entry, end)` together with its frame descriptor
    pub fn add_function(&mut self, name: &str, entry: u64, end: u64) -> u32 {
        let id = self.functions.len() as u32;
        self.functions.push(Function {
            name: name.to_string(),
            entry,
            end,
        });
        self.frames.push(FrameDescriptor::new(entry, end));
        id
    }

    /// Add a function without a frame descriptor
    pub fn add_function_without_frame(&mut self, name: &str, entry: u64, end: u64) -> u32 {
        let id = self.functions.len() as u32;
        self.functions.push(Function {
            name: name.to_string(),
            entry,
            end,
        });
        id
    }

    /// Add a line table row
    pub fn add_line(&mut self, addr: u64, source_id: u32, line: u32, flags: LineFlags) {
        self.line_table.push(LineEntry {
            addr,
            source_id,
            line,
            flags,
        });
    }

    /// Add a type descriptor
    pub fn add_type(&mut self, typ: TypeDesc) {
        self.types.push(typ);
    }

    /// Build the final DebugInfo, with tables ordered by address
    pub fn build(mut self) -> DebugInfo {
        self.functions.sort_by_key(|f| f.entry);
        self.line_table.sort_by_key(|row| row.addr);
        self.frames.sort_by_key(|fde| fde.begin());
        DebugInfo {
            sources: self.sources,
            functions: self.functions,
            line_table: self.line_table,
            frames: self.frames,
            types: self.types,
        }
    }
}
