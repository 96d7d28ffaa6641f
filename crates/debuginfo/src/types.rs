//! Debug information tables for a traced executable

/// Complete debug information for a traced program
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DebugInfo {
    /// Source files referenced by the line table
    pub sources: Vec<SourceFile>,
    /// Function table, ordered by entry address
    pub functions: Vec<Function>,
    /// Line table rows, ordered by address
    pub line_table: Vec<LineEntry>,
    /// Frame descriptors, ordered by begin address
    pub frames: Vec<FrameDescriptor>,
    /// Type descriptors reachable by name
    pub types: Vec<TypeDesc>,
}

/// A source file referenced in debug info
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// Unique ID for this source (index in sources array)
    pub id: u32,
    /// Path of the source as recorded by the compiler
    pub path: String,
}

/// A function descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// Fully qualified symbol name, e.g. `main.main` or `runtime.goexit`
    pub name: String,
    /// Address of the first instruction
    pub entry: u64,
    /// One past the address of the last instruction
    pub end: u64,
}

impl Function {
    /// Check whether `pc` lies inside the function body
    pub fn contains(&self, pc: u64) -> bool {
        pc >= self.entry && pc < self.end
    }
}

/// One row of the line table
#[derive(Debug, Clone, PartialEq)]
pub struct LineEntry {
    /// Instruction address
    pub addr: u64,
    /// Source file ID
    pub source_id: u32,
    /// Line number (1-based)
    pub line: u32,
    /// Flags for this row
    pub flags: LineFlags,
}

bitflags::bitflags! {
    /// Flags for line table rows
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LineFlags: u8 {
        /// Recommended breakpoint location for the line
        const STATEMENT = 0b0000_0001;
        /// First instruction after the function prologue
        const PROLOGUE_END = 0b0000_0010;
        /// First instruction of the function epilogue
        const EPILOGUE_BEGIN = 0b0000_0100;
        /// Address one past the end of a contiguous sequence
        const END_SEQUENCE = 0b0000_1000;
    }
}

/// PC range owned by one function activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    begin: u64,
    end: u64,
}

impl FrameDescriptor {
    pub fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }

    pub fn begin(&self) -> u64 {
        self.begin
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Check whether the descriptor covers `pc`
    pub fn cover(&self, pc: u64) -> bool {
        pc >= self.begin && pc < self.end
    }
}

/// Result of resolving a program counter to source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInfo {
    pub file: String,
    pub line: u32,
    pub function: Option<Function>,
}

/// A type descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDesc {
    /// Qualified type name; empty for anonymous pointer types
    pub name: String,
    /// Size in bytes
    pub size: u64,
    pub kind: TypeKind,
}

/// Shape of a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    /// Scalar type with no inner layout
    Base,
    /// Structure with fields at fixed offsets
    Struct(Vec<Field>),
    /// Pointer to another type
    Pointer(Box<TypeDesc>),
}

/// A structure field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    /// Byte offset from the start of the structure
    pub offset: u64,
    /// Size in bytes
    pub size: u64,
}

impl TypeDesc {
    /// Build an anonymous pointer to `pointee`
    pub fn pointer_to(pointee: TypeDesc, ptr_size: u64) -> Self {
        Self {
            name: String::new(),
            size: ptr_size,
            kind: TypeKind::Pointer(Box::new(pointee)),
        }
    }

    /// Look up a structure field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        match &self.kind {
            TypeKind::Struct(fields) => fields.iter().find(|f| f.name == name),
            _ => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer(_))
    }
}
