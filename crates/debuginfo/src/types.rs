//! Debug information types for the SableDbg format

use std::collections::{HashMap, HashSet};

/// Complete debug information for one compiled unit
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DebugInfo {
    /// Source files referenced by the debug info
    pub sources: Vec<SourceFile>,
    /// Modules declared in this unit
    pub modules: Vec<Module>,
    /// Line correlation table
    pub line_table: LineTable,
}

/// A source file referenced in debug info
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// Unique ID for this source (index in sources array)
    pub id: u32,
    /// Path or identifier for the source
    pub path: String,
}

/// A compiled Sable module
///
/// Created once when metadata for a compiled unit is loaded; immutable
/// thereafter.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Qualified module name
    pub name: String,
    /// Module-level variables by name
    pub globals: HashMap<String, Variable>,
    /// Functions declared in this module, in declaration order
    pub functions: Vec<Function>,
}

impl Module {
    /// Look up a function declared in this module by qualified name.
    pub fn function(&self, qualified_name: &str) -> Option<&Function> {
        self.functions
            .iter()
            .find(|f| f.qualified_name == qualified_name)
    }
}

/// A compiled Sable function
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Qualified name, module-scoped and dotted for methods
    /// (e.g. `codefile.SomeClass.spam`)
    pub qualified_name: String,
    /// Short name (last dotted component)
    pub name: String,
    /// Name of the owning module
    pub module: String,
    /// Primary native entry symbol, always present
    pub entry: String,
    /// Secondary native entry symbol, present only when the function is also
    /// reachable through the Quill calling convention. Never equals `entry`.
    pub quill_entry: Option<String>,
    /// Whether calls to this function yield a natively-typed or
    /// dynamically-typed result
    pub result: TypeTag,
    /// Source line of the function's definition
    pub lineno: u32,
    /// Local variables declared in the function body, by name
    pub locals: HashMap<String, Variable>,
    /// Native helper symbols the stepper may descend into when stepping
    /// into native code is enabled
    pub step_into: HashSet<String>,
}

impl Function {
    /// Check whether `symbol` is one of this function's native entry symbols.
    pub fn has_entry_symbol(&self, symbol: &str) -> bool {
        self.entry == symbol || self.quill_entry.as_deref() == Some(symbol)
    }

    /// The symbol a breakpoint should resolve to: the Quill-convention entry
    /// when present, otherwise the primary entry.
    pub fn preferred_symbol(&self) -> &str {
        self.quill_entry.as_deref().unwrap_or(&self.entry)
    }
}

/// Type tag for call results and variables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    /// Natively-typed: the raw value is read and formatted directly
    Native,
    /// Dynamically-typed: the raw value is a Quill object handle
    Dynamic,
}

/// Native machine type of a natively-typed variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeType {
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    UInt64,
    /// Boolean (zero = false)
    Bool,
    /// IEEE-754 double, stored as raw bits
    Float64,
    /// Opaque pointer, displayed as hex
    Pointer,
}

/// Full type of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    /// Natively-typed with a concrete machine type
    Native(NativeType),
    /// Dynamically-typed Quill object
    Dynamic,
}

impl VarType {
    /// The coarse native/dynamic tag of this type.
    pub fn tag(&self) -> TypeTag {
        match self {
            VarType::Native(_) => TypeTag::Native,
            VarType::Dynamic => TypeTag::Dynamic,
        }
    }
}

/// Where a variable's current value lives in an active frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageLocation {
    /// General-purpose register by index
    Register(u16),
    /// Offset from the frame base, in bytes (may be negative)
    FrameSlot(i32),
    /// Absolute address (module-level storage)
    Absolute(u64),
}

/// A variable (module global or function local)
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Variable name
    pub name: String,
    /// Module-qualified name (e.g. `codefile.c_var`)
    pub qualified_name: String,
    /// Variable type
    pub ty: VarType,
    /// Storage location, sufficient to read the value from a live frame
    pub location: StorageLocation,
}

bitflags::bitflags! {
    /// Flags for line regions
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LineFlags: u8 {
        /// Statement boundary (good breakpoint location)
        const STATEMENT = 0b0000_0001;
        /// Function prologue code
        const PROLOGUE = 0b0000_0010;
        /// Function epilogue code
        const EPILOGUE = 0b0000_0100;
    }
}

/// One native code region attributed to a logical source line
///
/// Regions are half-open address intervals `[start, end)`. Regions never
/// overlap: every native address maps to at most one logical line. A logical
/// line may own several disjoint regions (loop bodies, duplicated blocks).
#[derive(Debug, Clone, PartialEq)]
pub struct LineRegion {
    /// Source file ID
    pub file_id: u32,
    /// Logical source line (1-based)
    pub line: u32,
    /// First native address of the region
    pub start: u64,
    /// One past the last native address of the region
    pub end: u64,
    /// Region flags
    pub flags: LineFlags,
}

impl LineRegion {
    /// Check whether a native address falls inside this region.
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// Bidirectional table between logical source lines and native code regions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineTable {
    /// All regions, sorted by start address at load time
    pub regions: Vec<LineRegion>,
}

impl LineTable {
    /// Map a native address to the region containing it, if any.
    pub fn region_for_address(&self, addr: u64) -> Option<&LineRegion> {
        self.regions.iter().find(|r| r.contains(addr))
    }

    /// Map a native address to its logical line, if any.
    pub fn line_for_address(&self, addr: u64) -> Option<u32> {
        self.region_for_address(addr).map(|r| r.line)
    }

    /// All regions attributed to a logical line of a source file.
    pub fn regions_for_line(&self, file_id: u32, line: u32) -> Vec<&LineRegion> {
        self.regions
            .iter()
            .filter(|r| r.file_id == file_id && r.line == line)
            .collect()
    }
}
