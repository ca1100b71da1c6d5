//! Debug information builder
//!
//! Programmatic construction of [`DebugInfo`], used by the compiler back end
//! and by tests that need fixtures without going through the binary format.

use crate::types::{
    DebugInfo, Function, LineFlags, LineRegion, LineTable, Module, SourceFile, StorageLocation,
    TypeTag, VarType, Variable,
};
use std::collections::{HashMap, HashSet};

/// Builder for constructing [`DebugInfo`]
#[derive(Debug, Default)]
pub struct DebugInfoBuilder {
    /// Source file IDs by path
    source_ids: HashMap<String, u32>,
    /// Source files in order
    sources: Vec<SourceFile>,
    /// Modules in declaration order
    modules: Vec<Module>,
    /// Line regions accumulated so far
    regions: Vec<LineRegion>,
    /// Index of the module being built
    current_module: Option<usize>,
}

impl DebugInfoBuilder {
    /// Create a new debug info builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source file, returns its ID
    ///
    /// If the source was already added, returns the existing ID.
    pub fn add_source(&mut self, path: &str) -> u32 {
        if let Some(&id) = self.source_ids.get(path) {
            return id;
        }
        let id = self.sources.len() as u32;
        self.sources.push(SourceFile {
            id,
            path: path.to_string(),
        });
        self.source_ids.insert(path.to_string(), id);
        id
    }

    /// Begin a new module; subsequent globals and functions land in it.
    pub fn begin_module(&mut self, name: &str) {
        self.modules.push(Module {
            name: name.to_string(),
            globals: HashMap::new(),
            functions: Vec::new(),
        });
        self.current_module = Some(self.modules.len() - 1);
    }

    /// Add a module-level variable to the current module.
    ///
    /// Panics if no module has been begun.
    pub fn add_global(&mut self, name: &str, ty: VarType, location: StorageLocation) {
        let module = &mut self.modules[self.current_module.expect("no current module")];
        let var = Variable {
            name: name.to_string(),
            qualified_name: format!("{}.{}", module.name, name),
            ty,
            location,
        };
        module.globals.insert(var.name.clone(), var);
    }

    /// Add a function to the current module, returning a handle for filling
    /// in its optional parts.
    ///
    /// Panics if no module has been begun.
    pub fn add_function(
        &mut self,
        qualified_name: &str,
        entry: &str,
        result: TypeTag,
        lineno: u32,
    ) -> FunctionHandle<'_> {
        let module = &mut self.modules[self.current_module.expect("no current module")];
        let name = qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(qualified_name)
            .to_string();
        module.functions.push(Function {
            qualified_name: qualified_name.to_string(),
            name,
            module: module.name.clone(),
            entry: entry.to_string(),
            quill_entry: None,
            result,
            lineno,
            locals: HashMap::new(),
            step_into: HashSet::new(),
        });
        let func = module.functions.last_mut().unwrap();
        FunctionHandle { func }
    }

    /// Record a native code region for a logical source line.
    pub fn add_line_region(&mut self, file_id: u32, line: u32, start: u64, end: u64, flags: LineFlags) {
        self.regions.push(LineRegion {
            file_id,
            line,
            start,
            end,
            flags,
        });
    }

    /// Finish building, producing the debug info with a sorted line table.
    pub fn finish(mut self) -> DebugInfo {
        self.regions.sort_by_key(|r| r.start);
        DebugInfo {
            sources: self.sources,
            modules: self.modules,
            line_table: LineTable {
                regions: self.regions,
            },
        }
    }
}

/// Handle for filling in the optional parts of a function being built
pub struct FunctionHandle<'a> {
    func: &'a mut Function,
}

impl FunctionHandle<'_> {
    /// Set the secondary (Quill calling convention) entry symbol.
    pub fn quill_entry(&mut self, symbol: &str) -> &mut Self {
        self.func.quill_entry = Some(symbol.to_string());
        self
    }

    /// Declare a local variable.
    pub fn local(&mut self, name: &str, ty: VarType, location: StorageLocation) -> &mut Self {
        let var = Variable {
            name: name.to_string(),
            qualified_name: format!("{}.{}", self.func.qualified_name, name),
            ty,
            location,
        };
        self.func.locals.insert(var.name.clone(), var);
        self
    }

    /// Add a native helper symbol to the step-into set.
    pub fn step_into(&mut self, symbol: &str) -> &mut Self {
        self.func.step_into.insert(symbol.to_string());
        self
    }
}
