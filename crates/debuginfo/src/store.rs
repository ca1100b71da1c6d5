//! Read-only store of loaded debug metadata
//!
//! [`DebugStore`] owns every loaded metadata unit for the lifetime of the
//! process. Loading indexes modules, functions, and line regions; afterwards
//! all access is through `&self` lookups, safe for reentrant queries.

use crate::parse::{parse_sabledbg, MetadataError};
use crate::types::{Function, LineRegion, LineTable, Module, SourceFile};
use std::collections::HashMap;
use std::io::Read;

/// Store of all loaded debug information, indexed for lookup
#[derive(Debug, Default)]
pub struct DebugStore {
    /// Loaded modules by qualified name
    modules: HashMap<String, Module>,
    /// Qualified function name -> (module name, index in module.functions)
    by_qualified_name: HashMap<String, (String, usize)>,
    /// Native entry symbol (primary or secondary) -> same coordinates
    by_symbol: HashMap<String, (String, usize)>,
    /// All known source files, deduplicated by path
    sources: Vec<SourceFile>,
    /// Source ID by path
    source_ids: HashMap<String, u32>,
    /// Merged line table across all loaded units, sorted by start address
    line_table: LineTable,
}

impl DebugStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one serialized metadata unit and index it.
    ///
    /// On failure nothing is committed: previously loaded modules stay
    /// usable and unchanged.
    pub fn load<R: Read>(&mut self, reader: &mut R) -> Result<(), MetadataError> {
        let unit = parse_sabledbg(reader)?;

        for module in &unit.modules {
            if self.modules.contains_key(&module.name) {
                return Err(MetadataError::DuplicateModule(module.name.clone()));
            }
        }

        // Remap the unit's source IDs into the store-wide numbering
        let mut id_map: HashMap<u32, u32> = HashMap::new();
        let mut new_sources: Vec<SourceFile> = Vec::new();
        for source in &unit.sources {
            let global_id = match self.source_ids.get(&source.path) {
                Some(&id) => id,
                None => {
                    let id = (self.sources.len() + new_sources.len()) as u32;
                    new_sources.push(SourceFile {
                        id,
                        path: source.path.clone(),
                    });
                    id
                }
            };
            id_map.insert(source.id, global_id);
        }

        let mut merged = self.line_table.regions.clone();
        for region in &unit.line_table.regions {
            let file_id = *id_map.get(&region.file_id).unwrap_or(&region.file_id);
            merged.push(LineRegion {
                file_id,
                ..region.clone()
            });
        }
        merged.sort_by_key(|r| r.start);
        for pair in merged.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(MetadataError::OverlappingRegion(pair[1].start));
            }
        }

        // All checks passed: commit
        for source in new_sources {
            self.source_ids.insert(source.path.clone(), source.id);
            self.sources.push(source);
        }
        self.line_table.regions = merged;
        for module in unit.modules {
            for (idx, func) in module.functions.iter().enumerate() {
                let coords = (module.name.clone(), idx);
                self.by_qualified_name
                    .insert(func.qualified_name.clone(), coords.clone());
                self.by_symbol.insert(func.entry.clone(), coords.clone());
                if let Some(sym) = &func.quill_entry {
                    self.by_symbol.insert(sym.clone(), coords);
                }
            }
            self.modules.insert(module.name.clone(), module);
        }

        Ok(())
    }

    /// Look up a module by qualified name.
    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    /// Iterate over all loaded modules.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// Look up a function by its qualified dotted name.
    pub fn function_by_qualified_name(&self, name: &str) -> Option<&Function> {
        let (module, idx) = self.by_qualified_name.get(name)?;
        Some(&self.modules[module].functions[*idx])
    }

    /// Look up a function by either of its native entry symbols.
    pub fn function_by_symbol(&self, symbol: &str) -> Option<&Function> {
        let (module, idx) = self.by_symbol.get(symbol)?;
        Some(&self.modules[module].functions[*idx])
    }

    /// Map a native address to its logical line.
    pub fn line_for_address(&self, addr: u64) -> Option<u32> {
        self.line_table.line_for_address(addr)
    }

    /// Map a native address to the region containing it.
    pub fn region_for_address(&self, addr: u64) -> Option<&LineRegion> {
        self.line_table.region_for_address(addr)
    }

    /// Resolve a source path to its ID. The path matches exactly or by
    /// suffix, so `codefile.sbl` finds `src/codefile.sbl`.
    pub fn source_id(&self, file: &str) -> Option<u32> {
        if let Some(&id) = self.source_ids.get(file) {
            return Some(id);
        }
        self.sources
            .iter()
            .find(|s| s.path.ends_with(file))
            .map(|s| s.id)
    }

    /// All regions attributed to a logical line of a source file.
    pub fn regions_for_line(&self, file: &str, line: u32) -> Vec<&LineRegion> {
        match self.source_id(file) {
            Some(id) => self.line_table.regions_for_line(id, line),
            None => Vec::new(),
        }
    }
}
