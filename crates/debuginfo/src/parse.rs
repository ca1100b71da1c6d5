//! Deserialization of debug information from the SableDbg binary format

use crate::serialize::{location_code, section_type, tag_code, type_code, MAGIC, VERSION};
use crate::types::{
    DebugInfo, Function, LineFlags, LineRegion, Module, NativeType, SourceFile, StorageLocation,
    TypeTag, VarType, Variable,
};
use std::collections::{HashMap, HashSet};
use std::io::{self, Read};

/// Errors that can occur while parsing debug metadata
///
/// Any of these makes the metadata unit unusable; previously loaded units are
/// unaffected.
#[derive(Debug)]
pub enum MetadataError {
    /// IO error while reading
    Io(io::Error),
    /// Invalid magic bytes
    InvalidMagic,
    /// Unsupported version
    UnsupportedVersion(u16),
    /// Invalid section type
    InvalidSectionType(u8),
    /// Invalid UTF-8 string
    InvalidUtf8,
    /// Unexpected end of data
    UnexpectedEof,
    /// Invalid type tag or location code
    InvalidTypeTag(u8),
    /// A function references a module that was never declared
    UnknownModule(String),
    /// A module with this name was already loaded
    DuplicateModule(String),
    /// A function's secondary entry symbol equals its primary entry
    ConflictingEntry(String),
    /// Two line regions overlap, so an address would map to two lines
    OverlappingRegion(u64),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(e) => write!(f, "IO error: {}", e),
            MetadataError::InvalidMagic => write!(f, "invalid SableDbg magic bytes"),
            MetadataError::UnsupportedVersion(v) => write!(f, "unsupported version: {}", v),
            MetadataError::InvalidSectionType(t) => write!(f, "invalid section type: 0x{:02x}", t),
            MetadataError::InvalidUtf8 => write!(f, "invalid UTF-8 string"),
            MetadataError::UnexpectedEof => write!(f, "unexpected end of data"),
            MetadataError::InvalidTypeTag(t) => write!(f, "invalid type tag: 0x{:02x}", t),
            MetadataError::UnknownModule(name) => {
                write!(f, "function references unknown module: {}", name)
            }
            MetadataError::DuplicateModule(name) => {
                write!(f, "module already loaded: {}", name)
            }
            MetadataError::ConflictingEntry(name) => {
                write!(f, "secondary entry equals primary entry for: {}", name)
            }
            MetadataError::OverlappingRegion(addr) => {
                write!(f, "line regions overlap at address 0x{:x}", addr)
            }
        }
    }
}

impl std::error::Error for MetadataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetadataError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MetadataError {
    fn from(e: io::Error) -> Self {
        MetadataError::Io(e)
    }
}

/// Read debug info from the SableDbg binary format
pub fn parse_sabledbg<R: Read>(reader: &mut R) -> Result<DebugInfo, MetadataError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != *MAGIC {
        return Err(MetadataError::InvalidMagic);
    }

    let mut version_bytes = [0u8; 2];
    reader.read_exact(&mut version_bytes)?;
    let version = u16::from_le_bytes(version_bytes);
    if version != VERSION {
        return Err(MetadataError::UnsupportedVersion(version));
    }

    // Skip reserved flags
    let mut flags_bytes = [0u8; 2];
    reader.read_exact(&mut flags_bytes)?;

    let mut section_count_bytes = [0u8; 4];
    reader.read_exact(&mut section_count_bytes)?;
    let section_count = u32::from_le_bytes(section_count_bytes);

    let mut debug_info = DebugInfo::default();
    let mut functions: Vec<Function> = Vec::new();

    for _ in 0..section_count {
        let mut section_type_byte = [0u8; 1];
        reader.read_exact(&mut section_type_byte)?;

        let mut section_size_bytes = [0u8; 4];
        reader.read_exact(&mut section_size_bytes)?;
        let section_size = u32::from_le_bytes(section_size_bytes) as usize;

        let mut section_data = vec![0u8; section_size];
        reader.read_exact(&mut section_data)?;

        match section_type_byte[0] {
            section_type::SOURCE => {
                debug_info.sources = read_source_section(&section_data)?;
            }
            section_type::MODULE => {
                debug_info.modules = read_module_section(&section_data)?;
            }
            section_type::FUNCTION => {
                functions = read_function_section(&section_data)?;
            }
            section_type::LINE => {
                debug_info.line_table.regions = read_line_section(&section_data)?;
            }
            t => return Err(MetadataError::InvalidSectionType(t)),
        }
    }

    attach_functions(&mut debug_info.modules, functions)?;
    validate_regions(&mut debug_info.line_table.regions)?;

    Ok(debug_info)
}

fn read_u8(data: &[u8], offset: &mut usize) -> Result<u8, MetadataError> {
    if *offset + 1 > data.len() {
        return Err(MetadataError::UnexpectedEof);
    }
    let v = data[*offset];
    *offset += 1;
    Ok(v)
}

fn read_u32(data: &[u8], offset: &mut usize) -> Result<u32, MetadataError> {
    if *offset + 4 > data.len() {
        return Err(MetadataError::UnexpectedEof);
    }
    let v = u32::from_le_bytes([
        data[*offset],
        data[*offset + 1],
        data[*offset + 2],
        data[*offset + 3],
    ]);
    *offset += 4;
    Ok(v)
}

fn read_u64(data: &[u8], offset: &mut usize) -> Result<u64, MetadataError> {
    if *offset + 8 > data.len() {
        return Err(MetadataError::UnexpectedEof);
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[*offset..*offset + 8]);
    *offset += 8;
    Ok(u64::from_le_bytes(bytes))
}

fn read_string(data: &[u8], offset: &mut usize) -> Result<String, MetadataError> {
    let len = read_u32(data, offset)? as usize;
    if *offset + len > data.len() {
        return Err(MetadataError::UnexpectedEof);
    }
    let s = std::str::from_utf8(&data[*offset..*offset + len])
        .map_err(|_| MetadataError::InvalidUtf8)?
        .to_string();
    *offset += len;
    Ok(s)
}

fn read_source_section(data: &[u8]) -> Result<Vec<SourceFile>, MetadataError> {
    let mut offset = 0;
    let count = read_u32(data, &mut offset)?;
    let mut sources = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let id = read_u32(data, &mut offset)?;
        let path = read_string(data, &mut offset)?;
        sources.push(SourceFile { id, path });
    }
    Ok(sources)
}

fn read_variable(data: &[u8], offset: &mut usize) -> Result<Variable, MetadataError> {
    let name = read_string(data, offset)?;
    let qualified_name = read_string(data, offset)?;

    let ty = match read_u8(data, offset)? {
        type_code::INT64 => VarType::Native(NativeType::Int64),
        type_code::UINT64 => VarType::Native(NativeType::UInt64),
        type_code::BOOL => VarType::Native(NativeType::Bool),
        type_code::FLOAT64 => VarType::Native(NativeType::Float64),
        type_code::POINTER => VarType::Native(NativeType::Pointer),
        type_code::DYNAMIC => VarType::Dynamic,
        t => return Err(MetadataError::InvalidTypeTag(t)),
    };

    let loc_code = read_u8(data, offset)?;
    let payload = read_u64(data, offset)?;
    let location = match loc_code {
        location_code::REGISTER => StorageLocation::Register(payload as u16),
        location_code::FRAME_SLOT => StorageLocation::FrameSlot(payload as i64 as i32),
        location_code::ABSOLUTE => StorageLocation::Absolute(payload),
        t => return Err(MetadataError::InvalidTypeTag(t)),
    };

    Ok(Variable {
        name,
        qualified_name,
        ty,
        location,
    })
}

fn read_module_section(data: &[u8]) -> Result<Vec<Module>, MetadataError> {
    let mut offset = 0;
    let count = read_u32(data, &mut offset)?;
    let mut modules = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = read_string(data, &mut offset)?;
        let global_count = read_u32(data, &mut offset)?;
        let mut globals = HashMap::new();
        for _ in 0..global_count {
            let var = read_variable(data, &mut offset)?;
            globals.insert(var.name.clone(), var);
        }
        modules.push(Module {
            name,
            globals,
            functions: Vec::new(),
        });
    }
    Ok(modules)
}

fn read_function_section(data: &[u8]) -> Result<Vec<Function>, MetadataError> {
    let mut offset = 0;
    let count = read_u32(data, &mut offset)?;
    let mut functions = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let qualified_name = read_string(data, &mut offset)?;
        let module = read_string(data, &mut offset)?;
        let entry = read_string(data, &mut offset)?;
        let quill_entry = match read_u8(data, &mut offset)? {
            0 => None,
            _ => Some(read_string(data, &mut offset)?),
        };
        let result = match read_u8(data, &mut offset)? {
            tag_code::NATIVE => TypeTag::Native,
            tag_code::DYNAMIC => TypeTag::Dynamic,
            t => return Err(MetadataError::InvalidTypeTag(t)),
        };
        let lineno = read_u32(data, &mut offset)?;

        let local_count = read_u32(data, &mut offset)?;
        let mut locals = HashMap::new();
        for _ in 0..local_count {
            let var = read_variable(data, &mut offset)?;
            locals.insert(var.name.clone(), var);
        }

        let step_into_count = read_u32(data, &mut offset)?;
        let mut step_into = HashSet::new();
        for _ in 0..step_into_count {
            step_into.insert(read_string(data, &mut offset)?);
        }

        let name = qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(&qualified_name)
            .to_string();

        functions.push(Function {
            qualified_name,
            name,
            module,
            entry,
            quill_entry,
            result,
            lineno,
            locals,
            step_into,
        });
    }
    Ok(functions)
}

fn read_line_section(data: &[u8]) -> Result<Vec<LineRegion>, MetadataError> {
    let mut offset = 0;
    let count = read_u32(data, &mut offset)?;
    let mut regions = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let file_id = read_u32(data, &mut offset)?;
        let line = read_u32(data, &mut offset)?;
        let start = read_u64(data, &mut offset)?;
        let end = read_u64(data, &mut offset)?;
        let flags = LineFlags::from_bits_truncate(read_u8(data, &mut offset)?);
        regions.push(LineRegion {
            file_id,
            line,
            start,
            end,
            flags,
        });
    }
    Ok(regions)
}

/// Attach parsed functions to their owning modules.
///
/// Fails if a function references a module that was never declared, or if its
/// secondary entry symbol equals the primary one.
fn attach_functions(
    modules: &mut [Module],
    functions: Vec<Function>,
) -> Result<(), MetadataError> {
    for func in functions {
        if func.quill_entry.as_deref() == Some(func.entry.as_str()) {
            return Err(MetadataError::ConflictingEntry(func.qualified_name));
        }
        let module = modules
            .iter_mut()
            .find(|m| m.name == func.module)
            .ok_or_else(|| MetadataError::UnknownModule(func.module.clone()))?;
        module.functions.push(func);
    }
    Ok(())
}

/// Sort regions by start address and reject overlaps.
fn validate_regions(regions: &mut Vec<LineRegion>) -> Result<(), MetadataError> {
    regions.sort_by_key(|r| r.start);
    for pair in regions.windows(2) {
        if pair[1].start < pair[0].end {
            return Err(MetadataError::OverlappingRegion(pair[1].start));
        }
    }
    Ok(())
}
