//! Serialization of debug information to the SableDbg binary format

use crate::types::{DebugInfo, Function, LineRegion, Module, SourceFile, TypeTag, Variable};
use crate::types::{NativeType, StorageLocation, VarType};
use std::io::{self, Write};

/// Magic bytes for the SableDbg format: "SBDG"
pub const MAGIC: &[u8; 4] = b"SBDG";

/// Current format version
pub const VERSION: u16 = 1;

/// Section type identifiers
pub mod section_type {
    pub const SOURCE: u8 = 0x01;
    pub const MODULE: u8 = 0x02;
    pub const FUNCTION: u8 = 0x03;
    pub const LINE: u8 = 0x04;
}

/// Wire codes for variable types
pub mod type_code {
    pub const INT64: u8 = 0x00;
    pub const UINT64: u8 = 0x01;
    pub const BOOL: u8 = 0x02;
    pub const FLOAT64: u8 = 0x03;
    pub const POINTER: u8 = 0x04;
    pub const DYNAMIC: u8 = 0x05;
}

/// Wire codes for storage locations
pub mod location_code {
    pub const REGISTER: u8 = 0x00;
    pub const FRAME_SLOT: u8 = 0x01;
    pub const ABSOLUTE: u8 = 0x02;
}

/// Wire codes for result type tags
pub mod tag_code {
    pub const NATIVE: u8 = 0x00;
    pub const DYNAMIC: u8 = 0x01;
}

/// Write debug info to the SableDbg binary format
pub fn write_sabledbg<W: Write>(debug_info: &DebugInfo, writer: &mut W) -> io::Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    writer.write_all(&0u16.to_le_bytes())?; // Flags (reserved)

    // Count non-empty sections
    let mut section_count = 0u32;
    if !debug_info.sources.is_empty() {
        section_count += 1;
    }
    if !debug_info.modules.is_empty() {
        section_count += 1;
    }
    if debug_info.modules.iter().any(|m| !m.functions.is_empty()) {
        section_count += 1;
    }
    if !debug_info.line_table.regions.is_empty() {
        section_count += 1;
    }
    writer.write_all(&section_count.to_le_bytes())?;

    if !debug_info.sources.is_empty() {
        let data = encode_source_section(&debug_info.sources);
        write_section(writer, section_type::SOURCE, &data)?;
    }
    if !debug_info.modules.is_empty() {
        let data = encode_module_section(&debug_info.modules);
        write_section(writer, section_type::MODULE, &data)?;
    }
    if debug_info.modules.iter().any(|m| !m.functions.is_empty()) {
        let data = encode_function_section(&debug_info.modules);
        write_section(writer, section_type::FUNCTION, &data)?;
    }
    if !debug_info.line_table.regions.is_empty() {
        let data = encode_line_section(&debug_info.line_table.regions);
        write_section(writer, section_type::LINE, &data)?;
    }

    Ok(())
}

fn write_section<W: Write>(writer: &mut W, ty: u8, data: &[u8]) -> io::Result<()> {
    writer.write_all(&[ty])?;
    writer.write_all(&(data.len() as u32).to_le_bytes())?;
    writer.write_all(data)?;
    Ok(())
}

fn push_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn push_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn push_string(buf: &mut Vec<u8>, s: &str) {
    push_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn encode_source_section(sources: &[SourceFile]) -> Vec<u8> {
    let mut buf = Vec::new();
    push_u32(&mut buf, sources.len() as u32);
    for source in sources {
        push_u32(&mut buf, source.id);
        push_string(&mut buf, &source.path);
    }
    buf
}

fn encode_variable(buf: &mut Vec<u8>, var: &Variable) {
    push_string(buf, &var.name);
    push_string(buf, &var.qualified_name);
    let ty = match var.ty {
        VarType::Native(NativeType::Int64) => type_code::INT64,
        VarType::Native(NativeType::UInt64) => type_code::UINT64,
        VarType::Native(NativeType::Bool) => type_code::BOOL,
        VarType::Native(NativeType::Float64) => type_code::FLOAT64,
        VarType::Native(NativeType::Pointer) => type_code::POINTER,
        VarType::Dynamic => type_code::DYNAMIC,
    };
    buf.push(ty);
    match var.location {
        StorageLocation::Register(r) => {
            buf.push(location_code::REGISTER);
            push_u64(buf, r as u64);
        }
        StorageLocation::FrameSlot(off) => {
            buf.push(location_code::FRAME_SLOT);
            push_u64(buf, off as i64 as u64);
        }
        StorageLocation::Absolute(addr) => {
            buf.push(location_code::ABSOLUTE);
            push_u64(buf, addr);
        }
    }
}

fn encode_module_section(modules: &[Module]) -> Vec<u8> {
    let mut buf = Vec::new();
    push_u32(&mut buf, modules.len() as u32);
    for module in modules {
        push_string(&mut buf, &module.name);
        // Globals are written in sorted order so output is deterministic
        let mut names: Vec<&String> = module.globals.keys().collect();
        names.sort();
        push_u32(&mut buf, names.len() as u32);
        for name in names {
            encode_variable(&mut buf, &module.globals[name]);
        }
    }
    buf
}

fn encode_function(buf: &mut Vec<u8>, func: &Function) {
    push_string(buf, &func.qualified_name);
    push_string(buf, &func.module);
    push_string(buf, &func.entry);
    match &func.quill_entry {
        Some(sym) => {
            buf.push(1);
            push_string(buf, sym);
        }
        None => buf.push(0),
    }
    buf.push(match func.result {
        TypeTag::Native => tag_code::NATIVE,
        TypeTag::Dynamic => tag_code::DYNAMIC,
    });
    push_u32(buf, func.lineno);

    let mut local_names: Vec<&String> = func.locals.keys().collect();
    local_names.sort();
    push_u32(buf, local_names.len() as u32);
    for name in local_names {
        encode_variable(buf, &func.locals[name]);
    }

    let mut step_into: Vec<&String> = func.step_into.iter().collect();
    step_into.sort();
    push_u32(buf, step_into.len() as u32);
    for sym in step_into {
        push_string(buf, sym);
    }
}

fn encode_function_section(modules: &[Module]) -> Vec<u8> {
    let mut buf = Vec::new();
    let count: usize = modules.iter().map(|m| m.functions.len()).sum();
    push_u32(&mut buf, count as u32);
    for module in modules {
        for func in &module.functions {
            encode_function(&mut buf, func);
        }
    }
    buf
}

fn encode_line_section(regions: &[LineRegion]) -> Vec<u8> {
    let mut buf = Vec::new();
    push_u32(&mut buf, regions.len() as u32);
    for region in regions {
        push_u32(&mut buf, region.file_id);
        push_u32(&mut buf, region.line);
        push_u64(&mut buf, region.start);
        push_u64(&mut buf, region.end);
        buf.push(region.flags.bits());
    }
    buf
}
