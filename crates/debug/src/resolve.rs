//! Location resolution: user-supplied locations to native targets
//!
//! A location is either a qualified function name (`codefile.spam`,
//! `codefile.SomeClass.spam`) or a `file:line` pair. Resolution is a pure
//! lookup over the immutable store, so the same input always yields the same
//! target.

use debuginfo::DebugStore;
use log::debug;

/// A parsed location specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Qualified dotted function name
    Function(String),
    /// Source file and line
    SourceLine { file: String, line: u32 },
}

/// Errors from location resolution
#[derive(Debug, PartialEq, Eq)]
pub enum ResolveError {
    /// No mapping exists for the location
    UnresolvedLocation(String),
    /// Several native positions exist for a line and the caller requires one
    AmbiguousLine { file: String, line: u32, count: usize },
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::UnresolvedLocation(loc) => {
                write!(f, "cannot resolve location: {}", loc)
            }
            ResolveError::AmbiguousLine { file, line, count } => {
                write!(f, "{}:{} maps to {} native positions", file, line, count)
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Parse a location string.
///
/// `file:line` is split at the rightmost colon so paths containing colons
/// still parse; anything else is taken as a qualified function name.
pub fn parse_location(text: &str) -> Result<Location, ResolveError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ResolveError::UnresolvedLocation(text.to_string()));
    }

    if let Some(colon_pos) = text.rfind(':') {
        let file = &text[..colon_pos];
        let line_str = &text[colon_pos + 1..];
        if let Ok(line) = line_str.parse::<u32>() {
            if file.is_empty() {
                return Err(ResolveError::UnresolvedLocation(text.to_string()));
            }
            return Ok(Location::SourceLine {
                file: file.to_string(),
                line,
            });
        }
    }

    Ok(Location::Function(text.to_string()))
}

/// Resolve a qualified function name to its breakpoint symbol: the
/// Quill-convention entry when present, otherwise the primary entry.
pub fn resolve_function_symbol(store: &DebugStore, name: &str) -> Result<String, ResolveError> {
    let func = store
        .function_by_qualified_name(name)
        .ok_or_else(|| ResolveError::UnresolvedLocation(name.to_string()))?;
    let symbol = func.preferred_symbol().to_string();
    debug!("resolved {} to {}", name, symbol);
    Ok(symbol)
}

/// Resolve a qualified function name to its primary native entry,
/// for callers that need the unconditional entry point regardless of call
/// style.
pub fn resolve_function_primary(store: &DebugStore, name: &str) -> Result<String, ResolveError> {
    let func = store
        .function_by_qualified_name(name)
        .ok_or_else(|| ResolveError::UnresolvedLocation(name.to_string()))?;
    Ok(func.entry.clone())
}

/// Resolve a source line to the start addresses of its native regions.
///
/// When the line owns statement-flagged regions, only those are returned;
/// otherwise every region counts.
pub fn resolve_line(store: &DebugStore, file: &str, line: u32) -> Result<Vec<u64>, ResolveError> {
    let regions = store.regions_for_line(file, line);
    if regions.is_empty() {
        return Err(ResolveError::UnresolvedLocation(format!("{}:{}", file, line)));
    }

    let statements: Vec<u64> = regions
        .iter()
        .filter(|r| r.flags.contains(debuginfo::LineFlags::STATEMENT))
        .map(|r| r.start)
        .collect();
    if !statements.is_empty() {
        return Ok(statements);
    }
    Ok(regions.iter().map(|r| r.start).collect())
}

/// Resolve a source line that must map to exactly one native position.
pub fn resolve_line_unique(store: &DebugStore, file: &str, line: u32) -> Result<u64, ResolveError> {
    let positions = resolve_line(store, file, line)?;
    match positions.as_slice() {
        [single] => Ok(*single),
        many => Err(ResolveError::AmbiguousLine {
            file: file.to_string(),
            line,
            count: many.len(),
        }),
    }
}

/// Resolve a location string to native breakpoint targets.
///
/// Function locations resolve to one symbol; line locations resolve to every
/// matching native position, spelled `*0x...` the way the host accepts
/// address targets.
pub fn resolve(store: &DebugStore, text: &str) -> Result<Vec<String>, ResolveError> {
    match parse_location(text)? {
        Location::Function(name) => Ok(vec![resolve_function_symbol(store, &name)?]),
        Location::SourceLine { file, line } => {
            let positions = resolve_line(store, &file, line)?;
            Ok(positions.iter().map(|p| format!("*0x{:x}", p)).collect())
        }
    }
}
