//! Locals and globals inspection for a logical frame
//!
//! Natively-typed storage is read directly through the host and formatted
//! per its machine type; dynamically-typed storage is handed to the Quill
//! object decoder. Interpreted frames bypass the store entirely and render
//! whatever the decoder reports.

use crate::classify::{LogicalFrame, Regime};
use crate::config::Settings;
use crate::host::{DecodeError, HostDebugger, HostError, QuillDecoder};
use debuginfo::{DebugStore, Function, NativeType, VarType, Variable};

/// Errors from variable inspection
#[derive(Debug)]
pub enum InspectError {
    /// The frame has no source-level locals/globals view (native regime)
    NoLogicalFrame,
    /// No variable with this name is declared in the frame's scope
    NoSuchVariable(String),
    /// A host read failed
    Host(HostError),
    /// The Quill decoder failed
    Decode(DecodeError),
}

impl std::fmt::Display for InspectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InspectError::NoLogicalFrame => write!(f, "no logical frame"),
            InspectError::NoSuchVariable(name) => write!(f, "no such variable: {}", name),
            InspectError::Host(e) => write!(f, "{}", e),
            InspectError::Decode(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for InspectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InspectError::Host(e) => Some(e),
            InspectError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HostError> for InspectError {
    fn from(e: HostError) -> Self {
        InspectError::Host(e)
    }
}

impl From<DecodeError> for InspectError {
    fn from(e: DecodeError) -> Self {
        InspectError::Decode(e)
    }
}

/// Variable inspection over a classified frame
pub struct Inspector;

impl Inspector {
    /// Name/value pairs for the frame's locals, sorted by name.
    pub fn locals<H: HostDebugger, D: QuillDecoder>(
        store: &DebugStore,
        host: &H,
        decoder: &D,
        settings: &Settings,
        frame: &LogicalFrame,
    ) -> Result<Vec<(String, String)>, InspectError> {
        match frame.regime {
            Regime::Native => Err(InspectError::NoLogicalFrame),
            Regime::Interpreted => {
                let decoded = decoder.decode_frame(&frame.handle)?;
                let limit = settings.dynamic_field_limit();
                Ok(decoded
                    .locals
                    .iter()
                    .map(|(name, value)| (name.clone(), value.render(limit)))
                    .collect())
            }
            Regime::Compiled => {
                let func = Self::function(store, frame)?;
                Self::render_all(host, decoder, settings, frame, &func.locals)
            }
        }
    }

    /// Name/value pairs for the frame's globals, sorted by name.
    ///
    /// For a compiled frame these are the owning module's globals; for an
    /// interpreted frame, whatever the decoder reports.
    pub fn globals<H: HostDebugger, D: QuillDecoder>(
        store: &DebugStore,
        host: &H,
        decoder: &D,
        settings: &Settings,
        frame: &LogicalFrame,
    ) -> Result<Vec<(String, String)>, InspectError> {
        match frame.regime {
            Regime::Native => Err(InspectError::NoLogicalFrame),
            Regime::Interpreted => {
                let decoded = decoder.decode_frame(&frame.handle)?;
                let limit = settings.dynamic_field_limit();
                Ok(decoded
                    .globals
                    .iter()
                    .map(|(name, value)| (name.clone(), value.render(limit)))
                    .collect())
            }
            Regime::Compiled => {
                let func = Self::function(store, frame)?;
                let module = store
                    .module(&func.module)
                    .ok_or(InspectError::NoLogicalFrame)?;
                Self::render_all(host, decoder, settings, frame, &module.globals)
            }
        }
    }

    /// Look up a single variable: locals first, then the module's globals.
    pub fn variable<H: HostDebugger, D: QuillDecoder>(
        store: &DebugStore,
        host: &H,
        decoder: &D,
        settings: &Settings,
        frame: &LogicalFrame,
        name: &str,
    ) -> Result<String, InspectError> {
        match frame.regime {
            Regime::Native => Err(InspectError::NoLogicalFrame),
            Regime::Interpreted => {
                let decoded = decoder.decode_frame(&frame.handle)?;
                let limit = settings.dynamic_field_limit();
                decoded
                    .locals
                    .iter()
                    .chain(decoded.globals.iter())
                    .find(|(n, _)| n == name)
                    .map(|(_, value)| value.render(limit))
                    .ok_or_else(|| InspectError::NoSuchVariable(name.to_string()))
            }
            Regime::Compiled => {
                let func = Self::function(store, frame)?;
                let var = func.locals.get(name).or_else(|| {
                    store
                        .module(&func.module)
                        .and_then(|m| m.globals.get(name))
                });
                match var {
                    Some(var) => Self::render(host, decoder, settings, frame, var),
                    None => Err(InspectError::NoSuchVariable(name.to_string())),
                }
            }
        }
    }

    /// Format a raw machine word per a native type.
    pub fn format_native(ty: NativeType, raw: u64) -> String {
        match ty {
            NativeType::Int64 => format!("{}", raw as i64),
            NativeType::UInt64 => format!("{}", raw),
            NativeType::Bool => format!("{}", raw != 0),
            NativeType::Float64 => format!("{}", f64::from_bits(raw)),
            NativeType::Pointer => format!("0x{:x}", raw),
        }
    }

    fn function<'a>(
        store: &'a DebugStore,
        frame: &LogicalFrame,
    ) -> Result<&'a Function, InspectError> {
        frame
            .function
            .as_deref()
            .and_then(|name| store.function_by_qualified_name(name))
            .ok_or(InspectError::NoLogicalFrame)
    }

    fn render<H: HostDebugger, D: QuillDecoder>(
        host: &H,
        decoder: &D,
        settings: &Settings,
        frame: &LogicalFrame,
        var: &Variable,
    ) -> Result<String, InspectError> {
        let raw = host.read_location(&frame.handle, &var.location)?;
        match var.ty {
            VarType::Native(ty) => Ok(Self::format_native(ty, raw)),
            VarType::Dynamic => {
                let value = decoder.decode(raw)?;
                Ok(value.render(settings.dynamic_field_limit()))
            }
        }
    }

    fn render_all<H: HostDebugger, D: QuillDecoder>(
        host: &H,
        decoder: &D,
        settings: &Settings,
        frame: &LogicalFrame,
        vars: &std::collections::HashMap<String, Variable>,
    ) -> Result<Vec<(String, String)>, InspectError> {
        let mut names: Vec<&String> = vars.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let value = Self::render(host, decoder, settings, frame, &vars[name])?;
                Ok((name.clone(), value))
            })
            .collect()
    }
}
