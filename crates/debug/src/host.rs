//! Collaborator interfaces: the host debugger and the Quill object decoder
//!
//! The engine never controls a process or decodes a Quill object itself. The
//! [`HostDebugger`] trait abstracts the host debugger's process-control
//! primitives and the [`QuillDecoder`] trait abstracts the interpreter's
//! runtime object decoder, so the session logic can be driven by a scripted
//! mock in tests.

use debuginfo::StorageLocation;

/// A native stack frame as reported by the host debugger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHandle {
    /// Symbol the program counter resolves to
    pub symbol: String,
    /// Program counter
    pub pc: u64,
    /// Call depth (0 = outermost frame; grows with nesting)
    pub depth: u32,
}

impl FrameHandle {
    /// Convenience constructor used widely in tests.
    pub fn new(symbol: impl Into<String>, pc: u64, depth: u32) -> Self {
        Self {
            symbol: symbol.into(),
            pc,
            depth,
        }
    }
}

/// Result of a blocking host operation that lets the inferior run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopEvent {
    /// The inferior stopped; this is its innermost frame
    Stopped(FrameHandle),
    /// The inferior exited with the given status code
    Exited(i32),
}

/// Errors from host debugger calls
///
/// These are propagated verbatim, never retried: swallowing one could strand
/// the session in an inconsistent frame.
#[derive(Debug)]
pub enum HostError {
    /// No inferior process is running
    NoProcess,
    /// A host call failed
    Failed(String),
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostError::NoProcess => write!(f, "no inferior process"),
            HostError::Failed(msg) => write!(f, "host call failed: {}", msg),
        }
    }
}

impl std::error::Error for HostError {}

/// Abstract interface to the host debugger's process control.
///
/// One blocking request at a time: each call returns only once the inferior
/// has stopped again (or exited).
pub trait HostDebugger {
    /// Execute one native instruction and wait for the stop.
    fn single_step(&mut self) -> Result<StopEvent, HostError>;

    /// Resume the inferior until the next stop event.
    fn continue_execution(&mut self) -> Result<StopEvent, HostError>;

    /// The innermost frame of the stopped inferior.
    fn current_frame(&self) -> Result<FrameHandle, HostError>;

    /// Up to `max` frames, innermost first.
    fn frames(&self, max: usize) -> Result<Vec<FrameHandle>, HostError>;

    /// Insert a breakpoint at a native target: a symbol name, or an address
    /// spelled `*0x...`.
    fn insert_breakpoint(&mut self, target: &str) -> Result<(), HostError>;

    /// Remove a breakpoint previously inserted at `target`. Returns true if
    /// one was removed.
    fn remove_breakpoint(&mut self, target: &str) -> Result<bool, HostError>;

    /// Read the raw machine word a storage location currently holds in the
    /// given frame.
    fn read_location(
        &self,
        frame: &FrameHandle,
        location: &StorageLocation,
    ) -> Result<u64, HostError>;
}

/// A structured Quill value decoded from a raw in-process object handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedValue {
    /// Quill type name (e.g. "int", "str", "list")
    pub kind: String,
    /// Named fields of the decoded representation
    pub fields: Vec<(String, String)>,
}

impl DecodedValue {
    /// Render the value for display, showing at most `field_limit` fields.
    ///
    /// A value whose only field is named `value` renders as that field alone,
    /// so decoded scalars read like plain values.
    pub fn render(&self, field_limit: usize) -> String {
        if let [(name, value)] = self.fields.as_slice() {
            if name == "value" {
                return value.clone();
            }
        }
        if self.fields.is_empty() {
            return format!("<{}>", self.kind);
        }
        let mut parts: Vec<String> = self
            .fields
            .iter()
            .take(field_limit)
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        if self.fields.len() > field_limit {
            parts.push("...".to_string());
        }
        format!("<{} {}>", self.kind, parts.join(", "))
    }
}

/// A decoded interpreter frame: the Quill-level view of an interpreted stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Name of the Quill function being evaluated
    pub name: String,
    /// Local variables of the Quill frame
    pub locals: Vec<(String, DecodedValue)>,
    /// Global variables visible to the Quill frame
    pub globals: Vec<(String, DecodedValue)>,
}

/// Errors from the Quill object decoder
#[derive(Debug)]
pub enum DecodeError {
    /// The raw handle does not point at a live Quill object
    BadHandle(u64),
    /// Decoding failed for another reason
    Failed(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::BadHandle(raw) => write!(f, "not a Quill object: 0x{:x}", raw),
            DecodeError::Failed(msg) => write!(f, "decode failed: {}", msg),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Abstract interface to the Quill interpreter's runtime object decoder.
pub trait QuillDecoder {
    /// Decode a raw in-process object handle into a structured value.
    fn decode(&self, raw: u64) -> Result<DecodedValue, DecodeError>;

    /// Decode the interpreter's own frame representation for an interpreted
    /// stop: name, locals, and globals at the Quill level.
    fn decode_frame(&self, frame: &FrameHandle) -> Result<DecodedFrame, DecodeError>;
}
