//! Frame classification: native frames to logical frames
//!
//! Every stop reported by the host debugger is classified into one of three
//! regimes before anything else looks at it. Classification is recomputed
//! from scratch at every stop; a [`LogicalFrame`] is never kept across host
//! frame changes.

use crate::host::FrameHandle;
use debuginfo::DebugStore;
use log::debug;

/// Native entry symbols of the Quill bytecode evaluation loop.
///
/// A frame stopped in any of these is executing Quill-level code, whatever
/// the surrounding native stack looks like.
pub const EVAL_ENTRY_SYMBOLS: &[&str] = &["quill_eval_frame", "quill_eval_frame_default"];

/// Execution regime of a classified frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    /// A Sable function translated ahead of time to native code
    Compiled,
    /// Hand-written native code with no source-level correspondence
    Native,
    /// The Quill interpreter's bytecode evaluation loop
    Interpreted,
}

/// The source-level view of one native frame
///
/// Transient: built at a stop, discarded at the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalFrame {
    /// Which regime the frame belongs to
    pub regime: Regime,
    /// Qualified name of the Sable function, when compiled
    pub function: Option<String>,
    /// Resolved current logical line, when compiled
    pub line: Option<u32>,
    /// The raw frame this view was built from
    pub handle: FrameHandle,
}

impl LogicalFrame {
    /// Whether this frame maps back to Sable source.
    pub fn is_compiled(&self) -> bool {
        self.regime == Regime::Compiled
    }
}

/// Classify a native frame reported by the host debugger.
///
/// 1. A symbol matching a function's primary or secondary entry is a
///    compiled frame; its line comes from the line table, falling back to
///    the function's declaration line when the program counter has no finer
///    mapping (prologue code, for instance).
/// 2. A symbol matching the Quill evaluation loop is an interpreted frame;
///    its name and variables come from the interpreter's own frame
///    representation, never from the store.
/// 3. Anything else is a native frame; only its raw symbol is meaningful.
pub fn classify(store: &DebugStore, handle: &FrameHandle) -> LogicalFrame {
    if let Some(func) = store.function_by_symbol(&handle.symbol) {
        let line = store
            .line_for_address(handle.pc)
            .unwrap_or(func.lineno);
        debug!(
            "classified {} as compiled frame of {} at line {}",
            handle.symbol, func.qualified_name, line
        );
        return LogicalFrame {
            regime: Regime::Compiled,
            function: Some(func.qualified_name.clone()),
            line: Some(line),
            handle: handle.clone(),
        };
    }

    if EVAL_ENTRY_SYMBOLS.contains(&handle.symbol.as_str()) {
        debug!("classified {} as interpreted frame", handle.symbol);
        return LogicalFrame {
            regime: Regime::Interpreted,
            function: None,
            line: None,
            handle: handle.clone(),
        };
    }

    debug!("classified {} as native frame", handle.symbol);
    LogicalFrame {
        regime: Regime::Native,
        function: None,
        line: None,
        handle: handle.clone(),
    }
}
