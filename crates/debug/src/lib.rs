//! Source-level debugging engine for compiled Sable programs
//!
//! Sable code is translated ahead of time to native functions, calls out to
//! hand-written native helpers, and calls back into the embedded Quill
//! interpreter. This crate classifies every native frame into one of those
//! three regimes and builds source-granularity stepping, breakpoint
//! resolution, and variable inspection on top of the classification.
//!
//! The host debugger's process control and the Quill runtime object decoder
//! are collaborators behind the [`HostDebugger`] and [`QuillDecoder`]
//! traits; everything here is testable against scripted implementations.

pub mod classify;
pub mod commands;
pub mod config;
pub mod host;
pub mod inspect;
pub mod resolve;
pub mod session;
pub mod stepping;

pub use classify::{classify, LogicalFrame, Regime, EVAL_ENTRY_SYMBOLS};
pub use commands::{parse, Command};
pub use config::{Settings, SettingsError, SettingValue};
pub use host::{
    DecodeError, DecodedFrame, DecodedValue, FrameHandle, HostDebugger, HostError, QuillDecoder,
    StopEvent,
};
pub use inspect::{InspectError, Inspector};
pub use resolve::{Location, ResolveError};
pub use session::{BreakpointRecord, Session};
pub use stepping::{StepController, StepError, StepKind, StepOutcome, StepState};
