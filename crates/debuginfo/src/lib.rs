//! Debug information for compiled Sable programs
//!
//! This crate defines the SableDbg metadata model (modules, functions,
//! variables, line correlation tables), the sectioned binary format it is
//! serialized in, and the read-only [`DebugStore`] the debugging engine
//! queries.

pub mod builder;
pub mod parse;
pub mod serialize;
pub mod store;
pub mod types;

pub use builder::DebugInfoBuilder;
pub use parse::{parse_sabledbg, MetadataError};
pub use serialize::write_sabledbg;
pub use store::DebugStore;
pub use types::{
    DebugInfo, Function, LineFlags, LineRegion, LineTable, Module, NativeType, SourceFile,
    StorageLocation, TypeTag, VarType, Variable,
};
