//! Debug information crate for gostep
//!
//! This crate provides the debug information model that the execution-control
//! core queries while stepping: line tables, function ranges, frame descriptors
//! and type descriptors.
//!
//! The main types are:
//! - [`DebugInfoProvider`] - Query interface consumed by the stepping engine
//! - [`DebugInfo`] - In-memory tables implementing the provider
//! - [`DebugInfoBuilder`] - Builder for assembling those tables

pub mod builder;
pub mod provider;
pub mod types;

pub use builder::DebugInfoBuilder;
pub use provider::DebugInfoProvider;
pub use types::{
    DebugInfo, Field, FrameDescriptor, Function, LineEntry, LineFlags, LineInfo, SourceFile,
    TypeDesc, TypeKind,
};
