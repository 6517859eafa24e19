//! Domain model for oversell
//!
//! This module contains core domain types and errors that provide:
//! - A single result schema shared by every probe
//! - Typed virtualization and media categories
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{
    FailureKind, MediaKind, ProbeResult, ProbeStatus, ProbeValue, Threshold, VirtualizationKind,
};

pub use errors::{ProbeError, RenderError};
