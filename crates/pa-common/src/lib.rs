//! Shared types for foreign-process argument extraction.
//!
//! This crate provides foundational types shared across pa-core modules:
//! - Process identifiers
//! - The unified error taxonomy with stable codes
//! - Output format selection for the CLI

pub mod error;
pub mod id;
pub mod output;

pub use error::{Error, ErrorCategory, Result, StructuredError, SuggestedAction};
pub use id::ProcessId;
pub use output::OutputFormat;

/// Version of the JSON documents the CLI emits.
pub const SCHEMA_VERSION: &str = "1.0.0";
