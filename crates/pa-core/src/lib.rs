//! Foreign-process argument and environment extraction.
//!
//! This library provides:
//! - The extraction pipeline over `/proc/<pid>/as` or `/proc/<pid>/mem`
//! - Configuration loading and validation
//! - Structured logging
//! - Exit codes for the `pa-core` CLI
//!
//! The binary entry point is in `main.rs`.

pub mod config;
pub mod exit_codes;
pub mod logging;
pub mod procmem;

pub use procmem::{
    extract_args_and_env, ExtractionReport, ExtractionResult, ProcessArgsEnvReader,
    ProcessSummary,
};

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock_memory;
