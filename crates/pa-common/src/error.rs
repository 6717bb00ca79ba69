//! Error types for process argument extraction.
//!
//! Every variant carries:
//! - A stable numeric code for machine parsing
//! - A category for grouping
//! - A recoverability hint and a suggested action for automation
//! - A remediation string for humans
//!
//! Inside the extractor none of these escape as failures of the whole scan:
//! they are resolved locally into a smaller, still valid result. They surface
//! in diagnostics and in the CLI's structured error output.
//!
//! ```json
//! {
//!   "code": 30,
//!   "category": "geometry",
//!   "message": "pointer geometry mismatch: 64-bit claim inconsistent with argv/envp spacing",
//!   "recoverable": false,
//!   "suggested_action": "skip",
//!   "context": { "claimed_bits": 64, "expected_span": 24, "observed_span": 32 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file and value errors.
    Config,
    /// Opening the target address space failed.
    Access,
    /// Summary metadata does not match observed memory layout.
    Geometry,
    /// Reading or decoding target memory failed.
    Memory,
    /// Local file I/O and serialization errors.
    Io,
    /// Platform compatibility errors.
    Platform,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Access => write!(f, "access"),
            ErrorCategory::Geometry => write!(f, "geometry"),
            ErrorCategory::Memory => write!(f, "memory"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Platform => write!(f, "platform"),
        }
    }
}

/// Suggested actions for automation to take in response to errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry on a later scan.
    Retry,
    /// Validate configuration.
    RunCheck,
    /// Request elevated privileges.
    Elevate,
    /// Skip this process and continue.
    Skip,
    /// Abort the operation.
    Abort,
    /// Manual intervention required.
    ManualIntervention,
    /// No action needed (informational).
    None,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::RunCheck => write!(f, "run_check"),
            SuggestedAction::Elevate => write!(f, "elevate"),
            SuggestedAction::Skip => write!(f, "skip"),
            SuggestedAction::Abort => write!(f, "abort"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
            SuggestedAction::None => write!(f, "none"),
        }
    }
}

/// Unified error type.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid value for {field}: {message}")]
    InvalidConfigValue { field: String, message: String },

    // Access errors (20-29)
    #[error("permission denied opening address space of process {pid}")]
    PermissionDenied { pid: u32 },

    #[error("process {pid} not found")]
    ProcessNotFound { pid: u32 },

    // Geometry errors (30-39)
    #[error("pointer geometry mismatch: {claimed_bits}-bit claim inconsistent with argv/envp spacing")]
    GeometryMismatch {
        claimed_bits: u32,
        expected_span: Option<u64>,
        observed_span: Option<u64>,
    },

    // Memory errors (40-49)
    #[error("page unreadable at {address:#x}")]
    PageUnreadable { address: u64 },

    #[error("malformed entry at {address:#x}: {reason}")]
    MalformedEntry { address: u64, reason: String },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Platform errors (70-79)
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Access errors
    /// - 30-39: Geometry errors
    /// - 40-49: Memory errors
    /// - 60-69: I/O errors
    /// - 70-79: Platform errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfigValue { .. } => 11,
            Error::PermissionDenied { .. } => 20,
            Error::ProcessNotFound { .. } => 21,
            Error::GeometryMismatch { .. } => 30,
            Error::PageUnreadable { .. } => 40,
            Error::MalformedEntry { .. } => 41,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::UnsupportedPlatform(_) => 70,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfigValue { .. } => ErrorCategory::Config,
            Error::PermissionDenied { .. } | Error::ProcessNotFound { .. } => {
                ErrorCategory::Access
            }
            Error::GeometryMismatch { .. } => ErrorCategory::Geometry,
            Error::PageUnreadable { .. } | Error::MalformedEntry { .. } => ErrorCategory::Memory,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
            Error::UnsupportedPlatform(_) => ErrorCategory::Platform,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::InvalidConfigValue { .. } => true,

            Error::PermissionDenied { .. } => true, // Can elevate
            Error::ProcessNotFound { .. } => false, // Process is gone

            // Metadata is untrustworthy for this process snapshot
            Error::GeometryMismatch { .. } => false,

            // The target is live; the next scan may see a mapped page
            Error::PageUnreadable { .. } => true,
            Error::MalformedEntry { .. } => false,

            Error::Io(_) => true,
            Error::Json(_) => true,

            Error::UnsupportedPlatform(_) => false,
        }
    }

    /// Returns the suggested action for automation.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) | Error::InvalidConfigValue { .. } => SuggestedAction::RunCheck,
            Error::PermissionDenied { .. } => SuggestedAction::Elevate,
            Error::ProcessNotFound { .. } => SuggestedAction::Skip,
            Error::GeometryMismatch { .. } => SuggestedAction::Skip,
            Error::PageUnreadable { .. } => SuggestedAction::Retry,
            Error::MalformedEntry { .. } => SuggestedAction::Skip,
            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::ManualIntervention,
            Error::UnsupportedPlatform(_) => SuggestedAction::Abort,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::InvalidConfigValue { .. } => {
                "Run 'pa-core config show' to inspect the resolved configuration and fix config.toml."
            }
            Error::PermissionDenied { .. } => {
                "Inspecting another user's process requires elevated privileges (root or proc_owner)."
            }
            Error::ProcessNotFound { .. } => {
                "The process exited before its address space could be opened. This is normal for short-lived processes."
            }
            Error::GeometryMismatch { .. } => {
                "The summary record disagrees with the observed pointer layout. Re-read the summary on the next scan."
            }
            Error::PageUnreadable { .. } => {
                "The target page is unmapped or the process exited mid-read. Partial results were kept."
            }
            Error::MalformedEntry { .. } => {
                "The entry has no terminator within the read window or is not NAME=VALUE. It was skipped."
            }
            Error::Io(_) => "Check permissions on the procfs mount and retry.",
            Error::Json(_) => "Invalid JSON. Check syntax with 'jq .' or regenerate the file.",
            Error::UnsupportedPlatform(_) => {
                "This platform does not expose process memory as a readable file."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfigValue { .. } => "Invalid Configuration Value",
            Error::PermissionDenied { .. } => "Permission Denied",
            Error::ProcessNotFound { .. } => "Process Not Found",
            Error::GeometryMismatch { .. } => "Pointer Geometry Mismatch",
            Error::PageUnreadable { .. } => "Page Unreadable",
            Error::MalformedEntry { .. } => "Malformed Entry",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
            Error::UnsupportedPlatform(_) => "Unsupported Platform",
        }
    }

    /// Format for human consumption: headline, reason, fix.
    pub fn format_human(&self) -> String {
        format!(
            "✗ {}\n  Reason: {}\n  Fix: {}",
            self.headline(),
            self,
            self.remediation()
        )
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested action for automation.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g., pid, address).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::PermissionDenied { pid } | Error::ProcessNotFound { pid } => {
                context.insert("pid".to_string(), serde_json::json!(pid));
            }
            Error::GeometryMismatch {
                claimed_bits,
                expected_span,
                observed_span,
            } => {
                context.insert("claimed_bits".to_string(), serde_json::json!(claimed_bits));
                context.insert("expected_span".to_string(), serde_json::json!(expected_span));
                context.insert("observed_span".to_string(), serde_json::json!(observed_span));
            }
            Error::PageUnreadable { address } | Error::MalformedEntry { address, .. } => {
                context.insert(
                    "address".to_string(),
                    serde_json::json!(format!("{:#x}", address)),
                );
            }
            Error::InvalidConfigValue { field, .. } => {
                context.insert("field".to_string(), serde_json::json!(field));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}
