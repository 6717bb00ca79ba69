//! Exit codes for the pa-core CLI.
//!
//! Exit codes communicate operation outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-1: Operational outcomes
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors and platform limits

use crate::procmem::ExtractionOutcome;

/// Exit codes for pa-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Operational Outcomes (0-1)
    // ========================================================================
    /// Success: tables walked (the result may still be partial)
    Clean = 0,

    /// Nothing extracted: zero arguments or inconsistent geometry
    Skipped = 1,

    // ========================================================================
    // User / Environment Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Configuration file or value rejected
    ConfigError = 11,

    /// Permission denied opening the target
    PermissionError = 12,

    /// Target process does not exist
    ProcessNotFound = 13,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,

    /// No address-space support on this platform
    UnsupportedPlatform = 22,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code is an operational outcome (codes 0-1).
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    /// Check if this exit code is a user/environment error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    /// Check if this exit code is an internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::Skipped => "OK_SKIPPED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::PermissionError => "ERR_PERMISSION",
            ExitCode::ProcessNotFound => "ERR_NO_PROCESS",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
            ExitCode::UnsupportedPlatform => "ERR_PLATFORM",
        }
    }

    /// Exit code for an extraction outcome.
    pub fn from_outcome(outcome: ExtractionOutcome) -> Self {
        match outcome {
            ExtractionOutcome::Extracted => ExitCode::Clean,
            ExtractionOutcome::NothingToExtract | ExtractionOutcome::GeometryMismatch => {
                ExitCode::Skipped
            }
            ExtractionOutcome::PermissionDenied => ExitCode::PermissionError,
            ExtractionOutcome::ProcessNotFound => ExitCode::ProcessNotFound,
            ExtractionOutcome::OpenFailed => ExitCode::IoError,
        }
    }

    /// Exit code for an error that aborted a command.
    pub fn from_error(err: &pa_common::Error) -> Self {
        use pa_common::Error;
        match err {
            Error::Config(_) | Error::InvalidConfigValue { .. } => ExitCode::ConfigError,
            Error::PermissionDenied { .. } => ExitCode::PermissionError,
            Error::ProcessNotFound { .. } => ExitCode::ProcessNotFound,
            Error::GeometryMismatch { .. } => ExitCode::Skipped,
            Error::Io(_) | Error::PageUnreadable { .. } | Error::MalformedEntry { .. } => {
                ExitCode::IoError
            }
            Error::UnsupportedPlatform(_) => ExitCode::UnsupportedPlatform,
            Error::Json(_) => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
