//! Argument and environment extraction for one target process.
//!
//! [`ProcessArgsEnvReader`] ties the pieces together: it validates the
//! summary's pointer geometry, opens the target's address space for the
//! duration of one call, walks both pointer tables through a fresh
//! [`PageCache`], and decodes every referenced string. Every failure is
//! absorbed into a smaller result; nothing here returns an error or panics.

use super::address_space::{AddressSpace, AddressSpaceOpener, ProcfsOpener};
use super::environment::EnvironmentMap;
use super::geometry::validate_geometry;
use super::page_cache::PageCache;
use super::strings::extract_string;
use super::summary::{PointerStride, ProcessSummary};
use super::walker::{walk_fixed, walk_terminated};
use crate::config::{ExtractorConfig, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use crate::logging::{event_names, Stage};
use pa_common::{Error, ProcessId, StructuredError};
use serde::{Deserialize, Serialize};

/// Arguments and environment recovered from a target.
///
/// Both parts are always present; an empty result is a valid answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    /// Arguments in `argv` order, minus any that could not be read.
    pub arguments: Vec<String>,
    /// Environment in first-seen order.
    pub environment: EnvironmentMap,
}

impl ExtractionResult {
    /// Whether nothing was recovered.
    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty() && self.environment.is_empty()
    }

    /// Arguments joined with single spaces.
    pub fn command_line(&self) -> String {
        self.arguments.join(" ")
    }
}

/// How an extraction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionOutcome {
    /// `argument_count` was zero or negative.
    NothingToExtract,
    /// The claimed pointer width did not match the table spacing.
    GeometryMismatch,
    /// The address space could not be opened for lack of privilege.
    PermissionDenied,
    /// The process was gone before it could be opened.
    ProcessNotFound,
    /// The address space could not be opened for another reason.
    OpenFailed,
    /// Tables were walked; the result may still be partial.
    Extracted,
}

impl ExtractionOutcome {
    fn from_open_error(err: &Error) -> Self {
        match err {
            Error::PermissionDenied { .. } => ExtractionOutcome::PermissionDenied,
            Error::ProcessNotFound { .. } => ExtractionOutcome::ProcessNotFound,
            _ => ExtractionOutcome::OpenFailed,
        }
    }
}

impl std::fmt::Display for ExtractionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExtractionOutcome::NothingToExtract => "nothing_to_extract",
            ExtractionOutcome::GeometryMismatch => "geometry_mismatch",
            ExtractionOutcome::PermissionDenied => "permission_denied",
            ExtractionOutcome::ProcessNotFound => "process_not_found",
            ExtractionOutcome::OpenFailed => "open_failed",
            ExtractionOutcome::Extracted => "extracted",
        };
        write!(f, "{}", s)
    }
}

/// Counters collected during one extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Positioned reads issued against the target.
    pub page_reads: u64,
    /// Lookups served from the cached window.
    pub cache_hits: u64,
    /// Nonzero `argv` pointers.
    pub argument_pointers: usize,
    /// `envp` pointers before the terminator, cap or unreadable slot.
    pub environment_pointers: usize,
    /// Arguments dropped (NULL pointer or unreadable string).
    pub skipped_arguments: usize,
    /// Strings whose page could not be read.
    pub unreadable_entries: usize,
    /// Strings without a terminator, and environment entries without a name.
    pub malformed_entries: usize,
    /// Whether the environment walk stopped at the cap.
    pub env_cap_reached: bool,
}

/// Full outcome of one extraction, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub pid: ProcessId,
    pub outcome: ExtractionOutcome,
    /// Validated pointer width, when validation ran and passed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stride: Option<PointerStride>,
    pub result: ExtractionResult,
    pub stats: ExtractionStats,
    /// Why nothing was extracted, for mismatch and open failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StructuredError>,
}

impl ExtractionReport {
    fn empty(pid: ProcessId, outcome: ExtractionOutcome) -> Self {
        ExtractionReport {
            pid,
            outcome,
            stride: None,
            result: ExtractionResult::default(),
            stats: ExtractionStats::default(),
            error: None,
        }
    }

    fn failed(pid: ProcessId, outcome: ExtractionOutcome, err: &Error) -> Self {
        let mut report = Self::empty(pid, outcome);
        report.error = Some(StructuredError::from(err).with_context("pid", pid.as_u32()));
        report
    }
}

/// Reads `argv` and `envp` out of other processes' memory.
///
/// Holds only an opener and immutable configuration; every call builds its
/// own handle and cache, so one reader can serve many targets (and many
/// threads, when the opener is `Sync`).
#[derive(Debug, Clone)]
pub struct ProcessArgsEnvReader<O> {
    opener: O,
    config: ExtractorConfig,
    page_size: usize,
}

impl<O: AddressSpaceOpener> ProcessArgsEnvReader<O> {
    /// Create a reader. Out-of-range page sizes are clamped to the nearest
    /// usable power of two.
    pub fn new(opener: O, config: ExtractorConfig) -> Self {
        let page_size = config
            .effective_page_size()
            .clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
            .next_power_of_two();
        ProcessArgsEnvReader {
            opener,
            config,
            page_size,
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Cache page size in effect.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Extract arguments and environment for `pid`.
    pub fn extract(&self, pid: ProcessId, summary: &ProcessSummary) -> ExtractionResult {
        self.extract_with_report(pid, summary).result
    }

    /// Extract with outcome and counters.
    pub fn extract_with_report(&self, pid: ProcessId, summary: &ProcessSummary) -> ExtractionReport {
        let span = tracing::debug_span!("extract", pid = pid.as_u32());
        let _guard = span.enter();

        tracing::debug!(
            target: event_names::EXTRACT_STARTED,
            stage = %Stage::Validate,
            argc = summary.argument_count,
            pointer_bits = summary.pointer_width_bits,
            "extraction started"
        );

        if summary.argument_count <= 0 {
            tracing::debug!(
                target: event_names::EXTRACT_SKIPPED,
                stage = %Stage::Validate,
                argc = summary.argument_count,
                "no arguments to extract"
            );
            return ExtractionReport::empty(pid, ExtractionOutcome::NothingToExtract);
        }

        let stride = match validate_geometry(summary) {
            Ok(stride) => stride,
            Err(err) => {
                let argv = format!("{:#x}", summary.argv_address);
                let envp = format!("{:#x}", summary.envp_address);
                tracing::warn!(
                    target: event_names::VALIDATE_GEOMETRY_MISMATCH,
                    stage = %Stage::Validate,
                    claimed_bits = summary.pointer_width_bits,
                    argc = summary.argument_count,
                    argv = %argv,
                    envp = %envp,
                    "pointer geometry mismatch, skipping process"
                );
                return ExtractionReport::failed(pid, ExtractionOutcome::GeometryMismatch, &err);
            }
        };

        let mut space = match self.opener.open(pid) {
            Ok(space) => space,
            Err(err) => {
                let outcome = ExtractionOutcome::from_open_error(&err);
                if outcome == ExtractionOutcome::OpenFailed {
                    tracing::warn!(
                        target: event_names::OPEN_FAILED,
                        stage = %Stage::Open,
                        error = %err,
                        "could not open address space"
                    );
                } else {
                    tracing::debug!(
                        target: event_names::OPEN_FAILED,
                        stage = %Stage::Open,
                        outcome = %outcome,
                        "could not open address space"
                    );
                }
                return ExtractionReport::failed(pid, outcome, &err);
            }
        };

        let (result, stats) = self.extract_from(&mut space, summary, stride);
        drop(space);

        tracing::debug!(
            target: event_names::EXTRACT_FINISHED,
            stage = %Stage::Report,
            arguments = result.arguments.len(),
            environment = result.environment.len(),
            page_reads = stats.page_reads,
            cache_hits = stats.cache_hits,
            "extraction finished"
        );

        ExtractionReport {
            pid,
            outcome: ExtractionOutcome::Extracted,
            stride: Some(stride),
            result,
            stats,
            error: None,
        }
    }

    /// Run [`extract_with_report`](Self::extract_with_report) for each target
    /// in order. Calls share nothing but the reader's configuration.
    pub fn extract_batch<I>(&self, targets: I) -> Vec<ExtractionReport>
    where
        I: IntoIterator<Item = (ProcessId, ProcessSummary)>,
    {
        targets
            .into_iter()
            .map(|(pid, summary)| self.extract_with_report(pid, &summary))
            .collect()
    }

    fn extract_from<S: AddressSpace + ?Sized>(
        &self,
        space: &mut S,
        summary: &ProcessSummary,
        stride: PointerStride,
    ) -> (ExtractionResult, ExtractionStats) {
        let mut cache = PageCache::new(self.page_size);
        let mut stats = ExtractionStats::default();
        let mut result = ExtractionResult::default();

        // Validation guarantees a positive count here
        let argc = usize::try_from(summary.argument_count).unwrap_or(0);
        let argv = walk_fixed(&mut cache, space, summary.argv_address, argc, stride);
        let envp = walk_terminated(
            &mut cache,
            space,
            summary.envp_address,
            stride,
            self.config.env_cap,
        );

        stats.argument_pointers = argv.iter().filter(|&&p| p != 0).count();
        stats.environment_pointers = envp.pointers.len();
        stats.env_cap_reached = envp.cap_reached;

        if envp.cap_reached {
            tracing::warn!(
                target: event_names::WALK_ENV_CAP_REACHED,
                stage = %Stage::Walk,
                cap = self.config.env_cap,
                "environment table has no terminator within cap, truncating"
            );
        } else if envp.stopped_unreadable {
            tracing::debug!(
                target: event_names::WALK_ENV_UNREADABLE,
                stage = %Stage::Walk,
                kept = envp.pointers.len(),
                "environment table ran into an unreadable page"
            );
        }

        for (index, &ptr) in argv.iter().enumerate() {
            if ptr == 0 {
                stats.skipped_arguments += 1;
                continue;
            }
            match extract_string(&mut cache, space, ptr) {
                Ok(arg) => result.arguments.push(arg),
                Err(err) => {
                    stats.skipped_arguments += 1;
                    note_entry_error(&err, "argument", index, &mut stats);
                }
            }
        }

        for (index, &ptr) in envp.pointers.iter().enumerate() {
            match extract_string(&mut cache, space, ptr) {
                Ok(entry) => {
                    if !result.environment.insert_entry(&entry) {
                        stats.malformed_entries += 1;
                        tracing::debug!(
                            target: event_names::DECODE_MALFORMED_ENTRY,
                            stage = %Stage::Decode,
                            table = "environment",
                            index,
                            "environment entry has no name, discarding"
                        );
                    }
                }
                Err(err) => note_entry_error(&err, "environment", index, &mut stats),
            }
        }

        stats.page_reads = cache.reads();
        stats.cache_hits = cache.hits();
        (result, stats)
    }
}

fn note_entry_error(err: &Error, table: &'static str, index: usize, stats: &mut ExtractionStats) {
    match err {
        Error::MalformedEntry { address, .. } => {
            stats.malformed_entries += 1;
            let address = format!("{:#x}", address);
            tracing::debug!(
                target: event_names::DECODE_MALFORMED_ENTRY,
                stage = %Stage::Decode,
                table,
                index,
                address = %address,
                "string has no terminator within read window, skipping"
            );
        }
        _ => {
            stats.unreadable_entries += 1;
            tracing::debug!(
                target: event_names::DECODE_UNREADABLE_ENTRY,
                stage = %Stage::Decode,
                table,
                index,
                error = %err,
                "string unreadable, skipping"
            );
        }
    }
}

/// Extract `pid`'s arguments and environment through procfs with default
/// settings.
pub fn extract_args_and_env(pid: ProcessId, summary: &ProcessSummary) -> ExtractionResult {
    ProcessArgsEnvReader::new(ProcfsOpener::default(), ExtractorConfig::default())
        .extract(pid, summary)
}
