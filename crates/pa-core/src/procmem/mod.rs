//! Reading another process's `argv` and `envp` out of its address space.
//!
//! Leaf to root:
//! - [`summary`]: the untrusted summary record and pointer widths
//! - [`geometry`]: cross-checks the claimed width against table spacing
//! - [`page_cache`]: one reusable two-page read window
//! - [`walker`]: fixed-count and NULL-terminated pointer table walks
//! - [`strings`]: NUL-terminated string decoding through the cache
//! - [`reader`]: the per-process orchestration
//!
//! Only [`address_space`] touches the OS.

pub mod address_space;
pub mod decode;
pub mod environment;
pub mod geometry;
pub mod page_cache;
pub mod reader;
pub mod strings;
pub mod summary;
pub mod walker;

pub use address_space::{
    AddressSpace, AddressSpaceOpener, ProcAddressSpace, ProcfsOpener, DEFAULT_MEMORY_FILE,
    DEFAULT_PROC_ROOT,
};
pub use decode::decode_le;
pub use environment::EnvironmentMap;
pub use geometry::validate_geometry;
pub use page_cache::PageCache;
pub use reader::{
    extract_args_and_env, ExtractionOutcome, ExtractionReport, ExtractionResult, ExtractionStats,
    ProcessArgsEnvReader,
};
pub use strings::extract_string;
pub use summary::{PointerStride, ProcessSummary};
pub use walker::{walk_fixed, walk_terminated, TerminatedWalk, DEFAULT_ENV_CAP};
