//! Pointer-width validation against observed table spacing.
//!
//! On every supported ABI the initial stack lays out `argv[0..argc]`, a NULL
//! slot, and then `envp[0]`. The distance between the two table addresses is
//! therefore exactly `(argc + 1)` pointers, which lets us check a claimed data
//! model without touching target memory.

use super::summary::{PointerStride, ProcessSummary};
use pa_common::{Error, Result};

/// Validate the claimed pointer width of `summary`.
///
/// Succeeds iff `width * (argument_count + 1) == envp_address - argv_address`.
/// Unknown widths, negative counts, `envp < argv` and arithmetic overflow are
/// all reported as [`Error::GeometryMismatch`].
pub fn validate_geometry(summary: &ProcessSummary) -> Result<PointerStride> {
    let observed_span = summary.envp_address.checked_sub(summary.argv_address);
    let stride = summary.claimed_stride();

    let expected_span = match (stride, u64::try_from(summary.argument_count)) {
        (Some(stride), Ok(count)) => count
            .checked_add(1)
            .and_then(|slots| slots.checked_mul(stride.bytes() as u64)),
        _ => None,
    };

    match (stride, expected_span, observed_span) {
        (Some(stride), Some(expected), Some(observed)) if expected == observed => Ok(stride),
        _ => Err(Error::GeometryMismatch {
            claimed_bits: summary.pointer_width_bits,
            expected_span,
            observed_span,
        }),
    }
}
