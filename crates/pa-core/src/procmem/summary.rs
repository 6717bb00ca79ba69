//! Summary record describing where a process keeps its argv/envp tables.

use serde::{Deserialize, Serialize};

/// Per-process summary produced by the fixed-offset record readers.
///
/// Nothing here is trusted: the fields come from a snapshot of a live process
/// and are cross-checked by [`validate_geometry`](super::validate_geometry)
/// before any pointer table is walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSummary {
    /// Number of command-line arguments (`argc`).
    pub argument_count: i32,
    /// Address of the `argv` pointer table in the target address space.
    pub argv_address: u64,
    /// Address of the `envp` pointer table in the target address space.
    pub envp_address: u64,
    /// Claimed data model of the target, 32 or 64.
    pub pointer_width_bits: u32,
}

impl ProcessSummary {
    /// Create a summary.
    pub fn new(
        argument_count: i32,
        argv_address: u64,
        envp_address: u64,
        pointer_width_bits: u32,
    ) -> Self {
        Self {
            argument_count,
            argv_address,
            envp_address,
            pointer_width_bits,
        }
    }

    /// Claimed data model, if the bit width names a known one.
    pub fn claimed_stride(&self) -> Option<PointerStride> {
        PointerStride::from_bits(self.pointer_width_bits)
    }
}

/// A validated pointer width in the target's data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerStride {
    /// ILP32: 4-byte pointers.
    Ilp32,
    /// LP64: 8-byte pointers.
    Lp64,
}

impl PointerStride {
    /// Map a claimed bit width onto a data model.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            32 => Some(PointerStride::Ilp32),
            64 => Some(PointerStride::Lp64),
            _ => None,
        }
    }

    /// Pointer size in bytes.
    pub fn bytes(self) -> usize {
        match self {
            PointerStride::Ilp32 => 4,
            PointerStride::Lp64 => 8,
        }
    }

    /// Pointer size in bits.
    pub fn bits(self) -> u32 {
        match self {
            PointerStride::Ilp32 => 32,
            PointerStride::Lp64 => 64,
        }
    }
}

impl std::fmt::Display for PointerStride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointerStride::Ilp32 => write!(f, "ilp32"),
            PointerStride::Lp64 => write!(f, "lp64"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_from_bits() {
        assert_eq!(PointerStride::from_bits(32), Some(PointerStride::Ilp32));
        assert_eq!(PointerStride::from_bits(64), Some(PointerStride::Lp64));
        assert_eq!(PointerStride::from_bits(16), None);
        assert_eq!(PointerStride::from_bits(0), None);
    }

    #[test]
    fn test_stride_sizes() {
        assert_eq!(PointerStride::Ilp32.bytes(), 4);
        assert_eq!(PointerStride::Lp64.bytes(), 8);
        assert_eq!(PointerStride::Lp64.bits(), 64);
        assert_eq!(PointerStride::Ilp32.to_string(), "ilp32");
    }
}
