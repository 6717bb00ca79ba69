//! Identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process ID wrapper with display formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// Raw numeric value.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        ProcessId(pid)
    }
}

impl std::str::FromStr for ProcessId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(ProcessId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_id_display_and_parse() {
        let pid: ProcessId = " 4242 ".parse().unwrap();
        assert_eq!(pid, ProcessId(4242));
        assert_eq!(pid.to_string(), "4242");
        assert!("pid".parse::<ProcessId>().is_err());
    }

    #[test]
    fn test_process_id_serializes_transparent() {
        let json = serde_json::to_string(&ProcessId(7)).unwrap();
        assert_eq!(json, "7");
    }
}
