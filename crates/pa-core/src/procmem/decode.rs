//! Width-tagged little-endian integer decoding.

use super::summary::PointerStride;

/// Decode a `stride`-wide little-endian unsigned integer at `offset`.
///
/// Returns `None` when the value does not fit inside `bytes`.
pub fn decode_le(bytes: &[u8], offset: usize, stride: PointerStride) -> Option<u64> {
    let end = offset.checked_add(stride.bytes())?;
    let raw = bytes.get(offset..end)?;
    match stride {
        PointerStride::Ilp32 => {
            let mut word = [0u8; 4];
            word.copy_from_slice(raw);
            Some(u64::from(u32::from_le_bytes(word)))
        }
        PointerStride::Lp64 => {
            let mut word = [0u8; 8];
            word.copy_from_slice(raw);
            Some(u64::from_le_bytes(word))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ilp32() {
        let bytes = [0xaa, 0x78, 0x56, 0x34, 0x12, 0xbb];
        assert_eq!(decode_le(&bytes, 1, PointerStride::Ilp32), Some(0x1234_5678));
    }

    #[test]
    fn test_decode_lp64() {
        let bytes = 0x0011_2233_4455_6677u64.to_le_bytes();
        assert_eq!(
            decode_le(&bytes, 0, PointerStride::Lp64),
            Some(0x0011_2233_4455_6677)
        );
    }

    #[test]
    fn test_decode_past_end() {
        let bytes = [0u8; 8];
        assert_eq!(decode_le(&bytes, 1, PointerStride::Lp64), None);
        assert_eq!(decode_le(&bytes, 4, PointerStride::Ilp32), Some(0));
        assert_eq!(decode_le(&bytes, 5, PointerStride::Ilp32), None);
        assert_eq!(decode_le(&bytes, usize::MAX, PointerStride::Ilp32), None);
    }
}
