//! NUL-terminated string extraction from target memory.

use super::address_space::AddressSpace;
use super::page_cache::PageCache;
use pa_common::{Error, Result};

/// Read the NUL-terminated string starting at `addr`.
///
/// The terminator must lie inside the cached window (up to two pages from the
/// page holding `addr`); longer strings are reported as malformed. Invalid
/// UTF-8 is replaced rather than rejected.
pub fn extract_string<S: AddressSpace + ?Sized>(
    cache: &mut PageCache,
    space: &mut S,
    addr: u64,
) -> Result<String> {
    cache.ensure(space, addr)?;

    let window = cache
        .window_from(addr)
        .ok_or(Error::PageUnreadable { address: addr })?;

    match window.iter().position(|&b| b == 0) {
        Some(len) => Ok(String::from_utf8_lossy(&window[..len]).into_owned()),
        None => Err(Error::MalformedEntry {
            address: addr,
            reason: format!("no terminator within {} bytes", window.len()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_memory::FakeMemory;

    const PAGE: usize = 4096;

    #[test]
    fn test_extracts_strings_sharing_a_page() {
        let mut mem = FakeMemory::new(PAGE);
        mem.map(0x4000, b"alpha\0beta\0\0");
        let mut space = mem.space();
        let mut cache = PageCache::new(PAGE);

        assert_eq!(extract_string(&mut cache, &mut space, 0x4000).unwrap(), "alpha");
        assert_eq!(extract_string(&mut cache, &mut space, 0x4006).unwrap(), "beta");
        assert_eq!(extract_string(&mut cache, &mut space, 0x400b).unwrap(), "");
        assert_eq!(mem.read_calls(), 1);
    }

    #[test]
    fn test_string_may_run_into_lookahead_page() {
        let mut mem = FakeMemory::new(PAGE);
        let start = 0x4000 + PAGE as u64 - 3;
        mem.map(start, b"spans-two-pages\0");
        let mut space = mem.space();
        let mut cache = PageCache::new(PAGE);

        assert_eq!(
            extract_string(&mut cache, &mut space, start).unwrap(),
            "spans-two-pages"
        );
    }

    #[test]
    fn test_missing_terminator_is_malformed() {
        let mut mem = FakeMemory::new(PAGE);
        mem.map(0x8000, vec![b'x'; PAGE * 2]);
        let mut space = mem.space();
        let mut cache = PageCache::new(PAGE);

        let err = extract_string(&mut cache, &mut space, 0x8010).unwrap_err();
        assert!(matches!(err, Error::MalformedEntry { address: 0x8010, .. }));
    }

    #[test]
    fn test_unmapped_address_is_unreadable() {
        let mem = FakeMemory::new(PAGE);
        let mut space = mem.space();
        let mut cache = PageCache::new(PAGE);

        let err = extract_string(&mut cache, &mut space, 0xdead_0000).unwrap_err();
        assert!(matches!(err, Error::PageUnreadable { address: 0xdead_0000 }));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut mem = FakeMemory::new(PAGE);
        mem.map(0x4000, [b'o', 0xff, b'k', 0]);
        let mut space = mem.space();
        let mut cache = PageCache::new(PAGE);

        assert_eq!(
            extract_string(&mut cache, &mut space, 0x4000).unwrap(),
            "o\u{fffd}k"
        );
    }
}
