//! Pointer table walks through the page cache.

use super::address_space::AddressSpace;
use super::page_cache::PageCache;
use super::summary::PointerStride;

/// Heuristic upper bound on environment pointers.
///
/// Not an OS limit: it only guarantees termination when target memory never
/// yields a NULL terminator.
pub const DEFAULT_ENV_CAP: usize = 500;

/// Upper bound on up-front allocation for fixed-count walks.
const MAX_PREALLOC: usize = 4096;

/// Result of a sentinel-terminated walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminatedWalk {
    /// Nonzero pointers in table order.
    pub pointers: Vec<u64>,
    /// Whether the walk stopped on the cap rather than a terminator.
    pub cap_reached: bool,
    /// Whether the walk stopped on an unreadable slot.
    pub stopped_unreadable: bool,
}

fn slot_address(base: u64, index: usize, stride: PointerStride) -> Option<u64> {
    let offset = (index as u64).checked_mul(stride.bytes() as u64)?;
    base.checked_add(offset)
}

fn read_slot<S: AddressSpace + ?Sized>(
    cache: &mut PageCache,
    space: &mut S,
    addr: u64,
    stride: PointerStride,
) -> Option<u64> {
    cache.ensure(space, addr).ok()?;
    cache.read_pointer(addr, stride)
}

/// Walk exactly `count` slots starting at `base`.
///
/// Unreadable slots are recorded as `0` so the rest of the table can still be
/// recovered; callers skip `0` entries.
pub fn walk_fixed<S: AddressSpace + ?Sized>(
    cache: &mut PageCache,
    space: &mut S,
    base: u64,
    count: usize,
    stride: PointerStride,
) -> Vec<u64> {
    let mut pointers = Vec::with_capacity(count.min(MAX_PREALLOC));
    for i in 0..count {
        let value = slot_address(base, i, stride)
            .and_then(|addr| read_slot(cache, space, addr, stride))
            .unwrap_or(0);
        pointers.push(value);
    }
    pointers
}

/// Walk a NULL-terminated table starting at `base`, keeping at most `cap`
/// pointers.
///
/// Stops on a `0` slot, on the first unreadable slot (an unreadable table and
/// an ended table are indistinguishable), or once `cap` pointers are kept.
pub fn walk_terminated<S: AddressSpace + ?Sized>(
    cache: &mut PageCache,
    space: &mut S,
    base: u64,
    stride: PointerStride,
    cap: usize,
) -> TerminatedWalk {
    let mut walk = TerminatedWalk::default();
    let mut index = 0usize;

    loop {
        if walk.pointers.len() >= cap {
            walk.cap_reached = true;
            break;
        }
        let Some(value) =
            slot_address(base, index, stride).and_then(|addr| read_slot(cache, space, addr, stride))
        else {
            walk.stopped_unreadable = true;
            break;
        };
        if value == 0 {
            break;
        }
        walk.pointers.push(value);
        index += 1;
    }

    walk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_memory::{FakeMemory, MemoryImageBuilder};

    const PAGE: usize = 4096;

    #[test]
    fn test_fixed_walk_reads_every_slot() {
        let image = MemoryImageBuilder::new(PointerStride::Lp64)
            .arg("a")
            .arg("bc")
            .arg("def")
            .build();
        let mut space = image.memory.space();
        let mut cache = PageCache::new(PAGE);

        let ptrs = walk_fixed(
            &mut cache,
            &mut space,
            image.summary.argv_address,
            3,
            PointerStride::Lp64,
        );
        assert_eq!(ptrs.len(), 3);
        assert!(ptrs.iter().all(|&p| p != 0));
        assert_eq!(ptrs[1] - ptrs[0], 2);
        assert_eq!(ptrs[2] - ptrs[1], 3);
    }

    #[test]
    fn test_fixed_walk_zeroes_unreadable_slots() {
        // argv[0] is the last slot of a readable page; the rest of the table
        // sits on a page that cannot be read.
        let page_end = 0x5000_1000u64;
        let image = MemoryImageBuilder::new(PointerStride::Lp64)
            .table_address(page_end - 8)
            .arg("first")
            .arg("second")
            .arg("third")
            .build();
        let mut memory = image.memory;
        memory.mark_unreadable(page_end);
        let mut space = memory.space();
        let mut cache = PageCache::new(PAGE);

        let ptrs = walk_fixed(&mut cache, &mut space, page_end - 8, 3, PointerStride::Lp64);
        assert_eq!(ptrs.len(), 3);
        assert_ne!(ptrs[0], 0);
        assert_eq!(&ptrs[1..], &[0, 0]);
    }

    #[test]
    fn test_fixed_walk_overflowing_addresses_are_zero() {
        let memory = FakeMemory::new(PAGE);
        let mut space = memory.space();
        let mut cache = PageCache::new(PAGE);

        let ptrs = walk_fixed(&mut cache, &mut space, u64::MAX - 4, 2, PointerStride::Lp64);
        assert_eq!(ptrs, vec![0, 0]);
    }

    #[test]
    fn test_terminated_walk_stops_at_null() {
        let image = MemoryImageBuilder::new(PointerStride::Ilp32)
            .arg("prog")
            .env("A=1")
            .env("B=2")
            .build();
        let mut space = image.memory.space();
        let mut cache = PageCache::new(PAGE);

        let walk = walk_terminated(
            &mut cache,
            &mut space,
            image.summary.envp_address,
            PointerStride::Ilp32,
            DEFAULT_ENV_CAP,
        );
        assert_eq!(walk.pointers.len(), 2);
        assert!(!walk.cap_reached);
        assert!(!walk.stopped_unreadable);
    }

    #[test]
    fn test_terminated_walk_respects_cap() {
        let image = MemoryImageBuilder::new(PointerStride::Lp64)
            .arg("prog")
            .env_repeat("K=v", 700)
            .omit_env_terminator()
            .build();
        let mut space = image.memory.space();
        let mut cache = PageCache::new(PAGE);

        let walk = walk_terminated(
            &mut cache,
            &mut space,
            image.summary.envp_address,
            PointerStride::Lp64,
            DEFAULT_ENV_CAP,
        );
        assert_eq!(walk.pointers.len(), DEFAULT_ENV_CAP);
        assert!(walk.cap_reached);
    }

    #[test]
    fn test_terminated_walk_treats_unreadable_as_end() {
        // argv[0], NULL, envp[0] fill the end of one page; envp[1] starts the
        // next, unreadable page.
        let page_end = 0x6000_2000u64;
        let image = MemoryImageBuilder::new(PointerStride::Lp64)
            .table_address(page_end - 24)
            .arg("prog")
            .env("A=1")
            .env("B=2")
            .build();
        assert_eq!(image.envp_slots[1], page_end);
        let mut memory = image.memory;
        memory.mark_unreadable(page_end);
        let mut space = memory.space();
        let mut cache = PageCache::new(PAGE);

        let walk = walk_terminated(
            &mut cache,
            &mut space,
            image.summary.envp_address,
            PointerStride::Lp64,
            DEFAULT_ENV_CAP,
        );
        assert_eq!(walk.pointers.len(), 1);
        assert!(walk.stopped_unreadable);
        assert!(!walk.cap_reached);
    }

    #[test]
    fn test_terminated_walk_zero_cap() {
        let memory = FakeMemory::new(PAGE);
        let mut space = memory.space();
        let mut cache = PageCache::new(PAGE);
        let walk = walk_terminated(&mut cache, &mut space, 0x1000, PointerStride::Lp64, 0);
        assert!(walk.pointers.is_empty());
        assert!(walk.cap_reached);
        assert_eq!(memory.read_calls(), 0);
    }
}
