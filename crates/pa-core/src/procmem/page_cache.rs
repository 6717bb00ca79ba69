//! Single-window page cache over a foreign address space.
//!
//! Pointer tables and the strings they reference are clustered, so one
//! page-aligned read of two pages serves many small decodes. The second page is
//! look-ahead room for strings that start near the end of the first.

use super::address_space::AddressSpace;
use super::decode::decode_le;
use super::summary::PointerStride;
use pa_common::{Error, Result};

/// One reusable `2 * page_size` read window.
///
/// A window is valid for lookups in `[origin, origin + page_size)`; bytes up
/// to `origin + valid_len` (at most `2 * page_size`) may be served from it.
#[derive(Debug)]
pub struct PageCache {
    page_size: u64,
    buffer: Vec<u8>,
    origin: Option<u64>,
    valid_len: usize,
    reads: u64,
    hits: u64,
}

impl PageCache {
    /// Create an empty cache for `page_size`-byte pages.
    pub fn new(page_size: usize) -> Self {
        let page_size = page_size.max(1);
        debug_assert!(page_size.is_power_of_two());
        Self {
            page_size: page_size as u64,
            buffer: vec![0u8; page_size * 2],
            origin: None,
            valid_len: 0,
            reads: 0,
            hits: 0,
        }
    }

    /// Page size this cache aligns to.
    pub fn page_size(&self) -> usize {
        self.page_size as usize
    }

    /// Start of the current window, if one is loaded.
    pub fn origin(&self) -> Option<u64> {
        self.origin
    }

    /// Positioned reads issued so far.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Lookups answered without I/O.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    fn covers(&self, addr: u64) -> bool {
        match self.origin {
            Some(origin) => addr >= origin && addr - origin < self.page_size,
            None => false,
        }
    }

    /// Make sure the page holding `addr` is loaded.
    ///
    /// A miss costs exactly one positioned read at the page-aligned origin. A
    /// read that returns less than one full page leaves the cache empty.
    pub fn ensure<S: AddressSpace + ?Sized>(&mut self, space: &mut S, addr: u64) -> Result<()> {
        if self.covers(addr) {
            self.hits += 1;
            return Ok(());
        }

        let new_origin = addr - addr % self.page_size;
        self.origin = None;
        self.valid_len = 0;
        self.reads += 1;

        match space.read_at(new_origin, &mut self.buffer) {
            Ok(n) if n as u64 >= self.page_size => {
                self.origin = Some(new_origin);
                self.valid_len = n.min(self.buffer.len());
                Ok(())
            }
            Ok(n) => {
                tracing::trace!(origin = new_origin, bytes = n, "short page read");
                Err(Error::PageUnreadable { address: addr })
            }
            Err(e) => {
                tracing::trace!(origin = new_origin, error = %e, "page read failed");
                Err(Error::PageUnreadable { address: addr })
            }
        }
    }

    /// Valid window bytes from `addr` onward.
    ///
    /// Only meaningful after a successful [`ensure`](Self::ensure) for `addr`.
    pub fn window_from(&self, addr: u64) -> Option<&[u8]> {
        let origin = self.origin?;
        let offset = usize::try_from(addr.checked_sub(origin)?).ok()?;
        self.buffer[..self.valid_len].get(offset..)
    }

    /// Decode one pointer at `addr` from the loaded window.
    pub fn read_pointer(&self, addr: u64, stride: PointerStride) -> Option<u64> {
        let origin = self.origin?;
        let offset = usize::try_from(addr.checked_sub(origin)?).ok()?;
        decode_le(&self.buffer[..self.valid_len], offset, stride)
    }
}
