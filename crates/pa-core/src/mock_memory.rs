//! In-memory address spaces for testing.
//!
//! This module provides a page-granular fake of a foreign process's memory and
//! a builder that lays out `argv`/`envp` tables the way a process's initial
//! stack does:
//!
//! - Page-level mapping, with individual pages marked unreadable
//! - Read and open counters for verifying cache behaviour
//! - Deterministic layouts for both 32- and 64-bit data models
//!
//! # Example
//!
//! ```ignore
//! use pa_core::mock_memory::MemoryImageBuilder;
//! use pa_core::procmem::PointerStride;
//!
//! let image = MemoryImageBuilder::new(PointerStride::Lp64)
//!     .arg("/bin/sh")
//!     .arg("-c")
//!     .env("HOME=/root")
//!     .build();
//!
//! let reader = ProcessArgsEnvReader::new(&image.memory, ExtractorConfig::default());
//! let result = reader.extract(ProcessId(1), &image.summary);
//! ```

use crate::procmem::{AddressSpace, AddressSpaceOpener, PointerStride, ProcessSummary};
use pa_common::{Error, ProcessId, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default table location for 64-bit layouts, page aligned.
pub const DEFAULT_TABLE_ADDRESS: u64 = 0x7ffd_1000_0000;

/// Default string area for 64-bit layouts, well away from the tables.
pub const DEFAULT_STRINGS_ADDRESS: u64 = 0x7ffd_2000_0000;

/// Default table location for 32-bit layouts.
pub const DEFAULT_TABLE_ADDRESS_32: u64 = 0xbf00_0000;

/// Default string area for 32-bit layouts.
pub const DEFAULT_STRINGS_ADDRESS_32: u64 = 0xbf80_0000;

// ============================================================================
// FakeMemory
// ============================================================================

/// A page-granular sparse address space.
#[derive(Debug)]
pub struct FakeMemory {
    page_size: u64,
    pages: BTreeMap<u64, Vec<u8>>,
    unreadable: BTreeSet<u64>,
    max_read: Option<usize>,
    deny_open: Option<io::ErrorKind>,
    read_calls: AtomicUsize,
    open_calls: AtomicUsize,
}

impl FakeMemory {
    /// Create an empty address space with `page_size`-byte pages.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1) as u64,
            pages: BTreeMap::new(),
            unreadable: BTreeSet::new(),
            max_read: None,
            deny_open: None,
            read_calls: AtomicUsize::new(0),
            open_calls: AtomicUsize::new(0),
        }
    }

    /// Page size of this address space.
    pub fn page_size(&self) -> usize {
        self.page_size as usize
    }

    /// Map `bytes` at `base`; touched pages are created zero-filled.
    pub fn map(&mut self, base: u64, bytes: impl AsRef<[u8]>) {
        let page_size = self.page_size;
        for (i, byte) in bytes.as_ref().iter().enumerate() {
            let addr = base + i as u64;
            let page = self
                .pages
                .entry(addr / page_size)
                .or_insert_with(|| vec![0u8; page_size as usize]);
            page[(addr % page_size) as usize] = *byte;
        }
    }

    /// Make the page containing `addr` fail every read.
    pub fn mark_unreadable(&mut self, addr: u64) {
        self.unreadable.insert(addr / self.page_size);
    }

    /// Cap every positioned read at `bytes`, simulating a process that exits
    /// or unmaps memory mid-read.
    pub fn set_max_read(&mut self, bytes: Option<usize>) {
        self.max_read = bytes;
    }

    /// Make `open` fail with `kind`.
    pub fn deny_open(&mut self, kind: io::ErrorKind) {
        self.deny_open = Some(kind);
    }

    /// Positioned reads served so far.
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::Relaxed)
    }

    /// Successful and failed opens so far.
    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::Relaxed)
    }

    /// Reset both counters.
    pub fn reset_counters(&self) {
        self.read_calls.store(0, Ordering::Relaxed);
        self.open_calls.store(0, Ordering::Relaxed);
    }

    /// A handle over this memory without going through `open`.
    pub fn space(&self) -> FakeSpace<'_> {
        FakeSpace { memory: self }
    }

    fn readable_page(&self, index: u64) -> Option<&[u8]> {
        if self.unreadable.contains(&index) {
            return None;
        }
        self.pages.get(&index).map(Vec::as_slice)
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);

        let limit = self.max_read.map_or(buf.len(), |max| max.min(buf.len()));
        let mut copied = 0usize;
        while copied < limit {
            let Some(addr) = offset.checked_add(copied as u64) else {
                break;
            };
            let Some(page) = self.readable_page(addr / self.page_size) else {
                break;
            };
            let start = (addr % self.page_size) as usize;
            let n = (page.len() - start).min(limit - copied);
            buf[copied..copied + n].copy_from_slice(&page[start..start + n]);
            copied += n;
        }

        if copied == 0 && limit > 0 {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("address {:#x} not mapped", offset),
            ));
        }
        Ok(copied)
    }
}

/// Borrowed handle over a [`FakeMemory`].
#[derive(Debug)]
pub struct FakeSpace<'a> {
    memory: &'a FakeMemory,
}

impl AddressSpace for FakeSpace<'_> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.memory.read(offset, buf)
    }
}

impl<'a> AddressSpaceOpener for &'a FakeMemory {
    type Space = FakeSpace<'a>;

    fn open(&self, pid: ProcessId) -> Result<FakeSpace<'a>> {
        let memory: &'a FakeMemory = *self;
        memory.open_calls.fetch_add(1, Ordering::Relaxed);
        match memory.deny_open {
            Some(io::ErrorKind::PermissionDenied) => Err(Error::PermissionDenied { pid: pid.0 }),
            Some(io::ErrorKind::NotFound) => Err(Error::ProcessNotFound { pid: pid.0 }),
            Some(kind) => Err(Error::Io(io::Error::from(kind))),
            None => Ok(FakeSpace { memory }),
        }
    }
}

// ============================================================================
// MemoryImageBuilder
// ============================================================================

#[derive(Debug, Clone)]
enum Slot {
    Text(String),
    Raw(u64),
}

/// A built image plus the summary that describes it.
#[derive(Debug)]
pub struct MemoryImage {
    /// The address space.
    pub memory: FakeMemory,
    /// A summary consistent with the layout.
    pub summary: ProcessSummary,
    /// Address of each `argv` slot.
    pub argv_slots: Vec<u64>,
    /// Address of each `envp` slot.
    pub envp_slots: Vec<u64>,
}

/// Builder for `argv`/`envp` layouts.
///
/// Tables are laid out contiguously at the table address: `argc` pointers, a
/// NULL, the environment pointers, and a NULL terminator. Strings go to a
/// separate area.
#[derive(Debug, Clone)]
pub struct MemoryImageBuilder {
    stride: PointerStride,
    page_size: usize,
    table_address: u64,
    strings_address: u64,
    args: Vec<Slot>,
    env: Vec<Slot>,
    env_terminator: bool,
}

impl MemoryImageBuilder {
    /// Start a layout for the given data model.
    pub fn new(stride: PointerStride) -> Self {
        let (table_address, strings_address) = match stride {
            PointerStride::Ilp32 => (DEFAULT_TABLE_ADDRESS_32, DEFAULT_STRINGS_ADDRESS_32),
            PointerStride::Lp64 => (DEFAULT_TABLE_ADDRESS, DEFAULT_STRINGS_ADDRESS),
        };
        Self {
            stride,
            page_size: 4096,
            table_address,
            strings_address,
            args: Vec::new(),
            env: Vec::new(),
            env_terminator: true,
        }
    }

    /// Page size of the resulting address space.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Address of `argv[0]`.
    pub fn table_address(mut self, addr: u64) -> Self {
        self.table_address = addr;
        self
    }

    /// Start of the string area.
    pub fn strings_address(mut self, addr: u64) -> Self {
        self.strings_address = addr;
        self
    }

    /// Append an argument string.
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(Slot::Text(value.into()));
        self
    }

    /// Append a raw `argv` pointer (e.g. NULL or dangling).
    pub fn arg_pointer(mut self, ptr: u64) -> Self {
        self.args.push(Slot::Raw(ptr));
        self
    }

    /// Append an environment string.
    pub fn env(mut self, value: impl Into<String>) -> Self {
        self.env.push(Slot::Text(value.into()));
        self
    }

    /// Append a raw `envp` pointer.
    pub fn env_pointer(mut self, ptr: u64) -> Self {
        self.env.push(Slot::Raw(ptr));
        self
    }

    /// Append `count` copies of the same environment string.
    pub fn env_repeat(mut self, value: &str, count: usize) -> Self {
        self.env
            .extend(std::iter::repeat(Slot::Text(value.to_string())).take(count));
        self
    }

    /// Leave the environment table without its NULL terminator.
    pub fn omit_env_terminator(mut self) -> Self {
        self.env_terminator = false;
        self
    }

    /// Lay out the image.
    pub fn build(self) -> MemoryImage {
        let width = self.stride.bytes() as u64;
        let mut memory = FakeMemory::new(self.page_size);
        let mut strings: Vec<u8> = Vec::new();
        let mut cursor = self.strings_address;

        let mut resolve = |slot: &Slot, strings: &mut Vec<u8>| -> u64 {
            match slot {
                Slot::Raw(ptr) => *ptr,
                Slot::Text(text) => {
                    let addr = cursor;
                    strings.extend_from_slice(text.as_bytes());
                    strings.push(0);
                    cursor += text.len() as u64 + 1;
                    addr
                }
            }
        };

        let mut pointers: Vec<u64> = Vec::new();
        for slot in &self.args {
            pointers.push(resolve(slot, &mut strings));
        }
        pointers.push(0);
        for slot in &self.env {
            pointers.push(resolve(slot, &mut strings));
        }
        if self.env_terminator {
            pointers.push(0);
        }

        let mut table = Vec::with_capacity(pointers.len() * width as usize);
        for ptr in &pointers {
            match self.stride {
                PointerStride::Ilp32 => table.extend_from_slice(&(*ptr as u32).to_le_bytes()),
                PointerStride::Lp64 => table.extend_from_slice(&ptr.to_le_bytes()),
            }
        }

        memory.map(self.table_address, &table);
        if !strings.is_empty() {
            memory.map(self.strings_address, &strings);
        }

        let argc = self.args.len();
        let envp_address = self.table_address + (argc as u64 + 1) * width;
        let argv_slots = (0..argc as u64)
            .map(|i| self.table_address + i * width)
            .collect();
        let envp_slots = (0..self.env.len() as u64)
            .map(|i| envp_address + i * width)
            .collect();

        MemoryImage {
            memory,
            summary: ProcessSummary::new(
                argc as i32,
                self.table_address,
                envp_address,
                self.stride.bits(),
            ),
            argv_slots,
            envp_slots,
        }
    }
}
