//! Fuzz target for extraction over arbitrary target memory.
//!
//! Maps fuzzer-controlled bytes as the target's address space and feeds an
//! arbitrary summary through the reader. Extraction must never panic and must
//! respect the environment cap whatever the memory holds.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pa_common::ProcessId;
use pa_core::config::ExtractorConfig;
use pa_core::mock_memory::FakeMemory;
use pa_core::procmem::{ProcessArgsEnvReader, ProcessSummary};

const PAGE: usize = 256;
const BASE: u64 = 0x1_0000;

#[derive(Debug, Arbitrary)]
struct Input {
    argc: i16,
    argv_offset: u16,
    envp_offset: u16,
    wide: bool,
    env_cap: u8,
    unreadable_page: Option<u8>,
    memory: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let mut memory = FakeMemory::new(PAGE);
    memory.map(BASE, &input.memory);
    if let Some(page) = input.unreadable_page {
        memory.mark_unreadable(BASE + u64::from(page) * PAGE as u64);
    }

    let summary = ProcessSummary::new(
        i32::from(input.argc),
        BASE + u64::from(input.argv_offset),
        BASE + u64::from(input.envp_offset),
        if input.wide { 64 } else { 32 },
    );
    let cap = usize::from(input.env_cap).max(1);
    let config = ExtractorConfig::default()
        .with_page_size(PAGE)
        .with_env_cap(cap);

    let reader = ProcessArgsEnvReader::new(&memory, config);
    let report = reader.extract_with_report(ProcessId(1), &summary);

    assert!(report.stats.environment_pointers <= cap);
    assert!(report.result.environment.len() <= cap);
});
