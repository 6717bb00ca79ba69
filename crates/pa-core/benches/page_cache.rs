//! Criterion benchmarks for the extraction hot path.
//!
//! Layouts live in an in-memory address space, so these run deterministically
//! without a live target process.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pa_common::ProcessId;
use pa_core::config::ExtractorConfig;
use pa_core::mock_memory::{MemoryImage, MemoryImageBuilder, DEFAULT_TABLE_ADDRESS};
use pa_core::procmem::{PageCache, PointerStride, ProcessArgsEnvReader};

const PAGE: usize = 4096;

/// A shell-like layout with `env_count` variables.
fn image(env_count: usize, clustered: bool) -> MemoryImage {
    let mut builder = MemoryImageBuilder::new(PointerStride::Lp64)
        .arg("/usr/bin/python3")
        .arg("-m")
        .arg("http.server")
        .arg("8080");
    if clustered {
        builder = builder
            .table_address(DEFAULT_TABLE_ADDRESS)
            .strings_address(DEFAULT_TABLE_ADDRESS + 0x800);
    }
    for i in 0..env_count {
        builder = builder.env(format!("VAR_{}=/opt/value/{}", i, i));
    }
    builder.build()
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");

    for (name, env_count, clustered) in [
        ("clustered_8", 8, true),
        ("scattered_8", 8, false),
        ("scattered_64", 64, false),
        ("scattered_400", 400, false),
    ] {
        let image = image(env_count, clustered);
        let reader = ProcessArgsEnvReader::new(
            &image.memory,
            ExtractorConfig::default().with_page_size(PAGE),
        );
        group.bench_with_input(
            BenchmarkId::new("extract", name),
            &image.summary,
            |b, summary| {
                b.iter(|| {
                    let result = reader.extract(ProcessId(1), black_box(summary));
                    black_box(result);
                });
            },
        );
    }
    group.finish();
}

fn bench_page_cache_lookups(c: &mut Criterion) {
    let image = image(64, false);
    let table = image.summary.argv_address;

    c.bench_function("page_cache/read_pointer_hits", |b| {
        let mut space = image.memory.space();
        let mut cache = PageCache::new(PAGE);
        b.iter(|| {
            let mut sum = 0u64;
            for slot in 0..64u64 {
                let addr = table + slot * 8;
                if cache.ensure(&mut space, addr).is_ok() {
                    sum = sum.wrapping_add(cache.read_pointer(addr, PointerStride::Lp64).unwrap_or(0));
                }
            }
            black_box(sum);
        })
    });
}

criterion_group!(benches, bench_extract, bench_page_cache_lookups);
criterion_main!(benches);
