//! Extraction through the procfs opener against memory files on disk.
//!
//! Each test lays out a sparse file under a temporary `<root>/<pid>/as`, so the
//! positioned-read path is exercised without touching a live process.

#![cfg(unix)]

use pa_common::ProcessId;
use pa_core::config::ExtractorConfig;
use pa_core::procmem::{ExtractionOutcome, ProcessArgsEnvReader, ProcessSummary, ProcfsOpener};
use std::fs::{self, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;
use tempfile::TempDir;

const PAGE: usize = 4096;
const TABLE: u64 = 0x1000;
const STRINGS: u64 = 0x3000;
const FILE_LEN: u64 = 0x8000;

/// Write a 64-bit argv/envp layout for `pid` and return its summary.
fn write_image(root: &Path, pid: u32, args: &[&str], env: &[&str]) -> ProcessSummary {
    let dir = root.join(pid.to_string());
    fs::create_dir_all(&dir).unwrap();
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(dir.join("as"))
        .unwrap();
    file.set_len(FILE_LEN).unwrap();

    let mut cursor = STRINGS;
    let mut table = Vec::new();
    let mut place = |text: &str, table: &mut Vec<u8>| {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        file.write_all_at(&bytes, cursor).unwrap();
        table.extend_from_slice(&cursor.to_le_bytes());
        cursor += bytes.len() as u64;
    };
    for arg in args {
        place(arg, &mut table);
    }
    table.extend_from_slice(&0u64.to_le_bytes());
    for entry in env {
        place(entry, &mut table);
    }
    table.extend_from_slice(&0u64.to_le_bytes());
    file.write_all_at(&table, TABLE).unwrap();

    let argc = args.len() as u64;
    ProcessSummary::new(args.len() as i32, TABLE, TABLE + (argc + 1) * 8, 64)
}

fn reader(root: &TempDir) -> ProcessArgsEnvReader<ProcfsOpener> {
    ProcessArgsEnvReader::new(
        ProcfsOpener::with_root(root.path(), "as"),
        ExtractorConfig::default().with_page_size(PAGE),
    )
}

#[test]
fn reads_arguments_and_environment_from_memory_file() {
    let root = TempDir::new().unwrap();
    let summary = write_image(
        root.path(),
        4242,
        &["/usr/sbin/sshd", "-D"],
        &["PATH=/usr/bin:/bin", "LANG=C.UTF-8"],
    );

    let report = reader(&root).extract_with_report(ProcessId(4242), &summary);

    assert_eq!(report.outcome, ExtractionOutcome::Extracted);
    assert_eq!(report.result.arguments, vec!["/usr/sbin/sshd", "-D"]);
    assert_eq!(report.result.environment.get("PATH"), Some("/usr/bin:/bin"));
    assert_eq!(report.result.environment.get("LANG"), Some("C.UTF-8"));
    // Table page plus string page
    assert_eq!(report.stats.page_reads, 2);
}

#[test]
fn pointer_past_end_of_file_is_skipped() {
    let root = TempDir::new().unwrap();
    let mut summary = write_image(root.path(), 10, &["prog", "arg"], &["A=1"]);

    // Point argv[1] beyond the file
    let file = OpenOptions::new()
        .write(true)
        .open(root.path().join("10").join("as"))
        .unwrap();
    file.write_all_at(&(FILE_LEN + 0x1000).to_le_bytes(), TABLE + 8)
        .unwrap();
    summary.argument_count = 2;

    let report = reader(&root).extract_with_report(ProcessId(10), &summary);

    assert_eq!(report.result.arguments, vec!["prog"]);
    assert_eq!(report.stats.skipped_arguments, 1);
    assert_eq!(report.result.environment.get("A"), Some("1"));
}

#[test]
fn missing_process_reports_not_found() {
    let root = TempDir::new().unwrap();
    let summary = ProcessSummary::new(1, TABLE, TABLE + 16, 64);

    let report = reader(&root).extract_with_report(ProcessId(31337), &summary);

    assert_eq!(report.outcome, ExtractionOutcome::ProcessNotFound);
    assert!(report.result.is_empty());
    let error = report.error.expect("error recorded");
    assert_eq!(error.code, 21);
}

#[test]
fn mismatched_summary_never_opens_file() {
    let root = TempDir::new().unwrap();
    // No file exists: a mismatch must be decided before any open
    let summary = ProcessSummary::new(2, TABLE, TABLE + 24, 32);

    let report = reader(&root).extract_with_report(ProcessId(1), &summary);

    assert_eq!(report.outcome, ExtractionOutcome::GeometryMismatch);
    assert!(report.error.is_some());
}

#[test]
fn batch_keeps_targets_independent() {
    let root = TempDir::new().unwrap();
    let first = write_image(root.path(), 100, &["one"], &["N=1"]);
    let second = write_image(root.path(), 200, &["two", "2"], &[]);

    let reports = reader(&root).extract_batch(vec![
        (ProcessId(100), first),
        (ProcessId(300), first),
        (ProcessId(200), second),
    ]);

    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].result.arguments, vec!["one"]);
    assert_eq!(reports[1].outcome, ExtractionOutcome::ProcessNotFound);
    assert_eq!(reports[2].result.arguments, vec!["two", "2"]);
    assert!(reports[2].result.environment.is_empty());
}
