//! Fuzz target for extractor config parsing.
//!
//! Parsing and validation must never panic on arbitrary text.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pa_core::config::ExtractorConfig;
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = ExtractorConfig::from_toml_str(text, Path::new("fuzz.toml"));
    }
});
