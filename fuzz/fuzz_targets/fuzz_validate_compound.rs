#![no_main]
use libfuzzer_sys::fuzz_target;
use quire::FormatFamily;
use quire::formats::validate_candidate;

fuzz_target!(|data: &[u8]| {
    let _ = validate_candidate(FormatFamily::Compound, data);
});
