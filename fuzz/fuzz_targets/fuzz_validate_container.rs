#![no_main]
use libfuzzer_sys::fuzz_target;
use quire::FormatFamily;
use quire::content::extract_text;
use quire::formats::validate_candidate;

fuzz_target!(|data: &[u8]| {
    let Ok(result) = validate_candidate(FormatFamily::Container, data) else {
        return;
    };

    // Text extraction on an accepted archive must not panic
    if result.valid && !result.encrypted {
        let _ = extract_text(data);
    }
});
