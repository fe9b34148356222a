#![no_main]
use libfuzzer_sys::fuzz_target;
use quire::{CarveConfig, MemoryDocumentWriter, MemorySource, RecoveryEngine};
use std::sync::atomic::AtomicBool;

fuzz_target!(|data: &[u8]| {
    let config = CarveConfig::default()
        .with_window_size(512)
        .with_overlap_size(16)
        .with_max_block_size(16 * 1024);
    let running = AtomicBool::new(true);
    let mut writer = MemoryDocumentWriter::new();

    let Ok(mut engine) = RecoveryEngine::new(MemorySource::new(data), config) else {
        return;
    };
    let Ok(run) = engine.run(&mut writer, &running) else {
        return;
    };

    // Accepted ranges are ordered, disjoint and inside the input
    let mut last_end = 0;
    for doc in &run.documents {
        assert!(doc.byte_range.start >= last_end);
        assert!(doc.byte_range.end <= data.len() as u64);
        last_end = doc.byte_range.end;
    }
});
