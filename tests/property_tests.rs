//! Property tests for window coverage and orchestrator termination.

mod common;

use memchr::memmem;
use proptest::prelude::*;
use quire::scanner::WindowScanner;
use quire::types::{COMPOUND_MAGIC, CONTAINER_MAGIC};
use quire::{CarveConfig, MemoryDocumentWriter, MemorySource, RecoveryEngine, Termination};
use std::sync::atomic::AtomicBool;

fn window_config() -> impl Strategy<Value = (usize, usize)> {
    (16usize..512).prop_flat_map(|window| (Just(window), 7usize..window))
}

/// Property: fresh bytes of all windows are exactly the source, in order.
#[test]
fn proptest_windows_cover_source() {
    proptest!(|(data in proptest::collection::vec(any::<u8>(), 0..4000), (window, overlap) in window_config())| {
        let mut scanner = WindowScanner::new(MemorySource::new(data.clone()), window, overlap);
        let mut fresh = Vec::with_capacity(data.len());

        while let Some(w) = scanner.next_window().unwrap() {
            prop_assert!(w.carried <= overlap);
            let start = w.offset as usize;
            prop_assert_eq!(w.data, &data[start..start + w.data.len()]);
            fresh.extend_from_slice(&w.data[w.carried..]);
        }

        prop_assert_eq!(fresh, data);
    });
}

/// Property: every occurrence of a magic is reported by exactly one window.
#[test]
fn proptest_signature_detected_once() {
    proptest!(|(
        len in 64usize..3000,
        plants in proptest::collection::vec(any::<prop::sample::Index>(), 1..6),
        (window, overlap) in window_config()
    )| {
        let mut data = common::noise(len);
        for plant in &plants {
            let at = plant.index(len - COMPOUND_MAGIC.len());
            data[at..at + COMPOUND_MAGIC.len()].copy_from_slice(&COMPOUND_MAGIC);
        }

        let finder = memmem::Finder::new(&COMPOUND_MAGIC);
        let expected: Vec<u64> = finder.find_iter(&data).map(|p| p as u64).collect();

        let mut scanner = WindowScanner::new(MemorySource::new(data.clone()), window, overlap);
        let mut found = Vec::new();
        while let Some(w) = scanner.next_window().unwrap() {
            found.extend(w.signature_positions(&finder).map(|p| w.offset + p as u64));
        }

        prop_assert_eq!(found, expected);
    });
}

/// Property: a source made only of magic bytes terminates with one rejection
/// per signature and nothing recovered.
#[test]
fn proptest_all_signature_input_terminates() {
    proptest!(ProptestConfig::with_cases(32), |(repeats in 1usize..400, (window, overlap) in window_config())| {
        let data: Vec<u8> = CONTAINER_MAGIC.iter().copied().cycle().take(repeats * 4).collect();
        let config = CarveConfig::default()
            .with_window_size(window)
            .with_overlap_size(overlap)
            .with_max_block_size(4096);

        let running = AtomicBool::new(true);
        let mut writer = MemoryDocumentWriter::new();
        let run = RecoveryEngine::new(MemorySource::new(data), config)
            .unwrap()
            .run(&mut writer, &running)
            .unwrap();

        prop_assert_eq!(run.termination, Termination::NoMoreSignatures);
        prop_assert!(run.documents.is_empty());
        prop_assert_eq!(run.rejected, repeats as u64);
    });
}

/// Property: arbitrary input with a document planted in it never fails the
/// run, and accepted ranges are ordered and disjoint.
#[test]
fn proptest_arbitrary_input_recovers_planted_document() {
    let doc = common::docx("planted");
    proptest!(ProptestConfig::with_cases(48), |(
        prefix in proptest::collection::vec(any::<u8>(), 0..600),
        suffix in proptest::collection::vec(any::<u8>(), 0..600)
    )| {
        let mut data = prefix.clone();
        data.extend_from_slice(&doc);
        data.extend_from_slice(&suffix);

        let config = CarveConfig::default()
            .with_window_size(256)
            .with_overlap_size(16)
            .with_max_block_size(8192);
        let running = AtomicBool::new(true);
        let mut writer = MemoryDocumentWriter::new();
        let run = RecoveryEngine::new(MemorySource::new(data), config)
            .unwrap()
            .run(&mut writer, &running)
            .unwrap();

        for pair in run.documents.windows(2) {
            prop_assert!(pair[0].byte_range.end <= pair[1].byte_range.start);
        }
        let start = prefix.len() as u64;
        prop_assert!(run.documents.iter().any(|d| d.byte_range == (start..start + doc.len() as u64)));
    });
}
