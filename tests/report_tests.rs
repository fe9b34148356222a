//! Report generation from recovered and on-disk documents.

mod common;

use common::*;
use quire::error::CarveError;
use quire::report::{analyze_path, analyze_paths, build_report, write_report};
use quire::{CarveConfig, LocalDocumentWriter, MemorySource, RecoveryEngine};
use rstest::*;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use tempfile::TempDir;

#[test]
fn test_analyzing_recovered_files_matches_run_report() {
    let mut data = noise(2048);
    data.extend_from_slice(&docx_with_media("memo", &["word/media/a.png", "word/media/b.gif"]));
    data.extend(noise(512));
    data.extend_from_slice(&encrypted_docx());
    data.extend(noise(512));
    data.extend_from_slice(&doc(&["WordDocument"]));

    let out = TempDir::new().unwrap();
    let mut writer = LocalDocumentWriter::new(out.path()).unwrap();
    let config = CarveConfig::default().with_window_size(1024).with_overlap_size(32);
    let run = RecoveryEngine::new(MemorySource::new(data), config)
        .unwrap()
        .run(&mut writer, &AtomicBool::new(true))
        .unwrap();
    assert_eq!(run.documents.len(), 3);

    let paths: Vec<_> = run
        .documents
        .iter()
        .map(|d| out.path().join(&d.file_name))
        .collect();

    assert_eq!(analyze_paths(&paths), build_report(&run.documents));
}

#[rstest]
#[case("image.jpg")]
#[case("archive.zip")]
#[case("no_extension")]
fn test_unsupported_extensions(#[case] name: &str) {
    let dir = TempDir::new().unwrap();
    let path = write_image(dir.path(), name, &docx("hidden"));

    assert!(matches!(
        analyze_path(&path),
        Err(CarveError::UnsupportedFormat(_))
    ));
    let report = serde_json::to_value(analyze_paths(&[&path])).unwrap();
    assert_eq!(report[name], json!({"error": "Unsupported format"}));
}

#[test]
fn test_uppercase_extension_is_supported() {
    let dir = TempDir::new().unwrap();
    let path = write_image(dir.path(), "LETTER.DOCX", &docx("dear sir"));
    let entry = analyze_path(&path).unwrap();
    assert_eq!(entry.extracted_text, "dear sir");
}

#[test]
fn test_missing_file_reported_in_entry() {
    let report = analyze_paths(&[Path::new("/nonexistent/gone.doc")]);
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["gone.doc"]["valid_compound"], false);
    assert!(value["gone.doc"]["error"].is_string());
}

#[test]
fn test_report_file_round_trips_as_json() {
    let dir = TempDir::new().unwrap();
    let docx_path = write_image(dir.path(), "a.docx", &docx("one"));
    let report = analyze_paths(&[&docx_path]);

    let out = dir.path().join("report.json");
    write_report(&report, &out).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(parsed, serde_json::to_value(&report).unwrap());
}
