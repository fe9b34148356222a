//! The per-file JSON report consumed by downstream classification tools.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::content::extract_text;
use crate::error::{CarveError, Result, ValidationError};
use crate::formats::{validate_compound, validate_container};
use crate::types::{FormatFamily, RecoveredDocument};

pub const UNSUPPORTED_FORMAT: &str = "Unsupported format";

/// File name to entry, ordered by name.
pub type Report = BTreeMap<String, ReportEntry>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReportEntry {
    Document(DocumentEntry),
    Unsupported { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentEntry {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_zip: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_compound: Option<bool>,
    pub has_primary_content: bool,
    pub encrypted: bool,
    pub extracted_text: String,
    pub media_entry_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentEntry {
    fn empty(family: FormatFamily, parsed: bool) -> Self {
        let (valid_zip, valid_compound) = match family {
            FormatFamily::Container => (Some(parsed), None),
            FormatFamily::Compound => (None, Some(parsed)),
        };
        Self {
            kind: family.extension(),
            valid_zip,
            valid_compound,
            has_primary_content: false,
            encrypted: false,
            extracted_text: String::new(),
            media_entry_names: Vec::new(),
            error: None,
        }
    }
}

impl From<&RecoveredDocument> for DocumentEntry {
    fn from(doc: &RecoveredDocument) -> Self {
        Self {
            has_primary_content: doc.has_primary_content,
            encrypted: doc.encrypted,
            extracted_text: doc.extracted_text.clone().unwrap_or_default(),
            media_entry_names: doc.media_entry_names.clone(),
            error: doc.extraction_error.clone(),
            ..Self::empty(doc.family, true)
        }
    }
}

pub fn build_report(documents: &[RecoveredDocument]) -> Report {
    documents
        .iter()
        .map(|doc| (doc.file_name.clone(), ReportEntry::Document(doc.into())))
        .collect()
}

/// Analyzes a document already on disk, choosing the family by extension.
///
/// Parse failures are reported inside the entry; only an unknown extension
/// is an error.
pub fn analyze_path(path: &Path) -> Result<DocumentEntry> {
    let family = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(FormatFamily::from_extension)
        .ok_or_else(|| CarveError::UnsupportedFormat(path.display().to_string()))?;

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            return Ok(DocumentEntry {
                error: Some(e.to_string()),
                ..DocumentEntry::empty(family, false)
            });
        }
    };

    Ok(analyze_bytes(family, &bytes))
}

pub fn analyze_bytes(family: FormatFamily, bytes: &[u8]) -> DocumentEntry {
    let outcome = match family {
        FormatFamily::Container => validate_container(bytes),
        FormatFamily::Compound => validate_compound(bytes),
    };

    let validation = match outcome {
        Ok(validation) => validation,
        Err(ValidationError::Malformed(reason)) => {
            return DocumentEntry {
                error: Some(reason),
                ..DocumentEntry::empty(family, false)
            };
        }
        Err(ValidationError::Io(e)) => {
            return DocumentEntry {
                error: Some(e.to_string()),
                ..DocumentEntry::empty(family, false)
            };
        }
    };

    let mut entry = DocumentEntry {
        has_primary_content: validation.has_primary_content,
        encrypted: validation.encrypted,
        media_entry_names: validation.media_entry_names,
        ..DocumentEntry::empty(family, true)
    };

    if family == FormatFamily::Container && entry.has_primary_content && !entry.encrypted {
        match extract_text(bytes) {
            Ok(text) => entry.extracted_text = text,
            Err(e) => entry.error = Some(e.to_string()),
        }
    }

    entry
}

pub fn analyze_paths<P: AsRef<Path>>(paths: &[P]) -> Report {
    let mut report = Report::new();

    for path in paths {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let entry = match analyze_path(path) {
            Ok(entry) => ReportEntry::Document(entry),
            Err(e) => {
                debug!("Skipping {}: {}", path.display(), e);
                ReportEntry::Unsupported {
                    error: UNSUPPORTED_FORMAT.to_string(),
                }
            }
        };
        report.insert(name, entry);
    }

    report
}

pub fn write_report(report: &Report, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).map_err(|source| CarveError::Persist {
        path: path.to_path_buf(),
        source,
    })
}
