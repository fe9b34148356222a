use std::io::Cursor;

use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::ValidationError;
use crate::types::{ENCRYPTED_PACKAGE_MARKER, MEDIA_PREFIX, PRIMARY_CONTENT_ENTRY, ValidationResult};

pub(crate) fn classify_zip_error(err: ZipError) -> ValidationError {
    match err {
        ZipError::Io(e) => ValidationError::from_parser_io(e),
        other => ValidationError::Malformed(other.to_string()),
    }
}

/// Entry names in central directory order. Every local header is visited,
/// so a candidate whose entries point at garbage fails here. The archive must
/// begin at the first byte of the candidate.
pub fn list_entries(bytes: &[u8]) -> Result<Vec<String>, ValidationError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(classify_zip_error)?;
    if archive.offset() != 0 {
        return Err(ValidationError::Malformed(format!(
            "archive starts {} bytes into the candidate",
            archive.offset()
        )));
    }
    let mut names = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i).map_err(classify_zip_error)?;
        names.push(entry.name().to_string());
    }

    Ok(names)
}

pub fn validate_container(bytes: &[u8]) -> Result<ValidationResult, ValidationError> {
    let names = list_entries(bytes)?;

    let encrypted = names.iter().any(|n| n.contains(ENCRYPTED_PACKAGE_MARKER));
    let has_primary_content = names.iter().any(|n| n == PRIMARY_CONTENT_ENTRY);
    let media_entry_names: Vec<String> = names
        .iter()
        .filter(|n| n.starts_with(MEDIA_PREFIX))
        .cloned()
        .collect();

    if !encrypted && !has_primary_content {
        return Ok(ValidationResult {
            media_entry_names,
            ..ValidationResult::invalid(format!(
                "missing primary content entry {}",
                PRIMARY_CONTENT_ENTRY
            ))
        });
    }

    Ok(ValidationResult {
        valid: true,
        reason: String::new(),
        encrypted,
        has_primary_content,
        media_entry_names,
    })
}
