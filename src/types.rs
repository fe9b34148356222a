use serde::Serialize;
use std::ops::Range;

pub type Offset = u64;

pub const KB: u64 = 1024;
pub const MB: u64 = KB * 1024;

pub const CONTAINER_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
pub const COMPOUND_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Longest magic of both families; window overlaps must be at least this minus one.
pub const LONGEST_MAGIC: usize = COMPOUND_MAGIC.len();

pub const PRIMARY_CONTENT_ENTRY: &str = "word/document.xml";
pub const MEDIA_PREFIX: &str = "word/media/";
pub const ENCRYPTED_PACKAGE_MARKER: &str = "EncryptedPackage";
pub const PRIMARY_STREAM_NAME: &str = "WordDocument";
pub const ENCRYPTION_STREAMS: [&str; 2] = ["EncryptionInfo", "EncryptedPackage"];

/// "WordDocument" as it appears in a compound directory entry (UTF-16LE).
const COMPOUND_MARKER: [u8; 24] = [
    b'W', 0, b'o', 0, b'r', 0, b'd', 0, b'D', 0, b'o', 0, b'c', 0, b'u', 0, b'm', 0, b'e', 0,
    b'n', 0, b't', 0,
];

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatFamily {
    Container,
    Compound,
}

impl FormatFamily {
    pub const fn extension(&self) -> &'static str {
        match self {
            FormatFamily::Container => "docx",
            FormatFamily::Compound => "doc",
        }
    }

    pub const fn signature(&self) -> Signature {
        match self {
            FormatFamily::Container => Signature::CONTAINER,
            FormatFamily::Compound => Signature::COMPOUND,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "docx" => Some(FormatFamily::Container),
            "doc" => Some(FormatFamily::Compound),
            _ => None,
        }
    }
}

impl std::fmt::Display for FormatFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatFamily::Container => write!(f, "DOCX"),
            FormatFamily::Compound => write!(f, "DOC"),
        }
    }
}

/// Start-of-structure magic plus the cheap secondary marker used to
/// pre-filter scan windows before the expensive validators run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub family: FormatFamily,
    pub magic: &'static [u8],
    pub marker: &'static [u8],
}

impl Signature {
    pub const CONTAINER: Signature = Signature {
        family: FormatFamily::Container,
        magic: &CONTAINER_MAGIC,
        marker: PRIMARY_CONTENT_ENTRY.as_bytes(),
    };

    pub const COMPOUND: Signature = Signature {
        family: FormatFamily::Compound,
        magic: &COMPOUND_MAGIC,
        marker: &COMPOUND_MARKER,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub start: Offset,
    pub end: Option<Offset>,
    pub family: FormatFamily,
}

impl Candidate {
    pub fn new(start: Offset, family: FormatFamily) -> Self {
        Self {
            start,
            end: None,
            family,
        }
    }

    pub fn len(&self) -> u64 {
        self.end.map_or(0, |end| end.saturating_sub(self.start))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> Option<Range<Offset>> {
        self.end.map(|end| self.start..end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub reason: String,
    pub encrypted: bool,
    pub has_primary_content: bool,
    pub media_entry_names: Vec<String>,
}

impl ValidationResult {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
            ..Default::default()
        }
    }
}

/// A document accepted by its validator and persisted. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredDocument {
    pub sequence_id: u64,
    pub family: FormatFamily,
    pub byte_range: Range<Offset>,
    pub encrypted: bool,
    pub has_primary_content: bool,
    pub extracted_text: Option<String>,
    pub media_entry_names: Vec<String>,
    pub extraction_error: Option<String>,
    pub file_name: String,
    pub sha256: String,
}

impl RecoveredDocument {
    pub fn byte_len(&self) -> u64 {
        self.byte_range.end - self.byte_range.start
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub valid_fragments_found: u64,
    pub slots_scanned: u64,
}

impl ScanStats {
    pub fn empty_slots(&self) -> u64 {
        self.slots_scanned.saturating_sub(self.valid_fragments_found)
    }

    /// Share of scanned slots that held a fragment hit, in percent.
    pub fn density(&self) -> f64 {
        if self.slots_scanned == 0 {
            return 0.0;
        }
        self.valid_fragments_found as f64 / self.slots_scanned as f64 * 100.0
    }
}
