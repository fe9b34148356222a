use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a run or an operation.
///
/// Per-candidate failures never show up here: they are [`Rejection`]s and
/// only cause the orchestrator to resynchronize.
#[derive(Error, Debug)]
pub enum CarveError {
    #[error("Read error at offset {offset}: {source}")]
    StreamRead {
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Output directory {path:?} is not writable: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to persist {path:?}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Validator I/O failure for candidate at offset {offset}: {source}")]
    Validation {
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to load configuration {path:?}: {message}")]
    ConfigFile { path: PathBuf, message: String },

    #[error("Report serialization failed: {0}")]
    Report(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CarveError>;

/// Why a single candidate was discarded. Local to one orchestrator iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    CandidateTooSmall { len: u64, min: u64 },
    StructuralValidationFailure(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::CandidateTooSmall { len, min } => {
                write!(f, "candidate too small ({} < {} bytes)", len, min)
            }
            Rejection::StructuralValidationFailure(reason) => {
                write!(f, "structural validation failed: {}", reason)
            }
        }
    }
}

/// Failure of a format validator.
///
/// `Malformed` is the ordinary "this is not a valid document" outcome.
/// `Io` is an underlying failure that must not be mistaken for a bad candidate.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("{0}")]
    Malformed(String),

    #[error("I/O failure during validation: {0}")]
    Io(#[from] io::Error),
}

impl ValidationError {
    /// Classifies an `io::Error` raised by a format parser over in-memory data.
    ///
    /// Parsers report truncation and corruption through `UnexpectedEof`,
    /// `InvalidData`, `InvalidInput` and `NotFound`; those are malformed input.
    pub fn from_parser_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::InvalidData
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::NotFound => ValidationError::Malformed(err.to_string()),
            _ => ValidationError::Io(err),
        }
    }
}

/// Failure while extracting text from an accepted container candidate.
/// Recorded on the document, never propagated.
#[derive(Error, Debug)]
pub enum ContentError {
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("failed to read primary content: {0}")]
    Read(#[from] io::Error),

    #[error("malformed markup: {0}")]
    Markup(#[from] quick_xml::Error),
}
