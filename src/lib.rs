//! Carving of Office documents from raw byte streams.
//!
//! A [`recovery::RecoveryEngine`] walks a [`io::ByteSource`] (a disk image,
//! a memory dump or a fragment held in memory), carves container (`.docx`)
//! and compound (`.doc`) candidates, validates them structurally and hands
//! the accepted ones to a [`extraction::DocumentWriter`].

pub mod carving;
pub mod config;
pub mod content;
pub mod error;
pub mod extraction;
pub mod formats;
pub mod io;
pub mod recovery;
pub mod report;
pub mod scanner;
pub mod types;

#[cfg(test)]
mod testutil;

pub use config::CarveConfig;
pub use error::{CarveError, Rejection, Result};
pub use extraction::{DocumentWriter, LocalDocumentWriter, MemoryDocumentWriter};
pub use io::{ByteSource, FileSource, MemorySource, MmapSource, Reader};
pub use recovery::{RecoveryEngine, RecoveryRun, Termination};
pub use types::{
    Candidate, FormatFamily, Offset, RecoveredDocument, ScanStats, Signature, ValidationResult,
};
