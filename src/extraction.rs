//! Persistence of recovered documents and their chain-of-custody sidecars.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{CarveError, Result};
use crate::types::{FormatFamily, Offset};

const RUN_DIR_ATTEMPTS: u32 = 1000;

/// Where a document ended up after being handed to a [`DocumentWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    pub file_name: String,
    /// `None` for writers that do not touch the filesystem.
    pub saved_path: Option<PathBuf>,
    pub saved_size: u64,
    pub sha256: String,
}

/// Destination for accepted candidates.
pub trait DocumentWriter {
    fn write(
        &mut self,
        sequence_id: u64,
        family: FormatFamily,
        source_offset: Offset,
        bytes: &[u8],
    ) -> Result<WriteResult>;

    fn files_written(&self) -> usize;

    fn bytes_written(&self) -> u64;
}

impl<W: DocumentWriter + ?Sized> DocumentWriter for &mut W {
    fn write(
        &mut self,
        sequence_id: u64,
        family: FormatFamily,
        source_offset: Offset,
        bytes: &[u8],
    ) -> Result<WriteResult> {
        (**self).write(sequence_id, family, source_offset, bytes)
    }

    fn files_written(&self) -> usize {
        (**self).files_written()
    }

    fn bytes_written(&self) -> u64 {
        (**self).bytes_written()
    }
}

pub fn generate_filename(sequence_id: u64, family: FormatFamily) -> String {
    format!("recovered_{:06}.{}", sequence_id, family.extension())
}

pub fn compute_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[derive(Debug, Serialize)]
struct ChainOfCustody<'a> {
    filename: &'a str,
    source_offset: String,
    source_offset_decimal: u64,
    file_size: u64,
    sha256_hash: &'a str,
    recovery_timestamp: String,
    file_type: String,
}

pub fn custody_path(document_path: &Path) -> PathBuf {
    let mut name = document_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".custody.json");
    document_path.with_file_name(name)
}

/// Writes documents and sidecars into one directory, never overwriting.
pub struct LocalDocumentWriter {
    output_dir: PathBuf,
    files_written: usize,
    bytes_written: u64,
}

impl LocalDocumentWriter {
    /// Uses `output_dir` as is, creating it if needed.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|source| CarveError::OutputDirectory {
            path: output_dir.clone(),
            source,
        })?;

        Ok(Self {
            output_dir,
            files_written: 0,
            bytes_written: 0,
        })
    }

    /// Creates a fresh `run-<timestamp>-<pid>` directory under `base` so
    /// concurrent or repeated runs never share output files.
    pub fn per_run(base: impl AsRef<Path>) -> Result<Self> {
        let base = base.as_ref();
        fs::create_dir_all(base).map_err(|source| CarveError::OutputDirectory {
            path: base.to_path_buf(),
            source,
        })?;

        let stem = format!(
            "run-{}-{}",
            Utc::now().format("%Y%m%dT%H%M%SZ"),
            std::process::id()
        );

        for attempt in 0..RUN_DIR_ATTEMPTS {
            let name = if attempt == 0 {
                stem.clone()
            } else {
                format!("{}-{}", stem, attempt)
            };
            let dir = base.join(name);

            match fs::create_dir(&dir) {
                Ok(()) => {
                    return Ok(Self {
                        output_dir: dir,
                        files_written: 0,
                        bytes_written: 0,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(CarveError::OutputDirectory { path: dir, source }),
            }
        }

        Err(CarveError::OutputDirectory {
            path: base.join(stem),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "no free run directory name",
            ),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write_document(path: &Path, bytes: &[u8]) -> io::Result<()> {
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let mut writer = BufWriter::with_capacity(128 * 1024, file);
        writer.write_all(bytes)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }

    fn write_custody(
        path: &Path,
        file_name: &str,
        family: FormatFamily,
        source_offset: Offset,
        file_size: u64,
        sha256: &str,
    ) -> Result<()> {
        let custody = ChainOfCustody {
            filename: file_name,
            source_offset: format!("0x{:016X}", source_offset),
            source_offset_decimal: source_offset,
            file_size,
            sha256_hash: sha256,
            recovery_timestamp: Utc::now().to_rfc3339(),
            file_type: family.to_string(),
        };

        let sidecar = custody_path(path);
        let json = serde_json::to_string_pretty(&custody)?;
        let mut file = File::create(&sidecar).map_err(|source| CarveError::Persist {
            path: sidecar.clone(),
            source,
        })?;
        file.write_all(json.as_bytes())
            .map_err(|source| CarveError::Persist {
                path: sidecar,
                source,
            })
    }
}

impl DocumentWriter for LocalDocumentWriter {
    fn write(
        &mut self,
        sequence_id: u64,
        family: FormatFamily,
        source_offset: Offset,
        bytes: &[u8],
    ) -> Result<WriteResult> {
        let file_name = generate_filename(sequence_id, family);
        let path = self.output_dir.join(&file_name);

        Self::write_document(&path, bytes).map_err(|source| CarveError::Persist {
            path: path.clone(),
            source,
        })?;

        let sha256 = compute_sha256(bytes);
        let saved_size = bytes.len() as u64;
        Self::write_custody(&path, &file_name, family, source_offset, saved_size, &sha256)?;

        self.files_written += 1;
        self.bytes_written += saved_size;

        Ok(WriteResult {
            file_name,
            saved_path: Some(path),
            saved_size,
            sha256,
        })
    }

    fn files_written(&self) -> usize {
        self.files_written
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

/// Keeps documents in memory. Used for analysis-only runs and tests.
#[derive(Debug, Default)]
pub struct MemoryDocumentWriter {
    pub documents: Vec<(String, Vec<u8>)>,
}

impl MemoryDocumentWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, file_name: &str) -> Option<&[u8]> {
        self.documents
            .iter()
            .find(|(name, _)| name == file_name)
            .map(|(_, data)| data.as_slice())
    }
}

impl DocumentWriter for MemoryDocumentWriter {
    fn write(
        &mut self,
        sequence_id: u64,
        family: FormatFamily,
        _source_offset: Offset,
        bytes: &[u8],
    ) -> Result<WriteResult> {
        let file_name = generate_filename(sequence_id, family);
        self.documents.push((file_name.clone(), bytes.to_vec()));

        Ok(WriteResult {
            file_name,
            saved_path: None,
            saved_size: bytes.len() as u64,
            sha256: compute_sha256(bytes),
        })
    }

    fn files_written(&self) -> usize {
        self.documents.len()
    }

    fn bytes_written(&self) -> u64 {
        self.documents.iter().map(|(_, d)| d.len() as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_filename() {
        assert_eq!(
            generate_filename(1, FormatFamily::Container),
            "recovered_000001.docx"
        );
        assert_eq!(
            generate_filename(42, FormatFamily::Compound),
            "recovered_000042.doc"
        );
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            compute_sha256(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_local_writer_writes_document_and_custody() {
        let dir = TempDir::new().unwrap();
        let mut writer = LocalDocumentWriter::new(dir.path()).unwrap();

        let result = writer
            .write(3, FormatFamily::Container, 0x1000, b"payload")
            .unwrap();
        let path = result.saved_path.clone().unwrap();

        assert_eq!(result.file_name, "recovered_000003.docx");
        assert_eq!(fs::read(&path).unwrap(), b"payload");
        assert_eq!(writer.files_written(), 1);
        assert_eq!(writer.bytes_written(), 7);

        let sidecar = custody_path(&path);
        assert!(sidecar.ends_with("recovered_000003.docx.custody.json"));
        let custody: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(sidecar).unwrap()).unwrap();
        assert_eq!(custody["filename"], "recovered_000003.docx");
        assert_eq!(custody["source_offset"], "0x0000000000001000");
        assert_eq!(custody["source_offset_decimal"], 4096);
        assert_eq!(custody["file_size"], 7);
        assert_eq!(custody["sha256_hash"], result.sha256);
        assert_eq!(custody["file_type"], "DOCX");
    }

    #[test]
    fn test_local_writer_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let mut writer = LocalDocumentWriter::new(dir.path()).unwrap();
        writer.write(1, FormatFamily::Compound, 0, b"one").unwrap();

        let err = writer.write(1, FormatFamily::Compound, 0, b"two").unwrap_err();
        assert!(matches!(err, CarveError::Persist { .. }));
    }

    #[test]
    fn test_per_run_directories_are_distinct() {
        let base = TempDir::new().unwrap();
        let first = LocalDocumentWriter::per_run(base.path()).unwrap();
        let second = LocalDocumentWriter::per_run(base.path()).unwrap();

        assert_ne!(first.output_dir(), second.output_dir());
        assert!(first.output_dir().starts_with(base.path()));
        assert!(second.output_dir().is_dir());
    }

    #[test]
    fn test_memory_writer() {
        let mut writer = MemoryDocumentWriter::new();
        writer.write(1, FormatFamily::Container, 0, b"abc").unwrap();
        assert_eq!(writer.get("recovered_000001.docx"), Some(b"abc".as_slice()));
        assert_eq!(writer.bytes_written(), 3);
    }
}
