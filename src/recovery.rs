//! The recovery orchestrator: locate, carve, validate, persist, advance.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::carving::{CandidateExtractor, CarveOutcome};
use crate::config::CarveConfig;
use crate::content::extract_text;
use crate::error::{CarveError, Rejection, Result};
use crate::extraction::DocumentWriter;
use crate::formats::validate_candidate;
use crate::io::ByteSource;
use crate::scanner::SignatureLocator;
use crate::types::{FormatFamily, Offset, RecoveredDocument, ScanStats};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    NoMoreSignatures,
    MaxFilesReached,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RecoveryRun {
    pub documents: Vec<RecoveredDocument>,
    pub stats: ScanStats,
    pub termination: Termination,
    /// Candidates discarded before or during validation.
    pub rejected: u64,
}

/// Progress callback, called with `(cursor, source_len)`.
pub type ProgressFn<'a> = &'a dyn Fn(u64, u64);

pub struct RecoveryEngine<S> {
    source: S,
    config: CarveConfig,
    locator: SignatureLocator,
    extractor: CandidateExtractor,
}

impl<S: ByteSource> RecoveryEngine<S> {
    pub fn new(source: S, config: CarveConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            locator: SignatureLocator::new(config.window_size)?,
            extractor: CandidateExtractor::from_config(&config),
            source,
            config,
        })
    }

    pub fn config(&self) -> &CarveConfig {
        &self.config
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    pub fn run<W: DocumentWriter>(
        &mut self,
        writer: &mut W,
        running: &AtomicBool,
    ) -> Result<RecoveryRun> {
        self.run_with_progress(writer, running, None)
    }

    /// Walks the source once. The cursor moves to the end of each accepted
    /// candidate and one byte past each rejected signature, so it strictly
    /// increases and accepted ranges never overlap.
    pub fn run_with_progress<W: DocumentWriter>(
        &mut self,
        writer: &mut W,
        running: &AtomicBool,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<RecoveryRun> {
        let source_len = self.source.size();
        let mut cursor: Offset = 0;
        let mut next_sequence_id = 1u64;
        let mut documents = Vec::new();
        let mut rejected = 0u64;

        info!(
            "Starting recovery over {} bytes (max {} documents)",
            source_len, self.config.max_recovered_files
        );

        let termination = loop {
            if !running.load(Ordering::Relaxed) {
                break Termination::Cancelled;
            }
            if let Some(report) = progress {
                report(cursor.min(source_len), source_len);
            }

            let Some((signature, family)) = self.locator.find_next(&mut self.source, cursor)? else {
                break Termination::NoMoreSignatures;
            };

            let carved = match self.extractor.extract(&mut self.source, signature, family)? {
                CarveOutcome::Carved(carved) => carved,
                CarveOutcome::Rejected(_, rejection) => {
                    debug!("{} candidate at 0x{:X} rejected: {}", family, signature, rejection);
                    rejected += 1;
                    cursor = signature + 1;
                    continue;
                }
            };

            let validation = validate_candidate(family, &carved.bytes).map_err(|source| {
                CarveError::Validation {
                    offset: signature,
                    source,
                }
            })?;

            if !validation.valid {
                let rejection = Rejection::StructuralValidationFailure(validation.reason);
                debug!("{} candidate at 0x{:X} rejected: {}", family, signature, rejection);
                rejected += 1;
                cursor = signature + 1;
                continue;
            }

            let (extracted_text, extraction_error) =
                if family == FormatFamily::Container && !validation.encrypted {
                    match extract_text(&carved.bytes) {
                        Ok(text) => (Some(text), None),
                        Err(e) => {
                            warn!("Text extraction failed for candidate at 0x{:X}: {}", signature, e);
                            (None, Some(e.to_string()))
                        }
                    }
                } else {
                    (None, None)
                };

            let written = writer.write(next_sequence_id, family, signature, &carved.bytes)?;
            let end = carved.end();

            info!(
                "Recovered {} ({}, {} bytes at 0x{:X}{})",
                written.file_name,
                family,
                carved.bytes.len(),
                signature,
                if validation.encrypted { ", encrypted" } else { "" }
            );

            documents.push(RecoveredDocument {
                sequence_id: next_sequence_id,
                family,
                byte_range: signature..end,
                encrypted: validation.encrypted,
                has_primary_content: validation.has_primary_content,
                extracted_text,
                media_entry_names: validation.media_entry_names,
                extraction_error,
                file_name: written.file_name,
                sha256: written.sha256,
            });

            next_sequence_id += 1;
            cursor = end.max(signature + 1);

            if documents.len() >= self.config.max_recovered_files {
                break Termination::MaxFilesReached;
            }
        };

        if let Some(report) = progress {
            let done = match termination {
                Termination::NoMoreSignatures => source_len,
                _ => cursor.min(source_len),
            };
            report(done, source_len);
        }

        let stats = ScanStats {
            valid_fragments_found: documents.len() as u64,
            slots_scanned: self.locator.windows_read(),
        };

        info!(
            "Recovery finished ({:?}): {} documents, {} candidates rejected",
            termination,
            documents.len(),
            rejected
        );

        Ok(RecoveryRun {
            documents,
            stats,
            termination,
            rejected,
        })
    }
}
