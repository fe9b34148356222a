use memchr::memmem;

use crate::config::CarveConfig;
use crate::error::{Rejection, Result};
use crate::io::{ByteSource, fill_buffer, read_range};
use crate::types::{Candidate, FormatFamily, Offset, PRIMARY_CONTENT_ENTRY};

pub const EOCD_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];
/// Fixed part of the end-of-central-directory record.
pub const EOCD_SIZE: u64 = 22;

const LOCAL_HEADER_SIZE: u64 = 30;
const CENTRAL_HEADER_SIZE: u64 = 46;
const COMPOUND_SECTOR_SIZE: u64 = 512;

/// Smallest archive that can hold the primary entry: one local header, one
/// central header, the entry name twice and the trailer.
pub const MIN_CONTAINER_BYTES: u64 =
    LOCAL_HEADER_SIZE + CENTRAL_HEADER_SIZE + EOCD_SIZE + 2 * PRIMARY_CONTENT_ENTRY.len() as u64;

/// Header sector plus one FAT sector and one directory sector.
pub const MIN_COMPOUND_BYTES: u64 = 3 * COMPOUND_SECTOR_SIZE;

pub const fn min_candidate_size(family: FormatFamily) -> u64 {
    match family {
        FormatFamily::Container => MIN_CONTAINER_BYTES,
        FormatFamily::Compound => MIN_COMPOUND_BYTES,
    }
}

/// A candidate whose end is known, with its bytes read from the source.
#[derive(Debug, Clone)]
pub struct CarvedCandidate {
    pub candidate: Candidate,
    pub bytes: Vec<u8>,
}

impl CarvedCandidate {
    pub fn end(&self) -> Offset {
        self.candidate.start + self.bytes.len() as u64
    }
}

#[derive(Debug, Clone)]
pub enum CarveOutcome {
    Carved(CarvedCandidate),
    Rejected(Candidate, Rejection),
}

/// What one forward trailer search established: no trailer starts in
/// `from..scanned_to` except `found`, which is the first one at or after
/// `from` when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TrailerScan {
    from: Offset,
    scanned_to: Offset,
    found: Option<Offset>,
}

impl TrailerScan {
    /// Answers a search from `start` up to `limit_end` when the recorded scan
    /// already decides it.
    fn answer(&self, start: Offset, limit_end: Offset) -> Option<Option<Offset>> {
        if start < self.from {
            return None;
        }
        match self.found {
            Some(at) if at >= start => Some((at < limit_end).then_some(at)),
            Some(_) => None,
            None if self.scanned_to >= limit_end => Some(None),
            None => None,
        }
    }
}

/// Decides where a candidate ends and reads it.
pub struct CandidateExtractor {
    max_block_size: u64,
    trailer_search_limit: Option<u64>,
    buffer: Vec<u8>,
    // Signatures are visited in increasing order, so a trailer found for one
    // candidate is the answer for every later start up to it.
    last_scan: Option<TrailerScan>,
    bytes_scanned: u64,
}

impl CandidateExtractor {
    pub fn new(max_block_size: u64, trailer_search_limit: Option<u64>, window_size: usize) -> Self {
        Self {
            max_block_size,
            trailer_search_limit,
            buffer: vec![0u8; window_size.max(2 * EOCD_SIGNATURE.len())],
            last_scan: None,
            bytes_scanned: 0,
        }
    }

    pub fn from_config(config: &CarveConfig) -> Self {
        Self::new(
            config.max_block_size,
            config.trailer_search_limit,
            config.window_size,
        )
    }

    /// Bytes read from the source while searching for trailers.
    pub fn bytes_scanned(&self) -> u64 {
        self.bytes_scanned
    }

    /// End offset (exclusive) of the candidate starting at `start`.
    ///
    /// Containers end after their end-of-central-directory record when one is
    /// found; otherwise, and always for compound files, the carve is bounded by
    /// `max_block_size`. Both are clamped to the source end.
    pub fn locate_end<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        start: Offset,
        family: FormatFamily,
    ) -> Result<Offset> {
        let size = source.size();
        let bounded = start.saturating_add(self.max_block_size).min(size);

        match family {
            FormatFamily::Compound => Ok(bounded),
            FormatFamily::Container => match self.find_trailer(source, start)? {
                Some(eocd) => Ok((eocd + EOCD_SIZE).min(size)),
                None => Ok(bounded),
            },
        }
    }

    pub fn extract<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        start: Offset,
        family: FormatFamily,
    ) -> Result<CarveOutcome> {
        let mut candidate = Candidate::new(start, family);
        let end = self.locate_end(source, start, family)?;
        candidate.end = Some(end);

        let min = min_candidate_size(family);
        if candidate.len() < min {
            return Ok(CarveOutcome::Rejected(
                candidate,
                Rejection::CandidateTooSmall {
                    len: candidate.len(),
                    min,
                },
            ));
        }

        // An archive is only readable through its trailer; a carve that
        // provably holds none is rejected without reading it.
        if family == FormatFamily::Container && self.trailer_absent(start, end) {
            return Ok(CarveOutcome::Rejected(
                candidate,
                Rejection::StructuralValidationFailure(
                    "no end-of-central-directory record".into(),
                ),
            ));
        }

        let bytes = read_range(source, start, candidate.len() as usize)?;
        candidate.end = Some(start + bytes.len() as u64);
        Ok(CarveOutcome::Carved(CarvedCandidate { candidate, bytes }))
    }

    fn trailer_absent(&self, start: Offset, end: Offset) -> bool {
        let probe_end = end.saturating_sub(EOCD_SIGNATURE.len() as u64 - 1);
        matches!(
            self.last_scan.and_then(|scan| scan.answer(start, probe_end)),
            Some(None)
        )
    }

    /// Offset of the first trailer record at or after `start`, if it begins
    /// before the source end (or before the configured search limit).
    fn find_trailer<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        start: Offset,
    ) -> Result<Option<Offset>> {
        let size = source.size();
        let limit_end = match self.trailer_search_limit {
            Some(limit) => start.saturating_add(limit).min(size),
            None => size,
        };

        let resume_from = match self.last_scan {
            Some(scan) => {
                if let Some(answer) = scan.answer(start, limit_end) {
                    return Ok(answer);
                }
                // Nothing found so far: continue where the last scan stopped.
                match scan.found {
                    None if scan.from <= start && scan.scanned_to > start => {
                        Some((scan.from, scan.scanned_to))
                    }
                    _ => None,
                }
            }
            None => None,
        };

        let (from, pos) = resume_from.unwrap_or((start, start));
        let scan = self.scan_for_trailer(source, from, pos, limit_end)?;
        self.last_scan = Some(scan);

        Ok(scan.answer(start, limit_end).flatten())
    }

    fn scan_for_trailer<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        from: Offset,
        mut pos: Offset,
        limit_end: Offset,
    ) -> Result<TrailerScan> {
        let size = source.size();
        let finder = memmem::Finder::new(&EOCD_SIGNATURE);
        let carry = EOCD_SIGNATURE.len() as u64 - 1;

        loop {
            if pos >= limit_end {
                return Ok(TrailerScan { from, scanned_to: pos, found: None });
            }
            let n = fill_buffer(source, pos, &mut self.buffer)?;
            self.bytes_scanned += n as u64;
            if n == 0 {
                return Ok(TrailerScan { from, scanned_to: size, found: None });
            }
            if let Some(rel) = finder.find(&self.buffer[..n]) {
                let at = pos + rel as u64;
                return Ok(TrailerScan { from, scanned_to: at, found: Some(at) });
            }

            let chunk_end = pos + n as u64;
            if chunk_end >= size {
                return Ok(TrailerScan { from, scanned_to: size, found: None });
            }
            pos = chunk_end - carry;
        }
    }
}
