//! Bounded-window scanning of a byte source.
//!
//! [`WindowScanner`] walks the source in fixed windows, carrying the tail of
//! each window into the next so that a signature split by a window join is
//! still seen whole. [`SignatureLocator`] answers "where is the next signature
//! of either family" for the orchestrator without buffering the whole source.

use aho_corasick::{AhoCorasick, MatchKind};
use memchr::memmem;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::CarveConfig;
use crate::error::{CarveError, Result};
use crate::io::{ByteSource, fill_buffer};
use crate::types::{FormatFamily, LONGEST_MAGIC, Offset, ScanStats, Signature};

/// One scan window: carried bytes from the previous window followed by
/// freshly read bytes.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    /// Absolute offset of `data[0]`.
    pub offset: Offset,
    /// Number of leading bytes carried over from the previous window.
    pub carried: usize,
    pub data: &'a [u8],
}

impl<'a> Window<'a> {
    /// Absolute offset of the first byte read for this window.
    pub fn fresh_offset(&self) -> Offset {
        self.offset + self.carried as u64
    }

    /// Positions (relative to `data`) of occurrences that end in the fresh
    /// bytes. Occurrences entirely inside the carried prefix were already
    /// reported by the previous window.
    pub fn signature_positions<'f>(
        self,
        finder: &'f memmem::Finder<'f>,
    ) -> impl Iterator<Item = usize> + 'f
    where
        'a: 'f,
    {
        let carried = self.carried;
        let needle_len = finder.needle().len();
        finder
            .find_iter(self.data)
            .filter(move |&pos| pos + needle_len > carried)
    }
}

/// Walks a source window by window with a single reusable buffer of
/// `overlap + window` bytes.
pub struct WindowScanner<S> {
    source: S,
    window_size: usize,
    overlap_size: usize,
    buffer: Vec<u8>,
    carried: usize,
    pending: usize,
    next_offset: Offset,
    windows_read: u64,
}

impl<S: ByteSource> WindowScanner<S> {
    pub fn new(source: S, window_size: usize, overlap_size: usize) -> Self {
        Self {
            source,
            window_size,
            overlap_size,
            buffer: vec![0u8; overlap_size + window_size],
            carried: 0,
            pending: 0,
            next_offset: 0,
            windows_read: 0,
        }
    }

    pub fn from_config(source: S, config: &CarveConfig) -> Self {
        Self::new(source, config.window_size, config.overlap_size)
    }

    pub fn next_window(&mut self) -> Result<Option<Window<'_>>> {
        if self.pending > 0 {
            let keep = self.overlap_size.min(self.pending);
            self.buffer.copy_within(self.pending - keep..self.pending, 0);
            self.carried = keep;
            self.pending = 0;
        }

        if self.next_offset >= self.source.size() {
            return Ok(None);
        }

        let carried = self.carried;
        let n = fill_buffer(
            &mut self.source,
            self.next_offset,
            &mut self.buffer[carried..carried + self.window_size],
        )?;
        if n == 0 {
            return Ok(None);
        }

        let offset = self.next_offset - carried as u64;
        self.next_offset += n as u64;
        self.pending = carried + n;
        self.windows_read += 1;

        Ok(Some(Window {
            offset,
            carried,
            data: &self.buffer[..carried + n],
        }))
    }

    pub fn windows_read(&self) -> u64 {
        self.windows_read
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

/// Counts scan slots and fragment hits for one signature family.
///
/// A window is a fragment hit when it holds a fresh occurrence of the magic
/// followed, within the window, by the family's marker. When `fragments_dir`
/// is given each hit is written from the magic to the window end as
/// `fragment_{n}.bin`, so it can be fed back in as a source on its own.
pub fn scan_fragments<S: ByteSource>(
    source: S,
    signature: Signature,
    config: &CarveConfig,
    fragments_dir: Option<&Path>,
) -> Result<ScanStats> {
    config.validate()?;

    if let Some(dir) = fragments_dir {
        fs::create_dir_all(dir).map_err(|e| CarveError::OutputDirectory {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }

    let magic = memmem::Finder::new(signature.magic);
    let marker = memmem::Finder::new(signature.marker);
    let mut scanner = WindowScanner::from_config(source, config);
    let mut stats = ScanStats::default();

    while let Some(window) = scanner.next_window()? {
        stats.slots_scanned += 1;

        let Some(pos) = window.signature_positions(&magic).next() else {
            continue;
        };
        if marker.find(&window.data[pos..]).is_none() {
            continue;
        }

        stats.valid_fragments_found += 1;
        debug!(
            offset = window.offset + pos as u64,
            family = %signature.family,
            "fragment hit"
        );

        if let Some(dir) = fragments_dir {
            let path = fragment_path(dir, stats.valid_fragments_found);
            fs::write(&path, &window.data[pos..])
                .map_err(|e| CarveError::Persist { path, source: e })?;
        }
    }

    Ok(stats)
}

pub fn fragment_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("fragment_{}.bin", index))
}

/// Finds the nearest signature of any registered family at or after a cursor.
///
/// Families are registered in precedence order: when two magics start at the
/// same offset the earlier family wins.
pub struct SignatureLocator {
    automaton: AhoCorasick,
    families: Vec<FormatFamily>,
    longest: usize,
    buffer: Vec<u8>,
    buf_start: Offset,
    buf_len: usize,
    windows_read: u64,
}

impl SignatureLocator {
    /// Container first: an archive may incidentally contain bytes that look
    /// like a compound header, never the other way round.
    pub fn new(window_size: usize) -> Result<Self> {
        Self::with_signatures(&[Signature::CONTAINER, Signature::COMPOUND], window_size)
    }

    /// Earlier signatures win when two match at the same offset.
    pub fn with_signatures(signatures: &[Signature], window_size: usize) -> Result<Self> {
        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostFirst)
            .build(signatures.iter().map(|s| s.magic))
            .map_err(|e| {
                CarveError::InvalidConfig(format!("cannot build signature matcher: {}", e))
            })?;
        let longest = signatures
            .iter()
            .map(|s| s.magic.len())
            .max()
            .unwrap_or(LONGEST_MAGIC);

        Ok(Self {
            automaton,
            families: signatures.iter().map(|s| s.family).collect(),
            longest,
            buffer: vec![0u8; window_size.max(longest)],
            buf_start: 0,
            buf_len: 0,
            windows_read: 0,
        })
    }

    pub fn windows_read(&self) -> u64 {
        self.windows_read
    }

    pub fn find_next<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        cursor: Offset,
    ) -> Result<Option<(Offset, FormatFamily)>> {
        let size = source.size();
        let mut pos = cursor;

        loop {
            if pos >= size {
                return Ok(None);
            }
            if !self.covers(pos, size) {
                self.fill(source, pos)?;
            }

            let rel = (pos - self.buf_start) as usize;
            let haystack = &self.buffer[rel..self.buf_len];
            let at_end = self.buf_start + self.buf_len as u64 >= size;
            // A magic starting in the last `longest - 1` bytes may be cut off,
            // so matches there are only trusted at the end of the source.
            let safe = if at_end {
                haystack.len()
            } else {
                haystack.len().saturating_sub(self.longest - 1)
            };

            if let Some(m) = self.automaton.find(haystack) {
                if m.start() < safe {
                    let family = self.families[m.pattern().as_usize()];
                    return Ok(Some((pos + m.start() as u64, family)));
                }
            }
            if at_end {
                return Ok(None);
            }
            pos = (pos + safe as u64).max(pos + 1);
        }
    }

    fn covers(&self, pos: Offset, size: u64) -> bool {
        let buf_end = self.buf_start + self.buf_len as u64;
        self.buf_len > 0
            && pos >= self.buf_start
            && pos < buf_end
            && (buf_end - pos >= self.longest as u64 || buf_end == size)
    }

    fn fill<S: ByteSource + ?Sized>(&mut self, source: &mut S, pos: Offset) -> Result<()> {
        self.buf_len = fill_buffer(source, pos, &mut self.buffer)?;
        self.buf_start = pos;
        self.windows_read += 1;
        Ok(())
    }
}
