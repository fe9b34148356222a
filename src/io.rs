//! Byte sources the carving engine reads from.
//!
//! Everything downstream only sees [`ByteSource`], so a whole dump, a
//! memory-mapped image and a pre-filtered fragment held in memory all go
//! through the same scan/carve/validate path.

use crate::error::{CarveError, Result};
use memmap2::Mmap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Random-access, read-only byte sequence addressed by absolute offset.
pub trait ByteSource {
    /// Reads up to `buffer.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read; fewer than requested only at the end
    /// of the source, zero at or past the end.
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize>;

    /// Total size of the source in bytes.
    fn size(&self) -> u64;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        (**self).read_chunk(offset, buffer)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

/// Fills `buffer` from `offset`, stopping early only at the end of the source.
pub fn fill_buffer<S: ByteSource + ?Sized>(
    source: &mut S,
    offset: u64,
    buffer: &mut [u8],
) -> Result<usize> {
    let mut filled = 0;

    while filled < buffer.len() {
        let n = source.read_chunk(offset + filled as u64, &mut buffer[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    Ok(filled)
}

/// Reads `len` bytes at `offset`, stopping early only at the end of the source.
pub fn read_range<S: ByteSource + ?Sized>(
    source: &mut S,
    offset: u64,
    len: usize,
) -> Result<Vec<u8>> {
    let mut data = vec![0u8; len];
    let filled = fill_buffer(source, offset, &mut data)?;
    data.truncate(filled);
    Ok(data)
}

fn read_error(offset: u64, source: io::Error) -> CarveError {
    CarveError::StreamRead { offset, source }
}

/// Positioned reads on a regular file or block device.
pub struct FileSource {
    file: File,
    size: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .open(path.as_ref())
            .map_err(|e| read_error(0, e))?;

        #[cfg(target_os = "linux")]
        {
            use rustix::fs::{Advice, fadvise};
            let _ = fadvise(&file, 0, None, Advice::Sequential);
        }

        let size = file.seek(SeekFrom::End(0)).map_err(|e| read_error(0, e))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| read_error(0, e))?;

        Ok(Self { file, size })
    }
}

impl ByteSource for FileSource {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        if offset >= self.size {
            return Ok(0);
        }
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| read_error(offset, e))?;

        let mut filled = 0;
        while filled < buffer.len() {
            match self.file.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(read_error(offset + filled as u64, e)),
            }
        }
        Ok(filled)
    }

    #[inline]
    fn size(&self) -> u64 {
        self.size
    }
}

pub struct MmapSource {
    mmap: Mmap,
}

impl MmapSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| read_error(0, e))?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| read_error(0, e))?;

        if mmap.is_empty() {
            return Err(read_error(
                0,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "mmap returned empty mapping (empty file or block device)",
                ),
            ));
        }

        #[cfg(unix)]
        {
            let _ = mmap.advise(memmap2::Advice::Sequential);
        }

        Ok(Self { mmap })
    }

    #[inline]
    pub fn slice(&self, offset: u64, len: usize) -> Option<&[u8]> {
        let start = usize::try_from(offset).ok()?;
        if start >= self.mmap.len() {
            return None;
        }
        let end = start.saturating_add(len).min(self.mmap.len());
        Some(&self.mmap[start..end])
    }
}

impl ByteSource for MmapSource {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        match self.slice(offset, buffer.len()) {
            Some(slice) => {
                buffer[..slice.len()].copy_from_slice(slice);
                Ok(slice.len())
            }
            None => Ok(0),
        }
    }

    #[inline]
    fn size(&self) -> u64 {
        self.mmap.len() as u64
    }
}

/// In-memory source, e.g. a fragment already extracted from a dump.
#[derive(Debug, Clone)]
pub struct MemorySource<T> {
    data: T,
}

impl<T: AsRef<[u8]>> MemorySource<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }

    pub fn into_inner(self) -> T {
        self.data
    }
}

impl<T: AsRef<[u8]>> ByteSource for MemorySource<T> {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        let data = self.data.as_ref();
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= data.len() {
            return Ok(0);
        }
        let n = buffer.len().min(data.len() - start);
        buffer[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    #[inline]
    fn size(&self) -> u64 {
        self.data.as_ref().len() as u64
    }
}

/// Opens a path as a memory map when possible, falling back to positioned reads
/// (block devices and empty files cannot be mapped).
pub enum Reader {
    Mmap(MmapSource),
    File(FileSource),
}

impl Reader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match MmapSource::open(path) {
            Ok(r) => Ok(Reader::Mmap(r)),
            Err(_) => Ok(Reader::File(FileSource::open(path)?)),
        }
    }

    #[inline]
    pub fn is_mmap(&self) -> bool {
        matches!(self, Reader::Mmap(_))
    }
}

impl ByteSource for Reader {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        match self {
            Reader::Mmap(r) => r.read_chunk(offset, buffer),
            Reader::File(r) => r.read_chunk(offset, buffer),
        }
    }

    #[inline]
    fn size(&self) -> u64 {
        match self {
            Reader::Mmap(r) => r.size(),
            Reader::File(r) => r.size(),
        }
    }
}
