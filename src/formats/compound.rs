//! Compound (CFB) validation.
//!
//! A complete file is opened with `cfb`. A carve cut short by the fixed block
//! fails `cfb`'s allocation-table checks, so the directory is then read
//! straight from the sectors that are present.

use std::collections::HashSet;
use std::io::Cursor;

use tracing::debug;

use crate::error::ValidationError;
use crate::types::{COMPOUND_MAGIC, ENCRYPTION_STREAMS, PRIMARY_STREAM_NAME, ValidationResult};

const HEADER_LEN: usize = 512;
const HEADER_DIFAT_ENTRIES: usize = 109;
const DIR_ENTRY_LEN: usize = 128;

const MAX_REGULAR_SECTOR: u32 = 0xFFFF_FFFA;
const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
const NO_STREAM: u32 = 0xFFFF_FFFF;

const OBJ_STREAM: u8 = 2;
const OBJ_ROOT: u8 = 5;

pub fn validate_compound(bytes: &[u8]) -> Result<ValidationResult, ValidationError> {
    let (has_primary_content, encrypted) = match cfb::CompoundFile::open(Cursor::new(bytes)) {
        Ok(compound) => {
            let has_primary = compound.walk().any(|entry| {
                entry.is_stream() && entry.path().to_string_lossy().contains(PRIMARY_STREAM_NAME)
            });
            let encrypted = ENCRYPTION_STREAMS
                .iter()
                .any(|name| compound.exists(format!("/{}", name)));
            (has_primary, encrypted)
        }
        Err(err) => {
            let reason = match ValidationError::from_parser_io(err) {
                ValidationError::Malformed(reason) => reason,
                io => return Err(io),
            };
            let Some(directory) = PartialDirectory::read(bytes) else {
                return Err(ValidationError::Malformed(reason));
            };
            debug!(
                "compound candidate read from present sectors ({} entries): {}",
                directory.entries.len(),
                reason
            );
            (directory.has_primary_stream(), directory.has_encryption_stream())
        }
    };

    if !has_primary_content {
        return Ok(ValidationResult {
            encrypted,
            ..ValidationResult::invalid(format!("no {} stream", PRIMARY_STREAM_NAME))
        });
    }

    Ok(ValidationResult {
        valid: true,
        reason: String::new(),
        encrypted,
        has_primary_content,
        media_entry_names: Vec::new(),
    })
}

fn le_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(bytes.get(at..at + 2)?.try_into().ok()?))
}

fn le_u32(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(at..at + 4)?.try_into().ok()?))
}

/// Sectors of a compound file that may end mid-file.
struct Sectors<'a> {
    bytes: &'a [u8],
    sector_len: usize,
    /// FAT sector ids in FAT order, as listed by the DIFAT.
    fat_sectors: Vec<u32>,
}

impl<'a> Sectors<'a> {
    fn read(bytes: &'a [u8]) -> Option<Self> {
        let header = bytes.get(..HEADER_LEN)?;
        if header[..COMPOUND_MAGIC.len()] != COMPOUND_MAGIC || le_u16(header, 28)? != 0xFFFE {
            return None;
        }
        let sector_len = match (le_u16(header, 26)?, le_u16(header, 30)?) {
            (3, 9) => 512,
            (4, 12) => 4096,
            _ => return None,
        };

        let mut sectors = Self {
            bytes,
            sector_len,
            fat_sectors: (0..HEADER_DIFAT_ENTRIES)
                .filter_map(|i| le_u32(header, 76 + 4 * i))
                .collect(),
        };

        // DIFAT sectors beyond the carve leave the tail of the FAT unknown.
        let per_difat = sector_len / 4 - 1;
        let mut seen = HashSet::new();
        let mut current = le_u32(header, 68)?;
        while current <= MAX_REGULAR_SECTOR && seen.insert(current) {
            let Some(sector) = sectors.sector(current) else {
                break;
            };
            let listed: Vec<u32> = (0..per_difat).filter_map(|i| le_u32(sector, 4 * i)).collect();
            let next = le_u32(sector, 4 * per_difat)?;
            sectors.fat_sectors.extend(listed);
            current = next;
        }

        Some(sectors)
    }

    fn sector(&self, id: u32) -> Option<&'a [u8]> {
        if id > MAX_REGULAR_SECTOR {
            return None;
        }
        let start = (id as usize + 1).checked_mul(self.sector_len)?;
        self.bytes.get(start..start.checked_add(self.sector_len)?)
    }

    /// Next sector of a chain, if the FAT sector describing `id` is present.
    fn next(&self, id: u32) -> Option<u32> {
        let per_fat = self.sector_len / 4;
        let fat_sector = *self.fat_sectors.get(id as usize / per_fat)?;
        le_u32(self.sector(fat_sector)?, (id as usize % per_fat) * 4)
    }
}

struct DirEntry {
    name: String,
    object_type: u8,
    left: u32,
    right: u32,
    child: u32,
}

impl DirEntry {
    fn parse(raw: &[u8]) -> Option<Self> {
        let name_len = (le_u16(raw, 64)? as usize).min(64);
        let units: Vec<u16> = (0..(name_len / 2).saturating_sub(1))
            .filter_map(|i| le_u16(raw, 2 * i))
            .collect();
        Some(Self {
            name: String::from_utf16_lossy(&units),
            object_type: raw[66],
            left: le_u32(raw, 68)?,
            right: le_u32(raw, 72)?,
            child: le_u32(raw, 76)?,
        })
    }
}

/// Directory entries reachable through the sectors present in a carve.
struct PartialDirectory {
    entries: Vec<DirEntry>,
}

impl PartialDirectory {
    fn read(bytes: &[u8]) -> Option<Self> {
        let sectors = Sectors::read(bytes)?;
        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        let mut current = le_u32(bytes, 48)?;

        while current != END_OF_CHAIN {
            if current > MAX_REGULAR_SECTOR || !seen.insert(current) {
                return None;
            }
            let Some(sector) = sectors.sector(current) else {
                break;
            };
            entries.extend(sector.chunks_exact(DIR_ENTRY_LEN).filter_map(DirEntry::parse));
            match sectors.next(current) {
                Some(next) => current = next,
                None => break,
            }
        }

        match entries.first() {
            Some(root) if root.object_type == OBJ_ROOT => Some(Self { entries }),
            _ => None,
        }
    }

    fn has_primary_stream(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.object_type == OBJ_STREAM && e.name.contains(PRIMARY_STREAM_NAME))
    }

    /// Names of the root storage's children (a sibling tree under the root).
    fn root_children(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut visited = HashSet::new();
        let mut pending = vec![self.entries[0].child];

        while let Some(id) = pending.pop() {
            if id == NO_STREAM || !visited.insert(id) {
                continue;
            }
            let Some(entry) = self.entries.get(id as usize) else {
                continue;
            };
            names.push(entry.name.as_str());
            pending.push(entry.left);
            pending.push(entry.right);
        }
        names
    }

    fn has_encryption_stream(&self) -> bool {
        let children = self.root_children();
        ENCRYPTION_STREAMS.iter().any(|name| children.contains(name))
    }
}
