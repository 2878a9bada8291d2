//! TRIDENT - File Access Strategies
//! Pluggable low-level readers used by SSTable block scans. Both decode
//! the same fixed-length-prefixed record layout starting at an offset and
//! stopping at a limit offset; one reads via seek+read calls on the file
//! handle, the other positions into a memory-mapped view.
//!
//! The strategy is chosen once at table-open time and fixed for the
//! table's lifetime.

use std::fs::File;
use std::io::{Seek, SeekFrom};

use memmap2::Mmap;

use crate::engine::codec;
use crate::error::Result;
use crate::types::{DataItem, KeyValuePair};

/// Which file access strategy an SSTable uses for its record section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccessChoice {
    /// Seek + read calls on a file handle.
    Buffered,
    /// Memory-mapped reads. Offsets are truncated to 32-bit range, so this
    /// strategy is unsound for files whose scanned offsets exceed ~2 GiB.
    MemoryMapped,
}

impl FileAccessChoice {
    /// Build the chosen strategy over an open SSTable file.
    pub fn open(self, file: File) -> Result<Box<dyn FileAccess + Send>> {
        match self {
            FileAccessChoice::Buffered => Ok(Box::new(BufferedAccess::new(file))),
            FileAccessChoice::MemoryMapped => Ok(Box::new(MappedAccess::new(&file)?)),
        }
    }
}

/// Sequential record decoding over one region of an SSTable file.
///
/// Records inside a block are sorted by key, which both operations exploit
/// to stop early once a decoded key exceeds the target.
pub trait FileAccess: Send {
    /// Point lookup: decode records from `start` toward `limit`, returning
    /// the value of the first exact key match.
    fn find(&mut self, key: &DataItem, start: u64, limit: u64) -> Result<Option<DataItem>>;

    /// Block scan for the cache-fill path: look up `key` and also return
    /// the decoded block contents (possibly empty, in which case the
    /// caller must not cache anything).
    fn scan_block(
        &mut self,
        key: &DataItem,
        start: u64,
        limit: u64,
    ) -> Result<(Option<DataItem>, Vec<KeyValuePair>)>;
}

/// Buffered random access via seek + read on the file handle.
pub struct BufferedAccess {
    file: File,
}

impl BufferedAccess {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

impl FileAccess for BufferedAccess {
    fn find(&mut self, key: &DataItem, start: u64, limit: u64) -> Result<Option<DataItem>> {
        self.file.seek(SeekFrom::Start(start))?;
        let mut position = start;

        while position < limit {
            let pair = codec::read_record(&mut self.file)?;
            position += 8 + pair.key.len() as u64 + pair.value.len() as u64;

            if pair.key == *key {
                return Ok(Some(pair.value));
            }
            if pair.key > *key {
                break;
            }
        }

        Ok(None)
    }

    fn scan_block(
        &mut self,
        key: &DataItem,
        start: u64,
        limit: u64,
    ) -> Result<(Option<DataItem>, Vec<KeyValuePair>)> {
        self.file.seek(SeekFrom::Start(start))?;
        let mut position = start;
        let mut found = None;
        let mut block = Vec::new();

        // The whole block is decoded even after a match so the caller can
        // cache it.
        while position < limit {
            let pair = codec::read_record(&mut self.file)?;
            position += 8 + pair.key.len() as u64 + pair.value.len() as u64;

            if pair.key == *key {
                found = Some(pair.value.clone());
            }
            block.push(pair);
        }

        Ok((found, block))
    }
}

/// Memory-mapped access: the file is mapped once at open time and records
/// are decoded from slices of the mapping.
///
/// Offsets are truncated to 32 bits before positioning (a documented
/// limitation carried by this strategy); block contents are never
/// collected, since the page cache already keeps hot blocks resident.
pub struct MappedAccess {
    map: Mmap,
}

impl MappedAccess {
    pub fn new(file: &File) -> Result<Self> {
        // Safety: SSTable files are immutable once written and registered;
        // no writer exists for the mapped region.
        let map = unsafe { Mmap::map(file)? };
        Ok(Self { map })
    }

    fn region(&self, start: u64, limit: u64) -> &[u8] {
        let start = start as u32 as usize;
        let limit = (limit as u32 as usize).min(self.map.len());
        &self.map[start.min(limit)..limit]
    }
}

impl FileAccess for MappedAccess {
    fn find(&mut self, key: &DataItem, start: u64, limit: u64) -> Result<Option<DataItem>> {
        // Reading from a byte slice advances it, so the slice length is
        // the remaining distance to the limit offset.
        let mut region = self.region(start, limit);

        while !region.is_empty() {
            let pair = codec::read_record(&mut region)?;

            if pair.key == *key {
                return Ok(Some(pair.value));
            }
            if pair.key > *key {
                break;
            }
        }

        Ok(None)
    }

    fn scan_block(
        &mut self,
        key: &DataItem,
        start: u64,
        limit: u64,
    ) -> Result<(Option<DataItem>, Vec<KeyValuePair>)> {
        // No block is collected: virtual memory keeps the mapped pages
        // around, so caching decoded copies would only duplicate them.
        let found = self.find(key, start, limit)?;
        Ok((found, Vec::new()))
    }
}
