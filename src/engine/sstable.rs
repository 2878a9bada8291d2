//! TRIDENT - SSTable (Sorted String Table)
//! Immutable, sorted, indexed on-disk representation of a flushed
//! memtable. Point lookups go bloom filter → sparse index → block scan,
//! with decoded blocks kept in a bounded LRU cache.
//!
//! ## File Format
//! ```text
//! header (24 bytes): item_count(4BE) total_byte_count(4BE)
//!                    index_position(8BE) filter_position(8BE)
//! data   (24..index_position): records sorted by key, each
//!                    record_length(4BE) key_length(4BE) key value
//! index  (index_position..filter_position): one entry per up-to-128
//!                    records: key_length(4BE) key block_byte_count(4BE)
//!                    block_offset(8BE)
//! filter (filter_position..EOF): raw bloom-filter bitset bytes
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::engine::access::{FileAccess, FileAccessChoice};
use crate::engine::bloom::BloomFilter;
use crate::engine::cache::BlockCache;
use crate::engine::codec;
use crate::error::{Result, TridentError};
use crate::types::{DataItem, KeyValuePair};

/// File name prefix for SSTable files inside the data directory.
pub const SSTABLE_FILENAME_PREFIX: &str = "sstable-";

/// A sparse index entry covers up to this many consecutive records.
pub const INDEX_INTERVAL: usize = 128;

const HEADER_SIZE: u64 = 24;

/// One sparse index entry: the first key of a block, the block's file
/// offset, and its byte length.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub key: DataItem,
    pub offset: u64,
    pub byte_count: u32,
}

/// An immutable on-disk table. Never mutated after creation, only
/// superseded by newer tables covering the same keys.
pub struct SSTable {
    path: PathBuf,
    item_count: u32,
    byte_count: u32,
    index: Vec<IndexEntry>,
    filter: BloomFilter,
    access: Mutex<Box<dyn FileAccess + Send>>,
    cache: Mutex<BlockCache<DataItem, Vec<KeyValuePair>>>,
}

impl SSTable {
    /// Serialize a memtable's pairs into a new SSTable file in `dir`.
    ///
    /// Records are sorted, streamed out sequentially behind a reserved
    /// header, with the sparse index and bloom filter built in the same
    /// pass; the header is back-patched last.
    pub fn create(
        mut pairs: Vec<KeyValuePair>,
        dir: &Path,
        choice: FileAccessChoice,
        cache_capacity: usize,
    ) -> Result<SSTable> {
        pairs.sort();

        let path = dir.join(Self::new_file_name());
        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_all(&[0u8; HEADER_SIZE as usize])?;

        let mut filter = BloomFilter::new();
        let mut index: Vec<IndexEntry> = Vec::new();
        let mut offset = HEADER_SIZE;
        let mut block_byte_count: u32 = 0;
        let mut total_byte_count: u32 = 0;

        for (i, pair) in pairs.iter().enumerate() {
            filter.add(pair.key.as_bytes());

            if i % INDEX_INTERVAL == 0 {
                // Close out the previous block and open a new one at the
                // current record.
                if let Some(last) = index.last_mut() {
                    last.byte_count = block_byte_count;
                }
                block_byte_count = 0;
                index.push(IndexEntry {
                    key: pair.key.clone(),
                    offset,
                    byte_count: 0,
                });
            }

            pair.write_to(&mut writer)?;
            let record_size = pair.encoded_len() as u32;
            block_byte_count += record_size;
            total_byte_count += record_size;
            offset += record_size as u64;
        }
        if let Some(last) = index.last_mut() {
            last.byte_count = block_byte_count;
        }

        let index_position = offset;
        for entry in &index {
            writer.write_all(&(entry.key.len() as u32).to_be_bytes())?;
            writer.write_all(entry.key.as_bytes())?;
            writer.write_all(&entry.byte_count.to_be_bytes())?;
            writer.write_all(&entry.offset.to_be_bytes())?;
            offset += 4 + entry.key.len() as u64 + 4 + 8;
        }

        let filter_position = offset;
        writer.write_all(&filter.to_bytes())?;

        // Back-patch the header with the final counts and offsets.
        let mut file = writer.into_inner().map_err(|e| e.into_error())?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&(pairs.len() as u32).to_be_bytes())?;
        file.write_all(&total_byte_count.to_be_bytes())?;
        file.write_all(&index_position.to_be_bytes())?;
        file.write_all(&filter_position.to_be_bytes())?;
        file.sync_all()?;

        let access = choice.open(File::open(&path)?)?;
        Ok(SSTable {
            path,
            item_count: pairs.len() as u32,
            byte_count: total_byte_count,
            index,
            filter,
            access: Mutex::new(access),
            cache: Mutex::new(BlockCache::new(cache_capacity)),
        })
    }

    /// Re-open an existing SSTable file: header, index, and filter are
    /// loaded; record data stays on disk until a lookup needs it.
    pub fn open(
        path: impl Into<PathBuf>,
        choice: FileAccessChoice,
        cache_capacity: usize,
    ) -> Result<SSTable> {
        let path = path.into();
        let mut file = File::open(&path)?;
        let file_len = file.metadata()?.len();

        if file_len < HEADER_SIZE {
            return Err(TridentError::Corruption(format!(
                "sstable file {path:?} is shorter than its header"
            )));
        }

        let item_count = codec::read_u32(&mut file)?;
        let byte_count = codec::read_u32(&mut file)?;
        let index_position = codec::read_u64(&mut file)?;
        let filter_position = codec::read_u64(&mut file)?;

        if index_position > filter_position || filter_position > file_len {
            return Err(TridentError::Corruption(format!(
                "sstable file {path:?} has inconsistent section offsets"
            )));
        }

        file.seek(SeekFrom::Start(index_position))?;
        let mut index = Vec::new();
        let mut position = index_position;
        while position < filter_position {
            let key_length = codec::read_u32(&mut file)? as usize;
            let key = codec::read_bytes(&mut file, key_length)?;
            let byte_count = codec::read_u32(&mut file)?;
            let offset = codec::read_u64(&mut file)?;

            index.push(IndexEntry {
                key: DataItem::from(key),
                offset,
                byte_count,
            });
            position += 4 + key_length as u64 + 4 + 8;
        }

        let filter_bytes = codec::read_bytes(&mut file, (file_len - filter_position) as usize)?;
        let filter = BloomFilter::from_bytes(&filter_bytes);

        let access = choice.open(File::open(&path)?)?;
        Ok(SSTable {
            path,
            item_count,
            byte_count,
            index,
            filter,
            access: Mutex::new(access),
            cache: Mutex::new(BlockCache::new(cache_capacity)),
        })
    }

    /// Point lookup.
    ///
    /// 1. Bloom filter negative test, which answers a definite miss with
    ///    no I/O.
    /// 2. Sparse-index binary search for the block that could hold the key.
    /// 3. Cached block scan, if the block was decoded before.
    /// 4. File block scan via the access strategy; a non-empty decoded
    ///    block is cached under its leading key.
    pub fn get(&self, key: &DataItem) -> Result<Option<DataItem>> {
        if !self.filter.contains(key.as_bytes()) {
            return Ok(None);
        }

        let Some(entry) = self.locate_block(key) else {
            return Ok(None);
        };

        {
            let mut cache = self.cache.lock().unwrap();
            if let Some(block) = cache.get(&entry.key) {
                let hit = block
                    .iter()
                    .find(|pair| pair.key == *key)
                    .map(|pair| pair.value.clone());
                return Ok(hit);
            }
        }

        let (found, block) = self.access.lock().unwrap().scan_block(
            key,
            entry.offset,
            entry.offset + entry.byte_count as u64,
        )?;

        if !block.is_empty() {
            self.cache.lock().unwrap().insert(entry.key.clone(), block);
        }
        Ok(found)
    }

    /// Greatest index entry whose key is ≤ the target, if any.
    fn locate_block(&self, key: &DataItem) -> Option<&IndexEntry> {
        let after = self.index.partition_point(|entry| entry.key <= *key);
        if after == 0 {
            return None;
        }
        Some(&self.index[after - 1])
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Registry key: the file name, which embeds the creation timestamp.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn item_count(&self) -> u32 {
        self.item_count
    }

    /// Total encoded byte count of the record section.
    pub fn byte_count(&self) -> u32 {
        self.byte_count
    }

    pub fn index(&self) -> &[IndexEntry] {
        &self.index
    }

    /// Number of decoded blocks currently cached.
    pub fn cached_blocks(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    /// Zero-padded nanosecond timestamp plus a random suffix: string order
    /// of file names matches creation order.
    fn new_file_name() -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let suffix: u32 = rand::random();
        format!("{SSTABLE_FILENAME_PREFIX}{nanos:020}-{suffix:08x}")
    }
}

/// Store-owned registry of every known SSTable, sorted by file name
/// (newest last). Lookups snapshot the membership under a short critical
/// section, then scan newest-first without holding the lock.
#[derive(Clone, Default)]
pub struct SstRegistry {
    inner: Arc<Mutex<BTreeMap<String, Arc<SSTable>>>>,
}

impl SstRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, table: SSTable) {
        let mut tables = self.inner.lock().unwrap();
        tables.insert(table.file_name(), Arc::new(table));
    }

    /// Query every registered table newest-first until a hit.
    pub fn find(&self, key: &DataItem) -> Option<DataItem> {
        let snapshot: Vec<Arc<SSTable>> = {
            let tables = self.inner.lock().unwrap();
            tables.values().rev().cloned().collect()
        };

        for table in snapshot {
            match table.get(key) {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(e) => {
                    log::error!("cannot read sstable file {:?}: {e}", table.path());
                }
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(s: &str) -> DataItem {
        DataItem::from(s.as_bytes())
    }

    fn pairs(n: usize) -> Vec<KeyValuePair> {
        (0..n)
            .map(|i| {
                KeyValuePair::new(item(&format!("key_{i:03}")), item(&format!("value_{i:03}")))
            })
            .collect()
    }

    #[test]
    fn test_create_and_find_all_records() {
        let dir = tempfile::tempdir().unwrap();

        for choice in [FileAccessChoice::Buffered, FileAccessChoice::MemoryMapped] {
            let table = SSTable::create(pairs(1000), dir.path(), choice, 100).unwrap();

            assert_eq!(table.item_count(), 1000);
            for i in 0..1000 {
                assert_eq!(
                    table.get(&item(&format!("key_{i:03}"))).unwrap(),
                    Some(item(&format!("value_{i:03}"))),
                    "missing key_{i:03} with {choice:?}"
                );
            }
            assert_eq!(table.get(&item("not_there")).unwrap(), None);
        }
    }

    #[test]
    fn test_index_block_sizing() {
        let dir = tempfile::tempdir().unwrap();
        // 300 records of fixed size: key 7 bytes, value 9 bytes,
        // 8 bytes of length prefixes → 24 bytes per record on disk.
        let table =
            SSTable::create(pairs(300), dir.path(), FileAccessChoice::Buffered, 100).unwrap();

        let index = table.index();
        assert_eq!(index.len(), 3);

        assert_eq!(index[0].key, item("key_000"));
        assert_eq!(index[1].key, item("key_128"));
        assert_eq!(index[2].key, item("key_256"));

        assert_eq!(index[0].byte_count, 128 * 24);
        assert_eq!(index[1].byte_count, 128 * 24);
        assert_eq!(index[2].byte_count, 44 * 24);

        assert_eq!(index[0].offset, 24);
        assert_eq!(index[1].offset, 24 + 128 * 24);
        assert_eq!(index[2].offset, 24 + 2 * 128 * 24);

        assert_eq!(table.byte_count(), 300 * 24);
    }

    #[test]
    fn test_reopen_serves_same_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let table =
                SSTable::create(pairs(300), dir.path(), FileAccessChoice::Buffered, 100).unwrap();
            table.path().to_path_buf()
        };

        let reopened = SSTable::open(&path, FileAccessChoice::Buffered, 100).unwrap();
        assert_eq!(reopened.item_count(), 300);
        assert_eq!(reopened.index().len(), 3);

        for i in 0..300 {
            assert_eq!(
                reopened.get(&item(&format!("key_{i:03}"))).unwrap(),
                Some(item(&format!("value_{i:03}")))
            );
        }
    }

    #[test]
    fn test_open_rejects_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sstable-bogus");
        std::fs::write(&path, [0u8; 10]).unwrap();

        assert!(SSTable::open(&path, FileAccessChoice::Buffered, 100).is_err());
    }

    #[test]
    fn test_lookup_before_first_index_key_misses() {
        let dir = tempfile::tempdir().unwrap();
        let table =
            SSTable::create(pairs(10), dir.path(), FileAccessChoice::Buffered, 100).unwrap();

        // "key_" sorts before "key_000", so no index block can hold it.
        // The bloom filter may pass (its bytes are covered), but the index
        // search must still miss.
        assert_eq!(table.get(&item("key_")).unwrap(), None);
    }

    #[test]
    fn test_block_cache_fills_on_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let table =
            SSTable::create(pairs(300), dir.path(), FileAccessChoice::Buffered, 100).unwrap();

        assert_eq!(table.cached_blocks(), 0);
        table.get(&item("key_005")).unwrap();
        assert_eq!(table.cached_blocks(), 1);

        // Same block again: served from cache, nothing new cached.
        table.get(&item("key_006")).unwrap();
        assert_eq!(table.cached_blocks(), 1);

        // A different block loads separately.
        table.get(&item("key_200")).unwrap();
        assert_eq!(table.cached_blocks(), 2);
    }

    #[test]
    fn test_registry_finds_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SstRegistry::new();

        let older = SSTable::create(
            vec![KeyValuePair::new(item("shared"), item("old"))],
            dir.path(),
            FileAccessChoice::Buffered,
            100,
        )
        .unwrap();
        registry.register(older);

        let newer = SSTable::create(
            vec![KeyValuePair::new(item("shared"), item("new"))],
            dir.path(),
            FileAccessChoice::Buffered,
            100,
        )
        .unwrap();
        registry.register(newer);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.find(&item("shared")), Some(item("new")));
        assert_eq!(registry.find(&item("absent")), None);
    }
}
