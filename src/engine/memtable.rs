//! TRIDENT - Memtable
//! Resizable chained hash table buffering recent writes, paired 1:1 with
//! a commit log. The sole mutable write target of the engine.
//!
//! Chains are an arena of nodes referenced by index, with each bucket
//! holding the index of its chain head. Deleting a key that is present
//! clears the node's value in place (the node stays in the chain); deleting
//! a key that is only visible in an older tier inserts a tombstone value so
//! lookups stop falling through to stale data.
//!
//! Locking is external: the owning store holds one reader-writer lock over
//! both of its memtables, which makes buffer rotation atomic with respect
//! to every concurrent read and write.

use std::path::Path;

use crate::engine::commit_log::{CommitLog, LogOp, LOG_FILE_NAME_PREFIX};
use crate::engine::hash::{BucketHash, ModuloHash};
use crate::error::Result;
use crate::types::{DataItem, KeyValuePair};

pub const INITIAL_CAPACITY: usize = 16;
pub const LOAD_FACTOR: f64 = 0.75;

struct Node {
    key: DataItem,
    /// `None` marks a cleared slot: the key was deleted while present here.
    value: Option<DataItem>,
    next: Option<usize>,
}

/// In-memory chained hash table over [`DataItem`] keys.
pub struct Memtable {
    capacity: usize,
    item_count: usize,
    /// Approximate sum of key+value lengths; drives flush-threshold
    /// decisions and is maintained incrementally, best-effort.
    byte_count: usize,
    buckets: Vec<Option<usize>>,
    nodes: Vec<Node>,
    hash: Box<dyn BucketHash>,
    log: CommitLog,
}

impl Memtable {
    /// Create an empty memtable with a fresh commit log in `dir`.
    pub fn create(dir: &Path) -> Result<Self> {
        let identity: u64 = rand::random();
        let log_path = dir.join(format!("{LOG_FILE_NAME_PREFIX}{identity:016x}"));
        Ok(Self::with_log(CommitLog::open(log_path)?))
    }

    /// Reconstruct a memtable by replaying an existing commit log in file
    /// order. Records are applied without re-appending them, so the rebuilt
    /// table matches the original bucket state, including resize points
    /// re-triggered by the same insert sequence.
    pub fn from_commit_log(mut log: CommitLog) -> Result<Self> {
        let records = log.replay()?;
        let mut mem = Self::with_log(log);

        for (op, pair) in records {
            match op {
                LogOp::Put => {
                    mem.put_internal(pair.key, pair.value, false);
                }
                LogOp::Delete => {
                    mem.delete_internal(&pair.key, false, false);
                }
                LogOp::Get => {}
            }
        }

        Ok(mem)
    }

    fn with_log(log: CommitLog) -> Self {
        Self {
            capacity: INITIAL_CAPACITY,
            item_count: 0,
            byte_count: 0,
            buckets: vec![None; INITIAL_CAPACITY],
            nodes: Vec::new(),
            hash: Box::new(ModuloHash::new(INITIAL_CAPACITY)),
            log,
        }
    }

    /// Look up a key's value.
    ///
    /// Returns the first matching chain node's value, which may itself be
    /// the tombstone sentinel. A cleared slot reports as absent, exactly
    /// like a key that was never inserted; callers that need to shadow
    /// older tiers must rely on the tombstone path of [`Memtable::delete`].
    pub fn get(&self, key: &DataItem) -> Option<&DataItem> {
        let index = self.hash.index(key);
        self.find_node(index, key)
            .and_then(|n| self.nodes[n].value.as_ref())
    }

    /// Insert or replace a key's value, appending a PUT record when
    /// `should_log` is set.
    ///
    /// Returns `false` only on a log-append I/O failure. A replacement is
    /// logged before memory is touched, so a failed replacement leaves the
    /// table unchanged; a fresh insert is already applied when the log
    /// write is attempted, a known best-effort limitation.
    pub fn put(&mut self, key: DataItem, value: DataItem, should_log: bool) -> bool {
        self.put_internal(key, value, should_log)
    }

    /// Delete a key.
    ///
    /// If the key resolves to a value in this table, a DELETE record
    /// carrying the old value is appended and the slot is cleared in place.
    /// Otherwise, when `mark_if_not_found` indicates the key may still be
    /// visible via an older tier, a tombstone value is inserted through a
    /// logged put. Returns `false` only on a log-append I/O failure.
    pub fn delete(&mut self, key: &DataItem, mark_if_not_found: bool) -> bool {
        self.delete_internal(key, mark_if_not_found, true)
    }

    /// All live key/value pairs, cleared slots skipped, in no particular
    /// order. Used by the flush path, which re-sorts into SSTable order.
    pub fn all_pairs(&self) -> Vec<KeyValuePair> {
        self.nodes
            .iter()
            .filter_map(|node| {
                node.value
                    .as_ref()
                    .map(|v| KeyValuePair::new(node.key.clone(), v.clone()))
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    /// Number of chain nodes, cleared slots included.
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Current bucket array size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Approximate total byte count of keys and values.
    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    /// Flush the commit log file to disk. Called on graceful shutdown.
    pub fn sync_log(&mut self) {
        self.log.sync();
    }

    /// Delete the paired commit log. Called once this memtable has been
    /// flushed into an SSTable.
    pub fn destroy_log(self) {
        self.log.destroy();
    }

    fn put_internal(&mut self, key: DataItem, value: DataItem, should_log: bool) -> bool {
        let index = self.hash.index(&key);

        if let Some(n) = self.find_node(index, &key) {
            // Replacement: log first so a failed append leaves memory
            // untouched.
            if should_log {
                let record = KeyValuePair::new(key, value.clone());
                if let Err(e) = self.log.append(LogOp::Put, &record) {
                    log::error!(
                        "failed to write to commit log file {:?}: {e}",
                        self.log.path()
                    );
                    return false;
                }
            }

            let old_len = self.nodes[n].value.as_ref().map_or(0, DataItem::len);
            self.byte_count = self.byte_count - old_len + value.len();
            self.nodes[n].value = Some(value);
            return true;
        }

        // Fresh insert: prepend a new chain node to the bucket.
        self.byte_count += key.len() + value.len();
        let node = Node {
            key: key.clone(),
            value: Some(value.clone()),
            next: self.buckets[index],
        };
        self.nodes.push(node);
        self.buckets[index] = Some(self.nodes.len() - 1);

        if self.needs_resize() {
            self.resize();
        }
        self.item_count += 1;

        if should_log {
            let record = KeyValuePair::new(key, value);
            if let Err(e) = self.log.append(LogOp::Put, &record) {
                log::error!(
                    "failed to write to commit log file {:?}: {e}",
                    self.log.path()
                );
                return false;
            }
        }

        true
    }

    fn delete_internal(&mut self, key: &DataItem, mark_if_not_found: bool, should_log: bool) -> bool {
        let index = self.hash.index(key);
        let found = self
            .find_node(index, key)
            .and_then(|n| self.nodes[n].value.clone().map(|v| (n, v)));

        if let Some((n, old_value)) = found {
            if should_log {
                let record = KeyValuePair::new(key.clone(), old_value.clone());
                if let Err(e) = self.log.append(LogOp::Delete, &record) {
                    log::error!(
                        "failed to write to commit log file {:?}: {e}",
                        self.log.path()
                    );
                    return false;
                }
            }

            self.byte_count = self
                .byte_count
                .saturating_sub(key.len() + old_value.len());
            self.nodes[n].value = None;
            true
        } else if mark_if_not_found {
            self.put_internal(key.clone(), DataItem::tombstone(), should_log)
        } else {
            true
        }
    }

    fn find_node(&self, bucket: usize, key: &DataItem) -> Option<usize> {
        let mut current = self.buckets[bucket];
        while let Some(n) = current {
            if self.nodes[n].key == *key {
                return Some(n);
            }
            current = self.nodes[n].next;
        }
        None
    }

    fn needs_resize(&self) -> bool {
        (self.item_count as f64) / (self.capacity as f64) >= LOAD_FACTOR
    }

    /// Double the capacity and rehash every chain node into a new bucket
    /// array. Chain order within a bucket may be reversed; order is not a
    /// contract.
    fn resize(&mut self) {
        self.capacity <<= 1;
        self.hash.set_capacity(self.capacity);

        let old_buckets = std::mem::replace(&mut self.buckets, vec![None; self.capacity]);
        for head in old_buckets {
            let mut current = head;
            while let Some(n) = current {
                let next = self.nodes[n].next;
                let bucket = self.hash.index(&self.nodes[n].key);
                self.nodes[n].next = self.buckets[bucket];
                self.buckets[bucket] = Some(n);
                current = next;
            }
        }
    }
}
