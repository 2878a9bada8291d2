//! TRIDENT - LSM Storage Engine
//! Orchestrates the write path (primary memtable + commit log), the
//! double-buffered flush path (secondary memtable → SSTable), and the
//! tiered read path (primary → secondary → SSTables newest-first).

pub mod access;
pub mod bloom;
pub mod cache;
pub mod codec;
pub mod commit_log;
pub mod hash;
pub mod memtable;
pub mod sstable;

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

use crate::config::Config;
use crate::engine::commit_log::{CommitLog, LOG_FILE_NAME_PREFIX};
use crate::engine::memtable::Memtable;
use crate::engine::sstable::{SSTable, SstRegistry, SSTABLE_FILENAME_PREFIX};
use crate::error::{Result, TridentError};
use crate::types::DataItem;

/// The two memtable generations, guarded together by one reader-writer
/// lock so buffer rotation is atomic with respect to every read and write.
struct MemtablePair {
    /// Write target and freshest read tier.
    primary: Memtable,
    /// Read-only generation awaiting flush.
    secondary: Memtable,
}

struct Shared {
    config: Config,
    tables: RwLock<MemtablePair>,
    registry: SstRegistry,
}

struct SchedulerHandle {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

/// The embeddable key-value store.
///
/// Writes land in the primary memtable behind its commit log; a background
/// scheduler rotates the buffers and flushes full memtables into immutable
/// SSTables. Reads walk the tiers newest-first.
pub struct KeyValueStore {
    shared: Arc<Shared>,
    scheduler: Mutex<Option<SchedulerHandle>>,
}

impl KeyValueStore {
    /// Open a store over `config.data_dir`, recovering any state left by a
    /// previous process.
    ///
    /// The two most recent commit logs are replayed into the primary and
    /// secondary memtables; every readable SSTable file is registered. A
    /// directory with exactly one commit log cannot be mapped onto both
    /// generations and is refused.
    pub fn open(config: Config) -> Result<KeyValueStore> {
        config.ensure_dirs()?;

        let log_paths = files_with_prefix(&config.data_dir, LOG_FILE_NAME_PREFIX)?;
        let (primary, secondary) = if log_paths.is_empty() {
            (
                Memtable::create(&config.data_dir)?,
                Memtable::create(&config.data_dir)?,
            )
        } else {
            let mut logs = log_paths
                .into_iter()
                .map(CommitLog::open)
                .collect::<Result<Vec<_>>>()?;
            logs.sort_by_key(CommitLog::last_modified);

            let (Some(newest), Some(second)) = (logs.pop(), logs.pop()) else {
                return Err(TridentError::Startup(
                    "data directory holds a single commit log; recovery needs both \
                     memtable generations"
                        .into(),
                ));
            };
            for stale in logs {
                log::warn!("ignoring extra commit log file {:?}", stale.path());
            }

            log::info!(
                "recovering memtables from commit logs {:?} and {:?}",
                newest.path(),
                second.path()
            );
            (
                Memtable::from_commit_log(newest)?,
                Memtable::from_commit_log(second)?,
            )
        };

        let registry = SstRegistry::new();
        for path in files_with_prefix(&config.data_dir, SSTABLE_FILENAME_PREFIX)? {
            match SSTable::open(&path, config.file_access, config.block_cache_capacity) {
                Ok(table) => registry.register(table),
                Err(e) => log::error!("skipping unreadable sstable file {path:?}: {e}"),
            }
        }
        log::info!(
            "store opened at {:?} with {} sstable(s)",
            config.data_dir,
            registry.len()
        );

        Ok(KeyValueStore {
            shared: Arc::new(Shared {
                config,
                tables: RwLock::new(MemtablePair { primary, secondary }),
                registry,
            }),
            scheduler: Mutex::new(None),
        })
    }

    /// Look up a key across every tier, newest-first.
    ///
    /// A tombstone value in either memtable hides the key without touching
    /// older tiers. A key deleted in place (cleared slot) reports as absent
    /// in its memtable and falls through to the next tier.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let key = DataItem::from(key);

        {
            let tables = self.shared.tables.read().unwrap();
            if let Some(value) = tables.primary.get(&key) {
                return live(value);
            }
            if let Some(value) = tables.secondary.get(&key) {
                return live(value);
            }
        }

        self.shared
            .registry
            .find(&key)
            .and_then(|value| live(&value))
    }

    /// Insert or replace a key. Returns `false` only when the commit log
    /// append fails.
    pub fn put(&self, key: &[u8], value: &[u8]) -> bool {
        let mut tables = self.shared.tables.write().unwrap();
        tables
            .primary
            .put(DataItem::from(key), DataItem::from(value), true)
    }

    /// Delete a key.
    ///
    /// When the key is still visible through an older tier, the primary
    /// memtable receives a tombstone so reads stop falling through;
    /// otherwise the primary entry is cleared in place (or nothing happens
    /// at all). Returns `false` only when the commit log append fails.
    pub fn delete(&self, key: &[u8]) -> bool {
        let key = DataItem::from(key);

        // The visibility probe runs under the read lock; a writer sneaking
        // in before the write lock below can at worst turn a no-op delete
        // into a redundant tombstone.
        let below = {
            let tables = self.shared.tables.read().unwrap();
            tables.secondary.get(&key).cloned()
        };
        let visible_below = match below {
            Some(value) => !value.is_tombstone(),
            None => self
                .shared
                .registry
                .find(&key)
                .is_some_and(|value| !value.is_tombstone()),
        };

        let mut tables = self.shared.tables.write().unwrap();
        tables.primary.delete(&key, visible_below)
    }

    /// Rotate the memtable buffers and persist the retired generation as
    /// an SSTable.
    pub fn flush(&self) -> Result<()> {
        self.shared.flush()
    }

    /// Start the background scheduler that flushes the primary memtable
    /// once it crosses the configured byte threshold. Idempotent.
    pub fn start(&self) {
        let mut guard = self.scheduler.lock().unwrap();
        if guard.is_some() {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(shared.config.flush_interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let byte_count = shared.tables.read().unwrap().primary.byte_count();
                    if byte_count >= shared.config.flush_threshold {
                        log::info!(
                            "primary memtable at {byte_count} bytes, triggering flush"
                        );
                        if let Err(e) = shared.flush() {
                            log::error!("background flush failed: {e}");
                        }
                    }
                }
                // Stop signal, or the store was dropped.
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        *guard = Some(SchedulerHandle { stop_tx, thread });
        log::info!("flush scheduler started");
    }

    /// Stop the background scheduler and sync both commit logs.
    ///
    /// A graceful stop joins the scheduler thread; a forced stop only
    /// signals it and returns immediately.
    pub fn stop(&self, force: bool) {
        let handle = self.scheduler.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.stop_tx.send(());
            if !force {
                let _ = handle.thread.join();
            }
            log::info!("flush scheduler stopped");
        }

        let mut tables = self.shared.tables.write().unwrap();
        tables.primary.sync_log();
        tables.secondary.sync_log();
    }

    /// Number of registered SSTables.
    pub fn sstable_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Approximate byte count buffered in the primary memtable.
    pub fn memtable_byte_count(&self) -> usize {
        self.shared.tables.read().unwrap().primary.byte_count()
    }

    /// Chain-node count of the primary memtable, cleared slots included.
    pub fn memtable_item_count(&self) -> usize {
        self.shared.tables.read().unwrap().primary.item_count()
    }
}

impl Shared {
    fn flush(&self) -> Result<()> {
        // Rotate only when the previous secondary has already been
        // persisted; a lingering secondary is serialized as-is first.
        {
            let mut tables = self.tables.write().unwrap();
            let pair = &mut *tables;
            if pair.secondary.is_empty() {
                std::mem::swap(&mut pair.primary, &mut pair.secondary);
            } else {
                log::warn!(
                    "secondary memtable still holds data, flushing it before the \
                     primary can rotate"
                );
            }
        }

        // Serialization happens under the read lock: flush-time reads stay
        // answerable from the secondary until the SSTable is registered.
        let pairs = {
            let tables = self.tables.read().unwrap();
            tables.secondary.all_pairs()
        };

        if !pairs.is_empty() {
            let table = SSTable::create(
                pairs,
                &self.config.data_dir,
                self.config.file_access,
                self.config.block_cache_capacity,
            )?;
            log::info!(
                "flushed {} record(s) into sstable file {:?}",
                table.item_count(),
                table.path()
            );
            self.registry.register(table);
        }

        // Only now can the retired generation and its commit log go away.
        let fresh = Memtable::create(&self.config.data_dir)?;
        let retired = {
            let mut tables = self.tables.write().unwrap();
            std::mem::replace(&mut tables.secondary, fresh)
        };
        retired.destroy_log();

        Ok(())
    }
}

fn live(value: &DataItem) -> Option<Vec<u8>> {
    if value.is_tombstone() {
        None
    } else {
        Some(value.to_vec())
    }
}

fn files_with_prefix(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && entry.file_name().to_string_lossy().starts_with(prefix)
        {
            paths.push(entry.path());
        }
    }
    Ok(paths)
}
