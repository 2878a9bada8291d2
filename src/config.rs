//! TRIDENT - Engine Configuration
//! Defines tunable parameters for the LSM storage engine.

use std::path::PathBuf;
use std::time::Duration;

use crate::engine::access::FileAccessChoice;

/// Configuration for the Trident storage engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for all data files (commit logs, SSTables).
    pub data_dir: PathBuf,

    /// Approximate byte count of the primary memtable at which the
    /// background scheduler triggers a flush.
    pub flush_threshold: usize,

    /// How often the background scheduler checks the flush threshold.
    pub flush_interval: Duration,

    /// File access strategy used by SSTable block scans. Chosen once at
    /// table-open time and fixed for the table's lifetime.
    pub file_access: FileAccessChoice,

    /// Number of decoded blocks each SSTable keeps in its LRU cache.
    pub block_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            flush_threshold: 128 * 1024 * 1024, // 128 MiB
            flush_interval: Duration::from_secs(5),
            file_access: FileAccessChoice::Buffered,
            block_cache_capacity: 100,
        }
    }
}

impl Config {
    /// Create a new Config with a custom data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set the flush threshold in bytes.
    pub fn with_flush_threshold(mut self, bytes: usize) -> Self {
        self.flush_threshold = bytes;
        self
    }

    /// Set the scheduler check interval.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the SSTable file access strategy.
    pub fn with_file_access(mut self, choice: FileAccessChoice) -> Self {
        self.file_access = choice;
        self
    }

    /// Set the per-table block cache capacity.
    pub fn with_block_cache_capacity(mut self, capacity: usize) -> Self {
        self.block_cache_capacity = capacity;
        self
    }

    /// Ensure the data directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}
