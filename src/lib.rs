//! TRIDENT - LSM Key-Value Storage Engine
//!
//! An embeddable, crash-recoverable storage engine following the
//! log-structured-merge design: writes land in an in-memory hash table
//! (the memtable) backed by a write-ahead commit log, and are periodically
//! flushed into immutable sorted files on disk (SSTables).
//!
//! ## Features
//! - **Commit log**: per-memtable append-only log, replayed on startup
//! - **Double-buffered memtables**: writes hit the primary while the
//!   secondary is flushed, with rotation atomic under one RwLock
//! - **SSTable**: sorted on-disk format with a sparse index, bloom filter,
//!   and bounded block cache
//! - **File access strategies**: buffered seek/read or memory-mapped
//!
//! ## Example
//! ```no_run
//! use trident::{config::Config, engine::KeyValueStore};
//!
//! let config = Config::new("./data");
//! let store = KeyValueStore::open(config).unwrap();
//! store.start();
//!
//! store.put(b"key", b"value");
//! assert_eq!(store.get(b"key"), Some(b"value".to_vec()));
//! store.stop(false);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod types;

pub use config::Config;
pub use engine::KeyValueStore;
pub use error::{Result, TridentError};
