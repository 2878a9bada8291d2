//! TRIDENT - Custom Error Types
//! Defines the error hierarchy for the LSM storage engine.

use thiserror::Error;

/// Custom Result type for the Trident engine.
pub type Result<T> = std::result::Result<T, TridentError>;

/// Error types for the Trident storage engine.
#[derive(Error, Debug)]
pub enum TridentError {
    /// I/O errors from file operations (commit log, SSTable).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data corruption detected (malformed record, bad header).
    #[error("Data corruption detected: {0}")]
    Corruption(String),

    /// Startup invariant violation (fatal, aborts `KeyValueStore::open`).
    #[error("Startup failed: {0}")]
    Startup(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
