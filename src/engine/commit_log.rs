//! TRIDENT - Commit Log (Write-Ahead Log)
//! Append-only binary log of mutations for one memtable generation.
//! Every successful `put`/`delete` is durably appended before the
//! in-memory mutation is considered committed; replaying the log in file
//! order reconstructs the memtable after a crash.
//!
//! ## Binary Format (per record)
//! ```text
//! [opcode: 1 byte][record_length: 4 bytes BE][key_length: 4 bytes BE][key][value]
//! ```
//! where `record_length = key_length + value_length`.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::engine::codec;
use crate::error::Result;
use crate::types::KeyValuePair;

/// File name prefix for commit log files inside the data directory.
pub const LOG_FILE_NAME_PREFIX: &str = "commit-log-";

/// Operation type for commit log records.
///
/// `Get` is reserved in the opcode space but never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogOp {
    Put = 0,
    Get = 1,
    Delete = 2,
}

impl LogOp {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(LogOp::Put),
            1 => Some(LogOp::Get),
            2 => Some(LogOp::Delete),
            _ => None,
        }
    }
}

/// Append-only mutation log paired with exactly one memtable generation.
///
/// Created with its memtable, closed on graceful shutdown, deleted once the
/// memtable has been flushed into an SSTable.
pub struct CommitLog {
    path: PathBuf,
    file: File,
}

impl CommitLog {
    /// Open or create a commit log file, positioned for appending.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        file.seek(SeekFrom::End(0))?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one mutation record and fsync before returning.
    ///
    /// The record must be durable before the caller applies (or reports)
    /// the corresponding in-memory mutation.
    pub fn append(&mut self, op: LogOp, pair: &KeyValuePair) -> Result<()> {
        let mut buf = Vec::with_capacity(1 + pair.encoded_len());
        buf.push(op as u8);
        pair.write_to(&mut buf)?;

        self.file.write_all(&buf)?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Decode every record in file order.
    ///
    /// Used only for recovery, before any concurrent traffic exists for
    /// this log. A torn record at the end of the file (partial append from
    /// a crash) terminates the scan; everything before it is returned, and
    /// the write position is rolled back so the tail gets overwritten.
    pub fn replay(&mut self) -> Result<Vec<(LogOp, KeyValuePair)>> {
        let file_len = self.file.metadata()?.len();
        self.file.seek(SeekFrom::Start(0))?;

        let mut reader = BufReader::new(self.file.try_clone()?);
        let mut records = Vec::new();
        let mut valid_end: u64 = 0;

        while valid_end < file_len {
            match Self::read_one(&mut reader) {
                Ok(Some((op, pair))) => {
                    valid_end += 1 + pair.encoded_len() as u64;
                    if matches!(op, LogOp::Put | LogOp::Delete) {
                        records.push((op, pair));
                    }
                }
                Ok(None) => {
                    log::warn!(
                        "truncated record at byte {} of commit log {:?}, discarding tail",
                        valid_end,
                        self.path
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        self.file.seek(SeekFrom::Start(valid_end))?;
        Ok(records)
    }

    /// Last modification time of the log file; used to order generations
    /// at startup. Falls back to the epoch when unavailable.
    pub fn last_modified(&self) -> SystemTime {
        self.path
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }

    /// Flush any pending writes to disk. Called on graceful shutdown.
    pub fn sync(&mut self) {
        if let Err(e) = self.file.sync_all() {
            log::warn!("unable to sync commit log file {:?}: {e}", self.path);
        }
    }

    /// Close and delete the log file. Called once the paired memtable has
    /// been flushed to an SSTable.
    pub fn destroy(self) {
        let path = self.path;
        drop(self.file);
        if let Err(e) = std::fs::remove_file(&path) {
            log::warn!("unable to delete commit log file {path:?}: {e}");
        }
    }

    /// Read one record, mapping a clean-or-torn EOF to `None`.
    fn read_one(reader: &mut impl Read) -> Result<Option<(LogOp, KeyValuePair)>> {
        let opcode = match codec::read_u8(reader) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // Unknown opcodes cannot be framed, so the rest of the file is
        // unreadable; treat it like a torn tail.
        let Some(op) = LogOp::from_u8(opcode) else {
            return Ok(None);
        };

        match codec::read_record(reader) {
            Ok(pair) => Ok(Some((op, pair))),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
