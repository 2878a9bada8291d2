//! TRIDENT - Core Type Definitions
//! Defines the byte-sequence value type and the key/value pair
//! used across the memtable, commit log, and SSTable layers.

use std::cmp::Ordering;
use std::io::{self, Write};

use bytes::Bytes;

/// Reserved byte marking a key as deleted when the deletion must shadow
/// older tiers (secondary memtable or SSTables).
pub const TOMBSTONE: u8 = 0;

/// An immutable byte sequence used as both key and value.
///
/// Ordering is lexicographic over the shared prefix with bytes compared as
/// *signed* 8-bit integers; the shorter sequence sorts first when one is a
/// prefix of the other. This single ordering drives the SSTable sort order,
/// the sparse-index binary search, and commit-log equality, so it must not
/// be changed without breaking file compatibility.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DataItem {
    data: Bytes,
}

impl DataItem {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// The single-byte deletion marker value.
    pub fn tombstone() -> Self {
        Self::new(vec![TOMBSTONE])
    }

    /// Returns true if this value is the deletion marker.
    pub fn is_tombstone(&self) -> bool {
        self.data.as_ref() == [TOMBSTONE]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Structural 31-multiplier hash over all bytes.
    ///
    /// Feeds the capacity-aware bucket hash; deterministic across runs so
    /// commit-log replay rebuilds identical bucket state.
    pub fn structural_hash(&self) -> i32 {
        self.data
            .iter()
            .fold(1i32, |h, b| h.wrapping_mul(31).wrapping_add(*b as i8 as i32))
    }
}

impl From<&[u8]> for DataItem {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

impl From<Vec<u8>> for DataItem {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl Ord for DataItem {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.as_bytes();
        let b = other.as_bytes();
        let n = a.len().min(b.len());

        for i in 0..n {
            match (a[i] as i8).cmp(&(b[i] as i8)) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }

        a.len().cmp(&b.len())
    }
}

impl PartialOrd for DataItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Debug for DataItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match std::str::from_utf8(&self.data) {
            Ok(s) => write!(f, "DataItem({:?})", s),
            Err(_) => write!(f, "DataItem({:02x?})", self.data.as_ref()),
        }
    }
}

/// A key/value association.
///
/// Ordered by key so a flushed memtable can be sorted directly into
/// SSTable record order; the value only breaks ties, keeping the ordering
/// consistent with the derived equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValuePair {
    pub key: DataItem,
    pub value: DataItem,
}

impl KeyValuePair {
    pub fn new(key: DataItem, value: DataItem) -> Self {
        Self { key, value }
    }

    /// Encoded size of this record on disk.
    pub fn encoded_len(&self) -> usize {
        4 + 4 + self.key.len() + self.value.len()
    }

    /// Write the record in the shared on-disk layout:
    /// `recordLength(4BE) keyLength(4BE) key value`
    /// where `recordLength = keyLength + valueLength`.
    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        let record_length = (self.key.len() + self.value.len()) as u32;
        let key_length = self.key.len() as u32;

        out.write_all(&record_length.to_be_bytes())?;
        out.write_all(&key_length.to_be_bytes())?;
        out.write_all(self.key.as_bytes())?;
        out.write_all(self.value.as_bytes())?;
        Ok(())
    }
}

impl Ord for KeyValuePair {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl PartialOrd for KeyValuePair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
