//! TRIDENT - Bucket Hash
//! Capacity-aware hash mapping keys to memtable bucket indexes.

use crate::types::DataItem;

/// Pluggable capacity-aware hash used by the memtable.
///
/// Implementations must be recomputed (re-reduced, not re-avalanched)
/// whenever the table capacity changes, since chains are rebuilt in place
/// on resize.
pub trait BucketHash: Send + Sync {
    /// Bucket index for `key` under the current capacity.
    fn index(&self, key: &DataItem) -> usize;

    /// Update the capacity after a resize.
    fn set_capacity(&mut self, capacity: usize);

    fn capacity(&self) -> usize;
}

/// Default hash: mask the sign bit off the structural hash, apply a fixed
/// avalanche step (xor with a 16-bit right shift of itself), then reduce
/// modulo the current capacity.
#[derive(Debug, Clone)]
pub struct ModuloHash {
    capacity: usize,
}

impl ModuloHash {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl BucketHash for ModuloHash {
    fn index(&self, key: &DataItem) -> usize {
        let h = (key.structural_hash() & 0x7fff_ffff) as u32;
        ((h ^ (h >> 16)) % self.capacity as u32) as usize
    }

    fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
