//! TRIDENT - Bloom Filter
//! Probabilistic membership test consulted before any SSTable I/O.
//!
//! This is deliberately *not* a k-hash bloom filter: bit positions are the
//! raw key byte patterns themselves, OR-ed into the bitset. A lookup answers
//! "maybe present" when every set bit of the probe is set in the filter.
//! False positives are possible, false negatives are not. The simplified
//! scheme is part of the on-disk format and is preserved for compatibility
//! with existing SSTable files.

/// Bit-OR bloom filter over raw key bytes, serializable to a byte buffer.
#[derive(Debug, Clone, Default)]
pub struct BloomFilter {
    bits: Vec<u8>,
}

impl BloomFilter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self { bits: Vec::new() }
    }

    /// Reconstruct a filter from its serialized bitset bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut filter = Self { bits: data.to_vec() };
        filter.trim();
        filter
    }

    /// OR the raw bytes of `data` into the filter.
    pub fn add(&mut self, data: &[u8]) {
        if self.bits.len() < data.len() {
            self.bits.resize(data.len(), 0);
        }
        for (slot, b) in self.bits.iter_mut().zip(data.iter()) {
            *slot |= b;
        }
    }

    /// Test whether `data` **may** have been added.
    /// - `false` → definitely not present (no I/O needed)
    /// - `true` → probably present (may be a false positive)
    pub fn contains(&self, data: &[u8]) -> bool {
        data.iter().enumerate().all(|(i, b)| {
            let filter_byte = self.bits.get(i).copied().unwrap_or(0);
            filter_byte & b == *b
        })
    }

    /// Serialized bitset with trailing zero bytes trimmed.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.bits.clone();
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        bytes
    }

    fn trim(&mut self) {
        while self.bits.last() == Some(&0) {
            self.bits.pop();
        }
    }
}
