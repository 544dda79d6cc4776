//! Definition deduplication map
//!
//! Maps `size → (hash → offsets)` for every definition record known to be
//! in the file. A lookup that matches on size and hash is only a
//! *candidate*: the store re-reads the record behind each offset before
//! trusting it, because 64-bit hash collisions must not lose data.

use ahash::AHashMap;

/// Nested size/hash map of existing definition record offsets.
#[derive(Debug, Default)]
pub struct DedupMap {
    defs: AHashMap<u32, AHashMap<u64, Vec<u32>>>,
}

impl DedupMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a definition of `size` bytes hashing to `hash` at `def_ind`.
    pub fn register(&mut self, size: u32, hash: u64, def_ind: u32) {
        self.defs
            .entry(size)
            .or_default()
            .entry(hash)
            .or_default()
            .push(def_ind);
    }

    /// Whether any record of `size` bytes is registered. Lets callers
    /// skip hashing when no candidate could possibly match.
    pub fn has_size(&self, size: u32) -> bool {
        self.defs.contains_key(&size)
    }

    /// Offsets of records matching `(size, hash)`. Empty when none match.
    pub fn candidates(&self, size: u32, hash: u64) -> &[u32] {
        self.defs
            .get(&size)
            .and_then(|by_hash| by_hash.get(&hash))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of registered record offsets, for logging.
    pub fn num_records(&self) -> usize {
        self.defs
            .values()
            .flat_map(|by_hash| by_hash.values())
            .map(Vec::len)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let mut map = DedupMap::new();
        map.register(10, 0xABCD, 0);
        map.register(10, 0xABCD, 42);
        map.register(10, 0xEF01, 7);
        map.register(20, 0xABCD, 9);

        assert_eq!(map.candidates(10, 0xABCD), [0, 42]);
        assert_eq!(map.candidates(10, 0xEF01), [7]);
        assert_eq!(map.candidates(20, 0xABCD), [9]);
        assert!(map.candidates(10, 0x1234).is_empty());
        assert!(map.candidates(30, 0xABCD).is_empty());
        assert!(map.has_size(10));
        assert!(!map.has_size(30));
        assert_eq!(map.num_records(), 4);
    }

    #[test]
    fn same_hash_different_size_do_not_collide() {
        let mut map = DedupMap::new();
        map.register(1, 0xFF, 0);
        assert!(map.candidates(2, 0xFF).is_empty());
    }
}
