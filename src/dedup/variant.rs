//! Content hash to canonical tile lookup.

use std::collections::HashMap;

use super::Flip;

/// One orientation of a canonical tile.
///
/// `flip` is the transform that turns the stored canonical image into the
/// hashed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantEntry {
    pub canonical_id: usize,
    pub flip: Flip,
}

/// Maps content hashes of every known orientation to canonical tiles.
///
/// Entries sharing a hash are kept in insertion order. Without pixel
/// verification only the first entry of a bucket is ever consulted.
#[derive(Debug, Default, Clone)]
pub struct VariantTable {
    buckets: HashMap<u64, Vec<VariantEntry>>,
    len: usize,
}

impl VariantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries recorded for a hash, oldest first.
    pub fn get(&self, hash: u64) -> &[VariantEntry] {
        self.buckets.get(&hash).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.buckets.contains_key(&hash)
    }

    pub fn insert(&mut self, hash: u64, entry: VariantEntry) {
        self.buckets.entry(hash).or_default().push(entry);
        self.len += 1;
    }

    /// Register a new canonical tile under the hashes of its four orientations.
    ///
    /// `hashes` is ordered like [`Flip::ALL`].
    pub fn insert_canonical(&mut self, canonical_id: usize, hashes: [u64; 4]) {
        for (hash, flip) in hashes.into_iter().zip(Flip::ALL) {
            self.insert(hash, VariantEntry { canonical_id, flip });
        }
    }

    /// Total number of entries across all buckets.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_canonical_adds_four_entries() {
        let mut table = VariantTable::new();
        table.insert_canonical(0, [10, 11, 12, 13]);

        assert_eq!(table.len(), 4);
        assert_eq!(table.get(11), &[VariantEntry { canonical_id: 0, flip: Flip::H }]);
        assert_eq!(table.get(13)[0].flip, Flip::HV);
    }

    #[test]
    fn test_symmetric_hashes_share_a_bucket() {
        let mut table = VariantTable::new();
        table.insert_canonical(3, [7, 7, 7, 7]);

        let bucket = table.get(7);
        assert_eq!(bucket.len(), 4);
        assert_eq!(bucket[0].flip, Flip::NONE);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_missing_hash() {
        let table = VariantTable::new();
        assert!(table.get(99).is_empty());
        assert!(!table.contains(99));
        assert!(table.is_empty());
    }
}
