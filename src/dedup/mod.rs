//! Flip-aware content deduplication
//!
//! Every tile is stored once as a *canonical* image. Any later image equal to
//! one of the four orientations of a canonical image (identity, H-flip,
//! V-flip, both) resolves to that canonical image plus the flip needed to
//! reproduce it.
//!
//! # How It Works
//!
//! 1. Hash the incoming content and look it up in the [`VariantTable`]. Every
//!    canonical tile registers all four of its orientation hashes, so exact
//!    matches and previously seen flips resolve in O(1).
//! 2. Otherwise hash the H, V and HV transforms of the input in turn. A hit
//!    means the input is a flip of a known orientation; the reported flip is
//!    the stored flip composed with the transform just applied.
//! 3. If nothing matches, the input becomes a new canonical tile and its four
//!    orientation hashes are inserted.
//!
//! The same algorithm runs over 8x8 indexed tiles ([`TileDeduplicator`]) and
//! rendered RGBA images ([`crate::atlas::TileAtlas`]).

mod flip;
mod indexed;
mod rgba;
mod variant;

pub use flip::Flip;
pub use indexed::{IndexedTile, TileDeduplicator, TileKey, TILE_BYTES};
pub use variant::{VariantEntry, VariantTable};

use serde::Serialize;

use crate::error::DedupError;
use crate::gid::MAX_CANONICAL_TILES;

/// A deduplicated tile: the canonical id and the flip that reproduces the
/// requested content from the canonical image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileReference {
    pub canonical_id: usize,
    pub flip: Flip,
}

impl TileReference {
    pub fn flip_h(&self) -> bool {
        self.flip.h
    }

    pub fn flip_v(&self) -> bool {
        self.flip.v
    }
}

/// Pixel content that can be hashed and mirrored.
pub trait FlipTile: Clone {
    /// 64-bit FNV-1a hash over the raw pixel bytes.
    fn content_hash(&self) -> u64;

    fn flip_h_in_place(&mut self);

    fn flip_v_in_place(&mut self);

    /// Bit-exact pixel equality, including dimensions.
    fn same_content(&self, other: &Self) -> bool;
}

/// Result of a single insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insertion {
    pub reference: TileReference,
    /// True if the content created a new canonical tile
    pub created: bool,
}

/// Canonical tile store with flip detection.
///
/// Single-threaded; callers that share one across threads wrap it in their
/// own lock.
#[derive(Debug, Clone)]
pub struct FlipDeduplicator<T> {
    canonical: Vec<T>,
    variants: VariantTable,
    verify_pixels: bool,
}

impl<T> Default for FlipDeduplicator<T> {
    fn default() -> Self {
        Self { canonical: Vec::new(), variants: VariantTable::new(), verify_pixels: false }
    }
}

impl<T: FlipTile> FlipDeduplicator<T> {
    /// Create an empty store that trusts hash equality.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare pixels on every hash hit instead of trusting the hash.
    pub fn with_verification(mut self, verify_pixels: bool) -> Self {
        self.verify_pixels = verify_pixels;
        self
    }

    pub fn verifies_pixels(&self) -> bool {
        self.verify_pixels
    }

    /// Deduplicate `tile`, storing a copy if it is new.
    pub fn insert(&mut self, tile: &T) -> Result<TileReference, DedupError> {
        self.insert_detailed(tile).map(|insertion| insertion.reference)
    }

    /// Like [`insert`](Self::insert), also reporting whether a canonical tile
    /// was created.
    pub fn insert_detailed(&mut self, tile: &T) -> Result<Insertion, DedupError> {
        let hash = tile.content_hash();
        if let Some(reference) = self.find(hash, tile, Flip::NONE) {
            return Ok(Insertion { reference, created: false });
        }

        let mut flipped_h = tile.clone();
        flipped_h.flip_h_in_place();
        let h_hash = flipped_h.content_hash();
        if let Some(reference) = self.find(h_hash, &flipped_h, Flip::H) {
            self.memoize(hash, reference);
            return Ok(Insertion { reference, created: false });
        }
        drop(flipped_h);

        // The HV candidate is the V-flip flipped again, reusing its buffer.
        let mut flipped = tile.clone();
        flipped.flip_v_in_place();
        let v_hash = flipped.content_hash();
        if let Some(reference) = self.find(v_hash, &flipped, Flip::V) {
            self.memoize(hash, reference);
            return Ok(Insertion { reference, created: false });
        }

        flipped.flip_h_in_place();
        let hv_hash = flipped.content_hash();
        if let Some(reference) = self.find(hv_hash, &flipped, Flip::HV) {
            self.memoize(hash, reference);
            return Ok(Insertion { reference, created: false });
        }

        let canonical_id = self.canonical.len();
        if canonical_id >= MAX_CANONICAL_TILES {
            return Err(DedupError::TooManyTiles { limit: MAX_CANONICAL_TILES });
        }
        self.variants.insert_canonical(canonical_id, [hash, h_hash, v_hash, hv_hash]);
        self.canonical.push(tile.clone());

        Ok(Insertion { reference: TileReference { canonical_id, flip: Flip::NONE }, created: true })
    }

    /// Resolve `candidate` (already transformed by `applied`) against the table.
    fn find(&self, hash: u64, candidate: &T, applied: Flip) -> Option<TileReference> {
        let bucket = self.variants.get(hash);
        let entry = if self.verify_pixels {
            bucket.iter().find(|entry| self.entry_matches(entry, candidate))?
        } else {
            bucket.first()?
        };
        Some(TileReference { canonical_id: entry.canonical_id, flip: entry.flip ^ applied })
    }

    fn entry_matches(&self, entry: &VariantEntry, candidate: &T) -> bool {
        let Some(stored) = self.canonical.get(entry.canonical_id) else {
            return false;
        };
        let mut oriented = stored.clone();
        if entry.flip.h {
            oriented.flip_h_in_place();
        }
        if entry.flip.v {
            oriented.flip_v_in_place();
        }
        oriented.same_content(candidate)
    }

    fn memoize(&mut self, hash: u64, reference: TileReference) {
        let entry = VariantEntry { canonical_id: reference.canonical_id, flip: reference.flip };
        if !self.variants.get(hash).contains(&entry) {
            self.variants.insert(hash, entry);
        }
    }

    /// Number of canonical tiles.
    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    pub fn get(&self, canonical_id: usize) -> Option<&T> {
        self.canonical.get(canonical_id)
    }

    /// Canonical tiles in id order.
    pub fn tiles(&self) -> &[T] {
        &self.canonical
    }

    pub fn variants(&self) -> &VariantTable {
        &self.variants
    }

    /// Drop the variant table and hand out the canonical tiles.
    pub fn into_tiles(self) -> Vec<T> {
        self.canonical
    }
}
