//! Deduplication of single 8x8 indexed-colour tiles.

use std::collections::HashMap;

use super::{Flip, FlipDeduplicator, FlipTile, Insertion, TileReference};
use crate::error::DedupError;
use crate::hash::fnv1a_hash;
use crate::tileset::{extract_tile, IndexedTileset, TILE_SIZE};

/// Bytes in one 8x8 indexed tile.
pub const TILE_BYTES: usize = TILE_SIZE * TILE_SIZE;

/// Raw palette indices of one 8x8 tile, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexedTile([u8; TILE_BYTES]);

impl IndexedTile {
    pub const fn new(pixels: [u8; TILE_BYTES]) -> Self {
        Self(pixels)
    }

    /// Copy a 64-byte buffer into a tile.
    pub fn from_slice(pixels: &[u8]) -> Result<Self, DedupError> {
        let pixels: [u8; TILE_BYTES] = pixels
            .try_into()
            .map_err(|_| DedupError::InvalidTileSize { expected: TILE_BYTES, actual: pixels.len() })?;
        Ok(Self(pixels))
    }

    pub fn pixels(&self) -> &[u8; TILE_BYTES] {
        &self.0
    }

    /// A mirrored copy.
    pub fn flipped(&self, flip: Flip) -> Self {
        let mut out = *self;
        if flip.h {
            out.flip_h_in_place();
        }
        if flip.v {
            out.flip_v_in_place();
        }
        out
    }
}

impl FlipTile for IndexedTile {
    fn content_hash(&self) -> u64 {
        fnv1a_hash(&self.0)
    }

    fn flip_h_in_place(&mut self) {
        for row in self.0.chunks_exact_mut(TILE_SIZE) {
            row.reverse();
        }
    }

    fn flip_v_in_place(&mut self) {
        for y in 0..TILE_SIZE / 2 {
            let (top, bottom) = self.0.split_at_mut((TILE_SIZE - 1 - y) * TILE_SIZE);
            top[y * TILE_SIZE..(y + 1) * TILE_SIZE].swap_with_slice(&mut bottom[..TILE_SIZE]);
        }
    }

    fn same_content(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

/// A requested tile instance before deduplication.
///
/// Many keys resolve to one canonical tile; the palette stays with the use
/// site since deduplication only sees palette indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub tileset: String,
    pub tile_id: usize,
    pub palette: u8,
    pub flip: Flip,
}

impl TileKey {
    pub fn new(tileset: impl Into<String>, tile_id: usize, palette: u8, flip: Flip) -> Self {
        Self { tileset: tileset.into(), tile_id, palette, flip }
    }
}

/// Deduplicates 8x8 indexed tiles under the four flip orientations.
#[derive(Debug, Default, Clone)]
pub struct TileDeduplicator {
    store: FlipDeduplicator<IndexedTile>,
    resolved: HashMap<TileKey, TileReference>,
}

impl TileDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare pixels on hash hits instead of trusting the hash.
    pub fn with_verification(mut self, verify_pixels: bool) -> Self {
        self.store = self.store.with_verification(verify_pixels);
        self
    }

    /// Deduplicate 64 raw palette-index bytes.
    ///
    /// Fails with [`DedupError::InvalidTileSize`] for any other length.
    pub fn add_tile(&mut self, pixels: &[u8]) -> Result<TileReference, DedupError> {
        let tile = IndexedTile::from_slice(pixels)?;
        self.store.insert(&tile)
    }

    /// Deduplicate an already-built tile, reporting whether it was new.
    pub fn add_indexed_tile(&mut self, tile: &IndexedTile) -> Result<Insertion, DedupError> {
        self.store.insert_detailed(tile)
    }

    /// Extract tile `tile_id` from an indexed buffer `image_width` pixels wide,
    /// applying the source flip during extraction, and deduplicate it.
    pub fn add_tile_from_image(
        &mut self,
        pixels: &[u8],
        image_width: usize,
        tile_id: usize,
        source_flip_h: bool,
        source_flip_v: bool,
    ) -> Result<TileReference, DedupError> {
        let tile = extract_tile(pixels, image_width, tile_id, Flip::new(source_flip_h, source_flip_v))?;
        self.store.insert(&tile)
    }

    /// Resolve a tile key against its source sheet, once per key.
    pub fn add_tile_for_key(
        &mut self,
        key: &TileKey,
        sheet: &IndexedTileset,
    ) -> Result<TileReference, DedupError> {
        if let Some(reference) = self.resolved.get(key) {
            return Ok(*reference);
        }
        let tile = sheet.tile(key.tile_id, key.flip)?;
        let reference = self.store.insert(&tile)?;
        self.resolved.insert(key.clone(), reference);
        Ok(reference)
    }

    /// Number of canonical tiles.
    pub fn unique_tile_count(&self) -> usize {
        self.store.len()
    }

    pub fn tile(&self, canonical_id: usize) -> Option<&IndexedTile> {
        self.store.get(canonical_id)
    }

    /// Canonical tiles in id order.
    pub fn tiles(&self) -> &[IndexedTile] {
        self.store.tiles()
    }
}
