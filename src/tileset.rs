//! Indexed source tilesheets
//!
//! Source graphics are stored as one palette index per pixel, tiles laid out
//! row-major in 8x8 cells.

use crate::dedup::{Flip, IndexedTile, TILE_BYTES};
use crate::error::DedupError;

/// Edge length of a source tile in pixels.
pub const TILE_SIZE: usize = 8;

/// An indexed-colour tilesheet (one byte per pixel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedTileset {
    width: usize,
    pixels: Vec<u8>,
}

impl IndexedTileset {
    /// Wrap a pixel buffer `width` pixels wide.
    ///
    /// The buffer length must be a whole number of rows.
    pub fn new(width: usize, pixels: Vec<u8>) -> Result<Self, DedupError> {
        if width == 0 || pixels.len() % width != 0 {
            let row = width.max(1);
            return Err(DedupError::InvalidTileSize {
                expected: pixels.len().div_ceil(row) * row,
                actual: pixels.len(),
            });
        }
        Ok(Self { width, pixels })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.pixels.len() / self.width
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn tiles_per_row(&self) -> usize {
        self.width / TILE_SIZE
    }

    /// Number of whole tiles in the sheet.
    pub fn tile_count(&self) -> usize {
        self.tiles_per_row() * (self.height() / TILE_SIZE)
    }

    /// Extract one tile, applying `flip` while copying.
    pub fn tile(&self, tile_id: usize, flip: Flip) -> Result<IndexedTile, DedupError> {
        extract_tile(&self.pixels, self.width, tile_id, flip)
    }
}

/// Extract the 8x8 tile `tile_id` from an indexed buffer `image_width` pixels
/// wide, mirrored per `flip`.
pub fn extract_tile(
    pixels: &[u8],
    image_width: usize,
    tile_id: usize,
    flip: Flip,
) -> Result<IndexedTile, DedupError> {
    let tiles_per_row = image_width / TILE_SIZE;
    let rows = if image_width == 0 { 0 } else { pixels.len() / image_width / TILE_SIZE };
    let available = tiles_per_row * rows;
    if tile_id >= available {
        return Err(DedupError::TileOutOfBounds { tile_id, available });
    }

    let origin_x = (tile_id % tiles_per_row) * TILE_SIZE;
    let origin_y = (tile_id / tiles_per_row) * TILE_SIZE;

    let mut out = [0u8; TILE_BYTES];
    for y in 0..TILE_SIZE {
        let src_y = if flip.v { TILE_SIZE - 1 - y } else { y };
        let row_start = (origin_y + src_y) * image_width + origin_x;
        for x in 0..TILE_SIZE {
            let src_x = if flip.h { TILE_SIZE - 1 - x } else { x };
            out[y * TILE_SIZE + x] = pixels[row_start + src_x];
        }
    }
    Ok(IndexedTile::new(out))
}
