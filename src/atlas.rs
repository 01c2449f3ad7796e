//! Tile atlas - canonical image store with flip-aware GID assignment
//!
//! Rendered tiles are deduplicated under the four flip orientations and packed
//! into a single tilesheet in canonical id order, row-major, at a fixed column
//! count.

use image::{imageops, Rgba, RgbaImage};

use crate::dedup::FlipDeduplicator;
use crate::error::DedupError;
use crate::gid::Gid;

/// Transparent color for atlas background
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Default atlas column count
pub const DEFAULT_COLUMNS: u32 = 16;

/// Layout of the emitted tilesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    /// Tile width in pixels
    pub tile_width: u32,
    /// Tile height in pixels
    pub tile_height: u32,
    /// Tiles per atlas row
    pub columns: u32,
}

impl AtlasLayout {
    /// Square tiles of `tile_size` pixels.
    pub fn square(tile_size: u32, columns: u32) -> Self {
        Self { tile_width: tile_size, tile_height: tile_size, columns: columns.max(1) }
    }

    /// Rows needed for `tile_count` tiles (at least one).
    pub fn rows_for(&self, tile_count: usize) -> u32 {
        (tile_count as u32).div_ceil(self.columns).max(1)
    }

    /// Pixel position of a canonical tile in the sheet.
    pub fn position(&self, canonical_id: usize) -> (u32, u32) {
        let id = canonical_id as u32;
        ((id % self.columns) * self.tile_width, (id / self.columns) * self.tile_height)
    }
}

/// Canonical RGBA tiles plus their orientation lookup.
#[derive(Debug, Clone)]
pub struct TileAtlas {
    layout: AtlasLayout,
    store: FlipDeduplicator<RgbaImage>,
}

impl TileAtlas {
    pub fn new(layout: AtlasLayout) -> Self {
        Self { layout, store: FlipDeduplicator::new() }
    }

    /// Compare pixels on hash hits instead of trusting the hash.
    pub fn with_verification(mut self, verify_pixels: bool) -> Self {
        self.store = self.store.with_verification(verify_pixels);
        self
    }

    pub fn layout(&self) -> AtlasLayout {
        self.layout
    }

    /// Deduplicate a rendered image and return its packed GID.
    ///
    /// New canonical images are stored as owned copies, so the caller may
    /// drop its working image afterwards.
    pub fn assign_gid_with_flip_detection(&mut self, image: &RgbaImage) -> Result<Gid, DedupError> {
        let reference = self.store.insert(image)?;
        Gid::new(reference.canonical_id, reference.flip)
    }

    /// Number of canonical tiles.
    pub fn unique_tile_count(&self) -> usize {
        self.store.len()
    }

    pub fn columns(&self) -> u32 {
        self.layout.columns
    }

    pub fn tile(&self, canonical_id: usize) -> Option<&RgbaImage> {
        self.store.get(canonical_id)
    }

    /// Pack every canonical tile into one sheet, row-major.
    ///
    /// An empty atlas yields a single transparent tile. Tiles smaller than the
    /// layout cell are placed at the cell origin; larger ones are clipped.
    pub fn build_tilesheet_image(&self) -> RgbaImage {
        let tiles = self.store.tiles();
        if tiles.is_empty() {
            return RgbaImage::from_pixel(self.layout.tile_width, self.layout.tile_height, TRANSPARENT);
        }

        let rows = self.layout.rows_for(tiles.len());
        let mut sheet = RgbaImage::from_pixel(
            self.layout.columns * self.layout.tile_width,
            rows * self.layout.tile_height,
            TRANSPARENT,
        );

        for (id, tile) in tiles.iter().enumerate() {
            let (x, y) = self.layout.position(id);
            if tile.dimensions() == (self.layout.tile_width, self.layout.tile_height) {
                imageops::replace(&mut sheet, tile, x as i64, y as i64);
            } else {
                let view = imageops::crop_imm(
                    tile,
                    0,
                    0,
                    tile.width().min(self.layout.tile_width),
                    tile.height().min(self.layout.tile_height),
                );
                imageops::replace(&mut sheet, &*view, x as i64, y as i64);
            }
        }

        sheet
    }
}
