//! Metatile rendering
//!
//! The builder treats rendering as an external collaborator behind
//! [`MetatileRenderer`]. [`IndexedTilesetRenderer`] is the in-memory
//! implementation over indexed tilesheets and palettes.

use std::collections::HashMap;

use image::{Rgba, RgbaImage};

use crate::metatile::{tile_owner, Metatile, PairSide, TileRef, METATILE_SIZE};
use crate::palette::{Palette, NUM_PRIMARY_PALETTES, TRANSPARENT};
use crate::registry::normalize_tileset_name;
use crate::tileset::{IndexedTileset, TILE_SIZE};

/// Renders the two 16x16 layer images of a metatile.
pub trait MetatileRenderer: Send + Sync {
    /// Render `(bottom, top)` with palettes applied and colour 0 transparent.
    ///
    /// `None` means the metatile could not be rendered; callers treat it as
    /// fully transparent.
    fn render_metatile(
        &self,
        metatile: &Metatile,
        primary: &str,
        secondary: &str,
    ) -> Option<(RgbaImage, RgbaImage)>;
}

/// A fully transparent metatile layer.
pub fn empty_layer() -> RgbaImage {
    RgbaImage::from_pixel(METATILE_SIZE, METATILE_SIZE, TRANSPARENT)
}

/// Renders metatiles from indexed tilesheets held in memory.
#[derive(Debug, Clone, Default)]
pub struct IndexedTilesetRenderer {
    sheets: HashMap<String, IndexedTileset>,
    palettes: HashMap<String, Vec<Palette>>,
}

impl IndexedTilesetRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the graphics and palettes of a tileset.
    pub fn add_tileset(&mut self, name: &str, sheet: IndexedTileset, palettes: Vec<Palette>) {
        let key = normalize_tileset_name(name);
        self.sheets.insert(key.clone(), sheet);
        self.palettes.insert(key, palettes);
    }

    /// Builder-style variant of [`add_tileset`](Self::add_tileset).
    pub fn with_tileset(mut self, name: &str, sheet: IndexedTileset, palettes: Vec<Palette>) -> Self {
        self.add_tileset(name, sheet, palettes);
        self
    }

    fn sheet(&self, name: &str) -> Option<&IndexedTileset> {
        self.sheets.get(&normalize_tileset_name(name))
    }

    /// Find the sheet holding a VRAM tile id.
    ///
    /// Secondary ids fall back to the primary sheet (same local offset) when
    /// the secondary sheet is missing or too small.
    fn locate(&self, tile_id: u16, primary: &str, secondary: &str) -> Option<(&IndexedTileset, usize)> {
        let (side, local) = tile_owner(tile_id);
        let local = local as usize;
        match side {
            PairSide::Primary => self.sheet(primary).filter(|s| local < s.tile_count()).map(|s| (s, local)),
            PairSide::Secondary => self
                .sheet(secondary)
                .filter(|s| local < s.tile_count())
                .or_else(|| self.sheet(primary).filter(|s| local < s.tile_count()))
                .map(|s| (s, local)),
        }
    }

    /// Palette for a slot: slots 0-5 come from the primary tileset, the rest
    /// from the secondary tileset.
    fn palette(&self, slot: u8, primary: &str, secondary: &str) -> Option<&Palette> {
        let source = if (slot as usize) < NUM_PRIMARY_PALETTES || secondary.is_empty() {
            primary
        } else {
            secondary
        };
        self.palettes.get(&normalize_tileset_name(source))?.get(slot as usize)
    }

    fn render_layer(&self, tiles: &[TileRef], primary: &str, secondary: &str) -> RgbaImage {
        let mut layer = empty_layer();
        let size = TILE_SIZE as u32;

        for (position, tile_ref) in tiles.iter().enumerate() {
            if tile_ref.is_empty() {
                continue;
            }
            let Some((sheet, local)) = self.locate(tile_ref.tile_id, primary, secondary) else {
                continue;
            };
            let Ok(tile) = sheet.tile(local, tile_ref.flip()) else {
                continue;
            };
            let palette = self.palette(tile_ref.palette, primary, secondary);

            let origin_x = (position as u32 % 2) * size;
            let origin_y = (position as u32 / 2) * size;
            for (i, &index) in tile.pixels().iter().enumerate() {
                let color = match palette {
                    Some(p) => p.color(index),
                    None => grayscale(index),
                };
                if color.0[3] == 0 {
                    continue;
                }
                let x = origin_x + (i % TILE_SIZE) as u32;
                let y = origin_y + (i / TILE_SIZE) as u32;
                layer.put_pixel(x, y, color);
            }
        }

        layer
    }
}

/// Fallback colour for tiles whose palette slot is missing.
fn grayscale(index: u8) -> Rgba<u8> {
    if index == 0 {
        return TRANSPARENT;
    }
    let level = index.saturating_mul(17);
    Rgba([level, level, level, 255])
}

impl MetatileRenderer for IndexedTilesetRenderer {
    fn render_metatile(
        &self,
        metatile: &Metatile,
        primary: &str,
        secondary: &str,
    ) -> Option<(RgbaImage, RgbaImage)> {
        if self.sheet(primary).is_none() && self.sheet(secondary).is_none() {
            return None;
        }
        let bottom = self.render_layer(metatile.bottom(), primary, secondary);
        let top = self.render_layer(metatile.top(), primary, secondary);
        Some((bottom, top))
    }
}
