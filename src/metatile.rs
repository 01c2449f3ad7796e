//! Metatile model
//!
//! A metatile is a 16x16 block built from eight 8x8 tile references: tiles
//! 0-3 form the bottom layer and tiles 4-7 the top layer, each as a 2x2 grid
//! in top-left, top-right, bottom-left, bottom-right order.
//!
//! Metatile and tile ids address a combined primary + secondary space: ids
//! below 512 belong to the primary tileset, the rest to the secondary tileset
//! offset by 512.

use serde::{Deserialize, Serialize};

use crate::dedup::Flip;

/// Metatiles addressable in the primary tileset
pub const NUM_METATILES_IN_PRIMARY: u16 = 512;
/// Tile slots reserved for the primary tileset in VRAM
pub const NUM_TILES_IN_PRIMARY_VRAM: u16 = 512;
/// Tile references per metatile
pub const NUM_TILES_PER_METATILE: usize = 8;
/// Edge length of a rendered metatile layer in pixels
pub const METATILE_SIZE: u32 = 16;

const TILE_ID_MASK: u16 = 0x03FF;
const FLIP_H_BIT: u16 = 0x0400;
const FLIP_V_BIT: u16 = 0x0800;
const PALETTE_SHIFT: u16 = 12;

/// How a metatile's two layers map onto background layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    /// Bottom -> middle layer, top -> overhead layer
    #[default]
    Normal,
    /// Bottom -> ground layer, top -> middle layer
    Covered,
    /// Bottom -> ground layer, top -> overhead layer
    Split,
}

impl LayerType {
    /// Decode the layer-type attribute value; unknown values act as `Normal`.
    pub fn from_attribute(value: u8) -> Self {
        match value {
            1 => LayerType::Covered,
            2 => LayerType::Split,
            _ => LayerType::Normal,
        }
    }
}

/// One 8x8 tile placement inside a metatile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TileRef {
    /// Tile id in the combined VRAM space (0 = empty)
    pub tile_id: u16,
    #[serde(default)]
    pub flip_h: bool,
    #[serde(default)]
    pub flip_v: bool,
    /// Palette slot
    #[serde(default)]
    pub palette: u8,
}

impl TileRef {
    pub fn new(tile_id: u16, flip: Flip, palette: u8) -> Self {
        Self { tile_id, flip_h: flip.h, flip_v: flip.v, palette }
    }

    /// Decode a raw 16-bit metatile entry.
    ///
    /// Bits 0-9 tile id, bit 10 horizontal flip, bit 11 vertical flip,
    /// bits 12-15 palette.
    pub fn from_raw(raw: u16) -> Self {
        Self {
            tile_id: raw & TILE_ID_MASK,
            flip_h: raw & FLIP_H_BIT != 0,
            flip_v: raw & FLIP_V_BIT != 0,
            palette: (raw >> PALETTE_SHIFT) as u8,
        }
    }

    pub fn flip(&self) -> Flip {
        Flip::new(self.flip_h, self.flip_v)
    }

    pub fn is_empty(&self) -> bool {
        self.tile_id == 0
    }
}

/// A 2x2-tile, two-layer block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Metatile {
    pub tiles: [TileRef; NUM_TILES_PER_METATILE],
    #[serde(default)]
    pub layer_type: LayerType,
}

impl Metatile {
    pub fn new(tiles: [TileRef; NUM_TILES_PER_METATILE], layer_type: LayerType) -> Self {
        Self { tiles, layer_type }
    }

    /// Metatile referencing nothing; renders fully transparent.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Decode eight raw entries plus a layer-type attribute.
    pub fn from_raw(raw: [u16; NUM_TILES_PER_METATILE], layer_attribute: u8) -> Self {
        Self { tiles: raw.map(TileRef::from_raw), layer_type: LayerType::from_attribute(layer_attribute) }
    }

    pub fn bottom(&self) -> &[TileRef] {
        &self.tiles[..4]
    }

    pub fn top(&self) -> &[TileRef] {
        &self.tiles[4..]
    }

    /// Raw tile ids used by this metatile, empty slots excluded.
    pub fn tile_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.tiles.iter().filter(|t| !t.is_empty()).map(|t| t.tile_id)
    }
}

/// Which half of a tileset pair an id falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairSide {
    Primary,
    Secondary,
}

/// Split a map-level metatile id into its owning side and local id.
pub fn metatile_owner(metatile_id: u16) -> (PairSide, u16) {
    if metatile_id < NUM_METATILES_IN_PRIMARY {
        (PairSide::Primary, metatile_id)
    } else {
        (PairSide::Secondary, metatile_id - NUM_METATILES_IN_PRIMARY)
    }
}

/// Split a VRAM tile id into its owning side and sheet-local id.
pub fn tile_owner(tile_id: u16) -> (PairSide, u16) {
    if tile_id < NUM_TILES_IN_PRIMARY_VRAM {
        (PairSide::Primary, tile_id)
    } else {
        (PairSide::Secondary, tile_id - NUM_TILES_IN_PRIMARY_VRAM)
    }
}
