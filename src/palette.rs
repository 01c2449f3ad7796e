//! Tile palettes
//!
//! Source tiles store 4-bit colour indices; a palette turns them into RGBA.
//! Index 0 is always transparent, as is the magenta mask colour.

use std::collections::HashMap;

use image::Rgba;

use crate::registry::normalize_tileset_name;

/// Palette slots drawn from the primary tileset
pub const NUM_PRIMARY_PALETTES: usize = 6;
/// Colours per palette
pub const PALETTE_COLORS: usize = 16;

/// Fully transparent pixel
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
/// Colour treated as a transparency mask
const MAGENTA: [u8; 3] = [0xFF, 0x00, 0xFF];

/// A list of up to sixteen colours.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
    colors: Vec<Rgba<u8>>,
}

impl Palette {
    pub fn new(colors: Vec<Rgba<u8>>) -> Self {
        Self { colors }
    }

    /// Build from opaque RGB triples.
    pub fn from_rgb(colors: &[[u8; 3]]) -> Self {
        Self { colors: colors.iter().map(|&[r, g, b]| Rgba([r, g, b, 255])).collect() }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Resolve a colour index. Index 0, magenta and missing entries are
    /// transparent.
    pub fn color(&self, index: u8) -> Rgba<u8> {
        if index == 0 {
            return TRANSPARENT;
        }
        match self.colors.get(index as usize) {
            Some(c) if c.0[..3] == MAGENTA => TRANSPARENT,
            Some(c) => *c,
            None => TRANSPARENT,
        }
    }
}

/// Palette slots as seen by tiles of a tileset pair: slots 0-5 from the
/// primary tileset, the rest from the secondary tileset.
pub fn combine_vram_palettes(primary: &[Palette], secondary: &[Palette]) -> Vec<Palette> {
    let slots = primary.len().max(secondary.len());
    (0..slots)
        .map(|slot| {
            let source = if slot < NUM_PRIMARY_PALETTES { primary } else { secondary };
            source.get(slot).cloned().unwrap_or_default()
        })
        .collect()
}

/// Supplies the palettes of a tileset by name.
pub trait PaletteSource: Send + Sync {
    /// Palettes of `tileset` in slot order; empty if unknown.
    fn palettes_for(&self, tileset: &str) -> Vec<Palette>;
}

/// In-memory palettes keyed by normalized tileset name.
#[derive(Debug, Clone, Default)]
pub struct PaletteTable {
    palettes: HashMap<String, Vec<Palette>>,
}

impl PaletteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tileset: &str, palettes: Vec<Palette>) {
        self.palettes.insert(normalize_tileset_name(tileset), palettes);
    }

    pub fn get(&self, tileset: &str) -> Option<&[Palette]> {
        self.palettes.get(&normalize_tileset_name(tileset)).map(Vec::as_slice)
    }
}

impl PaletteSource for PaletteTable {
    fn palettes_for(&self, tileset: &str) -> Vec<Palette> {
        self.get(tileset).map(<[Palette]>::to_vec).unwrap_or_default()
    }
}
