//! Animated tile metadata
//!
//! Animation definitions declare a range of source tiles that cycle through
//! frames at run time. The builder uses them twice: while processing
//! metatiles, to find which output GIDs sit on animated tiles, and at the end,
//! to run every frame through the same deduplication as static content.

use std::collections::HashMap;
use std::ops::Range;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::gid::Gid;
use crate::metatile::{METATILE_SIZE, NUM_TILES_IN_PRIMARY_VRAM};
use crate::palette::{Palette, TRANSPARENT};
use crate::registry::normalize_tileset_name;
use crate::tileset::IndexedTileset;

/// Frame duration used when a definition does not declare one
pub const DEFAULT_FRAME_DURATION_MS: u32 = 200;

fn default_duration() -> u32 {
    DEFAULT_FRAME_DURATION_MS
}

/// A declared animated tile range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationDefinition {
    pub name: String,
    /// First animated tile, local to its tileset
    pub base_tile_id: u16,
    pub num_tiles: u16,
    /// Range lives in the secondary half of VRAM
    #[serde(default)]
    pub is_secondary: bool,
    /// Playback order as indices into the extracted frames
    #[serde(default)]
    pub frame_sequence: Option<Vec<usize>>,
    #[serde(default = "default_duration")]
    pub duration_ms: u32,
}

impl AnimationDefinition {
    pub fn new(name: impl Into<String>, base_tile_id: u16, num_tiles: u16) -> Self {
        Self {
            name: name.into(),
            base_tile_id,
            num_tiles,
            is_secondary: false,
            frame_sequence: None,
            duration_ms: DEFAULT_FRAME_DURATION_MS,
        }
    }

    pub fn secondary(mut self) -> Self {
        self.is_secondary = true;
        self
    }

    pub fn with_sequence(mut self, sequence: Vec<usize>) -> Self {
        self.frame_sequence = Some(sequence);
        self
    }

    pub fn with_duration(mut self, duration_ms: u32) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Animated tile ids in combined VRAM space.
    pub fn vram_range(&self) -> Range<u32> {
        let offset = if self.is_secondary { NUM_TILES_IN_PRIMARY_VRAM as u32 } else { 0 };
        let start = self.base_tile_id as u32 + offset;
        start..start + self.num_tiles as u32
    }

    pub fn covers(&self, tile_id: u16) -> bool {
        self.vram_range().contains(&(tile_id as u32))
    }

    /// Indices of extracted frames in playback order.
    ///
    /// Without a sequence frames play linearly. Sequence entries past the
    /// extracted frame count are dropped.
    pub fn frame_order(&self, frame_count: usize) -> Vec<usize> {
        match &self.frame_sequence {
            None => (0..frame_count).collect(),
            Some(sequence) => sequence
                .iter()
                .copied()
                .filter(|&index| {
                    if index >= frame_count {
                        warn!(
                            animation = %self.name,
                            index,
                            frame_count,
                            "Frame sequence entry out of range, skipping"
                        );
                        false
                    } else {
                        true
                    }
                })
                .collect(),
        }
    }
}

/// Supplies animation definitions and rendered frames.
pub trait AnimationSource: Send + Sync {
    fn animations_for_tileset(&self, tileset: &str) -> Vec<AnimationDefinition>;

    /// Render the frames of `animation` with `palettes` (already combined for
    /// the tileset pair).
    fn extract_frames(&self, tileset: &str, animation: &AnimationDefinition, palettes: &[Palette]) -> Vec<RgbaImage>;
}

/// Animation source that knows no animations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnimations;

impl AnimationSource for NoAnimations {
    fn animations_for_tileset(&self, _tileset: &str) -> Vec<AnimationDefinition> {
        Vec::new()
    }

    fn extract_frames(&self, _tileset: &str, _animation: &AnimationDefinition, _palettes: &[Palette]) -> Vec<RgbaImage> {
        Vec::new()
    }
}

/// Frame graphics of one animation.
#[derive(Debug, Clone)]
pub enum FrameImages {
    /// Already rendered; palettes are ignored
    Rgba(Vec<RgbaImage>),
    /// Indexed frames coloured with one palette slot
    Indexed { frames: Vec<IndexedTileset>, palette: u8 },
}

impl FrameImages {
    fn render(&self, palettes: &[Palette]) -> Vec<RgbaImage> {
        match self {
            FrameImages::Rgba(frames) => frames.clone(),
            FrameImages::Indexed { frames, palette } => {
                let palette = palettes.get(*palette as usize);
                frames.iter().map(|frame| colorize(frame, palette)).collect()
            }
        }
    }
}

fn colorize(frame: &IndexedTileset, palette: Option<&Palette>) -> RgbaImage {
    let width = frame.width() as u32;
    let height = frame.height() as u32;
    RgbaImage::from_fn(width, height, |x, y| {
        let index = frame.pixels()[(y * width + x) as usize];
        palette.map_or(TRANSPARENT, |p| p.color(index))
    })
}

/// In-memory animation definitions and frames keyed by tileset name.
#[derive(Debug, Clone, Default)]
pub struct AnimationLibrary {
    definitions: HashMap<String, Vec<AnimationDefinition>>,
    frames: HashMap<(String, String), FrameImages>,
}

impl AnimationLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an animation of `tileset` together with its frame graphics.
    pub fn add(&mut self, tileset: &str, definition: AnimationDefinition, frames: FrameImages) {
        let key = normalize_tileset_name(tileset);
        self.frames.insert((key.clone(), definition.name.clone()), frames);
        self.definitions.entry(key).or_default().push(definition);
    }

    pub fn with(mut self, tileset: &str, definition: AnimationDefinition, frames: FrameImages) -> Self {
        self.add(tileset, definition, frames);
        self
    }
}

impl AnimationSource for AnimationLibrary {
    fn animations_for_tileset(&self, tileset: &str) -> Vec<AnimationDefinition> {
        self.definitions.get(&normalize_tileset_name(tileset)).cloned().unwrap_or_default()
    }

    fn extract_frames(&self, tileset: &str, animation: &AnimationDefinition, palettes: &[Palette]) -> Vec<RgbaImage> {
        self.frames
            .get(&(normalize_tileset_name(tileset), animation.name.clone()))
            .map(|frames| frames.render(palettes))
            .unwrap_or_default()
    }
}

/// One step of an output animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnimationFrame {
    /// Frame tile, flip bits stripped
    pub gid: Gid,
    pub duration_ms: u32,
}

/// Substitution cycle for one atlas tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileAnimation {
    pub base_gid: Gid,
    pub frames: Vec<AnimationFrame>,
}

/// Frames usable for substitution must cover exactly one metatile.
pub fn is_metatile_frame(frame: &RgbaImage) -> bool {
    frame.dimensions() == (METATILE_SIZE, METATILE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_vram_range_offsets_secondary() {
        let primary = AnimationDefinition::new("flower", 508, 4);
        assert_eq!(primary.vram_range(), 508..512);
        assert!(primary.covers(511));
        assert!(!primary.covers(512));

        let secondary = AnimationDefinition::new("water", 0, 4).secondary();
        assert_eq!(secondary.vram_range(), 512..516);
        assert!(secondary.covers(513));
        assert!(!secondary.covers(1));
    }

    #[test]
    fn test_frame_order_linear_without_sequence() {
        let def = AnimationDefinition::new("water", 0, 4);
        assert_eq!(def.frame_order(3), vec![0, 1, 2]);
    }

    #[test]
    fn test_frame_order_follows_sequence() {
        let def = AnimationDefinition::new("flower", 0, 4).with_sequence(vec![0, 1, 0, 2]);
        assert_eq!(def.frame_order(3), vec![0, 1, 0, 2]);
    }

    #[test]
    fn test_frame_order_skips_out_of_range() {
        let def = AnimationDefinition::new("sand", 0, 4).with_sequence(vec![0, 5, 1]);
        assert_eq!(def.frame_order(2), vec![0, 1]);
    }

    #[test]
    fn test_definition_defaults_from_json() {
        let def: AnimationDefinition =
            serde_json::from_str(r#"{"name": "water", "base_tile_id": 0, "num_tiles": 4}"#).unwrap();
        assert_eq!(def.duration_ms, 200);
        assert!(!def.is_secondary);
        assert!(def.frame_sequence.is_none());
    }

    #[test]
    fn test_library_renders_indexed_frames() {
        let frame = IndexedTileset::new(16, vec![1; 256]).unwrap();
        let library = AnimationLibrary::new().with(
            "gTileset_General",
            AnimationDefinition::new("water", 0, 4),
            FrameImages::Indexed { frames: vec![frame], palette: 1 },
        );

        let defs = library.animations_for_tileset("general");
        assert_eq!(defs.len(), 1);

        let palettes = vec![Palette::default(), Palette::from_rgb(&[[0, 0, 0], [0, 0, 200]])];
        let frames = library.extract_frames("general", &defs[0], &palettes);
        assert_eq!(frames.len(), 1);
        assert!(is_metatile_frame(&frames[0]));
        assert_eq!(frames[0].get_pixel(3, 3), &Rgba([0, 0, 200, 255]));
    }

    #[test]
    fn test_unknown_animation_has_no_frames() {
        let library = AnimationLibrary::new();
        let def = AnimationDefinition::new("lava", 0, 1);
        assert!(library.extract_frames("general", &def, &[]).is_empty());
        assert!(NoAnimations.animations_for_tileset("general").is_empty());
    }
}
