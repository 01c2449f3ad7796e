//! Shared tileset builder
//!
//! One builder owns the atlas of one source tileset. Map conversion workers
//! feed it metatiles concurrently; each metatile is rendered into a bottom and
//! a top layer image, and each layer is deduplicated into a packed GID.
//!
//! Rendering happens outside the builder lock. Two workers may render the
//! same metatile at once; the cache is checked again under the lock so only
//! one result is kept.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::RgbaImage;
use serde::Serialize;
use tracing::{debug, warn};

use crate::animation::{is_metatile_frame, AnimationDefinition, AnimationFrame, AnimationSource, TileAnimation};
use crate::atlas::{AtlasLayout, TileAtlas, DEFAULT_COLUMNS};
use crate::error::DedupError;
use crate::gid::Gid;
use crate::metatile::{LayerType, Metatile, METATILE_SIZE};
use crate::palette::{combine_vram_palettes, Palette};
use crate::registry::normalize_tileset_name;
use crate::render::{empty_layer, MetatileRenderer};

/// Builder settings shared by every tileset of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderOptions {
    /// Atlas tiles per row
    pub columns: u32,
    /// Compare pixels on hash hits
    pub verify_pixels: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self { columns: DEFAULT_COLUMNS, verify_pixels: false }
    }
}

/// Packed GIDs of a rendered metatile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MetatileGidResult {
    pub bottom: Gid,
    pub top: Gid,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MetatileKey {
    metatile_id: u16,
    tileset: String,
    layer_type: LayerType,
}

/// Animation tracked by source tileset and animation name.
type AnimationKey = (String, String);

struct BuilderState {
    atlas: TileAtlas,
    cache: HashMap<MetatileKey, MetatileGidResult>,
    /// Bare bottom-layer GIDs that sit on animated tiles
    animated: BTreeMap<AnimationKey, BTreeSet<Gid>>,
    emitted: BTreeMap<Gid, TileAnimation>,
}

/// Deduplicating atlas builder for one source tileset.
pub struct SharedTilesetBuilder {
    name: String,
    renderer: Arc<dyn MetatileRenderer>,
    animations: Arc<dyn AnimationSource>,
    definitions: Mutex<HashMap<String, Arc<Vec<AnimationDefinition>>>>,
    state: Mutex<BuilderState>,
}

impl SharedTilesetBuilder {
    pub fn new(
        name: impl Into<String>,
        renderer: Arc<dyn MetatileRenderer>,
        animations: Arc<dyn AnimationSource>,
        options: BuilderOptions,
    ) -> Self {
        let atlas = TileAtlas::new(AtlasLayout::square(METATILE_SIZE, options.columns))
            .with_verification(options.verify_pixels);
        Self {
            name: name.into(),
            renderer,
            animations,
            definitions: Mutex::new(HashMap::new()),
            state: Mutex::new(BuilderState {
                atlas,
                cache: HashMap::new(),
                animated: BTreeMap::new(),
                emitted: BTreeMap::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> MutexGuard<'_, BuilderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Animation definitions of a tileset, fetched once per name.
    fn definitions_for(&self, tileset: &str) -> Arc<Vec<AnimationDefinition>> {
        let key = normalize_tileset_name(tileset);
        let mut cache = self.definitions.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .entry(key)
            .or_insert_with_key(|name| Arc::new(self.animations.animations_for_tileset(name)))
            .clone()
    }

    /// Render and deduplicate a metatile of `tileset`, drawn from the
    /// `primary`/`secondary` pair.
    ///
    /// Results are cached per `(metatile_id, tileset, layer_type)`; a repeated
    /// call returns the cached GIDs without rendering.
    pub fn process_metatile(
        &self,
        metatile: &Metatile,
        metatile_id: u16,
        tileset: &str,
        primary: &str,
        secondary: &str,
    ) -> Result<MetatileGidResult, DedupError> {
        let key = MetatileKey {
            metatile_id,
            tileset: normalize_tileset_name(tileset),
            layer_type: metatile.layer_type,
        };

        if let Some(result) = self.state().cache.get(&key) {
            return Ok(*result);
        }

        let (bottom, top) = self.render(metatile, metatile_id, primary, secondary);
        let memberships = self.animation_memberships(metatile, primary, secondary);

        let mut state = self.state();
        if let Some(result) = state.cache.get(&key) {
            return Ok(*result);
        }

        let result = MetatileGidResult {
            bottom: state.atlas.assign_gid_with_flip_detection(&bottom)?,
            top: state.atlas.assign_gid_with_flip_detection(&top)?,
        };
        for animation in memberships {
            state.animated.entry(animation).or_default().insert(result.bottom.without_flip());
        }
        state.cache.insert(key, result);

        Ok(result)
    }

    fn render(&self, metatile: &Metatile, metatile_id: u16, primary: &str, secondary: &str) -> (RgbaImage, RgbaImage) {
        match self.renderer.render_metatile(metatile, primary, secondary) {
            Some(layers) => layers,
            None => {
                warn!(tileset = %self.name, metatile_id, primary, secondary, "Renderer returned nothing, using transparent layers");
                (empty_layer(), empty_layer())
            }
        }
    }

    /// Animations whose tile range contains any tile of `metatile`.
    ///
    /// Primary and secondary tilesets are checked separately; a definition
    /// only applies in the role it was declared for.
    fn animation_memberships(&self, metatile: &Metatile, primary: &str, secondary: &str) -> Vec<AnimationKey> {
        let mut found = Vec::new();
        for (tileset, is_secondary) in [(primary, false), (secondary, true)] {
            if tileset.is_empty() {
                continue;
            }
            let definitions = self.definitions_for(tileset);
            for definition in definitions.iter().filter(|d| d.is_secondary == is_secondary) {
                if metatile.tile_ids().any(|id| definition.covers(id)) {
                    found.push((normalize_tileset_name(tileset), definition.name.clone()));
                }
            }
        }
        found
    }

    /// Deduplicate the frames of every animation that touched a processed
    /// metatile and emit one [`TileAnimation`] per animated GID.
    ///
    /// Returns the number of tiles that gained an animation in this call. A
    /// tile covered by several animations keeps the last one. Animations
    /// without frames, or with frames that are not metatile sized, are
    /// skipped.
    pub fn process_animations(&self, primary_palettes: &[Palette], secondary_palettes: &[Palette]) -> Result<usize, DedupError> {
        let palettes = combine_vram_palettes(primary_palettes, secondary_palettes);
        let tracked: Vec<(AnimationKey, BTreeSet<Gid>)> =
            self.state().animated.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        let mut emitted = 0;
        for ((tileset, name), base_gids) in tracked {
            if base_gids.is_empty() {
                continue;
            }
            let definitions = self.definitions_for(&tileset);
            let Some(definition) = definitions.iter().find(|d| d.name == name) else {
                continue;
            };

            let frames = self.animations.extract_frames(&tileset, definition, &palettes);
            if frames.is_empty() {
                debug!(tileset = %tileset, animation = %name, "No frames extracted, skipping animation");
                continue;
            }
            if !frames.iter().all(is_metatile_frame) {
                debug!(tileset = %tileset, animation = %name, "Frames are not metatile sized, skipping animation");
                continue;
            }

            let mut state = self.state();
            let mut frame_gids = Vec::with_capacity(frames.len());
            for frame in &frames {
                frame_gids.push(state.atlas.assign_gid_with_flip_detection(frame)?.without_flip());
            }

            let sequence: Vec<AnimationFrame> = definition
                .frame_order(frame_gids.len())
                .into_iter()
                .map(|index| AnimationFrame { gid: frame_gids[index], duration_ms: definition.duration_ms })
                .collect();
            if sequence.is_empty() {
                continue;
            }

            for base_gid in base_gids {
                let animation = TileAnimation { base_gid, frames: sequence.clone() };
                if state.emitted.insert(base_gid, animation).is_some() {
                    warn!(
                        tileset = %self.name,
                        animation = %name,
                        base_gid = base_gid.raw(),
                        "Tile already animated, replacing earlier animation"
                    );
                } else {
                    emitted += 1;
                }
            }
        }

        debug!(tileset = %self.name, emitted, tiles = self.unique_tile_count(), "Processed animations");
        Ok(emitted)
    }

    /// Emitted animations in ascending base GID order.
    pub fn get_animations(&self) -> Vec<TileAnimation> {
        self.state().emitted.values().cloned().collect()
    }

    pub fn unique_tile_count(&self) -> usize {
        self.state().atlas.unique_tile_count()
    }

    pub fn columns(&self) -> u32 {
        self.state().atlas.columns()
    }

    /// Number of memoized metatile results.
    pub fn cached_metatiles(&self) -> usize {
        self.state().cache.len()
    }

    pub fn build_tilesheet_image(&self) -> RgbaImage {
        self.state().atlas.build_tilesheet_image()
    }
}

impl std::fmt::Debug for SharedTilesetBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTilesetBuilder")
            .field("name", &self.name)
            .field("unique_tiles", &self.unique_tile_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{AnimationLibrary, FrameImages, NoAnimations};
    use crate::dedup::Flip;
    use crate::metatile::TileRef;
    use crate::render::IndexedTilesetRenderer;
    use crate::tileset::IndexedTileset;
    use image::Rgba;

    /// Sheet of `count` tiles; tile i is filled with colour i+1 and has a
    /// colour 15 marker in its top-left corner. Tile 0 stays blank.
    fn sheet(count: usize) -> IndexedTileset {
        let width = count * 8;
        let mut pixels = vec![0u8; width * 8];
        for tile in 1..count {
            for y in 0..8 {
                for x in 0..8 {
                    pixels[y * width + tile * 8 + x] = (tile % 14 + 1) as u8;
                }
            }
            pixels[tile * 8] = 15;
        }
        IndexedTileset::new(width, pixels).unwrap()
    }

    fn palettes() -> Vec<Palette> {
        let colors: Vec<[u8; 3]> = (0..16u8).map(|i| [i * 16, 255 - i * 16, i]).collect();
        vec![Palette::from_rgb(&colors); 13]
    }

    fn renderer() -> Arc<IndexedTilesetRenderer> {
        Arc::new(IndexedTilesetRenderer::new().with_tileset("general", sheet(8), palettes()))
    }

    fn builder(animations: Arc<dyn AnimationSource>) -> SharedTilesetBuilder {
        SharedTilesetBuilder::new("general", renderer(), animations, BuilderOptions::default())
    }

    fn single(tile: TileRef) -> Metatile {
        let mut metatile = Metatile::empty();
        metatile.tiles[0] = tile;
        metatile
    }

    #[test]
    fn test_process_metatile_is_idempotent() {
        let builder = builder(Arc::new(NoAnimations));
        let metatile = single(TileRef::new(3, Flip::NONE, 0));

        let first = builder.process_metatile(&metatile, 1, "general", "general", "").unwrap();
        let count = builder.unique_tile_count();
        let second = builder.process_metatile(&metatile, 1, "general", "general", "").unwrap();

        assert_eq!(first, second);
        assert_eq!(builder.unique_tile_count(), count);
        assert_eq!(builder.cached_metatiles(), 1);
    }

    #[test]
    fn test_layer_type_is_part_of_cache_key() {
        let builder = builder(Arc::new(NoAnimations));
        let mut metatile = single(TileRef::new(3, Flip::NONE, 0));
        builder.process_metatile(&metatile, 1, "general", "general", "").unwrap();
        metatile.layer_type = LayerType::Covered;
        builder.process_metatile(&metatile, 1, "general", "general", "").unwrap();
        assert_eq!(builder.cached_metatiles(), 2);
    }

    #[test]
    fn test_mirrored_metatile_shares_canonical_tile() {
        let builder = builder(Arc::new(NoAnimations));
        let plain = single(TileRef::new(2, Flip::NONE, 0));
        let mut mirrored = Metatile::empty();
        mirrored.tiles[1] = TileRef::new(2, Flip::H, 0);

        let a = builder.process_metatile(&plain, 1, "general", "general", "").unwrap();
        let b = builder.process_metatile(&mirrored, 2, "general", "general", "").unwrap();

        assert_eq!(a.bottom.bare(), b.bottom.bare());
        assert_eq!(b.bottom.flip(), Flip::H);
        assert_eq!(a.top, b.top);
        assert_eq!(builder.unique_tile_count(), 2);
    }

    #[test]
    fn test_unrenderable_metatile_is_transparent() {
        let builder = SharedTilesetBuilder::new(
            "missing",
            Arc::new(IndexedTilesetRenderer::new()),
            Arc::new(NoAnimations),
            BuilderOptions::default(),
        );
        let result = builder.process_metatile(&Metatile::empty(), 0, "missing", "missing", "").unwrap();
        assert_eq!(result.bottom, result.top);
        assert_eq!(builder.unique_tile_count(), 1);
        assert_eq!(builder.build_tilesheet_image().get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_animation_frames_share_dedup_space() {
        let frame_a = RgbaImage::from_pixel(16, 16, Rgba([1, 2, 3, 255]));
        let frame_b = RgbaImage::from_pixel(16, 16, Rgba([4, 5, 6, 255]));
        let library = AnimationLibrary::new().with(
            "general",
            AnimationDefinition::new("water", 4, 2).with_sequence(vec![1, 0, 1]).with_duration(150),
            FrameImages::Rgba(vec![frame_a.clone(), frame_b]),
        );
        let builder = builder(Arc::new(library));

        let animated = builder.process_metatile(&single(TileRef::new(5, Flip::NONE, 0)), 7, "general", "general", "").unwrap();
        builder.process_metatile(&single(TileRef::new(1, Flip::NONE, 0)), 8, "general", "general", "").unwrap();

        assert_eq!(builder.process_animations(&palettes(), &palettes()).unwrap(), 1);
        let animations = builder.get_animations();
        assert_eq!(animations.len(), 1);
        assert_eq!(animations[0].base_gid, animated.bottom.without_flip());
        assert_eq!(animations[0].frames.len(), 3);
        assert_eq!(animations[0].frames[0].gid, animations[0].frames[2].gid);
        assert!(animations[0].frames.iter().all(|f| f.duration_ms == 150 && f.gid.flip().is_identity()));

        // Frames landed in the same atlas: 3 static + 2 frames
        assert_eq!(builder.unique_tile_count(), 5);
    }

    #[test]
    fn test_secondary_definition_ignored_in_primary_role() {
        let library = AnimationLibrary::new().with(
            "general",
            AnimationDefinition::new("water", 0, 8).secondary(),
            FrameImages::Rgba(vec![RgbaImage::new(16, 16)]),
        );
        let builder = builder(Arc::new(library));
        builder.process_metatile(&single(TileRef::new(2, Flip::NONE, 0)), 1, "general", "general", "").unwrap();
        assert_eq!(builder.process_animations(&[], &[]).unwrap(), 0);
    }

    #[test]
    fn test_mismatched_frames_are_skipped() {
        let library = AnimationLibrary::new().with(
            "general",
            AnimationDefinition::new("big", 0, 8),
            FrameImages::Rgba(vec![RgbaImage::new(32, 32)]),
        );
        let builder = builder(Arc::new(library));
        builder.process_metatile(&single(TileRef::new(2, Flip::NONE, 0)), 1, "general", "general", "").unwrap();
        let count = builder.unique_tile_count();

        assert_eq!(builder.process_animations(&[], &[]).unwrap(), 0);
        assert!(builder.get_animations().is_empty());
        assert_eq!(builder.unique_tile_count(), count);
    }

    #[test]
    fn test_animation_without_frames_is_skipped() {
        let library = AnimationLibrary::new().with(
            "general",
            AnimationDefinition::new("water", 0, 8),
            FrameImages::Rgba(vec![]),
        );
        let builder = builder(Arc::new(library));
        builder.process_metatile(&single(TileRef::new(2, Flip::NONE, 0)), 1, "general", "general", "").unwrap();
        let count = builder.unique_tile_count();

        assert_eq!(builder.process_animations(&palettes(), &palettes()).unwrap(), 0);
        assert!(builder.get_animations().is_empty());
        assert_eq!(builder.unique_tile_count(), count);
    }

    #[test]
    fn test_overlapping_animations_keep_last() {
        let flower = RgbaImage::from_pixel(16, 16, Rgba([9, 9, 9, 255]));
        let water = RgbaImage::from_pixel(16, 16, Rgba([7, 7, 7, 255]));
        let library = AnimationLibrary::new()
            .with("general", AnimationDefinition::new("flower", 2, 2), FrameImages::Rgba(vec![flower]))
            .with("general", AnimationDefinition::new("water", 0, 4), FrameImages::Rgba(vec![water]));
        let builder = builder(Arc::new(library));
        let animated = builder.process_metatile(&single(TileRef::new(2, Flip::NONE, 0)), 1, "general", "general", "").unwrap();

        assert_eq!(builder.process_animations(&palettes(), &palettes()).unwrap(), 1);
        let animations = builder.get_animations();
        assert_eq!(animations.len(), 1);
        assert_eq!(animations[0].base_gid, animated.bottom.without_flip());

        let sheet = builder.build_tilesheet_image();
        let frame = animations[0].frames[0].gid.local_id().unwrap() as u32;
        let (x, y) = ((frame % 16) * 16, (frame / 16) * 16);
        assert_eq!(sheet.get_pixel(x, y), &Rgba([7, 7, 7, 255]));
    }

    #[test]
    fn test_concurrent_processing_keeps_one_result() {
        let builder = Arc::new(builder(Arc::new(NoAnimations)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let builder = Arc::clone(&builder);
                std::thread::spawn(move || {
                    (1..8u16)
                        .map(|id| {
                            builder
                                .process_metatile(&single(TileRef::new(id, Flip::NONE, 0)), id, "general", "general", "")
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let results: Vec<Vec<MetatileGidResult>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        // Seven distinct bottoms plus one transparent top
        assert_eq!(builder.unique_tile_count(), 8);
    }
}
