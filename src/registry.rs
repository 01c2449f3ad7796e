//! Shared tileset registry
//!
//! The registry is the per-run context handed to every map conversion task.
//! It owns one [`SharedTilesetBuilder`] per individual tileset name and hands
//! out cached pair façades, so every map using the same tileset contributes to
//! (and reuses) the same atlas.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::RgbaImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::animation::{AnimationSource, TileAnimation};
use crate::builder::{BuilderOptions, MetatileGidResult, SharedTilesetBuilder};
use crate::error::DedupError;
use crate::metatile::Metatile;
use crate::palette::PaletteSource;
use crate::render::MetatileRenderer;

const TILESET_PREFIX: &str = "gTileset_";

/// Canonical form of a tileset name.
///
/// Trims whitespace, drops a `gTileset_` prefix and converts CamelCase to
/// lower snake_case: `gTileset_PetalburgCity` becomes `petalburg_city`.
pub fn normalize_tileset_name(name: &str) -> String {
    let trimmed = name.trim();
    let stripped = trimmed.strip_prefix(TILESET_PREFIX).unwrap_or(trimmed);
    let chars: Vec<char> = stripped.chars().collect();

    let mut out = String::with_capacity(stripped.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_whitespace() || c == '-' || c == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower);
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Role a tileset plays in its pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TilesetKind {
    Primary,
    Secondary,
}

impl fmt::Display for TilesetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TilesetKind::Primary => write!(f, "primary"),
            TilesetKind::Secondary => write!(f, "secondary"),
        }
    }
}

/// Normalized `(primary, secondary)` names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TilesetPairKey {
    pub primary: String,
    pub secondary: String,
}

impl TilesetPairKey {
    pub fn new(primary: &str, secondary: &str) -> Self {
        Self { primary: normalize_tileset_name(primary), secondary: normalize_tileset_name(secondary) }
    }
}

/// Pair-level view over the two per-tileset builders.
#[derive(Debug)]
pub struct TilesetPairBuilder {
    key: TilesetPairKey,
    primary: Arc<SharedTilesetBuilder>,
    secondary: Option<Arc<SharedTilesetBuilder>>,
}

impl TilesetPairBuilder {
    pub fn key(&self) -> &TilesetPairKey {
        &self.key
    }

    pub fn primary(&self) -> &Arc<SharedTilesetBuilder> {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&Arc<SharedTilesetBuilder>> {
        self.secondary.as_ref()
    }

    /// Builder owning `tileset`; anything that is not the secondary tileset
    /// goes to the primary builder.
    pub fn builder_for(&self, tileset: &str) -> &Arc<SharedTilesetBuilder> {
        match &self.secondary {
            Some(secondary) if normalize_tileset_name(tileset) == self.key.secondary => secondary,
            _ => &self.primary,
        }
    }

    /// Process a metatile of `tileset` rendered from this pair.
    pub fn process_metatile(
        &self,
        metatile: &Metatile,
        metatile_id: u16,
        tileset: &str,
    ) -> Result<MetatileGidResult, DedupError> {
        self.builder_for(tileset).process_metatile(
            metatile,
            metatile_id,
            tileset,
            &self.key.primary,
            &self.key.secondary,
        )
    }
}

/// Final per-tileset emission unit.
#[derive(Debug, Clone)]
pub struct TilesetOutput {
    pub name: String,
    pub kind: TilesetKind,
    pub image: RgbaImage,
    pub tile_count: usize,
    pub columns: u32,
    pub animations: Vec<TileAnimation>,
    /// Maps that referenced this tileset, sorted
    pub maps: Vec<String>,
}

struct TrackedTileset {
    builder: Arc<SharedTilesetBuilder>,
    kind: TilesetKind,
}

#[derive(Default)]
struct RegistryState {
    tilesets: BTreeMap<String, TrackedTileset>,
    pairs: HashMap<TilesetPairKey, Arc<TilesetPairBuilder>>,
    map_usage: BTreeMap<String, BTreeSet<String>>,
    /// Primaries each secondary tileset was paired with
    partners: BTreeMap<String, BTreeSet<String>>,
}

/// Builders for every tileset touched during a conversion run.
pub struct SharedTilesetRegistry {
    renderer: Arc<dyn MetatileRenderer>,
    animations: Arc<dyn AnimationSource>,
    options: BuilderOptions,
    state: Mutex<RegistryState>,
}

impl SharedTilesetRegistry {
    pub fn new(renderer: Arc<dyn MetatileRenderer>, animations: Arc<dyn AnimationSource>, options: BuilderOptions) -> Self {
        Self { renderer, animations, options, state: Mutex::new(RegistryState::default()) }
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tracked(&self, state: &mut RegistryState, name: &str, kind: TilesetKind) -> Arc<SharedTilesetBuilder> {
        let tracked = state.tilesets.entry(name.to_string()).or_insert_with(|| {
            debug!(tileset = name, %kind, "Creating tileset builder");
            TrackedTileset {
                builder: Arc::new(SharedTilesetBuilder::new(
                    name,
                    Arc::clone(&self.renderer),
                    Arc::clone(&self.animations),
                    self.options,
                )),
                kind,
            }
        });
        Arc::clone(&tracked.builder)
    }

    /// Cached pair façade for `(primary, secondary)`.
    ///
    /// Every call with the same normalized names returns the same instance.
    pub fn get_or_create_builder(&self, primary: &str, secondary: &str) -> Arc<TilesetPairBuilder> {
        let key = TilesetPairKey::new(primary, secondary);
        let mut state = self.state();
        if let Some(pair) = state.pairs.get(&key) {
            return Arc::clone(pair);
        }

        let primary_builder = self.tracked(&mut state, &key.primary, TilesetKind::Primary);
        let secondary_builder = if key.secondary.is_empty() {
            None
        } else {
            state.partners.entry(key.secondary.clone()).or_default().insert(key.primary.clone());
            Some(self.tracked(&mut state, &key.secondary, TilesetKind::Secondary))
        };

        let pair = Arc::new(TilesetPairBuilder { key: key.clone(), primary: primary_builder, secondary: secondary_builder });
        state.pairs.insert(key, Arc::clone(&pair));
        pair
    }

    /// Record that `map` draws from both tilesets.
    pub fn register_map_usage(&self, map: &str, primary: &str, secondary: &str) {
        let mut state = self.state();
        for tileset in [primary, secondary] {
            let name = normalize_tileset_name(tileset);
            if !name.is_empty() {
                state.map_usage.entry(name).or_default().insert(map.to_string());
            }
        }
    }

    /// Maps registered against `tileset`, sorted.
    pub fn maps_for_tileset(&self, tileset: &str) -> Vec<String> {
        self.state()
            .map_usage
            .get(&normalize_tileset_name(tileset))
            .map(|maps| maps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every tileset with a builder, sorted by name.
    pub fn tracked_tilesets(&self) -> Vec<(String, TilesetKind)> {
        self.state().tilesets.iter().map(|(name, t)| (name.clone(), t.kind)).collect()
    }

    pub fn pair_count(&self) -> usize {
        self.state().pairs.len()
    }

    /// Finalize every tracked tileset: process its animations and pack its
    /// atlas. Output is sorted by tileset name.
    ///
    /// A secondary tileset takes its primary palettes from the first primary
    /// (by name) it was paired with; a primary tileset uses its own palettes
    /// for both halves.
    pub fn build_all_tilesets(&self, palettes: &dyn PaletteSource) -> Result<Vec<TilesetOutput>, DedupError> {
        let jobs: Vec<(String, TilesetKind, Arc<SharedTilesetBuilder>, Option<String>, Vec<String>)> = {
            let state = self.state();
            state
                .tilesets
                .iter()
                .map(|(name, tracked)| {
                    let partner = match tracked.kind {
                        TilesetKind::Secondary => {
                            state.partners.get(name).and_then(|primaries| primaries.iter().next().cloned())
                        }
                        TilesetKind::Primary => None,
                    };
                    let maps = state.map_usage.get(name).map(|m| m.iter().cloned().collect()).unwrap_or_default();
                    (name.clone(), tracked.kind, Arc::clone(&tracked.builder), partner, maps)
                })
                .collect()
        };

        let outputs = jobs
            .into_par_iter()
            .map(|(name, kind, builder, partner, maps)| {
                let own = palettes.palettes_for(&name);
                let primary_palettes = match &partner {
                    Some(primary) => palettes.palettes_for(primary),
                    None => own.clone(),
                };
                builder.process_animations(&primary_palettes, &own)?;

                let output = TilesetOutput {
                    image: builder.build_tilesheet_image(),
                    tile_count: builder.unique_tile_count(),
                    columns: builder.columns(),
                    animations: builder.get_animations(),
                    name,
                    kind,
                    maps,
                };
                debug!(
                    tileset = %output.name,
                    kind = %output.kind,
                    tiles = output.tile_count,
                    animations = output.animations.len(),
                    "Built tileset"
                );
                Ok(output)
            })
            .collect::<Result<Vec<_>, DedupError>>()?;

        info!(tilesets = outputs.len(), "Built shared tilesets");
        Ok(outputs)
    }
}

impl fmt::Debug for SharedTilesetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("SharedTilesetRegistry")
            .field("tilesets", &state.tilesets.keys().collect::<Vec<_>>())
            .field("pairs", &state.pairs.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::NoAnimations;
    use crate::palette::PaletteTable;
    use crate::render::IndexedTilesetRenderer;

    fn registry() -> SharedTilesetRegistry {
        SharedTilesetRegistry::new(
            Arc::new(IndexedTilesetRenderer::new()),
            Arc::new(NoAnimations),
            BuilderOptions::default(),
        )
    }

    #[test]
    fn test_normalize_tileset_name() {
        assert_eq!(normalize_tileset_name("gTileset_General"), "general");
        assert_eq!(normalize_tileset_name("  gTileset_PetalburgCity "), "petalburg_city");
        assert_eq!(normalize_tileset_name("SecretBaseRedCave"), "secret_base_red_cave");
        assert_eq!(normalize_tileset_name("Building2Inside"), "building2_inside");
        assert_eq!(normalize_tileset_name("HTMLLab"), "html_lab");
        assert_eq!(normalize_tileset_name("ever-grande city"), "ever_grande_city");
        assert_eq!(normalize_tileset_name("petalburg_city"), "petalburg_city");
    }

    #[test]
    fn test_pair_builder_is_cached() {
        let registry = registry();
        let a = registry.get_or_create_builder("tileset_a", "tileset_b");
        let b = registry.get_or_create_builder("TilesetA", "gTileset_TilesetB");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.pair_count(), 1);
    }

    #[test]
    fn test_builders_are_per_tileset_name() {
        let registry = registry();
        let first = registry.get_or_create_builder("general", "petalburg");
        let second = registry.get_or_create_builder("general", "rustboro");

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(first.primary(), second.primary()));
        assert_eq!(
            registry.tracked_tilesets(),
            vec![
                ("general".to_string(), TilesetKind::Primary),
                ("petalburg".to_string(), TilesetKind::Secondary),
                ("rustboro".to_string(), TilesetKind::Secondary),
            ]
        );
    }

    #[test]
    fn test_kind_is_fixed_by_first_role() {
        let registry = registry();
        registry.get_or_create_builder("general", "building");
        registry.get_or_create_builder("building", "");
        let kinds: HashMap<_, _> = registry.tracked_tilesets().into_iter().collect();
        assert_eq!(kinds["building"], TilesetKind::Secondary);
    }

    #[test]
    fn test_routing_by_tileset_name() {
        let registry = registry();
        let pair = registry.get_or_create_builder("general", "petalburg");
        assert_eq!(pair.builder_for("gTileset_Petalburg").name(), "petalburg");
        assert_eq!(pair.builder_for("general").name(), "general");
        assert_eq!(pair.builder_for("unknown").name(), "general");
    }

    #[test]
    fn test_map_usage() {
        let registry = registry();
        registry.register_map_usage("route_101", "general", "petalburg");
        registry.register_map_usage("littleroot_town", "gTileset_General", "");
        assert_eq!(registry.maps_for_tileset("general"), vec!["littleroot_town", "route_101"]);
        assert_eq!(registry.maps_for_tileset("petalburg"), vec!["route_101"]);
        assert!(registry.maps_for_tileset("rustboro").is_empty());
    }

    #[test]
    fn test_build_all_tilesets_sorted() {
        let registry = registry();
        let pair = registry.get_or_create_builder("general", "petalburg");
        pair.process_metatile(&Metatile::empty(), 600, "petalburg").unwrap();
        registry.register_map_usage("route_102", "general", "petalburg");

        let outputs = registry.build_all_tilesets(&PaletteTable::new()).unwrap();
        let names: Vec<_> = outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["general", "petalburg"]);
        assert_eq!(outputs[0].tile_count, 0);
        assert_eq!(outputs[1].tile_count, 1);
        assert_eq!(outputs[1].kind, TilesetKind::Secondary);
        assert_eq!(outputs[1].maps, vec!["route_102"]);
        assert_eq!(outputs[1].image.dimensions(), (16 * 16, 16));
    }
}
