//! Build command implementation
//!
//! Reads a JSON project manifest, converts every map against one shared
//! registry and writes each finished tileset as a PNG atlas plus Tiled
//! descriptor. Converted maps land in `maps.json` next to the tilesets.
//!
//! Source tilesheets are 8-bit grayscale PNGs: each pixel value is a palette
//! index. Paths in the manifest are relative to the manifest file.
//!
//! ```json
//! {
//!   "tilesets": [
//!     { "name": "gTileset_General", "sheet": "general.png",
//!       "palettes": [[[0, 0, 0], [255, 255, 255]]],
//!       "metatiles": [[1, 2, 3, 4, 0, 0, 0, 0]], "attributes": [0] }
//!   ],
//!   "maps": [
//!     { "name": "route_101", "primary": "gTileset_General", "metatile_ids": [0, 0, 1] }
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::animation::NoAnimations;
use crate::batch::{MapJob, MetatileTables, ParallelConvert};
use crate::config::{load_config, merge_cli_overrides, CliOverrides, SharedTilesConfig};
use crate::error::{BatchError, DedupError};
use crate::export::{write_tileset, ExportError, ExportOptions};
use crate::metatile::{Metatile, NUM_TILES_PER_METATILE};
use crate::palette::{Palette, PaletteTable};
use crate::registry::SharedTilesetRegistry;
use crate::render::IndexedTilesetRenderer;
use crate::tileset::IndexedTileset;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Name of the converted map file written into the output directory
pub const MAPS_FILE: &str = "maps.json";

/// Error raised while loading or building a project.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid project manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("Cannot read tilesheet '{path}': {source}")]
    Sheet {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Tileset '{name}': {source}")]
    Tileset {
        name: String,
        #[source]
        source: DedupError,
    },
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error(transparent)]
    Dedup(#[from] DedupError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// One source tileset of a project.
#[derive(Debug, Clone, Deserialize)]
pub struct TilesetEntry {
    pub name: String,
    /// Grayscale PNG, pixel value = palette index
    pub sheet: PathBuf,
    /// Palettes in slot order, RGB triples
    #[serde(default)]
    pub palettes: Vec<Vec<[u8; 3]>>,
    /// Raw 16-bit tile entries, eight per metatile
    #[serde(default)]
    pub metatiles: Vec<[u16; NUM_TILES_PER_METATILE]>,
    /// Layer-type attribute per metatile; missing entries are normal
    #[serde(default)]
    pub attributes: Vec<u8>,
}

/// Project manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectManifest {
    pub tilesets: Vec<TilesetEntry>,
    #[serde(default)]
    pub maps: Vec<MapJob>,
}

/// Manifest contents resolved into the collaborators a build needs.
#[derive(Debug)]
pub struct LoadedProject {
    pub renderer: IndexedTilesetRenderer,
    pub palettes: PaletteTable,
    pub tables: MetatileTables,
    pub maps: Vec<MapJob>,
}

/// Counts reported after a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub maps: usize,
    pub tilesets: usize,
    pub tiles: usize,
}

fn load_sheet(path: &Path) -> Result<IndexedTileset, BuildError> {
    let gray = image::open(path)
        .map_err(|source| BuildError::Sheet { path: path.to_path_buf(), source })?
        .to_luma8();
    let width = gray.width() as usize;
    IndexedTileset::new(width, gray.into_raw()).map_err(|source| BuildError::Tileset {
        name: path.display().to_string(),
        source,
    })
}

/// Read a manifest and every tilesheet it references.
pub fn load_project(path: &Path) -> Result<LoadedProject, BuildError> {
    let manifest: ProjectManifest = serde_json::from_str(&fs::read_to_string(path)?)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let mut renderer = IndexedTilesetRenderer::new();
    let mut palettes = PaletteTable::new();
    let mut tables = MetatileTables::new();

    for entry in manifest.tilesets {
        let sheet = load_sheet(&base.join(&entry.sheet))?;
        let tileset_palettes: Vec<Palette> = entry.palettes.iter().map(|colors| Palette::from_rgb(colors)).collect();
        let metatiles: Vec<Metatile> = entry
            .metatiles
            .iter()
            .enumerate()
            .map(|(i, raw)| Metatile::from_raw(*raw, entry.attributes.get(i).copied().unwrap_or(0)))
            .collect();

        debug!(
            tileset = %entry.name,
            tiles = sheet.tile_count(),
            metatiles = metatiles.len(),
            palettes = tileset_palettes.len(),
            "Loaded tileset"
        );
        renderer.add_tileset(&entry.name, sheet, tileset_palettes.clone());
        palettes.insert(&entry.name, tileset_palettes);
        tables.insert(&entry.name, metatiles);
    }

    Ok(LoadedProject { renderer, palettes, tables, maps: manifest.maps })
}

/// Convert every map of `project` and write the finished tilesets into
/// `config.build.out`.
pub fn build_project(project: LoadedProject, config: &SharedTilesConfig) -> Result<BuildSummary, BuildError> {
    let LoadedProject { renderer, palettes, tables, maps } = project;
    let registry = SharedTilesetRegistry::new(Arc::new(renderer), Arc::new(NoAnimations), config.builder_options());

    let converted = ParallelConvert::new().with_jobs(config.build.jobs).run(&registry, &tables, &maps)?;
    let outputs = registry.build_all_tilesets(&palettes)?;

    let out = &config.build.out;
    let options = ExportOptions::default();
    for output in &outputs {
        let descriptor = write_tileset(output, out, &options)?;
        debug!(tileset = %output.name, path = %descriptor.display(), "Wrote tileset");
    }
    fs::create_dir_all(out)?;
    fs::write(out.join(MAPS_FILE), serde_json::to_string_pretty(&converted)?)?;

    let summary = BuildSummary {
        maps: converted.len(),
        tilesets: outputs.len(),
        tiles: outputs.iter().map(|o| o.tile_count).sum(),
    };
    info!(maps = summary.maps, tilesets = summary.tilesets, tiles = summary.tiles, "Build finished");
    Ok(summary)
}

/// Execute the build command
pub fn run_build(
    project: &Path,
    out: Option<&Path>,
    jobs: Option<usize>,
    columns: Option<u32>,
    verify: bool,
    config_path: Option<&Path>,
) -> ExitCode {
    let overrides = CliOverrides {
        columns,
        jobs,
        out: out.map(Path::to_path_buf),
        verify_pixels: verify.then_some(true),
        ..Default::default()
    };
    let config = match load_config(config_path).and_then(|c| merge_cli_overrides(c, &overrides)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let loaded = match load_project(project) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: Cannot load '{}': {}", project.display(), e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    match build_project(loaded, &config) {
        Ok(summary) => {
            println!(
                "Built {} tileset(s) with {} unique tiles from {} map(s) -> {}",
                summary.tilesets,
                summary.tiles,
                summary.maps,
                config.build.out.display()
            );
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
