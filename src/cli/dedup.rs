//! Dedup command implementation

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use image::{imageops, RgbaImage};
use tracing::{debug, info};

use crate::atlas::{AtlasLayout, TileAtlas};
use crate::config::{load_config, merge_cli_overrides, CliOverrides};
use crate::error::DedupError;
use crate::gid::Gid;

use super::{expand_inputs, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Counts reported after a dedup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupSummary {
    pub sheets: usize,
    pub tiles: usize,
    pub unique: usize,
}

/// Cut a sheet into `tile_size` tiles, row-major. Partial tiles at the right
/// and bottom edges are dropped.
pub fn split_sheet(sheet: &RgbaImage, tile_size: u32) -> Vec<RgbaImage> {
    let cols = sheet.width() / tile_size;
    let rows = sheet.height() / tile_size;
    let mut tiles = Vec::with_capacity((cols * rows) as usize);
    for row in 0..rows {
        for col in 0..cols {
            tiles.push(imageops::crop_imm(sheet, col * tile_size, row * tile_size, tile_size, tile_size).to_image());
        }
    }
    tiles
}

/// Deduplicate every tile of every sheet into one atlas.
///
/// Returns the atlas and, per sheet name, the packed GID of each tile.
pub fn dedup_sheets(
    sheets: &[(String, RgbaImage)],
    tile_size: u32,
    columns: u32,
    verify_pixels: bool,
) -> Result<(TileAtlas, BTreeMap<String, Vec<Gid>>), DedupError> {
    let mut atlas = TileAtlas::new(AtlasLayout::square(tile_size, columns)).with_verification(verify_pixels);
    let mut mapping = BTreeMap::new();

    for (name, sheet) in sheets {
        let gids = split_sheet(sheet, tile_size)
            .iter()
            .map(|tile| atlas.assign_gid_with_flip_detection(tile))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(sheet = %name, tiles = gids.len(), unique = atlas.unique_tile_count(), "Deduplicated sheet");
        mapping.insert(name.clone(), gids);
    }

    Ok((atlas, mapping))
}

fn sheet_name(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| path.display().to_string())
}

/// Execute the dedup command
pub fn run_dedup(
    inputs: &[PathBuf],
    output: &Path,
    map: Option<&Path>,
    tile_size: Option<u32>,
    columns: Option<u32>,
    verify: bool,
    config_path: Option<&Path>,
) -> ExitCode {
    let overrides = CliOverrides {
        columns,
        tile_size,
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

    let files = expand_inputs(inputs);
    if files.is_empty() {
        eprintln!("Error: no PNG files found in inputs");
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    let mut sheets = Vec::with_capacity(files.len());
    for file in &files {
        match image::open(file) {
            Ok(img) => sheets.push((sheet_name(file), img.to_rgba8())),
            Err(e) => {
                eprintln!("Error: Cannot read '{}': {}", file.display(), e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    }

    let (atlas, mapping) =
        match dedup_sheets(&sheets, config.atlas.tile_size, config.atlas.columns, config.dedup.verify_pixels) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Error: Cannot create '{}': {}", parent.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    }
    if let Err(e) = atlas.build_tilesheet_image().save(output) {
        eprintln!("Error: Cannot write '{}': {}", output.display(), e);
        return ExitCode::from(EXIT_ERROR);
    }

    if let Some(map_path) = map {
        let raw: BTreeMap<&str, Vec<u32>> =
            mapping.iter().map(|(name, gids)| (name.as_str(), gids.iter().map(|g| g.raw()).collect())).collect();
        let written = serde_json::to_string_pretty(&raw)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(map_path, json).map_err(|e| e.to_string()));
        if let Err(e) = written {
            eprintln!("Error: Cannot write '{}': {}", map_path.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    }

    let summary = DedupSummary {
        sheets: sheets.len(),
        tiles: mapping.values().map(Vec::len).sum(),
        unique: atlas.unique_tile_count(),
    };
    info!(sheets = summary.sheets, tiles = summary.tiles, unique = summary.unique, "Dedup finished");
    println!(
        "{} unique tiles from {} tiles in {} sheet(s) -> {}",
        summary.unique,
        summary.tiles,
        summary.sheets,
        output.display()
    );
    ExitCode::from(EXIT_SUCCESS)
}
