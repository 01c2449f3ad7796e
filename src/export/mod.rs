//! Export of finished tilesets.
//!
//! Each [`TilesetOutput`](crate::registry::TilesetOutput) is written as a PNG
//! atlas plus a descriptor the map editor understands.
//!
//! # Supported Formats
//!
//! - **Tiled**: tileset JSON (`.json`) with per-tile animations
//!
//! # Example
//!
//! ```ignore
//! use sharedtiles::export::{write_tileset, ExportOptions};
//!
//! for output in registry.build_all_tilesets(&palettes)? {
//!     write_tileset(&output, Path::new("build/tilesets"), &ExportOptions::default())?;
//! }
//! ```

pub mod tiled;

pub use tiled::*;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::registry::TilesetOutput;

/// Error raised while writing tileset files.
#[derive(Debug, Error)]
pub enum ExportError {
    /// IO error during file writing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Atlas image could not be encoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    /// Descriptor could not be serialized
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// Options for export operations.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Pretty print output (with indentation)
    pub pretty: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { pretty: true }
    }
}

/// Trait for tileset descriptor formats.
pub trait Exporter {
    /// Write the descriptor of `output`, referencing `image_file`, to `path`.
    fn export(&self, output: &TilesetOutput, image_file: &str, path: &Path, options: &ExportOptions) -> Result<()>;

    fn format_name(&self) -> &'static str;

    fn extension(&self) -> &'static str;
}

/// Write `<name>.png` and the Tiled descriptor `<name>.json` into `dir`.
///
/// Returns the descriptor path.
pub fn write_tileset(output: &TilesetOutput, dir: &Path, options: &ExportOptions) -> Result<PathBuf> {
    write_tileset_with(&TiledExporter::new(), output, dir, options)
}

/// [`write_tileset`] with an explicit descriptor format.
pub fn write_tileset_with(
    exporter: &dyn Exporter,
    output: &TilesetOutput,
    dir: &Path,
    options: &ExportOptions,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let image_file = format!("{}.png", output.name);
    output.image.save(dir.join(&image_file))?;

    let descriptor = dir.join(format!("{}.{}", output.name, exporter.extension()));
    exporter.export(output, &image_file, &descriptor, options)?;
    Ok(descriptor)
}
