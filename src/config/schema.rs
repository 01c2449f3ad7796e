//! Configuration schema for `sharedtiles.toml`
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) is a valid configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::atlas::DEFAULT_COLUMNS;
use crate::builder::BuilderOptions;

/// Tile edges accepted by the `dedup` command
pub const SUPPORTED_TILE_SIZES: [u32; 3] = [8, 16, 32];

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedTilesConfig {
    #[serde(default)]
    pub atlas: AtlasConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub build: BuildConfig,
}

/// `[atlas]` - output sheet layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasConfig {
    #[serde(default = "default_columns")]
    pub columns: u32,
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
}

fn default_columns() -> u32 {
    DEFAULT_COLUMNS
}

fn default_tile_size() -> u32 {
    16
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self { columns: default_columns(), tile_size: default_tile_size() }
    }
}

/// `[dedup]` - matching policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Compare pixels on every hash hit
    #[serde(default)]
    pub verify_pixels: bool,
}

/// `[build]` - batch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Worker threads; 0 uses available parallelism
    #[serde(default)]
    pub jobs: usize,
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

fn default_out() -> PathBuf {
    PathBuf::from("build/tilesets")
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { jobs: 0, out: default_out() }
    }
}

/// A single invalid field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "atlas.columns")
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sharedtiles.toml: '{}' {}", self.field, self.message)
    }
}

impl SharedTilesConfig {
    /// Collect every invalid field.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.atlas.columns == 0 {
            errors.push(ConfigValidationError {
                field: "atlas.columns".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        if !SUPPORTED_TILE_SIZES.contains(&self.atlas.tile_size) {
            errors.push(ConfigValidationError {
                field: "atlas.tile_size".to_string(),
                message: format!("must be one of {:?}", SUPPORTED_TILE_SIZES),
            });
        }

        if self.build.out.as_os_str().is_empty() {
            errors.push(ConfigValidationError {
                field: "build.out".to_string(),
                message: "must be a non-empty path".to_string(),
            });
        }

        errors
    }

    /// Builder settings derived from this configuration.
    pub fn builder_options(&self) -> BuilderOptions {
        BuilderOptions { columns: self.atlas.columns, verify_pixels: self.dedup.verify_pixels }
    }
}
