//! Configuration loading and discovery for `sharedtiles.toml`
//!
//! Provides functions to find, load, and merge configuration.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::schema::SharedTilesConfig;

/// Name of the configuration file
pub const CONFIG_FILE: &str = "sharedtiles.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse sharedtiles.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override atlas column count
    pub columns: Option<u32>,
    /// Override tile size
    pub tile_size: Option<u32>,
    /// Number of parallel jobs
    pub jobs: Option<usize>,
    /// Override output directory
    pub out: Option<PathBuf>,
    /// Enable pixel verification
    pub verify_pixels: Option<bool>,
}

/// Find sharedtiles.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    let cwd = env::current_dir().ok()?;
    find_config_from(cwd)
}

/// Find sharedtiles.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a sharedtiles.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses
/// [`find_config`] to locate the config file, falling back to the defaults
/// when none exists.
///
/// # Example
/// ```ignore
/// let config = load_config(None)?;
/// let config = load_config(Some(Path::new("maps/sharedtiles.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<SharedTilesConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => {
            debug!("No {} found, using defaults", CONFIG_FILE);
            Ok(SharedTilesConfig::default())
        }
    }
}

fn load_config_file(path: &Path) -> Result<SharedTilesConfig, ConfigError> {
    debug!(path = %path.display(), "Loading config");
    let contents = fs::read_to_string(path)?;
    let config: SharedTilesConfig = toml::from_str(&contents)?;
    validated(config)
}

fn validated(config: SharedTilesConfig) -> Result<SharedTilesConfig, ConfigError> {
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }
    Ok(config)
}

/// Merge CLI overrides into a configuration and validate the result.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(mut config: SharedTilesConfig, overrides: &CliOverrides) -> Result<SharedTilesConfig, ConfigError> {
    if let Some(columns) = overrides.columns {
        config.atlas.columns = columns;
    }
    if let Some(tile_size) = overrides.tile_size {
        config.atlas.tile_size = tile_size;
    }
    if let Some(jobs) = overrides.jobs {
        config.build.jobs = jobs;
    }
    if let Some(ref out) = overrides.out {
        config.build.out = out.clone();
    }
    if let Some(verify_pixels) = overrides.verify_pixels {
        config.dedup.verify_pixels = verify_pixels;
    }
    validated(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = temp.path().join(CONFIG_FILE);
        File::create(&config_path)
            .expect("should create config file")
            .write_all(b"[atlas]\ncolumns = 8")
            .expect("should write config content");

        let subdir = temp.path().join("data").join("maps");
        fs::create_dir_all(&subdir).expect("should create subdirectories");

        assert_eq!(find_config_from(subdir), Some(config_path));
    }

    #[test]
    fn test_find_config_not_found() {
        let temp = TempDir::new().expect("should create temp dir");
        assert_eq!(find_config_from(temp.path().to_path_buf()), None);
    }

    #[test]
    fn test_load_config_from_file() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = temp.path().join(CONFIG_FILE);
        fs::write(&config_path, "[build]\njobs = 4\nout = \"dist\"\n").expect("should write config");

        let config = load_config(Some(&config_path)).expect("should load config");
        assert_eq!(config.build.jobs, 4);
        assert_eq!(config.build.out, PathBuf::from("dist"));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = temp.path().join(CONFIG_FILE);
        fs::write(&config_path, "[atlas\ncolumns = ").expect("should write config");

        assert!(matches!(load_config(Some(&config_path)), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_validation_error() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = temp.path().join(CONFIG_FILE);
        fs::write(&config_path, "[atlas]\ncolumns = 0\n").expect("should write config");

        let err = load_config(Some(&config_path)).unwrap_err();
        assert!(err.to_string().contains("atlas.columns"));
    }

    #[test]
    fn test_merge_cli_overrides() {
        let overrides = CliOverrides {
            columns: Some(4),
            verify_pixels: Some(true),
            out: Some(PathBuf::from("out")),
            ..Default::default()
        };
        let config = merge_cli_overrides(SharedTilesConfig::default(), &overrides).unwrap();
        assert_eq!(config.atlas.columns, 4);
        assert!(config.dedup.verify_pixels);
        assert_eq!(config.build.out, PathBuf::from("out"));
        assert_eq!(config.atlas.tile_size, 16);
    }

    #[test]
    fn test_merge_rejects_bad_override() {
        let overrides = CliOverrides { tile_size: Some(7), ..Default::default() };
        assert!(matches!(
            merge_cli_overrides(SharedTilesConfig::default(), &overrides),
            Err(ConfigError::Validation(_))
        ));
    }
}
