//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;
mod dedup;
mod gid;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use glob::glob;

use crate::logging::init_logging;

pub use build::{build_project, load_project, BuildError, BuildSummary, LoadedProject, ProjectManifest, TilesetEntry, MAPS_FILE};
pub use dedup::{dedup_sheets, split_sheet, DedupSummary};
pub use gid::parse_gid;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Check if a path has a `.png` extension.
pub fn is_png_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

/// Find all PNG files in a directory (recursively), sorted.
pub fn find_png_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(paths) = glob(&format!("{}/**/*.png", dir.display())) {
        files.extend(paths.filter_map(Result::ok));
    }
    files.sort();
    files
}

/// Expand directories into the PNG files they contain; files pass through.
pub fn expand_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(find_png_files(input));
        } else {
            files.push(input.clone());
        }
    }
    files
}

/// sharedtiles - flip-aware tile deduplication into shared atlases
#[derive(Parser)]
#[command(name = "sharedtiles")]
#[command(about = "Deduplicate tiles under flips and pack them into shared atlases")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deduplicate the tiles of one or more tilesheets into a single atlas
    Dedup {
        /// Tilesheet PNG files or directories containing them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output atlas image
        #[arg(short, long, default_value = "atlas.png")]
        output: PathBuf,

        /// Write a JSON mapping of each sheet's tiles to packed GIDs
        #[arg(long)]
        map: Option<PathBuf>,

        /// Tile edge in pixels (8, 16 or 32)
        #[arg(long)]
        tile_size: Option<u32>,

        /// Atlas tiles per row
        #[arg(long)]
        columns: Option<u32>,

        /// Compare pixels on every hash hit
        #[arg(long)]
        verify: bool,

        /// Path to sharedtiles.toml (discovered from the working directory if omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Convert the maps of a project manifest into shared Tiled tilesets
    Build {
        /// Project manifest (JSON)
        project: PathBuf,

        /// Output directory (default from [build].out)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Worker threads; 0 uses available parallelism
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Atlas tiles per row
        #[arg(long)]
        columns: Option<u32>,

        /// Compare pixels on every hash hit
        #[arg(long)]
        verify: bool,

        /// Path to sharedtiles.toml (discovered from the working directory if omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Decode a packed GID
    Gid {
        /// Decimal or 0x-prefixed hexadecimal value
        value: String,
    },
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Dedup { inputs, output, map, tile_size, columns, verify, config } => dedup::run_dedup(
            &inputs,
            &output,
            map.as_deref(),
            tile_size,
            columns,
            verify,
            config.as_deref(),
        ),
        Commands::Build { project, out, jobs, columns, verify, config } => {
            build::run_build(&project, out.as_deref(), jobs, columns, verify, config.as_deref())
        }
        Commands::Gid { value } => gid::run_gid(&value),
    }
}
