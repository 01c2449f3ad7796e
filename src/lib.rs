//! sharedtiles - flip-aware tile deduplication and shared tileset construction
//!
//! This library provides functionality to:
//! - Deduplicate 8x8 indexed tiles and rendered RGBA tiles under the four
//!   flip orientations
//! - Pack GIDs that carry horizontal/vertical flip flags in their top bits
//! - Build one shared atlas per source tileset from metatiles rendered by many
//!   parallel map conversion workers
//! - Track animated tiles and deduplicate animation frames into the same atlas
//! - Emit atlases as PNG plus Tiled tileset JSON

pub mod animation;
pub mod atlas;
pub mod batch;
pub mod builder;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod error;
pub mod export;
pub mod gid;
pub mod hash;
pub mod logging;
pub mod metatile;
pub mod palette;
pub mod registry;
pub mod render;
pub mod tileset;

pub use animation::{AnimationDefinition, AnimationSource, TileAnimation};
pub use atlas::TileAtlas;
pub use builder::{BuilderOptions, MetatileGidResult, SharedTilesetBuilder};
pub use dedup::{Flip, TileDeduplicator, TileReference};
pub use error::{BatchError, DedupError};
pub use gid::Gid;
pub use metatile::{LayerType, Metatile, TileRef};
pub use registry::{SharedTilesetRegistry, TilesetKind, TilesetOutput, TilesetPairBuilder};
pub use render::MetatileRenderer;
