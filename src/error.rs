//! Error types for tile deduplication and shared tileset construction

use thiserror::Error;

/// Error raised by the deduplication primitives.
///
/// These indicate a broken collaborator contract upstream (wrong buffer sizes,
/// out-of-range tile ids) or an exhausted GID space; none of them are
/// recoverable per tile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DedupError {
    /// Pixel buffer does not have the expected length
    #[error("Invalid tile buffer: expected {expected} bytes, got {actual}")]
    InvalidTileSize { expected: usize, actual: usize },
    /// Source image has no tile at the requested index
    #[error("Tile {tile_id} is outside the source image ({available} tiles available)")]
    TileOutOfBounds { tile_id: usize, available: usize },
    /// Canonical tile count would no longer fit into the GID id bits
    #[error("Canonical tile limit of {limit} exceeded")]
    TooManyTiles { limit: usize },
}

/// Error raised by the parallel map conversion driver.
#[derive(Debug, Error)]
pub enum BatchError {
    /// A map could not be converted
    #[error("Failed to convert map '{map}': {source}")]
    Map {
        map: String,
        #[source]
        source: DedupError,
    },
    /// Worker pool could not be started
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
