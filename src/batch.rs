//! Parallel map conversion
//!
//! Runs map jobs on a rayon pool against one shared registry. Every job
//! resolves its metatile ids through the VRAM split, renders and deduplicates
//! each metatile through the pair builder, and collects the resulting GIDs.
//!
//! # Example
//!
//! ```ignore
//! use sharedtiles::batch::ParallelConvert;
//!
//! let maps = ParallelConvert::new().with_jobs(4).run(&registry, &tables, &jobs)?;
//! let tilesets = registry.build_all_tilesets(&palettes)?;
//! ```

use std::collections::HashMap;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::builder::MetatileGidResult;
use crate::error::{BatchError, DedupError};
use crate::gid::Gid;
use crate::metatile::{metatile_owner, Metatile, PairSide};
use crate::registry::{normalize_tileset_name, SharedTilesetRegistry};

/// GIDs of a cell with no tile in either layer.
pub const EMPTY_CELL: MetatileGidResult = MetatileGidResult { bottom: Gid::from_raw(0), top: Gid::from_raw(0) };

/// Default number of parallel jobs (uses available parallelism).
fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// One map to convert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapJob {
    pub name: String,
    pub primary: String,
    #[serde(default)]
    pub secondary: String,
    /// Map-level metatile ids, row-major
    pub metatile_ids: Vec<u16>,
}

/// Metatile definitions of every tileset, by normalized name.
#[derive(Debug, Clone, Default)]
pub struct MetatileTables {
    tables: HashMap<String, Vec<Metatile>>,
}

impl MetatileTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tileset: &str, metatiles: Vec<Metatile>) {
        self.tables.insert(normalize_tileset_name(tileset), metatiles);
    }

    pub fn get(&self, tileset: &str, local_id: u16) -> Option<&Metatile> {
        self.tables.get(&normalize_tileset_name(tileset))?.get(local_id as usize)
    }
}

/// GIDs of one map cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellGids {
    /// Tileset whose atlas the GIDs index
    pub tileset: String,
    pub gids: MetatileGidResult,
}

/// A converted map, cells in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertedMap {
    pub name: String,
    pub cells: Vec<CellGids>,
}

/// Parallel map conversion driver.
#[derive(Debug, Clone)]
pub struct ParallelConvert {
    jobs: usize,
}

impl Default for ParallelConvert {
    fn default() -> Self {
        Self::new()
    }
}

impl ParallelConvert {
    pub fn new() -> Self {
        Self { jobs: default_jobs() }
    }

    /// Set the number of worker threads; 0 selects available parallelism.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = if jobs == 0 { default_jobs() } else { jobs };
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Convert every map. Results keep the order of `maps`; the first
    /// failing map aborts the run.
    pub fn run(
        &self,
        registry: &SharedTilesetRegistry,
        tables: &MetatileTables,
        maps: &[MapJob],
    ) -> Result<Vec<ConvertedMap>, BatchError> {
        let start = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build()?;

        let converted = pool.install(|| {
            maps.par_iter()
                .map(|job| {
                    convert_map(registry, tables, job)
                        .map_err(|source| BatchError::Map { map: job.name.clone(), source })
                })
                .collect::<Result<Vec<_>, _>>()
        })?;

        info!(
            maps = converted.len(),
            workers = self.jobs,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Converted maps"
        );
        Ok(converted)
    }
}

/// Convert a single map against the shared registry.
pub fn convert_map(
    registry: &SharedTilesetRegistry,
    tables: &MetatileTables,
    job: &MapJob,
) -> Result<ConvertedMap, DedupError> {
    registry.register_map_usage(&job.name, &job.primary, &job.secondary);
    let pair = registry.get_or_create_builder(&job.primary, &job.secondary);

    let mut cells = Vec::with_capacity(job.metatile_ids.len());
    for &metatile_id in &job.metatile_ids {
        let (side, local_id) = metatile_owner(metatile_id);
        let tileset = match side {
            PairSide::Primary => &job.primary,
            PairSide::Secondary if job.secondary.is_empty() => {
                warn!(map = %job.name, metatile_id, "Secondary metatile on a map without secondary tileset, leaving cell empty");
                cells.push(CellGids { tileset: normalize_tileset_name(&job.primary), gids: EMPTY_CELL });
                continue;
            }
            PairSide::Secondary => &job.secondary,
        };

        let metatile = match tables.get(tileset, local_id) {
            Some(metatile) => *metatile,
            None => {
                warn!(map = %job.name, tileset = %tileset, metatile_id, "Metatile not found, using empty metatile");
                Metatile::empty()
            }
        };

        let gids = pair.process_metatile(&metatile, local_id, tileset)?;
        cells.push(CellGids { tileset: normalize_tileset_name(tileset), gids });
    }

    Ok(ConvertedMap { name: job.name.clone(), cells })
}
