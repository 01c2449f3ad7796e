//! Criterion benchmarks for the deduplication hot paths
//!
//! - Hash: FNV-1a over tile-sized buffers
//! - Indexed: 8x8 tile insertion (new tiles and flipped repeats)
//! - Atlas: RGBA flip detection and tilesheet packing
//! - Builder: cached and uncached metatile processing

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use image::{imageops, Rgba, RgbaImage};
use sharedtiles::animation::NoAnimations;
use sharedtiles::atlas::{AtlasLayout, TileAtlas};
use sharedtiles::builder::{BuilderOptions, SharedTilesetBuilder};
use sharedtiles::dedup::{Flip, IndexedTile, TileDeduplicator};
use sharedtiles::hash::fnv1a_hash;
use sharedtiles::metatile::{Metatile, TileRef};
use sharedtiles::palette::Palette;
use sharedtiles::render::IndexedTilesetRenderer;
use sharedtiles::tileset::IndexedTileset;

// =============================================================================
// Test Data Generators
// =============================================================================

/// Distinct, asymmetric 8x8 indexed tiles
fn make_indexed_tiles(n: usize) -> Vec<IndexedTile> {
    (0..n)
        .map(|i| {
            let mut pixels = [0u8; 64];
            for (j, p) in pixels.iter_mut().enumerate() {
                *p = ((i * 31 + j * 7) % 16) as u8;
            }
            pixels[0] = (i % 251) as u8;
            pixels[1] = (i / 251) as u8;
            IndexedTile::new(pixels)
        })
        .collect()
}

/// Distinct 16x16 RGBA tiles with a corner marker
fn make_rgba_tiles(n: usize) -> Vec<RgbaImage> {
    (0..n)
        .map(|i| {
            let mut img = RgbaImage::from_pixel(16, 16, Rgba([(i % 256) as u8, (i / 256) as u8, 40, 255]));
            img.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
            img
        })
        .collect()
}

fn make_builder() -> SharedTilesetBuilder {
    let width = 64 * 8;
    let pixels: Vec<u8> = (0..width * 8).map(|i| (i % 15 + 1) as u8).collect();
    let sheet = IndexedTileset::new(width, pixels).expect("valid sheet");
    let colors: Vec<[u8; 3]> = (0..16u8).map(|i| [i * 16, 128, 255 - i * 16]).collect();
    let renderer = IndexedTilesetRenderer::new().with_tileset("general", sheet, vec![Palette::from_rgb(&colors); 6]);
    SharedTilesetBuilder::new("general", Arc::new(renderer), Arc::new(NoAnimations), BuilderOptions::default())
}

fn metatile(id: u16) -> Metatile {
    let mut metatile = Metatile::empty();
    for (slot, tile) in metatile.tiles.iter_mut().take(4).enumerate() {
        *tile = TileRef::new((id + slot as u16) % 63 + 1, Flip::new(id % 2 == 0, slot % 2 == 0), 0);
    }
    metatile
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash");
    for size in [64usize, 1024] {
        let data: Vec<u8> = (0..size).map(|i| i as u8).collect();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("fnv1a", size), &data, |b, data| {
            b.iter(|| fnv1a_hash(black_box(data)))
        });
    }
    group.finish();
}

fn bench_indexed(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexed_dedup");
    for n in [256usize, 4096] {
        let tiles = make_indexed_tiles(n);
        let flipped: Vec<IndexedTile> = tiles.iter().map(|t| t.flipped(Flip::HV)).collect();
        group.throughput(Throughput::Elements(n as u64 * 2));
        group.bench_with_input(BenchmarkId::new("insert_then_flipped", n), &n, |b, _| {
            b.iter(|| {
                let mut dedup = TileDeduplicator::new();
                for tile in tiles.iter().chain(flipped.iter()) {
                    black_box(dedup.add_indexed_tile(tile).expect("insert"));
                }
                dedup.unique_tile_count()
            })
        });
    }
    group.finish();
}

fn bench_atlas(c: &mut Criterion) {
    let mut group = c.benchmark_group("atlas");
    let tiles = make_rgba_tiles(1024);
    let mirrored: Vec<RgbaImage> = tiles.iter().map(imageops::flip_horizontal).collect();

    group.throughput(Throughput::Elements(2048));
    group.bench_function("assign_gid_with_flip_detection", |b| {
        b.iter(|| {
            let mut atlas = TileAtlas::new(AtlasLayout::square(16, 16));
            for tile in tiles.iter().chain(mirrored.iter()) {
                black_box(atlas.assign_gid_with_flip_detection(tile).expect("assign"));
            }
            atlas.unique_tile_count()
        })
    });

    let mut atlas = TileAtlas::new(AtlasLayout::square(16, 16));
    for tile in &tiles {
        atlas.assign_gid_with_flip_detection(tile).expect("assign");
    }
    group.bench_function("build_tilesheet_image", |b| b.iter(|| black_box(atlas.build_tilesheet_image())));
    group.finish();
}

fn bench_builder(c: &mut Criterion) {
    let mut group = c.benchmark_group("builder");
    let metatiles: Vec<Metatile> = (0..512u16).map(metatile).collect();

    group.throughput(Throughput::Elements(metatiles.len() as u64));
    group.bench_function("process_metatile_uncached", |b| {
        b.iter(|| {
            let builder = make_builder();
            for (id, mt) in metatiles.iter().enumerate() {
                black_box(builder.process_metatile(mt, id as u16, "general", "general", "").expect("process"));
            }
        })
    });

    let warm = make_builder();
    for (id, mt) in metatiles.iter().enumerate() {
        warm.process_metatile(mt, id as u16, "general", "general", "").expect("process");
    }
    group.bench_function("process_metatile_cached", |b| {
        b.iter(|| {
            for (id, mt) in metatiles.iter().enumerate() {
                black_box(warm.process_metatile(mt, id as u16, "general", "general", "").expect("process"));
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_hash, bench_indexed, bench_atlas, bench_builder);
criterion_main!(benches);
