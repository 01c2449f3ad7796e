//! Tiled tileset JSON.
//!
//! # Example Output
//!
//! ```json
//! {
//!   "columns": 16,
//!   "image": "general.png",
//!   "imageheight": 32,
//!   "imagewidth": 256,
//!   "margin": 0,
//!   "name": "general",
//!   "spacing": 0,
//!   "tilecount": 20,
//!   "tiledversion": "1.10.2",
//!   "tileheight": 16,
//!   "tilewidth": 16,
//!   "type": "tileset",
//!   "version": "1.10",
//!   "tiles": [
//!     { "id": 4, "animation": [{ "tileid": 18, "duration": 200 }] }
//!   ],
//!   "properties": [{ "name": "tileset_kind", "type": "string", "value": "primary" }]
//! }
//! ```
//!
//! Tile ids in the descriptor are 0-based, one less than the GID.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::animation::TileAnimation;
use crate::export::{ExportOptions, Exporter, Result};
use crate::metatile::METATILE_SIZE;
use crate::registry::TilesetOutput;

const TILED_VERSION: &str = "1.10.2";
const FORMAT_VERSION: &str = "1.10";

/// One animation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiledFrame {
    pub tileid: u32,
    pub duration: u32,
}

/// Per-tile data; only animated tiles are listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiledTile {
    pub id: u32,
    pub animation: Vec<TiledFrame>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiledProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Tiled tileset document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiledTileset {
    pub columns: u32,
    pub image: String,
    pub imageheight: u32,
    pub imagewidth: u32,
    pub margin: u32,
    pub name: String,
    pub spacing: u32,
    pub tilecount: usize,
    pub tiledversion: String,
    pub tileheight: u32,
    pub tilewidth: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tiles: Vec<TiledTile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<TiledProperty>,
}

impl TiledTileset {
    /// Describe `output`, whose atlas is stored as `image_file`.
    pub fn from_output(output: &TilesetOutput, image_file: &str) -> Self {
        let (imagewidth, imageheight) = output.image.dimensions();
        Self {
            columns: output.columns,
            image: image_file.to_string(),
            imageheight,
            imagewidth,
            margin: 0,
            name: output.name.clone(),
            spacing: 0,
            tilecount: output.tile_count,
            tiledversion: TILED_VERSION.to_string(),
            tileheight: METATILE_SIZE,
            tilewidth: METATILE_SIZE,
            kind: "tileset".to_string(),
            version: FORMAT_VERSION.to_string(),
            tiles: output.animations.iter().filter_map(tiled_tile).collect(),
            properties: vec![TiledProperty {
                name: "tileset_kind".to_string(),
                kind: "string".to_string(),
                value: output.kind.to_string(),
            }],
        }
    }
}

fn tiled_tile(animation: &TileAnimation) -> Option<TiledTile> {
    let id = animation.base_gid.local_id()? as u32;
    let frames = animation
        .frames
        .iter()
        .filter_map(|frame| {
            let tileid = frame.gid.local_id()? as u32;
            Some(TiledFrame { tileid, duration: frame.duration_ms })
        })
        .collect();
    Some(TiledTile { id, animation: frames })
}

/// Tiled JSON exporter.
#[derive(Debug, Default)]
pub struct TiledExporter;

impl TiledExporter {
    pub fn new() -> Self {
        Self
    }

    /// Render the descriptor to a JSON string.
    pub fn export_to_string(&self, output: &TilesetOutput, image_file: &str, options: &ExportOptions) -> Result<String> {
        let tileset = TiledTileset::from_output(output, image_file);
        let json = if options.pretty {
            serde_json::to_string_pretty(&tileset)?
        } else {
            serde_json::to_string(&tileset)?
        };
        Ok(json)
    }
}

impl Exporter for TiledExporter {
    fn export(&self, output: &TilesetOutput, image_file: &str, path: &Path, options: &ExportOptions) -> Result<()> {
        let json = self.export_to_string(output, image_file, options)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;

        Ok(())
    }

    fn format_name(&self) -> &'static str {
        "tiled"
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::AnimationFrame;
    use crate::gid::Gid;
    use crate::registry::TilesetKind;
    use image::RgbaImage;

    fn output() -> TilesetOutput {
        TilesetOutput {
            name: "general".to_string(),
            kind: TilesetKind::Primary,
            image: RgbaImage::new(256, 32),
            tile_count: 20,
            columns: 16,
            animations: vec![TileAnimation {
                base_gid: Gid::from_raw(5),
                frames: vec![
                    AnimationFrame { gid: Gid::from_raw(19), duration_ms: 200 },
                    AnimationFrame { gid: Gid::from_raw(20), duration_ms: 200 },
                ],
            }],
            maps: vec![],
        }
    }

    #[test]
    fn test_descriptor_fields() {
        let tileset = TiledTileset::from_output(&output(), "general.png");
        assert_eq!(tileset.imagewidth, 256);
        assert_eq!(tileset.imageheight, 32);
        assert_eq!(tileset.tilewidth, 16);
        assert_eq!(tileset.tilecount, 20);
        assert_eq!(tileset.properties[0].value, "primary");
    }

    #[test]
    fn test_animation_ids_are_zero_based() {
        let tileset = TiledTileset::from_output(&output(), "general.png");
        assert_eq!(tileset.tiles.len(), 1);
        assert_eq!(tileset.tiles[0].id, 4);
        assert_eq!(tileset.tiles[0].animation[0], TiledFrame { tileid: 18, duration: 200 });
        assert_eq!(tileset.tiles[0].animation[1].tileid, 19);
    }

    #[test]
    fn test_json_keys() {
        let json = TiledExporter::new().export_to_string(&output(), "general.png", &ExportOptions { pretty: false }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "tileset");
        assert_eq!(value["image"], "general.png");
        assert_eq!(value["tiles"][0]["animation"][0]["tileid"], 18);
        assert_eq!(value["properties"][0]["type"], "string");
    }

    #[test]
    fn test_no_animations_omits_tiles() {
        let mut output = output();
        output.animations.clear();
        let json = TiledExporter::new().export_to_string(&output, "general.png", &ExportOptions::default()).unwrap();
        assert!(!json.contains("\"tiles\""));
    }
}
