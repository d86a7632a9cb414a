//! Realm template documents.
//!
//! Templates are the offline-authored or persisted form of a realm:
//!
//! ```json
//! {
//!   "spawnpoint": { "roomIndex": 0, "x": 7, "y": 5 },
//!   "rooms": [
//!     { "name": "lobby", "tilemap": { "7, 10": { "floor": "grass", "teleporter": { "roomIndex": 1, "x": 10, "y": 2 } } } }
//!   ]
//! }
//! ```
//!
//! Tilemap keys are `"x, y"` strings.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::WorldError;
use crate::room::RoomId;
use crate::tile::TileDescriptor;

/// Where new players appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// Index of the spawn room.
    #[serde(rename = "roomIndex")]
    pub room: RoomId,
    /// Spawn column.
    pub x: i32,
    /// Spawn row.
    pub y: i32,
}

/// One room of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomTemplate {
    /// Display name, unique within the realm.
    pub name: String,
    /// Explicit width in cells. Defaults to the tilemap's bounding box.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Explicit height in cells. Defaults to the tilemap's bounding box.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Sparse tilemap keyed by `"x, y"`.
    #[serde(default)]
    pub tilemap: BTreeMap<String, TileDescriptor>,
}

/// A complete realm document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealmTemplate {
    /// Initial position for new players.
    pub spawnpoint: SpawnPoint,
    /// Rooms, addressed by index.
    pub rooms: Vec<RoomTemplate>,
}

impl RealmTemplate {
    /// Parses a template from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, WorldError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a template file.
    pub fn from_path(path: &Path) -> Result<Self, WorldError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Serializes the template as pretty JSON.
    pub fn to_json(&self) -> Result<String, WorldError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Parses a `"x, y"` tilemap key. Whitespace around either number is ignored.
pub fn parse_cell_key(key: &str) -> Result<(i32, i32), WorldError> {
    let bad = || WorldError::BadCellKey(key.to_string());
    let (x, y) = key.split_once(',').ok_or_else(bad)?;
    let x: i32 = x.trim().parse().map_err(|_| bad())?;
    let y: i32 = y.trim().parse().map_err(|_| bad())?;
    if x < 0 || y < 0 {
        return Err(bad());
    }
    Ok((x, y))
}

/// Formats a cell coordinate as a tilemap key.
pub fn format_cell_key(x: i32, y: i32) -> String {
    format!("{x}, {y}")
}
