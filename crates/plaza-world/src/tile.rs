//! Per-cell tile descriptors.

use serde::{Deserialize, Serialize};

use crate::room::RoomId;

/// Texture used for the blocking object placed on unspecified border cells.
pub const WALL_TEXTURE: &str = "wall";

/// Opaque texture name consumed by the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextureId(pub String);

impl TextureId {
    /// Creates a texture id from anything string-like.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Destination of a teleporter tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeleporterTarget {
    /// Destination room.
    #[serde(rename = "roomIndex")]
    pub room: RoomId,
    /// Destination column.
    pub x: i32,
    /// Destination row.
    pub y: i32,
}

/// A single grid cell: optional floor, optional object, optional teleporter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileDescriptor {
    /// Floor texture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<TextureId>,
    /// Object texture. Objects block movement unless the tile is a teleporter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<TextureId>,
    /// Teleporter destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teleporter: Option<TeleporterTarget>,
}

impl TileDescriptor {
    /// A plain floor tile.
    pub fn floor(texture: &str) -> Self {
        Self {
            floor: Some(TextureId::new(texture)),
            ..Self::default()
        }
    }

    /// A wall tile.
    pub fn wall() -> Self {
        Self {
            object: Some(TextureId::new(WALL_TEXTURE)),
            ..Self::default()
        }
    }

    /// Returns `true` if players may enter this cell.
    pub fn is_walkable(&self) -> bool {
        self.object.is_none() || self.teleporter.is_some()
    }
}

/// Absolute cell address: a room plus integer grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    /// Room containing the cell.
    pub room: RoomId,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl CellRef {
    /// Creates a cell reference.
    pub fn new(room: RoomId, x: i32, y: i32) -> Self {
        Self { room, x, y }
    }
}

impl From<TeleporterTarget> for CellRef {
    fn from(target: TeleporterTarget) -> Self {
        Self::new(target.room, target.x, target.y)
    }
}
