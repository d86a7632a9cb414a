//! Realm loading and query errors.

use crate::room::RoomId;

/// Errors produced while loading a realm or querying its rooms.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A query fell outside the room's `[0, width) x [0, height)` grid.
    #[error("cell ({x}, {y}) is outside room {room:?}")]
    OutOfBounds {
        /// Room that was queried.
        room: RoomId,
        /// Queried column.
        x: i32,
        /// Queried row.
        y: i32,
    },

    /// No room with this identifier exists in the realm.
    #[error("unknown room {0:?}")]
    UnknownRoom(RoomId),

    /// No room with this name exists in the realm.
    #[error("unknown room name {0:?}")]
    UnknownRoomName(String),

    /// The room exists but was refused at load time.
    #[error("room {0:?} is inactive")]
    InactiveRoom(RoomId),

    /// A tilemap key is not of the form `"x, y"` with non-negative integers.
    #[error("malformed cell key {0:?}")]
    BadCellKey(String),

    /// A tilemap key lies outside the room's declared dimensions.
    #[error("cell key {key:?} lies outside room {room:?}")]
    CellOutsideRoom {
        /// Room being loaded.
        room: String,
        /// Offending key.
        key: String,
    },

    /// A room has neither dimensions nor tiles.
    #[error("room {0:?} has no tiles")]
    EmptyRoom(String),

    /// A room's dimensions exceed the supported grid size.
    #[error("room {room:?} is too large ({width}x{height})")]
    RoomTooLarge {
        /// Room being loaded.
        room: String,
        /// Declared or inferred width.
        width: u32,
        /// Declared or inferred height.
        height: u32,
    },

    /// The template contains no rooms.
    #[error("realm template contains no rooms")]
    EmptyRealm,

    /// The spawnpoint is unknown, out of bounds, or blocked.
    #[error("invalid spawnpoint {0}")]
    InvalidSpawn(String),

    /// The spawn room was refused at load time.
    #[error("spawn room {0:?} is inactive")]
    InactiveSpawnRoom(RoomId),

    /// A teleporter targets its own cell.
    #[error("teleporter at {room:?} ({x}, {y}) targets itself")]
    TeleportCycle {
        /// Room holding the teleporter.
        room: RoomId,
        /// Teleporter column.
        x: i32,
        /// Teleporter row.
        y: i32,
    },

    /// A teleporter targets a cell outside the destination room.
    #[error("teleporter at {room:?} ({x}, {y}) targets out-of-bounds cell in {target:?}")]
    TeleportTargetOutOfBounds {
        /// Room holding the teleporter.
        room: RoomId,
        /// Teleporter column.
        x: i32,
        /// Teleporter row.
        y: i32,
        /// Destination room.
        target: RoomId,
    },

    /// A teleporter targets a room that does not exist.
    #[error("teleporter at {room:?} ({x}, {y}) targets unknown room {target:?}")]
    TeleportUnknownRoom {
        /// Room holding the teleporter.
        room: RoomId,
        /// Teleporter column.
        x: i32,
        /// Teleporter row.
        y: i32,
        /// Missing destination room.
        target: RoomId,
    },

    /// The template document could not be parsed.
    #[error("failed to parse realm template: {0}")]
    Json(#[from] serde_json::Error),

    /// The template file could not be read.
    #[error("failed to read realm template: {0}")]
    Io(#[from] std::io::Error),
}

impl WorldError {
    /// Room whose teleporter caused this error, if it is a teleporter error.
    pub fn teleporter_room(&self) -> Option<RoomId> {
        match self {
            Self::TeleportCycle { room, .. }
            | Self::TeleportTargetOutOfBounds { room, .. }
            | Self::TeleportUnknownRoom { room, .. } => Some(*room),
            _ => None,
        }
    }
}
