//! Static realm topology: rooms, tiles, and the teleporter graph.
//!
//! A realm is loaded once from a [`RealmTemplate`] and is read-only
//! afterwards. [`World`] answers tile and teleport queries for the rest of
//! the engine.

pub mod error;
pub mod room;
pub mod starter;
pub mod teleport;
pub mod template;
pub mod tile;
pub mod world;

pub use error::WorldError;
pub use room::{MAX_ROOM_CELLS, Room, RoomId};
pub use starter::starter_template;
pub use teleport::TeleporterGraph;
pub use template::{RealmTemplate, RoomTemplate, SpawnPoint, format_cell_key, parse_cell_key};
pub use tile::{CellRef, TeleporterTarget, TextureId, TileDescriptor, WALL_TEXTURE};
pub use world::World;
