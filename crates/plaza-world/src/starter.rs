//! Built-in two-room realm handed to new users.

use std::collections::BTreeMap;

use crate::room::RoomId;
use crate::template::{RealmTemplate, RoomTemplate, SpawnPoint, format_cell_key};
use crate::tile::{TeleporterTarget, TextureId, TileDescriptor};

const ROOM_WIDTH: u32 = 15;
const ROOM_HEIGHT: u32 = 11;

/// A lobby and a garden, joined by a pair of teleporters.
///
/// * lobby `(7, 10)` -> garden `(10, 2)`
/// * garden `(10, 0)` -> lobby `(7, 9)`
///
/// Borders are left to the loader's default walls except where a
/// teleporter punches through.
pub fn starter_template() -> RealmTemplate {
    let mut lobby = interior("wood");
    lobby.insert(
        format_cell_key(3, 3),
        TileDescriptor {
            floor: Some(TextureId::new("wood")),
            object: Some(TextureId::new("table")),
            teleporter: None,
        },
    );
    lobby.insert(format_cell_key(7, 10), teleporter("wood", RoomId(1), 10, 2));

    let mut garden = interior("grass");
    garden.insert(format_cell_key(10, 0), teleporter("grass", RoomId(0), 7, 9));

    RealmTemplate {
        spawnpoint: SpawnPoint {
            room: RoomId(0),
            x: 7,
            y: 5,
        },
        rooms: vec![
            RoomTemplate {
                name: "lobby".to_string(),
                width: Some(ROOM_WIDTH),
                height: Some(ROOM_HEIGHT),
                tilemap: lobby,
            },
            RoomTemplate {
                name: "garden".to_string(),
                width: Some(ROOM_WIDTH),
                height: Some(ROOM_HEIGHT),
                tilemap: garden,
            },
        ],
    }
}

fn interior(floor: &str) -> BTreeMap<String, TileDescriptor> {
    let mut tiles = BTreeMap::new();
    for y in 1..ROOM_HEIGHT as i32 - 1 {
        for x in 1..ROOM_WIDTH as i32 - 1 {
            tiles.insert(format_cell_key(x, y), TileDescriptor::floor(floor));
        }
    }
    tiles
}

fn teleporter(floor: &str, room: RoomId, x: i32, y: i32) -> TileDescriptor {
    TileDescriptor {
        teleporter: Some(TeleporterTarget { room, x, y }),
        ..TileDescriptor::floor(floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starter_survives_json() {
        let template = starter_template();
        let json = template.to_json().unwrap();
        assert_eq!(RealmTemplate::from_json(&json).unwrap(), template);
    }

    #[test]
    fn test_starter_table_blocks() {
        let tile = &starter_template().rooms[0].tilemap[&format_cell_key(3, 3)];
        assert!(!tile.is_walkable());
    }
}
