//! The loaded realm: rooms, spawnpoint, and teleporter graph.

use rustc_hash::FxHashSet;
use tracing::{error, info};

use crate::error::WorldError;
use crate::room::{Room, RoomId};
use crate::teleport::TeleporterGraph;
use crate::template::RealmTemplate;
use crate::tile::{CellRef, TileDescriptor};

/// Read-only realm topology for the duration of a session.
#[derive(Debug)]
pub struct World {
    rooms: Vec<Room>,
    spawn: CellRef,
    teleporters: TeleporterGraph,
    inactive: FxHashSet<RoomId>,
    load_errors: Vec<WorldError>,
}

impl World {
    /// Compiles a template into a world.
    ///
    /// Structural problems (bad keys, no rooms, bad spawn) fail the load.
    /// Teleporter problems refuse only the room holding the bad teleporter;
    /// they are logged and kept in [`World::load_errors`].
    pub fn from_template(template: &RealmTemplate) -> Result<Self, WorldError> {
        if template.rooms.is_empty() {
            return Err(WorldError::EmptyRealm);
        }

        let rooms = template
            .rooms
            .iter()
            .enumerate()
            .map(|(i, room)| Room::from_template(RoomId(i as u32), room))
            .collect::<Result<Vec<_>, _>>()?;

        let (mut teleporters, load_errors) = TeleporterGraph::build(&rooms);
        let mut inactive = FxHashSet::default();
        for err in &load_errors {
            error!(%err, "refusing room with invalid teleporter");
            if let Some(room) = err.teleporter_room() {
                inactive.insert(room);
            }
        }
        teleporters.detach_rooms(&inactive);

        let sp = template.spawnpoint;
        let spawn = CellRef::new(sp.room, sp.x, sp.y);
        let spawn_room = rooms
            .get(sp.room.0 as usize)
            .ok_or_else(|| WorldError::InvalidSpawn(format!("unknown room {:?}", sp.room)))?;
        if !spawn_room.is_walkable(sp.x, sp.y) {
            return Err(WorldError::InvalidSpawn(format!(
                "({}, {}) in {:?} is blocked or out of bounds",
                sp.x, sp.y, sp.room
            )));
        }
        if inactive.contains(&sp.room) {
            return Err(WorldError::InactiveSpawnRoom(sp.room));
        }

        info!(
            rooms = rooms.len(),
            teleporters = teleporters.len(),
            refused = inactive.len(),
            "realm loaded"
        );

        Ok(Self {
            rooms,
            spawn,
            teleporters,
            inactive,
            load_errors,
        })
    }

    /// All rooms, indexed by [`RoomId`].
    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// Looks up a room by id, refusing inactive rooms.
    pub fn room(&self, id: RoomId) -> Result<&Room, WorldError> {
        let room = self
            .rooms
            .get(id.0 as usize)
            .ok_or(WorldError::UnknownRoom(id))?;
        if self.inactive.contains(&id) {
            return Err(WorldError::InactiveRoom(id));
        }
        Ok(room)
    }

    /// Looks up an active room by name.
    pub fn room_by_name(&self, name: &str) -> Result<&Room, WorldError> {
        let room = self
            .rooms
            .iter()
            .find(|room| room.name() == name)
            .ok_or_else(|| WorldError::UnknownRoomName(name.to_string()))?;
        self.room(room.id())
    }

    /// Returns `true` if the room exists and was accepted at load time.
    pub fn is_active(&self, id: RoomId) -> bool {
        (id.0 as usize) < self.rooms.len() && !self.inactive.contains(&id)
    }

    /// Where new players appear.
    pub fn spawn(&self) -> CellRef {
        self.spawn
    }

    /// Resolves the tile at `(x, y)` in `room`.
    ///
    /// [`WorldError::OutOfBounds`] is returned for every cell outside the grid
    /// and for no cell inside it.
    pub fn resolve_tile(
        &self,
        room: RoomId,
        x: i32,
        y: i32,
    ) -> Result<&TileDescriptor, WorldError> {
        self.room(room)?.tile(x, y)
    }

    /// Destination of the teleporter at `(x, y)` in `room`, if any.
    pub fn resolve_teleport(&self, room: RoomId, x: i32, y: i32) -> Option<CellRef> {
        self.teleporters.target(CellRef::new(room, x, y))
    }

    /// Returns `true` if the cell exists in an active room and may be entered.
    pub fn is_walkable(&self, room: RoomId, x: i32, y: i32) -> bool {
        self.room(room).is_ok_and(|r| r.is_walkable(x, y))
    }

    /// The materialised teleporter graph.
    pub fn teleporters(&self) -> &TeleporterGraph {
        &self.teleporters
    }

    /// Configuration errors found while loading.
    pub fn load_errors(&self) -> &[WorldError] {
        &self.load_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::starter::starter_template;
    use crate::tile::TeleporterTarget;

    #[test]
    fn test_starter_realm_loads() {
        let world = World::from_template(&starter_template()).unwrap();
        assert_eq!(world.rooms().len(), 2);
        assert!(world.load_errors().is_empty());
        assert!(world.is_walkable(world.spawn().room, world.spawn().x, world.spawn().y));
    }

    #[test]
    fn test_resolve_teleport_on_starter() {
        let world = World::from_template(&starter_template()).unwrap();
        assert_eq!(
            world.resolve_teleport(RoomId(0), 7, 10),
            Some(CellRef::new(RoomId(1), 10, 2))
        );
        assert_eq!(world.resolve_teleport(RoomId(0), 7, 9), None);
    }

    #[test]
    fn test_resolve_tile_bounds() {
        let world = World::from_template(&starter_template()).unwrap();
        assert!(world.resolve_tile(RoomId(0), 14, 10).is_ok());
        assert!(matches!(
            world.resolve_tile(RoomId(0), 15, 10),
            Err(WorldError::OutOfBounds { .. })
        ));
        assert!(matches!(
            world.resolve_tile(RoomId(9), 0, 0),
            Err(WorldError::UnknownRoom(_))
        ));
    }

    #[test]
    fn test_room_by_name() {
        let world = World::from_template(&starter_template()).unwrap();
        assert_eq!(world.room_by_name("garden").unwrap().id(), RoomId(1));
        assert!(matches!(
            world.room_by_name("attic"),
            Err(WorldError::UnknownRoomName(_))
        ));
    }

    #[test]
    fn test_self_loop_refuses_room() {
        let mut template = starter_template();
        template.rooms[1].tilemap.insert(
            "4, 4".to_string(),
            TileDescriptor {
                teleporter: Some(TeleporterTarget {
                    room: RoomId(1),
                    x: 4,
                    y: 4,
                }),
                ..TileDescriptor::default()
            },
        );
        let world = World::from_template(&template).unwrap();

        assert!(!world.is_active(RoomId(1)));
        assert!(world.is_active(RoomId(0)));
        assert!(matches!(
            world.load_errors(),
            [WorldError::TeleportCycle { .. }]
        ));
        // Edges into the refused room are dropped too.
        assert_eq!(world.resolve_teleport(RoomId(0), 7, 10), None);
        assert!(matches!(
            world.resolve_tile(RoomId(1), 4, 4),
            Err(WorldError::InactiveRoom(_))
        ));
    }

    #[test]
    fn test_refused_spawn_room_fails_load() {
        let mut template = starter_template();
        template.rooms[0].tilemap.insert(
            "3, 3".to_string(),
            TileDescriptor {
                teleporter: Some(TeleporterTarget {
                    room: RoomId(0),
                    x: 3,
                    y: 3,
                }),
                ..TileDescriptor::default()
            },
        );
        assert!(matches!(
            World::from_template(&template),
            Err(WorldError::InactiveSpawnRoom(RoomId(0)))
        ));
    }

    #[test]
    fn test_blocked_spawn_fails_load() {
        let mut template = starter_template();
        template.spawnpoint.x = 0;
        template.spawnpoint.y = 0;
        assert!(matches!(
            World::from_template(&template),
            Err(WorldError::InvalidSpawn(_))
        ));
    }

    #[test]
    fn test_empty_realm_fails_load() {
        let mut template = starter_template();
        template.rooms.clear();
        assert!(matches!(
            World::from_template(&template),
            Err(WorldError::EmptyRealm)
        ));
    }
}
