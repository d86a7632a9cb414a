//! Teleporter graph: explicit adjacency materialised from tile data.
//!
//! Each teleporter tile is a directed edge `(room, x, y) -> (room', x', y')`.
//! Edges need not be symmetric and cycles across cells are fine, because
//! arriving on a teleporter does not fire it. The only degenerate shape is a
//! teleporter that targets its own cell.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::WorldError;
use crate::room::{Room, RoomId};
use crate::tile::CellRef;

/// Directed teleporter edges keyed by source cell.
#[derive(Debug, Clone, Default)]
pub struct TeleporterGraph {
    edges: FxHashMap<CellRef, CellRef>,
}

impl TeleporterGraph {
    /// Scans `rooms` for teleporter tiles and validates each edge.
    ///
    /// Valid edges are kept. Invalid ones are dropped and returned as errors
    /// so the caller can refuse the offending rooms.
    pub fn build(rooms: &[Room]) -> (Self, Vec<WorldError>) {
        let mut edges = FxHashMap::default();
        let mut errors = Vec::new();

        for room in rooms {
            for (x, y, tile) in room.cells() {
                let Some(target) = tile.teleporter else {
                    continue;
                };
                let source = CellRef::new(room.id(), x, y);
                match validate_edge(rooms, source, target.into()) {
                    Ok(()) => {
                        edges.insert(source, target.into());
                    }
                    Err(err) => errors.push(err),
                }
            }
        }

        (Self { edges }, errors)
    }

    /// Destination of the teleporter at `from`, if any.
    pub fn target(&self, from: CellRef) -> Option<CellRef> {
        self.edges.get(&from).copied()
    }

    /// Iterates all `(source, target)` edges in arbitrary order.
    pub fn edges(&self) -> impl Iterator<Item = (CellRef, CellRef)> + '_ {
        self.edges.iter().map(|(s, t)| (*s, *t))
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns `true` if there are no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Drops every edge that starts or ends in one of `inactive`.
    pub fn detach_rooms(&mut self, inactive: &FxHashSet<RoomId>) {
        self.edges.retain(|source, target| {
            !inactive.contains(&source.room) && !inactive.contains(&target.room)
        });
    }
}

fn validate_edge(rooms: &[Room], source: CellRef, target: CellRef) -> Result<(), WorldError> {
    let Some(dest) = rooms.get(target.room.0 as usize) else {
        return Err(WorldError::TeleportUnknownRoom {
            room: source.room,
            x: source.x,
            y: source.y,
            target: target.room,
        });
    };
    if !dest.contains(target.x, target.y) {
        return Err(WorldError::TeleportTargetOutOfBounds {
            room: source.room,
            x: source.x,
            y: source.y,
            target: target.room,
        });
    }
    if source == target {
        return Err(WorldError::TeleportCycle {
            room: source.room,
            x: source.x,
            y: source.y,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::template::RoomTemplate;
    use crate::tile::{TeleporterTarget, TileDescriptor};

    fn room_with(id: u32, teleporters: &[((i32, i32), (u32, i32, i32))]) -> Room {
        let tilemap: BTreeMap<String, TileDescriptor> = teleporters
            .iter()
            .map(|((x, y), (room, tx, ty))| {
                (
                    format!("{x}, {y}"),
                    TileDescriptor {
                        teleporter: Some(TeleporterTarget {
                            room: RoomId(*room),
                            x: *tx,
                            y: *ty,
                        }),
                        ..TileDescriptor::default()
                    },
                )
            })
            .collect();
        let template = RoomTemplate {
            name: format!("room-{id}"),
            width: Some(6),
            height: Some(6),
            tilemap,
        };
        Room::from_template(RoomId(id), &template).unwrap()
    }

    #[test]
    fn test_edges_materialised() {
        let rooms = vec![
            room_with(0, &[((2, 5), (1, 3, 1))]),
            room_with(1, &[((3, 0), (0, 2, 4))]),
        ];
        let (graph, errors) = TeleporterGraph::build(&rooms);
        assert!(errors.is_empty());
        assert_eq!(graph.len(), 2);
        assert_eq!(
            graph.target(CellRef::new(RoomId(0), 2, 5)),
            Some(CellRef::new(RoomId(1), 3, 1))
        );
        assert_eq!(graph.target(CellRef::new(RoomId(0), 1, 1)), None);
    }

    #[test]
    fn test_two_room_cycle_is_valid() {
        let rooms = vec![
            room_with(0, &[((2, 2), (1, 2, 2))]),
            room_with(1, &[((2, 2), (0, 2, 2))]),
        ];
        let (graph, errors) = TeleporterGraph::build(&rooms);
        assert!(errors.is_empty());
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_self_loop_detected() {
        let rooms = vec![room_with(0, &[((2, 2), (0, 2, 2))])];
        let (graph, errors) = TeleporterGraph::build(&rooms);
        assert!(graph.is_empty());
        assert!(matches!(
            errors.as_slice(),
            [WorldError::TeleportCycle { x: 2, y: 2, .. }]
        ));
        assert_eq!(errors[0].teleporter_room(), Some(RoomId(0)));
    }

    #[test]
    fn test_unknown_room_and_out_of_bounds_targets() {
        let rooms = vec![room_with(0, &[((1, 1), (7, 1, 1)), ((2, 2), (0, 40, 1))])];
        let (graph, errors) = TeleporterGraph::build(&rooms);
        assert!(graph.is_empty());
        assert_eq!(errors.len(), 2);
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, WorldError::TeleportUnknownRoom { .. }))
        );
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, WorldError::TeleportTargetOutOfBounds { .. }))
        );
    }

    #[test]
    fn test_detach_rooms_drops_incident_edges() {
        let rooms = vec![
            room_with(0, &[((2, 5), (1, 3, 1))]),
            room_with(1, &[((3, 0), (2, 2, 4))]),
            room_with(2, &[((1, 1), (0, 2, 2))]),
        ];
        let (mut graph, _) = TeleporterGraph::build(&rooms);
        let inactive: FxHashSet<RoomId> = [RoomId(1)].into_iter().collect();
        graph.detach_rooms(&inactive);
        assert_eq!(graph.len(), 1);
        assert!(graph.target(CellRef::new(RoomId(2), 1, 1)).is_some());
    }
}
