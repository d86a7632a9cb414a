//! Dense, immutable room grids.

use serde::{Deserialize, Serialize};

use crate::error::WorldError;
use crate::template::{RoomTemplate, parse_cell_key};
use crate::tile::TileDescriptor;

/// Largest grid a room template may declare.
pub const MAX_ROOM_CELLS: u32 = 1 << 20;

/// Index of a room within its realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u32);

/// A static `width x height` grid of tiles.
///
/// Every cell in bounds has a descriptor. Cells the template leaves out are
/// filled in at load time: border cells get a wall, interior cells are empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    id: RoomId,
    name: String,
    width: u32,
    height: u32,
    /// Row-major, `tiles[y * width + x]`.
    tiles: Vec<TileDescriptor>,
}

impl Room {
    /// Compiles a room template into a dense grid.
    pub fn from_template(id: RoomId, template: &RoomTemplate) -> Result<Self, WorldError> {
        let mut cells = Vec::with_capacity(template.tilemap.len());
        let (mut max_x, mut max_y) = (-1_i32, -1_i32);
        for (key, tile) in &template.tilemap {
            let (x, y) = parse_cell_key(key)?;
            max_x = max_x.max(x);
            max_y = max_y.max(y);
            cells.push((x, y, key, tile));
        }

        let width = template.width.unwrap_or((i64::from(max_x) + 1) as u32);
        let height = template.height.unwrap_or((i64::from(max_y) + 1) as u32);
        if width == 0 || height == 0 {
            return Err(WorldError::EmptyRoom(template.name.clone()));
        }
        let area = width
            .checked_mul(height)
            .filter(|area| *area <= MAX_ROOM_CELLS)
            .ok_or_else(|| WorldError::RoomTooLarge {
                room: template.name.clone(),
                width,
                height,
            })?;

        let mut tiles = Vec::with_capacity(area as usize);
        for y in 0..height {
            for x in 0..width {
                let border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
                tiles.push(if border {
                    TileDescriptor::wall()
                } else {
                    TileDescriptor::default()
                });
            }
        }

        for (x, y, key, tile) in cells {
            if x as u32 >= width || y as u32 >= height {
                return Err(WorldError::CellOutsideRoom {
                    room: template.name.clone(),
                    key: key.clone(),
                });
            }
            tiles[(y as u32 * width + x as u32) as usize] = tile.clone();
        }

        Ok(Self {
            id,
            name: template.name.clone(),
            width,
            height,
            tiles,
        })
    }

    /// Room identifier.
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Room name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width in cells.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in cells.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns `true` if `(x, y)` lies inside the grid.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    /// Resolves the descriptor at `(x, y)`.
    pub fn tile(&self, x: i32, y: i32) -> Result<&TileDescriptor, WorldError> {
        if !self.contains(x, y) {
            return Err(WorldError::OutOfBounds {
                room: self.id,
                x,
                y,
            });
        }
        Ok(&self.tiles[(y as u32 * self.width + x as u32) as usize])
    }

    /// Returns `true` if `(x, y)` is in bounds and enterable.
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.tile(x, y).is_ok_and(TileDescriptor::is_walkable)
    }

    /// Iterates every cell as `(x, y, tile)` in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32, &TileDescriptor)> {
        let width = self.width as usize;
        self.tiles
            .iter()
            .enumerate()
            .map(move |(i, tile)| ((i % width) as i32, (i / width) as i32, tile))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::tile::TextureId;

    fn template(
        width: Option<u32>,
        height: Option<u32>,
        tiles: &[(&str, TileDescriptor)],
    ) -> RoomTemplate {
        RoomTemplate {
            name: "test".to_string(),
            width,
            height,
            tilemap: tiles
                .iter()
                .map(|(k, t)| (k.to_string(), t.clone()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_every_in_bounds_cell_resolves() {
        let room = Room::from_template(RoomId(0), &template(Some(15), Some(11), &[])).unwrap();
        for y in 0..11 {
            for x in 0..15 {
                assert!(room.tile(x, y).is_ok(), "({x}, {y}) must resolve");
            }
        }
        assert_eq!(room.cells().count(), 15 * 11);
    }

    #[test]
    fn test_out_of_bounds_never_resolves() {
        let room = Room::from_template(RoomId(0), &template(Some(15), Some(11), &[])).unwrap();
        for (x, y) in [(-1, 0), (0, -1), (15, 0), (0, 11), (100, 100), (i32::MIN, 3)] {
            assert!(matches!(
                room.tile(x, y),
                Err(WorldError::OutOfBounds { .. })
            ));
        }
    }

    #[test]
    fn test_border_defaults_to_wall() {
        let room = Room::from_template(RoomId(0), &template(Some(5), Some(4), &[])).unwrap();
        assert!(!room.is_walkable(0, 0));
        assert!(!room.is_walkable(4, 2));
        assert!(!room.is_walkable(2, 3));
        assert!(room.is_walkable(2, 2));
    }

    #[test]
    fn test_explicit_border_tile_overrides_wall() {
        let room = Room::from_template(
            RoomId(0),
            &template(Some(5), Some(4), &[("2, 0", TileDescriptor::floor("grass"))]),
        )
        .unwrap();
        assert!(room.is_walkable(2, 0));
        assert_eq!(
            room.tile(2, 0).unwrap().floor,
            Some(TextureId::new("grass"))
        );
    }

    #[test]
    fn test_dimensions_from_bounding_box() {
        let room = Room::from_template(
            RoomId(3),
            &template(None, None, &[("9, 6", TileDescriptor::wall())]),
        )
        .unwrap();
        assert_eq!((room.width(), room.height()), (10, 7));
        assert_eq!(room.id(), RoomId(3));
    }

    #[test]
    fn test_key_outside_declared_size_is_rejected() {
        let result = Room::from_template(
            RoomId(0),
            &template(Some(3), Some(3), &[("3, 1", TileDescriptor::wall())]),
        );
        assert!(matches!(result, Err(WorldError::CellOutsideRoom { .. })));
    }

    #[test]
    fn test_oversized_room_is_rejected() {
        for (w, h) in [(u32::MAX, u32::MAX), (70_000, 70_000), (MAX_ROOM_CELLS, 2)] {
            let result = Room::from_template(RoomId(0), &template(Some(w), Some(h), &[]));
            assert!(
                matches!(
                    result,
                    Err(WorldError::RoomTooLarge { width, height, .. }) if width == w && height == h
                ),
                "{w}x{h}"
            );
        }
        assert!(Room::from_template(RoomId(0), &template(Some(1024), Some(1024), &[])).is_ok());
    }

    #[test]
    fn test_huge_cell_key_is_rejected() {
        let result = Room::from_template(
            RoomId(0),
            &template(None, None, &[("2147483647, 0", TileDescriptor::wall())]),
        );
        assert!(matches!(result, Err(WorldError::RoomTooLarge { .. })));
    }

    #[test]
    fn test_empty_room_is_rejected() {
        let result = Room::from_template(RoomId(0), &template(None, None, &[]));
        assert!(matches!(result, Err(WorldError::EmptyRoom(_))));
    }
}
