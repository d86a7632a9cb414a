//! Per-occupant movement and animation state machine.
//!
//! ```text
//! Idle(d)            --move(d')--> Walking(d', 0)
//! Walking(d, p)      --tick-->     Walking(d, (p + 1) % frames)
//! Walking(d, _)      --move(d'')-> Walking(d'', 0)      (d'' != d)
//! Walking(d, _)      --stop-->     Idle(d)
//! any                --teleport--> Idle(current direction)
//! ```
//!
//! The same [`Player`] type serves the local occupant (driven by input via
//! [`Player::walk`]) and remote occupants (driven by network updates via
//! [`Player::apply_remote`]).

use std::time::Instant;

use glam::{IVec2, Vec2};
use plaza_config::PresenceConfig;
use plaza_world::{CellRef, RoomId, World};
use serde::{Deserialize, Serialize};

use crate::identity::Uid;

// ---------------------------------------------------------------------------
// Direction / movement
// ---------------------------------------------------------------------------

/// Facing direction. `Down` is +y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Towards +y.
    Down,
    /// Towards -x.
    Left,
    /// Towards +x.
    Right,
    /// Towards -y.
    Up,
}

impl Direction {
    /// Unit grid step for this direction.
    pub fn delta(self) -> IVec2 {
        match self {
            Self::Down => IVec2::new(0, 1),
            Self::Left => IVec2::new(-1, 0),
            Self::Right => IVec2::new(1, 0),
            Self::Up => IVec2::new(0, -1),
        }
    }

    fn is_horizontal(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }
}

/// Coarse movement state as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementState {
    /// Standing still.
    Idle,
    /// Walking.
    Walking,
}

/// Full animation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimState {
    /// Standing, facing `direction`.
    Idle {
        /// Facing direction.
        direction: Direction,
    },
    /// Walking towards `direction`, showing frame `phase`.
    Walking {
        /// Walking direction.
        direction: Direction,
        /// Current walk-cycle frame, always `< frame_count`.
        phase: u8,
    },
}

impl AnimState {
    /// Facing direction.
    pub fn direction(self) -> Direction {
        match self {
            Self::Idle { direction } | Self::Walking { direction, .. } => direction,
        }
    }

    /// Walk-cycle frame; `0` while idle.
    pub fn phase(self) -> u8 {
        match self {
            Self::Idle { .. } => 0,
            Self::Walking { phase, .. } => phase,
        }
    }

    /// Coarse movement state.
    pub fn movement(self) -> MovementState {
        match self {
            Self::Idle { .. } => MovementState::Idle,
            Self::Walking { .. } => MovementState::Walking,
        }
    }

    /// `Idle -> Walking(d, 0)`, direction change resets the phase, same
    /// direction keeps it.
    fn on_move(self, direction: Direction) -> Self {
        match self {
            Self::Walking {
                direction: current,
                phase,
            } if current == direction => self.with_phase(phase),
            _ => Self::Walking {
                direction,
                phase: 0,
            },
        }
    }

    fn with_phase(self, phase: u8) -> Self {
        match self {
            Self::Idle { .. } => self,
            Self::Walking { direction, .. } => Self::Walking { direction, phase },
        }
    }
}

// ---------------------------------------------------------------------------
// Tuning
// ---------------------------------------------------------------------------

/// Movement and animation constants shared by every player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerTuning {
    /// Frames in a walk cycle (at least 1).
    pub frame_count: u8,
    /// Walking speed in cells per second.
    pub walk_speed: f32,
    /// Walk-cycle frames advanced per second.
    pub animation_fps: f32,
}

impl PlayerTuning {
    /// Builds tuning from the presence config, clamping degenerate values.
    pub fn from_config(config: &PresenceConfig) -> Self {
        Self {
            frame_count: config.walk_frame_count.max(1),
            walk_speed: config.walk_speed_cells.max(0.0),
            animation_fps: config.animation_fps.max(0.0),
        }
    }
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self::from_config(&PresenceConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Outcomes and snapshots
// ---------------------------------------------------------------------------

/// Who drives a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Control {
    /// Driven by local input.
    Local,
    /// Driven by network updates.
    Remote,
}

/// Result of a local [`Player::walk`] step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveOutcome {
    /// Position advanced within the current room.
    Moved {
        /// Set when the step crossed into a new cell.
        entered: Option<IVec2>,
    },
    /// The next cell is out of bounds or blocked; position is unchanged.
    Blocked {
        /// Cell that refused entry.
        cell: IVec2,
    },
    /// The step landed on a teleporter and the player now stands at `to`.
    Teleported {
        /// The teleporter cell that fired.
        from: CellRef,
        /// Destination cell.
        to: CellRef,
        /// Walking state the player passed through before the teleport.
        via: AnimState,
    },
}

/// Result of applying a remote update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// Same room, new position/state.
    Moved,
    /// The update moved the player to another room.
    ChangedRoom {
        /// Previous room.
        from: RoomId,
    },
}

/// Read-only view of a player for bus consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    /// Player identity.
    pub uid: Uid,
    /// Local or remote.
    pub control: Control,
    /// Current room.
    pub room: RoomId,
    /// Continuous position in cell units.
    pub position: Vec2,
    /// Animation state.
    pub state: AnimState,
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// One occupant's presence record.
#[derive(Debug, Clone)]
pub struct Player {
    uid: Uid,
    control: Control,
    room: RoomId,
    position: Vec2,
    state: AnimState,
    frame_clock: f32,
    last_update: Instant,
}

/// Cell containing a continuous position (cells are centred on integers).
pub fn cell_of(position: Vec2) -> IVec2 {
    position.round().as_ivec2()
}

impl Player {
    /// Creates a player in `Idle(down)` at `cell`.
    pub fn spawn(uid: Uid, control: Control, cell: CellRef, now: Instant) -> Self {
        Self::at(uid, control, cell.room, Vec2::new(cell.x as f32, cell.y as f32), now)
    }

    /// Creates a player in `Idle(down)` at a continuous position.
    pub fn at(uid: Uid, control: Control, room: RoomId, position: Vec2, now: Instant) -> Self {
        Self {
            uid,
            control,
            room,
            position,
            state: AnimState::Idle {
                direction: Direction::Down,
            },
            frame_clock: 0.0,
            last_update: now,
        }
    }

    /// Player identity.
    pub fn uid(&self) -> &Uid {
        &self.uid
    }

    /// Local or remote.
    pub fn control(&self) -> Control {
        self.control
    }

    /// Current room.
    pub fn room(&self) -> RoomId {
        self.room
    }

    /// Continuous position in cell units.
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Cell the player currently occupies.
    pub fn cell(&self) -> IVec2 {
        cell_of(self.position)
    }

    /// Animation state.
    pub fn state(&self) -> AnimState {
        self.state
    }

    /// Time of the last transition or remote update.
    pub fn last_update(&self) -> Instant {
        self.last_update
    }

    /// Snapshot for publishing.
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            uid: self.uid.clone(),
            control: self.control,
            room: self.room,
            position: self.position,
            state: self.state,
        }
    }

    /// Walks for `dt` seconds towards `direction`.
    ///
    /// Every cell the step crosses is checked in order, so long steps cannot
    /// skip walls or teleporters. Hitting a blocked or out-of-bounds cell
    /// ends the step in the last walkable cell: an idle player that made no
    /// progress stays idle, anyone else stops. Crossing a teleporter cell
    /// relocates the player in the same call, so no caller ever observes it
    /// standing on the teleporter.
    pub fn walk(
        &mut self,
        direction: Direction,
        dt: f32,
        tuning: &PlayerTuning,
        world: &World,
        now: Instant,
    ) -> MoveOutcome {
        let previous = self.state;
        let walking = previous.on_move(direction);

        let mut position = self.position;
        if previous.direction() != direction {
            // Re-centre on the cross axis so turns stay on the grid.
            let centre = self.cell().as_vec2();
            if direction.is_horizontal() {
                position.y = centre.y;
            } else {
                position.x = centre.x;
            }
        }

        let distance = tuning.walk_speed * dt;
        let distance = if distance.is_finite() {
            distance.max(0.0)
        } else {
            0.0
        };
        let delta = direction.delta();
        let current = cell_of(position);
        let next_position = position + delta.as_vec2() * distance;
        // Saturating float cast; the walk ends at the room edge anyway.
        let crossed = (next_position.round() - current.as_vec2())
            .dot(delta.as_vec2())
            .max(0.0) as i32;
        self.last_update = now;

        let mut reached = current;
        for step in 1..=crossed {
            let cell = current + delta * step;
            if !world.is_walkable(self.room, cell.x, cell.y) {
                if reached != current {
                    self.position = reached.as_vec2();
                    self.stop_as(direction);
                } else if let AnimState::Walking { direction, .. } = previous {
                    self.stop_as(direction);
                }
                return MoveOutcome::Blocked { cell };
            }
            if let Some(to) = world.resolve_teleport(self.room, cell.x, cell.y) {
                self.enter_walking(walking);
                let from = CellRef::new(self.room, cell.x, cell.y);
                self.teleport(to, now);
                return MoveOutcome::Teleported {
                    from,
                    to,
                    via: walking,
                };
            }
            reached = cell;
        }

        self.enter_walking(walking);
        self.position = next_position;
        MoveOutcome::Moved {
            entered: (reached != current).then_some(reached),
        }
    }

    /// `Walking(d, _) -> Idle(d)`. No-op while idle.
    pub fn stop(&mut self, now: Instant) {
        if let AnimState::Walking { direction, .. } = self.state {
            self.stop_as(direction);
            self.last_update = now;
        }
    }

    /// Advances the walk cycle by `dt` seconds of animation time.
    ///
    /// Returns the number of frames advanced.
    pub fn animate(&mut self, dt: f32, tuning: &PlayerTuning) -> u32 {
        if !matches!(self.state, AnimState::Walking { .. }) {
            return 0;
        }
        let frames = dt * tuning.animation_fps;
        if !frames.is_finite() || frames <= 0.0 {
            return 0;
        }
        self.frame_clock += frames;
        let whole = self.frame_clock.floor();
        self.frame_clock -= whole;
        let advanced = whole as u32;
        let cycle = u32::from(tuning.frame_count.max(1));
        if let AnimState::Walking { phase, .. } = self.state {
            let next = (u32::from(phase) + advanced % cycle) % cycle;
            self.state = self.state.with_phase(next as u8);
        }
        advanced
    }

    /// One `tick` transition: `Walking(d, p) -> Walking(d, (p + 1) % frames)`.
    pub fn advance_frame(&mut self, frame_count: u8) {
        if let AnimState::Walking { phase, .. } = self.state {
            let next = ((u16::from(phase) + 1) % u16::from(frame_count.max(1))) as u8;
            self.state = self.state.with_phase(next);
        }
    }

    /// Relocates the player and drops to `Idle(current direction)`.
    pub fn teleport(&mut self, to: CellRef, now: Instant) {
        let direction = self.state.direction();
        self.room = to.room;
        self.position = Vec2::new(to.x as f32, to.y as f32);
        self.state = AnimState::Idle { direction };
        self.frame_clock = 0.0;
        self.last_update = now;
    }

    /// Applies an authoritative remote update.
    ///
    /// A room change is a teleport and lands idle; otherwise the reported
    /// movement state drives the same transitions as local input.
    pub fn apply_remote(
        &mut self,
        room: RoomId,
        position: Vec2,
        direction: Direction,
        movement: MovementState,
        now: Instant,
    ) -> RemoteOutcome {
        if room != self.room {
            let from = self.room;
            self.room = room;
            self.position = position;
            self.stop_as(direction);
            self.last_update = now;
            return RemoteOutcome::ChangedRoom { from };
        }

        match movement {
            MovementState::Walking => self.enter_walking(self.state.on_move(direction)),
            MovementState::Idle => self.stop_as(direction),
        }
        self.position = position;
        self.last_update = now;
        RemoteOutcome::Moved
    }

    fn enter_walking(&mut self, next: AnimState) {
        if next.phase() == 0 && next != self.state {
            self.frame_clock = 0.0;
        }
        self.state = next;
    }

    fn stop_as(&mut self, direction: Direction) {
        self.state = AnimState::Idle { direction };
        self.frame_clock = 0.0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
