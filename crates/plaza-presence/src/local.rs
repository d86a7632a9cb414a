//! The input-driven player.

use std::rc::Rc;
use std::time::Instant;

use plaza_world::World;
use tracing::debug;

use crate::events::PresenceEvent;
use crate::identity::Uid;
use crate::player::{Control, Direction, MoveOutcome, Player, PlayerTuning};

/// Owns the local [`Player`] and turns input into state transitions.
#[derive(Debug)]
pub struct LocalController {
    world: Rc<World>,
    tuning: PlayerTuning,
    player: Player,
}

impl LocalController {
    /// Places the local player at the realm spawn, `Idle(down)`.
    pub fn new(world: Rc<World>, tuning: PlayerTuning, uid: Uid, now: Instant) -> Self {
        let player = Player::spawn(uid, Control::Local, world.spawn(), now);
        Self {
            world,
            tuning,
            player,
        }
    }

    /// The local player.
    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Movement and animation constants.
    pub fn tuning(&self) -> &PlayerTuning {
        &self.tuning
    }

    /// Applies `dt` seconds of movement input.
    ///
    /// Returns the outcome and the event to publish for it, if any.
    pub fn walk(
        &mut self,
        direction: Direction,
        dt: f32,
        now: Instant,
    ) -> (MoveOutcome, Option<PresenceEvent>) {
        let before = self.player.snapshot();
        let outcome = self
            .player
            .walk(direction, dt, &self.tuning, &self.world, now);
        let after = self.player.snapshot();
        let event = match outcome {
            MoveOutcome::Teleported { from, to, .. } => {
                debug!(?from, ?to, "local player teleported");
                Some(PresenceEvent::RoomChanged {
                    from: from.room,
                    player: after,
                })
            }
            MoveOutcome::Blocked { cell } => {
                debug!(?cell, "local move blocked");
                (after != before).then_some(PresenceEvent::PlayerMoved(after))
            }
            MoveOutcome::Moved { .. } => Some(PresenceEvent::PlayerMoved(after)),
        };
        (outcome, event)
    }

    /// Releases movement input.
    pub fn stop(&mut self, now: Instant) -> Option<PresenceEvent> {
        let before = self.player.state();
        self.player.stop(now);
        (self.player.state() != before).then(|| PresenceEvent::PlayerMoved(self.player.snapshot()))
    }

    /// Advances the walk cycle.
    pub fn animate(&mut self, dt: f32) -> Option<PresenceEvent> {
        (self.player.animate(dt, &self.tuning) > 0)
            .then(|| PresenceEvent::PlayerMoved(self.player.snapshot()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaza_world::{RoomId, starter_template};

    fn controller() -> LocalController {
        let world = Rc::new(World::from_template(&starter_template()).unwrap());
        LocalController::new(world, PlayerTuning::default(), Uid::new("me"), Instant::now())
    }

    #[test]
    fn test_starts_at_spawn() {
        let c = controller();
        assert_eq!(c.player().room(), RoomId(0));
        assert_eq!(c.player().cell(), glam::IVec2::new(7, 5));
    }

    #[test]
    fn test_blocked_idle_move_publishes_nothing() {
        let mut c = controller();
        // Walk to the west wall, stop, then push into it.
        for _ in 0..6 {
            c.walk(Direction::Left, 0.25, Instant::now());
        }
        assert_eq!(c.player().cell(), glam::IVec2::new(1, 5));
        assert!(c.stop(Instant::now()).is_some());

        let (outcome, event) = c.walk(Direction::Left, 0.25, Instant::now());
        assert!(matches!(outcome, MoveOutcome::Blocked { .. }));
        assert!(event.is_none());
    }

    #[test]
    fn test_stop_when_idle_is_silent() {
        let mut c = controller();
        assert!(c.stop(Instant::now()).is_none());
    }
}
