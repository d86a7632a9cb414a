//! Scripted headless session.
//!
//! A remote player appears next to the spawn, announces their media, turns
//! their camera off, then follows the local player through the lobby
//! teleporter before going silent. Every bus event is logged.

use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use plaza_bus::SubscriptionGuard;
use plaza_config::Config;
use plaza_presence::{
    Direction, Engine, EventKind, InboundMessage, MediaId, MessageError, MoveOutcome, MoveUpdate,
    MovementState, PresenceEvent, Uid, encode_inbound,
};
use plaza_world::{RoomId, World};
use tracing::{debug, info, warn};

use crate::transports::{LoggingMedia, LoggingTransport};

const TICK: f32 = 1.0 / 60.0;
const LOCAL_UID: &str = "5f3c9a11d0e4";
const REMOTE_UID: &str = "b7e1f00d42aa";

/// Outcome of a scripted run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Events seen on the bus.
    pub events: usize,
    /// Ticks simulated.
    pub ticks: u32,
    /// Media peers attached when the run ended.
    pub peers: usize,
}

type EventLog = (Vec<SubscriptionGuard<PresenceEvent>>, Rc<Cell<usize>>);

fn log_events(engine: &Engine) -> EventLog {
    let seen = Rc::new(Cell::new(0));
    let guards = EventKind::ALL
        .into_iter()
        .map(|kind| {
            let seen = Rc::clone(&seen);
            engine.bus().subscribe_scoped(kind, move |event: &PresenceEvent| {
                seen.set(seen.get() + 1);
                match event {
                    PresenceEvent::PlayerMoved(_) => debug!(?event, "bus"),
                    _ => info!(?event, "bus"),
                }
            })
        })
        .collect();
    (guards, seen)
}

fn remote_frames(world: &World) -> Result<Vec<Vec<u8>>, MessageError> {
    let spawn = world.spawn();
    let uid = Uid::new(REMOTE_UID);
    let at = |room: RoomId, x: f32, y: f32, movement| {
        InboundMessage::Move(MoveUpdate {
            uid: uid.clone(),
            room,
            x,
            y,
            direction: Direction::Down,
            movement,
        })
    };
    let script = [
        at(spawn.room, spawn.x as f32 + 2.0, spawn.y as f32, MovementState::Idle),
        InboundMessage::MediaUserPublished {
            media_id: MediaId::new(format!("{}-cam0", uid.media_prefix())),
        },
        InboundMessage::MediaCapabilities {
            uid: uid.clone(),
            mic: true,
            camera: false,
        },
        InboundMessage::SkinResponse {
            uid: uid.clone(),
            skin: "004".to_string(),
        },
        InboundMessage::RoomJoined {
            uid: uid.clone(),
            name: world
                .rooms()
                .first()
                .map(|room| room.name().to_string())
                .unwrap_or_default(),
            channel_id: "channel-0".to_string(),
        },
        at(spawn.room, spawn.x as f32 + 1.5, spawn.y as f32, MovementState::Walking),
        InboundMessage::SkinQuery {
            requester: uid.clone(),
            uid: Uid::new(LOCAL_UID),
        },
    ];
    script.iter().map(encode_inbound).collect()
}

/// Runs the scripted session against `world`.
pub fn run(world: Rc<World>, config: &Config) -> Result<RunSummary, MessageError> {
    let mut engine = Engine::new(
        Rc::clone(&world),
        config,
        Uid::new(LOCAL_UID),
        "009",
        Box::new(LoggingTransport::default()),
        Box::new(LoggingMedia::default()),
    );
    let (_guards, seen) = log_events(&engine);

    let start = Instant::now();
    let clock = |ticks: u32| start + Duration::from_secs_f32(ticks as f32 * TICK);
    engine.spawn_local(clock(0));

    // Frames arrive from a network thread.
    let frames = remote_frames(&world)?;
    let sender = engine.inbox_sender();
    let network = thread::spawn(move || {
        for frame in frames {
            sender.push(frame);
        }
    });
    if network.join().is_err() {
        warn!("network thread panicked");
    }
    let accepted = engine.pump(clock(0));
    info!(accepted, "initial frames applied");

    // Walk down until the room changes or the path is blocked.
    let mut ticks = 0;
    let room = engine.local().room();
    while engine.local().room() == room && ticks < 600 {
        ticks += 1;
        let outcome = engine.walk(Direction::Down, TICK, clock(ticks));
        engine.tick(TICK, clock(ticks));
        if matches!(outcome, MoveOutcome::Blocked { .. }) {
            info!(cell = ?engine.local().cell(), "walk blocked, stopping");
            break;
        }
    }
    engine.stop(clock(ticks));
    info!(
        room = ?engine.local().room(),
        position = ?engine.local().position(),
        state = ?engine.local().state(),
        "local player settled"
    );

    // The remote follows, then goes silent until the liveness window expires.
    let here = engine.local();
    let follow = InboundMessage::Move(MoveUpdate {
        uid: Uid::new(REMOTE_UID),
        room: here.room(),
        x: here.position().x + 1.0,
        y: here.position().y,
        direction: Direction::Left,
        movement: MovementState::Idle,
    });
    engine.handle_message(follow, clock(ticks));
    info!(peers = ?engine.proximity_peers(), "after follow");

    let timeout_ticks = (config.presence.liveness_timeout_secs + 1) * 60;
    for _ in 0..timeout_ticks {
        ticks += 1;
        engine.tick(TICK, clock(ticks));
    }

    Ok(RunSummary {
        events: seen.get(),
        ticks,
        peers: engine.proximity_peers().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaza_world::starter_template;

    #[test]
    fn test_scripted_run_on_starter_realm() {
        let world = Rc::new(World::from_template(&starter_template()).unwrap());
        let summary = run(world, &Config::default()).unwrap();
        assert!(summary.events > 0);
        // The remote timed out, so nobody is attached at the end.
        assert_eq!(summary.peers, 0);
    }
}
