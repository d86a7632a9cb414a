//! End-to-end scenarios driven through [`Engine`].

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use glam::Vec2;
use plaza_config::Config;
use plaza_world::{
    CellRef, RealmTemplate, RoomId, RoomTemplate, TileDescriptor, World, format_cell_key,
    starter_template,
};

use crate::engine::Engine;
use crate::events::{EventKind, LeaveReason, PresenceEvent};
use crate::identity::{MediaId, Uid};
use crate::messages::{InboundMessage, MoveUpdate, OutboundMessage, encode_inbound};
use crate::player::{AnimState, Direction, MoveOutcome, MovementState};
use crate::transport::{MediaCall, RecordingMedia, RecordingTransport};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Session {
    engine: Engine,
    sent: Rc<RefCell<RecordingTransport>>,
    media: Rc<RefCell<RecordingMedia>>,
    events: Rc<RefCell<Vec<PresenceEvent>>>,
}

impl Session {
    fn new(template: &RealmTemplate, local: &str) -> Self {
        let world = Rc::new(World::from_template(template).unwrap());
        let sent = Rc::new(RefCell::new(RecordingTransport::default()));
        let media = Rc::new(RefCell::new(RecordingMedia::default()));
        let mut engine = Engine::new(
            world,
            &Config::default(),
            Uid::new(local),
            "009",
            Box::new(Rc::clone(&sent)),
            Box::new(Rc::clone(&media)),
        );

        let events = Rc::new(RefCell::new(Vec::new()));
        for kind in EventKind::ALL {
            let events = Rc::clone(&events);
            engine
                .bus()
                .subscribe(kind, move |ev: &PresenceEvent| events.borrow_mut().push(ev.clone()));
        }
        engine.spawn_local(Instant::now());
        events.borrow_mut().clear();
        sent.borrow_mut().sent.clear();

        Self {
            engine,
            sent,
            media,
            events,
        }
    }

    fn remote_move(&mut self, uid: &str, room: u32, x: f32, y: f32, now: Instant) -> bool {
        self.engine.handle_message(
            InboundMessage::Move(MoveUpdate {
                uid: Uid::new(uid),
                room: RoomId(room),
                x,
                y,
                direction: Direction::Left,
                movement: MovementState::Idle,
            }),
            now,
        )
    }

    fn count(&self, kind: EventKind) -> usize {
        use plaza_bus::BusEvent;
        self.events
            .borrow()
            .iter()
            .filter(|ev| ev.kind() == kind)
            .count()
    }
}

/// Starter realm plus a third room, with the spawn in the garden.
fn three_rooms() -> RealmTemplate {
    let mut template = starter_template();
    let mut tilemap = std::collections::BTreeMap::new();
    for y in 1..10 {
        for x in 1..14 {
            tilemap.insert(format_cell_key(x, y), TileDescriptor::floor("tile"));
        }
    }
    template.rooms.push(RoomTemplate {
        name: "studio".to_string(),
        width: Some(15),
        height: Some(11),
        tilemap,
    });
    template.spawnpoint.room = RoomId(1);
    template.spawnpoint.x = 10;
    template.spawnpoint.y = 5;
    template
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_walking_onto_teleporter_lands_idle_in_target_room() {
    let mut s = Session::new(&starter_template(), "local-uid");
    let now = Instant::now();
    assert_eq!(s.engine.local().cell(), glam::IVec2::new(7, 5));

    for _ in 0..4 {
        s.engine.walk(Direction::Down, 0.25, now);
    }
    assert_eq!(s.engine.local().position(), Vec2::new(7.0, 9.0));
    s.engine.stop(now);
    assert_eq!(
        s.engine.local().state(),
        AnimState::Idle {
            direction: Direction::Down
        }
    );

    let outcome = s.engine.walk(Direction::Down, 0.25, now);
    assert_eq!(
        outcome,
        MoveOutcome::Teleported {
            from: CellRef::new(RoomId(0), 7, 10),
            to: CellRef::new(RoomId(1), 10, 2),
            via: AnimState::Walking {
                direction: Direction::Down,
                phase: 0
            },
        }
    );
    let local = s.engine.local();
    assert_eq!(local.room(), RoomId(1));
    assert_eq!(local.position(), Vec2::new(10.0, 2.0));
    assert_eq!(
        local.state(),
        AnimState::Idle {
            direction: Direction::Down
        }
    );

    // Nobody ever observed the player standing on the teleporter.
    let events = s.events.borrow();
    assert!(!events.iter().any(|ev| matches!(
        ev,
        PresenceEvent::PlayerMoved(p) if p.room == RoomId(0) && p.position == Vec2::new(7.0, 10.0)
    )));
    assert!(matches!(
        events.last(),
        Some(PresenceEvent::RoomChanged { from: RoomId(0), player })
            if player.room == RoomId(1) && player.position == Vec2::new(10.0, 2.0)
    ));
}

#[test]
fn test_pair_joins_once_and_leaves_once_on_room_change() {
    let mut s = Session::new(&three_rooms(), "U1");
    let now = Instant::now();

    assert!(s.remote_move("U2", 1, 12.0, 5.0, now));
    s.engine.handle_message(
        InboundMessage::MediaUserPublished {
            media_id: MediaId::new("U2-cam"),
        },
        now,
    );
    assert_eq!(s.count(EventKind::ProximityJoined), 1);
    assert_eq!(s.engine.proximity_peers(), vec![Uid::new("U2")]);

    // Small moves within range change nothing.
    assert!(s.remote_move("U2", 1, 11.5, 5.0, now));
    assert!(s.remote_move("U2", 1, 12.0, 6.0, now));

    // Same coordinates, different room.
    assert!(s.remote_move("U2", 2, 11.0, 5.0, now));
    assert!(s.remote_move("U2", 2, 10.0, 5.0, now));

    assert_eq!(s.count(EventKind::ProximityJoined), 1);
    assert_eq!(s.count(EventKind::ProximityLeft), 1);
    assert_eq!(
        s.media.borrow().calls,
        vec![
            MediaCall::Join(MediaId::new("U2-cam")),
            MediaCall::Leave(MediaId::new("U2-cam")),
        ]
    );
    assert!(s.engine.proximity_peers().is_empty());

    // Co-located again: a fresh join.
    assert!(s.remote_move("U2", 1, 11.0, 5.0, now));
    assert_eq!(s.count(EventKind::ProximityJoined), 2);
    assert_eq!(s.media.borrow().calls.len(), 3);
}

#[test]
fn test_first_remote_move_creates_idle_down_player() {
    let mut s = Session::new(&starter_template(), "local-uid");
    let now = Instant::now();
    assert!(s.remote_move("newcomer", 0, 4.0, 6.5, now));

    let p = s.engine.remote(&Uid::new("newcomer")).unwrap();
    assert_eq!(p.room(), RoomId(0));
    assert_eq!(p.position(), Vec2::new(4.0, 6.5));
    assert_eq!(
        p.state(),
        AnimState::Idle {
            direction: Direction::Down
        }
    );
    assert!(matches!(
        s.events.borrow().first(),
        Some(PresenceEvent::PlayerJoined(snap))
            if matches!(snap.state, AnimState::Idle { direction: Direction::Down })
    ));
}

#[test]
fn test_replayed_leave_is_idempotent() {
    let mut s = Session::new(&starter_template(), "local-uid");
    let now = Instant::now();
    s.remote_move("r1", 0, 4.0, 4.0, now);

    let leave = InboundMessage::Leave { uid: Uid::new("r1") };
    assert!(s.engine.handle_message(leave.clone(), now));
    let after_once = s.events.borrow().len();
    assert!(s.engine.handle_message(leave, now));

    assert_eq!(s.events.borrow().len(), after_once);
    assert_eq!(s.count(EventKind::PlayerLeft), 1);
    assert!(s.engine.remote(&Uid::new("r1")).is_none());
}

#[test]
fn test_silent_remote_is_evicted_from_session() {
    let mut s = Session::new(&three_rooms(), "U1");
    let now = Instant::now();
    s.remote_move("U2", 1, 11.0, 5.0, now);
    s.engine.handle_message(
        InboundMessage::MediaUserPublished {
            media_id: MediaId::new("U2-cam"),
        },
        now,
    );
    assert_eq!(s.engine.proximity_peers(), vec![Uid::new("U2")]);

    s.engine.tick(0.016, now + Duration::from_secs(10));
    assert!(s.engine.remote(&Uid::new("U2")).is_some());

    s.engine.tick(0.016, now + Duration::from_secs(31));
    assert!(s.engine.remote(&Uid::new("U2")).is_none());
    assert!(s.events.borrow().iter().any(|ev| matches!(
        ev,
        PresenceEvent::PlayerLeft {
            reason: LeaveReason::Timeout,
            ..
        }
    )));
    assert_eq!(
        s.media.borrow().calls.last(),
        Some(&MediaCall::Leave(MediaId::new("U2-cam")))
    );
}

#[test]
fn test_local_walk_cycles_every_frame() {
    let mut s = Session::new(&starter_template(), "local-uid");
    let now = Instant::now();
    s.engine.walk(Direction::Right, 0.01, now);

    let frames = Config::default().presence.walk_frame_count;
    let mut phases = Vec::new();
    for _ in 0..frames * 2 {
        // 8 fps: one frame per 0.125 s.
        s.engine.tick(0.125, now);
        phases.push(s.engine.local().state().phase());
    }
    assert!(phases.iter().all(|p| *p < frames));
    assert_eq!(phases, vec![1, 2, 3, 0, 1, 2, 3, 0]);
}

#[test]
fn test_outbound_moves_are_rate_limited() {
    let mut s = Session::new(&starter_template(), "local-uid");
    let start = Instant::now() + Duration::from_secs(1);

    // 60 Hz input for half a second.
    for i in 0..30u32 {
        let now = start + Duration::from_millis(u64::from(i) * 16);
        s.engine.walk(Direction::Left, 0.001, now);
        s.engine.tick(0.016, now);
    }
    let moves = s
        .sent
        .borrow()
        .sent
        .iter()
        .filter(|msg| matches!(msg, OutboundMessage::Move(_)))
        .count();
    assert!((4..=6).contains(&moves), "sent {moves} moves");
}

#[test]
fn test_frames_pumped_from_inbox() {
    let mut s = Session::new(&starter_template(), "local-uid");
    let tx = s.engine.inbox_sender();
    let frame = |msg: InboundMessage| encode_inbound(&msg).unwrap();

    tx.push(frame(InboundMessage::Move(MoveUpdate {
        uid: Uid::new("r1"),
        room: RoomId(0),
        x: 3.0,
        y: 3.0,
        direction: Direction::Up,
        movement: MovementState::Idle,
    })));
    tx.push(vec![0xFF]);
    tx.push(frame(InboundMessage::Move(MoveUpdate {
        uid: Uid::new("r2"),
        room: RoomId(9),
        x: 3.0,
        y: 3.0,
        direction: Direction::Up,
        movement: MovementState::Idle,
    })));

    assert_eq!(s.engine.pump(Instant::now()), 1);
    assert!(s.engine.remote(&Uid::new("r1")).is_some());
    assert!(s.engine.remote(&Uid::new("r2")).is_none());
}

#[test]
fn test_idle_peer_stays_present_past_liveness_window() {
    let mut alice = Session::new(&starter_template(), "alice");
    let mut bob = Session::new(&starter_template(), "bob");
    let start = Instant::now();
    let spawn = alice.engine.local().position();
    assert!(bob.remote_move("alice", 0, spawn.x, spawn.y, start));

    let mut relayed = 0;
    for secs in 1..=60 {
        let now = start + Duration::from_secs(secs);
        alice.engine.tick(0.016, now);
        let outbound: Vec<_> = alice.sent.borrow_mut().sent.drain(..).collect();
        for msg in outbound {
            if let OutboundMessage::Move(update) = msg {
                bob.engine.handle_message(InboundMessage::Move(update), now);
                relayed += 1;
            }
        }
        bob.engine.tick(0.016, now);
        assert!(
            bob.engine.remote(&Uid::new("alice")).is_some(),
            "alice evicted after {secs} s"
        );
    }
    assert!(relayed >= 5, "relayed {relayed} keepalives");
    assert_eq!(bob.count(EventKind::PlayerLeft), 0);
}

#[test]
fn test_evicted_remote_rejoins_on_next_move() {
    let mut s = Session::new(&starter_template(), "local-uid");
    let now = Instant::now();
    assert!(s.remote_move("carol", 0, 4.0, 4.0, now));

    s.engine.tick(0.016, now + Duration::from_secs(31));
    assert!(s.engine.remote(&Uid::new("carol")).is_none());

    assert!(s.remote_move("carol", 0, 5.0, 4.0, now + Duration::from_secs(45)));
    let carol = s.engine.remote(&Uid::new("carol")).unwrap();
    assert_eq!(carol.position(), Vec2::new(5.0, 4.0));
    assert_eq!(s.count(EventKind::PlayerJoined), 2);
}

#[test]
fn test_long_walk_step_still_teleports() {
    let mut s = Session::new(&starter_template(), "local-uid");
    let now = Instant::now();

    // Six cells in one call: four floor cells, then the teleporter.
    let outcome = s.engine.walk(Direction::Down, 1.5, now);
    assert!(matches!(
        outcome,
        MoveOutcome::Teleported { from, .. } if from == CellRef::new(RoomId(0), 7, 10)
    ));
    assert_eq!(s.engine.local().room(), RoomId(1));
    assert_eq!(s.engine.local().position(), Vec2::new(10.0, 2.0));
    assert!(!s.events.borrow().iter().any(|ev| matches!(
        ev,
        PresenceEvent::PlayerMoved(p) if p.room == RoomId(0)
    )));
}
