//! Proximity sessions and media join/leave.
//!
//! The proximity set is the set of unordered pairs of players that share a
//! room and stand within `threshold` cells of each other. It is recomputed
//! from bus events whenever a player joins, moves, changes room, or leaves.
//! Pairs involving the local player drive the media transport: entering a
//! pair joins the remote user's media, leaving it leaves.
//!
//! [`ProximityManager`] is the only code that calls the [`MediaTransport`].

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use plaza_bus::SubscriptionGuard;
use plaza_config::ProximityConfig;
use plaza_world::RoomId;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use crate::events::{EventKind, PresenceBus, PresenceEvent, ProximityPair};
use crate::identity::{MediaId, Uid};
use crate::transport::{MediaError, MediaTransport};

// ---------------------------------------------------------------------------
// Pair computation
// ---------------------------------------------------------------------------

/// Every co-located pair within `threshold` cells (inclusive).
///
/// Players in different rooms never pair, whatever their coordinates.
pub fn proximity_pairs<'a>(
    players: impl IntoIterator<Item = (&'a Uid, RoomId, Vec2)>,
    threshold: f32,
) -> FxHashSet<ProximityPair> {
    let mut by_room: FxHashMap<RoomId, Vec<(&Uid, Vec2)>> = FxHashMap::default();
    for (uid, room, position) in players {
        by_room.entry(room).or_default().push((uid, position));
    }

    let mut pairs = FxHashSet::default();
    for occupants in by_room.values() {
        for (i, (a, pa)) in occupants.iter().enumerate() {
            for (b, pb) in &occupants[i + 1..] {
                if a != b && pa.distance(*pb) <= threshold {
                    pairs.insert(ProximityPair::new((*a).clone(), (*b).clone()));
                }
            }
        }
    }
    pairs
}

// ---------------------------------------------------------------------------
// ProximityManager
// ---------------------------------------------------------------------------

/// Media state of one remote peer paired with the local player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerSession {
    /// In range, but the peer's media id is not known yet.
    Pending,
    /// Joined on the media transport.
    Joined(MediaId),
    /// The transport refused the join; the pairing continues without media.
    Degraded,
}

#[derive(Debug, Clone, Copy)]
enum MediaOp {
    Join,
    Leave,
}

/// Tracks the proximity set and owns media-session membership.
pub struct ProximityManager {
    local: Uid,
    threshold: f32,
    retries: u32,
    media: Box<dyn MediaTransport>,
    players: FxHashMap<Uid, (RoomId, Vec2)>,
    pairs: FxHashSet<ProximityPair>,
    media_ids: FxHashMap<Uid, MediaId>,
    sessions: FxHashMap<Uid, PeerSession>,
}

/// Event kinds the manager listens to.
pub const OBSERVED_KINDS: [EventKind; 5] = [
    EventKind::PlayerJoined,
    EventKind::PlayerMoved,
    EventKind::RoomChanged,
    EventKind::PlayerLeft,
    EventKind::MediaIdentityBound,
];

impl ProximityManager {
    /// Creates a manager for the local player `local`.
    pub fn new(local: Uid, config: &ProximityConfig, media: Box<dyn MediaTransport>) -> Self {
        Self {
            local,
            threshold: config.threshold_cells.max(0.0),
            retries: config.media_retries,
            media,
            players: FxHashMap::default(),
            pairs: FxHashSet::default(),
            media_ids: FxHashMap::default(),
            sessions: FxHashMap::default(),
        }
    }

    /// Subscribes `manager` to the bus. Events it produces are published
    /// after the manager is released, so handlers may query it.
    ///
    /// Dropping the returned guards detaches the manager.
    pub fn attach(
        manager: &Rc<RefCell<Self>>,
        bus: &PresenceBus,
    ) -> Vec<SubscriptionGuard<PresenceEvent>> {
        OBSERVED_KINDS
            .into_iter()
            .map(|kind| {
                let manager = Rc::clone(manager);
                let weak = bus.downgrade();
                bus.subscribe_scoped(kind, move |event: &PresenceEvent| {
                    let produced = manager.borrow_mut().observe(event);
                    let Some(bus) = weak.upgrade() else {
                        return;
                    };
                    for event in produced {
                        if let Err(err) = bus.publish(event) {
                            debug!(%err, "proximity event not delivered");
                        }
                    }
                })
            })
            .collect()
    }

    /// Feeds one bus event; returns the events to publish in response.
    pub fn observe(&mut self, event: &PresenceEvent) -> Vec<PresenceEvent> {
        let mut out = Vec::new();
        match event {
            PresenceEvent::PlayerJoined(player)
            | PresenceEvent::PlayerMoved(player)
            | PresenceEvent::RoomChanged { player, .. } => {
                let entry = (player.room, player.position);
                if self.players.insert(player.uid.clone(), entry) != Some(entry) {
                    self.recompute(&mut out);
                }
            }
            PresenceEvent::PlayerLeft { uid, .. } => {
                if self.players.remove(uid).is_some() {
                    self.recompute(&mut out);
                }
                self.media_ids.remove(uid);
            }
            PresenceEvent::MediaIdentityBound { uid, media_id } => {
                self.media_ids.insert(uid.clone(), media_id.clone());
                if self.sessions.get(uid) == Some(&PeerSession::Pending) {
                    self.sessions.remove(uid);
                    self.attach_peer(uid, &mut out);
                }
            }
            _ => {}
        }
        out
    }

    /// The current proximity set.
    pub fn pairs(&self) -> &FxHashSet<ProximityPair> {
        &self.pairs
    }

    /// Media state for a remote peer paired with the local player.
    pub fn session(&self, uid: &Uid) -> Option<&PeerSession> {
        self.sessions.get(uid)
    }

    /// Remote peers whose media is currently joined, sorted.
    pub fn attached_peers(&self) -> Vec<Uid> {
        let mut peers: Vec<Uid> = self
            .sessions
            .iter()
            .filter(|(_, s)| matches!(s, PeerSession::Joined(_)))
            .map(|(uid, _)| uid.clone())
            .collect();
        peers.sort();
        peers
    }

    // -- Internals ------------------------------------------------------------

    fn recompute(&mut self, out: &mut Vec<PresenceEvent>) {
        let next = proximity_pairs(
            self.players
                .iter()
                .map(|(uid, (room, position))| (uid, *room, *position)),
            self.threshold,
        );

        let mut left: Vec<ProximityPair> = self.pairs.difference(&next).cloned().collect();
        let mut joined: Vec<ProximityPair> = next.difference(&self.pairs).cloned().collect();
        left.sort();
        joined.sort();
        self.pairs = next;

        for pair in left {
            if let Some(peer) = pair.other(&self.local).cloned() {
                self.detach_peer(&peer, out);
            }
            out.push(PresenceEvent::ProximityLeft(pair));
        }
        for pair in joined {
            out.push(PresenceEvent::ProximityJoined(pair.clone()));
            if let Some(peer) = pair.other(&self.local).cloned() {
                self.attach_peer(&peer, out);
            }
        }
    }

    fn attach_peer(&mut self, peer: &Uid, out: &mut Vec<PresenceEvent>) {
        if self.sessions.contains_key(peer) {
            return;
        }
        let Some(media_id) = self.media_ids.get(peer).cloned() else {
            debug!(%peer, "peer in range, waiting for media id");
            self.sessions.insert(peer.clone(), PeerSession::Pending);
            return;
        };
        match self.call(MediaOp::Join, &media_id) {
            Ok(()) => {
                info!(%peer, %media_id, "joined peer media");
                self.sessions
                    .insert(peer.clone(), PeerSession::Joined(media_id.clone()));
                out.push(PresenceEvent::PeerAttached {
                    uid: peer.clone(),
                    media_id,
                });
            }
            Err(error) => {
                warn!(%peer, %media_id, %error, "media join failed, continuing without it");
                self.sessions.insert(peer.clone(), PeerSession::Degraded);
                out.push(PresenceEvent::MediaDegraded {
                    uid: peer.clone(),
                    error,
                });
            }
        }
    }

    fn detach_peer(&mut self, peer: &Uid, out: &mut Vec<PresenceEvent>) {
        let Some(PeerSession::Joined(media_id)) = self.sessions.remove(peer) else {
            return;
        };
        match self.call(MediaOp::Leave, &media_id) {
            Ok(()) => {
                info!(%peer, %media_id, "left peer media");
                out.push(PresenceEvent::PeerDetached {
                    uid: peer.clone(),
                    media_id,
                });
            }
            Err(error) => {
                warn!(%peer, %media_id, %error, "media leave failed");
                out.push(PresenceEvent::MediaDegraded {
                    uid: peer.clone(),
                    error,
                });
            }
        }
    }

    fn call(&mut self, op: MediaOp, media_id: &MediaId) -> Result<(), MediaError> {
        let mut attempt = 0;
        loop {
            let result = match op {
                MediaOp::Join => self.media.join(media_id),
                MediaOp::Leave => self.media.leave(media_id),
            };
            match result {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.retries => {
                    attempt += 1;
                    debug!(?op, %media_id, %err, attempt, "retrying media call");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::events::LeaveReason;
    use crate::player::{Control, Player};
    use crate::transport::{MediaCall, RecordingMedia};

    fn manager(media: &Rc<RefCell<RecordingMedia>>) -> ProximityManager {
        ProximityManager::new(
            Uid::new("U1"),
            &ProximityConfig::default(),
            Box::new(Rc::clone(media)),
        )
    }

    fn moved(uid: &str, room: u32, x: f32, y: f32) -> PresenceEvent {
        let player = Player::at(
            Uid::new(uid),
            Control::Remote,
            RoomId(room),
            Vec2::new(x, y),
            Instant::now(),
        );
        PresenceEvent::PlayerMoved(player.snapshot())
    }

    fn bound(uid: &str, media: &str) -> PresenceEvent {
        PresenceEvent::MediaIdentityBound {
            uid: Uid::new(uid),
            media_id: MediaId::new(media),
        }
    }

    #[test]
    fn test_pairs_respect_threshold_and_room() {
        let (a, b, c) = (Uid::new("a"), Uid::new("b"), Uid::new("c"));
        let pairs = proximity_pairs(
            [
                (&a, RoomId(0), Vec2::new(1.0, 1.0)),
                (&b, RoomId(0), Vec2::new(4.0, 1.0)),
                (&c, RoomId(1), Vec2::new(1.0, 1.0)),
            ],
            3.0,
        );
        assert_eq!(pairs.len(), 1);
        assert!(pairs.contains(&ProximityPair::new(a.clone(), b.clone())));

        let far = proximity_pairs(
            [
                (&a, RoomId(0), Vec2::new(1.0, 1.0)),
                (&b, RoomId(0), Vec2::new(4.1, 1.0)),
            ],
            3.0,
        );
        assert!(far.is_empty());
    }

    #[test]
    fn test_pending_until_media_id_known() {
        let media = Rc::new(RefCell::new(RecordingMedia::default()));
        let mut m = manager(&media);
        m.observe(&moved("U1", 0, 5.0, 5.0));
        let out = m.observe(&moved("U2", 0, 6.0, 5.0));

        assert!(matches!(out.as_slice(), [PresenceEvent::ProximityJoined(_)]));
        assert_eq!(m.session(&Uid::new("U2")), Some(&PeerSession::Pending));
        assert!(media.borrow().calls.is_empty());

        let out = m.observe(&bound("U2", "U2-m"));
        assert!(matches!(out.as_slice(), [PresenceEvent::PeerAttached { .. }]));
        assert_eq!(
            media.borrow().calls,
            vec![MediaCall::Join(MediaId::new("U2-m"))]
        );
        assert_eq!(m.attached_peers(), vec![Uid::new("U2")]);
    }

    #[test]
    fn test_remote_pairs_do_not_touch_media() {
        let media = Rc::new(RefCell::new(RecordingMedia::default()));
        let mut m = manager(&media);
        m.observe(&bound("U2", "U2-m"));
        m.observe(&bound("U3", "U3-m"));
        m.observe(&moved("U1", 1, 1.0, 1.0));
        m.observe(&moved("U2", 0, 5.0, 5.0));
        let out = m.observe(&moved("U3", 0, 5.0, 6.0));

        assert!(matches!(out.as_slice(), [PresenceEvent::ProximityJoined(_)]));
        assert!(media.borrow().calls.is_empty());
    }

    #[test]
    fn test_retry_once_then_succeed() {
        let media = Rc::new(RefCell::new(RecordingMedia {
            fail_next: 1,
            ..Default::default()
        }));
        let mut m = manager(&media);
        m.observe(&bound("U2", "U2-m"));
        m.observe(&moved("U1", 0, 5.0, 5.0));
        let out = m.observe(&moved("U2", 0, 6.0, 5.0));

        assert!(out
            .iter()
            .any(|ev| matches!(ev, PresenceEvent::PeerAttached { .. })));
        assert_eq!(media.borrow().calls.len(), 2);
    }

    #[test]
    fn test_persistent_failure_degrades() {
        let media = Rc::new(RefCell::new(RecordingMedia {
            fail_next: 2,
            ..Default::default()
        }));
        let mut m = manager(&media);
        m.observe(&bound("U2", "U2-m"));
        m.observe(&moved("U1", 0, 5.0, 5.0));
        let out = m.observe(&moved("U2", 0, 6.0, 5.0));

        assert!(out
            .iter()
            .any(|ev| matches!(ev, PresenceEvent::MediaDegraded { .. })));
        assert_eq!(m.session(&Uid::new("U2")), Some(&PeerSession::Degraded));
        assert!(m.attached_peers().is_empty());

        // Leaving range clears the degraded pairing without a leave call.
        let out = m.observe(&moved("U2", 0, 12.0, 5.0));
        assert!(matches!(out.as_slice(), [PresenceEvent::ProximityLeft(_)]));
        assert_eq!(media.borrow().calls.len(), 2);
        assert_eq!(m.session(&Uid::new("U2")), None);
    }

    #[test]
    fn test_player_left_detaches() {
        let media = Rc::new(RefCell::new(RecordingMedia::default()));
        let mut m = manager(&media);
        m.observe(&bound("U2", "U2-m"));
        m.observe(&moved("U1", 0, 5.0, 5.0));
        m.observe(&moved("U2", 0, 6.0, 5.0));

        let out = m.observe(&PresenceEvent::PlayerLeft {
            uid: Uid::new("U2"),
            reason: LeaveReason::Timeout,
        });
        assert!(matches!(
            out.as_slice(),
            [
                PresenceEvent::PeerDetached { .. },
                PresenceEvent::ProximityLeft(_)
            ]
        ));
        assert_eq!(
            media.borrow().calls.last(),
            Some(&MediaCall::Leave(MediaId::new("U2-m")))
        );
        assert!(m.pairs().is_empty());
    }
}
