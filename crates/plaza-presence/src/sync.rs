//! Bridge between the network transport and the presence bus.
//!
//! The synchronizer owns every remote [`Player`]. Inbound messages are
//! validated against the realm, applied to the matching player, and
//! republished as [`PresenceEvent`]s. Local movement goes the other way,
//! through a [`SendThrottle`] so the network sees at most `send_rate`
//! updates per second regardless of how fast the animation ticks.

use std::rc::Rc;
use std::time::{Duration, Instant};

use glam::Vec2;
use plaza_config::Config;
use plaza_world::{RoomId, World, WorldError};
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::events::{LeaveReason, MediaCapabilities, PresenceBus, PresenceEvent};
use crate::identity::{MediaId, MediaIdentityTable, Uid};
use crate::messages::{InboundMessage, MoveUpdate, OutboundMessage};
use crate::player::{Control, Player, PlayerTuning, RemoteOutcome, cell_of};
use crate::skins::{SkinDirectory, SkinLookup};
use crate::throttle::SendThrottle;
use crate::transport::PresenceTransport;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons an inbound message was dropped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// The message names a room the realm does not have.
    #[error("unknown room {0:?}")]
    UnknownRoom(RoomId),
    /// The message names a room that was refused at load time.
    #[error("room {0:?} is inactive")]
    InactiveRoom(RoomId),
    /// No room carries this name.
    #[error("unknown room name {0:?}")]
    UnknownRoomName(String),
    /// The reported position lies outside the room.
    #[error("position ({x}, {y}) is outside room {room:?}")]
    OutOfBounds {
        /// Reported room.
        room: RoomId,
        /// Reported x.
        x: f32,
        /// Reported y.
        y: f32,
    },
    /// The message is structurally invalid.
    #[error("malformed message: {0}")]
    Malformed(&'static str),
}

fn room_error(err: WorldError) -> SyncError {
    match err {
        WorldError::InactiveRoom(room) => SyncError::InactiveRoom(room),
        WorldError::UnknownRoomName(name) => SyncError::UnknownRoomName(name),
        WorldError::UnknownRoom(room) => SyncError::UnknownRoom(room),
        _ => SyncError::Malformed("room lookup failed"),
    }
}

// ---------------------------------------------------------------------------
// PresenceSynchronizer
// ---------------------------------------------------------------------------

/// Owner of remote players and the network side of presence.
pub struct PresenceSynchronizer {
    world: Rc<World>,
    bus: PresenceBus,
    local_uid: Uid,
    tuning: PlayerTuning,
    liveness: Duration,
    tombstone: Duration,
    remotes: FxHashMap<Uid, Player>,
    departed: FxHashMap<Uid, Instant>,
    capabilities: FxHashMap<Uid, MediaCapabilities>,
    identities: MediaIdentityTable,
    skins: SkinDirectory,
    throttle: SendThrottle,
    transport: Box<dyn PresenceTransport>,
}

impl PresenceSynchronizer {
    /// Creates a synchronizer publishing on `bus` and sending through
    /// `transport`.
    pub fn new(
        world: Rc<World>,
        bus: PresenceBus,
        config: &Config,
        local_uid: Uid,
        local_skin: impl Into<String>,
        transport: Box<dyn PresenceTransport>,
    ) -> Self {
        let liveness = Duration::from_secs(u64::from(config.presence.liveness_timeout_secs));
        let keepalive =
            Duration::from_secs(u64::from(config.network.keepalive_secs)).min(liveness / 2);
        Self {
            world,
            bus,
            skins: SkinDirectory::new(local_uid.clone(), local_skin),
            local_uid,
            tuning: PlayerTuning::from_config(&config.presence),
            liveness,
            tombstone: Duration::from_secs(u64::from(config.presence.tombstone_secs)),
            remotes: FxHashMap::default(),
            departed: FxHashMap::default(),
            capabilities: FxHashMap::default(),
            identities: MediaIdentityTable::new(),
            throttle: SendThrottle::from_rate(config.network.move_send_rate_hz)
                .with_keepalive(keepalive),
            transport,
        }
    }

    /// Applies one inbound message. Invalid messages are logged and dropped.
    ///
    /// Returns `true` if the message was accepted.
    pub fn handle(&mut self, msg: InboundMessage, now: Instant) -> bool {
        let result = match msg {
            InboundMessage::Move(update) => self.on_remote_move(update, now),
            InboundMessage::Leave { uid } => {
                self.on_remote_leave(&uid, now);
                Ok(())
            }
            InboundMessage::RoomJoined {
                uid,
                name,
                channel_id,
            } => self.on_room_joined(uid, name, channel_id),
            InboundMessage::MediaCapabilities { uid, mic, camera } => {
                self.on_media_capabilities(uid, MediaCapabilities { mic, camera });
                Ok(())
            }
            InboundMessage::MediaUserPublished { media_id } => {
                self.on_media_user_published(media_id);
                Ok(())
            }
            InboundMessage::SkinQuery { requester, uid } => {
                self.on_skin_query(&requester, &uid);
                Ok(())
            }
            InboundMessage::SkinResponse { uid, skin } => {
                self.on_skin_response(uid, skin);
                Ok(())
            }
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "dropping inbound message");
                false
            }
        }
    }

    // -- Inbound --------------------------------------------------------------

    /// Creates or updates a remote player from a movement message.
    pub fn on_remote_move(&mut self, update: MoveUpdate, now: Instant) -> Result<(), SyncError> {
        if !update.x.is_finite() || !update.y.is_finite() {
            return Err(SyncError::Malformed("non-finite position"));
        }
        if update.uid == self.local_uid {
            debug!(uid = %update.uid, "ignoring echo of local movement");
            return Ok(());
        }
        if self.is_tombstoned(&update.uid, now) {
            debug!(uid = %update.uid, "ignoring move for departed uid");
            return Ok(());
        }

        let room = self.world.room(update.room).map_err(room_error)?;
        let position = Vec2::new(update.x, update.y);
        let cell = cell_of(position);
        if !room.contains(cell.x, cell.y) {
            return Err(SyncError::OutOfBounds {
                room: update.room,
                x: update.x,
                y: update.y,
            });
        }

        let uid = update.uid;
        if !self.remotes.contains_key(&uid) {
            // Fresh players start Idle(down) at the reported position.
            let player = Player::at(uid.clone(), Control::Remote, update.room, position, now);
            info!(%uid, room = ?update.room, "remote player joined");
            let snapshot = player.snapshot();
            self.remotes.insert(uid.clone(), player);
            self.publish(PresenceEvent::PlayerJoined(snapshot));
            if let Some(media_id) = self.identities.resolve_pending(&uid) {
                self.publish(PresenceEvent::MediaIdentityBound { uid, media_id });
            }
            return Ok(());
        }
        let Some(player) = self.remotes.get_mut(&uid) else {
            return Ok(());
        };

        let outcome =
            player.apply_remote(update.room, position, update.direction, update.movement, now);
        let snapshot = player.snapshot();
        match outcome {
            RemoteOutcome::ChangedRoom { from } => {
                debug!(%uid, ?from, to = ?update.room, "remote player changed room");
                self.publish(PresenceEvent::RoomChanged {
                    from,
                    player: snapshot,
                });
            }
            RemoteOutcome::Moved => self.publish(PresenceEvent::PlayerMoved(snapshot)),
        }
        Ok(())
    }

    /// Destroys a remote player. Unknown uids are a no-op.
    pub fn on_remote_leave(&mut self, uid: &Uid, now: Instant) {
        if self.remove_remote(uid, LeaveReason::Left, now) {
            info!(%uid, "remote player left");
            self.publish(PresenceEvent::PlayerLeft {
                uid: uid.clone(),
                reason: LeaveReason::Left,
            });
        } else {
            debug!(%uid, "leave for unknown uid, ignoring");
        }
    }

    /// Resolves a room name and republishes the join for chat/video UI.
    pub fn on_room_joined(
        &mut self,
        uid: Uid,
        name: String,
        channel_id: String,
    ) -> Result<(), SyncError> {
        let room = self.world.room_by_name(&name).map_err(room_error)?.id();
        debug!(%uid, %name, %channel_id, "room joined");
        self.publish(PresenceEvent::RoomJoined {
            uid,
            room,
            name,
            channel_id,
        });
        Ok(())
    }

    /// Records mic/camera flags and fetches a skin when the camera is off.
    pub fn on_media_capabilities(&mut self, uid: Uid, capabilities: MediaCapabilities) {
        if uid == self.local_uid {
            return;
        }
        if self.capabilities.insert(uid.clone(), capabilities) == Some(capabilities) {
            return;
        }
        self.publish(PresenceEvent::MediaCapabilityChanged {
            uid: uid.clone(),
            capabilities,
        });
        if capabilities.camera {
            return;
        }
        match self.skins.lookup(&uid) {
            SkinLookup::Known(skin) => self.publish(PresenceEvent::SkinResolved { uid, skin }),
            SkinLookup::Query(msg) => self.transport.send(msg),
            SkinLookup::Waiting => {}
        }
    }

    /// Correlates a media-transport id with a known remote uid.
    pub fn on_media_user_published(&mut self, media_id: MediaId) {
        if let Some(uid) = self
            .identities
            .announce(media_id.clone(), self.remotes.keys())
        {
            debug!(%uid, %media_id, "media identity bound");
            self.publish(PresenceEvent::MediaIdentityBound { uid, media_id });
        }
    }

    /// Answers a skin query about the local player.
    pub fn on_skin_query(&mut self, requester: &Uid, uid: &Uid) {
        match self.skins.answer(uid) {
            Some(msg) => self.transport.send(msg),
            None => debug!(%requester, %uid, "skin query not about us"),
        }
    }

    /// Caches a skin response and tells the video UI.
    pub fn on_skin_response(&mut self, uid: Uid, skin: String) {
        if self.skins.record(uid.clone(), skin.clone()) {
            self.publish(PresenceEvent::SkinResolved { uid, skin });
        }
    }

    // -- Housekeeping ---------------------------------------------------------

    /// Advances remote walk cycles, publishing players whose frame changed.
    pub fn animate(&mut self, dt: f32) {
        let mut changed = Vec::new();
        for player in self.remotes.values_mut() {
            if player.animate(dt, &self.tuning) > 0 {
                changed.push(player.snapshot());
            }
        }
        for snapshot in changed {
            self.publish(PresenceEvent::PlayerMoved(snapshot));
        }
    }

    /// Destroys remote players silent for longer than the liveness window.
    ///
    /// Returns the evicted uids.
    pub fn evict_stale(&mut self, now: Instant) -> Vec<Uid> {
        let liveness = self.liveness;
        let mut stale: Vec<Uid> = self
            .remotes
            .values()
            .filter(|p| now.saturating_duration_since(p.last_update()) > liveness)
            .map(|p| p.uid().clone())
            .collect();
        stale.sort();

        for uid in &stale {
            self.remove_remote(uid, LeaveReason::Timeout, now);
            warn!(%uid, timeout_secs = liveness.as_secs(), "evicting silent remote player");
            self.publish(PresenceEvent::PlayerLeft {
                uid: uid.clone(),
                reason: LeaveReason::Timeout,
            });
        }

        let tombstone = self.tombstone;
        self.departed
            .retain(|_, at| now.saturating_duration_since(*at) <= tombstone);
        stale
    }

    // -- Outbound -------------------------------------------------------------

    /// Records the local player's latest state for the next send slot.
    pub fn note_local(&mut self, player: &Player) {
        let state = player.state();
        self.throttle.offer(MoveUpdate {
            uid: player.uid().clone(),
            room: player.room(),
            x: player.position().x,
            y: player.position().y,
            direction: state.direction(),
            movement: state.movement(),
        });
    }

    /// Sends the pending local update if the send interval allows.
    pub fn flush_outbound(&mut self, now: Instant) -> bool {
        match self.throttle.poll(now) {
            Some(update) => {
                self.transport.send(OutboundMessage::Move(update));
                true
            }
            None => false,
        }
    }

    // -- Queries --------------------------------------------------------------

    /// The local player's uid.
    pub fn local_uid(&self) -> &Uid {
        &self.local_uid
    }

    /// A remote player by uid.
    pub fn remote(&self, uid: &Uid) -> Option<&Player> {
        self.remotes.get(uid)
    }

    /// All remote players.
    pub fn remotes(&self) -> impl Iterator<Item = &Player> {
        self.remotes.values()
    }

    /// Number of live remote players.
    pub fn remote_count(&self) -> usize {
        self.remotes.len()
    }

    /// Last known mic/camera flags for a remote user.
    pub fn capabilities(&self, uid: &Uid) -> Option<MediaCapabilities> {
        self.capabilities.get(uid).copied()
    }

    /// The uid <-> media id table.
    pub fn identities(&self) -> &MediaIdentityTable {
        &self.identities
    }

    /// Skin cache.
    pub fn skins(&self) -> &SkinDirectory {
        &self.skins
    }

    // -- Internals ------------------------------------------------------------

    fn is_tombstoned(&self, uid: &Uid, now: Instant) -> bool {
        self.departed
            .get(uid)
            .is_some_and(|at| now.saturating_duration_since(*at) <= self.tombstone)
    }

    /// Only explicit leaves are tombstoned; a timed-out uid comes back on its
    /// next move.
    fn remove_remote(&mut self, uid: &Uid, reason: LeaveReason, now: Instant) -> bool {
        if self.remotes.remove(uid).is_none() {
            return false;
        }
        if reason == LeaveReason::Left {
            self.departed.insert(uid.clone(), now);
        }
        self.capabilities.remove(uid);
        self.identities.forget(uid);
        self.skins.forget(uid);
        true
    }

    fn publish(&self, event: PresenceEvent) {
        if let Err(err) = self.bus.publish(event) {
            debug!(%err, "presence event not delivered");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
