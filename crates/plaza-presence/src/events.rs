//! Events carried on the presence bus.

use plaza_bus::BusEvent;
use plaza_world::RoomId;

use crate::identity::{MediaId, Uid};
use crate::player::PlayerSnapshot;
use crate::transport::MediaError;

/// Why a player left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// Explicit leave message.
    Left,
    /// No update within the liveness window.
    Timeout,
}

/// Mic/camera flags for a remote user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaCapabilities {
    /// Microphone enabled.
    pub mic: bool,
    /// Camera enabled.
    pub camera: bool,
}

/// An unordered pair of uids, stored with the smaller uid first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProximityPair {
    a: Uid,
    b: Uid,
}

impl ProximityPair {
    /// Builds the pair regardless of argument order.
    pub fn new(x: Uid, y: Uid) -> Self {
        if x <= y { Self { a: x, b: y } } else { Self { a: y, b: x } }
    }

    /// Both members, smaller first.
    pub fn members(&self) -> (&Uid, &Uid) {
        (&self.a, &self.b)
    }

    /// Returns `true` if `uid` is one of the members.
    pub fn contains(&self, uid: &Uid) -> bool {
        &self.a == uid || &self.b == uid
    }

    /// The member that is not `uid`, if `uid` is a member.
    pub fn other(&self, uid: &Uid) -> Option<&Uid> {
        if &self.a == uid {
            Some(&self.b)
        } else if &self.b == uid {
            Some(&self.a)
        } else {
            None
        }
    }
}

/// Everything that happens in the presence layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    // --- Players ---
    /// A player record was created.
    PlayerJoined(PlayerSnapshot),
    /// A player's position or animation state changed within a room.
    PlayerMoved(PlayerSnapshot),
    /// A player moved to another room (teleport or remote room change).
    RoomChanged {
        /// Room the player left.
        from: RoomId,
        /// Player state after the change.
        player: PlayerSnapshot,
    },
    /// A player record was destroyed.
    PlayerLeft {
        /// Departed player.
        uid: Uid,
        /// Explicit leave or liveness timeout.
        reason: LeaveReason,
    },
    /// A player joined a room's chat/video channel.
    RoomJoined {
        /// Joining player.
        uid: Uid,
        /// Resolved room.
        room: RoomId,
        /// Room name.
        name: String,
        /// Transport channel.
        channel_id: String,
    },

    // --- Media ---
    /// A remote user's mic/camera flags changed.
    MediaCapabilityChanged {
        /// Remote user.
        uid: Uid,
        /// New flags.
        capabilities: MediaCapabilities,
    },
    /// A media-transport id was correlated with a uid.
    MediaIdentityBound {
        /// Presence uid.
        uid: Uid,
        /// Transport id.
        media_id: MediaId,
    },
    /// A remote user's avatar skin is known.
    SkinResolved {
        /// Remote user.
        uid: Uid,
        /// Skin identifier.
        skin: String,
    },

    // --- Proximity ---
    /// Two co-located players came within range.
    ProximityJoined(ProximityPair),
    /// A pair went out of range or stopped sharing a room.
    ProximityLeft(ProximityPair),
    /// The local player now receives this remote user's media.
    PeerAttached {
        /// Remote user.
        uid: Uid,
        /// Transport id joined.
        media_id: MediaId,
    },
    /// The local player no longer receives this remote user's media.
    PeerDetached {
        /// Remote user.
        uid: Uid,
        /// Transport id left.
        media_id: MediaId,
    },
    /// The media transport kept refusing a join or leave for this pairing.
    MediaDegraded {
        /// Remote user.
        uid: Uid,
        /// Last transport error.
        error: MediaError,
    },
}

/// Routing key for [`PresenceEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PlayerJoined,
    PlayerMoved,
    RoomChanged,
    PlayerLeft,
    RoomJoined,
    MediaCapabilityChanged,
    MediaIdentityBound,
    SkinResolved,
    ProximityJoined,
    ProximityLeft,
    PeerAttached,
    PeerDetached,
    MediaDegraded,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 13] = [
        Self::PlayerJoined,
        Self::PlayerMoved,
        Self::RoomChanged,
        Self::PlayerLeft,
        Self::RoomJoined,
        Self::MediaCapabilityChanged,
        Self::MediaIdentityBound,
        Self::SkinResolved,
        Self::ProximityJoined,
        Self::ProximityLeft,
        Self::PeerAttached,
        Self::PeerDetached,
        Self::MediaDegraded,
    ];
}

impl BusEvent for PresenceEvent {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            Self::PlayerJoined(_) => EventKind::PlayerJoined,
            Self::PlayerMoved(_) => EventKind::PlayerMoved,
            Self::RoomChanged { .. } => EventKind::RoomChanged,
            Self::PlayerLeft { .. } => EventKind::PlayerLeft,
            Self::RoomJoined { .. } => EventKind::RoomJoined,
            Self::MediaCapabilityChanged { .. } => EventKind::MediaCapabilityChanged,
            Self::MediaIdentityBound { .. } => EventKind::MediaIdentityBound,
            Self::SkinResolved { .. } => EventKind::SkinResolved,
            Self::ProximityJoined(_) => EventKind::ProximityJoined,
            Self::ProximityLeft(_) => EventKind::ProximityLeft,
            Self::PeerAttached { .. } => EventKind::PeerAttached,
            Self::PeerDetached { .. } => EventKind::PeerDetached,
            Self::MediaDegraded { .. } => EventKind::MediaDegraded,
        }
    }
}

/// The presence bus.
pub type PresenceBus = plaza_bus::EventBus<PresenceEvent>;
