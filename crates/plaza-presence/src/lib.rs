//! Real-time presence: player state machines, network synchronisation, and
//! proximity-driven media sessions.
//!
//! ```text
//! transport frames -> TransportInbox -> PresenceSynchronizer --+
//! local input ------> LocalController ------------------------+-> PresenceBus
//!                                                              |
//!                         ProximityManager <-------------------+
//!                                |
//!                                +-> MediaTransport join/leave
//! ```

pub mod engine;
pub mod events;
pub mod identity;
pub mod inbox;
pub mod local;
pub mod messages;
pub mod player;
pub mod proximity;
pub mod skins;
pub mod sync;
pub mod throttle;
pub mod transport;

pub use engine::Engine;
pub use events::{
    EventKind, LeaveReason, MediaCapabilities, PresenceBus, PresenceEvent, ProximityPair,
};
pub use identity::{MEDIA_UID_PREFIX_LEN, MediaId, MediaIdentityTable, Uid};
pub use inbox::{InboxSender, TransportInbox, inbox};
pub use local::LocalController;
pub use messages::{
    InboundMessage, MessageError, MoveUpdate, OutboundMessage, PROTOCOL_VERSION, decode_inbound,
    decode_outbound, encode_inbound, encode_outbound,
};
pub use player::{
    AnimState, Control, Direction, MoveOutcome, MovementState, Player, PlayerSnapshot,
    PlayerTuning, RemoteOutcome,
};
pub use proximity::{PeerSession, ProximityManager, proximity_pairs};
pub use skins::SkinDirectory;
pub use sync::{PresenceSynchronizer, SyncError};
pub use throttle::SendThrottle;
pub use transport::{
    MediaCall, MediaError, MediaTransport, PresenceTransport, RecordingMedia, RecordingTransport,
};

#[cfg(test)]
mod scenario_tests;
