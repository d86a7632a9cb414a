//! Presence wire messages.
//!
//! Every frame is a protocol version byte followed by a [`postcard`]-encoded
//! [`InboundMessage`] or [`OutboundMessage`].

use plaza_world::RoomId;
use serde::{Deserialize, Serialize};

use crate::identity::{MediaId, Uid};
use crate::player::{Direction, MovementState};

/// Current wire-protocol version. Prepended to every frame.
pub const PROTOCOL_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A player's position and movement state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoveUpdate {
    /// Player that moved.
    pub uid: Uid,
    /// Room the player is in.
    pub room: RoomId,
    /// X position in cell units.
    pub x: f32,
    /// Y position in cell units.
    pub y: f32,
    /// Facing direction.
    pub direction: Direction,
    /// Idle or walking.
    pub movement: MovementState,
}

/// Messages the transport delivers to the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum InboundMessage {
    // --- Presence ---
    /// A remote player moved or announced itself.
    Move(MoveUpdate),
    /// A remote player left the realm.
    Leave {
        /// Departing player.
        uid: Uid,
    },
    /// A player joined a room's chat/video channel.
    RoomJoined {
        /// Joining player.
        uid: Uid,
        /// Room name as known to the realm template.
        name: String,
        /// Transport channel for the room.
        channel_id: String,
    },

    // --- Media ---
    /// A remote user toggled mic or camera.
    MediaCapabilities {
        /// Player whose capabilities changed.
        uid: Uid,
        /// Microphone enabled.
        mic: bool,
        /// Camera enabled.
        camera: bool,
    },
    /// The media transport announced a remote user.
    MediaUserPublished {
        /// Transport-side identifier.
        media_id: MediaId,
    },

    // --- Skins ---
    /// Someone asks which skin `uid` uses.
    SkinQuery {
        /// Player asking.
        requester: Uid,
        /// Player whose skin is wanted.
        uid: Uid,
    },
    /// Answer to a [`InboundMessage::SkinQuery`].
    SkinResponse {
        /// Player the answer is about.
        uid: Uid,
        /// Skin identifier.
        skin: String,
    },
}

/// Messages the engine hands to the transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OutboundMessage {
    /// The local player's latest position (rate-limited).
    Move(MoveUpdate),
    /// Ask the realm which skin `uid` uses.
    SkinQuery {
        /// The local player.
        requester: Uid,
        /// Player whose skin is wanted.
        uid: Uid,
    },
    /// Answer a skin query about the local player.
    SkinResponse {
        /// The local player.
        uid: Uid,
        /// Local skin identifier.
        skin: String,
    },
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The frame was empty (no version byte).
    #[error("empty payload, no version byte")]
    EmptyPayload,

    /// The version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard (de)serialization failed.
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, MessageError> {
    let body = postcard::to_allocvec(msg)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

fn decode<'a, T: Deserialize<'a>>(data: &'a [u8]) -> Result<T, MessageError> {
    let (&version, body) = data.split_first().ok_or(MessageError::EmptyPayload)?;
    if version != PROTOCOL_VERSION {
        return Err(MessageError::UnsupportedVersion(version));
    }
    Ok(postcard::from_bytes(body)?)
}

/// Encodes an inbound message. Used by transports and tests to build frames.
///
/// Wire format: `[version: u8] [postcard-encoded InboundMessage]`
pub fn encode_inbound(msg: &InboundMessage) -> Result<Vec<u8>, MessageError> {
    encode(msg)
}

/// Decodes a frame received from the transport.
pub fn decode_inbound(data: &[u8]) -> Result<InboundMessage, MessageError> {
    decode(data)
}

/// Encodes a message for the transport.
pub fn encode_outbound(msg: &OutboundMessage) -> Result<Vec<u8>, MessageError> {
    encode(msg)
}

/// Decodes an outbound frame, as a peer would.
pub fn decode_outbound(data: &[u8]) -> Result<OutboundMessage, MessageError> {
    decode(data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_move() -> MoveUpdate {
        MoveUpdate {
            uid: Uid::new("a1b2c3d4e5"),
            room: RoomId(1),
            x: 10.5,
            y: 2.0,
            direction: Direction::Left,
            movement: MovementState::Walking,
        }
    }

    #[test]
    fn test_inbound_frame_starts_with_version() {
        let msg = InboundMessage::Move(sample_move());
        let bytes = encode_inbound(&msg).unwrap();
        assert_eq!(bytes[0], PROTOCOL_VERSION);
        assert_eq!(decode_inbound(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_outbound_skin_response() {
        let msg = OutboundMessage::SkinResponse {
            uid: Uid::new("me"),
            skin: "009".to_string(),
        };
        let bytes = encode_outbound(&msg).unwrap();
        assert_eq!(decode_outbound(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_rejects_empty_frame() {
        assert!(matches!(
            decode_inbound(&[]),
            Err(MessageError::EmptyPayload)
        ));
    }

    #[test]
    fn test_rejects_wrong_version() {
        let mut bytes = encode_inbound(&InboundMessage::Leave {
            uid: Uid::new("x"),
        })
        .unwrap();
        bytes[0] = 9;
        assert!(matches!(
            decode_inbound(&bytes),
            Err(MessageError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_rejects_garbage_body() {
        assert!(matches!(
            decode_inbound(&[PROTOCOL_VERSION, 0xFF, 0xFF, 0xFF]),
            Err(MessageError::Postcard(_))
        ));
    }
}
