//! Transports for headless runs: they encode and log instead of sending.

use plaza_presence::{
    MediaError, MediaId, MediaTransport, OutboundMessage, PresenceTransport, encode_outbound,
};
use tracing::{info, warn};

/// Encodes every outbound message and logs its size.
#[derive(Debug, Default)]
pub struct LoggingTransport {
    /// Messages handed to the transport.
    pub messages: u32,
    /// Encoded bytes handed to the transport.
    pub bytes: usize,
}

impl PresenceTransport for LoggingTransport {
    fn send(&mut self, msg: OutboundMessage) {
        match encode_outbound(&msg) {
            Ok(frame) => {
                self.messages += 1;
                self.bytes += frame.len();
                info!(len = frame.len(), ?msg, "-> transport");
            }
            Err(err) => warn!(%err, "failed to encode outbound message"),
        }
    }
}

/// Accepts every join/leave and logs it.
#[derive(Debug, Default)]
pub struct LoggingMedia {
    /// Media ids currently joined.
    pub joined: Vec<MediaId>,
}

impl MediaTransport for LoggingMedia {
    fn join(&mut self, media_id: &MediaId) -> Result<(), MediaError> {
        info!(%media_id, "-> media join");
        self.joined.push(media_id.clone());
        Ok(())
    }

    fn leave(&mut self, media_id: &MediaId) -> Result<(), MediaError> {
        info!(%media_id, "-> media leave");
        self.joined.retain(|id| id != media_id);
        Ok(())
    }
}
