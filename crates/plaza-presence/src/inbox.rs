//! Queue between network threads and the engine's single thread.
//!
//! Transport callbacks may fire on any thread. They push raw frames into an
//! [`InboxSender`]; the engine drains the [`TransportInbox`] on its own
//! thread, so every message touches presence state in arrival order.

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use tracing::warn;

use crate::messages::{InboundMessage, decode_inbound};

/// Cloneable, `Send` handle for pushing raw frames.
#[derive(Debug, Clone)]
pub struct InboxSender {
    tx: Sender<Vec<u8>>,
}

impl InboxSender {
    /// Queues a frame. Returns `false` if the inbox was dropped.
    pub fn push(&self, frame: Vec<u8>) -> bool {
        self.tx.send(frame).is_ok()
    }
}

/// Receiving side, owned by the engine.
#[derive(Debug)]
pub struct TransportInbox {
    rx: Receiver<Vec<u8>>,
}

/// Creates a connected sender/inbox pair.
pub fn inbox() -> (InboxSender, TransportInbox) {
    let (tx, rx) = unbounded();
    (InboxSender { tx }, TransportInbox { rx })
}

impl TransportInbox {
    /// Decodes every queued frame without blocking.
    ///
    /// Malformed frames are logged and dropped.
    pub fn drain(&self) -> Vec<InboundMessage> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(frame) => match decode_inbound(&frame) {
                    Ok(msg) => out.push(msg),
                    Err(err) => warn!(%err, len = frame.len(), "dropping malformed frame"),
                },
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        out
    }

    /// Number of frames waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns `true` if no frames are waiting.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
