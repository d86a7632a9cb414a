//! Seams to the external network and media transports.

use std::cell::RefCell;
use std::rc::Rc;

use crate::identity::MediaId;
use crate::messages::OutboundMessage;

/// Failure reported by the media transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    /// The transport refused the request.
    #[error("media transport rejected request: {0}")]
    Rejected(String),
}

/// Fire-and-forget sink for presence messages.
pub trait PresenceTransport {
    /// Queues a message for delivery.
    fn send(&mut self, msg: OutboundMessage);
}

/// Join/leave-by-identifier operations on the audio/video transport.
///
/// Calls return as soon as the request is accepted or refused; completion is
/// reported later by the transport itself.
pub trait MediaTransport {
    /// Starts receiving the remote user's tracks.
    fn join(&mut self, media_id: &MediaId) -> Result<(), MediaError>;

    /// Stops receiving the remote user's tracks.
    fn leave(&mut self, media_id: &MediaId) -> Result<(), MediaError>;
}

impl<T: PresenceTransport + ?Sized> PresenceTransport for Box<T> {
    fn send(&mut self, msg: OutboundMessage) {
        (**self).send(msg);
    }
}

impl<T: MediaTransport + ?Sized> MediaTransport for Box<T> {
    fn join(&mut self, media_id: &MediaId) -> Result<(), MediaError> {
        (**self).join(media_id)
    }

    fn leave(&mut self, media_id: &MediaId) -> Result<(), MediaError> {
        (**self).leave(media_id)
    }
}

impl<T: PresenceTransport + ?Sized> PresenceTransport for Rc<RefCell<T>> {
    fn send(&mut self, msg: OutboundMessage) {
        self.borrow_mut().send(msg);
    }
}

impl<T: MediaTransport + ?Sized> MediaTransport for Rc<RefCell<T>> {
    fn join(&mut self, media_id: &MediaId) -> Result<(), MediaError> {
        self.borrow_mut().join(media_id)
    }

    fn leave(&mut self, media_id: &MediaId) -> Result<(), MediaError> {
        self.borrow_mut().leave(media_id)
    }
}

// ---------------------------------------------------------------------------
// Recording transports (tests and headless runs)
// ---------------------------------------------------------------------------

/// Presence transport that keeps every message it was handed.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    /// Messages in send order.
    pub sent: Vec<OutboundMessage>,
}

impl PresenceTransport for RecordingTransport {
    fn send(&mut self, msg: OutboundMessage) {
        self.sent.push(msg);
    }
}

/// Call made on a [`RecordingMedia`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaCall {
    /// `join(id)`.
    Join(MediaId),
    /// `leave(id)`.
    Leave(MediaId),
}

/// Media transport that records calls and fails the next `fail_next` of them.
#[derive(Debug, Default)]
pub struct RecordingMedia {
    /// Every call, including failed ones.
    pub calls: Vec<MediaCall>,
    /// Number of upcoming calls to refuse.
    pub fail_next: u32,
}

impl RecordingMedia {
    fn record(&mut self, call: MediaCall) -> Result<(), MediaError> {
        let id = match &call {
            MediaCall::Join(id) | MediaCall::Leave(id) => id.clone(),
        };
        self.calls.push(call);
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(MediaError::Rejected(format!("refused {id}")));
        }
        Ok(())
    }
}

impl MediaTransport for RecordingMedia {
    fn join(&mut self, media_id: &MediaId) -> Result<(), MediaError> {
        self.record(MediaCall::Join(media_id.clone()))
    }

    fn leave(&mut self, media_id: &MediaId) -> Result<(), MediaError> {
        self.record(MediaCall::Leave(media_id.clone()))
    }
}
