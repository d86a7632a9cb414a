//! Rate limiting for outbound local movement.
//!
//! Animation ticks can run much faster than the network should be fed. The
//! throttle keeps only the most recent local update and releases it at most
//! once per send interval. A player who stands still re-sends their last
//! update every keepalive interval so peers keep them alive.

use std::time::{Duration, Instant};

use crate::messages::MoveUpdate;

// ---------------------------------------------------------------------------
// SendThrottle
// ---------------------------------------------------------------------------

/// Latest-value send throttle.
#[derive(Debug, Clone)]
pub struct SendThrottle {
    /// Minimum time between two sends.
    pub min_interval: Duration,
    /// Silence after which the last update is sent again.
    pub keepalive: Option<Duration>,
    pending: Option<MoveUpdate>,
    last_sent: Option<MoveUpdate>,
    last_sent_at: Option<Instant>,
}

impl SendThrottle {
    /// Creates a throttle releasing at most `rate_hz` updates per second.
    pub fn from_rate(rate_hz: u32) -> Self {
        Self::new(Duration::from_secs(1) / rate_hz.max(1))
    }

    /// Creates a throttle with an explicit interval.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            keepalive: None,
            pending: None,
            last_sent: None,
            last_sent_at: None,
        }
    }

    /// Re-sends the last update after `keepalive` of silence.
    pub fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = Some(keepalive.max(self.min_interval));
        self
    }

    /// Records the latest local state, replacing any unsent one.
    ///
    /// An update identical to the last one sent is dropped.
    pub fn offer(&mut self, update: MoveUpdate) {
        if self.last_sent.as_ref() == Some(&update) {
            self.pending = None;
            return;
        }
        self.pending = Some(update);
    }

    /// Returns the pending update if the send interval has elapsed, or the
    /// last sent update once the keepalive interval has.
    pub fn poll(&mut self, now: Instant) -> Option<MoveUpdate> {
        let since = self
            .last_sent_at
            .map(|at| now.saturating_duration_since(at));
        if since.is_some_and(|since| since < self.min_interval) {
            return None;
        }
        let update = match self.pending.take() {
            Some(update) => update,
            None => {
                let keepalive = self.keepalive?;
                if since? < keepalive {
                    return None;
                }
                self.last_sent.clone()?
            }
        };
        self.last_sent = Some(update.clone());
        self.last_sent_at = Some(now);
        Some(update)
    }

    /// Returns `true` if an update is waiting for the next interval.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
