//! Keep-alive pacing.

use std::time::Duration;
use tokio::time::Instant;

/// Decides when the next keep-alive ping is due.
///
/// However often [`KeepAlive::due`] is polled, it reports due at most once
/// per `interval`.
#[derive(Debug, Clone)]
pub struct KeepAlive {
    interval: Duration,
    last_ping: Option<Instant>,
}

impl KeepAlive {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_ping: None,
        }
    }

    /// Returns true (and records the ping) if a ping is due at `now`.
    pub fn due(&mut self, now: Instant) -> bool {
        let due = match self.last_ping {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            self.last_ping = Some(now);
        }
        due
    }

    /// Forget the last ping, e.g. after reconnecting.
    pub fn reset(&mut self) {
        self.last_ping = None;
    }
}
