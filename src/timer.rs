//! Retransmission timing.
//!
//! DRTP uses a single fixed timeout (no RTT estimation, no back-off).  It
//! bounds the sender's wait for each acknowledgment and is also the age at
//! which an in-flight packet counts as stale, triggering a resend of the
//! whole window.
//!
//! What happens to the recorded send times on such a resend is a policy
//! choice, see [`ResendPolicy`].

use std::time::{Duration, Instant};

/// Fixed packet timeout used by both the ack wait and the staleness sweep.
pub const PACKET_TIMEOUT: Duration = Duration::from_millis(500);

/// How a whole-window resend treats each entry's recorded send time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResendPolicy {
    /// Leave send times untouched.  Once any entry is stale, every following
    /// sweep resends the window again until acknowledgments drain it.
    #[default]
    KeepTimestamps,
    /// Restamp every resent entry, so the next resend waits a full timeout
    /// (conventional Go-Back-N timer restart).
    ResetTimestamps,
}

/// Adjustable timing parameters for the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// Ack wait bound and staleness threshold.
    pub packet_timeout: Duration,
    pub resend_policy: ResendPolicy,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            packet_timeout: PACKET_TIMEOUT,
            resend_policy: ResendPolicy::default(),
        }
    }
}

impl TimerConfig {
    /// `true` when a packet sent at `sent_at` has been in flight strictly
    /// longer than the packet timeout as of `now`.
    pub fn is_stale(&self, sent_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(sent_at) > self.packet_timeout
    }
}
