//! Sliding-window send-side state.
//!
//! [`GbnSender`] tracks up to `window_size` in-flight data packets keyed by
//! sequence number, plus the set of sequence numbers already acknowledged.
//!
//! # Protocol contract
//!
//! - Sequence numbers start at 1 and increase by one per data packet.  The
//!   16-bit space does not wrap; running out is reported to the caller.
//! - Acknowledgments are **per packet**, not cumulative: an ACK for `k`
//!   removes exactly entry `k` from the window.
//! - An ACK for a sequence number already acknowledged is a duplicate and
//!   changes nothing.
//! - On timeout the caller resends **every** in-flight packet, not only the
//!   oldest one.
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::packet::Packet;
use crate::timer::{ResendPolicy, TimerConfig};

/// A single in-flight packet occupying one slot in the window.
#[derive(Debug, Clone)]
pub struct WindowEntry {
    /// The framed datagram, ready to hand to the socket.
    pub bytes: Vec<u8>,
    /// Total number of times this packet has been transmitted.
    pub tx_count: u32,
    /// Time of the first transmission, or of the latest one under
    /// [`ResendPolicy::ResetTimestamps`].
    pub sent_at: Instant,
}

/// What an inbound acknowledgment did to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// First acknowledgment for this sequence; its entry left the window.
    Acknowledged,
    /// Already acknowledged earlier; ignored.
    Duplicate,
    /// Names a sequence number that was never sent; ignored.
    Unknown,
}

/// Send-side window state for one transfer.
#[derive(Debug)]
pub struct GbnSender {
    /// Sequence number the next new data packet will carry.
    next_seq: u32,

    /// Sequence following the most recently acknowledged one.
    ///
    /// Reported in diagnostics only; admission depends on occupancy alone.
    pub earliest_unacked: u16,

    /// Maximum number of packets that may be in flight simultaneously (W).
    window_size: usize,

    window: BTreeMap<u16, WindowEntry>,
    acknowledged: BTreeSet<u16>,

    /// Highest `tx_count` any packet has reached.
    max_tx_count: u32,
}

impl GbnSender {
    /// Create a new [`GbnSender`] with window size W (≥ 1).
    pub fn new(window_size: usize) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        Self {
            next_seq: 1,
            earliest_unacked: 1,
            window_size,
            window: BTreeMap::new(),
            acknowledged: BTreeSet::new(),
            max_tx_count: 0,
        }
    }

    /// `true` when there is room for at least one more in-flight packet.
    pub fn can_send(&self) -> bool {
        self.window.len() < self.window_size
    }

    /// Number of packets currently awaiting acknowledgment.
    pub fn in_flight(&self) -> usize {
        self.window.len()
    }

    /// `true` when at least one packet is awaiting acknowledgment.
    pub fn has_unacked(&self) -> bool {
        !self.window.is_empty()
    }

    /// Number of distinct data packets created so far.
    pub fn packets_sent(&self) -> u16 {
        (self.next_seq - 1) as u16
    }

    /// Number of distinct sequence numbers acknowledged so far.
    pub fn acknowledged_count(&self) -> usize {
        self.acknowledged.len()
    }

    pub fn is_acknowledged(&self, seq: u16) -> bool {
        self.acknowledged.contains(&seq)
    }

    /// Most transmissions any single packet needed: `1` for a loss-free
    /// run, `0` before anything was sent.
    pub fn max_transmissions(&self) -> u32 {
        self.max_tx_count
    }

    /// Sequence numbers currently in the window, oldest first.
    pub fn in_flight_sequences(&self) -> Vec<u16> {
        self.window.keys().copied().collect()
    }

    /// Frame `chunk` as the next data packet and place it in the window.
    ///
    /// Returns the assigned sequence number and the framed bytes to send, or
    /// `None` when the 16-bit sequence space is used up.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if the window is already full.  Check
    /// [`can_send`](Self::can_send) first.
    pub fn record_sent(&mut self, chunk: &[u8], now: Instant) -> Option<(u16, Vec<u8>)> {
        debug_assert!(
            self.can_send(),
            "record_sent called on a full window ({} / {})",
            self.window.len(),
            self.window_size
        );
        let seq = u16::try_from(self.next_seq).ok()?;
        let bytes = Packet::data(seq, chunk).encode();
        self.window.insert(
            seq,
            WindowEntry {
                bytes: bytes.clone(),
                tx_count: 1,
                sent_at: now,
            },
        );
        self.next_seq += 1;
        self.max_tx_count = self.max_tx_count.max(1);
        Some((seq, bytes))
    }

    /// Process the acknowledgment for data packet `seq`.
    pub fn on_ack(&mut self, seq: u16) -> AckOutcome {
        if seq == 0 || u32::from(seq) >= self.next_seq {
            return AckOutcome::Unknown;
        }
        if !self.acknowledged.insert(seq) {
            return AckOutcome::Duplicate;
        }
        self.window.remove(&seq);
        self.earliest_unacked = seq.saturating_add(1);
        AckOutcome::Acknowledged
    }

    /// Iterate over all in-flight packets from oldest to newest.
    ///
    /// Used to resend the entire window on timeout.
    pub fn window_entries(&self) -> impl Iterator<Item = (u16, &WindowEntry)> {
        self.window.iter().map(|(&seq, entry)| (seq, entry))
    }

    /// `true` when any in-flight packet is older than the packet timeout.
    pub fn any_stale(&self, timer: &TimerConfig, now: Instant) -> bool {
        self.window
            .values()
            .any(|entry| timer.is_stale(entry.sent_at, now))
    }

    /// Bookkeeping after the whole window was resent at `now`.
    pub fn on_retransmit(&mut self, policy: ResendPolicy, now: Instant) {
        for entry in self.window.values_mut() {
            entry.tx_count += 1;
            self.max_tx_count = self.max_tx_count.max(entry.tx_count);
            if policy == ResendPolicy::ResetTimestamps {
                entry.sent_at = now;
            }
        }
    }
}
