//! Go-Back-N-style receive-side state.
//!
//! [`GbnReceiver`] decides what happens to each inbound data packet:
//!
//! - seq == expected: **accepted**, its payload goes to the output and the
//!   expected sequence advances by exactly one.
//! - seq <  expected: **duplicate** of something already written; the caller
//!   re-acknowledges it so a sender whose ACK was lost can make progress.
//! - seq >  expected: **future** packet; discarded without an ACK.  Nothing
//!   is buffered ahead, so a gap is only closed by the sender resending.
//!
//! Accepted payloads are handed straight back to the caller to write, so
//! there is never more than one payload pending.  All socket and file I/O is
//! the caller's responsibility.

use std::time::{Duration, Instant};

/// Classification of one inbound data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Duplicate,
    Future,
}

/// Receive-side state for one session.
#[derive(Debug)]
pub struct GbnReceiver {
    /// Next sequence number that will be accepted.  Never decreases.
    expected_seq: u32,
    bytes_accepted: u64,
    duplicates: u64,
    out_of_order: u64,
    first_accept: Option<Instant>,
}

impl Default for GbnReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl GbnReceiver {
    pub fn new() -> Self {
        Self {
            expected_seq: 1,
            bytes_accepted: 0,
            duplicates: 0,
            out_of_order: 0,
            first_accept: None,
        }
    }

    /// Classify data packet `seq` carrying `payload_len` bytes, received at `now`.
    ///
    /// On [`Verdict::Accept`] the caller must write the payload before
    /// handling the next packet.
    pub fn on_segment(&mut self, seq: u16, payload_len: usize, now: Instant) -> Verdict {
        let seq = u32::from(seq);
        if seq == self.expected_seq {
            self.expected_seq += 1;
            self.bytes_accepted += payload_len as u64;
            self.first_accept.get_or_insert(now);
            Verdict::Accept
        } else if seq < self.expected_seq {
            self.duplicates += 1;
            Verdict::Duplicate
        } else {
            self.out_of_order += 1;
            Verdict::Future
        }
    }

    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }

    /// Number of data packets accepted so far.
    pub fn packets_accepted(&self) -> u64 {
        u64::from(self.expected_seq - 1)
    }

    /// Payload bytes written so far, padding included.
    pub fn bytes_accepted(&self) -> u64 {
        self.bytes_accepted
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    pub fn out_of_order(&self) -> u64 {
        self.out_of_order
    }

    /// Time since the first accepted packet, or zero if none was accepted.
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.first_accept
            .map_or(Duration::ZERO, |start| now.saturating_duration_since(start))
    }

    /// Session throughput in megabits per second as of `now`.
    pub fn throughput_mbps(&self, now: Instant) -> f64 {
        throughput_mbps(self.bytes_accepted, self.elapsed(now))
    }
}

/// `(bytes × 8) / (seconds × 1 000 000)`; zero when no time has elapsed.
pub fn throughput_mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / (secs * 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLOT: usize = 994;

    #[test]
    fn initial_state() {
        let r = GbnReceiver::new();
        assert_eq!(r.expected_seq(), 1);
        assert_eq!(r.packets_accepted(), 0);
        assert_eq!(r.bytes_accepted(), 0);
        assert_eq!(r.throughput_mbps(Instant::now()), 0.0);
    }

    #[test]
    fn in_order_packet_accepted() {
        let mut r = GbnReceiver::new();
        assert_eq!(r.on_segment(1, SLOT, Instant::now()), Verdict::Accept);
        assert_eq!(r.expected_seq(), 2);
        assert_eq!(r.bytes_accepted(), SLOT as u64);
    }

    #[test]
    fn future_packet_discarded_without_advancing() {
        let mut r = GbnReceiver::new();
        assert_eq!(r.on_segment(3, SLOT, Instant::now()), Verdict::Future);
        assert_eq!(r.expected_seq(), 1);
        assert_eq!(r.bytes_accepted(), 0);
        assert_eq!(r.out_of_order(), 1);
    }

    #[test]
    fn duplicate_packet_not_accepted_twice() {
        let mut r = GbnReceiver::new();
        let now = Instant::now();
        r.on_segment(1, SLOT, now);
        assert_eq!(r.on_segment(1, SLOT, now), Verdict::Duplicate);
        assert_eq!(r.expected_seq(), 2);
        assert_eq!(r.packets_accepted(), 1);
        assert_eq!(r.duplicates(), 1);
    }

    #[test]
    fn expected_sequence_advances_by_one_and_never_decreases() {
        let mut r = GbnReceiver::new();
        let now = Instant::now();
        let arrivals = [1, 3, 2, 2, 1, 3, 5, 4, 5];
        let mut last = r.expected_seq();
        for seq in arrivals {
            let verdict = r.on_segment(seq, SLOT, now);
            let current = r.expected_seq();
            match verdict {
                Verdict::Accept => assert_eq!(current, last + 1),
                _ => assert_eq!(current, last),
            }
            last = current;
        }
        assert_eq!(r.expected_seq(), 6);
        assert_eq!(r.packets_accepted(), 5);
    }

    #[test]
    fn elapsed_measured_from_first_acceptance() {
        let mut r = GbnReceiver::new();
        let t0 = Instant::now();
        r.on_segment(1, SLOT, t0);
        r.on_segment(2, SLOT, t0 + Duration::from_millis(300));
        assert_eq!(r.elapsed(t0 + Duration::from_secs(1)), Duration::from_secs(1));
    }

    #[test]
    fn throughput_formula() {
        // 1 000 000 bytes in 2 s = 4 Mbps
        let mbps = throughput_mbps(1_000_000, Duration::from_secs(2));
        assert!((mbps - 4.0).abs() < 1e-9);
    }

    #[test]
    fn throughput_zero_elapsed_is_zero() {
        assert_eq!(throughput_mbps(5_000, Duration::ZERO), 0.0);
    }
}
