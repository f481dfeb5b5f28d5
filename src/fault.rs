//! Fault injection for loss-recovery testing.
//!
//! A [`FaultPolicy`] is handed to the receiver when it is built and is asked
//! about every inbound data packet before the packet is processed.  Dropping
//! a packet there looks to the sender exactly like loss on the wire: no
//! write, no acknowledgment.
//!
//! [`DiscardOnce`] is the policy behind the `--discard` option: it drops the
//! first delivery of one chosen sequence number and lets every later copy
//! through.

/// Decides whether an inbound data packet is silently dropped.
pub trait FaultPolicy {
    /// Called once per inbound data packet.  Returning `true` drops it.
    fn should_drop(&mut self, seq: u16) -> bool;
}

/// Pass-through policy: nothing is ever dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaults;

impl FaultPolicy for NoFaults {
    fn should_drop(&mut self, _seq: u16) -> bool {
        false
    }
}

/// Drops the first delivery of `target`, then disarms.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardOnce {
    target: Option<u16>,
}

impl DiscardOnce {
    /// `None` builds a disarmed policy, equivalent to [`NoFaults`].
    pub fn new(target: Option<u16>) -> Self {
        Self { target }
    }

    /// Sequence number still waiting to be dropped, if any.
    pub fn pending(&self) -> Option<u16> {
        self.target
    }
}

impl FaultPolicy for DiscardOnce {
    fn should_drop(&mut self, seq: u16) -> bool {
        if self.target == Some(seq) {
            self.target = None;
            true
        } else {
            false
        }
    }
}

impl<P: FaultPolicy + ?Sized> FaultPolicy for Box<P> {
    fn should_drop(&mut self, seq: u16) -> bool {
        (**self).should_drop(seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_faults_never_drops() {
        let mut p = NoFaults;
        assert!((1..=100).all(|seq| !p.should_drop(seq)));
    }

    #[test]
    fn discard_once_fires_exactly_once() {
        let mut p = DiscardOnce::new(Some(2));
        assert!(!p.should_drop(1));
        assert!(p.should_drop(2));
        assert!(!p.should_drop(2));
        assert!(!p.should_drop(3));
        assert_eq!(p.pending(), None);
    }

    #[test]
    fn discard_once_waits_for_its_target() {
        let mut p = DiscardOnce::new(Some(5));
        for seq in 1..5 {
            assert!(!p.should_drop(seq));
        }
        assert_eq!(p.pending(), Some(5));
        assert!(p.should_drop(5));
    }

    #[test]
    fn disarmed_discard_is_pass_through() {
        let mut p = DiscardOnce::new(None);
        assert!(!p.should_drop(1));
        assert_eq!(p.pending(), None);
    }

    #[test]
    fn boxed_policy_delegates() {
        let mut p: Box<dyn FaultPolicy> = Box::new(DiscardOnce::new(Some(1)));
        assert!(p.should_drop(1));
        assert!(!p.should_drop(1));
    }
}
