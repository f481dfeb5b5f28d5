//! Connection finite-state machine (FSM) types.
//!
//! Both engines walk a short, strictly forward path through these states.
//! Transitions are driven in [`crate::connection`] (handshake, teardown) and
//! by the engines themselves.
//!
//! ```text
//!  sender:    CLOSED ──SYN──▶ SYN_SENT ──SYN|ACK──▶ ESTABLISHED ──FIN──▶ FIN_SENT ──FIN|ACK──▶ CLOSED
//!  receiver:  CLOSED ──SYN──▶ SYN_RECEIVED ──ACK──▶ ESTABLISHED ──FIN──▶ FIN_RECEIVED ──▶ CLOSED
//! ```

use std::fmt;

/// All possible states of a DRTP endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection exists; initial and final state.
    #[default]
    Closed,
    /// Sender: SYN sent, waiting for SYN|ACK.
    SynSent,
    /// Receiver: SYN received and SYN|ACK sent, waiting for ACK.
    SynReceived,
    /// Handshake complete; data transfer in progress.
    Established,
    /// Sender: FIN sent, waiting for FIN|ACK.
    FinSent,
    /// Receiver: FIN received, FIN|ACK being sent.
    FinReceived,
}

impl ConnectionState {
    /// `true` once the handshake has completed and before teardown starts.
    pub fn is_established(self) -> bool {
        self == Self::Established
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "CLOSED",
            Self::SynSent => "SYN_SENT",
            Self::SynReceived => "SYN_RECEIVED",
            Self::Established => "ESTABLISHED",
            Self::FinSent => "FIN_SENT",
            Self::FinReceived => "FIN_RECEIVED",
        };
        f.write_str(name)
    }
}
