//! Connection establishment and teardown.
//!
//! Both exchanges are fixed, short control-packet dialogues with no retry:
//!
//! ```text
//!  sender                       receiver
//!    │ ──────── SYN ──────────▶ │
//!    │ ◀─────── SYN|ACK ─────── │
//!    │ ──────── ACK ──────────▶ │      established
//!    ⋮          data            ⋮
//!    │ ──────── FIN ──────────▶ │
//!    │ ◀─────── FIN|ACK ─────── │      closed
//! ```
//!
//! A reply missing any required flag bit aborts the session.  The functions
//! here advance the caller's [`ConnectionState`] as each step completes.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::packet::{flags, Packet};
use crate::socket::{Socket, SocketError};
use crate::state::ConnectionState;

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum ConnError {
    #[error(transparent)]
    Socket(#[from] SocketError),
    /// Reading the source file or writing the output artifact failed.
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("handshake failed: expected {expected}, got flags {got}")]
    HandshakeFailed { expected: &'static str, got: u16 },
    #[error("teardown failed: expected FIN|ACK, got flags {0}")]
    TeardownFailed(u16),
    #[error("no reply to {0} within the packet timeout")]
    Timeout(&'static str),
    #[error("sequence space exhausted after {0} packets")]
    SequenceExhausted(u16),
    #[error("operation not valid in state {0}")]
    BadState(ConnectionState),
}

/// Active open: SYN, wait for SYN|ACK, then ACK.
///
/// The reply wait is bounded by `limit`; a lost SYN or SYN|ACK ends the run.
/// Datagrams from any address other than `peer` are ignored.
pub async fn connect(
    socket: &Socket,
    peer: SocketAddr,
    limit: Duration,
    state: &mut ConnectionState,
) -> Result<(), ConnError> {
    if *state != ConnectionState::Closed {
        return Err(ConnError::BadState(*state));
    }

    socket.send_to(&Packet::control(flags::SYN), peer).await?;
    *state = ConnectionState::SynSent;
    log::info!("SYN packet is sent");

    let deadline = Instant::now() + limit;
    let reply = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let Some((reply, addr)) = socket.recv_timeout(remaining).await? else {
            *state = ConnectionState::Closed;
            return Err(ConnError::Timeout("SYN"));
        };
        if addr == peer {
            break reply;
        }
        log::debug!("ignoring datagram from {addr} during handshake");
    };
    if !flags::has_all(reply.header.flags, flags::SYN_ACK) {
        *state = ConnectionState::Closed;
        return Err(ConnError::HandshakeFailed {
            expected: "SYN|ACK",
            got: reply.header.flags,
        });
    }
    log::info!("SYN-ACK packet is received");

    socket.send_to(&Packet::control(flags::ACK), peer).await?;
    *state = ConnectionState::Established;
    log::info!("ACK packet is sent");
    log::info!("Connection established");
    Ok(())
}

/// Passive open: wait for SYN, reply SYN|ACK, wait for ACK.
///
/// Blocks until a peer shows up.  Returns the peer's address.  Once the SYN
/// has fixed the peer, the final ACK is only taken from that address.
pub async fn accept(
    socket: &Socket,
    state: &mut ConnectionState,
) -> Result<SocketAddr, ConnError> {
    if *state != ConnectionState::Closed {
        return Err(ConnError::BadState(*state));
    }

    let (syn, peer) = socket.recv_from().await?;
    if syn.header.flags & flags::SYN == 0 {
        return Err(ConnError::HandshakeFailed {
            expected: "SYN",
            got: syn.header.flags,
        });
    }
    log::info!("SYN packet is received");

    socket.send_to(&Packet::control(flags::SYN_ACK), peer).await?;
    *state = ConnectionState::SynReceived;
    log::info!("SYN-ACK packet is sent");

    let ack = loop {
        let (ack, addr) = socket.recv_from().await?;
        if addr == peer {
            break ack;
        }
        log::debug!("ignoring datagram from {addr} during handshake");
    };
    if ack.header.flags & flags::ACK == 0 {
        *state = ConnectionState::Closed;
        return Err(ConnError::HandshakeFailed {
            expected: "ACK",
            got: ack.header.flags,
        });
    }
    *state = ConnectionState::Established;
    log::info!("ACK packet is received");
    log::info!("Connection established with {peer}");
    Ok(peer)
}

/// Sender teardown: FIN, then wait for FIN|ACK.
///
/// Late acknowledgments for data packets may still be in flight from an
/// earlier whole-window resend; those are skipped.  Anything else that is not
/// FIN|ACK fails the teardown.
pub async fn close(
    socket: &Socket,
    peer: SocketAddr,
    state: &mut ConnectionState,
) -> Result<(), ConnError> {
    if !state.is_established() {
        return Err(ConnError::BadState(*state));
    }

    socket.send_to(&Packet::control(flags::FIN), peer).await?;
    *state = ConnectionState::FinSent;
    log::info!("FIN packet is sent");

    loop {
        let (reply, addr) = socket.recv_from().await?;
        if addr != peer {
            log::debug!("ignoring datagram from {addr} during teardown");
            continue;
        }
        let f = reply.header.flags;
        if f == flags::ACK && reply.header.ack != 0 {
            log::debug!("late ack for packet {} ignored", reply.header.ack);
            continue;
        }
        if !flags::has_all(f, flags::FIN_ACK) {
            return Err(ConnError::TeardownFailed(f));
        }
        break;
    }

    *state = ConnectionState::Closed;
    log::info!("FIN-ACK packet is received");
    log::info!("Connection closed");
    Ok(())
}

/// Receiver side of teardown: answer a received FIN with FIN|ACK.
pub async fn acknowledge_close(
    socket: &Socket,
    peer: SocketAddr,
    state: &mut ConnectionState,
) -> Result<(), ConnError> {
    *state = ConnectionState::FinReceived;
    socket.send_to(&Packet::control(flags::FIN_ACK), peer).await?;
    *state = ConnectionState::Closed;
    log::info!("FIN-ACK packet is sent");
    Ok(())
}
