//! File receiver: handshake, in-order reassembly loop, teardown.
//!
//! [`ReceiverEngine`] owns the listening socket and a [`FaultPolicy`].  One
//! session is: accept a handshake, then handle datagrams until a FIN arrives.
//!
//! For every data packet, in this order:
//!
//! 1. the fault policy may drop it (no write, no ACK);
//! 2. seq == expected: write the payload, ACK it;
//! 3. seq <  expected: ACK it again, write nothing;
//! 4. seq >  expected: drop it, no ACK.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::connection::{self, ConnError};
use crate::fault::{FaultPolicy, NoFaults};
use crate::gbn_receiver::{GbnReceiver, Verdict};
use crate::packet::{flags, Packet};
use crate::socket::{Socket, SocketError};
use crate::state::ConnectionState;

/// Summary of one completed session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub peer: SocketAddr,
    pub packets_accepted: u64,
    /// Bytes written to the output, including final-chunk padding.
    pub bytes_accepted: u64,
    /// Copies of already-accepted packets that were re-acknowledged.
    pub duplicates: u64,
    /// Packets ahead of the expected sequence that were dropped.
    pub out_of_order: u64,
    /// Packets dropped by the fault policy.
    pub discarded: u64,
    /// From the first accepted packet to the FIN.
    pub elapsed: Duration,
    pub throughput_mbps: f64,
}

/// Receiving half of a DRTP session.
#[derive(Debug)]
pub struct ReceiverEngine<F = NoFaults> {
    socket: Socket,
    state: ConnectionState,
    peer: Option<SocketAddr>,
    fault: F,
}

impl ReceiverEngine<NoFaults> {
    /// Bind without fault injection.
    pub async fn bind(addr: SocketAddr) -> Result<Self, ConnError> {
        Self::with_faults(addr, NoFaults).await
    }
}

impl<F: FaultPolicy> ReceiverEngine<F> {
    /// Bind `addr`, consulting `fault` for every inbound data packet.
    pub async fn with_faults(addr: SocketAddr, fault: F) -> Result<Self, ConnError> {
        let socket = Socket::bind(addr).await?;
        log::info!(
            "Server started at {} on port {}",
            socket.local_addr.ip(),
            socket.local_addr.port()
        );
        Ok(Self {
            socket,
            state: ConnectionState::Closed,
            peer: None,
            fault,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn fault_policy(&self) -> &F {
        &self.fault
    }

    /// Wait for a sender and complete the handshake.  Returns its address.
    pub async fn accept(&mut self) -> Result<SocketAddr, ConnError> {
        let peer = connection::accept(&self.socket, &mut self.state).await?;
        self.peer = Some(peer);
        Ok(peer)
    }

    /// Handshake, then receive into `sink` until the sender tears down.
    pub async fn run_session<W>(&mut self, sink: &mut W) -> Result<SessionReport, ConnError>
    where
        W: AsyncWrite + Unpin,
    {
        self.accept().await?;
        self.receive(sink).await
    }

    /// Reassembly loop for an established session.
    ///
    /// Returns after answering the sender's FIN; the engine is then back in
    /// [`ConnectionState::Closed`] and may [`accept`](Self::accept) again.
    pub async fn receive<W>(&mut self, sink: &mut W) -> Result<SessionReport, ConnError>
    where
        W: AsyncWrite + Unpin,
    {
        let peer = match self.peer {
            Some(peer) if self.state.is_established() => peer,
            _ => return Err(ConnError::BadState(self.state)),
        };

        let mut gbn = GbnReceiver::new();
        let mut discarded = 0u64;

        loop {
            let (pkt, addr) = match self.socket.recv_from().await {
                Ok(received) => received,
                Err(SocketError::Packet(e)) => {
                    log::warn!("skipping malformed datagram: {e}");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if addr != peer {
                log::debug!("ignoring datagram from {addr}");
                continue;
            }

            if pkt.header.flags & flags::FIN != 0 {
                log::info!("FIN packet is received");
                connection::acknowledge_close(&self.socket, peer, &mut self.state).await?;
                self.peer = None;
                sink.flush().await?;

                let now = Instant::now();
                return Ok(SessionReport {
                    peer,
                    packets_accepted: gbn.packets_accepted(),
                    bytes_accepted: gbn.bytes_accepted(),
                    duplicates: gbn.duplicates(),
                    out_of_order: gbn.out_of_order(),
                    discarded,
                    elapsed: gbn.elapsed(now),
                    throughput_mbps: gbn.throughput_mbps(now),
                });
            }

            if !pkt.is_data() {
                log::debug!("ignoring control packet flags={}", pkt.header.flags);
                continue;
            }

            let seq = pkt.header.seq;
            if self.fault.should_drop(seq) {
                discarded += 1;
                log::info!("Discarding {seq}");
                continue;
            }

            match gbn.on_segment(seq, pkt.payload.len(), Instant::now()) {
                Verdict::Accept => {
                    sink.write_all(&pkt.payload).await?;
                    sink.flush().await?;
                    log::info!("packet {seq} is received");
                    self.socket.send_to(&Packet::ack(seq), peer).await?;
                    log::info!("sending ack for the received {seq}");
                }
                Verdict::Duplicate => {
                    self.socket.send_to(&Packet::ack(seq), peer).await?;
                    log::debug!("duplicate packet {seq}, ack resent");
                }
                Verdict::Future => {
                    log::debug!(
                        "out-of-order packet {seq} dropped, expecting {}",
                        gbn.expected_seq()
                    );
                }
            }
        }
    }

    /// Release the socket.
    pub fn close(self) {
        log::info!("Connection closes");
    }
}
