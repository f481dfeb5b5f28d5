//! File sender: handshake, sliding-window transmit loop, teardown.
//!
//! [`SenderEngine`] runs as one sequential task.  The only suspension point
//! besides sends is the bounded wait for a single acknowledgment per round:
//!
//! ```text
//!  loop {
//!      fill     ─ read 994-byte chunks and send until W packets are in flight
//!      await    ─ one ACK, or resend the whole window after the timeout
//!      sweep    ─ resend the whole window if any packet is older than the timeout
//!  } until the source is exhausted and the window is empty
//! ```

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::SenderConfig;
use crate::connection::{self, ConnError};
use crate::gbn_sender::{AckOutcome, GbnSender};
use crate::packet::{flags, PAYLOAD_LEN};
use crate::socket::{Socket, SocketError};
use crate::state::ConnectionState;

/// Summary of one completed transfer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferReport {
    /// Distinct data packets sent (sequences `1..=packets`).
    pub packets: u16,
    /// Bytes read from the source, padding excluded.
    pub bytes_read: u64,
    /// Individual packet retransmissions.
    pub retransmissions: u64,
    /// Rounds whose acknowledgment wait timed out.
    pub timeouts: u64,
    /// Most times any single packet went on the wire (`1` without loss).
    pub max_transmissions: u32,
    /// From the first data packet to the last acknowledgment; zero when
    /// nothing was sent.
    pub elapsed: Duration,
}

/// Sending half of a DRTP session.
#[derive(Debug)]
pub struct SenderEngine {
    socket: Socket,
    peer: SocketAddr,
    config: SenderConfig,
    state: ConnectionState,
    window: GbnSender,
}

impl SenderEngine {
    /// Bind the local socket.  No packets are sent yet.
    pub async fn bind(config: SenderConfig) -> Result<Self, ConnError> {
        let socket = Socket::bind(config.bind).await?;
        Ok(Self {
            socket,
            peer: config.peer,
            window: GbnSender::new(config.window_size),
            config,
            state: ConnectionState::Closed,
        })
    }

    /// Bind, connect, send everything from `source`, and tear down.
    pub async fn transfer<R>(config: SenderConfig, source: R) -> Result<TransferReport, ConnError>
    where
        R: AsyncRead + Unpin,
    {
        let mut engine = Self::bind(config).await?;
        engine.connect().await?;
        let report = engine.send(source).await?;
        engine.close().await?;
        Ok(report)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    /// Window and acknowledgment state, for inspection.
    pub fn window(&self) -> &GbnSender {
        &self.window
    }

    /// Three-step handshake with the configured peer.
    pub async fn connect(&mut self) -> Result<(), ConnError> {
        connection::connect(
            &self.socket,
            self.peer,
            self.config.timer.packet_timeout,
            &mut self.state,
        )
        .await
    }

    /// Stream `source` to the peer and return once every packet is acknowledged.
    pub async fn send<R>(&mut self, mut source: R) -> Result<TransferReport, ConnError>
    where
        R: AsyncRead + Unpin,
    {
        if !self.state.is_established() {
            return Err(ConnError::BadState(self.state));
        }

        let mut report = TransferReport::default();
        let mut exhausted = false;
        let mut started: Option<Instant> = None;

        loop {
            while self.window.can_send() && !exhausted {
                let chunk = read_chunk(&mut source).await?;
                if chunk.len() < PAYLOAD_LEN {
                    exhausted = true;
                }
                if chunk.is_empty() {
                    break;
                }
                report.bytes_read += chunk.len() as u64;

                let now = Instant::now();
                started.get_or_insert(now);
                let (seq, bytes) = self
                    .window
                    .record_sent(&chunk, now)
                    .ok_or(ConnError::SequenceExhausted(self.window.packets_sent()))?;
                self.socket.send_raw(&bytes, self.peer).await?;
                log::info!(
                    "packet {seq} is sent, sliding window = {:?}",
                    self.window.in_flight_sequences()
                );
            }

            if exhausted && !self.window.has_unacked() {
                break;
            }

            self.await_ack(&mut report).await?;

            if self
                .window
                .any_stale(&self.config.timer, Instant::now())
            {
                log::info!("RTO occurred");
                report.retransmissions += self.resend_window().await?;
            }

            if exhausted && !self.window.has_unacked() {
                break;
            }
        }

        report.packets = self.window.packets_sent();
        report.max_transmissions = self.window.max_transmissions();
        report.elapsed = started.map(|t| t.elapsed()).unwrap_or_default();
        log::debug!(
            "all {} packets acknowledged, earliest unacked marker at {}, \
             at most {} transmissions per packet",
            report.packets,
            self.window.earliest_unacked,
            report.max_transmissions
        );
        Ok(report)
    }

    /// FIN / FIN|ACK exchange, then release the socket.
    pub async fn close(mut self) -> Result<(), ConnError> {
        connection::close(&self.socket, self.peer, &mut self.state).await
    }

    /// One bounded receive.  A timeout resends the whole window.
    async fn await_ack(&mut self, report: &mut TransferReport) -> Result<(), ConnError> {
        let received = match self
            .socket
            .recv_timeout(self.config.timer.packet_timeout)
            .await
        {
            Ok(received) => received,
            Err(SocketError::Packet(e)) => {
                log::warn!("skipping malformed datagram: {e}");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        match received {
            Some((pkt, addr)) if addr == self.peer && pkt.header.flags & flags::ACK != 0 => {
                let seq = pkt.header.ack;
                match self.window.on_ack(seq) {
                    AckOutcome::Acknowledged => log::info!("ack for packet {seq} is received"),
                    AckOutcome::Duplicate => log::debug!("duplicate ack for packet {seq} ignored"),
                    AckOutcome::Unknown => log::debug!("ack for unsent packet {seq} ignored"),
                }
            }
            Some((pkt, addr)) => {
                log::debug!("ignoring flags={} from {addr}", pkt.header.flags);
            }
            None => {
                report.timeouts += 1;
                log::info!("RTO occurred");
                report.retransmissions += self.resend_window().await?;
            }
        }
        Ok(())
    }

    /// Resend every in-flight packet.  Returns how many were sent.
    async fn resend_window(&mut self) -> Result<u64, ConnError> {
        let pending: Vec<(u16, Vec<u8>)> = self
            .window
            .window_entries()
            .map(|(seq, entry)| (seq, entry.bytes.clone()))
            .collect();
        for (seq, bytes) in &pending {
            self.socket.send_raw(bytes, self.peer).await?;
            log::info!("retransmitting packet {seq}");
        }
        self.window
            .on_retransmit(self.config.timer.resend_policy, Instant::now());
        Ok(pending.len() as u64)
    }
}

/// Read up to one payload slot from `source`.  A short chunk means end of input.
async fn read_chunk<R>(source: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; PAYLOAD_LEN];
    let mut filled = 0;
    while filled < PAYLOAD_LEN {
        let n = source.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_chunk_splits_into_payload_slots() {
        let data = vec![7u8; 2000];
        let mut source = data.as_slice();

        assert_eq!(read_chunk(&mut source).await.unwrap().len(), 994);
        assert_eq!(read_chunk(&mut source).await.unwrap().len(), 994);
        assert_eq!(read_chunk(&mut source).await.unwrap().len(), 12);
        assert!(read_chunk(&mut source).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_before_connect_is_rejected() {
        let config = SenderConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            ..SenderConfig::default()
        };
        let mut engine = SenderEngine::bind(config).await.unwrap();
        let result = engine.send(&b"data"[..]).await;
        assert!(matches!(
            result,
            Err(ConnError::BadState(ConnectionState::Closed))
        ));
    }
}
