//! Integration tests for connection setup.
//!
//! Each test binds real `tokio` UDP sockets on loopback.  The receiver half
//! runs in a background task; misbehaving peers are played by a raw
//! `UdpSocket` that sends hand-built control packets.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use drtp::{
    connection::ConnError,
    packet::{flags, Packet},
    state::ConnectionState,
    ReceiverEngine, SenderConfig, SenderEngine,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

async fn sender_for(peer: SocketAddr) -> SenderEngine {
    let config = SenderConfig {
        bind: loopback(),
        ..SenderConfig::new(peer)
    };
    SenderEngine::bind(config).await.expect("bind sender")
}

async fn raw_peer() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind(loopback()).await.expect("bind raw peer");
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Both sides should reach `Established` after a clean handshake on loopback.
#[tokio::test]
async fn handshake_both_sides_reach_established() {
    let mut receiver = ReceiverEngine::bind(loopback()).await.unwrap();
    let receiver_addr = receiver.local_addr();

    let receiver_task = tokio::spawn(async move {
        let peer = receiver.accept().await?;
        Ok::<_, ConnError>((receiver, peer))
    });

    let mut sender = sender_for(receiver_addr).await;
    tokio::time::timeout(Duration::from_secs(5), sender.connect())
        .await
        .expect("connect timed out")
        .expect("connect failed");

    let (receiver, peer) = tokio::time::timeout(Duration::from_secs(5), receiver_task)
        .await
        .expect("accept timed out")
        .expect("receiver task panicked")
        .expect("accept failed");

    assert_eq!(sender.state(), ConnectionState::Established);
    assert_eq!(receiver.state(), ConnectionState::Established);
    assert_eq!(peer, sender.local_addr());
}

/// A reply carrying SYN without ACK is a fatal protocol error for the sender.
#[tokio::test]
async fn sender_rejects_reply_without_ack_bit() {
    let (fake, fake_addr) = raw_peer().await;

    tokio::spawn(async move {
        let mut buf = [0u8; 16];
        let (_, from) = fake.recv_from(&mut buf).await.unwrap();
        let reply = Packet::control(flags::SYN).encode();
        fake.send_to(&reply, from).await.unwrap();
    });

    let mut sender = sender_for(fake_addr).await;
    let result = sender.connect().await;

    assert!(
        matches!(
            result,
            Err(ConnError::HandshakeFailed { expected: "SYN|ACK", got: 8 })
        ),
        "expected HandshakeFailed, got: {result:?}"
    );
    assert_eq!(sender.state(), ConnectionState::Closed);
}

/// The receiver refuses a session whose first packet lacks the SYN bit.
#[tokio::test]
async fn receiver_rejects_first_packet_without_syn() {
    let mut receiver = ReceiverEngine::bind(loopback()).await.unwrap();
    let receiver_addr = receiver.local_addr();

    let (raw, _) = raw_peer().await;
    raw.send_to(&Packet::control(flags::ACK).encode(), receiver_addr)
        .await
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), receiver.accept())
        .await
        .expect("accept timed out");

    assert!(
        matches!(
            result,
            Err(ConnError::HandshakeFailed { expected: "SYN", got: 4 })
        ),
        "expected HandshakeFailed, got: {result:?}"
    );
}

/// The receiver refuses a session whose third step is not an ACK.
#[tokio::test]
async fn receiver_rejects_missing_final_ack() {
    let mut receiver = ReceiverEngine::bind(loopback()).await.unwrap();
    let receiver_addr = receiver.local_addr();

    let (raw, _) = raw_peer().await;
    raw.send_to(&Packet::control(flags::SYN).encode(), receiver_addr)
        .await
        .unwrap();

    let client = tokio::spawn(async move {
        let mut buf = [0u8; 16];
        let (n, _) = raw.recv_from(&mut buf).await.unwrap();
        let syn_ack = Packet::decode(&buf[..n]).unwrap();
        raw.send_to(&Packet::control(flags::FIN).encode(), receiver_addr)
            .await
            .unwrap();
        syn_ack.header.flags
    });

    let result = tokio::time::timeout(Duration::from_secs(5), receiver.accept())
        .await
        .expect("accept timed out");

    assert_eq!(client.await.unwrap(), flags::SYN_ACK);
    assert!(
        matches!(
            result,
            Err(ConnError::HandshakeFailed { expected: "ACK", got: 2 })
        ),
        "expected HandshakeFailed, got: {result:?}"
    );
    assert_eq!(receiver.state(), ConnectionState::Closed);
}

/// A silent peer aborts the handshake after one packet timeout; no retry.
#[tokio::test]
async fn connect_to_silent_peer_times_out() {
    // Keep the socket bound so nothing answers and no ICMP error comes back.
    let (_silent, silent_addr) = raw_peer().await;

    let mut sender = sender_for(silent_addr).await;
    let result = tokio::time::timeout(Duration::from_secs(5), sender.connect())
        .await
        .expect("connect should give up on its own");

    assert!(
        matches!(result, Err(ConnError::Timeout("SYN"))),
        "expected Timeout, got: {result:?}"
    );
    assert_eq!(sender.state(), ConnectionState::Closed);
}

/// Sending data before the handshake is a state error on the receiver too.
#[tokio::test]
async fn receive_before_accept_is_rejected() {
    let mut receiver = ReceiverEngine::bind(loopback()).await.unwrap();
    let mut sink: Vec<u8> = Vec::new();
    let result = receiver.receive(&mut sink).await;
    assert!(matches!(
        result,
        Err(ConnError::BadState(ConnectionState::Closed))
    ));
}

/// A stray reply from a third address does not count as the SYN|ACK.
#[tokio::test]
async fn sender_ignores_reply_from_foreign_address() {
    let (fake, fake_addr) = raw_peer().await;
    let (stranger, _) = raw_peer().await;

    let mut sender = sender_for(fake_addr).await;
    // Queued before the SYN goes out; would otherwise fail the handshake.
    stranger
        .send_to(&Packet::control(flags::FIN).encode(), sender.local_addr())
        .await
        .unwrap();

    let peer = tokio::spawn(async move {
        let mut buf = [0u8; 16];
        let (_, from) = fake.recv_from(&mut buf).await.unwrap();
        fake.send_to(&Packet::control(flags::SYN_ACK).encode(), from)
            .await
            .unwrap();
        let (n, _) = fake.recv_from(&mut buf).await.unwrap();
        Packet::decode(&buf[..n]).unwrap().header.flags
    });

    tokio::time::timeout(Duration::from_secs(5), sender.connect())
        .await
        .expect("connect timed out")
        .expect("connect failed");

    assert_eq!(sender.state(), ConnectionState::Established);
    assert_eq!(peer.await.unwrap(), flags::ACK);
}

/// Once the SYN has fixed the peer, only that peer can complete the handshake.
#[tokio::test]
async fn receiver_ignores_final_ack_from_foreign_address() {
    let mut receiver = ReceiverEngine::bind(loopback()).await.unwrap();
    let receiver_addr = receiver.local_addr();

    let (raw, raw_addr) = raw_peer().await;
    let (stranger, _) = raw_peer().await;
    raw.send_to(&Packet::control(flags::SYN).encode(), receiver_addr)
        .await
        .unwrap();

    let client = tokio::spawn(async move {
        let mut buf = [0u8; 16];
        raw.recv_from(&mut buf).await.unwrap();
        stranger
            .send_to(&Packet::control(flags::FIN).encode(), receiver_addr)
            .await
            .unwrap();
        raw.send_to(&Packet::control(flags::ACK).encode(), receiver_addr)
            .await
            .unwrap();
    });

    let peer = tokio::time::timeout(Duration::from_secs(5), receiver.accept())
        .await
        .expect("accept timed out")
        .expect("accept failed");
    client.await.unwrap();

    assert_eq!(peer, raw_addr);
    assert_eq!(receiver.state(), ConnectionState::Established);
}
