//! `drtp`: reliable single-file transfer over UDP.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐   data (seq 1..N)   ┌────────────────┐
//!  │ SenderEngine │────────────────────▶│ ReceiverEngine │──▶ output file
//!  └──────┬───────┘                     └───────┬────────┘
//!         │◀────────── per-packet ACKs ─────────┘
//!         │
//!  ┌──────▼───────────────────────────────────────┐
//!  │ connection: SYN / SYN|ACK / ACK, FIN / FIN|ACK│
//!  └──────┬───────────────────────────────────────┘
//!         │ raw UDP datagrams
//!  ┌──────▼────┐
//!  │  Socket   │  (thin async wrapper around tokio UdpSocket)
//!  └───────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]: wire format (encode / decode)
//! - [`socket`]: async UDP socket abstraction
//! - [`state`]: finite-state-machine types
//! - [`timer`]: fixed packet timeout and resend policy
//! - [`gbn_sender`]: sliding window and acknowledged set
//! - [`gbn_receiver`]: expected sequence and in-order acceptance
//! - [`fault`]: injectable packet-discard policy for loss testing
//! - [`connection`]: handshake and teardown exchanges
//! - [`sender`]: sender engine (transmit loop)
//! - [`receiver`]: receiver engine (reassembly loop)
//! - [`config`]: engine parameters and defaults

pub mod config;
pub mod connection;
pub mod fault;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod socket;
pub mod state;
pub mod timer;

pub use config::{ReceiverConfig, SenderConfig};
pub use connection::ConnError;
pub use fault::{DiscardOnce, FaultPolicy, NoFaults};
pub use receiver::{ReceiverEngine, SessionReport};
pub use sender::{SenderEngine, TransferReport};
pub use timer::{ResendPolicy, TimerConfig};
