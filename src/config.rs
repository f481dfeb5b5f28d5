//! Engine configuration.
//!
//! The binary validates command-line input and fills these structs in; the
//! engines take them as-is.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use crate::timer::TimerConfig;

pub const DEFAULT_PORT: u16 = 8088;
pub const DEFAULT_WINDOW: usize = 3;
pub const DEFAULT_OUTPUT: &str = "received_file";

/// Parameters for one [`crate::sender::SenderEngine`] run.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Local address; port `0` picks an ephemeral port.
    pub bind: SocketAddr,
    /// Receiver address.
    pub peer: SocketAddr,
    /// Maximum number of unacknowledged data packets (W ≥ 1).
    pub window_size: usize,
    pub timer: TimerConfig,
}

impl SenderConfig {
    /// Defaults aimed at `peer`.
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            ..Self::default()
        }
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)),
            peer: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            window_size: DEFAULT_WINDOW,
            timer: TimerConfig::default(),
        }
    }
}

/// Parameters for a [`crate::receiver::ReceiverEngine`].
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Output artifact; truncated at the start of every session.
    pub output: PathBuf,
    /// Re-enter the handshake after each completed session instead of exiting.
    pub persistent: bool,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            output: PathBuf::from(DEFAULT_OUTPUT),
            persistent: false,
        }
    }
}
