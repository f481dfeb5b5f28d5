//! Wire-format definitions for DRTP datagrams.
//!
//! Every datagram exchanged between the peers is a [`Packet`].  This module
//! owns the on-wire layout and nothing else: no I/O happens here.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |        Sequence Number        |     Acknowledgment Number     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |             Flags             |                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
//! |                 Payload (0 or 994 bytes) ...                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Control packets carry no payload.  Data packets always carry a full
//! [`PAYLOAD_LEN`] slot; a shorter final chunk is zero-filled, and since the
//! header has no length field the receiver cannot tell padding from data.

use thiserror::Error;

/// Bit-flag constants for the `flags` header field.
pub mod flags {
    /// Synchronise (connection establishment).
    pub const SYN: u16 = 8;
    /// Acknowledgement field is valid.
    pub const ACK: u16 = 4;
    /// Finish: the sender has no more data.
    pub const FIN: u16 = 2;

    pub const SYN_ACK: u16 = SYN | ACK;
    pub const FIN_ACK: u16 = FIN | ACK;

    /// `true` when every bit of `required` is set in `value`.
    #[inline]
    pub fn has_all(value: u16, required: u16) -> bool {
        value & required == required
    }
}

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 6;

/// Size of the payload slot carried by every data packet.
pub const PAYLOAD_LEN: usize = 994;

/// Largest datagram the protocol ever produces.
pub const MAX_DATAGRAM: usize = HEADER_LEN + PAYLOAD_LEN;

const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 2;
const OFF_FLAGS: usize = 4;

/// Fixed-size protocol header, in host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    /// 1-based data sequence number, `0` on control packets.
    pub seq: u16,
    /// Acknowledged sequence number, `0` when not an acknowledgment.
    pub ack: u16,
    /// Bitmask of [`flags`] constants.
    pub flags: u16,
}

/// A complete protocol datagram: header + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Payload-less control packet carrying only `flags`.
    pub fn control(flags: u16) -> Self {
        Self {
            header: Header {
                seq: 0,
                ack: 0,
                flags,
            },
            payload: Vec::new(),
        }
    }

    /// Acknowledgment for data packet `seq`.
    pub fn ack(seq: u16) -> Self {
        Self {
            header: Header {
                seq: 0,
                ack: seq,
                flags: flags::ACK,
            },
            payload: Vec::new(),
        }
    }

    /// Data packet `seq` carrying `chunk`, zero-filled up to [`PAYLOAD_LEN`].
    ///
    /// `chunk` longer than the slot is truncated; callers never read more
    /// than [`PAYLOAD_LEN`] bytes at a time.
    pub fn data(seq: u16, chunk: &[u8]) -> Self {
        let mut payload = vec![0u8; PAYLOAD_LEN];
        let n = chunk.len().min(PAYLOAD_LEN);
        payload[..n].copy_from_slice(&chunk[..n]);
        Self {
            header: Header {
                seq,
                ack: 0,
                flags: 0,
            },
            payload,
        }
    }

    /// `true` for packets that carry file data.
    pub fn is_data(&self) -> bool {
        !self.payload.is_empty()
    }

    /// Serialise this packet into a newly allocated byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];
        buf[OFF_SEQ..OFF_SEQ + 2].copy_from_slice(&self.header.seq.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 2].copy_from_slice(&self.header.ack.to_be_bytes());
        buf[OFF_FLAGS..OFF_FLAGS + 2].copy_from_slice(&self.header.flags.to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        buf
    }

    /// Parse a [`Packet`] from a raw datagram.
    ///
    /// Everything after the header is taken as payload.  The peer is trusted,
    /// so only the framing limits are checked.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::BufferTooShort(buf.len()));
        }
        if buf.len() > MAX_DATAGRAM {
            return Err(PacketError::Oversized(buf.len()));
        }

        let field = |off: usize| u16::from_be_bytes([buf[off], buf[off + 1]]);

        Ok(Packet {
            header: Header {
                seq: field(OFF_SEQ),
                ack: field(OFF_ACK),
                flags: field(OFF_FLAGS),
            },
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("datagram of {0} bytes is too short to contain a header")]
    BufferTooShort(usize),
    #[error("datagram of {0} bytes exceeds the 1000-byte limit")]
    Oversized(usize),
}
