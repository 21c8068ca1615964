//! Wire frames and their codec.
//!
//! # Frame Format
//!
//! ```text
//! DATA:
//! +--------+--------+--------+-------------------------+----------------+
//! |  kind  |  seq   |  ack   |  payload (0..=max_len)  |  CRC32 (LE)    |
//! +--------+--------+--------+-------------------------+----------------+
//!
//! ACK / NAK:
//! +--------+--------+----------------+
//! |  kind  |  ack   |  CRC32 (LE)    |
//! +--------+--------+----------------+
//! ```
//!
//! The checksum covers every byte before it. A receiver checksums the whole
//! frame, trailer included, and rejects anything with a nonzero residue
//! before looking at a single field.

use super::checksum::{Checksum, Crc32};
use super::seq::{Seq, SeqSpace};
use crate::error::{Error, Result};
use crate::MAX_PACKET_LEN;

/// Integrity trailer size in bytes.
pub const CRC_LEN: usize = 4;

/// Header size of ACK and NAK frames.
pub const CONTROL_HEADER_LEN: usize = 2;

/// Header size of DATA frames.
pub const DATA_HEADER_LEN: usize = 3;

/// Smallest well-formed frame (a bare ACK or NAK).
pub const MIN_FRAME_LEN: usize = CONTROL_HEADER_LEN + CRC_LEN;

/// Largest frame the codec produces.
pub const MAX_FRAME_LEN: usize = DATA_HEADER_LEN + MAX_PACKET_LEN + CRC_LEN;

/// Frame kind, the first byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Carries a network-layer packet and a piggybacked acknowledgment.
    Data = 0x01,

    /// Bare acknowledgment.
    Ack = 0x02,

    /// Negative acknowledgment (request retransmit).
    Nak = 0x03,
}

impl FrameKind {
    /// Converts a byte to a FrameKind.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Data),
            0x02 => Some(Self::Ack),
            0x03 => Some(Self::Nak),
            _ => None,
        }
    }

    /// Header length for frames of this kind.
    pub const fn header_len(&self) -> usize {
        match self {
            Self::Data => DATA_HEADER_LEN,
            Self::Ack | Self::Nak => CONTROL_HEADER_LEN,
        }
    }
}

/// A decoded frame, borrowing its payload from the receive buffer.
///
/// Frames are transient: they exist for one send or receive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Frame kind.
    pub kind: FrameKind,

    /// Sequence number (DATA only, zero otherwise).
    pub seq: Seq,

    /// Acknowledgment field.
    ///
    /// Cumulative modes: last in-order frame received. Selective repeat:
    /// the sequence number being acknowledged.
    pub ack: Seq,

    /// Packet payload (DATA only).
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Creates a DATA frame.
    pub const fn new_data(seq: Seq, ack: Seq, payload: &'a [u8]) -> Self {
        Self {
            kind: FrameKind::Data,
            seq,
            ack,
            payload,
        }
    }

    /// Creates an ACK frame.
    pub const fn new_ack(ack: Seq) -> Self {
        Self {
            kind: FrameKind::Ack,
            seq: 0,
            ack,
            payload: &[],
        }
    }

    /// Creates a NAK frame.
    pub const fn new_nak(ack: Seq) -> Self {
        Self {
            kind: FrameKind::Nak,
            seq: 0,
            ack,
            payload: &[],
        }
    }

    /// Returns the total size of this frame when encoded.
    pub fn wire_size(&self) -> usize {
        match self.kind {
            FrameKind::Data => DATA_HEADER_LEN + self.payload.len() + CRC_LEN,
            FrameKind::Ack | FrameKind::Nak => MIN_FRAME_LEN,
        }
    }
}

/// Builds and parses frames for one sequence space.
#[derive(Debug, Clone)]
pub struct FrameCodec<C = Crc32> {
    checksum: C,
    space: SeqSpace,
    max_packet_len: usize,
}

impl<C: Checksum> FrameCodec<C> {
    /// Creates a codec. `max_packet_len` is clamped to [`MAX_PACKET_LEN`].
    pub fn new(checksum: C, space: SeqSpace, max_packet_len: usize) -> Self {
        Self {
            checksum,
            space,
            max_packet_len: max_packet_len.min(MAX_PACKET_LEN),
        }
    }

    /// Returns the sequence space frames are validated against.
    pub fn space(&self) -> SeqSpace {
        self.space
    }

    /// Serializes `frame` into `buf` and appends the checksum.
    ///
    /// Returns the number of bytes written.
    pub fn encode(&self, frame: &Frame<'_>, buf: &mut [u8]) -> Result<usize> {
        if frame.payload.len() > self.max_packet_len {
            return Err(Error::PayloadTooLarge);
        }
        if !self.space.contains(frame.seq) || !self.space.contains(frame.ack) {
            return Err(Error::SequenceOutOfRange);
        }

        let total_size = frame.wire_size();
        if buf.len() < total_size {
            return Err(Error::BufferTooSmall);
        }

        buf[0] = frame.kind as u8;
        let body_len = match frame.kind {
            FrameKind::Data => {
                buf[1] = frame.seq;
                buf[2] = frame.ack;
                buf[DATA_HEADER_LEN..DATA_HEADER_LEN + frame.payload.len()]
                    .copy_from_slice(frame.payload);
                DATA_HEADER_LEN + frame.payload.len()
            }
            FrameKind::Ack | FrameKind::Nak => {
                buf[1] = frame.ack;
                CONTROL_HEADER_LEN
            }
        };

        let crc = self.checksum.checksum(&buf[..body_len]);
        buf[body_len..total_size].copy_from_slice(&crc.to_le_bytes());

        Ok(total_size)
    }

    /// Validates and parses a received frame.
    ///
    /// Every failure is reported as [`Error::CorruptFrame`]; no field of a
    /// frame that fails the checksum is ever read.
    pub fn decode<'a>(&self, buf: &'a [u8]) -> Result<Frame<'a>> {
        if buf.len() < MIN_FRAME_LEN || self.checksum.checksum(buf) != 0 {
            return Err(Error::CorruptFrame);
        }

        let kind = FrameKind::from_u8(buf[0]).ok_or(Error::CorruptFrame)?;
        let body = &buf[..buf.len() - CRC_LEN];

        let frame = match kind {
            FrameKind::Data => {
                if body.len() < DATA_HEADER_LEN
                    || body.len() - DATA_HEADER_LEN > self.max_packet_len
                {
                    return Err(Error::CorruptFrame);
                }
                Frame::new_data(body[1], body[2], &body[DATA_HEADER_LEN..])
            }
            FrameKind::Ack | FrameKind::Nak => {
                if body.len() != CONTROL_HEADER_LEN {
                    return Err(Error::CorruptFrame);
                }
                Frame {
                    kind,
                    seq: 0,
                    ack: body[1],
                    payload: &[],
                }
            }
        };

        if !self.space.contains(frame.seq) || !self.space.contains(frame.ack) {
            return Err(Error::CorruptFrame);
        }

        Ok(frame)
    }
}
