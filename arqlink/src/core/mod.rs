//! Core data structures for the link layer.
//!
//! This module contains fundamental building blocks:
//! - Seq: modular sequence-number arithmetic and window membership
//! - Frame: wire-level protocol unit and its codec
//! - Checksum: zero-residue CRC32 for integrity verification

mod checksum;
mod frame;
mod seq;

pub use checksum::{Checksum, Crc32};
pub use frame::{
    Frame, FrameCodec, FrameKind, CONTROL_HEADER_LEN, CRC_LEN, DATA_HEADER_LEN, MAX_FRAME_LEN,
    MIN_FRAME_LEN,
};
pub use seq::{Bound, Seq, SeqSpace};
