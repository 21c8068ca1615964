//! Buffer management for the link layer.
//!
//! This module provides the two sliding windows:
//! - SendWindow: outstanding frames kept for retransmission
//! - ReceiveWindow: out-of-order arrivals held for in-order delivery

mod window;

pub use window::{Accept, ReceiveWindow, RecvSlot, SendSlot, SendWindow};

/// Owned copy of one network-layer packet.
pub type PacketBuf = heapless::Vec<u8, { crate::MAX_PACKET_LEN }>;
