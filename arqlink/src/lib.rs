//! # arqlink - A Sliding-Window ARQ Data-Link Engine
//!
//! arqlink is a `no_std` compatible implementation of the data-link layer of
//! a point-to-point link. It turns an unreliable frame channel (frames may be
//! lost or corrupted, never duplicated or reordered) into reliable, in-order,
//! exactly-once packet delivery in both directions.
//!
//! - **Three ARQ policies**: cumulative ACK with NAK, Go-Back-N and
//!   Selective-Repeat, selected by [`ArqMode`]
//! - **Piggybacked acknowledgments**: every DATA frame carries the current
//!   cumulative ACK
//! - **Flow control**: the network layer is disabled while the send window
//!   is full
//! - **CRC32 checksum**: zero-residue integrity check on every frame
//! - **Pluggable surroundings**: network layer, physical layer and timers
//!   are traits
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Network Layer                         │
//! ├─────────────────────────────────────────────────────────┤
//! │                    ArqEngine                             │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────┐   │
//! │  │ SendWindow  │ │ RecvWindow  │ │    TimerSet     │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────┘   │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Frame Layer                           │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────┐   │
//! │  │  Framing    │ │  Checksum   │ │   Sequencing    │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────┘   │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Physical Layer                        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use arqlink::{ArqEngine, Config, Event};
//!
//! let mut engine = ArqEngine::new(Config::go_back_n())?;
//! engine.start(&mut link);
//!
//! loop {
//!     let event = events.wait_for_event();
//!     engine.handle(event, &mut link);
//! }
//! ```
//!
//! With the `sim` feature, [`sim::Simulation`] runs two engines against each
//! other over a lossy virtual channel.

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod buffer;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod link;
#[cfg(feature = "sim")]
pub mod sim;
pub mod timer;

// Re-export commonly used types
pub use config::{ArqMode, Config};
pub use crate::core::{Checksum, Crc32, Frame, FrameCodec, FrameKind, Seq, SeqSpace};
pub use engine::{ArqEngine, LinkStats, NakState};
pub use error::{Error, Result};
pub use link::{Event, EventSource, Link, NetworkLayer, PhysicalLayer, TimerDriver};

/// Largest network-layer packet a frame can carry.
pub const MAX_PACKET_LEN: usize = 256;

/// Slot capacity of each window; bounds the configurable window size.
pub const MAX_SLOTS: usize = 64;
