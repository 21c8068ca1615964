//! Collaborator interfaces.
//!
//! The engine owns no I/O. It is driven by an [`EventSource`] and talks to
//! the layers around it through these traits:
//!
//! ```text
//!          NetworkLayer  (get_packet / put_packet / set_enabled)
//!               ^
//!               |
//!          +---------+      TimerDriver
//!          | engine  |----> (start/stop data and ack timers)
//!          +---------+
//!               |
//!               v
//!          PhysicalLayer (send_frame / recv_frame)
//! ```
//!
//! Implement all three on one type to obtain a [`Link`].

use crate::core::Seq;

/// Network-layer packet source and sink.
pub trait NetworkLayer {
    /// Copies the next outbound packet into `buf` and returns its length.
    ///
    /// Only called while the layer is enabled.
    fn get_packet(&mut self, buf: &mut [u8]) -> usize;

    /// Delivers one inbound packet, in order, exactly once.
    fn put_packet(&mut self, packet: &[u8]);

    /// Allows or forbids `NetworkLayerReady` events.
    fn set_enabled(&mut self, enabled: bool);
}

/// Physical-layer frame transport.
///
/// Frames may be lost, truncated or corrupted in transit, but are never
/// duplicated or reordered.
pub trait PhysicalLayer {
    /// Transmits one encoded frame.
    fn send_frame(&mut self, frame: &[u8]);

    /// Copies the frame that raised `FrameReceived` into `buf` and returns
    /// its length.
    fn recv_frame(&mut self, buf: &mut [u8]) -> usize;
}

/// Timer provider. Starting a running timer restarts it.
pub trait TimerDriver {
    /// Starts the retransmission timer for the DATA frame `id`.
    fn start_timer(&mut self, id: Seq, ms: u32);

    /// Stops the retransmission timer `id`.
    fn stop_timer(&mut self, id: Seq);

    /// Starts the deferred-acknowledgment timer.
    fn start_ack_timer(&mut self, ms: u32);

    /// Stops the deferred-acknowledgment timer.
    fn stop_ack_timer(&mut self);
}

/// Everything the engine needs from its surroundings.
pub trait Link: NetworkLayer + PhysicalLayer + TimerDriver {}

impl<T: NetworkLayer + PhysicalLayer + TimerDriver> Link for T {}

/// An event delivered to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The network layer has a packet to send.
    NetworkLayerReady,

    /// The physical layer can take another frame.
    PhysicalLayerReady,

    /// A frame is waiting in the physical layer.
    FrameReceived,

    /// The retransmission timer of a DATA frame expired.
    DataTimeout(Seq),

    /// The deferred-acknowledgment timer expired.
    AckTimeout,
}

/// Blocking source of events, delivered strictly in arrival order.
pub trait EventSource {
    /// Blocks until the next event.
    fn wait_for_event(&mut self) -> Event;
}
