//! The ARQ controller.
//!
//! [`ArqEngine`] is an event-driven state machine. Each call to
//! [`ArqEngine::handle`] processes one event to completion: it may read a
//! frame, deliver packets, transmit frames and arm or stop timers, and it
//! always finishes by recomputing whether the network layer may offer
//! another packet.
//!
//! The acknowledgment and retransmission policy is chosen by
//! [`ArqMode`]:
//!
//! | | Cumulative-NAK | Go-Back-N | Selective-Repeat |
//! |---|---|---|---|
//! | ACK | cumulative, piggybacked, deferred | cumulative, piggybacked, deferred | one per DATA frame |
//! | receiver buffering | yes | no | yes |
//! | NAK | one-shot, resend `ack + 1` | one-shot, resend window | none |
//! | data timeout | resend that frame | resend window | resend that frame |

use log::{debug, trace, warn};

use crate::buffer::{Accept, ReceiveWindow, SendWindow};
use crate::config::{ArqMode, Config};
use crate::core::{Checksum, Crc32, Frame, FrameCodec, FrameKind, Seq, MAX_FRAME_LEN};
use crate::error::Result;
use crate::link::{Event, EventSource, Link};
use crate::timer::TimerSet;
use crate::{MAX_PACKET_LEN, MAX_SLOTS};

/// NAK suppression state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NakState {
    /// A NAK may be sent.
    Clear,

    /// A NAK went out and no good in-order frame has arrived since.
    NakSent,
}

/// Counters kept by the engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkStats {
    /// Frames handed to the physical layer.
    pub frames_sent: u64,

    /// DATA frames sent, first transmissions and retransmissions.
    pub data_sent: u64,

    /// DATA frames sent again.
    pub retransmissions: u64,

    /// Bare ACK frames sent.
    pub acks_sent: u64,

    /// NAK frames sent.
    pub naks_sent: u64,

    /// Frames read from the physical layer.
    pub frames_received: u64,

    /// Frames that failed the integrity check.
    pub checksum_errors: u64,

    /// DATA frames already buffered, or ACKs already applied.
    pub duplicates: u64,

    /// DATA frames outside the receive window.
    pub out_of_window: u64,

    /// Out-of-order DATA frames discarded by a non-buffering receiver.
    pub rejected: u64,

    /// Packets passed up to the network layer.
    pub packets_delivered: u64,

    /// Packets taken from the network layer.
    pub packets_admitted: u64,

    /// Timer firings for timers already stopped.
    pub stale_timeouts: u64,
}

/// A configurable ARQ engine for one end of a link.
///
/// # Example
///
/// ```rust,ignore
/// use arqlink::{ArqEngine, Config, Event};
///
/// let mut engine = ArqEngine::new(Config::selective_repeat())?;
/// engine.start(&mut link);
/// loop {
///     let event = events.wait_for_event();
///     engine.handle(event, &mut link);
/// }
/// ```
#[derive(Debug)]
pub struct ArqEngine<C = Crc32> {
    /// Configuration.
    config: Config,

    /// Frame codec.
    codec: FrameCodec<C>,

    /// Outstanding frames.
    send: SendWindow<MAX_SLOTS>,

    /// Frames awaiting in-order delivery.
    recv: ReceiveWindow<MAX_SLOTS>,

    /// Running timers.
    timers: TimerSet,

    /// NAK suppression.
    nak: NakState,

    /// Physical layer signalled readiness since the last transmission.
    physical_ready: bool,

    /// Engine statistics.
    stats: LinkStats,
}

impl ArqEngine<Crc32> {
    /// Creates an engine using the CRC32 checksum.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_checksum(config, Crc32)
    }
}

impl<C: Checksum> ArqEngine<C> {
    /// Creates an engine with a custom checksum.
    pub fn with_checksum(config: Config, checksum: C) -> Result<Self> {
        config.validate()?;

        let space = config.space();
        let slots = config.slot_count();
        let recv = if config.mode.buffers_out_of_order() {
            ReceiveWindow::new(space, config.window_size, slots, config.mode.receive_bound())
        } else {
            ReceiveWindow::in_order(space)
        };

        Ok(Self {
            codec: FrameCodec::new(checksum, space, config.max_packet_len),
            send: SendWindow::new(space, config.window_size, slots),
            recv,
            timers: TimerSet::new(config.data_timeout_ms, config.ack_timeout_ms),
            nak: NakState::Clear,
            physical_ready: true,
            stats: LinkStats::default(),
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns engine statistics.
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Returns the send window.
    pub fn send_window(&self) -> &SendWindow<MAX_SLOTS> {
        &self.send
    }

    /// Returns the receive window.
    pub fn receive_window(&self) -> &ReceiveWindow<MAX_SLOTS> {
        &self.recv
    }

    /// Returns the timer bookkeeping.
    pub fn timers(&self) -> &TimerSet {
        &self.timers
    }

    /// Returns the NAK suppression state.
    pub fn nak_state(&self) -> NakState {
        self.nak
    }

    /// Returns the number of outstanding frames.
    pub fn outstanding_count(&self) -> usize {
        self.send.outstanding_count()
    }

    /// Returns true if the network layer may offer a packet.
    pub fn network_enabled(&self) -> bool {
        self.physical_ready && !self.send.is_full()
    }

    /// Applies the initial admission decision. Call once before the first
    /// event.
    pub fn start<L: Link>(&mut self, link: &mut L) {
        self.update_admission(link);
    }

    /// Runs the event loop forever.
    pub fn run<L: Link, E: EventSource>(&mut self, events: &mut E, link: &mut L) -> ! {
        self.start(link);
        loop {
            let event = events.wait_for_event();
            self.handle(event, link);
        }
    }

    /// Processes one event to completion.
    pub fn handle<L: Link>(&mut self, event: Event, link: &mut L) {
        trace!("event {:?}", event);

        match event {
            Event::NetworkLayerReady => self.on_network_ready(link),
            Event::PhysicalLayerReady => self.physical_ready = true,
            Event::FrameReceived => self.on_frame_received(link),
            Event::DataTimeout(seq) => self.on_data_timeout(link, seq),
            Event::AckTimeout => self.on_ack_timeout(link),
        }

        self.update_admission(link);
    }

    fn update_admission<L: Link>(&mut self, link: &mut L) {
        link.set_enabled(self.network_enabled());
    }

    fn on_network_ready<L: Link>(&mut self, link: &mut L) {
        if self.send.is_full() {
            debug!("network layer ready with a full window, ignored");
            return;
        }

        let mut packet = [0u8; MAX_PACKET_LEN];
        let max_len = self.config.max_packet_len;
        let len = link.get_packet(&mut packet[..max_len]).min(max_len);

        match self.send.admit(&packet[..len]) {
            Ok(seq) => {
                self.stats.packets_admitted += 1;
                self.send_data(link, seq);
            }
            Err(e) => warn!("packet of {} bytes not admitted: {}", len, e),
        }
    }

    fn on_frame_received<L: Link>(&mut self, link: &mut L) {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let len = link.recv_frame(&mut buf).min(buf.len());
        self.stats.frames_received += 1;

        let frame = match self.codec.decode(&buf[..len]) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.checksum_errors += 1;
                debug!("**** receiver error, {} ({} bytes)", e, len);
                if self.config.mode.is_cumulative() {
                    self.send_nak_once(link);
                }
                return;
            }
        };

        match frame.kind {
            FrameKind::Data => debug!(
                "recv DATA seq={} ack={} len={}",
                frame.seq,
                frame.ack,
                frame.payload.len()
            ),
            FrameKind::Ack => debug!("recv ACK {}", frame.ack),
            FrameKind::Nak => debug!("recv NAK {}", frame.ack),
        }

        match self.config.mode {
            ArqMode::CumulativeNak => self.cumulative_nak_frame(link, &frame),
            ArqMode::GoBackN => self.go_back_n_frame(link, &frame),
            ArqMode::SelectiveRepeat => self.selective_repeat_frame(link, &frame),
        }
    }

    fn cumulative_nak_frame<L: Link>(&mut self, link: &mut L, frame: &Frame<'_>) {
        match frame.kind {
            FrameKind::Data => {
                if frame.seq != self.recv.expected() && self.nak == NakState::Clear {
                    self.send_nak_once(link);
                } else {
                    self.timers.arm_ack(link);
                }
                self.receive_data(link, frame);
            }
            FrameKind::Nak => {
                let target = self.config.space().increment(frame.ack);
                if self.send.contains(target) {
                    self.retransmit(link, target);
                }
            }
            FrameKind::Ack => {}
        }

        self.release_acked(link, frame.ack);
    }

    fn go_back_n_frame<L: Link>(&mut self, link: &mut L, frame: &Frame<'_>) {
        if frame.kind == FrameKind::Data && self.receive_data(link, frame) == Some(Accept::Rejected)
        {
            // A lost NAK must not stall the peer: fall back to a plain ACK.
            match self.nak {
                NakState::Clear => self.send_nak_once(link),
                NakState::NakSent => self.timers.arm_ack(link),
            }
        }

        self.release_acked(link, frame.ack);

        if frame.kind == FrameKind::Nak {
            self.resend_window(link);
        }
    }

    fn selective_repeat_frame<L: Link>(&mut self, link: &mut L, frame: &Frame<'_>) {
        match frame.kind {
            FrameKind::Data => {
                self.send_control(link, Frame::new_ack(frame.seq));
                self.receive_data(link, frame);
            }
            FrameKind::Ack => match self.send.acknowledge(frame.ack) {
                Ok(advanced) => {
                    self.timers.cancel(link, frame.ack);
                    trace!("ACK {} slid send base by {}", frame.ack, advanced);
                }
                Err(e) => {
                    self.stats.duplicates += 1;
                    debug!("ACK {} not applied: {}", frame.ack, e);
                }
            },
            FrameKind::Nak => debug!("NAK {} ignored in selective repeat", frame.ack),
        }
    }

    /// Offers a DATA frame to the receive window and delivers whatever
    /// becomes in-order.
    fn receive_data<L: Link>(&mut self, link: &mut L, frame: &Frame<'_>) -> Option<Accept> {
        let accepted = self.recv.accept(frame.seq, frame.payload, |seq, payload| {
            trace!("deliver seq={} len={}", seq, payload.len());
            link.put_packet(payload);
        });

        let outcome = match accepted {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("DATA {} dropped: {}", frame.seq, e);
                return None;
            }
        };

        match outcome {
            Accept::Delivered(count) => {
                self.stats.packets_delivered += count as u64;
                self.nak = NakState::Clear;
                if self.config.mode.is_cumulative() {
                    self.timers.arm_ack(link);
                }
            }
            Accept::Buffered => trace!("DATA {} buffered", frame.seq),
            Accept::Duplicate => {
                self.stats.duplicates += 1;
                debug!("DATA {} duplicate", frame.seq);
            }
            Accept::OutOfWindow => {
                self.stats.out_of_window += 1;
                debug!("DATA {} outside receive window", frame.seq);
            }
            Accept::Rejected => {
                self.stats.rejected += 1;
                debug!("DATA {} out of order, expected {}", frame.seq, self.recv.expected());
            }
        }

        Some(outcome)
    }

    /// Frees every outstanding frame covered by a cumulative `ack`.
    fn release_acked<L: Link>(&mut self, link: &mut L, ack: Seq) {
        let timers = &mut self.timers;
        let released = self
            .send
            .acknowledge_up_to(ack, |seq| timers.cancel(&mut *link, seq));

        if released > 0 {
            trace!("ack {} released {} frame(s)", ack, released);
        }
    }

    fn on_data_timeout<L: Link>(&mut self, link: &mut L, seq: Seq) {
        if !self.timers.expire_data(seq) {
            self.stats.stale_timeouts += 1;
            debug!("stale DATA {} timeout ignored", seq);
            return;
        }

        debug!("---- DATA {} timeout", seq);

        match self.config.mode {
            ArqMode::GoBackN => self.resend_window(link),
            ArqMode::CumulativeNak | ArqMode::SelectiveRepeat => {
                if self.send.payload(seq).is_some() {
                    self.retransmit(link, seq);
                }
            }
        }
    }

    fn on_ack_timeout<L: Link>(&mut self, link: &mut L) {
        if !self.timers.expire_ack() {
            self.stats.stale_timeouts += 1;
            debug!("stale ACK timeout ignored");
            return;
        }

        debug!("---- ACK timeout");

        if self.config.mode.is_cumulative() {
            self.send_control(link, Frame::new_ack(self.recv.last_in_order()));
        }
    }

    fn send_nak_once<L: Link>(&mut self, link: &mut L) {
        if self.nak == NakState::Clear {
            self.send_control(link, Frame::new_nak(self.recv.last_in_order()));
            self.nak = NakState::NakSent;
        }
    }

    fn retransmit<L: Link>(&mut self, link: &mut L, seq: Seq) {
        self.stats.retransmissions += 1;
        self.send_data(link, seq);
    }

    /// Go-back-N: resends every unacknowledged frame from the base.
    fn resend_window<L: Link>(&mut self, link: &mut L) {
        let pending: heapless::Vec<Seq, MAX_SLOTS> = self.send.unacked().collect();
        for seq in pending {
            self.retransmit(link, seq);
        }
    }

    /// Transmits the stored DATA frame `seq` and restarts its timer.
    fn send_data<L: Link>(&mut self, link: &mut L, seq: Seq) {
        let ack = self.recv.last_in_order();
        let mut buf = [0u8; MAX_FRAME_LEN];

        let Some(payload) = self.send.payload(seq) else {
            debug!("DATA {} no longer outstanding, not sent", seq);
            return;
        };
        let len = match self.codec.encode(&Frame::new_data(seq, ack, payload), &mut buf) {
            Ok(len) => len,
            Err(e) => {
                warn!("DATA {} not encoded: {}", seq, e);
                return;
            }
        };

        debug!("send DATA seq={} ack={}", seq, ack);
        self.stats.data_sent += 1;
        self.put_frame(link, &buf[..len]);
        self.timers.arm_data(link, seq);
    }

    fn send_control<L: Link>(&mut self, link: &mut L, frame: Frame<'_>) {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let len = match self.codec.encode(&frame, &mut buf) {
            Ok(len) => len,
            Err(e) => {
                warn!("{:?} {} not encoded: {}", frame.kind, frame.ack, e);
                return;
            }
        };

        match frame.kind {
            FrameKind::Nak => {
                self.stats.naks_sent += 1;
                debug!("send NAK {}", frame.ack);
            }
            _ => {
                self.stats.acks_sent += 1;
                debug!("send ACK {}", frame.ack);
            }
        }
        self.put_frame(link, &buf[..len]);
    }

    /// Hands an encoded frame to the physical layer. Every frame in a
    /// cumulative mode carries the current acknowledgment, so any pending
    /// deferred ACK is satisfied.
    fn put_frame<L: Link>(&mut self, link: &mut L, bytes: &[u8]) {
        link.send_frame(bytes);
        self.stats.frames_sent += 1;
        self.physical_ready = false;

        if self.config.mode.is_cumulative() {
            self.timers.cancel_ack(link);
        }
    }
}
