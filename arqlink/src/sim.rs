//! Deterministic simulated link.
//!
//! [`Simulation`] connects two [`ArqEngine`]s through a virtual duplex
//! channel and drives them from a single event queue ordered by virtual
//! time. Nothing sleeps: a run over minutes of link time takes
//! milliseconds, and with a fixed seed every run is identical.
//!
//! The channel models a fixed per-frame transmission time and propagation
//! delay. Frames leave a station one after another and arrive in the order
//! they were sent; they are never duplicated or reordered. Frames can be
//! lost or corrupted by scripted [`Fault`]s or at random.
//!
//! ```rust,ignore
//! use arqlink::sim::{ChannelConfig, Simulation, StationId};
//! use arqlink::Config;
//!
//! let channel = ChannelConfig::default().with_loss_rate(0.1).with_seed(7);
//! let mut sim = Simulation::new(Config::go_back_n(), channel)?;
//! sim.submit(StationId::A, b"hello")?;
//! assert!(sim.run_until_idle(60_000));
//! assert_eq!(sim.delivered(StationId::B), [b"hello".to_vec()]);
//! ```

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::vec::Vec;

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Config;
use crate::core::{FrameCodec, FrameKind, Seq};
use crate::engine::ArqEngine;
use crate::error::{Error, Result};
use crate::link::{Event, NetworkLayer, PhysicalLayer, TimerDriver};

/// Virtual time in milliseconds.
pub type Time = u64;

/// One end of the simulated link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StationId {
    /// First station.
    A,

    /// Second station.
    B,
}

impl StationId {
    /// Returns the station at the other end.
    pub const fn peer(&self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    const fn index(&self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

/// Channel timing and impairment settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelConfig {
    /// Time from the end of a transmission to its arrival.
    pub propagation_ms: Time,

    /// Time one frame occupies the sender's side of the channel.
    pub transmit_ms: Time,

    /// Probability that a frame is lost.
    pub loss_rate: f64,

    /// Probability that a frame arrives corrupted.
    pub corrupt_rate: f64,

    /// Seed for random impairments.
    pub seed: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            propagation_ms: 100,
            transmit_ms: 10,
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            seed: 0,
        }
    }
}

impl ChannelConfig {
    /// Sets the propagation delay.
    pub fn with_propagation_ms(mut self, ms: Time) -> Self {
        self.propagation_ms = ms;
        self
    }

    /// Sets the per-frame transmission time.
    pub fn with_transmit_ms(mut self, ms: Time) -> Self {
        self.transmit_ms = ms;
        self
    }

    /// Sets the random loss probability.
    pub fn with_loss_rate(mut self, rate: f64) -> Self {
        self.loss_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the random corruption probability.
    pub fn with_corrupt_rate(mut self, rate: f64) -> Self {
        self.corrupt_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// What the channel does to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    /// Arrives intact.
    Delivered,

    /// Never arrives.
    Dropped,

    /// Arrives with a damaged byte.
    Corrupted,
}

/// A scripted impairment.
///
/// Matches frames of `kind` sent by `from` whose sequence number (DATA) or
/// acknowledgment number (ACK, NAK) is `seq`, and applies `fate` to the
/// `occurrence`-th match, counting from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Sending station.
    pub from: StationId,

    /// Frame kind.
    pub kind: FrameKind,

    /// Sequence or acknowledgment number.
    pub seq: Seq,

    /// Which matching frame is hit.
    pub occurrence: usize,

    /// What happens to it.
    pub fate: Fate,

    /// Matching frames seen so far.
    seen: usize,
}

impl Fault {
    /// Drops the first matching frame.
    pub fn drop_frame(from: StationId, kind: FrameKind, seq: Seq) -> Self {
        Self::new(from, kind, seq, Fate::Dropped)
    }

    /// Corrupts the first matching frame.
    pub fn corrupt_frame(from: StationId, kind: FrameKind, seq: Seq) -> Self {
        Self::new(from, kind, seq, Fate::Corrupted)
    }

    /// Hits the `n`-th matching frame instead of the first.
    pub fn nth(mut self, n: usize) -> Self {
        self.occurrence = n.max(1);
        self
    }

    fn new(from: StationId, kind: FrameKind, seq: Seq, fate: Fate) -> Self {
        Self {
            from,
            kind,
            seq,
            occurrence: 1,
            fate,
            seen: 0,
        }
    }

    fn apply(&mut self, from: StationId, kind: FrameKind, key: Seq) -> Option<Fate> {
        if self.from != from || self.kind != kind || self.seq != key {
            return None;
        }
        self.seen += 1;
        (self.seen == self.occurrence).then_some(self.fate)
    }
}

/// One frame handed to the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRecord {
    /// When transmission finished.
    pub at: Time,

    /// Sending station.
    pub from: StationId,

    /// Frame kind.
    pub kind: FrameKind,

    /// Sequence number (DATA only).
    pub seq: Seq,

    /// Acknowledgment number.
    pub ack: Seq,

    /// What the channel did with it.
    pub fate: Fate,
}

/// Request recorded by a `SimLink` for the simulation to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Send(Vec<u8>),
    StartTimer(Seq, u32),
    StopTimer(Seq),
    StartAckTimer(u32),
    StopAckTimer,
}

/// The surroundings of one engine: its network layer, its side of the
/// channel and its timers.
#[derive(Debug, Default)]
struct SimLink {
    /// Packets waiting to be sent.
    outbound: VecDeque<Vec<u8>>,

    /// Packets delivered by the engine, in order.
    delivered: Vec<Vec<u8>>,

    /// Frame being received.
    inbound: Option<Vec<u8>>,

    /// Whether the engine accepts packets.
    enabled: bool,

    /// Requests made during the current event.
    commands: Vec<Command>,
}

impl NetworkLayer for SimLink {
    fn get_packet(&mut self, buf: &mut [u8]) -> usize {
        let Some(packet) = self.outbound.pop_front() else {
            return 0;
        };
        let len = packet.len().min(buf.len());
        buf[..len].copy_from_slice(&packet[..len]);
        len
    }

    fn put_packet(&mut self, packet: &[u8]) {
        self.delivered.push(packet.to_vec());
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl PhysicalLayer for SimLink {
    fn send_frame(&mut self, frame: &[u8]) {
        self.commands.push(Command::Send(frame.to_vec()));
    }

    fn recv_frame(&mut self, buf: &mut [u8]) -> usize {
        let Some(frame) = self.inbound.take() else {
            return 0;
        };
        let len = frame.len().min(buf.len());
        buf[..len].copy_from_slice(&frame[..len]);
        len
    }
}

impl TimerDriver for SimLink {
    fn start_timer(&mut self, id: Seq, ms: u32) {
        self.commands.push(Command::StartTimer(id, ms));
    }

    fn stop_timer(&mut self, id: Seq) {
        self.commands.push(Command::StopTimer(id));
    }

    fn start_ack_timer(&mut self, ms: u32) {
        self.commands.push(Command::StartAckTimer(ms));
    }

    fn stop_ack_timer(&mut self) {
        self.commands.push(Command::StopAckTimer);
    }
}

/// Something due to happen at a point in virtual time.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Arrive { to: StationId, frame: Vec<u8> },
    PhysicalReady(StationId),
    NetworkReady(StationId),
    DataTimer { station: StationId, seq: Seq, generation: u64 },
    AckTimer { station: StationId, generation: u64 },
}

#[derive(Debug, PartialEq, Eq)]
struct Scheduled {
    at: Time,
    order: u64,
    action: Action,
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.order).cmp(&(other.at, other.order))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
struct Station {
    engine: ArqEngine,
    link: SimLink,

    /// When the sending side of the channel becomes free.
    busy_until: Time,

    /// A NetworkReady action is queued.
    network_scheduled: bool,

    /// Generation of each data timer; bumped on every start and stop.
    data_generation: [u64; 256],

    /// Generation of the ack timer.
    ack_generation: u64,
}

impl Station {
    fn new(config: Config) -> Result<Self> {
        Ok(Self {
            engine: ArqEngine::new(config)?,
            link: SimLink::default(),
            busy_until: 0,
            network_scheduled: false,
            data_generation: [0; 256],
            ack_generation: 0,
        })
    }
}

/// Two engines joined by a virtual lossy channel.
#[derive(Debug)]
pub struct Simulation {
    now: Time,
    order: u64,
    queue: BinaryHeap<Reverse<Scheduled>>,
    stations: [Station; 2],
    codec: FrameCodec,
    channel: ChannelConfig,
    faults: Vec<Fault>,
    rng: StdRng,
    trace: Vec<FrameRecord>,
}

impl Simulation {
    /// Creates a simulation with both stations running `config`.
    pub fn new(config: Config, channel: ChannelConfig) -> Result<Self> {
        let mut sim = Self {
            now: 0,
            order: 0,
            queue: BinaryHeap::new(),
            stations: [Station::new(config)?, Station::new(config)?],
            codec: FrameCodec::new(Default::default(), config.space(), config.max_packet_len),
            channel,
            faults: Vec::new(),
            rng: StdRng::seed_from_u64(channel.seed),
            trace: Vec::new(),
        };

        for id in [StationId::A, StationId::B] {
            let station = &mut sim.stations[id.index()];
            station.engine.start(&mut station.link);
            sim.after_event(id);
        }

        Ok(sim)
    }

    /// Adds a scripted impairment.
    pub fn add_fault(&mut self, fault: Fault) {
        self.faults.push(fault);
    }

    /// Queues a packet at station `id` for delivery to its peer.
    pub fn submit(&mut self, id: StationId, packet: &[u8]) -> Result<()> {
        let max_len = self.station(id).engine.config().max_packet_len;
        if packet.len() > max_len {
            return Err(Error::PayloadTooLarge);
        }

        self.stations[id.index()]
            .link
            .outbound
            .push_back(packet.to_vec());
        self.schedule_network(id);
        Ok(())
    }

    /// Returns the current virtual time.
    pub fn now(&self) -> Time {
        self.now
    }

    /// Returns the engine of station `id`.
    pub fn engine(&self, id: StationId) -> &ArqEngine {
        &self.station(id).engine
    }

    /// Returns the packets station `id` has delivered, in order.
    pub fn delivered(&self, id: StationId) -> &[Vec<u8>] {
        &self.station(id).link.delivered
    }

    /// Returns the number of packets station `id` has yet to hand to its
    /// engine.
    pub fn pending(&self, id: StationId) -> usize {
        self.station(id).link.outbound.len()
    }

    /// Returns every frame handed to the channel so far.
    pub fn trace(&self) -> &[FrameRecord] {
        &self.trace
    }

    /// Returns true if nothing remains to happen.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Runs until the link is idle or `deadline` passes. Returns true if
    /// it went idle.
    pub fn run_until_idle(&mut self, deadline: Time) -> bool {
        while let Some(Reverse(next)) = self.queue.peek() {
            if next.at > deadline {
                return false;
            }
            self.step();
        }
        true
    }

    /// Performs the next scheduled action. Returns false if there was none.
    pub fn step(&mut self) -> bool {
        let Some(Reverse(next)) = self.queue.pop() else {
            return false;
        };
        self.now = next.at;

        match next.action {
            Action::Arrive { to, frame } => {
                self.stations[to.index()].link.inbound = Some(frame);
                self.dispatch(to, Event::FrameReceived);
            }
            Action::PhysicalReady(id) => {
                if self.station(id).busy_until <= self.now {
                    self.dispatch(id, Event::PhysicalLayerReady);
                }
            }
            Action::NetworkReady(id) => {
                let station = &mut self.stations[id.index()];
                station.network_scheduled = false;
                if station.link.enabled && !station.link.outbound.is_empty() {
                    self.dispatch(id, Event::NetworkLayerReady);
                }
            }
            Action::DataTimer {
                station,
                seq,
                generation,
            } => {
                if self.station(station).data_generation[seq as usize] == generation {
                    self.dispatch(station, Event::DataTimeout(seq));
                } else {
                    trace!("{:?}: cancelled DATA {} timer discarded", station, seq);
                }
            }
            Action::AckTimer {
                station,
                generation,
            } => {
                if self.station(station).ack_generation == generation {
                    self.dispatch(station, Event::AckTimeout);
                }
            }
        }

        true
    }

    fn station(&self, id: StationId) -> &Station {
        &self.stations[id.index()]
    }

    fn dispatch(&mut self, id: StationId, event: Event) {
        trace!("t={} {:?}: {:?}", self.now, id, event);
        let station = &mut self.stations[id.index()];
        station.engine.handle(event, &mut station.link);
        self.after_event(id);
    }

    /// Carries out what the engine requested during the last event.
    fn after_event(&mut self, id: StationId) {
        let commands = core::mem::take(&mut self.stations[id.index()].link.commands);

        for command in commands {
            match command {
                Command::Send(frame) => self.transmit(id, frame),
                Command::StartTimer(seq, ms) => {
                    let generation = self.bump_data_generation(id, seq);
                    self.schedule(
                        self.now + ms as Time,
                        Action::DataTimer {
                            station: id,
                            seq,
                            generation,
                        },
                    );
                }
                Command::StopTimer(seq) => {
                    self.bump_data_generation(id, seq);
                }
                Command::StartAckTimer(ms) => {
                    let generation = self.bump_ack_generation(id);
                    self.schedule(
                        self.now + ms as Time,
                        Action::AckTimer {
                            station: id,
                            generation,
                        },
                    );
                }
                Command::StopAckTimer => {
                    self.bump_ack_generation(id);
                }
            }
        }

        self.schedule_network(id);
    }

    fn bump_data_generation(&mut self, id: StationId, seq: Seq) -> u64 {
        let generation = &mut self.stations[id.index()].data_generation[seq as usize];
        *generation += 1;
        *generation
    }

    fn bump_ack_generation(&mut self, id: StationId) -> u64 {
        let generation = &mut self.stations[id.index()].ack_generation;
        *generation += 1;
        *generation
    }

    fn schedule_network(&mut self, id: StationId) {
        let station = &mut self.stations[id.index()];
        if station.network_scheduled || !station.link.enabled || station.link.outbound.is_empty() {
            return;
        }
        station.network_scheduled = true;
        self.schedule(self.now, Action::NetworkReady(id));
    }

    fn schedule(&mut self, at: Time, action: Action) {
        self.order += 1;
        self.queue.push(Reverse(Scheduled {
            at,
            order: self.order,
            action,
        }));
    }

    /// Puts a frame on the channel from `from` toward its peer.
    fn transmit(&mut self, from: StationId, mut frame: Vec<u8>) {
        let station = &mut self.stations[from.index()];
        let done = station.busy_until.max(self.now) + self.channel.transmit_ms;
        station.busy_until = done;
        self.schedule(done, Action::PhysicalReady(from));

        let fate = match self.codec.decode(&frame) {
            Ok(decoded) => {
                let (kind, seq, ack) = (decoded.kind, decoded.seq, decoded.ack);
                let fate = self.impair(from, kind, seq, ack);
                self.trace.push(FrameRecord {
                    at: done,
                    from,
                    kind,
                    seq,
                    ack,
                    fate,
                });
                debug!("t={} {:?} -> {:?} seq={} ack={}: {:?}", done, from, kind, seq, ack, fate);
                fate
            }
            Err(_) => Fate::Delivered,
        };

        match fate {
            Fate::Dropped => return,
            Fate::Corrupted => {
                let index = self.rng.gen_range(0..frame.len());
                frame[index] ^= 1u8 << self.rng.gen_range(0..8u32);
            }
            Fate::Delivered => {}
        }

        self.schedule(
            done + self.channel.propagation_ms,
            Action::Arrive {
                to: from.peer(),
                frame,
            },
        );
    }

    fn impair(&mut self, from: StationId, kind: FrameKind, seq: Seq, ack: Seq) -> Fate {
        let key = match kind {
            FrameKind::Data => seq,
            FrameKind::Ack | FrameKind::Nak => ack,
        };

        let mut scripted = None;
        for fault in &mut self.faults {
            if let Some(fate) = fault.apply(from, kind, key) {
                scripted.get_or_insert(fate);
            }
        }
        if let Some(fate) = scripted {
            return fate;
        }

        if self.rng.gen_bool(self.channel.loss_rate) {
            Fate::Dropped
        } else if self.rng.gen_bool(self.channel.corrupt_rate) {
            Fate::Corrupted
        } else {
            Fate::Delivered
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_hits_nth_occurrence() {
        let mut fault = Fault::drop_frame(StationId::A, FrameKind::Data, 3).nth(2);

        assert_eq!(fault.apply(StationId::B, FrameKind::Data, 3), None);
        assert_eq!(fault.apply(StationId::A, FrameKind::Ack, 3), None);
        assert_eq!(fault.apply(StationId::A, FrameKind::Data, 3), None);
        assert_eq!(fault.apply(StationId::A, FrameKind::Data, 3), Some(Fate::Dropped));
        assert_eq!(fault.apply(StationId::A, FrameKind::Data, 3), None);
    }

    #[test]
    fn test_single_packet_clean_channel() {
        let mut sim = Simulation::new(Config::go_back_n(), ChannelConfig::default()).unwrap();
        sim.submit(StationId::A, b"hello").unwrap();

        assert!(sim.run_until_idle(10_000));
        assert_eq!(sim.delivered(StationId::B), [b"hello".to_vec()]);
        assert!(sim.delivered(StationId::A).is_empty());
        assert_eq!(sim.engine(StationId::A).outstanding_count(), 0);

        // The data frame and the deferred ACK that answered it.
        let kinds: Vec<FrameKind> = sim.trace().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, [FrameKind::Data, FrameKind::Ack]);
    }

    #[test]
    fn test_submit_rejects_oversized_packet() {
        let config = Config::selective_repeat().with_max_packet_len(4);
        let mut sim = Simulation::new(config, ChannelConfig::default()).unwrap();

        assert_eq!(sim.submit(StationId::A, b"too long"), Err(Error::PayloadTooLarge));
        assert_eq!(sim.pending(StationId::A), 0);
    }

    #[test]
    fn test_cancelled_timers_never_reach_the_engine() {
        let mut sim = Simulation::new(Config::selective_repeat(), ChannelConfig::default()).unwrap();
        for i in 0..4u8 {
            sim.submit(StationId::A, &[i]).unwrap();
        }

        assert!(sim.run_until_idle(60_000));
        assert_eq!(sim.engine(StationId::A).stats().retransmissions, 0);
        assert_eq!(sim.engine(StationId::A).stats().stale_timeouts, 0);
        assert_eq!(sim.delivered(StationId::B).len(), 4);
    }

    #[test]
    fn test_same_seed_same_run() {
        let channel = ChannelConfig::default()
            .with_loss_rate(0.2)
            .with_corrupt_rate(0.1)
            .with_seed(42);

        let run = || {
            let mut sim = Simulation::new(Config::cumulative_nak(), channel).unwrap();
            for i in 0..20u8 {
                sim.submit(StationId::A, &[i]).unwrap();
            }
            assert!(sim.run_until_idle(3_600_000));
            (sim.now(), sim.trace().to_vec())
        };

        assert_eq!(run(), run());
    }
}
