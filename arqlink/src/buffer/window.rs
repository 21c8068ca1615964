//! Sliding windows for flow control and in-order delivery.
//!
//! Both windows keep one slot per sequence number they may hold, indexed by
//! `seq % slot_count`. `slot_count` is a divisor of the sequence modulus no
//! smaller than the window, so any window-sized run of consecutive sequence
//! numbers maps to distinct slots.
//!
//! ```text
//!  SendWindow                          ReceiveWindow
//!
//!   base        next                     expected      expected + size
//!    |==========|------->                   |=============|
//!    outstanding  admissible                 acceptable
//! ```

use core::mem;

use super::PacketBuf;
use crate::core::{Bound, Seq, SeqSpace};
use crate::error::{Error, Result};

/// Send-side slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SendSlot {
    /// Free for reuse.
    #[default]
    Empty,

    /// Sent and awaiting acknowledgment; owns the retransmission copy.
    Outstanding(PacketBuf),

    /// Individually acknowledged, waiting for the base to pass it.
    Acked,
}

/// Send window tracking outstanding frames.
///
/// The window maintains a copy of every frame that has been
/// sent but not yet acknowledged. It supports:
/// - Admitting new payloads up to the window size
/// - Cumulative and selective acknowledgment
/// - Looking up payloads for retransmission
#[derive(Debug)]
pub struct SendWindow<const S: usize> {
    /// Window slots.
    slots: [SendSlot; S],

    /// Sequence space.
    space: SeqSpace,

    /// Oldest unacknowledged sequence number.
    base: Seq,

    /// Next sequence number to assign.
    next: Seq,

    /// Maximum number of outstanding frames.
    window_size: usize,

    /// Number of slots in use for indexing.
    slot_count: usize,
}

impl<const S: usize> SendWindow<S> {
    /// Creates a new send window starting at sequence number 0.
    pub fn new(space: SeqSpace, window_size: usize, slot_count: usize) -> Self {
        let slot_count = slot_count.clamp(1, S);
        Self {
            slots: core::array::from_fn(|_| SendSlot::Empty),
            space,
            base: 0,
            next: 0,
            window_size: window_size.clamp(1, slot_count),
            slot_count,
        }
    }

    /// Returns the oldest unacknowledged sequence number.
    pub const fn base(&self) -> Seq {
        self.base
    }

    /// Returns the next sequence number to be assigned.
    pub const fn next_sequence(&self) -> Seq {
        self.next
    }

    /// Returns the configured window size.
    pub const fn window_size(&self) -> usize {
        self.window_size
    }

    /// Returns the number of sequence numbers in `[base, next)`.
    ///
    /// Individually acknowledged frames still count until the base passes
    /// them, since their sequence numbers cannot be reused before then.
    pub const fn outstanding_count(&self) -> usize {
        self.space.distance(self.base, self.next) as usize
    }

    /// Returns true if no further frame may be admitted.
    pub const fn is_full(&self) -> bool {
        self.outstanding_count() >= self.window_size
    }

    /// Returns true if nothing is outstanding.
    pub const fn is_empty(&self) -> bool {
        self.base == self.next
    }

    /// Returns true if `seq` lies in `[base, next)`.
    pub const fn contains(&self, seq: Seq) -> bool {
        self.space
            .in_window(self.base, seq, self.next, Bound::Exclusive)
    }

    #[inline]
    fn index(&self, seq: Seq) -> usize {
        seq as usize % self.slot_count
    }

    /// Stores a copy of `payload` and assigns it the next sequence number.
    ///
    /// Fails with [`Error::WindowFull`] when `window_size` frames are
    /// already outstanding.
    pub fn admit(&mut self, payload: &[u8]) -> Result<Seq> {
        if self.is_full() {
            return Err(Error::WindowFull);
        }

        let copy = PacketBuf::from_slice(payload).map_err(|_| Error::PayloadTooLarge)?;

        let seq = self.next;
        let index = self.index(seq);
        self.slots[index] = SendSlot::Outstanding(copy);
        self.next = self.space.increment(self.next);

        Ok(seq)
    }

    /// Cumulative acknowledgment: releases every outstanding sequence number
    /// up to and including `ack`.
    ///
    /// `released` is called once per freed sequence number, oldest first.
    /// An `ack` outside `[base, next)` is stale or bogus and frees nothing.
    /// Returns the number of frames released.
    pub fn acknowledge_up_to<F>(&mut self, ack: Seq, mut released: F) -> usize
    where
        F: FnMut(Seq),
    {
        let mut count = 0;

        while self.contains(ack) {
            let index = self.index(self.base);
            self.slots[index] = SendSlot::Empty;
            released(self.base);
            self.base = self.space.increment(self.base);
            count += 1;
        }

        count
    }

    /// Selective acknowledgment of the single frame `seq`.
    ///
    /// Marks the frame acknowledged and, if it was the base, slides the
    /// base over the contiguous run of acknowledged frames. Returns the
    /// number of positions the base advanced.
    pub fn acknowledge(&mut self, seq: Seq) -> Result<usize> {
        if !self.contains(seq) {
            return Err(Error::SequenceOutOfRange);
        }

        let index = self.index(seq);
        match self.slots[index] {
            SendSlot::Outstanding(_) => self.slots[index] = SendSlot::Acked,
            SendSlot::Acked => return Err(Error::DuplicateFrame),
            SendSlot::Empty => return Err(Error::SequenceOutOfRange),
        }

        let mut advanced = 0;
        while !self.is_empty() {
            let index = self.index(self.base);
            if self.slots[index] != SendSlot::Acked {
                break;
            }
            self.slots[index] = SendSlot::Empty;
            self.base = self.space.increment(self.base);
            advanced += 1;
        }

        Ok(advanced)
    }

    /// Returns the stored payload of an unacknowledged frame.
    pub fn payload(&self, seq: Seq) -> Option<&[u8]> {
        if !self.contains(seq) {
            return None;
        }

        match &self.slots[self.index(seq)] {
            SendSlot::Outstanding(payload) => Some(payload.as_slice()),
            _ => None,
        }
    }

    /// Iterates unacknowledged sequence numbers from the base, oldest first.
    pub fn unacked(&self) -> impl Iterator<Item = Seq> + '_ {
        self.space
            .iter_from(self.base, self.outstanding_count() as u16)
            .filter(move |&seq| matches!(self.slots[self.index(seq)], SendSlot::Outstanding(_)))
    }
}

/// Receive-side slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RecvSlot {
    /// Nothing received for this slot's current sequence number.
    #[default]
    Empty,

    /// Arrived out of order, waiting for its predecessors.
    Buffered(PacketBuf),
}

/// Result of offering a data frame to the receive window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    /// The frame completed an in-order run; this many payloads were
    /// delivered upward.
    Delivered(usize),

    /// Stored out of order.
    Buffered,

    /// Already buffered; dropped.
    Duplicate,

    /// Outside `[expected, expected + size)`; dropped.
    OutOfWindow,

    /// Not the expected frame and this window does not buffer.
    Rejected,
}

/// Receive window tracking expected incoming frames.
///
/// Buffering windows hold out-of-order arrivals until their predecessors
/// arrive. A non-buffering window (Go-Back-N) accepts only the expected
/// frame.
#[derive(Debug)]
pub struct ReceiveWindow<const S: usize> {
    /// Out-of-order payloads.
    slots: [RecvSlot; S],

    /// Sequence space.
    space: SeqSpace,

    /// Next sequence number to deliver.
    expected: Seq,

    /// Window size.
    window_size: usize,

    /// Number of slots in use for indexing.
    slot_count: usize,

    /// How the far edge of the window is computed.
    bound: Bound,

    /// Whether out-of-order frames are kept.
    buffering: bool,
}

impl<const S: usize> ReceiveWindow<S> {
    /// Creates a buffering window.
    ///
    /// `bound` picks how the far edge is expressed: exclusive at
    /// `expected + size` or inclusive at `expected + size - 1`. The set of
    /// acceptable sequence numbers is the same either way.
    pub fn new(space: SeqSpace, window_size: usize, slot_count: usize, bound: Bound) -> Self {
        let slot_count = slot_count.clamp(1, S);
        Self {
            slots: core::array::from_fn(|_| RecvSlot::Empty),
            space,
            expected: 0,
            window_size: window_size.clamp(1, slot_count),
            slot_count,
            bound,
            buffering: true,
        }
    }

    /// Creates a window that accepts only the expected frame.
    pub fn in_order(space: SeqSpace) -> Self {
        Self {
            buffering: false,
            ..Self::new(space, 1, 1, Bound::Exclusive)
        }
    }

    /// Returns the next sequence number to deliver.
    pub const fn expected(&self) -> Seq {
        self.expected
    }

    /// Returns the last sequence number delivered in order, the value a
    /// cumulative acknowledgment carries.
    pub const fn last_in_order(&self) -> Seq {
        self.space.sub(self.expected, 1)
    }

    /// Returns true if out-of-order frames are buffered.
    pub const fn is_buffering(&self) -> bool {
        self.buffering
    }

    /// Returns the far edge of the window, per the configured [`Bound`].
    pub const fn upper_bound(&self) -> Seq {
        match self.bound {
            Bound::Exclusive => self.space.add(self.expected, self.window_size as u16),
            Bound::Inclusive => self.space.add(self.expected, self.window_size as u16 - 1),
        }
    }

    /// Returns true if `seq` is acceptable.
    pub const fn in_window(&self, seq: Seq) -> bool {
        self.space
            .in_window(self.expected, seq, self.upper_bound(), self.bound)
    }

    #[inline]
    fn index(&self, seq: Seq) -> usize {
        seq as usize % self.slot_count
    }

    /// Offers a correctly received data frame.
    ///
    /// Payloads are handed to `deliver` strictly in sequence order, each
    /// exactly once.
    pub fn accept<F>(&mut self, seq: Seq, payload: &[u8], mut deliver: F) -> Result<Accept>
    where
        F: FnMut(Seq, &[u8]),
    {
        if !self.buffering {
            if seq != self.expected {
                return Ok(Accept::Rejected);
            }
            deliver(seq, payload);
            self.expected = self.space.increment(self.expected);
            return Ok(Accept::Delivered(1));
        }

        if !self.in_window(seq) {
            return Ok(Accept::OutOfWindow);
        }

        let index = self.index(seq);
        if let RecvSlot::Buffered(_) = self.slots[index] {
            return Ok(Accept::Duplicate);
        }

        let copy = PacketBuf::from_slice(payload).map_err(|_| Error::PayloadTooLarge)?;
        self.slots[index] = RecvSlot::Buffered(copy);

        if seq != self.expected {
            return Ok(Accept::Buffered);
        }

        let mut delivered = 0;
        loop {
            let index = self.index(self.expected);
            let RecvSlot::Buffered(payload) = mem::take(&mut self.slots[index]) else {
                break;
            };
            deliver(self.expected, &payload);
            self.expected = self.space.increment(self.expected);
            delivered += 1;
        }

        Ok(Accept::Delivered(delivered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Delivered = heapless::Vec<(Seq, u8), 64>;

    fn collect(out: &mut Delivered) -> impl FnMut(Seq, &[u8]) + '_ {
        move |seq, payload| out.push((seq, payload[0])).unwrap()
    }

    #[test]
    fn test_send_window_basic() {
        let mut window: SendWindow<16> = SendWindow::new(SeqSpace::new(31), 16, 16);

        assert_eq!(window.admit(&[1, 2, 3]).unwrap(), 0);
        assert_eq!(window.admit(&[4, 5, 6]).unwrap(), 1);
        assert_eq!(window.outstanding_count(), 2);
        assert_eq!(window.payload(1), Some(&[4u8, 5, 6][..]));

        let mut freed: heapless::Vec<Seq, 16> = heapless::Vec::new();
        let acked = window.acknowledge_up_to(1, |seq| freed.push(seq).unwrap());
        assert_eq!(acked, 2);
        assert_eq!(freed.as_slice(), &[0, 1]);
        assert!(window.is_empty());
        assert_eq!(window.base(), 2);
    }

    #[test]
    fn test_send_window_full() {
        let mut window: SendWindow<8> = SendWindow::new(SeqSpace::new(7), 7, 8);

        for i in 0..7 {
            window.admit(&[i]).unwrap();
        }

        assert!(window.is_full());
        assert_eq!(window.admit(&[7]), Err(Error::WindowFull));
        assert_eq!(window.outstanding_count(), 7);
    }

    #[test]
    fn test_outstanding_never_exceeds_window_across_wrap() {
        let mut window: SendWindow<8> = SendWindow::new(SeqSpace::new(7), 7, 8);

        for round in 0..40u8 {
            while window.admit(&[round]).is_ok() {}
            assert_eq!(window.outstanding_count(), 7);
            // Acknowledge the oldest two each round.
            let ack = SeqSpace::new(7).add(window.base(), 1);
            assert_eq!(window.acknowledge_up_to(ack, |_| {}), 2);
        }
    }

    #[test]
    fn test_stale_cumulative_ack_is_ignored() {
        let mut window: SendWindow<16> = SendWindow::new(SeqSpace::new(31), 16, 16);
        for i in 0..4 {
            window.admit(&[i]).unwrap();
        }
        assert_eq!(window.acknowledge_up_to(1, |_| {}), 2);

        // Re-delivered ACK 1, then an ACK for a frame never sent.
        assert_eq!(window.acknowledge_up_to(1, |_| {}), 0);
        assert_eq!(window.acknowledge_up_to(20, |_| {}), 0);
        assert_eq!(window.base(), 2);
        assert_eq!(window.outstanding_count(), 2);
    }

    #[test]
    fn test_cumulative_ack_wraps() {
        let space = SeqSpace::new(7);
        let mut window: SendWindow<8> = SendWindow::new(space, 7, 8);
        for i in 0..6 {
            window.admit(&[i]).unwrap();
        }
        window.acknowledge_up_to(5, |_| {});
        for i in 0..5 {
            window.admit(&[i]).unwrap();
        }
        assert_eq!(window.base(), 6);
        assert_eq!(window.next_sequence(), 3);

        assert_eq!(window.acknowledge_up_to(0, |_| {}), 3);
        assert_eq!(window.base(), 1);
        assert_eq!(window.unacked().collect::<heapless::Vec<Seq, 8>>().as_slice(), &[1, 2]);
    }

    #[test]
    fn test_selective_ack_slides_over_contiguous_run() {
        let mut window: SendWindow<16> = SendWindow::new(SeqSpace::new(31), 16, 16);
        for i in 0..4 {
            window.admit(&[i]).unwrap();
        }

        assert_eq!(window.acknowledge(2), Ok(0));
        assert_eq!(window.acknowledge(2), Err(Error::DuplicateFrame));
        assert_eq!(window.acknowledge(0), Ok(1));
        assert_eq!(window.base(), 1);
        assert_eq!(window.payload(2), None);

        let unacked: heapless::Vec<Seq, 16> = window.unacked().collect();
        assert_eq!(unacked.as_slice(), &[1, 3]);

        assert_eq!(window.acknowledge(1), Ok(2));
        assert_eq!(window.base(), 3);
        assert_eq!(window.acknowledge(9), Err(Error::SequenceOutOfRange));
    }

    #[test]
    fn test_receive_in_order() {
        let mut window: ReceiveWindow<16> =
            ReceiveWindow::new(SeqSpace::new(31), 16, 16, Bound::Exclusive);
        let mut out = Delivered::new();

        assert_eq!(window.accept(0, &[10], collect(&mut out)), Ok(Accept::Delivered(1)));
        assert_eq!(window.accept(1, &[11], collect(&mut out)), Ok(Accept::Delivered(1)));
        assert_eq!(out.as_slice(), &[(0, 10), (1, 11)]);
        assert_eq!(window.expected(), 2);
        assert_eq!(window.last_in_order(), 1);
    }

    #[test]
    fn test_receive_out_of_order_drain() {
        let mut window: ReceiveWindow<16> =
            ReceiveWindow::new(SeqSpace::new(31), 16, 16, Bound::Inclusive);
        let mut out = Delivered::new();

        assert_eq!(window.accept(0, &[0], collect(&mut out)), Ok(Accept::Delivered(1)));
        assert_eq!(window.accept(2, &[2], collect(&mut out)), Ok(Accept::Buffered));
        assert_eq!(window.accept(3, &[3], collect(&mut out)), Ok(Accept::Buffered));
        assert_eq!(window.accept(3, &[3], collect(&mut out)), Ok(Accept::Duplicate));
        assert_eq!(out.as_slice(), &[(0, 0)]);

        assert_eq!(window.accept(1, &[1], collect(&mut out)), Ok(Accept::Delivered(3)));
        assert_eq!(out.as_slice(), &[(0, 0), (1, 1), (2, 2), (3, 3)]);
        assert_eq!(window.expected(), 4);
    }

    #[test]
    fn test_receive_window_edges() {
        let mut window: ReceiveWindow<16> =
            ReceiveWindow::new(SeqSpace::new(31), 16, 16, Bound::Exclusive);
        let mut out = Delivered::new();

        assert_eq!(window.accept(16, &[0], collect(&mut out)), Ok(Accept::OutOfWindow));
        assert_eq!(window.accept(31, &[0], collect(&mut out)), Ok(Accept::OutOfWindow));
        assert_eq!(window.accept(15, &[0], collect(&mut out)), Ok(Accept::Buffered));
        assert!(out.is_empty());
    }

    #[test]
    fn test_receive_old_duplicate_is_out_of_window() {
        let mut window: ReceiveWindow<16> =
            ReceiveWindow::new(SeqSpace::new(31), 16, 16, Bound::Exclusive);
        let mut out = Delivered::new();

        window.accept(0, &[0], collect(&mut out)).unwrap();
        assert_eq!(window.accept(0, &[0], collect(&mut out)), Ok(Accept::OutOfWindow));
        assert_eq!(out.len(), 1);
        assert_eq!(window.expected(), 1);
    }

    #[test]
    fn test_receive_wraparound() {
        let space = SeqSpace::new(31);
        let mut window: ReceiveWindow<16> = ReceiveWindow::new(space, 16, 16, Bound::Exclusive);
        let mut out = Delivered::new();

        for seq in 0..30 {
            window.accept(seq, &[seq], |_, _| {}).unwrap();
        }
        assert_eq!(window.expected(), 30);

        assert_eq!(window.accept(1, &[1], collect(&mut out)), Ok(Accept::Buffered));
        assert_eq!(window.accept(31, &[31], collect(&mut out)), Ok(Accept::Buffered));
        assert_eq!(window.accept(0, &[0], collect(&mut out)), Ok(Accept::Buffered));
        assert_eq!(window.accept(30, &[30], collect(&mut out)), Ok(Accept::Delivered(4)));
        assert_eq!(out.as_slice(), &[(30, 30), (31, 31), (0, 0), (1, 1)]);
        assert_eq!(window.expected(), 2);
    }

    #[test]
    fn test_in_order_window_rejects_everything_else() {
        let mut window: ReceiveWindow<1> = ReceiveWindow::in_order(SeqSpace::new(7));
        let mut out = Delivered::new();

        assert_eq!(window.accept(1, &[1], collect(&mut out)), Ok(Accept::Rejected));
        assert_eq!(window.accept(0, &[0], collect(&mut out)), Ok(Accept::Delivered(1)));
        assert_eq!(window.accept(0, &[0], collect(&mut out)), Ok(Accept::Rejected));
        assert_eq!(window.accept(1, &[1], collect(&mut out)), Ok(Accept::Delivered(1)));
        assert_eq!(out.as_slice(), &[(0, 0), (1, 1)]);
        assert!(!window.is_buffering());
    }
}
