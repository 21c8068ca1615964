//! Retransmission and deferred-acknowledgment timers.
//!
//! [`TimerSet`] mirrors what the engine has asked a [`TimerDriver`] to run:
//! one retransmission timer per outstanding DATA frame, keyed by sequence
//! number, plus at most one deferred-ACK timer. The mirror lets the engine
//! recognise firings of timers it already stopped. Durations are fixed;
//! there is no backoff.

use crate::core::Seq;
use crate::link::TimerDriver;

/// Armed-timer bookkeeping for one engine.
#[derive(Debug, Clone)]
pub struct TimerSet {
    /// Retransmission timeout.
    data_timeout_ms: u32,

    /// Deferred-acknowledgment timeout.
    ack_timeout_ms: u32,

    /// Armed data timers, indexed by sequence number.
    armed: [bool; 256],

    /// Whether the ack timer is running.
    ack_armed: bool,
}

impl TimerSet {
    /// Creates a timer set with nothing armed.
    pub const fn new(data_timeout_ms: u32, ack_timeout_ms: u32) -> Self {
        Self {
            data_timeout_ms,
            ack_timeout_ms,
            armed: [false; 256],
            ack_armed: false,
        }
    }

    /// Starts (or restarts) the retransmission timer of `seq`.
    pub fn arm_data<D: TimerDriver + ?Sized>(&mut self, driver: &mut D, seq: Seq) {
        driver.start_timer(seq, self.data_timeout_ms);
        self.armed[seq as usize] = true;
    }

    /// Stops the retransmission timer of `seq` if it is running.
    pub fn cancel<D: TimerDriver + ?Sized>(&mut self, driver: &mut D, seq: Seq) {
        if self.armed[seq as usize] {
            driver.stop_timer(seq);
            self.armed[seq as usize] = false;
        }
    }

    /// Starts (or restarts) the deferred-acknowledgment timer.
    pub fn arm_ack<D: TimerDriver + ?Sized>(&mut self, driver: &mut D) {
        driver.start_ack_timer(self.ack_timeout_ms);
        self.ack_armed = true;
    }

    /// Stops the deferred-acknowledgment timer if it is running.
    pub fn cancel_ack<D: TimerDriver + ?Sized>(&mut self, driver: &mut D) {
        if self.ack_armed {
            driver.stop_ack_timer();
            self.ack_armed = false;
        }
    }

    /// Returns true if the retransmission timer of `seq` is running.
    pub const fn is_armed(&self, seq: Seq) -> bool {
        self.armed[seq as usize]
    }

    /// Returns true if the ack timer is running.
    pub const fn is_ack_armed(&self) -> bool {
        self.ack_armed
    }

    /// Returns the number of running retransmission timers.
    pub fn armed_count(&self) -> usize {
        self.armed.iter().filter(|&&armed| armed).count()
    }

    /// Records that the timer of `seq` fired.
    ///
    /// Returns false for a stale firing of a timer that was stopped.
    pub fn expire_data(&mut self, seq: Seq) -> bool {
        core::mem::replace(&mut self.armed[seq as usize], false)
    }

    /// Records that the ack timer fired. Returns false if it was stopped.
    pub fn expire_ack(&mut self) -> bool {
        core::mem::replace(&mut self.ack_armed, false)
    }
}
