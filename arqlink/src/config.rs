//! Engine configuration.
//!
//! Each mode has a preset with its customary sequence space, window and
//! timeouts. Every field can be adjusted with the `with_*` setters, and
//! [`Config::validate`] checks the combination before an engine is built.

use crate::core::{Bound, SeqSpace};
use crate::error::{Error, Result};
use crate::{MAX_PACKET_LEN, MAX_SLOTS};

/// Acknowledgment and retransmission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArqMode {
    /// Cumulative piggybacked ACKs, deferred ACK timer, one-shot NAKs,
    /// receiver buffering, single-frame retransmission.
    CumulativeNak,

    /// Cumulative ACKs, no receiver buffering, whole-window retransmission
    /// on timeout or NAK.
    GoBackN,

    /// Per-frame ACKs, receiver buffering, per-frame timers, no NAKs.
    SelectiveRepeat,
}

impl ArqMode {
    /// Returns true if the receiver keeps out-of-order frames.
    pub const fn buffers_out_of_order(&self) -> bool {
        !matches!(self, Self::GoBackN)
    }

    /// Returns true if acknowledgments are cumulative (and piggybacked).
    pub const fn is_cumulative(&self) -> bool {
        !matches!(self, Self::SelectiveRepeat)
    }

    /// How the receive window's far edge is expressed.
    pub const fn receive_bound(&self) -> Bound {
        match self {
            Self::SelectiveRepeat => Bound::Inclusive,
            Self::CumulativeNak | Self::GoBackN => Bound::Exclusive,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Acknowledgment policy.
    pub mode: ArqMode,

    /// Largest sequence number; the modulus is `max_seq + 1`.
    pub max_seq: u8,

    /// Maximum number of outstanding frames.
    pub window_size: usize,

    /// Retransmission timeout for DATA frames.
    pub data_timeout_ms: u32,

    /// Deferred-acknowledgment timeout (cumulative modes only).
    pub ack_timeout_ms: u32,

    /// Largest network-layer packet carried in one frame.
    pub max_packet_len: usize,
}

impl Config {
    /// Cumulative ACK with NAK: 32 sequence numbers, window 16.
    pub const fn cumulative_nak() -> Self {
        Self {
            mode: ArqMode::CumulativeNak,
            max_seq: 31,
            window_size: 16,
            data_timeout_ms: 2800,
            ack_timeout_ms: 300,
            max_packet_len: MAX_PACKET_LEN,
        }
    }

    /// Go-Back-N: 8 sequence numbers, window 7.
    pub const fn go_back_n() -> Self {
        Self {
            mode: ArqMode::GoBackN,
            max_seq: 7,
            window_size: 7,
            data_timeout_ms: 2000,
            ack_timeout_ms: 300,
            max_packet_len: MAX_PACKET_LEN,
        }
    }

    /// Selective repeat: 32 sequence numbers, window 16.
    pub const fn selective_repeat() -> Self {
        Self {
            mode: ArqMode::SelectiveRepeat,
            max_seq: 31,
            window_size: 16,
            data_timeout_ms: 2000,
            ack_timeout_ms: 0,
            max_packet_len: MAX_PACKET_LEN,
        }
    }

    /// Returns the preset for `mode`.
    pub const fn for_mode(mode: ArqMode) -> Self {
        match mode {
            ArqMode::CumulativeNak => Self::cumulative_nak(),
            ArqMode::GoBackN => Self::go_back_n(),
            ArqMode::SelectiveRepeat => Self::selective_repeat(),
        }
    }

    /// Sets the largest sequence number.
    pub fn with_max_seq(mut self, max_seq: u8) -> Self {
        self.max_seq = max_seq;
        self
    }

    /// Sets the window size.
    pub fn with_window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    /// Sets the data retransmission timeout.
    pub fn with_data_timeout_ms(mut self, ms: u32) -> Self {
        self.data_timeout_ms = ms;
        self
    }

    /// Sets the deferred-acknowledgment timeout.
    pub fn with_ack_timeout_ms(mut self, ms: u32) -> Self {
        self.ack_timeout_ms = ms;
        self
    }

    /// Sets the maximum packet length.
    pub fn with_max_packet_len(mut self, len: usize) -> Self {
        self.max_packet_len = len;
        self
    }

    /// Returns the sequence space.
    pub const fn space(&self) -> SeqSpace {
        SeqSpace::new(self.max_seq)
    }

    /// Returns the number of buffer slots the windows index into: the
    /// smallest divisor of the modulus that is at least the window size.
    pub fn slot_count(&self) -> usize {
        let modulus = self.space().modulus() as usize;
        (self.window_size.max(1)..=modulus)
            .find(|slots| modulus % slots == 0)
            .unwrap_or(modulus)
    }

    /// Checks the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        let modulus = self.space().modulus() as usize;

        if self.window_size == 0 {
            return Err(Error::InvalidConfig("window size must be at least 1"));
        }

        if self.mode.buffers_out_of_order() {
            if self.window_size > modulus / 2 {
                return Err(Error::InvalidConfig(
                    "buffering window must not exceed half the sequence space",
                ));
            }
        } else if self.window_size > modulus - 1 {
            return Err(Error::InvalidConfig(
                "go-back-n window must be smaller than the sequence space",
            ));
        }

        if self.slot_count() > MAX_SLOTS {
            return Err(Error::InvalidConfig("window exceeds slot capacity"));
        }

        if self.data_timeout_ms == 0 {
            return Err(Error::InvalidConfig("data timeout must be nonzero"));
        }

        if self.mode.is_cumulative()
            && (self.ack_timeout_ms == 0 || self.ack_timeout_ms >= self.data_timeout_ms)
        {
            return Err(Error::InvalidConfig(
                "ack timeout must be nonzero and shorter than the data timeout",
            ));
        }

        if self.max_packet_len > MAX_PACKET_LEN {
            return Err(Error::InvalidConfig("packet length exceeds MAX_PACKET_LEN"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::cumulative_nak()
    }
}
