//! Error types for the ARQ engine.
//!
//! Nothing here is fatal to a running link. The engine consumes every
//! variant internally (logging and counting it) and relies on timeout-driven
//! retransmission to recover. Only the building blocks (`SendWindow`,
//! `FrameCodec`, `Config`) surface them to their callers.
//!
//! Arrivals outside the receive window are not errors: `ReceiveWindow`
//! classifies them as `Accept::OutOfWindow` and the engine counts them.

use thiserror::Error;

/// Errors produced by the link-layer building blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Failed integrity check, undersized or malformed frame.
    #[error("corrupt frame")]
    CorruptFrame,

    /// Sequence number already buffered or delivered.
    #[error("duplicate frame")]
    DuplicateFrame,

    /// Send window already holds `window_size` outstanding frames.
    #[error("send window full")]
    WindowFull,

    /// Payload exceeds the configured maximum packet length.
    #[error("payload too large")]
    PayloadTooLarge,

    /// Output buffer cannot hold the encoded frame.
    #[error("buffer too small")]
    BufferTooSmall,

    /// Sequence number is not outstanding in the send window.
    #[error("sequence number out of range")]
    SequenceOutOfRange,

    /// Rejected configuration, with the violated constraint.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Result type alias using the crate error.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        use core::fmt::Write;

        let mut s: heapless::String<64> = heapless::String::new();
        write!(s, "{}", Error::InvalidConfig("window too large")).unwrap();
        assert_eq!(s.as_str(), "invalid configuration: window too large");
    }
}
