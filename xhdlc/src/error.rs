//! Error types surfaced by the session and transport layers.
//!
//! Receive-side corruption is not represented here: the decoder reports it
//! as a [`FrameError`](crate::core::FrameError) discard event and the
//! session recovers locally.

/// Errors returned to callers of the public API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The payload exceeds the configured buffer size. Raised before any I/O.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A DATA frame must carry at least one byte.
    #[error("empty payload")]
    EmptyPayload,

    /// The session has been closed.
    #[error("session is not connected")]
    NotConnected,

    /// Every transmission attempt timed out without a matching ACK.
    #[error("transmission of frame {sequence} failed after {attempts} attempts")]
    TransmissionFailed { sequence: u8, attempts: u8 },

    /// The transport accepted zero bytes of a pending write.
    #[error("transport wrote zero bytes")]
    WriteZero,

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Failure reported by a non-`std` transport adapter.
    #[error("transport error: {0}")]
    Transport(&'static str),

    /// I/O failure reported by a `std::io` transport, propagated unchanged.
    #[cfg(feature = "std")]
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for errors that mean the peer stopped answering rather
    /// than a local programming error.
    pub fn is_peer_unreachable(&self) -> bool {
        matches!(self, Error::TransmissionFailed { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_display() {
        let err = Error::PayloadTooLarge { size: 9, max: 8 };
        assert_eq!(err.to_string(), "payload too large (9 bytes, max 8)");

        let err = Error::TransmissionFailed { sequence: 3, attempts: 2 };
        assert_eq!(err.to_string(), "transmission of frame 3 failed after 2 attempts");
        assert!(err.is_peer_unreachable());
        assert!(!Error::NotConnected.is_peer_unreachable());
    }
}
