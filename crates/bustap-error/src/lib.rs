use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for BusTap operations.
///
/// Structured variants for the cases callers can react to, with context
/// fields rather than stringly-typed messages where practical.
#[derive(Error, Debug)]
pub enum TapError {
    // === Wire-format errors ===
    /// A buffer was too small to hold a complete frame.
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// A decoded frame carried a channel id outside the known set.
    #[error("unknown channel id: {id}")]
    UnknownChannel { id: u8 },

    // === Export-path errors ===
    /// A log sink could not be opened.
    #[error("cannot open log sink '{path}'")]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === I/O ===
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the BusTap crates.
pub type Result<T> = std::result::Result<T, TapError>;

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_read_message_carries_both_sizes() {
        let e = TapError::ShortRead {
            expected: 16,
            actual: 7,
        };
        let msg = e.to_string();
        assert!(msg.contains("16"));
        assert!(msg.contains('7'));
    }

    #[test]
    fn unknown_channel_message() {
        let e = TapError::UnknownChannel { id: 12 };
        assert_eq!(e.to_string(), "unknown channel id: 12");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: TapError = io.into();
        assert!(matches!(e, TapError::Io(_)));
    }
}
