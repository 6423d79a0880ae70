//! Runtime configuration of the streaming export path.
//!
//! Read once at exporter construction. Console sampling is controlled by two
//! environment knobs: `BUSTAP_PRINT` enables it (any value not starting with
//! `0`), `BUSTAP_PRINT_EVERY` sets the stride. Absent variables mean
//! sampling is off.

use std::path::PathBuf;
use std::time::Duration;

use crate::ring::DEFAULT_RING_CAPACITY;

/// Environment variable enabling console frame sampling.
pub const PRINT_ENV: &str = "BUSTAP_PRINT";
/// Environment variable setting the sampling stride (print every Nth frame).
pub const PRINT_EVERY_ENV: &str = "BUSTAP_PRINT_EVERY";

/// Default binary log path.
pub const DEFAULT_BINARY_LOG: &str = "bustap_frames.bin";
/// Default textual log path.
pub const DEFAULT_TEXT_LOG: &str = "bustap_frames.csv";

/// Interval between drain-thread polls.
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Streaming-export configuration.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Binary log path (truncated at open).
    pub binary_path: PathBuf,
    /// Textual log path (truncated at open).
    pub text_path: PathBuf,
    /// Ring capacity in frames; clamped to a power of two.
    pub ring_capacity: usize,
    /// Mirror every Nth decoded frame to stderr.
    pub console_print: bool,
    /// Sampling stride when `console_print` is set.
    pub print_every: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from(DEFAULT_BINARY_LOG),
            text_path: PathBuf::from(DEFAULT_TEXT_LOG),
            ring_capacity: DEFAULT_RING_CAPACITY,
            console_print: false,
            print_every: 1,
        }
    }
}

impl ExportConfig {
    /// Defaults overlaid with the environment knobs.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = std::env::var(PRINT_ENV) {
            config.console_print = !value.is_empty() && !value.starts_with('0');
        }
        if let Ok(value) = std::env::var(PRINT_EVERY_ENV) {
            // An unparsable or zero stride keeps the default.
            if let Ok(every) = value.trim().parse::<u32>() {
                if every > 0 {
                    config.print_every = every;
                }
            }
        }
        config
    }

    /// Clamp degenerate values.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.ring_capacity = self.ring_capacity.next_power_of_two().max(2);
        self.print_every = self.print_every.max(1);
        self
    }
}

// ===========================================================================
// Tests
// ===========================================================================
