//! Capture-path counters.
//!
//! The tick domain is single-threaded by contract, so these are plain `u64`
//! counters; [`CaptureCounters::snapshot`] hands out a copyable view for
//! diagnostics. Every silent-loss path of the pipeline increments exactly
//! one of these.

use std::fmt;

use serde::Serialize;

/// Monotonic counters maintained by the tick engine.
#[derive(Debug, Default)]
pub struct CaptureCounters {
    frames_captured_total: u64,
    table_exhausted_total: u64,
    unmatched_responses_total: u64,
    queue_overflow_dropped_total: u64,
    halt_events_total: u64,
}

impl CaptureCounters {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A completed record left the correlation table.
    pub fn record_captured(&mut self) {
        self.frames_captured_total += 1;
    }

    /// An accepted request found no free correlation slot; its trace is lost.
    pub fn record_table_exhausted(&mut self) {
        self.table_exhausted_total += 1;
    }

    /// A response pulse matched no awaiting slot.
    pub fn record_unmatched_response(&mut self) {
        self.unmatched_responses_total += 1;
    }

    /// A completion was dropped because the queue was full and gating is off.
    pub fn record_queue_overflow(&mut self) {
        self.queue_overflow_dropped_total += 1;
    }

    /// A halt-request pulse started.
    pub fn record_halt_event(&mut self) {
        self.halt_events_total += 1;
    }

    /// Point-in-time copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> CaptureCountersSnapshot {
        CaptureCountersSnapshot {
            frames_captured_total: self.frames_captured_total,
            table_exhausted_total: self.table_exhausted_total,
            unmatched_responses_total: self.unmatched_responses_total,
            queue_overflow_dropped_total: self.queue_overflow_dropped_total,
            halt_events_total: self.halt_events_total,
        }
    }
}

/// Point-in-time snapshot of [`CaptureCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureCountersSnapshot {
    pub frames_captured_total: u64,
    pub table_exhausted_total: u64,
    pub unmatched_responses_total: u64,
    pub queue_overflow_dropped_total: u64,
    pub halt_events_total: u64,
}

impl fmt::Display for CaptureCountersSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "captured={} table_exhausted={} unmatched={} queue_dropped={} halt_events={}",
            self.frames_captured_total,
            self.table_exhausted_total,
            self.unmatched_responses_total,
            self.queue_overflow_dropped_total,
            self.halt_events_total,
        )
    }
}

// ===========================================================================
// Tests
// ===========================================================================
