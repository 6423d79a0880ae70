//! Polled register export: one latched frame at a time, pop-on-ack.
//!
//! The consumer sees the surface described in [`bustap_types::regmap`]: a
//! control word it writes, a status word, and four data words holding the
//! most recently popped frame MSW-first. A pop-and-latch happens exactly once
//! per trigger: either automatically on the first tick the halt request
//! gates the monitored clock off, or on a rising edge of the frame-ack
//! control bit (which the export logic self-clears one tick later, so
//! repeated identical control writes still produce one pop each).

use bustap_types::regmap::{
    CTRL_ENABLE, CTRL_FRAME_ACK, CTRL_GATING_ENABLE, CTRL_RESET_QUEUE, STATUS_EMPTY,
    STATUS_FRAME_AVAIL, STATUS_FULL,
};
use tracing::debug;

use crate::queue::FrameQueue;

/// Register state of the polled export path.
#[derive(Debug, Default)]
pub struct RegisterFile {
    control: u32,
    data: [u32; 4],
    frame_available: bool,
    /// Ack was consumed last tick; clear the bit this tick.
    ack_clear_pending: bool,
    prev_reset: bool,
    prev_halt: bool,
}

impl RegisterFile {
    /// A register file in its reset state (all words zero).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumer-side control write.
    pub fn write_control(&mut self, value: u32) {
        self.control = value;
    }

    /// Current control word.
    #[must_use]
    pub fn control(&self) -> u32 {
        self.control
    }

    /// CTRL bit0: capture enable.
    #[must_use]
    pub fn capture_enabled(&self) -> bool {
        self.control & CTRL_ENABLE != 0
    }

    /// CTRL bit3: backpressure gating enable.
    #[must_use]
    pub fn gating_enabled(&self) -> bool {
        self.control & CTRL_GATING_ENABLE != 0
    }

    /// Status word for the given queue state.
    #[must_use]
    pub fn status_word(&self, queue: &FrameQueue) -> u32 {
        let mut status = 0;
        if queue.is_empty() {
            status |= STATUS_EMPTY;
        }
        if queue.is_full() {
            status |= STATUS_FULL;
        }
        if self.frame_available {
            status |= STATUS_FRAME_AVAIL;
        }
        status
    }

    /// The four data words (MSW first) of the latched frame.
    #[must_use]
    pub fn data_words(&self) -> [u32; 4] {
        self.data
    }

    /// Whether the data words hold a freshly popped frame.
    #[must_use]
    pub fn frame_available(&self) -> bool {
        self.frame_available
    }

    /// Service the queue-reset control bit (start of tick).
    ///
    /// A rising edge empties the queue, clears the data latch, and clears
    /// `frame_available`. This is the desynchronization recovery path.
    pub fn service_reset(&mut self, queue: &mut FrameQueue) {
        let reset = self.control & CTRL_RESET_QUEUE != 0;
        if reset && !self.prev_reset {
            debug!(discarded = queue.len(), "queue reset requested");
            queue.reset();
            self.data = [0; 4];
            self.frame_available = false;
        }
        self.prev_reset = reset;
    }

    /// Service pop triggers (end of tick). `halt_gated` is the halt-request
    /// level driven at the end of the previous tick, i.e. whether the
    /// monitored clock is gated off this tick.
    pub fn service_pops(&mut self, queue: &mut FrameQueue, halt_gated: bool) {
        if self.ack_clear_pending {
            self.control &= !CTRL_FRAME_ACK;
            self.ack_clear_pending = false;
        }

        let auto_pop = halt_gated && !self.prev_halt;
        self.prev_halt = halt_gated;

        let ack = self.control & CTRL_FRAME_ACK != 0;
        if ack {
            // Consume the ack pulse: the latch is stale from here on until
            // the pop below refreshes it.
            self.frame_available = false;
            self.ack_clear_pending = true;
        }

        if ack || auto_pop {
            if let Some(frame) = queue.pop() {
                self.data = frame.to_words();
                self.frame_available = true;
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
