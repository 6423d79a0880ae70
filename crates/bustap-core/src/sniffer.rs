//! The tick engine: composes snapshot, correlation table, queue,
//! backpressure, and register export into one synchronous step function.
//!
//! [`BusTap::tick`] is invoked once per tick of the monitored system's
//! scheduling clock. It is single-threaded, never re-entrant, and never
//! blocks: every event either takes effect this tick or is dropped/retried
//! per the saturation policy. All decisions within a tick read the
//! start-of-tick state, in this order:
//!
//! 1. service the queue-reset control,
//! 2. evaluate the completion selector (against last tick's table),
//! 3. match this tick's responses (against last tick's awaiting slots),
//! 4. allocate this tick's accepted requests in scan order,
//! 5. commit the selected record: queue push, fan-out, retire,
//! 6. service register-export pop triggers,
//! 7. advance the backpressure controller and the cycle counter.
//!
//! Completed records fan out to both consumers of the completion event
//! stream: the bounded queue (register path) and, when a sink is attached,
//! [`FrameSink::push_frame`] (streaming path), pushed exactly once, in the
//! tick the record leaves the table.

use bustap_types::TraceFrame;
use tracing::{trace, warn};

use crate::counters::{CaptureCounters, CaptureCountersSnapshot};
use crate::gating::{DEFAULT_HALT_REQ_CYCLES, GatingController};
use crate::queue::{DEFAULT_FIFO_DEPTH, FrameQueue};
use crate::regfile::RegisterFile;
use crate::snapshot::BusSnapshot;
use crate::table::{AllocateOutcome, CompleteOutcome, CorrelationTable, DEFAULT_TABLE_DEPTH};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Sizing of the capture pipeline.
#[derive(Debug, Clone, Copy)]
pub struct TapConfig {
    /// Correlation-table depth (pending-transaction slots).
    pub table_depth: usize,
    /// Completed-frame queue depth.
    pub fifo_depth: usize,
    /// Minimum halt-request pulse width in ticks.
    pub halt_req_cycles: u32,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            table_depth: DEFAULT_TABLE_DEPTH,
            fifo_depth: DEFAULT_FIFO_DEPTH,
            halt_req_cycles: DEFAULT_HALT_REQ_CYCLES,
        }
    }
}

impl TapConfig {
    /// Clamp degenerate values.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.table_depth = self.table_depth.max(1);
        self.fifo_depth = self.fifo_depth.max(1);
        self.halt_req_cycles = self.halt_req_cycles.max(1);
        self
    }
}

// ---------------------------------------------------------------------------
// Streaming fan-out seam
// ---------------------------------------------------------------------------

/// Second consumer of the completion event stream.
///
/// Implemented by the streaming exporter; must not block; a full sink
/// returns `false` and accounts for the drop itself.
pub trait FrameSink {
    /// Offer one completed record. Returns whether it was accepted.
    fn push_frame(&self, frame: &TraceFrame) -> bool;
}

impl<S: FrameSink + ?Sized> FrameSink for std::sync::Arc<S> {
    fn push_frame(&self, frame: &TraceFrame) -> bool {
        (**self).push_frame(frame)
    }
}

// ---------------------------------------------------------------------------
// Tick engine
// ---------------------------------------------------------------------------

/// Per-tick result of the capture pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutput {
    /// Halt-request level driven to the monitored system this tick.
    pub halt_request: bool,
    /// The record that left the correlation table this tick, if any.
    pub retired: Option<TraceFrame>,
}

/// The bus tracer: capture, correlate, queue, backpressure, register export.
pub struct BusTap {
    table: CorrelationTable,
    queue: FrameQueue,
    gating: GatingController,
    regfile: RegisterFile,
    counters: CaptureCounters,
    sink: Option<Box<dyn FrameSink>>,
    cycle: u32,
    halt_level: bool,
}

impl BusTap {
    /// Create a tracer with the given sizing. Capture starts disabled; the
    /// consumer enables it through the control register.
    #[must_use]
    pub fn new(config: TapConfig) -> Self {
        let config = config.validated();
        Self {
            table: CorrelationTable::new(config.table_depth),
            queue: FrameQueue::new(config.fifo_depth),
            gating: GatingController::new(config.halt_req_cycles),
            regfile: RegisterFile::new(),
            counters: CaptureCounters::new(),
            sink: None,
            cycle: 0,
            halt_level: false,
        }
    }

    /// Attach the streaming-export sink. Completed records fan out to it
    /// from the next tick on.
    pub fn attach_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.sink = Some(sink);
    }

    /// Consumer-side control-register write.
    pub fn write_control(&mut self, value: u32) {
        self.regfile.write_control(value);
    }

    /// Current control word.
    #[must_use]
    pub fn control(&self) -> u32 {
        self.regfile.control()
    }

    /// Current status word.
    #[must_use]
    pub fn status_word(&self) -> u32 {
        self.regfile.status_word(&self.queue)
    }

    /// The latched data words (MSW first).
    #[must_use]
    pub fn data_words(&self) -> [u32; 4] {
        self.regfile.data_words()
    }

    /// Whether the data words hold a freshly popped frame.
    #[must_use]
    pub fn frame_available(&self) -> bool {
        self.regfile.frame_available()
    }

    /// Halt-request level driven at the end of the last tick.
    #[must_use]
    pub fn halt_requested(&self) -> bool {
        self.halt_level
    }

    /// Number of frames buffered in the completed-frame queue.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Number of occupied correlation slots.
    #[must_use]
    pub fn slots_occupied(&self) -> usize {
        self.table.occupied()
    }

    /// Current cycle counter.
    #[must_use]
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// Capture counters snapshot.
    #[must_use]
    pub fn counters(&self) -> CaptureCountersSnapshot {
        self.counters.snapshot()
    }

    /// Advance the pipeline one tick over the given channel observations.
    pub fn tick(&mut self, snapshot: &BusSnapshot) -> TickOutput {
        let now = self.cycle;

        self.regfile.service_reset(&mut self.queue);
        let enabled = self.regfile.capture_enabled();
        let gating_enabled = self.regfile.gating_enabled();

        // Selection reads last tick's table: a slot completed below becomes
        // selectable only next tick.
        let ready = if enabled { self.table.select_ready() } else { None };

        if enabled {
            self.observe_responses(snapshot, now);
            self.observe_requests(snapshot, now);
        }

        let retired = match ready {
            Some(slot) => self.commit_ready(slot, gating_enabled),
            None => None,
        };

        // The register file sees the halt level driven at the end of the
        // previous tick, which models the clock-gate latency of the monitored
        // system.
        self.regfile.service_pops(&mut self.queue, self.halt_level);

        let halt =
            self.gating
                .tick(gating_enabled, self.queue.is_full(), self.queue.is_empty());
        if halt && !self.halt_level {
            self.counters.record_halt_event();
        }
        self.halt_level = halt;
        self.cycle = self.cycle.wrapping_add(1);

        TickOutput {
            halt_request: halt,
            retired,
        }
    }

    fn observe_responses(&mut self, snapshot: &BusSnapshot, now: u32) {
        for (source, activity) in snapshot.iter() {
            if !activity.response_valid {
                continue;
            }
            match self.table.try_complete(source, activity.response_data, now) {
                CompleteOutcome::Completed(slot) => {
                    trace!(channel = %source, slot, "response correlated");
                }
                CompleteOutcome::Unmatched => {
                    // Protocol violation or a request whose trace already
                    // overflowed the table; count and move on.
                    warn!(channel = %source, "unmatched response pulse");
                    self.counters.record_unmatched_response();
                }
            }
        }
    }

    fn observe_requests(&mut self, snapshot: &BusSnapshot, now: u32) {
        for (source, activity) in snapshot.iter() {
            if !activity.accepted() {
                continue;
            }
            match self.table.try_allocate(
                source,
                activity.write,
                activity.address,
                activity.write_data,
                activity.byte_enable,
                now,
            ) {
                AllocateOutcome::Allocated(slot) => {
                    trace!(channel = %source, slot, write = activity.write, "request captured");
                }
                AllocateOutcome::CapacityExceeded => {
                    warn!(channel = %source, "correlation table exhausted, trace lost");
                    self.counters.record_table_exhausted();
                }
            }
        }
    }

    /// Move the selected record out of the table, observing the saturation
    /// policy: with gating enabled a full queue keeps the slot for retry;
    /// with gating disabled the completion is dropped and the slot freed.
    fn commit_ready(&mut self, slot: usize, gating_enabled: bool) -> Option<TraceFrame> {
        let frame = *self.table.frame(slot)?;
        let queued = self.queue.push(frame);
        if !queued && gating_enabled {
            return None;
        }
        if !queued {
            self.counters.record_queue_overflow();
        }
        if let Some(sink) = self.sink.as_deref() {
            // The streaming ring accounts for its own overflow.
            let _ = sink.push_frame(&frame);
        }
        self.table.retire(slot);
        self.counters.record_captured();
        Some(frame)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use bustap_types::BusSource;
    use bustap_types::regmap::{CTRL_ENABLE, CTRL_GATING_ENABLE};

    use super::*;

    struct RecordingSink {
        frames: RefCell<Vec<TraceFrame>>,
    }

    impl FrameSink for RecordingSink {
        fn push_frame(&self, frame: &TraceFrame) -> bool {
            self.frames.borrow_mut().push(*frame);
            true
        }
    }

    fn enabled_tap(config: TapConfig) -> BusTap {
        let mut tap = BusTap::new(config);
        tap.write_control(CTRL_ENABLE);
        tap
    }

    #[test]
    fn write_flows_through_in_two_ticks() {
        let mut tap = enabled_tap(TapConfig::default());
        let snap =
            BusSnapshot::idle().with_request(BusSource::CoreData, true, 0x1000, 0xAB, 0xF);

        let out = tap.tick(&snap);
        assert_eq!(out.retired, None, "allocation tick");
        assert_eq!(tap.slots_occupied(), 1);

        let out = tap.tick(&BusSnapshot::idle());
        let frame = out.retired.expect("write retires next tick");
        assert!(frame.write);
        assert_eq!(frame.req_timestamp, 0);
        assert_eq!(frame.resp_timestamp, 0);
        assert_eq!(tap.queue_len(), 1);
        assert_eq!(tap.slots_occupied(), 0);
    }

    #[test]
    fn disabled_capture_observes_nothing() {
        let mut tap = BusTap::new(TapConfig::default());
        let snap =
            BusSnapshot::idle().with_request(BusSource::CoreData, true, 0x1000, 0xAB, 0xF);
        tap.tick(&snap);
        tap.tick(&BusSnapshot::idle());
        assert_eq!(tap.slots_occupied(), 0);
        assert_eq!(tap.queue_len(), 0);
    }

    #[test]
    fn same_tick_response_is_unmatched() {
        let mut tap = enabled_tap(TapConfig::default());
        let snap = BusSnapshot::idle()
            .with_request(BusSource::Ram0, false, 0x2000, 0, 0xF)
            .with_response(BusSource::Ram0, 0x99);
        tap.tick(&snap);
        // The response read the start-of-tick table, which had no awaiting
        // slot for RAM0 yet.
        assert_eq!(tap.counters().unmatched_responses_total, 1);
        assert_eq!(tap.slots_occupied(), 1);
    }

    #[test]
    fn read_latency_counts_ticks_between_request_and_response() {
        let mut tap = enabled_tap(TapConfig::default());
        tap.tick(&BusSnapshot::idle().with_request(BusSource::Flash, false, 0x40, 0, 0xF));
        tap.tick(&BusSnapshot::idle());
        tap.tick(&BusSnapshot::idle());
        tap.tick(&BusSnapshot::idle().with_response(BusSource::Flash, 0x1234_5678));

        let out = tap.tick(&BusSnapshot::idle());
        let frame = out.retired.expect("resolved read retires");
        assert!(!frame.write);
        assert_eq!(frame.req_timestamp, 0);
        assert_eq!(frame.resp_timestamp, 3);
        assert_eq!(frame.data, 0x1234_5678);
    }

    #[test]
    fn fan_out_reaches_sink_once_per_record() {
        let mut tap = enabled_tap(TapConfig::default());
        let sink = std::rc::Rc::new(RecordingSink {
            frames: RefCell::new(Vec::new()),
        });

        struct Shared(std::rc::Rc<RecordingSink>);
        impl FrameSink for Shared {
            fn push_frame(&self, frame: &TraceFrame) -> bool {
                self.0.push_frame(frame)
            }
        }
        tap.attach_sink(Box::new(Shared(std::rc::Rc::clone(&sink))));

        tap.tick(&BusSnapshot::idle().with_request(BusSource::CoreInstr, true, 0x0, 0x1, 0xF));
        tap.tick(&BusSnapshot::idle());
        tap.tick(&BusSnapshot::idle());
        assert_eq!(sink.frames.borrow().len(), 1);
        assert_eq!(tap.queue_len(), 1, "queue path gets the same record");
    }

    #[test]
    fn gating_off_drops_on_full_queue() {
        let mut tap = enabled_tap(TapConfig {
            fifo_depth: 1,
            ..TapConfig::default()
        });
        for tag in 0..3 {
            tap.tick(&BusSnapshot::idle().with_request(
                BusSource::CoreData,
                true,
                tag,
                tag,
                0xF,
            ));
        }
        for _ in 0..4 {
            tap.tick(&BusSnapshot::idle());
        }
        let counters = tap.counters();
        assert_eq!(tap.queue_len(), 1);
        assert!(counters.queue_overflow_dropped_total >= 2);
        assert!(!tap.halt_requested());
    }

    #[test]
    fn gating_on_pauses_instead_of_dropping() {
        let mut tap = BusTap::new(TapConfig {
            fifo_depth: 1,
            halt_req_cycles: 2,
            ..TapConfig::default()
        });
        tap.write_control(CTRL_ENABLE | CTRL_GATING_ENABLE);

        tap.tick(&BusSnapshot::idle().with_request(BusSource::CoreData, true, 1, 1, 0xF));

        // Second request arrives while the first record retires and fills
        // the depth-1 queue; halt asserts on that same tick's full edge.
        let out =
            tap.tick(&BusSnapshot::idle().with_request(BusSource::CoreData, true, 2, 2, 0xF));
        let first = out.retired.expect("first record enqueues");
        assert_eq!(first.req_timestamp, 0);
        assert!(out.halt_request);

        // Second record must not be dropped while the queue is full: it
        // stays in the table until the auto-pop drains the queue.
        let out = tap.tick(&BusSnapshot::idle());
        assert_eq!(out.retired, None);
        assert_eq!(tap.slots_occupied(), 1);
        assert!(tap.frame_available(), "auto-pop latched the first record");

        // Queue drained: the retry lands (and refills the queue, starting a
        // fresh halt pulse).
        let out = tap.tick(&BusSnapshot::idle());
        let frame = out.retired.expect("retried record enqueues after drain");
        assert_eq!(frame.req_timestamp, 1);
        assert!(out.halt_request);
        assert_eq!(tap.counters().queue_overflow_dropped_total, 0);
    }

    #[test]
    fn table_depth_one_prioritizes_scan_order() {
        let mut tap = enabled_tap(TapConfig {
            table_depth: 1,
            ..TapConfig::default()
        });
        let snap = BusSnapshot::idle()
            .with_request(BusSource::DmaRead, true, 0x8, 0x8, 0xF)
            .with_request(BusSource::CoreData, true, 0x2, 0x2, 0xF);
        tap.tick(&snap);

        assert_eq!(tap.counters().table_exhausted_total, 1);
        let out = tap.tick(&BusSnapshot::idle());
        let frame = out.retired.expect("winner retires");
        assert_eq!(frame.source, BusSource::CoreData, "higher scan priority wins");
    }

    #[test]
    fn cycle_counter_wraps() {
        let mut tap = enabled_tap(TapConfig::default());
        tap.cycle = u32::MAX;
        tap.tick(&BusSnapshot::idle());
        assert_eq!(tap.cycle(), 0);
    }
}
