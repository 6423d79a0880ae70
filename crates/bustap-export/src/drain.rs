//! Exporter lifecycle: ring + drain thread + sinks under one handle.
//!
//! [`BusExporter`] is the streaming consumer of the completion event stream.
//! Construction opens (and truncates) both sinks so a bad path fails fast;
//! the drain thread itself starts lazily on the first pushed frame and then
//! runs until [`shutdown`]. Shutdown is cooperative and idempotent: a shared
//! flag stops the loop, the caller joins the thread (bounded by one poll
//! interval), and the thread performs a final sweep and flush before
//! exiting. Dropping the handle shuts it down as well.
//!
//! [`shutdown`]: BusExporter::shutdown

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

use bustap_core::FrameSink;
use bustap_error::Result;
use bustap_types::TraceFrame;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::config::{DRAIN_POLL_INTERVAL, ExportConfig};
use crate::ring::FrameRing;
use crate::sink::FrameSinks;

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Atomic counters of the export path (producer and consumer sides).
#[derive(Debug, Default)]
pub struct ExportCounters {
    /// Frames persisted to both logs.
    frames_exported_total: AtomicU64,
    /// Frames dropped by the producer because the ring was full.
    ring_dropped_total: AtomicU64,
    /// Frames mirrored to the console.
    console_printed_total: AtomicU64,
    /// Sink write failures (the first one stops the drain loop).
    sink_errors_total: AtomicU64,
}

impl ExportCounters {
    fn record_exported(&self) {
        self.frames_exported_total.fetch_add(1, Ordering::Relaxed);
    }

    fn record_ring_drop(&self) {
        self.ring_dropped_total.fetch_add(1, Ordering::Relaxed);
    }

    fn record_console_print(&self) {
        self.console_printed_total.fetch_add(1, Ordering::Relaxed);
    }

    fn record_sink_error(&self) {
        self.sink_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ExportCountersSnapshot {
        ExportCountersSnapshot {
            frames_exported_total: self.frames_exported_total.load(Ordering::Relaxed),
            ring_dropped_total: self.ring_dropped_total.load(Ordering::Relaxed),
            console_printed_total: self.console_printed_total.load(Ordering::Relaxed),
            sink_errors_total: self.sink_errors_total.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of [`ExportCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportCountersSnapshot {
    pub frames_exported_total: u64,
    pub ring_dropped_total: u64,
    pub console_printed_total: u64,
    pub sink_errors_total: u64,
}

impl fmt::Display for ExportCountersSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exported={} ring_dropped={} console_printed={} sink_errors={}",
            self.frames_exported_total,
            self.ring_dropped_total,
            self.console_printed_total,
            self.sink_errors_total,
        )
    }
}

// ---------------------------------------------------------------------------
// Drain thread
// ---------------------------------------------------------------------------

struct ConsoleSampler {
    enabled: bool,
    every: u32,
    seen: u32,
}

impl ConsoleSampler {
    fn observe(&mut self, frame: &TraceFrame, counters: &ExportCounters) {
        if !self.enabled {
            return;
        }
        self.seen = self.seen.wrapping_add(1);
        if self.seen % self.every == 0 {
            eprintln!("{frame}");
            counters.record_console_print();
        }
    }
}

/// Drain every currently-buffered frame into the sinks. Returns how many
/// frames were written, or the first sink error.
fn drain_batch(
    ring: &FrameRing,
    sinks: &mut FrameSinks,
    sampler: &mut ConsoleSampler,
    counters: &ExportCounters,
) -> Result<usize> {
    let mut written = 0usize;
    while let Some(words) = ring.pop() {
        match TraceFrame::from_words(words) {
            Ok(frame) => {
                sinks.append(&frame)?;
                counters.record_exported();
                sampler.observe(&frame, counters);
                written += 1;
            }
            Err(err) => {
                // Only reachable if a producer bypassed the frame encoder.
                warn!(%err, "skipping undecodable ring entry");
            }
        }
    }
    if written > 0 {
        sinks.flush()?;
    }
    Ok(written)
}

fn drain_loop(
    ring: &FrameRing,
    mut sinks: FrameSinks,
    mut sampler: ConsoleSampler,
    running: &AtomicBool,
    counters: &ExportCounters,
) {
    debug!("export drain started");
    while running.load(Ordering::Acquire) {
        match drain_batch(ring, &mut sinks, &mut sampler, counters) {
            Ok(_) => std::thread::sleep(DRAIN_POLL_INTERVAL),
            Err(err) => {
                error!(%err, "sink write failed, stopping export drain");
                counters.record_sink_error();
                return;
            }
        }
    }

    // Final sweep so frames pushed just before shutdown still land, then
    // flush whatever the writers hold.
    if let Err(err) = drain_batch(ring, &mut sinks, &mut sampler, counters) {
        error!(%err, "final export sweep failed");
        counters.record_sink_error();
    } else if let Err(err) = sinks.flush() {
        error!(%err, "final export flush failed");
        counters.record_sink_error();
    }
    debug!("export drain stopped");
}

// ---------------------------------------------------------------------------
// Lifecycle handle
// ---------------------------------------------------------------------------

struct DrainControl {
    /// Sinks parked here between construction and the lazy thread start.
    sinks: Option<FrameSinks>,
    thread: Option<JoinHandle<()>>,
}

/// The streaming export handle: ring, sinks, and drain thread.
///
/// `push_frame` is single-producer; `shutdown` may be called from any
/// thread and is idempotent.
pub struct BusExporter {
    ring: Arc<FrameRing>,
    counters: Arc<ExportCounters>,
    running: Arc<AtomicBool>,
    started: AtomicBool,
    closed: AtomicBool,
    control: Mutex<DrainControl>,
    console_print: bool,
    print_every: u32,
}

impl BusExporter {
    /// Open both sinks (truncating any previous run) and prepare the ring.
    /// The drain thread starts on the first pushed frame.
    ///
    /// # Errors
    ///
    /// [`bustap_error::TapError::SinkOpen`] if either log cannot be created.
    pub fn new(config: ExportConfig) -> Result<Self> {
        let config = config.validated();
        let sinks = FrameSinks::open(&config)?;
        Ok(Self {
            ring: Arc::new(FrameRing::with_capacity(config.ring_capacity)),
            counters: Arc::new(ExportCounters::default()),
            running: Arc::new(AtomicBool::new(true)),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            control: Mutex::new(DrainControl {
                sinks: Some(sinks),
                thread: None,
            }),
            console_print: config.console_print,
            print_every: config.print_every,
        })
    }

    /// Offer one completed record to the streaming path.
    ///
    /// Returns `false`, counting the drop, when the ring is full or the
    /// exporter is shut down. Never blocks.
    pub fn push_frame(&self, frame: &TraceFrame) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        if !self.started.load(Ordering::Acquire) {
            self.start_drain();
        }
        let accepted = self.ring.push(frame);
        if !accepted {
            self.counters.record_ring_drop();
        }
        accepted
    }

    fn start_drain(&self) {
        let mut control = self.control.lock();
        if self.started.load(Ordering::Acquire) {
            return;
        }
        let Some(sinks) = control.sinks.take() else {
            return;
        };

        let ring = Arc::clone(&self.ring);
        let counters = Arc::clone(&self.counters);
        let running = Arc::clone(&self.running);
        let sampler = ConsoleSampler {
            enabled: self.console_print,
            every: self.print_every.max(1),
            seen: 0,
        };
        control.thread = Some(std::thread::spawn(move || {
            drain_loop(&ring, sinks, sampler, &running, &counters);
        }));
        self.started.store(true, Ordering::Release);
    }

    /// Counters snapshot (both producer- and consumer-side).
    #[must_use]
    pub fn counters(&self) -> ExportCountersSnapshot {
        self.counters.snapshot()
    }

    /// Frames currently buffered in the ring.
    #[must_use]
    pub fn backlog(&self) -> usize {
        self.ring.len()
    }

    /// Stop the drain thread, final-flush both sinks, and release the ring.
    ///
    /// Idempotent; safe to call from a different thread than the producer.
    /// Returns once the drain thread has exited (bounded by one poll
    /// interval plus the final sweep).
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.running.store(false, Ordering::Release);
        let thread = self.control.lock().thread.take();
        if let Some(handle) = thread {
            if handle.join().is_err() {
                error!("export drain thread panicked");
            }
        }
    }
}

impl Drop for BusExporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl FrameSink for BusExporter {
    fn push_frame(&self, frame: &TraceFrame) -> bool {
        Self::push_frame(self, frame)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use bustap_types::BusSource;

    use super::*;

    fn config_in(dir: &std::path::Path) -> ExportConfig {
        ExportConfig {
            binary_path: dir.join("frames.bin"),
            text_path: dir.join("frames.csv"),
            ring_capacity: 8,
            ..ExportConfig::default()
        }
    }

    fn frame(tag: u32) -> TraceFrame {
        TraceFrame {
            source: BusSource::CoreData,
            req_timestamp: tag,
            resp_timestamp: 0,
            address: tag,
            data: tag,
            byte_enable: 0xF,
            write: true,
            valid: true,
            granted: true,
        }
    }

    #[test]
    fn shutdown_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exporter = BusExporter::new(config_in(dir.path())).expect("exporter");
        assert!(exporter.push_frame(&frame(1)));
        exporter.shutdown();
        exporter.shutdown();
        assert!(!exporter.push_frame(&frame(2)), "closed exporter drops");
    }

    #[test]
    fn frames_pushed_before_shutdown_are_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());
        let exporter = BusExporter::new(config.clone()).expect("exporter");
        for tag in 0..5 {
            assert!(exporter.push_frame(&frame(tag)));
        }
        exporter.shutdown();

        let binary = std::fs::read(&config.binary_path).expect("binary log");
        assert_eq!(binary.len(), 5 * bustap_types::FRAME_BYTES);
        assert_eq!(exporter.counters().frames_exported_total, 5);
    }

    #[test]
    fn ring_overflow_is_counted_not_blocking() {
        let dir = tempfile::tempdir().expect("tempdir");
        // Capacity 2 leaves a single usable slot; the drain thread may or
        // may not keep up, but pushes never block either way.
        let config = ExportConfig {
            ring_capacity: 2,
            ..config_in(dir.path())
        };
        let exporter = BusExporter::new(config).expect("exporter");
        let mut accepted = 0u64;
        for tag in 0..1_000 {
            if exporter.push_frame(&frame(tag)) {
                accepted += 1;
            }
        }
        exporter.shutdown();
        let counters = exporter.counters();
        assert_eq!(counters.ring_dropped_total + accepted, 1_000);
        assert_eq!(counters.frames_exported_total, accepted);
    }

    #[test]
    fn drain_does_not_start_without_frames() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exporter = BusExporter::new(config_in(dir.path())).expect("exporter");
        assert!(!exporter.started.load(Ordering::Acquire));
        exporter.shutdown();
    }
}
