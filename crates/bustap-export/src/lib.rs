//! Streaming export path of the BusTap tracer.
//!
//! A lock-free SPSC ring decouples the tick-domain producer from a
//! background drain thread that persists every record to a binary log and a
//! decoded textual log, optionally sampling records to the console. The
//! whole path lives behind one lifecycle handle, [`BusExporter`], which the
//! tick engine sees only through the `bustap_core::FrameSink` seam.

pub mod config;
pub mod drain;
pub mod ring;
pub mod sink;

pub use config::{
    DEFAULT_BINARY_LOG, DEFAULT_TEXT_LOG, DRAIN_POLL_INTERVAL, ExportConfig, PRINT_ENV,
    PRINT_EVERY_ENV,
};
pub use drain::{BusExporter, ExportCounters, ExportCountersSnapshot};
pub use ring::{DEFAULT_RING_CAPACITY, FrameRing};
pub use sink::FrameSinks;
