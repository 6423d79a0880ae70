//! Capture, correlation, queueing, and backpressure for the BusTap tracer.
//!
//! Everything in this crate lives in the synchronous tick domain: a single
//! external scheduling clock drives [`BusTap::tick`], and all state advances
//! from one consistent start-of-tick snapshot per step. The concurrent
//! streaming export lives in `bustap-export` and connects through the
//! [`FrameSink`] seam.

pub mod counters;
pub mod gating;
pub mod queue;
pub mod regfile;
pub mod snapshot;
pub mod sniffer;
pub mod table;

pub use counters::{CaptureCounters, CaptureCountersSnapshot};
pub use gating::{DEFAULT_HALT_REQ_CYCLES, GatingController};
pub use queue::{DEFAULT_FIFO_DEPTH, FrameQueue};
pub use regfile::RegisterFile;
pub use snapshot::{BusSnapshot, ChannelActivity};
pub use sniffer::{BusTap, FrameSink, TapConfig, TickOutput};
pub use table::{
    AllocateOutcome, CompleteOutcome, CorrelationTable, DEFAULT_TABLE_DEPTH,
};
