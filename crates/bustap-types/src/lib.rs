//! Shared vocabulary of the BusTap tracer: channel identifiers, the 128-bit
//! transaction-record wire encoding, and the register-surface contract.

pub mod channel;
pub mod frame;
pub mod regmap;

pub use channel::{BusSource, CHANNEL_COUNT, SCAN_ORDER};
pub use frame::{CSV_HEADER, FRAME_BYTES, FRAME_WORDS, TraceFrame, saturating_latency};
