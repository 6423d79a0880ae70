//! Transaction record ("frame") wire encoding.
//!
//! A completed bus transaction is described by one immutable 128-bit frame,
//! split most-significant-word-first into four 32-bit words `w0..w3`:
//!
//! ```text
//! Bits      Field         Width
//! 127..124  source          4    channel id (BusSource)
//! 123..92   req_timestamp  32    cycle counter at request acceptance
//!  91..76   resp_timestamp 16    cycles to response, saturating; 0 = write
//!  75..44   address        32
//!  43..12   data           32    write payload or read result
//!  11..8    byte_enable     4
//!      7    write           1
//!      6    valid           1
//!      5    granted         1
//!   4..0    reserved        5    encoded as zero
//! ```
//!
//! The persisted binary form is `w0,w1,w2,w3` in that order, each word
//! little-endian: 16 bytes per record, no header, no framing. Exact bit
//! positions are a compatibility contract for persisted logs.

use std::fmt;

use bustap_error::{Result, TapError};
use serde::Serialize;

use crate::channel::BusSource;

/// Size of one encoded frame in bytes.
pub const FRAME_BYTES: usize = 16;

/// Number of 32-bit words per encoded frame.
pub const FRAME_WORDS: usize = 4;

/// Header line of the textual (CSV) log.
pub const CSV_HEADER: &str = "src,req_ts,resp_ts,address,data,be,we,valid,gnt";

/// One completed bus transaction. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TraceFrame {
    /// Originating channel.
    pub source: BusSource,
    /// Cycle counter value when the request was accepted (request ∧ grant).
    pub req_timestamp: u32,
    /// Elapsed cycles until the response, saturated to 16 bits.
    /// Zero for writes, which complete at acceptance.
    pub resp_timestamp: u16,
    /// Transaction address.
    pub address: u32,
    /// Write payload, or read result once the response arrived.
    pub data: u32,
    /// Byte-enable mask (low 4 bits significant).
    pub byte_enable: u8,
    /// Write transaction flag.
    pub write: bool,
    /// Request-valid flag as sampled at acceptance.
    pub valid: bool,
    /// Grant flag as sampled at acceptance.
    pub granted: bool,
}

impl TraceFrame {
    /// Encode into the four wire words, most significant word first.
    #[must_use]
    pub fn to_words(&self) -> [u32; FRAME_WORDS] {
        let src = u32::from(self.source.id() & 0xF);
        let req = self.req_timestamp;
        let resp = u32::from(self.resp_timestamp);
        let be = u32::from(self.byte_enable & 0xF);

        let w0 = (src << 28) | (req >> 4);
        let w1 = ((req & 0xF) << 28) | (resp << 12) | (self.address >> 20);
        let w2 = ((self.address & 0xF_FFFF) << 12) | (self.data >> 20);
        let w3 = ((self.data & 0xF_FFFF) << 12)
            | (be << 8)
            | (u32::from(self.write) << 7)
            | (u32::from(self.valid) << 6)
            | (u32::from(self.granted) << 5);

        [w0, w1, w2, w3]
    }

    /// Decode from the four wire words.
    ///
    /// Reserved bits are ignored. Frames produced by [`to_words`] always
    /// round-trip exactly.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::UnknownChannel`] if the source field is outside
    /// the known channel set.
    ///
    /// [`to_words`]: TraceFrame::to_words
    pub fn from_words(words: [u32; FRAME_WORDS]) -> Result<Self> {
        let [w0, w1, w2, w3] = words;

        let id = u8::try_from((w0 >> 28) & 0xF).expect("4-bit field fits u8");
        let source = BusSource::from_id(id)?;

        let req_timestamp = ((w0 & 0x0FFF_FFFF) << 4) | (w1 >> 28);
        let resp_timestamp =
            u16::try_from((w1 >> 12) & 0xFFFF).expect("16-bit field fits u16");
        let address = ((w1 & 0xFFF) << 20) | (w2 >> 12);
        let data = ((w2 & 0xFFF) << 20) | (w3 >> 12);
        let byte_enable = u8::try_from((w3 >> 8) & 0xF).expect("4-bit field fits u8");

        Ok(Self {
            source,
            req_timestamp,
            resp_timestamp,
            address,
            data,
            byte_enable,
            write: (w3 >> 7) & 1 == 1,
            valid: (w3 >> 6) & 1 == 1,
            granted: (w3 >> 5) & 1 == 1,
        })
    }

    /// Encode into the 16-byte persisted form (words MSW-first, each word
    /// little-endian).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; FRAME_BYTES] {
        let words = self.to_words();
        let mut buf = [0u8; FRAME_BYTES];
        for (chunk, word) in buf.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        buf
    }

    /// Decode from the 16-byte persisted form.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::ShortRead`] if `buf` holds fewer than
    /// [`FRAME_BYTES`] bytes, or [`TapError::UnknownChannel`] for a source
    /// id outside the known set.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < FRAME_BYTES {
            return Err(TapError::ShortRead {
                expected: FRAME_BYTES,
                actual: buf.len(),
            });
        }
        let mut words = [0u32; FRAME_WORDS];
        for (word, chunk) in words.iter_mut().zip(buf.chunks_exact(4)) {
            *word = u32::from_le_bytes(chunk.try_into().expect("4-byte chunk"));
        }
        Self::from_words(words)
    }

    /// One textual-log line for this frame (no trailing newline).
    ///
    /// Field order matches [`CSV_HEADER`]; address and data are hexadecimal.
    #[must_use]
    pub fn csv_line(&self) -> String {
        format!(
            "{},{},{},0x{:08X},0x{:08X},{:X},{},{},{}",
            self.source.id(),
            self.req_timestamp,
            self.resp_timestamp,
            self.address,
            self.data,
            self.byte_enable & 0xF,
            u8::from(self.write),
            u8::from(self.valid),
            u8::from(self.granted),
        )
    }
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "src={} req_ts={:08X} resp_ts={:04X} addr={:08X} data={:08X} be={:X} we={} v={} g={}",
            self.source,
            self.req_timestamp,
            self.resp_timestamp,
            self.address,
            self.data,
            self.byte_enable & 0xF,
            u8::from(self.write),
            u8::from(self.valid),
            u8::from(self.granted),
        )
    }
}

/// Elapsed ticks between request acceptance and response, saturated to the
/// 16-bit `resp_timestamp` field. The cycle counter wraps at 32 bits, so the
/// delta is computed with wrapping subtraction.
#[must_use]
pub fn saturating_latency(req_timestamp: u32, now: u32) -> u16 {
    let delta = now.wrapping_sub(req_timestamp);
    u16::try_from(delta).unwrap_or(u16::MAX)
}

// ===========================================================================
// Tests
// ===========================================================================
