//! Per-tick observation of the monitored channels.
//!
//! Each scheduling tick the driver fills one [`BusSnapshot`]: the sampled
//! request/grant/response signals of every monitored channel. Snapshots are
//! pure data; building one has no effect on the monitored system, and the
//! capture pipeline never mutates one.
//!
//! Channels are held in the fixed [`SCAN_ORDER`]; iteration order is the
//! slot-allocation priority under simultaneous requests.

use bustap_types::{BusSource, CHANNEL_COUNT, SCAN_ORDER};

/// Signals sampled from one channel during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelActivity {
    /// Request line asserted.
    pub request: bool,
    /// Grant line asserted.
    pub grant: bool,
    /// Write-enable line.
    pub write: bool,
    /// Address lines.
    pub address: u32,
    /// Write-data lines (meaningful for writes).
    pub write_data: u32,
    /// Byte-enable lines (low 4 bits).
    pub byte_enable: u8,
    /// Response-valid pulse observed this tick.
    pub response_valid: bool,
    /// Response-data lines (meaningful when `response_valid`).
    pub response_data: u32,
}

impl ChannelActivity {
    /// A channel with no activity this tick.
    pub const IDLE: Self = Self {
        request: false,
        grant: false,
        write: false,
        address: 0,
        write_data: 0,
        byte_enable: 0,
        response_valid: false,
        response_data: 0,
    };

    /// Whether a request was accepted this tick (request ∧ grant).
    #[inline]
    #[must_use]
    pub const fn accepted(&self) -> bool {
        self.request && self.grant
    }
}

impl Default for ChannelActivity {
    fn default() -> Self {
        Self::IDLE
    }
}

/// The full set of channel observations for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusSnapshot {
    channels: [ChannelActivity; CHANNEL_COUNT],
}

impl BusSnapshot {
    /// A snapshot with every channel idle.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    /// The observation for one channel.
    #[must_use]
    pub fn channel(&self, source: BusSource) -> &ChannelActivity {
        &self.channels[source.scan_index()]
    }

    /// Mutable access for snapshot builders/drivers.
    pub fn channel_mut(&mut self, source: BusSource) -> &mut ChannelActivity {
        &mut self.channels[source.scan_index()]
    }

    /// Record an accepted request on `source` this tick.
    #[must_use]
    pub fn with_request(
        mut self,
        source: BusSource,
        write: bool,
        address: u32,
        write_data: u32,
        byte_enable: u8,
    ) -> Self {
        let ch = self.channel_mut(source);
        ch.request = true;
        ch.grant = true;
        ch.write = write;
        ch.address = address;
        ch.write_data = write_data;
        ch.byte_enable = byte_enable;
        self
    }

    /// Record a response-valid pulse on `source` this tick.
    #[must_use]
    pub fn with_response(mut self, source: BusSource, response_data: u32) -> Self {
        let ch = self.channel_mut(source);
        ch.response_valid = true;
        ch.response_data = response_data;
        self
    }

    /// Iterate channels in scan (priority) order.
    pub fn iter(&self) -> impl Iterator<Item = (BusSource, &ChannelActivity)> {
        SCAN_ORDER
            .iter()
            .map(move |&source| (source, self.channel(source)))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
