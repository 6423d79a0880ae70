//! Monitored bus channels and their fixed scan order.

use std::fmt;

use bustap_error::TapError;
use serde::Serialize;

/// Number of monitored channels.
pub const CHANNEL_COUNT: usize = 10;

/// One independently-arbitrated request/response interface being observed.
///
/// The discriminant is the 4-bit `source` field of the frame encoding and is
/// part of the wire contract; ids start at 1 (0 is never emitted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum BusSource {
    /// Core instruction fetch port.
    CoreInstr = 1,
    /// Core data port.
    CoreData = 2,
    /// Always-on peripheral subsystem port.
    AoPeriph = 3,
    /// Peripheral subsystem port.
    Periph = 4,
    /// RAM bank 0 port.
    Ram0 = 5,
    /// RAM bank 1 port.
    Ram1 = 6,
    /// Flash / memory-mapped region port.
    Flash = 7,
    /// DMA read port.
    DmaRead = 8,
    /// DMA write port.
    DmaWrite = 9,
    /// DMA address port.
    DmaAddr = 10,
}

/// Fixed channel scan order.
///
/// Under simultaneous requests, correlation slots are claimed in this order;
/// it affects fairness only, never correctness.
pub const SCAN_ORDER: [BusSource; CHANNEL_COUNT] = [
    BusSource::CoreInstr,
    BusSource::CoreData,
    BusSource::AoPeriph,
    BusSource::Periph,
    BusSource::Ram0,
    BusSource::Ram1,
    BusSource::Flash,
    BusSource::DmaRead,
    BusSource::DmaWrite,
    BusSource::DmaAddr,
];

impl BusSource {
    /// The 4-bit wire id of this channel.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Look up a channel by wire id.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::UnknownChannel`] for ids outside `1..=10`.
    pub const fn from_id(id: u8) -> Result<Self, TapError> {
        match id {
            1 => Ok(Self::CoreInstr),
            2 => Ok(Self::CoreData),
            3 => Ok(Self::AoPeriph),
            4 => Ok(Self::Periph),
            5 => Ok(Self::Ram0),
            6 => Ok(Self::Ram1),
            7 => Ok(Self::Flash),
            8 => Ok(Self::DmaRead),
            9 => Ok(Self::DmaWrite),
            10 => Ok(Self::DmaAddr),
            id => Err(TapError::UnknownChannel { id }),
        }
    }

    /// Symbolic name, matching the decoded-log vocabulary.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CoreInstr => "CORE_INSTR",
            Self::CoreData => "CORE_DATA",
            Self::AoPeriph => "AO_PERIPH",
            Self::Periph => "PERIPH",
            Self::Ram0 => "RAM0",
            Self::Ram1 => "RAM1",
            Self::Flash => "FLASH",
            Self::DmaRead => "DMA_READ",
            Self::DmaWrite => "DMA_WRITE",
            Self::DmaAddr => "DMA_ADDR",
        }
    }

    /// Position of this channel in [`SCAN_ORDER`].
    #[must_use]
    pub fn scan_index(self) -> usize {
        // Ids are 1-based and SCAN_ORDER lists them in id order.
        usize::from(self.id()) - 1
    }
}

impl fmt::Display for BusSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for source in SCAN_ORDER {
            let back = BusSource::from_id(source.id()).expect("known id");
            assert_eq!(back, source);
        }
    }

    #[test]
    fn unknown_ids_rejected() {
        assert!(BusSource::from_id(0).is_err());
        assert!(BusSource::from_id(11).is_err());
        assert!(BusSource::from_id(0xF).is_err());
    }

    #[test]
    fn scan_order_matches_ids() {
        for (index, source) in SCAN_ORDER.iter().enumerate() {
            assert_eq!(source.scan_index(), index);
            assert_eq!(usize::from(source.id()), index + 1);
        }
    }

    #[test]
    fn names_are_stable() {
        assert_eq!(BusSource::CoreInstr.name(), "CORE_INSTR");
        assert_eq!(BusSource::DmaAddr.name(), "DMA_ADDR");
        assert_eq!(BusSource::Ram1.to_string(), "RAM1");
    }
}
