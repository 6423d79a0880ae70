//! Correlation table: pending-transaction slots.
//!
//! Each accepted request claims one slot. Writes complete at allocation;
//! reads hold their slot (`awaiting_response`) until the matching response
//! pulse arrives on the same channel. A fully resolved slot is selected,
//! handed to the completed-frame queue, and retired in the tick the queue
//! accepts it.
//!
//! Tick consistency is the caller's contract (see the tick engine): within
//! one tick, selection is evaluated first, then responses, then allocations,
//! then retirement, so every decision reads the start-of-tick state, a slot
//! retired this tick is reallocatable only next tick, and a slot completed
//! this tick is selectable only next tick.

use bustap_types::{BusSource, TraceFrame, saturating_latency};

/// Default number of pending-transaction slots.
pub const DEFAULT_TABLE_DEPTH: usize = 8;

/// Outcome of a slot allocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocateOutcome {
    /// A slot was claimed.
    Allocated(usize),
    /// No free slot; the request's trace is lost. State is untouched.
    CapacityExceeded,
}

/// Outcome of matching a response pulse against the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompleteOutcome {
    /// The first awaiting slot on the channel was filled in.
    Completed(usize),
    /// No occupied slot was awaiting a response on this channel.
    Unmatched,
}

#[derive(Debug, Clone, Copy)]
struct PendingSlot {
    awaiting_response: bool,
    frame: TraceFrame,
}

/// Fixed-capacity set of pending-transaction slots.
#[derive(Debug)]
pub struct CorrelationTable {
    slots: Vec<Option<PendingSlot>>,
}

impl CorrelationTable {
    /// Create a table with `depth` slots.
    #[must_use]
    pub fn new(depth: usize) -> Self {
        assert!(depth > 0, "table depth must be > 0");
        Self {
            slots: vec![None; depth],
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Claim the first free slot (table order) for an accepted request.
    ///
    /// Writes are complete at allocation: `data` holds the write payload and
    /// `resp_timestamp` is zero. Reads leave `data` at zero and await the
    /// response.
    pub fn try_allocate(
        &mut self,
        source: BusSource,
        write: bool,
        address: u32,
        write_data: u32,
        byte_enable: u8,
        now: u32,
    ) -> AllocateOutcome {
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            return AllocateOutcome::CapacityExceeded;
        };

        let frame = TraceFrame {
            source,
            req_timestamp: now,
            resp_timestamp: 0,
            address,
            data: if write { write_data } else { 0 },
            byte_enable,
            write,
            valid: true,
            granted: true,
        };
        self.slots[index] = Some(PendingSlot {
            awaiting_response: !write,
            frame,
        });
        AllocateOutcome::Allocated(index)
    }

    /// Fill the first occupied awaiting slot for `source` with a response.
    ///
    /// `resp_timestamp` becomes the saturated tick delta since the request.
    /// An unmatched response leaves the table untouched; the caller counts it.
    pub fn try_complete(
        &mut self,
        source: BusSource,
        response_data: u32,
        now: u32,
    ) -> CompleteOutcome {
        for (index, entry) in self.slots.iter_mut().enumerate() {
            if let Some(slot) = entry {
                if slot.awaiting_response && slot.frame.source == source {
                    slot.frame.data = response_data;
                    slot.frame.resp_timestamp =
                        saturating_latency(slot.frame.req_timestamp, now);
                    slot.awaiting_response = false;
                    return CompleteOutcome::Completed(index);
                }
            }
        }
        CompleteOutcome::Unmatched
    }

    /// The lowest-indexed occupied slot that is fully resolved, if any.
    ///
    /// This is the sole admission path into the completed-frame queue.
    #[must_use]
    pub fn select_ready(&self) -> Option<usize> {
        self.slots.iter().position(|entry| {
            entry
                .as_ref()
                .is_some_and(|slot| !slot.awaiting_response)
        })
    }

    /// The frame held by an occupied slot.
    #[must_use]
    pub fn frame(&self, slot: usize) -> Option<&TraceFrame> {
        self.slots
            .get(slot)
            .and_then(|entry| entry.as_ref().map(|slot| &slot.frame))
    }

    /// Free a slot, returning its frame. Called only in the tick the frame
    /// has been accepted downstream.
    pub fn retire(&mut self, slot: usize) -> Option<TraceFrame> {
        self.slots
            .get_mut(slot)
            .and_then(Option::take)
            .map(|slot| slot.frame)
    }
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_DEPTH)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn allocate_write(table: &mut CorrelationTable, source: BusSource, now: u32) -> AllocateOutcome {
        table.try_allocate(source, true, 0x100, 0x55, 0xF, now)
    }

    fn allocate_read(table: &mut CorrelationTable, source: BusSource, now: u32) -> AllocateOutcome {
        table.try_allocate(source, false, 0x200, 0, 0xF, now)
    }

    #[test]
    fn write_completes_at_allocation() {
        let mut table = CorrelationTable::new(4);
        assert_eq!(
            allocate_write(&mut table, BusSource::CoreData, 10),
            AllocateOutcome::Allocated(0)
        );
        let slot = table.select_ready().expect("write is ready immediately");
        let frame = table.frame(slot).expect("slot occupied");
        assert!(frame.write);
        assert_eq!(frame.resp_timestamp, 0);
        assert_eq!(frame.data, 0x55);
        assert_eq!(frame.req_timestamp, 10);
    }

    #[test]
    fn read_waits_for_response() {
        let mut table = CorrelationTable::new(4);
        allocate_read(&mut table, BusSource::Ram0, 100);
        assert_eq!(table.select_ready(), None);

        assert_eq!(
            table.try_complete(BusSource::Ram0, 0xBEEF, 107),
            CompleteOutcome::Completed(0)
        );
        let slot = table.select_ready().expect("resolved read is ready");
        let frame = table.frame(slot).expect("slot occupied");
        assert_eq!(frame.data, 0xBEEF);
        assert_eq!(frame.resp_timestamp, 7);
    }

    #[test]
    fn response_matches_first_awaiting_slot_of_its_channel() {
        let mut table = CorrelationTable::new(4);
        allocate_read(&mut table, BusSource::Ram0, 1);
        allocate_read(&mut table, BusSource::Ram1, 2);

        // Ram1's response must skip Ram0's older awaiting slot.
        assert_eq!(
            table.try_complete(BusSource::Ram1, 0x11, 5),
            CompleteOutcome::Completed(1)
        );
        assert_eq!(table.select_ready(), Some(1));
    }

    #[test]
    fn unmatched_response_leaves_state_untouched() {
        let mut table = CorrelationTable::new(2);
        allocate_write(&mut table, BusSource::CoreData, 1);
        let before = *table.frame(0).expect("occupied");

        assert_eq!(
            table.try_complete(BusSource::CoreData, 0xFF, 9),
            CompleteOutcome::Unmatched,
            "writes never await a response"
        );
        assert_eq!(*table.frame(0).expect("occupied"), before);
        assert_eq!(
            table.try_complete(BusSource::Flash, 0xFF, 9),
            CompleteOutcome::Unmatched
        );
    }

    #[test]
    fn allocation_beyond_capacity_fails_without_mutation() {
        let mut table = CorrelationTable::new(2);
        allocate_write(&mut table, BusSource::CoreInstr, 1);
        allocate_read(&mut table, BusSource::CoreData, 2);
        assert_eq!(table.occupied(), 2);

        assert_eq!(
            allocate_write(&mut table, BusSource::Flash, 3),
            AllocateOutcome::CapacityExceeded
        );
        assert_eq!(table.occupied(), 2);
        // The awaiting read is still matchable afterwards.
        assert_eq!(
            table.try_complete(BusSource::CoreData, 0x1, 4),
            CompleteOutcome::Completed(1)
        );
    }

    #[test]
    fn retire_frees_the_slot_for_reallocation() {
        let mut table = CorrelationTable::new(1);
        allocate_write(&mut table, BusSource::DmaRead, 1);
        assert_eq!(
            allocate_write(&mut table, BusSource::DmaWrite, 1),
            AllocateOutcome::CapacityExceeded
        );

        let frame = table.retire(0).expect("occupied slot retires");
        assert_eq!(frame.source, BusSource::DmaRead);
        assert_eq!(table.occupied(), 0);
        assert_eq!(
            allocate_write(&mut table, BusSource::DmaWrite, 2),
            AllocateOutcome::Allocated(0)
        );
    }

    #[test]
    fn select_ready_prefers_lowest_index() {
        let mut table = CorrelationTable::new(4);
        allocate_read(&mut table, BusSource::Ram0, 1); // slot 0, awaiting
        allocate_write(&mut table, BusSource::CoreData, 2); // slot 1, ready
        allocate_write(&mut table, BusSource::Flash, 3); // slot 2, ready
        assert_eq!(table.select_ready(), Some(1));

        table.try_complete(BusSource::Ram0, 0xAA, 4);
        assert_eq!(table.select_ready(), Some(0));
    }

    #[test]
    fn latency_saturates_to_field_width() {
        let mut table = CorrelationTable::new(1);
        allocate_read(&mut table, BusSource::Flash, 0);
        table.try_complete(BusSource::Flash, 0x9, 0x12_3456);
        let frame = table.frame(0).expect("occupied");
        assert_eq!(frame.resp_timestamp, u16::MAX);
    }
}
