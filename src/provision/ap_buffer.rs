//! Bounded storage for access points found by the latest scan.
//!
//! The buffer has a fixed number of slots allocated up front. Starting a new
//! scan only rewinds `count`; old records stay in their slots until
//! overwritten and are reported as [`Freshness::Stale`] by [`ApResultBuffer::snapshot`].

use super::types::{AccessPointRecord, Freshness, AP_RECORD_LEN};

/// Fixed-capacity AP record storage.
#[derive(Debug, Clone)]
pub struct ApResultBuffer {
    records: Vec<AccessPointRecord>,
    count: u8,
}

impl ApResultBuffer {
    /// Create a buffer with `capacity` slots, all marked [`Freshness::None`].
    pub fn new(capacity: u8) -> Self {
        Self {
            records: vec![AccessPointRecord::default(); capacity as usize],
            count: 0,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> u8 {
        self.records.len() as u8
    }

    /// Number of records from the current scan.
    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn is_full(&self) -> bool {
        self.count as usize >= self.records.len()
    }

    /// Forget the current scan. Slot contents are left in place.
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Store `record` in the next slot as [`Freshness::Current`].
    ///
    /// Returns `false` (and stores nothing) when the buffer is full.
    pub fn try_push(&mut self, mut record: AccessPointRecord) -> bool {
        if self.is_full() {
            return false;
        }
        record.freshness = Freshness::Current;
        self.records[self.count as usize] = record;
        self.count += 1;
        true
    }

    /// Rewind `count` to an earlier value. Used to undo a [`reset`](Self::reset)
    /// when the scan it prepared for was never started.
    pub(crate) fn restore_count(&mut self, count: u8) {
        self.count = count.min(self.capacity());
    }

    /// Copy out the count and every slot.
    ///
    /// Slots past `count` that still hold a record from an earlier scan are
    /// marked [`Freshness::Stale`].
    pub fn snapshot(&self) -> (u8, Vec<AccessPointRecord>) {
        let records = self
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let mut record = *record;
                if i >= self.count as usize && record.freshness == Freshness::Current {
                    record.freshness = Freshness::Stale;
                }
                record
            })
            .collect();
        (self.count, records)
    }

    /// Encode every slot as the ap-details attribute value.
    pub fn encode(&self) -> Vec<u8> {
        let (_, records) = self.snapshot();
        let mut out = Vec::with_capacity(records.len() * AP_RECORD_LEN);
        for record in &records {
            record.encode_into(&mut out);
        }
        out
    }
}
