//! Fixed-width array of atomically updated counters shared by every worker
//! and the monitor.
//!
//! Counters live behind a typed object rather than raw slot indices so
//! callers can't transpose an index by accident. All slots are
//! nanosecond-denominated except the `*_COUNT`/`ABORT_*` counters, which
//! are plain counts.

use std::sync::atomic::{AtomicI64, Ordering};

/// Slot indices into the counter array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Slot {
    StartTime = 0,
    EndTime,
    OpsCount,
    RowCount,
    TxCount,
    LatencyTime,
    InactiveTime,
    OpsTime,
    TxTime,
    AbortConflict,
    AbortDeadlock,
}

const SLOT_COUNT: usize = 11;

/// The atomic counter array. Cheap to share: clone the `Arc`, not the stats.
pub struct Stats {
    slots: [AtomicI64; SLOT_COUNT],
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Stats {
            slots: std::array::from_fn(|_| AtomicI64::new(0)),
        }
    }

    pub fn get(&self, slot: Slot) -> i64 {
        self.slots[slot as usize].load(Ordering::Relaxed)
    }

    pub fn add(&self, slot: Slot, delta: i64) {
        self.slots[slot as usize].fetch_add(delta, Ordering::Relaxed);
    }

    pub fn increment(&self, slot: Slot) {
        self.add(slot, 1);
    }

    /// CAS `START_TIME` from 0 to `now_ns`. Returns `true` iff this call won
    /// the race.
    pub fn try_start(&self, now_ns: i64) -> bool {
        self.slots[Slot::StartTime as usize]
            .compare_exchange(0, now_ns, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    /// Plain store — `END_TIME` is updated at the end of every transaction,
    /// not CAS'd.
    pub fn set_end(&self, now_ns: i64) {
        self.slots[Slot::EndTime as usize].store(now_ns, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn start_time_cas_wins_once() {
        let stats = Arc::new(Stats::new());
        let mut handles = Vec::new();
        for i in 1..=8i64 {
            let stats = Arc::clone(&stats);
            handles.push(thread::spawn(move || stats.try_start(i)));
        }
        let wins: usize = handles.into_iter().map(|h| h.join().unwrap()).filter(|&w| w).count();
        assert_eq!(wins, 1);
        assert!(stats.get(Slot::StartTime) > 0);
    }

    #[test]
    fn end_time_is_plain_store_not_cas() {
        let stats = Stats::new();
        stats.set_end(5);
        stats.set_end(10);
        stats.set_end(3);
        assert_eq!(stats.get(Slot::EndTime), 3);
    }

    #[test]
    fn counters_accumulate() {
        let stats = Stats::new();
        stats.add(Slot::OpsCount, 5);
        stats.add(Slot::OpsCount, 3);
        stats.increment(Slot::TxCount);
        assert_eq!(stats.get(Slot::OpsCount), 8);
        assert_eq!(stats.get(Slot::TxCount), 1);
    }
}
