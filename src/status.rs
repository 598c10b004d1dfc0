//! Entity status flags
//!
//! Every simulated entity accumulates status flags over its lifetime
//! rather than holding a single state; a completed packet, for example,
//! is `CREATED | SCHEDULED | ... | COMPLETED | TERMINATED`. The set is a
//! bit mask so that monitors can test membership cheaply.

use serde::{Deserialize, Serialize};

/// A single lifecycle flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum Status {
    Created = 1 << 0,
    Started = 1 << 1,
    Scheduled = 1 << 2,
    Cached = 1 << 3,
    Executing = 1 << 4,
    Completed = 1 << 5,
    Failed = 1 << 6,
    Terminated = 1 << 7,
    Ready = 1 << 8,
    Cordon = 1 << 9,
    PoweredOn = 1 << 10,
    PoweredOff = 1 << 11,
    Queued = 1 << 12,
    Decoded = 1 << 13,
    Transmitting = 1 << 14,
    Dropped = 1 << 15,
    Provisioned = 1 << 16,
}

/// Accumulated status flags of an entity
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusSet(u32);

impl StatusSet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, status: Status) {
        self.0 |= status as u32;
    }

    pub fn remove(&mut self, status: Status) {
        self.0 &= !(status as u32);
    }

    pub fn contains(self, status: Status) -> bool {
        self.0 & status as u32 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove() {
        let mut set = StatusSet::new();
        assert!(set.is_empty());

        set.insert(Status::Created);
        set.insert(Status::Scheduled);
        assert!(set.contains(Status::Created));
        assert!(set.contains(Status::Scheduled));
        assert!(!set.contains(Status::Terminated));

        set.remove(Status::Scheduled);
        assert!(!set.contains(Status::Scheduled));
        assert!(set.contains(Status::Created));
    }

    #[test]
    fn remove_absent_flag_is_noop() {
        let mut set = StatusSet::new();
        set.insert(Status::Queued);
        set.remove(Status::Decoded);
        assert!(set.contains(Status::Queued));
    }
}
