//! Fixed-capacity history of raw labels
//!
//! The majority vote over this window is what turns per-frame noise into a
//! stable status.

use crate::error::TrackerError;
use crate::types::Label;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Circular buffer of the most recent raw labels, oldest evicted first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryBuffer {
    slots: Vec<Option<Label>>,
    /// Slot holding the oldest label
    head: usize,
    len: usize,
}

impl HistoryBuffer {
    /// Create an empty buffer. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a label, returning the evicted oldest label when full
    pub fn push(&mut self, label: Label) -> Option<Label> {
        let capacity = self.capacity();
        if self.len < capacity {
            let tail = (self.head + self.len) % capacity;
            self.slots[tail] = Some(label);
            self.len += 1;
            None
        } else {
            let evicted = self.slots[self.head].replace(label);
            self.head = (self.head + 1) % capacity;
            evicted
        }
    }

    /// Labels from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Label> + '_ {
        let capacity = self.capacity();
        (0..self.len).filter_map(move |i| self.slots[(self.head + i) % capacity].as_ref())
    }

    /// Most frequent label in the window.
    ///
    /// Scans oldest to newest and only replaces the leader on a strictly
    /// higher count, so among tied labels the one that reached the count
    /// first wins. `None` when the buffer is empty.
    pub fn majority(&self) -> Option<&Label> {
        let mut counts: HashMap<&Label, usize> = HashMap::with_capacity(self.len);
        let mut leader = None;
        let mut leader_count = 0;

        for label in self.iter() {
            let count = counts.entry(label).or_insert(0);
            *count += 1;
            if *count > leader_count {
                leader_count = *count;
                leader = Some(label);
            }
        }

        leader
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.len = 0;
    }

    /// Verify a deserialized buffer is internally consistent
    pub(crate) fn check_integrity(&self, expected_capacity: usize) -> Result<(), TrackerError> {
        let capacity = self.capacity();
        if capacity != expected_capacity {
            return Err(TrackerError::StateError(format!(
                "history capacity {capacity} does not match historySize {expected_capacity}"
            )));
        }
        if self.head >= capacity || self.len > capacity {
            return Err(TrackerError::StateError(
                "history head or length out of range".to_string(),
            ));
        }
        let occupied = self.slots.iter().filter(|slot| slot.is_some()).count();
        if occupied != self.len || self.iter().count() != self.len {
            return Err(TrackerError::StateError(
                "history slots do not match recorded length".to_string(),
            ));
        }
        Ok(())
    }
}
