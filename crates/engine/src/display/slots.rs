// WDB - Watch-display Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Gap-tolerant slot storage for watch records.
//!
//! Slots are addressed by small 0-based indices that never move while the item
//! in them lives. Freed slots become tombstones that later allocations reuse
//! before the table grows. Capacity is tracked in multiples of [`GRANULARITY`]
//! and only shrinks once the free slack reaches two granules, so add/delete
//! cycles around a boundary do not reallocate every time.

use tracing::debug;
use wdb_common::{wdb_assert, wdb_assert_eq};

/// Growth and shrink step of the slot table
pub const GRANULARITY: usize = 8;

/// Growable slot table with tombstones and capacity hysteresis.
#[derive(Debug)]
pub struct WatchSlots<T> {
    /// Slots up to the high-water mark; `None` is a tombstone
    slots: Vec<Option<T>>,
    /// Logical capacity, always a multiple of [`GRANULARITY`]
    capacity: usize,
}

impl<T> Default for WatchSlots<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WatchSlots<T> {
    /// Create an empty, unallocated slot table
    pub fn new() -> Self {
        Self { slots: Vec::new(), capacity: 0 }
    }

    /// Store `item` in the first tombstone, or append it past the high-water mark.
    ///
    /// Returns the 0-based slot index. Appending beyond the capacity grows it by
    /// one granule.
    pub fn allocate(&mut self, item: T) -> usize {
        if let Some(index) = self.slots.iter().position(Option::is_none) {
            self.slots[index] = Some(item);
            debug!(index, "Reusing tombstoned slot");
            self.check_invariants();
            return index;
        }

        if self.slots.len() == self.capacity {
            self.capacity += GRANULARITY;
            self.slots.reserve_exact(self.capacity - self.slots.len());
            debug!(capacity = self.capacity, "Grew slot table");
        }

        self.slots.push(Some(item));
        self.check_invariants();
        self.slots.len() - 1
    }

    /// Tombstone the slot at `index` and hand back its item.
    ///
    /// Freeing the highest live slot also trims every tombstone that becomes
    /// trailing, so the high-water mark stays tight. Returns `None` when the
    /// slot is already free or was never allocated.
    pub fn free(&mut self, index: usize) -> Option<T> {
        let item = self.slots.get_mut(index)?.take()?;

        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        debug!(index, high_water = self.slots.len(), "Freed slot");

        self.check_invariants();
        Some(item)
    }

    /// Give back capacity once at least two granules are unused.
    ///
    /// The new capacity is the smallest multiple of [`GRANULARITY`] that holds the
    /// high-water mark. Returns whether the table shrank.
    pub fn maybe_shrink(&mut self) -> bool {
        if self.capacity - self.slots.len() < 2 * GRANULARITY {
            return false;
        }

        let shrunk = self.slots.len().div_ceil(GRANULARITY) * GRANULARITY;
        debug!(from = self.capacity, to = shrunk, "Shrinking slot table");
        self.capacity = shrunk;
        self.slots.shrink_to(shrunk);

        self.check_invariants();
        true
    }

    /// Drop every item and recompact the table to a single granule.
    ///
    /// Returns the number of live items that were released.
    pub fn reset_all(&mut self) -> usize {
        let released = self.live_count();
        self.slots = Vec::with_capacity(GRANULARITY);
        self.capacity = GRANULARITY;
        debug!(released, "Reset slot table");
        released
    }

    /// Item in slot `index`, if the slot is live
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)?.as_ref()
    }

    /// Mutable item in slot `index`, if the slot is live
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Whether `index` is below the high-water mark but holds no item
    pub fn is_tombstone(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(None))
    }

    /// One past the highest live slot
    pub fn high_water(&self) -> usize {
        self.slots.len()
    }

    /// Logical capacity of the table
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live items
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether no slot holds an item
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Live items with their slot indices, in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| slot.as_ref().map(|item| (i, item)))
    }

    fn check_invariants(&self) {
        wdb_assert_eq!(self.capacity % GRANULARITY, 0, "capacity must be granule aligned");
        wdb_assert!(self.slots.len() <= self.capacity, "high-water mark exceeds capacity");
        wdb_assert!(
            !matches!(self.slots.last(), Some(None)),
            "trailing tombstones must be trimmed"
        );
    }
}
