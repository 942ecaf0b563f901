use crate::error::{ConfigError, InvariantViolation};
use crate::invariants::{debug_assert_occupancy, debug_assert_within_usable};
use std::fmt;

// =============================================================================
// CURSOR PROTOCOL
// =============================================================================
//
// The store tracks occupancy with two cursors and one marker per slot:
//
// - `write_cursor`: next slot a producer may fill
// - `read_cursor`:  next slot a consumer may drain
//
// Both live in [0, N) and advance modulo N. A slot is Occupied exactly when it
// lies in the circular half-open range [read_cursor, write_cursor).
//
// `write == read` means empty. Full is one step short of that: advancing the
// write cursor would make it equal to the read cursor. One slot is therefore
// always left unused and the usable capacity is N - 1.
//
// The store is not thread-safe. `SlotBuffer` owns it behind a mutex and every
// call below happens with that lock held.
//
// =============================================================================

/// Occupancy marker of a single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Marker {
    /// Free for a producer.
    #[default]
    Empty,
    /// Holds an item waiting for a consumer.
    Occupied,
}

impl Marker {
    /// Returns `true` for [`Marker::Occupied`].
    #[inline]
    pub fn is_occupied(self) -> bool {
        matches!(self, Self::Occupied)
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("0"),
            Self::Occupied => f.write_str("1"),
        }
    }
}

/// Fixed-capacity circular array of occupancy markers.
#[derive(Debug, Clone)]
pub struct SlotStore {
    markers: Box<[Marker]>,
    write_cursor: usize,
    read_cursor: usize,
}

impl SlotStore {
    /// Creates a store of `capacity` empty slots with both cursors at 0.
    ///
    /// `capacity` must be at least 2 because one slot is kept free.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity < 2 {
            return Err(ConfigError::CapacityTooSmall { capacity });
        }
        Ok(Self {
            markers: vec![Marker::Empty; capacity].into_boxed_slice(),
            write_cursor: 0,
            read_cursor: 0,
        })
    }

    /// Declared number of slots (N).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.markers.len()
    }

    /// Number of slots that can be occupied at once (N - 1).
    #[inline]
    pub fn usable_capacity(&self) -> usize {
        self.capacity() - 1
    }

    #[inline]
    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    #[inline]
    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    /// Circular distance from the read cursor to the write cursor.
    #[inline]
    pub fn len(&self) -> usize {
        distance(self.read_cursor, self.write_cursor, self.capacity())
    }

    /// Number of markers currently set to [`Marker::Occupied`].
    pub fn occupied(&self) -> usize {
        self.markers.iter().filter(|m| m.is_occupied()).count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.write_cursor == self.read_cursor
    }

    /// True when advancing the write cursor would make it meet the read cursor.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.usable_capacity()
    }

    /// Marks `at_index` occupied and moves the write cursor past it.
    ///
    /// Fails without touching the store if the slot is not empty, is not the
    /// one the write cursor points at, or is the reserved slot of a full store.
    pub fn try_advance_write(&mut self, at_index: usize) -> Result<(), InvariantViolation> {
        match self.marker(at_index)? {
            Marker::Occupied => return Err(InvariantViolation::AlreadyOccupied { index: at_index }),
            Marker::Empty => {}
        }
        if at_index != self.write_cursor {
            return Err(InvariantViolation::CursorMismatch {
                index: at_index,
                cursor: self.write_cursor,
            });
        }
        if self.is_full() {
            return Err(InvariantViolation::ReservedSlot { index: at_index });
        }

        self.markers[at_index] = Marker::Occupied;
        self.write_cursor = self.next(at_index);

        debug_assert_within_usable!(self.len(), self.usable_capacity());
        debug_assert_occupancy!(self);
        Ok(())
    }

    /// Marks `at_index` empty and moves the read cursor past it.
    ///
    /// Fails without touching the store if the slot is not occupied or is not
    /// the one the read cursor points at.
    pub fn try_advance_read(&mut self, at_index: usize) -> Result<(), InvariantViolation> {
        match self.marker(at_index)? {
            Marker::Empty => return Err(InvariantViolation::AlreadyEmpty { index: at_index }),
            Marker::Occupied => {}
        }
        if at_index != self.read_cursor {
            return Err(InvariantViolation::CursorMismatch {
                index: at_index,
                cursor: self.read_cursor,
            });
        }

        self.markers[at_index] = Marker::Empty;
        self.read_cursor = self.next(at_index);

        debug_assert_occupancy!(self);
        Ok(())
    }

    /// Read-only copy of cursors and markers.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            write_cursor: self.write_cursor,
            read_cursor: self.read_cursor,
            markers: self.markers.to_vec(),
        }
    }

    fn marker(&self, index: usize) -> Result<Marker, InvariantViolation> {
        self.markers
            .get(index)
            .copied()
            .ok_or(InvariantViolation::OutOfRange {
                index,
                capacity: self.capacity(),
            })
    }

    #[inline]
    fn next(&self, index: usize) -> usize {
        (index + 1) % self.capacity()
    }

    /// Overwrites one marker without moving any cursor.
    #[cfg(test)]
    pub(crate) fn force_marker(&mut self, index: usize, marker: Marker) {
        self.markers[index] = marker;
    }
}

#[inline]
fn distance(from: usize, to: usize, capacity: usize) -> usize {
    (to + capacity - from) % capacity
}

/// Point-in-time copy of a [`SlotStore`].
///
/// Displays as `in <write> out <read> [<m0> <m1> ...]` with `1` for occupied
/// and `0` for empty slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub write_cursor: usize,
    pub read_cursor: usize,
    pub markers: Vec<Marker>,
}

impl Snapshot {
    pub fn capacity(&self) -> usize {
        self.markers.len()
    }

    pub fn occupied(&self) -> usize {
        self.markers.iter().filter(|m| m.is_occupied()).count()
    }

    /// Circular distance from the read cursor to the write cursor.
    pub fn distance(&self) -> usize {
        distance(self.read_cursor, self.write_cursor, self.capacity())
    }

    /// Checks every marker against the cursor range, not just the counts.
    pub fn is_consistent(&self) -> bool {
        let n = self.capacity();
        if n == 0 || self.write_cursor >= n || self.read_cursor >= n {
            return false;
        }
        let len = self.distance();
        self.markers.iter().enumerate().all(|(i, m)| {
            let in_range = distance(self.read_cursor, i, n) < len;
            m.is_occupied() == in_range
        })
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in {} out {} [", self.write_cursor, self.read_cursor)?;
        for (i, marker) in self.markers.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{marker}")?;
        }
        f.write_str("]")
    }
}
