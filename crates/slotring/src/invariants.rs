//! Debug assertion macros for slot store invariants.
//!
//! Active only in debug builds (`#[cfg(debug_assertions)]`). Release builds
//! still detect corrupted slots through the marker checks in
//! `SlotStore::try_advance_write` / `try_advance_read`, which return
//! `InvariantViolation` instead of asserting.

// =============================================================================
// Occupancy matches cursor distance
// =============================================================================

/// Assert that the number of occupied markers equals the circular distance
/// from the read cursor to the write cursor.
///
/// **Invariant**: `|{i : marker[i] = Occupied}| = (write - read) mod N`
///
/// Used in: `SlotStore::try_advance_write()`, `SlotStore::try_advance_read()`
macro_rules! debug_assert_occupancy {
    ($store:expr) => {
        debug_assert_eq!(
            $store.occupied(),
            $store.len(),
            "occupancy mismatch: {} occupied markers but cursor distance is {} (in {} out {})",
            $store.occupied(),
            $store.len(),
            $store.write_cursor(),
            $store.read_cursor()
        )
    };
}

// =============================================================================
// Bounded fill
// =============================================================================

/// Assert that the store never holds more than `N - 1` occupied slots.
///
/// **Invariant**: `(write - read) mod N ≤ N - 1`, with one slot reserved so
/// that `write == read` always means empty.
///
/// Used in: `SlotStore::try_advance_write()` after advancing the write cursor
macro_rules! debug_assert_within_usable {
    ($len:expr, $usable:expr) => {
        debug_assert!(
            $len <= $usable,
            "fill {} exceeds usable capacity {}",
            $len,
            $usable
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_occupancy;
pub(crate) use debug_assert_within_usable;
