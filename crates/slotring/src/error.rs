//! Error types for slot buffer operations.
//!
//! `Full` and `Empty` are not errors: they are ordinary outcomes reported by
//! [`ProduceOutcome`](crate::ProduceOutcome) and
//! [`ConsumeOutcome`](crate::ConsumeOutcome). Everything in this module is
//! fatal for the operation that raised it.

use crate::WorkerId;
use thiserror::Error;

/// A slot was found in a state inconsistent with the cursor bookkeeping.
///
/// This is an assertion-grade failure: the caller computed an index that
/// disagrees with the full/empty checks. It is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// A producer tried to fill a slot that still holds an unconsumed item.
    #[error("slot {index} is already occupied")]
    AlreadyOccupied {
        /// The offending slot.
        index: usize,
    },
    /// A consumer tried to drain a slot that holds nothing.
    #[error("slot {index} is already empty")]
    AlreadyEmpty {
        /// The offending slot.
        index: usize,
    },
    /// The buffer is full; filling the reserved slot would make it look empty.
    #[error("slot {index} is the reserved slot of a full buffer")]
    ReservedSlot {
        /// The reserved slot under the write cursor.
        index: usize,
    },
    /// The slot is not the one the cursor points at.
    #[error("slot {index} is not at the cursor (cursor at {cursor})")]
    CursorMismatch {
        /// The slot the caller asked for.
        index: usize,
        /// Where the cursor actually is.
        cursor: usize,
    },
    /// The slot does not exist.
    #[error("slot {index} is out of range for capacity {capacity}")]
    OutOfRange {
        /// The slot the caller asked for.
        index: usize,
        /// Number of slots in the store.
        capacity: usize,
    },
}

/// Errors raised by [`SlotBuffer`](crate::SlotBuffer) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// The slot store rejected a transition requested by `worker`.
    #[error("invariant violation caused by {worker}: {source}")]
    InvariantViolation {
        /// The worker whose operation hit the violation.
        worker: WorkerId,
        /// What the slot store found.
        #[source]
        source: InvariantViolation,
    },

    /// A thread panicked while holding the buffer lock.
    #[error("buffer lock poisoned")]
    Poisoned,
}

impl BufferError {
    /// Every buffer error is unrecoverable; the worker that sees one must stop.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. } | Self::Poisoned)
    }
}

/// Rejected construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// One slot is always reserved, so fewer than two slots leaves no room.
    #[error("capacity {capacity} is too small (minimum 2)")]
    CapacityTooSmall {
        /// The requested capacity.
        capacity: usize,
    },
    /// The monitor would spin on the lock without pause.
    #[error("monitor interval must be non-zero")]
    ZeroMonitorInterval,
    /// Only producers, consumers and the monitor run a polling loop.
    #[error("{worker} has no polling loop")]
    NoLoopForRole {
        /// The identity a worker was requested for.
        worker: WorkerId,
    },
}

/// Top-level error returned by the lifecycle controller.
#[derive(Debug, Error)]
pub enum Error {
    /// The buffer could not be initialised.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A worker stopped on a fatal buffer error.
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// A worker thread panicked and could not report back.
    #[error("{worker} panicked")]
    WorkerPanicked {
        /// The worker whose thread panicked.
        worker: WorkerId,
    },

    /// The interrupt handler could not be installed.
    #[error("failed to install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),
}
