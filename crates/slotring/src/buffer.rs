use crate::error::{BufferError, ConfigError};
use crate::slots::{SlotStore, Snapshot};
use crate::sync::{Mutex, MutexGuard};
use crate::WorkerId;
use crossbeam_utils::CachePadded;
use std::fmt;
use tracing::{debug, error, trace};

/// Result of a [`SlotBuffer::produce`] call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProduceOutcome {
    /// The slot at `slot` was filled.
    Produced { slot: usize },
    /// No free slot; nothing changed. Poll again later.
    Full,
}

impl ProduceOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Produced { .. })
    }
}

/// Result of a [`SlotBuffer::consume`] call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The slot at `slot` was drained.
    Consumed { slot: usize },
    /// Nothing to drain; nothing changed. Poll again later.
    Empty,
}

impl ConsumeOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Consumed { .. })
    }
}

/// Everything guarded by the buffer lock.
struct State {
    slots: SlotStore,
    terminate: bool,
}

/// Slot store plus termination flag behind a single mutex.
///
/// Every read or write of cursors, markers or the flag happens with the lock
/// held, so a marker flip and its cursor advance are always observed together.
/// None of the operations wait for space or data: `produce` and `consume`
/// return [`ProduceOutcome::Full`] / [`ConsumeOutcome::Empty`] immediately and
/// the caller decides when to poll again.
///
/// Share it between threads with `Arc<SlotBuffer>`.
pub struct SlotBuffer {
    state: CachePadded<Mutex<State>>,
    capacity: usize,
}

impl SlotBuffer {
    /// Creates a buffer of `capacity` slots (usable capacity `capacity - 1`).
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        let slots = SlotStore::new(capacity)?;
        Ok(Self::from_store(slots))
    }

    fn from_store(slots: SlotStore) -> Self {
        let capacity = slots.capacity();
        Self {
            state: CachePadded::new(Mutex::new(State {
                slots,
                terminate: false,
            })),
            capacity,
        }
    }

    /// Declared number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fills the slot under the write cursor unless the buffer is full.
    ///
    /// An [`InvariantViolation`](BufferError::InvariantViolation) means the
    /// full check and the slot markers disagree. It is logged and returned,
    /// never retried.
    pub fn produce(&self, worker: WorkerId) -> Result<ProduceOutcome, BufferError> {
        let mut state = self.lock(worker)?;
        if state.slots.is_full() {
            trace!(%worker, "buffer full");
            return Ok(ProduceOutcome::Full);
        }

        let slot = state.slots.write_cursor();
        match state.slots.try_advance_write(slot) {
            Ok(()) => {
                debug!(%worker, slot, "produced");
                Ok(ProduceOutcome::Produced { slot })
            }
            Err(source) => {
                error!(%worker, slot, snapshot = %state.slots.snapshot(), "{source}");
                Err(BufferError::InvariantViolation { worker, source })
            }
        }
    }

    /// Drains the slot under the read cursor unless the buffer is empty.
    pub fn consume(&self, worker: WorkerId) -> Result<ConsumeOutcome, BufferError> {
        let mut state = self.lock(worker)?;
        if state.slots.is_empty() {
            trace!(%worker, "buffer empty");
            return Ok(ConsumeOutcome::Empty);
        }

        let slot = state.slots.read_cursor();
        match state.slots.try_advance_read(slot) {
            Ok(()) => {
                debug!(%worker, slot, "consumed");
                Ok(ConsumeOutcome::Consumed { slot })
            }
            Err(source) => {
                error!(%worker, slot, snapshot = %state.slots.snapshot(), "{source}");
                Err(BufferError::InvariantViolation { worker, source })
            }
        }
    }

    /// Sets the termination flag. The flag never resets.
    ///
    /// Returns `true` only for the call that flipped it, so callers can
    /// acknowledge shutdown once. Works on a poisoned lock as well: a panicked
    /// worker must not be able to block shutdown.
    pub fn request_terminate(&self) -> bool {
        let mut state = self.lock_ignoring_poison(WorkerId::controller());
        let first = !state.terminate;
        state.terminate = true;
        first
    }

    /// Reads the termination flag.
    pub fn should_terminate(&self, worker: WorkerId) -> Result<bool, BufferError> {
        Ok(self.lock(worker)?.terminate)
    }

    /// Copies cursors and markers under the lock.
    pub fn snapshot(&self, worker: WorkerId) -> Result<Snapshot, BufferError> {
        Ok(self.lock(worker)?.slots.snapshot())
    }

    /// Formats a snapshot as `in <write> out <read> [<markers>]`.
    pub fn dump(&self, worker: WorkerId) -> Result<String, BufferError> {
        self.snapshot(worker).map(|snapshot| snapshot.to_string())
    }

    fn lock(&self, worker: WorkerId) -> Result<MutexGuard<'_, State>, BufferError> {
        let guard = self.state.lock().map_err(|_| {
            error!(%worker, "buffer lock poisoned");
            BufferError::Poisoned
        })?;
        trace!(%worker, "locked");
        Ok(guard)
    }

    fn lock_ignoring_poison(&self, worker: WorkerId) -> MutexGuard<'_, State> {
        let guard = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        trace!(%worker, "locked");
        guard
    }

    #[cfg(test)]
    pub(crate) fn with_store(slots: SlotStore) -> Self {
        Self::from_store(slots)
    }
}

impl fmt::Debug for SlotBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotBuffer")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
