//! Shutdown trigger for a running worker pool.

use crate::SlotBuffer;
use std::sync::Arc;
use tracing::info;

/// A cloneable handle that raises the buffer's termination flag.
///
/// The interrupt handler holds one; tests and embedding code can hold others.
/// Only the first [`trigger`](Self::trigger) has an effect, later calls are
/// no-ops.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    buffer: Arc<SlotBuffer>,
}

impl ShutdownSignal {
    pub(crate) fn new(buffer: Arc<SlotBuffer>) -> Self {
        Self { buffer }
    }

    /// Requests termination. Returns `true` if this call raised the flag.
    pub fn trigger(&self) -> bool {
        let first = self.buffer.request_terminate();
        if first {
            info!("terminate");
        }
        first
    }

    /// Returns `true` once termination has been requested.
    ///
    /// A poisoned buffer counts as terminated.
    pub fn is_triggered(&self) -> bool {
        self.buffer
            .should_terminate(crate::WorkerId::controller())
            .unwrap_or(true)
    }
}
