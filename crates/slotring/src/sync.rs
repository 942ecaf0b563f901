//! Lock primitives used by [`SlotBuffer`](crate::SlotBuffer).
//!
//! Under the `loom` feature the buffer is built on loom's instrumented mutex so
//! `tests/loom_tests.rs` can explore every interleaving of the real code.

#[cfg(feature = "loom")]
pub(crate) use loom::sync::{Mutex, MutexGuard};

#[cfg(not(feature = "loom"))]
pub(crate) use std::sync::{Mutex, MutexGuard};
