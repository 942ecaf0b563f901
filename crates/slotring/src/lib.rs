//! Slotring - a bounded slot buffer shared by polling worker threads
//!
//! A fixed pool of producer threads fills slots of a circular buffer, a pool
//! of consumer threads drains them, and a monitor thread periodically logs the
//! buffer state. All slot state and a termination flag sit behind one mutex.
//! Nothing ever blocks waiting for space or data: `produce` and `consume`
//! report `Full` / `Empty` and the worker simply polls again.
//!
//! Shutdown is cooperative. An external trigger (Ctrl+C in the binary) raises
//! the termination flag; every worker checks it at the top of each iteration
//! and exits, and the controller joins them all before the buffer is freed.
//!
//! # Key Properties
//!
//! - A slot is occupied iff it lies in `[read_cursor, write_cursor)` (circularly)
//! - One slot is reserved, so a buffer of N slots holds at most N - 1 items
//! - A producer never overwrites an unconsumed slot, a consumer never drains
//!   an empty one; either would surface as a fatal [`InvariantViolation`]
//!
//! # Example
//!
//! ```
//! use slotring::{ProduceOutcome, SlotBuffer, WorkerId};
//!
//! let buffer = SlotBuffer::new(4).unwrap();
//! let producer = WorkerId::producer(0);
//!
//! for _ in 0..3 {
//!     assert!(buffer.produce(producer).unwrap().is_success());
//! }
//! assert_eq!(buffer.produce(producer).unwrap(), ProduceOutcome::Full);
//! assert_eq!(buffer.dump(WorkerId::monitor()).unwrap(), "in 3 out 0 [1 1 1 0]");
//! ```
//!
//! Running a whole pool:
//!
//! ```no_run
//! use slotring::{Config, Controller};
//! use std::time::Duration;
//!
//! let summary = Controller::run(Config::default(), Some(Duration::from_secs(5))).unwrap();
//! println!("produced {} consumed {}", summary.produced(), summary.consumed());
//! ```

mod backoff;
mod buffer;
mod config;
mod controller;
mod error;
mod invariants;
mod shutdown;
mod slots;
mod sync;
mod worker;

pub use backoff::IdleBackoff;
pub use buffer::{ConsumeOutcome, ProduceOutcome, SlotBuffer};
pub use config::{
    Config, DEFAULT_CAPACITY, DEFAULT_MONITOR_INTERVAL, DEFAULT_WORKERS, TRACE_CONFIG,
};
pub use controller::{install_interrupt_handler, Controller, RunSummary, Running};
pub use error::{BufferError, ConfigError, Error, InvariantViolation};
pub use shutdown::ShutdownSignal;
pub use slots::{Marker, SlotStore, Snapshot};
pub use worker::{Pacing, Role, Worker, WorkerId, WorkerParams, WorkerReport};
