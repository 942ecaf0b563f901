//! Producer, consumer and monitor loops.
//!
//! All three share one skeleton: check the termination flag, do one unit of
//! work against the buffer, pace, repeat. A worker is either running or
//! terminated; once it has seen the flag it never touches the buffer again.

use crate::error::{BufferError, ConfigError};
use crate::{IdleBackoff, SlotBuffer};
use std::fmt;
use std::hint;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

/// What a worker does each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Producer,
    Consumer,
    Monitor,
    /// The lifecycle controller or the interrupt handler; never runs a loop.
    Controller,
}

/// Diagnostic identity of a thread touching the buffer.
///
/// The index only attributes log lines and reports; it confers no ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId {
    pub role: Role,
    pub index: usize,
}

impl WorkerId {
    pub const fn producer(index: usize) -> Self {
        Self {
            role: Role::Producer,
            index,
        }
    }

    pub const fn consumer(index: usize) -> Self {
        Self {
            role: Role::Consumer,
            index,
        }
    }

    pub const fn monitor() -> Self {
        Self {
            role: Role::Monitor,
            index: 0,
        }
    }

    pub const fn controller() -> Self {
        Self {
            role: Role::Controller,
            index: 0,
        }
    }

    /// Name given to the spawned thread (`producer-0`, `monitor`, ...).
    pub fn thread_name(&self) -> String {
        match self.role {
            Role::Producer => format!("producer-{}", self.index),
            Role::Consumer => format!("consumer-{}", self.index),
            Role::Monitor => "monitor".to_owned(),
            Role::Controller => "controller".to_owned(),
        }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Role::Producer => write!(f, "producer {}", self.index),
            Role::Consumer => write!(f, "consumer {}", self.index),
            Role::Monitor => f.write_str("monitor"),
            Role::Controller => f.write_str("controller"),
        }
    }
}

/// How producers and consumers pause between polls.
///
/// Pacing never changes what `produce`/`consume` return, only how often they
/// are called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Poll again immediately with only a CPU relax hint.
    #[default]
    Spin,
    /// Back off on `Full`/`Empty` (spin, then yield, then short sleeps) and
    /// reset after every success.
    Backoff,
    /// Sleep for a fixed duration after every iteration.
    Sleep(Duration),
}

/// Everything a worker thread needs, handed over at spawn time.
#[derive(Debug, Clone)]
pub struct WorkerParams {
    pub id: WorkerId,
    pub buffer: Arc<SlotBuffer>,
    pub pacing: Pacing,
    /// Pause between monitor dumps. Ignored by producers and consumers.
    pub monitor_interval: Duration,
}

/// Per-worker counters returned when the loop exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub id: WorkerId,
    /// Loop iterations that reached the buffer operation.
    pub iterations: u64,
    /// Produced, consumed or dumped.
    pub hits: u64,
    /// `Full` or `Empty`.
    pub misses: u64,
}

impl WorkerReport {
    fn new(id: WorkerId) -> Self {
        Self {
            id,
            iterations: 0,
            hits: 0,
            misses: 0,
        }
    }

    fn record(&mut self, hit: bool) {
        self.iterations += 1;
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }
}

/// One polling loop bound to a shared buffer.
#[derive(Debug)]
pub struct Worker {
    params: WorkerParams,
    backoff: IdleBackoff,
}

impl Worker {
    /// Binds a loop to `params`. [`Role::Controller`] is an identity for log
    /// attribution only and is rejected.
    pub fn new(params: WorkerParams) -> Result<Self, ConfigError> {
        if params.id.role == Role::Controller {
            return Err(ConfigError::NoLoopForRole { worker: params.id });
        }
        Ok(Self {
            params,
            backoff: IdleBackoff::new(),
        })
    }

    pub fn id(&self) -> WorkerId {
        self.params.id
    }

    /// Runs until the termination flag is observed.
    ///
    /// A fatal buffer error stops this worker and raises the termination flag
    /// so the rest of the pool winds down too, then is returned to the joiner.
    pub fn run(mut self) -> Result<WorkerReport, BufferError> {
        let id = self.params.id;
        info!(worker = %id, "started");

        let result = self.run_loop();
        match &result {
            Ok(report) => debug!(
                worker = %id,
                iterations = report.iterations,
                hits = report.hits,
                misses = report.misses,
                "terminated"
            ),
            Err(e) => {
                error!(worker = %id, error = %e, "stopping on fatal error");
                self.params.buffer.request_terminate();
            }
        }
        result
    }

    fn run_loop(&mut self) -> Result<WorkerReport, BufferError> {
        let id = self.params.id;
        let mut report = WorkerReport::new(id);

        while !self.params.buffer.should_terminate(id)? {
            let hit = self.step()?;
            report.record(hit);
            self.pace(hit);
        }

        Ok(report)
    }

    /// One unit of work. Returns `true` if the buffer changed or was dumped.
    fn step(&self) -> Result<bool, BufferError> {
        let WorkerParams { id, buffer, .. } = &self.params;
        match id.role {
            Role::Producer => Ok(buffer.produce(*id)?.is_success()),
            Role::Consumer => Ok(buffer.consume(*id)?.is_success()),
            Role::Monitor => {
                let snapshot = buffer.snapshot(*id)?;
                info!(target: "slotring::monitor", "{snapshot}");
                Ok(true)
            }
            // rejected by Worker::new
            Role::Controller => Ok(false),
        }
    }

    fn pace(&mut self, hit: bool) {
        if self.params.id.role == Role::Monitor {
            thread::sleep(self.params.monitor_interval);
            return;
        }
        match self.params.pacing {
            Pacing::Spin => hint::spin_loop(),
            Pacing::Backoff if hit => self.backoff.reset(),
            Pacing::Backoff => self.backoff.idle(),
            Pacing::Sleep(pause) => thread::sleep(pause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(id: WorkerId, buffer: &Arc<SlotBuffer>) -> WorkerParams {
        WorkerParams {
            id,
            buffer: Arc::clone(buffer),
            pacing: Pacing::Spin,
            monitor_interval: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_worker_id_display() {
        assert_eq!(WorkerId::producer(2).to_string(), "producer 2");
        assert_eq!(WorkerId::consumer(0).to_string(), "consumer 0");
        assert_eq!(WorkerId::monitor().to_string(), "monitor");
        assert_eq!(WorkerId::producer(2).thread_name(), "producer-2");
        assert_eq!(WorkerId::monitor().thread_name(), "monitor");
    }

    #[test]
    fn test_controller_identity_has_no_loop() {
        let buffer = Arc::new(SlotBuffer::new(4).unwrap());
        let err = Worker::new(params(WorkerId::controller(), &buffer)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::NoLoopForRole {
                worker: WorkerId::controller()
            }
        );
        assert_eq!(err.to_string(), "controller has no polling loop");
        assert!(Worker::new(params(WorkerId::monitor(), &buffer)).is_ok());
    }

    #[test]
    fn test_terminated_worker_never_touches_buffer() {
        let buffer = Arc::new(SlotBuffer::new(4).unwrap());
        buffer.request_terminate();

        let report = Worker::new(params(WorkerId::producer(0), &buffer)).unwrap().run().unwrap();
        assert_eq!(report.iterations, 0);
        assert_eq!(buffer.dump(WorkerId::monitor()).unwrap(), "in 0 out 0 [0 0 0 0]");
    }

    #[test]
    fn test_producer_fills_then_misses() {
        let buffer = Arc::new(SlotBuffer::new(4).unwrap());
        let worker = Worker::new(params(WorkerId::producer(0), &buffer)).unwrap();

        let b = Arc::clone(&buffer);
        let handle = thread::spawn(move || worker.run());
        while b.snapshot(WorkerId::monitor()).unwrap().write_cursor != 3 {
            thread::yield_now();
        }
        // Give the producer time to hit Full.
        thread::sleep(Duration::from_millis(20));
        buffer.request_terminate();

        let report = handle.join().unwrap().unwrap();
        assert_eq!(report.hits, 3);
        assert!(report.misses > 0);
        assert_eq!(report.iterations, report.hits + report.misses);
    }

    #[test]
    fn test_backoff_pacing_consumer_drains() {
        let buffer = Arc::new(SlotBuffer::new(8).unwrap());
        for _ in 0..5 {
            buffer.produce(WorkerId::producer(0)).unwrap();
        }
        let mut p = params(WorkerId::consumer(1), &buffer);
        p.pacing = Pacing::Backoff;
        let worker = Worker::new(p).unwrap();
        let handle = thread::spawn(move || worker.run());

        while buffer.snapshot(WorkerId::monitor()).unwrap().distance() > 0 {
            thread::yield_now();
        }
        buffer.request_terminate();

        let report = handle.join().unwrap().unwrap();
        assert_eq!(report.hits, 5);
        assert!(buffer.snapshot(WorkerId::monitor()).unwrap().is_consistent());
    }

    #[test]
    fn test_monitor_dumps_until_terminated() {
        let buffer = Arc::new(SlotBuffer::new(4).unwrap());
        let worker = Worker::new(params(WorkerId::monitor(), &buffer)).unwrap();
        let handle = thread::spawn(move || worker.run());
        thread::sleep(Duration::from_millis(20));
        buffer.request_terminate();

        let report = handle.join().unwrap().unwrap();
        assert_eq!(report.misses, 0);
        assert_eq!(report.iterations, report.hits);
    }
}
