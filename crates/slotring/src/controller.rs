//! Lifecycle controller: builds the buffer, runs the worker pool, joins it.
//!
//! ```text
//! start ──► monitor, producers, consumers spawned ──► wait (signal or run limit)
//!                                                        │
//!            RunSummary ◄── join consumers, producers, monitor ◄──┘
//! ```
//!
//! The buffer is shared by `Arc` and is released only after every worker
//! thread has been joined.

use crate::error::{BufferError, Error};
use crate::{
    Config, Role, ShutdownSignal, SlotBuffer, Snapshot, Worker, WorkerId, WorkerParams,
    WorkerReport,
};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// How often [`Running::wait`] re-checks the termination flag.
const WAIT_POLL: Duration = Duration::from_millis(50);

type WorkerResult = Result<WorkerReport, BufferError>;
type WorkerBody = Box<dyn FnOnce() -> WorkerResult + Send + 'static>;

/// Entry points for running a worker pool.
pub struct Controller;

impl Controller {
    /// Builds the buffer and spawns the pool.
    ///
    /// Fails only if the configuration cannot produce a buffer. A worker
    /// whose thread cannot be spawned is logged and left out of the pool.
    pub fn start(config: Config) -> Result<Running, Error> {
        Self::start_with(config, spawn_thread)
    }

    /// [`start`](Self::start) with the thread spawner supplied by the caller.
    pub(crate) fn start_with<S>(config: Config, mut spawner: S) -> Result<Running, Error>
    where
        S: FnMut(WorkerId, thread::Builder, WorkerBody) -> io::Result<JoinHandle<WorkerResult>>,
    {
        config.validate()?;
        let buffer = Arc::new(SlotBuffer::new(config.capacity)?);
        info!(
            capacity = config.capacity,
            producers = config.producers,
            consumers = config.consumers,
            "slot buffer initialised"
        );

        let mut launch = |id: WorkerId| {
            let params = WorkerParams {
                id,
                buffer: Arc::clone(&buffer),
                pacing: config.pacing,
                monitor_interval: config.monitor_interval,
            };
            spawn_worker(params, &mut spawner)
        };

        let monitor = launch(WorkerId::monitor());
        let producers = (0..config.producers)
            .filter_map(|i| launch(WorkerId::producer(i)))
            .collect();
        let consumers = (0..config.consumers)
            .filter_map(|i| launch(WorkerId::consumer(i)))
            .collect();

        Ok(Running {
            buffer,
            producers,
            consumers,
            monitor,
        })
    }

    /// Runs a pool until interrupted (Ctrl+C) or until `limit` elapses,
    /// then joins every worker.
    pub fn run(config: Config, limit: Option<Duration>) -> Result<RunSummary, Error> {
        Self::run_with(config, limit, install_interrupt_handler)
    }

    /// [`run`](Self::run) with the interrupt trigger installed by the caller.
    pub(crate) fn run_with<I>(
        config: Config,
        limit: Option<Duration>,
        install: I,
    ) -> Result<RunSummary, Error>
    where
        I: FnOnce(ShutdownSignal) -> Result<(), ctrlc::Error>,
    {
        let running = Self::start(config)?;

        if let Err(e) = install(running.shutdown_signal()) {
            error!(error = %e, "failed to install interrupt handler");
            running.shutdown_signal().trigger();
            // Still join: no worker may outlive the buffer.
            if let Err(join_error) = running.join() {
                warn!(error = %join_error, "worker failed while aborting startup");
            }
            return Err(e.into());
        }

        running.wait(limit);
        running.join()
    }
}

/// Maps SIGINT (and SIGTERM with ctrlc's `termination` feature) to `signal`.
///
/// The handler is process-global and can be installed only once.
pub fn install_interrupt_handler(signal: ShutdownSignal) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        signal.trigger();
    })
}

fn spawn_thread(
    _id: WorkerId,
    builder: thread::Builder,
    body: WorkerBody,
) -> io::Result<JoinHandle<WorkerResult>> {
    builder.spawn(body)
}

/// Spawns one worker. A worker that cannot be started is logged and left
/// out, so the pool runs degraded instead of failing.
fn spawn_worker<S>(params: WorkerParams, spawner: &mut S) -> Option<Spawned>
where
    S: FnMut(WorkerId, thread::Builder, WorkerBody) -> io::Result<JoinHandle<WorkerResult>>,
{
    let id = params.id;
    info!(worker = %id, "init");
    let terminate_on_panic = TerminateOnPanic(Arc::clone(&params.buffer));
    let worker = match Worker::new(params) {
        Ok(worker) => worker,
        Err(e) => {
            error!(worker = %id, error = %e, "init failed");
            return None;
        }
    };

    let body: WorkerBody = Box::new(move || {
        let _guard = terminate_on_panic;
        worker.run()
    });

    match spawner(id, thread::Builder::new().name(id.thread_name()), body) {
        Ok(handle) => Some(Spawned { id, handle }),
        Err(e) => {
            error!(worker = %id, error = %e, "init failed");
            None
        }
    }
}

/// Raises the termination flag if a worker thread unwinds, so the joiner
/// is never left waiting on the rest of the pool.
struct TerminateOnPanic(Arc<SlotBuffer>);

impl Drop for TerminateOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.request_terminate();
        }
    }
}

struct Spawned {
    id: WorkerId,
    handle: JoinHandle<WorkerResult>,
}

/// A started pool that has not been joined yet.
pub struct Running {
    buffer: Arc<SlotBuffer>,
    producers: Vec<Spawned>,
    consumers: Vec<Spawned>,
    monitor: Option<Spawned>,
}

impl Running {
    /// Handle that raises the termination flag.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal::new(Arc::clone(&self.buffer))
    }

    /// The shared buffer, for inspection.
    pub fn buffer(&self) -> &Arc<SlotBuffer> {
        &self.buffer
    }

    /// Number of workers that were actually spawned.
    pub fn worker_count(&self) -> usize {
        self.producers.len() + self.consumers.len() + usize::from(self.monitor.is_some())
    }

    /// Blocks until termination is requested. With a `limit`, requests it
    /// itself once the limit has elapsed.
    pub fn wait(&self, limit: Option<Duration>) {
        let signal = self.shutdown_signal();
        let deadline = limit.map(|limit| Instant::now() + limit);

        while !signal.is_triggered() {
            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        info!("run limit reached");
                        signal.trigger();
                        break;
                    }
                    WAIT_POLL.min(deadline - now)
                }
                None => WAIT_POLL,
            };
            thread::sleep(pause);
        }
    }

    /// Joins consumers, then producers, then the monitor.
    ///
    /// Does not request termination; call [`ShutdownSignal::trigger`] or
    /// [`wait`](Self::wait) first. Every worker is joined even if one failed;
    /// the first failure is returned afterwards.
    pub fn join(self) -> Result<RunSummary, Error> {
        info!("wait for worker threads to join");

        let Self {
            buffer,
            producers,
            consumers,
            monitor,
        } = self;

        let mut reports = Vec::new();
        let mut first_error = None;

        for Spawned { id, handle } in consumers.into_iter().chain(producers).chain(monitor) {
            match handle.join() {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(e)) => {
                    first_error.get_or_insert(Error::Buffer(e));
                }
                Err(_) => {
                    warn!(worker = %id, "worker panicked");
                    first_error.get_or_insert(Error::WorkerPanicked { worker: id });
                }
            }
        }
        info!("joined");

        if let Some(e) = first_error {
            return Err(e);
        }

        let snapshot = buffer.snapshot(WorkerId::controller())?;
        Ok(RunSummary { reports, snapshot })
    }
}

/// What a joined pool did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// One report per joined worker, in join order.
    pub reports: Vec<WorkerReport>,
    /// Buffer state after every worker exited.
    pub snapshot: Snapshot,
}

impl RunSummary {
    /// Total successful produce calls.
    pub fn produced(&self) -> u64 {
        self.hits(Role::Producer)
    }

    /// Total successful consume calls.
    pub fn consumed(&self) -> u64 {
        self.hits(Role::Consumer)
    }

    /// True if the final occupancy matches produced minus consumed and the
    /// markers agree with the cursors.
    pub fn is_balanced(&self) -> bool {
        let in_flight = self.produced().checked_sub(self.consumed());
        in_flight == Some(self.snapshot.occupied() as u64) && self.snapshot.is_consistent()
    }

    fn hits(&self, role: Role) -> u64 {
        self.reports
            .iter()
            .filter(|r| r.id.role == role)
            .map(|r| r.hits)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, InvariantViolation};
    use crate::{Marker, SlotStore};
    use std::sync::mpsc;

    fn quick(capacity: usize, producers: usize, consumers: usize) -> Config {
        Config::new(capacity, producers, consumers)
            .with_monitor_interval(Duration::from_millis(5))
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let err = Controller::start(quick(1, 1, 1)).err().unwrap();
        assert!(matches!(
            err,
            Error::Config(ConfigError::CapacityTooSmall { capacity: 1 })
        ));
    }

    #[test]
    fn test_join_order_and_reports() {
        let running = Controller::start(quick(8, 2, 3)).unwrap();
        assert_eq!(running.worker_count(), 6);

        thread::sleep(Duration::from_millis(20));
        running.shutdown_signal().trigger();
        let summary = running.join().unwrap();

        let order: Vec<_> = summary.reports.iter().map(|r| r.id).collect();
        assert_eq!(
            order,
            vec![
                WorkerId::consumer(0),
                WorkerId::consumer(1),
                WorkerId::consumer(2),
                WorkerId::producer(0),
                WorkerId::producer(1),
                WorkerId::monitor(),
            ]
        );
        assert!(summary.is_balanced());
    }

    #[test]
    fn test_wait_honours_run_limit() {
        let running = Controller::start(quick(4, 1, 1)).unwrap();
        let started = Instant::now();
        running.wait(Some(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert!(running.shutdown_signal().is_triggered());

        let summary = running.join().unwrap();
        assert!(summary.is_balanced());
    }

    #[test]
    fn test_wait_returns_on_external_trigger() {
        let running = Controller::start(quick(4, 1, 1)).unwrap();
        let signal = running.shutdown_signal();
        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            signal.trigger();
        });

        running.wait(None);
        trigger.join().unwrap();
        running.join().unwrap();
    }

    #[test]
    fn test_terminate_on_panic_guard() {
        let buffer = Arc::new(SlotBuffer::new(4).unwrap());
        let guard = TerminateOnPanic(Arc::clone(&buffer));
        let _ = thread::spawn(move || {
            let _guard = guard;
            panic!("worker blew up");
        })
        .join();
        assert!(buffer.should_terminate(WorkerId::controller()).unwrap());

        // A normal drop leaves the flag alone.
        let buffer = Arc::new(SlotBuffer::new(4).unwrap());
        drop(TerminateOnPanic(Arc::clone(&buffer)));
        assert!(!buffer.should_terminate(WorkerId::controller()).unwrap());
    }

    #[test]
    fn test_invariant_violation_stops_pool_and_surfaces() {
        let mut store = SlotStore::new(4).unwrap();
        store.force_marker(0, Marker::Occupied);
        let buffer = Arc::new(SlotBuffer::with_store(store));

        let launch = |id: WorkerId| {
            let params = WorkerParams {
                id,
                buffer: Arc::clone(&buffer),
                pacing: crate::Pacing::Spin,
                monitor_interval: Duration::from_millis(5),
            };
            spawn_worker(params, &mut spawn_thread).unwrap()
        };
        let running = Running {
            buffer: Arc::clone(&buffer),
            producers: vec![launch(WorkerId::producer(0))],
            consumers: vec![launch(WorkerId::consumer(0))],
            monitor: None,
        };

        // Nobody triggers shutdown: the failing producer has to.
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(running.join());
        });
        let result = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("pool did not wind down after a fatal error");

        assert!(matches!(
            result,
            Err(Error::Buffer(BufferError::InvariantViolation {
                worker,
                source: InvariantViolation::AlreadyOccupied { index: 0 },
            })) if worker == WorkerId::producer(0)
        ));
        assert!(buffer.should_terminate(WorkerId::controller()).unwrap());
    }

    #[test]
    fn test_failed_spawn_degrades_pool() {
        let refuse_producer_1 = |id: WorkerId, builder: thread::Builder, body: WorkerBody| {
            if id == WorkerId::producer(1) {
                Err(io::Error::other("out of threads"))
            } else {
                builder.spawn(body)
            }
        };

        let running = Controller::start_with(quick(8, 2, 2), refuse_producer_1).unwrap();
        assert_eq!(running.worker_count(), 4);

        running.wait(Some(Duration::from_millis(20)));
        let summary = running.join().unwrap();

        let ids: Vec<_> = summary.reports.iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec![
                WorkerId::consumer(0),
                WorkerId::consumer(1),
                WorkerId::producer(0),
                WorkerId::monitor(),
            ]
        );
        assert!(summary.is_balanced());
    }

    #[test]
    fn test_run_joins_pool_when_handler_install_fails() {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let result = Controller::run_with(quick(4, 1, 1), None, |_| {
                Err(ctrlc::Error::MultipleHandlers)
            });
            let _ = tx.send(result);
        });

        // No run limit: only the failed install may stop the pool.
        let result = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("pool was not joined after the install failure");
        assert!(matches!(
            result,
            Err(Error::Signal(ctrlc::Error::MultipleHandlers))
        ));
    }
}
