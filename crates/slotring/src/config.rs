use crate::error::ConfigError;
use crate::Pacing;
use std::time::Duration;

/// Default number of slots (31 usable).
pub const DEFAULT_CAPACITY: usize = 32;
/// Default producer and consumer pool sizes.
pub const DEFAULT_WORKERS: usize = 3;
/// Default pause between monitor dumps.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Construction parameters for a [`Controller`](crate::Controller) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Declared slot count N. One slot stays free, so N - 1 are usable.
    pub capacity: usize,
    /// Number of producer threads.
    pub producers: usize,
    /// Number of consumer threads.
    pub consumers: usize,
    /// Pause between monitor dumps.
    pub monitor_interval: Duration,
    /// How producers and consumers pause between polls.
    pub pacing: Pacing,
}

impl Config {
    /// Creates a configuration with the default monitor interval and pure polling.
    pub const fn new(capacity: usize, producers: usize, consumers: usize) -> Self {
        Self {
            capacity,
            producers,
            consumers,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            pacing: Pacing::Spin,
        }
    }

    /// Number of slots that can hold an item at once.
    #[inline]
    pub const fn usable_capacity(&self) -> usize {
        self.capacity.saturating_sub(1)
    }

    /// Sets the monitor interval.
    pub const fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// Sets the producer/consumer pacing.
    pub const fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Rejects parameters the buffer cannot be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity < 2 {
            return Err(ConfigError::CapacityTooSmall {
                capacity: self.capacity,
            });
        }
        if self.monitor_interval.is_zero() {
            return Err(ConfigError::ZeroMonitorInterval);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_WORKERS, DEFAULT_WORKERS)
    }
}

/// Slow-motion configuration: every producer and consumer sleeps one second
/// per iteration, so trace logs can be followed by eye.
pub const TRACE_CONFIG: Config = Config::new(DEFAULT_CAPACITY, DEFAULT_WORKERS, DEFAULT_WORKERS)
    .with_pacing(Pacing::Sleep(Duration::from_secs(1)));
