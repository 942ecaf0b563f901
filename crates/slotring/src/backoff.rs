use std::hint;
use std::thread;
use std::time::Duration;

/// Bounded idle backoff for polling workers.
///
/// Each call to [`idle`](Self::idle) waits a little longer than the last:
/// exponential PAUSE spins, then yields to the OS, then short sleeps capped at
/// [`MAX_SLEEP`](Self::MAX_SLEEP). Unlike a give-up backoff it never completes;
/// a worker keeps polling until it sees the termination flag, so the cap bounds
/// how late it can notice shutdown.
#[derive(Debug)]
pub struct IdleBackoff {
    step: u32,
}

impl IdleBackoff {
    const SPIN_LIMIT: u32 = 6; // 2^6 = 64 spins max before yielding
    const YIELD_LIMIT: u32 = 10;
    /// Longest single pause once spinning and yielding are exhausted.
    pub const MAX_SLEEP: Duration = Duration::from_millis(1);

    #[inline]
    pub fn new() -> Self {
        Self { step: 0 }
    }

    /// Waits once after a `Full`/`Empty` poll.
    #[inline]
    pub fn idle(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..(1u32 << self.step) {
                hint::spin_loop();
            }
        } else if self.step <= Self::YIELD_LIMIT {
            thread::yield_now();
        } else {
            thread::sleep(Self::MAX_SLEEP);
            return;
        }
        self.step += 1;
    }

    /// True once the backoff has reached the sleeping stage.
    #[inline]
    pub fn is_sleeping(&self) -> bool {
        self.step > Self::YIELD_LIMIT
    }

    /// Starts over after a successful poll.
    #[inline]
    pub fn reset(&mut self) {
        self.step = 0;
    }
}

impl Default for IdleBackoff {
    fn default() -> Self {
        Self::new()
    }
}
