//! Process-wide fixed-window rate limiter.
//!
//! Admits up to `max_per_window` permits per wall-clock window. Permits are
//! not returned: they expire with the window. A caller that finds the
//! window full sleeps until the window rolls and contends again; there is
//! no FIFO ordering among waiters, but every roll admits a fresh batch so
//! progress is guaranteed under bounded load.
//!
//! This limiter is deliberately coarse. It protects against accidental
//! self-DoS; the authoritative throttle signal is an upstream 429, handled
//! by the retry controller.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Mutable window state, protected by a mutex.
#[derive(Debug)]
struct WindowState {
    window_start: Instant,
    count: u32,
}

/// Fixed-window limiter shared by all dispatches in the process.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max_per_window: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

impl FixedWindowLimiter {
    /// Creates a limiter admitting `max_per_window` permits per `window`.
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            state: Mutex::new(WindowState {
                window_start: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Attempts to take a permit without waiting.
    ///
    /// Rolls the window first if it has elapsed, then increments the
    /// counter if capacity remains. Returns `false` when the window is full.
    pub fn try_acquire(&self) -> bool {
        self.admit_or_wait().is_none()
    }

    /// Takes a permit, sleeping across window rolls until one is available.
    ///
    /// Cancellation-aware through the caller: the sleep is a plain tokio
    /// suspension point, so wrapping the call in `select!`/`timeout` aborts
    /// the wait cleanly without consuming a permit.
    pub async fn acquire(&self) {
        loop {
            match self.admit_or_wait() {
                None => return,
                Some(wait) => {
                    debug!(wait_ms = wait.as_millis() as u64, "rate window full, waiting for roll");
                    tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
                }
            }
        }
    }

    /// Permits taken in the current window (diagnostics only).
    pub fn count_in_window(&self) -> u32 {
        let state = self.state.lock().unwrap();
        state.count
    }

    pub fn max_per_window(&self) -> u32 {
        self.max_per_window
    }

    /// Admits the caller (returns `None`) or reports how long until the
    /// current window rolls (returns `Some(wait)`).
    fn admit_or_wait(&self) -> Option<Duration> {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();

        let elapsed = now.duration_since(state.window_start);
        if elapsed >= self.window {
            state.window_start = now;
            state.count = 0;
        }

        if state.count < self.max_per_window {
            state.count += 1;
            None
        } else {
            Some(self.window - now.duration_since(state.window_start))
        }
    }
}
