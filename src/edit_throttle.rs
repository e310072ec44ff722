//! Pacing for state-changing wiki actions.
//!
//! All edits, moves etc. of one client go through a single [`EditThrottle`].
//! A [`ThrottlePass`] holds the lock, so token fetching and submission happen
//! inside the same critical section as the wait.

use log::info;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{Instant, sleep};

pub const DEFAULT_EDIT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct EditThrottle {
    interval: Duration,
    last_edit: Mutex<Option<Instant>>,
}

/// Proof that the caller waited its turn. The throttle stays locked until this is dropped.
#[derive(Debug)]
pub struct ThrottlePass<'a> {
    _guard: MutexGuard<'a, Option<Instant>>,
    waited: Duration,
    stamped: Instant,
}

impl ThrottlePass<'_> {
    /// How long this pass had to sleep before it was granted.
    pub const fn waited(&self) -> Duration {
        self.waited
    }

    /// The instant recorded as the new "last edit".
    pub const fn stamped(&self) -> Instant {
        self.stamped
    }
}

impl Default for EditThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_EDIT_INTERVAL)
    }
}

impl EditThrottle {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_edit: Mutex::new(None),
        }
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits for the lock and then for the remainder of the interval, and records the new edit time.
    /// The clock is read again after sleeping, so the recorded time is never earlier than the actual pass.
    pub async fn pass(&self, action: &str) -> ThrottlePass<'_> {
        let mut last_edit = self.last_edit.lock().await;
        let waited = match *last_edit {
            Some(last) => self.interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        };
        if !waited.is_zero() {
            info!(target: "throttle", "Waiting for {:.2} seconds before {action}", waited.as_secs_f64());
            sleep(waited).await;
        }
        let stamped = Instant::now();
        *last_edit = Some(stamped);
        ThrottlePass {
            _guard: last_edit,
            waited,
            stamped,
        }
    }

    /// The last recorded edit time; waits if a pass is currently held.
    pub async fn last_edit(&self) -> Option<Instant> {
        *self.last_edit.lock().await
    }
}
