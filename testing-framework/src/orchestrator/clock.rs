// Clock abstraction
//
// Receipt polling and message observation only read time through this trait,
// so scenario tests can run on tokio's paused clock and never wait for real.

use std::future::Future;
use std::pin::Pin;
use tokio::time::{self, Duration, Instant};

/// Source of time for every bounded wait in the harness
///
/// ```rust
/// use std::sync::Arc;
/// use tokio::time::Duration;
/// use ledger_testing_framework::orchestrator::{Clock, PausedClock};
///
/// #[tokio::test(start_paused = true)]
/// async fn test_observation_window() {
///     let clock = Arc::new(PausedClock::attach());
///     let opened = clock.now();
///
///     clock.advance(Duration::from_secs(4)).await;
///     assert_eq!(clock.now() - opened, Duration::from_secs(4));
/// }
/// ```
pub trait Clock: Send + Sync {
    /// Current instant (simulated under `PausedClock`)
    fn now(&self) -> Instant;

    /// Sleep for `d`
    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Time elapsed since `since`
    fn elapsed(&self, since: Instant) -> Duration {
        self.now().saturating_duration_since(since)
    }
}

/// Wall-clock time, used against a live ledger
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        time::Instant::now()
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}

/// Paused clock for tests
///
/// Sleeping tasks only wake when time is advanced, either explicitly through
/// `advance()` or by tokio's auto-advance once every task is idle.
///
/// `new()` pauses the current-thread runtime; inside
/// `#[tokio::test(start_paused = true)]` use `attach()` instead, since tokio
/// panics when time is paused twice.
pub struct PausedClock;

impl PausedClock {
    /// Pause tokio time and return the clock
    pub fn new() -> Self {
        time::pause();
        Self
    }

    /// Clock over a runtime whose time is already paused
    pub fn attach() -> Self {
        Self
    }

    /// Move simulated time forward, waking expired sleeps
    pub async fn advance(&self, d: Duration) {
        time::advance(d).await
    }
}

impl Clock for PausedClock {
    fn now(&self) -> Instant {
        time::Instant::now()
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}

impl Default for PausedClock {
    fn default() -> Self {
        Self::new()
    }
}
