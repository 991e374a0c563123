// Clock abstraction used by the epoch waiter and scenario orchestration.
//
// Every sleep and elapsed-time measurement goes through a Clock. Inclusion
// and transfer timeouts wrap their RPC future in tokio::time::timeout, which
// runs on the same tokio clock, so paused time drives both.

use std::future::Future;
use std::pin::Pin;
use tokio::time::{self, Duration, Instant};

/// Time source for everything that sleeps or measures elapsed time
///
/// ```rust
/// use std::sync::Arc;
/// use tokio::time::Duration;
/// use staking_testing_framework::orchestrator::clock::{Clock, PausedClock};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let clock = Arc::new(PausedClock::new());
///     let start = clock.now();
///     clock.advance(Duration::from_secs(3600)).await;
///     assert_eq!(clock.now() - start, Duration::from_secs(3600));
/// }
/// ```
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Real tokio time, used against live networks
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        time::Instant::now()
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}

/// Clock over paused tokio time
///
/// `new()` pauses tokio time, so it needs a current-thread runtime that is not
/// already paused (do not combine it with `start_paused = true`). Pending
/// sleeps complete as soon as the runtime is idle, so an epoch wait against
/// the simulated chain finishes without real delay.
pub struct PausedClock;

impl PausedClock {
    pub fn new() -> Self {
        time::pause();
        Self
    }

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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_paused_clock_advancement() {
        let clock = Arc::new(PausedClock::new());
        let start = clock.now();

        clock.advance(Duration::from_secs(1)).await;
        assert_eq!(clock.now() - start, Duration::from_secs(1));

        clock.advance(Duration::from_secs(2)).await;
        assert_eq!(clock.now() - start, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_paused_clock_sleep_auto_advances() {
        let clock = PausedClock::new();
        let start = clock.now();
        clock.sleep(Duration::from_secs(300)).await;
        assert_eq!(clock.now() - start, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_paused_clock_sleep_expires() {
        let clock = Arc::new(PausedClock::new());
        let clock_clone = clock.clone();

        let sleep_task = tokio::spawn(async move {
            clock_clone.sleep(Duration::from_secs(5)).await;
            42
        });

        tokio::time::sleep(Duration::from_millis(1)).await;
        clock.advance(Duration::from_secs(6)).await;
        assert_eq!(sleep_task.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_system_clock() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let start = clock.now();
        clock.sleep(Duration::from_millis(10)).await;
        assert!(clock.now() - start >= Duration::from_millis(10));
    }
}
