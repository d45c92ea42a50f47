//! Backoff between failed attempts.

use std::time::Duration;

use tokio::sync::watch;

/// Fixed-interval backoff that yields to shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn fixed(interval: Duration) -> Self {
        Self { interval }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep for one interval.
    ///
    /// Returns `false` without waiting out the interval if shutdown is (or
    /// becomes) requested, or if the shutdown sender is gone.
    pub async fn pause(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        if *shutdown.borrow() {
            return false;
        }

        tokio::select! {
            biased;
            _ = shutdown.changed() => false,
            () = tokio::time::sleep(self.interval) => true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pause_waits_one_interval() {
        let (_tx, mut rx) = watch::channel(false);
        let policy = RetryPolicy::fixed(Duration::from_secs(1));

        let started = Instant::now();
        assert!(policy.pause(&mut rx).await);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_returns_early_on_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        let policy = RetryPolicy::fixed(Duration::from_secs(60));

        let started = Instant::now();
        let pause = tokio::spawn(async move { policy.pause(&mut rx).await });
        tokio::time::sleep(Duration::from_secs(2)).await;
        tx.send(true).unwrap();

        assert!(!pause.await.unwrap());
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_skipped_when_already_shutting_down() {
        let (_tx, mut rx) = watch::channel(true);
        let started = Instant::now();

        assert!(!RetryPolicy::default().pause(&mut rx).await);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_stops_pause() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);

        assert!(!RetryPolicy::default().pause(&mut rx).await);
    }
}
