//! Cancellable delays.
//!
//! A [`Delay`] completes after its duration elapses, or immediately once
//! [`DelayHandle::cancel`] is called. Cancelling is how a fresher trigger skips
//! the backoff of a pull request that is waiting to be re-evaluated.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// A timer that can be cut short.
#[derive(Debug)]
pub struct Delay {
    duration: Duration,
    token: CancellationToken,
}

/// Cancels the [`Delay`] it was taken from.
#[derive(Debug, Clone)]
pub struct DelayHandle {
    token: CancellationToken,
}

impl DelayHandle {
    /// Makes the delay complete now. Has no effect once it completed.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Delay {
    pub fn new(duration: Duration) -> Self {
        Delay {
            duration,
            token: CancellationToken::new(),
        }
    }

    pub fn handle(&self) -> DelayHandle {
        DelayHandle {
            token: self.token.clone(),
        }
    }

    /// Waits until the duration elapses or the delay is cancelled.
    ///
    /// Returns `true` if the delay was cancelled before it elapsed.
    pub async fn wait(self) -> bool {
        if self.duration.is_zero() {
            return self.token.is_cancelled();
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => true,
            _ = tokio::time::sleep(self.duration) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn elapses_after_duration() {
        let start = Instant::now();
        let cancelled = Delay::new(Duration::from_secs(60)).wait().await;

        assert!(!cancelled);
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_completes_immediately() {
        let start = Instant::now();
        Delay::new(Duration::ZERO).wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_completes_early() {
        let delay = Delay::new(Duration::from_secs(60));
        let handle = delay.handle();
        let start = Instant::now();

        let waiting = tokio::spawn(delay.wait());
        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.cancel();

        assert!(waiting.await.unwrap());
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_wait_completes_immediately() {
        let delay = Delay::new(Duration::from_secs(60));
        delay.handle().cancel();

        let start = Instant::now();
        assert!(delay.wait().await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
