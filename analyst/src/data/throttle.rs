//! Fixed-delay throttle for the market data API.
//!
//! The fetch task stays under the per-minute request budget by pausing a
//! fixed time between symbol submissions and a longer time between batches.
//! No tokens are tracked.

use std::time::Duration;
use tracing::debug;

use analyst_common::FmpConfig;

/// Symbols per batch so one batch fits the per-minute budget.
///
/// `(requests_per_minute - buffer) / requests_per_symbol`, at least 1.
pub fn batch_size(requests_per_minute: u32, buffer: u32, requests_per_symbol: u32) -> usize {
    let budget = requests_per_minute.saturating_sub(buffer);
    let size = budget / requests_per_symbol.max(1);
    (size as usize).max(1)
}

/// Inter-request and inter-batch delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    pub per_request: Duration,
    pub per_batch: Duration,
}

impl Throttle {
    pub fn new(per_request: Duration, per_batch: Duration) -> Self {
        Self {
            per_request,
            per_batch,
        }
    }

    /// No pauses at all.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn from_config(config: &FmpConfig) -> Self {
        Self::new(
            Duration::from_millis(config.delay_per_symbol_ms),
            Duration::from_secs(config.delay_per_batch_secs),
        )
    }

    /// Pause after submitting one unit of work.
    pub async fn pause_request(&self) {
        if !self.per_request.is_zero() {
            tokio::time::sleep(self.per_request).await;
        }
    }

    /// Pause between batches.
    pub async fn pause_batch(&self) {
        if !self.per_batch.is_zero() {
            debug!(wait_secs = self.per_batch.as_secs(), "Pausing between batches");
            tokio::time::sleep(self.per_batch).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size() {
        assert_eq!(batch_size(300, 10, 2), 145);
        assert_eq!(batch_size(10, 10, 2), 1);
        assert_eq!(batch_size(5, 10, 2), 1);
        assert_eq!(batch_size(300, 0, 0), 300);
    }

    #[test]
    fn test_from_config() {
        let throttle = Throttle::from_config(&FmpConfig::default());
        assert_eq!(throttle.per_request, Duration::from_millis(200));
        assert_eq!(throttle.per_batch, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_advance_clock() {
        let throttle = Throttle::new(Duration::from_millis(200), Duration::from_secs(60));
        let start = tokio::time::Instant::now();
        throttle.pause_request().await;
        throttle.pause_batch().await;
        assert!(start.elapsed() >= Duration::from_millis(60_200));
    }
}
