//! Pacing between remote-affecting operations
//!
//! Each pause lasts `base + uniform(random_min, random_max)` seconds. With every bound at
//! zero the pacer is disabled and never sleeps.

use crate::config::PacingConfig;
use rand::Rng;
use std::time::Duration;

/// Applies the configured delay between page fetches and attachment downloads
#[derive(Clone, Debug, Default)]
pub struct Pacer {
    base: f64,
    random_min: f64,
    random_max: f64,
}

impl Pacer {
    /// Create a pacer from validated configuration
    #[must_use]
    pub fn new(config: &PacingConfig) -> Self {
        Self {
            base: config.base.max(0.0),
            random_min: config.random_min.max(0.0),
            random_max: config.random_max.max(config.random_min).max(0.0),
        }
    }

    /// True when base and both range bounds are zero
    pub fn is_disabled(&self) -> bool {
        self.base == 0.0 && self.random_min == 0.0 && self.random_max == 0.0
    }

    /// Draw the next delay, or `None` when pacing is disabled
    pub fn next_delay(&self) -> Option<Duration> {
        if self.is_disabled() {
            return None;
        }
        let jitter = if self.random_max > self.random_min {
            rand::thread_rng().gen_range(self.random_min..=self.random_max)
        } else {
            self.random_min
        };
        Some(Duration::try_from_secs_f64(self.base + jitter).unwrap_or(Duration::MAX))
    }

    /// Sleep for the next delay; returns the delay applied
    pub async fn pause(&self) -> Option<Duration> {
        let delay = self.next_delay()?;
        tracing::info!("Sleeping for {:.2} seconds", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
        Some(delay)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn pacer(base: f64, random_min: f64, random_max: f64) -> Pacer {
        Pacer::new(&PacingConfig {
            base,
            random_min,
            random_max,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn zero_config_never_sleeps() {
        let pacer = pacer(0.0, 0.0, 0.0);
        let start = tokio::time::Instant::now();

        assert!(pacer.is_disabled());
        assert_eq!(pacer.pause().await, None);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_base_sleeps_at_least_base() {
        let pacer = pacer(2.0, 0.0, 0.0);
        let start = tokio::time::Instant::now();

        let delay = pacer.pause().await.unwrap();

        assert_eq!(delay, Duration::from_secs(2));
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[test]
    fn random_part_stays_within_range() {
        let pacer = pacer(1.0, 0.5, 1.5);
        for _ in 0..200 {
            let delay = pacer.next_delay().unwrap().as_secs_f64();
            assert!((1.5..=2.5).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn range_only_is_enabled() {
        let pacer = pacer(0.0, 0.0, 3.0);
        assert!(!pacer.is_disabled());
        let delay = pacer.next_delay().unwrap();
        assert!(delay <= Duration::from_secs(3));
    }

    #[test]
    fn degenerate_range_uses_lower_bound() {
        let pacer = pacer(0.0, 1.25, 1.25);
        assert_eq!(pacer.next_delay(), Some(Duration::from_secs_f64(1.25)));
    }

    #[test]
    fn unrepresentable_delay_saturates() {
        let pacer = pacer(1e20, 0.0, 0.0);
        assert_eq!(pacer.next_delay(), Some(Duration::MAX));
    }
}
