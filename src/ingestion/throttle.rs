//! Fixed-interval request throttle
//!
//! The provider rate-limits history queries, so one throttle value is waited
//! on before every request. It lives outside the fetch loop so tests can run
//! the loop with the throttle disabled.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    interval: Option<Duration>,
}

impl Throttle {
    /// Wait `seconds` before each request; zero disables the throttle
    pub fn fixed(seconds: u64) -> Self {
        if seconds == 0 {
            Self::disabled()
        } else {
            Throttle {
                interval: Some(Duration::from_secs(seconds)),
            }
        }
    }

    pub fn disabled() -> Self {
        Throttle { interval: None }
    }

    pub fn is_disabled(&self) -> bool {
        self.interval.is_none()
    }

    pub async fn wait(&self) {
        if let Some(interval) = self.interval {
            tokio::time::sleep(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_seconds_disables() {
        assert!(Throttle::fixed(0).is_disabled());
        assert!(Throttle::disabled().is_disabled());
        assert!(!Throttle::fixed(3).is_disabled());
    }

    #[tokio::test]
    async fn test_disabled_wait_returns_immediately() {
        let throttle = Throttle::disabled();
        let started = std::time::Instant::now();
        throttle.wait().await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}
