/// Rate Limiter - Per-worker pacing between connection attempts
///
/// Each scheduler worker owns its own limiter, so the configured delay is the
/// minimum gap between two attempts made by the same worker. The run-wide
/// connection rate therefore scales with `concurrency`.
use crate::Result;
use crate::error::TlsError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Pacing state for one worker. Clones share the same state, so a clone can
/// be moved into each retry attempt.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    delay: Duration,
    last_attempt: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_attempt: Arc::new(Mutex::new(None)),
        }
    }

    /// A limiter that never sleeps
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        !self.delay.is_zero()
    }

    /// Sleep until at least `delay` has passed since the previous attempt,
    /// then record this attempt.
    pub async fn wait(&self) {
        let mut last = self.last_attempt.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Time left before the next attempt is allowed
    pub async fn time_until_next(&self) -> Duration {
        match *self.last_attempt.lock().await {
            Some(last) => self.delay.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }
}

/// Parse a delay such as `500ms`, `2s`, `1.5s`, `1m` or a bare millisecond count
pub fn parse_delay(s: &str) -> Result<Duration> {
    let s = s.trim();
    let invalid = || TlsError::InvalidInput {
        message: format!("invalid delay '{}'", s),
    };

    if let Some(value) = s.strip_suffix("ms") {
        let ms: u64 = value.trim().parse().map_err(|_| invalid())?;
        return Ok(Duration::from_millis(ms));
    }

    let (value, scale) = if let Some(v) = s.strip_suffix('s') {
        (v, 1.0)
    } else if let Some(v) = s.strip_suffix('m') {
        (v, 60.0)
    } else {
        let ms: u64 = s.parse().map_err(|_| invalid())?;
        return Ok(Duration::from_millis(ms));
    };

    let seconds: f64 = value.trim().parse().map_err(|_| invalid())?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid());
    }
    Ok(Duration::from_millis((seconds * scale * 1000.0) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_on_first_attempt() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        let start = Instant::now();
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_on_second_attempt() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_until_next() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        assert_eq!(limiter.time_until_next().await, Duration::ZERO);

        limiter.wait().await;
        assert_eq!(limiter.time_until_next().await, Duration::from_millis(100));

        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(limiter.time_until_next().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_pacing() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        let start = Instant::now();
        limiter.clone().wait().await;
        limiter.clone().wait().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_disabled() {
        assert!(!RateLimiter::disabled().is_enabled());
        assert!(RateLimiter::new(Duration::from_millis(1)).is_enabled());
    }

    #[test]
    fn test_parse_delay_units() {
        assert_eq!(parse_delay("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_delay("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_delay("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_delay("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_delay(" 250 ").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_delay_invalid() {
        assert!(parse_delay("invalid").is_err());
        assert!(parse_delay("abc ms").is_err());
        assert!(parse_delay("").is_err());
        assert!(parse_delay("-1s").is_err());
    }
}
