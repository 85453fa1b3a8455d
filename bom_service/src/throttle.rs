//! Minimum-interval gate for fetcher `update()` calls.
//!
//! Each fetcher owns its own `RateLimiter`, so two stations configured in the
//! same process never throttle each other. Only successful runs are recorded:
//! a failed fetch leaves the gate open for the caller's next poll.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last_run: Option<DateTime<Utc>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether at least `interval` has elapsed since the last recorded run
    /// (or none was recorded).
    pub fn ready_at(&self, now: DateTime<Utc>) -> bool {
        match self.last_run {
            Some(last) => now - last >= self.interval,
            None => true,
        }
    }

    /// Marks a successful run at `now`.
    pub fn record(&mut self, now: DateTime<Utc>) {
        self.last_run = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 15, 3, 30, 0).unwrap()
    }

    #[test]
    fn test_first_call_is_always_ready() {
        let limiter = RateLimiter::new(Duration::seconds(60));
        assert!(limiter.ready_at(t0()));
    }

    #[test]
    fn test_call_inside_interval_is_denied() {
        let mut limiter = RateLimiter::new(Duration::seconds(60));
        limiter.record(t0());
        assert!(!limiter.ready_at(t0() + Duration::seconds(59)));
    }

    #[test]
    fn test_call_at_interval_boundary_is_ready() {
        let mut limiter = RateLimiter::new(Duration::seconds(60));
        limiter.record(t0());
        assert!(limiter.ready_at(t0() + Duration::seconds(60)));
    }

    #[test]
    fn test_unrecorded_attempt_does_not_close_the_gate() {
        let limiter = RateLimiter::new(Duration::minutes(60));
        assert!(limiter.ready_at(t0()));
        // Nothing recorded, as after a failed fetch.
        assert!(limiter.ready_at(t0() + Duration::minutes(5)));
    }

    #[test]
    fn test_denied_call_does_not_extend_the_window() {
        let mut limiter = RateLimiter::new(Duration::minutes(60));
        limiter.record(t0());
        assert!(!limiter.ready_at(t0() + Duration::minutes(30)));
        assert!(limiter.ready_at(t0() + Duration::minutes(60)));
    }

    #[test]
    fn test_limiters_are_independent() {
        let mut a = RateLimiter::new(Duration::seconds(60));
        let b = RateLimiter::new(Duration::seconds(60));
        a.record(t0());
        assert!(b.ready_at(t0()), "a second station must not be throttled by the first");
    }
}
