use time::OffsetDateTime;

/// Wall-clock source for fire times
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }
}

/// Milliseconds from `now` until `fire_at`, never negative.
pub fn delay_until(now_millis: i64, fire_at_millis: i64) -> std::time::Duration {
    let millis = fire_at_millis.saturating_sub(now_millis).max(0);
    std::time::Duration::from_millis(millis as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_delay_until_future() {
        assert_eq!(delay_until(1_000, 2_500), Duration::from_millis(1_500));
    }

    #[test]
    fn test_delay_until_past_is_zero() {
        assert_eq!(delay_until(5_000, 1_000), Duration::ZERO);
        assert_eq!(delay_until(i64::MAX, i64::MIN), Duration::ZERO);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
