//! Reconnect backoff.

use std::time::Duration;

/// Exponential backoff: `base * 2^attempts`, exponent capped at 6, then
/// clamped to `max`.
pub fn calculate_backoff_delay(base: Duration, max: Duration, attempts: u32) -> Duration {
    std::cmp::min(base.saturating_mul(1 << attempts.min(6)), max)
}

/// Whether another attempt is allowed. `None` retries forever.
pub fn should_retry(attempts: u32, max_attempts: Option<u32>) -> bool {
    max_attempts.map_or(true, |max| attempts < max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_clamps() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(5);
        assert_eq!(calculate_backoff_delay(base, max, 0), Duration::from_millis(100));
        assert_eq!(calculate_backoff_delay(base, max, 1), Duration::from_millis(200));
        assert_eq!(calculate_backoff_delay(base, max, 3), Duration::from_millis(800));
        assert_eq!(calculate_backoff_delay(base, max, 6), Duration::from_secs(5));
        assert_eq!(calculate_backoff_delay(base, max, 40), Duration::from_secs(5));
    }

    #[test]
    fn test_exponent_is_capped() {
        let base = Duration::from_millis(10);
        let max = Duration::from_secs(3600);
        assert_eq!(
            calculate_backoff_delay(base, max, 6),
            calculate_backoff_delay(base, max, 30)
        );
    }

    #[test]
    fn test_should_retry() {
        assert!(should_retry(9, Some(10)));
        assert!(!should_retry(10, Some(10)));
        assert!(should_retry(u32::MAX, None));
    }
}
