//! Reconnection backoff policy.
//!
//! Capped exponential backoff without jitter: the first wait after a failure
//! is the floor, each further consecutive failure doubles it up to the
//! ceiling, and a successful connection resets it to the floor.

use std::time::Duration;

/// Highest doubling exponent; keeps the multiplication far from overflow.
const MAX_EXPONENT: u32 = 20;

/// Wait before the next attempt after `failures` consecutive failures.
///
/// `failures` is one-based: the wait is `min(floor * 2^(failures-1), ceiling)`.
/// failures=1 -> floor, failures=2 -> 2*floor, failures=3 -> 4*floor, ...
/// capped at `ceiling`. `failures == 0` yields zero (connect immediately).
pub fn backoff_delay(floor: Duration, ceiling: Duration, failures: u32) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    let exponent = (failures - 1).min(MAX_EXPONENT);
    floor
        .checked_mul(1u32 << exponent)
        .unwrap_or(ceiling)
        .min(ceiling.max(floor))
}

/// Stateful backoff tracker for one endpoint.
#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    failures: u32,
}

impl Backoff {
    /// Create a tracker. A ceiling below the floor is raised to the floor.
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            floor,
            ceiling: ceiling.max(floor),
            failures: 0,
        }
    }

    /// Record a failed attempt and return how long to wait before the next one.
    pub fn next_delay(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        backoff_delay(self.floor, self.ceiling, self.failures)
    }

    /// Reset after a successful connection.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures since the last successful connection.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Wait that would follow one more failure, without recording it.
    pub fn peek(&self) -> Duration {
        backoff_delay(self.floor, self.ceiling, self.failures.saturating_add(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_doubles_and_caps() {
        let mut backoff = Backoff::new(secs(5), secs(60));
        let waits: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(waits, vec![5, 10, 20, 40, 60, 60]);
        assert_eq!(backoff.failures(), 6);
    }

    #[test]
    fn test_reset_returns_to_floor() {
        let mut backoff = Backoff::new(secs(5), secs(60));
        backoff.next_delay();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.peek(), secs(5));
        assert_eq!(backoff.next_delay(), secs(5));
    }

    #[test]
    fn test_formula_matches_tracker() {
        let (floor, ceiling) = (secs(2), secs(45));
        let mut backoff = Backoff::new(floor, ceiling);
        for n in 1..=12u32 {
            let expected = (floor * 2u32.pow(n - 1)).min(ceiling);
            assert_eq!(backoff.next_delay(), expected, "failure #{n}");
        }
    }

    #[test]
    fn test_failure_count_is_one_based() {
        assert_eq!(backoff_delay(secs(5), secs(60), 1), secs(5));
        assert_eq!(backoff_delay(secs(5), secs(60), 2), secs(10));
        assert_eq!(backoff_delay(secs(5), secs(60), 4), secs(40));
    }

    #[test]
    fn test_large_failure_count_saturates() {
        assert_eq!(backoff_delay(secs(5), secs(60), u32::MAX), secs(60));
        assert_eq!(backoff_delay(secs(5), secs(60), 0), Duration::ZERO);
    }

    #[test]
    fn test_ceiling_below_floor() {
        let mut backoff = Backoff::new(secs(10), secs(1));
        assert_eq!(backoff.next_delay(), secs(10));
        assert_eq!(backoff.next_delay(), secs(10));
    }
}
