//! Per-bot error alert cooldown.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Remembers when the last error alert was sent for each label.
///
/// Only alerts that actually go out are recorded, so the first error after
/// a quiet period is never lost.
#[derive(Debug)]
pub struct ErrorCooldown {
    window: Duration,
    last_sent: Mutex<HashMap<String, Instant>>,
}

impl ErrorCooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true and records `now` when an alert for `label` may be sent.
    pub fn should_send(&self, label: &str, now: Instant) -> bool {
        let mut last_sent = self.last_sent.lock();
        if let Some(prev) = last_sent.get(label) {
            if now.saturating_duration_since(*prev) < self.window {
                return false;
            }
        }
        last_sent.insert(label.to_string(), now);
        true
    }

    /// Time left before `label` may alert again.
    pub fn remaining(&self, label: &str, now: Instant) -> Duration {
        self.last_sent
            .lock()
            .get(label)
            .map(|prev| self.window.saturating_sub(now.saturating_duration_since(*prev)))
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_error_always_sent() {
        let cooldown = ErrorCooldown::new(Duration::from_secs(60));
        assert!(cooldown.should_send("a", Instant::now()));
    }

    #[test]
    fn test_suppressed_inside_window() {
        let cooldown = ErrorCooldown::new(Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(cooldown.should_send("a", t0));
        assert!(!cooldown.should_send("a", t0 + Duration::from_secs(30)));
        assert!(!cooldown.should_send("a", t0 + Duration::from_millis(59_999)));
        assert_eq!(
            cooldown.remaining("a", t0 + Duration::from_secs(45)),
            Duration::from_secs(15)
        );
    }

    #[test]
    fn test_sent_again_after_window() {
        let cooldown = ErrorCooldown::new(Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(cooldown.should_send("a", t0));
        assert!(!cooldown.should_send("a", t0 + Duration::from_secs(10)));
        // Suppressed attempts do not extend the window
        assert!(cooldown.should_send("a", t0 + Duration::from_secs(60)));
        assert!(!cooldown.should_send("a", t0 + Duration::from_secs(61)));
    }

    #[test]
    fn test_labels_are_independent() {
        let cooldown = ErrorCooldown::new(Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(cooldown.should_send("a", t0));
        assert!(cooldown.should_send("b", t0));
        assert!(!cooldown.should_send("a", t0));
        assert_eq!(cooldown.remaining("c", t0), Duration::ZERO);
    }

    #[test]
    fn test_zero_window_never_suppresses() {
        let cooldown = ErrorCooldown::new(Duration::ZERO);
        let t0 = Instant::now();
        assert!(cooldown.should_send("a", t0));
        assert!(cooldown.should_send("a", t0));
    }
}
