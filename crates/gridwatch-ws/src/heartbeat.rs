//! Keepalive tracking for WebSocket connections.
//!
//! Monitors connection health by tracking ping/pong timing and
//! message activity. Owned by the receive loop of a single connection.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Floor for the check period so tiny test intervals do not spin.
const MIN_CHECK_PERIOD: Duration = Duration::from_millis(50);

/// Keepalive state for one connection.
#[derive(Debug)]
pub struct Keepalive {
    /// Idle time after which a ping is sent.
    interval: Duration,
    /// How long to wait for the pong.
    timeout: Duration,
    /// Last ping sent time.
    last_ping: Option<Instant>,
    /// Last message received time (any frame).
    last_message: Instant,
    /// Whether we're waiting for pong.
    waiting_for_pong: bool,
}

impl Keepalive {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            last_ping: None,
            last_message: Instant::now(),
            waiting_for_pong: false,
        }
    }

    /// How often the receive loop should evaluate keepalive state.
    pub fn check_period(&self) -> Duration {
        (self.interval.min(self.timeout) / 2).max(MIN_CHECK_PERIOD)
    }

    pub fn record_ping(&mut self) {
        self.last_ping = Some(Instant::now());
        self.waiting_for_pong = true;
    }

    pub fn record_pong(&mut self) {
        self.waiting_for_pong = false;
        if let Some(ping_time) = self.last_ping {
            debug!(rtt_ms = ping_time.elapsed().as_millis() as u64, "Received pong");
        }
    }

    /// Record that any frame was received.
    pub fn record_message(&mut self) {
        self.last_message = Instant::now();
    }

    /// True when a ping is outstanding longer than the timeout.
    pub fn is_timed_out(&self) -> bool {
        if !self.waiting_for_pong {
            return false;
        }
        self.last_ping
            .map(|sent| sent.elapsed() > self.timeout)
            .unwrap_or(false)
    }

    /// True when the connection has been idle for a full interval and no
    /// ping is outstanding.
    pub fn should_send_ping(&self) -> bool {
        if self.waiting_for_pong {
            return false;
        }
        let idle_since = match self.last_ping {
            Some(ping) if ping > self.last_message => ping,
            _ => self.last_message,
        };
        idle_since.elapsed() >= self.interval
    }

    pub fn is_waiting_for_pong(&self) -> bool {
        self.waiting_for_pong
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keepalive_initial_state() {
        let ka = Keepalive::new(Duration::from_secs(30), Duration::from_secs(20));
        assert!(!ka.is_timed_out());
        assert!(!ka.is_waiting_for_pong());
        assert_eq!(ka.check_period(), Duration::from_secs(10));
    }

    #[test]
    fn test_keepalive_ping_pong() {
        let mut ka = Keepalive::new(Duration::from_secs(30), Duration::from_secs(20));
        ka.record_ping();
        assert!(ka.is_waiting_for_pong());
        assert!(!ka.should_send_ping());

        ka.record_pong();
        assert!(!ka.is_waiting_for_pong());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_connection_is_probed() {
        let mut ka = Keepalive::new(Duration::from_secs(30), Duration::from_secs(20));
        assert!(!ka.should_send_ping());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(ka.should_send_ping());

        ka.record_message();
        assert!(!ka.should_send_ping());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_pong_times_out() {
        let mut ka = Keepalive::new(Duration::from_secs(30), Duration::from_secs(20));
        ka.record_ping();

        tokio::time::advance(Duration::from_secs(19)).await;
        assert!(!ka.is_timed_out());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(ka.is_timed_out());
    }
}
