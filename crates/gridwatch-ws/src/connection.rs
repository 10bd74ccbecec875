//! Per-endpoint WebSocket client.
//!
//! Handles the connection lifecycle of one bot endpoint: connect, receive,
//! keepalive, reconnect with capped exponential backoff, and graceful stop.
//!
//! State machine:
//! Idle -> Connecting -> Connected -> (lost) -> Backoff -> Connecting -> ...
//! Any state -> Stopped on shutdown. Network failures never stop the client.

use crate::backoff::Backoff;
use crate::error::{WsError, WsResult};
use crate::heartbeat::Keepalive;
use crate::message::{EndpointEvent, Frame};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use gridwatch_core::Endpoint;
use gridwatch_telemetry::Metrics;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Backoff floor (first wait after a failure).
    pub reconnect_floor_ms: u64,
    /// Backoff ceiling.
    pub reconnect_ceiling_ms: u64,
    /// Idle time before a keepalive ping is sent.
    pub heartbeat_interval_ms: u64,
    /// Pong deadline after a ping.
    pub heartbeat_timeout_ms: u64,
    /// Handshake deadline.
    pub connect_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_floor_ms: 5_000,
            reconnect_ceiling_ms: 60_000,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 20_000,
            connect_timeout_ms: 10_000,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Backoff,
    Stopped,
}

/// How a connected session ended.
enum SessionEnd {
    /// Shutdown was requested; the Close frame has been sent.
    Shutdown,
    /// The event receiver was dropped; nobody is listening any more.
    ConsumerGone,
    /// The connection was lost and should be re-established.
    Lost(WsError),
}

/// WebSocket client for a single bot endpoint.
pub struct EndpointClient {
    endpoint: Endpoint,
    config: ConnectionConfig,
    state: Arc<RwLock<ConnectionState>>,
    event_tx: mpsc::Sender<EndpointEvent>,
    reconnect_count: Arc<RwLock<u32>>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl EndpointClient {
    /// Create a new client.
    ///
    /// Pass a child of a shared token to make a global shutdown reach every
    /// client while keeping `shutdown()` local to this one.
    pub fn new(
        endpoint: Endpoint,
        config: ConnectionConfig,
        event_tx: mpsc::Sender<EndpointEvent>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            endpoint,
            config,
            state: Arc::new(RwLock::new(ConnectionState::Idle)),
            event_tx,
            reconnect_count: Arc::new(RwLock::new(0)),
            shutdown_token,
        }
    }

    pub fn label(&self) -> &str {
        &self.endpoint.label
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Consecutive failed attempts since the last successful connection.
    pub fn consecutive_failures(&self) -> u32 {
        *self.reconnect_count.read()
    }

    /// Signal graceful shutdown of this client only.
    pub fn shutdown(&self) {
        info!(label = %self.label(), "Endpoint client shutdown requested");
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Run the connect/receive/reconnect loop until shutdown.
    pub async fn run(&self) {
        let mut backoff = Backoff::new(
            Duration::from_millis(self.config.reconnect_floor_ms),
            Duration::from_millis(self.config.reconnect_ceiling_ms),
        );

        loop {
            if self.is_shutdown() {
                break;
            }

            self.set_state(ConnectionState::Connecting);

            match self.try_connect().await {
                Ok(Some(stream)) => {
                    backoff.reset();
                    *self.reconnect_count.write() = 0;
                    self.set_state(ConnectionState::Connected);
                    Metrics::endpoint_connected(self.label());
                    info!(label = %self.label(), "Connected");

                    let connected = EndpointEvent::Connected {
                        label: self.label().to_string(),
                    };
                    if !self.emit(connected).await {
                        break;
                    }

                    let end = self.receive(stream).await;
                    Metrics::endpoint_disconnected(self.label());
                    match end {
                        SessionEnd::Shutdown | SessionEnd::ConsumerGone => break,
                        SessionEnd::Lost(e) => {
                            warn!(label = %self.label(), error = %e, "Connection lost");
                            let disconnected = EndpointEvent::Disconnected {
                                label: self.label().to_string(),
                                reason: e.to_string(),
                            };
                            if !self.emit(disconnected).await {
                                break;
                            }
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(label = %self.label(), error = %e, "Connection attempt failed");
                }
            }

            if self.is_shutdown() {
                break;
            }

            self.set_state(ConnectionState::Backoff);
            let delay = backoff.next_delay();
            *self.reconnect_count.write() = backoff.failures();
            Metrics::reconnect(self.label());
            warn!(
                label = %self.label(),
                attempt = backoff.failures(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting"
            );

            // Cancellation-aware sleep
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!(label = %self.label(), "Shutdown requested during backoff");
                    break;
                }
            }
        }

        self.set_state(ConnectionState::Stopped);
        info!(label = %self.label(), "Endpoint client stopped");
    }

    /// Perform the handshake. `Ok(None)` means shutdown interrupted it.
    async fn try_connect(&self) -> WsResult<Option<WsStream>> {
        info!(label = %self.label(), url = %self.endpoint.address, "Connecting");

        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let connect =
            connect_async_tls_with_config(self.endpoint.address.as_str(), None, true, None);

        tokio::select! {
            () = self.shutdown_token.cancelled() => Ok(None),
            result = tokio::time::timeout(timeout, connect) => match result {
                Ok(Ok((stream, _response))) => Ok(Some(stream)),
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(WsError::ConnectTimeout(self.config.connect_timeout_ms)),
            },
        }
    }

    /// Receive loop for one established connection.
    async fn receive(&self, stream: WsStream) -> SessionEnd {
        let (mut write, mut read) = stream.split();

        let mut keepalive = Keepalive::new(
            Duration::from_millis(self.config.heartbeat_interval_ms),
            Duration::from_millis(self.config.heartbeat_timeout_ms),
        );
        let mut check = tokio::time::interval(keepalive.check_period());
        check.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        check.tick().await;

        loop {
            tokio::select! {
                biased;

                () = self.shutdown_token.cancelled() => {
                    self.close_gracefully(&mut write).await;
                    return SessionEnd::Shutdown;
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            keepalive.record_message();
                            Metrics::frame_received(self.label());
                            if !self.handle_text(&text).await {
                                if self.is_shutdown() {
                                    self.close_gracefully(&mut write).await;
                                    return SessionEnd::Shutdown;
                                }
                                return SessionEnd::ConsumerGone;
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            keepalive.record_message();
                            Metrics::frame_dropped(self.label(), "binary");
                            debug!(label = %self.label(), len = data.len(), "Dropping binary frame");
                        }
                        Some(Ok(Message::Ping(data))) => {
                            keepalive.record_message();
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                return SessionEnd::Lost(e.into());
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            keepalive.record_message();
                            keepalive.record_pong();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            return SessionEnd::Lost(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => return SessionEnd::Lost(e.into()),
                        None => {
                            return SessionEnd::Lost(WsError::ConnectionClosed {
                                code: 1006,
                                reason: "Stream ended".to_string(),
                            });
                        }
                    }
                }

                _ = check.tick() => {
                    if keepalive.is_timed_out() {
                        return SessionEnd::Lost(WsError::HeartbeatTimeout);
                    }
                    if keepalive.should_send_ping() {
                        if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                            return SessionEnd::Lost(e.into());
                        }
                        keepalive.record_ping();
                        debug!(label = %self.label(), "Sent keepalive ping");
                    }
                }
            }
        }
    }

    /// Decode one text frame and forward it. Returns false when the
    /// client should stop (shutdown or receiver dropped).
    ///
    /// Undecodable frames are dropped without closing the connection.
    async fn handle_text(&self, text: &str) -> bool {
        let frame = match Frame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                Metrics::frame_dropped(self.label(), "undecodable");
                warn!(label = %self.label(), error = %e, "Dropping undecodable frame");
                return true;
            }
        };

        match frame.into_parts() {
            Some((kind, payload)) => {
                let event = EndpointEvent::Frame {
                    label: self.label().to_string(),
                    kind,
                    payload,
                };
                self.emit(event).await
            }
            None => {
                Metrics::frame_dropped(self.label(), "not_actionable");
                trace!(label = %self.label(), "Dropping frame without kind or payload");
                true
            }
        }
    }

    /// Deliver an event unless shutdown wins the race. Returns false when
    /// the event was not delivered.
    async fn emit(&self, event: EndpointEvent) -> bool {
        tokio::select! {
            biased;
            () = self.shutdown_token.cancelled() => false,
            result = self.event_tx.send(event) => {
                if result.is_err() {
                    warn!(label = %self.label(), "Event receiver dropped, stopping client");
                    return false;
                }
                true
            }
        }
    }

    async fn close_gracefully(&self, write: &mut WsSink) {
        info!(label = %self.label(), "Closing connection");
        if let Err(e) = write.send(Message::Close(None)).await {
            warn!(label = %self.label(), ?e, "Failed to send Close frame during shutdown");
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(address: &str, config: ConnectionConfig) -> (EndpointClient, mpsc::Receiver<EndpointEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let endpoint = Endpoint::new("test", address).unwrap();
        (
            EndpointClient::new(endpoint, config, tx, CancellationToken::new()),
            rx,
        )
    }

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.reconnect_floor_ms, 5_000);
        assert_eq!(config.reconnect_ceiling_ms, 60_000);
        assert_eq!(config.heartbeat_interval_ms, 30_000);
    }

    #[test]
    fn test_initial_state() {
        let (client, _rx) = client("127.0.0.1:1", ConnectionConfig::default());
        assert_eq!(client.state(), ConnectionState::Idle);
        assert_eq!(client.consecutive_failures(), 0);
        assert_eq!(client.label(), "test");
    }

    #[tokio::test]
    async fn test_stop_before_run_is_terminal() {
        let (client, mut rx) = client("127.0.0.1:1", ConnectionConfig::default());
        client.shutdown();
        client.run().await;
        assert_eq!(client.state(), ConnectionState::Stopped);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_refused_connection_backs_off_without_events() {
        let config = ConnectionConfig {
            reconnect_floor_ms: 20,
            reconnect_ceiling_ms: 40,
            connect_timeout_ms: 500,
            ..Default::default()
        };
        // Port 1 is never listening on loopback in test environments
        let (client, mut rx) = client("127.0.0.1:1", config);
        let client = Arc::new(client);
        let runner = client.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(client.consecutive_failures() >= 2);

        client.shutdown();
        let stopped = tokio::time::timeout(Duration::from_secs(2), handle).await;
        tokio_test::assert_ok!(tokio_test::assert_ok!(stopped, "client should stop promptly"));

        assert_eq!(client.state(), ConnectionState::Stopped);
        // Handshake failures are not disconnects
        assert!(rx.try_recv().is_err());
    }
}
