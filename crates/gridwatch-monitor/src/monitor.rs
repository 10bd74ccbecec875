//! Aggregator.
//!
//! Owns one `EndpointClient` per configured bot and the shared
//! `BotStates`. Client events arrive over a single channel and are applied
//! by one dispatch loop, which keeps per-endpoint receipt order. Two
//! policies run on top of the state:
//! - Error alerts, rate limited per bot by `ErrorCooldown`
//! - Periodic digest of per-bot deltas since the previous report
//!
//! The dispatch loop never waits on the gateway. Notifications are queued
//! and delivered in order by a separate notifier task.

use crate::cooldown::ErrorCooldown;
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use gridwatch_core::Endpoint;
use gridwatch_feed::{
    BotEvent, BotSnapshot, BotState, BotStates, EventParser, FeedResult, SnapshotSource,
};
use gridwatch_notify::{DigestEntry, DynGateway, Notification};
use gridwatch_telemetry::Metrics;
use gridwatch_ws::{ConnectionConfig, EndpointClient, EndpointEvent};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Runtime settings for the aggregator.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Digest interval; zero disables the digest loop.
    pub periodic_interval: Duration,
    pub error_cooldown: Duration,
    pub startup_notification: bool,
    pub connection: ConnectionConfig,
    /// Capacity of the client-to-aggregator event channel.
    pub event_buffer: usize,
    /// Capacity of the outgoing notification queue. Notifications beyond
    /// it are dropped and counted as failed.
    pub notification_buffer: usize,
    /// How long `run` waits for tasks to finish after shutdown.
    pub shutdown_grace: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            periodic_interval: Duration::from_secs(3600),
            error_cooldown: Duration::from_secs(60),
            startup_notification: true,
            connection: ConnectionConfig::default(),
            event_buffer: 1024,
            notification_buffer: 256,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

pub struct Monitor {
    endpoints: Vec<Endpoint>,
    settings: MonitorSettings,
    states: Arc<BotStates>,
    gateway: DynGateway,
    cooldown: ErrorCooldown,
    clients: Mutex<Vec<Arc<EndpointClient>>>,
    notify_tx: mpsc::Sender<Notification>,
    notify_rx: tokio::sync::Mutex<mpsc::Receiver<Notification>>,
    shutdown_token: CancellationToken,
    started: AtomicBool,
}

impl Monitor {
    pub fn new(endpoints: Vec<Endpoint>, settings: MonitorSettings, gateway: DynGateway) -> Self {
        let states = Arc::new(BotStates::new(&endpoints));
        let cooldown = ErrorCooldown::new(settings.error_cooldown);
        let (notify_tx, notify_rx) = mpsc::channel(settings.notification_buffer.max(1));
        Self {
            endpoints,
            settings,
            states,
            gateway,
            cooldown,
            clients: Mutex::new(Vec::new()),
            notify_tx,
            notify_rx: tokio::sync::Mutex::new(notify_rx),
            shutdown_token: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Shared state store, for read-only consumers.
    pub fn states(&self) -> Arc<BotStates> {
        Arc::clone(&self.states)
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn get_snapshot(&self, label: &str) -> Option<BotSnapshot> {
        self.states.get_snapshot(label)
    }

    /// Copies of every bot's state in configuration order.
    pub fn get_all_snapshots(&self) -> Vec<BotSnapshot> {
        self.states.all_snapshots()
    }

    /// Token cancelled by `shutdown`. Other tasks may hang off it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Stop one endpoint client. Other clients and the digest keep running.
    ///
    /// Returns false when no running client has that label.
    pub fn stop_client(&self, label: &str) -> bool {
        let clients = self.clients.lock();
        match clients.iter().find(|c| c.label() == label) {
            Some(client) => {
                client.shutdown();
                true
            }
            None => false,
        }
    }

    /// Request shutdown of every task. Safe to call more than once.
    pub fn shutdown(&self) {
        if !self.shutdown_token.is_cancelled() {
            info!("Monitor shutdown requested");
        }
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Start every client, the notifier and the digest loop, then dispatch
    /// events until shutdown. Returns once the spawned tasks have finished
    /// or the grace period ran out.
    pub async fn run(self: &Arc<Self>) -> AppResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(AppError::AlreadyRunning);
        }

        let (event_tx, mut event_rx) = mpsc::channel(self.settings.event_buffer);
        let mut tasks = JoinSet::new();

        {
            let monitor = Arc::clone(self);
            tasks.spawn(async move { monitor.notifier_loop().await });
        }

        for endpoint in &self.endpoints {
            let client = Arc::new(EndpointClient::new(
                endpoint.clone(),
                self.settings.connection.clone(),
                event_tx.clone(),
                self.shutdown_token.child_token(),
            ));
            self.clients.lock().push(Arc::clone(&client));
            info!(label = %endpoint.label, address = %endpoint.address, "Starting endpoint client");
            tasks.spawn(async move { client.run().await });
        }
        drop(event_tx);

        if !self.settings.periodic_interval.is_zero() {
            let monitor = Arc::clone(self);
            tasks.spawn(async move { monitor.digest_loop().await });
        } else {
            info!("Periodic digest disabled");
        }

        if self.settings.startup_notification {
            self.enqueue(Notification::Startup(self.states.labels().to_vec()));
        }

        info!(bots = self.endpoints.len(), gateway = self.gateway.name(), "Monitor running");

        loop {
            tokio::select! {
                biased;
                () = self.shutdown_token.cancelled() => break,
                event = event_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        // Every client was stopped individually
                        debug!("All endpoint clients stopped");
                        self.shutdown_token.cancelled().await;
                        break;
                    }
                },
            }
        }

        self.shutdown();
        drop(event_rx);

        let drain = async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    if e.is_panic() {
                        error!(error = %e, "Monitor task panicked");
                    }
                }
            }
        };
        if tokio::time::timeout(self.settings.shutdown_grace, drain).await.is_err() {
            warn!(
                grace_ms = self.settings.shutdown_grace.as_millis() as u64,
                "Tasks still running after shutdown grace, aborting"
            );
            tasks.abort_all();
        }

        info!("Monitor stopped");
        Ok(())
    }

    fn handle_event(&self, event: EndpointEvent) {
        match event {
            EndpointEvent::Connected { label } => {
                self.states
                    .with_state(&label, |state| state.mark_connected(Utc::now()));
            }
            EndpointEvent::Disconnected { label, reason } => {
                debug!(label = %label, reason = %reason, "Bot disconnected");
                self.states.with_state(&label, BotState::mark_disconnected);
            }
            EndpointEvent::Frame {
                label,
                kind,
                payload,
            } => self.dispatch(&label, &kind, &payload),
        }
    }

    /// Route one event to its bot.
    ///
    /// Never fails and never waits on delivery: unknown labels are dropped,
    /// parse failures are logged and counted, and notifications are queued.
    pub fn dispatch(&self, label: &str, kind: &str, payload: &Value) {
        if !self.states.contains(label) {
            debug!(label, kind, "Event for unknown bot dropped");
            return;
        }

        let event = match EventParser::parse(label, kind, payload) {
            Ok(event) => event,
            Err(e) => {
                error!(label, kind, error = %e, "Failed to parse bot event");
                Metrics::parse_error(label, kind);
                return;
            }
        };
        Metrics::event_dispatched(label, event.kind().as_str());

        let now = Utc::now();
        let action = match self.states.with_state(label, |state| apply_event(state, event, now)) {
            Some(Ok(action)) => action,
            Some(Err(e)) => {
                error!(label, kind, error = %e, "Bot event rejected");
                Metrics::parse_error(label, kind);
                return;
            }
            None => return,
        };

        match action {
            Action::None => {}
            Action::InitialSummary(snapshot) => {
                info!(label, "First summary received");
                self.enqueue(Notification::InitialSummary {
                    label: label.to_string(),
                    snapshot,
                });
            }
            Action::ErrorAlert(message) => self.alert_error(label, message),
        }
    }

    fn alert_error(&self, label: &str, message: String) {
        warn!(label, message = %message, "Bot reported error");

        let now = Instant::now();
        if !self.cooldown.should_send(label, now) {
            debug!(
                label,
                remaining_ms = self.cooldown.remaining(label, now).as_millis() as u64,
                "Error alert suppressed by cooldown"
            );
            Metrics::error_alert_suppressed(label);
            return;
        }

        self.enqueue(Notification::ErrorAlert {
            label: label.to_string(),
            message,
        });
    }

    /// Compute every bot's delta, reset baselines and queue one digest.
    ///
    /// Each bot's delta and reset happen under its entry lock; the
    /// notification is built after all locks are released.
    pub fn send_digest(&self) {
        let entries: Vec<DigestEntry> = self
            .states
            .take_digest()
            .into_iter()
            .map(|(snapshot, delta)| DigestEntry {
                label: snapshot.label.clone(),
                snapshot,
                delta,
            })
            .collect();

        Metrics::digest();
        info!(bots = entries.len(), "Queueing periodic digest");
        self.enqueue(Notification::Digest(entries));
    }

    async fn digest_loop(&self) {
        let interval = self.settings.periodic_interval;
        info!(interval_secs = interval.as_secs(), "Periodic digest started");

        loop {
            tokio::select! {
                biased;
                () = self.shutdown_token.cancelled() => break,
                () = tokio::time::sleep(interval) => self.send_digest(),
            }
        }

        debug!("Periodic digest stopped");
    }

    fn enqueue(&self, notification: Notification) {
        let (reason, dropped) = match self.notify_tx.try_send(notification) {
            Ok(()) => return,
            Err(TrySendError::Full(n)) => ("queue full", n),
            Err(TrySendError::Closed(n)) => ("notifier stopped", n),
        };
        warn!(kind = dropped.kind(), reason, "Notification dropped");
        Metrics::notification(dropped.kind(), false, 0.0);
    }

    /// Deliver queued notifications in order until shutdown, then flush
    /// what was queued before it.
    async fn notifier_loop(&self) {
        let mut rx = self.notify_rx.lock().await;
        loop {
            tokio::select! {
                biased;
                () = self.shutdown_token.cancelled() => break,
                next = rx.recv() => match next {
                    Some(notification) => self.deliver(notification).await,
                    None => break,
                },
            }
        }
        self.deliver_pending(&mut rx).await;
    }

    async fn deliver_pending(&self, rx: &mut mpsc::Receiver<Notification>) {
        while let Ok(notification) = rx.try_recv() {
            self.deliver(notification).await;
        }
    }

    async fn deliver(&self, notification: Notification) {
        let kind = notification.kind();
        let started = std::time::Instant::now();
        let result = notification.send_via(self.gateway.as_ref()).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        Metrics::notification(kind, result.is_ok(), latency_ms);
        if let Err(e) = result {
            error!(
                gateway = self.gateway.name(),
                kind,
                error = %e,
                "Notification delivery failed"
            );
        }
    }

    /// Deliver everything queued so far on the calling task.
    #[cfg(test)]
    async fn flush_notifications(&self) {
        let mut rx = self.notify_rx.lock().await;
        self.deliver_pending(&mut rx).await;
    }
}

impl SnapshotSource for Monitor {
    fn get_snapshot(&self, label: &str) -> Option<BotSnapshot> {
        Monitor::get_snapshot(self, label)
    }

    fn get_all_snapshots(&self) -> Vec<BotSnapshot> {
        Monitor::get_all_snapshots(self)
    }

    fn labels(&self) -> Vec<String> {
        self.states.labels().to_vec()
    }
}

/// Notification decided while the entry lock was held, queued after release.
#[derive(Debug)]
enum Action {
    None,
    InitialSummary(BotSnapshot),
    ErrorAlert(String),
}

fn apply_event(state: &mut BotState, event: BotEvent, at: DateTime<Utc>) -> FeedResult<Action> {
    match event {
        BotEvent::Info(info) => state.set_info(info),
        BotEvent::Config(config) => state.set_config(config),
        BotEvent::Summary(summary) => {
            state.apply_summary(summary, at)?;
            if state.take_initial_summary() {
                return Ok(Action::InitialSummary(state.clone()));
            }
        }
        BotEvent::Error(message) => {
            state.record_error(message.clone(), at);
            return Ok(Action::ErrorAlert(message));
        }
        BotEvent::Ignored(kind) => {
            debug!(label = %state.label, kind = %kind, "Ignored event kind");
        }
    }
    Ok(Action::None)
}
