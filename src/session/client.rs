//! Session handle and event-loop supervisor
//!
//! [`Session`] is the operation layer: it validates publish/subscribe/
//! unsubscribe requests against the current state and hands them to the
//! protocol client. A spawned supervisor task owns the `rumqttc` event
//! loop, drives state transitions, dispatches inbound messages into the
//! per-filter buffer and resumes interrupted sessions with backoff.
//!
//! Registry, buffer and ack waiters sit behind one mutex so every
//! mutation flows through a single logical sequencer.

use crate::buffer::{InboundMessage, MessageBuffer};
use crate::config::SessionConfig;
use crate::error::{ConnectError, PublishError, SubscribeError, TlsError, UnsubscribeError};
use crate::registry::{Subscription, SubscriptionRegistry};
use crate::session::acks::{AckWaiters, SubscribeWaiters};
use crate::session::reconnect::ReconnectDecision;
use crate::session::router::{route_event, EventRoute};
use crate::session::state::{next_state, KeepAliveTracker, SessionState, SessionTransition};
use crate::session::SessionEvent;
use crate::topic;
use crate::transport::TlsMaterials;
use chrono::Utc;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, ConnectionError, EventLoop, MqttOptions, StateError};
use rumqttc::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Request queue capacity for the protocol client.
const CLIENT_REQUEST_CAPACITY: usize = 64;

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long disconnect waits for the supervisor to stop on its own.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// State owned by the single logical sequencer.
struct SessionInner {
    registry: SubscriptionRegistry,
    buffer: MessageBuffer,
    acks: AckWaiters,
    subs: SubscribeWaiters,
}

/// An explicitly owned MQTT session.
///
/// One active broker connection per handle; a new `connect` while one
/// exists force-closes the previous connection first. All operations
/// require the session to be Connected and fail synchronously otherwise.
pub struct Session {
    config: SessionConfig,
    /// Resolved once so the persistent broker-side session survives
    /// reconnects with the same client id
    client_id: String,
    inner: Arc<Mutex<SessionInner>>,
    client: Arc<Mutex<Option<AsyncClient>>>,
    /// Serializes QoS 1/2 submissions so ack-waiter order matches wire order
    publish_gate: Mutex<()>,
    /// Serializes SUBSCRIBE submissions so filter-waiter order matches
    /// wire order; shared with the supervisor for resubscription
    subscribe_gate: Arc<Mutex<()>>,
    /// Serializes concurrent `connect` calls
    connect_gate: Mutex<()>,
    state_tx: watch::Sender<SessionState>,
    state_rx: watch::Receiver<SessionState>,
    event_tx: mpsc::Sender<SessionEvent>,
    event_rx: Option<mpsc::Receiver<SessionEvent>>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Create a session handle from a validated configuration.
    ///
    /// Nothing touches the network until [`Session::connect`].
    pub fn new(config: SessionConfig) -> Result<Self, crate::error::ConfigError> {
        config.validate()?;
        let client_id = config.client_id();
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let buffer_capacity = config.buffer_capacity;

        Ok(Self {
            config,
            client_id,
            inner: Arc::new(Mutex::new(SessionInner {
                registry: SubscriptionRegistry::new(),
                buffer: MessageBuffer::new(buffer_capacity),
                acks: AckWaiters::new(),
                subs: SubscribeWaiters::new(),
            })),
            client: Arc::new(Mutex::new(None)),
            publish_gate: Mutex::new(()),
            subscribe_gate: Arc::new(Mutex::new(())),
            connect_gate: Mutex::new(()),
            state_tx,
            state_rx,
            event_tx,
            event_rx: Some(event_rx),
            shutdown_tx: Mutex::new(None),
            supervisor: Mutex::new(None),
        })
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Watch channel for state changes, for callers that want to react
    /// to transitions without polling.
    pub fn state_receiver(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Take the session event receiver. Yields `Some` exactly once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.event_rx.take()
    }

    /// Connect to the broker with mutual TLS and wait for the CONNACK.
    ///
    /// Any existing connection is force-closed first. On failure the
    /// session returns to Disconnected; an explicit `disconnect` racing
    /// this call resolves it as [`ConnectError::Cancelled`].
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let _gate = self.connect_gate.lock().await;

        if self.state() != SessionState::Disconnected {
            info!("existing session found, disconnecting before reconnect");
            self.disconnect().await;
        }
        self.reap_supervisor().await;

        // Fatal credential problems surface here, before any network I/O
        let materials = TlsMaterials::load(&self.config.credentials())?;
        let transport = materials.build_transport()?;

        // The shutdown channel must exist before the session leaves
        // Disconnected, so a racing disconnect always has something to
        // signal and the connect resolves as Cancelled
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (connack_tx, connack_rx) = oneshot::channel();
        *self.shutdown_tx.lock().await = Some(shutdown_tx);

        self.apply(SessionTransition::ConnectRequested);

        let options = configure_mqtt_options(&self.config, &self.client_id, transport);
        let (client, event_loop) = AsyncClient::new(options, CLIENT_REQUEST_CAPACITY);
        *self.client.lock().await = Some(client);

        let supervisor = Supervisor {
            config: self.config.clone(),
            client_id: self.client_id.clone(),
            materials,
            inner: self.inner.clone(),
            client_slot: self.client.clone(),
            subscribe_gate: self.subscribe_gate.clone(),
            state_tx: self.state_tx.clone(),
            event_tx: self.event_tx.clone(),
            shutdown_rx,
            connack_tx: Some(connack_tx),
            keep_alive: KeepAliveTracker::new(),
            reconnect_attempts: 0,
        };
        info!(
            endpoint = %self.config.endpoint,
            port = self.config.port,
            client_id = %self.client_id,
            "connecting"
        );
        *self.supervisor.lock().await = Some(tokio::spawn(supervisor.run(event_loop)));

        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(error))) => {
                self.teardown_failed_connect().await;
                Err(error)
            }
            // Supervisor dropped the channel without answering: an
            // explicit disconnect cancelled this connect
            Ok(Err(_)) => {
                self.teardown_failed_connect().await;
                Err(ConnectError::Cancelled)
            }
            Err(_) => {
                self.apply(SessionTransition::ConnectFailed("CONNACK timeout".to_string()));
                self.teardown_failed_connect().await;
                Err(ConnectError::Timeout)
            }
        }
    }

    /// Disconnect from the broker.
    ///
    /// Idempotent: disconnecting a session that is already Disconnected
    /// is a no-op. Clears the subscription registry and fails pending
    /// publish acks; the message buffer is retained for inspection.
    pub async fn disconnect(&self) {
        if self.state() == SessionState::Disconnected {
            return;
        }

        self.apply(SessionTransition::DisconnectRequested);

        if let Some(shutdown_tx) = self.shutdown_tx.lock().await.take() {
            let _ = shutdown_tx.send(true);
        }

        // Best-effort MQTT DISCONNECT so the broker sees a clean close
        if let Some(client) = self.client.lock().await.take() {
            let _ = client.disconnect().await;
        }

        if let Some(handle) = self.supervisor.lock().await.take() {
            let abort = handle.abort_handle();
            match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
                Ok(_) => debug!("supervisor stopped"),
                Err(_) => {
                    warn!("supervisor did not stop within grace period, aborting");
                    abort.abort();
                }
            }
        }

        {
            let mut inner = self.inner.lock().await;
            inner.registry.clear();
            inner.acks.fail_all();
            inner.subs.clear();
        }

        self.apply(SessionTransition::DisconnectComplete);
        self.notify(SessionEvent::Disconnected);
        info!("session disconnected");
    }

    /// Publish a payload to a concrete topic.
    ///
    /// QoS 0 returns once the message is handed to the transport;
    /// QoS 1/2 wait for the broker acknowledgment (PUBACK/PUBCOMP) up to
    /// the configured ack timeout.
    pub async fn publish(
        &self,
        publish_topic: &str,
        payload: impl Into<Vec<u8>>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), PublishError> {
        let state = self.state();
        if !state.allows_operations() {
            return Err(PublishError::NotConnected {
                state: state.to_string(),
            });
        }
        topic::validate_publish_topic(publish_topic).map_err(|reason| {
            PublishError::InvalidTopic {
                topic: publish_topic.to_string(),
                reason,
            }
        })?;

        let client = self.client.lock().await.clone().ok_or_else(|| {
            PublishError::NotConnected {
                state: state.to_string(),
            }
        })?;

        if qos == QoS::AtMostOnce {
            client
                .publish(publish_topic, qos, retain, payload.into())
                .await
                .map_err(|e| PublishError::Broker(e.to_string()))?;
            debug!(topic = %publish_topic, "published (QoS 0)");
            return Ok(());
        }

        let ack_rx = {
            let _gate = self.publish_gate.lock().await;
            let (token, ack_rx) = self.inner.lock().await.acks.register();
            if let Err(e) = client
                .publish(publish_topic, qos, retain, payload.into())
                .await
            {
                self.inner.lock().await.acks.cancel(token);
                return Err(PublishError::Broker(e.to_string()));
            }
            ack_rx
        };

        let timeout_secs = self.config.ack_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(timeout_secs), ack_rx).await {
            Ok(Ok(())) => {
                debug!(topic = %publish_topic, ?qos, "publish acknowledged");
                Ok(())
            }
            Ok(Err(_)) => Err(PublishError::Broker(
                "connection lost before acknowledgment".to_string(),
            )),
            Err(_) => Err(PublishError::AckTimeout { timeout_secs }),
        }
    }

    /// Subscribe to a topic filter.
    ///
    /// Subscribing a filter that is already active updates its QoS in
    /// place; the registry never holds duplicate filter strings. The
    /// registry is only mutated once the broker call is accepted.
    pub async fn subscribe(&self, filter: &str, qos: QoS) -> Result<(), SubscribeError> {
        let state = self.state();
        if !state.allows_operations() {
            return Err(SubscribeError::NotConnected {
                state: state.to_string(),
            });
        }
        topic::validate_filter(filter).map_err(|reason| SubscribeError::InvalidFilter {
            filter: filter.to_string(),
            reason,
        })?;

        let client = self.client.lock().await.clone().ok_or_else(|| {
            SubscribeError::NotConnected {
                state: state.to_string(),
            }
        })?;

        {
            let _gate = self.subscribe_gate.lock().await;
            self.inner.lock().await.subs.register(filter);
            if let Err(e) = client.subscribe(filter, qos).await {
                self.inner.lock().await.subs.cancel_last();
                return Err(SubscribeError::Broker(e.to_string()));
            }
        }

        let outcome = self.inner.lock().await.registry.insert(filter, qos);
        debug!(filter, ?qos, ?outcome, "subscribed");
        Ok(())
    }

    /// Unsubscribe from an active topic filter.
    pub async fn unsubscribe(&self, filter: &str) -> Result<(), UnsubscribeError> {
        let state = self.state();
        if !state.allows_operations() {
            return Err(UnsubscribeError::NotConnected {
                state: state.to_string(),
            });
        }

        if !self.inner.lock().await.registry.contains(filter) {
            return Err(UnsubscribeError::NotSubscribed {
                filter: filter.to_string(),
            });
        }

        let client = self.client.lock().await.clone().ok_or_else(|| {
            UnsubscribeError::NotConnected {
                state: state.to_string(),
            }
        })?;
        client
            .unsubscribe(filter)
            .await
            .map_err(|e| UnsubscribeError::Broker(e.to_string()))?;

        self.inner.lock().await.registry.remove(filter);
        debug!(filter, "unsubscribed");
        Ok(())
    }

    /// Snapshot of active subscriptions.
    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.inner.lock().await.registry.subscriptions()
    }

    /// Buffered messages for a filter, oldest first.
    pub async fn messages(&self, filter: &str) -> Vec<InboundMessage> {
        self.inner.lock().await.buffer.messages(filter)
    }

    /// Clear one filter's buffered messages.
    pub async fn clear_messages(&self, filter: &str) {
        self.inner.lock().await.buffer.clear(filter);
    }

    /// Clear every filter's buffered messages.
    pub async fn clear_all_messages(&self) {
        self.inner.lock().await.buffer.clear_all();
    }

    fn apply(&self, transition: SessionTransition) {
        apply_transition(&self.state_tx, transition);
    }

    fn notify(&self, event: SessionEvent) {
        notify(&self.event_tx, event);
    }

    /// Drop any leftover supervisor from a previous failed connect.
    async fn reap_supervisor(&self) {
        if let Some(handle) = self.supervisor.lock().await.take() {
            handle.abort();
        }
        *self.shutdown_tx.lock().await = None;
    }

    async fn teardown_failed_connect(&self) {
        if let Some(shutdown_tx) = self.shutdown_tx.lock().await.take() {
            let _ = shutdown_tx.send(true);
        }
        if let Some(handle) = self.supervisor.lock().await.take() {
            handle.abort();
        }
        *self.client.lock().await = None;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // No async in Drop; signal and abort, callers wanting a clean
        // broker-side close must call disconnect() explicitly
        if let Ok(mut guard) = self.shutdown_tx.try_lock() {
            if let Some(shutdown_tx) = guard.take() {
                let _ = shutdown_tx.send(true);
            }
        }
        if let Ok(mut guard) = self.supervisor.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

/// Build the protocol options for one connection attempt.
fn configure_mqtt_options(
    config: &SessionConfig,
    client_id: &str,
    transport: Transport,
) -> MqttOptions {
    let mut options = MqttOptions::new(client_id, &config.endpoint, config.port);
    options.set_transport(transport);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    // Persistent broker-side session: subscriptions may survive a short
    // disconnect even though local registry state is cleared
    options.set_clean_start(false);
    options
}

fn apply_transition(state_tx: &watch::Sender<SessionState>, transition: SessionTransition) {
    let current = *state_tx.borrow();
    let next = next_state(current, &transition);
    if next != current {
        debug!(from = %current, to = %next, "session state transition");
        let _ = state_tx.send(next);
    }
}

fn notify(event_tx: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    if let Err(e) = event_tx.try_send(event) {
        debug!(error = %e, "session event dropped (receiver gone or channel full)");
    }
}

/// Background task owning the event loop for one connection.
struct Supervisor {
    config: SessionConfig,
    client_id: String,
    materials: TlsMaterials,
    inner: Arc<Mutex<SessionInner>>,
    client_slot: Arc<Mutex<Option<AsyncClient>>>,
    subscribe_gate: Arc<Mutex<()>>,
    state_tx: watch::Sender<SessionState>,
    event_tx: mpsc::Sender<SessionEvent>,
    shutdown_rx: watch::Receiver<bool>,
    /// Present until the initial connect resolves
    connack_tx: Option<oneshot::Sender<Result<(), ConnectError>>>,
    keep_alive: KeepAliveTracker,
    reconnect_attempts: u32,
}

impl Supervisor {
    async fn run(mut self, mut event_loop: EventLoop) {
        debug!(client_id = %self.client_id, "session supervisor started");
        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            if *shutdown_rx.borrow() {
                debug!("shutdown signal received");
                break;
            }
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        debug!("shutdown signal received");
                        break;
                    }
                }
                polled = event_loop.poll() => {
                    let keep_running = match polled {
                        Ok(event) => {
                            let route = route_event(&event);
                            self.handle_route(route, &mut event_loop).await
                        }
                        Err(error) => self.handle_poll_error(&error, &mut event_loop).await,
                    };
                    if !keep_running {
                        break;
                    }
                }
            }
        }
        debug!(client_id = %self.client_id, "session supervisor stopped");
    }

    /// Returns false when the supervisor should stop.
    async fn handle_route(&mut self, route: EventRoute, event_loop: &mut EventLoop) -> bool {
        match route {
            EventRoute::ConnAckAccepted { session_present } => {
                self.on_connack_accepted(session_present).await;
                true
            }
            EventRoute::ConnAckRejected {
                reason,
                auth_failure,
            } => self.on_connack_rejected(reason, auth_failure).await,
            EventRoute::MessageReceived {
                topic,
                payload,
                qos,
                retain,
            } => {
                self.dispatch_message(topic, payload, qos, retain).await;
                true
            }
            EventRoute::PublishSent { pkid } => {
                self.inner.lock().await.acks.publish_sent(pkid);
                true
            }
            EventRoute::PublishAcked { pkid } | EventRoute::PublishCompleted { pkid } => {
                self.inner.lock().await.acks.acknowledged(pkid);
                true
            }
            EventRoute::SubscribeSent { pkid } => {
                self.inner.lock().await.subs.subscribe_sent(pkid);
                true
            }
            EventRoute::SubscriptionAcked { pkid, failure } => {
                self.on_subscription_acked(pkid, failure).await;
                true
            }
            EventRoute::PingSent => {
                self.keep_alive.ping_sent();
                true
            }
            EventRoute::PingAcknowledged => {
                self.keep_alive.ping_acknowledged();
                true
            }
            EventRoute::Disconnected => {
                self.handle_interruption("broker disconnected", event_loop)
                    .await
            }
            EventRoute::Infrastructure => true,
        }
    }

    async fn on_connack_accepted(&mut self, session_present: bool) {
        let prior = *self.state_tx.borrow();
        apply_transition(&self.state_tx, SessionTransition::ConnAckAccepted);
        self.reconnect_attempts = 0;

        match prior {
            SessionState::Connecting => {
                self.keep_alive.reset();
                info!(session_present, "connected");
                if let Some(connack_tx) = self.connack_tx.take() {
                    let _ = connack_tx.send(Ok(()));
                }
                notify(&self.event_tx, SessionEvent::Connected);
            }
            SessionState::Interrupted => {
                self.keep_alive.reset();
                info!(session_present, "session resumed");
                notify(&self.event_tx, SessionEvent::Resumed);
                self.resubscribe_all().await;
            }
            // The event loop re-established the transport on its own
            // after a tolerated missed ping; the miss budget carries
            // over until a PINGRESP actually lands
            SessionState::Connected => {
                debug!(session_present, "transport re-established")
            }
            other => debug!(state = %other, "unexpected CONNACK ignored"),
        }
    }

    /// Resolve a SUBACK to its filter; a refused return code evicts the
    /// filter from the registry and surfaces the reason.
    async fn on_subscription_acked(&mut self, pkid: u16, failure: Option<String>) {
        let mut inner = self.inner.lock().await;
        let Some(filter) = inner.subs.acked(pkid) else {
            return;
        };

        match failure {
            None => {
                drop(inner);
                debug!(pkid, filter = %filter, "subscription confirmed");
            }
            Some(reason) => {
                inner.registry.remove(&filter);
                drop(inner);
                error!(filter = %filter, reason = %reason, "broker refused subscription");
                notify(
                    &self.event_tx,
                    SessionEvent::SubscriptionRejected { filter, reason },
                );
            }
        }
    }

    /// Returns false when the supervisor should stop.
    async fn on_connack_rejected(&mut self, reason: String, auth_failure: bool) -> bool {
        if let Some(connack_tx) = self.connack_tx.take() {
            let error = if auth_failure {
                ConnectError::Auth(reason.clone())
            } else {
                ConnectError::Network(reason.clone())
            };
            apply_transition(&self.state_tx, SessionTransition::ConnectFailed(reason));
            let _ = connack_tx.send(Err(error));
            return false;
        }

        // Rejected while resuming: broker is refusing us, give up
        error!(reason = %reason, "broker rejected resume attempt");
        self.abort_reconnection(&format!("resume rejected: {reason}"))
            .await;
        false
    }

    async fn dispatch_message(
        &mut self,
        message_topic: String,
        payload: bytes::Bytes,
        qos: QoS,
        retain: bool,
    ) {
        let message = InboundMessage {
            topic: message_topic,
            payload,
            qos,
            retain,
            received_at: Utc::now(),
        };

        let mut inner = self.inner.lock().await;
        let filters = inner.registry.matching_filters(&message.topic);
        if filters.is_empty() {
            debug!(topic = %message.topic, "message on unmatched topic dropped");
            return;
        }

        // Deliver-to-all: every matching filter's buffer records the
        // message; the shell gets one notification per arrival
        for filter in &filters {
            inner.buffer.record(filter, message.clone());
        }
        drop(inner);

        debug!(
            topic = %message.topic,
            matched = filters.len(),
            bytes = message.payload.len(),
            "message dispatched"
        );
        notify(&self.event_tx, SessionEvent::Message(message));
    }

    /// Transition to Interrupted (on first failure) and drive backoff
    /// reconnection. Returns false when the supervisor should stop.
    async fn handle_interruption(&mut self, reason: &str, event_loop: &mut EventLoop) -> bool {
        // Failure before the first CONNACK is a connect failure, not an
        // interruption; it is surfaced to the caller and never retried
        if let Some(connack_tx) = self.connack_tx.take() {
            apply_transition(
                &self.state_tx,
                SessionTransition::ConnectFailed(reason.to_string()),
            );
            let _ = connack_tx.send(Err(ConnectError::Network(reason.to_string())));
            return false;
        }

        let current = *self.state_tx.borrow();
        if matches!(
            current,
            SessionState::Disconnecting | SessionState::Disconnected
        ) {
            // Explicit disconnect in progress; let it finish
            return false;
        }

        if current == SessionState::Connected {
            apply_transition(
                &self.state_tx,
                SessionTransition::Interrupted(reason.to_string()),
            );
            let mut inner = self.inner.lock().await;
            inner.acks.fail_all();
            inner.subs.clear();
            drop(inner);
            notify(
                &self.event_tx,
                SessionEvent::Interrupted {
                    reason: reason.to_string(),
                },
            );
        }

        // Copy out of the watch before the match; the arms borrow self
        // mutably
        let shutdown_requested = *self.shutdown_rx.borrow();
        match self
            .config
            .reconnect
            .decide(self.reconnect_attempts, shutdown_requested)
        {
            ReconnectDecision::Proceed { attempt, delay } => {
                self.reconnect_attempts = attempt;
                info!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "attempting to resume session"
                );
                if !interruptible_sleep(self.shutdown_rx.clone(), delay).await {
                    return false;
                }
                match self.rebuild_connection().await {
                    Ok(new_event_loop) => {
                        *event_loop = new_event_loop;
                        self.keep_alive.reset();
                    }
                    Err(error) => {
                        // Next poll on the stale loop fails again and
                        // re-enters this path with the attempt counted
                        warn!(error = %error, "failed to rebuild connection");
                    }
                }
                true
            }
            ReconnectDecision::AbortShutdownRequested => false,
            ReconnectDecision::AbortMaxAttemptsExceeded => {
                self.abort_reconnection("max reconnection attempts exceeded")
                    .await;
                false
            }
        }
    }

    async fn handle_poll_error(
        &mut self,
        error: &ConnectionError,
        event_loop: &mut EventLoop,
    ) -> bool {
        if let Some(connack_tx) = self.connack_tx.take() {
            let mapped = map_poll_error(error);
            apply_transition(
                &self.state_tx,
                SessionTransition::ConnectFailed(error.to_string()),
            );
            let _ = connack_tx.send(Err(mapped));
            return false;
        }

        // A missed ping surfaces as a poll error when the next PINGREQ
        // comes due with the previous one unacknowledged. Tolerated
        // misses let the event loop re-establish the transport on its
        // own; only an exhausted budget interrupts the session.
        if is_missed_ping(error) {
            if self.keep_alive.ping_missed() {
                let reason = format!(
                    "keep-alive timeout: {} consecutive pings unacknowledged",
                    crate::session::state::MAX_MISSED_PINGS
                );
                return self.handle_interruption(&reason, event_loop).await;
            }
            warn!(
                misses = self.keep_alive.misses(),
                "ping unacknowledged, reconnecting transport"
            );
            return true;
        }

        self.handle_interruption(&error.to_string(), event_loop)
            .await
    }

    /// Reinstate every registered filter after a resume, preserving the
    /// QoS each was subscribed with.
    async fn resubscribe_all(&self) {
        let subscriptions = self.inner.lock().await.registry.subscriptions();
        if subscriptions.is_empty() {
            return;
        }
        let client = self.client_slot.lock().await.clone();
        let Some(client) = client else {
            return;
        };
        let _gate = self.subscribe_gate.lock().await;
        for subscription in subscriptions {
            self.inner.lock().await.subs.register(&subscription.filter);
            match client
                .subscribe(subscription.filter.clone(), subscription.qos)
                .await
            {
                Ok(()) => debug!(filter = %subscription.filter, "re-subscribed"),
                Err(error) => {
                    self.inner.lock().await.subs.cancel_last();
                    error!(filter = %subscription.filter, error = %error, "re-subscribe failed")
                }
            }
        }
    }

    async fn rebuild_connection(&mut self) -> Result<EventLoop, TlsError> {
        let transport = self.materials.build_transport()?;
        let options = configure_mqtt_options(&self.config, &self.client_id, transport);
        let (client, event_loop) = AsyncClient::new(options, CLIENT_REQUEST_CAPACITY);
        *self.client_slot.lock().await = Some(client);
        Ok(event_loop)
    }

    async fn abort_reconnection(&mut self, reason: &str) {
        apply_transition(
            &self.state_tx,
            SessionTransition::ReconnectAborted(reason.to_string()),
        );
        let mut inner = self.inner.lock().await;
        inner.registry.clear();
        inner.acks.fail_all();
        inner.subs.clear();
        drop(inner);
        notify(&self.event_tx, SessionEvent::Disconnected);
    }
}

/// Sleep that wakes early on shutdown; returns false when interrupted.
async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = shutdown_rx.changed() => !*shutdown_rx.borrow(),
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Whether a poll error reports an unacknowledged keep-alive ping.
fn is_missed_ping(error: &ConnectionError) -> bool {
    matches!(error, ConnectionError::MqttState(StateError::AwaitPingResp))
}

/// Classify an event-loop error for the initial connect path.
fn map_poll_error(error: &ConnectionError) -> ConnectError {
    let detail = error.to_string();
    if let ConnectionError::Io(io_error) = error {
        return match io_error.kind() {
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::NotFound => {
                ConnectError::Tls(TlsError::EndpointUnreachable(detail))
            }
            _ => ConnectError::Network(detail),
        };
    }
    let lower = detail.to_lowercase();
    if lower.contains("tls") || lower.contains("certificate") || lower.contains("handshake") {
        ConnectError::Tls(TlsError::HandshakeFailed(detail))
    } else if lower.contains("notauthorized") || lower.contains("badusername") {
        ConnectError::Auth(detail)
    } else {
        ConnectError::Network(detail)
    }
}
