//! Connection manager: the single context object the host drives.
//!
//! Owns the handshake, the outbound queue, the command inbox and the three
//! transports. The host calls [`ConnectionManager::tick`] on every pass of
//! its control loop; each tick, in order:
//!
//! 1. services the stream transport, feeding its events to the handshake,
//! 2. starts a pub/sub connect attempt if the link is down and a retry is due,
//! 3. services the pub/sub transport,
//! 4. drains the outbound queue if the stream is authenticated.
//!
//! No step waits on the network.

use std::collections::VecDeque;
use std::time::Instant;

use serde::Serialize;
use serde_json::value::RawValue;
use tracing::{debug, info, warn};

use zilink_protocol::envelope::{Envelope, Inbound};
use zilink_protocol::messages::ComponentUpdate;
use zilink_protocol::routes::{Channel, Endpoint, parse_topic};

use crate::auth::{AuthHandshake, HandshakeAction};
use crate::error::{LinkError, TransportError};
use crate::inbox::CommandInbox;
use crate::queue::OutboundQueue;
use crate::reconnection::RetrySchedule;
use crate::router::{Route, TransportRouter};
use crate::transport::{
    AlwaysAssociated, NetworkLink, PubSubTransport, RequestTransport, StreamEvent,
    StreamTransport, Transports,
};
use crate::types::{
    ConnectionState, Credentials, LinkConfig, LinkEvent, TelemetryOutcome, TransportHandles,
    TransportKind,
};

/// Diagnostics kept for the host before the oldest are dropped.
const MAX_PENDING_EVENTS: usize = 64;

/// Topics and paths derived from the device identity.
#[derive(Debug, Clone)]
struct DeviceRoutes {
    data_topic: String,
    status_topic: String,
    data_path: String,
    status_path: String,
}

impl DeviceRoutes {
    fn new(device_id: &str) -> Self {
        Self {
            data_topic: Channel::Data.topic(device_id),
            status_topic: Channel::Status.topic(device_id),
            data_path: Endpoint::Data.path(device_id),
            status_path: Endpoint::Status.path(device_id),
        }
    }
}

/// Device connectivity context.
pub struct ConnectionManager<S, P, R, N = AlwaysAssociated> {
    credentials: Credentials,
    handshake: AuthHandshake,
    queue: OutboundQueue<Box<RawValue>>,
    inbox: CommandInbox,
    router: TransportRouter,
    routes: DeviceRoutes,
    transports: Transports<S, P, R>,
    network: N,
    handles: TransportHandles,
    pubsub_retry: RetrySchedule,
    events: VecDeque<LinkEvent>,
}

impl<S, P, R> ConnectionManager<S, P, R, AlwaysAssociated>
where
    S: StreamTransport,
    P: PubSubTransport,
    R: RequestTransport,
{
    /// Creates a manager in the `Disconnected` state.
    pub fn new(credentials: Credentials, config: &LinkConfig, transports: Transports<S, P, R>) -> Self {
        let device_id = credentials.device_id().to_string();
        Self {
            handshake: AuthHandshake::new(),
            queue: OutboundQueue::new(config.queue_capacity),
            inbox: CommandInbox::new(),
            router: TransportRouter::new(&device_id),
            routes: DeviceRoutes::new(&device_id),
            transports,
            network: AlwaysAssociated,
            handles: TransportHandles::default(),
            pubsub_retry: RetrySchedule::new(config.pubsub_retry_interval),
            events: VecDeque::new(),
            credentials,
        }
    }
}

impl<S, P, R, N> ConnectionManager<S, P, R, N>
where
    S: StreamTransport,
    P: PubSubTransport,
    R: RequestTransport,
    N: NetworkLink,
{
    /// Replaces the network association layer.
    pub fn with_network<M: NetworkLink>(self, network: M) -> ConnectionManager<S, P, R, M> {
        ConnectionManager {
            credentials: self.credentials,
            handshake: self.handshake,
            queue: self.queue,
            inbox: self.inbox,
            router: self.router,
            routes: self.routes,
            transports: self.transports,
            network,
            handles: self.handles,
            pubsub_retry: self.pubsub_retry,
            events: self.events,
        }
    }

    /// Runs one service pass. Call this on every iteration of the host loop.
    pub fn tick(&mut self, now: Instant) {
        self.service_stream();
        self.maintain_pubsub(now);
        self.service_pubsub();
        if self.handshake.is_authenticated() {
            self.drain_queue();
        }
    }

    // -- Telemetry --

    /// Sends a telemetry payload given as JSON text.
    ///
    /// Sent directly when authenticated, otherwise queued. Only invalid
    /// JSON is an error.
    pub fn send_telemetry(&mut self, payload: &str) -> Result<TelemetryOutcome, LinkError> {
        let raw = RawValue::from_string(payload.to_string())?;
        Ok(self.send_telemetry_raw(raw))
    }

    /// Sends any serialisable value as a telemetry payload.
    pub fn send_telemetry_value<T: Serialize>(
        &mut self,
        value: &T,
    ) -> Result<TelemetryOutcome, LinkError> {
        let raw = serde_json::value::to_raw_value(value)?;
        Ok(self.send_telemetry_raw(raw))
    }

    fn send_telemetry_raw(&mut self, raw: Box<RawValue>) -> TelemetryOutcome {
        if self.handshake.is_authenticated() {
            // Older payloads go first.
            self.drain_queue();
            if self.queue.is_empty() {
                match self.send_device_data(&raw) {
                    Ok(()) => return TelemetryOutcome::Sent,
                    Err(e) => debug!(error = %e, "telemetry send failed, queueing"),
                }
            }
        }
        self.enqueue(raw);
        TelemetryOutcome::Queued
    }

    /// Forwards queued telemetry to the stream, oldest first.
    ///
    /// No-op unless authenticated. Stops at the first payload the stream
    /// does not accept; the rest stay queued. Returns how many were sent.
    pub fn drain_queue(&mut self) -> usize {
        if !self.handshake.is_authenticated() || self.queue.is_empty() {
            return 0;
        }

        let stream = &mut self.transports.stream;
        let result = self.queue.drain(|payload| {
            let frame = Envelope::device_data(payload)
                .to_text()
                .map_err(|e| TransportError::Send(e.to_string()))?;
            stream.send_text(&frame)
        });

        match result {
            Ok(sent) => {
                info!(sent, "outbound queue drained");
                sent
            }
            Err((sent, e)) => {
                debug!(
                    sent,
                    remaining = self.queue.len(),
                    error = %e,
                    "queue drain stopped early"
                );
                sent
            }
        }
    }

    fn send_device_data(&mut self, payload: &RawValue) -> Result<(), LinkError> {
        let frame = Envelope::device_data(payload).to_text()?;
        self.transports.stream.send_text(&frame)?;
        Ok(())
    }

    fn enqueue(&mut self, payload: Box<RawValue>) {
        if self.queue.push(payload).is_some() {
            debug!(capacity = self.queue.capacity(), "outbound queue full, dropped oldest");
            self.push_event(LinkEvent::QueueEvicted);
        }
    }

    // -- Component updates and direct sends --

    /// Sends a component/state update over the first available transport.
    ///
    /// The stream is used as soon as it is open, authenticated or not.
    pub fn send_component(&mut self, payload: &str) -> Result<Route, LinkError> {
        let route = self.router.route_component(
            &self.handles,
            &mut self.transports,
            &self.network,
            payload,
        )?;
        Ok(route)
    }

    /// Serialises and sends a dashboard widget update.
    pub fn send_component_update(&mut self, update: &ComponentUpdate) -> Result<Route, LinkError> {
        let payload = serde_json::to_string(update)?;
        self.send_component(&payload)
    }

    /// Publishes to `zilink/devices/{id}/data`.
    pub fn publish_data(&mut self, payload: &str) -> Result<(), LinkError> {
        let topic = self.routes.data_topic.clone();
        self.publish(&topic, payload)
    }

    /// Publishes to `zilink/devices/{id}/status`.
    pub fn publish_status(&mut self, payload: &str) -> Result<(), LinkError> {
        let topic = self.routes.status_topic.clone();
        self.publish(&topic, payload)
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), LinkError> {
        if !self.handles.pubsub {
            return Err(TransportError::NotConnected.into());
        }
        self.transports.pubsub.publish(topic, payload.as_bytes())?;
        Ok(())
    }

    /// POSTs to `/devices/{id}/data`. Returns the HTTP status.
    pub fn post_data(&mut self, payload: &str) -> Result<u16, LinkError> {
        let path = self.routes.data_path.clone();
        self.post(&path, payload)
    }

    /// POSTs to `/devices/{id}/status`. Returns the HTTP status.
    pub fn post_status(&mut self, payload: &str) -> Result<u16, LinkError> {
        let path = self.routes.status_path.clone();
        self.post(&path, payload)
    }

    fn post(&mut self, path: &str, payload: &str) -> Result<u16, LinkError> {
        if !self.network.is_associated() {
            return Err(TransportError::NotConnected.into());
        }
        let status = self.transports.request.post(path, payload)?;
        debug!(path, status, "request delivered");
        Ok(status)
    }

    // -- Commands --

    /// Takes the latest operator command, if one arrived since the last call.
    pub fn try_take_command(&mut self) -> Option<String> {
        self.inbox.try_take_command()
    }

    pub fn has_command(&self) -> bool {
        self.inbox.has_command()
    }

    fn deliver_command(&mut self, transport: TransportKind, command: String) {
        let replaced_unread = self.inbox.set_command(command.clone());
        if replaced_unread {
            debug!(%transport, "unread command overwritten");
        }
        info!(%transport, %command, "command received");
        self.push_event(LinkEvent::CommandReceived {
            transport,
            command,
            replaced_unread,
        });
    }

    // -- State --

    pub fn state(&self) -> ConnectionState {
        self.handshake.state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.handshake.is_authenticated()
    }

    pub fn handles(&self) -> TransportHandles {
        self.handles
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn transports(&self) -> &Transports<S, P, R> {
        &self.transports
    }

    /// Takes all diagnostics recorded since the last call, oldest first.
    pub fn drain_events(&mut self) -> Vec<LinkEvent> {
        self.events.drain(..).collect()
    }

    /// Returns the context to its freshly constructed state.
    ///
    /// Credentials, configuration and transports are kept.
    pub fn reset(&mut self) {
        self.handshake.reset();
        self.queue.clear();
        self.inbox.clear();
        self.pubsub_retry.clear();
        self.handles = TransportHandles::default();
        self.events.clear();
        info!(device = %self.credentials.device_id(), "connection context reset");
    }

    fn push_event(&mut self, event: LinkEvent) {
        if self.events.len() == MAX_PENDING_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    // -- Tick steps --

    fn service_stream(&mut self) {
        while let Some(event) = self.transports.stream.poll_event() {
            match &event {
                StreamEvent::Opened => self.handles.stream = true,
                StreamEvent::Closed | StreamEvent::Error(_) => self.handles.stream = false,
                StreamEvent::Text(_) => {}
            }

            let before = self.handshake.state();
            let action = self.handshake.handle(event);
            self.note_transition(before);

            match action {
                HandshakeAction::None => {}
                HandshakeAction::SendAuth => self.send_auth(),
                HandshakeAction::Drain => {
                    self.drain_queue();
                }
                HandshakeAction::Command(command) => {
                    self.deliver_command(TransportKind::Stream, command);
                }
                HandshakeAction::Rejected(error) => {
                    warn!(%error, "server reported error");
                    self.push_event(LinkEvent::AuthRejected { error });
                }
                HandshakeAction::TransportError(error) => {
                    warn!(%error, "stream transport error");
                    self.push_event(LinkEvent::StreamError { error });
                }
                HandshakeAction::Malformed(reason) => {
                    warn!(%reason, "ignoring malformed stream message");
                    self.push_event(LinkEvent::MalformedMessage {
                        transport: TransportKind::Stream,
                        reason,
                    });
                }
                HandshakeAction::Ignored(msg_type) => {
                    debug!(%msg_type, "ignoring unhandled stream message");
                    self.push_event(LinkEvent::UnknownMessage {
                        transport: TransportKind::Stream,
                        msg_type: msg_type.to_string(),
                    });
                }
            }
        }
    }

    fn send_auth(&mut self) {
        let frame = Envelope::auth(self.credentials.device_id(), self.credentials.auth_token())
            .to_text();
        let result = match frame {
            Ok(text) => self
                .transports
                .stream
                .send_text(&text)
                .map_err(LinkError::from),
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => debug!(device = %self.credentials.device_id(), "auth request sent"),
            Err(e) => warn!(error = %e, "failed to send auth request"),
        }
    }

    fn note_transition(&mut self, before: ConnectionState) {
        let after = self.handshake.state();
        if before != after {
            info!(
                device = %self.credentials.device_id(),
                from = %before,
                to = %after,
                "connection state changed"
            );
            self.push_event(LinkEvent::StateChanged {
                from: before,
                to: after,
            });
        }
    }

    fn maintain_pubsub(&mut self, now: Instant) {
        if !self.transports.pubsub.is_enabled() {
            return;
        }

        if !self.transports.pubsub.is_connected() && self.pubsub_retry.is_due(now) {
            self.pubsub_retry.attempted(now);
            debug!("starting pub/sub connect attempt");
            if let Err(e) = self.transports.pubsub.connect() {
                let retry_in = self.pubsub_retry.interval();
                warn!(
                    error = %e,
                    retry_in_ms = retry_in.as_millis() as u64,
                    "pub/sub connect failed"
                );
                self.push_event(LinkEvent::PubSubConnectFailed {
                    error: e.to_string(),
                    retry_in,
                });
            }
        }

        let connected = self.transports.pubsub.is_connected();
        if connected != self.handles.pubsub {
            self.handles.pubsub = connected;
            if connected {
                info!("pub/sub transport connected");
                self.push_event(LinkEvent::PubSubConnected);
            } else {
                info!("pub/sub transport disconnected");
                self.push_event(LinkEvent::PubSubDisconnected);
            }
        }
    }

    fn service_pubsub(&mut self) {
        while let Some(msg) = self.transports.pubsub.poll_message() {
            let ours = matches!(
                parse_topic(&msg.topic),
                Some((device_id, Channel::Commands)) if device_id == self.credentials.device_id()
            );
            if !ours {
                debug!(topic = %msg.topic, "ignoring message on unexpected topic");
                continue;
            }

            match Inbound::parse_slice(&msg.payload) {
                Ok(Inbound::Command { command }) => {
                    self.deliver_command(TransportKind::PubSub, command);
                }
                Ok(other) => {
                    let msg_type = other.msg_type().to_string();
                    debug!(%msg_type, "ignoring unhandled pub/sub message");
                    self.push_event(LinkEvent::UnknownMessage {
                        transport: TransportKind::PubSub,
                        msg_type,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "ignoring malformed pub/sub message");
                    self.push_event(LinkEvent::MalformedMessage {
                        transport: TransportKind::PubSub,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::mock::{MockNetwork, MockPubSub, MockRequest, MockStream};

    type TestManager = ConnectionManager<MockStream, MockPubSub, MockRequest, AlwaysAssociated>;

    const AUTH_OK: &str = r#"{"type":"auth_success"}"#;

    fn manager() -> TestManager {
        manager_with(LinkConfig::default())
    }

    fn manager_with(config: LinkConfig) -> TestManager {
        ConnectionManager::new(
            Credentials::new("dev-1", "tok-1"),
            &config,
            Transports {
                stream: MockStream::default(),
                pubsub: MockPubSub::default(),
                request: MockRequest::default(),
            },
        )
    }

    fn stream(m: &mut TestManager) -> &mut MockStream {
        &mut m.transports.stream
    }

    fn pubsub(m: &mut TestManager) -> &mut MockPubSub {
        &mut m.transports.pubsub
    }

    fn authenticate(m: &mut TestManager, now: Instant) {
        stream(m).push(StreamEvent::Opened);
        stream(m).push_text(AUTH_OK);
        m.tick(now);
        assert!(m.is_authenticated());
    }

    fn is_auth(frame: &serde_json::Value) -> bool {
        frame["type"] == "auth"
    }

    fn sensor_data(frame: &serde_json::Value) -> serde_json::Value {
        assert_eq!(frame["type"], "device_data");
        frame["data"]["sensorData"].clone()
    }

    // -- Handshake --

    #[test]
    fn opened_sends_exactly_one_auth_before_telemetry() {
        let mut m = manager();
        let now = Instant::now();
        m.send_telemetry(r#"{"n":1}"#).unwrap();
        m.send_telemetry(r#"{"n":2}"#).unwrap();

        stream(&mut m).push(StreamEvent::Opened);
        m.tick(now);

        let sent = stream(&mut m).sent_json();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            serde_json::json!({
                "type": "auth",
                "data": {"token": "tok-1", "clientType": "device", "deviceId": "dev-1"}
            })
        );
        assert_eq!(m.state(), ConnectionState::Connected);
        assert_eq!(m.queued(), 2);

        stream(&mut m).push_text(AUTH_OK);
        m.tick(now);

        let sent = stream(&mut m).sent_json();
        assert_eq!(sent.iter().filter(|f| is_auth(f)).count(), 1);
        assert!(is_auth(&sent[0]));
        assert_eq!(sensor_data(&sent[1]), serde_json::json!({"n": 1}));
        assert_eq!(sensor_data(&sent[2]), serde_json::json!({"n": 2}));
        assert_eq!(m.queued(), 0);
    }

    #[test]
    fn state_changes_are_reported() {
        let mut m = manager();
        let now = Instant::now();
        authenticate(&mut m, now);
        stream(&mut m).push(StreamEvent::Closed);
        m.tick(now);

        let changes: Vec<_> = m
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                LinkEvent::StateChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect();
        assert_eq!(
            changes,
            vec![
                ConnectionState::Connected,
                ConnectionState::Authenticated,
                ConnectionState::Disconnected,
            ]
        );
    }

    #[test]
    fn auth_rejection_is_diagnostic_only() {
        let mut m = manager();
        let now = Instant::now();
        stream(&mut m).push(StreamEvent::Opened);
        stream(&mut m).push_text(r#"{"type":"error","data":{"error":"Authentication failed"}}"#);
        m.tick(now);

        assert_eq!(m.state(), ConnectionState::Connected);
        assert!(m.drain_events().contains(&LinkEvent::AuthRejected {
            error: "Authentication failed".into()
        }));

        // A later success still authenticates.
        stream(&mut m).push_text(AUTH_OK);
        m.tick(now);
        assert!(m.is_authenticated());
    }

    #[test]
    fn malformed_stream_message_is_ignored() {
        let mut m = manager();
        let now = Instant::now();
        authenticate(&mut m, now);
        stream(&mut m).push_text(r#"{"data":{"command":"toggle"}}"#);
        stream(&mut m).push_text("not json");
        m.tick(now);

        assert!(m.is_authenticated());
        assert_eq!(m.try_take_command(), None);
        let malformed = m
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, LinkEvent::MalformedMessage { transport: TransportKind::Stream, .. }))
            .count();
        assert_eq!(malformed, 2);
    }

    #[test]
    fn unknown_stream_message_is_reported() {
        let mut m = manager();
        let now = Instant::now();
        stream(&mut m).push(StreamEvent::Opened);
        stream(&mut m).push_text(r#"{"type":"device_registered","data":{}}"#);
        m.tick(now);
        assert!(m.drain_events().contains(&LinkEvent::UnknownMessage {
            transport: TransportKind::Stream,
            msg_type: "device_registered".into()
        }));
    }

    #[test]
    fn close_disconnects_and_reopen_reauthenticates() {
        let mut m = manager();
        let now = Instant::now();
        authenticate(&mut m, now);

        stream(&mut m).push(StreamEvent::Error("connection reset".into()));
        m.tick(now);
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(!m.handles().stream);

        assert_eq!(
            m.send_telemetry("1").unwrap(),
            TelemetryOutcome::Queued
        );

        stream(&mut m).push(StreamEvent::Opened);
        m.tick(now);
        let sent = stream(&mut m).sent_json();
        assert_eq!(sent.iter().filter(|f| is_auth(f)).count(), 2);
        assert_eq!(m.queued(), 1);
    }

    #[test]
    fn unobserved_reconnect_keeps_telemetry_behind_new_auth() {
        let mut m = manager();
        let now = Instant::now();
        authenticate(&mut m, now);
        let before = stream(&mut m).sent.len();

        // The socket dropped and came back between ticks; the adapter
        // refuses frames until the new session has been polled.
        stream(&mut m).push(StreamEvent::Closed);
        stream(&mut m).push(StreamEvent::Opened);
        stream(&mut m).fail_with = Some(TransportError::NotConnected);
        assert!(m.is_authenticated());
        assert_eq!(
            m.send_telemetry(r#"{"n":1}"#).unwrap(),
            TelemetryOutcome::Queued
        );

        stream(&mut m).fail_with = None;
        m.tick(now);
        assert_eq!(m.state(), ConnectionState::Connected);
        assert_eq!(m.queued(), 1);

        stream(&mut m).push_text(AUTH_OK);
        m.tick(now);
        let sent = stream(&mut m).sent_json();
        let session: Vec<_> = sent[before..].to_vec();
        assert_eq!(session.len(), 2);
        assert!(is_auth(&session[0]));
        assert_eq!(sensor_data(&session[1]), serde_json::json!({"n":1}));
    }

    // -- Queue --

    #[test]
    fn overflow_then_drain_sends_last_eight_in_order() {
        let mut m = manager();
        let now = Instant::now();
        for i in 1..=10 {
            let outcome = m.send_telemetry(&format!("\"m{i}\"")).unwrap();
            assert_eq!(outcome, TelemetryOutcome::Queued);
        }
        assert_eq!(m.queued(), 8);
        let evictions = m
            .drain_events()
            .into_iter()
            .filter(|e| *e == LinkEvent::QueueEvicted)
            .count();
        assert_eq!(evictions, 2);

        authenticate(&mut m, now);

        let payloads: Vec<_> = stream(&mut m)
            .sent_json()
            .iter()
            .filter(|f| !is_auth(f))
            .map(sensor_data)
            .collect();
        let expected: Vec<_> = (3..=10).map(|i| serde_json::json!(format!("m{i}"))).collect();
        assert_eq!(payloads, expected);
        assert_eq!(m.queued(), 0);
    }

    #[test]
    fn drain_is_noop_until_authenticated() {
        let mut m = manager();
        let now = Instant::now();
        m.send_telemetry("1").unwrap();
        m.send_telemetry("2").unwrap();

        assert_eq!(m.drain_queue(), 0);
        assert_eq!(m.queued(), 2);

        stream(&mut m).push(StreamEvent::Opened);
        m.tick(now);
        assert_eq!(m.drain_queue(), 0);
        assert_eq!(m.queued(), 2);
        assert!(stream(&mut m).sent_json().iter().all(is_auth));
    }

    #[test]
    fn drain_on_empty_queue_is_noop() {
        let mut m = manager();
        let now = Instant::now();
        authenticate(&mut m, now);
        let before = stream(&mut m).sent.len();
        assert_eq!(m.drain_queue(), 0);
        assert_eq!(stream(&mut m).sent.len(), before);
    }

    #[test]
    fn drain_resumes_after_not_ready() {
        let mut m = manager();
        let now = Instant::now();
        for i in 1..=5 {
            m.send_telemetry(&i.to_string()).unwrap();
        }

        stream(&mut m).push(StreamEvent::Opened);
        m.tick(now);
        // Auth frame already sent; accept two telemetry frames.
        stream(&mut m).accept_limit = Some(2);
        stream(&mut m).push_text(AUTH_OK);
        m.tick(now);
        assert_eq!(m.queued(), 3);

        stream(&mut m).accept_limit = None;
        m.tick(now);
        assert_eq!(m.queued(), 0);

        let payloads: Vec<_> = stream(&mut m)
            .sent_json()
            .iter()
            .filter(|f| !is_auth(f))
            .map(sensor_data)
            .collect();
        let expected: Vec<_> = (1..=5).map(|i| serde_json::json!(i)).collect();
        assert_eq!(payloads, expected);
    }

    #[test]
    fn queue_capacity_comes_from_config() {
        let mut m = manager_with(LinkConfig {
            queue_capacity: 2,
            ..LinkConfig::default()
        });
        for i in 0..5 {
            m.send_telemetry(&i.to_string()).unwrap();
        }
        assert_eq!(m.queued(), 2);
    }

    // -- Telemetry --

    #[test]
    fn telemetry_sent_directly_when_authenticated() {
        let mut m = manager();
        let now = Instant::now();
        authenticate(&mut m, now);

        let outcome = m
            .send_telemetry(r#"[{"type":"light","value":300,"unit":"lux"}]"#)
            .unwrap();
        assert_eq!(outcome, TelemetryOutcome::Sent);

        let last = stream(&mut m).sent.last().cloned().unwrap();
        assert_eq!(
            last,
            r#"{"type":"device_data","data":{"sensorData":[{"type":"light","value":300,"unit":"lux"}]}}"#
        );
    }

    #[test]
    fn telemetry_queued_while_connected_but_not_authenticated() {
        let mut m = manager();
        let now = Instant::now();
        stream(&mut m).push(StreamEvent::Opened);
        m.tick(now);

        assert_eq!(m.send_telemetry("42").unwrap(), TelemetryOutcome::Queued);
        assert_eq!(m.queued(), 1);
    }

    #[test]
    fn telemetry_value_is_serialised() {
        #[derive(Serialize)]
        struct Reading {
            temp: f64,
        }

        let mut m = manager();
        let now = Instant::now();
        authenticate(&mut m, now);
        m.send_telemetry_value(&Reading { temp: 21.5 }).unwrap();

        let sent = stream(&mut m).sent_json();
        assert_eq!(
            sensor_data(sent.last().unwrap()),
            serde_json::json!({"temp": 21.5})
        );
    }

    #[test]
    fn invalid_telemetry_json_is_rejected() {
        let mut m = manager();
        let err = m.send_telemetry("{not json").unwrap_err();
        assert!(matches!(err, LinkError::Encode(_)));
        assert_eq!(m.queued(), 0);
    }

    #[test]
    fn failed_direct_send_falls_back_to_queue() {
        let mut m = manager();
        let now = Instant::now();
        authenticate(&mut m, now);
        stream(&mut m).accept_limit = Some(0);

        assert_eq!(m.send_telemetry("1").unwrap(), TelemetryOutcome::Queued);
        assert_eq!(m.queued(), 1);

        stream(&mut m).accept_limit = None;
        m.tick(now);
        assert_eq!(m.queued(), 0);
    }

    #[test]
    fn telemetry_after_partial_drain_keeps_fifo() {
        let mut m = manager();
        let now = Instant::now();
        m.send_telemetry("1").unwrap();
        m.send_telemetry("2").unwrap();
        stream(&mut m).push(StreamEvent::Opened);
        m.tick(now);
        stream(&mut m).accept_limit = Some(1);
        stream(&mut m).push_text(AUTH_OK);
        m.tick(now);
        assert_eq!(m.queued(), 1);

        stream(&mut m).accept_limit = None;
        assert_eq!(m.send_telemetry("3").unwrap(), TelemetryOutcome::Sent);

        let payloads: Vec<_> = stream(&mut m)
            .sent_json()
            .iter()
            .filter(|f| !is_auth(f))
            .map(sensor_data)
            .collect();
        assert_eq!(
            payloads,
            vec![serde_json::json!(1), serde_json::json!(2), serde_json::json!(3)]
        );
    }

    // -- Commands --

    #[test]
    fn stream_command_is_taken_once() {
        let mut m = manager();
        let now = Instant::now();
        stream(&mut m).push(StreamEvent::Opened);
        stream(&mut m).push_text(r#"{"type":"command","data":{"command":"toggle"}}"#);
        m.tick(now);

        assert!(m.has_command());
        assert_eq!(m.try_take_command().as_deref(), Some("toggle"));
        assert_eq!(m.try_take_command(), None);

        stream(&mut m).push_text(r#"{"type":"command","data":{"command":"toggle"}}"#);
        m.tick(now);
        assert_eq!(m.try_take_command().as_deref(), Some("toggle"));
    }

    #[test]
    fn newer_command_overwrites_unread() {
        let mut m = manager();
        let now = Instant::now();
        stream(&mut m).push(StreamEvent::Opened);
        stream(&mut m).push_text(r#"{"type":"command","data":{"command":"on"}}"#);
        stream(&mut m).push_text(r#"{"type":"command","data":{"command":"off"}}"#);
        m.tick(now);

        assert_eq!(m.try_take_command().as_deref(), Some("off"));
        assert_eq!(m.try_take_command(), None);
        assert!(m.drain_events().contains(&LinkEvent::CommandReceived {
            transport: TransportKind::Stream,
            command: "off".into(),
            replaced_unread: true,
        }));
    }

    #[test]
    fn pubsub_command_reaches_inbox() {
        let mut m = manager();
        let now = Instant::now();
        pubsub(&mut m).push_message(
            "zilink/devices/dev-1/commands",
            r#"{"type":"command","data":{"command":"reboot"}}"#,
        );
        pubsub(&mut m).push_message(
            "zilink/devices/other/commands",
            r#"{"type":"command","data":{"command":"ignored"}}"#,
        );
        m.tick(now);

        assert_eq!(m.try_take_command().as_deref(), Some("reboot"));
        assert_eq!(m.try_take_command(), None);
    }

    #[test]
    fn pubsub_only_reads_own_commands_channel() {
        let mut m = manager();
        let now = Instant::now();
        let command = r#"{"type":"command","data":{"command":"x"}}"#;
        for topic in [
            "zilink/devices/dev-1/status",
            "zilink/devices/dev-1/components",
            "zilink/devices/dev-1/commands/extra",
            "other/devices/dev-1/commands",
        ] {
            pubsub(&mut m).push_message(topic, command);
        }
        m.tick(now);

        assert!(!m.has_command());
        assert!(!m.drain_events().iter().any(|e| matches!(
            e,
            LinkEvent::CommandReceived { .. } | LinkEvent::MalformedMessage { .. }
        )));
    }

    #[test]
    fn malformed_pubsub_message_is_ignored() {
        let mut m = manager();
        let now = Instant::now();
        pubsub(&mut m).push_message("zilink/devices/dev-1/commands", r#"{"command":"x"}"#);
        m.tick(now);

        assert_eq!(m.try_take_command(), None);
        assert!(m.drain_events().iter().any(|e| matches!(
            e,
            LinkEvent::MalformedMessage {
                transport: TransportKind::PubSub,
                ..
            }
        )));
    }

    // -- Pub/sub retry --

    #[test]
    fn pubsub_retries_on_fixed_interval() {
        let mut m = manager();
        let t0 = Instant::now();

        m.tick(t0);
        assert_eq!(pubsub(&mut m).connect_attempts, 1);

        m.tick(t0 + Duration::from_millis(10));
        m.tick(t0 + Duration::from_millis(4999));
        assert_eq!(pubsub(&mut m).connect_attempts, 1);

        m.tick(t0 + Duration::from_millis(5000));
        assert_eq!(pubsub(&mut m).connect_attempts, 2);

        let failures = m
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, LinkEvent::PubSubConnectFailed { .. }))
            .count();
        assert_eq!(failures, 2);
    }

    #[test]
    fn pubsub_retry_does_not_stall_stream() {
        let mut m = manager();
        let t0 = Instant::now();
        stream(&mut m).push(StreamEvent::Opened);
        stream(&mut m).push_text(AUTH_OK);
        stream(&mut m).push_text(r#"{"type":"command","data":{"command":"go"}}"#);
        m.tick(t0);

        assert!(m.is_authenticated());
        assert_eq!(m.try_take_command().as_deref(), Some("go"));
        assert_eq!(pubsub(&mut m).connect_attempts, 1);
        assert!(!m.handles().pubsub);
    }

    #[test]
    fn pubsub_connect_success_updates_handle() {
        let mut m = manager();
        let t0 = Instant::now();
        pubsub(&mut m).accept_connect = true;

        m.tick(t0);
        assert!(m.handles().pubsub);
        assert!(m.drain_events().contains(&LinkEvent::PubSubConnected));

        m.tick(t0 + Duration::from_secs(10));
        assert_eq!(pubsub(&mut m).connect_attempts, 1);

        pubsub(&mut m).connected = false;
        pubsub(&mut m).accept_connect = false;
        m.tick(t0 + Duration::from_secs(11));
        assert!(!m.handles().pubsub);
        assert_eq!(pubsub(&mut m).connect_attempts, 2);
        assert!(m.drain_events().contains(&LinkEvent::PubSubDisconnected));
    }

    #[test]
    fn disabled_pubsub_is_never_attempted() {
        let mut m = manager();
        pubsub(&mut m).enabled = false;
        m.tick(Instant::now());
        assert_eq!(pubsub(&mut m).connect_attempts, 0);
        assert!(m.drain_events().is_empty());
    }

    // -- Component updates --

    #[test]
    fn component_update_uses_open_stream_before_auth() {
        let mut m = manager();
        let now = Instant::now();
        stream(&mut m).push(StreamEvent::Opened);
        m.tick(now);

        let route = m
            .send_component_update(&ComponentUpdate::toggle("led", true))
            .unwrap();
        assert_eq!(route, Route::Stream);
        let last = stream(&mut m).sent_json().pop().unwrap();
        assert_eq!(
            last,
            serde_json::json!({"type": "toggle", "id": "led", "value": true})
        );
    }

    #[test]
    fn component_update_waits_for_tick_to_see_stream() {
        let mut m = manager();
        // Socket is up but the tick has not observed it yet.
        stream(&mut m).push(StreamEvent::Opened);

        let route = m.send_component(r#"{"type":"slider","id":"s","value":1}"#).unwrap();
        assert_eq!(route, Route::Request { status: 200 });
        assert!(stream(&mut m).sent.is_empty());
        assert_eq!(
            m.transports().request.posts[0].0,
            "/devices/dev-1/components"
        );
    }

    #[test]
    fn component_update_falls_back_to_pubsub() {
        let mut m = manager();
        pubsub(&mut m).accept_connect = true;
        m.tick(Instant::now());

        let route = m.send_component("{}").unwrap();
        assert_eq!(route, Route::PubSub);
        assert_eq!(
            m.transports().pubsub.published[0].0,
            "zilink/devices/dev-1/components"
        );
    }

    #[test]
    fn component_failure_is_reported_without_retry() {
        let mut m = manager();
        let now = Instant::now();
        pubsub(&mut m).accept_connect = true;
        stream(&mut m).push(StreamEvent::Opened);
        m.tick(now);
        stream(&mut m).fail_with = Some(TransportError::NotReady);

        let err = m.send_component("{}").unwrap_err();
        assert!(matches!(
            err,
            LinkError::Transport(TransportError::NotReady)
        ));
        assert!(m.transports().pubsub.published.is_empty());
        assert!(m.transports().request.posts.is_empty());
    }

    // -- Direct sends --

    #[test]
    fn publish_requires_pubsub() {
        let mut m = manager();
        let err = m.publish_data("{}").unwrap_err();
        assert!(matches!(
            err,
            LinkError::Transport(TransportError::NotConnected)
        ));

        pubsub(&mut m).accept_connect = true;
        m.tick(Instant::now());
        m.publish_data("{\"t\":1}").unwrap();
        m.publish_status("{\"online\":true}").unwrap();

        let topics: Vec<_> = m
            .transports()
            .pubsub
            .published
            .iter()
            .map(|(t, _)| t.as_str())
            .collect();
        assert_eq!(
            topics,
            vec!["zilink/devices/dev-1/data", "zilink/devices/dev-1/status"]
        );
    }

    #[test]
    fn post_returns_status() {
        let mut m = manager();
        m.transports.request.status = 404;
        assert_eq!(m.post_status("{}").unwrap(), 404);
        assert_eq!(m.post_data("{}").unwrap(), 404);

        let paths: Vec<_> = m
            .transports()
            .request
            .posts
            .iter()
            .map(|(p, _)| p.as_str())
            .collect();
        assert_eq!(paths, vec!["/devices/dev-1/status", "/devices/dev-1/data"]);
    }

    #[test]
    fn post_fails_fast_without_network() {
        let mut m = manager().with_network(MockNetwork::down());
        let err = m.post_data("{}").unwrap_err();
        assert!(matches!(
            err,
            LinkError::Transport(TransportError::NotConnected)
        ));
        assert!(m.transports().request.posts.is_empty());
    }

    #[test]
    fn post_transport_failure_is_error() {
        let mut m = manager();
        m.transports.request.fail = true;
        assert!(matches!(
            m.post_status("{}").unwrap_err(),
            LinkError::Transport(TransportError::Request(_))
        ));
    }

    // -- Lifecycle --

    #[test]
    fn reset_restores_initial_state() {
        let mut m = manager();
        let now = Instant::now();
        authenticate(&mut m, now);
        stream(&mut m).push_text(r#"{"type":"command","data":{"command":"x"}}"#);
        m.tick(now);
        stream(&mut m).fail_with = Some(TransportError::NotReady);
        m.send_telemetry("1").unwrap();

        m.reset();

        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.queued(), 0);
        assert!(!m.has_command());
        assert_eq!(m.handles(), TransportHandles::default());
        assert!(m.drain_events().is_empty());
        assert_eq!(m.credentials().device_id(), "dev-1");
    }

    #[test]
    fn events_are_bounded() {
        let mut m = manager();
        for _ in 0..(MAX_PENDING_EVENTS + 10) {
            m.send_telemetry("0").unwrap();
        }
        let events = m.drain_events();
        assert_eq!(events.len(), MAX_PENDING_EVENTS);
        assert!(m.drain_events().is_empty());
    }
}
