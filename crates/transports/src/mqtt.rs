//! MQTT pub/sub transport.
//!
//! `connect` only spawns an event loop task; the broker handshake happens
//! there. The task subscribes to the device's commands topic on `ConnAck`
//! and exits on the first connection error, leaving the next attempt to
//! the connection manager's retry schedule.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use zilink_device_link::{Credentials, PubSubMessage, PubSubTransport, TransportError};
use zilink_protocol::routes::Channel;

/// Default MQTT port.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Requests the client may queue before `publish` reports an error.
const REQUEST_CAPACITY: usize = 16;

/// Inbound messages held until the service loop polls them.
const INBOUND_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub keep_alive: Duration,
}

impl MqttConfig {
    pub fn new(broker: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            port: DEFAULT_MQTT_PORT,
            keep_alive: Duration::from_secs(15),
        }
    }
}

/// Client options: device id as client id, auth token as username.
fn options(config: &MqttConfig, credentials: &Credentials) -> MqttOptions {
    let mut options = MqttOptions::new(credentials.device_id(), &config.broker, config.port);
    options.set_keep_alive(config.keep_alive);
    options.set_credentials(credentials.auth_token(), "");
    options
}

/// Pub/sub transport backed by `rumqttc`.
pub struct MqttPubSub {
    handle: Handle,
    options: MqttOptions,
    commands_topic: String,
    client: Option<AsyncClient>,
    task: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
    inbound_tx: mpsc::Sender<PubSubMessage>,
    inbound_rx: mpsc::Receiver<PubSubMessage>,
    cancel: CancellationToken,
}

impl MqttPubSub {
    pub fn new(handle: Handle, config: &MqttConfig, credentials: &Credentials) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        Self {
            handle,
            options: options(config, credentials),
            commands_topic: Channel::Commands.topic(credentials.device_id()),
            client: None,
            task: None,
            connected: Arc::new(AtomicBool::new(false)),
            inbound_tx,
            inbound_rx,
            cancel: CancellationToken::new(),
        }
    }

    fn attempt_in_flight(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl PubSubTransport for MqttPubSub {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        if self.attempt_in_flight() {
            debug!("broker connection still in progress");
            return Ok(());
        }

        let (broker, port) = self.options.broker_address();
        debug!(%broker, port, "connecting to broker");

        let (client, eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);
        self.task = Some(self.handle.spawn(run_event_loop(
            eventloop,
            client.clone(),
            self.commands_topic.clone(),
            self.connected.clone(),
            self.inbound_tx.clone(),
            self.cancel.child_token(),
        )));
        self.client = Some(client);
        Ok(())
    }

    fn poll_message(&mut self) -> Option<PubSubMessage> {
        self.inbound_rx.try_recv().ok()
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let client = self.client.as_ref().ok_or(TransportError::NotConnected)?;
        client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

impl Drop for MqttPubSub {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    commands_topic: String,
    connected: Arc<AtomicBool>,
    inbound: mpsc::Sender<PubSubMessage>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                if let Err(e) = client.try_subscribe(commands_topic.as_str(), QoS::AtMostOnce) {
                    warn!(topic = %commands_topic, error = %e, "subscribe failed");
                    break;
                }
                connected.store(true, Ordering::Release);
                info!(topic = %commands_topic, "broker connected");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                trace!(topic = %publish.topic, bytes = publish.payload.len(), "message received");
                let msg = PubSubMessage {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                };
                if let Err(e) = inbound.try_send(msg) {
                    warn!(error = %e, "inbound queue full, dropping message");
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                info!("broker sent disconnect");
                break;
            }
            Ok(other) => trace!(?other, "broker event"),
            Err(e) => {
                warn!(error = %e, "broker connection lost");
                break;
            }
        }
    }

    connected.store(false, Ordering::Release);
}
