//! Service loop: wires the adapters into a connection manager and drives it.

use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use zilink_device_link::{
    ConnectionManager, Credentials, Disabled, LinkConfig, LinkEvent, PubSubTransport,
    RequestTransport, StreamTransport, TelemetryOutcome, Transports,
};
use zilink_transports::{HttpRequester, MqttPubSub, WsStream};

use crate::config::Config;
use crate::device::SimulatedDevice;

/// Pause between service passes.
const LOOP_PERIOD: Duration = Duration::from_millis(20);

const ONLINE_STATUS: &str = r#"{"online":true}"#;

type AgentTransports =
    Transports<Box<dyn StreamTransport>, Box<dyn PubSubTransport>, Box<dyn RequestTransport>>;

/// Runs the agent on the calling thread until `cancel` fires.
pub fn run(config: &Config, handle: Handle, cancel: &CancellationToken) -> anyhow::Result<()> {
    let credentials = config.credentials();
    let link = config.link_config();
    let transports = build_transports(config, &link, &handle, &credentials)?;
    let mut manager = ConnectionManager::new(credentials, &link, transports);
    let mut device = SimulatedDevice::new();

    let telemetry_interval = config.telemetry_interval();
    let mut next_telemetry = Instant::now();

    info!(
        device = %config.device_id,
        url = %config.stream.ws_config().url(),
        pubsub = config.mqtt.is_some(),
        http = config.http.is_some(),
        "service loop started"
    );

    while !cancel.is_cancelled() {
        let now = Instant::now();
        manager.tick(now);

        for event in manager.drain_events() {
            if event == LinkEvent::PubSubConnected {
                if let Err(e) = manager.publish_status(ONLINE_STATUS) {
                    warn!(error = %e, "failed to publish online status");
                }
            }
            debug!(?event, "link event");
        }

        if let Some(command) = manager.try_take_command() {
            match device.apply_command(&command) {
                Some(update) => match manager.send_component_update(&update) {
                    Ok(route) => info!(%command, transport = %route.kind(), "component state reported"),
                    Err(e) => warn!(%command, error = %e, "component state not reported"),
                },
                None => info!(%command, "unhandled command"),
            }
        }

        if now >= next_telemetry {
            next_telemetry = now + telemetry_interval;
            let reading = device.next_reading();
            match manager.send_telemetry_value(&reading) {
                Ok(TelemetryOutcome::Sent) => debug!(value = reading[0].value, "telemetry sent"),
                Ok(TelemetryOutcome::Queued) => debug!(
                    value = reading[0].value,
                    queued = manager.queued(),
                    "telemetry queued"
                ),
                Err(e) => warn!(error = %e, "telemetry rejected"),
            }
        }

        std::thread::sleep(LOOP_PERIOD);
    }

    info!(queued = manager.queued(), "service loop stopped");
    Ok(())
}

/// Builds the adapter set; an absent config section disables that transport.
fn build_transports(
    config: &Config,
    link: &LinkConfig,
    handle: &Handle,
    credentials: &Credentials,
) -> anyhow::Result<AgentTransports> {
    let ws_config = config.stream.ws_config().with_link_config(link);
    let stream: Box<dyn StreamTransport> = Box::new(WsStream::spawn(handle, ws_config));

    let pubsub: Box<dyn PubSubTransport> = match &config.mqtt {
        Some(mqtt) => Box::new(MqttPubSub::new(
            handle.clone(),
            &mqtt.mqtt_config(),
            credentials,
        )),
        None => Box::new(Disabled),
    };

    let request: Box<dyn RequestTransport> = match &config.http {
        Some(http) => Box::new(HttpRequester::new(
            handle.clone(),
            &http.http_config(),
            credentials,
        )?),
        None => Box::new(Disabled),
    };

    Ok(Transports {
        stream,
        pubsub,
        request,
    })
}
