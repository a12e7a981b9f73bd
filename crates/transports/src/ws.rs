//! WebSocket stream transport.
//!
//! A supervisor task owns the socket: it connects, runs the read, write
//! and ping pumps until the session ends, reports the close and retries
//! after the reconnect interval. The synchronous side only touches
//! channels and an atomic session number.
//!
//! Sessions are numbered from 1 in connect order, one `Opened` each. The
//! consumer may only send on the session whose `Opened` it has polled, so
//! a socket that reconnected behind the service loop's back refuses
//! frames until the loop has seen the new session and sent its auth
//! request. Frames carry the session they were sent for and the write
//! pump drops any addressed to an earlier one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use zilink_device_link::{LinkConfig, StreamEvent, StreamTransport, TransportError};
use zilink_protocol::constants::{
    DEFAULT_WS_PATH, STREAM_RECONNECT_INTERVAL, TLS_PORT, WS_PING_PERIOD,
};

use crate::pumps::ping::ping_pump;
use crate::pumps::read::{ReadExit, read_pump};
use crate::pumps::write::write_pump;

/// Frames the service loop may queue before `send_text` reports `NotReady`.
const OUTBOUND_CAPACITY: usize = 32;

/// Where and how often to connect.
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub reconnect_interval: Duration,
}

impl WsConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            path: DEFAULT_WS_PATH.to_string(),
            reconnect_interval: STREAM_RECONNECT_INTERVAL,
        }
    }

    /// Takes the reconnect interval from the manager's tunables.
    pub fn with_link_config(mut self, link: &LinkConfig) -> Self {
        self.reconnect_interval = link.stream_reconnect_interval;
        self
    }

    /// `wss://` on the TLS port, `ws://` otherwise.
    pub fn url(&self) -> String {
        let scheme = if self.port == TLS_PORT { "wss" } else { "ws" };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{scheme}://{}:{}{path}", self.host, self.port)
    }
}

/// Outbound text tagged with the session it was sent for.
pub(crate) type OutboundFrame = (u64, String);

/// No session is live.
const NO_SESSION: u64 = 0;

/// Stream transport backed by a reconnecting WebSocket client.
pub struct WsStream {
    outbound: mpsc::Sender<OutboundFrame>,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    /// Session the supervisor is currently serving.
    live_session: Arc<AtomicU64>,
    /// Number of `Opened` events polled so far.
    observed_session: u64,
    /// Whether the observed session has not yet been reported closed.
    session_open: bool,
    cancel: CancellationToken,
    supervisor: JoinHandle<()>,
}

impl WsStream {
    /// Starts the supervisor on `handle`. Connecting begins immediately.
    pub fn spawn(handle: &Handle, config: WsConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let live_session = Arc::new(AtomicU64::new(NO_SESSION));
        let cancel = CancellationToken::new();

        let supervisor = handle.spawn(supervise(
            config.url(),
            config.reconnect_interval,
            outbound_rx,
            events_tx,
            live_session.clone(),
            cancel.clone(),
        ));

        Self {
            outbound: outbound_tx,
            events: events_rx,
            live_session,
            observed_session: NO_SESSION,
            session_open: false,
            cancel,
            supervisor,
        }
    }
}

impl StreamTransport for WsStream {
    fn poll_event(&mut self) -> Option<StreamEvent> {
        let event = self.events.try_recv().ok()?;
        match event {
            StreamEvent::Opened => {
                self.observed_session += 1;
                self.session_open = true;
            }
            StreamEvent::Closed | StreamEvent::Error(_) => self.session_open = false,
            StreamEvent::Text(_) => {}
        }
        Some(event)
    }

    fn is_connected(&self) -> bool {
        self.session_open && self.live_session.load(Ordering::Acquire) == self.observed_session
    }

    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let frame = (self.observed_session, text.to_owned());
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::NotReady,
            mpsc::error::TrySendError::Closed(_) => TransportError::NotConnected,
        })
    }
}

impl Drop for WsStream {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.supervisor.abort();
    }
}

/// Connect/serve/reconnect loop. Exits on cancel or when the service side
/// has gone away.
async fn supervise(
    url: String,
    reconnect_interval: Duration,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    events: mpsc::UnboundedSender<StreamEvent>,
    live_session: Arc<AtomicU64>,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    let mut session = NO_SESSION;

    loop {
        attempt += 1;
        debug!(%url, attempt, "connecting stream");

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            r = tokio_tungstenite::connect_async(url.as_str()) => r,
        };

        let event = match result {
            Ok((ws, _)) => {
                attempt = 0;
                session += 1;
                live_session.store(session, Ordering::Release);
                info!(%url, session, "stream connected");
                if events.send(StreamEvent::Opened).is_err() {
                    break;
                }

                let outcome = tokio::select! {
                    _ = cancel.cancelled() => break,
                    r = run_session(ws, session, &mut outbound, &events) => r,
                };
                live_session.store(NO_SESSION, Ordering::Release);

                match outcome {
                    Ok(()) => {
                        info!(%url, "stream closed");
                        StreamEvent::Closed
                    }
                    Err(e) => {
                        warn!(%url, error = %e, "stream lost");
                        StreamEvent::Error(e)
                    }
                }
            }
            Err(e) => {
                warn!(%url, attempt, error = %e, "stream connect failed");
                StreamEvent::Error(e.to_string())
            }
        };

        if events.send(event).is_err() {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(reconnect_interval) => {}
        }
    }

    live_session.store(NO_SESSION, Ordering::Release);
}

/// Serves one connection until any pump exits.
async fn run_session(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    session: u64,
    outbound: &mut mpsc::Receiver<OutboundFrame>,
    events: &mpsc::UnboundedSender<StreamEvent>,
) -> Result<(), String> {
    let (write, read) = ws.split();
    let (control_tx, control_rx) = mpsc::channel(16);

    tokio::select! {
        exit = read_pump(read, events.clone(), control_tx.clone()) => match exit {
            ReadExit::Closed => Ok(()),
            ReadExit::Failed(e) => Err(e),
        },
        r = write_pump(write, session, outbound, control_rx) => r.map_err(|e| e.to_string()),
        () = ping_pump(control_tx, WS_PING_PERIOD) => Ok(()),
    }
}
