//! Public types for the device connection manager.

use std::fmt;
use std::time::Duration;

use zilink_protocol::constants::{
    DEFAULT_QUEUE_CAPACITY, PUBSUB_RETRY_INTERVAL, STREAM_RECONNECT_INTERVAL,
};

/// Authentication state of the stream transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No stream connection.
    #[default]
    Disconnected,
    /// Stream open, auth request sent, waiting for `auth_success`.
    Connected,
    /// Server accepted the auth request; telemetry may flow.
    Authenticated,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Authenticated => "authenticated",
        })
    }
}

/// Device identity and auth token, fixed at setup.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    device_id: String,
    auth_token: String,
}

impl Credentials {
    pub fn new(device_id: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            auth_token: auth_token.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }
}

// The token never reaches logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("device_id", &self.device_id)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

/// Tunables for the connection manager.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Maximum telemetry payloads held while not authenticated.
    pub queue_capacity: usize,
    /// Delay between pub/sub connect attempts.
    pub pubsub_retry_interval: Duration,
    /// Delay between stream reconnects, handed to the stream adapter.
    pub stream_reconnect_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pubsub_retry_interval: PUBSUB_RETRY_INTERVAL,
            stream_reconnect_interval: STREAM_RECONNECT_INTERVAL,
        }
    }
}

/// Transport kinds, in fallback priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Stream,
    PubSub,
    Request,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportKind::Stream => "stream",
            TransportKind::PubSub => "pubsub",
            TransportKind::Request => "request",
        })
    }
}

/// Connectivity flags as last observed by the service tick.
///
/// These are what the router reads; they change only inside
/// [`ConnectionManager::tick`](crate::ConnectionManager::tick).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportHandles {
    pub stream: bool,
    pub pubsub: bool,
}

/// Result of a telemetry send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryOutcome {
    /// Handed to the stream transport.
    Sent,
    /// Held in the outbound queue until the link is authenticated.
    Queued,
}

/// Diagnostic events surfaced to the host application.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The stream's authentication state changed.
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// The server answered with an `error` message.
    AuthRejected { error: String },
    /// The stream transport reported an error.
    StreamError { error: String },
    /// An inbound message could not be decoded and was ignored.
    MalformedMessage {
        transport: TransportKind,
        reason: String,
    },
    /// A well-formed inbound message of an unhandled type was ignored.
    UnknownMessage {
        transport: TransportKind,
        msg_type: String,
    },
    /// An operator command was stored in the inbox.
    CommandReceived {
        transport: TransportKind,
        command: String,
        /// An unread command was overwritten.
        replaced_unread: bool,
    },
    /// The outbound queue was full and dropped its oldest payload.
    QueueEvicted,
    /// The pub/sub transport came up.
    PubSubConnected,
    /// The pub/sub transport went down.
    PubSubDisconnected,
    /// A pub/sub connect attempt failed.
    PubSubConnectFailed { error: String, retry_in: Duration },
}
