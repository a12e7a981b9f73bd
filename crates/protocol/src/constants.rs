use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Value of `clientType` sent in the auth request.
pub const CLIENT_TYPE_DEVICE: &str = "device";

/// Default WebSocket path on the ZiLink server.
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Port that switches the stream transport to `wss://`.
pub const TLS_PORT: u16 = 443;

/// Interval between stream reconnect attempts.
pub const STREAM_RECONNECT_INTERVAL: Duration = Duration::from_millis(5000);

/// Interval between pub/sub reconnect attempts.
pub const PUBSUB_RETRY_INTERVAL: Duration = Duration::from_millis(5000);

/// How often the stream transport pings the server.
///
/// Keeps the socket alive behind proxies that reap idle connections.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(5);

/// Read deadline: if nothing arrives within this window the socket is dead.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(15);

/// Default capacity of the outbound telemetry queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Value substituted when an `error` message carries no `data.error`.
pub const UNKNOWN_ERROR: &str = "unknown";

/// Stream envelope type discriminator.
///
/// Unrecognised discriminators are kept verbatim in [`MessageType::Other`]
/// so they can be reported instead of rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    // Device -> server
    Auth,
    DeviceData,
    Ping,

    // Server -> device
    AuthSuccess,
    Error,
    Command,
    Pong,
    /// Registration notice; the device takes no action on it.
    DeviceRegistered,

    Other(String),
}

impl MessageType {
    /// Wire name of this message type.
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Auth => "auth",
            MessageType::DeviceData => "device_data",
            MessageType::Ping => "ping",
            MessageType::AuthSuccess => "auth_success",
            MessageType::Error => "error",
            MessageType::Command => "command",
            MessageType::Pong => "pong",
            MessageType::DeviceRegistered => "device_registered",
            MessageType::Other(s) => s,
        }
    }
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        match s {
            "auth" => MessageType::Auth,
            "device_data" => MessageType::DeviceData,
            "ping" => MessageType::Ping,
            "auth_success" => MessageType::AuthSuccess,
            "error" => MessageType::Error,
            "command" => MessageType::Command,
            "pong" => MessageType::Pong,
            "device_registered" => MessageType::DeviceRegistered,
            other => MessageType::Other(other.to_string()),
        }
    }
}

impl From<String> for MessageType {
    fn from(s: String) -> Self {
        match MessageType::from(s.as_str()) {
            MessageType::Other(_) => MessageType::Other(s),
            known => known,
        }
    }
}

impl From<MessageType> for String {
    fn from(t: MessageType) -> Self {
        match t {
            MessageType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
