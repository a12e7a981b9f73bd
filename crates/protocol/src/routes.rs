//! Pub/sub topic names and request/response paths.
//!
//! Topics follow `zilink/devices/{id}/{channel}`; HTTP endpoints follow
//! `/devices/{id}/{endpoint}` relative to the server base URL.

/// Root of every device topic.
pub const TOPIC_PREFIX: &str = "zilink/devices";

/// Per-device pub/sub channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Data,
    Status,
    /// The only channel the device subscribes to.
    Commands,
    Components,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Data => "data",
            Channel::Status => "status",
            Channel::Commands => "commands",
            Channel::Components => "components",
        }
    }

    fn from_segment(s: &str) -> Option<Self> {
        match s {
            "data" => Some(Channel::Data),
            "status" => Some(Channel::Status),
            "commands" => Some(Channel::Commands),
            "components" => Some(Channel::Components),
            _ => None,
        }
    }

    /// Full topic for this channel of the given device.
    pub fn topic(self, device_id: &str) -> String {
        format!("{TOPIC_PREFIX}/{device_id}/{}", self.as_str())
    }
}

/// Splits a topic into `(device_id, channel)`.
///
/// Returns `None` for topics outside the device namespace.
pub fn parse_topic(topic: &str) -> Option<(&str, Channel)> {
    let rest = topic.strip_prefix(TOPIC_PREFIX)?.strip_prefix('/')?;
    let (device_id, channel) = rest.split_once('/')?;
    if device_id.is_empty() {
        return None;
    }
    Some((device_id, Channel::from_segment(channel)?))
}

/// Request/response endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Status,
    Data,
    Components,
}

impl Endpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Status => "status",
            Endpoint::Data => "data",
            Endpoint::Components => "components",
        }
    }

    /// Path relative to the base URL, e.g. `/devices/abc/status`.
    pub fn path(self, device_id: &str) -> String {
        format!("/devices/{device_id}/{}", self.as_str())
    }
}

/// `Authorization` header value for a device token.
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
