//! Payload bodies carried under the envelope's `data` field.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::constants::CLIENT_TYPE_DEVICE;

/// Body of the `auth` message sent once per stream connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub token: String,
    pub client_type: String,
    pub device_id: String,
}

impl AuthRequest {
    /// Builds a device auth request.
    pub fn device(device_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client_type: CLIENT_TYPE_DEVICE.to_string(),
            device_id: device_id.into(),
        }
    }
}

/// Body of a `device_data` telemetry message.
///
/// `sensor_data` is the caller's JSON kept verbatim, so whatever shape the
/// application produced reaches the server untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceData {
    pub sensor_data: Box<RawValue>,
}

/// Body of an inbound `error` message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of an inbound `command` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandBody {
    pub command: String,
}

/// Dashboard widget kinds a device can report state for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Button,
    Slider,
    Toggle,
    Progress,
}

/// Component/state update, e.g. `{"type":"slider","id":"fan","value":40}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentUpdate {
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    pub id: String,
    pub value: serde_json::Value,
}

impl ComponentUpdate {
    pub fn button(id: impl Into<String>, pressed: bool) -> Self {
        Self::new(ComponentKind::Button, id, pressed.into())
    }

    pub fn slider(id: impl Into<String>, value: i64) -> Self {
        Self::new(ComponentKind::Slider, id, value.into())
    }

    pub fn toggle(id: impl Into<String>, on: bool) -> Self {
        Self::new(ComponentKind::Toggle, id, on.into())
    }

    pub fn progress(id: impl Into<String>, value: i64) -> Self {
        Self::new(ComponentKind::Progress, id, value.into())
    }

    fn new(kind: ComponentKind, id: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            kind,
            id: id.into(),
            value,
        }
    }
}
