use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;

use crate::constants::{MessageType, UNKNOWN_ERROR};
use crate::error::ProtocolError;
use crate::messages::{AuthRequest, DeviceData};

/// Envelope for all stream-transport communication.
///
/// `type` discriminates the message; the body lives under `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T = Value> {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    /// Creates an envelope with the given type and body.
    pub fn new(msg_type: MessageType, data: T) -> Self {
        Self {
            msg_type,
            data: Some(data),
        }
    }

    /// Serialises the envelope into a text frame.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Envelope<AuthRequest> {
    /// `{"type":"auth","data":{"token":..,"clientType":"device","deviceId":..}}`
    pub fn auth(device_id: &str, token: &str) -> Self {
        Envelope::new(MessageType::Auth, AuthRequest::device(device_id, token))
    }
}

impl Envelope<DeviceData> {
    /// `{"type":"device_data","data":{"sensorData":<payload>}}`
    pub fn device_data(sensor_data: &RawValue) -> Self {
        Envelope::new(
            MessageType::DeviceData,
            DeviceData {
                sensor_data: sensor_data.to_owned(),
            },
        )
    }
}

/// A decoded inbound message the device acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Server accepted the auth request.
    AuthSuccess,
    /// Server reported an error; `error` defaults to "unknown".
    Error { error: String },
    /// Operator command for the hosting application.
    Command { command: String },
    /// Keepalive reply.
    Pong,
    /// Well-formed message of a type the device does not handle.
    Other { msg_type: MessageType },
}

impl Inbound {
    /// Discriminator this message arrived with.
    pub fn msg_type(&self) -> MessageType {
        match self {
            Inbound::AuthSuccess => MessageType::AuthSuccess,
            Inbound::Error { .. } => MessageType::Error,
            Inbound::Command { .. } => MessageType::Command,
            Inbound::Pong => MessageType::Pong,
            Inbound::Other { msg_type } => msg_type.clone(),
        }
    }

    /// Decodes a text frame.
    ///
    /// A frame without a string `type` is rejected with
    /// [`ProtocolError::MissingType`] rather than treated as any message.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Self::parse_slice(text.as_bytes())
    }

    /// Decodes a binary payload (pub/sub messages arrive as bytes).
    pub fn parse_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let obj = value.as_object().ok_or(ProtocolError::NotAnObject)?;
        let msg_type = obj
            .get("type")
            .and_then(Value::as_str)
            .map(MessageType::from)
            .ok_or(ProtocolError::MissingType)?;
        let data = obj.get("data");

        let inbound = match msg_type {
            MessageType::AuthSuccess => Inbound::AuthSuccess,
            MessageType::Error => Inbound::Error {
                error: data_str(data, "error")
                    .unwrap_or(UNKNOWN_ERROR)
                    .to_string(),
            },
            MessageType::Command => {
                let command = data_str(data, "command").ok_or(ProtocolError::MissingField {
                    msg_type: "command",
                    field: "command",
                })?;
                Inbound::Command {
                    command: command.to_string(),
                }
            }
            MessageType::Pong => Inbound::Pong,
            other => Inbound::Other { msg_type: other },
        };
        Ok(inbound)
    }
}

fn data_str<'a>(data: Option<&'a Value>, field: &str) -> Option<&'a str> {
    data?.get(field)?.as_str()
}
