//! Concrete transports for the ZiLink device connection manager.
//!
//! Each adapter owns its network I/O on a tokio runtime and exposes the
//! non-blocking trait surface from `zilink-device-link`, so the host's
//! synchronous service loop never waits on a socket.

pub mod error;
pub mod http;
pub mod mqtt;
mod pumps;
pub mod ws;

pub use error::AdapterError;
pub use http::{HttpConfig, HttpRequester};
pub use mqtt::{MqttConfig, MqttPubSub};
pub use ws::{WsConfig, WsStream};
