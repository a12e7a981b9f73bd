//! Device-side connectivity manager.
//!
//! Drives a persistent stream transport through its auth handshake, holds
//! telemetry produced before the handshake completes, keeps the latest
//! operator command for the host, and falls back across pub/sub and
//! request/response transports for component updates.
//!
//! Everything here is synchronous: the host calls
//! [`ConnectionManager::tick`] from its control loop and all transport
//! events are processed inside that call.

pub mod auth;
pub mod error;
pub mod inbox;
pub mod manager;
pub mod queue;
pub(crate) mod reconnection;
pub mod router;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use auth::{AuthHandshake, HandshakeAction};
pub use error::{LinkError, TransportError};
pub use inbox::CommandInbox;
pub use manager::ConnectionManager;
pub use queue::OutboundQueue;
pub use router::{Route, TransportRouter};
pub use transport::{
    AlwaysAssociated, Disabled, NetworkLink, PubSubMessage, PubSubTransport, RequestTransport,
    StreamEvent, StreamTransport, Transports,
};
pub use types::{
    ConnectionState, Credentials, LinkConfig, LinkEvent, TelemetryOutcome, TransportHandles,
    TransportKind,
};
