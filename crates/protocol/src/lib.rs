pub mod constants;
pub mod envelope;
pub mod error;
pub mod messages;
pub mod routes;

// Re-export primary types for convenience.
pub use constants::MessageType;
pub use envelope::{Envelope, Inbound};
pub use error::ProtocolError;
pub use messages::{AuthRequest, CommandBody, ComponentKind, ComponentUpdate, DeviceData, ErrorBody};
pub use routes::{Channel, Endpoint};
