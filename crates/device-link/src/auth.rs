//! Authentication handshake over the stream transport.
//!
//! `Disconnected → Connected` when the stream opens (the auth request goes
//! out immediately), `Connected → Authenticated` on `auth_success`, and
//! back to `Disconnected` on any close or transport error. The machine
//! never reconnects on its own; it only observes the stream.

use tracing::{debug, trace};

use zilink_protocol::constants::MessageType;
use zilink_protocol::envelope::Inbound;

use crate::transport::StreamEvent;
use crate::types::ConnectionState;

/// What the caller must do after feeding an event to the handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeAction {
    /// Nothing further.
    None,
    /// Send the auth request now, before anything else.
    SendAuth,
    /// The link just authenticated: drain the outbound queue.
    Drain,
    /// An operator command arrived.
    Command(String),
    /// Server-side `error` message. Not fatal; state is unchanged.
    Rejected(String),
    /// Transport reported an error (state is now `Disconnected`).
    TransportError(String),
    /// Inbound frame could not be decoded and was ignored.
    Malformed(String),
    /// Well-formed frame of a type the device does not handle.
    Ignored(MessageType),
}

/// Tracks the authentication state of the stream transport.
#[derive(Debug, Clone, Default)]
pub struct AuthHandshake {
    state: ConnectionState,
}

impl AuthHandshake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == ConnectionState::Authenticated
    }

    /// Forces the machine back to `Disconnected`.
    pub fn reset(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// Transition function: applies one stream event.
    pub fn handle(&mut self, event: StreamEvent) -> HandshakeAction {
        match event {
            StreamEvent::Opened => {
                self.state = ConnectionState::Connected;
                HandshakeAction::SendAuth
            }
            StreamEvent::Closed => {
                self.state = ConnectionState::Disconnected;
                HandshakeAction::None
            }
            StreamEvent::Error(e) => {
                self.state = ConnectionState::Disconnected;
                HandshakeAction::TransportError(e)
            }
            StreamEvent::Text(text) => self.handle_text(&text),
        }
    }

    fn handle_text(&mut self, text: &str) -> HandshakeAction {
        trace!(%text, "stream frame received");
        let inbound = match Inbound::parse(text) {
            Ok(m) => m,
            Err(e) => return HandshakeAction::Malformed(e.to_string()),
        };

        match inbound {
            Inbound::AuthSuccess => {
                if self.state == ConnectionState::Disconnected {
                    // A frame from a session that has already closed.
                    debug!("auth_success while disconnected, ignoring");
                    return HandshakeAction::None;
                }
                self.state = ConnectionState::Authenticated;
                HandshakeAction::Drain
            }
            Inbound::Error { error } => HandshakeAction::Rejected(error),
            Inbound::Command { command } => HandshakeAction::Command(command),
            Inbound::Pong => HandshakeAction::None,
            Inbound::Other { msg_type } => HandshakeAction::Ignored(msg_type),
        }
    }
}
