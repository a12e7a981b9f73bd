//! Transport primitives the connection manager drives.
//!
//! Adapters implement these traits; the manager never sees sockets,
//! runtimes or clients. Every method must return promptly: the service
//! tick is single-threaded and nothing here may block it.

use crate::error::TransportError;

/// Lifecycle and data events from the stream transport.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Connection established.
    Opened,
    /// Connection lost or closed.
    Closed,
    /// Transport-level error; treated like a close.
    Error(String),
    /// Inbound text frame.
    Text(String),
}

/// Persistent bidirectional connection.
///
/// Reconnection is the adapter's own job; the manager only observes
/// [`StreamEvent::Opened`] / [`StreamEvent::Closed`].
pub trait StreamTransport {
    /// Next pending event, if any.
    fn poll_event(&mut self) -> Option<StreamEvent>;

    /// Whether the session whose `Opened` was last polled is still open.
    ///
    /// A session the adapter opened but the consumer has not yet polled
    /// does not count.
    fn is_connected(&self) -> bool;

    /// Queues a text frame for delivery on the polled session. Fails with
    /// [`TransportError::NotConnected`] when that session is gone, even if
    /// the adapter has already reconnected.
    fn send_text(&mut self, text: &str) -> Result<(), TransportError>;
}

/// Message received on a subscribed pub/sub topic.
#[derive(Debug, Clone, PartialEq)]
pub struct PubSubMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Lightweight publish/subscribe link.
pub trait PubSubTransport {
    /// `false` when the host runs without a broker; the manager then
    /// never tries to connect.
    fn is_enabled(&self) -> bool {
        true
    }

    fn is_connected(&self) -> bool;

    /// Starts a connection attempt. Must not wait for the broker.
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Next message from a subscribed topic, if any.
    fn poll_message(&mut self) -> Option<PubSubMessage>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;
}

/// Synchronous request/response fallback.
pub trait RequestTransport {
    /// POSTs `body` to `path` and returns the status code.
    ///
    /// Any status code counts as delivered; only a transport-level
    /// failure is an error.
    fn post(&mut self, path: &str, body: &str) -> Result<u16, TransportError>;
}

/// Network association layer (Wi-Fi or similar).
pub trait NetworkLink {
    fn is_associated(&self) -> bool;
}

/// Network layer for hosts whose OS handles association.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAssociated;

impl NetworkLink for AlwaysAssociated {
    fn is_associated(&self) -> bool {
        true
    }
}

/// Stand-in for a transport the host has not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

impl PubSubTransport for Disabled {
    fn is_enabled(&self) -> bool {
        false
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        Err(TransportError::NotConnected)
    }

    fn poll_message(&mut self) -> Option<PubSubMessage> {
        None
    }

    fn publish(&mut self, _topic: &str, _payload: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::NotConnected)
    }
}

impl RequestTransport for Disabled {
    fn post(&mut self, _path: &str, _body: &str) -> Result<u16, TransportError> {
        Err(TransportError::NotConnected)
    }
}

/// The three transports, in fallback priority order.
pub struct Transports<S, P, R> {
    pub stream: S,
    pub pubsub: P,
    pub request: R,
}

impl<T: StreamTransport + ?Sized> StreamTransport for Box<T> {
    fn poll_event(&mut self) -> Option<StreamEvent> {
        (**self).poll_event()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        (**self).send_text(text)
    }
}

impl<T: PubSubTransport + ?Sized> PubSubTransport for Box<T> {
    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        (**self).connect()
    }

    fn poll_message(&mut self) -> Option<PubSubMessage> {
        (**self).poll_message()
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        (**self).publish(topic, payload)
    }
}

impl<T: RequestTransport + ?Sized> RequestTransport for Box<T> {
    fn post(&mut self, path: &str, body: &str) -> Result<u16, TransportError> {
        (**self).post(path, body)
    }
}
