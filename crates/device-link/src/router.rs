//! Priority fallback for component/state updates.
//!
//! Stream first, then pub/sub, then request/response. The first transport
//! that is available gets the message and its result is final: a failure
//! there is reported, not retried on the next transport.

use tracing::{debug, warn};

use zilink_protocol::routes::{Channel, Endpoint};

use crate::error::TransportError;
use crate::transport::{
    NetworkLink, PubSubTransport, RequestTransport, StreamTransport, Transports,
};
use crate::types::{TransportHandles, TransportKind};

/// Transport that carried a component update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Stream,
    PubSub,
    /// Delivered over request/response; any status code counts.
    Request { status: u16 },
}

impl Route {
    pub fn kind(self) -> TransportKind {
        match self {
            Route::Stream => TransportKind::Stream,
            Route::PubSub => TransportKind::PubSub,
            Route::Request { .. } => TransportKind::Request,
        }
    }
}

/// Chooses the transport for component updates of one device.
#[derive(Debug, Clone)]
pub struct TransportRouter {
    components_topic: String,
    components_path: String,
}

impl TransportRouter {
    pub fn new(device_id: &str) -> Self {
        Self {
            components_topic: Channel::Components.topic(device_id),
            components_path: Endpoint::Components.path(device_id),
        }
    }

    /// Transport that would be attempted for the next component update.
    pub fn select(&self, handles: &TransportHandles) -> TransportKind {
        if handles.stream {
            TransportKind::Stream
        } else if handles.pubsub {
            TransportKind::PubSub
        } else {
            TransportKind::Request
        }
    }

    /// Sends `payload` over the first available transport.
    ///
    /// The stream only needs to be connected, not authenticated.
    pub fn route_component<S, P, R, N>(
        &self,
        handles: &TransportHandles,
        transports: &mut Transports<S, P, R>,
        network: &N,
        payload: &str,
    ) -> Result<Route, TransportError>
    where
        S: StreamTransport,
        P: PubSubTransport,
        R: RequestTransport,
        N: NetworkLink,
    {
        let kind = self.select(handles);
        debug!(transport = %kind, "routing component update");

        let result = match kind {
            TransportKind::Stream => transports.stream.send_text(payload).map(|()| Route::Stream),
            TransportKind::PubSub => transports
                .pubsub
                .publish(&self.components_topic, payload.as_bytes())
                .map(|()| Route::PubSub),
            TransportKind::Request => {
                if !network.is_associated() {
                    Err(TransportError::NotConnected)
                } else {
                    transports
                        .request
                        .post(&self.components_path, payload)
                        .map(|status| Route::Request { status })
                }
            }
        };

        if let Err(e) = &result {
            warn!(transport = %kind, error = %e, "component update failed");
        }
        result
    }
}
