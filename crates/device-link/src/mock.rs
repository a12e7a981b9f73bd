//! Scripted transports for unit tests.

use std::collections::VecDeque;

use crate::error::TransportError;
use crate::transport::{
    NetworkLink, PubSubMessage, PubSubTransport, RequestTransport, StreamEvent, StreamTransport,
};

#[derive(Debug, Default)]
pub(crate) struct MockStream {
    pub(crate) events: VecDeque<StreamEvent>,
    pub(crate) connected: bool,
    pub(crate) sent: Vec<String>,
    pub(crate) fail_with: Option<TransportError>,
    /// Accept this many more frames, then report `NotReady`.
    pub(crate) accept_limit: Option<usize>,
}

impl MockStream {
    pub(crate) fn push(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Opened => self.connected = true,
            StreamEvent::Closed | StreamEvent::Error(_) => self.connected = false,
            StreamEvent::Text(_) => {}
        }
        self.events.push_back(event);
    }

    pub(crate) fn push_text(&mut self, text: &str) {
        self.push(StreamEvent::Text(text.to_string()));
    }

    /// Sent frames decoded as JSON.
    pub(crate) fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }
}

impl StreamTransport for MockStream {
    fn poll_event(&mut self) -> Option<StreamEvent> {
        self.events.pop_front()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        if let Some(e) = &self.fail_with {
            return Err(e.clone());
        }
        if let Some(limit) = self.accept_limit.as_mut() {
            if *limit == 0 {
                return Err(TransportError::NotReady);
            }
            *limit -= 1;
        }
        self.sent.push(text.to_string());
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct MockPubSub {
    pub(crate) enabled: bool,
    pub(crate) connected: bool,
    /// Whether `connect` brings the link up.
    pub(crate) accept_connect: bool,
    pub(crate) connect_attempts: usize,
    pub(crate) inbound: VecDeque<PubSubMessage>,
    pub(crate) published: Vec<(String, Vec<u8>)>,
    pub(crate) fail_publish: bool,
}

impl Default for MockPubSub {
    fn default() -> Self {
        Self {
            enabled: true,
            connected: false,
            accept_connect: false,
            connect_attempts: 0,
            inbound: VecDeque::new(),
            published: Vec::new(),
            fail_publish: false,
        }
    }
}

impl MockPubSub {
    pub(crate) fn push_message(&mut self, topic: &str, payload: &str) {
        self.inbound.push_back(PubSubMessage {
            topic: topic.to_string(),
            payload: payload.as_bytes().to_vec(),
        });
    }
}

impl PubSubTransport for MockPubSub {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        self.connect_attempts += 1;
        if self.accept_connect {
            self.connected = true;
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }

    fn poll_message(&mut self) -> Option<PubSubMessage> {
        self.inbound.pop_front()
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        if self.fail_publish {
            return Err(TransportError::Send("broker refused".into()));
        }
        self.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct MockRequest {
    pub(crate) status: u16,
    pub(crate) fail: bool,
    pub(crate) posts: Vec<(String, String)>,
}

impl Default for MockRequest {
    fn default() -> Self {
        Self {
            status: 200,
            fail: false,
            posts: Vec::new(),
        }
    }
}

impl RequestTransport for MockRequest {
    fn post(&mut self, path: &str, body: &str) -> Result<u16, TransportError> {
        if self.fail {
            return Err(TransportError::Request("connection refused".into()));
        }
        self.posts.push((path.to_string(), body.to_string()));
        Ok(self.status)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct MockNetwork {
    pub(crate) associated: bool,
}

impl MockNetwork {
    pub(crate) fn up() -> Self {
        Self { associated: true }
    }

    pub(crate) fn down() -> Self {
        Self { associated: false }
    }
}

impl NetworkLink for MockNetwork {
    fn is_associated(&self) -> bool {
        self.associated
    }
}
