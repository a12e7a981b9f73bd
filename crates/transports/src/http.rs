//! HTTP request/response transport.
//!
//! `post` runs a request to completion on the adapter's runtime handle.
//! Call it from a thread outside the runtime (the host's service loop);
//! the runtime must be multi-threaded so its I/O driver keeps running.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use zilink_device_link::{Credentials, RequestTransport, TransportError};
use zilink_protocol::routes::bearer;

use crate::error::AdapterError;

/// Request timeout when none is configured.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Server root, e.g. `https://zilink.example.com/api`.
    pub base_url: String,
    pub timeout: Duration,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

/// Request transport backed by `reqwest`.
pub struct HttpRequester {
    client: reqwest::Client,
    handle: Handle,
    base_url: String,
    authorization: String,
}

impl HttpRequester {
    pub fn new(
        handle: Handle,
        config: &HttpConfig,
        credentials: &Credentials,
    ) -> Result<Self, AdapterError> {
        let base_url = config.base_url.trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AdapterError::Url(config.base_url.clone()));
        }

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            handle,
            base_url: base_url.to_string(),
            authorization: bearer(credentials.auth_token()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl RequestTransport for HttpRequester {
    fn post(&mut self, path: &str, body: &str) -> Result<u16, TransportError> {
        let url = self.url(path);
        let request = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.authorization.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_owned())
            .send();

        match self.handle.block_on(request) {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!(%url, status, "request completed");
                Ok(status)
            }
            Err(e) => {
                warn!(%url, error = %e, "request failed");
                Err(TransportError::Request(e.to_string()))
            }
        }
    }
}
