//! Error types for adapter construction.
//!
//! Runtime failures never surface here: they are mapped to
//! [`zilink_device_link::TransportError`] at the trait boundary.

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("invalid URL: {0}")]
    Url(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
