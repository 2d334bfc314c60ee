//! Fetcher error types.

use std::path::PathBuf;

/// Errors from fetching or caching metadata.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request never produced a response: connection refused, DNS
    /// failure, TLS failure or timeout.
    #[error("transport error calling {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// A response arrived but is not a usable metadata envelope.
    #[error("protocol error from {endpoint}: {reason}")]
    Protocol { endpoint: String, reason: String },

    /// The cache file could not be read or written.
    #[error("metadata cache {}: {source}", .path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl FetchError {
    pub(crate) fn protocol(endpoint: &str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the failure happened before any response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
