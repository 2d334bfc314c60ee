//! Fetcher configuration.
//!
//! Points at a local development node by default. The CLI resolves the
//! endpoint and timeout from `typegen.yaml`, `TYPEGEN_*` variables and flags
//! and hands the result to [`RpcConfig::new`].

use url::Url;

/// Default node endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:9944";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where and how long to ask the node for its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    /// JSON-RPC HTTP endpoint of the node.
    pub endpoint: Url,
    /// Upper bound on the whole request, connect included.
    pub timeout_secs: u64,
}

impl RpcConfig {
    /// Build a configuration from an endpoint string.
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: parse_url("endpoint", endpoint)?,
            timeout_secs,
        })
    }

    /// A configuration pointing at a local mock server (for testing).
    pub fn local_mock(port: u16) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: parse_url("localhost", &format!("http://127.0.0.1:{port}"))?,
            timeout_secs: 5,
        })
    }
}

fn parse_url(what: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(what.to_string(), e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl(
            what.to_string(),
            format!("unsupported scheme '{other}' (expected http or https)"),
        )),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}
