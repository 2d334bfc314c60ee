//! JSON-RPC metadata client.
//!
//! Issues one `state_getMetadata` call:
//!
//! ```text
//! → {"id":"1","jsonrpc":"2.0","method":"state_getMetadata","params":[]}
//! ← {"jsonrpc":"2.0","id":"1","result":"0x6d657461..."}
//! ```
//!
//! The hex `result` is the raw payload. Its header is validated here so a
//! node that answers with something other than metadata fails at the fetch
//! stage rather than deep inside the decoder.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use typegen_metadata::{read_header, SchemaVersion};
use url::Url;

use crate::cache::write_cache;
use crate::config::RpcConfig;
use crate::error::FetchError;

const METHOD: &str = "state_getMetadata";
const REQUEST_ID: &str = "1";
const JSONRPC_VERSION: &str = "2.0";

/// Raw metadata as returned by the node, tagged with its header version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMetadata {
    /// Version byte read from the payload header.
    pub version: SchemaVersion,
    /// The full payload, header included.
    pub bytes: Vec<u8>,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    id: &'a str,
    jsonrpc: &'a str,
    method: &'a str,
    params: [(); 0],
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: serde_json::Value,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Client for the node's metadata RPC.
#[derive(Debug, Clone)]
pub struct MetadataFetcher {
    http: reqwest::Client,
    endpoint: Url,
}

impl MetadataFetcher {
    /// Create a fetcher from configuration.
    pub fn new(config: &RpcConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Transport {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }

    /// The endpoint this fetcher calls.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetch the raw metadata payload.
    ///
    /// Calls `POST {endpoint}` once. Not retried: a failed fetch aborts the
    /// run and the operator re-runs it.
    pub async fn fetch(&self) -> Result<FetchedMetadata, FetchError> {
        let endpoint = self.endpoint.as_str();
        let request = RpcRequest {
            id: REQUEST_ID,
            jsonrpc: JSONRPC_VERSION,
            method: METHOD,
            params: [],
        };

        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                endpoint: endpoint.into(),
                source: e,
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| FetchError::Transport {
            endpoint: endpoint.into(),
            source: e,
        })?;
        if !status.is_success() {
            return Err(FetchError::protocol(
                endpoint,
                format!("HTTP {}: {}", status.as_u16(), truncate(&body, 200)),
            ));
        }

        let bytes = parse_envelope(endpoint, &body)?;
        let version = read_header(&bytes)
            .map_err(|e| FetchError::protocol(endpoint, format!("payload is not metadata: {e}")))?;

        tracing::info!(endpoint = %self.endpoint, bytes = bytes.len(), %version, "fetched metadata");
        Ok(FetchedMetadata { version, bytes })
    }

    /// Fetch and write the payload to `cache`, replacing any previous copy.
    pub async fn fetch_to_cache(&self, cache: &Path) -> Result<FetchedMetadata, FetchError> {
        let fetched = self.fetch().await?;
        write_cache(cache, &fetched.bytes)?;
        Ok(fetched)
    }
}

fn parse_envelope(endpoint: &str, body: &str) -> Result<Vec<u8>, FetchError> {
    let resp: RpcResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::protocol(endpoint, format!("response is not a JSON-RPC envelope: {e}")))?;

    if resp.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
        return Err(FetchError::protocol(
            endpoint,
            format!("expected jsonrpc \"2.0\", got {:?}", resp.jsonrpc),
        ));
    }
    if resp.id.as_str() != Some(REQUEST_ID) {
        return Err(FetchError::protocol(
            endpoint,
            format!("response id {} does not match request id \"{REQUEST_ID}\"", resp.id),
        ));
    }
    if let Some(err) = resp.error {
        return Err(FetchError::protocol(
            endpoint,
            format!("RPC error {}: {}", err.code, err.message),
        ));
    }
    let hex = match resp.result {
        Some(serde_json::Value::String(s)) => s,
        Some(other) => {
            return Err(FetchError::protocol(
                endpoint,
                format!("result is not a hex string: {other}"),
            ))
        }
        None => return Err(FetchError::protocol(endpoint, "response has no result")),
    };
    decode_hex(&hex).map_err(|reason| FetchError::protocol(endpoint, reason))
}

/// Decode a `0x`-prefixed hex string.
pub(crate) fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| "result is missing the 0x prefix".to_string())?;
    if digits.len() % 2 != 0 {
        return Err(format!("result has an odd number of hex digits ({})", digits.len()));
    }
    digits
        .as_bytes()
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| match (nibble(pair[0]), nibble(pair[1])) {
            (Some(hi), Some(lo)) => Ok((hi << 4) | lo),
            _ => Err(format!("invalid hex digit at position {}", 2 + i * 2)),
        })
        .collect()
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
