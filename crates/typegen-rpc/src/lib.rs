//! # typegen-rpc -- Metadata Fetcher
//!
//! Asks a node for its self-describing metadata over JSON-RPC and keeps a
//! copy on disk.
//!
//! ## Failure model
//!
//! - [`FetchError::Transport`]: no response (connection refused, timeout).
//! - [`FetchError::Protocol`]: a response that is not a usable metadata
//!   envelope.
//!
//! Requests are bounded by [`RpcConfig::timeout_secs`] and never retried.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;

pub use cache::{read_cache, write_cache, DEFAULT_CACHE_FILE};
pub use client::{FetchedMetadata, MetadataFetcher};
pub use config::{ConfigError, RpcConfig};
pub use error::FetchError;
