#![deny(missing_docs)]

//! # typegen-core -- Foundational Types for typegen
//!
//! This crate defines the types that every other crate in the workspace
//! depends on. It has no internal crate dependencies, only `serde`,
//! `serde_json`, `thiserror` and `sha2` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **[`CanonicalBytes`] is the sole path to manifest digests.** Lock files
//!    and package manifests are serialized through `CanonicalBytes::new()` so
//!    the same logical content always produces the same bytes on disk.
//!
//! 2. **One error hierarchy.** The decoder, emitter and freshness verifier
//!    report through the typed errors in [`error`], aggregated by
//!    [`TypegenError`]. No `Box<dyn Error>`, no `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;

// Re-export primary types at crate root for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{sha256_raw, ContentDigest, DigestAlgorithm};
pub use error::{
    CanonicalizationError, DecodeError, DecodeErrorKind, EmitError, StaleBindingError,
    TypegenError,
};
