//! # typegen-codegen -- Interface Emitter and Freshness Verifier
//!
//! Generates TypeScript declarations from a decoded metadata registry and
//! checks committed bindings against them.
//!
//! ## Layout of a namespace directory
//!
//! ```text
//! <target_dir>/<namespace>/
//!   types/<Name>.ts        one per type descriptor
//!   modules/<module>.ts    one per module: calls, events, storage, constants, client
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let artifacts = typegen_codegen::emit(&metadata, "madara")?;
//! FreshnessVerifier::new(Mode::Check).verify(&artifacts, &dir)?;
//! ```

pub mod emitter;
pub mod freshness;
pub mod naming;
mod render;

pub use emitter::{Artifacts, EmittedArtifact, Emitter};
pub use freshness::{
    load_committed, persist, CommittedSet, FreshnessReport, FreshnessVerifier, Mode,
    ModifiedArtifact,
};

use typegen_core::EmitError;
use typegen_metadata::Metadata;

/// Emit every artifact for `metadata`, or none at all.
pub fn emit(metadata: &Metadata, namespace: &str) -> Result<Vec<EmittedArtifact>, EmitError> {
    let emitter = Emitter::new(&metadata.registry, &metadata.modules, namespace)?;
    let artifacts = emitter.artifacts().collect::<Result<Vec<_>, _>>()?;
    tracing::info!(namespace, artifacts = artifacts.len(), "emitted artifacts");
    Ok(artifacts)
}
