//! # typegen-cli -- Build/Publish Driver
//!
//! Provides the `typegen` command-line interface over the generator
//! pipeline:
//!
//! ```text
//! fetch -> decode -> emit -> verify -> build -> publish
//! ```
//!
//! Each stage runs only after the previous one completed, and a failing
//! stage exits with its own code (see [`stage::Stage`]).
//!
//! ## Subcommands
//!
//! - `typegen generate` -- Fetch metadata and (re)write the bindings.
//! - `typegen check` -- Verify committed bindings against cached metadata.
//! - `typegen lock` -- Write or verify `typegen.lock`.
//! - `typegen build` -- Lock check, compile and package.
//! - `typegen publish` -- Build, then stage the package for publication.
//!
//! ```bash
//! typegen generate --endpoint http://127.0.0.1:9944
//! typegen check
//! typegen lock --check
//! ```

pub mod build;
pub mod check;
pub mod config;
pub mod generate;
pub mod lock;
pub mod publish;
pub mod stage;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use typegen_codegen::EmittedArtifact;
use typegen_metadata::{decode_metadata_with, DecodeOptions, Metadata};

use crate::stage::Stage;

/// Resolve a path that may be relative to the project root.
pub fn resolve_path(path: &Path, root: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Walk up from `start` to the nearest directory holding `typegen.yaml`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(config::CONFIG_FILE).is_file())
        .map(Path::to_path_buf)
}

/// Decode then emit, tagging failures with their stage.
pub(crate) fn decode_and_emit(
    bytes: &[u8],
    namespace: &str,
    strict: bool,
) -> Result<(Metadata, Vec<EmittedArtifact>)> {
    let options = if strict {
        DecodeOptions::strict()
    } else {
        DecodeOptions::default()
    };
    let metadata = decode_metadata_with(bytes, options)
        .context("failed to decode metadata")
        .context(Stage::Decode)?;
    tracing::info!(
        version = %metadata.version,
        types = metadata.registry.len(),
        modules = metadata.modules.len(),
        "decoded metadata"
    );
    let artifacts = typegen_codegen::emit(&metadata, namespace)
        .context("failed to emit bindings")
        .context(Stage::Emit)?;
    Ok((metadata, artifacts))
}
