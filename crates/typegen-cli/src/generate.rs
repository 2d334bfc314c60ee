//! # Generate Subcommand
//!
//! Fetch metadata (or read it from `--metadata`), cache it, decode it, emit
//! the bindings and write them under `<target_dir>/<namespace>/`. Stale
//! files from a previous run are removed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use typegen_codegen::{FreshnessVerifier, Mode};
use typegen_rpc::{write_cache, MetadataFetcher};

use crate::config::Settings;
use crate::stage::Stage;

/// Arguments for the `typegen generate` subcommand.
#[derive(Args, Debug, Default)]
pub struct GenerateArgs {
    /// Read metadata from this file instead of asking the node.
    #[arg(long, value_name = "FILE")]
    pub metadata: Option<PathBuf>,

    /// Reject type references that precede the referenced definition.
    #[arg(long)]
    pub strict: bool,
}

/// Execute the generate subcommand.
pub fn run_generate(args: &GenerateArgs, settings: &Settings) -> Result<u8> {
    let bytes = match &args.metadata {
        Some(path) => {
            let path = crate::resolve_path(path, &settings.root);
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read metadata file: {}", path.display()))
                .context(Stage::Fetch)?;
            write_cache(&settings.cache_file, &bytes).context(Stage::Fetch)?;
            bytes
        }
        None => fetch(settings)?,
    };

    let (_, artifacts) = crate::decode_and_emit(&bytes, &settings.namespace, args.strict)?;

    let dir = settings.namespace_dir();
    let report = FreshnessVerifier::new(Mode::Write)
        .verify(&artifacts, &dir)
        .with_context(|| format!("failed to write bindings to {}", dir.display()))
        .context(Stage::Verify)?;

    println!(
        "OK: {} artifact(s) in {} ({} added, {} modified, {} removed, {} unchanged)",
        artifacts.len(),
        dir.display(),
        report.added.len(),
        report.modified.len(),
        report.removed.len(),
        report.unchanged.len()
    );
    Ok(0)
}

/// Ask the node for its metadata on a current-thread runtime and cache it.
fn fetch(settings: &Settings) -> Result<Vec<u8>> {
    let config = settings.rpc_config().context(Stage::Config)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
        .context(Stage::Fetch)?;
    let fetched = runtime
        .block_on(async {
            let fetcher = MetadataFetcher::new(&config)?;
            fetcher.fetch_to_cache(&settings.cache_file).await
        })
        .context(Stage::Fetch)?;
    Ok(fetched.bytes)
}
