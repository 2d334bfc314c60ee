//! # Check Subcommand
//!
//! Decode the cached metadata, emit the bindings in memory and compare them
//! with the committed ones. Never writes. Any added, removed or modified
//! artifact fails the check with the verify stage's exit code.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use typegen_codegen::{FreshnessVerifier, Mode};
use typegen_core::{StaleBindingError, TypegenError};
use typegen_rpc::read_cache;

use crate::config::Settings;
use crate::stage::Stage;

/// Arguments for the `typegen check` subcommand.
#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Reject type references that precede the referenced definition.
    #[arg(long)]
    pub strict: bool,
}

/// Execute the check subcommand.
///
/// Returns 0 when the committed bindings are fresh and the verify stage's
/// exit code when they drifted.
pub fn run_check(args: &CheckArgs, settings: &Settings) -> Result<u8> {
    let bytes = read_cache(&settings.cache_file)
        .with_context(|| {
            format!(
                "no usable cached metadata at {} (run `typegen generate` first)",
                settings.cache_file.display()
            )
        })
        .context(Stage::Fetch)?;

    let (_, artifacts) = crate::decode_and_emit(&bytes, &settings.namespace, args.strict)?;

    let dir = settings.namespace_dir();
    match FreshnessVerifier::new(Mode::Check).verify(&artifacts, &dir) {
        Ok(report) => {
            println!(
                "OK: {} artifact(s) in {} are up to date",
                report.unchanged.len(),
                dir.display()
            );
            Ok(0)
        }
        Err(TypegenError::StaleBinding(stale)) => {
            print!("{}", stale_report(&dir, &stale));
            Ok(Stage::Verify.exit_code())
        }
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("failed to read bindings in {}", dir.display()))
            .context(Stage::Verify)),
    }
}

fn stale_report(dir: &Path, stale: &StaleBindingError) -> String {
    let mut out = format!(
        "FAIL: {} stage: bindings in {} are stale\n",
        Stage::Verify.as_str(),
        dir.display()
    );
    let rows = [
        ("modified:", &stale.modified),
        ("missing: ", &stale.added),
        ("extra:   ", &stale.removed),
    ];
    for (label, names) in rows {
        for name in names {
            let _ = writeln!(out, "  {label} {name}");
        }
    }
    out.push_str("  Run `typegen generate` and commit the result.\n");
    out
}
