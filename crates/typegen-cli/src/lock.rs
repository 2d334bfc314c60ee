//! # Lock Subcommand
//!
//! Writes and verifies `typegen.lock`, the canonical-JSON list of every
//! dependency version the bindings package pins.
//!
//! The lock is built from the `dependencies` and `overrides` tables of
//! `typegen.yaml` (overrides win) and serialized through `CanonicalBytes`, so
//! the same configuration always produces the same bytes. `--check` compares
//! byte for byte, allowing a trailing newline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};

use typegen_core::{sha256_raw, CanonicalBytes};

use crate::config::Settings;
use crate::stage::Stage;

/// Format version of the lock file.
pub const LOCK_VERSION: u32 = 1;

/// Arguments for the `typegen lock` subcommand.
#[derive(Args, Debug, Default)]
pub struct LockArgs {
    /// Verify the existing lock file instead of writing it.
    #[arg(long)]
    pub check: bool,

    /// Output path, overriding `lock_file` from the configuration.
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Override the generated_at timestamp for deterministic output.
    #[arg(long)]
    pub generated_at: Option<String>,
}

/// Contents of `typegen.lock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionLock {
    /// Format version, always [`LOCK_VERSION`].
    pub lock_version: u32,
    /// RFC 3339 UTC timestamp, kept stable across rewrites.
    pub generated_at: String,
    /// The bindings package being pinned.
    pub package: LockedPackage,
    /// Dependency name to exact version, overrides applied.
    pub dependencies: BTreeMap<String, String>,
}

/// The package the lock belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedPackage {
    /// Package name, e.g. `@madara/types`.
    pub name: String,
    /// Package version.
    pub version: String,
}

impl VersionLock {
    /// The lock `settings` describe.
    pub fn from_settings(settings: &Settings, generated_at: String) -> Self {
        Self {
            lock_version: LOCK_VERSION,
            generated_at,
            package: LockedPackage {
                name: settings.package_name.clone(),
                version: settings.package_version.clone(),
            },
            dependencies: settings.pinned_dependencies(),
        }
    }

    /// Canonical serialization, without a trailing newline.
    pub fn canonical(&self) -> Result<CanonicalBytes> {
        CanonicalBytes::new(self).context("failed to canonicalize lock file")
    }
}

/// Outcome of comparing the computed lock with the file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    /// The file matches byte for byte.
    UpToDate,
    /// No lock file at the given path.
    Missing,
    /// The file differs from what the configuration produces.
    Outdated {
        /// SHA-256 hex of the computed lock.
        expected_sha256: String,
        /// SHA-256 hex of the file on disk.
        existing_sha256: String,
    },
}

/// Execute the lock subcommand.
///
/// Returns 0 on success and the lock stage's exit code when `--check` finds
/// the file missing or outdated.
pub fn run_lock(args: &LockArgs, settings: &Settings) -> Result<u8> {
    let out_path = match &args.out {
        Some(out) => crate::resolve_path(out, &settings.root),
        None => settings.lock_file.clone(),
    };

    if args.check {
        let status = check_lock(settings, &out_path, args.generated_at.as_deref())
            .context(Stage::Lock)?;
        return Ok(report_status(&status, &out_path));
    }

    let generated_at = resolve_generated_at(args.generated_at.as_deref(), &out_path, false)
        .context(Stage::Lock)?;
    let lock = VersionLock::from_settings(settings, generated_at)
        .canonical()
        .context(Stage::Lock)?;
    let output = [lock.as_bytes(), b"\n"].concat();
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))
            .context(Stage::Lock)?;
    }
    std::fs::write(&out_path, &output)
        .with_context(|| format!("failed to write lock file: {}", out_path.display()))
        .context(Stage::Lock)?;
    tracing::info!(path = %out_path.display(), pinned = settings.pinned_dependencies().len(), "wrote lock file");
    println!("OK: wrote lock file to {}", out_path.display());
    Ok(0)
}

/// Compare the lock `settings` describe against `lock_path`.
pub fn check_lock(
    settings: &Settings,
    lock_path: &Path,
    generated_at: Option<&str>,
) -> Result<LockStatus> {
    if !lock_path.exists() {
        return Ok(LockStatus::Missing);
    }
    let generated_at = resolve_generated_at(generated_at, lock_path, true)?;
    let computed = VersionLock::from_settings(settings, generated_at).canonical()?;
    let expected = computed.as_bytes();

    let existing = std::fs::read(lock_path)
        .with_context(|| format!("failed to read lock file: {}", lock_path.display()))?;

    // Allow trailing newline.
    let matches = existing == expected || existing == [expected, b"\n".as_slice()].concat();
    if matches {
        Ok(LockStatus::UpToDate)
    } else {
        Ok(LockStatus::Outdated {
            expected_sha256: sha256_raw(expected).to_hex(),
            existing_sha256: sha256_raw(&existing).to_hex(),
        })
    }
}

fn report_status(status: &LockStatus, path: &Path) -> u8 {
    print!("{}", status_report(status, path));
    match status {
        LockStatus::UpToDate => 0,
        LockStatus::Missing | LockStatus::Outdated { .. } => Stage::Lock.exit_code(),
    }
}

fn status_report(status: &LockStatus, path: &Path) -> String {
    let stage = Stage::Lock.as_str();
    match status {
        LockStatus::UpToDate => "OK: lock file is up to date\n".to_string(),
        LockStatus::Missing => {
            format!("FAIL: {stage} stage: lock file does not exist: {}\n", path.display())
        }
        LockStatus::Outdated {
            expected_sha256,
            existing_sha256,
        } => format!(
            "FAIL: {stage} stage: lock file is outdated or differs from the configuration\n  \
             Expected digest: {expected_sha256}\n  \
             Existing digest: {existing_sha256}\n"
        ),
    }
}

/// Resolve the generated_at timestamp.
///
/// Priority:
/// 1. Explicit `--generated-at`
/// 2. The existing lock file's `generated_at` (keeps `--check` stable)
/// 3. `SOURCE_DATE_EPOCH`
/// 4. Current UTC time, unless `deterministic` is set
fn resolve_generated_at(explicit: Option<&str>, lock_path: &Path, deterministic: bool) -> Result<String> {
    if let Some(ts) = explicit {
        return Ok(ts.to_string());
    }

    if let Ok(content) = std::fs::read_to_string(lock_path) {
        if let Ok(existing) = serde_json::from_str::<serde_json::Value>(&content) {
            if let Some(ts) = existing.get("generated_at").and_then(|v| v.as_str()) {
                if !ts.is_empty() {
                    return Ok(ts.to_string());
                }
            }
        }
    }

    if let Ok(epoch_str) = std::env::var("SOURCE_DATE_EPOCH") {
        if let Ok(epoch) = epoch_str.parse::<i64>() {
            if let Some(dt) = chrono::DateTime::from_timestamp(epoch, 0) {
                return Ok(dt.format("%Y-%m-%dT%H:%M:%SZ").to_string());
            }
        }
    }

    if deterministic {
        bail!(
            "lock verification requires a deterministic generated_at \
             (use --generated-at or SOURCE_DATE_EPOCH)"
        );
    }

    Ok(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string())
}
