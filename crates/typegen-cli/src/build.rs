//! # Build Subcommand
//!
//! Verify the version lock, compile the emitted sources and package them.
//!
//! ## Package layout
//!
//! ```text
//! <build_dir>/<package>-<version>/
//!   manifest.json          canonical JSON: package, namespace, file digests
//!   types/...              copied from <target_dir>/<namespace>/
//!   modules/...
//! ```
//!
//! The package is assembled in a hidden sibling directory and renamed into
//! place only once complete, so a failed build leaves the previous package
//! (or nothing) behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};

use typegen_codegen::{load_committed, CommittedSet};
use typegen_core::{sha256_raw, CanonicalBytes};

use crate::config::Settings;
use crate::lock::{check_lock, LockStatus};
use crate::stage::Stage;

/// Name of the digest manifest inside a package.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Arguments for the `typegen build` subcommand.
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Skip the configured compile command.
    #[arg(long)]
    pub no_compile: bool,
}

/// `manifest.json` of a built package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// Package name from the configuration.
    pub name: String,
    /// Package version from the configuration.
    pub version: String,
    /// Namespace the bindings were generated for.
    pub namespace: String,
    /// Relative file name to SHA-256 hex of its contents.
    pub files: BTreeMap<String, String>,
}

/// Execute the build subcommand.
pub fn run_build(args: &BuildArgs, settings: &Settings) -> Result<u8> {
    let package = build_package(settings, !args.no_compile)?;
    println!("OK: built package {}", package.display());
    Ok(0)
}

/// Lock check, compile and package. Returns the package directory.
pub fn build_package(settings: &Settings, compile: bool) -> Result<PathBuf> {
    verify_lock(settings).context(Stage::Lock)?;
    if compile {
        compile_sources(settings).context(Stage::Build)?;
    }
    package(settings).context(Stage::Build)
}

fn verify_lock(settings: &Settings) -> Result<()> {
    match check_lock(settings, &settings.lock_file, None)? {
        LockStatus::UpToDate => Ok(()),
        LockStatus::Missing => bail!(
            "lock file {} does not exist (run `typegen lock`)",
            settings.lock_file.display()
        ),
        LockStatus::Outdated { .. } => bail!(
            "lock file {} is out of date (run `typegen lock`)",
            settings.lock_file.display()
        ),
    }
}

fn compile_sources(settings: &Settings) -> Result<()> {
    let dir = settings.namespace_dir();
    let has_sources = std::fs::read_dir(&dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);
    if !has_sources {
        bail!(
            "no generated sources in {} (run `typegen generate`)",
            dir.display()
        );
    }
    match &settings.compile_command {
        Some(command) => run_command(command, &settings.root),
        None => {
            tracing::debug!("no compile_command configured");
            Ok(())
        }
    }
}

fn package(settings: &Settings) -> Result<PathBuf> {
    let source = settings.namespace_dir();
    let files = load_committed(&source)
        .with_context(|| format!("failed to read sources in {}", source.display()))?;
    if files.is_empty() {
        bail!("no generated sources in {}", source.display());
    }
    if files.contains_key(MANIFEST_FILE) {
        bail!("{MANIFEST_FILE} in {} clashes with the package manifest", source.display());
    }

    let manifest = PackageManifest {
        name: settings.package_name.clone(),
        version: settings.package_version.clone(),
        namespace: settings.namespace.clone(),
        files: files
            .iter()
            .map(|(name, contents)| (name.clone(), sha256_raw(contents).to_hex()))
            .collect(),
    };
    let manifest = CanonicalBytes::new(&manifest).context("failed to canonicalize manifest")?;

    let dest = settings
        .build_dir
        .join(package_dir_name(&settings.package_name, &settings.package_version));
    install_dir(&dest, |staging| {
        write_files(staging, &files)?;
        std::fs::write(staging.join(MANIFEST_FILE), [manifest.as_bytes(), b"\n"].concat())?;
        Ok(())
    })?;
    tracing::info!(package = %dest.display(), files = files.len(), "packaged bindings");
    Ok(dest)
}

/// `<name>-<version>` with scope markers flattened, e.g.
/// `@madara/types` 0.3.1 becomes `madara-types-0.3.1`.
pub fn package_dir_name(name: &str, version: &str) -> String {
    format!("{}-{version}", name.trim_start_matches('@').replace('/', "-"))
}

/// Run `command` through the shell in `cwd`; a non-zero exit is an error.
pub(crate) fn run_command(command: &str, cwd: &Path) -> Result<()> {
    tracing::info!(command, cwd = %cwd.display(), "running command");
    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .status()
        .with_context(|| format!("failed to spawn `{command}`"))?;
    if !status.success() {
        return Err(anyhow!("`{command}` exited with {status}"));
    }
    Ok(())
}

/// Fill a fresh directory via `fill`, then move it to `dest`, replacing
/// whatever was there. On failure `dest` is untouched.
pub(crate) fn install_dir(dest: &Path, fill: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| anyhow!("{} has no parent directory", dest.display()))?;
    let file_name = dest
        .file_name()
        .ok_or_else(|| anyhow!("{} has no file name", dest.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let staging = parent.join(format!(".{}.staging", file_name.to_string_lossy()));
    if staging.exists() {
        std::fs::remove_dir_all(&staging)
            .with_context(|| format!("failed to clear {}", staging.display()))?;
    }
    std::fs::create_dir_all(&staging)
        .with_context(|| format!("failed to create {}", staging.display()))?;

    if let Err(e) = fill(&staging) {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(e);
    }
    if dest.exists() {
        std::fs::remove_dir_all(dest)
            .with_context(|| format!("failed to replace {}", dest.display()))?;
    }
    std::fs::rename(&staging, dest)
        .with_context(|| format!("failed to move {} into place", dest.display()))
}

pub(crate) fn write_files(dir: &Path, files: &CommittedSet) -> Result<()> {
    for (name, contents) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}
