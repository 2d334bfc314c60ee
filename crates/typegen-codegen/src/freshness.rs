//! # Freshness Verifier
//!
//! Compares freshly emitted artifacts against the committed copy under the
//! namespace directory.
//!
//! In [`Mode::Check`] any difference is a [`StaleBindingError`]; nothing
//! on disk is touched. In [`Mode::Write`] the committed copy is brought in
//! line: added and modified artifacts are written, removed ones deleted,
//! unchanged ones left alone so their timestamps survive.
//!
//! Dotfiles (`.gitkeep`, editor swap files) under the namespace directory
//! are not artifacts and are ignored.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use typegen_core::{sha256_raw, StaleBindingError, TypegenError};

use crate::emitter::EmittedArtifact;

/// Committed artifacts keyed by `/`-separated relative name.
pub type CommittedSet = BTreeMap<String, Vec<u8>>;

/// Whether drift fails the run or gets persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Report drift as an error.
    Check,
    /// Rewrite the committed set to match.
    Write,
}

/// An artifact whose committed contents differ from the emitted ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifiedArtifact {
    /// Artifact name.
    pub name: String,
    /// SHA-256 hex of the committed contents.
    pub committed_sha256: String,
    /// SHA-256 hex of the emitted contents.
    pub emitted_sha256: String,
}

/// Outcome of comparing emitted against committed artifacts.
///
/// Every list is sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FreshnessReport {
    /// Identical on both sides.
    pub unchanged: Vec<String>,
    /// Emitted but not committed.
    pub added: Vec<String>,
    /// Committed but no longer emitted.
    pub removed: Vec<String>,
    /// Present on both sides with different contents.
    pub modified: Vec<ModifiedArtifact>,
}

impl FreshnessReport {
    /// Diff two artifact sets.
    pub fn compare(emitted: &[EmittedArtifact], committed: &CommittedSet) -> Self {
        let emitted: BTreeMap<&str, &[u8]> = emitted
            .iter()
            .map(|a| (a.name.as_str(), a.contents.as_bytes()))
            .collect();

        let mut report = Self::default();
        for (&name, &contents) in &emitted {
            match committed.get(name) {
                None => report.added.push(name.to_string()),
                Some(existing) if existing.as_slice() == contents => {
                    report.unchanged.push(name.to_string())
                }
                Some(existing) => report.modified.push(ModifiedArtifact {
                    name: name.to_string(),
                    committed_sha256: sha256_raw(existing).to_hex(),
                    emitted_sha256: sha256_raw(contents).to_hex(),
                }),
            }
        }
        report.removed = committed
            .keys()
            .filter(|name| !emitted.contains_key(name.as_str()))
            .cloned()
            .collect();
        report
    }

    /// True when the two sets match exactly.
    pub fn is_fresh(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Names of modified artifacts.
    pub fn modified_names(&self) -> Vec<String> {
        self.modified.iter().map(|m| m.name.clone()).collect()
    }

    /// The drift as an error, or `None` when fresh.
    pub fn stale_error(&self) -> Option<StaleBindingError> {
        if self.is_fresh() {
            return None;
        }
        Some(StaleBindingError {
            modified: self.modified_names(),
            removed: self.removed.clone(),
            added: self.added.clone(),
        })
    }
}

/// Compares and optionally persists artifact sets for one namespace
/// directory.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessVerifier {
    mode: Mode,
}

impl FreshnessVerifier {
    /// A verifier in `mode`.
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }

    /// Compare `emitted` against the artifacts under `dir`.
    ///
    /// In check mode, returns [`TypegenError::StaleBinding`] unless the sets
    /// match. In write mode, persists `emitted` and returns the report of
    /// what changed.
    pub fn verify(&self, emitted: &[EmittedArtifact], dir: &Path) -> Result<FreshnessReport, TypegenError> {
        let committed = load_committed(dir)?;
        let report = FreshnessReport::compare(emitted, &committed);
        tracing::info!(
            dir = %dir.display(),
            unchanged = report.unchanged.len(),
            added = report.added.len(),
            removed = report.removed.len(),
            modified = report.modified.len(),
            "freshness report"
        );
        match self.mode {
            Mode::Check => match report.stale_error() {
                Some(err) => Err(err.into()),
                None => Ok(report),
            },
            Mode::Write => {
                persist(dir, emitted, &report)?;
                Ok(report)
            }
        }
    }
}

/// Read every committed artifact under `dir`.
///
/// A missing directory is an empty set.
pub fn load_committed(dir: &Path) -> std::io::Result<CommittedSet> {
    let mut set = CommittedSet::new();
    if !dir.exists() {
        return Ok(set);
    }
    for path in walk_files(dir)? {
        let Ok(rel) = path.strip_prefix(dir) else {
            continue;
        };
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        set.insert(name, std::fs::read(&path)?);
    }
    Ok(set)
}

/// Apply `report` to `dir`: write added and modified artifacts, delete
/// removed ones.
///
/// Every new file is first written to a hidden sibling and only renamed
/// into place once all of them are on disk; a failed write leaves `dir` as
/// it was.
pub fn persist(dir: &Path, emitted: &[EmittedArtifact], report: &FreshnessReport) -> std::io::Result<()> {
    let to_write: BTreeSet<&str> = report
        .added
        .iter()
        .map(String::as_str)
        .chain(report.modified.iter().map(|m| m.name.as_str()))
        .collect();

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
    for artifact in emitted.iter().filter(|a| to_write.contains(a.name.as_str())) {
        let path = artifact_path(dir, &artifact.name);
        let tmp = temp_path(&path);
        let written = path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(&tmp, artifact.contents.as_bytes()));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            for (tmp, _) in &staged {
                let _ = std::fs::remove_file(tmp);
            }
            return Err(e);
        }
        staged.push((tmp, path));
    }
    for (tmp, path) in &staged {
        std::fs::rename(tmp, path)?;
        tracing::debug!(artifact = %path.display(), "wrote artifact");
    }

    for name in &report.removed {
        let path = artifact_path(dir, name);
        std::fs::remove_file(&path)?;
        tracing::debug!(artifact = %name, "removed artifact");
        prune_empty_parents(dir, &path)?;
    }
    Ok(())
}

/// `types/Foo.ts` is staged as `types/.Foo.ts.tmp`, which
/// [`load_committed`] never reads.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

fn artifact_path(dir: &Path, name: &str) -> PathBuf {
    name.split('/').fold(dir.to_path_buf(), |acc, part| acc.join(part))
}

fn prune_empty_parents(root: &Path, file: &Path) -> std::io::Result<()> {
    let mut current = file.parent();
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        if std::fs::read_dir(dir)?.next().is_some() {
            break;
        }
        std::fs::remove_dir(dir)?;
        current = dir.parent();
    }
    Ok(())
}

/// Every non-dot file under `dir`, sorted.
fn walk_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut results = Vec::new();
    walk_inner(dir, &mut results)?;
    results.sort();
    Ok(results)
}

fn walk_inner(dir: &Path, acc: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk_inner(&path, acc)?;
        } else {
            acc.push(path);
        }
    }
    Ok(())
}
