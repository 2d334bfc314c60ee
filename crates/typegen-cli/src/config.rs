//! # Configuration
//!
//! `typegen.yaml` at the project root, overridden by `TYPEGEN_*` environment
//! variables, overridden in turn by command-line flags.
//!
//! ```yaml
//! endpoint: http://127.0.0.1:9944
//! namespace: madara
//! target_dir: src/bindings
//! package:
//!   name: "@madara/types"
//!   version: 0.3.1
//! build:
//!   compile_command: tsc -p tsconfig.json
//!   publish_command: npm publish --access public
//! dependencies:
//!   typescript: 5.4.5
//! overrides:
//!   typescript: 5.4.5
//! ```
//!
//! Relative paths are resolved against the project root.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use typegen_rpc::{RpcConfig, DEFAULT_CACHE_FILE};

/// Configuration file looked up at the project root.
pub const CONFIG_FILE: &str = "typegen.yaml";

const DEFAULT_NAMESPACE: &str = "madara";
const DEFAULT_TARGET_DIR: &str = "bindings";
const DEFAULT_LOCK_FILE: &str = "typegen.lock";

/// `typegen.yaml` as written by the user. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Node JSON-RPC endpoint.
    pub endpoint: Option<String>,
    /// Namespace the bindings are generated for.
    pub namespace: Option<String>,
    /// Parent of the per-namespace binding directories.
    pub target_dir: Option<PathBuf>,
    /// Where the last fetched payload is kept.
    pub cache_file: Option<PathBuf>,
    /// Fetch timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Path of the version lock.
    pub lock_file: Option<PathBuf>,
    /// Package identity.
    pub package: PackageConfig,
    /// Build and publish commands.
    pub build: BuildConfig,
    /// Pinned dependency versions.
    pub dependencies: BTreeMap<String, String>,
    /// Versions that replace entries in `dependencies`.
    pub overrides: BTreeMap<String, String>,
}

/// Identity of the published bindings package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
    /// Defaults to `<namespace>-types`.
    pub name: Option<String>,
    /// Defaults to `0.0.0`.
    pub version: Option<String>,
}

/// External commands and output directories of the build driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Shell command run from the project root before packaging.
    pub compile_command: Option<String>,
    /// Shell command run inside the staged package.
    pub publish_command: Option<String>,
    /// Defaults to `build`.
    pub build_dir: Option<PathBuf>,
    /// Defaults to `dist`.
    pub dist_dir: Option<PathBuf>,
}

/// Values taken from global command-line flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--config`
    pub config: Option<PathBuf>,
    /// `--endpoint`
    pub endpoint: Option<String>,
    /// `--namespace`
    pub namespace: Option<String>,
    /// `--target-dir`
    pub target_dir: Option<PathBuf>,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Project root; every relative path below is resolved against it.
    pub root: PathBuf,
    /// Node JSON-RPC endpoint.
    pub endpoint: String,
    /// Namespace the bindings are generated for.
    pub namespace: String,
    /// Parent of the per-namespace binding directories.
    pub target_dir: PathBuf,
    /// Cached metadata payload.
    pub cache_file: PathBuf,
    /// Fetch timeout in seconds.
    pub timeout_secs: u64,
    /// Version lock path.
    pub lock_file: PathBuf,
    /// Package name, `<namespace>-types` unless configured.
    pub package_name: String,
    /// Package version, `0.0.0` unless configured.
    pub package_version: String,
    /// Compile command, if any.
    pub compile_command: Option<String>,
    /// Publish command, if any.
    pub publish_command: Option<String>,
    /// Where built packages are assembled.
    pub build_dir: PathBuf,
    /// Where packages are staged for publication.
    pub dist_dir: PathBuf,
    /// Pinned dependency versions.
    pub dependencies: BTreeMap<String, String>,
    /// Versions that replace entries in `dependencies`.
    pub overrides: BTreeMap<String, String>,
}

impl Settings {
    /// Resolve settings for the project at `root`.
    ///
    /// `env` looks up environment variables; the binary passes
    /// `|k| std::env::var(k).ok()`.
    pub fn load(
        root: &Path,
        flags: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let file = match &flags.config {
            Some(path) => {
                let path = crate::resolve_path(path, root);
                if !path.is_file() {
                    bail!("config file not found: {}", path.display());
                }
                read_config(&path)?
            }
            None => {
                let path = root.join(CONFIG_FILE);
                if path.is_file() {
                    read_config(&path)?
                } else {
                    tracing::debug!(root = %root.display(), "no {CONFIG_FILE}; using defaults");
                    FileConfig::default()
                }
            }
        };
        Self::resolve(root, file, flags, env)
    }

    fn resolve(
        root: &Path,
        file: FileConfig,
        flags: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let endpoint = flags
            .endpoint
            .clone()
            .or_else(|| env("TYPEGEN_ENDPOINT"))
            .or(file.endpoint)
            .unwrap_or_else(|| typegen_rpc::config::DEFAULT_ENDPOINT.to_string());

        let namespace = flags
            .namespace
            .clone()
            .or_else(|| env("TYPEGEN_NAMESPACE"))
            .or(file.namespace)
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        validate_namespace(&namespace)?;

        let target_dir = flags
            .target_dir
            .clone()
            .or_else(|| env("TYPEGEN_TARGET_DIR").map(PathBuf::from))
            .or(file.target_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TARGET_DIR));

        let cache_file = env("TYPEGEN_CACHE_FILE")
            .map(PathBuf::from)
            .or(file.cache_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FILE));

        let timeout_secs = match env("TYPEGEN_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("TYPEGEN_TIMEOUT_SECS is not a number: {raw}"))?,
            None => file
                .timeout_secs
                .unwrap_or(typegen_rpc::config::DEFAULT_TIMEOUT_SECS),
        };
        if timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }

        let package_name = file
            .package
            .name
            .unwrap_or_else(|| format!("{namespace}-types"));
        let package_version = file.package.version.unwrap_or_else(|| "0.0.0".to_string());

        let settings = Self {
            target_dir: root.join(target_dir),
            cache_file: root.join(cache_file),
            lock_file: root.join(file.lock_file.unwrap_or_else(|| PathBuf::from(DEFAULT_LOCK_FILE))),
            build_dir: root.join(file.build.build_dir.unwrap_or_else(|| PathBuf::from("build"))),
            dist_dir: root.join(file.build.dist_dir.unwrap_or_else(|| PathBuf::from("dist"))),
            compile_command: file.build.compile_command,
            publish_command: file.build.publish_command,
            root: root.to_path_buf(),
            endpoint,
            namespace,
            timeout_secs,
            package_name,
            package_version,
            dependencies: file.dependencies,
            overrides: file.overrides,
        };
        // Fail on a bad endpoint here rather than after a decode.
        settings.rpc_config()?;
        Ok(settings)
    }

    /// Directory the namespace's artifacts live in.
    pub fn namespace_dir(&self) -> PathBuf {
        self.target_dir.join(&self.namespace)
    }

    /// Fetcher configuration.
    pub fn rpc_config(&self) -> Result<RpcConfig> {
        RpcConfig::new(&self.endpoint, self.timeout_secs)
            .with_context(|| format!("invalid endpoint: {}", self.endpoint))
    }

    /// Every pinned dependency; `overrides` win over `dependencies`.
    pub fn pinned_dependencies(&self) -> BTreeMap<String, String> {
        let mut pinned = self.dependencies.clone();
        pinned.extend(self.overrides.clone());
        pinned
    }
}

fn read_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse config: {}", path.display()))
}

/// A namespace becomes a directory name; keep it to one plain path segment.
fn validate_namespace(namespace: &str) -> Result<()> {
    let ok = !namespace.is_empty()
        && namespace != "."
        && namespace != ".."
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !ok {
        bail!("invalid namespace '{namespace}': use ASCII letters, digits, '-', '_' or '.'");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(dir.path(), &Overrides::default(), no_env).unwrap();
        assert_eq!(s.endpoint, "http://127.0.0.1:9944");
        assert_eq!(s.namespace, "madara");
        assert_eq!(s.namespace_dir(), dir.path().join("bindings").join("madara"));
        assert_eq!(s.cache_file, dir.path().join(".typegen/metadata.scale"));
        assert_eq!(s.lock_file, dir.path().join("typegen.lock"));
        assert_eq!(s.package_name, "madara-types");
        assert_eq!(s.package_version, "0.0.0");
        assert_eq!(s.timeout_secs, 30);
        assert!(s.compile_command.is_none());
    }

    #[test]
    fn file_then_env_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "endpoint: http://node:9944\nnamespace: from_file\ntarget_dir: gen\ntimeout_secs: 12\n",
        )
        .unwrap();

        let s = Settings::load(dir.path(), &Overrides::default(), no_env).unwrap();
        assert_eq!(s.endpoint, "http://node:9944");
        assert_eq!(s.namespace, "from_file");
        assert_eq!(s.timeout_secs, 12);

        let env = |k: &str| match k {
            "TYPEGEN_NAMESPACE" => Some("from_env".to_string()),
            "TYPEGEN_TIMEOUT_SECS" => Some("7".to_string()),
            _ => None,
        };
        let s = Settings::load(dir.path(), &Overrides::default(), env).unwrap();
        assert_eq!(s.namespace, "from_env");
        assert_eq!(s.endpoint, "http://node:9944");
        assert_eq!(s.timeout_secs, 7);

        let flags = Overrides {
            namespace: Some("from_flag".into()),
            target_dir: Some("out".into()),
            ..Overrides::default()
        };
        let s = Settings::load(dir.path(), &flags, env).unwrap();
        assert_eq!(s.namespace, "from_flag");
        assert_eq!(s.namespace_dir(), dir.path().join("out").join("from_flag"));
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let flags = Overrides {
            config: Some("missing.yaml".into()),
            ..Overrides::default()
        };
        let err = Settings::load(dir.path(), &flags, no_env).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "endpiont: http://x\n").unwrap();
        assert!(Settings::load(dir.path(), &Overrides::default(), no_env).is_err());
    }

    #[test]
    fn bad_endpoint_and_namespace_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let flags = Overrides {
            endpoint: Some("ws://127.0.0.1:9944".into()),
            ..Overrides::default()
        };
        assert!(Settings::load(dir.path(), &flags, no_env).is_err());

        let flags = Overrides {
            namespace: Some("../escape".into()),
            ..Overrides::default()
        };
        let err = Settings::load(dir.path(), &flags, no_env).unwrap_err();
        assert!(err.to_string().contains("invalid namespace"));
    }

    #[test]
    fn overrides_win_over_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "dependencies:\n  typescript: 5.3.0\n  zod: 3.22.4\noverrides:\n  typescript: 5.4.5\n",
        )
        .unwrap();
        let s = Settings::load(dir.path(), &Overrides::default(), no_env).unwrap();
        let pinned = s.pinned_dependencies();
        assert_eq!(pinned["typescript"], "5.4.5");
        assert_eq!(pinned["zod"], "3.22.4");
    }

    #[test]
    fn empty_config_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "\n").unwrap();
        let s = Settings::load(dir.path(), &Overrides::default(), no_env).unwrap();
        assert_eq!(s.namespace, "madara");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let env = |k: &str| (k == "TYPEGEN_TIMEOUT_SECS").then(|| "0".to_string());
        assert!(Settings::load(dir.path(), &Overrides::default(), env).is_err());
    }
}
