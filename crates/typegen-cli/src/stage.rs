//! Pipeline stages and their exit codes.
//!
//! Every failure is attached to the stage it happened in with
//! `.context(Stage::X)`. The binary recovers the stage from the error chain
//! with [`Stage::of`] and exits with [`Stage::exit_code`].

use std::fmt;

/// A step of the generate/check/build/publish pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Reading `typegen.yaml`, environment and flags.
    Config,
    /// Fetching metadata from the node or reading the cached copy.
    Fetch,
    /// Decoding the metadata payload.
    Decode,
    /// Emitting artifacts.
    Emit,
    /// Comparing or writing committed bindings.
    Verify,
    /// Writing or checking the version lock.
    Lock,
    /// Compiling and packaging the bindings.
    Build,
    /// Staging the package for publication.
    Publish,
}

impl Stage {
    /// Process exit code reported when this stage fails.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Config => 2,
            Self::Fetch => 3,
            Self::Decode => 4,
            Self::Emit => 5,
            Self::Verify => 6,
            Self::Lock => 7,
            Self::Build => 8,
            Self::Publish => 9,
        }
    }

    /// Lowercase stage name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Fetch => "fetch",
            Self::Decode => "decode",
            Self::Emit => "emit",
            Self::Verify => "verify",
            Self::Lock => "lock",
            Self::Build => "build",
            Self::Publish => "publish",
        }
    }

    /// The stage an error was attached to, if any.
    pub fn of(err: &anyhow::Error) -> Option<Self> {
        err.downcast_ref::<Self>().copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stage failed", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn exit_codes_are_distinct_and_nonzero() {
        let all = [
            Stage::Config,
            Stage::Fetch,
            Stage::Decode,
            Stage::Emit,
            Stage::Verify,
            Stage::Lock,
            Stage::Build,
            Stage::Publish,
        ];
        let codes: std::collections::BTreeSet<u8> = all.iter().map(|s| s.exit_code()).collect();
        assert_eq!(codes.len(), all.len());
        assert!(!codes.contains(&0));
        assert!(!codes.contains(&1));
    }

    #[test]
    fn stage_is_recovered_from_context() {
        let err: anyhow::Error = Err::<(), _>(anyhow!("connection refused"))
            .context(Stage::Fetch)
            .unwrap_err();
        assert_eq!(Stage::of(&err), Some(Stage::Fetch));
        assert_eq!(format!("{err:#}"), "fetch stage failed: connection refused");
    }

    #[test]
    fn stage_survives_outer_context() {
        let err = anyhow!("bad tag")
            .context(Stage::Decode)
            .context("while checking bindings");
        assert_eq!(Stage::of(&err), Some(Stage::Decode));
    }

    #[test]
    fn plain_error_has_no_stage() {
        assert_eq!(Stage::of(&anyhow!("boom")), None);
    }
}
