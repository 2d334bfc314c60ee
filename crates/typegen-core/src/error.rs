//! # Error Hierarchy
//!
//! Structured error types for the generator pipeline, built with `thiserror`.
//!
//! Every stage reports through a dedicated type that carries enough context
//! to act on without re-running: the decoder reports the byte offset, the
//! emitter the colliding or dangling names, the freshness verifier every
//! artifact that drifted.

use thiserror::Error;

/// Top-level error type for the pipeline stages that live below the CLI.
#[derive(Error, Debug)]
pub enum TypegenError {
    /// The metadata payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Artifacts could not be emitted from the decoded registry.
    #[error("emit error: {0}")]
    Emit(#[from] EmitError),

    /// Committed bindings differ from freshly emitted ones.
    #[error("stale bindings: {0}")]
    StaleBinding(#[from] StaleBindingError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// A metadata decoding failure, positioned at the byte where it was detected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("at byte offset {offset}: {kind}")]
pub struct DecodeError {
    /// Offset into the raw payload (including the header).
    pub offset: usize,
    /// What went wrong.
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    /// Construct a decode error at `offset`.
    pub fn new(offset: usize, kind: DecodeErrorKind) -> Self {
        Self { offset, kind }
    }
}

/// The specific reason a decode failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The payload ended before a complete item was read.
    #[error("unexpected end of input: needed {needed} more byte(s), {remaining} remaining")]
    UnexpectedEof {
        /// Bytes required by the item being read.
        needed: usize,
        /// Bytes left in the payload.
        remaining: usize,
    },

    /// The payload does not start with the `meta` magic.
    #[error("bad magic {found:02x?} (expected \"meta\")")]
    BadMagic {
        /// The four bytes found instead.
        found: [u8; 4],
    },

    /// The header names a schema version this decoder has no branch for.
    #[error("unsupported schema version {0}")]
    UnsupportedVersion(u8),

    /// A discriminant byte did not match any known variant.
    #[error("unknown {context} tag {tag:#04x}")]
    UnknownTag {
        /// Which discriminated item was being read.
        context: &'static str,
        /// The tag byte found.
        tag: u8,
    },

    /// A string field held invalid UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// A compact integer does not fit the target width.
    #[error("compact integer overflows {target}")]
    IntegerOverflow {
        /// Name of the target integer type.
        target: &'static str,
    },

    /// Two type descriptors carry the same id.
    #[error("type id {0} is defined more than once")]
    DuplicateType(u32),

    /// A type id was referenced before being defined while forward
    /// references are disallowed.
    #[error("type id {0} referenced before its definition")]
    ForwardReference(u32),

    /// A type id was referenced but never defined.
    #[error("type id {0} is not present in the registry")]
    UnresolvedType(u32),

    /// Bytes remain after the last module descriptor.
    #[error("{0} trailing byte(s) after metadata")]
    TrailingBytes(usize),
}

/// Errors while turning a registry into artifacts.
#[derive(Error, Debug)]
pub enum EmitError {
    /// Two descriptors map to the same artifact name.
    #[error("artifact name collision on {name}: produced by both {first} and {second}")]
    NameCollision {
        /// The artifact name both descriptors produced.
        name: String,
        /// The descriptor that claimed the name first.
        first: String,
        /// The descriptor that tried to claim it again.
        second: String,
    },

    /// A descriptor references a type id missing from the registry.
    #[error("type id {id} referenced by {referenced_by} is not present in the registry")]
    UnresolvedType {
        /// The dangling id.
        id: u32,
        /// The descriptor holding the reference.
        referenced_by: String,
    },

    /// An anonymous type's generated name would depend on itself.
    #[error("anonymous type {id} is self-referential and cannot be named")]
    CyclicName {
        /// The id whose name could not be derived.
        id: u32,
    },

    /// A generated name nests more anonymous types than allowed.
    #[error("name of type {id} nests more than {limit} anonymous types")]
    NameTooDeep {
        /// The id being named when the limit was hit.
        id: u32,
        /// The nesting limit.
        limit: usize,
    },

    /// Writing into the output buffer failed.
    #[error("render failed: {0}")]
    Render(#[from] std::fmt::Error),
}

/// Committed bindings do not match what the current metadata produces.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "{} modified, {} removed, {} added (modified: [{}], removed: [{}], added: [{}])",
    .modified.len(),
    .removed.len(),
    .added.len(),
    .modified.join(", "),
    .removed.join(", "),
    .added.join(", ")
)]
pub struct StaleBindingError {
    /// Artifacts whose committed contents differ.
    pub modified: Vec<String>,
    /// Committed artifacts the metadata no longer produces.
    pub removed: Vec<String>,
    /// Artifacts the metadata produces that were never committed.
    pub added: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_display_carries_offset() {
        let err = DecodeError::new(
            17,
            DecodeErrorKind::UnexpectedEof {
                needed: 4,
                remaining: 1,
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("offset 17"));
        assert!(msg.contains("needed 4"));
    }

    #[test]
    fn unknown_tag_display() {
        let err = DecodeError::new(
            9,
            DecodeErrorKind::UnknownTag {
                context: "type definition",
                tag: 0x2a,
            },
        );
        assert!(err.to_string().contains("unknown type definition tag 0x2a"));
    }

    #[test]
    fn bad_magic_display() {
        let kind = DecodeErrorKind::BadMagic { found: *b"nope" };
        assert!(kind.to_string().contains("bad magic"));
    }

    #[test]
    fn emit_collision_display_names_both_sources() {
        let err = EmitError::NameCollision {
            name: "types/Foo.ts".to_string(),
            first: "type #1 (a::Foo)".to_string(),
            second: "type #7 (b::Foo)".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("types/Foo.ts"));
        assert!(msg.contains("a::Foo"));
        assert!(msg.contains("b::Foo"));
    }

    #[test]
    fn stale_binding_lists_every_drifted_artifact() {
        let err = StaleBindingError {
            modified: vec!["types/Foo.ts".to_string()],
            removed: vec!["types/Old.ts".to_string()],
            added: vec![],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("1 modified, 1 removed, 0 added"));
        assert!(msg.contains("types/Foo.ts"));
        assert!(msg.contains("types/Old.ts"));
    }

    #[test]
    fn typegen_error_wraps_sources() {
        let err: TypegenError = DecodeError::new(0, DecodeErrorKind::UnsupportedVersion(9)).into();
        assert!(err.to_string().starts_with("decode error:"));
        let err: TypegenError = EmitError::CyclicName { id: 3 }.into();
        assert!(err.to_string().contains("self-referential"));
    }
}
