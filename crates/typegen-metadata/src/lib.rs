//! # typegen-metadata -- Schema Model and Codec
//!
//! Decodes the node's self-describing metadata payload into a
//! [`TypeRegistry`] and an ordered list of [`ModuleDescriptor`]s.
//!
//! ## Guarantees
//!
//! - Decoding is all-or-nothing: on any error no registry is returned.
//! - Every [`DecodeError`](typegen_core::DecodeError) carries the byte
//!   offset at which the problem was detected.
//! - Every type reference in a successfully decoded payload resolves.
//! - [`encode_metadata`] is the exact inverse of [`decode_metadata`].

pub mod decode;
pub mod encode;
pub mod model;
mod reader;

pub use decode::{decode_metadata, decode_metadata_with, read_header, DecodeOptions, MAGIC};
pub use encode::{encode_metadata, write_compact};
pub use model::{
    CallDescriptor, ConstantDescriptor, EventDescriptor, Field, Metadata, ModuleDescriptor,
    Primitive, SchemaVersion, StorageEntry, StorageHasher, StorageItemDescriptor,
    StorageModifier, TypeDef, TypeDescriptor, TypeId, TypeParam, TypeRegistry, Variant,
};
