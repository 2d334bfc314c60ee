//! # Metadata Decoder
//!
//! Single forward pass over the binary payload:
//!
//! ```text
//! header   := b"meta" version:u8
//! metadata := header types:Vec<type> modules:Vec<module>
//! ```
//!
//! The version byte selects the branch (revision 15 reads a docs list after
//! every descriptor, revision 14 does not). Type references are recorded as
//! `(id, offset)` pairs while reading and resolved against the finished
//! registry at the end, so an unresolved id is reported at the byte where
//! it was referenced. Nothing is returned unless the whole payload decodes.

use std::collections::BTreeSet;

use typegen_core::{DecodeError, DecodeErrorKind};

use crate::model::{
    CallDescriptor, ConstantDescriptor, EventDescriptor, Field, Metadata, ModuleDescriptor,
    Primitive, SchemaVersion, StorageEntry, StorageHasher, StorageItemDescriptor,
    StorageModifier, TypeDef, TypeDescriptor, TypeId, TypeParam, TypeRegistry, Variant,
};
use crate::reader::Reader;

/// Magic bytes every payload starts with.
pub const MAGIC: [u8; 4] = *b"meta";

/// Knobs for [`decode_metadata_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Accept references to type ids defined later in the payload.
    ///
    /// Recursive types need this. When disabled, a type counts as defined
    /// only once its whole descriptor has been read, so a self-referential
    /// type is rejected too.
    pub allow_forward_refs: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            allow_forward_refs: true,
        }
    }
}

impl DecodeOptions {
    /// Options that reject any reference to a type not yet defined.
    pub fn strict() -> Self {
        Self {
            allow_forward_refs: false,
        }
    }
}

/// Decode a payload with [`DecodeOptions::default`].
pub fn decode_metadata(bytes: &[u8]) -> Result<Metadata, DecodeError> {
    decode_metadata_with(bytes, DecodeOptions::default())
}

/// Decode a payload.
pub fn decode_metadata_with(bytes: &[u8], options: DecodeOptions) -> Result<Metadata, DecodeError> {
    let mut reader = Reader::new(bytes);
    let version = read_version(&mut reader)?;
    let metadata = Decoder {
        reader,
        version,
        options,
        defined: BTreeSet::new(),
        references: Vec::new(),
    }
    .run()?;
    tracing::debug!(
        version = %metadata.version,
        types = metadata.registry.len(),
        modules = metadata.modules.len(),
        bytes = bytes.len(),
        "decoded metadata"
    );
    Ok(metadata)
}

/// Validate the header and return the schema version it declares.
pub fn read_header(bytes: &[u8]) -> Result<SchemaVersion, DecodeError> {
    read_version(&mut Reader::new(bytes))
}

fn read_version(reader: &mut Reader<'_>) -> Result<SchemaVersion, DecodeError> {
    let magic = reader.take(MAGIC.len())?;
    if magic != MAGIC {
        let mut found = [0u8; 4];
        found.copy_from_slice(magic);
        return Err(DecodeError::new(0, DecodeErrorKind::BadMagic { found }));
    }
    let at = reader.offset();
    let byte = reader.read_u8()?;
    SchemaVersion::from_byte(byte)
        .ok_or_else(|| DecodeError::new(at, DecodeErrorKind::UnsupportedVersion(byte)))
}

struct Decoder<'a> {
    reader: Reader<'a>,
    version: SchemaVersion,
    options: DecodeOptions,
    defined: BTreeSet<TypeId>,
    references: Vec<(TypeId, usize)>,
}

impl Decoder<'_> {
    fn run(mut self) -> Result<Metadata, DecodeError> {
        let mut registry = TypeRegistry::new();
        let count = self.reader.read_len()?;
        for _ in 0..count {
            let ty = self.type_descriptor()?;
            self.defined.insert(ty.id);
            registry.insert(ty);
        }

        let modules = self.list(Self::module)?;

        let trailing = self.reader.remaining();
        if trailing > 0 {
            return Err(self.reader.error(DecodeErrorKind::TrailingBytes(trailing)));
        }

        if let Some(&(id, at)) = self
            .references
            .iter()
            .find(|(id, _)| !registry.contains(*id))
        {
            return Err(DecodeError::new(at, DecodeErrorKind::UnresolvedType(id)));
        }

        Ok(Metadata {
            version: self.version,
            registry,
            modules,
        })
    }

    // ── Combinators ─────────────────────────────────────────────────

    fn list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, DecodeError>,
    ) -> Result<Vec<T>, DecodeError> {
        let len = self.reader.read_len()?;
        let mut out = Vec::with_capacity(len.min(self.reader.remaining()));
        for _ in 0..len {
            out.push(item(self)?);
        }
        Ok(out)
    }

    fn docs(&mut self) -> Result<Vec<String>, DecodeError> {
        if self.version.has_docs() {
            self.reader.read_vec(Reader::read_str)
        } else {
            Ok(Vec::new())
        }
    }

    fn tag<T>(
        &mut self,
        context: &'static str,
        lookup: impl FnOnce(u8) -> Option<T>,
    ) -> Result<T, DecodeError> {
        let at = self.reader.offset();
        let tag = self.reader.read_u8()?;
        lookup(tag).ok_or_else(|| DecodeError::new(at, DecodeErrorKind::UnknownTag { context, tag }))
    }

    fn type_ref(&mut self) -> Result<TypeId, DecodeError> {
        let at = self.reader.offset();
        let id = self.reader.read_compact_u32()?;
        if !self.options.allow_forward_refs && !self.defined.contains(&id) {
            return Err(DecodeError::new(at, DecodeErrorKind::ForwardReference(id)));
        }
        self.references.push((id, at));
        Ok(id)
    }

    // ── Types ───────────────────────────────────────────────────────

    fn type_descriptor(&mut self) -> Result<TypeDescriptor, DecodeError> {
        let at = self.reader.offset();
        let id = self.reader.read_compact_u32()?;
        if self.defined.contains(&id) {
            return Err(DecodeError::new(at, DecodeErrorKind::DuplicateType(id)));
        }
        let path = self.reader.read_vec(Reader::read_str)?;
        let params = self.list(|d| {
            let name = d.reader.read_str()?;
            let ty = match d.tag("option", |t| (t <= 1).then_some(t))? {
                0 => None,
                _ => Some(d.type_ref()?),
            };
            Ok(TypeParam { name, ty })
        })?;
        let def = self.type_def()?;
        let docs = self.docs()?;
        Ok(TypeDescriptor {
            id,
            path,
            params,
            def,
            docs,
        })
    }

    fn type_def(&mut self) -> Result<TypeDef, DecodeError> {
        let at = self.reader.offset();
        let def = match self.reader.read_u8()? {
            0 => TypeDef::Composite {
                fields: self.list(Self::field)?,
            },
            1 => TypeDef::Variant {
                variants: self.list(Self::variant)?,
            },
            2 => TypeDef::Sequence {
                elem: self.type_ref()?,
            },
            3 => {
                let len = self.reader.read_u32_le()?;
                TypeDef::Array {
                    len,
                    elem: self.type_ref()?,
                }
            }
            4 => TypeDef::Tuple {
                elems: self.list(Self::type_ref)?,
            },
            5 => TypeDef::Primitive(self.tag("primitive", Primitive::from_tag)?),
            6 => TypeDef::Compact {
                inner: self.type_ref()?,
            },
            tag => {
                return Err(DecodeError::new(
                    at,
                    DecodeErrorKind::UnknownTag {
                        context: "type definition",
                        tag,
                    },
                ))
            }
        };
        Ok(def)
    }

    fn field(&mut self) -> Result<Field, DecodeError> {
        let name = self.reader.read_option(Reader::read_str)?;
        let ty = self.type_ref()?;
        let type_name = self.reader.read_option(Reader::read_str)?;
        let docs = self.docs()?;
        Ok(Field {
            name,
            ty,
            type_name,
            docs,
        })
    }

    fn variant(&mut self) -> Result<Variant, DecodeError> {
        let name = self.reader.read_str()?;
        let index = self.reader.read_u8()?;
        let fields = self.list(Self::field)?;
        let docs = self.docs()?;
        Ok(Variant {
            name,
            index,
            fields,
            docs,
        })
    }

    // ── Modules ─────────────────────────────────────────────────────

    fn module(&mut self) -> Result<ModuleDescriptor, DecodeError> {
        let name = self.reader.read_str()?;
        let index = self.reader.read_u8()?;
        let calls = self.list(|d| {
            let (name, index, args, docs) = d.indexed_item()?;
            Ok(CallDescriptor {
                name,
                index,
                args,
                docs,
            })
        })?;
        let events = self.list(|d| {
            let (name, index, fields, docs) = d.indexed_item()?;
            Ok(EventDescriptor {
                name,
                index,
                fields,
                docs,
            })
        })?;
        let storage = self.list(Self::storage_item)?;
        let constants = self.list(|d| {
            let name = d.reader.read_str()?;
            let ty = d.type_ref()?;
            let value = d.reader.read_bytes()?;
            let docs = d.docs()?;
            Ok(ConstantDescriptor {
                name,
                ty,
                value,
                docs,
            })
        })?;
        let docs = self.docs()?;
        tracing::trace!(module = %name, index, "decoded module");
        Ok(ModuleDescriptor {
            name,
            index,
            calls,
            events,
            storage,
            constants,
            docs,
        })
    }

    /// Calls and events share one layout: name, index, fields, docs.
    fn indexed_item(&mut self) -> Result<(String, u8, Vec<Field>, Vec<String>), DecodeError> {
        let name = self.reader.read_str()?;
        let index = self.reader.read_u8()?;
        let fields = self.list(Self::field)?;
        let docs = self.docs()?;
        Ok((name, index, fields, docs))
    }

    fn storage_item(&mut self) -> Result<StorageItemDescriptor, DecodeError> {
        let name = self.reader.read_str()?;
        let modifier = self.tag("storage modifier", StorageModifier::from_tag)?;
        let at = self.reader.offset();
        let entry = match self.reader.read_u8()? {
            0 => StorageEntry::Plain {
                value: self.type_ref()?,
            },
            1 => {
                let hasher = self.tag("storage hasher", StorageHasher::from_tag)?;
                let key = self.type_ref()?;
                let value = self.type_ref()?;
                StorageEntry::Map { hasher, key, value }
            }
            tag => {
                return Err(DecodeError::new(
                    at,
                    DecodeErrorKind::UnknownTag {
                        context: "storage entry",
                        tag,
                    },
                ))
            }
        };
        let default = self.reader.read_bytes()?;
        let docs = self.docs()?;
        Ok(StorageItemDescriptor {
            name,
            modifier,
            entry,
            default,
            docs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_magic_is_reported_at_zero() {
        let err = read_header(b"atem\x0f").unwrap_err();
        assert_eq!(err.offset, 0);
        assert_eq!(err.kind, DecodeErrorKind::BadMagic { found: *b"atem" });
    }

    #[test]
    fn unsupported_version_points_at_version_byte() {
        let err = read_header(b"meta\x0d").unwrap_err();
        assert_eq!(err.offset, 4);
        assert_eq!(err.kind, DecodeErrorKind::UnsupportedVersion(13));
    }

    #[test]
    fn header_only_is_truncated() {
        let err = decode_metadata(b"meta\x0e").unwrap_err();
        assert_eq!(err.offset, 5);
        assert!(matches!(err.kind, DecodeErrorKind::UnexpectedEof { .. }));
    }

    #[test]
    fn empty_metadata_decodes() {
        let metadata = decode_metadata(b"meta\x0f\x00\x00").unwrap();
        assert_eq!(metadata.version, SchemaVersion::V15);
        assert!(metadata.registry.is_empty());
        assert!(metadata.modules.is_empty());
    }

    #[test]
    fn single_primitive_decodes() {
        // one type: id 0, no path, no params, primitive u32
        let bytes = b"meta\x0e\x04\x00\x00\x00\x05\x05\x00";
        let metadata = decode_metadata(bytes).unwrap();
        assert_eq!(
            metadata.registry.get(0).map(|t| &t.def),
            Some(&TypeDef::Primitive(Primitive::U32))
        );
    }

    #[test]
    fn unknown_primitive_tag() {
        let bytes = b"meta\x0e\x04\x00\x00\x00\x05\x63\x00";
        let err = decode_metadata(bytes).unwrap_err();
        assert_eq!(err.offset, 10);
        assert_eq!(
            err.kind,
            DecodeErrorKind::UnknownTag {
                context: "primitive",
                tag: 0x63
            }
        );
    }

    #[test]
    fn strict_options_reject_self_reference() {
        // id 0 is a sequence of itself
        let bytes = b"meta\x0e\x04\x00\x00\x00\x02\x00\x00";
        assert!(decode_metadata(bytes).is_ok());
        let err = decode_metadata_with(bytes, DecodeOptions::strict()).unwrap_err();
        assert_eq!(err.offset, 10);
        assert_eq!(err.kind, DecodeErrorKind::ForwardReference(0));
    }
}
