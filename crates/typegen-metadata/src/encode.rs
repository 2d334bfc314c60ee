//! Metadata encoder.
//!
//! The exact inverse of [`crate::decode_metadata`]. Nodes produce the real
//! payloads; this exists to build fixtures and cache files from an
//! in-memory [`Metadata`].

use crate::decode::MAGIC;
use crate::model::{
    Field, Metadata, ModuleDescriptor, StorageEntry, StorageItemDescriptor, TypeDef,
    TypeDescriptor,
};

/// Encode `metadata` in the revision named by `metadata.version`.
///
/// Documentation strings are dropped when the revision carries none.
pub fn encode_metadata(metadata: &Metadata) -> Vec<u8> {
    let mut w = Writer {
        out: Vec::new(),
        docs: metadata.version.has_docs(),
    };
    w.out.extend_from_slice(&MAGIC);
    w.out.push(metadata.version.as_u8());
    w.compact(metadata.registry.len() as u128);
    for ty in metadata.registry.iter() {
        w.type_descriptor(ty);
    }
    w.compact(metadata.modules.len() as u128);
    for module in &metadata.modules {
        w.module(module);
    }
    w.out
}

/// Append the SCALE compact encoding of `value` to `out`.
pub fn write_compact(out: &mut Vec<u8>, value: u128) {
    if value < 1 << 6 {
        out.push((value as u8) << 2);
    } else if value < 1 << 14 {
        out.extend_from_slice(&(((value as u16) << 2) | 0b01).to_le_bytes());
    } else if value < 1 << 30 {
        out.extend_from_slice(&(((value as u32) << 2) | 0b10).to_le_bytes());
    } else {
        let bytes = value.to_le_bytes();
        let len = bytes.iter().rposition(|b| *b != 0).map_or(1, |i| i + 1).max(4);
        out.push((((len - 4) as u8) << 2) | 0b11);
        out.extend_from_slice(&bytes[..len]);
    }
}

struct Writer {
    out: Vec<u8>,
    docs: bool,
}

impl Writer {
    fn compact(&mut self, value: u128) {
        write_compact(&mut self.out, value);
    }

    fn str(&mut self, s: &str) {
        self.bytes(s.as_bytes());
    }

    fn bytes(&mut self, b: &[u8]) {
        self.compact(b.len() as u128);
        self.out.extend_from_slice(b);
    }

    fn opt_str(&mut self, s: Option<&str>) {
        match s {
            None => self.out.push(0),
            Some(s) => {
                self.out.push(1);
                self.str(s);
            }
        }
    }

    fn strs(&mut self, items: &[String]) {
        self.compact(items.len() as u128);
        for s in items {
            self.str(s);
        }
    }

    fn docs(&mut self, docs: &[String]) {
        if self.docs {
            self.strs(docs);
        }
    }

    fn type_descriptor(&mut self, ty: &TypeDescriptor) {
        self.compact(u128::from(ty.id));
        self.strs(&ty.path);
        self.compact(ty.params.len() as u128);
        for param in &ty.params {
            self.str(&param.name);
            match param.ty {
                None => self.out.push(0),
                Some(id) => {
                    self.out.push(1);
                    self.compact(u128::from(id));
                }
            }
        }
        self.out.push(ty.def.tag());
        match &ty.def {
            TypeDef::Composite { fields } => self.fields(fields),
            TypeDef::Variant { variants } => {
                self.compact(variants.len() as u128);
                for v in variants {
                    self.str(&v.name);
                    self.out.push(v.index);
                    self.fields(&v.fields);
                    self.docs(&v.docs);
                }
            }
            TypeDef::Sequence { elem } => self.compact(u128::from(*elem)),
            TypeDef::Array { len, elem } => {
                self.out.extend_from_slice(&len.to_le_bytes());
                self.compact(u128::from(*elem));
            }
            TypeDef::Tuple { elems } => {
                self.compact(elems.len() as u128);
                for e in elems {
                    self.compact(u128::from(*e));
                }
            }
            TypeDef::Primitive(p) => self.out.push(p.tag()),
            TypeDef::Compact { inner } => self.compact(u128::from(*inner)),
        }
        self.docs(&ty.docs);
    }

    fn fields(&mut self, fields: &[Field]) {
        self.compact(fields.len() as u128);
        for f in fields {
            self.opt_str(f.name.as_deref());
            self.compact(u128::from(f.ty));
            self.opt_str(f.type_name.as_deref());
            self.docs(&f.docs);
        }
    }

    fn module(&mut self, module: &ModuleDescriptor) {
        self.str(&module.name);
        self.out.push(module.index);
        self.compact(module.calls.len() as u128);
        for call in &module.calls {
            self.str(&call.name);
            self.out.push(call.index);
            self.fields(&call.args);
            self.docs(&call.docs);
        }
        self.compact(module.events.len() as u128);
        for event in &module.events {
            self.str(&event.name);
            self.out.push(event.index);
            self.fields(&event.fields);
            self.docs(&event.docs);
        }
        self.compact(module.storage.len() as u128);
        for item in &module.storage {
            self.storage_item(item);
        }
        self.compact(module.constants.len() as u128);
        for constant in &module.constants {
            self.str(&constant.name);
            self.compact(u128::from(constant.ty));
            self.bytes(&constant.value);
            self.docs(&constant.docs);
        }
        self.docs(&module.docs);
    }

    fn storage_item(&mut self, item: &StorageItemDescriptor) {
        self.str(&item.name);
        self.out.push(item.modifier.tag());
        match item.entry {
            StorageEntry::Plain { value } => {
                self.out.push(0);
                self.compact(u128::from(value));
            }
            StorageEntry::Map { hasher, key, value } => {
                self.out.push(1);
                self.out.push(hasher.tag());
                self.compact(u128::from(key));
                self.compact(u128::from(value));
            }
        }
        self.bytes(&item.default);
        self.docs(&item.docs);
    }
}
