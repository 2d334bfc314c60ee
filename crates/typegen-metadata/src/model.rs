//! # Metadata Model
//!
//! In-memory form of the node's self-describing schema: a [`TypeRegistry`]
//! of [`TypeDescriptor`]s keyed by numeric id, and an ordered list of
//! [`ModuleDescriptor`]s whose calls, events, storage items and constants
//! refer into that registry by id.
//!
//! Type references are stored as ids, never inlined, so a type used by a
//! hundred fields is described once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Numeric id of a type in the [`TypeRegistry`].
pub type TypeId = u32;

/// Encoding revision of a metadata payload, read from its header.
///
/// The version selects the decoder branch: revision 15 adds documentation
/// strings to every descriptor, revision 14 carries none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaVersion(u8);

impl SchemaVersion {
    /// Revision without documentation strings.
    pub const V14: Self = Self(14);
    /// Revision with documentation strings on every descriptor.
    pub const V15: Self = Self(15);

    /// Every revision this crate can decode, oldest first.
    pub const SUPPORTED: [Self; 2] = [Self::V14, Self::V15];

    /// Look up a supported version by its header byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::SUPPORTED.into_iter().find(|v| v.0 == byte)
    }

    /// The header byte.
    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// Whether descriptors in this revision carry documentation strings.
    pub fn has_docs(self) -> bool {
        self >= Self::V15
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A fully decoded metadata payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Encoding revision the payload was read with.
    pub version: SchemaVersion,
    /// Every type the payload describes.
    pub registry: TypeRegistry,
    /// Modules in payload order.
    pub modules: Vec<ModuleDescriptor>,
}

/// Mapping from type id to descriptor, iterated in ascending id order.
///
/// Built once per generation run and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRegistry {
    types: BTreeMap<TypeId, TypeDescriptor>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor, returning the one previously stored under the
    /// same id.
    pub fn insert(&mut self, ty: TypeDescriptor) -> Option<TypeDescriptor> {
        self.types.insert(ty.id, ty)
    }

    /// Resolve an id.
    pub fn get(&self, id: TypeId) -> Option<&TypeDescriptor> {
        self.types.get(&id)
    }

    /// Whether `id` is defined.
    pub fn contains(&self, id: TypeId) -> bool {
        self.types.contains_key(&id)
    }

    /// Descriptors in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Find the first reference to an id that is not in the registry.
    ///
    /// Returns `(referencing type id, missing id)`.
    pub fn first_dangling_reference(&self) -> Option<(TypeId, TypeId)> {
        self.iter().find_map(|ty| {
            ty.references()
                .into_iter()
                .find(|r| !self.contains(*r))
                .map(|missing| (ty.id, missing))
        })
    }
}

impl FromIterator<TypeDescriptor> for TypeRegistry {
    fn from_iter<I: IntoIterator<Item = TypeDescriptor>>(iter: I) -> Self {
        let mut registry = Self::new();
        for ty in iter {
            registry.insert(ty);
        }
        registry
    }
}

/// One type in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Registry id.
    pub id: TypeId,
    /// Namespace segments; the last one is the type's name. Empty for
    /// anonymous types (sequences, tuples, primitives...).
    pub path: Vec<String>,
    /// Generic parameters.
    pub params: Vec<TypeParam>,
    /// Shape of the type.
    pub def: TypeDef,
    /// Documentation lines (revision 15+).
    pub docs: Vec<String>,
}

impl TypeDescriptor {
    /// An anonymous descriptor with no params or docs.
    pub fn new(id: TypeId, def: TypeDef) -> Self {
        Self {
            id,
            path: Vec::new(),
            params: Vec::new(),
            def,
            docs: Vec::new(),
        }
    }

    /// A primitive descriptor.
    pub fn primitive(id: TypeId, primitive: Primitive) -> Self {
        Self::new(id, TypeDef::Primitive(primitive))
    }

    /// Set the namespace path, e.g. `["pallet_balances", "AccountData"]`.
    pub fn with_path<S: Into<String>>(mut self, path: impl IntoIterator<Item = S>) -> Self {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }

    /// Add a bound generic parameter.
    pub fn with_param(mut self, name: impl Into<String>, ty: Option<TypeId>) -> Self {
        self.params.push(TypeParam {
            name: name.into(),
            ty,
        });
        self
    }

    /// Set documentation lines.
    pub fn with_docs<S: Into<String>>(mut self, docs: impl IntoIterator<Item = S>) -> Self {
        self.docs = docs.into_iter().map(Into::into).collect();
        self
    }

    /// `a::b::Name` form of the path, or `None` for anonymous types.
    pub fn qualified_name(&self) -> Option<String> {
        if self.path.is_empty() {
            None
        } else {
            Some(self.path.join("::"))
        }
    }

    /// Every type id this descriptor refers to, in declaration order.
    pub fn references(&self) -> Vec<TypeId> {
        let mut refs: Vec<TypeId> = self.params.iter().filter_map(|p| p.ty).collect();
        refs.extend(self.def.references());
        refs
    }
}

/// A generic parameter of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParam {
    /// Parameter name as declared, e.g. `T`.
    pub name: String,
    /// Bound type, if the parameter is concrete.
    pub ty: Option<TypeId>,
}

/// The shape of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeDef {
    /// Struct with named or positional fields.
    Composite {
        /// Fields in declaration order.
        fields: Vec<Field>,
    },
    /// Enum whose variants may carry fields.
    Variant {
        /// Variants in declaration order.
        variants: Vec<Variant>,
    },
    /// Variable-length sequence.
    Sequence {
        /// Element type.
        elem: TypeId,
    },
    /// Fixed-length array.
    Array {
        /// Element count.
        len: u32,
        /// Element type.
        elem: TypeId,
    },
    /// Anonymous tuple; the empty tuple is the unit type.
    Tuple {
        /// Element types in order.
        elems: Vec<TypeId>,
    },
    /// Built-in scalar.
    Primitive(Primitive),
    /// Compact-encoded integer wrapping `inner`.
    Compact {
        /// The integer type being compacted.
        inner: TypeId,
    },
}

impl TypeDef {
    /// Wire tag of this definition kind.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Composite { .. } => 0,
            Self::Variant { .. } => 1,
            Self::Sequence { .. } => 2,
            Self::Array { .. } => 3,
            Self::Tuple { .. } => 4,
            Self::Primitive(_) => 5,
            Self::Compact { .. } => 6,
        }
    }

    /// Every type id this definition refers to, in declaration order.
    pub fn references(&self) -> Vec<TypeId> {
        match self {
            Self::Composite { fields } => fields.iter().map(|f| f.ty).collect(),
            Self::Variant { variants } => variants
                .iter()
                .flat_map(|v| v.fields.iter().map(|f| f.ty))
                .collect(),
            Self::Sequence { elem } | Self::Array { elem, .. } => vec![*elem],
            Self::Tuple { elems } => elems.clone(),
            Self::Primitive(_) => Vec::new(),
            Self::Compact { inner } => vec![*inner],
        }
    }
}

/// A struct, variant, call or event field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name; `None` for positional fields.
    pub name: Option<String>,
    /// Field type.
    pub ty: TypeId,
    /// Source-level type name as written by the node's authors.
    pub type_name: Option<String>,
    /// Documentation lines (revision 15+).
    pub docs: Vec<String>,
}

impl Field {
    /// A named field.
    pub fn named(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            name: Some(name.into()),
            ty,
            type_name: None,
            docs: Vec::new(),
        }
    }

    /// A positional field.
    pub fn unnamed(ty: TypeId) -> Self {
        Self {
            name: None,
            ty,
            type_name: None,
            docs: Vec::new(),
        }
    }
}

/// One variant of an enum type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Variant name.
    pub name: String,
    /// Encoded discriminant.
    pub index: u8,
    /// Payload fields.
    pub fields: Vec<Field>,
    /// Documentation lines (revision 15+).
    pub docs: Vec<String>,
}

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    /// Boolean.
    Bool,
    /// Unicode scalar value.
    Char,
    /// UTF-8 string.
    Str,
    /// Unsigned 8-bit.
    U8,
    /// Unsigned 16-bit.
    U16,
    /// Unsigned 32-bit.
    U32,
    /// Unsigned 64-bit.
    U64,
    /// Unsigned 128-bit.
    U128,
    /// Unsigned 256-bit.
    U256,
    /// Signed 8-bit.
    I8,
    /// Signed 16-bit.
    I16,
    /// Signed 32-bit.
    I32,
    /// Signed 64-bit.
    I64,
    /// Signed 128-bit.
    I128,
    /// Signed 256-bit.
    I256,
}

impl Primitive {
    /// All primitives in wire-tag order.
    pub const ALL: [Self; 15] = [
        Self::Bool,
        Self::Char,
        Self::Str,
        Self::U8,
        Self::U16,
        Self::U32,
        Self::U64,
        Self::U128,
        Self::U256,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::I128,
        Self::I256,
    ];

    /// Look up a primitive by wire tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(usize::from(tag)).copied()
    }

    /// Wire tag.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Lowercase source name, e.g. `u32`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Str => "str",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::U128 => "u128",
            Self::U256 => "u256",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::I128 => "i128",
            Self::I256 => "i256",
        }
    }
}

/// A module (pallet) of the node's runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Module name, e.g. `Balances`.
    pub name: String,
    /// Encoded module index.
    pub index: u8,
    /// Dispatchable calls.
    pub calls: Vec<CallDescriptor>,
    /// Emitted events.
    pub events: Vec<EventDescriptor>,
    /// Storage items.
    pub storage: Vec<StorageItemDescriptor>,
    /// Constants.
    pub constants: Vec<ConstantDescriptor>,
    /// Documentation lines (revision 15+).
    pub docs: Vec<String>,
}

impl ModuleDescriptor {
    /// An empty module.
    pub fn new(name: impl Into<String>, index: u8) -> Self {
        Self {
            name: name.into(),
            index,
            calls: Vec::new(),
            events: Vec::new(),
            storage: Vec::new(),
            constants: Vec::new(),
            docs: Vec::new(),
        }
    }

    /// Every type id the module surface refers to, in declaration order.
    pub fn references(&self) -> Vec<TypeId> {
        let mut refs = Vec::new();
        for call in &self.calls {
            refs.extend(call.args.iter().map(|f| f.ty));
        }
        for event in &self.events {
            refs.extend(event.fields.iter().map(|f| f.ty));
        }
        for item in &self.storage {
            match item.entry {
                StorageEntry::Plain { value } => refs.push(value),
                StorageEntry::Map { key, value, .. } => {
                    refs.push(key);
                    refs.push(value);
                }
            }
        }
        refs.extend(self.constants.iter().map(|c| c.ty));
        refs
    }
}

/// A dispatchable call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallDescriptor {
    /// Call name, e.g. `transfer_keep_alive`.
    pub name: String,
    /// Encoded call index within the module.
    pub index: u8,
    /// Arguments in order.
    pub args: Vec<Field>,
    /// Documentation lines (revision 15+).
    pub docs: Vec<String>,
}

/// An event the module deposits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor {
    /// Event name, e.g. `Transfer`.
    pub name: String,
    /// Encoded event index within the module.
    pub index: u8,
    /// Payload fields.
    pub fields: Vec<Field>,
    /// Documentation lines (revision 15+).
    pub docs: Vec<String>,
}

/// A storage item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageItemDescriptor {
    /// Item name, e.g. `TotalIssuance`.
    pub name: String,
    /// Whether a missing value reads as `None` or as the default.
    pub modifier: StorageModifier,
    /// Plain value or keyed map.
    pub entry: StorageEntry,
    /// Encoded default value.
    pub default: Vec<u8>,
    /// Documentation lines (revision 15+).
    pub docs: Vec<String>,
}

/// Behaviour of a storage read for an absent value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageModifier {
    /// Absent values read as `None`.
    Optional,
    /// Absent values read as the declared default.
    Default,
}

impl StorageModifier {
    /// Wire tag.
    pub fn tag(self) -> u8 {
        match self {
            Self::Optional => 0,
            Self::Default => 1,
        }
    }

    /// Look up a modifier by wire tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Optional),
            1 => Some(Self::Default),
            _ => None,
        }
    }
}

/// Shape of a storage item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageEntry {
    /// A single value.
    Plain {
        /// Value type.
        value: TypeId,
    },
    /// A map from key to value.
    Map {
        /// Key hashing scheme.
        hasher: StorageHasher,
        /// Key type.
        key: TypeId,
        /// Value type.
        value: TypeId,
    },
}

/// Hashing scheme applied to storage map keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageHasher {
    /// 128-bit Blake2.
    Blake2_128,
    /// 256-bit Blake2.
    Blake2_256,
    /// 128-bit Blake2 followed by the raw key.
    Blake2_128Concat,
    /// 128-bit xxHash.
    Twox128,
    /// 256-bit xxHash.
    Twox256,
    /// 64-bit xxHash followed by the raw key.
    Twox64Concat,
    /// The raw key.
    Identity,
}

impl StorageHasher {
    const ALL: [Self; 7] = [
        Self::Blake2_128,
        Self::Blake2_256,
        Self::Blake2_128Concat,
        Self::Twox128,
        Self::Twox256,
        Self::Twox64Concat,
        Self::Identity,
    ];

    /// Wire tag.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Look up a hasher by wire tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(usize::from(tag)).copied()
    }

    /// Name as the node's authors spell it, e.g. `Blake2_128Concat`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blake2_128 => "Blake2_128",
            Self::Blake2_256 => "Blake2_256",
            Self::Blake2_128Concat => "Blake2_128Concat",
            Self::Twox128 => "Twox128",
            Self::Twox256 => "Twox256",
            Self::Twox64Concat => "Twox64Concat",
            Self::Identity => "Identity",
        }
    }
}

/// A module constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantDescriptor {
    /// Constant name, e.g. `ExistentialDeposit`.
    pub name: String,
    /// Value type.
    pub ty: TypeId,
    /// Encoded value.
    pub value: Vec<u8>,
    /// Documentation lines (revision 15+).
    pub docs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foo_registry() -> TypeRegistry {
        [
            TypeDescriptor::primitive(0, Primitive::U32),
            TypeDescriptor::new(
                1,
                TypeDef::Composite {
                    fields: vec![Field::named("a", 0)],
                },
            )
            .with_path(["demo", "Foo"]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn registry_iterates_in_id_order() {
        let registry: TypeRegistry = [
            TypeDescriptor::primitive(5, Primitive::Bool),
            TypeDescriptor::primitive(2, Primitive::U8),
            TypeDescriptor::primitive(9, Primitive::Str),
        ]
        .into_iter()
        .collect();
        let ids: Vec<TypeId> = registry.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }

    #[test]
    fn insert_returns_previous_descriptor() {
        let mut registry = TypeRegistry::new();
        assert!(registry
            .insert(TypeDescriptor::primitive(0, Primitive::U8))
            .is_none());
        let previous = registry.insert(TypeDescriptor::primitive(0, Primitive::U16));
        assert_eq!(previous.map(|t| t.def), Some(TypeDef::Primitive(Primitive::U8)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn dangling_reference_is_reported() {
        let mut registry = foo_registry();
        assert_eq!(registry.first_dangling_reference(), None);
        registry.insert(TypeDescriptor::new(2, TypeDef::Sequence { elem: 42 }));
        assert_eq!(registry.first_dangling_reference(), Some((2, 42)));
    }

    #[test]
    fn references_include_params_and_variant_fields() {
        let ty = TypeDescriptor::new(
            3,
            TypeDef::Variant {
                variants: vec![
                    Variant {
                        name: "None".into(),
                        index: 0,
                        fields: vec![],
                        docs: vec![],
                    },
                    Variant {
                        name: "Some".into(),
                        index: 1,
                        fields: vec![Field::unnamed(0)],
                        docs: vec![],
                    },
                ],
            },
        )
        .with_path(["Option"])
        .with_param("T", Some(0));
        assert_eq!(ty.references(), vec![0, 0]);
        assert_eq!(ty.qualified_name().as_deref(), Some("Option"));
    }

    #[test]
    fn primitive_tags_round_trip() {
        for p in Primitive::ALL {
            assert_eq!(Primitive::from_tag(p.tag()), Some(p));
        }
        assert_eq!(Primitive::from_tag(15), None);
    }

    #[test]
    fn schema_version_lookup() {
        assert_eq!(SchemaVersion::from_byte(14), Some(SchemaVersion::V14));
        assert_eq!(SchemaVersion::from_byte(13), None);
        assert!(SchemaVersion::V15.has_docs());
        assert!(!SchemaVersion::V14.has_docs());
        assert_eq!(SchemaVersion::V15.to_string(), "v15");
    }

    #[test]
    fn module_references_cover_every_surface() {
        let mut module = ModuleDescriptor::new("Balances", 5);
        module.calls.push(CallDescriptor {
            name: "transfer".into(),
            index: 0,
            args: vec![Field::named("dest", 1), Field::named("value", 2)],
            docs: vec![],
        });
        module.storage.push(StorageItemDescriptor {
            name: "Account".into(),
            modifier: StorageModifier::Default,
            entry: StorageEntry::Map {
                hasher: StorageHasher::Blake2_128Concat,
                key: 1,
                value: 3,
            },
            default: vec![0],
            docs: vec![],
        });
        module.constants.push(ConstantDescriptor {
            name: "ExistentialDeposit".into(),
            ty: 2,
            value: vec![1, 0, 0, 0],
            docs: vec![],
        });
        assert_eq!(module.references(), vec![1, 2, 1, 3, 2]);
    }

    #[test]
    fn metadata_serializes_to_json() {
        let metadata = Metadata {
            version: SchemaVersion::V14,
            registry: foo_registry(),
            modules: vec![],
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["version"], 14);
        assert_eq!(
            json["registry"]["types"]["1"]["def"]["composite"]["fields"][0]["name"],
            "a"
        );
    }
}
