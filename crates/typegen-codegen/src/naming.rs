//! # Artifact Naming
//!
//! Every type in the registry gets exactly one generated identifier, derived
//! from its shape rather than its id so that renumbering a registry does not
//! rename the bindings:
//!
//! | Descriptor | Name |
//! |---|---|
//! | named (`path = [.., "Option"]`, param `T = u32`) | `OptionU32` |
//! | primitive `u32` / `str` | `U32` / `Str` |
//! | sequence of `u8` | `VecU8` |
//! | array of 32 `u8` | `Array32U8` |
//! | tuple `(u8, u32)` / `()` | `TupleU8U32` / `Unit` |
//! | compact `u128` | `CompactU128` |
//! | anonymous composite or variant | `Type<id>` |
//!
//! Identifiers keep ASCII alphanumerics only; a leading digit gets a `T`
//! prefix.

use std::collections::{BTreeMap, BTreeSet};

use typegen_core::EmitError;
use typegen_metadata::{ModuleDescriptor, TypeDef, TypeDescriptor, TypeId, TypeRegistry};

/// Deepest chain of anonymous wrappers a generated name may be built from.
pub const MAX_NAME_DEPTH: usize = 128;

/// `pallet_balances` → `PalletBalances`, `AccountId32` → `AccountId32`.
pub fn pascal_case(s: &str) -> String {
    s.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// `XcmPallet` → `xcm_pallet`, `EVMChainId` → `evm_chain_id`.
pub fn snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_').collect();
    let mut out = String::with_capacity(chars.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev != '_' && (prev.is_ascii_lowercase() || prev.is_ascii_digit() || (prev.is_ascii_uppercase() && next_lower)) {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// Strip everything but ASCII alphanumerics; prefix `T` if the result
/// starts with a digit. Returns an empty string if nothing survives.
pub fn sanitize(s: &str) -> String {
    let cleaned: String = s.chars().filter(char::is_ascii_alphanumeric).collect();
    if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        format!("T{cleaned}")
    } else {
        cleaned
    }
}

/// Human-readable label for a type, used in error messages.
pub fn describe_type(ty: &TypeDescriptor) -> String {
    match ty.qualified_name() {
        Some(q) => format!("type #{} ({q})", ty.id),
        None => format!("type #{}", ty.id),
    }
}

/// Human-readable label for a module, used in error messages.
pub fn describe_module(module: &ModuleDescriptor) -> String {
    format!("module {} (index {})", module.name, module.index)
}

/// Artifact path for a type.
pub fn type_artifact_name(name: &str) -> String {
    format!("types/{name}.ts")
}

/// Artifact path for a module surface.
///
/// A module whose name has nothing left after sanitizing is filed as
/// `modules/module<index>.ts`.
pub fn module_artifact_name(module: &ModuleDescriptor) -> String {
    let stem = snake_case(&module.name);
    if stem.is_empty() {
        format!("modules/module{}.ts", module.index)
    } else {
        format!("modules/{stem}.ts")
    }
}

/// Identifier prefix for a module's exported symbols, e.g. `Balances`.
pub fn module_prefix(module: &ModuleDescriptor) -> String {
    let name = sanitize(&pascal_case(&module.name));
    if name.is_empty() {
        format!("Module{}", module.index)
    } else {
        name
    }
}

/// Assign a generated name to every type in the registry.
///
/// Fails with [`EmitError::UnresolvedType`] if a name depends on a missing
/// id, with [`EmitError::CyclicName`] if it depends on itself and with
/// [`EmitError::NameTooDeep`] past [`MAX_NAME_DEPTH`] nested references.
pub(crate) fn assign_names(registry: &TypeRegistry) -> Result<BTreeMap<TypeId, String>, EmitError> {
    let mut namer = Namer {
        registry,
        done: BTreeMap::new(),
        visiting: BTreeSet::new(),
    };
    for ty in registry.iter() {
        namer.resolve(ty.id, None)?;
    }
    Ok(namer.done)
}

struct Namer<'r> {
    registry: &'r TypeRegistry,
    done: BTreeMap<TypeId, String>,
    visiting: BTreeSet<TypeId>,
}

impl Namer<'_> {
    fn resolve(&mut self, id: TypeId, referrer: Option<&TypeDescriptor>) -> Result<String, EmitError> {
        if let Some(name) = self.done.get(&id) {
            return Ok(name.clone());
        }
        let registry = self.registry;
        let ty = registry.get(id).ok_or_else(|| EmitError::UnresolvedType {
            id,
            referenced_by: referrer.map_or_else(|| "registry".to_string(), describe_type),
        })?;
        if self.visiting.contains(&id) {
            return Err(EmitError::CyclicName { id });
        }
        if self.visiting.len() >= MAX_NAME_DEPTH {
            return Err(EmitError::NameTooDeep {
                id,
                limit: MAX_NAME_DEPTH,
            });
        }
        self.visiting.insert(id);
        let raw = self.raw_name(ty)?;
        self.visiting.remove(&id);

        let mut name = sanitize(&raw);
        if name.is_empty() {
            name = format!("Type{id}");
        }
        self.done.insert(id, name.clone());
        Ok(name)
    }

    fn raw_name(&mut self, ty: &TypeDescriptor) -> Result<String, EmitError> {
        if let Some(last) = ty.path.last() {
            let mut name = pascal_case(last);
            for param in &ty.params {
                if let Some(bound) = param.ty {
                    name.push_str(&self.resolve(bound, Some(ty))?);
                }
            }
            return Ok(name);
        }
        let name = match &ty.def {
            TypeDef::Primitive(p) => pascal_case(p.as_str()),
            TypeDef::Sequence { elem } => format!("Vec{}", self.resolve(*elem, Some(ty))?),
            TypeDef::Array { len, elem } => format!("Array{len}{}", self.resolve(*elem, Some(ty))?),
            TypeDef::Tuple { elems } if elems.is_empty() => "Unit".to_string(),
            TypeDef::Tuple { elems } => {
                let mut name = String::from("Tuple");
                for elem in elems {
                    name.push_str(&self.resolve(*elem, Some(ty))?);
                }
                name
            }
            TypeDef::Compact { inner } => format!("Compact{}", self.resolve(*inner, Some(ty))?),
            TypeDef::Composite { .. } | TypeDef::Variant { .. } => format!("Type{}", ty.id),
        };
        Ok(name)
    }
}
