//! TypeScript rendering of type and module artifacts.
//!
//! Every referenced type is imported by its generated name from its own
//! artifact; nothing is inlined. Imports are collected while the body is
//! rendered, then written sorted and de-duplicated above it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use typegen_core::EmitError;
use typegen_metadata::{
    Field, ModuleDescriptor, Primitive, StorageEntry, StorageModifier, TypeDef, TypeDescriptor,
    TypeId, Variant,
};

use crate::naming::module_prefix;

const INDENT: &str = "  ";

pub(crate) struct Renderer<'e> {
    pub(crate) names: &'e BTreeMap<TypeId, String>,
    pub(crate) namespace: &'e str,
}

/// Body text plus the set of type names it refers to.
struct Unit<'e> {
    names: &'e BTreeMap<TypeId, String>,
    owner: String,
    imports: BTreeSet<String>,
    out: String,
}

impl<'e> Unit<'e> {
    fn new(names: &'e BTreeMap<TypeId, String>, owner: impl Into<String>) -> Self {
        Self {
            names,
            owner: owner.into(),
            imports: BTreeSet::new(),
            out: String::new(),
        }
    }

    /// Generated name for `id`, recorded as an import.
    fn ty(&mut self, id: TypeId) -> Result<String, EmitError> {
        let name = self.names.get(&id).ok_or_else(|| EmitError::UnresolvedType {
            id,
            referenced_by: self.owner.clone(),
        })?;
        if *name != self.owner {
            self.imports.insert(name.clone());
        }
        Ok(name.clone())
    }

    /// TypeScript type of a field list, or `None` for an empty list.
    ///
    /// All-named fields become an object literal, a single positional field
    /// its own type, several positional fields a readonly tuple.
    fn fields_type(&mut self, fields: &[Field]) -> Result<Option<String>, EmitError> {
        if fields.is_empty() {
            return Ok(None);
        }
        if fields.iter().all(|f| f.name.is_some()) {
            let mut members = Vec::with_capacity(fields.len());
            for f in fields {
                let key = prop_key(f.name.as_deref().unwrap_or_default());
                members.push(format!("readonly {key}: {}", self.ty(f.ty)?));
            }
            return Ok(Some(format!("{{ {} }}", members.join("; "))));
        }
        if let [only] = fields {
            return self.ty(only.ty).map(Some);
        }
        let mut elems = Vec::with_capacity(fields.len());
        for f in fields {
            elems.push(self.ty(f.ty)?);
        }
        Ok(Some(format!("readonly [{}]", elems.join(", "))))
    }

    fn finish(self, namespace: &str, import_from: &str) -> Result<String, EmitError> {
        let mut text = header(namespace);
        if !self.imports.is_empty() {
            text.push('\n');
            for name in &self.imports {
                writeln!(text, "import type {{ {name} }} from '{import_from}{name}';")?;
            }
        }
        text.push('\n');
        text.push_str(&self.out);
        Ok(text)
    }
}

impl Renderer<'_> {
    pub(crate) fn type_artifact(&self, ty: &TypeDescriptor) -> Result<String, EmitError> {
        let name = self
            .names
            .get(&ty.id)
            .cloned()
            .ok_or_else(|| EmitError::UnresolvedType {
                id: ty.id,
                referenced_by: "emitter".to_string(),
            })?;
        let mut unit = Unit::new(self.names, name.clone());
        write_docs(&mut unit.out, &ty.docs, "")?;

        match &ty.def {
            TypeDef::Primitive(p) => {
                writeln!(unit.out, "export type {name} = {};", primitive_ts(*p))?;
            }
            TypeDef::Composite { fields } => {
                if !fields.is_empty() && fields.iter().all(|f| f.name.is_some()) {
                    writeln!(unit.out, "export interface {name} {{")?;
                    for f in fields {
                        let ty = unit.ty(f.ty)?;
                        write_docs(&mut unit.out, &f.docs, INDENT)?;
                        let key = prop_key(f.name.as_deref().unwrap_or_default());
                        writeln!(unit.out, "{INDENT}{key}: {ty};")?;
                    }
                    writeln!(unit.out, "}}")?;
                } else {
                    let ts = unit.fields_type(fields)?.unwrap_or_else(|| "null".to_string());
                    writeln!(unit.out, "export type {name} = {ts};")?;
                }
            }
            TypeDef::Variant { variants } => self.variant_union(&mut unit, &name, variants)?,
            TypeDef::Sequence { elem } => {
                let elem = unit.ty(*elem)?;
                writeln!(unit.out, "export type {name} = ReadonlyArray<{elem}>;")?;
            }
            TypeDef::Array { len, elem } => {
                let elem = unit.ty(*elem)?;
                writeln!(unit.out, "/** Fixed length: {len}. */")?;
                writeln!(unit.out, "export type {name} = ReadonlyArray<{elem}>;")?;
            }
            TypeDef::Tuple { elems } => {
                let mut parts = Vec::with_capacity(elems.len());
                for e in elems {
                    parts.push(unit.ty(*e)?);
                }
                writeln!(unit.out, "export type {name} = readonly [{}];", parts.join(", "))?;
            }
            TypeDef::Compact { inner } => {
                let inner = unit.ty(*inner)?;
                writeln!(unit.out, "export type {name} = {inner};")?;
            }
        }
        unit.finish(self.namespace, "./")
    }

    fn variant_union(&self, unit: &mut Unit<'_>, name: &str, variants: &[Variant]) -> Result<(), EmitError> {
        if variants.is_empty() {
            writeln!(unit.out, "export type {name} = never;")?;
            return Ok(());
        }
        writeln!(unit.out, "export type {name} =")?;
        for (i, v) in variants.iter().enumerate() {
            write_docs(&mut unit.out, &v.docs, INDENT)?;
            let tag = ts_string(&v.name);
            let arm = match unit.fields_type(&v.fields)? {
                Some(value) => format!("{{ readonly type: {tag}; readonly value: {value} }}"),
                None => format!("{{ readonly type: {tag} }}"),
            };
            let end = if i + 1 == variants.len() { ";" } else { "" };
            writeln!(unit.out, "{INDENT}| {arm}{end}")?;
        }
        Ok(())
    }

    pub(crate) fn module_artifact(&self, module: &ModuleDescriptor) -> Result<String, EmitError> {
        let prefix = module_prefix(module);
        let mut unit = Unit::new(self.names, format!("module {}", module.name));
        write_docs(&mut unit.out, &module.docs, "")?;
        writeln!(
            unit.out,
            "export const {prefix}Module = {{ name: {}, index: {} }} as const;",
            ts_string(&module.name),
            module.index
        )?;

        // Calls
        let mut call_types = Vec::with_capacity(module.calls.len());
        for call in &module.calls {
            let ts = unit.fields_type(&call.args)?.unwrap_or_else(|| "null".to_string());
            call_types.push((call, ts));
        }
        unit.out.push('\n');
        open_block(&mut unit.out, &format!("export interface {prefix}CallArgs"), call_types.is_empty())?;
        for (call, ts) in &call_types {
            write_docs(&mut unit.out, &call.docs, INDENT)?;
            writeln!(unit.out, "{INDENT}{}: {ts};", prop_key(&call.name))?;
        }
        close_block(&mut unit.out, call_types.is_empty(), "")?;
        index_table(
            &mut unit.out,
            &format!("{prefix}CallIndex"),
            module.calls.iter().map(|c| (c.name.as_str(), c.index)),
        )?;

        // Events
        let mut event_types = Vec::with_capacity(module.events.len());
        for event in &module.events {
            let ts = unit.fields_type(&event.fields)?.unwrap_or_else(|| "null".to_string());
            event_types.push((event, ts));
        }
        unit.out.push('\n');
        open_block(&mut unit.out, &format!("export interface {prefix}Events"), event_types.is_empty())?;
        for (event, ts) in &event_types {
            write_docs(&mut unit.out, &event.docs, INDENT)?;
            writeln!(unit.out, "{INDENT}{}: {ts};", prop_key(&event.name))?;
        }
        close_block(&mut unit.out, event_types.is_empty(), "")?;
        index_table(
            &mut unit.out,
            &format!("{prefix}EventIndex"),
            module.events.iter().map(|e| (e.name.as_str(), e.index)),
        )?;

        // Storage
        struct StorageShape<'m> {
            name: &'m str,
            docs: &'m [String],
            key: Option<String>,
            value: String,
            hasher: Option<&'static str>,
        }
        let mut storage = Vec::with_capacity(module.storage.len());
        for item in &module.storage {
            let (key, value, hasher) = match item.entry {
                StorageEntry::Plain { value } => (None, unit.ty(value)?, None),
                StorageEntry::Map { hasher, key, value } => {
                    (Some(unit.ty(key)?), unit.ty(value)?, Some(hasher.as_str()))
                }
            };
            let value = match item.modifier {
                StorageModifier::Optional => format!("{value} | null"),
                StorageModifier::Default => value,
            };
            storage.push(StorageShape {
                name: &item.name,
                docs: &item.docs,
                key,
                value,
                hasher,
            });
        }
        unit.out.push('\n');
        open_block(&mut unit.out, &format!("export interface {prefix}Storage"), storage.is_empty())?;
        for s in &storage {
            write_docs(&mut unit.out, s.docs, INDENT)?;
            let shape = match (&s.key, s.hasher) {
                (Some(key), Some(hasher)) => format!(
                    "{{ readonly hasher: {}; readonly key: {key}; readonly value: {} }}",
                    ts_string(hasher),
                    s.value
                ),
                _ => format!("{{ readonly value: {} }}", s.value),
            };
            writeln!(unit.out, "{INDENT}{}: {shape};", prop_key(s.name))?;
        }
        close_block(&mut unit.out, storage.is_empty(), "")?;

        // Constants
        let mut constants = Vec::with_capacity(module.constants.len());
        for c in &module.constants {
            constants.push((c, unit.ty(c.ty)?));
        }
        unit.out.push('\n');
        open_block(&mut unit.out, &format!("export interface {prefix}Constants"), constants.is_empty())?;
        for (c, ts) in &constants {
            write_docs(&mut unit.out, &c.docs, INDENT)?;
            writeln!(unit.out, "{INDENT}{}: {ts};", prop_key(&c.name))?;
        }
        close_block(&mut unit.out, constants.is_empty(), "")?;
        unit.out.push('\n');
        open_block(&mut unit.out, &format!("export const {prefix}ConstantValues ="), constants.is_empty())?;
        for (c, _) in &constants {
            writeln!(unit.out, "{INDENT}{}: '0x{}',", prop_key(&c.name), to_hex(&c.value))?;
        }
        close_block(&mut unit.out, constants.is_empty(), " as const;")?;

        // Client accessor
        let mut tx = Vec::with_capacity(call_types.len());
        for (call, _) in &call_types {
            tx.push(format!(
                "{}(args: {prefix}CallArgs[{}]): Promise<string>;",
                prop_key(&call.name),
                ts_string(&call.name)
            ));
        }
        let mut query = Vec::with_capacity(storage.len());
        for s in &storage {
            let params = s.key.as_ref().map(|k| format!("key: {k}")).unwrap_or_default();
            query.push(format!("{}({params}): Promise<{}>;", prop_key(s.name), s.value));
        }
        let mut events = Vec::with_capacity(event_types.len());
        for (event, _) in &event_types {
            events.push(format!(
                "{}(handler: (event: {prefix}Events[{}]) => void): () => void;",
                prop_key(&event.name),
                ts_string(&event.name)
            ));
        }
        unit.out.push('\n');
        writeln!(unit.out, "export interface {prefix}Client {{")?;
        for (member, lines) in [("tx", &tx), ("query", &query), ("events", &events)] {
            if lines.is_empty() {
                writeln!(unit.out, "{INDENT}readonly {member}: {{}};")?;
                continue;
            }
            writeln!(unit.out, "{INDENT}readonly {member}: {{")?;
            for line in lines {
                writeln!(unit.out, "{INDENT}{INDENT}{line}")?;
            }
            writeln!(unit.out, "{INDENT}}};")?;
        }
        writeln!(unit.out, "}}")?;

        unit.finish(self.namespace, "../types/")
    }
}

pub(crate) fn header(namespace: &str) -> String {
    format!(
        "// Auto-generated by typegen for namespace {}. Do not edit.\n",
        ts_string(namespace)
    )
}

fn primitive_ts(p: Primitive) -> &'static str {
    match p {
        Primitive::Bool => "boolean",
        Primitive::Char | Primitive::Str => "string",
        Primitive::U8
        | Primitive::U16
        | Primitive::U32
        | Primitive::I8
        | Primitive::I16
        | Primitive::I32 => "number",
        Primitive::U64
        | Primitive::U128
        | Primitive::U256
        | Primitive::I64
        | Primitive::I128
        | Primitive::I256 => "bigint",
    }
}

fn open_block(out: &mut String, head: &str, empty: bool) -> std::fmt::Result {
    if empty {
        write!(out, "{head} {{}}")
    } else {
        writeln!(out, "{head} {{")
    }
}

fn close_block(out: &mut String, empty: bool, suffix: &str) -> std::fmt::Result {
    if empty {
        writeln!(out, "{suffix}")
    } else {
        writeln!(out, "}}{suffix}")
    }
}

fn index_table<'a>(
    out: &mut String,
    name: &str,
    entries: impl ExactSizeIterator<Item = (&'a str, u8)>,
) -> std::fmt::Result {
    out.push('\n');
    let empty = entries.len() == 0;
    open_block(out, &format!("export const {name} ="), empty)?;
    for (key, index) in entries {
        writeln!(out, "{INDENT}{}: {index},", prop_key(key))?;
    }
    close_block(out, empty, " as const;")
}

fn write_docs(out: &mut String, docs: &[String], indent: &str) -> std::fmt::Result {
    let lines: Vec<String> = docs
        .iter()
        .map(|l| l.trim().replace("*/", "*\\/"))
        .collect();
    match lines.as_slice() {
        [] => Ok(()),
        [only] => writeln!(out, "{indent}/** {only} */"),
        many => {
            writeln!(out, "{indent}/**")?;
            for line in many {
                if line.is_empty() {
                    writeln!(out, "{indent} *")?;
                } else {
                    writeln!(out, "{indent} * {line}")?;
                }
            }
            writeln!(out, "{indent} */")
        }
    }
}

/// Single-quoted TypeScript string literal.
pub(crate) fn ts_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Property key: bare when it is a valid identifier, quoted otherwise.
fn prop_key(name: &str) -> String {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    };
    if valid {
        name.to_string()
    } else {
        ts_string(name)
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_map_to_ts() {
        assert_eq!(primitive_ts(Primitive::U32), "number");
        assert_eq!(primitive_ts(Primitive::U64), "bigint");
        assert_eq!(primitive_ts(Primitive::I256), "bigint");
        assert_eq!(primitive_ts(Primitive::Bool), "boolean");
        assert_eq!(primitive_ts(Primitive::Char), "string");
    }

    #[test]
    fn prop_keys_quote_when_needed() {
        assert_eq!(prop_key("transfer_keep_alive"), "transfer_keep_alive");
        assert_eq!(prop_key("$ref"), "$ref");
        assert_eq!(prop_key("0x"), "'0x'");
        assert_eq!(prop_key("foo-bar"), "'foo-bar'");
        assert_eq!(prop_key(""), "''");
    }

    #[test]
    fn ts_string_escapes_quotes_and_backslashes() {
        assert_eq!(ts_string("it's"), r"'it\'s'");
        assert_eq!(ts_string(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn docs_single_and_multi_line() {
        let mut out = String::new();
        write_docs(&mut out, &[" One line.".to_string()], "").unwrap();
        assert_eq!(out, "/** One line. */\n");

        let mut out = String::new();
        write_docs(
            &mut out,
            &["First.".to_string(), "".to_string(), "Ends */ here".to_string()],
            "  ",
        )
        .unwrap();
        assert_eq!(out, "  /**\n   * First.\n   *\n   * Ends *\\/ here\n   */\n");
    }

    #[test]
    fn header_quotes_namespace() {
        assert_eq!(
            header("madara"),
            "// Auto-generated by typegen for namespace 'madara'. Do not edit.\n"
        );
    }
}
