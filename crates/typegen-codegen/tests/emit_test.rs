//! End-to-end emission tests: decoded metadata in, TypeScript sources out.

use proptest::prelude::*;
use typegen_codegen::{emit, Emitter, FreshnessVerifier, Mode};
use typegen_core::{EmitError, TypegenError};
use typegen_metadata::{
    decode_metadata, encode_metadata, CallDescriptor, ConstantDescriptor, EventDescriptor, Field,
    Metadata, ModuleDescriptor, Primitive, SchemaVersion, StorageEntry, StorageHasher,
    StorageItemDescriptor, StorageModifier, TypeDef, TypeDescriptor, TypeRegistry, Variant,
};

const HEADER: &str = "// Auto-generated by typegen for namespace 'madara'. Do not edit.\n";

fn metadata(types: Vec<TypeDescriptor>, modules: Vec<ModuleDescriptor>) -> Metadata {
    Metadata {
        version: SchemaVersion::V15,
        registry: types.into_iter().collect(),
        modules,
    }
}

fn balances() -> Metadata {
    let mut module = ModuleDescriptor::new("Balances", 5);
    module.calls.push(CallDescriptor {
        name: "transfer".into(),
        index: 0,
        args: vec![Field::named("dest", 1), Field::named("value", 0)],
        docs: vec!["Move funds.".into()],
    });
    module.events.push(EventDescriptor {
        name: "Transfer".into(),
        index: 2,
        fields: vec![Field::unnamed(1), Field::unnamed(1), Field::unnamed(0)],
        docs: vec![],
    });
    module.storage.push(StorageItemDescriptor {
        name: "Account".into(),
        modifier: StorageModifier::Default,
        entry: StorageEntry::Map {
            hasher: StorageHasher::Blake2_128Concat,
            key: 1,
            value: 0,
        },
        default: vec![0; 16],
        docs: vec![],
    });
    module.constants.push(ConstantDescriptor {
        name: "ExistentialDeposit".into(),
        ty: 0,
        value: vec![0xf4, 0x01],
        docs: vec![],
    });
    metadata(
        vec![
            TypeDescriptor::primitive(0, Primitive::U128),
            TypeDescriptor::new(1, TypeDef::Array { len: 32, elem: 2 })
                .with_path(["sp_core", "crypto", "AccountId32"]),
            TypeDescriptor::primitive(2, Primitive::U8),
        ],
        vec![module],
    )
}

fn contents<'a>(artifacts: &'a [typegen_codegen::EmittedArtifact], name: &str) -> &'a str {
    artifacts
        .iter()
        .find(|a| a.name == name)
        .map(|a| a.contents.as_str())
        .unwrap_or_else(|| panic!("no artifact named {name}"))
}

// ── Types ────────────────────────────────────────────────────────────

#[test]
fn u32_and_foo_emit_exactly_two_artifacts() {
    let md = metadata(
        vec![
            TypeDescriptor::primitive(0, Primitive::U32),
            TypeDescriptor::new(
                1,
                TypeDef::Composite {
                    fields: vec![Field::named("a", 0)],
                },
            )
            .with_path(["demo", "Foo"]),
        ],
        vec![],
    );
    let artifacts = emit(&md, "madara").unwrap();
    assert_eq!(artifacts.len(), 2);
    assert_eq!(
        contents(&artifacts, "types/U32.ts"),
        format!("{HEADER}\nexport type U32 = number;\n")
    );
    assert_eq!(
        contents(&artifacts, "types/Foo.ts"),
        format!(
            "{HEADER}\nimport type {{ U32 }} from './U32';\n\nexport interface Foo {{\n  a: U32;\n}}\n"
        )
    );
}

#[test]
fn option_renders_as_discriminated_union() {
    let md = metadata(
        vec![
            TypeDescriptor::primitive(0, Primitive::U32),
            TypeDescriptor::new(
                1,
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
            .with_param("T", Some(0)),
        ],
        vec![],
    );
    let artifacts = emit(&md, "madara").unwrap();
    assert_eq!(
        contents(&artifacts, "types/OptionU32.ts"),
        format!(
            "{HEADER}\nimport type {{ U32 }} from './U32';\n\n\
             export type OptionU32 =\n\
             \x20 | {{ readonly type: 'None' }}\n\
             \x20 | {{ readonly type: 'Some'; readonly value: U32 }};\n"
        )
    );
}

#[test]
fn shapes_render_with_docs() {
    let md = metadata(
        vec![
            TypeDescriptor::primitive(0, Primitive::U64),
            TypeDescriptor::primitive(1, Primitive::Bool),
            TypeDescriptor::new(2, TypeDef::Tuple { elems: vec![0, 1] }),
            TypeDescriptor::new(3, TypeDef::Sequence { elem: 2 }),
            TypeDescriptor::new(4, TypeDef::Compact { inner: 0 }),
            TypeDescriptor::new(
                5,
                TypeDef::Composite {
                    fields: vec![Field::unnamed(0), Field::unnamed(1)],
                },
            )
            .with_path(["Pair"])
            .with_docs(["A pair.", "Second line."]),
            TypeDescriptor::new(6, TypeDef::Composite { fields: vec![] }).with_path(["Marker"]),
            TypeDescriptor::new(7, TypeDef::Variant { variants: vec![] }).with_path(["Void"]),
        ],
        vec![],
    );
    let artifacts = emit(&md, "madara").unwrap();
    assert_eq!(
        contents(&artifacts, "types/U64.ts"),
        format!("{HEADER}\nexport type U64 = bigint;\n")
    );
    assert!(contents(&artifacts, "types/TupleU64Bool.ts")
        .ends_with("export type TupleU64Bool = readonly [U64, Bool];\n"));
    assert!(contents(&artifacts, "types/VecTupleU64Bool.ts")
        .ends_with("export type VecTupleU64Bool = ReadonlyArray<TupleU64Bool>;\n"));
    assert!(contents(&artifacts, "types/CompactU64.ts").ends_with("export type CompactU64 = U64;\n"));
    assert!(contents(&artifacts, "types/Pair.ts").ends_with(
        "/**\n * A pair.\n * Second line.\n */\nexport type Pair = readonly [U64, Bool];\n"
    ));
    assert!(contents(&artifacts, "types/Marker.ts").ends_with("export type Marker = null;\n"));
    assert!(contents(&artifacts, "types/Void.ts").ends_with("export type Void = never;\n"));
}

#[test]
fn recursive_type_does_not_import_itself() {
    let md = metadata(
        vec![
            TypeDescriptor::new(
                0,
                TypeDef::Composite {
                    fields: vec![Field::named("children", 1)],
                },
            )
            .with_path(["Node"]),
            TypeDescriptor::new(1, TypeDef::Sequence { elem: 0 }),
        ],
        vec![],
    );
    let artifacts = emit(&md, "madara").unwrap();
    let vec_node = contents(&artifacts, "types/VecNode.ts");
    assert!(vec_node.contains("import type { Node } from './Node';"));
    assert!(!vec_node.contains("import type { VecNode }"));
}

// ── Modules ──────────────────────────────────────────────────────────

#[test]
fn module_surface_renders_every_section() {
    let artifacts = emit(&balances(), "madara").unwrap();
    let names: Vec<&str> = artifacts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["types/U128.ts", "types/AccountId32.ts", "types/U8.ts", "modules/balances.ts"]
    );
    let expected = format!(
        "{HEADER}
import type {{ AccountId32 }} from '../types/AccountId32';
import type {{ U128 }} from '../types/U128';

export const BalancesModule = {{ name: 'Balances', index: 5 }} as const;

export interface BalancesCallArgs {{
  /** Move funds. */
  transfer: {{ readonly dest: AccountId32; readonly value: U128 }};
}}

export const BalancesCallIndex = {{
  transfer: 0,
}} as const;

export interface BalancesEvents {{
  Transfer: readonly [AccountId32, AccountId32, U128];
}}

export const BalancesEventIndex = {{
  Transfer: 2,
}} as const;

export interface BalancesStorage {{
  Account: {{ readonly hasher: 'Blake2_128Concat'; readonly key: AccountId32; readonly value: U128 }};
}}

export interface BalancesConstants {{
  ExistentialDeposit: U128;
}}

export const BalancesConstantValues = {{
  ExistentialDeposit: '0xf401',
}} as const;

export interface BalancesClient {{
  readonly tx: {{
    transfer(args: BalancesCallArgs['transfer']): Promise<string>;
  }};
  readonly query: {{
    Account(key: AccountId32): Promise<U128>;
  }};
  readonly events: {{
    Transfer(handler: (event: BalancesEvents['Transfer']) => void): () => void;
  }};
}}
"
    );
    assert_eq!(contents(&artifacts, "modules/balances.ts"), expected);
}

#[test]
fn empty_module_renders_empty_sections() {
    let md = metadata(vec![], vec![ModuleDescriptor::new("System", 0)]);
    let artifacts = emit(&md, "madara").unwrap();
    let system = contents(&artifacts, "modules/system.ts");
    assert!(system.contains("export interface SystemCallArgs {}\n"));
    assert!(system.contains("export const SystemEventIndex = {} as const;\n"));
    assert!(system.contains("  readonly query: {};\n"));
    assert!(!system.contains("import type"));
}

#[test]
fn optional_storage_value_is_nullable() {
    let mut module = ModuleDescriptor::new("Sudo", 9);
    module.storage.push(StorageItemDescriptor {
        name: "Key".into(),
        modifier: StorageModifier::Optional,
        entry: StorageEntry::Plain { value: 0 },
        default: vec![0],
        docs: vec!["The sudo key.".into()],
    });
    let md = metadata(vec![TypeDescriptor::primitive(0, Primitive::Str)], vec![module]);
    let artifacts = emit(&md, "madara").unwrap();
    let sudo = contents(&artifacts, "modules/sudo.ts");
    assert!(sudo.contains("  /** The sudo key. */\n  Key: { readonly value: Str | null };\n"));
    assert!(sudo.contains("    Key(): Promise<Str | null>;\n"));
}

// ── Determinism and failure ──────────────────────────────────────────

#[test]
fn emission_is_byte_identical_across_runs() {
    let md = balances();
    let first = emit(&md, "madara").unwrap();
    let second = emit(&md, "madara").unwrap();
    assert_eq!(first, second);

    // A decode of the same payload is an independent registry instance.
    let reparsed = decode_metadata(&encode_metadata(&md)).unwrap();
    assert_eq!(emit(&reparsed, "madara").unwrap(), first);
}

#[test]
fn namespace_only_changes_the_header() {
    let md = balances();
    let a = emit(&md, "madara").unwrap();
    let b = emit(&md, "other").unwrap();
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.name, y.name);
        assert_eq!(
            x.contents.replacen("'madara'", "'other'", 1),
            y.contents
        );
    }
}

#[test]
fn artifacts_iterator_is_lazy_and_exact() {
    let md = balances();
    let emitter = Emitter::new(&md.registry, &md.modules, "madara").unwrap();
    let mut iter = emitter.artifacts();
    assert_eq!(iter.size_hint(), (0, Some(4)));
    let first = iter.next().unwrap().unwrap();
    assert_eq!(first.name, "types/U128.ts");
    assert_eq!(iter.size_hint(), (0, Some(3)));
    assert_eq!(iter.count(), 3);
}

#[test]
fn dangling_reference_writes_nothing() {
    let md = metadata(
        vec![TypeDescriptor::new(
            0,
            TypeDef::Composite {
                fields: vec![Field::named("a", 77)],
            },
        )
        .with_path(["Foo"])],
        vec![],
    );
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("madara");

    let result = emit(&md, "madara").map_err(TypegenError::from).and_then(|artifacts| {
        FreshnessVerifier::new(Mode::Write).verify(&artifacts, &out)
    });
    match result {
        Err(TypegenError::Emit(EmitError::UnresolvedType { id, referenced_by })) => {
            assert_eq!(id, 77);
            assert_eq!(referenced_by, "type #0 (Foo)");
        }
        other => panic!("expected UnresolvedType, got: {other:?}"),
    }
    assert!(!out.exists());
}

#[test]
fn colliding_names_are_rejected_before_any_artifact() {
    let registry: TypeRegistry = [
        TypeDescriptor::primitive(0, Primitive::U8),
        TypeDescriptor::new(1, TypeDef::Tuple { elems: vec![] }).with_path(["U8"]),
    ]
    .into_iter()
    .collect();
    let err = Emitter::new(&registry, &[], "madara").unwrap_err();
    assert!(matches!(err, EmitError::NameCollision { ref name, .. } if name == "types/U8.ts"));
}

#[test]
fn generate_then_check_is_fresh() {
    let md = balances();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("madara");
    let artifacts = emit(&md, "madara").unwrap();

    let written = FreshnessVerifier::new(Mode::Write).verify(&artifacts, &out).unwrap();
    assert_eq!(written.added.len(), 4);

    let checked = FreshnessVerifier::new(Mode::Check).verify(&artifacts, &out).unwrap();
    assert!(checked.is_fresh());
    assert_eq!(checked.unchanged.len(), 4);

    std::fs::write(out.join("types").join("U8.ts"), "// hand edit\n").unwrap();
    let err = FreshnessVerifier::new(Mode::Check)
        .verify(&artifacts, &out)
        .unwrap_err();
    match err {
        TypegenError::StaleBinding(stale) => assert_eq!(stale.modified, vec!["types/U8.ts"]),
        other => panic!("expected StaleBinding, got: {other:?}"),
    }
}

#[test]
fn unnameable_module_survives_generate_then_check() {
    let md = metadata(
        vec![TypeDescriptor::primitive(0, Primitive::U32)],
        vec![ModuleDescriptor::new("!!", 3)],
    );
    let artifacts = emit(&md, "madara").unwrap();
    assert_eq!(artifacts[1].name, "modules/module3.ts");

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("madara");
    FreshnessVerifier::new(Mode::Write).verify(&artifacts, &out).unwrap();
    let checked = FreshnessVerifier::new(Mode::Check).verify(&artifacts, &out).unwrap();
    assert_eq!(checked.unchanged, vec!["modules/module3.ts", "types/U32.ts"]);
}

// ── Properties ──────────────────────────────────────────────────────

/// Distinct primitives, a record over all of them and one module with an
/// arbitrary (possibly unnameable) name.
fn arb_metadata() -> impl Strategy<Value = Metadata> {
    (
        prop::sample::subsequence(Primitive::ALL.to_vec(), 1..=Primitive::ALL.len()),
        "[a-zA-Z_!. -]{0,12}",
        any::<u8>(),
    )
        .prop_map(|(primitives, module_name, index)| {
            let record_id = primitives.len() as u32;
            let mut types: Vec<TypeDescriptor> = primitives
                .into_iter()
                .enumerate()
                .map(|(id, p)| TypeDescriptor::primitive(id as u32, p))
                .collect();
            types.push(
                TypeDescriptor::new(
                    record_id,
                    TypeDef::Composite {
                        fields: (0..record_id)
                            .map(|id| Field::named(format!("f{id}"), id))
                            .collect(),
                    },
                )
                .with_path(["demo", "Record"]),
            );
            let mut module = ModuleDescriptor::new(module_name, index);
            module.calls.push(CallDescriptor {
                name: "submit".into(),
                index: 0,
                args: vec![Field::named("record", record_id)],
                docs: vec![],
            });
            metadata(types, vec![module])
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn emission_is_deterministic(md in arb_metadata()) {
        let first = emit(&md, "madara").unwrap();
        let again = emit(&md, "madara").unwrap();
        prop_assert_eq!(&first, &again);
        let decoded = decode_metadata(&encode_metadata(&md)).unwrap();
        prop_assert_eq!(emit(&decoded, "madara").unwrap(), first);
    }

    #[test]
    fn generate_then_check_is_always_fresh(md in arb_metadata()) {
        let artifacts = emit(&md, "madara").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("madara");
        FreshnessVerifier::new(Mode::Write).verify(&artifacts, &out).unwrap();
        let checked = FreshnessVerifier::new(Mode::Check).verify(&artifacts, &out).unwrap();
        prop_assert_eq!(checked.unchanged.len(), artifacts.len());
    }
}
