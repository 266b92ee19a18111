use indoc::indoc;
use serulian_graph::GraphStore;

use crate::loader::{PackageInfo, PackageMap, SourceTracker};
use crate::parser::{GrammarVersion, GraphNodeBuilder, ImportRequest, parse};
use crate::source::InputSource;
use crate::srg::Srg;

use super::srg_constructor::SrgTypeConstructor;
use super::{TgKind, TypeKind, TypeReference, build_type_graph};

fn parse_into(store: &GraphStore, source: &str, input: &str) {
    let mut builder = GraphNodeBuilder::new(store);
    let reporter = |request: ImportRequest| request.path.clone();
    let result = parse(
        &mut builder,
        &reporter,
        InputSource::from(source),
        input,
        GrammarVersion::V1,
    );
    assert!(result.ok, "parse failed: {:?}", result.diagnostics);
    builder.apply();
}

#[test]
fn two_classes_appear_with_descriptive_names() {
    let store = GraphStore::new();
    parse_into(
        &store,
        "classes.seru",
        indoc! {"
            class First {
                function Run() int {
                    return 2
                }
            }

            class Second {
            }
        "},
    );

    let package_map = PackageMap::default();
    let source_tracker = SourceTracker::default();
    let srg = Srg::new(&store, &package_map, &source_tracker);
    let constructor = SrgTypeConstructor::new(&srg);
    let (tg, diagnostics) = build_type_graph(&store, &[&constructor]);
    assert!(!diagnostics.has_errors(), "diagnostics: {diagnostics:?}");

    let first = tg.find_type("classes.seru", "First").expect("First missing");
    let second = tg.find_type("classes.seru", "Second").expect("Second missing");

    assert_eq!(tg.type_kind(first), TypeKind::Class);
    assert_eq!(tg.type_kind(second), TypeKind::Class);
    assert_eq!(tg.descriptive_name(first), "First (module classes.seru)");
    assert_eq!(tg.descriptive_name(second), "Second (module classes.seru)");

    // First.Run has a serialized signature and a resolved return type.
    let run = tg.get_member(first, "Run").expect("Run missing");
    assert_eq!(
        tg.member_return_type(run),
        Some(tg.int_type_reference())
    );
    assert!(!tg.member_signature(run).is_empty());
}

#[test]
fn generics_with_constraints_resolve() {
    let store = GraphStore::new();
    parse_into(
        &store,
        "generics.seru",
        indoc! {"
            interface Stringable {
                function Render() string
            }

            class Box<T : Stringable> {
                function Unwrap() T {
                    return this.value
                }
            }
        "},
    );

    let package_map = PackageMap::default();
    let source_tracker = SourceTracker::default();
    let srg = Srg::new(&store, &package_map, &source_tracker);
    let constructor = SrgTypeConstructor::new(&srg);
    let (tg, diagnostics) = build_type_graph(&store, &[&constructor]);
    assert!(!diagnostics.has_errors(), "diagnostics: {diagnostics:?}");

    let box_type = tg.find_type("generics.seru", "Box").unwrap();
    let stringable = tg.find_type("generics.seru", "Stringable").unwrap();

    let generics = tg.generics_of(box_type);
    assert_eq!(generics.len(), 1);
    assert_eq!(
        tg.generic_constraint(generics[0]),
        TypeReference::normal(stringable)
    );

    // Unwrap's return type is the generic itself.
    let unwrap = tg.get_member(box_type, "Unwrap").unwrap();
    assert_eq!(
        tg.member_return_type(unwrap),
        Some(TypeReference::normal(generics[0]))
    );
}

#[test]
fn parent_types_and_nominals() {
    let store = GraphStore::new();
    parse_into(
        &store,
        "nominal.seru",
        indoc! {"
            type Celsius : int {
            }
        "},
    );

    let package_map = PackageMap::default();
    let source_tracker = SourceTracker::default();
    let srg = Srg::new(&store, &package_map, &source_tracker);
    let constructor = SrgTypeConstructor::new(&srg);
    let (tg, diagnostics) = build_type_graph(&store, &[&constructor]);
    assert!(!diagnostics.has_errors(), "diagnostics: {diagnostics:?}");

    let celsius = tg.find_type("nominal.seru", "Celsius").unwrap();
    assert_eq!(tg.type_kind(celsius), TypeKind::Nominal);
    assert_eq!(tg.parent_types(celsius), vec![tg.int_type_reference()]);
}

#[test]
fn alias_resolves_to_target() {
    let store = GraphStore::new();
    parse_into(
        &store,
        "alias.seru",
        indoc! {"
            class Target {
            }

            type Shortcut = Target

            var holder Shortcut
        "},
    );

    let package_map = PackageMap::default();
    let source_tracker = SourceTracker::default();
    let srg = Srg::new(&store, &package_map, &source_tracker);
    let constructor = SrgTypeConstructor::new(&srg);
    let (tg, diagnostics) = build_type_graph(&store, &[&constructor]);
    assert!(!diagnostics.has_errors(), "diagnostics: {diagnostics:?}");

    let target = tg.find_type("alias.seru", "Target").unwrap();

    // The module member's declared type resolves through the alias.
    let holder = tg.get_module_member("alias.seru", "holder").unwrap();
    assert_eq!(tg.member_type(holder), TypeReference::normal(target));
}

#[test]
fn unknown_type_reports_error() {
    let store = GraphStore::new();
    parse_into(
        &store,
        "unknown.seru",
        indoc! {"
            class Holder {
                var value NoSuchType
            }
        "},
    );

    let package_map = PackageMap::default();
    let source_tracker = SourceTracker::default();
    let srg = Srg::new(&store, &package_map, &source_tracker);
    let constructor = SrgTypeConstructor::new(&srg);
    let (_, diagnostics) = build_type_graph(&store, &[&constructor]);

    assert!(diagnostics.has_errors());
    assert!(
        diagnostics
            .errors()
            .any(|d| d.message.contains("unknown type 'NoSuchType'"))
    );
}

#[test]
fn duplicate_type_reports_error() {
    let store = GraphStore::new();
    parse_into(
        &store,
        "dup.seru",
        indoc! {"
            class Twice {
            }

            class Twice {
            }
        "},
    );

    let package_map = PackageMap::default();
    let source_tracker = SourceTracker::default();
    let srg = Srg::new(&store, &package_map, &source_tracker);
    let constructor = SrgTypeConstructor::new(&srg);
    let (_, diagnostics) = build_type_graph(&store, &[&constructor]);

    assert!(diagnostics.has_errors());
    assert!(
        diagnostics
            .errors()
            .any(|d| d.message.contains("already defined"))
    );
}

#[test]
fn cyclic_alias_reports_error() {
    let store = GraphStore::new();
    parse_into(
        &store,
        "cycle.seru",
        indoc! {"
            type A = B

            type B = A
        "},
    );

    let package_map = PackageMap::default();
    let source_tracker = SourceTracker::default();
    let srg = Srg::new(&store, &package_map, &source_tracker);
    let constructor = SrgTypeConstructor::new(&srg);
    let (_, diagnostics) = build_type_graph(&store, &[&constructor]);

    assert!(diagnostics.has_errors());
    assert!(diagnostics.errors().any(|d| d.message.contains("cyclic")));
}

#[test]
fn cross_module_type_resolution() {
    let store = GraphStore::new();
    parse_into(
        &store,
        "/proj/lib/types.seru",
        indoc! {"
            class Exported {
            }
        "},
    );
    parse_into(
        &store,
        "/proj/main.seru",
        indoc! {"
            from lib import Exported

            var holder Exported
        "},
    );

    // The test reporter echoes the import path as the reference id.
    let mut builder = PackageMapBuilder::default();
    builder.add("lib", vec!["/proj/lib/types.seru"]);
    let package_map = builder.build();
    let source_tracker = SourceTracker::default();
    let srg = Srg::new(&store, &package_map, &source_tracker);
    let constructor = SrgTypeConstructor::new(&srg);
    let (tg, diagnostics) = build_type_graph(&store, &[&constructor]);
    assert!(!diagnostics.has_errors(), "diagnostics: {diagnostics:?}");

    let exported = tg.find_type("/proj/lib/types.seru", "Exported").unwrap();
    let holder = tg.get_module_member("/proj/main.seru", "holder").unwrap();
    assert_eq!(tg.member_type(holder), TypeReference::normal(exported));
}

#[test]
fn operator_defaults_to_owner_return_type() {
    let store = GraphStore::new();
    parse_into(
        &store,
        "ops.seru",
        indoc! {"
            class Vector {
                operator Plus(left Vector, right Vector) {
                    return left
                }
            }
        "},
    );

    let package_map = PackageMap::default();
    let source_tracker = SourceTracker::default();
    let srg = Srg::new(&store, &package_map, &source_tracker);
    let constructor = SrgTypeConstructor::new(&srg);
    let (tg, diagnostics) = build_type_graph(&store, &[&constructor]);
    assert!(!diagnostics.has_errors(), "diagnostics: {diagnostics:?}");

    let vector = tg.find_type("ops.seru", "Vector").unwrap();
    let plus = tg.get_operator(vector, "plus").expect("operator missing");
    assert!(tg.member_is_static(plus));
    assert_eq!(
        tg.member_return_type(plus),
        Some(tg.new_instance_type_reference(vector))
    );
}

#[test]
fn builtins_are_present() {
    let store = GraphStore::new();
    let package_map = PackageMap::default();
    let source_tracker = SourceTracker::default();
    let srg = Srg::new(&store, &package_map, &source_tracker);
    let constructor = SrgTypeConstructor::new(&srg);
    let (tg, diagnostics) = build_type_graph(&store, &[&constructor]);
    assert!(!diagnostics.has_errors());

    // Primitive operators exist; integer division is not native.
    let int_type = tg.builtins.int_type;
    let plus = tg.get_operator(int_type, "plus").unwrap();
    let div = tg.get_operator(int_type, "div").unwrap();
    assert!(tg.member_is_native(plus));
    assert!(!tg.member_is_native(div));

    // Float division is native.
    let float_div = tg.get_operator(tg.builtins.float_type, "div").unwrap();
    assert!(tg.member_is_native(float_div));

    // stream<T>.Next() -> T?.
    let next = tg.get_member(tg.builtins.stream_type, "Next").unwrap();
    let stream_generic = tg.generics_of(tg.builtins.stream_type)[0];
    assert_eq!(
        tg.member_return_type(next),
        Some(TypeReference::normal(stream_generic).as_nullable())
    );
}

/// Small helper for building package maps in tests.
#[derive(Default)]
struct PackageMapBuilder {
    entries: Vec<(String, Vec<String>)>,
}

impl PackageMapBuilder {
    fn add(&mut self, reference_id: &str, modules: Vec<&str>) {
        self.entries.push((
            reference_id.to_owned(),
            modules.into_iter().map(str::to_owned).collect(),
        ));
    }

    fn build(self) -> PackageMap {
        let mutable = crate::loader::package_map_for_tests();
        for (reference_id, modules) in self.entries {
            mutable.add(
                "",
                &reference_id,
                PackageInfo::new(
                    "",
                    &reference_id,
                    modules.into_iter().map(InputSource::new).collect(),
                ),
            );
        }
        mutable.build()
    }
}
