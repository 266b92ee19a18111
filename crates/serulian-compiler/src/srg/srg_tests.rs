use indoc::indoc;
use serulian_graph::GraphStore;

use crate::loader::{PackageMap, SourceTracker};
use crate::parser::{GraphNodeBuilder, GrammarVersion, ImportRequest, parse};
use crate::source::InputSource;
use crate::sourceshape::{SrgKind, SrgPredicate};

use super::structure::ContainmentOption;
use super::{NamedScopeKind, ScopeOrImport, Srg};

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

fn srg_fixture(store: &GraphStore, input: &str) -> (PackageMap, SourceTracker) {
    parse_into(store, "test.seru", input);
    (PackageMap::default(), SourceTracker::default())
}

const MODULE: &str = indoc! {"
    class SomeClass<T> {
        var counter int = 0

        function compute(seed int) int {
            var total = seed
            for item in this.items() {
                total = total + item
            }
            return total
        }
    }

    function topLevel(param int) int {
        return param
    }

    var moduleVar int = 10
"};

#[test]
fn modules_and_members() {
    let store = GraphStore::new();
    let (package_map, source_tracker) = srg_fixture(&store, MODULE);
    let srg = Srg::new(&store, &package_map, &source_tracker);

    assert_eq!(srg.modules().len(), 1);

    let members = srg.all_members();
    let names: Vec<_> = members
        .iter()
        .filter_map(|member| srg.node_name(*member))
        .collect();
    assert_eq!(names, vec!["counter", "compute", "topLevel", "moduleVar"]);
}

#[test]
fn entrypoint_implementations_cover_bodies_and_initializers() {
    let store = GraphStore::new();
    let (package_map, source_tracker) = srg_fixture(&store, MODULE);
    let srg = Srg::new(&store, &package_map, &source_tracker);

    // compute body, topLevel body, counter initializer, moduleVar initializer.
    assert_eq!(srg.entrypoint_implementations().len(), 4);
}

#[test]
fn containing_searches() {
    let store = GraphStore::new();
    let (package_map, source_tracker) = srg_fixture(&store, MODULE);
    let srg = Srg::new(&store, &package_map, &source_tracker);

    // Find the `total = total + item` assignment.
    let assigns = store.nodes_of_kind(SrgKind::AssignStatement);
    assert_eq!(assigns.len(), 1);
    let assign = assigns[0];

    let member = srg
        .containing_type_or_member(assign, ContainmentOption::Exclusive)
        .unwrap();
    assert_eq!(srg.node_name(member).as_deref(), Some("compute"));

    let type_def = srg.containing_type(assign).unwrap();
    assert_eq!(srg.node_name(type_def).as_deref(), Some("SomeClass"));

    let module = srg.containing_module(assign).unwrap();
    assert_eq!(srg.kind(module), SrgKind::File);
}

#[test]
fn resolve_parameter_and_variable() {
    let store = GraphStore::new();
    let (package_map, source_tracker) = srg_fixture(&store, MODULE);
    let srg = Srg::new(&store, &package_map, &source_tracker);

    let assign = store.nodes_of_kind(SrgKind::AssignStatement)[0];

    // `total` resolves to the variable statement.
    let total = srg.resolve_name("total", assign).unwrap();
    let ScopeOrImport::Named(total) = total else {
        panic!("expected named scope");
    };
    assert_eq!(total.kind, NamedScopeKind::Variable);
    assert!(total.is_assignable());

    // `seed` resolves to the parameter.
    let seed = srg.resolve_name("seed", assign).unwrap();
    let ScopeOrImport::Named(seed) = seed else {
        panic!("expected named scope");
    };
    assert_eq!(seed.kind, NamedScopeKind::Parameter);
    assert!(!seed.is_assignable());

    // `item` resolves to the loop named value.
    let item = srg.resolve_name("item", assign).unwrap();
    let ScopeOrImport::Named(item) = item else {
        panic!("expected named scope");
    };
    assert_eq!(item.kind, NamedScopeKind::Value);

    // `T` resolves to the enclosing type's generic.
    let generic = srg.resolve_name("T", assign).unwrap();
    let ScopeOrImport::Named(generic) = generic else {
        panic!("expected named scope");
    };
    assert_eq!(generic.kind, NamedScopeKind::Type);
    assert!(generic.is_static());
}

#[test]
fn resolve_module_members() {
    let store = GraphStore::new();
    let (package_map, source_tracker) = srg_fixture(&store, MODULE);
    let srg = Srg::new(&store, &package_map, &source_tracker);

    let assign = store.nodes_of_kind(SrgKind::AssignStatement)[0];

    let class = srg.resolve_name("SomeClass", assign).unwrap();
    let ScopeOrImport::Named(class) = class else {
        panic!("expected named scope");
    };
    assert_eq!(class.kind, NamedScopeKind::Type);

    let function = srg.resolve_name("topLevel", assign).unwrap();
    let ScopeOrImport::Named(function) = function else {
        panic!("expected named scope");
    };
    assert_eq!(function.kind, NamedScopeKind::Member);
    assert!(!function.is_static());

    assert!(srg.resolve_name("nosuch", assign).is_none());
}

#[test]
fn variable_not_visible_in_own_initializer() {
    let store = GraphStore::new();
    let (package_map, source_tracker) = srg_fixture(
        &store,
        indoc! {"
            function run() void {
                var shadowed = shadowed
            }
        "},
    );
    let srg = Srg::new(&store, &package_map, &source_tracker);

    // The reference inside the initializer.
    let identifiers = store.nodes_of_kind(SrgKind::IdentifierExpression);
    let reference = identifiers
        .into_iter()
        .find(|node| {
            store.get_str(*node, SrgPredicate::LiteralValue).as_deref() == Some("shadowed")
        })
        .unwrap();

    assert!(srg.resolve_name("shadowed", reference).is_none());
}

#[test]
fn innermost_binding_shadows() {
    let store = GraphStore::new();
    let (package_map, source_tracker) = srg_fixture(
        &store,
        indoc! {"
            function run(value int) int {
                var value = 1
                for value in [1, 2] {
                    return value
                }
                return value
            }
        "},
    );
    let srg = Srg::new(&store, &package_map, &source_tracker);

    // The `return value` inside the loop sees the loop named value.
    let returns = store.nodes_of_kind(SrgKind::ReturnStatement);
    let inner_return = returns
        .iter()
        .min_by_key(|node| {
            // The loop return starts before the trailing return but after
            // the loop statement starts; pick by source order.
            store.get_int(**node, SrgPredicate::StartRune).unwrap()
        })
        .copied()
        .unwrap();

    let found = srg.resolve_name("value", inner_return).unwrap();
    let ScopeOrImport::Named(found) = found else {
        panic!("expected named scope");
    };
    assert_eq!(found.kind, NamedScopeKind::Value);

    // The trailing return sees the variable statement, which shadows the
    // parameter.
    let outer_return = returns
        .iter()
        .max_by_key(|node| store.get_int(**node, SrgPredicate::StartRune).unwrap())
        .copied()
        .unwrap();

    let found = srg.resolve_name("value", outer_return).unwrap();
    let ScopeOrImport::Named(found) = found else {
        panic!("expected named scope");
    };
    assert_eq!(found.kind, NamedScopeKind::Variable);
}

#[test]
fn names_in_context_lists_visible_names() {
    let store = GraphStore::new();
    let (package_map, source_tracker) = srg_fixture(&store, MODULE);
    let srg = Srg::new(&store, &package_map, &source_tracker);

    let assign = store.nodes_of_kind(SrgKind::AssignStatement)[0];
    let names = srg.names_in_context(assign);
    let just_names: Vec<&str> = names.iter().map(|(name, _)| name.as_str()).collect();

    for expected in ["seed", "total", "item", "T", "SomeClass", "topLevel", "moduleVar"] {
        assert!(just_names.contains(&expected), "missing {expected}: {just_names:?}");
    }
}
