use indoc::indoc;
use serulian_graph::GraphStore;
use serulian_graph::store::NodeId;

use crate::loader::{PackageMap, SourceTracker};
use crate::parser::{GrammarVersion, GraphNodeBuilder, ImportRequest, parse};
use crate::scopegraph::build_scope_graph;
use crate::source::InputSource;
use crate::sourceshape::SrgKind;
use crate::srg::Srg;
use crate::typegraph::{SrgTypeConstructor, build_type_graph};

use super::builder::DomBuilder;
use super::{Expression, Statement};

/// Compiles a module and returns the lowered implementation of the first
/// function member plus supporting handles.
fn lower<'g>(
    store: &'g GraphStore,
    package_map: &'g PackageMap,
    source_tracker: &'g SourceTracker,
    input: &str,
) -> Vec<(NodeId, Statement)> {
    let mut builder = GraphNodeBuilder::new(store);
    let reporter = |request: ImportRequest| request.path.clone();
    let result = parse(
        &mut builder,
        &reporter,
        InputSource::from("test.seru"),
        input,
        GrammarVersion::V1,
    );
    assert!(result.ok, "parse failed: {:?}", result.diagnostics);
    builder.apply();

    let srg = Srg::new(store, package_map, source_tracker);
    let constructor = SrgTypeConstructor::new(&srg);
    let (tg, diagnostics) = build_type_graph(store, &[&constructor]);
    assert!(!diagnostics.has_errors(), "diagnostics: {diagnostics:?}");

    let scope_graph = build_scope_graph(&srg, &tg);
    let scope_diagnostics = scope_graph.collect_diagnostics(&srg);
    assert!(
        scope_graph.status,
        "scope failed: {scope_diagnostics:?}"
    );

    let dom_builder = DomBuilder::new(&srg, &tg, &scope_graph);
    srg.all_members()
        .into_iter()
        .filter_map(|member| {
            dom_builder
                .build_member_implementation(member)
                .map(|statement| (member, statement))
        })
        .collect()
}

fn first_statement(body: &Statement) -> &Statement {
    match body {
        Statement::Block { statements, .. } => &statements[0],
        other => other,
    }
}

#[test]
fn native_int_addition_is_optimized() {
    let store = GraphStore::new();
    let pm = PackageMap::default();
    let st = SourceTracker::default();
    let lowered = lower(
        &store,
        &pm,
        &st,
        indoc! {"
            function run(left int, right int) int {
                return left + right
            }
        "},
    );

    let (_, body) = &lowered[0];
    let Statement::Return { value: Some(value), .. } = first_statement(body) else {
        panic!("expected return, got {body:?}");
    };

    // Wrapped native operation over unwrapped operands.
    let Expression::NominalWrapping { value: inner, .. } = value else {
        panic!("expected wrapping, got {value:?}");
    };
    let Expression::BinaryOperation { operator, left, right, .. } = inner.as_ref() else {
        panic!("expected binary operation, got {inner:?}");
    };
    assert_eq!(*operator, "+");
    assert!(matches!(left.as_ref(), Expression::NominalUnwrapping { .. }));
    assert!(matches!(right.as_ref(), Expression::NominalUnwrapping { .. }));
}

#[test]
fn integer_division_goes_through_member_call() {
    let store = GraphStore::new();
    let pm = PackageMap::default();
    let st = SourceTracker::default();
    let lowered = lower(
        &store,
        &pm,
        &st,
        indoc! {"
            function run(left int, right int) int {
                return left / right
            }
        "},
    );

    let (_, body) = &lowered[0];
    let Statement::Return { value: Some(value), .. } = first_statement(body) else {
        panic!("expected return, got {body:?}");
    };

    // Division is never optimized to the native operator.
    assert!(
        matches!(value, Expression::MemberCall { .. }),
        "expected member call, got {value:?}"
    );
}

#[test]
fn nullable_access_lowers_to_nullable_member_call() {
    let store = GraphStore::new();
    let pm = PackageMap::default();
    let st = SourceTracker::default();
    let lowered = lower(
        &store,
        &pm,
        &st,
        indoc! {"
            class Holder {
                var count int = 0
            }

            function run(holder Holder?) int? {
                return holder?.count
            }
        "},
    );

    let body = &lowered
        .iter()
        .find(|(member, _)| {
            // The function member, not the field initializer.
            matches!(
                store.kind_of::<SrgKind>(*member),
                SrgKind::Function
            )
        })
        .unwrap()
        .1;

    let Statement::Return { value: Some(value), .. } = first_statement(body) else {
        panic!("expected return, got {body:?}");
    };
    assert!(
        matches!(value, Expression::NullableMemberCall { .. }),
        "expected nullable member call, got {value:?}"
    );
}

#[test]
fn slice_supplies_null_for_missing_bounds() {
    let store = GraphStore::new();
    let pm = PackageMap::default();
    let st = SourceTracker::default();
    let lowered = lower(
        &store,
        &pm,
        &st,
        indoc! {"
            function run(text string) string {
                return text[1:]
            }
        "},
    );

    let (_, body) = &lowered[0];
    let Statement::Return { value: Some(value), .. } = first_statement(body) else {
        panic!("expected return, got {body:?}");
    };
    let Expression::MemberCall { arguments, .. } = value else {
        panic!("expected member call, got {value:?}");
    };
    assert_eq!(arguments.len(), 2);
    assert!(matches!(
        &arguments[1],
        Expression::LiteralValue { value, .. } if value == "null"
    ));
}

#[test]
fn conditional_test_unwraps_bool() {
    let store = GraphStore::new();
    let pm = PackageMap::default();
    let st = SourceTracker::default();
    let lowered = lower(
        &store,
        &pm,
        &st,
        indoc! {"
            function run(flag bool) int {
                if flag {
                    return 1
                }
                return 0
            }
        "},
    );

    let (_, body) = &lowered[0];
    let Statement::Conditional { test, .. } = first_statement(body) else {
        panic!("expected conditional, got {body:?}");
    };
    assert!(matches!(test, Expression::NominalUnwrapping { .. }));
}

#[test]
fn await_lowers_to_await_promise() {
    let store = GraphStore::new();
    let pm = PackageMap::default();
    let st = SourceTracker::default();
    let lowered = lower(
        &store,
        &pm,
        &st,
        indoc! {"
            function fetch() int {
                return 42
            }

            function run() int {
                var x = <- fetch()
                return x
            }
        "},
    );

    let body = &lowered
        .iter()
        .find(|(member, _)| {
            crate::srg::Srg::new(&store, &pm, &st)
                .node_name(*member)
                .as_deref()
                == Some("run")
        })
        .unwrap()
        .1;

    let Statement::VarDefinition { initializer: Some(initializer), .. } =
        first_statement(body)
    else {
        panic!("expected var definition, got {body:?}");
    };
    assert!(matches!(initializer, Expression::AwaitPromise { .. }));
    assert!(body.is_suspendable());
}
