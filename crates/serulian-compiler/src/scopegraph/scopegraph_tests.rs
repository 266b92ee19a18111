use indoc::indoc;
use serulian_graph::GraphStore;

use crate::diagnostics::Diagnostics;
use crate::loader::{PackageMap, SourceTracker};
use crate::parser::{GrammarVersion, GraphNodeBuilder, ImportRequest, parse};
use crate::source::InputSource;
use crate::sourceshape::{SrgKind, SrgPredicate};
use crate::srg::Srg;
use crate::typegraph::{SrgTypeConstructor, TypeGraph, build_type_graph};

use super::proto::ScopeLabel;
use super::{ScopeGraph, build_scope_graph};

fn scope_program<'g>(
    store: &'g GraphStore,
    package_map: &'g PackageMap,
    source_tracker: &'g SourceTracker,
    input: &str,
    version: GrammarVersion,
) -> (TypeGraph<'g>, ScopeGraph<'g>, Diagnostics) {
    let mut builder = GraphNodeBuilder::new(store);
    let reporter = |request: ImportRequest| request.path.clone();
    let result = parse(
        &mut builder,
        &reporter,
        InputSource::from("test.seru"),
        input,
        version,
    );
    assert!(result.ok, "parse failed: {:?}", result.diagnostics);
    builder.apply();

    let srg = Srg::new(store, package_map, source_tracker);
    let constructor = SrgTypeConstructor::new(&srg);
    let (tg, mut diagnostics) = build_type_graph(store, &[&constructor]);

    let scope_graph = build_scope_graph(&srg, &tg);
    diagnostics.extend(scope_graph.collect_diagnostics(&srg));
    diagnostics.sort();

    (tg, scope_graph, diagnostics)
}

macro_rules! fixture {
    ($store:ident, $pm:ident, $st:ident) => {
        let $store = GraphStore::new();
        let $pm = PackageMap::default();
        let $st = SourceTracker::default();
    };
}

#[test]
fn valid_program_scopes_cleanly() {
    fixture!(store, pm, st);
    let (_tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        indoc! {"
            class Counter {
                var count int = 0

                function Add(amount int) int {
                    return this.count + amount
                }
            }

            function run(counter Counter) int {
                var total = counter.Add(5)
                if total > 10 {
                    total = total - 10
                }
                return total
            }
        "},
        GrammarVersion::V1,
    );

    assert!(scope_graph.status, "diagnostics: {diagnostics:?}");
    assert!(!diagnostics.has_errors(), "diagnostics: {diagnostics:?}");
}

#[test]
fn declared_type_mismatch_reports_error() {
    // Scenario: var<int> x = "hi" (legacy grammar).
    fixture!(store, pm, st);
    let (_tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        "var<int> x = 'hi'\n",
        GrammarVersion::V0,
    );

    assert!(!scope_graph.status);
    assert_eq!(diagnostics.error_count(), 1);
    let message = &diagnostics.errors().next().unwrap().message;
    assert!(
        message.starts_with("Variable 'x' has declared type 'int':"),
        "unexpected message: {message}"
    );
}

#[test]
fn missing_initializer_reports_exactly_one_error() {
    // Scenario: `var x` with no type and no initializer.
    fixture!(store, pm, st);
    let (_tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        "var x\n",
        GrammarVersion::V1,
    );

    assert!(!scope_graph.status);
    assert_eq!(diagnostics.error_count(), 1);
    let message = &diagnostics.errors().next().unwrap().message;
    assert_eq!(
        message,
        "Variable 'x' must have explicit initializer as its type 'any' is non-nullable"
    );
}

#[test]
fn nullable_declared_type_allows_missing_initializer() {
    fixture!(store, pm, st);
    let (_tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        "var x string?\n",
        GrammarVersion::V1,
    );

    assert!(scope_graph.status, "diagnostics: {diagnostics:?}");
    assert!(!diagnostics.has_errors());
}

#[test]
fn binary_operator_resolves_called_operator() {
    fixture!(store, pm, st);
    let (tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        "var x = 1 + 2\n",
        GrammarVersion::V1,
    );
    assert!(!diagnostics.has_errors(), "diagnostics: {diagnostics:?}");

    let add = store.nodes_of_kind(SrgKind::BinaryAddExpression)[0];
    let scope = scope_graph.scope_of(add).expect("scope missing");

    let operator = scope.called_operator.expect("operator missing");
    assert_eq!(tg.member_name(operator), "plus");
    assert!(tg.member_is_native(operator));
    assert_eq!(scope.resolved_type, tg.int_type_reference());
}

#[test]
fn integer_division_operator_is_not_native() {
    fixture!(store, pm, st);
    let (tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        "var x = 10 / 2\n",
        GrammarVersion::V1,
    );
    assert!(!diagnostics.has_errors(), "diagnostics: {diagnostics:?}");

    let divide = store.nodes_of_kind(SrgKind::BinaryDivideExpression)[0];
    let scope = scope_graph.scope_of(divide).expect("scope missing");
    let operator = scope.called_operator.expect("operator missing");
    assert_eq!(tg.member_name(operator), "div");
    assert!(!tg.member_is_native(operator));
}

#[test]
fn comparison_resolves_to_bool() {
    fixture!(store, pm, st);
    let (tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        "var x = 1 < 2\n",
        GrammarVersion::V1,
    );
    assert!(!diagnostics.has_errors(), "diagnostics: {diagnostics:?}");

    let comparison = store.nodes_of_kind(SrgKind::ComparisonLTExpression)[0];
    let scope = scope_graph.scope_of(comparison).unwrap();
    assert_eq!(scope.resolved_type, tg.bool_type_reference());
    assert_eq!(
        tg.member_name(scope.called_operator.unwrap()),
        "compare"
    );
}

#[test]
fn operator_missing_on_type_reports_error() {
    fixture!(store, pm, st);
    let (_tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        "var x = true + false\n",
        GrammarVersion::V1,
    );

    assert!(!scope_graph.status);
    assert!(
        diagnostics
            .errors()
            .any(|d| d.message.contains("operator 'plus' is not defined on type 'bool'"))
    );
}

#[test]
fn return_type_mismatch_reports_error() {
    fixture!(store, pm, st);
    let (_tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        indoc! {"
            function run() int {
                return 'hello'
            }
        "},
        GrammarVersion::V1,
    );

    assert!(!scope_graph.status);
    assert!(
        diagnostics
            .errors()
            .any(|d| d.message.contains("return value must be of type 'int'"))
    );
}

#[test]
fn flow_typing_narrows_after_null_check() {
    fixture!(store, pm, st);
    let (_tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        indoc! {"
            function run(value string?) string {
                if value is not null {
                    return value
                }
                return 'fallback'
            }
        "},
        GrammarVersion::V1,
    );

    assert!(scope_graph.status, "diagnostics: {diagnostics:?}");
    assert!(!diagnostics.has_errors(), "diagnostics: {diagnostics:?}");
}

#[test]
fn returning_nullable_without_narrowing_fails() {
    fixture!(store, pm, st);
    let (_tg, scope_graph, _diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        indoc! {"
            function run(value string?) string {
                return value
            }
        "},
        GrammarVersion::V1,
    );

    assert!(!scope_graph.status);
}

#[test]
fn unknown_name_reports_error() {
    fixture!(store, pm, st);
    let (_tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        "var x = nosuch\n",
        GrammarVersion::V1,
    );

    assert!(!scope_graph.status);
    assert!(
        diagnostics
            .errors()
            .any(|d| d.message.contains("the name 'nosuch' could not be found"))
    );
}

#[test]
fn assignment_to_non_assignable_reports_error() {
    fixture!(store, pm, st);
    let (_tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        indoc! {"
            function run(param int) void {
                param = 3
            }
        "},
        GrammarVersion::V1,
    );

    assert!(!scope_graph.status);
    assert!(
        diagnostics
            .errors()
            .any(|d| d.message.contains("cannot assign to a non-assignable expression"))
    );
}

#[test]
fn anonymous_identifier_rules() {
    // `_` is allowed as a resolve rejection but not as an r-value.
    fixture!(store, pm, st);
    let (_tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        indoc! {"
            function run() void {
                result, _ <- compute()
            }

            function compute() int {
                return 2
            }
        "},
        GrammarVersion::V1,
    );

    // The rejection `_` is fine; `result` resolves nowhere, which is the
    // only error.
    let anonymous_errors: Vec<_> = diagnostics
        .errors()
        .filter(|d| d.message.contains("anonymous identifier"))
        .collect();
    assert!(anonymous_errors.is_empty(), "errors: {anonymous_errors:?}");
    let _ = scope_graph;
}

#[test]
fn anonymous_identifier_rejected_as_rvalue() {
    fixture!(store, pm, st);
    let (_tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        "var x = _\n",
        GrammarVersion::V1,
    );

    assert!(!scope_graph.status);
    assert!(
        diagnostics
            .errors()
            .any(|d| d.message.contains("anonymous identifier '_' cannot be used"))
    );
}

#[test]
fn await_expression_labeled() {
    fixture!(store, pm, st);
    let (_tg, scope_graph, diagnostics) = scope_program(
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
        GrammarVersion::V1,
    );

    assert!(scope_graph.status, "diagnostics: {diagnostics:?}");
    let awaits = store.nodes_of_kind(SrgKind::AwaitExpression);
    assert_eq!(awaits.len(), 1);
    assert!(scope_graph.labels_of(awaits[0]).contains(&ScopeLabel::MustBeAwaited));
}

#[test]
fn nullable_access_requires_nullable_operator() {
    fixture!(store, pm, st);
    let (_tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        indoc! {"
            class Holder {
                var count int = 0
            }

            function run(holder Holder?) void {
                holder.count = 2
            }
        "},
        GrammarVersion::V1,
    );

    assert!(!scope_graph.status);
    assert!(
        diagnostics
            .errors()
            .any(|d| d.message.contains("use the ?. operator"))
    );
}

#[test]
fn nullable_member_access_wraps_result() {
    fixture!(store, pm, st);
    let (tg, scope_graph, diagnostics) = scope_program(
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
        GrammarVersion::V1,
    );

    assert!(scope_graph.status, "diagnostics: {diagnostics:?}");
    let access = store.nodes_of_kind(SrgKind::NullableMemberAccessExpression)[0];
    let scope = scope_graph.scope_of(access).unwrap();
    assert_eq!(scope.resolved_type, tg.int_type_reference().as_nullable());
}

#[test]
fn static_call_is_nominal_conversion() {
    fixture!(store, pm, st);
    let (tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        indoc! {"
            type Celsius : int {
            }

            function run() Celsius {
                return Celsius(42)
            }
        "},
        GrammarVersion::V1,
    );

    assert!(scope_graph.status, "diagnostics: {diagnostics:?}");
    let call = store.nodes_of_kind(SrgKind::FunctionCallExpression)[0];
    let scope = scope_graph.scope_of(call).unwrap();
    let celsius = tg.find_type("test.seru", "Celsius").unwrap();
    assert_eq!(
        scope.resolved_type,
        tg.new_instance_type_reference(celsius)
    );
    assert!(scope.has_label(ScopeLabel::NominalShortcutting));
}

#[test]
fn constructor_call_through_static_access() {
    fixture!(store, pm, st);
    let (tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        indoc! {"
            class Widget {
                constructor Declare() {
                    return Widget.Declare()
                }
            }

            function run() Widget {
                return Widget.Declare()
            }
        "},
        GrammarVersion::V1,
    );

    assert!(scope_graph.status, "diagnostics: {diagnostics:?}");
    let widget = tg.find_type("test.seru", "Widget").unwrap();
    let calls = store.nodes_of_kind(SrgKind::FunctionCallExpression);
    for call in calls {
        let scope = scope_graph.scope_of(call).unwrap();
        assert_eq!(scope.resolved_type, tg.new_instance_type_reference(widget));
        // The call targets the constructor member.
        let target = scope.targeted_reference.expect("target missing");
        assert_eq!(tg.member_name(target), "Declare");
    }
}

#[test]
fn loop_over_stream_types_named_value() {
    fixture!(store, pm, st);
    let (_tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        indoc! {"
            function run(items int*) int {
                var total = 0
                for item in items {
                    total = total + item
                }
                return total
            }
        "},
        GrammarVersion::V1,
    );

    assert!(scope_graph.status, "diagnostics: {diagnostics:?}");
    let loops = store.nodes_of_kind(SrgKind::LoopStatement);
    assert!(scope_graph.labels_of(loops[0]).contains(&ScopeLabel::StreamLoop));
}

#[test]
fn loop_over_non_stream_with_named_value_fails() {
    fixture!(store, pm, st);
    let (_tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        indoc! {"
            function run(count int) void {
                for item in count {
                }
            }
        "},
        GrammarVersion::V1,
    );

    assert!(!scope_graph.status);
    assert!(
        diagnostics
            .errors()
            .any(|d| d.message.contains("loop iteration requires a stream"))
    );
}

#[test]
fn match_as_value_narrows_per_case() {
    fixture!(store, pm, st);
    let (_tg, scope_graph, diagnostics) = scope_program(
        &store,
        &pm,
        &st,
        indoc! {"
            function categorize(value any) int {
                match value as typed {
                    case string:
                        return 1
                    default:
                        return 0
                }
                return 0
            }
        "},
        GrammarVersion::V1,
    );

    assert!(scope_graph.status, "diagnostics: {diagnostics:?}");
    let _ = scope_graph;
}

#[test]
fn scope_determinism() {
    let source = indoc! {"
        function first() int {
            return undefinedname
        }

        function second() bool {
            return 2 + 'three'
        }
    "};

    let run = || {
        fixture!(store, pm, st);
        let (_tg, _sg, diagnostics) =
            scope_program(&store, &pm, &st, source, GrammarVersion::V1);
        diagnostics
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
    };

    let first = run();
    let second = run();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}
