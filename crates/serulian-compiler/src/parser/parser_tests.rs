use indoc::indoc;
use serulian_graph::GraphStore;
use serulian_graph::store::NodeId;

use crate::source::InputSource;
use crate::sourceshape::{SrgKind, SrgPredicate};

use super::core::GrammarVersion;
use super::lexer::{TokenKind, lex, token_text};
use super::node_builder::GraphNodeBuilder;
use super::{ParseResult, parse, parse_with_compatibility};

fn parse_module(store: &GraphStore, input: &str, version: GrammarVersion) -> ParseResult {
    let mut builder = GraphNodeBuilder::new(store);
    let reporter = |request: super::core::ImportRequest| request.path.clone();
    let result = parse(
        &mut builder,
        &reporter,
        InputSource::from("test.seru"),
        input,
        version,
    );
    builder.apply();
    result
}

fn parse_v1(store: &GraphStore, input: &str) -> ParseResult {
    parse_module(store, input, GrammarVersion::V1)
}

fn children_of_kind(store: &GraphStore, root: NodeId, kind: SrgKind) -> Vec<NodeId> {
    store
        .from_node(root)
        .out(&[SrgPredicate::Child])
        .is_kind(&[kind])
        .node_ids()
}

// --- Lexer ---

#[test]
fn lex_basic_tokens() {
    let tokens = lex("class Foo { }");
    let kinds: Vec<_> = tokens
        .iter()
        .filter(|t| !t.kind.is_trivia())
        .map(|t| t.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::KwClass,
            TokenKind::Identifier,
            TokenKind::BraceOpen,
            TokenKind::BraceClose,
        ]
    );
}

#[test]
fn lex_retains_comments() {
    let source = "// doc comment\nvar x = 2 /* inline */";
    let tokens = lex(source);
    let comments: Vec<_> = tokens
        .iter()
        .filter(|t| t.kind.is_comment())
        .map(|t| token_text(source, t))
        .collect();
    assert_eq!(comments, vec!["// doc comment", "/* inline */"]);
}

#[test]
fn lex_inserts_synthetic_terminators() {
    let tokens = lex("var x = 2\nvar y = 3");
    let count = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::SyntheticSemicolon)
        .count();
    assert_eq!(count, 1);

    // No terminator after an operator: the statement continues.
    let tokens = lex("var x = 2 +\n3");
    assert!(
        !tokens
            .iter()
            .any(|t| t.kind == TokenKind::SyntheticSemicolon)
    );
}

#[test]
fn lex_coalesces_garbage() {
    let tokens = lex("var §§§ x");
    let garbage: Vec<_> = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Garbage)
        .collect();
    assert_eq!(garbage.len(), 1);
}

// --- Module structure ---

#[test]
fn parse_two_classes() {
    let store = GraphStore::new();
    let result = parse_v1(
        &store,
        indoc! {"
            class First {
            }

            class Second {
            }
        "},
    );

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    let classes = children_of_kind(&store, result.root, SrgKind::Class);
    assert_eq!(classes.len(), 2);

    let names: Vec<_> = classes
        .iter()
        .map(|class| store.get_str(*class, SrgPredicate::TypeName).unwrap())
        .collect();
    assert_eq!(names, vec!["First", "Second"]);
}

#[test]
fn parse_imports() {
    let store = GraphStore::new();
    let result = parse_v1(
        &store,
        indoc! {r#"
            import somepackage
            from other import name as alias

            class Defined {
            }
        "#},
    );

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    let imports = children_of_kind(&store, result.root, SrgKind::Import);
    assert_eq!(imports.len(), 2);

    assert_eq!(
        store
            .get_str(imports[0], SrgPredicate::ImportSource)
            .as_deref(),
        Some("somepackage")
    );

    let bindings = store
        .from_node(imports[1])
        .out(&[SrgPredicate::ImportPackageRef])
        .node_ids();
    assert_eq!(bindings.len(), 1);
    assert_eq!(
        store
            .get_str(bindings[0], SrgPredicate::ImportBindingName)
            .as_deref(),
        Some("alias")
    );
    assert_eq!(
        store
            .get_str(bindings[0], SrgPredicate::ImportBindingSubsource)
            .as_deref(),
        Some("name")
    );
}

#[test]
fn imports_after_definitions_error() {
    let store = GraphStore::new();
    let result = parse_v1(
        &store,
        indoc! {"
            class Defined {
            }

            import toolate
        "},
    );

    assert!(!result.ok);
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.message.contains("imports must precede"))
    );
}

#[test]
fn vcs_import_requires_alias() {
    let store = GraphStore::new();
    let result = parse_v1(&store, "import \"github.com/some/pkg\"\n");
    assert!(!result.ok);
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.message.contains("requires an 'as' clause"))
    );
}

// --- Members ---

#[test]
fn parse_class_members() {
    let store = GraphStore::new();
    let result = parse_v1(
        &store,
        indoc! {"
            class SomeClass {
                var count int = 0

                constructor Declare() {
                    return SomeClass.new()
                }

                function run(amount int) int {
                    return amount
                }

                property total int {
                    get {
                        return this.count
                    }
                }

                operator plus(left SomeClass, right SomeClass) {
                    return left
                }
            }
        "},
    );

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    let class = children_of_kind(&store, result.root, SrgKind::Class)[0];
    let members = store
        .from_node(class)
        .out(&[SrgPredicate::TypeMember])
        .node_ids();
    assert_eq!(members.len(), 5);

    let kinds: Vec<_> = members
        .iter()
        .map(|member| store.kind_of::<SrgKind>(*member))
        .collect();
    assert_eq!(
        kinds,
        vec![
            SrgKind::Field,
            SrgKind::Constructor,
            SrgKind::Function,
            SrgKind::Property,
            SrgKind::Operator,
        ]
    );

    // The property has a getter but no setter, so it is read-only.
    let property = members[3];
    assert_eq!(
        store
            .get_str(property, SrgPredicate::MemberReadOnly)
            .as_deref(),
        Some("true")
    );
}

#[test]
fn parse_generics_with_constraints() {
    let store = GraphStore::new();
    let result = parse_v1(
        &store,
        indoc! {"
            interface Mappable<T, Q : Stringable> {
                function map(value T) Q
            }
        "},
    );

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    let interface = children_of_kind(&store, result.root, SrgKind::Interface)[0];
    let generics = store
        .from_node(interface)
        .out(&[SrgPredicate::TypeGeneric])
        .node_ids();
    assert_eq!(generics.len(), 2);
    assert_eq!(
        store.get_str(generics[0], SrgPredicate::GenericName).as_deref(),
        Some("T")
    );
    assert!(
        store
            .get_node(generics[1], SrgPredicate::GenericConstraintRef)
            .is_some()
    );
}

#[test]
fn parse_nominal_and_alias() {
    let store = GraphStore::new();
    let result = parse_v1(
        &store,
        indoc! {"
            type Celsius : int {
                function asFahrenheit() int {
                    return int(this) * 9 / 5 + 32
                }
            }

            type Temperature = Celsius
        "},
    );

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    assert_eq!(children_of_kind(&store, result.root, SrgKind::Nominal).len(), 1);
    assert_eq!(children_of_kind(&store, result.root, SrgKind::Alias).len(), 1);
}

#[test]
fn parse_agent() {
    let store = GraphStore::new();
    let result = parse_v1(
        &store,
        indoc! {"
            agent Logger for SomeClass {
                function log(message string) void {
                }
            }
        "},
    );

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    let agents = children_of_kind(&store, result.root, SrgKind::Agent);
    assert_eq!(agents.len(), 1);
    assert!(
        store
            .get_node(agents[0], SrgPredicate::TypeParentRef)
            .is_some()
    );
}

// --- Type references ---

#[test]
fn parse_type_reference_modifiers() {
    let store = GraphStore::new();
    let result = parse_v1(&store, "var x List<int?>*\n");

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    let variable = children_of_kind(&store, result.root, SrgKind::Variable)[0];
    let declared = store
        .get_node(variable, SrgPredicate::VariableDeclaredTypeRef)
        .unwrap();

    // Outermost is the stream modifier.
    assert_eq!(store.kind_of::<SrgKind>(declared), SrgKind::TypeRefStream);
    let inner = store.get_node(declared, SrgPredicate::TypeRefInner).unwrap();
    assert_eq!(store.kind_of::<SrgKind>(inner), SrgKind::TypeRefPath);
    assert_eq!(
        store.get_str(inner, SrgPredicate::TypeRefPathName).as_deref(),
        Some("List")
    );

    let argument = store
        .get_node(inner, SrgPredicate::TypeRefGenericArg)
        .unwrap();
    assert_eq!(store.kind_of::<SrgKind>(argument), SrgKind::TypeRefNullable);
}

// --- Statements and expressions ---

#[test]
fn parse_statements() {
    let store = GraphStore::new();
    let result = parse_v1(
        &store,
        indoc! {"
            function run(items int*) int {
                var total = 0
                for item in items {
                    if item > 10 {
                        total = total + item
                    } else {
                        continue
                    }
                }
                with getResource() as resource {
                    resource.use()
                }
                return total
            }
        "},
    );

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    assert_eq!(store.nodes_of_kind(SrgKind::LoopStatement).len(), 1);
    assert_eq!(store.nodes_of_kind(SrgKind::ConditionalStatement).len(), 1);
    assert_eq!(store.nodes_of_kind(SrgKind::WithStatement).len(), 1);
    assert_eq!(store.nodes_of_kind(SrgKind::ContinueStatement).len(), 1);
    assert_eq!(store.nodes_of_kind(SrgKind::AssignStatement).len(), 1);
}

#[test]
fn parse_arrow_and_resolve() {
    let store = GraphStore::new();
    let result = parse_v1(
        &store,
        indoc! {"
            function run() void {
                result <- compute()
                value, _ <- fetch()
            }
        "},
    );

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    assert_eq!(store.nodes_of_kind(SrgKind::ArrowStatement).len(), 1);

    let resolves = store.nodes_of_kind(SrgKind::ResolveStatement);
    assert_eq!(resolves.len(), 1);
    let rejection = store
        .get_node(resolves[0], SrgPredicate::ArrowRejection)
        .unwrap();
    assert_eq!(
        store.get_str(rejection, SrgPredicate::LiteralValue).as_deref(),
        Some("_")
    );
}

#[test]
fn parse_binary_precedence() {
    let store = GraphStore::new();
    let result = parse_v1(&store, "var x = 1 + 2 * 3\n");

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    let adds = store.nodes_of_kind(SrgKind::BinaryAddExpression);
    assert_eq!(adds.len(), 1);

    // The right side of the add is the multiply.
    let right = store
        .get_node(adds[0], SrgPredicate::BinaryRightExpr)
        .unwrap();
    assert_eq!(
        store.kind_of::<SrgKind>(right),
        SrgKind::BinaryMultiplyExpression
    );
}

#[test]
fn parse_is_not_null() {
    let store = GraphStore::new();
    let result = parse_v1(
        &store,
        indoc! {"
            function run(value string?) void {
                if value is not null {
                    return
                }
            }
        "},
    );

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    let is_nodes = store.nodes_of_kind(SrgKind::IsComparisonExpression);
    assert_eq!(is_nodes.len(), 1);
    let right = store
        .get_node(is_nodes[0], SrgPredicate::BinaryRightExpr)
        .unwrap();
    assert_eq!(
        store.kind_of::<SrgKind>(right),
        SrgKind::KeywordNotExpression
    );
}

#[test]
fn parse_access_chain() {
    let store = GraphStore::new();
    let result = parse_v1(&store, "var x = first.second?.third(10)[0]!\n");

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    assert_eq!(store.nodes_of_kind(SrgKind::MemberAccessExpression).len(), 1);
    assert_eq!(
        store
            .nodes_of_kind(SrgKind::NullableMemberAccessExpression)
            .len(),
        1
    );
    assert_eq!(store.nodes_of_kind(SrgKind::FunctionCallExpression).len(), 1);
    assert_eq!(store.nodes_of_kind(SrgKind::SliceExpression).len(), 1);
    assert_eq!(store.nodes_of_kind(SrgKind::AssertNotNullExpression).len(), 1);
}

#[test]
fn parse_generic_specifier_vs_comparison() {
    let store = GraphStore::new();
    let result = parse_v1(
        &store,
        indoc! {"
            var specified = build<int>()
            var compared = a < b
        "},
    );

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    assert_eq!(
        store
            .nodes_of_kind(SrgKind::GenericSpecifierExpression)
            .len(),
        1
    );
    assert_eq!(store.nodes_of_kind(SrgKind::ComparisonLTExpression).len(), 1);
}

#[test]
fn parse_lambda_and_literals() {
    let store = GraphStore::new();
    let result = parse_v1(
        &store,
        indoc! {"
            var mapper = (item int) => item * 2
            var items = [1, 2, 3]
            var lookup = {'first': 1, 'second': 2}
        "},
    );

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    assert_eq!(store.nodes_of_kind(SrgKind::LambdaExpression).len(), 1);
    assert_eq!(store.nodes_of_kind(SrgKind::ListLiteralExpression).len(), 1);
    assert_eq!(store.nodes_of_kind(SrgKind::MapLiteralExpression).len(), 1);
    assert_eq!(store.nodes_of_kind(SrgKind::MapLiteralEntry).len(), 2);
}

#[test]
fn parse_structural_new_only_outside_conditions() {
    let store = GraphStore::new();
    let result = parse_v1(
        &store,
        indoc! {"
            function run(point Point) void {
                var made = Point{x: 1, y: 2}
                if point {
                }
            }
        "},
    );

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    assert_eq!(store.nodes_of_kind(SrgKind::StructuralNewExpression).len(), 1);
    assert_eq!(store.nodes_of_kind(SrgKind::ConditionalStatement).len(), 1);
}

#[test]
fn parse_await_expression() {
    let store = GraphStore::new();
    let result = parse_v1(&store, "var x = <- somePromise()\n");

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    assert_eq!(store.nodes_of_kind(SrgKind::AwaitExpression).len(), 1);
}

#[test]
fn parse_sml_expression() {
    let store = GraphStore::new();
    let result = parse_v1(
        &store,
        indoc! {r#"
            function render() any {
                return <panel title="hello" count={40 + 2}>
                    <child />
                    "some text"
                </panel>
            }
        "#},
    );

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    assert_eq!(store.nodes_of_kind(SrgKind::SmlExpression).len(), 2);
    assert_eq!(store.nodes_of_kind(SrgKind::SmlAttribute).len(), 2);
    assert_eq!(store.nodes_of_kind(SrgKind::SmlText).len(), 1);
}

#[test]
fn parse_match_and_switch() {
    let store = GraphStore::new();
    let result = parse_v1(
        &store,
        indoc! {"
            function categorize(value any, count int) int {
                match value as typed {
                    case string:
                        return 1
                    default:
                        return 2
                }
                switch count {
                    case 0:
                        return 0
                    default:
                        return count
                }
            }
        "},
    );

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    assert_eq!(store.nodes_of_kind(SrgKind::MatchStatement).len(), 1);
    assert_eq!(store.nodes_of_kind(SrgKind::MatchCase).len(), 2);
    assert_eq!(store.nodes_of_kind(SrgKind::SwitchStatement).len(), 1);
    assert_eq!(store.nodes_of_kind(SrgKind::SwitchCase).len(), 2);
}

// --- Error recovery ---

#[test]
fn recovery_continues_past_bad_statement() {
    let store = GraphStore::new();
    let result = parse_v1(
        &store,
        indoc! {"
            function run() void {
                var = ;
                var ok = 2
                @@@bad
                var also = 3
            }
        "},
    );

    assert!(!result.ok);
    // Later statements still parsed.
    let variables = store.nodes_of_kind(SrgKind::VariableStatement);
    assert!(variables.len() >= 3);
    assert!(result.diagnostics.error_count() >= 2);
}

#[test]
fn one_diagnostic_per_position() {
    let store = GraphStore::new();
    let result = parse_v1(&store, "class {\n}\n");

    assert!(!result.ok);
    assert_eq!(result.diagnostics.error_count(), 1);
}

// --- Source positions ---

#[test]
fn nodes_carry_rune_ranges() {
    let store = GraphStore::new();
    let source = "class Foo {\n}\n";
    let result = parse_v1(&store, source);
    assert!(result.ok);

    let class = children_of_kind(&store, result.root, SrgKind::Class)[0];
    assert_eq!(
        store.get_str(class, SrgPredicate::Source).as_deref(),
        Some("test.seru")
    );
    assert_eq!(store.get_int(class, SrgPredicate::StartRune), Some(0));
    assert_eq!(store.get_int(class, SrgPredicate::EndRune), Some(13));
}

// --- Version compatibility ---

#[test]
fn v0_variable_syntax() {
    let store = GraphStore::new();
    let result = parse_module(&store, "var<int> x = 42\n", GrammarVersion::V0);

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    let variable = children_of_kind(&store, result.root, SrgKind::Variable)[0];
    let declared = store
        .get_node(variable, SrgPredicate::VariableDeclaredTypeRef)
        .unwrap();
    assert_eq!(
        store.get_str(declared, SrgPredicate::TypeRefPathName).as_deref(),
        Some("int")
    );
    assert_eq!(
        store.get_str(variable, SrgPredicate::VariableName).as_deref(),
        Some("x")
    );
}

#[test]
fn v0_function_syntax() {
    let store = GraphStore::new();
    let result = parse_module(
        &store,
        indoc! {"
            function<int> addTwo(value int) {
                return value + 2
            }
        "},
        GrammarVersion::V0,
    );

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    let function = children_of_kind(&store, result.root, SrgKind::Function)[0];
    let return_ref = store
        .get_node(function, SrgPredicate::MemberReturnTypeRef)
        .unwrap();
    assert_eq!(
        store
            .get_str(return_ref, SrgPredicate::TypeRefPathName)
            .as_deref(),
        Some("int")
    );
}

#[test]
fn compatibility_driver_falls_back_to_v0() {
    let store = GraphStore::new();
    let mut builder = GraphNodeBuilder::new(&store);
    let reporter = |request: super::core::ImportRequest| request.path.clone();

    let result = parse_with_compatibility(
        &mut builder,
        &reporter,
        InputSource::from("legacy.seru"),
        "var<int> x = 42\n",
    );
    builder.apply();

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
    let variable = store.nodes_of_kind(SrgKind::Variable)[0];
    assert!(
        store
            .get_node(variable, SrgPredicate::VariableDeclaredTypeRef)
            .is_some()
    );
}

#[test]
fn compatibility_driver_prefers_v1() {
    let store = GraphStore::new();
    let mut builder = GraphNodeBuilder::new(&store);
    let reporter = |request: super::core::ImportRequest| request.path.clone();

    let result = parse_with_compatibility(
        &mut builder,
        &reporter,
        InputSource::from("current.seru"),
        "var x int = 42\n",
    );
    builder.apply();

    assert!(result.ok, "diagnostics: {:?}", result.diagnostics);
}
