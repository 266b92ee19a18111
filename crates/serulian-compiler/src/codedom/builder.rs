//! Lowering of scoped SRG trees into the code DOM.

use serulian_graph::store::NodeId;

use crate::scopegraph::{ScopeGraph, ScopeKind};
use crate::sourceshape::{SrgKind, SrgPredicate};
use crate::srg::Srg;
use crate::typegraph::{TypeGraph, TypeKind, TypeReference};

use super::{Expression, RuntimeFunction, Statement};

/// The comparison operator string for comparison kinds, used when lowering
/// a non-native compare() into a test against zero.
fn comparison_operator(kind: SrgKind) -> Option<&'static str> {
    Some(match kind {
        SrgKind::ComparisonLTExpression => "<",
        SrgKind::ComparisonLTEExpression => "<=",
        SrgKind::ComparisonGTExpression => ">",
        SrgKind::ComparisonGTEExpression => ">=",
        _ => return None,
    })
}

/// The native operator string for each operator expression kind.
fn native_operator(kind: SrgKind) -> Option<&'static str> {
    Some(match kind {
        SrgKind::BinaryAddExpression => "+",
        SrgKind::BinarySubtractExpression => "-",
        SrgKind::BinaryMultiplyExpression => "*",
        SrgKind::BinaryDivideExpression => "/",
        SrgKind::BinaryModuloExpression => "%",
        SrgKind::BitwiseAndExpression => "&",
        SrgKind::BitwiseOrExpression => "|",
        SrgKind::BitwiseXorExpression => "^",
        SrgKind::BitwiseShiftLeftExpression => "<<",
        SrgKind::BitwiseShiftRightExpression => ">>",
        SrgKind::BitwiseNotExpression => "~",
        SrgKind::ComparisonEqualsExpression => "==",
        SrgKind::ComparisonNotEqualsExpression => "!=",
        SrgKind::ComparisonLTExpression => "<",
        SrgKind::ComparisonLTEExpression => "<=",
        SrgKind::ComparisonGTExpression => ">",
        SrgKind::ComparisonGTEExpression => ">=",
        _ => return None,
    })
}

/// Builds per-member code DOM trees from the scoped program.
pub struct DomBuilder<'a, 'g> {
    pub srg: &'a Srg<'g>,
    pub tg: &'a TypeGraph<'g>,
    pub scope_graph: &'a ScopeGraph<'g>,
}

impl<'a, 'g> DomBuilder<'a, 'g> {
    pub fn new(srg: &'a Srg<'g>, tg: &'a TypeGraph<'g>, scope_graph: &'a ScopeGraph<'g>) -> Self {
        Self {
            srg,
            tg,
            scope_graph,
        }
    }

    /// Lowers a member's implementation: its body block for callables, or a
    /// synthetic initializer assignment for variables and fields.
    pub fn build_member_implementation(&self, member: NodeId) -> Option<Statement> {
        match self.srg.kind(member) {
            SrgKind::Variable | SrgKind::Field => {
                let initializer = self
                    .srg
                    .store
                    .get_node(member, SrgPredicate::VariableExpression)?;
                let name = self.srg.node_name(member)?;
                Some(Statement::VarDefinition {
                    name,
                    initializer: Some(self.build_expression(initializer)),
                    source: member,
                })
            }
            _ => {
                let body = self.srg.store.get_node(member, SrgPredicate::MemberBody)?;
                Some(self.build_statement(body))
            }
        }
    }

    // --- Statements ---

    pub fn build_statement(&self, node: NodeId) -> Statement {
        match self.srg.kind(node) {
            SrgKind::StatementBlock => Statement::Block {
                statements: self
                    .srg
                    .store
                    .from_node(node)
                    .out(&[SrgPredicate::StatementChild])
                    .node_ids()
                    .into_iter()
                    .map(|child| self.build_statement(child))
                    .collect(),
                source: node,
            },

            SrgKind::VariableStatement => {
                let name = self.srg.node_name(node).unwrap_or_default();
                let initializer = self
                    .srg
                    .store
                    .get_node(node, SrgPredicate::VariableExpression)
                    .map(|expression| self.build_expression(expression));
                Statement::VarDefinition {
                    name,
                    initializer,
                    source: node,
                }
            }

            SrgKind::AssignStatement => Statement::Assignment {
                target: self.build_child_expression(node, SrgPredicate::AssignTarget),
                value: self.build_child_expression(node, SrgPredicate::AssignValue),
                source: node,
            },

            SrgKind::ConditionalStatement => Statement::Conditional {
                test: self.build_unwrapped_bool(node, SrgPredicate::ConditionalExpr),
                then_branch: Box::new(
                    self.build_child_statement(node, SrgPredicate::ConditionalThen),
                ),
                else_branch: self
                    .srg
                    .store
                    .get_node(node, SrgPredicate::ConditionalElse)
                    .map(|else_node| Box::new(self.build_statement(else_node))),
                source: node,
            },

            SrgKind::LoopStatement => {
                let label = self.srg.store.get_str(node, SrgPredicate::StatementLabel);
                let named = self
                    .srg
                    .store
                    .get_node(node, SrgPredicate::LoopNamedValue)
                    .and_then(|named| self.srg.node_name(named));
                let test = self
                    .srg
                    .store
                    .get_node(node, SrgPredicate::LoopExpr)
                    .map(|expression| {
                        if named.is_some() {
                            self.build_expression(expression)
                        } else {
                            self.unwrap_bool(self.build_expression(expression), expression)
                        }
                    });
                Statement::Loop {
                    test,
                    stream_value_name: named,
                    body: Box::new(self.build_child_statement(node, SrgPredicate::LoopBlock)),
                    label,
                    source: node,
                }
            }

            SrgKind::WithStatement => Statement::With {
                resource: self.build_child_expression(node, SrgPredicate::WithExpr),
                value_name: self
                    .srg
                    .store
                    .get_node(node, SrgPredicate::WithNamedValue)
                    .and_then(|named| self.srg.node_name(named)),
                body: Box::new(self.build_child_statement(node, SrgPredicate::WithBlock)),
                source: node,
            },

            SrgKind::SwitchStatement => {
                let label = self.srg.store.get_str(node, SrgPredicate::StatementLabel);
                let test = self
                    .srg
                    .store
                    .get_node(node, SrgPredicate::SwitchExpr)
                    .map(|expression| self.build_expression(expression));
                let cases = self
                    .srg
                    .store
                    .from_node(node)
                    .out(&[SrgPredicate::SwitchCaseRef])
                    .node_ids()
                    .into_iter()
                    .map(|case_node| {
                        let case_test = self
                            .srg
                            .store
                            .get_node(case_node, SrgPredicate::CaseExpr)
                            .map(|expression| self.build_expression(expression));
                        (
                            case_test,
                            self.build_child_statement(case_node, SrgPredicate::CaseBlock),
                        )
                    })
                    .collect();
                Statement::Switch {
                    test,
                    cases,
                    label,
                    source: node,
                }
            }

            SrgKind::MatchStatement => {
                // A match lowers to a switch whose case tests are runtime
                // type checks on the matched value.
                let label = self.srg.store.get_str(node, SrgPredicate::StatementLabel);
                let matched = self.build_child_expression(node, SrgPredicate::MatchExpr);
                let cases = self
                    .srg
                    .store
                    .from_node(node)
                    .out(&[SrgPredicate::MatchCaseRef])
                    .node_ids()
                    .into_iter()
                    .map(|case_node| {
                        let case_test = self
                            .srg
                            .store
                            .get_node(case_node, SrgPredicate::MatchCaseTypeRef)
                            .map(|type_ref| Expression::RuntimeFunctionCall {
                                function: RuntimeFunction::Cast,
                                arguments: vec![
                                    matched.clone(),
                                    Expression::LiteralValue {
                                        value: self.type_ref_literal(type_ref),
                                        source: type_ref,
                                    },
                                ],
                                source: case_node,
                            });
                        (
                            case_test,
                            self.build_child_statement(case_node, SrgPredicate::CaseBlock),
                        )
                    })
                    .collect();
                Statement::Switch {
                    test: None,
                    cases,
                    label,
                    source: node,
                }
            }

            SrgKind::ReturnStatement => Statement::Return {
                value: self
                    .srg
                    .store
                    .get_node(node, SrgPredicate::ReturnExpr)
                    .map(|expression| self.build_expression(expression)),
                source: node,
            },

            SrgKind::RejectStatement => Statement::Reject {
                value: self.build_child_expression(node, SrgPredicate::RejectExpr),
                source: node,
            },

            SrgKind::YieldStatement => {
                let value = self
                    .srg
                    .store
                    .get_node(node, SrgPredicate::YieldExpr)
                    .or_else(|| {
                        self.srg
                            .store
                            .get_node(node, SrgPredicate::YieldStreamValue)
                    })
                    .map(|expression| self.build_expression(expression))
                    .unwrap_or(Expression::LiteralValue {
                        value: "null".to_owned(),
                        source: node,
                    });
                Statement::Yield {
                    value,
                    source: node,
                }
            }

            SrgKind::BreakStatement => Statement::Break {
                label: self.srg.store.get_str(node, SrgPredicate::BreakLabel),
                source: node,
            },

            SrgKind::ContinueStatement => Statement::Continue {
                label: self.srg.store.get_str(node, SrgPredicate::ContinueLabel),
                source: node,
            },

            SrgKind::ArrowStatement => Statement::ArrowAwait {
                destination: self
                    .srg
                    .store
                    .get_node(node, SrgPredicate::ArrowDestination)
                    .map(|destination| self.build_arrow_destination(destination)),
                rejection: None,
                value: self.build_child_expression(node, SrgPredicate::ArrowSource),
                source: node,
            },

            SrgKind::ResolveStatement => Statement::ArrowAwait {
                destination: self
                    .srg
                    .store
                    .get_node(node, SrgPredicate::ArrowDestination)
                    .map(|destination| self.build_arrow_destination(destination)),
                rejection: self
                    .srg
                    .store
                    .get_node(node, SrgPredicate::ArrowRejection)
                    .map(|rejection| self.build_arrow_destination(rejection)),
                value: self.build_child_expression(node, SrgPredicate::ArrowSource),
                source: node,
            },

            SrgKind::ExpressionStatement => Statement::ExpressionStatement {
                expression: self
                    .build_child_expression(node, SrgPredicate::ExpressionStatementExpr),
                source: node,
            },

            other => panic!("unexpected statement kind in lowering: {other:?}"),
        }
    }

    /// Arrow destinations discard into nothing when anonymous.
    fn build_arrow_destination(&self, node: NodeId) -> Expression {
        self.build_expression(node)
    }

    fn build_child_statement(&self, node: NodeId, predicate: SrgPredicate) -> Statement {
        match self.srg.store.get_node(node, predicate) {
            Some(child) => self.build_statement(child),
            None => Statement::Block {
                statements: Vec::new(),
                source: node,
            },
        }
    }

    // --- Expressions ---

    pub fn build_child_expression(&self, node: NodeId, predicate: SrgPredicate) -> Expression {
        match self.srg.store.get_node(node, predicate) {
            Some(child) => self.build_expression(child),
            None => Expression::LiteralValue {
                value: "null".to_owned(),
                source: node,
            },
        }
    }

    /// Builds the expression found at the predicate, unwrapping its nominal
    /// bool into a native boolean.
    fn build_unwrapped_bool(&self, node: NodeId, predicate: SrgPredicate) -> Expression {
        match self.srg.store.get_node(node, predicate) {
            Some(child) => self.unwrap_bool(self.build_expression(child), child),
            None => Expression::LiteralValue {
                value: "false".to_owned(),
                source: node,
            },
        }
    }

    fn unwrap_bool(&self, expression: Expression, source: NodeId) -> Expression {
        Expression::NominalUnwrapping {
            value: Box::new(expression),
            value_type: self.tg.bool_type_reference(),
            source,
        }
    }

    fn wrap_nominal(
        &self,
        expression: Expression,
        nominal_type: TypeReference,
        source: NodeId,
    ) -> Expression {
        Expression::NominalWrapping {
            value: Box::new(expression),
            nominal_type,
            source,
        }
    }

    pub fn build_expression(&self, node: NodeId) -> Expression {
        let kind = self.srg.kind(node);
        match kind {
            // --- Literals ---
            SrgKind::BooleanLiteralExpression => {
                let text = self.literal_text(node);
                self.wrap_nominal(
                    Expression::LiteralValue {
                        value: text,
                        source: node,
                    },
                    self.tg.bool_type_reference(),
                    node,
                )
            }
            SrgKind::NumericLiteralExpression => {
                let text = self.literal_text(node);
                let nominal = self.scope_graph.resolved_type(node);
                self.wrap_nominal(
                    Expression::LiteralValue {
                        value: text,
                        source: node,
                    },
                    nominal,
                    node,
                )
            }
            SrgKind::StringLiteralExpression | SrgKind::TemplateStringExpression => {
                let text = self.literal_text(node);
                self.wrap_nominal(
                    Expression::LiteralValue {
                        value: text,
                        source: node,
                    },
                    self.tg.string_type_reference(),
                    node,
                )
            }
            SrgKind::NullLiteralExpression => Expression::LiteralValue {
                value: "null".to_owned(),
                source: node,
            },
            SrgKind::ThisLiteralExpression => Expression::LocalReference {
                name: "this".to_owned(),
                source: node,
            },
            SrgKind::ValLiteralExpression => Expression::LocalReference {
                name: "val".to_owned(),
                source: node,
            },

            SrgKind::ListLiteralExpression => Expression::ListExpression {
                elements: self
                    .srg
                    .store
                    .from_node(node)
                    .out(&[SrgPredicate::ListElement])
                    .node_ids()
                    .into_iter()
                    .map(|element| self.build_expression(element))
                    .collect(),
                source: node,
            },

            SrgKind::MapLiteralExpression => Expression::MapExpression {
                entries: self
                    .srg
                    .store
                    .from_node(node)
                    .out(&[SrgPredicate::MapEntryRef])
                    .node_ids()
                    .into_iter()
                    .map(|entry| {
                        (
                            self.build_child_expression(entry, SrgPredicate::MapEntryKey),
                            self.build_child_expression(entry, SrgPredicate::MapEntryValue),
                        )
                    })
                    .collect(),
                source: node,
            },

            SrgKind::StructuralNewExpression => {
                let type_ref = self.scope_graph.resolved_type(node);
                Expression::ObjectExpression {
                    type_ref,
                    entries: self
                        .srg
                        .store
                        .from_node(node)
                        .out(&[SrgPredicate::StructuralNewEntryRef])
                        .node_ids()
                        .into_iter()
                        .map(|entry| {
                            (
                                self.srg
                                    .store
                                    .get_str(entry, SrgPredicate::StructuralNewEntryKey)
                                    .unwrap_or_default(),
                                self.build_child_expression(
                                    entry,
                                    SrgPredicate::StructuralNewEntryValue,
                                ),
                            )
                        })
                        .collect(),
                    source: node,
                }
            }

            SrgKind::LambdaExpression => {
                let parameters = self
                    .srg
                    .store
                    .from_node(node)
                    .out(&[SrgPredicate::LambdaParameter])
                    .node_ids()
                    .into_iter()
                    .filter_map(|parameter| self.srg.node_name(parameter))
                    .collect();
                let body = if let Some(block) =
                    self.srg.store.get_node(node, SrgPredicate::LambdaBlock)
                {
                    self.build_statement(block)
                } else {
                    let expression =
                        self.build_child_expression(node, SrgPredicate::LambdaExpr);
                    Statement::Return {
                        value: Some(expression),
                        source: node,
                    }
                };
                Expression::FunctionDefinition {
                    parameters,
                    body: Box::new(body),
                    source: node,
                }
            }

            // --- Named references ---
            SrgKind::IdentifierExpression => self.build_identifier(node),

            // --- Access expressions ---
            SrgKind::MemberAccessExpression => self.build_member_access(node),
            SrgKind::NullableMemberAccessExpression => {
                let child = self.build_child_expression(node, SrgPredicate::AccessChildExpr);
                match self.member_of(node) {
                    Some(member) => Expression::NullableMemberCall {
                        child: Box::new(child),
                        member,
                        arguments: Vec::new(),
                        source: node,
                    },
                    None => child,
                }
            }
            SrgKind::DynamicMemberAccessExpression => Expression::RuntimeFunctionCall {
                function: RuntimeFunction::DynamicAccess,
                arguments: vec![
                    self.build_child_expression(node, SrgPredicate::AccessChildExpr),
                    self.member_name_literal(node),
                ],
                source: node,
            },
            SrgKind::StreamMemberAccessExpression => Expression::RuntimeFunctionCall {
                function: RuntimeFunction::StreamAccess,
                arguments: vec![
                    self.build_child_expression(node, SrgPredicate::AccessChildExpr),
                    self.member_name_literal(node),
                ],
                source: node,
            },

            SrgKind::CastExpression => Expression::RuntimeFunctionCall {
                function: RuntimeFunction::Cast,
                arguments: vec![
                    self.build_child_expression(node, SrgPredicate::AccessChildExpr),
                    Expression::LiteralValue {
                        value: self.scope_graph.resolved_type(node).display(self.tg),
                        source: node,
                    },
                ],
                source: node,
            },

            SrgKind::GenericSpecifierExpression => {
                self.build_child_expression(node, SrgPredicate::AccessChildExpr)
            }

            SrgKind::FunctionCallExpression => self.build_function_call(node),
            SrgKind::SliceExpression => self.build_slice_expression(node),

            // --- Operators ---
            SrgKind::BooleanAndExpression => self.build_boolean_binary(node, "&&"),
            SrgKind::BooleanOrExpression => self.build_boolean_binary(node, "||"),
            SrgKind::BooleanNotExpression | SrgKind::KeywordNotExpression => {
                let child = self.build_child_expression(node, SrgPredicate::UnaryChildExpr);
                let unwrapped = self.unwrap_bool(child, node);
                self.wrap_nominal(
                    Expression::UnaryOperation {
                        operator: "!",
                        child: Box::new(unwrapped),
                        source: node,
                    },
                    self.tg.bool_type_reference(),
                    node,
                )
            }

            SrgKind::NullComparisonExpression => Expression::BinaryOperation {
                left: Box::new(self.build_child_expression(node, SrgPredicate::BinaryLeftExpr)),
                operator: "??",
                right: Box::new(
                    self.build_child_expression(node, SrgPredicate::BinaryRightExpr),
                ),
                source: node,
            },

            SrgKind::IsComparisonExpression => self.build_is_comparison(node),

            SrgKind::AssertNotNullExpression => Expression::RuntimeFunctionCall {
                function: RuntimeFunction::AssertNotNull,
                arguments: vec![
                    self.build_child_expression(node, SrgPredicate::UnaryChildExpr),
                ],
                source: node,
            },

            SrgKind::RootTypeExpression => {
                let child = self.build_child_expression(node, SrgPredicate::UnaryChildExpr);
                let child_node = self
                    .srg
                    .store
                    .get_node(node, SrgPredicate::UnaryChildExpr)
                    .unwrap_or(node);
                let child_type = self.scope_graph.resolved_type(child_node);
                Expression::NominalUnwrapping {
                    value: Box::new(child),
                    value_type: child_type,
                    source: node,
                }
            }

            SrgKind::AwaitExpression => Expression::AwaitPromise {
                value: Box::new(
                    self.build_child_expression(node, SrgPredicate::UnaryChildExpr),
                ),
                source: node,
            },

            SrgKind::BitwiseNotExpression => self.build_unary_operator(node),

            SrgKind::InCollectionExpression => {
                // `value in collection` invokes the contains operator.
                let value = self.build_child_expression(node, SrgPredicate::BinaryLeftExpr);
                let collection =
                    self.build_child_expression(node, SrgPredicate::BinaryRightExpr);
                match self.scope_graph.called_operator(node) {
                    Some(operator) => Expression::MemberCall {
                        child: Box::new(Expression::MemberReference {
                            child: Box::new(collection),
                            member: operator,
                            source: node,
                        }),
                        member: operator,
                        arguments: vec![value],
                        source: node,
                    },
                    None => collection,
                }
            }

            SrgKind::SmlExpression => self.build_sml_expression(node),
            SrgKind::SmlText => {
                let text = self.literal_text(node);
                self.wrap_nominal(
                    Expression::LiteralValue {
                        value: text,
                        source: node,
                    },
                    self.tg.string_type_reference(),
                    node,
                )
            }

            _ if native_operator(kind).is_some()
                || matches!(kind, SrgKind::DefineRangeExpression) =>
            {
                self.build_binary_operator(node)
            }

            other => panic!("unexpected expression kind in lowering: {other:?}"),
        }
    }

    fn literal_text(&self, node: NodeId) -> String {
        self.srg
            .store
            .get_str(node, SrgPredicate::LiteralValue)
            .unwrap_or_default()
    }

    fn member_name_literal(&self, node: NodeId) -> Expression {
        Expression::LiteralValue {
            value: format!(
                "'{}'",
                self.srg
                    .store
                    .get_str(node, SrgPredicate::AccessMemberName)
                    .unwrap_or_default()
            ),
            source: node,
        }
    }

    fn type_ref_literal(&self, type_ref: NodeId) -> String {
        match crate::typegraph::resolve_srg_type_ref(self.srg, self.tg, type_ref) {
            Ok(reference) => format!("'{}'", reference.display(self.tg)),
            Err(_) => "'unknown'".to_owned(),
        }
    }

    fn member_of(&self, node: NodeId) -> Option<NodeId> {
        let scope = self.scope_graph.scope_of(node)?;
        let named = scope.named_reference?;
        if named.is_local() {
            return None;
        }
        Some(named.node)
    }

    fn build_identifier(&self, node: NodeId) -> Expression {
        let name = self.literal_text(node);
        let Some(scope) = self.scope_graph.scope_of(node) else {
            return Expression::LocalReference { name, source: node };
        };

        match scope.named_reference {
            Some(named) if !named.is_local() => {
                // A member reference; properties read through a call.
                let member = named.node;
                let parent_type = self
                    .tg
                    .member_parent(member)
                    .map(|parent| match self.tg.store.kind_of::<crate::typegraph::TgKind>(parent)
                    {
                        crate::typegraph::TgKind::Module => TypeReference::Void,
                        _ => self.tg.new_instance_type_reference(parent),
                    })
                    .unwrap_or(TypeReference::Void);
                Expression::StaticMemberReference {
                    member,
                    parent_type,
                    source: node,
                }
            }
            _ => Expression::LocalReference { name, source: node },
        }
    }

    fn build_member_access(&self, node: NodeId) -> Expression {
        let Some(member) = self.member_of(node) else {
            return self.build_child_expression(node, SrgPredicate::AccessChildExpr);
        };

        // Static accesses reference the member through its parent type.
        let child_node = self.srg.store.get_node(node, SrgPredicate::AccessChildExpr);
        let child_is_static = child_node
            .and_then(|child| self.scope_graph.scope_of(child))
            .is_some_and(|child_scope| child_scope.kind == ScopeKind::Static);

        if child_is_static {
            let parent_type = child_node
                .and_then(|child| self.scope_graph.scope_of(child))
                .and_then(|child_scope| child_scope.static_type)
                .unwrap_or(TypeReference::Void);
            return Expression::StaticMemberReference {
                member,
                parent_type,
                source: node,
            };
        }

        let child = self.build_child_expression(node, SrgPredicate::AccessChildExpr);

        // Property accesses are usages: they call the getter.
        let is_property = self
            .tg
            .member_source(member)
            .is_some_and(|source| self.srg.kind(source) == SrgKind::Property);
        if is_property {
            return Expression::MemberCall {
                child: Box::new(child),
                member,
                arguments: Vec::new(),
                source: node,
            };
        }

        Expression::MemberReference {
            child: Box::new(child),
            member,
            source: node,
        }
    }

    fn build_function_call(&self, node: NodeId) -> Expression {
        let child_node = self.srg.store.get_node(node, SrgPredicate::AccessChildExpr);
        let child_scope = child_node.and_then(|child| self.scope_graph.scope_of(child));

        let arguments: Vec<Expression> = self
            .srg
            .store
            .from_node(node)
            .out(&[SrgPredicate::CallArgument])
            .node_ids()
            .into_iter()
            .map(|argument| self.build_expression(argument))
            .collect();

        // A call on a static scope is a type conversion: wrapping into a
        // nominal or structural type, or unwrapping out of one.
        if let Some(child_scope) = &child_scope {
            if child_scope.kind == ScopeKind::Static {
                let target = child_scope
                    .static_type
                    .clone()
                    .unwrap_or(TypeReference::Void);
                let argument = arguments.into_iter().next().unwrap_or(
                    Expression::LiteralValue {
                        value: "null".to_owned(),
                        source: node,
                    },
                );

                let wraps = target.is_normal()
                    && matches!(
                        self.tg.type_kind(target.referred_type_node()),
                        TypeKind::Nominal | TypeKind::Struct
                    );
                if wraps {
                    return Expression::NominalWrapping {
                        value: Box::new(argument),
                        nominal_type: target,
                        source: node,
                    };
                }
                let argument_node = self
                    .srg
                    .store
                    .from_node(node)
                    .out(&[SrgPredicate::CallArgument])
                    .node_ids();
                let value_type = argument_node
                    .first()
                    .map(|argument| self.scope_graph.resolved_type(*argument))
                    .unwrap_or(TypeReference::Void);
                return Expression::NominalUnwrapping {
                    value: Box::new(argument),
                    value_type,
                    source: node,
                };
            }
        }

        let child = self.build_child_expression(node, SrgPredicate::AccessChildExpr);

        // A call to a member lowers to a member call.
        if let Some(child_node) = child_node {
            if let Some(member) = self.member_of(child_node) {
                if self.srg.kind(child_node) == SrgKind::NullableMemberAccessExpression {
                    let receiver =
                        self.build_child_expression(child_node, SrgPredicate::AccessChildExpr);
                    return Expression::NullableMemberCall {
                        child: Box::new(receiver),
                        member,
                        arguments,
                        source: node,
                    };
                }
                return Expression::MemberCall {
                    child: Box::new(child),
                    member,
                    arguments,
                    source: node,
                };
            }
        }

        Expression::InvokeFunction {
            target: Box::new(child),
            arguments,
            source: node,
        }
    }

    fn build_slice_expression(&self, node: NodeId) -> Expression {
        let child = self.build_child_expression(node, SrgPredicate::SliceChildExpr);
        let Some(operator) = self.scope_graph.called_operator(node) else {
            return child;
        };

        let arguments = if self
            .srg
            .store
            .get_node(node, SrgPredicate::SliceIndexExpr)
            .is_some()
        {
            vec![self.build_child_expression(node, SrgPredicate::SliceIndexExpr)]
        } else {
            // Missing bounds are supplied as null.
            vec![
                self.build_child_expression(node, SrgPredicate::SliceLeftExpr),
                self.build_child_expression(node, SrgPredicate::SliceRightExpr),
            ]
        };

        Expression::MemberCall {
            child: Box::new(Expression::MemberReference {
                child: Box::new(child),
                member: operator,
                source: node,
            }),
            member: operator,
            arguments,
            source: node,
        }
    }

    fn build_boolean_binary(&self, node: NodeId, operator: &'static str) -> Expression {
        let left = self.build_unwrapped_bool(node, SrgPredicate::BinaryLeftExpr);
        let right = self.build_unwrapped_bool(node, SrgPredicate::BinaryRightExpr);
        self.wrap_nominal(
            Expression::BinaryOperation {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                source: node,
            },
            self.tg.bool_type_reference(),
            node,
        )
    }

    fn build_is_comparison(&self, node: NodeId) -> Expression {
        let left = self.build_child_expression(node, SrgPredicate::BinaryLeftExpr);

        // `is not null` inverts the check.
        let operator = match self.srg.store.get_node(node, SrgPredicate::BinaryRightExpr) {
            Some(right) if self.srg.kind(right) == SrgKind::KeywordNotExpression => "!=",
            _ => "==",
        };

        self.wrap_nominal(
            Expression::BinaryOperation {
                left: Box::new(left),
                operator,
                right: Box::new(Expression::LiteralValue {
                    value: "null".to_owned(),
                    source: node,
                }),
                source: node,
            },
            self.tg.bool_type_reference(),
            node,
        )
    }

    /// Binary operator lowering with the native-operator optimization:
    /// recognized native operators on primitive nominal types emit a native
    /// operation over the unwrapped operands, re-wrapped under the result
    /// type. Integer division is never optimized.
    fn build_binary_operator(&self, node: NodeId) -> Expression {
        let left = self.build_child_expression(node, SrgPredicate::BinaryLeftExpr);
        let right = self.build_child_expression(node, SrgPredicate::BinaryRightExpr);

        let Some(operator) = self.scope_graph.called_operator(node) else {
            return left;
        };

        let left_node = self.srg.store.get_node(node, SrgPredicate::BinaryLeftExpr);
        let parent_type = left_node
            .map(|left_node| self.scope_graph.resolved_type(left_node))
            .unwrap_or(TypeReference::Void);

        if self.tg.member_is_native(operator) {
            if let Some(optimized) =
                self.build_optimized_binary_operator(node, operator, &parent_type, &left, &right)
            {
                return optimized;
            }
        }

        let call = Expression::MemberCall {
            child: Box::new(Expression::StaticMemberReference {
                member: operator,
                parent_type: parent_type.clone(),
                source: node,
            }),
            member: operator,
            arguments: vec![left, right],
            source: node,
        };

        // Comparisons through a compare() operator test its result against
        // zero.
        if let Some(comparison) = comparison_operator(self.srg.kind(node)) {
            let unwrapped = Expression::NominalUnwrapping {
                value: Box::new(call),
                value_type: self.tg.int_type_reference(),
                source: node,
            };
            return self.wrap_nominal(
                Expression::BinaryOperation {
                    left: Box::new(unwrapped),
                    operator: comparison,
                    right: Box::new(Expression::LiteralValue {
                        value: "0".to_owned(),
                        source: node,
                    }),
                    source: node,
                },
                self.tg.bool_type_reference(),
                node,
            );
        }

        call
    }

    fn build_optimized_binary_operator(
        &self,
        node: NodeId,
        operator: NodeId,
        parent_type: &TypeReference,
        left: &Expression,
        right: &Expression,
    ) -> Option<Expression> {
        let operator_string = native_operator(self.srg.kind(node))?;

        // Only primitive nominal parents are optimized.
        if !parent_type.is_normal()
            || !self.tg.builtins.is_primitive(parent_type.referred_type_node())
        {
            return None;
        }

        let result_type = match self.srg.kind(node) {
            SrgKind::ComparisonEqualsExpression
            | SrgKind::ComparisonNotEqualsExpression
            | SrgKind::ComparisonLTExpression
            | SrgKind::ComparisonLTEExpression
            | SrgKind::ComparisonGTExpression
            | SrgKind::ComparisonGTEExpression => self.tg.bool_type_reference(),
            _ => self
                .tg
                .member_return_type(operator)
                .unwrap_or_else(|| self.tg.any_type_reference())
                .transform_under(parent_type, self.tg),
        };

        let unwrapped_left = Expression::NominalUnwrapping {
            value: Box::new(left.clone()),
            value_type: parent_type.clone(),
            source: node,
        };
        let unwrapped_right = Expression::NominalUnwrapping {
            value: Box::new(right.clone()),
            value_type: parent_type.clone(),
            source: node,
        };

        Some(self.wrap_nominal(
            Expression::BinaryOperation {
                left: Box::new(unwrapped_left),
                operator: operator_string,
                right: Box::new(unwrapped_right),
                source: node,
            },
            result_type,
            node,
        ))
    }

    fn build_unary_operator(&self, node: NodeId) -> Expression {
        let child = self.build_child_expression(node, SrgPredicate::UnaryChildExpr);
        let Some(operator) = self.scope_graph.called_operator(node) else {
            return child;
        };

        let child_node = self.srg.store.get_node(node, SrgPredicate::UnaryChildExpr);
        let parent_type = child_node
            .map(|child_node| self.scope_graph.resolved_type(child_node))
            .unwrap_or(TypeReference::Void);

        if self.tg.member_is_native(operator) && parent_type.is_normal() {
            let result_type = self
                .tg
                .member_return_type(operator)
                .unwrap_or_else(|| self.tg.any_type_reference())
                .transform_under(&parent_type, self.tg);
            let unwrapped = Expression::NominalUnwrapping {
                value: Box::new(child),
                value_type: parent_type,
                source: node,
            };
            return self.wrap_nominal(
                Expression::UnaryOperation {
                    operator: "~",
                    child: Box::new(unwrapped),
                    source: node,
                },
                result_type,
                node,
            );
        }

        Expression::MemberCall {
            child: Box::new(Expression::StaticMemberReference {
                member: operator,
                parent_type,
                source: node,
            }),
            member: operator,
            arguments: vec![child],
            source: node,
        }
    }

    /// SML lowers to an invocation of the tag factory with the attribute
    /// values followed by the children.
    fn build_sml_expression(&self, node: NodeId) -> Expression {
        let tag = self.build_child_expression(node, SrgPredicate::SmlTagExpr);

        let mut arguments = Vec::new();
        for attribute in self
            .srg
            .store
            .from_node(node)
            .out(&[SrgPredicate::SmlAttributeRef])
            .node_ids()
        {
            arguments.push(self.build_child_expression(attribute, SrgPredicate::SmlAttributeValue));
        }
        for child in self
            .srg
            .store
            .from_node(node)
            .out(&[SrgPredicate::SmlChild])
            .node_ids()
        {
            arguments.push(self.build_expression(child));
        }

        Expression::InvokeFunction {
            target: Box::new(tag),
            arguments,
            source: node,
        }
    }
}
