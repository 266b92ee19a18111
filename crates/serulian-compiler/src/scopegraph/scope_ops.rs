//! Scoping of operator expressions.
//!
//! For every kind of binary expression, the scope computes the called
//! operator (a member of the left operand's type) and stores it in
//! `called_operator`; the code DOM recognizes native primitive operators and
//! lowers them without the member call.

use serulian_graph::store::NodeId;

use crate::sourceshape::{SrgKind, SrgPredicate};
use crate::typegraph::MemberResolutionKind;

use super::builder::ScopeBuilder;
use super::context::ScopeContext;
use super::proto::{ScopeInfo, ScopeLabel};

impl ScopeBuilder<'_, '_> {
    /// Scopes a binary expression invoking the named operator on the left
    /// operand's type.
    pub(super) fn scope_binary_operator(
        &self,
        node: NodeId,
        operator_name: &str,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let left_scope = self.scope_child(node, SrgPredicate::BinaryLeftExpr, context);
        let right_scope = self.scope_child(node, SrgPredicate::BinaryRightExpr, context);
        if !left_scope.is_valid || !right_scope.is_valid {
            return ScopeInfo::invalid();
        }

        let parent_type = left_scope.resolved_type.clone();
        if parent_type.is_nullable() {
            self.decorate_error(
                node,
                format!(
                    "operator '{operator_name}' cannot be applied to nullable type '{}'",
                    parent_type.display(self.tg)
                ),
            );
            return ScopeInfo::invalid();
        }

        let Some(operator) = self.resolve_operator(node, &parent_type, operator_name) else {
            return ScopeInfo::invalid();
        };

        if let Err(err) = right_scope
            .resolved_type
            .check_subtype_of(&parent_type, self.tg)
        {
            self.decorate_error(
                node,
                format!("operator '{operator_name}' requires matching operand types: {err}"),
            );
            return ScopeInfo::invalid();
        }

        let result = self
            .tg
            .member_return_type(operator)
            .unwrap_or_else(|| self.tg.any_type_reference())
            .transform_under(&parent_type, self.tg);

        ScopeInfo::valid().resolving(result).calling_operator(operator)
    }

    /// Scopes a unary expression invoking the named operator on the child's
    /// type.
    pub(super) fn scope_unary_operator(
        &self,
        node: NodeId,
        operator_name: &str,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let child_scope = self.scope_child(node, SrgPredicate::UnaryChildExpr, context);
        if !child_scope.is_valid {
            return ScopeInfo::invalid();
        }

        let parent_type = child_scope.resolved_type.clone();
        let Some(operator) = self.resolve_operator(node, &parent_type, operator_name) else {
            return ScopeInfo::invalid();
        };

        let result = self
            .tg
            .member_return_type(operator)
            .unwrap_or_else(|| self.tg.any_type_reference())
            .transform_under(&parent_type, self.tg);

        ScopeInfo::valid().resolving(result).calling_operator(operator)
    }

    fn resolve_operator(
        &self,
        node: NodeId,
        parent_type: &crate::typegraph::TypeReference,
        operator_name: &str,
    ) -> Option<NodeId> {
        let module = self.srg.node_source(node);
        let found = parent_type.resolve_member(
            operator_name,
            &module,
            MemberResolutionKind::Operator,
            self.tg,
        );
        if found.is_none() {
            self.decorate_error(
                node,
                format!(
                    "operator '{operator_name}' is not defined on type '{}'",
                    parent_type.display(self.tg)
                ),
            );
        }
        found
    }

    /// `&&` and `||`: both operands must be bool; lowered natively.
    pub(super) fn scope_boolean_binary(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        let left_scope = self.scope_child(node, SrgPredicate::BinaryLeftExpr, context);
        let right_scope = self.scope_child(node, SrgPredicate::BinaryRightExpr, context);
        if !left_scope.is_valid || !right_scope.is_valid {
            return ScopeInfo::invalid();
        }

        let bool_type = self.tg.bool_type_reference();
        let mut is_valid = true;
        for (scope, child_predicate) in [
            (&left_scope, SrgPredicate::BinaryLeftExpr),
            (&right_scope, SrgPredicate::BinaryRightExpr),
        ] {
            if scope.resolved_type.check_subtype_of(&bool_type, self.tg).is_err() {
                if let Some(child) = self.srg.store.get_node(node, child_predicate) {
                    self.decorate_error(
                        child,
                        format!(
                            "boolean operator requires operands of type 'bool', found: {}",
                            scope.resolved_type.display(self.tg)
                        ),
                    );
                }
                is_valid = false;
            }
        }

        if !is_valid {
            return ScopeInfo::invalid();
        }
        ScopeInfo::valid().resolving(bool_type)
    }

    /// `!expr`: the operand must be bool; lowered natively.
    pub(super) fn scope_boolean_unary(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        let child_scope = self.scope_child(node, SrgPredicate::UnaryChildExpr, context);
        if !child_scope.is_valid {
            return ScopeInfo::invalid();
        }

        let bool_type = self.tg.bool_type_reference();
        if child_scope
            .resolved_type
            .check_subtype_of(&bool_type, self.tg)
            .is_err()
        {
            self.decorate_error(
                node,
                format!(
                    "boolean operator requires an operand of type 'bool', found: {}",
                    child_scope.resolved_type.display(self.tg)
                ),
            );
            return ScopeInfo::invalid();
        }

        ScopeInfo::valid().resolving(bool_type)
    }

    /// `not expr`: the keyword form of boolean not.
    pub(super) fn scope_keyword_not(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        self.scope_boolean_unary(node, context)
    }

    /// `==` and `!=`: resolved through the `equals` operator; result bool.
    pub(super) fn scope_equals_expression(
        &self,
        node: NodeId,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let scope = self.scope_binary_operator(node, "equals", context);
        if !scope.is_valid {
            return scope;
        }
        scope.resolving(self.tg.bool_type_reference())
    }

    /// `<`, `<=`, `>`, `>=`: resolved through the `compare` operator; result
    /// bool.
    pub(super) fn scope_comparison_expression(
        &self,
        node: NodeId,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let scope = self.scope_binary_operator(node, "compare", context);
        if !scope.is_valid {
            return scope;
        }
        scope.resolving(self.tg.bool_type_reference())
    }

    /// `a ?? b`: null-coalescing. The left side must be nullable; the result
    /// intersects the unwrapped left with the right.
    pub(super) fn scope_null_comparison(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        let left_scope = self.scope_child(node, SrgPredicate::BinaryLeftExpr, context);
        let right_scope = self.scope_child(node, SrgPredicate::BinaryRightExpr, context);
        if !left_scope.is_valid || !right_scope.is_valid {
            return ScopeInfo::invalid();
        }

        if !left_scope.resolved_type.is_nullable() {
            self.decorate_error(
                node,
                format!(
                    "the ?? operator requires a nullable left operand, found: {}",
                    left_scope.resolved_type.display(self.tg)
                ),
            );
            return ScopeInfo::invalid();
        }

        let result = left_scope
            .resolved_type
            .as_non_nullable()
            .intersect(&right_scope.resolved_type, self.tg);
        ScopeInfo::valid().resolving(result)
    }

    /// `a is null` / `a is not null`: the left side must be nullable; the
    /// result is bool.
    pub(super) fn scope_is_comparison(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        let left_scope = self.scope_child(node, SrgPredicate::BinaryLeftExpr, context);
        if !left_scope.is_valid {
            return ScopeInfo::invalid();
        }

        // The right side must be `null` or `not null`.
        let right_is_null_form = self
            .srg
            .store
            .get_node(node, SrgPredicate::BinaryRightExpr)
            .is_some_and(|right| match self.srg.kind(right) {
                SrgKind::NullLiteralExpression => true,
                SrgKind::KeywordNotExpression => self
                    .srg
                    .store
                    .get_node(right, SrgPredicate::UnaryChildExpr)
                    .is_some_and(|inner| {
                        self.srg.kind(inner) == SrgKind::NullLiteralExpression
                    }),
                _ => false,
            });

        if !right_is_null_form {
            self.decorate_error(
                node,
                "the 'is' operator requires 'null' or 'not null' as its right operand",
            );
            return ScopeInfo::invalid();
        }

        if !left_scope.resolved_type.is_nullable() {
            self.decorate_error(
                node,
                format!(
                    "the 'is' operator requires a nullable left operand, found: {}",
                    left_scope.resolved_type.display(self.tg)
                ),
            );
            return ScopeInfo::invalid();
        }

        ScopeInfo::valid().resolving(self.tg.bool_type_reference())
    }

    /// `value in collection`: invokes the `contains` operator on the
    /// collection's type.
    pub(super) fn scope_in_collection(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        let value_scope = self.scope_child(node, SrgPredicate::BinaryLeftExpr, context);
        let collection_scope = self.scope_child(node, SrgPredicate::BinaryRightExpr, context);
        if !value_scope.is_valid || !collection_scope.is_valid {
            return ScopeInfo::invalid();
        }

        let collection_type = collection_scope.resolved_type.clone();
        let Some(operator) = self.resolve_operator(node, &collection_type, "contains") else {
            return ScopeInfo::invalid();
        };

        let operator_type = self
            .tg
            .member_type(operator)
            .transform_under(&collection_type, self.tg);
        if let Some(parameter) = operator_type.parameters().first() {
            if let Err(err) = value_scope.resolved_type.check_subtype_of(parameter, self.tg) {
                self.decorate_error(node, format!("invalid 'in' operand: {err}"));
                return ScopeInfo::invalid();
            }
        }

        ScopeInfo::valid()
            .resolving(self.tg.bool_type_reference())
            .calling_operator(operator)
    }

    /// `expr!`: asserts the value is non-null.
    pub(super) fn scope_assert_not_null(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        let child_scope = self.scope_child(node, SrgPredicate::UnaryChildExpr, context);
        if !child_scope.is_valid {
            return ScopeInfo::invalid();
        }

        if !child_scope.resolved_type.is_nullable() {
            self.decorate_error(
                node,
                format!(
                    "the ! operator requires a nullable operand, found: {}",
                    child_scope.resolved_type.display(self.tg)
                ),
            );
            return ScopeInfo::invalid();
        }

        ScopeInfo::valid().resolving(child_scope.resolved_type.as_non_nullable())
    }

    /// `&expr`: the root (unwrapped) value of a nominal instance.
    pub(super) fn scope_root_type_expression(
        &self,
        node: NodeId,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let child_scope = self.scope_child(node, SrgPredicate::UnaryChildExpr, context);
        if !child_scope.is_valid {
            return ScopeInfo::invalid();
        }

        let child_type = &child_scope.resolved_type;
        if child_type.is_normal() {
            let type_node = child_type.referred_type_node();
            if self.tg.type_kind(type_node) == crate::typegraph::TypeKind::Nominal {
                if let Some(parent) = self.tg.parent_types(type_node).first() {
                    return ScopeInfo::valid()
                        .resolving(parent.transform_under(child_type, self.tg));
                }
            }
        }

        ScopeInfo::valid().resolving(self.tg.any_type_reference())
    }

    /// `<- expr`: awaits the expression's value.
    pub(super) fn scope_await_expression(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        let child_scope = self.scope_child(node, SrgPredicate::UnaryChildExpr, context);
        if !child_scope.is_valid {
            return ScopeInfo::invalid();
        }

        self.decorate_label(node, ScopeLabel::MustBeAwaited);
        ScopeInfo::valid()
            .resolving(child_scope.resolved_type)
            .labeled(ScopeLabel::MustBeAwaited)
    }
}
