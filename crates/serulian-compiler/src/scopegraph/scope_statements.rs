//! Scoping of statements.

use serulian_graph::store::NodeId;

use crate::sourceshape::{SrgKind, SrgPredicate};

use super::builder::ScopeBuilder;
use super::context::{AccessOption, ScopeContext};
use super::proto::{ScopeInfo, ScopeLabel};

impl ScopeBuilder<'_, '_> {
    pub(super) fn scope_statement_block(
        &self,
        node: NodeId,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let mut is_valid = true;
        let mut returned: Option<crate::typegraph::TypeReference> = None;

        for child in self
            .srg
            .store
            .from_node(node)
            .out(&[SrgPredicate::StatementChild])
            .node_ids()
        {
            let child_scope = self.get_scope(child, context);
            is_valid &= child_scope.is_valid;
            if let Some(child_returned) = child_scope.returned_type {
                returned = Some(match returned {
                    Some(existing) => existing.intersect(&child_returned, self.tg),
                    None => child_returned,
                });
            }
        }

        let mut scope = if is_valid {
            ScopeInfo::valid()
        } else {
            ScopeInfo::invalid()
        };
        if let Some(returned) = returned {
            scope = scope.returning(returned);
        }
        scope
    }

    pub(super) fn scope_conditional_statement(
        &self,
        node: NodeId,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let condition_scope = self.scope_child(node, SrgPredicate::ConditionalExpr, context);
        let mut is_valid = condition_scope.is_valid;

        if condition_scope.is_valid
            && condition_scope
                .resolved_type
                .check_subtype_of(&self.tg.bool_type_reference(), self.tg)
                .is_err()
        {
            if let Some(condition) = self.srg.store.get_node(node, SrgPredicate::ConditionalExpr)
            {
                self.decorate_error(
                    condition,
                    format!(
                        "conditional expression must be of type 'bool', found: {}",
                        condition_scope.resolved_type.display(self.tg)
                    ),
                );
            }
            is_valid = false;
        }

        // Flow typing: `x is null` / `x is not null` narrows `x` in the
        // matching branch.
        let (then_context, else_context) = self.null_check_contexts(node, context);

        let then_scope = self.scope_child(node, SrgPredicate::ConditionalThen, &then_context);
        is_valid &= then_scope.is_valid;

        let mut scope = ScopeInfo::valid();
        if let Some(else_node) = self.srg.store.get_node(node, SrgPredicate::ConditionalElse) {
            let else_scope = self.get_scope(else_node, &else_context);
            is_valid &= else_scope.is_valid;

            // Both branches returning means the conditional returns.
            if let (Some(then_returned), Some(else_returned)) =
                (&then_scope.returned_type, &else_scope.returned_type)
            {
                scope = scope.returning(then_returned.intersect(else_returned, self.tg));
            }
        }

        if !is_valid {
            scope.is_valid = false;
        }
        scope
    }

    /// Builds the then/else contexts for a conditional whose test is a null
    /// check on an identifier.
    fn null_check_contexts(
        &self,
        node: NodeId,
        context: &ScopeContext,
    ) -> (ScopeContext, ScopeContext) {
        let Some(condition) = self.srg.store.get_node(node, SrgPredicate::ConditionalExpr) else {
            return (context.clone(), context.clone());
        };
        if self.srg.kind(condition) != SrgKind::IsComparisonExpression {
            return (context.clone(), context.clone());
        }
        let Some(left) = self
            .srg
            .store
            .get_node(condition, SrgPredicate::BinaryLeftExpr)
        else {
            return (context.clone(), context.clone());
        };
        if self.srg.kind(left) != SrgKind::IdentifierExpression {
            return (context.clone(), context.clone());
        }
        let Some(right) = self
            .srg
            .store
            .get_node(condition, SrgPredicate::BinaryRightExpr)
        else {
            return (context.clone(), context.clone());
        };

        let left_scope = self.get_scope(left, context);
        if !left_scope.is_valid {
            return (context.clone(), context.clone());
        }
        let narrowed = left_scope.resolved_type.as_non_nullable();

        // Overrides are keyed by the referenced declaration, so every
        // reference to the narrowed name in the branch picks them up.
        let Some(name) = self.srg.store.get_str(left, SrgPredicate::LiteralValue) else {
            return (context.clone(), context.clone());
        };
        let Some(crate::srg::ScopeOrImport::Named(declaration)) =
            self.srg.resolve_name(&name, left)
        else {
            return (context.clone(), context.clone());
        };

        match self.srg.kind(right) {
            // `x is null`: narrowed in the else branch.
            SrgKind::NullLiteralExpression => (
                context.clone(),
                context.with_type_override(declaration.node, narrowed),
            ),
            // `x is not null`: narrowed in the then branch.
            SrgKind::KeywordNotExpression => (
                context.with_type_override(declaration.node, narrowed),
                context.clone(),
            ),
            _ => (context.clone(), context.clone()),
        }
    }

    pub(super) fn scope_loop_statement(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        let expression = self.srg.store.get_node(node, SrgPredicate::LoopExpr);

        let Some(expression) = expression else {
            // `for { }`: an infinite loop.
            let block_scope = self.scope_child(node, SrgPredicate::LoopBlock, context);
            self.decorate_label(node, ScopeLabel::InfiniteLoop);
            let mut scope = ScopeInfo::valid();
            scope.is_valid = block_scope.is_valid;
            return scope;
        };

        let expression_scope = self.get_scope(expression, context);
        let mut is_valid = expression_scope.is_valid;

        let named_value = self.srg.store.get_node(node, SrgPredicate::LoopNamedValue);

        if expression_scope.is_valid {
            let resolved = &expression_scope.resolved_type;
            let is_stream = resolved.is_normal()
                && resolved.referred_type_node() == self.tg.builtins.stream_type;

            if named_value.is_some() {
                if is_stream {
                    self.decorate_label(node, ScopeLabel::StreamLoop);
                } else {
                    self.decorate_error(
                        expression,
                        format!(
                            "loop iteration requires a stream, found: {}",
                            resolved.display(self.tg)
                        ),
                    );
                    is_valid = false;
                }
            } else if resolved
                .check_subtype_of(&self.tg.bool_type_reference(), self.tg)
                .is_err()
            {
                self.decorate_error(
                    expression,
                    format!(
                        "loop conditional expression must be of type 'bool', found: {}",
                        resolved.display(self.tg)
                    ),
                );
                is_valid = false;
            }
        }

        if let Some(named_value) = named_value {
            let named_scope = self.get_scope(named_value, context);
            is_valid &= named_scope.is_valid;
        }

        let block_scope = self.scope_child(node, SrgPredicate::LoopBlock, context);
        is_valid &= block_scope.is_valid;

        let mut scope = ScopeInfo::valid();
        scope.is_valid = is_valid;
        scope
    }

    pub(super) fn scope_with_statement(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        let expression_scope = self.scope_child(node, SrgPredicate::WithExpr, context);
        let mut is_valid = expression_scope.is_valid;

        if let Some(named_value) = self.srg.store.get_node(node, SrgPredicate::WithNamedValue) {
            let named_scope = self.get_scope(named_value, context);
            is_valid &= named_scope.is_valid;
        }

        let block_scope = self.scope_child(node, SrgPredicate::WithBlock, context);
        is_valid &= block_scope.is_valid;

        let mut scope = ScopeInfo::valid();
        scope.is_valid = is_valid;
        if let Some(returned) = block_scope.returned_type {
            scope = scope.returning(returned);
        }
        scope
    }

    pub(super) fn scope_match_statement(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        let expression_scope = self.scope_child(node, SrgPredicate::MatchExpr, context);
        let mut is_valid = expression_scope.is_valid;

        let named_value = self.srg.store.get_node(node, SrgPredicate::MatchNamedValue);

        for case_node in self
            .srg
            .store
            .from_node(node)
            .out(&[SrgPredicate::MatchCaseRef])
            .node_ids()
        {
            let mut case_context = context.clone();

            if let Some(case_type_ref) = self
                .srg
                .store
                .get_node(case_node, SrgPredicate::MatchCaseTypeRef)
            {
                match self.resolve_type_ref_or_error(case_type_ref) {
                    Some(case_type) => {
                        // The matched value must be castable to the case type.
                        if expression_scope.is_valid
                            && case_type
                                .check_subtype_of(&expression_scope.resolved_type, self.tg)
                                .is_err()
                            && expression_scope
                                .resolved_type
                                .check_subtype_of(&case_type, self.tg)
                                .is_err()
                        {
                            self.decorate_error(
                                case_type_ref,
                                format!(
                                    "match case type '{}' cannot match value of type '{}'",
                                    case_type.display(self.tg),
                                    expression_scope.resolved_type.display(self.tg)
                                ),
                            );
                            is_valid = false;
                        }

                        // `as` destructuring narrows the named value within
                        // the case.
                        if let Some(named_value) = named_value {
                            case_context =
                                case_context.with_type_override(named_value, case_type);
                        }
                    }
                    None => is_valid = false,
                }
            }

            let block_scope = self.scope_child(case_node, SrgPredicate::CaseBlock, &case_context);
            is_valid &= block_scope.is_valid;
        }

        if let Some(named_value) = named_value {
            let named_scope = self.get_scope(named_value, context);
            is_valid &= named_scope.is_valid;
        }

        let mut scope = ScopeInfo::valid();
        scope.is_valid = is_valid;
        scope
    }

    pub(super) fn scope_switch_statement(
        &self,
        node: NodeId,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let expression = self.srg.store.get_node(node, SrgPredicate::SwitchExpr);
        let expected_type = match expression {
            Some(expression) => {
                let scope = self.get_scope(expression, context);
                if !scope.is_valid {
                    return ScopeInfo::invalid();
                }
                scope.resolved_type
            }
            // A switch without an expression matches on bool cases.
            None => self.tg.bool_type_reference(),
        };

        let mut is_valid = true;
        for case_node in self
            .srg
            .store
            .from_node(node)
            .out(&[SrgPredicate::SwitchCaseRef])
            .node_ids()
        {
            if let Some(case_expression) =
                self.srg.store.get_node(case_node, SrgPredicate::CaseExpr)
            {
                let case_scope = self.get_scope(case_expression, context);
                is_valid &= case_scope.is_valid;
                if case_scope.is_valid
                    && case_scope
                        .resolved_type
                        .check_subtype_of(&expected_type, self.tg)
                        .is_err()
                {
                    self.decorate_error(
                        case_expression,
                        format!(
                            "switch case expression must be of type '{}', found: {}",
                            expected_type.display(self.tg),
                            case_scope.resolved_type.display(self.tg)
                        ),
                    );
                    is_valid = false;
                }
            }

            let block_scope = self.scope_child(case_node, SrgPredicate::CaseBlock, context);
            is_valid &= block_scope.is_valid;
        }

        let mut scope = ScopeInfo::valid();
        scope.is_valid = is_valid;
        scope
    }

    pub(super) fn scope_return_statement(
        &self,
        node: NodeId,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let expected = self.expected_return_type(context);

        let expression = self.srg.store.get_node(node, SrgPredicate::ReturnExpr);
        let returned_type = match expression {
            Some(expression) => {
                let scope = self.get_scope(expression, context);
                if !scope.is_valid {
                    return ScopeInfo::invalid();
                }
                scope.resolved_type
            }
            None => self.tg.void_type_reference(),
        };

        if let Some(expected) = expected {
            let matches = if expected.is_void() {
                returned_type.is_void()
            } else {
                returned_type.check_subtype_of(&expected, self.tg).is_ok()
            };
            if !matches {
                self.decorate_error(
                    node,
                    format!(
                        "return value must be of type '{}', found: {}",
                        expected.display(self.tg),
                        returned_type.display(self.tg)
                    ),
                );
                return ScopeInfo::invalid();
            }
        }

        ScopeInfo::valid().returning(returned_type)
    }

    /// The declared return type of the member whose implementation is being
    /// scoped.
    fn expected_return_type(&self, context: &ScopeContext) -> Option<crate::typegraph::TypeReference> {
        let member = context.implemented_member?;
        let tg_member = self.tg.member_for_source(member)?;
        self.tg.member_return_type(tg_member)
    }

    pub(super) fn scope_reject_statement(
        &self,
        node: NodeId,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let expression_scope = self.scope_child(node, SrgPredicate::RejectExpr, context);
        let mut scope = ScopeInfo::valid();
        scope.is_valid = expression_scope.is_valid;
        scope
    }

    pub(super) fn scope_yield_statement(
        &self,
        node: NodeId,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let expected = self.expected_return_type(context);

        // The enclosing member must return a stream.
        let Some(expected) = expected.filter(|expected| {
            expected.is_normal()
                && expected.referred_type_node() == self.tg.builtins.stream_type
        }) else {
            self.decorate_error(
                node,
                "yield may only be used under a function returning a stream",
            );
            return ScopeInfo::invalid();
        };

        if let Some(stream_value) = self
            .srg
            .store
            .get_node(node, SrgPredicate::YieldStreamValue)
        {
            // `yield in expr`: the expression must be the same stream type.
            let scope = self.get_scope(stream_value, context);
            if !scope.is_valid {
                return ScopeInfo::invalid();
            }
            if scope.resolved_type.check_subtype_of(&expected, self.tg).is_err() {
                self.decorate_error(
                    stream_value,
                    format!(
                        "yield in expression must be of type '{}', found: {}",
                        expected.display(self.tg),
                        scope.resolved_type.display(self.tg)
                    ),
                );
                return ScopeInfo::invalid();
            }
            return ScopeInfo::valid();
        }

        let value_type = expected.generics().first().cloned().unwrap_or_else(|| {
            self.tg.any_type_reference()
        });

        let expression_scope = self.scope_child(node, SrgPredicate::YieldExpr, context);
        if !expression_scope.is_valid {
            return ScopeInfo::invalid();
        }
        if expression_scope
            .resolved_type
            .check_subtype_of(&value_type, self.tg)
            .is_err()
        {
            self.decorate_error(
                node,
                format!(
                    "yielded value must be of type '{}', found: {}",
                    value_type.display(self.tg),
                    expression_scope.resolved_type.display(self.tg)
                ),
            );
            return ScopeInfo::invalid();
        }

        ScopeInfo::valid()
    }

    pub(super) fn scope_break_statement(&self, node: NodeId, _context: &ScopeContext) -> ScopeInfo {
        self.scope_jump_statement(node, SrgPredicate::BreakLabel, "break")
    }

    pub(super) fn scope_continue_statement(
        &self,
        node: NodeId,
        _context: &ScopeContext,
    ) -> ScopeInfo {
        self.scope_jump_statement(node, SrgPredicate::ContinueLabel, "continue")
    }

    fn scope_jump_statement(
        &self,
        node: NodeId,
        label_predicate: SrgPredicate,
        title: &str,
    ) -> ScopeInfo {
        const JUMPABLE: &[SrgKind] = &[
            SrgKind::LoopStatement,
            SrgKind::SwitchStatement,
            SrgKind::MatchStatement,
        ];

        let source = self.srg.node_source(node);
        let position: u32 = self.srg.node_range(node).start().into();
        let Some(target) = self.srg.containing_node(&source, position, JUMPABLE) else {
            self.decorate_error(
                node,
                format!("'{title}' statement must be under a loop, switch, or match"),
            );
            return ScopeInfo::invalid();
        };

        // With a label, the named enclosing statement must exist.
        if let Some(label) = self.srg.store.get_str(node, label_predicate) {
            let mut current = Some(target);
            while let Some(candidate) = current {
                if self
                    .srg
                    .store
                    .get_str(candidate, SrgPredicate::StatementLabel)
                    .as_deref()
                    == Some(label.as_str())
                {
                    return ScopeInfo::valid();
                }
                let start: u32 = self.srg.node_range(candidate).start().into();
                current = if start == 0 {
                    None
                } else {
                    self.srg.containing_node(&source, start - 1, JUMPABLE)
                };
            }
            self.decorate_error(node, format!("label '{label}' could not be found"));
            return ScopeInfo::invalid();
        }

        ScopeInfo::valid()
    }

    pub(super) fn scope_assign_statement(
        &self,
        node: NodeId,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let target_scope = self.scope_child(
            node,
            SrgPredicate::AssignTarget,
            &context.with_access(AccessOption::Set),
        );
        let value_scope = self.scope_child(node, SrgPredicate::AssignValue, context);

        if !target_scope.is_valid || !value_scope.is_valid {
            return ScopeInfo::invalid();
        }

        let Some(assignable) = target_scope.assignable_type else {
            if let Some(target) = self.srg.store.get_node(node, SrgPredicate::AssignTarget) {
                self.decorate_error(target, "cannot assign to a non-assignable expression");
            }
            return ScopeInfo::invalid();
        };

        if let Err(err) = value_scope.resolved_type.check_subtype_of(&assignable, self.tg) {
            self.decorate_error(node, format!("cannot assign value: {err}"));
            return ScopeInfo::invalid();
        }

        ScopeInfo::valid()
    }

    pub(super) fn scope_expression_statement(
        &self,
        node: NodeId,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let expression_scope =
            self.scope_child(node, SrgPredicate::ExpressionStatementExpr, context);
        let mut scope = ScopeInfo::valid();
        scope.is_valid = expression_scope.is_valid;
        scope
    }

    pub(super) fn scope_arrow_statement(
        &self,
        node: NodeId,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let source_scope = self.scope_child(node, SrgPredicate::ArrowSource, context);
        if !source_scope.is_valid {
            return ScopeInfo::invalid();
        }

        let destination_context = context
            .with_access(AccessOption::Set)
            .with_anonymous_allowed();
        let destination_scope =
            self.scope_child(node, SrgPredicate::ArrowDestination, &destination_context);
        if !destination_scope.is_valid {
            return ScopeInfo::invalid();
        }

        if let Some(assignable) = &destination_scope.assignable_type {
            if let Err(err) = source_scope.resolved_type.check_subtype_of(assignable, self.tg) {
                self.decorate_error(node, format!("cannot assign awaited value: {err}"));
                return ScopeInfo::invalid();
            }
        }

        self.decorate_label(node, ScopeLabel::MustBeAwaited);
        ScopeInfo::valid().labeled(ScopeLabel::MustBeAwaited)
    }

    pub(super) fn scope_resolve_statement(
        &self,
        node: NodeId,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let source_scope = self.scope_child(node, SrgPredicate::ArrowSource, context);
        if !source_scope.is_valid {
            return ScopeInfo::invalid();
        }

        let destination_context = context
            .with_access(AccessOption::Set)
            .with_anonymous_allowed();
        let destination_scope =
            self.scope_child(node, SrgPredicate::ArrowDestination, &destination_context);
        let rejection_scope =
            self.scope_child(node, SrgPredicate::ArrowRejection, &destination_context);

        if !destination_scope.is_valid || !rejection_scope.is_valid {
            return ScopeInfo::invalid();
        }

        if let Some(assignable) = &destination_scope.assignable_type {
            if let Err(err) = source_scope.resolved_type.check_subtype_of(assignable, self.tg) {
                self.decorate_error(node, format!("cannot assign resolved value: {err}"));
                return ScopeInfo::invalid();
            }
        }

        self.decorate_label(node, ScopeLabel::MustBeAwaited);
        ScopeInfo::valid().labeled(ScopeLabel::MustBeAwaited)
    }

    /// A named value exported by a loop, with, or match statement.
    pub(super) fn scope_named_value(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        // Loop named values take the stream's value type; with named values
        // take the expression type.
        if let Some(loop_statement) = self
            .srg
            .store
            .incoming(node, SrgPredicate::LoopNamedValue)
            .into_iter()
            .next()
        {
            let expression_scope =
                self.scope_child(loop_statement, SrgPredicate::LoopExpr, context);
            if !expression_scope.is_valid {
                return ScopeInfo::invalid();
            }
            let resolved = &expression_scope.resolved_type;
            if resolved.is_normal()
                && resolved.referred_type_node() == self.tg.builtins.stream_type
            {
                let value_type = resolved
                    .generics()
                    .first()
                    .cloned()
                    .unwrap_or_else(|| self.tg.any_type_reference());
                return ScopeInfo::valid().resolving(value_type);
            }
            return ScopeInfo::invalid();
        }

        if let Some(with_statement) = self
            .srg
            .store
            .incoming(node, SrgPredicate::WithNamedValue)
            .into_iter()
            .next()
        {
            let expression_scope =
                self.scope_child(with_statement, SrgPredicate::WithExpr, context);
            if !expression_scope.is_valid {
                return ScopeInfo::invalid();
            }
            return ScopeInfo::valid().resolving(expression_scope.resolved_type);
        }

        ScopeInfo::invalid()
    }

    /// The `as` value of a match statement. Case blocks override its type to
    /// the case's type; outside any override it takes the match expression
    /// type.
    pub(super) fn scope_assigned_value(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        if let Some(overridden) = context.type_override(node) {
            return ScopeInfo::valid().resolving(overridden);
        }

        if let Some(match_statement) = self
            .srg
            .store
            .incoming(node, SrgPredicate::MatchNamedValue)
            .into_iter()
            .next()
        {
            let expression_scope =
                self.scope_child(match_statement, SrgPredicate::MatchExpr, context);
            if expression_scope.is_valid {
                return ScopeInfo::valid().resolving(expression_scope.resolved_type);
            }
        }

        ScopeInfo::invalid()
    }
}
