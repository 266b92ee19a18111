//! The scope builder: parallel, cached, handler-per-kind scoping.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;

use dashmap::DashMap;
use rayon::prelude::*;
use serulian_graph::store::NodeId;
use tracing::info_span;

use crate::sourceshape::{SrgKind, SrgPredicate};
use crate::srg::Srg;
use crate::typegraph::{TypeGraph, TypeReference};

use super::context::ScopeContext;
use super::proto::{ScopeInfo, ScopeLabel};
use super::{ScopeGraph, ScopeNodeKind, ScopePredicate};

struct Notice {
    is_error: bool,
    message: String,
    source: NodeId,
}

/// Builds scope info for all implementations, in parallel, with a shared
/// per-node cache.
pub(super) struct ScopeBuilder<'a, 'g> {
    pub srg: &'a Srg<'g>,
    pub tg: &'a TypeGraph<'g>,

    cache: DashMap<NodeId, ScopeInfo>,
    /// Every node's first computed scope, installed into the graph at the
    /// end. Path-sensitive recomputations do not replace the first result.
    installed: DashMap<NodeId, ScopeInfo>,
    in_progress: DashMap<NodeId, ThreadId>,
    notices: Mutex<Vec<Notice>>,
    labels: Mutex<Vec<(NodeId, ScopeLabel)>>,
    status: AtomicBool,
}

/// Runs scoping over the whole program and installs the results.
pub fn build_scope_graph<'g>(srg: &Srg<'g>, tg: &TypeGraph<'g>) -> ScopeGraph<'g> {
    let _span = info_span!("build_scope_graph").entered();

    let builder = ScopeBuilder {
        srg,
        tg,
        cache: DashMap::new(),
        installed: DashMap::new(),
        in_progress: DashMap::new(),
        notices: Mutex::new(Vec::new()),
        labels: Mutex::new(Vec::new()),
        status: AtomicBool::new(true),
    };

    // One task per member: variables and fields scope their own node; other
    // members scope their implementations. Lambda bodies are scoped inline
    // by the lambda expression handler.
    let members = srg.all_members();
    members.par_iter().for_each(|member| {
        match srg.kind(*member) {
            SrgKind::Variable | SrgKind::Field => {
                let context = ScopeContext::for_implementation(*member);
                builder.get_scope(*member, &context);
            }
            _ => {
                for predicate in [
                    SrgPredicate::MemberBody,
                    SrgPredicate::PropertyGetter,
                    SrgPredicate::PropertySetter,
                ] {
                    if let Some(body) = srg.store.get_node(*member, predicate) {
                        let context = ScopeContext::for_implementation(*member);
                        builder.get_scope(body, &context);
                    }
                }
            }
        }
    });

    let status = builder.status.load(Ordering::SeqCst);
    builder.install();

    ScopeGraph {
        store: srg.store,
        status,
    }
}

impl<'a, 'g> ScopeBuilder<'a, 'g> {
    /// Returns the scope for the given node, building it if necessary.
    ///
    /// Results computed under the default path context are cached with
    /// at-most-once evaluation per dependency chain; re-entering a node
    /// already in progress on the same task is a cycle and yields a single
    /// invalid result. A node in progress on another task is computed
    /// locally as well, with the first finished result winning.
    pub fn get_scope(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        if let Some(cached) = self.cache.get(&node) {
            return cached.clone();
        }

        let current = std::thread::current().id();
        if let Some(owner) = self.in_progress.get(&node) {
            if *owner.value() == current {
                // Cycle: the node depends on its own scope.
                self.status.store(false, Ordering::SeqCst);
                return ScopeInfo::invalid();
            }
        }

        self.in_progress.entry(node).or_insert(current);
        let result = self.scope_node(node, context);
        self.in_progress.remove(&node);

        if !result.is_valid {
            self.status.store(false, Ordering::SeqCst);
        }

        // Path-sensitive computations (flow-typed or set-access) are not
        // cached for reuse; they depend on more than the node identity. The
        // first result still installs into the graph.
        let path_sensitive = context.type_overrides.is_some()
            || context.allow_anonymous
            || context.access != super::context::AccessOption::Get;
        if !path_sensitive {
            self.cache.entry(node).or_insert_with(|| result.clone());
        }
        self.installed.entry(node).or_insert_with(|| result.clone());

        result
    }

    /// Dispatches to the handler for the node's kind.
    fn scope_node(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        if let Some(overridden) = context.type_override(node) {
            let inner = self.scope_node_unoverridden(node, context);
            return inner.resolving(overridden);
        }
        self.scope_node_unoverridden(node, context)
    }

    fn scope_node_unoverridden(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        match self.srg.kind(node) {
            // Members.
            SrgKind::Variable => self.scope_declared_value(node, "Variable", true, context),
            SrgKind::Field => self.scope_declared_value(node, "Field", false, context),
            SrgKind::VariableStatement => {
                self.scope_declared_value(node, "Variable", true, context)
            }

            // Statements.
            SrgKind::StatementBlock => self.scope_statement_block(node, context),
            SrgKind::ConditionalStatement => self.scope_conditional_statement(node, context),
            SrgKind::LoopStatement => self.scope_loop_statement(node, context),
            SrgKind::WithStatement => self.scope_with_statement(node, context),
            SrgKind::MatchStatement => self.scope_match_statement(node, context),
            SrgKind::SwitchStatement => self.scope_switch_statement(node, context),
            SrgKind::ReturnStatement => self.scope_return_statement(node, context),
            SrgKind::RejectStatement => self.scope_reject_statement(node, context),
            SrgKind::YieldStatement => self.scope_yield_statement(node, context),
            SrgKind::BreakStatement => self.scope_break_statement(node, context),
            SrgKind::ContinueStatement => self.scope_continue_statement(node, context),
            SrgKind::AssignStatement => self.scope_assign_statement(node, context),
            SrgKind::ExpressionStatement => self.scope_expression_statement(node, context),
            SrgKind::ArrowStatement => self.scope_arrow_statement(node, context),
            SrgKind::ResolveStatement => self.scope_resolve_statement(node, context),
            SrgKind::NamedValue => self.scope_named_value(node, context),
            SrgKind::AssignedValue => self.scope_assigned_value(node, context),

            // Await expression.
            SrgKind::AwaitExpression => self.scope_await_expression(node, context),

            // SML expressions.
            SrgKind::SmlExpression => self.scope_sml_expression(node, context),
            SrgKind::SmlText => self.scope_sml_text(node, context),

            // Access expressions.
            SrgKind::CastExpression => self.scope_cast_expression(node, context),
            SrgKind::MemberAccessExpression => self.scope_member_access(node, context),
            SrgKind::NullableMemberAccessExpression => {
                self.scope_nullable_member_access(node, context)
            }
            SrgKind::DynamicMemberAccessExpression => {
                self.scope_dynamic_member_access(node, context)
            }
            SrgKind::StreamMemberAccessExpression => {
                self.scope_stream_member_access(node, context)
            }
            SrgKind::FunctionCallExpression => self.scope_function_call(node, context),
            SrgKind::SliceExpression => self.scope_slice_expression(node, context),
            SrgKind::GenericSpecifierExpression => self.scope_generic_specifier(node, context),

            // Operator expressions.
            SrgKind::DefineRangeExpression => {
                self.scope_binary_operator(node, "range", context)
            }
            SrgKind::BinaryAddExpression => self.scope_binary_operator(node, "plus", context),
            SrgKind::BinarySubtractExpression => {
                self.scope_binary_operator(node, "minus", context)
            }
            SrgKind::BinaryMultiplyExpression => {
                self.scope_binary_operator(node, "times", context)
            }
            SrgKind::BinaryDivideExpression => self.scope_binary_operator(node, "div", context),
            SrgKind::BinaryModuloExpression => self.scope_binary_operator(node, "mod", context),
            SrgKind::BitwiseAndExpression => self.scope_binary_operator(node, "and", context),
            SrgKind::BitwiseOrExpression => self.scope_binary_operator(node, "or", context),
            SrgKind::BitwiseXorExpression => self.scope_binary_operator(node, "xor", context),
            SrgKind::BitwiseShiftLeftExpression => {
                self.scope_binary_operator(node, "leftshift", context)
            }
            SrgKind::BitwiseShiftRightExpression => {
                self.scope_binary_operator(node, "rightshift", context)
            }
            SrgKind::BitwiseNotExpression => self.scope_unary_operator(node, "not", context),
            SrgKind::BooleanAndExpression => self.scope_boolean_binary(node, context),
            SrgKind::BooleanOrExpression => self.scope_boolean_binary(node, context),
            SrgKind::BooleanNotExpression => self.scope_boolean_unary(node, context),
            SrgKind::KeywordNotExpression => self.scope_keyword_not(node, context),
            SrgKind::ComparisonEqualsExpression => self.scope_equals_expression(node, context),
            SrgKind::ComparisonNotEqualsExpression => {
                self.scope_equals_expression(node, context)
            }
            SrgKind::ComparisonLTExpression => self.scope_comparison_expression(node, context),
            SrgKind::ComparisonLTEExpression => self.scope_comparison_expression(node, context),
            SrgKind::ComparisonGTExpression => self.scope_comparison_expression(node, context),
            SrgKind::ComparisonGTEExpression => self.scope_comparison_expression(node, context),
            SrgKind::NullComparisonExpression => self.scope_null_comparison(node, context),
            SrgKind::IsComparisonExpression => self.scope_is_comparison(node, context),
            SrgKind::InCollectionExpression => self.scope_in_collection(node, context),
            SrgKind::AssertNotNullExpression => self.scope_assert_not_null(node, context),
            SrgKind::RootTypeExpression => self.scope_root_type_expression(node, context),

            // Literal expressions.
            SrgKind::BooleanLiteralExpression => self.scope_boolean_literal(node),
            SrgKind::NumericLiteralExpression => self.scope_numeric_literal(node),
            SrgKind::StringLiteralExpression => self.scope_string_literal(node),
            SrgKind::TemplateStringExpression => self.scope_template_string(node, context),
            SrgKind::NullLiteralExpression => self.scope_null_literal(node),
            SrgKind::ThisLiteralExpression => self.scope_this_literal(node),
            SrgKind::ValLiteralExpression => self.scope_val_literal(node),
            SrgKind::ListLiteralExpression => self.scope_list_literal(node, context),
            SrgKind::MapLiteralExpression => self.scope_map_literal(node, context),
            SrgKind::StructuralNewExpression => self.scope_structural_new(node, context),
            SrgKind::LambdaExpression => self.scope_lambda_expression(node, context),

            // Named expressions.
            SrgKind::IdentifierExpression => self.scope_identifier_expression(node, context),

            // Parser error recovery nodes poison silently; the parse error
            // was already reported.
            SrgKind::ErrorNode => ScopeInfo::invalid(),

            other => panic!("unknown SRG node in scoping: {other:?}"),
        }
    }

    // --- Notices and labels ---

    pub fn decorate_error(&self, node: NodeId, message: impl Into<String>) {
        self.notices.lock().unwrap().push(Notice {
            is_error: true,
            message: message.into(),
            source: node,
        });
    }

    pub fn decorate_warning(&self, node: NodeId, message: impl Into<String>) {
        self.notices.lock().unwrap().push(Notice {
            is_error: false,
            message: message.into(),
            source: node,
        });
    }

    pub fn decorate_label(&self, node: NodeId, label: ScopeLabel) {
        self.labels.lock().unwrap().push((node, label));
    }

    // --- Shared helpers ---

    /// Resolves an SRG type-reference node, reporting failures as scope
    /// errors.
    pub fn resolve_type_ref_or_error(&self, node: NodeId) -> Option<TypeReference> {
        match crate::typegraph::resolve_srg_type_ref(self.srg, self.tg, node) {
            Ok(reference) => Some(reference),
            Err(message) => {
                self.decorate_error(node, message);
                None
            }
        }
    }

    /// Scopes the node found through the given predicate; missing child
    /// yields invalid (a parse error was already reported).
    pub fn scope_child(
        &self,
        node: NodeId,
        predicate: SrgPredicate,
        context: &ScopeContext,
    ) -> ScopeInfo {
        match self.srg.store.get_node(node, predicate) {
            Some(child) => self.get_scope(child, context),
            None => ScopeInfo::invalid(),
        }
    }

    /// Installs all accumulated results into the graph in one batch.
    fn install(self) {
        let mut modifier = self.srg.store.modifier();

        for entry in self.installed.iter() {
            let scope_node = modifier.create_node(ScopeNodeKind::ResolvedScope);
            modifier.decorate_tagged(scope_node, ScopePredicate::ScopeInfo, entry.value());
            modifier.connect(scope_node, ScopePredicate::ScopeSource, *entry.key());
        }

        for notice in self.notices.into_inner().unwrap() {
            let kind = if notice.is_error {
                ScopeNodeKind::Error
            } else {
                ScopeNodeKind::Warning
            };
            let notice_node = modifier.create_node(kind);
            modifier.decorate(notice_node, ScopePredicate::NoticeMessage, notice.message);
            modifier.connect(notice_node, ScopePredicate::NoticeSource, notice.source);
        }

        for (target, label) in self.labels.into_inner().unwrap() {
            let label_node = modifier.create_node(ScopeNodeKind::SecondaryLabel);
            modifier.decorate_tagged(label_node, ScopePredicate::LabelValue, &label);
            modifier.connect(label_node, ScopePredicate::LabelSource, target);
        }

        modifier.apply();
    }
}
