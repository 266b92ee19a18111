//! The scope graph: per-node semantic analysis results.
//!
//! Every scopable SRG node receives a [`ScopeInfo`] describing its validity,
//! resolved type, references, and side labels. Handlers are selected on node
//! kind; construction runs in parallel over the entrypoint implementations
//! with a shared per-node cache, and results are installed through a modifier
//! in bulk.

mod builder;
mod context;
mod proto;

mod scope_access;
mod scope_literals;
mod scope_members;
mod scope_ops;
mod scope_statements;

#[cfg(test)]
mod scopegraph_tests;

use serulian_graph::GraphStore;
use serulian_graph::store::{KindToken, Layer, NodeId, PredicateToken};

use crate::diagnostics::Diagnostics;
use crate::source::SourceRange;
use crate::srg::Srg;

pub use builder::build_scope_graph;
pub use context::{AccessOption, ScopeContext};
pub use proto::{NamedReference, ScopeInfo, ScopeKind, ScopeLabel};

/// Node kinds in the scope layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ScopeNodeKind {
    ResolvedScope = 0,
    Error,
    Warning,
    SecondaryLabel,

    #[doc(hidden)]
    __Last,
}

impl KindToken for ScopeNodeKind {
    const LAYER: Layer = Layer::Scope;

    #[inline]
    fn to_raw(self) -> u16 {
        self as u16
    }

    #[inline]
    fn from_raw(raw: u16) -> Self {
        assert!(raw < ScopeNodeKind::__Last as u16);
        // SAFETY: bounds-checked above; ScopeNodeKind is repr(u16).
        unsafe { std::mem::transmute::<u16, ScopeNodeKind>(raw) }
    }
}

/// Edge predicates in the scope layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ScopePredicate {
    /// Tagged [`ScopeInfo`] payload on a resolved-scope node.
    ScopeInfo = 0,
    /// Back-edge from a resolved-scope node to its SRG source.
    ScopeSource,
    /// Message on an error or warning node.
    NoticeMessage,
    /// Back-edge from an error or warning to the offending SRG node.
    NoticeSource,
    /// Value of a secondary label node.
    LabelValue,
    /// Back-edge from a secondary label to its SRG node.
    LabelSource,

    #[doc(hidden)]
    __Last,
}

impl PredicateToken for ScopePredicate {
    const LAYER: Layer = Layer::Scope;

    #[inline]
    fn to_raw(self) -> u16 {
        self as u16
    }

    #[inline]
    fn from_raw(raw: u16) -> Self {
        assert!(raw < ScopePredicate::__Last as u16);
        // SAFETY: bounds-checked above; ScopePredicate is repr(u16).
        unsafe { std::mem::transmute::<u16, ScopePredicate>(raw) }
    }

    fn name(self) -> &'static str {
        match self {
            ScopePredicate::ScopeInfo => "scope-info",
            ScopePredicate::ScopeSource => "scope-source",
            ScopePredicate::NoticeMessage => "notice-message",
            ScopePredicate::NoticeSource => "notice-source",
            ScopePredicate::LabelValue => "label-value",
            ScopePredicate::LabelSource => "label-source",
            ScopePredicate::__Last => unreachable!(),
        }
    }
}

/// The completed scope graph: a facade over scope results plus the collected
/// diagnostics.
pub struct ScopeGraph<'g> {
    pub store: &'g GraphStore,
    /// True iff every scoped node was valid.
    pub status: bool,
}

impl<'g> ScopeGraph<'g> {
    /// The scope info installed for the given SRG node, if any.
    pub fn scope_of(&self, srg_node: NodeId) -> Option<ScopeInfo> {
        let scope_node = self
            .store
            .incoming(srg_node, ScopePredicate::ScopeSource)
            .into_iter()
            .next()?;
        self.store.get_tagged(scope_node, ScopePredicate::ScopeInfo)
    }

    /// The secondary labels attached to the given SRG node.
    pub fn labels_of(&self, srg_node: NodeId) -> Vec<ScopeLabel> {
        self.store
            .incoming(srg_node, ScopePredicate::LabelSource)
            .into_iter()
            .filter_map(|label_node| {
                self.store
                    .get_tagged::<_, ScopeLabel>(label_node, ScopePredicate::LabelValue)
            })
            .collect()
    }

    /// Collects all scope errors and warnings, located via the SRG.
    pub fn collect_diagnostics(&self, srg: &Srg<'g>) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();

        for error in self.store.nodes_of_kind(ScopeNodeKind::Error) {
            if let Some(location) = self.notice_location(srg, error) {
                let message = self
                    .store
                    .get_str(error, ScopePredicate::NoticeMessage)
                    .unwrap_or_default();
                diagnostics.error(location, message);
            }
        }
        for warning in self.store.nodes_of_kind(ScopeNodeKind::Warning) {
            if let Some(location) = self.notice_location(srg, warning) {
                let message = self
                    .store
                    .get_str(warning, ScopePredicate::NoticeMessage)
                    .unwrap_or_default();
                diagnostics.warning(location, message);
            }
        }

        diagnostics.sort();
        diagnostics
    }

    fn notice_location(&self, srg: &Srg<'g>, notice: NodeId) -> Option<SourceRange> {
        let source = self.store.get_node(notice, ScopePredicate::NoticeSource)?;
        Some(srg.node_location(source))
    }

    /// The called operator recorded for an SRG expression, as a TG node.
    pub fn called_operator(&self, srg_node: NodeId) -> Option<NodeId> {
        self.scope_of(srg_node)?.called_operator
    }

    /// The resolved type of an SRG expression.
    pub fn resolved_type(&self, srg_node: NodeId) -> crate::typegraph::TypeReference {
        self.scope_of(srg_node)
            .map(|scope| scope.resolved_type)
            .unwrap_or(crate::typegraph::TypeReference::Void)
    }
}
