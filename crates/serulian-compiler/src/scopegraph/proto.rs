//! Scope info records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serulian_graph::TaggedValue;
use serulian_graph::store::NodeId;

use crate::typegraph::TypeReference;

/// The kind of a scope: a runtime value, a static (type-level) reference, or
/// a generic parameter reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScopeKind {
    #[default]
    Value,
    Static,
    Generic,
}

/// A reference to the named entity an expression resolves to: either an SRG
/// declaration (parameter, variable, named value) or a TG member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedReference {
    pub node: NodeId,
    pub is_srg_node: bool,
}

impl NamedReference {
    pub fn srg(node: NodeId) -> Self {
        Self {
            node,
            is_srg_node: true,
        }
    }

    pub fn member(node: NodeId) -> Self {
        Self {
            node,
            is_srg_node: false,
        }
    }

    /// Whether the reference names a local (SRG-declared) binding.
    pub fn is_local(&self) -> bool {
        self.is_srg_node
    }
}

/// Side facts attached to scopes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ScopeLabel {
    /// The expression suspends and must be awaited by the state machine.
    MustBeAwaited,
    /// A call that wraps its value into a nominal type without runtime cost.
    NominalShortcutting,
    /// The loop iterates a stream rather than testing a bool.
    StreamLoop,
    /// The loop has no condition expression.
    InfiniteLoop,
    /// The statement block ends with a terminating statement.
    Terminates,
}

impl TaggedValue for ScopeLabel {
    const TAG: &'static str = "scope-label";
}

/// The per-node result of semantic analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeInfo {
    pub is_valid: bool,
    pub kind: ScopeKind,
    /// The type of the value produced by the expression; `void` for
    /// statements.
    pub resolved_type: TypeReference,
    /// The type assignable into this node, when it is a valid l-value.
    pub assignable_type: Option<TypeReference>,
    /// The referenced type, for static references.
    pub static_type: Option<TypeReference>,
    /// The type returned by the scope, for statements that return.
    pub returned_type: Option<TypeReference>,
    /// The declared entity this expression names, when it names one.
    pub named_reference: Option<NamedReference>,
    /// The TG member targeted by a call or SML expression.
    pub targeted_reference: Option<NodeId>,
    /// The TG operator implicitly invoked by this expression.
    pub called_operator: Option<NodeId>,
    pub labels: BTreeSet<ScopeLabel>,
}

impl TaggedValue for ScopeInfo {
    const TAG: &'static str = "scope-info";
}

impl ScopeInfo {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            kind: ScopeKind::Value,
            resolved_type: TypeReference::Void,
            assignable_type: None,
            static_type: None,
            returned_type: None,
            named_reference: None,
            targeted_reference: None,
            called_operator: None,
            labels: BTreeSet::new(),
        }
    }

    pub fn invalid() -> Self {
        Self {
            is_valid: false,
            ..Self::valid()
        }
    }

    pub fn resolving(mut self, resolved_type: TypeReference) -> Self {
        self.resolved_type = resolved_type;
        self
    }

    pub fn assignable(mut self, assignable_type: TypeReference) -> Self {
        self.assignable_type = Some(assignable_type);
        self
    }

    pub fn static_of(mut self, static_type: TypeReference) -> Self {
        self.kind = ScopeKind::Static;
        self.static_type = Some(static_type);
        self
    }

    pub fn generic_of(mut self, static_type: TypeReference) -> Self {
        self.kind = ScopeKind::Generic;
        self.static_type = Some(static_type);
        self
    }

    pub fn returning(mut self, returned_type: TypeReference) -> Self {
        self.returned_type = Some(returned_type);
        self
    }

    pub fn named(mut self, reference: NamedReference) -> Self {
        self.named_reference = Some(reference);
        self
    }

    pub fn targeting(mut self, member: NodeId) -> Self {
        self.targeted_reference = Some(member);
        self
    }

    pub fn calling_operator(mut self, operator: NodeId) -> Self {
        self.called_operator = Some(operator);
        self
    }

    pub fn labeled(mut self, label: ScopeLabel) -> Self {
        self.labels.insert(label);
        self
    }

    pub fn has_label(&self, label: ScopeLabel) -> bool {
        self.labels.contains(&label)
    }
}
