//! The scoping context: per-path data carried through handler recursion
//! without polluting the nodes themselves.

use std::sync::{Arc, Mutex};

use rustc_hash::{FxHashMap, FxHashSet};
use serulian_graph::store::NodeId;

use crate::typegraph::TypeReference;

/// The kind of access under which an expression is scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessOption {
    #[default]
    Get,
    Set,
}

/// Context threaded through scoping of one path.
#[derive(Clone, Default)]
pub struct ScopeContext {
    /// Get versus set access for the current expression.
    pub access: AccessOption,

    /// Flow-typing overrides: expression node to narrowed type, installed by
    /// `is` tests and `as` destructures.
    pub type_overrides: Option<Arc<FxHashMap<NodeId, TypeReference>>>,

    /// The SRG member whose implementation is being scoped, for return-type
    /// checks.
    pub implemented_member: Option<NodeId>,

    /// Whether the anonymous identifier `_` is a valid value here. True only
    /// in arrow destinations and resolve rejections.
    pub allow_anonymous: bool,

    /// Records module-level names that must be initialized before the
    /// expression being scoped.
    pub static_dependencies: Option<Arc<Mutex<FxHashSet<NodeId>>>>,
}

impl ScopeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_implementation(member: NodeId) -> Self {
        Self {
            implemented_member: Some(member),
            static_dependencies: Some(Arc::new(Mutex::new(FxHashSet::default()))),
            ..Self::default()
        }
    }

    pub fn with_access(&self, access: AccessOption) -> Self {
        Self {
            access,
            ..self.clone()
        }
    }

    pub fn with_anonymous_allowed(&self) -> Self {
        Self {
            allow_anonymous: true,
            ..self.clone()
        }
    }

    /// Returns the context with the type of the given expression overridden.
    pub fn with_type_override(&self, node: NodeId, type_ref: TypeReference) -> Self {
        let mut overrides: FxHashMap<NodeId, TypeReference> = self
            .type_overrides
            .as_deref()
            .cloned()
            .unwrap_or_default();
        overrides.insert(node, type_ref);
        Self {
            type_overrides: Some(Arc::new(overrides)),
            ..self.clone()
        }
    }

    pub fn type_override(&self, node: NodeId) -> Option<TypeReference> {
        self.type_overrides.as_ref()?.get(&node).cloned()
    }

    /// Records a static dependency on a module-level member.
    pub fn record_static_dependency(&self, member: NodeId) {
        if let Some(dependencies) = &self.static_dependencies {
            dependencies.lock().unwrap().insert(member);
        }
    }
}
