//! The AST construction interface.
//!
//! The grammar emits nodes through [`NodeBuilder`], so the same rules drive
//! both real SRG construction and the dry-run pass used by the
//! version-compatibility driver.

use serulian_graph::store::NodeId;
use serulian_graph::{GraphStore, Modifier};

use crate::sourceshape::{SrgKind, SrgPredicate};

/// Receiver for parsed AST structure.
pub trait NodeBuilder {
    fn create_node(&mut self, kind: SrgKind) -> NodeId;
    fn decorate(&mut self, node: NodeId, predicate: SrgPredicate, value: &str);
    fn decorate_int(&mut self, node: NodeId, predicate: SrgPredicate, value: i64);
    fn connect(&mut self, node: NodeId, predicate: SrgPredicate, target: NodeId);
}

/// Builds SRG nodes through a graph modifier. The modifier is applied by the
/// caller once the module parse completes, making the module's subgraph
/// visible atomically.
pub struct GraphNodeBuilder<'g> {
    modifier: Modifier<'g>,
}

impl<'g> GraphNodeBuilder<'g> {
    pub fn new(store: &'g GraphStore) -> Self {
        Self {
            modifier: store.modifier(),
        }
    }

    pub fn apply(self) {
        self.modifier.apply();
    }
}

impl NodeBuilder for GraphNodeBuilder<'_> {
    fn create_node(&mut self, kind: SrgKind) -> NodeId {
        self.modifier.create_node(kind)
    }

    fn decorate(&mut self, node: NodeId, predicate: SrgPredicate, value: &str) {
        self.modifier.decorate(node, predicate, value);
    }

    fn decorate_int(&mut self, node: NodeId, predicate: SrgPredicate, value: i64) {
        self.modifier.decorate(node, predicate, value);
    }

    fn connect(&mut self, node: NodeId, predicate: SrgPredicate, target: NodeId) {
        self.modifier.connect(node, predicate, target);
    }
}

/// Discards all structure. Used for dry-run parses.
#[derive(Default)]
pub struct NoopNodeBuilder {
    next: u32,
}

impl NoopNodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeBuilder for NoopNodeBuilder {
    fn create_node(&mut self, _kind: SrgKind) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    fn decorate(&mut self, _node: NodeId, _predicate: SrgPredicate, _value: &str) {}

    fn decorate_int(&mut self, _node: NodeId, _predicate: SrgPredicate, _value: i64) {}

    fn connect(&mut self, _node: NodeId, _predicate: SrgPredicate, _target: NodeId) {}
}
