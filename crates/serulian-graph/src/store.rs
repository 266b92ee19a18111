//! Layered triple store.
//!
//! Nodes carry a layer and a kind tag; edges are `(subject, predicate, value)`
//! with string, integer, node-reference, or tagged payloads. All mutation goes
//! through a [`Modifier`], which batches edits and promotes them atomically
//! under a single write lock. Compilation writes graphs monotonically within a
//! run, so edge deletion is not supported.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::tagged::TaggedValue;

/// Identifier for a node in the graph. Unique across all layers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// The graph layers. Every node belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Layer {
    /// Parsed source: modules, type definitions, members, statements, expressions.
    SourceRepresentation,
    /// The resolved type universe.
    TypeDefinition,
    /// Scope results, errors, warnings, and secondary labels.
    Scope,
}

/// Raw-tag conversion for layer-specific kind enums. `repr(u16)` enums
/// implement this so the store can hold kinds without generics.
pub trait KindToken: Copy + Eq + std::fmt::Debug {
    const LAYER: Layer;

    fn to_raw(self) -> u16;
    fn from_raw(raw: u16) -> Self;
}

/// Raw-tag conversion for layer-specific predicate enums.
pub trait PredicateToken: Copy + Eq + std::fmt::Debug {
    const LAYER: Layer;

    fn to_raw(self) -> u16;
    fn from_raw(raw: u16) -> Self;

    /// The human-readable predicate name, for diagnostics and dumps.
    fn name(self) -> &'static str;
}

/// Layer-qualified predicate, as stored on edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawPredicate(pub(crate) u32);

pub(crate) fn raw_predicate<P: PredicateToken>(predicate: P) -> RawPredicate {
    RawPredicate(((P::LAYER as u32) << 16) | predicate.to_raw() as u32)
}

/// An edge value: a node reference, a string, an integer, or a tagged payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Node(NodeId),
    Str(String),
    Int(i64),
    /// Structured payload: tag name plus its JSON encoding. Decoded via
    /// [`TaggedValue`].
    Tagged { tag: &'static str, json: String },
}

impl Value {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Decodes a tagged payload. Panics on tag mismatch: a wrong tag here
    /// means a phase stored the wrong payload kind, which is unrecoverable.
    pub fn decode_tagged<T: TaggedValue>(&self) -> T {
        match self {
            Value::Tagged { tag, json } => {
                assert_eq!(*tag, T::TAG, "tagged value kind mismatch");
                T::decode(json)
            }
            other => panic!("expected tagged value, found {other:?}"),
        }
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Node(id)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeData {
    pub layer: Layer,
    pub kind: u16,
}

#[derive(Default)]
pub(crate) struct GraphData {
    pub nodes: FxHashMap<NodeId, NodeData>,
    pub out: FxHashMap<(NodeId, RawPredicate), SmallVec<[Value; 2]>>,
    pub inbound: FxHashMap<(RawPredicate, Value), SmallVec<[NodeId; 2]>>,
    pub by_kind: FxHashMap<(Layer, u16), Vec<NodeId>>,
}

/// The shared graph store. One per compilation; there is no process-wide
/// state.
#[derive(Default)]
pub struct GraphStore {
    pub(crate) data: RwLock<GraphData>,
    next_id: AtomicU32,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new modifier for batching writes against this store.
    pub fn modifier(&self) -> Modifier<'_> {
        Modifier {
            store: self,
            new_nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// The kind of the given node. Panics if the node does not exist or
    /// belongs to a different layer than `K`.
    pub fn kind_of<K: KindToken>(&self, node: NodeId) -> K {
        let data = self.data.read_recursive();
        let nd = data.nodes.get(&node).expect("unknown node id");
        assert_eq!(nd.layer, K::LAYER, "node layer mismatch");
        K::from_raw(nd.kind)
    }

    pub fn layer_of(&self, node: NodeId) -> Layer {
        self.data.read_recursive().nodes.get(&node).expect("unknown node id").layer
    }

    /// The first value of the given predicate on the node, if any.
    pub fn get<P: PredicateToken>(&self, node: NodeId, predicate: P) -> Option<Value> {
        let data = self.data.read_recursive();
        data.out
            .get(&(node, raw_predicate(predicate)))
            .and_then(|values| values.first().cloned())
    }

    /// All values of the given predicate on the node, in insertion order.
    pub fn get_all<P: PredicateToken>(&self, node: NodeId, predicate: P) -> Vec<Value> {
        let data = self.data.read_recursive();
        data.out
            .get(&(node, raw_predicate(predicate)))
            .map(|values| values.to_vec())
            .unwrap_or_default()
    }

    pub fn get_str<P: PredicateToken>(&self, node: NodeId, predicate: P) -> Option<String> {
        self.get(node, predicate)
            .and_then(|v| v.as_str().map(str::to_owned))
    }

    pub fn get_node<P: PredicateToken>(&self, node: NodeId, predicate: P) -> Option<NodeId> {
        self.get(node, predicate).and_then(|v| v.as_node())
    }

    pub fn get_int<P: PredicateToken>(&self, node: NodeId, predicate: P) -> Option<i64> {
        self.get(node, predicate).and_then(|v| v.as_int())
    }

    pub fn get_tagged<P: PredicateToken, T: TaggedValue>(
        &self,
        node: NodeId,
        predicate: P,
    ) -> Option<T> {
        self.get(node, predicate).map(|v| v.decode_tagged::<T>())
    }

    /// Nodes pointing at `node` through `predicate`.
    pub fn incoming<P: PredicateToken>(&self, node: NodeId, predicate: P) -> Vec<NodeId> {
        let data = self.data.read_recursive();
        data.inbound
            .get(&(raw_predicate(predicate), Value::Node(node)))
            .map(|ids| ids.to_vec())
            .unwrap_or_default()
    }

    /// All nodes of the given kind, in creation order.
    pub fn nodes_of_kind<K: KindToken>(&self, kind: K) -> Vec<NodeId> {
        let data = self.data.read_recursive();
        data.by_kind
            .get(&(K::LAYER, kind.to_raw()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.data.read_recursive().nodes.len()
    }

    fn reserve_id(&self) -> NodeId {
        NodeId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Batched-write handle. Edits are invisible to readers until [`apply`]
/// promotes them all under one write lock; a reader observes either the
/// pre-commit or post-commit state, never a partial one.
///
/// Node ids are assigned at creation time, so batched nodes can be connected
/// to each other before the batch lands.
///
/// [`apply`]: Modifier::apply
pub struct Modifier<'g> {
    store: &'g GraphStore,
    new_nodes: Vec<(NodeId, NodeData)>,
    edges: Vec<(NodeId, RawPredicate, Value)>,
}

impl<'g> Modifier<'g> {
    pub fn create_node<K: KindToken>(&mut self, kind: K) -> NodeId {
        let id = self.store.reserve_id();
        self.new_nodes.push((
            id,
            NodeData {
                layer: K::LAYER,
                kind: kind.to_raw(),
            },
        ));
        id
    }

    pub fn decorate<P: PredicateToken>(
        &mut self,
        node: NodeId,
        predicate: P,
        value: impl Into<Value>,
    ) {
        self.edges.push((node, raw_predicate(predicate), value.into()));
    }

    pub fn decorate_tagged<P: PredicateToken, T: TaggedValue>(
        &mut self,
        node: NodeId,
        predicate: P,
        value: &T,
    ) {
        self.edges.push((
            node,
            raw_predicate(predicate),
            Value::Tagged {
                tag: T::TAG,
                json: value.encode(),
            },
        ));
    }

    pub fn connect<P: PredicateToken>(&mut self, node: NodeId, predicate: P, target: NodeId) {
        self.decorate(node, predicate, Value::Node(target));
    }

    pub fn is_empty(&self) -> bool {
        self.new_nodes.is_empty() && self.edges.is_empty()
    }

    /// Promotes all batched edits into the store atomically.
    pub fn apply(self) {
        if self.is_empty() {
            return;
        }

        let mut data = self.store.data.write();
        for (id, nd) in self.new_nodes {
            data.nodes.insert(id, nd);
            data.by_kind.entry((nd.layer, nd.kind)).or_default().push(id);
        }
        for (subject, predicate, value) in self.edges {
            data.inbound
                .entry((predicate, value.clone()))
                .or_default()
                .push(subject);
            data.out.entry((subject, predicate)).or_default().push(value);
        }
    }
}
