//! Path-expression queries over the graph store.
//!
//! A query is a start set plus a chain of steps (`out`, `in_`, `has`,
//! `is_kind`, `filter_by`). Building the iterator evaluates the chain against
//! a consistent snapshot of the store; the resulting iterator is single-use.
//!
//! Saved predicates are materialized into each result, so a node's outgoing
//! values can be read in one pass without issuing a second query. A node
//! missing a saved predicate is dropped from the results.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::store::{
    GraphStore, KindToken, Layer, NodeId, PredicateToken, RawPredicate, Value, raw_predicate,
};

enum Step<'g> {
    Out(Vec<RawPredicate>),
    In(Vec<RawPredicate>),
    Has(RawPredicate, Vec<Value>),
    IsKind(Layer, Vec<u16>),
    #[allow(clippy::type_complexity)]
    FilterBy(Box<dyn Fn(&GraphStore, NodeId) -> bool + 'g>),
}

enum StartSet {
    Nodes(Vec<NodeId>),
    Values(Vec<Value>),
    Kind(Layer, Vec<u16>),
}

/// A lazily-evaluated path query. Steps accumulate; nothing touches the store
/// until the iterator is built.
pub struct GraphQuery<'g> {
    store: &'g GraphStore,
    start: StartSet,
    steps: Vec<Step<'g>>,
}

impl GraphStore {
    /// Starts a query at the node with the given id.
    pub fn from_node(&self, node: NodeId) -> GraphQuery<'_> {
        GraphQuery {
            store: self,
            start: StartSet::Nodes(vec![node]),
            steps: Vec::new(),
        }
    }

    /// Starts a query at the nodes with the given ids.
    pub fn from_nodes(&self, nodes: Vec<NodeId>) -> GraphQuery<'_> {
        GraphQuery {
            store: self,
            start: StartSet::Nodes(nodes),
            steps: Vec::new(),
        }
    }

    /// Starts a query at arbitrary edge values (typically strings), to be
    /// followed by an `in_` step back to their subjects.
    pub fn from_values(&self, values: Vec<Value>) -> GraphQuery<'_> {
        GraphQuery {
            store: self,
            start: StartSet::Values(values),
            steps: Vec::new(),
        }
    }

    /// Starts a query at all nodes having one of the given kinds.
    pub fn find_nodes_of_kind<K: KindToken>(&self, kinds: &[K]) -> GraphQuery<'_> {
        GraphQuery {
            store: self,
            start: StartSet::Kind(K::LAYER, kinds.iter().map(|k| k.to_raw()).collect()),
            steps: Vec::new(),
        }
    }
}

impl<'g> GraphQuery<'g> {
    /// Follows the given outbound predicates.
    pub fn out<P: PredicateToken>(mut self, predicates: &[P]) -> Self {
        self.steps
            .push(Step::Out(predicates.iter().map(|p| raw_predicate(*p)).collect()));
        self
    }

    /// Follows the given inbound predicates.
    pub fn in_<P: PredicateToken>(mut self, predicates: &[P]) -> Self {
        self.steps
            .push(Step::In(predicates.iter().map(|p| raw_predicate(*p)).collect()));
        self
    }

    /// Filters to nodes that have an edge via `predicate` to one of `values`.
    /// With no values, filters to nodes that have the predicate at all.
    pub fn has<P: PredicateToken>(mut self, predicate: P, values: Vec<Value>) -> Self {
        self.steps.push(Step::Has(raw_predicate(predicate), values));
        self
    }

    /// Filters to nodes of one of the given kinds.
    pub fn is_kind<K: KindToken>(mut self, kinds: &[K]) -> Self {
        self.steps
            .push(Step::IsKind(K::LAYER, kinds.iter().map(|k| k.to_raw()).collect()));
        self
    }

    /// Filters by an arbitrary per-node condition, leaving the cursor at the
    /// current nodes.
    pub fn filter_by(mut self, filter: impl Fn(&GraphStore, NodeId) -> bool + 'g) -> Self {
        self.steps.push(Step::FilterBy(Box::new(filter)));
        self
    }

    /// Executes the query and returns the single resulting node, if any.
    /// With multiple results, the first is returned.
    pub fn try_get_node(self) -> Option<NodeId> {
        self.build_node_iterator().next().map(|found| found.node)
    }

    /// Executes the query and returns the single resulting node. Panics when
    /// the query is empty.
    pub fn get_node(self) -> NodeId {
        self.try_get_node().expect("query returned no nodes")
    }

    /// Executes the query and returns all resulting node ids.
    pub fn node_ids(self) -> Vec<NodeId> {
        self.build_node_iterator().map(|found| found.node).collect()
    }

    /// Executes the query, materializing the given predicates into each
    /// result.
    pub fn build_node_iterator_with<P: PredicateToken>(self, saves: &[P]) -> NodeIterator {
        let raw_saves: Vec<RawPredicate> = saves.iter().map(|p| raw_predicate(*p)).collect();
        self.build(raw_saves)
    }

    /// Executes the query with no extra saved predicates.
    pub fn build_node_iterator(self) -> NodeIterator {
        self.build(Vec::new())
    }

    fn build(self, saves: Vec<RawPredicate>) -> NodeIterator {
        let data = self.store.data.read_recursive();

        // Fast path: single start node, one directional step, nothing saved.
        if saves.is_empty() && self.steps.len() == 1 {
            if let (StartSet::Nodes(nodes), Some(step)) = (&self.start, self.steps.first()) {
                if let [node] = nodes[..] {
                    let direct = match step {
                        Step::Out(preds) if preds.len() == 1 => Some(
                            data.out
                                .get(&(node, preds[0]))
                                .map(|values| {
                                    values.iter().filter_map(Value::as_node).collect::<Vec<_>>()
                                })
                                .unwrap_or_default(),
                        ),
                        Step::In(preds) if preds.len() == 1 => Some(
                            data.inbound
                                .get(&(preds[0], Value::Node(node)))
                                .map(|ids| ids.to_vec())
                                .unwrap_or_default(),
                        ),
                        _ => None,
                    };

                    if let Some(nodes) = direct {
                        let results = nodes
                            .into_iter()
                            .filter_map(|id| {
                                data.nodes.get(&id).map(|nd| FoundNode {
                                    node: id,
                                    layer: nd.layer,
                                    kind_raw: nd.kind,
                                    values: FxHashMap::default(),
                                })
                            })
                            .collect::<Vec<_>>();
                        return NodeIterator {
                            results: results.into_iter(),
                        };
                    }
                }
            }
        }

        let mut current: Vec<Value> = match &self.start {
            StartSet::Nodes(nodes) => nodes.iter().copied().map(Value::Node).collect(),
            StartSet::Values(values) => values.clone(),
            StartSet::Kind(layer, kinds) => kinds
                .iter()
                .flat_map(|kind| {
                    data.by_kind
                        .get(&(*layer, *kind))
                        .into_iter()
                        .flatten()
                        .copied()
                        .map(Value::Node)
                })
                .collect(),
        };

        for step in &self.steps {
            current = match step {
                Step::Out(preds) => current
                    .iter()
                    .filter_map(Value::as_node)
                    .flat_map(|node| {
                        let data = &data;
                        preds.iter().flat_map(move |pred| {
                            data.out.get(&(node, *pred)).into_iter().flatten().cloned()
                        })
                    })
                    .collect(),
                Step::In(preds) => current
                    .iter()
                    .flat_map(|value| {
                        preds.iter().flat_map(|pred| {
                            data.inbound
                                .get(&(*pred, value.clone()))
                                .into_iter()
                                .flatten()
                                .copied()
                                .map(Value::Node)
                        })
                    })
                    .collect(),
                Step::Has(pred, values) => current
                    .into_iter()
                    .filter(|value| {
                        let Some(node) = value.as_node() else {
                            return false;
                        };
                        match data.out.get(&(node, *pred)) {
                            Some(found) => {
                                values.is_empty() || found.iter().any(|v| values.contains(v))
                            }
                            None => false,
                        }
                    })
                    .collect(),
                Step::IsKind(layer, kinds) => current
                    .into_iter()
                    .filter(|value| {
                        value
                            .as_node()
                            .and_then(|node| data.nodes.get(&node))
                            .is_some_and(|nd| nd.layer == *layer && kinds.contains(&nd.kind))
                    })
                    .collect(),
                Step::FilterBy(filter) => current
                    .into_iter()
                    .filter(|value| {
                        value.as_node().is_some_and(|node| filter(self.store, node))
                    })
                    .collect(),
            };
        }

        // Deduplicate, preserving first-seen order, and materialize saves.
        let mut seen = FxHashSet::default();
        let mut results = Vec::new();
        'next: for value in current {
            let Some(node) = value.as_node() else { continue };
            if !seen.insert(node) {
                continue;
            }
            let Some(nd) = data.nodes.get(&node) else { continue };

            let mut values = FxHashMap::default();
            for save in &saves {
                match data.out.get(&(node, *save)).and_then(|v| v.first()) {
                    Some(found) => {
                        values.insert(save.0, found.clone());
                    }
                    // Matches the store contract: saving an absent predicate
                    // drops the node from the results.
                    None => continue 'next,
                }
            }

            results.push(FoundNode {
                node,
                layer: nd.layer,
                kind_raw: nd.kind,
                values,
            });
        }

        NodeIterator {
            results: results.into_iter(),
        }
    }
}

/// A single query result: the node, its kind, and any saved predicate values.
#[derive(Debug, Clone)]
pub struct FoundNode {
    pub node: NodeId,
    pub layer: Layer,
    kind_raw: u16,
    values: FxHashMap<u32, Value>,
}

impl FoundNode {
    pub fn kind<K: KindToken>(&self) -> K {
        assert_eq!(self.layer, K::LAYER, "node layer mismatch");
        K::from_raw(self.kind_raw)
    }

    /// The saved value for the given predicate, if it was requested at build
    /// time.
    pub fn value<P: PredicateToken>(&self, predicate: P) -> Option<&Value> {
        self.values.get(&raw_predicate(predicate).0)
    }
}

/// Single-use iterator over query results.
pub struct NodeIterator {
    results: std::vec::IntoIter<FoundNode>,
}

impl Iterator for NodeIterator {
    type Item = FoundNode;

    fn next(&mut self) -> Option<FoundNode> {
        self.results.next()
    }
}
