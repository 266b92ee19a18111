//! Structural containment search over the SRG.

use serulian_graph::store::NodeId;

use crate::source::InputSource;
use crate::sourceshape::{SrgKind, SrgPredicate};

use super::Srg;

/// Whether a containment search may return the starting node itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainmentOption {
    Inclusive,
    Exclusive,
}

impl Srg<'_> {
    /// Finds the innermost node of one of the given kinds whose range
    /// contains `position` in `source`.
    pub fn containing_node(
        &self,
        source: &InputSource,
        position: u32,
        kinds: &[SrgKind],
    ) -> Option<NodeId> {
        let source_str = source.as_str().to_owned();
        let candidates = self
            .store
            .find_nodes_of_kind(kinds)
            .filter_by(move |store, node| {
                let matches_source = store
                    .get_str(node, SrgPredicate::Source)
                    .is_some_and(|s| s == source_str);
                if !matches_source {
                    return false;
                }
                let start = store.get_int(node, SrgPredicate::StartRune).unwrap_or(0) as u32;
                let end = store.get_int(node, SrgPredicate::EndRune).unwrap_or(0) as u32;
                start <= position && position <= end
            })
            .node_ids();

        // Innermost = greatest start rune.
        candidates.into_iter().max_by_key(|node| {
            self.store
                .get_int(*node, SrgPredicate::StartRune)
                .unwrap_or(0)
        })
    }

    /// The module containing the given node.
    pub fn containing_module(&self, node: NodeId) -> Option<NodeId> {
        self.module_for_source(&self.node_source(node))
    }

    /// The type definition or member containing the given node.
    pub fn containing_type_or_member(
        &self,
        node: NodeId,
        option: ContainmentOption,
    ) -> Option<NodeId> {
        const KINDS: &[SrgKind] = &[
            SrgKind::Class,
            SrgKind::Interface,
            SrgKind::Nominal,
            SrgKind::Struct,
            SrgKind::Agent,
            SrgKind::Variable,
            SrgKind::Field,
            SrgKind::Function,
            SrgKind::Constructor,
            SrgKind::Property,
            SrgKind::Operator,
        ];
        self.containing_with_option(node, KINDS, option)
    }

    /// The innermost implementable (member or lambda) containing the node.
    pub fn containing_implementable(&self, node: NodeId) -> Option<NodeId> {
        const KINDS: &[SrgKind] = &[
            SrgKind::Variable,
            SrgKind::Field,
            SrgKind::Function,
            SrgKind::Constructor,
            SrgKind::Property,
            SrgKind::Operator,
            SrgKind::LambdaExpression,
        ];
        self.containing_with_option(node, KINDS, ContainmentOption::Exclusive)
    }

    /// The type definition containing the given node, if any.
    pub fn containing_type(&self, node: NodeId) -> Option<NodeId> {
        const KINDS: &[SrgKind] = &[
            SrgKind::Class,
            SrgKind::Interface,
            SrgKind::Nominal,
            SrgKind::Struct,
            SrgKind::Agent,
        ];
        self.containing_with_option(node, KINDS, ContainmentOption::Exclusive)
    }

    fn containing_with_option(
        &self,
        node: NodeId,
        kinds: &[SrgKind],
        option: ContainmentOption,
    ) -> Option<NodeId> {
        let source = self.node_source(node);
        let source_str = source.as_str().to_owned();
        let position: u32 = self.node_range(node).start().into();

        let candidates = self
            .store
            .find_nodes_of_kind(kinds)
            .filter_by(move |store, candidate| {
                let matches_source = store
                    .get_str(candidate, SrgPredicate::Source)
                    .is_some_and(|s| s == source_str);
                if !matches_source {
                    return false;
                }
                let start = store.get_int(candidate, SrgPredicate::StartRune).unwrap_or(0) as u32;
                let end = store.get_int(candidate, SrgPredicate::EndRune).unwrap_or(0) as u32;
                start <= position && position <= end
            })
            .node_ids();

        candidates
            .into_iter()
            .filter(|candidate| option == ContainmentOption::Inclusive || *candidate != node)
            .max_by_key(|candidate| {
                self.store
                    .get_int(*candidate, SrgPredicate::StartRune)
                    .unwrap_or(0)
            })
    }
}
