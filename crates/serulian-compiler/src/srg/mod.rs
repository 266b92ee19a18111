//! The source representation graph facade.
//!
//! Wraps the graph store with language-aware queries over parsed modules:
//! structural containment search, import resolution, and lexical name
//! resolution.

mod handler;
mod scopename;
mod structure;

#[cfg(test)]
mod srg_tests;

use serulian_graph::GraphStore;
use serulian_graph::store::NodeId;
use text_size::TextRange;

use crate::loader::{PackageInfo, PackageMap, SourceTracker};
use crate::source::{InputSource, SourceRange};
use crate::sourceshape::{SrgKind, SrgPredicate};

pub use handler::SerulianSourceHandler;
pub use scopename::{NamedScopeKind, ScopeOrImport, SrgNamedScope};
pub use structure::ContainmentOption;

/// Borrowed view over the parsed modules in the graph store.
pub struct Srg<'g> {
    pub store: &'g GraphStore,
    pub package_map: &'g PackageMap,
    pub source_tracker: &'g SourceTracker,
}

impl<'g> Srg<'g> {
    pub fn new(
        store: &'g GraphStore,
        package_map: &'g PackageMap,
        source_tracker: &'g SourceTracker,
    ) -> Self {
        Self {
            store,
            package_map,
            source_tracker,
        }
    }

    /// All module (file) nodes, in creation order.
    pub fn modules(&self) -> Vec<NodeId> {
        self.store.nodes_of_kind(SrgKind::File)
    }

    /// The module node parsed from the given source, if any.
    pub fn module_for_source(&self, source: &InputSource) -> Option<NodeId> {
        self.modules()
            .into_iter()
            .find(|module| self.node_source(*module) == *source)
    }

    pub fn kind(&self, node: NodeId) -> SrgKind {
        self.store.kind_of::<SrgKind>(node)
    }

    /// The source module identifier recorded on the node.
    pub fn node_source(&self, node: NodeId) -> InputSource {
        InputSource::new(
            self.store
                .get_str(node, SrgPredicate::Source)
                .expect("SRG node missing source"),
        )
    }

    /// The rune range recorded on the node.
    pub fn node_range(&self, node: NodeId) -> TextRange {
        let start = self
            .store
            .get_int(node, SrgPredicate::StartRune)
            .expect("SRG node missing start rune") as u32;
        let end = self
            .store
            .get_int(node, SrgPredicate::EndRune)
            .expect("SRG node missing end rune") as u32;
        TextRange::new(start.into(), end.into())
    }

    pub fn node_location(&self, node: NodeId) -> SourceRange {
        SourceRange::new(self.node_source(node), self.node_range(node))
    }

    /// The declared name of a type, member, parameter, or named value node.
    pub fn node_name(&self, node: NodeId) -> Option<String> {
        let predicate = match self.kind(node) {
            kind if kind.is_type_definition() => SrgPredicate::TypeName,
            SrgKind::Generic => SrgPredicate::GenericName,
            SrgKind::Variable | SrgKind::Field | SrgKind::VariableStatement => {
                SrgPredicate::VariableName
            }
            SrgKind::Function | SrgKind::Constructor | SrgKind::Property => {
                SrgPredicate::MemberName
            }
            SrgKind::Operator => SrgPredicate::OperatorName,
            SrgKind::Parameter => SrgPredicate::ParameterName,
            SrgKind::NamedValue | SrgKind::AssignedValue => SrgPredicate::NamedValueName,
            SrgKind::ImportPackage => SrgPredicate::ImportBindingName,
            _ => return None,
        };
        self.store.get_str(node, predicate)
    }

    /// The package imported by an `ImportPackage` binding, through the
    /// import's recorded reference id.
    pub fn imported_package(&self, binding: NodeId) -> Option<&'g PackageInfo> {
        let import = self
            .store
            .incoming(binding, SrgPredicate::ImportPackageRef)
            .into_iter()
            .next()?;
        let location = self.store.get_str(import, SrgPredicate::ImportLocation)?;
        self.package_map.get("", &location)
    }

    /// All implementation roots: member bodies, property accessors, member
    /// initializer expressions, and lambda bodies.
    pub fn entrypoint_implementations(&self) -> Vec<NodeId> {
        let mut implementations = Vec::new();

        for member in self.all_members() {
            for predicate in [
                SrgPredicate::MemberBody,
                SrgPredicate::PropertyGetter,
                SrgPredicate::PropertySetter,
                SrgPredicate::VariableExpression,
            ] {
                if let Some(body) = self.store.get_node(member, predicate) {
                    implementations.push(body);
                }
            }
        }

        for lambda in self.store.nodes_of_kind(SrgKind::LambdaExpression) {
            for predicate in [SrgPredicate::LambdaBlock, SrgPredicate::LambdaExpr] {
                if let Some(body) = self.store.get_node(lambda, predicate) {
                    implementations.push(body);
                }
            }
        }

        implementations
    }

    /// All member nodes: module-level members plus members of every type.
    pub fn all_members(&self) -> Vec<NodeId> {
        let mut members = Vec::new();
        for module in self.modules() {
            for child in self.store.from_node(module).out(&[SrgPredicate::Child]).node_ids() {
                let kind = self.kind(child);
                if kind.is_member() {
                    members.push(child);
                } else if kind.is_type_definition() {
                    members.extend(
                        self.store
                            .from_node(child)
                            .out(&[SrgPredicate::TypeMember])
                            .node_ids(),
                    );
                }
            }
        }
        members
    }

    /// Finds the declaration of `name` exported by a package: a type or
    /// module member declared in any of its modules.
    pub fn resolve_exported_name(
        &self,
        package: &PackageInfo,
        name: &str,
    ) -> Option<SrgNamedScope> {
        for module_path in package.module_paths() {
            let Some(module) = self.module_for_source(module_path) else {
                continue;
            };
            if let Some(found) = self.resolve_module_declaration(module, name) {
                return Some(found);
            }
        }
        None
    }

    /// Finds a declaration with the given name directly under a module.
    pub fn resolve_module_declaration(&self, module: NodeId, name: &str) -> Option<SrgNamedScope> {
        for child in self.store.from_node(module).out(&[SrgPredicate::Child]).node_ids() {
            let kind = self.kind(child);
            if !kind.is_type_definition() && !kind.is_member() {
                continue;
            }
            if self.node_name(child).as_deref() == Some(name) {
                return Some(SrgNamedScope::declaration(kind, child));
            }
        }
        None
    }
}
