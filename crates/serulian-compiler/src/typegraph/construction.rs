//! Type graph construction.
//!
//! Constructors contribute to the graph in four passes - modules, types,
//! dependencies, members - followed by validation. Each pass applies its
//! modifier before the next begins, so later passes query a complete view of
//! the earlier ones.

use rustc_hash::FxHashMap;
use serulian_graph::GraphStore;
use serulian_graph::store::NodeId;
use tracing::info_span;

use crate::diagnostics::Diagnostics;
use crate::source::SourceRange;

use super::builtins::define_builtins;
use super::signature::MemberSignature;
use super::typeref::TypeReference;
use super::{TgKind, TgPredicate, TypeGraph};

/// A contributor of modules, types, and members to the type graph. The SRG
/// constructor is the production implementation; foreign type systems and
/// test doubles provide others.
pub trait TypeGraphConstructor {
    fn define_modules(&self, builder: &mut ModuleBuilder<'_, '_>);
    fn define_types(&self, builder: &mut TypeBuilder<'_, '_>);
    fn define_dependencies(&self, annotator: &mut DependencyAnnotator<'_, '_>, tg: &TypeGraph<'_>);
    fn define_members(&self, builder: &mut MemberBuilder<'_, '_>, tg: &TypeGraph<'_>);
    fn validate(&self, reporter: &mut ValidationReporter<'_>, tg: &TypeGraph<'_>);
}

/// Builds the type graph from the given constructors. Returns the facade and
/// all diagnostics raised during construction and validation.
pub fn build_type_graph<'g>(
    store: &'g GraphStore,
    constructors: &[&dyn TypeGraphConstructor],
) -> (TypeGraph<'g>, Diagnostics) {
    let _span = info_span!("build_type_graph").entered();

    let builtins = define_builtins(store);
    let mut diagnostics = Diagnostics::new();

    // Pass 1: modules.
    let mut modules = FxHashMap::default();
    {
        let mut modifier = store.modifier();
        let mut builder = ModuleBuilder {
            modifier: &mut modifier,
            modules: &mut modules,
        };
        for constructor in constructors {
            constructor.define_modules(&mut builder);
        }
        modifier.apply();
    }

    // Pass 2: types and their generics.
    {
        let mut modifier = store.modifier();
        let mut builder = TypeBuilder {
            modifier: &mut modifier,
            modules: &modules,
            diagnostics: &mut diagnostics,
            seen_names: FxHashMap::default(),
        };
        for constructor in constructors {
            constructor.define_types(&mut builder);
        }
        modifier.apply();
    }

    // Pass 3: generic constraints and parent types, resolved against the
    // now-existing type set.
    {
        let tg = TypeGraph::new(store, builtins);
        let mut modifier = store.modifier();
        let mut annotator = DependencyAnnotator {
            modifier: &mut modifier,
            diagnostics: &mut diagnostics,
        };
        for constructor in constructors {
            constructor.define_dependencies(&mut annotator, &tg);
        }
        modifier.apply();
    }

    // Pass 4: members with serialized signatures.
    {
        let tg = TypeGraph::new(store, builtins);
        let mut modifier = store.modifier();
        let mut builder = MemberBuilder {
            modifier: &mut modifier,
            diagnostics: &mut diagnostics,
        };
        for constructor in constructors {
            constructor.define_members(&mut builder, &tg);
        }
        modifier.apply();
    }

    // Validation.
    let tg = TypeGraph::new(store, builtins);
    {
        let mut reporter = ValidationReporter {
            diagnostics: &mut diagnostics,
        };
        for constructor in constructors {
            constructor.validate(&mut reporter, &tg);
        }
        validate_graph(&tg, &mut reporter);
    }

    (tg, diagnostics)
}

/// Pass 1: module creation.
pub struct ModuleBuilder<'m, 'g> {
    modifier: &'m mut serulian_graph::Modifier<'g>,
    modules: &'m mut FxHashMap<String, NodeId>,
}

impl ModuleBuilder<'_, '_> {
    pub fn define_module(&mut self, path: &str, source: Option<NodeId>) -> NodeId {
        let module = self.modifier.create_node(TgKind::Module);
        self.modifier.decorate(module, TgPredicate::ModulePath, path);
        if let Some(source) = source {
            self.modifier.connect(module, TgPredicate::TypeSource, source);
        }
        self.modules.insert(path.to_owned(), module);
        module
    }
}

/// A generic parameter being declared on a type or member.
pub struct GenericDeclaration {
    pub name: String,
    pub source: Option<NodeId>,
}

/// Pass 2: type declarations.
pub struct TypeBuilder<'m, 'g> {
    modifier: &'m mut serulian_graph::Modifier<'g>,
    modules: &'m FxHashMap<String, NodeId>,
    diagnostics: &'m mut Diagnostics,
    seen_names: FxHashMap<(NodeId, String), ()>,
}

impl TypeBuilder<'_, '_> {
    /// Declares a type under a module. Redeclaration raises a diagnostic and
    /// returns the new (orphaned) node so construction can continue.
    pub fn define_type(
        &mut self,
        module_path: &str,
        kind: TgKind,
        name: &str,
        source: Option<NodeId>,
        location: Option<SourceRange>,
        generics: &[GenericDeclaration],
    ) -> NodeId {
        let module = *self
            .modules
            .get(module_path)
            .expect("type declared under unknown module");

        let type_node = self.modifier.create_node(kind);
        self.modifier.decorate(type_node, TgPredicate::TypeName, name);
        if let Some(source) = source {
            self.modifier
                .connect(type_node, TgPredicate::TypeSource, source);
        }

        if self
            .seen_names
            .insert((module, name.to_owned()), ())
            .is_some()
        {
            if let Some(location) = location {
                self.diagnostics.error(
                    location,
                    format!("type '{name}' is already defined in the module"),
                );
            }
            return type_node;
        }

        self.modifier
            .connect(type_node, TgPredicate::TypeModule, module);

        for (index, generic) in generics.iter().enumerate() {
            let generic_node = self.modifier.create_node(TgKind::Generic);
            self.modifier
                .decorate(generic_node, TgPredicate::GenericName, generic.name.as_str());
            self.modifier
                .decorate(generic_node, TgPredicate::GenericIndex, index as i64);
            if let Some(source) = generic.source {
                self.modifier
                    .connect(generic_node, TgPredicate::GenericSource, source);
            }
            self.modifier
                .connect(type_node, TgPredicate::TypeGeneric, generic_node);
        }

        type_node
    }
}

/// Pass 3: constraints and parent types.
pub struct DependencyAnnotator<'m, 'g> {
    modifier: &'m mut serulian_graph::Modifier<'g>,
    diagnostics: &'m mut Diagnostics,
}

impl DependencyAnnotator<'_, '_> {
    pub fn define_generic_constraint(&mut self, generic: NodeId, constraint: &TypeReference) {
        self.modifier
            .decorate_tagged(generic, TgPredicate::GenericConstraint, constraint);
    }

    pub fn define_parent_type(&mut self, type_node: NodeId, parent: &TypeReference) {
        self.modifier
            .decorate_tagged(type_node, TgPredicate::ParentType, parent);
    }

    pub fn define_alias_target(&mut self, alias: NodeId, target: &TypeReference) {
        self.modifier
            .decorate_tagged(alias, TgPredicate::AliasTarget, target);
    }

    pub fn report_error(&mut self, location: SourceRange, message: String) {
        self.diagnostics.error(location, message);
    }
}

/// A member being declared in pass 4.
pub struct MemberDefinition {
    pub name: String,
    pub is_operator: bool,
    /// The member's full type: `function<R>(params)` for callables, the
    /// declared type otherwise.
    pub member_type: TypeReference,
    pub return_type: Option<TypeReference>,
    pub generics: Vec<(GenericDeclaration, TypeReference)>,
    pub is_static: bool,
    pub is_read_only: bool,
    pub is_exported: bool,
    pub module_path: String,
    pub source: Option<NodeId>,
}

/// Pass 4: members.
pub struct MemberBuilder<'m, 'g> {
    modifier: &'m mut serulian_graph::Modifier<'g>,
    diagnostics: &'m mut Diagnostics,
}

impl MemberBuilder<'_, '_> {
    /// Declares a member and attaches it to its owner (a type or a module).
    /// The signature is serialized with the member's own generics localized.
    pub fn define_member(&mut self, owner: NodeId, definition: MemberDefinition) -> NodeId {
        let kind = if definition.is_operator {
            TgKind::Operator
        } else {
            TgKind::Member
        };
        let member = self.modifier.create_node(kind);
        self.modifier
            .decorate(member, TgPredicate::MemberName, definition.name.as_str());

        let mut generic_nodes = Vec::new();
        for (index, (generic, constraint)) in definition.generics.iter().enumerate() {
            let generic_node = self.modifier.create_node(TgKind::Generic);
            self.modifier
                .decorate(generic_node, TgPredicate::GenericName, generic.name.as_str());
            self.modifier
                .decorate(generic_node, TgPredicate::GenericIndex, index as i64);
            self.modifier
                .decorate_tagged(generic_node, TgPredicate::GenericConstraint, constraint);
            if let Some(source) = generic.source {
                self.modifier
                    .connect(generic_node, TgPredicate::GenericSource, source);
            }
            self.modifier
                .connect(member, TgPredicate::MemberGeneric, generic_node);
            generic_nodes.push(generic_node);
        }

        self.modifier
            .decorate_tagged(member, TgPredicate::MemberType, &definition.member_type);
        if let Some(return_type) = &definition.return_type {
            self.modifier
                .decorate_tagged(member, TgPredicate::MemberReturnType, return_type);
        }

        let signature = MemberSignature::new(
            definition.member_type.localize(&generic_nodes),
            definition
                .generics
                .iter()
                .map(|(_, constraint)| constraint.localize(&generic_nodes))
                .collect(),
        );
        self.modifier.decorate(
            member,
            TgPredicate::MemberSignature,
            signature.serialize_value(),
        );

        if definition.is_static {
            self.modifier.decorate(member, TgPredicate::MemberStatic, "true");
        }
        if definition.is_read_only {
            self.modifier
                .decorate(member, TgPredicate::MemberReadOnly, "true");
        }
        if definition.is_exported {
            self.modifier
                .decorate(member, TgPredicate::MemberExported, "true");
        }
        self.modifier
            .decorate(member, TgPredicate::MemberModule, definition.module_path.as_str());
        if let Some(source) = definition.source {
            self.modifier
                .connect(member, TgPredicate::MemberSource, source);
        }

        let owner_predicate = if definition.is_operator {
            TgPredicate::TypeOperator
        } else {
            TgPredicate::TypeMember
        };
        self.modifier.connect(owner, owner_predicate, member);

        member
    }

    pub fn report_error(&mut self, location: SourceRange, message: String) {
        self.diagnostics.error(location, message);
    }
}

/// Validation-phase diagnostic sink.
pub struct ValidationReporter<'m> {
    diagnostics: &'m mut Diagnostics,
}

impl ValidationReporter<'_> {
    pub fn report_error(&mut self, location: SourceRange, message: String) {
        self.diagnostics.error(location, message);
    }
}

/// Graph-wide invariants: well-formed parent references, acyclic aliases,
/// and acyclic nominal parentage.
fn validate_graph(tg: &TypeGraph<'_>, reporter: &mut ValidationReporter<'_>) {
    for type_node in tg.types() {
        // Alias cycles.
        if tg.store.kind_of::<TgKind>(type_node) == TgKind::Alias
            && tg.alias_target(type_node).is_some()
            && tg.resolve_alias(type_node).is_none()
        {
            if let Some(range) = source_location(tg, type_node) {
                reporter.report_error(
                    range,
                    format!("alias '{}' is cyclic", tg.type_name(type_node)),
                );
            }
            continue;
        }

        // Parent reference arity and constraints.
        for parent in tg.parent_types(type_node) {
            if let Err(err) = parent.verify(tg) {
                if let Some(range) = source_location(tg, type_node) {
                    reporter.report_error(
                        range,
                        format!(
                            "invalid parent type on '{}': {err}",
                            tg.type_name(type_node)
                        ),
                    );
                }
            }
        }

        // Nominal parent cycles.
        if tg.store.kind_of::<TgKind>(type_node) == TgKind::Nominal {
            let mut seen = vec![type_node];
            let mut current = tg.parent_types(type_node).first().cloned();
            while let Some(parent) = current {
                if !parent.is_normal() {
                    break;
                }
                let parent_node = parent.referred_type_node();
                if seen.contains(&parent_node) {
                    if let Some(range) = source_location(tg, type_node) {
                        reporter.report_error(
                            range,
                            format!(
                                "nominal type '{}' has a cyclic parentage",
                                tg.type_name(type_node)
                            ),
                        );
                    }
                    break;
                }
                seen.push(parent_node);
                current = tg.parent_types(parent_node).first().cloned();
            }
        }
    }
}

fn source_location(tg: &TypeGraph<'_>, type_node: NodeId) -> Option<SourceRange> {
    use crate::sourceshape::SrgPredicate;
    let source = tg.type_source(type_node)?;
    let path = tg.store.get_str(source, SrgPredicate::Source)?;
    let start = tg.store.get_int(source, SrgPredicate::StartRune)? as u32;
    let end = tg.store.get_int(source, SrgPredicate::EndRune)? as u32;
    Some(SourceRange::new(
        crate::source::InputSource::new(path),
        text_size::TextRange::new(start.into(), end.into()),
    ))
}
