//! The SRG-backed type graph constructor.

use rustc_hash::FxHashSet;
use serulian_graph::store::NodeId;

use crate::source::InputSource;
use crate::sourceshape::{SrgKind, SrgPredicate};
use crate::srg::{ScopeOrImport, Srg};

use super::construction::{
    DependencyAnnotator, GenericDeclaration, MemberBuilder, MemberDefinition, ModuleBuilder,
    TypeBuilder, TypeGraphConstructor, ValidationReporter,
};
use super::typeref::TypeReference;
use super::{TgKind, TypeGraph};

/// Builds type graph entities from parsed Serulian modules.
pub struct SrgTypeConstructor<'a, 'g> {
    srg: &'a Srg<'g>,
}

impl<'a, 'g> SrgTypeConstructor<'a, 'g> {
    pub fn new(srg: &'a Srg<'g>) -> Self {
        Self { srg }
    }

    fn type_definitions(&self, module: NodeId) -> Vec<NodeId> {
        self.srg
            .store
            .from_node(module)
            .out(&[SrgPredicate::Child])
            .node_ids()
            .into_iter()
            .filter(|child| self.srg.kind(*child).is_type_definition())
            .collect()
    }

    fn module_members(&self, module: NodeId) -> Vec<NodeId> {
        self.srg
            .store
            .from_node(module)
            .out(&[SrgPredicate::Child])
            .node_ids()
            .into_iter()
            .filter(|child| self.srg.kind(*child).is_member())
            .collect()
    }

    fn generic_declarations(&self, node: NodeId, predicate: SrgPredicate) -> Vec<GenericDeclaration> {
        self.srg
            .store
            .from_node(node)
            .out(&[predicate])
            .node_ids()
            .into_iter()
            .map(|generic| GenericDeclaration {
                name: self.srg.node_name(generic).unwrap_or_default(),
                source: Some(generic),
            })
            .collect()
    }
}

impl TypeGraphConstructor for SrgTypeConstructor<'_, '_> {
    fn define_modules(&self, builder: &mut ModuleBuilder<'_, '_>) {
        for module in self.srg.modules() {
            let path = self.srg.node_source(module);
            builder.define_module(path.as_str(), Some(module));
        }
    }

    fn define_types(&self, builder: &mut TypeBuilder<'_, '_>) {
        for module in self.srg.modules() {
            let path = self.srg.node_source(module);
            for type_def in self.type_definitions(module) {
                let kind = match self.srg.kind(type_def) {
                    SrgKind::Class => TgKind::Class,
                    SrgKind::Interface => TgKind::Interface,
                    SrgKind::Nominal => TgKind::Nominal,
                    SrgKind::Struct => TgKind::Struct,
                    SrgKind::Agent => TgKind::Agent,
                    SrgKind::Alias => TgKind::Alias,
                    other => unreachable!("not a type definition: {other:?}"),
                };
                let Some(name) = self.srg.node_name(type_def) else {
                    continue;
                };
                let generics = self.generic_declarations(type_def, SrgPredicate::TypeGeneric);
                builder.define_type(
                    path.as_str(),
                    kind,
                    &name,
                    Some(type_def),
                    Some(self.srg.node_location(type_def)),
                    &generics,
                );
            }
        }
    }

    fn define_dependencies(&self, annotator: &mut DependencyAnnotator<'_, '_>, tg: &TypeGraph<'_>) {
        for module in self.srg.modules() {
            for type_def in self.type_definitions(module) {
                let Some(type_node) = tg.type_for_source(type_def) else {
                    continue;
                };

                // Generic constraints.
                for generic_source in self
                    .srg
                    .store
                    .from_node(type_def)
                    .out(&[SrgPredicate::TypeGeneric])
                    .node_ids()
                {
                    let Some(generic_node) = tg.generic_for_source(generic_source) else {
                        continue;
                    };
                    if let Some(constraint_ref) = self
                        .srg
                        .store
                        .get_node(generic_source, SrgPredicate::GenericConstraintRef)
                    {
                        match resolve_srg_type_ref(self.srg, tg, constraint_ref) {
                            Ok(constraint) => {
                                annotator.define_generic_constraint(generic_node, &constraint);
                            }
                            Err(message) => annotator.report_error(
                                self.srg.node_location(constraint_ref),
                                message,
                            ),
                        }
                    }
                }

                // Parent types.
                for parent_ref in self
                    .srg
                    .store
                    .from_node(type_def)
                    .out(&[SrgPredicate::TypeParentRef])
                    .node_ids()
                {
                    match resolve_srg_type_ref(self.srg, tg, parent_ref) {
                        Ok(parent) => annotator.define_parent_type(type_node, &parent),
                        Err(message) => {
                            annotator.report_error(self.srg.node_location(parent_ref), message);
                        }
                    }
                }

                // Alias targets.
                if let Some(alias_ref) = self
                    .srg
                    .store
                    .get_node(type_def, SrgPredicate::TypeAliasRef)
                {
                    match resolve_srg_type_ref(self.srg, tg, alias_ref) {
                        Ok(target) => annotator.define_alias_target(type_node, &target),
                        Err(message) => {
                            annotator.report_error(self.srg.node_location(alias_ref), message);
                        }
                    }
                }
            }
        }
    }

    fn define_members(&self, builder: &mut MemberBuilder<'_, '_>, tg: &TypeGraph<'_>) {
        for module in self.srg.modules() {
            let path = self.srg.node_source(module);
            let Some(module_node) = tg
                .modules()
                .into_iter()
                .find(|m| tg.module_path(*m) == path)
            else {
                continue;
            };

            let mut seen = FxHashSet::default();
            for member in self.module_members(module) {
                self.define_one_member(builder, tg, module_node, None, member, &path, &mut seen);
            }

            for type_def in self.type_definitions(module) {
                let Some(type_node) = tg.type_for_source(type_def) else {
                    continue;
                };
                let mut seen = FxHashSet::default();
                for member in self
                    .srg
                    .store
                    .from_node(type_def)
                    .out(&[SrgPredicate::TypeMember])
                    .node_ids()
                {
                    self.define_one_member(
                        builder,
                        tg,
                        type_node,
                        Some(type_node),
                        member,
                        &path,
                        &mut seen,
                    );
                }
            }
        }
    }

    fn validate(&self, reporter: &mut ValidationReporter<'_>, tg: &TypeGraph<'_>) {
        for module in self.srg.modules() {
            for type_def in self.type_definitions(module) {
                let Some(type_node) = tg.type_for_source(type_def) else {
                    continue;
                };
                for member in tg
                    .members_of(type_node)
                    .into_iter()
                    .chain(tg.operators_of(type_node))
                {
                    if let Err(err) = tg.member_type(member).verify(tg) {
                        if let Some(source) = tg.member_source(member) {
                            reporter.report_error(
                                self.srg.node_location(source),
                                format!(
                                    "member '{}' has invalid type: {err}",
                                    tg.member_name(member)
                                ),
                            );
                        }
                    }
                }
            }
        }
    }
}

impl SrgTypeConstructor<'_, '_> {
    #[allow(clippy::too_many_arguments)]
    fn define_one_member(
        &self,
        builder: &mut MemberBuilder<'_, '_>,
        tg: &TypeGraph<'_>,
        owner: NodeId,
        owner_type: Option<NodeId>,
        member: NodeId,
        module_path: &InputSource,
        seen: &mut FxHashSet<String>,
    ) {
        let Some(name) = self.srg.node_name(member) else {
            return;
        };
        let kind = self.srg.kind(member);
        let is_operator = kind == SrgKind::Operator;

        if !seen.insert(format!("{is_operator}:{name}")) {
            builder.report_error(
                self.srg.node_location(member),
                format!("member '{name}' is already defined"),
            );
            return;
        }

        let resolve = |node: NodeId| resolve_srg_type_ref(self.srg, tg, node);

        let resolve_or_report =
            |builder: &mut MemberBuilder<'_, '_>, node: NodeId| match resolve(node) {
                Ok(reference) => Some(reference),
                Err(message) => {
                    builder.report_error(self.srg.node_location(node), message);
                    None
                }
            };

        let generics: Vec<(GenericDeclaration, TypeReference)> = self
            .srg
            .store
            .from_node(member)
            .out(&[SrgPredicate::MemberGeneric])
            .node_ids()
            .into_iter()
            .map(|generic| {
                let constraint = self
                    .srg
                    .store
                    .get_node(generic, SrgPredicate::GenericConstraintRef)
                    .and_then(|node| resolve_or_report(builder, node))
                    .unwrap_or(TypeReference::Any);
                (
                    GenericDeclaration {
                        name: self.srg.node_name(generic).unwrap_or_default(),
                        source: Some(generic),
                    },
                    constraint,
                )
            })
            .collect();

        let parameter_types: Vec<TypeReference> = self
            .srg
            .store
            .from_node(member)
            .out(&[SrgPredicate::MemberParameter])
            .node_ids()
            .into_iter()
            .map(|parameter| {
                self.srg
                    .store
                    .get_node(parameter, SrgPredicate::ParameterTypeRef)
                    .and_then(|node| resolve_or_report(builder, node))
                    .unwrap_or(TypeReference::Any)
            })
            .collect();

        let declared_type = self
            .srg
            .store
            .get_node(member, SrgPredicate::VariableDeclaredTypeRef)
            .or_else(|| {
                self.srg
                    .store
                    .get_node(member, SrgPredicate::MemberDeclaredTypeRef)
            })
            .and_then(|node| resolve_or_report(builder, node));

        let return_type = self
            .srg
            .store
            .get_node(member, SrgPredicate::MemberReturnTypeRef)
            .and_then(|node| resolve_or_report(builder, node));

        let (member_type, return_type, is_static, is_read_only) = match kind {
            SrgKind::Variable | SrgKind::Field => {
                let declared = declared_type.unwrap_or(TypeReference::Any);
                (declared, None, false, false)
            }

            SrgKind::Property => {
                let declared = declared_type.unwrap_or(TypeReference::Any);
                let read_only = self
                    .srg
                    .store
                    .get_str(member, SrgPredicate::MemberReadOnly)
                    .is_some();
                (declared, None, false, read_only)
            }

            SrgKind::Constructor => {
                let instance = owner_type
                    .map(|type_node| tg.new_instance_type_reference(type_node))
                    .unwrap_or(TypeReference::Any);
                let mut member_type = TypeReference::normal(tg.builtins.function_type)
                    .with_generic(instance.clone());
                for parameter in &parameter_types {
                    member_type = member_type.with_parameter(parameter.clone());
                }
                (member_type, Some(instance), true, true)
            }

            SrgKind::Function | SrgKind::Operator => {
                let returns = match return_type {
                    Some(returns) => returns,
                    // An operator without a declared return type returns its
                    // owning type.
                    None if is_operator => owner_type
                        .map(|type_node| tg.new_instance_type_reference(type_node))
                        .unwrap_or(TypeReference::Void),
                    None => TypeReference::Void,
                };
                let mut member_type = TypeReference::normal(tg.builtins.function_type)
                    .with_generic(returns.clone());
                for parameter in &parameter_types {
                    member_type = member_type.with_parameter(parameter.clone());
                }
                (member_type, Some(returns), is_operator, true)
            }

            other => unreachable!("not a member kind: {other:?}"),
        };

        // Serulian exports by capitalization.
        let is_exported = name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
            || is_operator;

        builder.define_member(
            owner,
            MemberDefinition {
                name,
                is_operator,
                member_type,
                return_type,
                generics,
                is_static,
                is_read_only,
                is_exported,
                module_path: module_path.as_str().to_owned(),
                source: Some(member),
            },
        );
    }
}

/// Resolves an SRG type-reference node into a `TypeReference`, through the
/// lexical environment of the reference site.
pub fn resolve_srg_type_ref(
    srg: &Srg<'_>,
    tg: &TypeGraph<'_>,
    node: NodeId,
) -> Result<TypeReference, String> {
    resolve_srg_type_ref_inner(srg, tg, node, &mut Vec::new())
}

/// `visited` tracks alias declarations already being resolved so cyclic
/// alias chains error instead of recursing.
fn resolve_srg_type_ref_inner(
    srg: &Srg<'_>,
    tg: &TypeGraph<'_>,
    node: NodeId,
    visited: &mut Vec<NodeId>,
) -> Result<TypeReference, String> {
    match srg.kind(node) {
        SrgKind::TypeRefAny => Ok(TypeReference::Any),
        SrgKind::TypeRefVoid => Ok(TypeReference::Void),

        SrgKind::TypeRefNullable => {
            let inner = srg
                .store
                .get_node(node, SrgPredicate::TypeRefInner)
                .ok_or_else(|| "missing inner type reference".to_owned())?;
            Ok(resolve_srg_type_ref_inner(srg, tg, inner, visited)?.as_nullable())
        }

        SrgKind::TypeRefStream => {
            let inner = srg
                .store
                .get_node(node, SrgPredicate::TypeRefInner)
                .ok_or_else(|| "missing inner type reference".to_owned())?;
            Ok(tg.stream_type_reference(resolve_srg_type_ref_inner(srg, tg, inner, visited)?))
        }

        SrgKind::TypeRefPath => {
            let path = srg
                .store
                .get_str(node, SrgPredicate::TypeRefPathName)
                .ok_or_else(|| "missing type path".to_owned())?;

            let mut base = resolve_type_path(srg, tg, node, &path, visited)?;

            for argument in srg
                .store
                .from_node(node)
                .out(&[SrgPredicate::TypeRefGenericArg])
                .node_ids()
            {
                base = base.with_generic(resolve_srg_type_ref_inner(srg, tg, argument, visited)?);
            }

            Ok(base)
        }

        other => Err(format!("node kind {other:?} is not a type reference")),
    }
}

fn resolve_type_path(
    srg: &Srg<'_>,
    tg: &TypeGraph<'_>,
    node: NodeId,
    path: &str,
    visited: &mut Vec<NodeId>,
) -> Result<TypeReference, String> {
    let mut segments = path.splitn(2, '.');
    let first = segments.next().unwrap_or_default();
    let rest = segments.next();

    match srg.resolve_name(first, node) {
        Some(ScopeOrImport::Named(named)) => {
            if rest.is_some() {
                return Err(format!("'{first}' does not export type '{}'", rest.unwrap()));
            }
            named_to_type_reference(srg, tg, named.node, path, visited)
        }

        Some(ScopeOrImport::Package { reference_id, .. }) => {
            let Some(rest) = rest else {
                return Err(format!("'{first}' names a package, not a type"));
            };
            let package = srg
                .package_map
                .get("", &reference_id)
                .ok_or_else(|| format!("unknown package '{reference_id}'"))?;
            let named = srg
                .resolve_exported_name(package, rest)
                .ok_or_else(|| format!("type '{rest}' is not exported by package '{first}'"))?;
            named_to_type_reference(srg, tg, named.node, path, visited)
        }

        None => {
            if rest.is_none() {
                if let Some(builtin) = tg.builtins.by_name(first) {
                    return Ok(TypeReference::normal(builtin));
                }
            }
            Err(format!("unknown type '{path}'"))
        }
    }
}

fn named_to_type_reference(
    srg: &Srg<'_>,
    tg: &TypeGraph<'_>,
    srg_node: NodeId,
    path: &str,
    visited: &mut Vec<NodeId>,
) -> Result<TypeReference, String> {
    if srg.kind(srg_node) == SrgKind::Generic {
        let generic = tg
            .generic_for_source(srg_node)
            .ok_or_else(|| format!("unknown type '{path}'"))?;
        return Ok(TypeReference::normal(generic));
    }

    // Aliases resolve through to their target at the SRG level, so forward
    // references work in any construction pass; `visited` breaks cycles.
    if srg.kind(srg_node) == SrgKind::Alias {
        if visited.contains(&srg_node) {
            return Err(format!("alias '{path}' is cyclic"));
        }
        visited.push(srg_node);
        let target = srg
            .store
            .get_node(srg_node, SrgPredicate::TypeAliasRef)
            .ok_or_else(|| format!("alias '{path}' has no target"))?;
        return resolve_srg_type_ref_inner(srg, tg, target, visited);
    }

    let type_node = tg
        .type_for_source(srg_node)
        .ok_or_else(|| format!("'{path}' does not name a type"))?;

    Ok(TypeReference::normal(type_node))
}
