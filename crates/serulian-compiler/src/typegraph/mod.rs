//! The type graph: the resolved type universe.
//!
//! Built in four passes from one or more constructors (modules, types,
//! dependencies, members) followed by validation. Every entity either links
//! back to an SRG source node or is synthetic (the built-in types).
//!
//! - `typeref` - the `TypeReference` algebra
//! - `signature` - serialized member signatures
//! - `builtins` - the synthetic core types
//! - `construction` - the constructor trait and build pipeline
//! - `srg_constructor` - the production constructor over parsed modules

mod builtins;
mod construction;
mod signature;
mod srg_constructor;
mod typeref;

#[cfg(test)]
mod test_constructor;
#[cfg(test)]
mod typegraph_tests;
#[cfg(test)]
mod typeref_tests;

use serulian_graph::GraphStore;
use serulian_graph::store::{KindToken, Layer, NodeId, PredicateToken};

use crate::source::InputSource;

pub use builtins::Builtins;
pub use construction::{
    DependencyAnnotator, GenericDeclaration, MemberBuilder, MemberDefinition, ModuleBuilder,
    TypeBuilder, TypeGraphConstructor, ValidationReporter, build_type_graph,
};
pub use signature::MemberSignature;
pub use srg_constructor::{SrgTypeConstructor, resolve_srg_type_ref};
pub use typeref::{MemberResolutionKind, SubtypeError, TypeReference};

/// Node kinds in the type graph layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum TgKind {
    Module = 0,
    Class,
    /// A structurally-matched (implicit) interface.
    Interface,
    /// An interface imported from a foreign type system.
    ExternalInterface,
    Nominal,
    Struct,
    Agent,
    Alias,
    Generic,
    Member,
    Operator,

    #[doc(hidden)]
    __Last,
}

impl KindToken for TgKind {
    const LAYER: Layer = Layer::TypeDefinition;

    #[inline]
    fn to_raw(self) -> u16 {
        self as u16
    }

    #[inline]
    fn from_raw(raw: u16) -> Self {
        assert!(raw < TgKind::__Last as u16);
        // SAFETY: bounds-checked above; TgKind is repr(u16).
        unsafe { std::mem::transmute::<u16, TgKind>(raw) }
    }
}

/// The kind of a type declaration, as exposed by the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    ImplicitInterface,
    ExternalInterface,
    Nominal,
    Struct,
    Agent,
    Generic,
    Alias,
}

/// Edge predicates in the type graph layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TgPredicate {
    ModulePath = 0,

    TypeName,
    TypeModule,
    /// Back-edge to the SRG declaration.
    TypeSource,
    TypeGeneric,
    TypeMember,
    TypeOperator,
    /// Tagged `TypeReference` for each declared parent type.
    ParentType,
    /// Tagged `TypeReference` for an alias's target.
    AliasTarget,

    GenericName,
    GenericIndex,
    /// Tagged `TypeReference` constraint; absent means `any`.
    GenericConstraint,
    GenericSource,

    MemberName,
    /// Tagged `TypeReference` for the member's full type.
    MemberType,
    /// Tagged `TypeReference` for a function member's return type.
    MemberReturnType,
    /// Serialized signature string, for O(1) comparison.
    MemberSignature,
    MemberGeneric,
    MemberSource,
    MemberStatic,
    MemberReadOnly,
    MemberExported,
    /// Marks an operator lowered to a native ES operator.
    MemberNative,
    /// The module path under which the member was declared.
    MemberModule,

    #[doc(hidden)]
    __Last,
}

impl PredicateToken for TgPredicate {
    const LAYER: Layer = Layer::TypeDefinition;

    #[inline]
    fn to_raw(self) -> u16 {
        self as u16
    }

    #[inline]
    fn from_raw(raw: u16) -> Self {
        assert!(raw < TgPredicate::__Last as u16);
        // SAFETY: bounds-checked above; TgPredicate is repr(u16).
        unsafe { std::mem::transmute::<u16, TgPredicate>(raw) }
    }

    fn name(self) -> &'static str {
        match self {
            TgPredicate::ModulePath => "module-path",
            TgPredicate::TypeName => "type-name",
            TgPredicate::TypeModule => "type-module",
            TgPredicate::TypeSource => "type-source",
            TgPredicate::TypeGeneric => "type-generic",
            TgPredicate::TypeMember => "type-member",
            TgPredicate::TypeOperator => "type-operator",
            TgPredicate::ParentType => "parent-type",
            TgPredicate::AliasTarget => "alias-target",
            TgPredicate::GenericName => "generic-name",
            TgPredicate::GenericIndex => "generic-index",
            TgPredicate::GenericConstraint => "generic-constraint",
            TgPredicate::GenericSource => "generic-source",
            TgPredicate::MemberName => "member-name",
            TgPredicate::MemberType => "member-type",
            TgPredicate::MemberReturnType => "member-return-type",
            TgPredicate::MemberSignature => "member-signature",
            TgPredicate::MemberGeneric => "member-generic",
            TgPredicate::MemberSource => "member-source",
            TgPredicate::MemberStatic => "member-static",
            TgPredicate::MemberReadOnly => "member-readonly",
            TgPredicate::MemberExported => "member-exported",
            TgPredicate::MemberNative => "member-native",
            TgPredicate::MemberModule => "member-module",
            TgPredicate::__Last => unreachable!(),
        }
    }
}

/// Borrowed facade over the type layer of the graph store.
pub struct TypeGraph<'g> {
    pub store: &'g GraphStore,
    pub builtins: Builtins,
}

impl<'g> TypeGraph<'g> {
    pub fn new(store: &'g GraphStore, builtins: Builtins) -> Self {
        Self { store, builtins }
    }

    // --- Types ---

    pub fn modules(&self) -> Vec<NodeId> {
        self.store.nodes_of_kind(TgKind::Module)
    }

    pub fn types(&self) -> Vec<NodeId> {
        let mut types = Vec::new();
        for kind in [
            TgKind::Class,
            TgKind::Interface,
            TgKind::ExternalInterface,
            TgKind::Nominal,
            TgKind::Struct,
            TgKind::Agent,
            TgKind::Alias,
        ] {
            types.extend(self.store.nodes_of_kind(kind));
        }
        types
    }

    pub fn type_kind(&self, type_node: NodeId) -> TypeKind {
        match self.store.kind_of::<TgKind>(type_node) {
            TgKind::Class => TypeKind::Class,
            TgKind::Interface => TypeKind::ImplicitInterface,
            TgKind::ExternalInterface => TypeKind::ExternalInterface,
            TgKind::Nominal => TypeKind::Nominal,
            TgKind::Struct => TypeKind::Struct,
            TgKind::Agent => TypeKind::Agent,
            TgKind::Generic => TypeKind::Generic,
            TgKind::Alias => TypeKind::Alias,
            other => panic!("node kind {other:?} is not a type declaration"),
        }
    }

    pub fn type_name(&self, type_node: NodeId) -> String {
        let predicate = match self.store.kind_of::<TgKind>(type_node) {
            TgKind::Generic => TgPredicate::GenericName,
            _ => TgPredicate::TypeName,
        };
        self.store
            .get_str(type_node, predicate)
            .expect("type node missing name")
    }

    /// A human-readable name for diagnostics: the type name qualified by its
    /// module path.
    pub fn descriptive_name(&self, type_node: NodeId) -> String {
        let name = self.type_name(type_node);
        match self
            .store
            .get_node(type_node, TgPredicate::TypeModule)
            .and_then(|module| self.store.get_str(module, TgPredicate::ModulePath))
        {
            Some(path) => format!("{name} (module {path})"),
            None => name,
        }
    }

    pub fn generics_of(&self, node: NodeId) -> Vec<NodeId> {
        let predicate = match self.store.kind_of::<TgKind>(node) {
            TgKind::Member | TgKind::Operator => TgPredicate::MemberGeneric,
            _ => TgPredicate::TypeGeneric,
        };
        self.store
            .from_node(node)
            .out(&[predicate])
            .node_ids()
    }

    pub fn generic_constraint(&self, generic: NodeId) -> TypeReference {
        self.store
            .get_tagged(generic, TgPredicate::GenericConstraint)
            .unwrap_or(TypeReference::Any)
    }

    pub fn members_of(&self, type_node: NodeId) -> Vec<NodeId> {
        self.store
            .from_node(type_node)
            .out(&[TgPredicate::TypeMember])
            .node_ids()
    }

    pub fn operators_of(&self, type_node: NodeId) -> Vec<NodeId> {
        self.store
            .from_node(type_node)
            .out(&[TgPredicate::TypeOperator])
            .node_ids()
    }

    pub fn parent_types(&self, type_node: NodeId) -> Vec<TypeReference> {
        self.store
            .get_all(type_node, TgPredicate::ParentType)
            .into_iter()
            .map(|value| value.decode_tagged::<TypeReference>())
            .collect()
    }

    pub fn alias_target(&self, alias_node: NodeId) -> Option<TypeReference> {
        self.store.get_tagged(alias_node, TgPredicate::AliasTarget)
    }

    /// The SRG declaration node for a type, if it has one (built-ins do not).
    pub fn type_source(&self, type_node: NodeId) -> Option<NodeId> {
        self.store.get_node(type_node, TgPredicate::TypeSource)
    }

    /// The TG type declared by the given SRG node, if any.
    pub fn type_for_source(&self, srg_node: NodeId) -> Option<NodeId> {
        self.store
            .incoming(srg_node, TgPredicate::TypeSource)
            .into_iter()
            .next()
    }

    /// The TG generic declared by the given SRG node, if any.
    pub fn generic_for_source(&self, srg_node: NodeId) -> Option<NodeId> {
        self.store
            .incoming(srg_node, TgPredicate::GenericSource)
            .into_iter()
            .next()
    }

    /// The TG member declared by the given SRG node, if any.
    pub fn member_for_source(&self, srg_node: NodeId) -> Option<NodeId> {
        self.store
            .incoming(srg_node, TgPredicate::MemberSource)
            .into_iter()
            .next()
    }

    /// Finds a type declared under the module with the given path.
    pub fn find_type(&self, module_path: &str, name: &str) -> Option<NodeId> {
        self.types().into_iter().find(|type_node| {
            self.type_name(*type_node) == name
                && self
                    .store
                    .get_node(*type_node, TgPredicate::TypeModule)
                    .and_then(|module| self.store.get_str(module, TgPredicate::ModulePath))
                    .is_some_and(|path| path == module_path)
        })
    }

    // --- Members ---

    pub fn member_name(&self, member: NodeId) -> String {
        self.store
            .get_str(member, TgPredicate::MemberName)
            .expect("member missing name")
    }

    pub fn member_type(&self, member: NodeId) -> TypeReference {
        self.store
            .get_tagged(member, TgPredicate::MemberType)
            .expect("member missing type")
    }

    pub fn member_return_type(&self, member: NodeId) -> Option<TypeReference> {
        self.store.get_tagged(member, TgPredicate::MemberReturnType)
    }

    pub fn member_signature(&self, member: NodeId) -> String {
        self.store
            .get_str(member, TgPredicate::MemberSignature)
            .expect("member missing signature")
    }

    pub fn member_is_static(&self, member: NodeId) -> bool {
        self.store.get_str(member, TgPredicate::MemberStatic).is_some()
    }

    pub fn member_is_exported(&self, member: NodeId) -> bool {
        self.store
            .get_str(member, TgPredicate::MemberExported)
            .is_some()
    }

    pub fn member_is_native(&self, member: NodeId) -> bool {
        self.store.get_str(member, TgPredicate::MemberNative).is_some()
    }

    pub fn member_is_read_only(&self, member: NodeId) -> bool {
        self.store
            .get_str(member, TgPredicate::MemberReadOnly)
            .is_some()
    }

    pub fn member_source(&self, member: NodeId) -> Option<NodeId> {
        self.store.get_node(member, TgPredicate::MemberSource)
    }

    /// The type or module owning the member.
    pub fn member_parent(&self, member: NodeId) -> Option<NodeId> {
        for predicate in [TgPredicate::TypeMember, TgPredicate::TypeOperator] {
            if let Some(parent) = self.store.incoming(member, predicate).into_iter().next() {
                return Some(parent);
            }
        }
        None
    }

    pub fn get_member(&self, type_node: NodeId, name: &str) -> Option<NodeId> {
        self.members_of(type_node)
            .into_iter()
            .find(|member| self.member_name(*member) == name)
    }

    pub fn get_operator(&self, type_node: NodeId, name: &str) -> Option<NodeId> {
        self.operators_of(type_node)
            .into_iter()
            .find(|member| self.member_name(*member) == name)
    }

    /// Finds a member declared directly under a module.
    pub fn get_module_member(&self, module_path: &str, name: &str) -> Option<NodeId> {
        for module in self.modules() {
            if self
                .store
                .get_str(module, TgPredicate::ModulePath)
                .is_some_and(|path| path == module_path)
            {
                return self.members_of(module).into_iter().find(|member| {
                    self.member_name(*member) == name
                });
            }
        }
        None
    }

    // --- Type references ---

    pub fn any_type_reference(&self) -> TypeReference {
        TypeReference::Any
    }

    pub fn void_type_reference(&self) -> TypeReference {
        TypeReference::Void
    }

    pub fn null_type_reference(&self) -> TypeReference {
        TypeReference::Null
    }

    pub fn bool_type_reference(&self) -> TypeReference {
        TypeReference::normal(self.builtins.bool_type)
    }

    pub fn int_type_reference(&self) -> TypeReference {
        TypeReference::normal(self.builtins.int_type)
    }

    pub fn float_type_reference(&self) -> TypeReference {
        TypeReference::normal(self.builtins.float_type)
    }

    pub fn string_type_reference(&self) -> TypeReference {
        TypeReference::normal(self.builtins.string_type)
    }

    /// A `function<result>` reference.
    pub fn function_type_reference(&self, result: TypeReference) -> TypeReference {
        TypeReference::normal(self.builtins.function_type).with_generic(result)
    }

    /// A `stream<value>` reference.
    pub fn stream_type_reference(&self, value: TypeReference) -> TypeReference {
        TypeReference::normal(self.builtins.stream_type).with_generic(value)
    }

    /// A reference to the given type with explicit generics.
    pub fn new_type_reference(
        &self,
        type_node: NodeId,
        generics: Vec<TypeReference>,
    ) -> TypeReference {
        let mut reference = TypeReference::normal(type_node);
        for generic in generics {
            reference = reference.with_generic(generic);
        }
        reference
    }

    /// A reference to the given type with its own generics as arguments.
    pub fn new_instance_type_reference(&self, type_node: NodeId) -> TypeReference {
        if self.store.kind_of::<TgKind>(type_node) == TgKind::Generic {
            return TypeReference::normal(type_node);
        }
        let generics = self
            .generics_of(type_node)
            .into_iter()
            .map(TypeReference::normal)
            .collect();
        self.new_type_reference(type_node, generics)
    }

    /// Follows alias declarations to the aliased reference.
    pub fn resolve_alias(&self, type_node: NodeId) -> Option<TypeReference> {
        let mut visited = vec![type_node];
        let mut current = self.alias_target(type_node)?;
        loop {
            let TypeReference::Normal { type_node, .. } = &current else {
                return Some(current);
            };
            if self.store.kind_of::<TgKind>(*type_node) != TgKind::Alias {
                return Some(current);
            }
            if visited.contains(type_node) {
                // Cyclic alias chains are rejected during validation.
                return None;
            }
            visited.push(*type_node);
            current = self.alias_target(*type_node)?;
        }
    }

    /// The module path of the module node.
    pub fn module_path(&self, module: NodeId) -> InputSource {
        InputSource::new(
            self.store
                .get_str(module, TgPredicate::ModulePath)
                .expect("module missing path"),
        )
    }
}
