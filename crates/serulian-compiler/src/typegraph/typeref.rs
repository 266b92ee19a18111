//! The `TypeReference` algebra.
//!
//! A type reference is a structural value: two references are equal iff they
//! denote the same type, so references serve directly as map keys. Generic
//! substitution is tree rewriting; `localize` alpha-converts references to
//! specific generic parameters so members of different types can be compared.

use serde::{Deserialize, Serialize};
use serulian_graph::TaggedValue;
use serulian_graph::store::NodeId;
use thiserror::Error;

use super::signature::MemberSignature;
use super::{TgKind, TgPredicate, TypeGraph, TypeKind};

/// A canonical value naming a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeReference {
    /// The special `any` type: every type is a subtype of it.
    Any,
    /// The special `void` type: interchangeable with nothing.
    Void,
    /// The special `null` type: a subtype of every nullable type.
    Null,
    /// An alpha-converted generic parameter, produced by `localize`.
    Local(u32),
    /// A reference to a declared type or generic.
    Normal {
        type_node: NodeId,
        nullable: bool,
        generics: Vec<TypeReference>,
        parameters: Vec<TypeReference>,
    },
}

impl TaggedValue for TypeReference {
    const TAG: &'static str = "type-reference";
}

/// A failed subtype check, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SubtypeError(pub String);

fn subtype_err<T>(message: String) -> Result<T, SubtypeError> {
    Err(SubtypeError(message))
}

/// How a member lookup on a type reference should resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberResolutionKind {
    Operator,
    Static,
    Instance,
    InstanceOrStatic,
}

impl TypeReference {
    /// A non-nullable reference to the given type node with no generics.
    pub fn normal(type_node: NodeId) -> Self {
        TypeReference::Normal {
            type_node,
            nullable: false,
            generics: Vec::new(),
            parameters: Vec::new(),
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, TypeReference::Normal { .. })
    }

    pub fn is_any(&self) -> bool {
        matches!(self, TypeReference::Any)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeReference::Void)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypeReference::Null)
    }

    pub fn is_local(&self) -> bool {
        matches!(self, TypeReference::Local(_))
    }

    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            TypeReference::Normal { nullable: true, .. } | TypeReference::Null
        )
    }

    /// The referred type node. Panics for special references.
    pub fn referred_type_node(&self) -> NodeId {
        match self {
            TypeReference::Normal { type_node, .. } => *type_node,
            other => panic!("cannot get referred type for special reference {other:?}"),
        }
    }

    pub fn has_referred_type(&self, node: NodeId) -> bool {
        matches!(self, TypeReference::Normal { type_node, .. } if *type_node == node)
    }

    pub fn generics(&self) -> &[TypeReference] {
        match self {
            TypeReference::Normal { generics, .. } => generics,
            _ => &[],
        }
    }

    pub fn parameters(&self) -> &[TypeReference] {
        match self {
            TypeReference::Normal { parameters, .. } => parameters,
            _ => &[],
        }
    }

    pub fn has_generics(&self) -> bool {
        !self.generics().is_empty()
    }

    /// Returns a copy with the given generic appended.
    pub fn with_generic(&self, generic: TypeReference) -> TypeReference {
        match self {
            TypeReference::Normal {
                type_node,
                nullable,
                generics,
                parameters,
            } => {
                let mut generics = generics.clone();
                generics.push(generic);
                TypeReference::Normal {
                    type_node: *type_node,
                    nullable: *nullable,
                    generics,
                    parameters: parameters.clone(),
                }
            }
            other => other.clone(),
        }
    }

    /// Returns a copy with the given parameter appended.
    pub fn with_parameter(&self, parameter: TypeReference) -> TypeReference {
        match self {
            TypeReference::Normal {
                type_node,
                nullable,
                generics,
                parameters,
            } => {
                let mut parameters = parameters.clone();
                parameters.push(parameter);
                TypeReference::Normal {
                    type_node: *type_node,
                    nullable: *nullable,
                    generics: generics.clone(),
                    parameters,
                }
            }
            other => other.clone(),
        }
    }

    /// Returns a nullable copy. Special references are unchanged.
    pub fn as_nullable(&self) -> TypeReference {
        match self {
            TypeReference::Normal {
                type_node,
                generics,
                parameters,
                ..
            } => TypeReference::Normal {
                type_node: *type_node,
                nullable: true,
                generics: generics.clone(),
                parameters: parameters.clone(),
            },
            other => other.clone(),
        }
    }

    /// Returns a non-nullable copy.
    pub fn as_non_nullable(&self) -> TypeReference {
        match self {
            TypeReference::Normal {
                type_node,
                generics,
                parameters,
                ..
            } => TypeReference::Normal {
                type_node: *type_node,
                nullable: false,
                generics: generics.clone(),
                parameters: parameters.clone(),
            },
            other => other.clone(),
        }
    }

    /// True when this reference is equal to `other` or is `any`.
    pub fn equals_or_any(&self, other: &TypeReference) -> bool {
        self.is_any() || self == other
    }

    /// Whether any reference to the given type node occurs in this tree.
    pub fn contains_type(&self, node: NodeId) -> bool {
        match self {
            TypeReference::Normal {
                type_node,
                generics,
                parameters,
                ..
            } => {
                *type_node == node
                    || generics.iter().any(|g| g.contains_type(node))
                    || parameters.iter().any(|p| p.contains_type(node))
            }
            _ => false,
        }
    }

    /// Replaces all occurrences of the given type node (nullable and
    /// non-nullable) with the replacement. A nullable occurrence takes the
    /// nullable form of the replacement.
    pub fn replace_type(&self, node: NodeId, replacement: &TypeReference) -> TypeReference {
        match self {
            TypeReference::Normal {
                type_node,
                nullable,
                generics,
                parameters,
            } => {
                if *type_node == node && generics.is_empty() && parameters.is_empty() {
                    return if *nullable {
                        replacement.as_nullable()
                    } else {
                        replacement.clone()
                    };
                }
                TypeReference::Normal {
                    type_node: *type_node,
                    nullable: *nullable,
                    generics: generics
                        .iter()
                        .map(|g| g.replace_type(node, replacement))
                        .collect(),
                    parameters: parameters
                        .iter()
                        .map(|p| p.replace_type(node, replacement))
                        .collect(),
                }
            }
            other => other.clone(),
        }
    }

    /// Alpha-converts references to the given generic nodes into local
    /// tokens, so references that differ only in which generic parameters
    /// they name compare equal.
    pub fn localize(&self, generics: &[NodeId]) -> TypeReference {
        let mut current = self.clone();
        for (index, generic) in generics.iter().enumerate() {
            current = current.replace_type(*generic, &TypeReference::Local(index as u32));
        }
        current
    }

    /// Substitutes all of `other`'s generic parameters into their
    /// corresponding argument positions in this reference.
    ///
    /// For example, if this is `function<T>` and `other` is `SomeClass<int>`
    /// where `T` is `SomeClass`'s generic, the result is `function<int>`.
    pub fn transform_under(&self, other: &TypeReference, tg: &TypeGraph<'_>) -> TypeReference {
        if self.is_any() || other.is_any() || self.is_void() || other.is_void() {
            return self.clone();
        }

        let other_ref_generics = other.generics();
        if other_ref_generics.is_empty() {
            return self.clone();
        }

        let other_type = other.referred_type_node();
        assert!(
            tg.store.kind_of::<TgKind>(other_type) != TgKind::Generic,
            "cannot transform a reference under a generic"
        );

        let other_type_generics = tg.generics_of(other_type);
        if other_ref_generics.len() != other_type_generics.len() {
            return self.clone();
        }

        let mut current = self.clone();
        for (generic_node, argument) in other_type_generics.iter().zip(other_ref_generics) {
            current = current.replace_type(*generic_node, argument);
        }
        current
    }

    /// Extracts the child reference sitting in the position where `diff_node`
    /// appears in `other`. For example, with this `SomeClass<int>` and other
    /// `SomeClass<T>`, diffing on `T` yields `int`.
    pub fn extract_type_diff(
        &self,
        other: &TypeReference,
        diff_node: NodeId,
    ) -> Option<TypeReference> {
        if !self.is_normal() || !other.is_normal() {
            return None;
        }
        if self.referred_type_node() != other.referred_type_node() {
            return None;
        }
        if !other.contains_type(diff_node) {
            return None;
        }

        for (other_generic, local_generic) in other.generics().iter().zip(self.generics()) {
            if !other_generic.is_normal() {
                continue;
            }
            if other_generic.has_referred_type(diff_node) {
                return Some(local_generic.clone());
            }
            if let Some(extracted) = local_generic.extract_type_diff(other_generic, diff_node) {
                return Some(extracted);
            }
        }

        if other.parameters().len() != self.parameters().len() {
            return None;
        }
        for (other_parameter, local_parameter) in
            other.parameters().iter().zip(self.parameters())
        {
            if !other_parameter.is_normal() {
                continue;
            }
            if other_parameter.has_referred_type(diff_node) {
                return Some(local_parameter.clone());
            }
            if let Some(extracted) =
                local_parameter.extract_type_diff(other_parameter, diff_node)
            {
                return Some(extracted);
            }
        }

        None
    }

    /// The type common to both references, or `any` when they share nothing
    /// more specific.
    pub fn intersect(&self, other: &TypeReference, tg: &TypeGraph<'_>) -> TypeReference {
        if self.is_void() {
            return other.clone();
        }
        if other.is_void() {
            return self.clone();
        }
        if self.is_any() || other.is_any() {
            return TypeReference::Any;
        }

        // Align nullability before comparing.
        let mut this_adjusted = self.clone();
        let mut other_adjusted = other.clone();
        if self.is_nullable() {
            other_adjusted = other_adjusted.as_nullable();
        }
        if other.is_nullable() {
            this_adjusted = this_adjusted.as_nullable();
        }

        if this_adjusted == other_adjusted {
            return this_adjusted;
        }
        if this_adjusted.check_subtype_of(&other_adjusted, tg).is_ok() {
            return other_adjusted;
        }
        if other_adjusted.check_subtype_of(&this_adjusted, tg).is_ok() {
            return this_adjusted;
        }

        TypeReference::Any
    }

    /// Verifies the reference is well-formed: correct generic arity and
    /// arguments satisfying their constraints.
    pub fn verify(&self, tg: &TypeGraph<'_>) -> Result<(), SubtypeError> {
        let TypeReference::Normal {
            type_node,
            generics,
            ..
        } = self
        else {
            return Ok(());
        };

        // Function references are arity-checked by the parser.
        if *type_node == tg.builtins.function_type {
            return Ok(());
        }

        if tg.store.kind_of::<TgKind>(*type_node) == TgKind::Generic {
            return Ok(());
        }

        let type_generics = tg.generics_of(*type_node);
        if type_generics.len() != generics.len() {
            return subtype_err(format!(
                "expected {} generics on type '{}', found: {}",
                type_generics.len(),
                tg.type_name(*type_node),
                generics.len()
            ));
        }

        for (index, (generic_node, argument)) in
            type_generics.iter().zip(generics).enumerate()
        {
            let constraint = tg.generic_constraint(*generic_node);
            if let Err(err) = argument.check_subtype_of(&constraint, tg) {
                return subtype_err(format!(
                    "generic '{}' (#{}) on type '{}' has constraint '{}'; specified type '{}' does not match: {}",
                    tg.type_name(*generic_node),
                    index + 1,
                    tg.type_name(*type_node),
                    constraint.display(tg),
                    argument.display(tg),
                    err
                ));
            }
        }

        for argument in generics {
            argument.verify(tg)?;
        }
        Ok(())
    }

    /// Checks `self <: other`.
    ///
    /// Subtyping rules:
    /// - all types are subtypes of `any`;
    /// - the special `null` type is a subtype of any nullable type;
    /// - a non-nullable type is a subtype of its nullable form, never the
    ///   converse;
    /// - a non-interface type is a subtype of itself and nothing else;
    /// - a type is a subtype of an implicit interface when it defines the
    ///   interface's full member-signature set.
    pub fn check_subtype_of(
        &self,
        other: &TypeReference,
        tg: &TypeGraph<'_>,
    ) -> Result<(), SubtypeError> {
        if self.is_void() || other.is_void() {
            return subtype_err("void types cannot be used interchangeably".to_owned());
        }

        if self.is_null() {
            if !other.is_any() && !other.is_nullable() {
                return subtype_err(format!(
                    "null cannot be used in place of non-nullable type '{}'",
                    other.display(tg)
                ));
            }
            return Ok(());
        }

        if other.is_null() {
            return subtype_err("null cannot be supertype of any other type".to_owned());
        }

        if other.is_any() {
            return Ok(());
        }
        if self.is_any() {
            return subtype_err(format!(
                "cannot use type 'any' in place of type '{}'",
                other.display(tg)
            ));
        }

        if self.is_nullable() && !other.is_nullable() {
            return subtype_err(format!(
                "nullable type '{}' cannot be used in place of non-nullable type '{}'",
                self.display(tg),
                other.display(tg)
            ));
        }

        if self == other {
            return Ok(());
        }

        // Strip nullability from the other side and re-compare.
        let original_other = other;
        let other = other.as_non_nullable();
        let this = self.as_non_nullable();
        if this == other {
            return Ok(());
        }

        let local_type = this.referred_type_node();
        let other_type = other.referred_type_node();

        // Generic parameters match only by their constraint.
        if tg.store.kind_of::<TgKind>(local_type) == TgKind::Generic {
            let constraint = tg.generic_constraint(local_type);
            if constraint.is_any() {
                return subtype_err(format!(
                    "generic type '{}' has no constraint matching '{}'",
                    this.display(tg),
                    original_other.display(tg)
                ));
            }
            return constraint.check_subtype_of(&other, tg);
        }

        if tg.type_kind(other_type) != TypeKind::ImplicitInterface {
            return subtype_err(format!(
                "'{}' cannot be used in place of non-interface '{}'",
                self.display(tg),
                original_other.display(tg)
            ));
        }

        // Structural conformance: every member signature on the interface
        // must appear on the local type with an identical adjusted signature.
        let local_generics = this.generics();
        let other_generics = other.generics();

        if local_generics.is_empty() && other_generics.is_empty() {
            // Fast path: compare serialized signatures directly.
            for member in tg
                .members_of(other_type)
                .into_iter()
                .chain(tg.operators_of(other_type))
            {
                let signature = tg.member_signature(member);
                let found = tg
                    .members_of(local_type)
                    .into_iter()
                    .chain(tg.operators_of(local_type))
                    .any(|local_member| tg.member_signature(local_member) == signature);
                if !found {
                    return Err(build_subtype_mismatch_error(
                        &this,
                        original_other,
                        &tg.member_name(member),
                        tg,
                    ));
                }
            }
            return Ok(());
        }

        let other_signatures = other.build_member_signatures_map(tg);
        let local_signatures = this.build_member_signatures_map(tg);

        for (member_name, member_signature) in &other_signatures {
            match local_signatures.get(member_name) {
                Some(local_signature) if local_signature == member_signature => {}
                _ => {
                    return Err(build_subtype_mismatch_error(
                        &this,
                        original_other,
                        member_name,
                        tg,
                    ));
                }
            }
        }

        Ok(())
    }

    /// Map of member name to signature, adjusted by substituting the referred
    /// type's generics with this reference's arguments.
    fn build_member_signatures_map(
        &self,
        tg: &TypeGraph<'_>,
    ) -> std::collections::BTreeMap<String, String> {
        let type_node = self.referred_type_node();
        let mut map = std::collections::BTreeMap::new();
        for member in tg
            .members_of(type_node)
            .into_iter()
            .chain(tg.operators_of(type_node))
        {
            map.insert(
                tg.member_name(member),
                self.adjusted_member_signature(member, tg),
            );
        }
        map
    }

    /// The member's signature with the parent type's generics replaced by
    /// the arguments of this reference.
    pub fn adjusted_member_signature(&self, member: NodeId, tg: &TypeGraph<'_>) -> String {
        let parent_generics = tg.generics_of(self.referred_type_node());
        let mut signature = MemberSignature::parse(&tg.member_signature(member));

        for (generic_node, argument) in parent_generics.iter().zip(self.generics()) {
            signature.member_type = signature.member_type.replace_type(*generic_node, argument);
            signature.generic_constraints = signature
                .generic_constraints
                .iter()
                .map(|constraint| constraint.replace_type(*generic_node, argument))
                .collect();
        }

        signature.serialize_value()
    }

    /// Checks concrete subtyping against a *generic* implicit interface: for
    /// each interface generic, infer the concrete type from a matching member
    /// and then recheck normally. Returns the inferred generics on success.
    pub fn check_concrete_subtype_of(
        &self,
        other_type: NodeId,
        tg: &TypeGraph<'_>,
    ) -> Result<Vec<TypeReference>, SubtypeError> {
        assert_eq!(
            tg.type_kind(other_type),
            TypeKind::ImplicitInterface,
            "concrete subtype check requires an interface"
        );
        let other_type_generics = tg.generics_of(other_type);
        assert!(
            !other_type_generics.is_empty(),
            "concrete subtype check requires a generic interface"
        );

        if !self.is_normal() {
            return subtype_err(format!(
                "type '{}' does not implement type '{}'",
                self.display(tg),
                tg.type_name(other_type)
            ));
        }
        if self.is_nullable() {
            return subtype_err(format!(
                "nullable type '{}' cannot match type '{}'",
                self.display(tg),
                tg.type_name(other_type)
            ));
        }

        let local_type = self.referred_type_node();
        if local_type == other_type {
            return Ok(self.generics().to_vec());
        }

        let local_type_generics = tg.generics_of(local_type);
        let local_ref_generics = self.generics();

        let mut resolved = Vec::with_capacity(other_type_generics.len());
        for type_generic in &other_type_generics {
            // Find a member of the interface whose type mentions the generic.
            let matching_member = tg
                .members_of(other_type)
                .into_iter()
                .find(|member| tg.member_type(*member).contains_type(*type_generic));

            let Some(matching_member) = matching_member else {
                // No member constrains this generic; infer `any`.
                resolved.push(TypeReference::Any);
                continue;
            };

            let member_name = tg.member_name(matching_member);
            let Some(local_member) = tg.get_member(local_type, &member_name) else {
                return subtype_err(format!(
                    "type '{}' cannot be used in place of type '{}' as it does not implement member '{}'",
                    self.display(tg),
                    tg.type_name(other_type),
                    member_name
                ));
            };

            let Some(concrete) = tg
                .member_type(local_member)
                .extract_type_diff(&tg.member_type(matching_member), *type_generic)
            else {
                return subtype_err(format!(
                    "type '{}' cannot be used in place of type '{}' as member '{}' does not have the same signature",
                    self.display(tg),
                    tg.type_name(other_type),
                    member_name
                ));
            };

            // Replace the local type's own generics with the reference's
            // arguments.
            let mut replaced = concrete;
            for (local_generic, argument) in
                local_type_generics.iter().zip(local_ref_generics)
            {
                replaced = replaced.replace_type(*local_generic, argument);
            }
            resolved.push(replaced);
        }

        self.check_subtype_of(&tg.new_type_reference(other_type, resolved.clone()), tg)?;
        Ok(resolved)
    }

    /// Checks that this reference refers to a type structurally declaring
    /// `other` as a parent.
    pub fn check_structural_subtype_of(&self, other: &TypeReference, tg: &TypeGraph<'_>) -> bool {
        if !self.is_normal() || !other.is_normal() {
            return false;
        }
        tg.parent_types(self.referred_type_node())
            .iter()
            .any(|parent| parent == other)
    }

    /// Checks that this reference is nominally convertible to or from the
    /// other: one side must be a nominal type deriving (transitively) from
    /// the other.
    pub fn check_nominal_convertable(
        &self,
        other: &TypeReference,
        tg: &TypeGraph<'_>,
    ) -> Result<(), SubtypeError> {
        if !self.is_normal() || !other.is_normal() {
            return subtype_err(format!(
                "type '{}' cannot be converted to type '{}'",
                self.display(tg),
                other.display(tg)
            ));
        }

        let this_kind = tg.type_kind(self.referred_type_node());
        let other_kind = tg.type_kind(other.referred_type_node());
        if this_kind != TypeKind::Nominal && other_kind != TypeKind::Nominal {
            return subtype_err(format!(
                "type '{}' cannot be converted to or from type '{}'",
                self.display(tg),
                other.display(tg)
            ));
        }

        if !self.check_nominal_parent(other, tg) && !other.check_nominal_parent(self, tg) {
            return subtype_err(format!(
                "type '{}' cannot be converted to or from type '{}'",
                self.display(tg),
                other.display(tg)
            ));
        }

        Ok(())
    }

    fn check_nominal_parent(&self, other: &TypeReference, tg: &TypeGraph<'_>) -> bool {
        if self == other {
            return true;
        }

        if tg.type_kind(self.referred_type_node()) != TypeKind::Nominal {
            return false;
        }

        // Walk the parent chain.
        let mut parent = match tg.parent_types(self.referred_type_node()).first() {
            Some(parent) => parent.clone(),
            None => return false,
        };
        loop {
            if parent == *other {
                return true;
            }
            if !parent.is_normal() {
                return false;
            }
            let parent_type = parent.referred_type_node();
            if tg.type_kind(parent_type) != TypeKind::Nominal {
                return false;
            }
            parent = match tg.parent_types(parent_type).first() {
                Some(next) => next.clone(),
                None => return false,
            };
        }
    }

    /// Looks up a member with the given name under the referred type,
    /// honoring export visibility and static/instance resolution.
    pub fn resolve_member(
        &self,
        member_name: &str,
        module: &crate::source::InputSource,
        kind: MemberResolutionKind,
        tg: &TypeGraph<'_>,
    ) -> Option<NodeId> {
        if !self.is_normal() {
            return None;
        }

        let type_node = self.referred_type_node();
        let member = match kind {
            MemberResolutionKind::Operator => tg.get_operator(type_node, member_name)?,
            _ => tg.get_member(type_node, member_name)?,
        };

        // Unexported members resolve only from their declaring module.
        if !tg.member_is_exported(member) {
            let member_module = tg.store.get_str(member, TgPredicate::MemberModule);
            if member_module.as_deref() != Some(module.as_str()) {
                return None;
            }
        }

        let is_static = tg.member_is_static(member);
        match kind {
            MemberResolutionKind::Instance if is_static => None,
            MemberResolutionKind::Static if !is_static => None,
            _ => Some(member),
        }
    }

    /// Renders a human-friendly form, e.g. `List<int?>`.
    pub fn display(&self, tg: &TypeGraph<'_>) -> String {
        match self {
            TypeReference::Any => "any".to_owned(),
            TypeReference::Void => "void".to_owned(),
            TypeReference::Null => "null".to_owned(),
            TypeReference::Local(index) => format!("%{index}"),
            TypeReference::Normal {
                type_node,
                nullable,
                generics,
                parameters,
            } => {
                let mut out = tg.type_name(*type_node);
                if !generics.is_empty() {
                    out.push('<');
                    for (index, generic) in generics.iter().enumerate() {
                        if index > 0 {
                            out.push_str(", ");
                        }
                        out.push_str(&generic.display(tg));
                    }
                    out.push('>');
                }
                if !parameters.is_empty() {
                    out.push('(');
                    for (index, parameter) in parameters.iter().enumerate() {
                        if index > 0 {
                            out.push_str(", ");
                        }
                        out.push_str(&parameter.display(tg));
                    }
                    out.push(')');
                }
                if *nullable {
                    out.push('?');
                }
                out
            }
        }
    }
}

fn build_subtype_mismatch_error(
    left: &TypeReference,
    right: &TypeReference,
    member_name: &str,
    tg: &TypeGraph<'_>,
) -> SubtypeError {
    let right_type = right.as_non_nullable().referred_type_node();
    let member_kind = if tg.get_operator(right_type, member_name).is_some() {
        "operator"
    } else {
        "member"
    };

    let left_type = left.referred_type_node();
    let left_has = tg.get_member(left_type, member_name).is_some()
        || tg.get_operator(left_type, member_name).is_some();

    if left_has {
        SubtypeError(format!(
            "{member_kind} '{member_name}' under type '{}' does not have the same signature as that defined in type '{}'",
            left.display(tg),
            right.display(tg)
        ))
    } else {
        SubtypeError(format!(
            "type '{}' does not define or export {member_kind} '{member_name}', which is required by type '{}'",
            left.display(tg),
            right.display(tg)
        ))
    }
}
