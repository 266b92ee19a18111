//! Programmatic type graph constructor for unit tests.
//!
//! Lets tests declare modules, types, generics, and members without parsing
//! source, mirroring the shape of the SRG constructor.

use std::cell::RefCell;

use rustc_hash::FxHashMap;
use serulian_graph::store::NodeId;

use super::construction::{
    DependencyAnnotator, GenericDeclaration, MemberBuilder, MemberDefinition, ModuleBuilder,
    TypeBuilder, TypeGraphConstructor, ValidationReporter,
};
use super::typeref::TypeReference;
use super::{TgKind, TypeGraph};

/// A declared test generic: name plus optional constraint (by type name).
pub struct TestGeneric {
    pub name: &'static str,
    pub constraint: Option<&'static str>,
}

/// A declared test member.
pub struct TestMember {
    pub name: &'static str,
    pub is_operator: bool,
    /// Return type name; None means the member is a value of `value_type`.
    pub return_type: Option<&'static str>,
    pub value_type: Option<&'static str>,
    pub parameters: Vec<&'static str>,
}

impl TestMember {
    pub fn function(name: &'static str, return_type: &'static str, parameters: Vec<&'static str>) -> Self {
        Self {
            name,
            is_operator: false,
            return_type: Some(return_type),
            value_type: None,
            parameters,
        }
    }

    pub fn value(name: &'static str, value_type: &'static str) -> Self {
        Self {
            name,
            is_operator: false,
            return_type: None,
            value_type: Some(value_type),
            parameters: Vec::new(),
        }
    }
}

/// A declared test type.
pub struct TestType {
    pub kind: TgKind,
    pub name: &'static str,
    pub parent: Option<&'static str>,
    pub generics: Vec<TestGeneric>,
    pub members: Vec<TestMember>,
}

/// Constructor that declares everything under one test module.
pub struct TestTypeConstructor {
    pub module_path: &'static str,
    pub types: Vec<TestType>,
    type_nodes: RefCell<FxHashMap<&'static str, NodeId>>,
}

impl TestTypeConstructor {
    pub fn new(module_path: &'static str, types: Vec<TestType>) -> Self {
        Self {
            module_path,
            types,
            type_nodes: RefCell::new(FxHashMap::default()),
        }
    }

    fn resolve_named(&self, tg: &TypeGraph<'_>, name: &str) -> TypeReference {
        if let Some(node) = self.type_nodes.borrow().get(name) {
            return TypeReference::normal(*node);
        }
        if let Some(builtin) = tg.builtins.by_name(name) {
            return TypeReference::normal(builtin);
        }
        // Generic parameter of a test type, written as `TypeName::G`.
        if let Some((type_name, generic_name)) = name.split_once("::") {
            if let Some(type_node) = self.type_nodes.borrow().get(type_name) {
                for generic in tg.generics_of(*type_node) {
                    if tg.type_name(generic) == generic_name {
                        return TypeReference::normal(generic);
                    }
                }
            }
        }
        panic!("test constructor: unknown type name '{name}'");
    }
}

impl TypeGraphConstructor for TestTypeConstructor {
    fn define_modules(&self, builder: &mut ModuleBuilder<'_, '_>) {
        builder.define_module(self.module_path, None);
    }

    fn define_types(&self, builder: &mut TypeBuilder<'_, '_>) {
        for test_type in &self.types {
            let generics: Vec<GenericDeclaration> = test_type
                .generics
                .iter()
                .map(|generic| GenericDeclaration {
                    name: generic.name.to_owned(),
                    source: None,
                })
                .collect();
            let node = builder.define_type(
                self.module_path,
                test_type.kind,
                test_type.name,
                None,
                None,
                &generics,
            );
            self.type_nodes.borrow_mut().insert(test_type.name, node);
        }
    }

    fn define_dependencies(&self, annotator: &mut DependencyAnnotator<'_, '_>, tg: &TypeGraph<'_>) {
        for test_type in &self.types {
            let node = self.type_nodes.borrow()[test_type.name];

            if let Some(parent) = test_type.parent {
                let parent_ref = self.resolve_named(tg, parent);
                annotator.define_parent_type(node, &parent_ref);
            }

            for (generic_node, generic) in
                tg.generics_of(node).into_iter().zip(&test_type.generics)
            {
                if let Some(constraint) = generic.constraint {
                    let constraint_ref = self.resolve_named(tg, constraint);
                    annotator.define_generic_constraint(generic_node, &constraint_ref);
                }
            }
        }
    }

    fn define_members(&self, builder: &mut MemberBuilder<'_, '_>, tg: &TypeGraph<'_>) {
        for test_type in &self.types {
            let node = self.type_nodes.borrow()[test_type.name];
            for member in &test_type.members {
                let member_type = match (&member.return_type, &member.value_type) {
                    (Some(return_type), _) => {
                        let mut reference = tg
                            .function_type_reference(self.resolve_named(tg, return_type));
                        for parameter in &member.parameters {
                            reference =
                                reference.with_parameter(self.resolve_named(tg, parameter));
                        }
                        reference
                    }
                    (None, Some(value_type)) => self.resolve_named(tg, value_type),
                    (None, None) => TypeReference::Any,
                };

                let return_type = member
                    .return_type
                    .map(|return_type| self.resolve_named(tg, return_type));

                builder.define_member(
                    node,
                    MemberDefinition {
                        name: member.name.to_owned(),
                        is_operator: member.is_operator,
                        member_type,
                        return_type,
                        generics: Vec::new(),
                        is_static: member.is_operator,
                        is_read_only: true,
                        is_exported: true,
                        module_path: self.module_path.to_owned(),
                        source: None,
                    },
                );
            }
        }
    }

    fn validate(&self, _reporter: &mut ValidationReporter<'_>, _tg: &TypeGraph<'_>) {}
}
