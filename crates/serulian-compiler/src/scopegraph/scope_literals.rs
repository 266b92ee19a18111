//! Scoping of literal expressions, lambdas, structural news, and SML.

use serulian_graph::store::NodeId;

use crate::sourceshape::{SrgKind, SrgPredicate};
use crate::typegraph::{MemberResolutionKind, TypeReference};

use super::builder::ScopeBuilder;
use super::context::ScopeContext;
use super::proto::{ScopeInfo, ScopeKind};

impl ScopeBuilder<'_, '_> {
    pub(super) fn scope_boolean_literal(&self, _node: NodeId) -> ScopeInfo {
        ScopeInfo::valid().resolving(self.tg.bool_type_reference())
    }

    pub(super) fn scope_numeric_literal(&self, node: NodeId) -> ScopeInfo {
        let text = self
            .srg
            .store
            .get_str(node, SrgPredicate::LiteralValue)
            .unwrap_or_default();
        let resolved = if text.contains('.') || text.contains('e') || text.contains('E') {
            self.tg.float_type_reference()
        } else {
            self.tg.int_type_reference()
        };
        ScopeInfo::valid().resolving(resolved)
    }

    pub(super) fn scope_string_literal(&self, _node: NodeId) -> ScopeInfo {
        ScopeInfo::valid().resolving(self.tg.string_type_reference())
    }

    pub(super) fn scope_template_string(&self, _node: NodeId, _context: &ScopeContext) -> ScopeInfo {
        ScopeInfo::valid().resolving(self.tg.string_type_reference())
    }

    pub(super) fn scope_null_literal(&self, _node: NodeId) -> ScopeInfo {
        ScopeInfo::valid().resolving(self.tg.null_type_reference())
    }

    pub(super) fn scope_this_literal(&self, node: NodeId) -> ScopeInfo {
        let Some(type_def) = self.srg.containing_type(node) else {
            self.decorate_error(
                node,
                "the 'this' keyword may only be used under a type member",
            );
            return ScopeInfo::invalid();
        };
        let Some(type_node) = self.tg.type_for_source(type_def) else {
            return ScopeInfo::invalid();
        };
        ScopeInfo::valid().resolving(self.tg.new_instance_type_reference(type_node))
    }

    pub(super) fn scope_val_literal(&self, node: NodeId) -> ScopeInfo {
        // `val` is the principal value of an agent.
        let Some(type_def) = self.srg.containing_type(node) else {
            self.decorate_error(node, "the 'val' keyword may only be used under an agent");
            return ScopeInfo::invalid();
        };
        if self.srg.kind(type_def) != SrgKind::Agent {
            self.decorate_error(node, "the 'val' keyword may only be used under an agent");
            return ScopeInfo::invalid();
        }
        let Some(type_node) = self.tg.type_for_source(type_def) else {
            return ScopeInfo::invalid();
        };
        let principal = self
            .tg
            .parent_types(type_node)
            .first()
            .cloned()
            .unwrap_or_else(|| self.tg.any_type_reference());
        ScopeInfo::valid().resolving(principal)
    }

    pub(super) fn scope_list_literal(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        let mut element_type: Option<TypeReference> = None;
        let mut is_valid = true;

        for element in self
            .srg
            .store
            .from_node(node)
            .out(&[SrgPredicate::ListElement])
            .node_ids()
        {
            let element_scope = self.get_scope(element, context);
            if !element_scope.is_valid {
                is_valid = false;
                continue;
            }
            element_type = Some(match element_type {
                Some(existing) => existing.intersect(&element_scope.resolved_type, self.tg),
                None => element_scope.resolved_type,
            });
        }

        if !is_valid {
            return ScopeInfo::invalid();
        }

        let value_type = element_type.unwrap_or_else(|| self.tg.any_type_reference());
        ScopeInfo::valid().resolving(
            TypeReference::normal(self.tg.builtins.slice_type).with_generic(value_type),
        )
    }

    pub(super) fn scope_map_literal(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        let mut value_type: Option<TypeReference> = None;
        let mut is_valid = true;
        let string_type = self.tg.string_type_reference();

        for entry in self
            .srg
            .store
            .from_node(node)
            .out(&[SrgPredicate::MapEntryRef])
            .node_ids()
        {
            let key_scope = self.scope_child(entry, SrgPredicate::MapEntryKey, context);
            if key_scope.is_valid
                && key_scope
                    .resolved_type
                    .check_subtype_of(&string_type, self.tg)
                    .is_err()
            {
                self.decorate_error(
                    entry,
                    format!(
                        "mapping keys must be of type 'string', found: {}",
                        key_scope.resolved_type.display(self.tg)
                    ),
                );
                is_valid = false;
            }
            is_valid &= key_scope.is_valid;

            let entry_value_scope = self.scope_child(entry, SrgPredicate::MapEntryValue, context);
            if !entry_value_scope.is_valid {
                is_valid = false;
                continue;
            }
            value_type = Some(match value_type {
                Some(existing) => existing.intersect(&entry_value_scope.resolved_type, self.tg),
                None => entry_value_scope.resolved_type,
            });
        }

        if !is_valid {
            return ScopeInfo::invalid();
        }

        let value_type = value_type.unwrap_or_else(|| self.tg.any_type_reference());
        ScopeInfo::valid().resolving(
            TypeReference::normal(self.tg.builtins.mapping_type).with_generic(value_type),
        )
    }

    pub(super) fn scope_structural_new(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        let type_scope = self.scope_child(node, SrgPredicate::StructuralNewTypeExpr, context);
        if !type_scope.is_valid {
            return ScopeInfo::invalid();
        }

        if type_scope.kind != ScopeKind::Static {
            self.decorate_error(node, "structural new requires a type expression");
            return ScopeInfo::invalid();
        }
        let Some(target) = type_scope.static_type.clone() else {
            return ScopeInfo::invalid();
        };

        let module = self.srg.node_source(node);
        let mut is_valid = true;

        for entry in self
            .srg
            .store
            .from_node(node)
            .out(&[SrgPredicate::StructuralNewEntryRef])
            .node_ids()
        {
            let Some(key) = self
                .srg
                .store
                .get_str(entry, SrgPredicate::StructuralNewEntryKey)
            else {
                is_valid = false;
                continue;
            };

            let Some(member) = target.resolve_member(
                &key,
                &module,
                MemberResolutionKind::Instance,
                self.tg,
            ) else {
                self.decorate_error(
                    entry,
                    format!(
                        "'{key}' is not a member of type '{}'",
                        target.display(self.tg)
                    ),
                );
                is_valid = false;
                continue;
            };

            let member_type = self.tg.member_type(member).transform_under(&target, self.tg);
            let value_scope =
                self.scope_child(entry, SrgPredicate::StructuralNewEntryValue, context);
            if !value_scope.is_valid {
                is_valid = false;
                continue;
            }
            if let Err(err) = value_scope.resolved_type.check_subtype_of(&member_type, self.tg) {
                self.decorate_error(entry, format!("invalid value for '{key}': {err}"));
                is_valid = false;
            }
        }

        if !is_valid {
            return ScopeInfo::invalid();
        }
        ScopeInfo::valid().resolving(target)
    }

    pub(super) fn scope_lambda_expression(
        &self,
        node: NodeId,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let mut parameter_types = Vec::new();
        for parameter in self
            .srg
            .store
            .from_node(node)
            .out(&[SrgPredicate::LambdaParameter])
            .node_ids()
        {
            let parameter_type = self
                .srg
                .store
                .get_node(parameter, SrgPredicate::ParameterTypeRef)
                .and_then(|type_ref| self.resolve_type_ref_or_error(type_ref))
                .unwrap_or_else(|| self.tg.any_type_reference());
            parameter_types.push(parameter_type);
        }

        // Expression-bodied lambdas return their expression's type;
        // block-bodied lambdas return the block's returned type.
        let return_type = if let Some(expression) =
            self.srg.store.get_node(node, SrgPredicate::LambdaExpr)
        {
            let scope = self.get_scope(expression, context);
            if !scope.is_valid {
                return ScopeInfo::invalid();
            }
            scope.resolved_type
        } else if let Some(block) = self.srg.store.get_node(node, SrgPredicate::LambdaBlock) {
            let scope = self.get_scope(block, context);
            if !scope.is_valid {
                return ScopeInfo::invalid();
            }
            scope.returned_type.unwrap_or(TypeReference::Void)
        } else {
            TypeReference::Void
        };

        let mut function = self.tg.function_type_reference(return_type);
        for parameter_type in parameter_types {
            function = function.with_parameter(parameter_type);
        }

        ScopeInfo::valid().resolving(function)
    }

    /// An SML expression invokes its tag as a factory function: attributes
    /// and children are checked against the function's signature where
    /// possible, and the expression resolves to the factory's return type.
    pub(super) fn scope_sml_expression(&self, node: NodeId, context: &ScopeContext) -> ScopeInfo {
        let tag_scope = self.scope_child(node, SrgPredicate::SmlTagExpr, context);
        if !tag_scope.is_valid {
            return ScopeInfo::invalid();
        }

        let tag_type = &tag_scope.resolved_type;
        if !tag_type.is_normal()
            || tag_type.referred_type_node() != self.tg.builtins.function_type
        {
            self.decorate_error(
                node,
                format!(
                    "SML tag must be a function, found: {}",
                    tag_type.display(self.tg)
                ),
            );
            return ScopeInfo::invalid();
        }

        let mut is_valid = true;
        for attribute in self
            .srg
            .store
            .from_node(node)
            .out(&[SrgPredicate::SmlAttributeRef])
            .node_ids()
        {
            let value_scope =
                self.scope_child(attribute, SrgPredicate::SmlAttributeValue, context);
            is_valid &= value_scope.is_valid;
        }

        for child in self
            .srg
            .store
            .from_node(node)
            .out(&[SrgPredicate::SmlChild])
            .node_ids()
        {
            let child_scope = self.get_scope(child, context);
            is_valid &= child_scope.is_valid;
        }

        if !is_valid {
            return ScopeInfo::invalid();
        }

        let result = tag_type
            .generics()
            .first()
            .cloned()
            .unwrap_or_else(|| self.tg.any_type_reference());

        let mut scope = ScopeInfo::valid().resolving(result);
        if let Some(named) = &tag_scope.named_reference {
            if !named.is_local() {
                scope = scope.targeting(named.node);
            }
        }
        scope
    }

    pub(super) fn scope_sml_text(&self, _node: NodeId, _context: &ScopeContext) -> ScopeInfo {
        ScopeInfo::valid().resolving(self.tg.string_type_reference())
    }
}
