//! Scoping of declared values: module variables, type fields, and variable
//! statements.

use serulian_graph::store::NodeId;

use crate::sourceshape::SrgPredicate;

use super::builder::ScopeBuilder;
use super::context::ScopeContext;
use super::proto::ScopeInfo;

impl ScopeBuilder<'_, '_> {
    /// Scopes a declared value. When `require_initializer` is set, a
    /// non-nullable declared (or defaulted) type without an initializer is an
    /// error; fields may default and pass false.
    pub(super) fn scope_declared_value(
        &self,
        node: NodeId,
        title: &str,
        require_initializer: bool,
        context: &ScopeContext,
    ) -> ScopeInfo {
        let name = self
            .srg
            .store
            .get_str(node, SrgPredicate::VariableName)
            .unwrap_or_default();

        let initializer = self.srg.store.get_node(node, SrgPredicate::VariableExpression);
        let initializer_scope = initializer.map(|expression| self.get_scope(expression, context));

        if let Some(scope) = &initializer_scope {
            if !scope.is_valid {
                return ScopeInfo::invalid();
            }
        }

        let declared_ref = self
            .srg
            .store
            .get_node(node, SrgPredicate::VariableDeclaredTypeRef);

        let Some(declared_ref) = declared_ref else {
            // No declared type: infer from the initializer.
            return match initializer_scope {
                Some(scope) => ScopeInfo::valid()
                    .assignable(scope.resolved_type.clone())
                    .resolving(scope.resolved_type),
                None => {
                    // The defaulted type is non-nullable `any`, so an
                    // initializer is required.
                    if require_initializer {
                        self.decorate_error(
                            node,
                            format!(
                                "{title} '{name}' must have explicit initializer as its type 'any' is non-nullable"
                            ),
                        );
                        return ScopeInfo::invalid();
                    }
                    ScopeInfo::valid().assignable(self.tg.any_type_reference())
                }
            };
        };

        let Some(declared_type) = self.resolve_type_ref_or_error(declared_ref) else {
            return ScopeInfo::invalid();
        };

        match initializer_scope {
            Some(scope) => {
                if let Err(err) = scope.resolved_type.check_subtype_of(&declared_type, self.tg) {
                    self.decorate_error(
                        node,
                        format!(
                            "{title} '{name}' has declared type '{}': {err}",
                            declared_type.display(self.tg)
                        ),
                    );
                    return ScopeInfo::invalid();
                }
            }
            None => {
                if require_initializer && !declared_type.is_nullable() {
                    self.decorate_error(
                        node,
                        format!(
                            "{title} '{name}' must have explicit initializer as its type '{}' is non-nullable",
                            declared_type.display(self.tg)
                        ),
                    );
                    return ScopeInfo::invalid().assignable(declared_type);
                }
            }
        }

        ScopeInfo::valid()
            .assignable(declared_type.clone())
            .resolving(declared_type)
    }
}
