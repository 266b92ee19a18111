//! Lexical name resolution over the SRG.
//!
//! Resolution ordering for a bare identifier:
//! 1. the innermost lexical binding (parameter, named value, or variable
//!    statement) whose extent contains the reference and whose start
//!    precedes it - variable statements are additionally invisible within
//!    their own initializer;
//! 2. a declaration in the enclosing module;
//! 3. a named import;
//! 4. an imported package alias.

use serulian_graph::store::NodeId;

use crate::sourceshape::{SrgKind, SrgPredicate};

use super::Srg;

/// The kinds of named scope a name can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedScopeKind {
    /// A type or generic.
    Type,
    /// A module-level or type member.
    Member,
    /// An import binding.
    Import,
    /// A parameter.
    Parameter,
    /// A read-only value exported by a statement (loop, with, match).
    Value,
    /// A variable statement.
    Variable,
}

/// A resolved reference to a named declaration in the SRG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrgNamedScope {
    pub node: NodeId,
    pub kind: NamedScopeKind,
    pub srg_kind: SrgKind,
}

impl SrgNamedScope {
    pub(super) fn declaration(srg_kind: SrgKind, node: NodeId) -> Self {
        let kind = match srg_kind {
            kind if kind.is_type_definition() => NamedScopeKind::Type,
            SrgKind::Generic => NamedScopeKind::Type,
            kind if kind.is_member() => NamedScopeKind::Member,
            SrgKind::ImportPackage => NamedScopeKind::Import,
            SrgKind::Parameter => NamedScopeKind::Parameter,
            SrgKind::NamedValue | SrgKind::AssignedValue => NamedScopeKind::Value,
            SrgKind::VariableStatement => NamedScopeKind::Variable,
            other => panic!("node kind {other:?} is not a named scope"),
        };
        Self {
            node,
            kind,
            srg_kind,
        }
    }

    /// Whether the scoped node can be assigned to.
    pub fn is_assignable(&self) -> bool {
        // Whether a member is assignable is only known to the type graph, so
        // members always answer false here.
        self.kind == NamedScopeKind::Variable
    }

    /// Whether the scoped node is static (accessed without an instance).
    pub fn is_static(&self) -> bool {
        match self.kind {
            NamedScopeKind::Type | NamedScopeKind::Import => true,
            NamedScopeKind::Member => self.srg_kind == SrgKind::Constructor,
            _ => false,
        }
    }

    /// Whether an access of the name immediately uses the value (variable or
    /// property read), as opposed to naming something invoked later.
    pub fn access_is_usage(&self) -> bool {
        match self.kind {
            NamedScopeKind::Member => self.srg_kind == SrgKind::Property,
            NamedScopeKind::Value | NamedScopeKind::Parameter | NamedScopeKind::Variable => true,
            _ => false,
        }
    }

    pub fn title(&self) -> &'static str {
        match self.kind {
            NamedScopeKind::Type => "type",
            NamedScopeKind::Member => "member",
            NamedScopeKind::Import => "import",
            NamedScopeKind::Parameter => "parameter",
            NamedScopeKind::Value => "value",
            NamedScopeKind::Variable => "variable",
        }
    }
}

/// A name resolved to either a declaration or a whole imported package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeOrImport {
    Named(SrgNamedScope),
    /// A package alias; members are accessed through it.
    Package {
        reference_id: String,
        binding: NodeId,
    },
}

struct Candidate {
    scope: SrgNamedScope,
    binding_start: u32,
}

impl Srg<'_> {
    /// Resolves a bare name at the given reference node.
    pub fn resolve_name(&self, name: &str, context: NodeId) -> Option<ScopeOrImport> {
        // 1. Innermost lexical binding.
        if let Some(found) = self.resolve_lexical(name, context) {
            return Some(ScopeOrImport::Named(found));
        }

        // 2. Module declaration.
        let module = self.containing_module(context)?;
        if let Some(found) = self.resolve_module_declaration(module, name) {
            return Some(ScopeOrImport::Named(found));
        }

        // 3 and 4. Imports.
        self.resolve_import(module, name)
    }

    fn resolve_lexical(&self, name: &str, context: NodeId) -> Option<SrgNamedScope> {
        let source = self.node_source(context);
        let position: u32 = self.node_range(context).start().into();

        let mut candidates: Vec<Candidate> = Vec::new();

        // Variable statements: visible after their statement, within the
        // enclosing block, and never within their own initializer.
        for variable in self.store.nodes_of_kind(SrgKind::VariableStatement) {
            if self.node_source(variable) != source {
                continue;
            }
            if self.node_name(variable).as_deref() != Some(name) {
                continue;
            }
            let range = self.node_range(variable);
            let start: u32 = range.start().into();
            let end: u32 = range.end().into();
            if start >= position {
                continue;
            }
            // In-own-initializer: the reference sits inside the statement.
            if position <= end {
                continue;
            }
            let Some(block) = self.containing_node(
                &source,
                start,
                &[SrgKind::StatementBlock],
            ) else {
                continue;
            };
            let block_range = self.node_range(block);
            if u32::from(block_range.end()) < position {
                continue;
            }
            candidates.push(Candidate {
                scope: SrgNamedScope::declaration(SrgKind::VariableStatement, variable),
                binding_start: start,
            });
        }

        // Named values exported by loop/with/match statements: visible within
        // the owning statement.
        for kind in [SrgKind::NamedValue, SrgKind::AssignedValue] {
            for named in self.store.nodes_of_kind(kind) {
                if self.node_source(named) != source {
                    continue;
                }
                if self.node_name(named).as_deref() != Some(name) {
                    continue;
                }
                let Some(statement) = self.named_value_statement(named) else {
                    continue;
                };
                let statement_range = self.node_range(statement);
                let start: u32 = self.node_range(named).start().into();
                if start >= position {
                    continue;
                }
                if u32::from(statement_range.start()) <= position
                    && position <= u32::from(statement_range.end())
                {
                    candidates.push(Candidate {
                        scope: SrgNamedScope::declaration(kind, named),
                        binding_start: start,
                    });
                }
            }
        }

        // Parameters and generics of the containing implementables and type.
        let mut implementable = self.containing_implementable(context);
        while let Some(member) = implementable {
            for parameter in self.store.from_node(member).out(&[
                SrgPredicate::MemberParameter,
                SrgPredicate::LambdaParameter,
            ]).node_ids()
            {
                if self.node_name(parameter).as_deref() == Some(name) {
                    candidates.push(Candidate {
                        scope: SrgNamedScope::declaration(SrgKind::Parameter, parameter),
                        binding_start: u32::from(self.node_range(parameter).start()),
                    });
                }
            }
            for generic in self
                .store
                .from_node(member)
                .out(&[SrgPredicate::MemberGeneric])
                .node_ids()
            {
                if self.node_name(generic).as_deref() == Some(name) {
                    candidates.push(Candidate {
                        scope: SrgNamedScope::declaration(SrgKind::Generic, generic),
                        binding_start: u32::from(self.node_range(generic).start()),
                    });
                }
            }
            implementable = self.containing_implementable(member);
        }

        if let Some(type_def) = self.containing_type(context) {
            for generic in self
                .store
                .from_node(type_def)
                .out(&[SrgPredicate::TypeGeneric])
                .node_ids()
            {
                if self.node_name(generic).as_deref() == Some(name) {
                    candidates.push(Candidate {
                        scope: SrgNamedScope::declaration(SrgKind::Generic, generic),
                        binding_start: u32::from(self.node_range(generic).start()),
                    });
                }
            }
        }

        candidates
            .into_iter()
            .max_by_key(|candidate| candidate.binding_start)
            .map(|candidate| candidate.scope)
    }

    /// The statement owning a named value, through its named-value edge.
    fn named_value_statement(&self, named: NodeId) -> Option<NodeId> {
        for predicate in [
            SrgPredicate::LoopNamedValue,
            SrgPredicate::WithNamedValue,
            SrgPredicate::MatchNamedValue,
        ] {
            if let Some(statement) = self
                .store
                .incoming(named, predicate)
                .into_iter()
                .next()
            {
                return Some(statement);
            }
        }
        None
    }

    fn resolve_import(&self, module: NodeId, name: &str) -> Option<ScopeOrImport> {
        for import in self
            .store
            .from_node(module)
            .out(&[SrgPredicate::Child])
            .is_kind(&[SrgKind::Import])
            .node_ids()
        {
            for binding in self
                .store
                .from_node(import)
                .out(&[SrgPredicate::ImportPackageRef])
                .node_ids()
            {
                if self.node_name(binding).as_deref() != Some(name) {
                    continue;
                }

                let subsource = self
                    .store
                    .get_str(binding, SrgPredicate::ImportBindingSubsource);
                let location = self.store.get_str(import, SrgPredicate::ImportLocation)?;

                match subsource {
                    // Named import: resolve the subsource in the package.
                    Some(subsource) => {
                        let package = self.package_map.get("", &location)?;
                        return self
                            .resolve_exported_name(package, &subsource)
                            .map(ScopeOrImport::Named);
                    }
                    // Whole-package alias.
                    None => {
                        return Some(ScopeOrImport::Package {
                            reference_id: location,
                            binding,
                        });
                    }
                }
            }
        }
        None
    }

    /// All names visible at the given reference node, innermost first. Used
    /// for scope-in-context queries (completion and diagnostics).
    pub fn names_in_context(&self, context: NodeId) -> Vec<(String, ScopeOrImport)> {
        let mut names: Vec<(String, ScopeOrImport)> = Vec::new();
        let mut push = |name: String, entry: ScopeOrImport, names: &mut Vec<(String, ScopeOrImport)>| {
            if !names.iter().any(|(existing, _)| *existing == name) {
                names.push((name, entry));
            }
        };

        // Locals, parameters, and generics: collect per declaration site.
        let mut implementable = self.containing_implementable(context);
        while let Some(member) = implementable {
            for parameter in self.store.from_node(member).out(&[
                SrgPredicate::MemberParameter,
                SrgPredicate::LambdaParameter,
            ]).node_ids()
            {
                if let Some(name) = self.node_name(parameter) {
                    push(
                        name,
                        ScopeOrImport::Named(SrgNamedScope::declaration(
                            SrgKind::Parameter,
                            parameter,
                        )),
                        &mut names,
                    );
                }
            }
            for generic in self
                .store
                .from_node(member)
                .out(&[SrgPredicate::MemberGeneric])
                .node_ids()
            {
                if let Some(name) = self.node_name(generic) {
                    push(
                        name,
                        ScopeOrImport::Named(SrgNamedScope::declaration(SrgKind::Generic, generic)),
                        &mut names,
                    );
                }
            }
            implementable = self.containing_implementable(member);
        }

        for kind in [
            SrgKind::VariableStatement,
            SrgKind::NamedValue,
            SrgKind::AssignedValue,
        ] {
            for node in self.store.nodes_of_kind(kind) {
                if let Some(name) = self.node_name(node) {
                    if let Some(ScopeOrImport::Named(found)) = self.resolve_name(&name, context) {
                        if found.node == node {
                            push(name, ScopeOrImport::Named(found), &mut names);
                        }
                    }
                }
            }
        }

        if let Some(type_def) = self.containing_type(context) {
            for generic in self
                .store
                .from_node(type_def)
                .out(&[SrgPredicate::TypeGeneric])
                .node_ids()
            {
                if let Some(name) = self.node_name(generic) {
                    push(
                        name,
                        ScopeOrImport::Named(SrgNamedScope::declaration(SrgKind::Generic, generic)),
                        &mut names,
                    );
                }
            }
        }

        if let Some(module) = self.containing_module(context) {
            for child in self
                .store
                .from_node(module)
                .out(&[SrgPredicate::Child])
                .node_ids()
            {
                let kind = self.kind(child);
                if kind.is_type_definition() || kind.is_member() {
                    if let Some(name) = self.node_name(child) {
                        push(
                            name,
                            ScopeOrImport::Named(SrgNamedScope::declaration(kind, child)),
                            &mut names,
                        );
                    }
                } else if kind == SrgKind::Import {
                    for binding in self
                        .store
                        .from_node(child)
                        .out(&[SrgPredicate::ImportPackageRef])
                        .node_ids()
                    {
                        if let Some(name) = self.node_name(binding) {
                            if let Some(entry) = self.resolve_import(module, &name) {
                                push(name, entry, &mut names);
                            }
                        }
                    }
                }
            }
        }

        names
    }
}
