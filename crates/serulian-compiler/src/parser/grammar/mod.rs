//! Grammar rules: module-level constructs, type definitions, members, and
//! type references. Statements and expressions live in sibling modules.

mod expressions;
mod statements;

use serulian_graph::store::NodeId;

use crate::sourceshape::{SrgKind, SrgPredicate};

use super::core::{GrammarVersion, ImportKind, SourceParser};
use super::lexer::TokenKind;

/// Whether a member rule parses a declaration (interface) or a definition
/// (class, struct, agent, nominal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum MemberOption {
    Declaration,
    Definition,
}

/// Whether `void` is permitted in a type-reference position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TypeRefOption {
    WithVoid,
    NoVoid,
}

impl SourceParser<'_, '_> {
    /// Consumes the top-level constructs of a Serulian source file.
    pub(super) fn consume_top_level(&mut self) -> NodeId {
        let root = self.start_node(SrgKind::File);

        // Once we've seen a non-import, no further imports are allowed.
        let mut seen_non_import = false;

        loop {
            while self.current().is_statement_terminator() {
                self.bump();
            }

            match self.current() {
                TokenKind::KwImport | TokenKind::KwFrom => {
                    if seen_non_import {
                        self.emit_error("imports must precede all definitions");
                    }
                    let import = self.consume_import();
                    self.builder.connect(root, SrgPredicate::Child, import);
                }

                TokenKind::KwClass
                | TokenKind::KwInterface
                | TokenKind::KwStruct
                | TokenKind::KwAgent
                | TokenKind::KwType => {
                    seen_non_import = true;
                    let type_def = self.consume_type_definition();
                    self.builder.connect(root, SrgPredicate::Child, type_def);
                    self.try_consume_statement_terminator();
                }

                TokenKind::KwFunction => {
                    seen_non_import = true;
                    let function = self.consume_function(MemberOption::Definition);
                    self.builder.connect(root, SrgPredicate::Child, function);
                    self.try_consume_statement_terminator();
                }

                TokenKind::KwVar => {
                    seen_non_import = true;
                    let variable = self.consume_var(SrgKind::Variable);
                    self.builder.connect(root, SrgPredicate::Child, variable);
                    self.try_consume_statement_terminator();
                }

                TokenKind::Eof => break,

                _ => {
                    let current = self.current();
                    self.emit_error(format!(
                        "unexpected token at root level: {:?}",
                        current
                    ));
                    let error = self.start_node(SrgKind::ErrorNode);
                    self.finish_node();
                    self.builder.connect(root, SrgPredicate::Child, error);
                    self.skip_to_statement_boundary();
                    if self.eof() {
                        break;
                    }
                }
            }
        }

        self.finish_node();
        root
    }

    /// Consumes an import statement.
    ///
    /// Supported forms (terminated by newline or EOF):
    ///   import something
    ///   import something as foobar
    ///   import "scm url" as barbaz
    ///   from something import foobar
    ///   from something import foobar as barbaz
    fn consume_import(&mut self) -> NodeId {
        let import = self.start_node(SrgKind::Import);

        if self.eat(TokenKind::KwFrom) {
            if let Some((path, kind)) = self.consume_import_path() {
                let reference = self.report_import(&path, kind, "");
                self.builder
                    .decorate(import, SrgPredicate::ImportSource, &path);
                self.builder
                    .decorate(import, SrgPredicate::ImportLocation, &reference);

                self.expect(TokenKind::KwImport, "'import'");
                loop {
                    let binding = self.start_node(SrgKind::ImportPackage);
                    if let Some(name) = self.consume_identifier() {
                        self.builder
                            .decorate(binding, SrgPredicate::ImportBindingSubsource, &name);
                        let local = if self.eat(TokenKind::KwAs) {
                            self.consume_identifier().unwrap_or(name)
                        } else {
                            name
                        };
                        self.builder
                            .decorate(binding, SrgPredicate::ImportBindingName, &local);
                    }
                    self.finish_node();
                    self.builder
                        .connect(import, SrgPredicate::ImportPackageRef, binding);

                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
            }

            self.consume_statement_terminator();
            self.finish_node();
            return import;
        }

        self.expect(TokenKind::KwImport, "'import' or 'from'");
        if let Some((path, kind)) = self.consume_import_path() {
            let reference = self.report_import(&path, kind, "");
            self.builder
                .decorate(import, SrgPredicate::ImportSource, &path);
            self.builder
                .decorate(import, SrgPredicate::ImportLocation, &reference);

            let binding = self.start_node(SrgKind::ImportPackage);
            if self.eat(TokenKind::KwAs) {
                if let Some(alias) = self.consume_identifier() {
                    self.builder
                        .decorate(binding, SrgPredicate::ImportBindingName, &alias);
                }
            } else if kind == ImportKind::Vcs {
                self.emit_error("import from SCM URL requires an 'as' clause");
            } else {
                // Literal imports receive the final path segment as their
                // package name.
                let name = path.rsplit('/').next().unwrap_or(&path).to_owned();
                self.builder
                    .decorate(binding, SrgPredicate::ImportBindingName, &name);
            }
            self.finish_node();
            self.builder
                .connect(import, SrgPredicate::ImportPackageRef, binding);
        }

        self.consume_statement_terminator();
        self.finish_node();
        import
    }

    /// An import path: an identifier (local), a string literal (VCS URL), or
    /// an `@`-prefixed alias of a configured library.
    fn consume_import_path(&mut self) -> Option<(String, ImportKind)> {
        match self.current() {
            TokenKind::Identifier => {
                let path = self.current_text().to_owned();
                self.bump();
                Some((path, ImportKind::Local))
            }
            TokenKind::StringLiteral => {
                let raw = self.current_text();
                let path = raw[1..raw.len() - 1].to_owned();
                self.bump();
                Some((path, ImportKind::Vcs))
            }
            TokenKind::At => {
                self.bump();
                let alias = self.consume_identifier()?;
                Some((alias, ImportKind::Alias))
            }
            _ => {
                self.emit_error("expected import source");
                None
            }
        }
    }

    /// Consumes a type definition: class, interface, struct, agent, nominal
    /// (`type X : Base`), or alias (`type X = Other`).
    fn consume_type_definition(&mut self) -> NodeId {
        match self.current() {
            TokenKind::KwClass => self.consume_composite_type(SrgKind::Class, TokenKind::KwClass),
            TokenKind::KwInterface => {
                self.consume_composite_type(SrgKind::Interface, TokenKind::KwInterface)
            }
            TokenKind::KwStruct => {
                self.consume_composite_type(SrgKind::Struct, TokenKind::KwStruct)
            }
            TokenKind::KwAgent => self.consume_agent(),
            TokenKind::KwType => self.consume_nominal_or_alias(),
            _ => {
                let current_text = self.current_text();
                self.create_error_node(format!(
                    "expected type definition, found: {}",
                    current_text
                ))
            }
        }
    }

    fn consume_composite_type(&mut self, kind: SrgKind, keyword: TokenKind) -> NodeId {
        let type_node = self.start_node(kind);
        self.expect(keyword, "type keyword");

        if let Some(name) = self.consume_identifier() {
            self.builder.decorate(type_node, SrgPredicate::TypeName, &name);
        }

        self.consume_generics(type_node, SrgPredicate::TypeGeneric);

        // Optional parent types: `: Parent + Other`.
        if self.eat(TokenKind::Colon) {
            loop {
                let parent = self.consume_type_reference(TypeRefOption::NoVoid);
                self.builder
                    .connect(type_node, SrgPredicate::TypeParentRef, parent);
                if !self.eat(TokenKind::Plus) {
                    break;
                }
            }
        }

        let option = if kind == SrgKind::Interface {
            MemberOption::Declaration
        } else {
            MemberOption::Definition
        };
        self.consume_type_body(type_node, option);
        self.finish_node();
        type_node
    }

    fn consume_agent(&mut self) -> NodeId {
        let agent = self.start_node(SrgKind::Agent);
        self.expect(TokenKind::KwAgent, "'agent'");

        if let Some(name) = self.consume_identifier() {
            self.builder.decorate(agent, SrgPredicate::TypeName, &name);
        }

        self.consume_generics(agent, SrgPredicate::TypeGeneric);

        self.expect(TokenKind::KwFor, "'for'");
        let principal = self.consume_type_reference(TypeRefOption::NoVoid);
        self.builder
            .connect(agent, SrgPredicate::TypeParentRef, principal);

        self.consume_type_body(agent, MemberOption::Definition);
        self.finish_node();
        agent
    }

    /// `type X : Base { ... }` declares a nominal type; `type X = Other`
    /// declares an alias.
    fn consume_nominal_or_alias(&mut self) -> NodeId {
        // The kind is only known after the name, so buffer it.
        let is_alias = {
            let mut lookahead = 2;
            while self.peek_nth(lookahead) == TokenKind::Less {
                // Skip a generics clause when deciding.
                lookahead += 1;
                let mut depth = 1;
                while depth > 0 && self.peek_nth(lookahead) != TokenKind::Eof {
                    match self.peek_nth(lookahead) {
                        TokenKind::Less => depth += 1,
                        TokenKind::Greater => depth -= 1,
                        _ => {}
                    }
                    lookahead += 1;
                }
            }
            self.peek_nth(lookahead) == TokenKind::Equals
        };

        if is_alias {
            let alias = self.start_node(SrgKind::Alias);
            self.expect(TokenKind::KwType, "'type'");
            if let Some(name) = self.consume_identifier() {
                self.builder.decorate(alias, SrgPredicate::TypeName, &name);
            }
            self.expect(TokenKind::Equals, "'='");
            let target = self.consume_type_reference(TypeRefOption::NoVoid);
            self.builder
                .connect(alias, SrgPredicate::TypeAliasRef, target);
            self.consume_statement_terminator();
            self.finish_node();
            return alias;
        }

        let nominal = self.start_node(SrgKind::Nominal);
        self.expect(TokenKind::KwType, "'type'");
        if let Some(name) = self.consume_identifier() {
            self.builder.decorate(nominal, SrgPredicate::TypeName, &name);
        }
        self.consume_generics(nominal, SrgPredicate::TypeGeneric);

        self.expect(TokenKind::Colon, "':' and a base type");
        let base = self.consume_type_reference(TypeRefOption::NoVoid);
        self.builder
            .connect(nominal, SrgPredicate::TypeParentRef, base);

        self.consume_type_body(nominal, MemberOption::Definition);
        self.finish_node();
        nominal
    }

    /// Consumes `<T, Q : Constraint>` onto the given node, if present.
    pub(super) fn consume_generics(&mut self, node: NodeId, predicate: SrgPredicate) {
        if !self.eat(TokenKind::Less) {
            return;
        }

        loop {
            let generic = self.start_node(SrgKind::Generic);
            if let Some(name) = self.consume_identifier() {
                self.builder
                    .decorate(generic, SrgPredicate::GenericName, &name);
            }
            if self.eat(TokenKind::Colon) {
                let constraint = self.consume_type_reference(TypeRefOption::NoVoid);
                self.builder
                    .connect(generic, SrgPredicate::GenericConstraintRef, constraint);
            }
            self.finish_node();
            self.builder.connect(node, predicate, generic);

            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::Greater, "'>' to close generics");
    }

    /// Consumes `{ members }` onto the type node.
    fn consume_type_body(&mut self, type_node: NodeId, option: MemberOption) {
        if !self.expect(TokenKind::BraceOpen, "'{' to open type body") {
            return;
        }

        loop {
            while self.current().is_statement_terminator() {
                self.bump();
            }

            let member = match self.current() {
                TokenKind::BraceClose | TokenKind::Eof => break,
                TokenKind::KwVar => self.consume_var(SrgKind::Field),
                TokenKind::KwFunction => self.consume_function(option),
                TokenKind::KwConstructor => self.consume_constructor(),
                TokenKind::KwProperty => self.consume_property(option),
                TokenKind::KwOperator => self.consume_operator(),
                _ => {
                    let current_text = self.current_text();
                    self.emit_error(format!(
                        "expected type member, found: {}",
                        current_text
                    ));
                    self.skip_to_statement_boundary();
                    continue;
                }
            };

            self.builder
                .connect(type_node, SrgPredicate::TypeMember, member);
            self.try_consume_statement_terminator();
        }

        self.expect(TokenKind::BraceClose, "'}' to close type body");
    }

    /// Consumes a variable declaration as the given kind (module variable,
    /// type field, or variable statement).
    ///
    /// V1: `var name type? (= expr)?`
    /// V0: `var<type> name (= expr)?`
    pub(super) fn consume_var(&mut self, kind: SrgKind) -> NodeId {
        let variable = self.start_node(kind);
        self.expect(TokenKind::KwVar, "'var'");

        match self.version {
            GrammarVersion::V0 => {
                if self.eat(TokenKind::Less) {
                    let declared = self.consume_type_reference(TypeRefOption::NoVoid);
                    self.builder
                        .connect(variable, SrgPredicate::VariableDeclaredTypeRef, declared);
                    self.expect(TokenKind::Greater, "'>' after declared type");
                }
                if let Some(name) = self.consume_identifier() {
                    self.builder
                        .decorate(variable, SrgPredicate::VariableName, &name);
                }
            }
            GrammarVersion::V1 => {
                if let Some(name) = self.consume_identifier() {
                    self.builder
                        .decorate(variable, SrgPredicate::VariableName, &name);
                }
                if self.at_type_reference_start() {
                    let declared = self.consume_type_reference(TypeRefOption::NoVoid);
                    self.builder
                        .connect(variable, SrgPredicate::VariableDeclaredTypeRef, declared);
                }
            }
        }

        if self.eat(TokenKind::Equals) {
            let initializer = self.consume_expression();
            self.builder
                .connect(variable, SrgPredicate::VariableExpression, initializer);
        }

        self.finish_node();
        variable
    }

    /// Consumes a function member.
    ///
    /// V1: `function name<T>(params) rettype? { body }`
    /// V0: `function<rettype> name<T>(params) { body }`
    pub(super) fn consume_function(&mut self, option: MemberOption) -> NodeId {
        let function = self.start_node(SrgKind::Function);
        self.expect(TokenKind::KwFunction, "'function'");

        let mut v0_return: Option<NodeId> = None;
        if self.version == GrammarVersion::V0 && self.eat(TokenKind::Less) {
            v0_return = Some(self.consume_type_reference(TypeRefOption::WithVoid));
            self.expect(TokenKind::Greater, "'>' after return type");
        }

        if let Some(name) = self.consume_identifier() {
            self.builder
                .decorate(function, SrgPredicate::MemberName, &name);
        }

        self.consume_generics(function, SrgPredicate::MemberGeneric);
        self.consume_parameters(function);

        let return_ref = match (self.version, v0_return) {
            (GrammarVersion::V0, Some(reference)) => reference,
            _ => {
                if self.at_type_reference_start() || self.currently_is(TokenKind::Identifier) {
                    self.consume_type_reference(TypeRefOption::WithVoid)
                } else {
                    let void = self.start_node(SrgKind::TypeRefVoid);
                    self.finish_node();
                    void
                }
            }
        };
        self.builder
            .connect(function, SrgPredicate::MemberReturnTypeRef, return_ref);

        if option == MemberOption::Definition {
            let body = self.consume_statement_block();
            self.builder.connect(function, SrgPredicate::MemberBody, body);
        } else {
            self.consume_statement_terminator();
        }

        self.finish_node();
        function
    }

    /// `constructor Name(params) { body }`
    fn consume_constructor(&mut self) -> NodeId {
        let constructor = self.start_node(SrgKind::Constructor);
        self.expect(TokenKind::KwConstructor, "'constructor'");

        if let Some(name) = self.consume_identifier() {
            self.builder
                .decorate(constructor, SrgPredicate::MemberName, &name);
        }

        self.consume_parameters(constructor);
        let body = self.consume_statement_block();
        self.builder
            .connect(constructor, SrgPredicate::MemberBody, body);

        self.finish_node();
        constructor
    }

    /// V1: `property name type { get { } set { } }`
    /// V0: `property<type> name { ... }`
    fn consume_property(&mut self, option: MemberOption) -> NodeId {
        let property = self.start_node(SrgKind::Property);
        self.expect(TokenKind::KwProperty, "'property'");

        let mut v0_type: Option<NodeId> = None;
        if self.version == GrammarVersion::V0 && self.eat(TokenKind::Less) {
            v0_type = Some(self.consume_type_reference(TypeRefOption::NoVoid));
            self.expect(TokenKind::Greater, "'>' after property type");
        }

        if let Some(name) = self.consume_identifier() {
            self.builder
                .decorate(property, SrgPredicate::MemberName, &name);
        }

        let declared = match (self.version, v0_type) {
            (GrammarVersion::V0, Some(reference)) => reference,
            _ => self.consume_type_reference(TypeRefOption::NoVoid),
        };
        self.builder
            .connect(property, SrgPredicate::MemberDeclaredTypeRef, declared);

        if option == MemberOption::Declaration {
            self.consume_statement_terminator();
            self.finish_node();
            return property;
        }

        self.expect(TokenKind::BraceOpen, "'{' to open property body");
        let mut has_setter = false;
        loop {
            while self.current().is_statement_terminator() {
                self.bump();
            }
            match self.current() {
                TokenKind::KwGet => {
                    self.bump();
                    let getter = self.consume_statement_block();
                    self.builder
                        .connect(property, SrgPredicate::PropertyGetter, getter);
                }
                TokenKind::KwSet => {
                    self.bump();
                    has_setter = true;
                    let setter = self.consume_statement_block();
                    self.builder
                        .connect(property, SrgPredicate::PropertySetter, setter);
                }
                _ => break,
            }
        }
        if !has_setter {
            self.builder
                .decorate(property, SrgPredicate::MemberReadOnly, "true");
        }
        self.expect(TokenKind::BraceClose, "'}' to close property body");

        self.finish_node();
        property
    }

    /// `operator Plus(left Type, right Type) rettype? { body }`
    fn consume_operator(&mut self) -> NodeId {
        let operator = self.start_node(SrgKind::Operator);
        self.expect(TokenKind::KwOperator, "'operator'");

        if let Some(name) = self.consume_identifier() {
            // Operator names are case-insensitive in source; stored lowered.
            self.builder
                .decorate(operator, SrgPredicate::OperatorName, &name.to_lowercase());
        }

        self.consume_parameters(operator);

        if self.at_type_reference_start() || self.currently_is(TokenKind::Identifier) {
            let return_ref = self.consume_type_reference(TypeRefOption::NoVoid);
            self.builder
                .connect(operator, SrgPredicate::MemberReturnTypeRef, return_ref);
        }

        let body = self.consume_statement_block();
        self.builder.connect(operator, SrgPredicate::MemberBody, body);

        self.finish_node();
        operator
    }

    /// Consumes `(name type, ...)` onto the member node.
    pub(super) fn consume_parameters(&mut self, member: NodeId) {
        if !self.expect(TokenKind::ParenOpen, "'(' to open parameters") {
            return;
        }

        if !self.currently_is(TokenKind::ParenClose) {
            loop {
                let parameter = self.start_node(SrgKind::Parameter);
                if let Some(name) = self.consume_identifier() {
                    self.builder
                        .decorate(parameter, SrgPredicate::ParameterName, &name);
                }
                if self.at_type_reference_start() || self.currently_is(TokenKind::Identifier) {
                    let type_ref = self.consume_type_reference(TypeRefOption::NoVoid);
                    self.builder
                        .connect(parameter, SrgPredicate::ParameterTypeRef, type_ref);
                }
                self.finish_node();
                self.builder
                    .connect(member, SrgPredicate::MemberParameter, parameter);

                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(TokenKind::ParenClose, "')' to close parameters");
    }

    /// Whether the current token can begin a type reference.
    pub(super) fn at_type_reference_start(&mut self) -> bool {
        matches!(
            self.current(),
            TokenKind::Identifier | TokenKind::KwFunction
        )
    }

    /// Consumes a type reference: a dotted path with optional generic
    /// arguments, `void`, `any`, or `function<T>`, followed by a postfix
    /// modifier chain of `?` (nullable) and `*` (stream).
    pub(super) fn consume_type_reference(&mut self, option: TypeRefOption) -> NodeId {
        let mut current = self.consume_type_reference_base(option);

        loop {
            if self.currently_is(TokenKind::Question) {
                self.bump();
                let nullable = self.start_node(SrgKind::TypeRefNullable);
                self.finish_node();
                self.builder
                    .connect(nullable, SrgPredicate::TypeRefInner, current);
                current = nullable;
            } else if self.currently_is(TokenKind::Star) {
                self.bump();
                let stream = self.start_node(SrgKind::TypeRefStream);
                self.finish_node();
                self.builder
                    .connect(stream, SrgPredicate::TypeRefInner, current);
                current = stream;
            } else {
                break;
            }
        }

        current
    }

    fn consume_type_reference_base(&mut self, option: TypeRefOption) -> NodeId {
        if self.currently_is(TokenKind::KwFunction) {
            let function_ref = self.start_node(SrgKind::TypeRefPath);
            self.builder
                .decorate(function_ref, SrgPredicate::TypeRefPathName, "function");
            self.bump();
            self.expect(TokenKind::Less, "'<' after 'function'");
            let result = self.consume_type_reference(TypeRefOption::WithVoid);
            self.builder
                .connect(function_ref, SrgPredicate::TypeRefGenericArg, result);
            self.expect(TokenKind::Greater, "'>' to close function type");
            self.finish_node();
            return function_ref;
        }

        if !self.currently_is(TokenKind::Identifier) {
            return self.create_error_node("expected type reference");
        }

        let text = self.current_text();
        if text == "void" {
            if option == TypeRefOption::NoVoid {
                self.emit_error("void is not allowed here");
            }
            self.bump();
            let void_ref = self.start_node(SrgKind::TypeRefVoid);
            self.finish_node();
            return void_ref;
        }
        if text == "any" {
            self.bump();
            let any_ref = self.start_node(SrgKind::TypeRefAny);
            self.finish_node();
            return any_ref;
        }

        let path_ref = self.start_node(SrgKind::TypeRefPath);
        let mut path = self.current_text().to_owned();
        self.bump();
        while self.currently_is(TokenKind::Dot) {
            self.bump();
            match self.consume_identifier() {
                Some(segment) => {
                    path.push('.');
                    path.push_str(&segment);
                }
                None => break,
            }
        }
        self.builder
            .decorate(path_ref, SrgPredicate::TypeRefPathName, &path);

        if self.currently_is(TokenKind::Less) {
            self.bump();
            loop {
                let argument = self.consume_type_reference(TypeRefOption::NoVoid);
                self.builder
                    .connect(path_ref, SrgPredicate::TypeRefGenericArg, argument);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Greater, "'>' to close type arguments");
        }

        self.finish_node();
        path_ref
    }
}
