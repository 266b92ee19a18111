//! Expression grammar rules.
//!
//! The binary grammar is a fixed precedence chain; each level is a table of
//! `(operator token, node kind)` pairs and left-recursion is flattened into a
//! loop that consumes zero-or-more right-hand operands.

use serulian_graph::store::NodeId;

use crate::sourceshape::{SrgKind, SrgPredicate};

use super::super::core::SourceParser;
use super::super::lexer::TokenKind;
use super::TypeRefOption;

/// Binary precedence levels, loosest first.
const BINARY_LEVELS: &[&[(TokenKind, SrgKind)]] = &[
    &[(TokenKind::QuestionQuestion, SrgKind::NullComparisonExpression)],
    &[(TokenKind::DotDot, SrgKind::DefineRangeExpression)],
    &[(TokenKind::PipePipe, SrgKind::BooleanOrExpression)],
    &[(TokenKind::AndAnd, SrgKind::BooleanAndExpression)],
    &[(TokenKind::Pipe, SrgKind::BitwiseOrExpression)],
    &[(TokenKind::Caret, SrgKind::BitwiseXorExpression)],
    &[(TokenKind::Ampersand, SrgKind::BitwiseAndExpression)],
    &[
        (TokenKind::EqualsEquals, SrgKind::ComparisonEqualsExpression),
        (TokenKind::NotEquals, SrgKind::ComparisonNotEqualsExpression),
    ],
    &[
        (TokenKind::LessEquals, SrgKind::ComparisonLTEExpression),
        (TokenKind::GreaterEquals, SrgKind::ComparisonGTEExpression),
        (TokenKind::Less, SrgKind::ComparisonLTExpression),
        (TokenKind::Greater, SrgKind::ComparisonGTExpression),
    ],
    &[
        (TokenKind::KwIs, SrgKind::IsComparisonExpression),
        (TokenKind::KwIn, SrgKind::InCollectionExpression),
    ],
    &[
        (TokenKind::ShiftLeft, SrgKind::BitwiseShiftLeftExpression),
        (TokenKind::ShiftRight, SrgKind::BitwiseShiftRightExpression),
    ],
    &[
        (TokenKind::Plus, SrgKind::BinaryAddExpression),
        (TokenKind::Minus, SrgKind::BinarySubtractExpression),
    ],
    &[
        (TokenKind::Star, SrgKind::BinaryMultiplyExpression),
        (TokenKind::Slash, SrgKind::BinaryDivideExpression),
        (TokenKind::Percent, SrgKind::BinaryModuloExpression),
    ],
];

impl SourceParser<'_, '_> {
    /// Consumes an expression.
    pub(super) fn consume_expression(&mut self) -> NodeId {
        self.consume_binary(0)
    }

    /// Consumes an expression in a condition position, where `{` opens the
    /// statement block rather than a structural-new or map literal.
    pub(super) fn consume_condition_expression(&mut self) -> NodeId {
        let saved = self.allow_structural_new;
        self.allow_structural_new = false;
        let expression = self.consume_expression();
        self.allow_structural_new = saved;
        expression
    }

    fn consume_binary(&mut self, level: usize) -> NodeId {
        let Some(operators) = BINARY_LEVELS.get(level) else {
            return self.consume_unary();
        };

        let mut left = self.consume_binary(level + 1);

        loop {
            let current = self.current();
            let Some((_, kind)) = operators.iter().find(|(token, _)| *token == current) else {
                return left;
            };

            let node = self.start_node(*kind);
            self.bump();
            self.builder.connect(node, SrgPredicate::BinaryLeftExpr, left);

            // `x is not null` wraps the right side in a keyword-not.
            let right = if *kind == SrgKind::IsComparisonExpression
                && self.currently_is(TokenKind::KwNot)
            {
                let not_node = self.start_node(SrgKind::KeywordNotExpression);
                self.bump();
                let child = self.consume_binary(level + 1);
                self.builder
                    .connect(not_node, SrgPredicate::UnaryChildExpr, child);
                self.finish_node();
                not_node
            } else {
                self.consume_binary(level + 1)
            };

            self.builder.connect(node, SrgPredicate::BinaryRightExpr, right);
            self.finish_node();
            left = node;
        }
    }

    fn consume_unary(&mut self) -> NodeId {
        let kind = match self.current() {
            TokenKind::Bang => Some(SrgKind::BooleanNotExpression),
            TokenKind::Tilde => Some(SrgKind::BitwiseNotExpression),
            TokenKind::KwNot => Some(SrgKind::KeywordNotExpression),
            TokenKind::Ampersand => Some(SrgKind::RootTypeExpression),
            TokenKind::LeftArrow => Some(SrgKind::AwaitExpression),
            _ => None,
        };

        match kind {
            Some(kind) => {
                let node = self.start_node(kind);
                self.bump();
                let child = self.consume_unary();
                self.builder.connect(node, SrgPredicate::UnaryChildExpr, child);
                self.finish_node();
                node
            }
            None => self.consume_access(),
        }
    }

    /// The call/access chain: member access, calls, indexing/slicing, casts,
    /// generic specifiers, postfix not-null assertion, and structural new.
    fn consume_access(&mut self) -> NodeId {
        let (mut current, mut current_kind) = self.consume_primary();

        loop {
            match self.current() {
                TokenKind::Dot if self.peek_nth(1) == TokenKind::ParenOpen => {
                    // Cast: `expr.(Type)`
                    let cast = self.start_node(SrgKind::CastExpression);
                    self.bump();
                    self.bump();
                    self.builder
                        .connect(cast, SrgPredicate::AccessChildExpr, current);
                    let type_ref = self.consume_type_reference(TypeRefOption::NoVoid);
                    self.builder.connect(cast, SrgPredicate::CastTypeRef, type_ref);
                    self.expect(TokenKind::ParenClose, "')' to close cast");
                    self.finish_node();
                    current = cast;
                    current_kind = SrgKind::CastExpression;
                }

                TokenKind::Dot => {
                    (current, current_kind) =
                        self.consume_named_access(SrgKind::MemberAccessExpression, current);
                }

                TokenKind::QuestionDot => {
                    (current, current_kind) =
                        self.consume_named_access(SrgKind::NullableMemberAccessExpression, current);
                }

                TokenKind::Arrow => {
                    (current, current_kind) =
                        self.consume_named_access(SrgKind::DynamicMemberAccessExpression, current);
                }

                TokenKind::StarDot => {
                    (current, current_kind) =
                        self.consume_named_access(SrgKind::StreamMemberAccessExpression, current);
                }

                TokenKind::ParenOpen => {
                    let call = self.start_node(SrgKind::FunctionCallExpression);
                    self.bump();
                    self.builder
                        .connect(call, SrgPredicate::AccessChildExpr, current);

                    if !self.currently_is(TokenKind::ParenClose) {
                        let saved = self.allow_structural_new;
                        self.allow_structural_new = true;
                        loop {
                            let argument = self.consume_expression();
                            self.builder
                                .connect(call, SrgPredicate::CallArgument, argument);
                            if !self.eat(TokenKind::Comma) {
                                break;
                            }
                        }
                        self.allow_structural_new = saved;
                    }

                    self.expect(TokenKind::ParenClose, "')' to close call");
                    self.finish_node();
                    current = call;
                    current_kind = SrgKind::FunctionCallExpression;
                }

                TokenKind::BracketOpen => {
                    (current, current_kind) = self.consume_slice_or_index(current);
                }

                TokenKind::Less
                    if self.is_access_like(current_kind) && self.scan_generic_specifier() =>
                {
                    let specifier = self.start_node(SrgKind::GenericSpecifierExpression);
                    self.bump();
                    self.builder
                        .connect(specifier, SrgPredicate::AccessChildExpr, current);
                    loop {
                        let type_ref = self.consume_type_reference(TypeRefOption::NoVoid);
                        self.builder
                            .connect(specifier, SrgPredicate::GenericSpecifierTypeRef, type_ref);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::Greater, "'>' to close generic specifier");
                    self.finish_node();
                    current = specifier;
                    current_kind = SrgKind::GenericSpecifierExpression;
                }

                // Postfix not-null assertion `expr!`.
                TokenKind::Bang => {
                    let assert = self.start_node(SrgKind::AssertNotNullExpression);
                    self.bump();
                    self.builder
                        .connect(assert, SrgPredicate::UnaryChildExpr, current);
                    self.finish_node();
                    current = assert;
                    current_kind = SrgKind::AssertNotNullExpression;
                }

                TokenKind::BraceOpen
                    if self.allow_structural_new && self.is_access_like(current_kind) =>
                {
                    (current, current_kind) = self.consume_structural_new(current);
                }

                _ => return current,
            }
        }
    }

    /// Whether an expression kind can be followed by a generic specifier or a
    /// structural-new body.
    fn is_access_like(&self, kind: SrgKind) -> bool {
        matches!(
            kind,
            SrgKind::IdentifierExpression
                | SrgKind::MemberAccessExpression
                | SrgKind::GenericSpecifierExpression
        )
    }

    fn consume_named_access(&mut self, kind: SrgKind, child: NodeId) -> (NodeId, SrgKind) {
        let access = self.start_node(kind);
        self.bump();
        self.builder
            .connect(access, SrgPredicate::AccessChildExpr, child);
        if let Some(name) = self.consume_identifier() {
            self.builder
                .decorate(access, SrgPredicate::AccessMemberName, &name);
        }
        self.finish_node();
        (access, kind)
    }

    /// `expr[index]` | `expr[left:right]` with either bound optional.
    fn consume_slice_or_index(&mut self, child: NodeId) -> (NodeId, SrgKind) {
        let slice = self.start_node(SrgKind::SliceExpression);
        self.bump();
        self.builder
            .connect(slice, SrgPredicate::SliceChildExpr, child);

        let saved = self.allow_structural_new;
        self.allow_structural_new = true;

        if self.eat(TokenKind::Colon) {
            // `[:right]`
            if !self.currently_is(TokenKind::BracketClose) {
                let right = self.consume_expression();
                self.builder.connect(slice, SrgPredicate::SliceRightExpr, right);
            }
        } else {
            let first = self.consume_expression();
            if self.eat(TokenKind::Colon) {
                self.builder.connect(slice, SrgPredicate::SliceLeftExpr, first);
                if !self.currently_is(TokenKind::BracketClose) {
                    let right = self.consume_expression();
                    self.builder.connect(slice, SrgPredicate::SliceRightExpr, right);
                }
            } else {
                self.builder.connect(slice, SrgPredicate::SliceIndexExpr, first);
            }
        }

        self.allow_structural_new = saved;
        self.expect(TokenKind::BracketClose, "']' to close index");
        self.finish_node();
        (slice, SrgKind::SliceExpression)
    }

    /// `TypeExpr{ key: value, ... }`
    fn consume_structural_new(&mut self, type_expr: NodeId) -> (NodeId, SrgKind) {
        let new_node = self.start_node(SrgKind::StructuralNewExpression);
        self.bump();
        self.builder
            .connect(new_node, SrgPredicate::StructuralNewTypeExpr, type_expr);

        loop {
            while self.current().is_statement_terminator() {
                self.bump();
            }
            if self.currently_is(TokenKind::BraceClose) || self.eof() {
                break;
            }

            let entry = self.start_node(SrgKind::StructuralNewEntry);
            if let Some(key) = self.consume_identifier() {
                self.builder
                    .decorate(entry, SrgPredicate::StructuralNewEntryKey, &key);
            }
            self.expect(TokenKind::Colon, "':' after entry name");
            let value = self.consume_expression();
            self.builder
                .connect(entry, SrgPredicate::StructuralNewEntryValue, value);
            self.finish_node();
            self.builder
                .connect(new_node, SrgPredicate::StructuralNewEntryRef, entry);

            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::BraceClose, "'}' to close structural new");
        self.finish_node();
        (new_node, SrgKind::StructuralNewExpression)
    }

    /// Scans ahead from a `<` to decide whether it opens a generic specifier:
    /// only type-shaped tokens up to a balancing `>`.
    fn scan_generic_specifier(&mut self) -> bool {
        debug_assert_eq!(self.current(), TokenKind::Less);

        let mut depth = 0usize;
        for lookahead in 0..64 {
            match self.peek_nth(lookahead) {
                TokenKind::Less => depth += 1,
                TokenKind::Greater => {
                    depth -= 1;
                    if depth == 0 {
                        return lookahead > 1;
                    }
                }
                TokenKind::Identifier
                | TokenKind::Dot
                | TokenKind::Comma
                | TokenKind::Question
                | TokenKind::Star
                | TokenKind::KwFunction => {}
                _ => return false,
            }
        }

        false
    }

    /// Scans ahead from a `(` to decide whether it opens a lambda:
    /// a balanced parameter list followed by `=>`.
    fn scan_lambda(&mut self) -> bool {
        debug_assert_eq!(self.current(), TokenKind::ParenOpen);

        let mut depth = 0usize;
        for lookahead in 0..64 {
            match self.peek_nth(lookahead) {
                TokenKind::ParenOpen => depth += 1,
                TokenKind::ParenClose => {
                    depth -= 1;
                    if depth == 0 {
                        return self.peek_nth(lookahead + 1) == TokenKind::FatArrow;
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
        }

        false
    }

    fn consume_primary(&mut self) -> (NodeId, SrgKind) {
        match self.current() {
            TokenKind::Identifier | TokenKind::Underscore => {
                let node = self.start_node(SrgKind::IdentifierExpression);
                let name = self.current_text().to_owned();
                self.bump();
                self.builder.decorate(node, SrgPredicate::LiteralValue, &name);
                self.finish_node();
                (node, SrgKind::IdentifierExpression)
            }

            TokenKind::NumericLiteral => self.consume_leaf_literal(SrgKind::NumericLiteralExpression),
            TokenKind::StringLiteral => self.consume_leaf_literal(SrgKind::StringLiteralExpression),
            TokenKind::TemplateStringLiteral => {
                self.consume_leaf_literal(SrgKind::TemplateStringExpression)
            }
            TokenKind::KwTrue | TokenKind::KwFalse => {
                self.consume_leaf_literal(SrgKind::BooleanLiteralExpression)
            }
            TokenKind::KwNull => self.consume_leaf_literal(SrgKind::NullLiteralExpression),
            TokenKind::KwThis => self.consume_leaf_literal(SrgKind::ThisLiteralExpression),
            TokenKind::KwVal => self.consume_leaf_literal(SrgKind::ValLiteralExpression),

            TokenKind::ParenOpen if self.scan_lambda() => self.consume_lambda(),

            TokenKind::ParenOpen => {
                self.bump();
                let saved = self.allow_structural_new;
                self.allow_structural_new = true;
                let inner = self.consume_expression();
                self.allow_structural_new = saved;
                self.expect(TokenKind::ParenClose, "')' to close expression");
                // The inner node stands in for the parenthesized form. Kind
                // is reported opaque so `(X){...}` is not a structural new.
                (inner, SrgKind::ErrorNode)
            }

            TokenKind::BracketOpen => self.consume_list_literal(),
            TokenKind::BraceOpen => self.consume_map_literal(),
            TokenKind::Less => self.consume_sml_expression(),

            _ => {
                let current = self.current();
                let node = self.create_error_node(format!(
                    "expected expression, found: {:?}",
                    current
                ));
                if !self.eof() && !self.current().is_statement_terminator() {
                    self.bump();
                }
                (node, SrgKind::ErrorNode)
            }
        }
    }

    fn consume_leaf_literal(&mut self, kind: SrgKind) -> (NodeId, SrgKind) {
        let node = self.start_node(kind);
        let text = self.current_text().to_owned();
        self.bump();
        self.builder.decorate(node, SrgPredicate::LiteralValue, &text);
        self.finish_node();
        (node, kind)
    }

    /// `(a, b T) => expr` | `(a, b) => { statements }`
    fn consume_lambda(&mut self) -> (NodeId, SrgKind) {
        let lambda = self.start_node(SrgKind::LambdaExpression);
        self.expect(TokenKind::ParenOpen, "'('");

        if !self.currently_is(TokenKind::ParenClose) {
            loop {
                let parameter = self.start_node(SrgKind::Parameter);
                if let Some(name) = self.consume_identifier() {
                    self.builder
                        .decorate(parameter, SrgPredicate::ParameterName, &name);
                }
                if self.at_type_reference_start() {
                    let type_ref = self.consume_type_reference(TypeRefOption::NoVoid);
                    self.builder
                        .connect(parameter, SrgPredicate::ParameterTypeRef, type_ref);
                }
                self.finish_node();
                self.builder
                    .connect(lambda, SrgPredicate::LambdaParameter, parameter);

                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(TokenKind::ParenClose, "')' to close lambda parameters");
        self.expect(TokenKind::FatArrow, "'=>'");

        if self.currently_is(TokenKind::BraceOpen) {
            let block = self.consume_statement_block();
            self.builder.connect(lambda, SrgPredicate::LambdaBlock, block);
        } else {
            let expression = self.consume_expression();
            self.builder.connect(lambda, SrgPredicate::LambdaExpr, expression);
        }

        self.finish_node();
        (lambda, SrgKind::LambdaExpression)
    }

    /// `[a, b, c]`
    fn consume_list_literal(&mut self) -> (NodeId, SrgKind) {
        let list = self.start_node(SrgKind::ListLiteralExpression);
        self.expect(TokenKind::BracketOpen, "'['");

        if !self.currently_is(TokenKind::BracketClose) {
            let saved = self.allow_structural_new;
            self.allow_structural_new = true;
            loop {
                let element = self.consume_expression();
                self.builder.connect(list, SrgPredicate::ListElement, element);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.allow_structural_new = saved;
        }

        self.expect(TokenKind::BracketClose, "']' to close list");
        self.finish_node();
        (list, SrgKind::ListLiteralExpression)
    }

    /// `{ keyExpr: valueExpr, ... }`
    fn consume_map_literal(&mut self) -> (NodeId, SrgKind) {
        let map = self.start_node(SrgKind::MapLiteralExpression);
        self.expect(TokenKind::BraceOpen, "'{'");

        loop {
            while self.current().is_statement_terminator() {
                self.bump();
            }
            if self.currently_is(TokenKind::BraceClose) || self.eof() {
                break;
            }

            let entry = self.start_node(SrgKind::MapLiteralEntry);
            let key = self.consume_expression();
            self.builder.connect(entry, SrgPredicate::MapEntryKey, key);
            self.expect(TokenKind::Colon, "':' after map key");
            let value = self.consume_expression();
            self.builder.connect(entry, SrgPredicate::MapEntryValue, value);
            self.finish_node();
            self.builder.connect(map, SrgPredicate::MapEntryRef, entry);

            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::BraceClose, "'}' to close map literal");
        self.finish_node();
        (map, SrgKind::MapLiteralExpression)
    }

    /// `<tagpath attr=value ...> children </tagpath>` | `<tagpath ... />`
    ///
    /// Children are nested tags, `{ expr }` interpolations, or string
    /// literals (which become text nodes).
    fn consume_sml_expression(&mut self) -> (NodeId, SrgKind) {
        let sml = self.start_node(SrgKind::SmlExpression);
        self.expect(TokenKind::Less, "'<'");

        let tag = self.consume_sml_tag_path();
        self.builder.connect(sml, SrgPredicate::SmlTagExpr, tag);

        // Attributes.
        while self.currently_is(TokenKind::Identifier) {
            let attribute = self.start_node(SrgKind::SmlAttribute);
            if let Some(name) = self.consume_identifier() {
                self.builder
                    .decorate(attribute, SrgPredicate::SmlAttributeName, &name);
            }
            self.expect(TokenKind::Equals, "'=' after attribute name");
            let value = if self.eat(TokenKind::BraceOpen) {
                let value = self.consume_expression();
                self.expect(TokenKind::BraceClose, "'}' to close attribute value");
                value
            } else {
                let (value, _) = self.consume_leaf_literal(SrgKind::StringLiteralExpression);
                value
            };
            self.builder
                .connect(attribute, SrgPredicate::SmlAttributeValue, value);
            self.finish_node();
            self.builder
                .connect(sml, SrgPredicate::SmlAttributeRef, attribute);
        }

        // Self-closing: `/>`.
        if self.eat(TokenKind::Slash) {
            self.expect(TokenKind::Greater, "'>' to close tag");
            self.finish_node();
            return (sml, SrgKind::SmlExpression);
        }

        self.expect(TokenKind::Greater, "'>' to close opening tag");

        // Children, until `</`.
        loop {
            while self.current().is_statement_terminator() {
                self.bump();
            }
            match self.current() {
                TokenKind::Less if self.peek_nth(1) == TokenKind::Slash => break,
                TokenKind::Less => {
                    let (child, _) = self.consume_sml_expression();
                    self.builder.connect(sml, SrgPredicate::SmlChild, child);
                }
                TokenKind::BraceOpen => {
                    self.bump();
                    let child = self.consume_expression();
                    self.expect(TokenKind::BraceClose, "'}' to close interpolation");
                    self.builder.connect(sml, SrgPredicate::SmlChild, child);
                }
                TokenKind::StringLiteral => {
                    let text = self.start_node(SrgKind::SmlText);
                    let raw = self.current_text().to_owned();
                    self.bump();
                    self.builder
                        .decorate(text, SrgPredicate::LiteralValue, &raw);
                    self.finish_node();
                    self.builder.connect(sml, SrgPredicate::SmlChild, text);
                }
                TokenKind::Eof => break,
                _ => {
                    self.emit_error("expected SML child");
                    self.bump();
                }
            }
        }

        self.expect(TokenKind::Less, "'</' to close tag");
        self.expect(TokenKind::Slash, "'</' to close tag");
        self.consume_sml_tag_path_silent();
        self.expect(TokenKind::Greater, "'>' to close tag");

        self.finish_node();
        (sml, SrgKind::SmlExpression)
    }

    /// The tag path of an SML expression, as an identifier or member access
    /// chain.
    fn consume_sml_tag_path(&mut self) -> NodeId {
        let identifier = self.start_node(SrgKind::IdentifierExpression);
        let name = self.consume_identifier().unwrap_or_default();
        self.builder
            .decorate(identifier, SrgPredicate::LiteralValue, &name);
        self.finish_node();

        let mut current = identifier;
        while self.currently_is(TokenKind::Dot) {
            let access = self.start_node(SrgKind::MemberAccessExpression);
            self.bump();
            self.builder
                .connect(access, SrgPredicate::AccessChildExpr, current);
            if let Some(member) = self.consume_identifier() {
                self.builder
                    .decorate(access, SrgPredicate::AccessMemberName, &member);
            }
            self.finish_node();
            current = access;
        }

        current
    }

    fn consume_sml_tag_path_silent(&mut self) {
        if self.currently_is(TokenKind::Identifier) {
            self.bump();
            while self.currently_is(TokenKind::Dot) {
                self.bump();
                if self.currently_is(TokenKind::Identifier) {
                    self.bump();
                }
            }
        }
    }
}
