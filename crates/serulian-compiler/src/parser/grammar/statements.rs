//! Statement grammar rules.

use serulian_graph::store::NodeId;

use crate::sourceshape::{SrgKind, SrgPredicate};

use super::super::core::SourceParser;
use super::super::lexer::TokenKind;

impl SourceParser<'_, '_> {
    /// Consumes `{ statements }` into a `StatementBlock` node.
    pub(super) fn consume_statement_block(&mut self) -> NodeId {
        let block = self.start_node(SrgKind::StatementBlock);
        self.expect(TokenKind::BraceOpen, "'{' to open block");

        loop {
            while self.current().is_statement_terminator() {
                self.bump();
            }
            match self.current() {
                TokenKind::BraceClose | TokenKind::Eof => break,
                _ => {
                    let statement = self.consume_statement();
                    self.builder
                        .connect(block, SrgPredicate::StatementChild, statement);
                }
            }
        }

        self.expect(TokenKind::BraceClose, "'}' to close block");
        self.finish_node();
        block
    }

    /// Consumes a single statement, including its terminator.
    pub(super) fn consume_statement(&mut self) -> NodeId {
        // Labeled loop/switch/match: `label: for ...`.
        let label = if self.currently_is(TokenKind::Identifier)
            && self.peek_nth(1) == TokenKind::Colon
            && matches!(
                self.peek_nth(2),
                TokenKind::KwFor | TokenKind::KwSwitch | TokenKind::KwMatch
            ) {
            let label = self.current_text().to_owned();
            self.bump();
            self.bump();
            Some(label)
        } else {
            None
        };

        let statement = match self.current() {
            TokenKind::KwVar => {
                let variable = self.consume_var(SrgKind::VariableStatement);
                self.consume_statement_terminator();
                variable
            }
            TokenKind::KwIf => self.consume_conditional(),
            TokenKind::KwFor => self.consume_loop(),
            TokenKind::KwWith => self.consume_with(),
            TokenKind::KwMatch => self.consume_match(),
            TokenKind::KwSwitch => self.consume_switch(),
            TokenKind::KwReturn => self.consume_return(),
            TokenKind::KwReject => self.consume_reject(),
            TokenKind::KwYield => self.consume_yield(),
            TokenKind::KwBreak => self.consume_jump(SrgKind::BreakStatement, SrgPredicate::BreakLabel),
            TokenKind::KwContinue => {
                self.consume_jump(SrgKind::ContinueStatement, SrgPredicate::ContinueLabel)
            }
            TokenKind::BraceOpen => self.consume_statement_block(),
            _ => self.consume_expression_statement(),
        };

        if let Some(label) = label {
            self.builder
                .decorate(statement, SrgPredicate::StatementLabel, &label);
        }

        statement
    }

    /// `if expr { } else if ... else { }`
    fn consume_conditional(&mut self) -> NodeId {
        let conditional = self.start_node(SrgKind::ConditionalStatement);
        self.expect(TokenKind::KwIf, "'if'");

        let condition = self.consume_condition_expression();
        self.builder
            .connect(conditional, SrgPredicate::ConditionalExpr, condition);

        let then_block = self.consume_statement_block();
        self.builder
            .connect(conditional, SrgPredicate::ConditionalThen, then_block);

        if self.eat(TokenKind::KwElse) {
            let else_node = if self.currently_is(TokenKind::KwIf) {
                self.consume_conditional()
            } else {
                self.consume_statement_block()
            };
            self.builder
                .connect(conditional, SrgPredicate::ConditionalElse, else_node);
        }

        self.finish_node();
        conditional
    }

    /// `for { }` | `for expr { }` | `for name in expr { }`
    fn consume_loop(&mut self) -> NodeId {
        let loop_node = self.start_node(SrgKind::LoopStatement);
        self.expect(TokenKind::KwFor, "'for'");

        if !self.currently_is(TokenKind::BraceOpen) {
            let named = (self.currently_is(TokenKind::Identifier)
                || self.currently_is(TokenKind::Underscore))
                && self.peek_nth(1) == TokenKind::KwIn;

            if named {
                let named_value = self.start_node(SrgKind::NamedValue);
                let name = self.current_text().to_owned();
                self.bump();
                self.builder
                    .decorate(named_value, SrgPredicate::NamedValueName, &name);
                self.finish_node();
                self.builder
                    .connect(loop_node, SrgPredicate::LoopNamedValue, named_value);
                self.expect(TokenKind::KwIn, "'in'");
            }

            let expression = self.consume_condition_expression();
            self.builder
                .connect(loop_node, SrgPredicate::LoopExpr, expression);
        }

        let block = self.consume_statement_block();
        self.builder.connect(loop_node, SrgPredicate::LoopBlock, block);

        self.finish_node();
        loop_node
    }

    /// `with expr as name { }`
    fn consume_with(&mut self) -> NodeId {
        let with_node = self.start_node(SrgKind::WithStatement);
        self.expect(TokenKind::KwWith, "'with'");

        let expression = self.consume_condition_expression();
        self.builder
            .connect(with_node, SrgPredicate::WithExpr, expression);

        if self.eat(TokenKind::KwAs) {
            let named_value = self.start_node(SrgKind::NamedValue);
            if let Some(name) = self.consume_identifier() {
                self.builder
                    .decorate(named_value, SrgPredicate::NamedValueName, &name);
            }
            self.finish_node();
            self.builder
                .connect(with_node, SrgPredicate::WithNamedValue, named_value);
        }

        let block = self.consume_statement_block();
        self.builder.connect(with_node, SrgPredicate::WithBlock, block);

        self.finish_node();
        with_node
    }

    /// `match expr (as name)? { case Type: stmts ... default: stmts }`
    fn consume_match(&mut self) -> NodeId {
        let match_node = self.start_node(SrgKind::MatchStatement);
        self.expect(TokenKind::KwMatch, "'match'");

        let expression = self.consume_condition_expression();
        self.builder
            .connect(match_node, SrgPredicate::MatchExpr, expression);

        if self.eat(TokenKind::KwAs) {
            let named_value = self.start_node(SrgKind::AssignedValue);
            if let Some(name) = self.consume_identifier() {
                self.builder
                    .decorate(named_value, SrgPredicate::NamedValueName, &name);
            }
            self.finish_node();
            self.builder
                .connect(match_node, SrgPredicate::MatchNamedValue, named_value);
        }

        self.expect(TokenKind::BraceOpen, "'{' to open match body");
        loop {
            while self.current().is_statement_terminator() {
                self.bump();
            }
            match self.current() {
                TokenKind::KwCase => {
                    let case_node = self.start_node(SrgKind::MatchCase);
                    self.bump();
                    let case_type =
                        self.consume_type_reference(super::TypeRefOption::NoVoid);
                    self.builder
                        .connect(case_node, SrgPredicate::MatchCaseTypeRef, case_type);
                    self.expect(TokenKind::Colon, "':' after case type");
                    let block = self.consume_case_statements();
                    self.builder.connect(case_node, SrgPredicate::CaseBlock, block);
                    self.finish_node();
                    self.builder
                        .connect(match_node, SrgPredicate::MatchCaseRef, case_node);
                }
                TokenKind::KwDefault => {
                    let case_node = self.start_node(SrgKind::MatchCase);
                    self.bump();
                    self.expect(TokenKind::Colon, "':' after default");
                    let block = self.consume_case_statements();
                    self.builder.connect(case_node, SrgPredicate::CaseBlock, block);
                    self.finish_node();
                    self.builder
                        .connect(match_node, SrgPredicate::MatchCaseRef, case_node);
                }
                _ => break,
            }
        }
        self.expect(TokenKind::BraceClose, "'}' to close match body");

        self.finish_node();
        match_node
    }

    /// `switch expr? { case expr: stmts ... default: stmts }`
    fn consume_switch(&mut self) -> NodeId {
        let switch_node = self.start_node(SrgKind::SwitchStatement);
        self.expect(TokenKind::KwSwitch, "'switch'");

        if !self.currently_is(TokenKind::BraceOpen) {
            let expression = self.consume_condition_expression();
            self.builder
                .connect(switch_node, SrgPredicate::SwitchExpr, expression);
        }

        self.expect(TokenKind::BraceOpen, "'{' to open switch body");
        loop {
            while self.current().is_statement_terminator() {
                self.bump();
            }
            match self.current() {
                TokenKind::KwCase => {
                    let case_node = self.start_node(SrgKind::SwitchCase);
                    self.bump();
                    let expression = self.consume_condition_expression();
                    self.builder
                        .connect(case_node, SrgPredicate::CaseExpr, expression);
                    self.expect(TokenKind::Colon, "':' after case expression");
                    let block = self.consume_case_statements();
                    self.builder.connect(case_node, SrgPredicate::CaseBlock, block);
                    self.finish_node();
                    self.builder
                        .connect(switch_node, SrgPredicate::SwitchCaseRef, case_node);
                }
                TokenKind::KwDefault => {
                    let case_node = self.start_node(SrgKind::SwitchCase);
                    self.bump();
                    self.expect(TokenKind::Colon, "':' after default");
                    let block = self.consume_case_statements();
                    self.builder.connect(case_node, SrgPredicate::CaseBlock, block);
                    self.finish_node();
                    self.builder
                        .connect(switch_node, SrgPredicate::SwitchCaseRef, case_node);
                }
                _ => break,
            }
        }
        self.expect(TokenKind::BraceClose, "'}' to close switch body");

        self.finish_node();
        switch_node
    }

    /// Statements up to the next `case`, `default`, or closing brace,
    /// wrapped in a synthetic block.
    fn consume_case_statements(&mut self) -> NodeId {
        let block = self.start_node(SrgKind::StatementBlock);

        loop {
            while self.current().is_statement_terminator() {
                self.bump();
            }
            match self.current() {
                TokenKind::KwCase
                | TokenKind::KwDefault
                | TokenKind::BraceClose
                | TokenKind::Eof => break,
                _ => {
                    let statement = self.consume_statement();
                    self.builder
                        .connect(block, SrgPredicate::StatementChild, statement);
                }
            }
        }

        self.finish_node();
        block
    }

    fn consume_return(&mut self) -> NodeId {
        let return_node = self.start_node(SrgKind::ReturnStatement);
        self.expect(TokenKind::KwReturn, "'return'");

        if !self.current().is_statement_terminator()
            && !self.currently_is(TokenKind::BraceClose)
            && !self.eof()
        {
            let expression = self.consume_expression();
            self.builder
                .connect(return_node, SrgPredicate::ReturnExpr, expression);
        }

        self.consume_statement_terminator();
        self.finish_node();
        return_node
    }

    fn consume_reject(&mut self) -> NodeId {
        let reject_node = self.start_node(SrgKind::RejectStatement);
        self.expect(TokenKind::KwReject, "'reject'");

        let expression = self.consume_expression();
        self.builder
            .connect(reject_node, SrgPredicate::RejectExpr, expression);

        self.consume_statement_terminator();
        self.finish_node();
        reject_node
    }

    /// `yield expr` | `yield in expr`
    fn consume_yield(&mut self) -> NodeId {
        let yield_node = self.start_node(SrgKind::YieldStatement);
        self.expect(TokenKind::KwYield, "'yield'");

        if self.eat(TokenKind::KwIn) {
            let stream = self.consume_expression();
            self.builder
                .connect(yield_node, SrgPredicate::YieldStreamValue, stream);
        } else {
            let expression = self.consume_expression();
            self.builder
                .connect(yield_node, SrgPredicate::YieldExpr, expression);
        }

        self.consume_statement_terminator();
        self.finish_node();
        yield_node
    }

    fn consume_jump(&mut self, kind: SrgKind, label_predicate: SrgPredicate) -> NodeId {
        let jump = self.start_node(kind);
        self.bump();

        if self.currently_is(TokenKind::Identifier) {
            let label = self.current_text().to_owned();
            self.bump();
            self.builder.decorate(jump, label_predicate, &label);
        }

        self.consume_statement_terminator();
        self.finish_node();
        jump
    }

    /// An expression-leading statement: assignment, arrow, resolve, or a bare
    /// expression statement.
    fn consume_expression_statement(&mut self) -> NodeId {
        let expression = self.consume_expression();

        match self.current() {
            TokenKind::Equals => {
                let assign = self.start_node(SrgKind::AssignStatement);
                self.bump();
                self.builder
                    .connect(assign, SrgPredicate::AssignTarget, expression);
                let value = self.consume_expression();
                self.builder.connect(assign, SrgPredicate::AssignValue, value);
                self.consume_statement_terminator();
                self.finish_node();
                assign
            }

            TokenKind::LeftArrow => {
                let arrow = self.start_node(SrgKind::ArrowStatement);
                self.bump();
                self.builder
                    .connect(arrow, SrgPredicate::ArrowDestination, expression);
                let source = self.consume_expression();
                self.builder.connect(arrow, SrgPredicate::ArrowSource, source);
                self.consume_statement_terminator();
                self.finish_node();
                arrow
            }

            // `value, rejection <- expr`
            TokenKind::Comma => {
                let resolve = self.start_node(SrgKind::ResolveStatement);
                self.bump();
                self.builder
                    .connect(resolve, SrgPredicate::ArrowDestination, expression);
                let rejection = self.consume_expression();
                self.builder
                    .connect(resolve, SrgPredicate::ArrowRejection, rejection);
                self.expect(TokenKind::LeftArrow, "'<-' in resolve statement");
                let source = self.consume_expression();
                self.builder
                    .connect(resolve, SrgPredicate::ArrowSource, source);
                self.consume_statement_terminator();
                self.finish_node();
                resolve
            }

            _ => {
                let statement = self.start_node(SrgKind::ExpressionStatement);
                self.builder
                    .connect(statement, SrgPredicate::ExpressionStatementExpr, expression);
                self.consume_statement_terminator();
                self.finish_node();
                statement
            }
        }
    }
}
