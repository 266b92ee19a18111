//! Parser state machine and low-level operations.

use serulian_graph::store::NodeId;
use text_size::{TextRange, TextSize};

use crate::diagnostics::Diagnostics;
use crate::source::{InputSource, SourceRange};
use crate::sourceshape::{SrgKind, SrgPredicate};

use super::ParseResult;
use super::lexer::{Token, TokenKind, token_text};
use super::node_builder::NodeBuilder;

/// The grammar versions understood by the compatibility driver. `V0` is the
/// legacy grammar that declares types in generic position (`var<int> x`,
/// `function<int> f(...)`); `V1` declares them trailing (`var x int`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarVersion {
    V0,
    V1,
}

/// The kinds of import a module can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// A path relative to the importing module.
    Local,
    /// A version-pinned remote package URL.
    Vcs,
    /// A reference to a configured library alias.
    Alias,
}

/// An import discovered during parsing, handed to the package loader.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// The source kind of the import; empty for Serulian imports.
    pub source_kind: String,
    pub path: String,
    pub kind: ImportKind,
    pub importing_source: InputSource,
    pub rune_position: u32,
}

/// Callback invoked for each import; returns the canonical reference id the
/// parser decorates onto the import node.
pub type ImportReporter<'a> = &'a dyn Fn(ImportRequest) -> String;

/// Recursive-descent parser over the token stream. Structure is emitted
/// through the node builder; errors are collected as diagnostics and at most
/// one diagnostic is reported per position.
pub struct SourceParser<'src, 'b> {
    pub(super) source: &'src str,
    pub(super) input_source: InputSource,
    pub(super) version: GrammarVersion,
    pub(super) tokens: Vec<Token>,
    pub(super) pos: usize,
    pub(super) builder: &'b mut dyn NodeBuilder,
    pub(super) reporter: ImportReporter<'b>,
    pub(super) diagnostics: Diagnostics,
    pub(super) node_stack: Vec<NodeId>,
    /// Whether `{` after an access expression opens a structural-new body.
    /// Disabled inside condition expressions, where `{` opens the block.
    pub(super) allow_structural_new: bool,
    last_diagnostic_pos: Option<TextSize>,
    error_count: usize,
}

impl<'src, 'b> SourceParser<'src, 'b> {
    pub fn new(
        builder: &'b mut dyn NodeBuilder,
        reporter: ImportReporter<'b>,
        input_source: InputSource,
        source: &'src str,
        tokens: Vec<Token>,
        version: GrammarVersion,
    ) -> Self {
        Self {
            source,
            input_source,
            version,
            tokens,
            pos: 0,
            builder,
            reporter,
            diagnostics: Diagnostics::new(),
            node_stack: Vec::new(),
            allow_structural_new: true,
            last_diagnostic_pos: None,
            error_count: 0,
        }
    }

    pub fn parse(mut self) -> ParseResult {
        let root = self.consume_top_level();
        ParseResult {
            root,
            ok: self.error_count == 0,
            diagnostics: self.diagnostics,
        }
    }

    // --- Token access ---

    pub(super) fn skip_trivia(&mut self) {
        while self
            .tokens
            .get(self.pos)
            .is_some_and(|t| t.kind.is_trivia())
        {
            self.pos += 1;
        }
    }

    pub(super) fn current(&mut self) -> TokenKind {
        self.skip_trivia();
        self.nth_raw(0)
    }

    fn nth_raw(&self, lookahead: usize) -> TokenKind {
        self.tokens
            .get(self.pos + lookahead)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    /// LL(k) lookahead past trivia.
    pub(super) fn peek_nth(&mut self, n: usize) -> TokenKind {
        self.skip_trivia();
        let mut count = 0;
        let mut pos = self.pos;
        while let Some(token) = self.tokens.get(pos) {
            if !token.kind.is_trivia() {
                if count == n {
                    return token.kind;
                }
                count += 1;
            }
            pos += 1;
        }
        TokenKind::Eof
    }

    pub(super) fn current_span(&mut self) -> TextRange {
        self.skip_trivia();
        self.tokens
            .get(self.pos)
            .map_or_else(|| TextRange::empty(self.eof_offset()), |t| t.span)
    }

    pub(super) fn current_text(&mut self) -> &'src str {
        self.skip_trivia();
        match self.tokens.get(self.pos) {
            Some(token) => token_text(self.source, token),
            None => "",
        }
    }

    fn eof_offset(&self) -> TextSize {
        TextSize::from(self.source.len() as u32)
    }

    pub(super) fn eof(&mut self) -> bool {
        self.current() == TokenKind::Eof
    }

    pub(super) fn currently_is(&mut self, kind: TokenKind) -> bool {
        self.current() == kind
    }

    pub(super) fn bump(&mut self) {
        self.skip_trivia();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    /// Consumes the current token when it matches; true on success.
    pub(super) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.currently_is(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// On mismatch: emit a diagnostic but don't consume.
    pub(super) fn expect(&mut self, kind: TokenKind, what: &str) -> bool {
        if self.eat(kind) {
            return true;
        }
        self.emit_error(format!("expected {what}"));
        false
    }

    /// Consumes an identifier token and returns its text.
    pub(super) fn consume_identifier(&mut self) -> Option<String> {
        if self.currently_is(TokenKind::Identifier) {
            let text = self.current_text().to_owned();
            self.bump();
            Some(text)
        } else {
            self.emit_error("expected identifier");
            None
        }
    }

    // --- Statement terminators ---

    pub(super) fn try_consume_statement_terminator(&mut self) -> bool {
        let kind = self.current();
        if kind.is_statement_terminator() {
            self.bump();
            // Collapse runs of terminators.
            while self.current().is_statement_terminator() {
                self.bump();
            }
            true
        } else {
            kind == TokenKind::Eof || kind == TokenKind::BraceClose
        }
    }

    pub(super) fn consume_statement_terminator(&mut self) {
        if !self.try_consume_statement_terminator() {
            self.emit_error("expected end of statement");
            self.skip_to_statement_boundary();
        }
    }

    /// Skips forward to the next plausible statement boundary so later errors
    /// can still surface.
    pub(super) fn skip_to_statement_boundary(&mut self) {
        loop {
            let kind = self.current();
            match kind {
                TokenKind::Eof | TokenKind::BraceClose => return,
                kind if kind.is_statement_terminator() => {
                    self.bump();
                    return;
                }
                _ => self.bump(),
            }
        }
    }

    // --- Node emission ---

    pub(super) fn start_node(&mut self, kind: SrgKind) -> NodeId {
        let start: u32 = self.current_span().start().into();
        let node = self.builder.create_node(kind);
        self.builder
            .decorate(node, SrgPredicate::Source, self.input_source.as_str());
        self.builder
            .decorate_int(node, SrgPredicate::StartRune, start as i64);
        self.node_stack.push(node);
        node
    }

    pub(super) fn finish_node(&mut self) {
        let node = self.node_stack.pop().expect("unbalanced finish_node");
        let end: u32 = self.previous_end().into();
        self.builder
            .decorate_int(node, SrgPredicate::EndRune, end as i64);
    }

    pub(super) fn current_node(&self) -> NodeId {
        *self.node_stack.last().expect("no current node")
    }

    fn previous_end(&self) -> TextSize {
        self.tokens[..self.pos]
            .iter()
            .rev()
            .find(|t| !t.kind.is_trivia())
            .map(|t| t.span.end())
            .unwrap_or_else(|| TextSize::from(0))
    }

    /// Creates an error-recovery node carrying the given message.
    pub(super) fn create_error_node(&mut self, message: impl Into<String>) -> NodeId {
        let message = message.into();
        self.emit_error(message);
        let node = self.start_node(SrgKind::ErrorNode);
        self.finish_node();
        node
    }

    // --- Diagnostics ---

    pub(super) fn emit_error(&mut self, message: impl Into<String>) {
        let span = self.current_span();
        if self.last_diagnostic_pos == Some(span.start()) {
            return;
        }
        self.last_diagnostic_pos = Some(span.start());
        self.error_count += 1;
        self.diagnostics.error(
            SourceRange::new(self.input_source.clone(), span),
            message.into(),
        );
    }

    // --- Imports ---

    /// Reports an import to the loader, returning the canonical reference id.
    pub(super) fn report_import(&mut self, path: &str, kind: ImportKind, source_kind: &str) -> String {
        let position: u32 = self.current_span().start().into();
        (self.reporter)(ImportRequest {
            source_kind: source_kind.to_owned(),
            path: path.to_owned(),
            kind,
            importing_source: self.input_source.clone(),
            rune_position: position,
        })
    }
}
