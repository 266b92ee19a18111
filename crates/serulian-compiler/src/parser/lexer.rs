//! Lexer for Serulian source.
//!
//! Produces span-based tokens without storing text - text is sliced from
//! source only when needed. Comments are first-class tokens (retained for doc
//! extraction); newlines that end a statement become synthetic terminator
//! tokens so the grammar never has to reason about raw newlines.
//!
//! Consecutive unrecognized characters are coalesced into single `Garbage`
//! tokens to keep the stream manageable for malformed input.

use logos::Logos;
use text_size::TextRange;

/// All Serulian token kinds.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // --- Delimiters ---
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,

    // --- Operators. Longer forms first for correct precedence. ---
    #[token("?.")]
    QuestionDot,
    #[token("??")]
    QuestionQuestion,
    #[token("?")]
    Question,
    #[token("..")]
    DotDot,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("<-")]
    LeftArrow,
    #[token("->")]
    Arrow,
    #[token("=>")]
    FatArrow,
    #[token("*.")]
    StarDot,
    #[token("<<")]
    ShiftLeft,
    #[token(">>")]
    ShiftRight,
    #[token("<=")]
    LessEquals,
    #[token(">=")]
    GreaterEquals,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("==")]
    EqualsEquals,
    #[token("!=")]
    NotEquals,
    #[token("=")]
    Equals,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    PipePipe,
    #[token("&")]
    Ampersand,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
    #[token("@")]
    At,

    // --- Keywords. Defined before `Identifier` so they take precedence. ---
    #[token("import")]
    KwImport,
    #[token("from")]
    KwFrom,
    #[token("as")]
    KwAs,
    #[token("class")]
    KwClass,
    #[token("interface")]
    KwInterface,
    #[token("struct")]
    KwStruct,
    #[token("agent")]
    KwAgent,
    #[token("type")]
    KwType,
    #[token("function")]
    KwFunction,
    #[token("constructor")]
    KwConstructor,
    #[token("property")]
    KwProperty,
    #[token("operator")]
    KwOperator,
    #[token("var")]
    KwVar,
    #[token("get")]
    KwGet,
    #[token("set")]
    KwSet,
    #[token("with")]
    KwWith,
    #[token("for")]
    KwFor,
    #[token("in")]
    KwIn,
    #[token("is")]
    KwIs,
    #[token("not")]
    KwNot,
    #[token("if")]
    KwIf,
    #[token("else")]
    KwElse,
    #[token("match")]
    KwMatch,
    #[token("switch")]
    KwSwitch,
    #[token("case")]
    KwCase,
    #[token("default")]
    KwDefault,
    #[token("return")]
    KwReturn,
    #[token("reject")]
    KwReject,
    #[token("yield")]
    KwYield,
    #[token("break")]
    KwBreak,
    #[token("continue")]
    KwContinue,
    #[token("this")]
    KwThis,
    #[token("val")]
    KwVal,
    #[token("null")]
    KwNull,
    #[token("true")]
    KwTrue,
    #[token("false")]
    KwFalse,

    #[token("_")]
    Underscore,

    #[regex(r"[a-zA-Z][a-zA-Z0-9_]*")]
    Identifier,

    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
    NumericLiteral,

    #[regex(r#""(?:[^"\\]|\\.)*""#)]
    #[regex(r"'(?:[^'\\]|\\.)*'")]
    StringLiteral,

    #[regex(r"`(?:[^`\\]|\\.)*`")]
    TemplateStringLiteral,

    // --- Trivia ---
    #[regex(r"[ \t\r]+")]
    Whitespace,
    #[token("\n")]
    Newline,
    #[regex(r"//[^\n]*")]
    LineComment,
    #[regex(r"/\*(?:[^*]|\*[^/])*\*/")]
    BlockComment,

    /// Statement terminator inserted at newlines that end a statement.
    SyntheticSemicolon,
    /// Coalesced unrecognized characters.
    Garbage,
    /// End of input; never produced by `lex`, used as the out-of-bounds kind.
    Eof,
}

impl TokenKind {
    #[inline]
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace
                | TokenKind::Newline
                | TokenKind::LineComment
                | TokenKind::BlockComment
        )
    }

    #[inline]
    pub fn is_comment(self) -> bool {
        matches!(self, TokenKind::LineComment | TokenKind::BlockComment)
    }

    #[inline]
    pub fn is_statement_terminator(self) -> bool {
        matches!(self, TokenKind::Semicolon | TokenKind::SyntheticSemicolon)
    }

    /// Whether a newline directly after this token terminates a statement.
    fn ends_statement(self) -> bool {
        matches!(
            self,
            TokenKind::Identifier
                | TokenKind::NumericLiteral
                | TokenKind::StringLiteral
                | TokenKind::TemplateStringLiteral
                | TokenKind::KwThis
                | TokenKind::KwVal
                | TokenKind::KwNull
                | TokenKind::KwTrue
                | TokenKind::KwFalse
                | TokenKind::KwReturn
                | TokenKind::KwReject
                | TokenKind::KwBreak
                | TokenKind::KwContinue
                | TokenKind::Underscore
                | TokenKind::ParenClose
                | TokenKind::BracketClose
                | TokenKind::BraceClose
                | TokenKind::Greater
                | TokenKind::Question
                | TokenKind::Bang
                | TokenKind::Star
        )
    }
}

/// Zero-copy token: kind + span, text retrieved via [`token_text`] when
/// needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: TextRange,
}

impl Token {
    #[inline]
    pub fn new(kind: TokenKind, span: TextRange) -> Self {
        Self { kind, span }
    }
}

fn range(span: std::ops::Range<usize>) -> TextRange {
    TextRange::new((span.start as u32).into(), (span.end as u32).into())
}

/// Tokenizes source into a vector of span-based tokens.
///
/// Post-processes the Logos output:
/// - Coalesces consecutive lexer errors into single `Garbage` tokens
/// - Inserts `SyntheticSemicolon` tokens after newlines that end a statement
pub fn lex(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(source);
    let mut error_start: Option<usize> = None;
    let mut last_significant: Option<TokenKind> = None;

    loop {
        match lexer.next() {
            Some(Ok(kind)) => {
                if let Some(start) = error_start.take() {
                    let end = lexer.span().start;
                    tokens.push(Token::new(TokenKind::Garbage, range(start..end)));
                    last_significant = Some(TokenKind::Garbage);
                }

                let span = lexer.span();
                if kind == TokenKind::Newline {
                    if last_significant.is_some_and(TokenKind::ends_statement) {
                        tokens.push(Token::new(
                            TokenKind::SyntheticSemicolon,
                            TextRange::empty((span.start as u32).into()),
                        ));
                        last_significant = Some(TokenKind::SyntheticSemicolon);
                    }
                    tokens.push(Token::new(TokenKind::Newline, range(span)));
                } else {
                    tokens.push(Token::new(kind, range(span)));
                    if !kind.is_trivia() {
                        last_significant = Some(kind);
                    }
                }
            }
            Some(Err(())) => {
                if error_start.is_none() {
                    error_start = Some(lexer.span().start);
                }
            }
            None => {
                if let Some(start) = error_start.take() {
                    tokens.push(Token::new(TokenKind::Garbage, range(start..source.len())));
                }
                break;
            }
        }
    }

    tokens
}

/// Retrieves the text slice for a token. O(1) slice into source.
#[inline]
pub fn token_text<'src>(source: &'src str, token: &Token) -> &'src str {
    &source[std::ops::Range::<usize>::from(token.span)]
}
