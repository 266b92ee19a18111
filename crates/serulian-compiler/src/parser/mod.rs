//! Dual-version Serulian parser.
//!
//! - `lexer` - span-based tokens with synthetic statement terminators
//! - `core` - parser state, recovery, and node emission
//! - `grammar` - the recursive-descent rules (module, members, statements,
//!   expressions, type references)
//! - `compat` - the version-compatibility driver (dry-run newest, fall back)

pub mod compat;
pub mod lexer;
pub mod node_builder;

mod core;
mod grammar;

#[cfg(test)]
mod parser_tests;

use serulian_graph::store::NodeId;

use crate::diagnostics::Diagnostics;
use crate::source::InputSource;

pub use compat::parse_with_compatibility;
pub use self::core::{GrammarVersion, ImportKind, ImportRequest, ImportReporter};
pub use node_builder::{GraphNodeBuilder, NodeBuilder, NoopNodeBuilder};

/// Outcome of parsing one module.
pub struct ParseResult {
    /// The `File` root node.
    pub root: NodeId,
    pub diagnostics: Diagnostics,
    /// True when the module parsed without any syntax errors.
    pub ok: bool,
}

/// Parses `input` with the given grammar version, emitting structure through
/// `builder` and reporting imports through `reporter`.
pub fn parse(
    builder: &mut dyn NodeBuilder,
    reporter: ImportReporter<'_>,
    source: InputSource,
    input: &str,
    version: GrammarVersion,
) -> ParseResult {
    let tokens = lexer::lex(input);
    let parser = self::core::SourceParser::new(builder, reporter, source, input, tokens, version);
    parser.parse()
}
