//! Serulian compiler core: whole-program compilation of Serulian source to
//! an ES5 emission tree.
//!
//! The pipeline, leaf to root:
//! - `loader` - entrypoint and import resolution into modules
//! - `parser` - dual-version lexer and recursive-descent parser into the SRG
//! - `srg` - structural queries and name resolution over parsed modules
//! - `typegraph` - the resolved type universe and the `TypeReference` algebra
//! - `scopegraph` - per-node semantic analysis (validity, types, references)
//! - `codedom` - the lowered language-neutral expression/statement tree
//! - `statemachine` - the coroutine-to-state-machine transform
//! - `compiler` - the staged pipeline facade
//!
//! All phases share one [`serulian_graph::GraphStore`]; each compilation owns
//! its store and there is no process-wide mutable state.

pub mod cancel;
pub mod codedom;
pub mod compiler;
#[cfg(test)]
mod compiler_tests;
pub mod diagnostics;
pub mod emit;
pub mod loader;
pub mod parser;
pub mod scopegraph;
pub mod source;
pub mod sourceshape;
pub mod srg;
pub mod statemachine;
pub mod typegraph;

pub use cancel::CancellationToken;
pub use compiler::{CompileConfig, CompileResult, Compiler};
pub use diagnostics::{DiagnosticMessage, Diagnostics, Severity};
pub use source::{InputSource, SourceRange};
