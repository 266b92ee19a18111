//! Version-compatibility parse driver.
//!
//! Tries the newest grammar first in a dry-run (no-op builder, discarded
//! imports); on total failure it falls back to the previous version. The
//! first version that parses cleanly is replayed into the real builder. If
//! none succeeds, the newest grammar is replayed so its diagnostics surface.

use crate::source::InputSource;

use super::core::{GrammarVersion, ImportReporter};
use super::node_builder::{NodeBuilder, NoopNodeBuilder};
use super::{ParseResult, parse};

/// Grammar versions, newest first.
const VERSIONS: &[GrammarVersion] = &[GrammarVersion::V1, GrammarVersion::V0];

/// Parses `input`, trying all grammar versions from newest to oldest.
pub fn parse_with_compatibility(
    builder: &mut dyn NodeBuilder,
    reporter: ImportReporter<'_>,
    source: InputSource,
    input: &str,
) -> ParseResult {
    let discard = |_request: super::core::ImportRequest| String::new();

    for version in VERSIONS {
        let mut dry_run = NoopNodeBuilder::new();
        let result = parse(&mut dry_run, &discard, source.clone(), input, *version);
        if result.ok {
            return parse(builder, reporter, source, input, *version);
        }
    }

    // No version parsed cleanly; replay the newest for its diagnostics.
    parse(builder, reporter, source, input, VERSIONS[0])
}
