//! Tracking of all loaded source files.
//!
//! Append-only during loading; frozen into a read-only tracker afterwards.
//! Position mappers are built lazily per file on first diagnostic lookup.

use std::sync::OnceLock;

use dashmap::DashMap;
use indexmap::IndexMap;
use serulian_graph::position::SourcePositionMapper;

use crate::source::InputSource;

#[derive(Debug)]
struct TrackedSource {
    contents: String,
    revision_id: String,
    kind: String,
    mapper: OnceLock<SourcePositionMapper>,
}

/// Read-only view of every loaded source file: contents, revision id, source
/// kind, and lazy rune-to-line/column mapping.
#[derive(Debug, Default)]
pub struct SourceTracker {
    sources: IndexMap<InputSource, TrackedSource>,
}

impl SourceTracker {
    pub fn contents(&self, source: &InputSource) -> Option<&str> {
        self.sources.get(source).map(|s| s.contents.as_str())
    }

    pub fn revision_id(&self, source: &InputSource) -> Option<&str> {
        self.sources.get(source).map(|s| s.revision_id.as_str())
    }

    pub fn kind(&self, source: &InputSource) -> Option<&str> {
        self.sources.get(source).map(|s| s.kind.as_str())
    }

    pub fn sources(&self) -> impl Iterator<Item = &InputSource> {
        self.sources.keys()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Resolves a rune position in the given source to (line, column).
    pub fn line_and_column(&self, source: &InputSource, rune: usize) -> Option<(usize, usize)> {
        let tracked = self.sources.get(source)?;
        let mapper = tracked
            .mapper
            .get_or_init(|| SourcePositionMapper::new(&tracked.contents));
        mapper.rune_to_line_col(rune).ok()
    }

    /// Byte-comparable digest of the tracked set, modulo revision ids. Two
    /// loads of an unchanged tree produce equal digests.
    pub fn content_digest(&self) -> Vec<(InputSource, usize)> {
        self.sources
            .iter()
            .map(|(source, tracked)| (source.clone(), tracked.contents.len()))
            .collect()
    }
}

/// Concurrent accumulation side of the tracker, used during loading.
#[derive(Debug, Default)]
pub(super) struct MutableSourceTracker {
    sources: DashMap<InputSource, (String, String, String)>,
}

impl MutableSourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source_file(
        &self,
        source: InputSource,
        kind: &str,
        contents: String,
        revision_id: String,
    ) {
        self.sources
            .insert(source, (contents, revision_id, kind.to_owned()));
    }

    /// Freezes into the read-only tracker, sorted by source identifier.
    pub fn freeze(self) -> SourceTracker {
        let mut entries: Vec<_> = self.sources.into_iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut sources = IndexMap::new();
        for (source, (contents, revision_id, kind)) in entries {
            sources.insert(
                source,
                TrackedSource {
                    contents,
                    revision_id,
                    kind,
                    mapper: OnceLock::new(),
                },
            );
        }
        SourceTracker { sources }
    }
}
