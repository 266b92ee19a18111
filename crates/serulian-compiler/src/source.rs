//! Source identity and ranges.

use text_size::TextRange;

/// Identifies a single source module by its load path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputSource(pub String);

impl InputSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InputSource {
    fn from(path: &str) -> Self {
        Self(path.to_owned())
    }
}

/// A rune range within a named source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRange {
    pub source: InputSource,
    pub range: TextRange,
}

impl SourceRange {
    pub fn new(source: InputSource, range: TextRange) -> Self {
        Self { source, range }
    }

    /// A zero-width range at the given rune position.
    pub fn at(source: InputSource, position: u32) -> Self {
        Self {
            source,
            range: TextRange::empty(position.into()),
        }
    }
}
