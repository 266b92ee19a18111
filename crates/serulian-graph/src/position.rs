//! Rune-offset to line/column mapping for a single source file.
//!
//! Built with one scan over the text, recording an inclusive `[start, end]`
//! rune range per line. A line's end position is the offset of its newline
//! (or EOF), so the position just past the last character resolves to that
//! line.

use thiserror::Error;

/// Failure modes for position lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("unknown rune position {0} in source file")]
    UnknownRunePosition(usize),

    #[error("unknown line {line} or column {column} in source file")]
    UnknownLineOrColumn { line: usize, column: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineSpan {
    start: usize,
    end: usize,
}

/// Cached bidirectional mapper between rune offsets and zero-based
/// `(line, column)` pairs.
#[derive(Debug, Clone, Default)]
pub struct SourcePositionMapper {
    lines: Vec<LineSpan>,
}

impl SourcePositionMapper {
    /// Builds a mapper for the given source contents.
    pub fn new(contents: &str) -> Self {
        let mut lines = Vec::new();
        let mut start = 0usize;
        for line in contents.split('\n') {
            let end = start + line.chars().count();
            lines.push(LineSpan { start, end });
            start = end + 1;
        }
        Self { lines }
    }

    /// Returns an empty mapper, for sources that failed to load.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The line and column of the given rune position.
    pub fn rune_to_line_col(&self, rune_position: usize) -> Result<(usize, usize), PositionError> {
        let index = self.lines.partition_point(|span| span.end < rune_position);
        match self.lines.get(index) {
            Some(span) if span.start <= rune_position => {
                Ok((index, rune_position - span.start))
            }
            _ => Err(PositionError::UnknownRunePosition(rune_position)),
        }
    }

    /// The rune position of the given line and column.
    pub fn line_col_to_rune(&self, line: usize, column: usize) -> Result<usize, PositionError> {
        let span = self
            .lines
            .get(line)
            .ok_or(PositionError::UnknownLineOrColumn { line, column })?;

        if column > span.end - span.start {
            return Err(PositionError::UnknownLineOrColumn { line, column });
        }

        Ok(span.start + column)
    }

    /// Number of lines in the source.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Width in runes of the given line, excluding its terminator.
    pub fn line_width(&self, line: usize) -> Option<usize> {
        self.lines.get(line).map(|span| span.end - span.start)
    }
}
