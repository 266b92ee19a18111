//! Diagnostics collection for accumulating compiler messages.

use crate::source::SourceRange;

use super::message::{DiagnosticMessage, Severity};

/// Collection of diagnostic messages from loading, parsing, and analysis.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics(Vec<DiagnosticMessage>);

impl Diagnostics {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, msg: DiagnosticMessage) {
        self.0.push(msg);
    }

    pub fn error(&mut self, location: SourceRange, message: impl Into<String>) {
        self.push(DiagnosticMessage::error(location, message));
    }

    pub fn warning(&mut self, location: SourceRange, message: impl Into<String>) {
        self.push(DiagnosticMessage::warning(location, message));
    }

    pub fn extend(&mut self, iter: impl IntoIterator<Item = DiagnosticMessage>) {
        self.0.extend(iter);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticMessage> {
        self.0.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.0.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.0.iter().filter(|d| d.is_warning()).count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticMessage> {
        self.0.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticMessage> {
        self.0.iter().filter(|d| d.is_warning())
    }

    pub fn filter_by_severity(&self, severity: Severity) -> Vec<&DiagnosticMessage> {
        self.0.iter().filter(|d| d.severity == severity).collect()
    }

    /// Sorts into the deterministic reporting order: source identifier, then
    /// range start, then message.
    pub fn sort(&mut self) {
        self.0.sort_by(|a, b| {
            (&a.source, a.range.start(), &a.message).cmp(&(&b.source, b.range.start(), &b.message))
        });
    }

    pub fn as_slice(&self) -> &[DiagnosticMessage] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<DiagnosticMessage> {
        self.0
    }
}

impl IntoIterator for Diagnostics {
    type Item = DiagnosticMessage;
    type IntoIter = std::vec::IntoIter<DiagnosticMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticMessage;
    type IntoIter = std::slice::Iter<'a, DiagnosticMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<DiagnosticMessage> for Diagnostics {
    fn from_iter<T: IntoIterator<Item = DiagnosticMessage>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
