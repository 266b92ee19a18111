//! Diagnostic message types.

use text_size::TextRange;

use crate::source::{InputSource, SourceRange};

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with severity, location, and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub severity: Severity,
    pub source: InputSource,
    pub range: TextRange,
    pub message: String,
}

impl DiagnosticMessage {
    pub fn error(location: SourceRange, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            source: location.source,
            range: location.range,
            message: message.into(),
        }
    }

    pub fn warning(location: SourceRange, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            source: location.source,
            range: location.range,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    pub fn location(&self) -> SourceRange {
        SourceRange::new(self.source.clone(), self.range)
    }
}

impl std::fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} at {}..{}: {}",
            self.severity,
            self.source,
            u32::from(self.range.start()),
            u32::from(self.range.end()),
            self.message
        )
    }
}
