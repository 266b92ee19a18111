use text_size::TextRange;

use crate::source::{InputSource, SourceRange};

use super::{DiagnosticMessage, Diagnostics, Severity};

fn at(source: &str, start: u32) -> SourceRange {
    SourceRange::new(
        InputSource::from(source),
        TextRange::new(start.into(), (start + 1).into()),
    )
}

#[test]
fn counts_by_severity() {
    let mut diagnostics = Diagnostics::new();
    diagnostics.error(at("a.seru", 0), "bad");
    diagnostics.warning(at("a.seru", 4), "meh");
    diagnostics.error(at("b.seru", 2), "worse");

    assert!(diagnostics.has_errors());
    assert_eq!(diagnostics.error_count(), 2);
    assert_eq!(diagnostics.warning_count(), 1);
    assert_eq!(diagnostics.filter_by_severity(Severity::Warning).len(), 1);
}

#[test]
fn sort_is_deterministic() {
    let mut first = Diagnostics::new();
    first.error(at("b.seru", 9), "late");
    first.error(at("a.seru", 5), "middle");
    first.error(at("a.seru", 1), "early");

    let mut second = Diagnostics::new();
    second.error(at("a.seru", 1), "early");
    second.error(at("b.seru", 9), "late");
    second.error(at("a.seru", 5), "middle");

    first.sort();
    second.sort();

    let messages: Vec<_> = first.iter().map(|d| d.message.clone()).collect();
    assert_eq!(messages, vec!["early", "middle", "late"]);
    assert_eq!(first.as_slice(), second.as_slice());
}

#[test]
fn display_carries_source_and_range() {
    let msg = DiagnosticMessage::error(at("mod.seru", 3), "expected int, got string");
    assert_eq!(
        msg.to_string(),
        "error: mod.seru at 3..4: expected int, got string"
    );
}
