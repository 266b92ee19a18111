use indoc::indoc;

use crate::position::{PositionError, SourcePositionMapper};

#[test]
fn single_line() {
    let mapper = SourcePositionMapper::new("hello");

    assert_eq!(mapper.rune_to_line_col(0), Ok((0, 0)));
    assert_eq!(mapper.rune_to_line_col(4), Ok((0, 4)));
    // One past the last rune still resolves to the line.
    assert_eq!(mapper.rune_to_line_col(5), Ok((0, 5)));
    assert_eq!(
        mapper.rune_to_line_col(6),
        Err(PositionError::UnknownRunePosition(6))
    );
}

#[test]
fn multi_line() {
    let source = indoc! {"
        class SomeClass {
        }

        function run() {}
    "};
    let mapper = SourcePositionMapper::new(source);

    // "class" starts line 0; "}" is the whole of line 1.
    assert_eq!(mapper.rune_to_line_col(0), Ok((0, 0)));
    assert_eq!(mapper.rune_to_line_col(18), Ok((1, 0)));
    assert_eq!(mapper.line_col_to_rune(1, 0), Ok(18));

    // The blank line has width zero but is addressable.
    assert_eq!(mapper.line_width(2), Some(0));
    assert_eq!(mapper.line_col_to_rune(2, 0), Ok(20));
}

#[test]
fn unknown_line_and_column() {
    let mapper = SourcePositionMapper::new("ab\ncd");

    assert!(matches!(
        mapper.line_col_to_rune(9, 0),
        Err(PositionError::UnknownLineOrColumn { line: 9, .. })
    ));
    assert!(matches!(
        mapper.line_col_to_rune(0, 40),
        Err(PositionError::UnknownLineOrColumn { column: 40, .. })
    ));
}

#[test]
fn roundtrip_every_position() {
    let source = "first line\nsecond\n\nlast one here";
    let mapper = SourcePositionMapper::new(source);

    for line in 0..mapper.line_count() {
        let width = mapper.line_width(line).unwrap();
        for column in 0..=width {
            let rune = mapper.line_col_to_rune(line, column).unwrap();
            let back = mapper.rune_to_line_col(rune).unwrap();
            // Positions at line ends are shared with the following line
            // start only through the newline rune, which belongs to its own
            // line, so the roundtrip is exact.
            assert_eq!(back, (line, column), "rune {rune}");
        }
    }
}

#[test]
fn non_ascii_runes() {
    let mapper = SourcePositionMapper::new("héllo\nwörld");

    assert_eq!(mapper.line_width(0), Some(5));
    assert_eq!(mapper.rune_to_line_col(6), Ok((1, 0)));
    assert_eq!(mapper.line_col_to_rune(1, 1), Ok(7));
}

#[test]
fn empty_source() {
    let mapper = SourcePositionMapper::new("");

    assert_eq!(mapper.line_count(), 1);
    assert_eq!(mapper.rune_to_line_col(0), Ok((0, 0)));
}
