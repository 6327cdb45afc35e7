//! Byte-offset to line/column translation for diagnostics.

/// Convert a byte offset into (line, col), both 1-indexed.
///
/// Lexing and parsing errors report only the line; the column is kept for
/// callers that want a precise caret position.
pub fn offset_to_line_col(offset: usize, source: &str) -> (usize, usize) {
    let mut line = 1;
    let mut line_start = 0;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            line_start = i + 1;
        }
    }
    (line, offset - line_start + 1)
}

/// The 1-indexed line containing `offset`.
pub fn line_of(offset: usize, source: &str) -> usize {
    offset_to_line_col(offset, source).0
}
