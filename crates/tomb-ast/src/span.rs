//! Source location tracking for error reporting and assembly annotations.
//!
//! # Design
//!
//! - `Span` — compact byte range with a cached 1-based line number
//! - `SourceText` — owns the source string plus a line-start table, and
//!   converts byte offsets to lines and lines back to their text (the code
//!   generator quotes source lines in `// Line N:` comments)

use std::ops::Range;

/// Compact source location reference.
///
/// Points to a byte range in the compiled source with a cached line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// Byte offset of start position
    pub start: u32,
    /// Byte offset of end position (exclusive)
    pub end: u32,
    /// Cached 1-based line number for the start position
    pub line: u32,
}

impl Span {
    /// Create a new span.
    pub fn new(start: u32, end: u32, line: u32) -> Self {
        Self { start, end, line }
    }

    /// A zero-length span at the start of the source.
    pub fn zero() -> Self {
        Self::new(0, 0, 1)
    }
}

/// The source being compiled, with line indexing.
#[derive(Debug, Clone)]
pub struct SourceText {
    text: String,
    /// Byte offsets of each line start; `line_starts[0]` is always 0.
    line_starts: Vec<u32>,
}

impl SourceText {
    /// Index a source string.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0u32];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { text, line_starts }
    }

    /// Build from pre-split lines (the per-line compile entry point).
    pub fn from_lines(lines: &[&str]) -> Self {
        Self::new(lines.join("\n"))
    }

    /// The full source text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 1-based line number containing the given byte offset.
    pub fn line_of(&self, offset: usize) -> u32 {
        match self.line_starts.binary_search(&(offset as u32)) {
            Ok(idx) => idx as u32 + 1,
            Err(idx) => idx as u32,
        }
    }

    /// 1-based column of the given byte offset within its line.
    pub fn column_of(&self, offset: usize) -> u32 {
        let line = self.line_of(offset);
        let line_start = self.line_starts[(line - 1) as usize];
        offset as u32 - line_start + 1
    }

    /// The text of a 1-based line, without its newline.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let idx = line.checked_sub(1)? as usize;
        let start = *self.line_starts.get(idx)? as usize;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&next| next as usize - 1)
            .unwrap_or(self.text.len());
        Some(self.text[start..end].trim_end_matches('\r'))
    }

    /// Build a span for a byte range, caching its line.
    pub fn span(&self, range: Range<usize>) -> Span {
        Span::new(
            range.start as u32,
            range.end as u32,
            self.line_of(range.start),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_of() {
        let src = SourceText::new("one\ntwo\nthree");
        assert_eq!(src.line_of(0), 1);
        assert_eq!(src.line_of(3), 1);
        assert_eq!(src.line_of(4), 2);
        assert_eq!(src.line_of(8), 3);
        assert_eq!(src.line_of(12), 3);
    }

    #[test]
    fn test_column_of() {
        let src = SourceText::new("one\ntwo");
        assert_eq!(src.column_of(0), 1);
        assert_eq!(src.column_of(5), 2);
    }

    #[test]
    fn test_line_text() {
        let src = SourceText::new("one\ntwo\r\nthree");
        assert_eq!(src.line_text(1), Some("one"));
        assert_eq!(src.line_text(2), Some("two"));
        assert_eq!(src.line_text(3), Some("three"));
        assert_eq!(src.line_text(4), None);
    }

    #[test]
    fn test_from_lines() {
        let src = SourceText::from_lines(&["a", "bb"]);
        assert_eq!(src.text(), "a\nbb");
        assert_eq!(src.line_text(2), Some("bb"));
    }
}
