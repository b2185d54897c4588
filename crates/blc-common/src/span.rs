use serde::Serialize;

/// A half-open byte range `[start, end)` into a single source text.
///
/// Spans are deliberately file-agnostic: one analysis works on one
/// compilation unit, and the presentation layer owns the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    /// 0-based byte offset of the first character.
    pub start: u32,
    /// 0-based byte offset one past the last character.
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span start {start} after end {end}");
        Self { start, end }
    }

    /// Create a dummy span for compiler-generated nodes.
    pub fn dummy() -> Self {
        Self::default()
    }

    /// Merge two spans into one that covers both.
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The span as a `usize` range, for slicing and report labels.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start as usize..self.end as usize
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Human-facing source position (1-based line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Maps byte offsets of one source text to line/column positions.
///
/// Tabs advance the column to the next multiple of `tab_size`.
#[derive(Debug, Clone)]
pub struct LineMap {
    content: String,
    /// Byte offset at which each line starts; always begins with 0.
    line_starts: Vec<u32>,
    tab_size: u32,
}

impl LineMap {
    pub const DEFAULT_TAB_SIZE: u32 = 4;

    pub fn new(content: impl Into<String>) -> Self {
        Self::with_tab_size(content, Self::DEFAULT_TAB_SIZE)
    }

    pub fn with_tab_size(content: impl Into<String>, tab_size: u32) -> Self {
        let content = content.into();
        let line_starts = std::iter::once(0)
            .chain(
                content
                    .char_indices()
                    .filter(|&(_, c)| c == '\n')
                    .map(|(i, _)| i as u32 + 1),
            )
            .collect();
        Self {
            content,
            line_starts,
            tab_size: tab_size.max(1),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// 1-based line containing `offset`. Offsets past the end clamp to the last line.
    pub fn line_of(&self, offset: u32) -> u32 {
        match self.line_starts.binary_search(&offset) {
            Ok(index) => index as u32 + 1,
            Err(index) => index as u32,
        }
    }

    pub fn position_of(&self, offset: u32) -> Position {
        let line = self.line_of(offset);
        let line_start = self.line_starts[line as usize - 1] as usize;
        let end = (offset as usize).min(self.content.len());
        let mut column = 0;
        for c in self.content[line_start..end].chars() {
            column += match c {
                '\t' => self.tab_size - column % self.tab_size,
                _ => 1,
            };
        }
        Position {
            line,
            column: column + 1,
        }
    }

    /// The text of a 1-based line, without its trailing newline.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let index = line.checked_sub(1)? as usize;
        let start = *self.line_starts.get(index)? as usize;
        let end = self
            .line_starts
            .get(index + 1)
            .map(|&next| next as usize - 1)
            .unwrap_or(self.content.len());
        Some(self.content[start..end].trim_end_matches('\r'))
    }

    /// `name:line:col` for the start of `span`.
    pub fn describe(&self, name: &str, span: Span) -> String {
        format!("{}:{}", name, self.position_of(span.start))
    }
}
