use serde::Deserialize;
use serde::Serialize;

use crate::Offset;

/// A zero-based line and column position within a text document.
///
/// The unit of `column` depends on the [`PositionEncoding`] it was produced
/// with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineCol {
    line: u32,
    column: u32,
}

impl LineCol {
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub fn column(&self) -> u32 {
        self.column
    }
}

/// How editor columns are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PositionEncoding {
    Utf8,
    #[default]
    Utf16,
    Utf32,
}

impl PositionEncoding {
    fn width(self, c: char) -> u32 {
        let width = match self {
            PositionEncoding::Utf8 => c.len_utf8(),
            PositionEncoding::Utf16 => c.len_utf16(),
            PositionEncoding::Utf32 => 1,
        };
        u32::try_from(width).unwrap_or(0)
    }

    /// Convert an editor position to a byte offset.
    ///
    /// Columns past the end of a line resolve to the end of that line. A line
    /// past the end of the document yields `None`.
    #[must_use]
    pub fn line_col_to_offset(
        self,
        index: &LineIndex,
        line_col: LineCol,
        text: &str,
    ) -> Option<Offset> {
        let line_start = *index.line_starts.get(line_col.line() as usize)?;
        let line_end = index.line_end(line_col.line());
        let line_text = text.get(line_start as usize..line_end as usize)?;

        let mut column = 0;
        let mut bytes = 0;
        for c in line_text.chars() {
            if column >= line_col.column() || c == '\n' || c == '\r' {
                break;
            }
            column += self.width(c);
            bytes += u32::try_from(c.len_utf8()).unwrap_or(0);
        }

        Some(Offset::new(line_start + bytes))
    }

    /// Convert a byte offset to an editor position.
    ///
    /// Offsets past the end of the text are treated as the end of the text.
    #[must_use]
    pub fn offset_to_line_col(self, index: &LineIndex, offset: Offset, text: &str) -> LineCol {
        let offset = offset.get().min(index.length);
        let line = index.line_of(offset);
        let line_start = index.line_starts.get(line).copied().unwrap_or(0);

        let column = text
            .get(line_start as usize..offset as usize)
            .map_or(offset - line_start, |prefix| {
                prefix.chars().map(|c| self.width(c)).sum()
            });

        LineCol::new(u32::try_from(line).unwrap_or(u32::MAX), column)
    }
}

/// Pre-computed line start offsets for position/offset conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<u32>,
    length: u32,
}

impl LineIndex {
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut line_starts = vec![0];
        let mut pos = 0u32;

        for c in text.chars() {
            pos += u32::try_from(c.len_utf8()).unwrap_or(0);
            if c == '\n' {
                line_starts.push(pos);
            }
        }

        Self {
            line_starts,
            length: pos,
        }
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    #[must_use]
    pub fn length(&self) -> u32 {
        self.length
    }

    #[must_use]
    pub fn line_start(&self, line: u32) -> Option<Offset> {
        self.line_starts.get(line as usize).copied().map(Offset::new)
    }

    fn line_end(&self, line: u32) -> u32 {
        self.line_starts
            .get(line as usize + 1)
            .copied()
            .unwrap_or(self.length)
    }

    fn line_of(&self, offset: u32) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        }
    }
}
