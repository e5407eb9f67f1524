use serde::Deserialize;
use serde::Serialize;
use tmls_source::LineCol;
use tmls_source::PositionEncoding;
use tmls_source::SourceText;
use tmls_source::Span;

/// A line/column range in some document, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: LineCol,
    pub end: LineCol,
}

impl Range {
    #[must_use]
    pub fn new(start: LineCol, end: LineCol) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn from_span(span: Span, text: &SourceText, encoding: PositionEncoding) -> Self {
        let index = text.line_index();
        Self {
            start: encoding.offset_to_line_col(index, span.start_offset(), text.as_str()),
            end: encoding.offset_to_line_col(index, span.end_offset(), text.as_str()),
        }
    }

    /// The byte span this range covers in `text`, or `None` if either end
    /// lies past the last line or the range is inverted.
    #[must_use]
    pub fn to_span(self, text: &SourceText, encoding: PositionEncoding) -> Option<Span> {
        let index = text.line_index();
        let start = encoding.line_col_to_offset(index, self.start, text.as_str())?;
        let end = encoding.line_col_to_offset(index, self.end, text.as_str())?;
        (start <= end).then(|| Span::from_bounds(start.as_usize(), end.as_usize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_conversion() {
        let text = SourceText::new("ab\ncdé\nf");
        let span = Span::from_bounds(4, 8);

        let range = Range::from_span(span, &text, PositionEncoding::Utf16);
        assert_eq!(range, Range::new(LineCol::new(1, 1), LineCol::new(2, 0)));
        assert_eq!(range.to_span(&text, PositionEncoding::Utf16), Some(span));
    }

    #[test]
    fn test_unresolvable_ranges() {
        let text = SourceText::new("one line");
        let past_end = Range::new(LineCol::new(0, 0), LineCol::new(4, 0));
        let inverted = Range::new(LineCol::new(0, 5), LineCol::new(0, 1));

        assert_eq!(past_end.to_span(&text, PositionEncoding::Utf8), None);
        assert_eq!(inverted.to_span(&text, PositionEncoding::Utf8), None);
    }
}
