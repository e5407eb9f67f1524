use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// A byte offset within a text document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Offset(u32);

impl Offset {
    #[must_use]
    pub fn new(offset: u32) -> Self {
        Self(offset)
    }

    #[must_use]
    pub fn from_usize(offset: usize) -> Self {
        Self(u32::try_from(offset).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for Offset {
    fn from(offset: u32) -> Self {
        Self(offset)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A half-open byte range `[start, start + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    start: u32,
    length: u32,
}

impl Span {
    #[must_use]
    pub fn new(start: u32, length: u32) -> Self {
        Self { start, length }
    }

    #[must_use]
    pub fn from_parts(start: usize, length: usize) -> Self {
        let start_u32 = u32::try_from(start).unwrap_or(u32::MAX);
        let length_u32 = u32::try_from(length).unwrap_or(u32::MAX.saturating_sub(start_u32));
        Span::new(start_u32, length_u32)
    }

    /// Construct a span from integer bounds expressed as byte offsets.
    #[must_use]
    pub fn from_bounds(start: usize, end: usize) -> Self {
        Self::from_parts(start, end.saturating_sub(start))
    }

    #[must_use]
    pub fn start(self) -> u32 {
        self.start
    }

    #[must_use]
    pub fn end(self) -> u32 {
        self.start.saturating_add(self.length)
    }

    #[must_use]
    pub fn length(self) -> u32 {
        self.length
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.length == 0
    }

    #[must_use]
    pub fn start_offset(self) -> Offset {
        Offset(self.start)
    }

    #[must_use]
    pub fn end_offset(self) -> Offset {
        Offset(self.end())
    }

    /// Whether `offset` lies in `[start, end)`.
    #[must_use]
    pub fn contains(self, offset: Offset) -> bool {
        offset.0 >= self.start && offset.0 < self.end()
    }

    /// Whether `offset` lies in `[start, end]`.
    #[must_use]
    pub fn touches(self, offset: Offset) -> bool {
        offset.0 >= self.start && offset.0 <= self.end()
    }

    #[must_use]
    pub fn as_range(self) -> std::ops::Range<usize> {
        self.start as usize..self.end() as usize
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_half_open() {
        let span = Span::new(10, 10);
        assert!(!span.contains(Offset::new(9)));
        assert!(span.contains(Offset::new(10)));
        assert!(span.contains(Offset::new(19)));
        assert!(!span.contains(Offset::new(20)));
    }

    #[test]
    fn test_touches_includes_end() {
        let span = Span::new(10, 10);
        assert!(span.touches(Offset::new(20)));
        assert!(!span.touches(Offset::new(21)));
    }

    #[test]
    fn test_empty_span_touches_its_start() {
        let span = Span::new(4, 0);
        assert!(span.is_empty());
        assert!(!span.contains(Offset::new(4)));
        assert!(span.touches(Offset::new(4)));
    }

    #[test]
    fn test_from_bounds() {
        let span = Span::from_bounds(3, 8);
        assert_eq!(span.start(), 3);
        assert_eq!(span.length(), 5);
        assert_eq!(span.end(), 8);
        assert_eq!(span.to_string(), "[3, 8)");
    }
}
