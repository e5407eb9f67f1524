use std::ops::Deref;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::LineIndex;

/// Immutable, cheaply clonable document text with its line index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText(Arc<SourceTextInner>);

#[derive(Debug, PartialEq, Eq)]
struct SourceTextInner {
    source: String,
    line_index: LineIndex,
}

impl SourceText {
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let line_index = LineIndex::from_text(&source);
        Self(Arc::new(SourceTextInner { source, line_index }))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0.source
    }

    #[must_use]
    pub fn line_index(&self) -> &LineIndex {
        &self.0.line_index
    }

    /// Length of the text in bytes.
    #[must_use]
    pub fn length(&self) -> u32 {
        self.0.line_index.length()
    }

    /// Whether two handles share the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for SourceText {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl AsRef<str> for SourceText {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for SourceText {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for SourceText {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

/// The encoding a text loader reports for the content it produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextEncoding {
    Ascii,
    Utf8,
}

impl TextEncoding {
    #[must_use]
    pub fn detect(source: &str) -> Self {
        if source.is_ascii() {
            TextEncoding::Ascii
        } else {
            TextEncoding::Utf8
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_allocation() {
        let text = SourceText::new("hello");
        let clone = text.clone();
        assert!(text.ptr_eq(&clone));
        assert!(!text.ptr_eq(&SourceText::new("hello")));
        assert_eq!(text, SourceText::new("hello"));
    }

    #[test]
    fn test_length_is_bytes() {
        assert_eq!(SourceText::new("é").length(), 2);
    }

    #[test]
    fn test_detect_encoding() {
        assert_eq!(TextEncoding::detect("plain"), TextEncoding::Ascii);
        assert_eq!(TextEncoding::detect("café"), TextEncoding::Utf8);
    }
}
