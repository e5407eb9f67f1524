//! In-memory content of the documents the editor has open.

use std::sync::Arc;

use anyhow::anyhow;
use anyhow::Result;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use tmls_source::FxDashMap;
use tmls_source::PositionEncoding;
use tmls_source::SourceText;
use tower_lsp_server::ls_types::TextDocumentContentChangeEvent;

use crate::ext::PositionExt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    text: SourceText,
    version: i32,
}

impl TextDocument {
    #[must_use]
    pub fn new(content: impl Into<String>, version: i32) -> Self {
        Self {
            text: SourceText::new(content),
            version,
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        self.text.as_str()
    }

    #[must_use]
    pub fn text(&self) -> &SourceText {
        &self.text
    }

    #[must_use]
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Applies `changes` in order, each against the result of the previous
    /// one. On error the document is left as it was.
    pub fn apply_changes(
        &mut self,
        changes: &[TextDocumentContentChangeEvent],
        version: i32,
        encoding: PositionEncoding,
    ) -> Result<()> {
        let mut text = self.text.clone();

        for change in changes {
            let Some(range) = change.range else {
                text = SourceText::new(change.text.as_str());
                continue;
            };

            let index = text.line_index();
            let start = encoding
                .line_col_to_offset(index, range.start.to_line_col(), text.as_str())
                .ok_or_else(|| anyhow!("invalid start position: {:?}", range.start))?;
            let end = encoding
                .line_col_to_offset(index, range.end.to_line_col(), text.as_str())
                .ok_or_else(|| anyhow!("invalid end position: {:?}", range.end))?;
            if start > end {
                return Err(anyhow!("inverted range: {range:?}"));
            }

            let mut content = text.as_str().to_string();
            content.replace_range(start.as_usize()..end.as_usize(), &change.text);
            text = SourceText::new(content);
        }

        self.text = text;
        self.version = version;
        Ok(())
    }
}

/// Open documents, keyed by cleaned absolute path.
///
/// Cloning shares the underlying map.
#[derive(Clone, Debug, Default)]
pub struct Buffers {
    inner: Arc<FxDashMap<Utf8PathBuf, TextDocument>>,
}

impl Buffers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, path: Utf8PathBuf, document: TextDocument) {
        self.inner.insert(path, document);
    }

    /// Applies changes to an open document and returns its new state.
    pub fn update(
        &self,
        path: &Utf8Path,
        changes: &[TextDocumentContentChangeEvent],
        version: i32,
        encoding: PositionEncoding,
    ) -> Result<TextDocument> {
        let mut entry = self
            .inner
            .get_mut(path)
            .ok_or_else(|| anyhow!("document is not open: {path}"))?;
        entry.apply_changes(changes, version, encoding)?;
        Ok(entry.clone())
    }

    pub fn close(&self, path: &Utf8Path) -> Option<TextDocument> {
        self.inner.remove(path).map(|(_, document)| document)
    }

    #[must_use]
    pub fn get(&self, path: &Utf8Path) -> Option<TextDocument> {
        self.inner.get(path).map(|entry| entry.clone())
    }

    #[must_use]
    pub fn contains(&self, path: &Utf8Path) -> bool {
        self.inner.contains_key(path)
    }

    #[must_use]
    pub fn paths(&self) -> Vec<Utf8PathBuf> {
        self.inner.iter().map(|entry| entry.key().clone()).collect()
    }
}
