use serde::Serialize;
use tmls_codegen::LanguageKind;
use tmls_project::DocumentSnapshot;
use tmls_source::LineCol;
use tmls_source::Offset;
use tmls_source::PositionEncoding;
use tmls_source::TextLoadError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    #[error("offset {offset} is outside the document (length {length})")]
    InvalidOffset { offset: Offset, length: u32 },

    #[error("position {}:{} is outside the document", position.line(), position.column())]
    InvalidPosition { position: LineCol },

    #[error(transparent)]
    Load(#[from] TextLoadError),
}

/// Where a host offset lands.
///
/// `host_position` is always computed from the host text. For
/// [`LanguageKind::Template`] the generated fields repeat the host ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub language_kind: LanguageKind,
    pub host_offset: Offset,
    pub host_position: LineCol,
    pub generated_offset: Offset,
    pub generated_position: LineCol,
}

/// Maps host positions into the generated document that owns them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectionEngine {
    encoding: PositionEncoding,
}

impl ProjectionEngine {
    #[must_use]
    pub fn new(encoding: PositionEncoding) -> Self {
        Self { encoding }
    }

    #[must_use]
    pub fn encoding(&self) -> PositionEncoding {
        self.encoding
    }

    pub fn project(
        &self,
        document: &DocumentSnapshot,
        offset: Offset,
    ) -> Result<Projection, ProjectionError> {
        let loaded = document.text()?;
        let text = &loaded.text;
        if offset.get() > text.length() {
            return Err(ProjectionError::InvalidOffset {
                offset,
                length: text.length(),
            });
        }

        let generated = document.generated_document()?;
        let host_position = self
            .encoding
            .offset_to_line_col(text.line_index(), offset, text.as_str());

        let (language_kind, generated_offset) = generated.classify(offset);
        let generated_position = match generated.output(language_kind) {
            Some(output) if language_kind.is_embedded() => {
                let generated_text = output.text();
                self.encoding.offset_to_line_col(
                    generated_text.line_index(),
                    generated_offset,
                    generated_text.as_str(),
                )
            }
            _ => host_position,
        };

        tracing::trace!(
            document = %document.key(),
            version = document.version(),
            %offset,
            kind = %language_kind,
            %generated_offset,
            "projected offset"
        );

        Ok(Projection {
            language_kind,
            host_offset: offset,
            host_position,
            generated_offset,
            generated_position,
        })
    }

    /// Projects an editor position given in host line/column coordinates.
    pub fn project_position(
        &self,
        document: &DocumentSnapshot,
        position: LineCol,
    ) -> Result<Projection, ProjectionError> {
        let loaded = document.text()?;
        let text = &loaded.text;
        let offset = self
            .encoding
            .line_col_to_offset(text.line_index(), position, text.as_str())
            .ok_or(ProjectionError::InvalidPosition { position })?;
        self.project(document, offset)
    }
}
