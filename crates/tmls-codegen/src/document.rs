use serde::Serialize;
use tmls_source::Offset;
use tmls_source::SourceText;
use tmls_source::Span;

use crate::BlockKind;
use crate::LanguageKind;

/// Relates a host span to a generated span of the same shape.
///
/// Offsets inside the host span translate by a fixed delta: the distance
/// from the host start is preserved and the base is swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceMapping {
    pub host: Span,
    pub generated: Span,
}

impl SourceMapping {
    #[must_use]
    pub fn new(host: Span, generated: Span) -> Self {
        Self { host, generated }
    }

    fn to_generated(self, host_offset: Offset) -> Option<Offset> {
        if !self.host.contains(host_offset) {
            return None;
        }
        let delta = host_offset.get() - self.host.start();
        Some(Offset::new(
            self.generated.start().saturating_add(delta).min(self.generated.end()),
        ))
    }

    fn to_host(self, generated_offset: Offset) -> Offset {
        let delta = generated_offset.get().saturating_sub(self.generated.start());
        Offset::new(self.host.start().saturating_add(delta).min(self.host.end()))
    }
}

/// The generated document for one embedded language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedOutput {
    kind: LanguageKind,
    text: SourceText,
    mappings: Vec<SourceMapping>,
}

impl GeneratedOutput {
    #[must_use]
    pub fn new(kind: LanguageKind, text: impl Into<String>, mut mappings: Vec<SourceMapping>) -> Self {
        mappings.sort_by_key(|mapping| mapping.host.start());
        Self {
            kind,
            text: SourceText::new(text),
            mappings,
        }
    }

    #[must_use]
    pub fn kind(&self) -> LanguageKind {
        self.kind
    }

    #[must_use]
    pub fn text(&self) -> &SourceText {
        &self.text
    }

    #[must_use]
    pub fn mappings(&self) -> &[SourceMapping] {
        &self.mappings
    }

    fn map_to_host_start(&self, generated_offset: Offset) -> Option<Offset> {
        self.mappings
            .iter()
            .find(|mapping| mapping.generated.contains(generated_offset))
            .or_else(|| {
                self.mappings
                    .iter()
                    .find(|mapping| mapping.generated.end_offset() == generated_offset)
            })
            .map(|mapping| mapping.to_host(generated_offset))
    }

    fn map_to_host_end(&self, generated_offset: Offset) -> Option<Offset> {
        self.mappings
            .iter()
            .find(|mapping| {
                generated_offset.get() > mapping.generated.start()
                    && generated_offset.get() <= mapping.generated.end()
            })
            .map(|mapping| mapping.to_host(generated_offset))
            .or_else(|| self.map_to_host_start(generated_offset))
    }
}

/// A recognized template construct in the host text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemplateBlock {
    pub kind: BlockKind,
    /// The whole block, delimiters included.
    pub span: Span,
    /// The text between the delimiters.
    pub content: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationDiagnostic {
    pub span: Span,
    pub message: String,
}

/// Everything a generator produced for one host document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    host_length: u32,
    outputs: Vec<GeneratedOutput>,
    blocks: Vec<TemplateBlock>,
    diagnostics: Vec<GenerationDiagnostic>,
}

impl GeneratedDocument {
    #[must_use]
    pub fn new(host_length: u32) -> Self {
        Self {
            host_length,
            outputs: Vec::new(),
            blocks: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_output(mut self, output: GeneratedOutput) -> Self {
        self.outputs.retain(|existing| existing.kind != output.kind);
        self.outputs.push(output);
        self
    }

    #[must_use]
    pub fn with_blocks(mut self, blocks: Vec<TemplateBlock>) -> Self {
        self.blocks = blocks;
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Vec<GenerationDiagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn host_length(&self) -> u32 {
        self.host_length
    }

    #[must_use]
    pub fn output(&self, kind: LanguageKind) -> Option<&GeneratedOutput> {
        self.outputs.iter().find(|output| output.kind == kind)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &GeneratedOutput> {
        self.outputs.iter()
    }

    #[must_use]
    pub fn blocks(&self) -> &[TemplateBlock] {
        &self.blocks
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[GenerationDiagnostic] {
        &self.diagnostics
    }

    /// The template block containing `offset`, if any.
    #[must_use]
    pub fn block_at(&self, offset: Offset) -> Option<&TemplateBlock> {
        self.blocks.iter().find(|block| block.span.contains(offset))
    }

    /// Which language owns `offset`, and where it lands in that language's
    /// generated output.
    ///
    /// Offsets no mapping claims belong to [`LanguageKind::Template`] and are
    /// returned untranslated.
    #[must_use]
    pub fn classify(&self, offset: Offset) -> (LanguageKind, Offset) {
        self.outputs
            .iter()
            .find_map(|output| {
                output
                    .mappings
                    .iter()
                    .find_map(|mapping| mapping.to_generated(offset))
                    .map(|generated| (output.kind, generated))
            })
            .unwrap_or((LanguageKind::Template, offset))
    }

    /// Map an offset in `kind`'s generated output back to the host text.
    #[must_use]
    pub fn map_to_host_offset(&self, kind: LanguageKind, generated: Offset) -> Option<Offset> {
        self.output(kind)?.map_to_host_start(generated)
    }

    /// Map a generated range back to the host text. Both ends must map.
    #[must_use]
    pub fn map_to_host_range(&self, kind: LanguageKind, generated: Span) -> Option<Span> {
        let output = self.output(kind)?;
        let start = output.map_to_host_start(generated.start_offset())?;
        let end = if generated.is_empty() {
            start
        } else {
            output.map_to_host_end(generated.end_offset())?
        };
        if end < start {
            return None;
        }
        Some(Span::from_bounds(start.as_usize(), end.as_usize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_span_document() -> GeneratedDocument {
        GeneratedDocument::new(40).with_output(GeneratedOutput::new(
            LanguageKind::Code,
            "0123456789",
            vec![SourceMapping::new(Span::new(10, 10), Span::new(0, 10))],
        ))
    }

    #[test]
    fn test_classify_inside_span() {
        let document = single_span_document();
        for k in 0..10 {
            assert_eq!(
                document.classify(Offset::new(10 + k)),
                (LanguageKind::Code, Offset::new(k))
            );
        }
    }

    #[test]
    fn test_classify_outside_span_is_template() {
        let document = single_span_document();
        assert_eq!(
            document.classify(Offset::new(9)),
            (LanguageKind::Template, Offset::new(9))
        );
        assert_eq!(
            document.classify(Offset::new(20)),
            (LanguageKind::Template, Offset::new(20))
        );
    }

    #[test]
    fn test_round_trip_through_inverse() {
        let document = single_span_document();
        for k in 0..10 {
            let host = Offset::new(10 + k);
            let (kind, generated) = document.classify(host);
            assert_eq!(document.map_to_host_offset(kind, generated), Some(host));
        }
    }

    #[test]
    fn test_generated_span_end_maps_to_host_end() {
        let document = single_span_document();
        assert_eq!(
            document.map_to_host_offset(LanguageKind::Code, Offset::new(10)),
            Some(Offset::new(20))
        );
        assert_eq!(
            document.map_to_host_offset(LanguageKind::Code, Offset::new(11)),
            None
        );
    }

    #[test]
    fn test_map_range_back() {
        let document = single_span_document();
        assert_eq!(
            document.map_to_host_range(LanguageKind::Code, Span::from_bounds(2, 8)),
            Some(Span::from_bounds(12, 18))
        );
        assert_eq!(
            document.map_to_host_range(LanguageKind::Code, Span::from_bounds(0, 10)),
            Some(Span::from_bounds(10, 20))
        );
    }

    #[test]
    fn test_map_range_outside_any_span() {
        let document = single_span_document();
        assert_eq!(
            document.map_to_host_range(LanguageKind::Code, Span::from_bounds(8, 12)),
            None
        );
        assert_eq!(
            document.map_to_host_range(LanguageKind::Markup, Span::from_bounds(0, 1)),
            None
        );
    }

    #[test]
    fn test_range_end_prefers_span_ending_there() {
        // Two generated spans back to back: [0,3) and [3,6).
        let document = GeneratedDocument::new(30).with_output(GeneratedOutput::new(
            LanguageKind::Code,
            "abcdef",
            vec![
                SourceMapping::new(Span::new(5, 3), Span::new(0, 3)),
                SourceMapping::new(Span::new(20, 3), Span::new(3, 3)),
            ],
        ));

        assert_eq!(
            document.map_to_host_range(LanguageKind::Code, Span::from_bounds(0, 3)),
            Some(Span::from_bounds(5, 8))
        );
        assert_eq!(
            document.map_to_host_offset(LanguageKind::Code, Offset::new(3)),
            Some(Offset::new(20))
        );
    }

    #[test]
    fn test_with_output_replaces_same_kind() {
        let document = single_span_document().with_output(GeneratedOutput::new(
            LanguageKind::Code,
            "",
            Vec::new(),
        ));
        assert_eq!(document.outputs().count(), 1);
        assert!(document
            .output(LanguageKind::Code)
            .is_some_and(|output| output.mappings().is_empty()));
    }
}
