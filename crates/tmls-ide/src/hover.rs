use std::fmt::Write as _;

use serde::Deserialize;
use serde::Serialize;
use tmls_codegen::BlockKind;
use tmls_codegen::LanguageKind;
use tmls_project::SymbolInfo;

use crate::DispatchError;
use crate::Feature;
use crate::LocalHandler;
use crate::LocalRequest;
use crate::Range;
use crate::RemapToHost;
use crate::ResponseMapper;

#[derive(Debug, Clone, Copy)]
pub struct HoverFeature;

impl Feature for HoverFeature {
    const NAME: &'static str = "hover";
    type Params = ();
    type Response = Hover;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hover {
    /// Markdown.
    pub contents: String,
    pub range: Option<Range>,
}

impl RemapToHost for Hover {
    fn remap_to_host(self, mapper: &ResponseMapper<'_>) -> Self {
        let range = self.range.and_then(|range| {
            let mapped = mapper.map_range(range);
            if mapped.is_none() {
                tracing::warn!(
                    kind = %mapper.language_kind(),
                    ?range,
                    "hover range does not map back to the host document"
                );
            }
            mapped
        });
        Self {
            contents: self.contents,
            range,
        }
    }
}

/// Answers hovers over template syntax itself.
///
/// Describes the block under the cursor. For a statement whose first word is
/// a symbol the workspace reported, the symbol's documentation is included.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateHoverService;

impl TemplateHoverService {
    fn describe_symbol(contents: &mut String, symbol: &SymbolInfo) {
        let _ = write!(contents, "\n\n**{}** ({:?})", symbol.name, symbol.kind);
        if let Some(documentation) = &symbol.documentation {
            let _ = write!(contents, "\n\n{documentation}");
        }
    }
}

impl LocalHandler<HoverFeature> for TemplateHoverService {
    fn owns(&self, kind: LanguageKind) -> bool {
        kind == LanguageKind::Template
    }

    fn handle(&self, request: LocalRequest<'_, ()>) -> Result<Option<Hover>, DispatchError> {
        let Some(block) = request.generated.block_at(request.projection.host_offset) else {
            return Ok(None);
        };
        let host = request
            .document
            .text()
            .map_err(|error| DispatchError::Failed(error.to_string()))?;

        let (open, close) = block.kind.delimiters();
        let mut contents = match block.kind {
            BlockKind::Expression => format!("`{open} {close}` expression"),
            BlockKind::Statement => format!("`{open} {close}` statement"),
            BlockKind::Comment => format!("`{open} {close}` comment"),
        };

        if block.kind == BlockKind::Statement {
            let word = host
                .text
                .get(block.content.as_range())
                .and_then(|content| content.split_whitespace().next());
            let symbol = word.and_then(|word| {
                request
                    .project
                    .workspace_state()
                    .and_then(|state| state.symbol(word))
            });
            if let Some(symbol) = symbol {
                Self::describe_symbol(&mut contents, symbol);
            }
        }

        Ok(Some(Hover {
            contents,
            range: Some(Range::from_span(block.span, &host.text, request.encoding)),
        }))
    }
}
