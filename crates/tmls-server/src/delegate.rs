//! Forwarding of delegated requests to the editor.
//!
//! The editor owns the language servers for the embedded languages, so a
//! delegated request goes back to it as a custom request naming the
//! generated document. Answers come back in generated coordinates and are
//! converted into the `tmls-ide` response types here.

use async_trait::async_trait;
use tmls_ide::DefinitionFeature;
use tmls_ide::DelegatedHandler;
use tmls_ide::DelegatedRequest;
use tmls_ide::DispatchError;
use tmls_ide::Hover;
use tmls_ide::HoverFeature;
use tmls_ide::Location;
use tower_lsp_server::ls_types;

use crate::client;
use crate::ext::LspRangeExt;
use crate::ext::RangeExt;
use crate::ext::UriExt;

pub enum DelegatedHover {}

impl ls_types::request::Request for DelegatedHover {
    type Params = DelegatedRequest<()>;
    type Result = Option<ls_types::Hover>;
    const METHOD: &'static str = "tmls/delegatedHover";
}

pub enum DelegatedDefinition {}

impl ls_types::request::Request for DelegatedDefinition {
    type Params = DelegatedRequest<()>;
    type Result = Option<ls_types::GotoDefinitionResponse>;
    const METHOD: &'static str = "tmls/delegatedDefinition";
}

/// Sends delegated requests to the connected editor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientDelegate;

impl ClientDelegate {
    async fn send<R>(request: R::Params) -> Result<R::Result, DispatchError>
    where
        R: ls_types::request::Request,
        R::Params: Send + 'static,
        R::Result: Send + 'static,
    {
        if !client::is_initialized() {
            return Err(DispatchError::Unreachable(R::METHOD.to_string()));
        }
        client::send_request::<R>(request)
            .await
            .map_err(|error| DispatchError::Failed(format!("{}: {error}", R::METHOD)))
    }
}

#[async_trait]
impl DelegatedHandler<HoverFeature> for ClientDelegate {
    async fn handle(&self, request: DelegatedRequest<()>) -> Result<Option<Hover>, DispatchError> {
        let response = Self::send::<DelegatedHover>(request).await?;
        Ok(response.map(hover_from_lsp))
    }
}

#[async_trait]
impl DelegatedHandler<DefinitionFeature> for ClientDelegate {
    async fn handle(
        &self,
        request: DelegatedRequest<()>,
    ) -> Result<Option<Vec<Location>>, DispatchError> {
        let response = Self::send::<DelegatedDefinition>(request).await?;
        Ok(response.map(locations_from_lsp))
    }
}

pub(crate) fn hover_from_lsp(hover: ls_types::Hover) -> Hover {
    fn marked(string: ls_types::MarkedString) -> String {
        match string {
            ls_types::MarkedString::String(text) => text,
            ls_types::MarkedString::LanguageString(code) => {
                format!("```{}\n{}\n```", code.language, code.value)
            }
        }
    }

    let contents = match hover.contents {
        ls_types::HoverContents::Scalar(string) => marked(string),
        ls_types::HoverContents::Array(strings) => strings
            .into_iter()
            .map(marked)
            .collect::<Vec<_>>()
            .join("\n\n"),
        ls_types::HoverContents::Markup(markup) => markup.value,
    };

    Hover {
        contents,
        range: hover.range.map(|range| range.to_range()),
    }
}

pub(crate) fn hover_to_lsp(hover: Hover) -> ls_types::Hover {
    ls_types::Hover {
        contents: ls_types::HoverContents::Markup(ls_types::MarkupContent {
            kind: ls_types::MarkupKind::Markdown,
            value: hover.contents,
        }),
        range: hover.range.map(|range| range.to_lsp()),
    }
}

/// Non-file locations cannot be expressed as host paths and are skipped.
pub(crate) fn locations_from_lsp(response: ls_types::GotoDefinitionResponse) -> Vec<Location> {
    let targets: Vec<(ls_types::Uri, ls_types::Range)> = match response {
        ls_types::GotoDefinitionResponse::Scalar(location) => vec![(location.uri, location.range)],
        ls_types::GotoDefinitionResponse::Array(locations) => locations
            .into_iter()
            .map(|location| (location.uri, location.range))
            .collect(),
        ls_types::GotoDefinitionResponse::Link(links) => links
            .into_iter()
            .map(|link| (link.target_uri, link.target_selection_range))
            .collect(),
    };

    targets
        .into_iter()
        .filter_map(|(uri, range)| {
            let path = uri.to_utf8_path_buf().or_else(|| {
                tracing::debug!(uri = uri.as_str(), "skipping non-file definition");
                None
            })?;
            Some(Location {
                path,
                range: range.to_range(),
            })
        })
        .collect()
}

pub(crate) fn locations_to_lsp(locations: Vec<Location>) -> ls_types::GotoDefinitionResponse {
    ls_types::GotoDefinitionResponse::Array(
        locations
            .into_iter()
            .filter_map(|location| {
                let uri = ls_types::Uri::from_path(&location.path)?;
                Some(ls_types::Location::new(uri, location.range.to_lsp()))
            })
            .collect(),
    )
}
