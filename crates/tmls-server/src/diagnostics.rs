use std::sync::Arc;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use tmls_ide::CancellationToken;
use tmls_ide::Range;
use tmls_source::PositionEncoding;
use tokio::sync::broadcast::error::RecvError;
use tower_lsp_server::ls_types;

use crate::client;
use crate::ext::RangeExt;
use crate::ext::UriExt;
use crate::workspace::Buffers;
use crate::workspace::ProjectManager;
use crate::workspace::WorkspaceChange;

pub const SOURCE_NAME: &str = "tmls";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Publication {
    pub path: Utf8PathBuf,
    pub diagnostics: Vec<ls_types::Diagnostic>,
    pub version: Option<i32>,
}

/// Republishes generator diagnostics whenever the workspace changes, until
/// `shutdown` fires.
pub(crate) async fn run(
    manager: Arc<ProjectManager>,
    buffers: Buffers,
    encoding: PositionEncoding,
    shutdown: CancellationToken,
) {
    let mut receiver = manager.subscribe();
    loop {
        let received = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            received = receiver.recv() => received,
        };

        let paths = match received {
            Ok(change) => affected_paths(&change, &buffers),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "diagnostics fell behind, refreshing every open document");
                buffers.paths()
            }
            Err(RecvError::Closed) => break,
        };

        for path in paths {
            let publication = collect(&manager, &buffers, encoding, &path);
            let Some(uri) = ls_types::Uri::from_path(&publication.path) else {
                continue;
            };
            client::publish_diagnostics(uri, publication.diagnostics, publication.version);
        }
    }
    tracing::debug!("diagnostics task stopped");
}

/// Documents whose diagnostics a change may have touched. Project-wide
/// changes touch every open document.
pub(crate) fn affected_paths(change: &WorkspaceChange, buffers: &Buffers) -> Vec<Utf8PathBuf> {
    match &change.document_path {
        Some(path) => vec![path.clone()],
        None => buffers.paths(),
    }
}

/// Diagnostics for an open document, or an empty list that clears whatever
/// the client shows for a document that is not open.
pub(crate) fn collect(
    manager: &ProjectManager,
    buffers: &Buffers,
    encoding: PositionEncoding,
    path: &Utf8Path,
) -> Publication {
    let cleared = Publication {
        path: path.to_path_buf(),
        diagnostics: Vec::new(),
        version: None,
    };
    let Some(buffer) = buffers.get(path) else {
        return cleared;
    };
    let Some(document) = manager.store().find_document(path) else {
        return cleared;
    };

    let loaded = document.text().and_then(|text| {
        document
            .generated_document()
            .map(|generated| (text, generated))
    });
    let (text, generated) = match loaded {
        Ok(loaded) => loaded,
        Err(error) => {
            tracing::error!(%path, %error, "cannot compute diagnostics");
            return cleared;
        }
    };

    let diagnostics = generated
        .diagnostics()
        .iter()
        .map(|diagnostic| ls_types::Diagnostic {
            range: Range::from_span(diagnostic.span, &text.text, encoding).to_lsp(),
            severity: Some(ls_types::DiagnosticSeverity::ERROR),
            source: Some(SOURCE_NAME.to_string()),
            message: diagnostic.message.clone(),
            ..Default::default()
        })
        .collect();

    Publication {
        path: path.to_path_buf(),
        diagnostics,
        version: Some(buffer.version()),
    }
}
