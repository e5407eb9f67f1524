mod client;
mod delegate;
mod diagnostics;
mod ext;
mod generated;
mod logging;
mod server;
mod session;
pub mod workspace;

use anyhow::Result;
use tower_lsp_server::LspService;
use tower_lsp_server::Server;

pub use crate::delegate::ClientDelegate;
pub use crate::delegate::DelegatedDefinition;
pub use crate::delegate::DelegatedHover;
pub use crate::generated::GeneratedDocumentUpdate;
pub use crate::generated::UpdateGeneratedDocument;
pub use crate::server::TemplateLanguageServer;
pub use crate::session::project_configuration;
pub use crate::session::Session;

/// Serves the language server over stdio until the client disconnects.
pub async fn run(debug: bool) -> Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(|client| {
        client::init_client(client);
        TemplateLanguageServer::new(debug)
    });

    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}
