use std::fmt::Display;
use std::sync::Arc;
use std::sync::OnceLock;

use tower_lsp_server::jsonrpc::Error;
use tower_lsp_server::ls_types;
use tower_lsp_server::Client;

static CLIENT: OnceLock<Arc<Client>> = OnceLock::new();

/// Installs the process-wide client handle. Later calls are ignored.
pub fn init_client(client: Client) {
    if CLIENT.set(Arc::new(client)).is_err() {
        tracing::warn!("client was already initialized");
    }
}

fn get_client() -> Option<Arc<Client>> {
    CLIENT.get().cloned()
}

#[must_use]
pub fn is_initialized() -> bool {
    CLIENT.get().is_some()
}

/// Generates a fire-and-forget notification function that spawns an async task.
///
/// ```rust,ignore
/// notify!(log_message, message_type: MessageType, message: impl Display + Send + 'static);
/// ```
macro_rules! notify {
    ($name:ident, $($param:ident: $type:ty),*) => {
        pub fn $name($($param: $type),*) {
            if let Some(client) = get_client() {
                tokio::spawn(async move {
                    client.$name($($param),*).await;
                });
            }
        }
    };
}

notify!(log_message, message_type: ls_types::MessageType, message: impl Display + Send + 'static);
notify!(publish_diagnostics, uri: ls_types::Uri, diagnostics: Vec<ls_types::Diagnostic>, version: Option<i32>);

/// Sends a custom notification without waiting for delivery.
pub fn send_notification<N>(params: N::Params)
where
    N: ls_types::notification::Notification,
    N::Params: Send + 'static,
{
    if let Some(client) = get_client() {
        tokio::spawn(async move {
            client.send_notification::<N>(params).await;
        });
    }
}

/// Sends a request to the client and waits for the answer. Fails with an
/// internal error before the client is initialized.
pub async fn send_request<R>(params: R::Params) -> Result<R::Result, Error>
where
    R: ls_types::request::Request,
    R::Params: Send + 'static,
    R::Result: Send + 'static,
{
    if let Some(client) = get_client() {
        client.send_request::<R>(params).await
    } else {
        Err(Error::internal_error())
    }
}
