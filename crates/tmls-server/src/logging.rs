//! Tracing setup for the server process.
//!
//! Events go to a daily-rotated file in the system temp directory and, from
//! INFO up (DEBUG up with `debug = true`), to the client's log via
//! [`LspLayer`]. TRACE never reaches the client.

use std::sync::Arc;

use tower_lsp_server::ls_types::MessageType;
use tracing::field::Visit;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;

pub const LOG_FILE_NAME: &str = "tmls.log";

/// A tracing layer that forwards events to the LSP client.
pub struct LspLayer {
    send_message: Arc<dyn Fn(MessageType, String) + Send + Sync>,
}

impl LspLayer {
    pub fn new<F>(send_message: F) -> Self
    where
        F: Fn(MessageType, String) + Send + Sync + 'static,
    {
        Self {
            send_message: Arc::new(send_message),
        }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }
}

impl<S> Layer<S> for LspLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let Some(message_type) = message_type(*event.metadata().level()) else {
            return;
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        if let Some(message) = visitor.message {
            (self.send_message)(message_type, message);
        }
    }
}

fn message_type(level: Level) -> Option<MessageType> {
    match level {
        Level::ERROR => Some(MessageType::ERROR),
        Level::WARN => Some(MessageType::WARNING),
        Level::INFO => Some(MessageType::INFO),
        Level::DEBUG => Some(MessageType::LOG),
        Level::TRACE => None,
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` wins for the file layer; otherwise it logs at `info`, or `debug`
/// when `debug` is set. The returned guard must outlive the server or
/// buffered file output is lost.
pub fn init_tracing<F>(send_message: F, debug: bool) -> WorkerGuard
where
    F: Fn(MessageType, String) + Send + Sync + 'static,
{
    let file_appender = tracing_appender::rolling::daily(std::env::temp_dir(), LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter);

    let client_level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let lsp_layer = LspLayer::new(send_message).with_filter(client_level);

    if let Err(error) = Registry::default().with(file_layer).with(lsp_layer).try_init() {
        eprintln!("tracing subscriber already installed: {error}");
    }

    guard
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    #[test]
    fn test_layer_forwards_messages_by_level() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let layer = LspLayer::new(move |kind, message| {
            sink.lock().unwrap().push((kind, message));
        });
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("careful");
            tracing::debug!(count = 3, "counted");
            tracing::trace!("hidden");
        });

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (MessageType::WARNING, "careful".to_string()),
                (MessageType::LOG, "counted".to_string()),
            ]
        );
    }
}
