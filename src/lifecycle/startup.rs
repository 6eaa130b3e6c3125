//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Register the call routes
//! - Start background tasks (chat supervision, signal watch)
//! - Bind the listener and serve until shutdown, then drain
//!
//! # Design Decisions
//! - Fail fast on bad wiring (duplicate default, unloadable directory)
//! - A chat backend that is down at start-up is not fatal; the
//!   supervision loop keeps trying
//! - Listener starts last (traffic only when ready)

use std::sync::Arc;

use thiserror::Error;

use crate::chat::{ChatBackend, ChatError, ChatNotifier, SlackBackend};
use crate::config::Settings;
use crate::directory::{Directory, DirectoryError, JsonDirectory};
use crate::dispatch::Dispatcher;
use crate::handlers::{DemoHandler, ElevatorHandler, NoopHandler, WelcomeHandler};
use crate::lifecycle::signals::shutdown_on_signal;
use crate::lifecycle::Shutdown;
use crate::net::listener::ListenerError;
use crate::observability::metrics;
use crate::routing::{Matcher, RouteError};

/// Fatal start-up and serving errors.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("route registration failed: {0}")]
    Routes(#[from] RouteError),

    #[error("chat backend setup failed: {0}")]
    Chat(#[from] ChatError),

    #[error("directory could not be loaded: {0}")]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Register every route on a new dispatcher.
///
/// Order matters: first match wins, default last.
pub fn build_dispatcher<B>(
    settings: &Settings,
    notifier: Arc<ChatNotifier<B>>,
    directory: Option<Arc<dyn Directory>>,
    shutdown: Shutdown,
) -> Result<Dispatcher, StartupError>
where
    B: ChatBackend,
{
    let mut dispatcher = Dispatcher::with_shutdown(settings.agi.clone(), shutdown);

    dispatcher.register(Matcher::prefix("demo"), DemoHandler)?;
    dispatcher.register(Matcher::prefix("slack"), ElevatorHandler::new(notifier))?;
    if let Some(directory) = directory {
        dispatcher.register(Matcher::prefix("welcome"), WelcomeHandler::new(directory))?;
    }
    dispatcher.register_default(NoopHandler)?;

    Ok(dispatcher)
}

/// Run the bridge until a shutdown signal arrives.
pub async fn run(settings: Settings) -> Result<(), StartupError> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pbx-bridge starting");
    tracing::info!(
        bind_address = %settings.agi.bind_address,
        max_sessions = settings.agi.max_sessions,
        channel = %settings.slack.channel,
        "Configuration loaded"
    );

    if let Some(addr) = settings.metrics_address {
        metrics::init_metrics(addr);
    }

    let shutdown = Shutdown::new();

    let backend = SlackBackend::from_settings(&settings.slack)?;
    let notifier = Arc::new(ChatNotifier::from_settings(
        backend,
        &settings.slack,
        settings.reconnect,
    ));
    if let Err(e) = notifier.connect().await {
        tracing::warn!(error = %e, "Chat backend unavailable at start-up; will keep retrying");
    }

    let directory = match &settings.directory_file {
        Some(path) => Some(Arc::new(JsonDirectory::load(path)?) as Arc<dyn Directory>),
        None => None,
    };

    let dispatcher = build_dispatcher(&settings, Arc::clone(&notifier), directory, shutdown.clone())?;
    let tracker = dispatcher.tracker();
    let server = dispatcher.bind().await?;

    let chat_task = {
        let notifier = Arc::clone(&notifier);
        let signal = shutdown.subscribe();
        tokio::spawn(async move { notifier.run(signal).await })
    };
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let served = server.serve().await;
    // An accept failure ends serving without a signal; stop the chat loop too.
    shutdown.trigger();

    if let Err(e) = chat_task.await {
        tracing::warn!(error = %e, "Chat supervision task ended abnormally");
    }

    if tracker.wait_for_drain(settings.shutdown_grace).await {
        tracing::info!("All sessions finished");
    } else {
        tracing::warn!(
            remaining = tracker.active_count(),
            grace_secs = settings.shutdown_grace.as_secs(),
            "Grace period expired with sessions still running"
        );
    }

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}
