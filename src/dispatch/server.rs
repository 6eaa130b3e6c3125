//! FastAGI dispatcher.
//!
//! # Responsibilities
//! - Own the route table until serving starts, then freeze it
//! - Accept sessions and run each on its own task
//! - Catch handler errors and panics at the session boundary
//! - Stop accepting on shutdown while in-flight calls finish

use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::agi::{AgiRequest, AgiSession, CallSession};
use crate::config::schema::AgiSettings;
use crate::dispatch::handler::{CallContext, Handler};
use crate::lifecycle::Shutdown;
use crate::net::connection::{SessionGuard, SessionTracker};
use crate::net::listener::{Listener, ListenerError};
use crate::observability::{metrics, tracing::session_span};
use crate::routing::{Matcher, RouteError, RouteTable, Router};

/// How a single session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Handler returned normally.
    Completed,
    /// Remote party hung up mid-call.
    Terminated,
    /// Handler returned an error.
    Failed,
    /// Handler panicked.
    Panicked,
    /// No route and no default; the session was closed untouched.
    Unrouted,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Completed => "completed",
            SessionOutcome::Terminated => "terminated",
            SessionOutcome::Failed => "failed",
            SessionOutcome::Panicked => "panicked",
            SessionOutcome::Unrouted => "unrouted",
        }
    }
}

/// Routes inbound call-control sessions to handlers.
pub struct Dispatcher {
    settings: AgiSettings,
    routes: RouteTable,
    shutdown: Shutdown,
    tracker: SessionTracker,
}

impl Dispatcher {
    pub fn new(settings: AgiSettings) -> Self {
        Self::with_shutdown(settings, Shutdown::new())
    }

    /// Create a dispatcher that stops when `shutdown` is triggered.
    pub fn with_shutdown(settings: AgiSettings, shutdown: Shutdown) -> Self {
        Self {
            settings,
            routes: RouteTable::new(),
            shutdown,
            tracker: SessionTracker::new(),
        }
    }

    /// Append a route. First registered match wins.
    pub fn register<H>(&mut self, matcher: Matcher, handler: H) -> Result<(), RouteError>
    where
        H: Handler + 'static,
    {
        self.routes.register(matcher, Arc::new(handler))
    }

    /// Register the fallback handler; a second registration is an error.
    pub fn register_default<H>(&mut self, handler: H) -> Result<(), RouteError>
    where
        H: Handler + 'static,
    {
        self.routes.register_default(Arc::new(handler))
    }

    /// Handle that stops the accept loop when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Stop accepting new sessions. In-flight sessions are left to finish.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// In-flight session tracker, for draining after shutdown.
    pub fn tracker(&self) -> SessionTracker {
        self.tracker.clone()
    }

    /// Bind the listener and freeze the route table.
    pub async fn bind(self) -> Result<Server, ListenerError> {
        let listener = Listener::bind(&self.settings).await?;
        let router = self.routes.freeze();
        tracing::info!(routes = router.route_count(), "Route table frozen");

        Ok(Server {
            listener,
            router: Arc::new(router),
            shutdown: self.shutdown,
            tracker: self.tracker,
        })
    }

    /// Bind and serve until shutdown. Accept failures are returned as fatal.
    pub async fn serve(self) -> Result<(), ListenerError> {
        self.bind().await?.serve().await
    }
}

/// A dispatcher whose listener is bound and whose routes are frozen.
pub struct Server {
    listener: Listener,
    router: Arc<Router>,
    shutdown: Shutdown,
    tracker: SessionTracker,
}

impl Server {
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn tracker(&self) -> SessionTracker {
        self.tracker.clone()
    }

    /// Accept sessions until shutdown, one task per session.
    pub async fn serve(self) -> Result<(), ListenerError> {
        let mut signal = self.shutdown.subscribe();
        tracing::info!(
            address = ?self.listener.local_addr().ok(),
            "Dispatcher accepting sessions"
        );

        loop {
            tokio::select! {
                biased;
                _ = signal.recv() => {
                    tracing::info!(
                        in_flight = self.tracker.active_count(),
                        "Dispatcher stopped accepting sessions"
                    );
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::error!(error = %e, "Accept failed; dispatcher stopping");
                            return Err(e);
                        }
                    };
                    let guard = self.tracker.track();
                    let router = Arc::clone(&self.router);

                    tokio::spawn(async move {
                        let _permit = permit;
                        run_session(router, stream, peer, guard).await;
                    });
                }
            }
        }
    }
}

async fn run_session(router: Arc<Router>, stream: TcpStream, peer: SocketAddr, guard: SessionGuard) {
    let mut session = AgiSession::new(stream);

    let request = match session.read_request().await {
        Ok(request) => request,
        Err(e) if e.is_terminated() => {
            tracing::debug!(session_id = %guard.id(), peer = %peer, "Switch closed before sending environment");
            return;
        }
        Err(e) => {
            tracing::warn!(session_id = %guard.id(), peer = %peer, error = %e, "Invalid session environment");
            return;
        }
    };

    let span = session_span(guard.id(), request.path());
    async {
        tracing::debug!(peer = %peer, channel = ?request.env("agi_channel"), "Session started");
        dispatch(&router, &mut session, request).await;
        if let Err(e) = session.close().await {
            tracing::trace!(error = %e, "Session close failed");
        }
    }
    .instrument(span)
    .await;

    drop(guard);
}

/// Resolve the route for `request` and run its handler on `session`.
///
/// Never fails: every handler fault is logged and reported as an outcome.
pub async fn dispatch<S>(router: &Router, session: &mut S, request: AgiRequest) -> SessionOutcome
where
    S: CallSession,
{
    let Some(resolved) = router.resolve(request.path()) else {
        tracing::debug!(path = %request.path(), "No route matched and no default; closing session");
        metrics::record_session("none", SessionOutcome::Unrouted.as_str());
        return SessionOutcome::Unrouted;
    };

    let route = resolved.route.label();
    let handler = Arc::clone(resolved.route.handler());
    let call = CallContext {
        request,
        outcome: resolved.outcome,
        route: route.clone(),
    };

    let result = AssertUnwindSafe(handler.handle(session, &call))
        .catch_unwind()
        .await;

    let outcome = match result {
        Ok(Ok(())) => {
            tracing::debug!(route = %route, "Session completed");
            SessionOutcome::Completed
        }
        Ok(Err(e)) if e.is_terminated() => {
            tracing::warn!(route = %route, "Remote end hung up during session");
            SessionOutcome::Terminated
        }
        Ok(Err(e)) => {
            tracing::error!(route = %route, error = %e, "Handler failed");
            SessionOutcome::Failed
        }
        Err(panic) => {
            tracing::error!(route = %route, panic = %panic_message(&*panic), "Handler panicked");
            SessionOutcome::Panicked
        }
    };

    metrics::record_session(&route, outcome.as_str());
    outcome
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}
