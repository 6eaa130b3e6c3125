//! Per-session span construction.

use tracing::Span;

use crate::net::connection::SessionId;

/// Span wrapping the whole lifetime of one call-control session.
pub fn session_span(id: SessionId, path: &str) -> Span {
    tracing::info_span!("session", session_id = %id, path = %path)
}
