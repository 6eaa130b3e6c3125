//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured FastAGI address
//! - Accept incoming switch connections
//! - Enforce the max_sessions limit via semaphore

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::schema::AgiSettings;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),
    /// The session limiter was closed.
    #[error("Session limiter closed")]
    Closed,
}

/// A bounded TCP listener that limits concurrent sessions.
///
/// When the limit is reached, new connections wait in the kernel backlog
/// until a slot becomes available.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    session_limit: Arc<Semaphore>,
    max_sessions: usize,
}

impl Listener {
    /// Bind to the configured address with session limits.
    pub async fn bind(settings: &AgiSettings) -> Result<Self, ListenerError> {
        let addr = settings.bind_address;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;

        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Bind { addr, source })?;

        tracing::info!(
            address = %local_addr,
            max_sessions = settings.max_sessions,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            session_limit: Arc::new(Semaphore::new(settings.max_sessions)),
            max_sessions: settings.max_sessions,
        })
    }

    /// Accept a new connection, respecting the session limit.
    ///
    /// Returns the stream and a permit that must be held for the session's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, SessionPermit), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = self
            .session_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.session_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, SessionPermit { _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available session slots.
    pub fn available_permits(&self) -> usize {
        self.session_limit.available_permits()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }
}

/// A permit representing a session slot.
///
/// Released back to the listener when dropped, even if the handler panics.
#[derive(Debug)]
pub struct SessionPermit {
    _permit: OwnedSemaphorePermit,
}
