//! Chat backend capability.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the chat backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Backend unreachable or credentials rejected.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The configured channel could not be resolved.
    #[error("channel '{0}' not found")]
    ChannelNotFound(String),

    /// A request on an established connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A connection attempt is already running.
    #[error("connection attempt already in progress")]
    Busy,
}

/// Operations the notifier needs from a chat service.
#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    /// Live link to the backend.
    type Connection: Send + Sync;
    /// Resolved target channel.
    type Channel: Send + Sync;

    async fn connect(&self, token: &str) -> Result<Self::Connection, ChatError>;

    async fn resolve_channel(&self, connection: &Self::Connection, id: &str) -> Result<Self::Channel, ChatError>;

    /// Keep-alive request; failure means the link is lost.
    async fn ping(&self, connection: &Self::Connection) -> Result<(), ChatError>;

    async fn send(&self, channel: &Self::Channel, text: &str) -> Result<(), ChatError>;
}
