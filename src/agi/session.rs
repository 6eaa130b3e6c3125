//! Abstract call-control capability.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while driving a call-control session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The remote party hung up or the channel no longer exists.
    #[error("session terminated by remote end")]
    Terminated,

    /// The switch sent something that could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The switch rejected a command.
    #[error("command '{command}' failed with {code}: {message}")]
    CommandFailed {
        command: String,
        code: u16,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub fn is_terminated(&self) -> bool {
        matches!(self, SessionError::Terminated)
    }
}

/// Playback stopped early because the caller pressed a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackInterrupt {
    /// The DTMF key that interrupted playback.
    pub key: char,
    /// Playback position at the moment of interruption.
    pub offset_ms: u64,
}

/// Operations a handler may perform on one inbound call.
#[async_trait]
pub trait CallSession: Send {
    /// Answer the call.
    async fn answer(&mut self) -> Result<(), SessionError>;

    /// Play a sound file, allowing any of `interrupt_keys` to stop it.
    ///
    /// Returns `None` when playback ran to completion.
    async fn play_audio(
        &mut self,
        name: &str,
        interrupt_keys: &[char],
    ) -> Result<Option<PlaybackInterrupt>, SessionError>;

    /// Set a channel variable visible to the dialplan.
    async fn set_variable(&mut self, name: &str, value: &str) -> Result<(), SessionError>;

    /// Hang up the call.
    async fn hangup(&mut self) -> Result<(), SessionError>;
}
