//! Handler contract.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::agi::{AgiRequest, CallSession, SessionError};
use crate::directory::DirectoryError;
use crate::routing::MatchOutcome;

/// Everything a handler learns about the call it is serving.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub request: AgiRequest,
    pub outcome: MatchOutcome,
    /// Label of the route that matched.
    pub route: String,
}

impl CallContext {
    /// Raw request path as sent by the switch.
    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn args(&self) -> &[String] {
        self.request.args()
    }

    pub fn kwargs(&self) -> &BTreeMap<String, Vec<String>> {
        self.request.kwargs()
    }
}

/// A fault raised by a handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("directory lookup failed: {0}")]
    Directory(#[from] DirectoryError),
}

impl HandlerError {
    /// True when the remote party hung up.
    pub fn is_terminated(&self) -> bool {
        matches!(self, HandlerError::Session(e) if e.is_terminated())
    }
}

/// Drives one call to a terminal state.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, session: &mut dyn CallSession, call: &CallContext) -> Result<(), HandlerError>;
}
