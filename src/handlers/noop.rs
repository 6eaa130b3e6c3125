//! Fallback handler.

use async_trait::async_trait;

use crate::agi::CallSession;
use crate::dispatch::{CallContext, Handler, HandlerError};

/// Does nothing; control returns to the dialplan immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

#[async_trait]
impl Handler for NoopHandler {
    async fn handle(&self, _session: &mut dyn CallSession, call: &CallContext) -> Result<(), HandlerError> {
        tracing::debug!(path = %call.path(), "No handler for path; returning to dialplan");
        Ok(())
    }
}
