//! Elevator request: tells the chat channel someone is waiting downstairs.

use std::sync::Arc;

use async_trait::async_trait;

use crate::agi::CallSession;
use crate::chat::{ChatBackend, ChatNotifier};
use crate::dispatch::{CallContext, Handler, HandlerError};

pub const ELEVATOR_MESSAGE: &str =
    "@channel: An elevator has been requested. Please send one down ASAP. Thanks!";

/// Answers, posts [`ELEVATOR_MESSAGE`], hangs up.
///
/// Posting is best-effort; a disconnected notifier does not fail the call.
pub struct ElevatorHandler<B: ChatBackend> {
    notifier: Arc<ChatNotifier<B>>,
}

impl<B: ChatBackend> ElevatorHandler<B> {
    pub fn new(notifier: Arc<ChatNotifier<B>>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl<B> Handler for ElevatorHandler<B>
where
    B: ChatBackend + 'static,
{
    async fn handle(&self, session: &mut dyn CallSession, call: &CallContext) -> Result<(), HandlerError> {
        session.answer().await?;
        tracing::info!(path = %call.path(), caller = ?call.request.caller_id(), "Elevator requested");
        self.notifier.post(ELEVATOR_MESSAGE).await;
        session.hangup().await?;
        Ok(())
    }
}
