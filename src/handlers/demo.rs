//! Interactive prompt demo.

use async_trait::async_trait;

use crate::agi::CallSession;
use crate::dispatch::{CallContext, Handler, HandlerError};

const PROMPT: &str = "demo-thanks";
const INTERRUPT_KEYS: [char; 2] = ['1', '2'];

/// Answers, plays a prompt the caller may cut short with 1 or 2, hangs up.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoHandler;

#[async_trait]
impl Handler for DemoHandler {
    async fn handle(&self, session: &mut dyn CallSession, call: &CallContext) -> Result<(), HandlerError> {
        session.answer().await?;

        if let Some(interrupt) = session.play_audio(PROMPT, &INTERRUPT_KEYS).await? {
            tracing::info!(
                path = %call.path(),
                key = %interrupt.key,
                offset_ms = interrupt.offset_ms,
                "Prompt interrupted"
            );
        }

        session.hangup().await?;
        Ok(())
    }
}
