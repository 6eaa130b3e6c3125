//! Caller greeting from the member directory.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::agi::{AgiSession, CallSession, SessionError};
use crate::directory::{greeting, lookup_caller, Directory};
use crate::dispatch::{CallContext, Handler, HandlerError};

/// Channel variable the dialplan reads the greeting from.
pub const WELCOME_VARIABLE: &str = "WELCOME";

/// Looks the caller up and sets [`WELCOME_VARIABLE`] when they are a member.
pub struct WelcomeHandler<D: ?Sized> {
    directory: Arc<D>,
}

impl<D: Directory + ?Sized> WelcomeHandler<D> {
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl<D> Handler for WelcomeHandler<D>
where
    D: Directory + ?Sized + 'static,
{
    async fn handle(&self, session: &mut dyn CallSession, call: &CallContext) -> Result<(), HandlerError> {
        let Some(caller) = call.request.caller_id() else {
            tracing::debug!("Call has no caller id; skipping greeting");
            return Ok(());
        };

        match lookup_caller(self.directory.as_ref(), caller).await? {
            Some(member) => {
                tracing::info!(caller = %caller, member = %member.uid, "Caller recognised");
                session.set_variable(WELCOME_VARIABLE, &greeting(&member)).await?;
            }
            None => tracing::debug!(caller = %caller, "Caller not in directory"),
        }
        Ok(())
    }
}

/// How [`greet_caller`] delivered (or skipped) the greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GreetingDelivery {
    /// Stored in [`WELCOME_VARIABLE`] through the AGI session.
    Variable(String),
    /// Written to the output as a plain line.
    Printed(String),
    /// Neither the environment nor the fallback named a caller.
    NoCaller,
    /// The caller is not in the directory.
    UnknownCaller(String),
}

/// One-shot greeting for a plain AGI script.
///
/// With `read_environment`, the AGI environment is read from `stream` first
/// and the greeting is set as [`WELCOME_VARIABLE`]. On empty input the
/// greeting is printed to `stream` instead. The caller id comes from
/// `agi_callerid`, else `fallback_caller`. Unknown callers produce no output.
pub async fn greet_caller<S, D>(
    stream: S,
    read_environment: bool,
    fallback_caller: Option<&str>,
    directory: &D,
) -> Result<GreetingDelivery, HandlerError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    D: Directory + ?Sized,
{
    let mut session = AgiSession::new(stream);
    let mut under_agi = false;
    let mut agi_caller = None;

    if read_environment {
        match session.read_request().await {
            Ok(request) => {
                under_agi = true;
                agi_caller = request.caller_id().map(str::to_string);
            }
            Err(e) if e.is_terminated() => tracing::debug!("No AGI environment on input"),
            Err(e) => return Err(e.into()),
        }
    }

    let Some(caller) = agi_caller.or_else(|| fallback_caller.map(str::to_string)) else {
        tracing::warn!("No caller id available");
        return Ok(GreetingDelivery::NoCaller);
    };

    let Some(member) = lookup_caller(directory, &caller).await? else {
        tracing::info!(caller = %caller, "Caller not in directory");
        return Ok(GreetingDelivery::UnknownCaller(caller));
    };

    let text = greeting(&member);
    if under_agi {
        session.set_variable(WELCOME_VARIABLE, &text).await?;
        session.close().await?;
        return Ok(GreetingDelivery::Variable(text));
    }

    let mut output = session.into_inner();
    output
        .write_all(format!("{text}\n").as_bytes())
        .await
        .map_err(SessionError::from)?;
    output.flush().await.map_err(SessionError::from)?;
    Ok(GreetingDelivery::Printed(text))
}
