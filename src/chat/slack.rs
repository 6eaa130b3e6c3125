//! Slack Web API backend.
//!
//! # Responsibilities
//! - `auth.test` to validate the token (connect and keep-alive)
//! - `conversations.info` to resolve the configured channel
//! - `chat.postMessage` to post
//!
//! # Security Constraints
//! - The bot token is never logged

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::chat::backend::{ChatBackend, ChatError};
use crate::config::schema::SlackSettings;

/// Slack's envelope around every Web API response.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: serde_json::Map<String, serde_json::Value>,
}

/// Failure of a single Web API call.
#[derive(Debug)]
enum CallError {
    /// Slack answered `ok: false` with this error code.
    Rejected(String),
    /// The request never produced a usable reply.
    Transport(String),
}

impl CallError {
    fn into_chat_error(self, method: &str) -> ChatError {
        match self {
            CallError::Rejected(code) => ChatError::Transport(format!("{method} rejected: {code}")),
            CallError::Transport(msg) => ChatError::Transport(msg),
        }
    }
}

/// Authenticated link to a workspace.
pub struct SlackConnection {
    token: String,
    team: Option<String>,
    user_id: Option<String>,
}

/// A resolved conversation that messages are posted to.
pub struct SlackChannel {
    token: String,
    id: String,
    name: Option<String>,
}

/// Chat backend speaking the Slack Web API over HTTPS.
#[derive(Debug, Clone)]
pub struct SlackBackend {
    client: Client,
    api_url: String,
}

impl SlackBackend {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pbx-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChatError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &SlackSettings) -> Result<Self, ChatError> {
        Self::new(settings.api_url.clone(), settings.request_timeout)
    }

    /// Call a Web API method with form parameters.
    async fn call(
        &self,
        method: &str,
        token: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Map<String, serde_json::Value>, CallError> {
        let url = format!("{}/{}", self.api_url, method);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .form(params)
            .send()
            .await
            .map_err(|e| CallError::Transport(format!("{method}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CallError::Transport(format!("{method}: HTTP {status}")));
        }

        let reply: ApiResponse = response
            .json()
            .await
            .map_err(|e| CallError::Transport(format!("{method}: invalid response: {e}")))?;

        if reply.ok {
            Ok(reply.body)
        } else {
            Err(CallError::Rejected(
                reply.error.unwrap_or_else(|| "unknown_error".to_string()),
            ))
        }
    }
}

fn string_field(body: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    body.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

#[async_trait]
impl ChatBackend for SlackBackend {
    type Connection = SlackConnection;
    type Channel = SlackChannel;

    async fn connect(&self, token: &str) -> Result<SlackConnection, ChatError> {
        let body = self.call("auth.test", token, &[]).await.map_err(|e| match e {
            CallError::Rejected(code) => ChatError::Connection(format!("auth.test rejected: {code}")),
            CallError::Transport(msg) => ChatError::Connection(msg),
        })?;

        let connection = SlackConnection {
            token: token.to_string(),
            team: string_field(&body, "team"),
            user_id: string_field(&body, "user_id"),
        };
        tracing::debug!(team = ?connection.team, user_id = ?connection.user_id, "Slack token accepted");
        Ok(connection)
    }

    async fn resolve_channel(&self, connection: &SlackConnection, id: &str) -> Result<SlackChannel, ChatError> {
        let body = self
            .call("conversations.info", &connection.token, &[("channel", id)])
            .await
            .map_err(|e| match e {
                CallError::Rejected(code) if code == "channel_not_found" => {
                    ChatError::ChannelNotFound(id.to_string())
                }
                CallError::Rejected(code) => {
                    ChatError::Connection(format!("conversations.info rejected: {code}"))
                }
                CallError::Transport(msg) => ChatError::Connection(msg),
            })?;

        let name = body
            .get("channel")
            .and_then(|c| c.get("name"))
            .and_then(|n| n.as_str())
            .map(str::to_string);

        let channel = SlackChannel {
            token: connection.token.clone(),
            id: id.to_string(),
            name,
        };
        tracing::debug!(channel = %channel.id, name = ?channel.name, "Slack channel resolved");
        Ok(channel)
    }

    async fn ping(&self, connection: &SlackConnection) -> Result<(), ChatError> {
        self.call("auth.test", &connection.token, &[])
            .await
            .map(|_| ())
            .map_err(|e| e.into_chat_error("auth.test"))
    }

    async fn send(&self, channel: &SlackChannel, text: &str) -> Result<(), ChatError> {
        self.call(
            "chat.postMessage",
            &channel.token,
            &[("channel", channel.id.as_str()), ("text", text), ("link_names", "true")],
        )
        .await
        .map(|_| ())
        .map_err(|e| e.into_chat_error("chat.postMessage"))
    }
}
