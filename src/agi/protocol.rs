//! FastAGI line adapter implementing [`CallSession`].
//!
//! Commands are single lines; the switch answers each with
//! `200 result=<n> [(data)] [key=value ...]`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};

use crate::agi::request::AgiRequest;
use crate::agi::session::{CallSession, PlaybackInterrupt, SessionError};

/// Asterisk reports playback positions in 8 kHz samples.
const SAMPLES_PER_MS: u64 = 8;

/// Upper bound on environment lines, to stop a misbehaving peer.
const MAX_ENVIRONMENT_LINES: usize = 256;

/// Upper bound on a single line from the switch, newline included.
const MAX_LINE_BYTES: u64 = 8 * 1024;

/// Parsed reply to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgiReply {
    pub code: u16,
    pub result: i64,
    /// Parenthesised annotation, e.g. `timeout` or `dtmf`.
    pub data: Option<String>,
    /// Trailing `key=value` pairs, e.g. `endpos`.
    pub extras: BTreeMap<String, String>,
}

impl AgiReply {
    /// Parse a `200 result=...` status line.
    pub fn parse(line: &str) -> Result<Self, SessionError> {
        let line = line.trim();
        let (code, rest) = line.split_once(' ').unwrap_or((line, ""));
        let code: u16 = code
            .parse()
            .map_err(|_| SessionError::Protocol(format!("malformed reply: {line:?}")))?;

        let mut result = 0;
        let mut data = None;
        let mut extras = BTreeMap::new();
        let mut rest = rest.trim();

        while !rest.is_empty() {
            if let Some(stripped) = rest.strip_prefix('(') {
                let (inner, tail) = stripped.split_once(')').unwrap_or((stripped, ""));
                data = Some(inner.to_string());
                rest = tail.trim_start();
                continue;
            }

            let (token, tail) = rest.split_once(' ').unwrap_or((rest, ""));
            if let Some((key, value)) = token.split_once('=') {
                if key == "result" {
                    result = value.parse().map_err(|_| {
                        SessionError::Protocol(format!("malformed result in reply: {line:?}"))
                    })?;
                } else {
                    extras.insert(key.to_string(), value.to_string());
                }
            }
            rest = tail.trim_start();
        }

        Ok(Self {
            code,
            result,
            data,
            extras,
        })
    }
}

/// One FastAGI session over any byte stream (normally a `TcpStream`).
#[derive(Debug)]
pub struct AgiSession<S> {
    stream: BufStream<S>,
}

impl<S> AgiSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufStream::new(stream),
        }
    }

    /// Read the `agi_*` environment block that opens every session.
    pub async fn read_request(&mut self) -> Result<AgiRequest, SessionError> {
        let mut environment = BTreeMap::new();

        for _ in 0..MAX_ENVIRONMENT_LINES {
            let line = self.read_line().await?;
            if line.is_empty() {
                return Ok(AgiRequest::from_environment(environment));
            }
            match line.split_once(':') {
                Some((key, value)) => {
                    environment.insert(key.trim().to_string(), value.trim().to_string());
                }
                None => {
                    return Err(SessionError::Protocol(format!(
                        "malformed environment line: {line:?}"
                    )))
                }
            }
        }

        Err(SessionError::Protocol("environment block too long".to_string()))
    }

    /// Flush and close the underlying stream.
    pub async fn close(mut self) -> Result<(), SessionError> {
        self.stream.flush().await?;
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Give back the underlying stream. Unread buffered input is discarded.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    async fn read_line(&mut self) -> Result<String, SessionError> {
        let mut line = String::new();
        let n = (&mut self.stream).take(MAX_LINE_BYTES).read_line(&mut line).await?;
        if n == 0 {
            return Err(SessionError::Terminated);
        }
        if n as u64 >= MAX_LINE_BYTES && !line.ends_with('\n') {
            return Err(SessionError::Protocol(format!(
                "line exceeds {MAX_LINE_BYTES} bytes"
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Send one command and wait for its reply.
    pub async fn execute(&mut self, command: &str) -> Result<AgiReply, SessionError> {
        tracing::trace!(command = %command, "Sending AGI command");
        self.stream.write_all(command.as_bytes()).await?;
        self.stream.write_all(b"\n").await?;
        self.stream.flush().await?;

        let mut line = self.read_line().await?;
        // Asterisk announces a hangup out of band before the real reply.
        if line == "HANGUP" {
            return Err(SessionError::Terminated);
        }

        // 520 usage errors span several lines, ending with "520 End of ...".
        if line.starts_with("520-") {
            let first = line.clone();
            while !line.starts_with("520 ") {
                line = self.read_line().await?;
            }
            return Err(command_failed(command, 520, &first));
        }

        let reply = AgiReply::parse(&line)?;
        match reply.code {
            200 => Ok(reply),
            511 => Err(SessionError::Terminated),
            code => Err(command_failed(command, code, &line)),
        }
    }

    /// Execute a command whose `result=-1` means the channel is gone.
    async fn execute_live(&mut self, command: &str) -> Result<AgiReply, SessionError> {
        let reply = self.execute(command).await?;
        if reply.result == -1 {
            return Err(SessionError::Terminated);
        }
        Ok(reply)
    }
}

fn command_failed(command: &str, code: u16, line: &str) -> SessionError {
    SessionError::CommandFailed {
        command: command.split_whitespace().next().unwrap_or(command).to_string(),
        code,
        message: line.to_string(),
    }
}

/// Quote an argument, escaping quotes and backslashes and dropping line breaks.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\r' | '\n' => out.push(' '),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[async_trait]
impl<S> CallSession for AgiSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn answer(&mut self) -> Result<(), SessionError> {
        self.execute_live("ANSWER").await?;
        Ok(())
    }

    async fn play_audio(
        &mut self,
        name: &str,
        interrupt_keys: &[char],
    ) -> Result<Option<PlaybackInterrupt>, SessionError> {
        let keys: String = interrupt_keys.iter().collect();
        let command = format!("STREAM FILE {} {}", name.replace(char::is_whitespace, ""), quote(&keys));
        let reply = self.execute_live(&command).await?;

        if reply.result <= 0 {
            return Ok(None);
        }

        let key = u32::try_from(reply.result)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| SessionError::Protocol(format!("invalid DTMF result {}", reply.result)))?;
        let samples: u64 = reply
            .extras
            .get("endpos")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Ok(Some(PlaybackInterrupt {
            key,
            offset_ms: samples / SAMPLES_PER_MS,
        }))
    }

    async fn set_variable(&mut self, name: &str, value: &str) -> Result<(), SessionError> {
        let command = format!("SET VARIABLE {} {}", name.replace(char::is_whitespace, ""), quote(value));
        self.execute(&command).await?;
        Ok(())
    }

    async fn hangup(&mut self) -> Result<(), SessionError> {
        self.execute_live("HANGUP").await?;
        Ok(())
    }
}
