//! Shared utilities for integration tests: a scripted switch and a fake chat API.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pbx_bridge::config::schema::AgiSettings;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Listener settings on an ephemeral loopback port.
pub fn loopback_settings() -> AgiSettings {
    AgiSettings {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        max_sessions: 16,
    }
}

/// Canned switch reply for a command.
fn reply_for(command: &str) -> &'static str {
    if command.starts_with("STREAM FILE") {
        "200 result=0 endpos=8000\n"
    } else if command.starts_with("ANSWER") {
        "200 result=0\n"
    } else {
        "200 result=1\n"
    }
}

/// Play the switch side of one session: send the environment for `path`,
/// answer every command, and return the commands received once the
/// dispatcher closes the connection.
pub async fn call(addr: SocketAddr, path: &str) -> Vec<String> {
    call_with_hangup(addr, path, None).await
}

/// Like [`call`], but reports a hang-up in reply to the command at index
/// `hangup_at`, then drops the connection.
pub async fn call_with_hangup(addr: SocketAddr, path: &str, hangup_at: Option<usize>) -> Vec<String> {
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut stream = BufReader::new(stream);

    let environment = format!(
        "agi_network: yes\nagi_request: agi://127.0.0.1/{path}\nagi_channel: SIP/test-00000001\nagi_callerid: 902\n\n"
    );
    stream.get_mut().write_all(environment.as_bytes()).await.unwrap();

    let mut commands = Vec::new();
    loop {
        let mut line = String::new();
        let read = tokio::time::timeout(Duration::from_secs(5), stream.read_line(&mut line))
            .await
            .expect("dispatcher stalled");
        match read {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let command = line.trim_end().to_string();
        if hangup_at == Some(commands.len()) {
            commands.push(command);
            let _ = stream.get_mut().write_all(b"HANGUP\n").await;
            break;
        }
        let reply = reply_for(&command);
        commands.push(command);
        if stream.get_mut().write_all(reply.as_bytes()).await.is_err() {
            break;
        }
    }
    commands
}

/// One request seen by the fake chat API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: String,
    pub authorization: Option<String>,
    pub body: String,
}

impl ApiRequest {
    /// Decoded form parameter.
    pub fn param(&self, key: &str) -> Option<String> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

/// Fake Slack Web API. `respond` maps a method name to the JSON reply body.
pub struct MockChatApi {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl MockChatApi {
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests().iter().filter(|r| r.method == method).count()
    }
}

pub async fn start_mock_chat_api<F>(respond: F) -> MockChatApi
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let seen = Arc::clone(&requests);
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let seen = Arc::clone(&seen);
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let mut socket = BufReader::new(socket);
                while let Some(request) = read_request(&mut socket).await {
                    let body = respond(&request.method);
                    seen.lock().unwrap().push(request);
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    if socket.get_mut().write_all(response.as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    MockChatApi { addr, requests }
}

async fn read_request(socket: &mut BufReader<TcpStream>) -> Option<ApiRequest> {
    let mut request_line = String::new();
    if socket.read_line(&mut request_line).await.ok()? == 0 {
        return None;
    }
    let path = request_line.split_whitespace().nth(1)?.to_string();
    let method = path.rsplit('/').next()?.to_string();

    let mut content_length = 0;
    let mut authorization = None;
    loop {
        let mut header = String::new();
        socket.read_line(&mut header).await.ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().ok()?;
            } else if name.eq_ignore_ascii_case("authorization") {
                authorization = Some(value.to_string());
            }
        }
    }

    let mut body = vec![0; content_length];
    socket.read_exact(&mut body).await.ok()?;

    Some(ApiRequest {
        method,
        authorization,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}
