//! Long-lived chat connection with keep-alive and best-effort posting.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::chat::backend::{ChatBackend, ChatError};
use crate::chat::keepalive::KeepAlive;
use crate::config::schema::{ReconnectSettings, SlackSettings};
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;

/// How often the supervision loop wakes up.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierState {
    Disconnected,
    Connecting,
    Connected,
}

enum Link<B: ChatBackend> {
    Disconnected,
    Connecting,
    Connected {
        connection: B::Connection,
        channel: B::Channel,
    },
}

impl<B: ChatBackend> Link<B> {
    fn state(&self) -> NotifierState {
        match self {
            Link::Disconnected => NotifierState::Disconnected,
            Link::Connecting => NotifierState::Connecting,
            Link::Connected { .. } => NotifierState::Connected,
        }
    }
}

/// Owns the single connection to the chat backend.
pub struct ChatNotifier<B: ChatBackend> {
    backend: B,
    token: String,
    channel_id: String,
    ping_interval: Duration,
    reconnect: ReconnectSettings,
    link: Mutex<Link<B>>,
}

impl<B: ChatBackend> ChatNotifier<B> {
    pub fn new(backend: B, token: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            backend,
            token: token.into(),
            channel_id: channel_id.into(),
            ping_interval: Duration::from_secs(3),
            reconnect: ReconnectSettings::default(),
            link: Mutex::new(Link::Disconnected),
        }
    }

    pub fn from_settings(backend: B, slack: &SlackSettings, reconnect: ReconnectSettings) -> Self {
        Self::new(backend, slack.token.clone(), slack.channel.clone())
            .with_ping_interval(slack.ping_interval)
            .with_reconnect(reconnect)
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectSettings) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn state(&self) -> NotifierState {
        self.link.lock().await.state()
    }

    /// Connect to the backend and resolve the configured channel.
    ///
    /// Connecting while already connected is a no-op.
    pub async fn connect(&self) -> Result<(), ChatError> {
        {
            let mut link = self.link.lock().await;
            match *link {
                Link::Connected { .. } => return Ok(()),
                Link::Connecting => return Err(ChatError::Busy),
                Link::Disconnected => *link = Link::Connecting,
            }
        }

        let result = self.establish().await;

        let mut link = self.link.lock().await;
        match result {
            Ok((connection, channel)) => {
                *link = Link::Connected { connection, channel };
                tracing::info!(channel = %self.channel_id, "Chat backend connected");
                Ok(())
            }
            Err(e) => {
                *link = Link::Disconnected;
                Err(e)
            }
        }
    }

    /// Roll back a connect attempt that was dropped before it finished.
    async fn abandon_connect(&self) {
        let mut link = self.link.lock().await;
        if matches!(*link, Link::Connecting) {
            *link = Link::Disconnected;
        }
    }

    async fn establish(&self) -> Result<(B::Connection, B::Channel), ChatError> {
        let connection = self
            .backend
            .connect(&self.token)
            .await
            .map_err(|e| match e {
                ChatError::Connection(_) => e,
                other => ChatError::Connection(other.to_string()),
            })?;

        let channel = self
            .backend
            .resolve_channel(&connection, &self.channel_id)
            .await
            .map_err(|e| match e {
                ChatError::ChannelNotFound(_) | ChatError::Connection(_) => e,
                other => ChatError::Connection(other.to_string()),
            })?;

        Ok((connection, channel))
    }

    /// Post a message to the channel.
    ///
    /// Empty messages, `None`, and posts while not connected are silent no-ops.
    /// Send failures are logged and swallowed.
    pub async fn post<'m>(&self, message: impl Into<Option<&'m str>>) {
        let Some(text) = message.into().filter(|m| !m.is_empty()) else {
            return;
        };

        let link = self.link.lock().await;
        let Link::Connected { channel, .. } = &*link else {
            tracing::debug!("Chat not connected; message dropped");
            metrics::record_chat_post("skipped");
            return;
        };

        match self.backend.send(channel, text).await {
            Ok(()) => {
                tracing::debug!(channel = %self.channel_id, "Chat message posted");
                metrics::record_chat_post("sent");
            }
            Err(e) => {
                tracing::warn!(channel = %self.channel_id, error = %e, "Chat message failed");
                metrics::record_chat_post("failed");
            }
        }
    }

    /// Send one keep-alive ping.
    ///
    /// Returns `Ok(false)` when not connected. A failed ping drops the
    /// connection back to `Disconnected`.
    pub async fn ping(&self) -> Result<bool, ChatError> {
        let mut link = self.link.lock().await;
        let Link::Connected { connection, .. } = &*link else {
            return Ok(false);
        };

        match self.backend.ping(connection).await {
            Ok(()) => {
                tracing::trace!("Chat keep-alive sent");
                metrics::record_chat_ping("ok");
                Ok(true)
            }
            Err(e) => {
                *link = Link::Disconnected;
                metrics::record_chat_ping("failed");
                Err(e)
            }
        }
    }

    /// Supervise the connection until shutdown: ping on schedule while
    /// connected, reconnect with backoff while disconnected.
    pub async fn run(&self, mut shutdown: ShutdownSignal) {
        tracing::info!(
            ping_interval = ?self.ping_interval,
            channel = %self.channel_id,
            "Chat supervisor starting"
        );

        let mut keepalive = KeepAlive::new(self.ping_interval);
        let mut backoff = Backoff::new(self.reconnect);
        let mut retry_at: Option<Instant> = None;

        let mut ticker = time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Chat supervisor received shutdown signal, exiting loop");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let now = Instant::now();
            match self.state().await {
                NotifierState::Connected => {
                    if !keepalive.due(now) {
                        continue;
                    }
                    if let Err(e) = self.ping().await {
                        tracing::warn!(error = %e, "Chat keep-alive failed; connection lost");
                        retry_at = Some(now + backoff.next_delay());
                    }
                }
                NotifierState::Disconnected => {
                    let at = *retry_at.get_or_insert_with(|| now + backoff.next_delay());
                    if now < at {
                        continue;
                    }

                    metrics::record_chat_reconnect();
                    let attempt = tokio::select! {
                        biased;
                        _ = shutdown.recv() => {
                            self.abandon_connect().await;
                            tracing::info!("Chat supervisor received shutdown signal during reconnect, exiting loop");
                            return;
                        }
                        attempt = self.connect() => attempt,
                    };
                    match attempt {
                        Ok(()) => {
                            tracing::info!(attempts = backoff.attempt(), "Chat connection established");
                            backoff.reset();
                            keepalive.reset();
                            retry_at = None;
                        }
                        Err(e) => {
                            let delay = backoff.next_delay();
                            tracing::warn!(
                                error = %e,
                                attempt = backoff.attempt(),
                                retry_in = ?delay,
                                "Chat reconnect failed"
                            );
                            retry_at = Some(Instant::now() + delay);
                        }
                    }
                }
                NotifierState::Connecting => {}
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Call {
        Connect(String),
        Resolve(String),
        Ping,
        Send(String, String),
    }

    /// Records every backend call; failures are switchable.
    #[derive(Default)]
    pub(crate) struct FakeBackend {
        pub calls: StdMutex<Vec<Call>>,
        pub refuse_connect: AtomicBool,
        pub fail_ping: AtomicBool,
        pub unknown_channel: AtomicBool,
        pub hang_connect: AtomicBool,
    }

    impl FakeBackend {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl ChatBackend for FakeBackend {
        type Connection = String;
        type Channel = String;

        async fn connect(&self, token: &str) -> Result<String, ChatError> {
            self.record(Call::Connect(token.to_string()));
            if self.hang_connect.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.refuse_connect.load(Ordering::SeqCst) {
                return Err(ChatError::Connection("refused".into()));
            }
            Ok(format!("conn:{token}"))
        }

        async fn resolve_channel(&self, _connection: &String, id: &str) -> Result<String, ChatError> {
            self.record(Call::Resolve(id.to_string()));
            if self.unknown_channel.load(Ordering::SeqCst) {
                return Err(ChatError::ChannelNotFound(id.to_string()));
            }
            Ok(id.to_string())
        }

        async fn ping(&self, _connection: &String) -> Result<(), ChatError> {
            self.record(Call::Ping);
            if self.fail_ping.load(Ordering::SeqCst) {
                return Err(ChatError::Transport("socket closed".into()));
            }
            Ok(())
        }

        async fn send(&self, channel: &String, text: &str) -> Result<(), ChatError> {
            self.record(Call::Send(channel.clone(), text.to_string()));
            Ok(())
        }
    }

    fn notifier() -> ChatNotifier<FakeBackend> {
        ChatNotifier::new(FakeBackend::default(), "xoxb-test", "C024BE91L")
    }

    #[tokio::test]
    async fn post_after_connect_sends_once() {
        let notifier = notifier();
        notifier.connect().await.unwrap();
        assert_eq!(notifier.state().await, NotifierState::Connected);

        notifier.post("hello").await;

        let sends: Vec<_> = notifier
            .backend()
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Send(..)))
            .collect();
        assert_eq!(sends, vec![Call::Send("C024BE91L".into(), "hello".into())]);
    }

    #[tokio::test]
    async fn post_while_disconnected_is_noop() {
        let notifier = notifier();
        notifier.post("hello").await;

        assert_eq!(notifier.state().await, NotifierState::Disconnected);
        assert!(notifier.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn empty_and_none_posts_are_noops() {
        let notifier = notifier();
        notifier.connect().await.unwrap();
        let before = notifier.backend().calls().len();

        notifier.post("").await;
        notifier.post(None).await;

        assert_eq!(notifier.backend().calls().len(), before);
    }

    #[tokio::test]
    async fn connect_failure_is_reported() {
        let notifier = notifier();
        notifier.backend().refuse_connect.store(true, Ordering::SeqCst);

        let err = notifier.connect().await.unwrap_err();
        assert!(matches!(err, ChatError::Connection(_)));
        assert_eq!(notifier.state().await, NotifierState::Disconnected);
    }

    #[tokio::test]
    async fn unresolvable_channel_fails_connect() {
        let notifier = notifier();
        notifier.backend().unknown_channel.store(true, Ordering::SeqCst);

        let err = notifier.connect().await.unwrap_err();
        assert_eq!(err, ChatError::ChannelNotFound("C024BE91L".into()));
        assert_eq!(notifier.state().await, NotifierState::Disconnected);
    }

    #[tokio::test]
    async fn failed_ping_disconnects() {
        let notifier = notifier();
        notifier.connect().await.unwrap();
        assert_eq!(notifier.ping().await, Ok(true));

        notifier.backend().fail_ping.store(true, Ordering::SeqCst);
        assert!(notifier.ping().await.is_err());
        assert_eq!(notifier.state().await, NotifierState::Disconnected);
        assert_eq!(notifier.ping().await, Ok(false));
    }

    #[tokio::test(start_paused = true)]
    async fn supervisor_paces_pings() {
        let notifier = Arc::new(notifier().with_ping_interval(Duration::from_secs(3)));
        notifier.connect().await.unwrap();

        let shutdown = Shutdown::new();
        let task = {
            let notifier = Arc::clone(&notifier);
            let signal = shutdown.subscribe();
            tokio::spawn(async move { notifier.run(signal).await })
        };

        tokio::time::sleep(Duration::from_millis(9_900)).await;
        shutdown.trigger();
        task.await.unwrap();

        // Pings at ~0s, ~3s, ~6s, ~9s.
        let pings = notifier.backend().count(|c| *c == Call::Ping);
        assert_eq!(pings, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn supervisor_reconnects_after_lost_link() {
        let notifier = Arc::new(
            notifier()
                .with_ping_interval(Duration::from_secs(1))
                .with_reconnect(ReconnectSettings {
                    base_delay_ms: 1_000,
                    max_delay_ms: 4_000,
                }),
        );
        notifier.connect().await.unwrap();

        let shutdown = Shutdown::new();
        let task = {
            let notifier = Arc::clone(&notifier);
            let signal = shutdown.subscribe();
            tokio::spawn(async move { notifier.run(signal).await })
        };

        // Lose the link and refuse reconnects for a while.
        notifier.backend().fail_ping.store(true, Ordering::SeqCst);
        notifier.backend().refuse_connect.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(notifier.state().await, NotifierState::Disconnected);

        notifier.backend().fail_ping.store(false, Ordering::SeqCst);
        notifier.backend().refuse_connect.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(notifier.state().await, NotifierState::Connected);

        shutdown.trigger();
        task.await.unwrap();

        assert!(notifier.backend().count(|c| matches!(c, Call::Connect(_))) >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_stalled_reconnect() {
        let notifier = Arc::new(notifier());
        notifier.backend().hang_connect.store(true, Ordering::SeqCst);

        let shutdown = Shutdown::new();
        let task = {
            let notifier = Arc::clone(&notifier);
            let signal = shutdown.subscribe();
            tokio::spawn(async move { notifier.run(signal).await })
        };

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(notifier.state().await, NotifierState::Connecting);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("supervisor stuck in connect")
            .unwrap();
        assert_eq!(notifier.state().await, NotifierState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn supervisor_connects_when_started_disconnected() {
        let notifier = Arc::new(notifier());
        let shutdown = Shutdown::new();
        let task = {
            let notifier = Arc::clone(&notifier);
            let signal = shutdown.subscribe();
            tokio::spawn(async move { notifier.run(signal).await })
        };

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(notifier.state().await, NotifierState::Connected);

        shutdown.trigger();
        task.await.unwrap();
    }
}
