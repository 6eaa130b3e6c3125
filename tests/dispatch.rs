//! Dispatcher behaviour over real loopback sessions.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pbx_bridge::agi::{AgiRequest, CallSession};
use pbx_bridge::dispatch::{dispatch, CallContext, Dispatcher, Handler, HandlerError, SessionOutcome};
use pbx_bridge::handlers::DemoHandler;
use pbx_bridge::lifecycle::Shutdown;
use pbx_bridge::routing::{Matcher, RouteError};
use tokio::task::JoinHandle;

mod common;

/// Counts invocations; answers then hangs up so the switch sees it ran.
#[derive(Clone, Default)]
struct Counting {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Handler for Counting {
    async fn handle(&self, session: &mut dyn CallSession, _: &CallContext) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        session.answer().await?;
        session.hangup().await?;
        Ok(())
    }
}

struct Panics;

#[async_trait]
impl Handler for Panics {
    async fn handle(&self, _: &mut dyn CallSession, _: &CallContext) -> Result<(), HandlerError> {
        panic!("handler bug");
    }
}

async fn start(dispatcher: Dispatcher) -> (SocketAddr, Shutdown, JoinHandle<()>) {
    let server = dispatcher.bind().await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_handle();
    let task = tokio::spawn(async move {
        server.serve().await.unwrap();
    });
    (addr, shutdown, task)
}

#[tokio::test]
async fn first_match_wins_and_default_catches_the_rest() {
    let default = Counting::default();
    let mut dispatcher = Dispatcher::new(common::loopback_settings());
    dispatcher.register(Matcher::prefix("demo"), DemoHandler).unwrap();
    dispatcher.register_default(default.clone()).unwrap();
    let (addr, shutdown, task) = start(dispatcher).await;

    let commands = common::call(addr, "demo").await;
    assert_eq!(commands, vec!["ANSWER", "STREAM FILE demo-thanks \"12\"", "HANGUP"]);
    assert_eq!(default.calls.load(Ordering::SeqCst), 0);

    let commands = common::call(addr, "xyz").await;
    assert_eq!(commands, vec!["ANSWER", "HANGUP"]);
    assert_eq!(default.calls.load(Ordering::SeqCst), 1);

    shutdown.trigger();
    task.await.unwrap();
}

#[tokio::test]
async fn earlier_route_shadows_later_one() {
    let first = Counting::default();
    let second = Counting::default();
    let mut dispatcher = Dispatcher::new(common::loopback_settings());
    dispatcher.register(Matcher::prefix("sl"), first.clone()).unwrap();
    dispatcher.register(Matcher::exact("slack"), second.clone()).unwrap();
    let (addr, shutdown, task) = start(dispatcher).await;

    common::call(addr, "slack").await;
    assert_eq!(first.calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.calls.load(Ordering::SeqCst), 0);

    shutdown.trigger();
    task.await.unwrap();
}

#[test]
fn second_default_is_rejected() {
    let mut dispatcher = Dispatcher::new(common::loopback_settings());
    dispatcher.register_default(Counting::default()).unwrap();
    assert_eq!(
        dispatcher.register_default(Counting::default()),
        Err(RouteError::DuplicateDefault)
    );
}

#[tokio::test]
async fn hangup_mid_call_does_not_block_next_session() {
    let mut dispatcher = Dispatcher::new(common::loopback_settings());
    dispatcher.register(Matcher::prefix("demo"), DemoHandler).unwrap();
    let (addr, shutdown, task) = start(dispatcher).await;

    let commands = common::call_with_hangup(addr, "demo", Some(1)).await;
    assert_eq!(commands, vec!["ANSWER", "STREAM FILE demo-thanks \"12\""]);

    let commands = common::call(addr, "demo").await;
    assert_eq!(commands.last().map(String::as_str), Some("HANGUP"));

    shutdown.trigger();
    task.await.unwrap();
}

#[tokio::test]
async fn panicking_handler_is_isolated() {
    let mut dispatcher = Dispatcher::new(common::loopback_settings());
    dispatcher.register(Matcher::exact("boom"), Panics).unwrap();
    dispatcher.register(Matcher::prefix("demo"), DemoHandler).unwrap();
    let (addr, shutdown, task) = start(dispatcher).await;

    assert!(common::call(addr, "boom").await.is_empty());
    assert_eq!(common::call(addr, "demo").await.len(), 3);

    shutdown.trigger();
    task.await.unwrap();
}

#[tokio::test]
async fn unmatched_path_without_default_is_closed() {
    let mut dispatcher = Dispatcher::new(common::loopback_settings());
    dispatcher.register(Matcher::prefix("demo"), DemoHandler).unwrap();
    let (addr, shutdown, task) = start(dispatcher).await;

    assert!(common::call(addr, "other").await.is_empty());

    shutdown.trigger();
    task.await.unwrap();
}

#[tokio::test]
async fn concurrent_sessions_are_served_independently() {
    let handler = Counting::default();
    let mut dispatcher = Dispatcher::new(common::loopback_settings());
    dispatcher.register_default(handler.clone()).unwrap();
    let (addr, shutdown, task) = start(dispatcher).await;

    let calls: Vec<_> = (0..8)
        .map(|i| tokio::spawn(async move { common::call(addr, &format!("line{i}")).await }))
        .collect();
    for call in calls {
        assert_eq!(call.await.unwrap(), vec!["ANSWER", "HANGUP"]);
    }
    assert_eq!(handler.calls.load(Ordering::SeqCst), 8);

    shutdown.trigger();
    task.await.unwrap();
}

#[tokio::test]
async fn shutdown_stops_accepting_and_drains() {
    let dispatcher = Dispatcher::new(common::loopback_settings());
    let tracker = dispatcher.tracker();
    let (addr, shutdown, task) = start(dispatcher).await;

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("serve did not return after shutdown")
        .unwrap();

    assert!(tracker.wait_for_drain(Duration::from_secs(1)).await);
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

/// Minimal session for calling `dispatch` directly.
#[derive(Default)]
struct NullSession {
    answered: bool,
}

#[async_trait]
impl CallSession for NullSession {
    async fn answer(&mut self) -> Result<(), pbx_bridge::agi::SessionError> {
        self.answered = true;
        Ok(())
    }

    async fn play_audio(
        &mut self,
        _: &str,
        _: &[char],
    ) -> Result<Option<pbx_bridge::agi::PlaybackInterrupt>, pbx_bridge::agi::SessionError> {
        Err(pbx_bridge::agi::SessionError::Terminated)
    }

    async fn set_variable(&mut self, _: &str, _: &str) -> Result<(), pbx_bridge::agi::SessionError> {
        Ok(())
    }

    async fn hangup(&mut self) -> Result<(), pbx_bridge::agi::SessionError> {
        Ok(())
    }
}

#[tokio::test]
async fn dispatch_reports_outcomes() {
    use pbx_bridge::routing::RouteTable;

    let mut table = RouteTable::new();
    table.register(Matcher::exact("boom"), Arc::new(Panics)).unwrap();
    table.register(Matcher::prefix("demo"), Arc::new(DemoHandler)).unwrap();
    let router = table.freeze();

    let mut session = NullSession::default();
    let outcome = dispatch(&router, &mut session, AgiRequest::from_path("demo")).await;
    assert_eq!(outcome, SessionOutcome::Terminated);
    assert!(session.answered);

    let outcome = dispatch(&router, &mut NullSession::default(), AgiRequest::from_path("boom")).await;
    assert_eq!(outcome, SessionOutcome::Panicked);

    let outcome = dispatch(&router, &mut NullSession::default(), AgiRequest::from_path("none")).await;
    assert_eq!(outcome, SessionOutcome::Unrouted);
}
