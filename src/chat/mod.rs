//! Chat notification subsystem.
//!
//! # Data Flow
//! ```text
//! Start-up:
//!     ChatNotifier::connect → backend.connect(token) → backend.resolve_channel(id)
//!
//! Supervision loop (own task, own schedule):
//!     poll tick → KeepAlive due? → backend.ping
//!               → ping failed → Disconnected → reconnect with backoff
//!
//! Handlers:
//!     ChatNotifier::post(text) → backend.send(channel, text) | silent no-op
//! ```
//!
//! # State Machine
//! ```text
//! Disconnected → Connecting → Connected
//!       ↑______________|__________|   (connect failure / ping failure)
//! ```
//!
//! # Design Decisions
//! - One mutex around the link; handlers never hold the connection
//! - Posting never fails the call path
//! - Lost connections are re-established with jittered exponential backoff

pub mod backend;
pub mod keepalive;
pub mod notifier;
pub mod slack;

pub use backend::{ChatBackend, ChatError};
pub use keepalive::KeepAlive;
pub use notifier::{ChatNotifier, NotifierState};
pub use slack::SlackBackend;
