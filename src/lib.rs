//! PBX bridge library: FastAGI dispatch and chat notification.

pub mod agi;
pub mod chat;
pub mod config;
pub mod directory;
pub mod dispatch;
pub mod handlers;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use chat::ChatNotifier;
pub use config::{Config, Settings};
pub use dispatch::Dispatcher;
pub use lifecycle::Shutdown;
