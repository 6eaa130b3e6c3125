//! Call-control session adapter.
//!
//! # Data Flow
//! ```text
//! Switch opens FastAGI connection
//!     → protocol.rs (read `agi_*: value` environment until blank line)
//!     → request.rs (path, positional args, keyword args)
//!     → session.rs (CallSession capability handed to the matched handler)
//! ```
//!
//! # Design Decisions
//! - Handlers only see the `CallSession` trait, never the socket
//! - Only the four commands the handlers need are issued
//! - A dead channel always surfaces as `SessionError::Terminated`

pub mod protocol;
pub mod request;
pub mod session;

pub use protocol::AgiSession;
pub use request::AgiRequest;
pub use session::{CallSession, PlaybackInterrupt, SessionError};
