//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Listener accepts connection
//!     → agi adapter reads the environment (request path, args)
//!     → Router resolves first matching route, else the default
//!     → Handler drives the call through CallSession
//!     → Outcome logged; session closed
//! ```
//!
//! # Design Decisions
//! - One task per session so a slow call never blocks the next
//! - Hang-ups are warnings, other faults errors; neither stops the server
//! - Accept failures are fatal and surface from `serve()`

pub mod handler;
pub mod server;

pub use handler::{CallContext, Handler, HandlerError};
pub use server::{dispatch, Dispatcher, Server, SessionOutcome};
