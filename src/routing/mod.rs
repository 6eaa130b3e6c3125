//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming session (request path)
//!     → router.rs (ordered route scan)
//!     → matcher.rs (exact / prefix / wildcard)
//!     → Return: matched route + outcome, the default route, or nothing
//!
//! Route table (at start-up):
//!     register(matcher, handler) in order
//!     → register_default(handler) at most once
//!     → Freeze as immutable Router when serving starts
//! ```
//!
//! # Design Decisions
//! - Routes frozen at start-up, immutable while serving
//! - No regex: tagged matchers only
//! - Deterministic: first registered match wins, default last
//! - A second default is a configuration error, not a silent override

pub mod matcher;
pub mod router;

pub use matcher::{MatchOutcome, Matcher};
pub use router::{Resolved, Route, RouteError, RouteTable, Router};
