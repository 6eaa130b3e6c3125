//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound FastAGI connection from the switch
//!     → listener.rs (accept loop, session limit)
//!     → connection.rs (session id, in-flight tracking)
//!     → Hand off to the agi adapter and dispatcher
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion under call storms
//! - Each session tracked so shutdown can wait for in-flight calls

pub mod connection;
pub mod listener;
