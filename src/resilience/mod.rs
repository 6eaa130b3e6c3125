//! Resilience helpers.
//!
//! # Design Decisions
//! - Reconnect pacing uses jittered exponential backoff
//! - Backoff resets after every successful connection

pub mod backoff;
