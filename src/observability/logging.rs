//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - RUST_LOG overrides the configured level when set

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the env filter: RUST_LOG if set, otherwise `pbx_bridge=<level>`.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pbx_bridge={default_level},member_greeting={default_level}")))
}

/// Initialize the global subscriber writing to stdout.
pub fn init(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize the global subscriber writing to stderr.
///
/// Used by the AGI script binary, whose stdout belongs to the switch.
pub fn init_stderr(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
