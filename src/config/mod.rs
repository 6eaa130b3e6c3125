//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (flat TOML table)
//!     → loader.rs (read & flatten scalars to strings)
//!     → Config (immutable key/value map)
//!     → validation.rs (presence & range checks)
//!     → Settings (typed view, shared by the binaries)
//! ```
//!
//! # Design Decisions
//! - Config is read once at start-up and never reloaded
//! - Only a single flat table is accepted; nesting is a parse error
//! - Validation reports every problem, not just the first

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{Config, Settings};
