//! pbx-bridge: FastAGI call-control server with chat notifications.
//!
//! # Architecture Overview
//!
//! ```text
//!     Switch (FastAGI)          ┌──────────────────────────────────────────────┐
//!     ──────────────────────────┼─▶ net::Listener ─▶ agi::AgiSession           │
//!                               │                        │                      │
//!                               │                        ▼                      │
//!                               │               routing::Router (first match)   │
//!                               │                        │                      │
//!                               │                        ▼                      │
//!                               │               handlers::{demo,slack,welcome}  │
//!                               │                        │                      │
//!                               │                        ▼                      │
//!     Chat workspace  ◀─────────┼──────────── chat::ChatNotifier (keep-alive)  │
//!                               │                                              │
//!                               │  config · observability · lifecycle          │
//!                               └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use pbx_bridge::config::{load_config, Settings};
use pbx_bridge::lifecycle::startup;
use pbx_bridge::observability::logging;

#[derive(Parser)]
#[command(name = "pbx-bridge")]
#[command(about = "FastAGI call-control server with chat notifications", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "pbx-bridge.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_config(&cli.config).and_then(|c| Settings::from_config(&c)) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("pbx-bridge: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(&settings.log_level);

    match startup::run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}
