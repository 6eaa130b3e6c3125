//! Greets a caller by looking them up in the member directory.
//!
//! Run from the dialplan as a plain AGI script, the AGI environment on stdin
//! supplies the caller id and the greeting is stored in the `WELCOME` channel
//! variable. Run by hand, `--caller` supplies the number and the greeting is
//! printed.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use pbx_bridge::config::load_config;
use pbx_bridge::directory::JsonDirectory;
use pbx_bridge::handlers::greet_caller;
use pbx_bridge::observability::logging;

#[derive(Parser)]
#[command(name = "member-greeting")]
#[command(about = "Look up a caller in the member directory and greet them", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "pbx-bridge.toml")]
    config: PathBuf,

    /// Caller number, used when no AGI environment is available
    #[arg(long)]
    caller: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("member-greeting: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli.config)?;
    logging::init_stderr(config.get("LOG_LEVEL").unwrap_or("info"));

    let directory = JsonDirectory::load(Path::new(config.require("DIRECTORY_FILE")?))?;

    let stdio = tokio::io::join(tokio::io::stdin(), tokio::io::stdout());
    let read_environment = !std::io::stdin().is_terminal();
    let delivery = greet_caller(stdio, read_environment, cli.caller.as_deref(), &directory).await?;
    tracing::debug!(?delivery, "Greeting finished");
    Ok(())
}
