//! Command-line parsing and startup.

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use tracing::warn;

use crate::core::config::{resolve_host, Config, HOST_ENV};
use crate::ui::chat_loop::run_app;
use crate::utils::logging::init_file_logging;

#[derive(Parser, Debug)]
#[command(name = "ollama-tui", version)]
#[command(about = "A terminal client for a local Ollama daemon")]
#[command(
    long_about = "ollama-tui lists the models a local Ollama daemon has installed, \
installs new ones with live progress, and runs streaming chats with optional \
file or directory context.\n\n\
Environment Variables:\n\
  OLLAMA_HOST       Daemon address (used when --host is not given)\n\
  RUST_LOG          Log filter when --log is given (default ollama_tui=info)\n\n\
Controls:\n\
  Models            Enter chat, i install, p pull by name, r refresh, q quit\n\
  Chat              Enter send, Alt+Enter new line, Ctrl+O attach context,\n\
                    Esc interrupt or go back\n\
  Anywhere          Ctrl+C quit"
)]
pub struct Args {
    /// Daemon address, e.g. http://127.0.0.1:11434
    #[arg(long, value_name = "URL")]
    pub host: Option<String>,

    /// Write diagnostic logs to this file
    #[arg(short = 'l', long, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    if let Some(path) = &args.log {
        init_file_logging(path)?;
    }

    let config = Config::load()?;
    let env_host = std::env::var(HOST_ENV).ok();
    if env_host.is_some() && args.host.is_some() {
        warn!("--host overrides {HOST_ENV}");
    }
    let host = resolve_host(args.host.as_deref(), env_host.as_deref(), &config);

    run_app(host, &config).await
}
