//! docchat binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing on stderr
//! 3. Build the HTTP service client and the chat client
//! 4. Run the interactive loop on stdin/stdout

mod cli;
mod render;
mod repl;

use std::sync::Arc;

use clap::Parser;
use docchat_client::HttpRemoteService;
use docchat_core::config::DocChatConfig;
use docchat_session::ChatClient;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use crate::cli::CliArgs;
use crate::repl::Repl;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = DocChatConfig::load_or_default(&config_file);
    args.apply(&mut config);

    // Tracing. Logs go to stderr so they stay out of the conversation.
    let filter = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting docchat v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");
    if let Err(e) = config.validate() {
        tracing::warn!(error = %e, "Configuration incomplete");
    }

    // Service + client.
    let service = Arc::new(HttpRemoteService::from_config(&config));
    if let Some(url) = service.base_url() {
        tracing::info!(base_url = %url, "Using retrieval service");
    }
    let client = ChatClient::new(service, config.uploads.clone());

    // REPL.
    let mut repl = Repl::new(client, std::io::stdout());
    repl.start(args.title.clone()).await?;
    repl.run(BufReader::new(tokio::io::stdin())).await?;

    tracing::info!("docchat exiting");
    Ok(())
}
