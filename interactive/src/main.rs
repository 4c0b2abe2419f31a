use anyhow::Result;
use clap::Parser;
use pickboard_interactive::config::ClientConfig;
use pickboard_interactive::{repl, telemetry};

#[derive(Parser)]
#[command(author, version, about = "Terminal client for the Pickboard voting board")]
struct Args {
    /// Backend base URL. Overrides PICKBOARD_API_URL.
    #[arg(long)]
    api_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let args = Args::parse();

    let mut config = ClientConfig::from_env();
    if let Some(url) = args.api_url {
        config = config.with_api_url(url);
    }
    tracing::debug!(?config, "starting");

    repl::run(config).await
}
