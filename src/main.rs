use caching_proxy::config::Config;
use caching_proxy::server;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "caching-proxy")]
#[command(about = "Forwarding HTTP proxy with a response cache", long_about = None)]
struct Cli {
    /// Port to listen on
    port: u16,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let mut cfg = Config::load(cli.config.as_deref())?;
    cfg.server.port = cli.port;

    tokio::select! {
        res = server::run(&cfg) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
