mod api;

use clap::Parser;
use registry_core::{Chain, ChainConfig, Ed25519Verifier, SystemClock};
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, Level};

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8000
    #[arg(long, default_value = "127.0.0.1:8000")]
    listen: String,

    /// Seconds a signed ownership message stays valid
    #[arg(long, default_value_t = registry_core::constants::VALIDATION_WINDOW_SECS)]
    validation_window: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = ChainConfig {
        validation_window_secs: args.validation_window,
    };
    let chain = Arc::new(Chain::with_parts(Ed25519Verifier, SystemClock, config)?);
    info!(height = chain.height(), "star registry ready");

    let app = api::router(chain);

    let addr: SocketAddr = args.listen.parse()?;
    info!("registry-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
