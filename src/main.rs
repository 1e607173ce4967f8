use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use video_resolve_proxy::config::Config;
use video_resolve_proxy::proxy::ProxyServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    let state = video_resolve_proxy::build_state(&config).context("failed to build upstream client")?;

    let server = ProxyServer::bind(config.listen, state)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?
        .with_sweep_interval(config.sweep_interval());

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    server.run(shutdown).await?;
    Ok(())
}
