use streamhub::{Config, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("streamhub=info")),
        )
        .init();

    let config = Config::from_env()?;
    let server = Server::new(config);
    let hub = server.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            hub.shutdown();
        }
    });

    server.run().await?;
    Ok(())
}
