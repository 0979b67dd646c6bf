use anyhow::{Context, Result};

use aou::config::parse_args;
use aou::{handlers, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with env_logger
    env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .init();

    let launch = parse_args()?;
    log::info!("Server configuration: {:?}", launch);

    let mut server = Server::new(launch.server);
    handlers::register(&mut server)?;

    let instance = server
        .listen(&launch.host, launch.port)
        .await
        .with_context(|| format!("Failed to listen on {}:{}", launch.host, launch.port))?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    log::info!("Shutting down");
    instance.shutdown().await;

    Ok(())
}
