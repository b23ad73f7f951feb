use tokio::net::TcpListener;

use syncstream_server::{transport, Config, HubHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syncstream_server=debug,info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let addr = config.bind_addr();

    let hub = HubHandle::spawn();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("SyncStream server listening on http://{}", addr);
    transport::serve(listener, hub).await?;
    Ok(())
}
