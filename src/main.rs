use std::error::Error;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flowsheet::api::rest::RestApi;
use flowsheet::config::{load_config, Config};
use flowsheet::storage::EntryStore;
use flowsheet::FlowsheetResult;

/// Load configuration and chart any seed entries.
fn setup(config_path: &Path) -> FlowsheetResult<(Config, Arc<EntryStore>)> {
    let config = load_config(config_path)?;
    let store = EntryStore::new();

    if let Some(seed_path) = &config.seed_path {
        store.load_seed(seed_path, chrono::Local::now().naive_local())?;
    }

    Ok((config, Arc::new(store)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("flowsheet=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yaml"));

    let (config, store) = setup(&config_path)?;
    let api = RestApi::new(Arc::clone(&store), config.flowsheet.clone());

    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port).parse()?;
    info!(%addr, default_group = %config.flowsheet.default_group, "starting flowsheet server");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let (_, server) = warp::serve(api.routes())
        .try_bind_with_graceful_shutdown(addr, async move {
            shutdown_rx.await.ok();
            info!("shutting down server");
        })?;

    let server_handle = tokio::spawn(server);

    signal::ctrl_c().await?;
    info!("ctrl+c received, starting graceful shutdown");
    shutdown_tx.send(()).ok();

    if let Err(e) = server_handle.await {
        error!(error = %e, "server task failed");
        return Err(e.into());
    }

    info!("server shutdown complete");
    Ok(())
}
