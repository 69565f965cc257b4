//! aether-daemon: serves the Aether ledger over JSON-RPC on a Unix socket.

use std::sync::Arc;

use aether_daemon::config::DaemonConfig;
use aether_daemon::rpc::RpcServer;
use aether_daemon::DaemonState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DaemonConfig::load()?;

    let filter = EnvFilter::from_default_env().add_directive(config.log_directive().parse()?);
    tracing_subscriber::fmt().with_env_filter(filter).init();

    std::fs::create_dir_all(config.data_dir())?;
    let socket_path = config.socket_path();
    info!(socket = %socket_path.display(), "Aether daemon starting");

    // Tier bootstrap is applied while building the state.
    let state = Arc::new(DaemonState::new(config)?);
    {
        let ledger = state.ledger.lock().await;
        info!(
            collection = %ledger.collection.address(),
            lootbox = %ledger.lootbox.address(),
            admin = %ledger.lootbox.admin(),
            "Ledger ready"
        );
    }

    let server = RpcServer::new(Arc::clone(&state), socket_path.clone());
    tokio::select! {
        served = server.run() => {
            if let Err(e) = served {
                error!(error = %e, "RPC server stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }

    if let Err(e) = std::fs::remove_file(&socket_path) {
        tracing::debug!(error = %e, "socket already gone");
    }
    info!("Aether daemon stopped");
    Ok(())
}
