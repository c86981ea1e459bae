//! taquilla-daemon: the back-office ledger daemon.
//!
//! Single OS process running a Tokio async runtime. The UI talks to the
//! daemon via JSON-RPC over a Unix socket. A background task replays the
//! offline queue whenever the remote store is reachable again.

mod commands;
mod config;
mod events;
mod remote;
mod rpc;
mod sync_loop;

use std::sync::Arc;

use taquilla_ledger::{ApiKeyRegistry, Backend, PotBook, SalesFeed, WithdrawalLedger};
use taquilla_store::Gateway;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{AdvancedConfig, DaemonConfig};
use crate::events::{Event, EventBus};
use crate::remote::StoreBackend;
use crate::rpc::RpcServer;

/// Daemon-wide shared state.
pub struct DaemonState {
    pub config: DaemonConfig,
    /// Remote gateway, cache mirror and pot locks shared by every component.
    pub backend: Arc<Backend<StoreBackend>>,
    pub ledger: WithdrawalLedger<StoreBackend>,
    pub pots: PotBook<StoreBackend>,
    pub keys: ApiKeyRegistry<StoreBackend>,
    pub sales: SalesFeed<StoreBackend>,
    /// Event bus for pushing events to subscribers.
    pub event_bus: EventBus,
    /// Shutdown signal sender.
    pub shutdown_tx: broadcast::Sender<()>,
}

impl DaemonState {
    /// Wire the components around `remote` and the opened cache database.
    pub async fn new(
        config: DaemonConfig,
        remote: StoreBackend,
        cache: rusqlite::Connection,
    ) -> anyhow::Result<Self> {
        let gateway = Gateway::with_timeout(remote, config.remote.timeout());
        let backend = Arc::new(Backend::new(
            gateway,
            Arc::new(tokio::sync::Mutex::new(cache)),
        ));
        let ledger =
            WithdrawalLedger::open(backend.clone(), config.ledger.max_replay_attempts).await?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            pots: PotBook::new(backend.clone()),
            keys: ApiKeyRegistry::new(backend.clone()),
            sales: SalesFeed::new(backend.clone()),
            ledger,
            backend,
            config,
            event_bus: EventBus::new(1000),
            shutdown_tx,
        })
    }
}

fn init_tracing(advanced: &AdvancedConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("taquilla={}", advanced.log_level).parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if advanced.log_file.is_empty() {
        builder.init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&advanced.log_file)?;
        builder
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config; logging depends on it
    let config = DaemonConfig::load()?;
    init_tracing(&config.advanced)?;

    info!("Taquilla daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open the cache mirror
    let cache = taquilla_db::open(&data_dir.join("taquilla.db"))?;

    // 3. Connect the remote store
    let remote = StoreBackend::from_config(&config.remote)?;
    let backend_kind = remote.kind();
    info!(backend = backend_kind, "remote store configured");

    // 4. Build daemon state
    let state = Arc::new(DaemonState::new(config, remote, cache).await?);

    // 5. Background queue replay
    let sync_task = tokio::spawn(sync_loop::run(
        state.clone(),
        state.shutdown_tx.subscribe(),
    ));

    // 6. Start IPC server
    let socket_path = data_dir.join("daemon.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    state.event_bus.emit(Event::now(
        "DaemonStarted",
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "backend": backend_kind,
        }),
    ));

    // 7. Run the RPC server until shutdown
    let mut shutdown_rx = state.shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    info!("Daemon shutting down gracefully");
    let _ = state.shutdown_tx.send(());
    if let Err(e) = sync_task.await {
        error!("sync task ended abnormally: {}", e);
    }

    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}
