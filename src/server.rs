//! Listener orchestration: binds the lobby and developer sockets and wires
//! together the catalog, room registry, transfer manager and supervisor
//! every connection handler shares.

/// Developer-listener dispatch: developer accounts, upload/update/delete.
pub mod developer;
/// Per-username push channel used for the START_GAME broadcast.
pub mod hub;
/// Lobby-listener dispatch: player accounts, catalog browsing, rooms, downloads.
pub mod lobby;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::metrics::ServerMetrics;
use crate::rooms::RoomRegistry;
use crate::supervisor::GameSupervisor;
use crate::transfer::TransferManager;
use anyhow::Result;
use hub::PlayerHub;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Duration;

/// Everything a connection handler needs, shared across every accepted
/// socket on both listeners.
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub rooms: Arc<RoomRegistry>,
    pub transfers: Arc<TransferManager>,
    pub supervisor: Arc<GameSupervisor>,
    pub metrics: Arc<ServerMetrics>,
    pub player_hub: Arc<PlayerHub>,
    pub max_frame_size: usize,
}

impl AppState {
    pub async fn new(cfg: &Config) -> Arc<Self> {
        let data_dir = PathBuf::from(&cfg.storage.data_dir);
        let storage_root = PathBuf::from(&cfg.storage.root);
        let temp_dir = PathBuf::from(&cfg.storage.temp_dir);

        Arc::new(Self {
            catalog: Catalog::new(data_dir).await,
            rooms: Arc::new(RoomRegistry::new()),
            transfers: Arc::new(TransferManager::new(
                temp_dir,
                storage_root.clone(),
                cfg.transfer.chunk_size,
            )),
            supervisor: Arc::new(
                GameSupervisor::new(
                    storage_root,
                    cfg.supervisor.server_host.clone(),
                    cfg.supervisor.interpreter.clone(),
                    cfg.supervisor.spawn_delay_ms,
                )
                .with_port_range(cfg.supervisor.port_range),
            ),
            metrics: Arc::new(ServerMetrics::new()),
            player_hub: Arc::new(PlayerHub::new()),
            max_frame_size: cfg.transfer.max_frame_size,
        })
    }
}

/// Binds both listeners and runs their accept loops until one of them
/// fails. Each accepted socket is handed to an independent task that runs
/// a serial read/dispatch/write loop until the connection closes.
pub async fn run(cfg: Arc<Config>) -> Result<()> {
    let state = AppState::new(&cfg).await;

    let lobby_listener = TcpListener::bind((cfg.lobby.host.as_str(), cfg.lobby.port)).await?;
    let developer_listener =
        TcpListener::bind((cfg.developer.host.as_str(), cfg.developer.port)).await?;

    tracing::info!(addr = %lobby_listener.local_addr()?, "lobby listener bound");
    tracing::info!(addr = %developer_listener.local_addr()?, "developer listener bound");

    let metrics_state = state.clone();
    let metrics_interval = Duration::from_millis(cfg.metrics.snapshot_interval_ms);
    tokio::spawn(async move {
        metrics_snapshot_task(metrics_state, metrics_interval).await;
    });

    let lobby_state = state.clone();
    let lobby_task = tokio::spawn(async move {
        loop {
            match lobby_listener.accept().await {
                Ok((socket, _peer)) => {
                    let state = lobby_state.clone();
                    tokio::spawn(async move {
                        state.metrics.increment_connections();
                        lobby::handle_connection(state.clone(), socket).await;
                        state.metrics.decrement_active_connections();
                    });
                }
                Err(err) => {
                    tracing::warn!(%err, "failed to accept lobby connection");
                }
            }
        }
    });

    let developer_state = state.clone();
    let developer_task = tokio::spawn(async move {
        loop {
            match developer_listener.accept().await {
                Ok((socket, _peer)) => {
                    let state = developer_state.clone();
                    tokio::spawn(async move {
                        state.metrics.increment_connections();
                        developer::handle_connection(state.clone(), socket).await;
                        state.metrics.decrement_active_connections();
                    });
                }
                Err(err) => {
                    tracing::warn!(%err, "failed to accept developer connection");
                }
            }
        }
    });

    tokio::select! {
        res = lobby_task => res?,
        res = developer_task => res?,
    }
    Ok(())
}

/// Logs a `ServerMetrics` snapshot on a fixed interval for the lifetime of the process.
async fn metrics_snapshot_task(state: Arc<AppState>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let snapshot = state.metrics.snapshot();
        tracing::info!(?snapshot, "metrics snapshot");
    }
}
