//! Endpoint, storage, transfer and supervisor configuration sections.

use super::defaults::{
    default_chunk_size, default_data_dir, default_developer_host, default_developer_port,
    default_interpreter, default_lobby_host, default_lobby_port, default_max_frame_size,
    default_metrics_snapshot_interval_ms, default_spawn_delay_ms, default_storage_root,
    default_supervisor_host, default_temp_dir,
};
use serde::{Deserialize, Serialize};

/// Host/port pair for one of the two listeners (player-facing lobby, developer-facing).
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EndpointConfig {
    #[serde(default = "default_lobby_host")]
    pub host: String,
    #[serde(default = "default_lobby_port")]
    pub port: u16,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: default_lobby_host(),
            port: default_lobby_port(),
        }
    }
}

impl EndpointConfig {
    pub fn default_developer() -> Self {
        Self {
            host: default_developer_host(),
            port: default_developer_port(),
        }
    }
}

/// Where package bytes and the account/game mirror live on disk.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            data_dir: default_data_dir(),
            temp_dir: default_temp_dir(),
        }
    }
}

/// Chunked upload/update/download behaviour and wire framing limits.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransferConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

/// Per-room game server process launching.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SupervisorConfig {
    /// Host the child game server is told to bind to and the host reported back to clients.
    #[serde(default = "default_supervisor_host")]
    pub server_host: String,
    /// Delay between spawning the child process and replying to START_GAME, giving the
    /// child time to bind its listening socket.
    #[serde(default = "default_spawn_delay_ms")]
    pub spawn_delay_ms: u64,
    /// Interpreter used to launch `server.py`/`main.py` entry points.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Optional inclusive port range to allocate from; `None` lets the OS pick any free port.
    #[serde(default)]
    pub port_range: Option<(u16, u16)>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            server_host: default_supervisor_host(),
            spawn_delay_ms: default_spawn_delay_ms(),
            interpreter: default_interpreter(),
            port_range: None,
        }
    }
}

/// How often the process-lifetime counters are logged.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_snapshot_interval_ms")]
    pub snapshot_interval_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_ms: default_metrics_snapshot_interval_ms(),
        }
    }
}
