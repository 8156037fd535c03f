//! Spawns and tracks the per-room game-server subprocess started by
//! `START_GAME`, and reclaims the room once that process exits.

use crate::metrics::ServerMetrics;
use crate::rooms::RoomRegistry;
use std::collections::HashMap;
use std::net::TcpListener as StdTcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("no launch script (server.py or main.py) found under {0}")]
    NoLaunchScript(PathBuf),
    #[error("failed to allocate a port: {0}")]
    PortAllocation(std::io::Error),
    #[error("failed to spawn game process: {0}")]
    Spawn(std::io::Error),
}

struct RunningProcess {
    #[allow(dead_code)]
    port: u16,
}

/// Owns every spawned game-server child process, keyed by room id. The
/// `tokio::process::Child` itself lives only inside the watcher task; this
/// table exists so callers can ask "is this room's process still tracked."
pub struct GameSupervisor {
    processes: Mutex<HashMap<String, RunningProcess>>,
    storage_root: PathBuf,
    lobby_host: String,
    interpreter: String,
    spawn_delay: Duration,
    port_range: Option<(u16, u16)>,
}

impl GameSupervisor {
    pub fn new(
        storage_root: PathBuf,
        lobby_host: String,
        interpreter: String,
        spawn_delay_ms: u64,
    ) -> Self {
        Self {
            processes: Mutex::new(HashMap::new()),
            storage_root,
            lobby_host,
            interpreter,
            spawn_delay: Duration::from_millis(spawn_delay_ms),
            port_range: None,
        }
    }

    pub fn with_port_range(mut self, port_range: Option<(u16, u16)>) -> Self {
        self.port_range = port_range;
        self
    }

    fn resolve_launch_script(&self, game_id: &str, version: &str) -> Result<PathBuf, SupervisorError> {
        let server_dir = self.storage_root.join(game_id).join(version).join("server");
        for candidate in ["server.py", "main.py"] {
            let path = server_dir.join(candidate);
            if path.is_file() {
                return Ok(path);
            }
        }
        Err(SupervisorError::NoLaunchScript(server_dir))
    }

    /// Binds to port 0 (or, if `port_range` is configured, the first free
    /// port in that inclusive range) to let the OS assign a free port, then
    /// releases it immediately. There is an inherent TOCTOU race between
    /// release and the child's own bind; a child that loses the race is
    /// expected to exit promptly, which the watcher task observes as a
    /// normal (if early) exit.
    fn allocate_port(&self) -> Result<u16, SupervisorError> {
        let Some((low, high)) = self.port_range else {
            let listener =
                StdTcpListener::bind(("0.0.0.0", 0)).map_err(SupervisorError::PortAllocation)?;
            let port = listener
                .local_addr()
                .map_err(SupervisorError::PortAllocation)?
                .port();
            drop(listener);
            return Ok(port);
        };

        for port in low..=high {
            if let Ok(listener) = StdTcpListener::bind(("0.0.0.0", port)) {
                drop(listener);
                return Ok(port);
            }
        }
        Err(SupervisorError::PortAllocation(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            format!("no free port in {low}..={high}"),
        )))
    }

    /// Spawns the game server for `room_id`, waits the configured grace
    /// period for it to bind, and registers a watcher that reclaims the
    /// room when the process exits. Returns the host/port the room's
    /// players should connect to.
    pub async fn start_game(
        &self,
        rooms: Arc<RoomRegistry>,
        metrics: Arc<ServerMetrics>,
        room_id: String,
        game_id: &str,
        version: &str,
    ) -> Result<(String, u16), SupervisorError> {
        let script = self.resolve_launch_script(game_id, version)?;
        let working_dir = script
            .parent()
            .expect("launch script always has a parent directory")
            .to_path_buf();
        let port = self.allocate_port()?;

        let mut child = Command::new(&self.interpreter)
            .arg(&script)
            .arg(&self.lobby_host)
            .arg(port.to_string())
            .current_dir(&working_dir)
            .kill_on_drop(true)
            .spawn()
            .map_err(SupervisorError::Spawn)?;

        self.processes
            .lock()
            .await
            .insert(room_id.clone(), RunningProcess { port });

        let watched_room_id = room_id.clone();
        let watcher_rooms = rooms;
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => info!(room_id = %watched_room_id, %status, "game process exited"),
                Err(err) => warn!(room_id = %watched_room_id, %err, "failed to wait on game process"),
            }
            metrics.increment_supervised_processes_exited();
            watcher_rooms.remove_room(&watched_room_id).await;
        });

        tokio::time::sleep(self.spawn_delay).await;
        Ok((self.lobby_host.clone(), port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_port_honors_configured_range() {
        let supervisor = GameSupervisor::new(
            PathBuf::from("storage"),
            "127.0.0.1".to_string(),
            "python3".to_string(),
            0,
        )
        .with_port_range(Some((40000, 40010)));
        let port = supervisor.allocate_port().unwrap();
        assert!((40000..=40010).contains(&port));
    }

    #[test]
    fn allocate_port_returns_nonzero() {
        let supervisor = GameSupervisor::new(
            PathBuf::from("storage"),
            "127.0.0.1".to_string(),
            "python3".to_string(),
            0,
        );
        let port = supervisor.allocate_port().unwrap();
        assert_ne!(port, 0);
    }

    #[test]
    fn resolve_launch_script_prefers_server_py() {
        let dir = tempfile::tempdir().unwrap();
        let server_dir = dir.path().join("1/1.0.0/server");
        std::fs::create_dir_all(&server_dir).unwrap();
        std::fs::write(server_dir.join("server.py"), b"# server").unwrap();
        std::fs::write(server_dir.join("main.py"), b"# main").unwrap();

        let supervisor = GameSupervisor::new(
            dir.path().to_path_buf(),
            "127.0.0.1".to_string(),
            "python3".to_string(),
            0,
        );
        let script = supervisor.resolve_launch_script("1", "1.0.0").unwrap();
        assert_eq!(script.file_name().unwrap(), "server.py");
    }

    #[test]
    fn resolve_launch_script_falls_back_to_main_py() {
        let dir = tempfile::tempdir().unwrap();
        let server_dir = dir.path().join("1/1.0.0/server");
        std::fs::create_dir_all(&server_dir).unwrap();
        std::fs::write(server_dir.join("main.py"), b"# main").unwrap();

        let supervisor = GameSupervisor::new(
            dir.path().to_path_buf(),
            "127.0.0.1".to_string(),
            "python3".to_string(),
            0,
        );
        let script = supervisor.resolve_launch_script("1", "1.0.0").unwrap();
        assert_eq!(script.file_name().unwrap(), "main.py");
    }

    #[test]
    fn resolve_launch_script_errors_when_neither_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("1/1.0.0/server")).unwrap();

        let supervisor = GameSupervisor::new(
            dir.path().to_path_buf(),
            "127.0.0.1".to_string(),
            "python3".to_string(),
            0,
        );
        let err = supervisor.resolve_launch_script("1", "1.0.0").unwrap_err();
        assert!(matches!(err, SupervisorError::NoLaunchScript(_)));
    }
}
