//! Best-effort mirroring of the in-memory catalog to JSON files under the
//! configured data directory. The in-memory state is always authoritative;
//! a failed or missing mirror never blocks a request, it only loses the
//! operator's ability to inspect/restore state across restarts.

use super::accounts::Account;
use super::games::Game;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

fn players_path(data_dir: &Path) -> PathBuf {
    data_dir.join("users.json")
}

fn developers_path(data_dir: &Path) -> PathBuf {
    data_dir.join("developers.json")
}

fn games_path(data_dir: &Path) -> PathBuf {
    data_dir.join("games.json")
}

async fn load_map<T>(path: &Path, label: &str) -> HashMap<String, T>
where
    T: serde::de::DeserializeOwned,
{
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!(path = %path.display(), %err, "failed to parse {label} mirror, starting empty");
            HashMap::new()
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to read {label} mirror, starting empty");
            HashMap::new()
        }
    }
}

async fn save_map<T>(path: &Path, data: &HashMap<String, T>, label: &str)
where
    T: serde::Serialize,
{
    if let Some(parent) = path.parent() {
        if let Err(err) = tokio::fs::create_dir_all(parent).await {
            warn!(path = %parent.display(), %err, "failed to create data directory for {label} mirror");
            return;
        }
    }
    let body = match serde_json::to_vec_pretty(data) {
        Ok(body) => body,
        Err(err) => {
            warn!(%err, "failed to serialize {label} mirror");
            return;
        }
    };
    if let Err(err) = tokio::fs::write(path, body).await {
        warn!(path = %path.display(), %err, "failed to write {label} mirror");
    }
}

pub async fn load_players(data_dir: &Path) -> HashMap<String, Account> {
    load_map(&players_path(data_dir), "players").await
}

pub async fn load_developers(data_dir: &Path) -> HashMap<String, Account> {
    load_map(&developers_path(data_dir), "developers").await
}

pub async fn load_games(data_dir: &Path) -> HashMap<String, Game> {
    load_map(&games_path(data_dir), "games").await
}

pub async fn save_players(data_dir: &Path, players: &HashMap<String, Account>) {
    save_map(&players_path(data_dir), players, "players").await;
}

pub async fn save_developers(data_dir: &Path, developers: &HashMap<String, Account>) {
    save_map(&developers_path(data_dir), developers, "developers").await;
}

pub async fn save_games(data_dir: &Path, games: &HashMap<String, Game>) {
    save_map(&games_path(data_dir), games, "games").await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::accounts::Account;

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let players = load_players(dir.path()).await;
        assert!(players.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut players = HashMap::new();
        players.insert("alice".to_string(), Account::new("alice", "hunter2"));
        save_players(dir.path(), &players).await;

        let loaded = load_players(dir.path()).await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["alice"].password, "hunter2");
    }

    #[tokio::test]
    async fn unparsable_file_loads_as_empty_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join("users.json"), b"not json")
            .await
            .unwrap();
        let players = load_players(dir.path()).await;
        assert!(players.is_empty());
    }
}
