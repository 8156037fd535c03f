//! The room registry: a single lock guarding the room list, matching the
//! "single lock guarding the room list and each room's player vector"
//! discipline rather than per-room fine-grained locking.

use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room full")]
    RoomFull,
    #[error("Already in this room")]
    AlreadyInRoom,
    #[error("Only room owner can start the game")]
    NotOwner,
    #[error("Not enough players to start")]
    NotEnoughPlayers,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub room_id: String,
    pub game_id: String,
    pub game_name: String,
    pub max_players: u32,
    pub owner: String,
    pub players: Vec<String>,
    pub is_started: bool,
}

struct RegistryInner {
    rooms: HashMap<String, Room>,
    next_id: u64,
}

/// Owns every `Room`. Sessions only ever hold a room id, never a reference
/// into this map, matching the weak-lookup-key ownership model: the
/// registry is the sole owner of room state.
pub struct RoomRegistry {
    inner: RwLock<RegistryInner>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                rooms: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    pub async fn create_room(
        &self,
        owner: &str,
        game_id: &str,
        game_name: &str,
        max_players: u32,
    ) -> String {
        let mut inner = self.inner.write().await;
        let room_id = inner.next_id.to_string();
        inner.next_id += 1;
        inner.rooms.insert(
            room_id.clone(),
            Room {
                room_id: room_id.clone(),
                game_id: game_id.to_string(),
                game_name: game_name.to_string(),
                max_players,
                owner: owner.to_string(),
                players: vec![owner.to_string()],
                is_started: false,
            },
        );
        debug!(room_id, owner, game_id, "room created");
        room_id
    }

    pub async fn list_rooms(&self) -> Vec<Room> {
        let inner = self.inner.read().await;
        inner.rooms.values().cloned().collect()
    }

    pub async fn get_room(&self, room_id: &str) -> Result<Room, RoomError> {
        let inner = self.inner.read().await;
        inner
            .rooms
            .get(room_id)
            .cloned()
            .ok_or(RoomError::RoomNotFound)
    }

    pub async fn join_room(&self, room_id: &str, username: &str) -> Result<(), RoomError> {
        let mut inner = self.inner.write().await;
        let room = inner
            .rooms
            .get_mut(room_id)
            .ok_or(RoomError::RoomNotFound)?;
        if room.players.iter().any(|p| p == username) {
            return Err(RoomError::AlreadyInRoom);
        }
        if room.players.len() as u32 >= room.max_players {
            return Err(RoomError::RoomFull);
        }
        room.players.push(username.to_string());
        Ok(())
    }

    /// Removes `username` from `room_id`. Deletes the room if it becomes
    /// empty, otherwise promotes `players[0]` to owner if the leaver owned
    /// the room. Used both for the explicit LEAVE_ROOM request and for
    /// disconnect reconciliation.
    pub async fn leave_room(&self, room_id: &str, username: &str) -> Result<(), RoomError> {
        let mut inner = self.inner.write().await;
        let room = inner
            .rooms
            .get_mut(room_id)
            .ok_or(RoomError::RoomNotFound)?;
        let before = room.players.len();
        room.players.retain(|p| p != username);
        if room.players.len() == before {
            // Not a member; treat as a no-op rather than an error so reconciliation
            // can call this unconditionally for every room a departed session might be in.
            return Ok(());
        }
        if room.players.is_empty() {
            inner.rooms.remove(room_id);
        } else if room.owner == username {
            room.owner = room.players[0].clone();
        }
        Ok(())
    }

    /// Removes `username` from every room it currently occupies. Used by
    /// disconnect reconciliation, which does not know which room(s) a
    /// session was in without scanning.
    pub async fn leave_all(&self, username: &str) {
        let room_ids: Vec<String> = {
            let inner = self.inner.read().await;
            inner
                .rooms
                .values()
                .filter(|r| r.players.iter().any(|p| p == username))
                .map(|r| r.room_id.clone())
                .collect()
        };
        for room_id in room_ids {
            let _ = self.leave_room(&room_id, username).await;
        }
    }

    /// Validates that `username` may start `room_id` without mutating
    /// anything, so the caller can perform the (slow) supervisor spawn
    /// outside the lock before calling `mark_started`.
    pub async fn validate_start(&self, room_id: &str, username: &str) -> Result<Room, RoomError> {
        let inner = self.inner.read().await;
        let room = inner
            .rooms
            .get(room_id)
            .cloned()
            .ok_or(RoomError::RoomNotFound)?;
        if room.owner != username {
            return Err(RoomError::NotOwner);
        }
        if room.players.len() as u32 != room.max_players {
            return Err(RoomError::NotEnoughPlayers);
        }
        Ok(room)
    }

    pub async fn mark_started(&self, room_id: &str) -> Result<(), RoomError> {
        let mut inner = self.inner.write().await;
        let room = inner
            .rooms
            .get_mut(room_id)
            .ok_or(RoomError::RoomNotFound)?;
        room.is_started = true;
        Ok(())
    }

    /// Removes a room outright. Called by the supervisor's watcher task
    /// once a started game's process exits.
    pub async fn remove_room(&self, room_id: &str) {
        let mut inner = self.inner.write().await;
        inner.rooms.remove(room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_join_leave_lifecycle() {
        let registry = RoomRegistry::new();
        let room_id = registry.create_room("p1", "game-1", "Pong", 2).await;

        registry.join_room(&room_id, "p2").await.unwrap();
        let err = registry.join_room(&room_id, "p3").await.unwrap_err();
        assert!(matches!(err, RoomError::RoomFull));

        registry.leave_room(&room_id, "p2").await.unwrap();
        let room = registry.get_room(&room_id).await.unwrap();
        assert_eq!(room.players, vec!["p1".to_string()]);

        registry.leave_room(&room_id, "p1").await.unwrap();
        let err = registry.get_room(&room_id).await.unwrap_err();
        assert!(matches!(err, RoomError::RoomNotFound));
    }

    #[tokio::test]
    async fn owner_promotion_on_leave() {
        let registry = RoomRegistry::new();
        let room_id = registry.create_room("p1", "game-1", "Pong", 3).await;
        registry.join_room(&room_id, "p2").await.unwrap();
        registry.join_room(&room_id, "p3").await.unwrap();

        registry.leave_room(&room_id, "p1").await.unwrap();
        let room = registry.get_room(&room_id).await.unwrap();
        assert_eq!(room.owner, "p2");
        assert_eq!(room.players, vec!["p2".to_string(), "p3".to_string()]);
    }

    #[tokio::test]
    async fn start_requires_owner_and_full_roster() {
        let registry = RoomRegistry::new();
        let room_id = registry.create_room("p1", "game-1", "Pong", 2).await;

        let err = registry.validate_start(&room_id, "p1").await.unwrap_err();
        assert!(matches!(err, RoomError::NotEnoughPlayers));

        registry.join_room(&room_id, "p2").await.unwrap();
        let err = registry.validate_start(&room_id, "p2").await.unwrap_err();
        assert!(matches!(err, RoomError::NotOwner));

        registry.validate_start(&room_id, "p1").await.unwrap();
        registry.mark_started(&room_id).await.unwrap();
        let room = registry.get_room(&room_id).await.unwrap();
        assert!(room.is_started);
    }

    #[tokio::test]
    async fn disconnect_reconciliation_promotes_and_deletes() {
        let registry = RoomRegistry::new();
        let r1 = registry.create_room("p1", "game-1", "Pong", 2).await;
        registry.join_room(&r1, "p2").await.unwrap();
        let r2 = registry.create_room("p3", "game-1", "Pong", 1).await;

        registry.leave_all("p1").await;
        let room = registry.get_room(&r1).await.unwrap();
        assert_eq!(room.owner, "p2");

        registry.leave_all("p3").await;
        assert!(registry.get_room(&r2).await.is_err());
    }

    #[tokio::test]
    async fn room_ids_are_monotonic_starting_at_one() {
        let registry = RoomRegistry::new();
        let first = registry.create_room("p1", "game-1", "Pong", 2).await;
        let second = registry.create_room("p2", "game-1", "Pong", 2).await;
        assert_eq!(first, "1");
        assert_eq!(second, "2");
    }
}
