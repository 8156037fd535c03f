//! Disconnect reconciliation: the single place that unwinds everything a
//! logged-in session held once its socket closes, for any reason.

use crate::catalog::{Catalog, Role};
use crate::rooms::RoomRegistry;
use crate::transfer::TransferManager;
use tracing::info;

/// A session identifies at most one logged-in player username and one
/// logged-in developer username on the same connection; the lobby and
/// developer listeners only ever populate one of the two.
#[derive(Debug, Default, Clone)]
pub struct Session {
    pub player_username: Option<String>,
    pub developer_username: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Runs on every socket close, logged in or not. Removes the session's
/// username from every room it occupies (deleting empty rooms, promoting a
/// new owner if needed), logs it out of the catalog, and abandons any
/// transfers it still owned. Each step is independent and best-effort with
/// respect to the others, matching the reconciliation routine's role as a
/// catch-all rather than a transaction.
pub async fn reconcile_disconnect(
    catalog: &Catalog,
    rooms: &RoomRegistry,
    transfers: &TransferManager,
    session: &Session,
) {
    if let Some(username) = &session.player_username {
        rooms.leave_all(username).await;
        let _ = catalog.logout(username, Role::Player).await;
        transfers.abandon_all_owned_by(username).await;
        info!(username = %username, "reconciled disconnect");
    }
    if let Some(username) = &session.developer_username {
        let _ = catalog.logout(username, Role::Developer).await;
        transfers.abandon_all_owned_by(username).await;
        info!(username = %username, "reconciled developer disconnect");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn disconnect_releases_room_membership_and_online_flag() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(dir.path().to_path_buf()).await;
        let rooms = RoomRegistry::new();
        let transfers = TransferManager::new(
            PathBuf::from(dir.path()).join("tmp"),
            PathBuf::from(dir.path()).join("storage"),
            4096,
        );

        catalog.register("alice", "pw", Role::Player).await.unwrap();
        catalog.login("alice", "pw", Role::Player).await.unwrap();
        let room_id = rooms.create_room("alice", "1", "Pong", 2).await;

        let session = Session {
            player_username: Some("alice".to_string()),
            developer_username: None,
        };
        reconcile_disconnect(&catalog, &rooms, &transfers, &session).await;

        assert!(rooms.get_room(&room_id).await.is_err());
        assert!(!catalog.list_online_users().await.contains(&"alice".to_string()));
    }

    #[tokio::test]
    async fn disconnect_on_a_never_logged_in_session_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(dir.path().to_path_buf()).await;
        let rooms = RoomRegistry::new();
        let transfers = TransferManager::new(
            PathBuf::from(dir.path()).join("tmp"),
            PathBuf::from(dir.path()).join("storage"),
            4096,
        );
        reconcile_disconnect(&catalog, &rooms, &transfers, &Session::new()).await;
    }
}
