//! Wire message shapes for the lobby and developer listeners.
//!
//! Requests are internally tagged on a flat `"type"` field (no nested `"data"` wrapper,
//! unlike a matchmaking-style adjacently-tagged protocol) so the JSON matches the
//! original prototype's `packet["type"]` convention. Replies are built with
//! [`crate::wire::envelope`] from plain structs below rather than from this enum.

use serde::{Deserialize, Serialize};

/// Requests accepted on the lobby listener (player-facing) and developer listener.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "LOGIN")]
    Login { username: String, password: String },
    #[serde(rename = "REGISTER")]
    Register { username: String, password: String },
    #[serde(rename = "LOGOUT")]
    Logout { username: String },
    #[serde(rename = "LIST_ONLINE_USERS")]
    ListOnlineUsers,
    #[serde(rename = "LIST_GAMES")]
    ListGames,
    #[serde(rename = "GET_GAME_DETAIL")]
    GetGameDetail { game_id: String },
    #[serde(rename = "GAME_REVIEW")]
    GameReview {
        game_id: String,
        username: String,
        score: i64,
        comment: String,
    },
    #[serde(rename = "LIST_ROOMS")]
    ListRooms,
    #[serde(rename = "CREATE_ROOM")]
    CreateRoom { game_id: String, username: String },
    #[serde(rename = "JOIN_ROOM")]
    JoinRoom { room_id: String, username: String },
    #[serde(rename = "LEAVE_ROOM")]
    LeaveRoom { room_id: String, username: String },
    #[serde(rename = "START_GAME")]
    StartGame { room_id: String, username: String },

    #[serde(rename = "DOWNLOAD_GAME_INIT")]
    DownloadGameInit { game_id: String, username: String },
    #[serde(rename = "DOWNLOAD_GAME_FINISH_ACK")]
    DownloadGameFinishAck { transfer_id: String },

    #[serde(rename = "UPLOAD_GAME_INIT")]
    UploadGameInit {
        username: String,
        declared_size: u64,
    },
    #[serde(rename = "UPLOAD_GAME_CHUNK")]
    UploadGameChunk {
        transfer_id: String,
        chunk_data: String,
    },
    #[serde(rename = "UPLOAD_GAME_FINISH")]
    UploadGameFinish {
        transfer_id: String,
        checksum: String,
    },

    #[serde(rename = "UPDATE_GAME_INIT")]
    UpdateGameInit {
        username: String,
        game_id: String,
        new_version: String,
        declared_size: u64,
    },
    #[serde(rename = "UPDATE_GAME_CHUNK")]
    UpdateGameChunk {
        transfer_id: String,
        chunk_data: String,
    },
    #[serde(rename = "UPDATE_GAME_FINISH")]
    UpdateGameFinish {
        transfer_id: String,
        checksum: String,
    },

    #[serde(rename = "DELETE_GAME")]
    DeleteGame { game_id: String, username: String },

    #[serde(rename = "DEVELOPER_LOGIN")]
    DeveloperLogin { username: String, password: String },
    #[serde(rename = "DEVELOPER_REGISTER")]
    DeveloperRegister { username: String, password: String },
    #[serde(rename = "DEVELOPER_LOGOUT")]
    DeveloperLogout { username: String },
    #[serde(rename = "DEVELOPER_LIST_GAMES")]
    DeveloperListGames { username: String },

    /// Anything whose `"type"` does not match a known request is logged and dropped.
    #[serde(other)]
    Unknown,
}

/// `{success, message}` reply shared by most action endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReply {
    pub success: bool,
    pub message: String,
}

impl StatusReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRoomReply {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartGameReply {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListOnlineUsersReply {
    pub online_users: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameSummaryView {
    pub game_id: String,
    pub game_name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub max_players: u32,
    pub download_count: u64,
    pub average_rating: f64,
}

impl From<&crate::catalog::Game> for GameSummaryView {
    fn from(game: &crate::catalog::Game) -> Self {
        Self {
            game_id: game.game_id.clone(),
            game_name: game.name.clone(),
            description: game.description.clone(),
            version: game.version.clone(),
            author: game.author.clone(),
            max_players: game.max_players,
            download_count: game.download_count,
            average_rating: game.average_rating().unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListGamesReply {
    pub games: Vec<GameSummaryView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub reviewer: String,
    pub score: u8,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameDetailView {
    #[serde(flatten)]
    pub summary: GameSummaryView,
    pub reviews: Vec<ReviewView>,
}

impl From<&crate::catalog::Game> for GameDetailView {
    fn from(game: &crate::catalog::Game) -> Self {
        Self {
            summary: GameSummaryView::from(game),
            reviews: game
                .reviews
                .iter()
                .map(|r| ReviewView {
                    reviewer: r.reviewer.clone(),
                    score: r.score,
                    comment: r.comment.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GameDetailReply {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<GameDetailView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomSummaryView {
    pub room_id: String,
    pub game_id: String,
    pub game_name: String,
    pub max_players: u32,
    pub room_owner: String,
    pub players: Vec<String>,
    pub is_started: bool,
}

impl From<&crate::rooms::Room> for RoomSummaryView {
    fn from(room: &crate::rooms::Room) -> Self {
        Self {
            room_id: room.room_id.clone(),
            game_id: room.game_id.clone(),
            game_name: room.game_name.clone(),
            max_players: room.max_players,
            room_owner: room.owner.clone(),
            players: room.players.clone(),
            is_started: room.is_started,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListRoomsReply {
    pub rooms: Vec<RoomSummaryView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadGameInitReply {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadGameChunk {
    pub transfer_id: String,
    pub chunk_data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadGameFinish {
    pub transfer_id: String,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadGameInitReply {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadGameFinishReply {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeveloperListGamesReply {
    pub games: Vec<GameSummaryView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_login_request() {
        let raw = serde_json::json!({"type": "LOGIN", "username": "a", "password": "b"});
        let msg: ClientMessage = serde_json::from_value(raw).unwrap();
        match msg {
            ClientMessage::Login { username, password } => {
                assert_eq!(username, "a");
                assert_eq!(password, "b");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_falls_back_to_unknown_variant() {
        let raw = serde_json::json!({"type": "SOMETHING_NEW", "foo": 1});
        let msg: ClientMessage = serde_json::from_value(raw).unwrap();
        assert!(matches!(msg, ClientMessage::Unknown));
    }

    #[test]
    fn status_reply_helpers_set_success_flag() {
        assert!(StatusReply::ok("done").success);
        assert!(!StatusReply::err("nope").success);
    }
}
