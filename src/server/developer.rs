//! The developer-facing listener: developer accounts and the upload,
//! update and delete side of game distribution.

use super::AppState;
use crate::catalog::{CatalogError, Role};
use crate::protocol::messages::*;
use crate::session::{reconcile_disconnect, Session};
use crate::wire::{self, WireError};
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{debug, warn};

pub async fn handle_connection(state: Arc<AppState>, mut socket: TcpStream) {
    let mut session = Session::new();
    loop {
        let value = match wire::read_frame(&mut socket, state.max_frame_size).await {
            Ok(Some(value)) => value,
            Ok(None) => break,
            Err(err) => {
                log_wire_error(&state, &err);
                break;
            }
        };
        let message: ClientMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(err) => {
                warn!(%err, "malformed developer request, ignoring");
                continue;
            }
        };
        if matches!(message, ClientMessage::Unknown) {
            debug!("unknown message type on developer listener, ignoring");
            continue;
        }
        if let Err(err) = dispatch(&state, &mut socket, &mut session, message).await {
            log_wire_error(&state, &err);
            break;
        }
    }
    reconcile_disconnect(&state.catalog, &state.rooms, &state.transfers, &session).await;
}

async fn dispatch(
    state: &Arc<AppState>,
    socket: &mut TcpStream,
    session: &mut Session,
    message: ClientMessage,
) -> Result<(), WireError> {
    match message {
        ClientMessage::DeveloperLogin { username, password } => {
            let result = state
                .catalog
                .login(&username, &password, Role::Developer)
                .await;
            state.metrics.record_login(result.is_ok());
            if result.is_ok() {
                session.developer_username = Some(username);
            }
            let reply = status_from_catalog_result(result, "logged in");
            wire::write_message(socket, "DEVELOPER_LOGIN", &reply).await
        }
        ClientMessage::DeveloperRegister { username, password } => {
            let result = state
                .catalog
                .register(&username, &password, Role::Developer)
                .await;
            state.metrics.record_registration(result.is_ok());
            let reply = status_from_catalog_result(result, "registered");
            wire::write_message(socket, "DEVELOPER_REGISTER", &reply).await
        }
        ClientMessage::DeveloperLogout { username } => {
            let result = state.catalog.logout(&username, Role::Developer).await;
            if result.is_ok() && session.developer_username.as_deref() == Some(username.as_str()) {
                session.developer_username = None;
            }
            let reply = status_from_catalog_result(result, "logged out");
            wire::write_message(socket, "DEVELOPER_LOGOUT", &reply).await
        }
        ClientMessage::DeveloperListGames { username } => {
            let games = state.catalog.list_developer_games(&username).await;
            let reply = DeveloperListGamesReply {
                games: games.iter().map(GameSummaryView::from).collect(),
            };
            wire::write_message(socket, "DEVELOPER_LIST_GAMES", &reply).await
        }
        ClientMessage::UploadGameInit {
            username,
            declared_size,
        } => {
            let reply = match state.transfers.init_upload(&username, declared_size).await {
                Ok(transfer_id) => UploadGameInitReply {
                    success: true,
                    message: "ok".to_string(),
                    transfer_id: Some(transfer_id),
                },
                Err(err) => UploadGameInitReply {
                    success: false,
                    message: err.to_string(),
                    transfer_id: None,
                },
            };
            wire::write_message(socket, "UPLOAD_GAME_INIT", &reply).await
        }
        ClientMessage::UploadGameChunk {
            transfer_id,
            chunk_data,
        } => {
            if let Err(err) = state.transfers.append_chunk(&transfer_id, &chunk_data).await {
                warn!(%err, transfer_id, "upload chunk rejected");
            }
            Ok(())
        }
        ClientMessage::UploadGameFinish {
            transfer_id,
            checksum,
        } => {
            let reply = match state
                .transfers
                .finish_upload(&state.catalog, &transfer_id, &checksum)
                .await
            {
                Ok(game_id) => {
                    state.metrics.increment_games_uploaded();
                    UploadGameFinishReply {
                        success: true,
                        message: "uploaded".to_string(),
                        game_id: Some(game_id),
                    }
                }
                Err(err) => {
                    state.metrics.increment_transfer_failures();
                    UploadGameFinishReply {
                        success: false,
                        message: err.to_string(),
                        game_id: None,
                    }
                }
            };
            wire::write_message(socket, "UPLOAD_GAME_FINISH", &reply).await
        }
        ClientMessage::UpdateGameInit {
            username,
            game_id,
            new_version,
            declared_size,
        } => {
            let reply = match state
                .transfers
                .init_update(&state.catalog, &username, &game_id, &new_version, declared_size)
                .await
            {
                Ok(transfer_id) => UploadGameInitReply {
                    success: true,
                    message: "ok".to_string(),
                    transfer_id: Some(transfer_id),
                },
                Err(err) => UploadGameInitReply {
                    success: false,
                    message: err.to_string(),
                    transfer_id: None,
                },
            };
            wire::write_message(socket, "UPDATE_GAME_INIT", &reply).await
        }
        ClientMessage::UpdateGameChunk {
            transfer_id,
            chunk_data,
        } => {
            if let Err(err) = state.transfers.append_chunk(&transfer_id, &chunk_data).await {
                warn!(%err, transfer_id, "update chunk rejected");
            }
            Ok(())
        }
        ClientMessage::UpdateGameFinish {
            transfer_id,
            checksum,
        } => {
            let reply = match state
                .transfers
                .finish_update(&state.catalog, &transfer_id, &checksum)
                .await
            {
                Ok(()) => {
                    state.metrics.increment_games_updated();
                    StatusReply::ok("updated")
                }
                Err(err) => {
                    state.metrics.increment_transfer_failures();
                    StatusReply::err(err.to_string())
                }
            };
            wire::write_message(socket, "UPDATE_GAME_FINISH", &reply).await
        }
        ClientMessage::DeleteGame { game_id, username } => {
            let result = state.catalog.delete_game(&game_id, &username).await;
            let reply = match result {
                Ok(()) => {
                    state.metrics.increment_games_deleted();
                    let package_dir = state.transfers.storage_root().join(&game_id);
                    match tokio::fs::remove_dir_all(&package_dir).await {
                        Ok(()) => StatusReply::ok("deleted"),
                        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                            StatusReply::ok("deleted")
                        }
                        Err(err) => {
                            warn!(%err, game_id, "failed to remove package directory after delete");
                            StatusReply::ok(format!("deleted, but cleanup failed: {err}"))
                        }
                    }
                }
                Err(err) => StatusReply::err(err.to_string()),
            };
            wire::write_message(socket, "DELETE_GAME", &reply).await
        }
        other => {
            debug!(?other, "message type not handled on developer listener");
            Ok(())
        }
    }
}

fn status_from_catalog_result(result: Result<(), CatalogError>, ok_message: &str) -> StatusReply {
    match result {
        Ok(()) => StatusReply::ok(ok_message),
        Err(err) => StatusReply::err(err.to_string()),
    }
}
