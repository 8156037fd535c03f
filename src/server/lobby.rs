//! The player-facing listener: login/registration, the game catalog,
//! room matchmaking, and the download side of transfers.

use super::AppState;
use crate::catalog::{CatalogError, Role};
use crate::protocol::messages::*;
use crate::rooms::RoomError;
use crate::session::{reconcile_disconnect, Session};
use crate::wire::{self, WireError};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub async fn handle_connection(state: Arc<AppState>, mut socket: TcpStream) {
    let mut session = Session::new();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel();
    loop {
        tokio::select! {
            biased;
            pushed = push_rx.recv() => {
                let Some(value) = pushed else { continue };
                if wire::write_frame(&mut socket, &value).await.is_err() {
                    break;
                }
            }
            frame = wire::read_frame(&mut socket, state.max_frame_size) => {
                let value = match frame {
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
                        warn!(%err, "malformed lobby request, ignoring");
                        continue;
                    }
                };
                if matches!(message, ClientMessage::Unknown) {
                    debug!("unknown message type on lobby listener, ignoring");
                    continue;
                }
                if let Err(err) = dispatch(&state, &mut socket, &mut session, &push_tx, message).await {
                    log_wire_error(&state, &err);
                    break;
                }
            }
        }
    }
    if let Some(username) = &session.player_username {
        state.player_hub.unregister(username);
    }
    reconcile_disconnect(&state.catalog, &state.rooms, &state.transfers, &session).await;
}

fn log_wire_error(state: &AppState, err: &WireError) {
    if !matches!(err, WireError::Closed) {
        state.metrics.increment_internal_errors();
        warn!(%err, "lobby connection wire error");
    }
}

async fn dispatch(
    state: &Arc<AppState>,
    socket: &mut TcpStream,
    session: &mut Session,
    push_tx: &mpsc::UnboundedSender<serde_json::Value>,
    message: ClientMessage,
) -> Result<(), WireError> {
    match message {
        ClientMessage::Login { username, password } => {
            let result = state.catalog.login(&username, &password, Role::Player).await;
            state.metrics.record_login(result.is_ok());
            if result.is_ok() {
                state.player_hub.register(&username, push_tx.clone());
                session.player_username = Some(username);
            }
            let reply = status_from_catalog_result(result, "logged in");
            wire::write_message(socket, "LOGIN", &reply).await
        }
        ClientMessage::Register { username, password } => {
            let result = state
                .catalog
                .register(&username, &password, Role::Player)
                .await;
            state.metrics.record_registration(result.is_ok());
            let reply = status_from_catalog_result(result, "registered");
            wire::write_message(socket, "REGISTER", &reply).await
        }
        ClientMessage::Logout { username } => {
            let result = state.catalog.logout(&username, Role::Player).await;
            if result.is_ok() && session.player_username.as_deref() == Some(username.as_str()) {
                state.player_hub.unregister(&username);
                session.player_username = None;
            }
            let reply = status_from_catalog_result(result, "logged out");
            wire::write_message(socket, "LOGOUT", &reply).await
        }
        ClientMessage::ListOnlineUsers => {
            let online_users = state.catalog.list_online_users().await;
            wire::write_message(
                socket,
                "LIST_ONLINE_USERS",
                &ListOnlineUsersReply { online_users },
            )
            .await
        }
        ClientMessage::ListGames => {
            let games = state.catalog.list_games().await;
            let reply = ListGamesReply {
                games: games.iter().map(GameSummaryView::from).collect(),
            };
            wire::write_message(socket, "LIST_GAMES", &reply).await
        }
        ClientMessage::GetGameDetail { game_id } => {
            let reply = match state.catalog.get_game(&game_id).await {
                Ok(game) => GameDetailReply {
                    success: true,
                    message: "ok".to_string(),
                    game: Some(GameDetailView::from(&game)),
                },
                Err(err) => GameDetailReply {
                    success: false,
                    message: err.to_string(),
                    game: None,
                },
            };
            wire::write_message(socket, "GET_GAME_DETAIL", &reply).await
        }
        ClientMessage::GameReview {
            game_id,
            username,
            score,
            comment,
        } => {
            let result = state
                .catalog
                .add_review(&game_id, &username, score, &comment)
                .await;
            if result.is_ok() {
                state.metrics.increment_reviews_submitted();
            }
            let reply = status_from_catalog_result(result, "review submitted");
            wire::write_message(socket, "GAME_REVIEW", &reply).await
        }
        ClientMessage::ListRooms => {
            let rooms = state.rooms.list_rooms().await;
            let reply = ListRoomsReply {
                rooms: rooms.iter().map(RoomSummaryView::from).collect(),
            };
            wire::write_message(socket, "LIST_ROOMS", &reply).await
        }
        ClientMessage::CreateRoom { game_id, username } => {
            let reply = match state.catalog.get_game(&game_id).await {
                Ok(game) => {
                    let room_id = state
                        .rooms
                        .create_room(&username, &game_id, &game.name, game.max_players)
                        .await;
                    state.metrics.increment_rooms_created();
                    CreateRoomReply {
                        success: true,
                        message: "room created".to_string(),
                        room_id: Some(room_id),
                    }
                }
                Err(err) => CreateRoomReply {
                    success: false,
                    message: err.to_string(),
                    room_id: None,
                },
            };
            wire::write_message(socket, "CREATE_ROOM", &reply).await
        }
        ClientMessage::JoinRoom { room_id, username } => {
            let result = state.rooms.join_room(&room_id, &username).await;
            if result.is_ok() {
                state.metrics.increment_rooms_joined();
            }
            let reply = status_from_room_result(result, "joined room");
            wire::write_message(socket, "JOIN_ROOM", &reply).await
        }
        ClientMessage::LeaveRoom { room_id, username } => {
            let result = state.rooms.leave_room(&room_id, &username).await;
            if result.is_ok() {
                state.metrics.increment_rooms_left();
                if state.rooms.get_room(&room_id).await.is_err() {
                    state.metrics.increment_rooms_deleted();
                }
            }
            let reply = status_from_room_result(result, "left room");
            wire::write_message(socket, "LEAVE_ROOM", &reply).await
        }
        ClientMessage::StartGame { room_id, username } => {
            let reply = handle_start_game(state, &room_id, &username).await;
            wire::write_message(socket, "START_GAME", &reply).await
        }
        ClientMessage::DownloadGameInit { game_id, username } => {
            let _ = username;
            let reply = match state.transfers.init_download(&state.catalog, &game_id).await {
                Ok((transfer_id, file_size, game_version)) => DownloadGameInitReply {
                    success: true,
                    message: "ok".to_string(),
                    transfer_id: Some(transfer_id),
                    file_size: Some(file_size),
                    game_version: Some(game_version),
                },
                Err(err) => DownloadGameInitReply {
                    success: false,
                    message: err.to_string(),
                    transfer_id: None,
                    file_size: None,
                    game_version: None,
                },
            };
            wire::write_message(socket, "DOWNLOAD_GAME_INIT", &reply).await?;
            if let Some(transfer_id) = reply.transfer_id.clone() {
                stream_download(state, socket, &transfer_id).await?;
            }
            Ok(())
        }
        ClientMessage::DownloadGameFinishAck { .. } => Ok(()),
        other => {
            debug!(?other, "message type not handled on lobby listener");
            Ok(())
        }
    }
}

/// Streams every chunk of a download transfer and the trailing FINISH
/// packet. The client drives `DOWNLOAD_GAME_INIT`; everything after that is
/// the server pushing frames without waiting for a request per chunk.
async fn stream_download(
    state: &Arc<AppState>,
    socket: &mut TcpStream,
    transfer_id: &str,
) -> Result<(), WireError> {
    use base64::Engine;
    loop {
        match state.transfers.next_download_chunk(transfer_id).await {
            Ok(Some(bytes)) => {
                let chunk = DownloadGameChunk {
                    transfer_id: transfer_id.to_string(),
                    chunk_data: base64::engine::general_purpose::STANDARD.encode(bytes),
                };
                wire::write_message(socket, "DOWNLOAD_GAME_CHUNK", &chunk).await?;
            }
            Ok(None) => break,
            Err(err) => {
                warn!(%err, transfer_id, "download chunk read failed");
                break;
            }
        }
    }
    match state.transfers.finish_download(&state.catalog, transfer_id).await {
        Ok(checksum) => {
            state.metrics.increment_downloads_completed();
            let finish = DownloadGameFinish {
                transfer_id: transfer_id.to_string(),
                checksum,
            };
            wire::write_message(socket, "DOWNLOAD_GAME_FINISH", &finish).await
        }
        Err(err) => {
            state.metrics.increment_transfer_failures();
            warn!(%err, transfer_id, "download finish failed");
            Ok(())
        }
    }
}

async fn handle_start_game(state: &Arc<AppState>, room_id: &str, username: &str) -> StartGameReply {
    let room = match state.rooms.validate_start(room_id, username).await {
        Ok(room) => room,
        Err(err) => {
            return StartGameReply {
                success: false,
                message: err.to_string(),
                room_id: None,
                game_id: None,
                server_host: None,
                server_port: None,
            }
        }
    };
    let game = match state.catalog.get_game(&room.game_id).await {
        Ok(game) => game,
        Err(err) => {
            return StartGameReply {
                success: false,
                message: err.to_string(),
                room_id: None,
                game_id: None,
                server_host: None,
                server_port: None,
            }
        }
    };
    match state
        .supervisor
        .start_game(
            state.rooms.clone(),
            state.metrics.clone(),
            room_id.to_string(),
            &room.game_id,
            &game.version,
        )
        .await
    {
        Ok((server_host, server_port)) => {
            if let Err(err) = state.rooms.mark_started(room_id).await {
                warn!(%err, room_id, "room vanished right after its game process started");
            }
            state.metrics.increment_games_started();
            let broadcast = wire::envelope(
                "START_GAME",
                &StartGameReply {
                    success: true,
                    message: "started".to_string(),
                    room_id: Some(room_id.to_string()),
                    game_id: Some(room.game_id.clone()),
                    server_host: Some(server_host.clone()),
                    server_port: Some(server_port),
                },
            );
            for player in room.players.iter().filter(|p| p.as_str() != username) {
                state.player_hub.send_to(player, broadcast.clone());
            }
            StartGameReply {
                success: true,
                message: "started".to_string(),
                room_id: Some(room_id.to_string()),
                game_id: Some(room.game_id.clone()),
                server_host: Some(server_host),
                server_port: Some(server_port),
            }
        }
        Err(err) => {
            state.metrics.increment_game_start_failures();
            StartGameReply {
                success: false,
                message: err.to_string(),
                room_id: None,
                game_id: None,
                server_host: None,
                server_port: None,
            }
        }
    }
}

fn status_from_catalog_result(result: Result<(), CatalogError>, ok_message: &str) -> StatusReply {
    match result {
        Ok(()) => StatusReply::ok(ok_message),
        Err(err) => StatusReply::err(err.to_string()),
    }
}

fn status_from_room_result(result: Result<(), RoomError>, ok_message: &str) -> StatusReply {
    match result {
        Ok(()) => StatusReply::ok(ok_message),
        Err(err) => StatusReply::err(err.to_string()),
    }
}
