//! End-to-end tests driving the wire protocol over real TCP sockets against
//! the lobby and developer dispatch used in production, rather than calling
//! the catalog/room/transfer APIs directly.

use base64::Engine;
use lobby_server::catalog::Catalog;
use lobby_server::rooms::RoomRegistry;
use lobby_server::server::hub::PlayerHub;
use lobby_server::server::{developer, lobby, AppState};
use lobby_server::supervisor::GameSupervisor;
use lobby_server::transfer::TransferManager;
use lobby_server::{metrics::ServerMetrics, wire};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

async fn test_state(root: &std::path::Path) -> Arc<AppState> {
    let storage_root = root.join("storage");
    Arc::new(AppState {
        catalog: Catalog::new(root.join("data")).await,
        rooms: Arc::new(RoomRegistry::new()),
        transfers: Arc::new(TransferManager::new(
            root.join("tmp"),
            storage_root.clone(),
            4096,
        )),
        supervisor: Arc::new(GameSupervisor::new(
            storage_root,
            "127.0.0.1".to_string(),
            "python3".to_string(),
            50,
        )),
        metrics: Arc::new(ServerMetrics::new()),
        player_hub: Arc::new(PlayerHub::new()),
        max_frame_size: 16 * 1024 * 1024,
    })
}

async fn spawn_lobby(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let state = state.clone();
            tokio::spawn(async move { lobby::handle_connection(state, socket).await });
        }
    });
    addr
}

async fn spawn_developer(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let state = state.clone();
            tokio::spawn(async move { developer::handle_connection(state, socket).await });
        }
    });
    addr
}

async fn request(socket: &mut TcpStream, kind: &str, payload: Value) -> Value {
    let mut body = payload;
    if let Value::Object(map) = &mut body {
        map.insert("type".to_string(), Value::String(kind.to_string()));
    }
    wire::write_frame(socket, &body).await.unwrap();
    wire::read_frame(socket, 16 * 1024 * 1024)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn register_then_duplicate_register_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let state = test_state(root.path()).await;
    let addr = spawn_lobby(state).await;
    let mut socket = TcpStream::connect(addr).await.unwrap();

    let first = request(
        &mut socket,
        "REGISTER",
        json!({"username": "alice", "password": "pw"}),
    )
    .await;
    assert_eq!(first["success"], true);

    let second = request(
        &mut socket,
        "REGISTER",
        json!({"username": "alice", "password": "pw2"}),
    )
    .await;
    assert_eq!(second["success"], false);
    assert_eq!(second["message"], "Username already exists");

    let bad_password = request(
        &mut socket,
        "LOGIN",
        json!({"username": "alice", "password": "p2"}),
    )
    .await;
    assert_eq!(bad_password["success"], false);
    assert_eq!(bad_password["message"], "Incorrect password");

    let ok_login = request(
        &mut socket,
        "LOGIN",
        json!({"username": "alice", "password": "pw"}),
    )
    .await;
    assert_eq!(ok_login["success"], true);

    let mut other_socket = TcpStream::connect(addr).await.unwrap();
    let already_online = request(
        &mut other_socket,
        "LOGIN",
        json!({"username": "alice", "password": "pw"}),
    )
    .await;
    assert_eq!(already_online["success"], false);
    assert_eq!(
        already_online["message"],
        "Account already logged in from another session"
    );
}

#[tokio::test]
async fn upload_then_download_round_trip() {
    let root = tempfile::tempdir().unwrap();
    let state = test_state(root.path()).await;
    let dev_addr = spawn_developer(state.clone()).await;
    let lobby_addr = spawn_lobby(state.clone()).await;

    let mut dev_socket = TcpStream::connect(dev_addr).await.unwrap();
    request(
        &mut dev_socket,
        "DEVELOPER_REGISTER",
        json!({"username": "carol", "password": "pw"}),
    )
    .await;

    let package_dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(package_dir.path().join("client")).unwrap();
    std::fs::create_dir_all(package_dir.path().join("server")).unwrap();
    std::fs::write(package_dir.path().join("server/server.py"), b"# server").unwrap();
    std::fs::write(
        package_dir.path().join("config.json"),
        br#"{"name":"Pong","description":"classic","version":"1.0.0","max_players":2}"#,
    )
    .unwrap();
    let archive_path = package_dir.path().join("out.zip");
    lobby_server::transfer::package::zip_dir(package_dir.path(), &archive_path).unwrap();
    let bytes = std::fs::read(&archive_path).unwrap();

    let init = request(
        &mut dev_socket,
        "UPLOAD_GAME_INIT",
        json!({"username": "carol", "declared_size": bytes.len()}),
    )
    .await;
    assert_eq!(init["success"], true);
    let transfer_id = init["transfer_id"].as_str().unwrap().to_string();

    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    wire::write_frame(
        &mut dev_socket,
        &json!({"type": "UPLOAD_GAME_CHUNK", "transfer_id": transfer_id, "chunk_data": encoded}),
    )
    .await
    .unwrap();

    use md5::Digest;
    let checksum = format!("{:x}", md5::Md5::digest(&bytes));
    let finish = request(
        &mut dev_socket,
        "UPLOAD_GAME_FINISH",
        json!({"transfer_id": transfer_id, "checksum": checksum}),
    )
    .await;
    assert_eq!(finish["success"], true);
    let game_id = finish["game_id"].as_str().unwrap().to_string();

    let mut lobby_socket = TcpStream::connect(lobby_addr).await.unwrap();
    let download_init = request(
        &mut lobby_socket,
        "DOWNLOAD_GAME_INIT",
        json!({"game_id": game_id, "username": "alice"}),
    )
    .await;
    assert_eq!(download_init["success"], true);
    let declared_size = download_init["file_size"].as_u64().unwrap();

    let mut received = Vec::new();
    loop {
        let frame = wire::read_frame(&mut lobby_socket, 16 * 1024 * 1024)
            .await
            .unwrap()
            .unwrap();
        if frame["type"] == "DOWNLOAD_GAME_FINISH" {
            break;
        }
        let chunk = base64::engine::general_purpose::STANDARD
            .decode(frame["chunk_data"].as_str().unwrap())
            .unwrap();
        received.extend_from_slice(&chunk);
    }
    assert_eq!(received.len() as u64, declared_size);

    let detail = request(
        &mut lobby_socket,
        "GET_GAME_DETAIL",
        json!({"game_id": game_id}),
    )
    .await;
    assert_eq!(detail["game"]["download_count"], 1);
}

#[tokio::test]
async fn update_requires_strictly_newer_version() {
    let root = tempfile::tempdir().unwrap();
    let state = test_state(root.path()).await;
    let game_id = state
        .catalog
        .add_game("carol", "Pong", "classic", "1.0.0", 2)
        .await;

    let dev_addr = spawn_developer(state.clone()).await;
    let mut dev_socket = TcpStream::connect(dev_addr).await.unwrap();

    let stale = request(
        &mut dev_socket,
        "UPDATE_GAME_INIT",
        json!({
            "username": "carol",
            "game_id": game_id,
            "new_version": "0.9.0",
            "declared_size": 10,
        }),
    )
    .await;
    assert_eq!(stale["success"], false);

    let not_author = request(
        &mut dev_socket,
        "UPDATE_GAME_INIT",
        json!({
            "username": "mallory",
            "game_id": game_id,
            "new_version": "2.0.0",
            "declared_size": 10,
        }),
    )
    .await;
    assert_eq!(not_author["success"], false);
}

#[tokio::test]
async fn room_lifecycle_full_then_everyone_leaves() {
    let root = tempfile::tempdir().unwrap();
    let state = test_state(root.path()).await;
    state
        .catalog
        .add_game("carol", "Pong", "classic", "1.0.0", 2)
        .await;
    let game_id = state.catalog.list_games().await[0].game_id.clone();

    let addr = spawn_lobby(state).await;
    let mut p1 = TcpStream::connect(addr).await.unwrap();
    let mut p2 = TcpStream::connect(addr).await.unwrap();
    let mut p3 = TcpStream::connect(addr).await.unwrap();

    let created = request(
        &mut p1,
        "CREATE_ROOM",
        json!({"game_id": game_id, "username": "p1"}),
    )
    .await;
    assert_eq!(created["success"], true);
    let room_id = created["room_id"].as_str().unwrap().to_string();

    let joined = request(
        &mut p2,
        "JOIN_ROOM",
        json!({"room_id": room_id, "username": "p2"}),
    )
    .await;
    assert_eq!(joined["success"], true);

    let full = request(
        &mut p3,
        "JOIN_ROOM",
        json!({"room_id": room_id, "username": "p3"}),
    )
    .await;
    assert_eq!(full["success"], false);
    assert_eq!(full["message"], "Room full");

    let left = request(
        &mut p2,
        "LEAVE_ROOM",
        json!({"room_id": room_id, "username": "p2"}),
    )
    .await;
    assert_eq!(left["success"], true);

    let left_owner = request(
        &mut p1,
        "LEAVE_ROOM",
        json!({"room_id": room_id, "username": "p1"}),
    )
    .await;
    assert_eq!(left_owner["success"], true);

    let rooms = request(&mut p1, "LIST_ROOMS", json!({})).await;
    assert_eq!(rooms["rooms"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn start_game_requires_owner_and_full_roster() {
    let root = tempfile::tempdir().unwrap();
    let state = test_state(root.path()).await;
    let game_id = state
        .catalog
        .add_game("carol", "Pong", "classic", "1.0.0", 2)
        .await;
    let pkg_dir = root.path().join("storage").join(&game_id).join("1.0.0");
    std::fs::create_dir_all(pkg_dir.join("client")).unwrap();
    std::fs::create_dir_all(pkg_dir.join("server")).unwrap();
    std::fs::write(pkg_dir.join("server/server.py"), b"# server").unwrap();

    let addr = spawn_lobby(state).await;
    let mut p1 = TcpStream::connect(addr).await.unwrap();
    let mut p2 = TcpStream::connect(addr).await.unwrap();

    let created = request(
        &mut p1,
        "CREATE_ROOM",
        json!({"game_id": game_id, "username": "p1"}),
    )
    .await;
    let room_id = created["room_id"].as_str().unwrap().to_string();

    let too_early = request(
        &mut p1,
        "START_GAME",
        json!({"room_id": room_id, "username": "p1"}),
    )
    .await;
    assert_eq!(too_early["success"], false);
    assert!(
        too_early["message"]
            .as_str()
            .unwrap()
            .contains("Not enough players"),
        "unexpected message: {too_early:?}"
    );

    request(
        &mut p2,
        "JOIN_ROOM",
        json!({"room_id": room_id, "username": "p2"}),
    )
    .await;

    let not_owner = request(
        &mut p2,
        "START_GAME",
        json!({"room_id": room_id, "username": "p2"}),
    )
    .await;
    assert_eq!(not_owner["success"], false);
    assert_eq!(not_owner["message"], "Only room owner can start the game");
}

#[tokio::test]
async fn delete_game_removes_package_directory() {
    let root = tempfile::tempdir().unwrap();
    let state = test_state(root.path()).await;
    let game_id = state
        .catalog
        .add_game("carol", "Pong", "classic", "1.0.0", 2)
        .await;
    let pkg_dir = root.path().join("storage").join(&game_id);
    std::fs::create_dir_all(pkg_dir.join("1.0.0/server")).unwrap();
    std::fs::write(pkg_dir.join("1.0.0/server/server.py"), b"# server").unwrap();

    let addr = spawn_developer(state.clone()).await;
    let mut socket = TcpStream::connect(addr).await.unwrap();

    let deleted = request(
        &mut socket,
        "DELETE_GAME",
        json!({"game_id": game_id, "username": "carol"}),
    )
    .await;
    assert_eq!(deleted["success"], true);
    assert!(state.catalog.get_game(&game_id).await.is_err());
    assert!(!pkg_dir.exists());
}

#[tokio::test]
async fn disconnect_reconciliation_releases_room_and_online_flag() {
    let root = tempfile::tempdir().unwrap();
    let state = test_state(root.path()).await;
    state
        .catalog
        .add_game("carol", "Pong", "classic", "1.0.0", 2)
        .await;
    let game_id = state.catalog.list_games().await[0].game_id.clone();
    let addr = spawn_lobby(state.clone()).await;

    {
        let mut socket = TcpStream::connect(addr).await.unwrap();
        request(
            &mut socket,
            "REGISTER",
            json!({"username": "p1", "password": "pw"}),
        )
        .await;
        request(
            &mut socket,
            "LOGIN",
            json!({"username": "p1", "password": "pw"}),
        )
        .await;
        request(
            &mut socket,
            "CREATE_ROOM",
            json!({"game_id": game_id, "username": "p1"}),
        )
        .await;
        // socket drops here, closing the connection.
    }

    // Reconciliation runs on the server task asynchronously after the drop.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    assert!(!state
        .catalog
        .list_online_users()
        .await
        .contains(&"p1".to_string()));
    assert_eq!(state.rooms.list_rooms().await.len(), 0);
}
