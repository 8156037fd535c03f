#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Lobby Server
//!
//! Control plane for a multiplayer game distribution platform: player and
//! developer accounts, a searchable game catalog, chunked upload/update/
//! download of game packages, room-based matchmaking, and per-room
//! supervision of the spawned game-server subprocess.

/// Account and game catalog: accounts, games, versioning, persistence
pub mod catalog;

/// Server configuration and environment variables
pub mod config;

/// Structured logging configuration
pub mod logging;

/// Metrics collection and reporting
pub mod metrics;

/// Wire message protocol definitions
pub mod protocol;

/// Room registry and lifecycle
pub mod rooms;

/// Listener orchestration and per-connection dispatch
pub mod server;

/// Per-connection session binding and disconnect reconciliation
pub mod session;

/// Game process supervision
pub mod supervisor;

/// In-progress upload/update/download state
pub mod transfer;

/// Length-prefixed JSON frame encoding/decoding
pub mod wire;
