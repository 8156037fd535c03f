//! Default value functions for configuration fields.
//!
//! This module contains all the default value functions used by serde's `#[serde(default = ...)]`
//! attributes throughout the configuration system. Functions are organized by category for
//! easier maintenance.

use super::logging::LogFormat;

// =============================================================================
// Lobby / Developer Listener Defaults
// =============================================================================

pub fn default_lobby_host() -> String {
    "0.0.0.0".to_string()
}

pub const fn default_lobby_port() -> u16 {
    9000
}

pub fn default_developer_host() -> String {
    "0.0.0.0".to_string()
}

pub const fn default_developer_port() -> u16 {
    9001
}

pub const fn default_max_frame_size() -> usize {
    16 * 1024 * 1024 // 16MiB, generous enough for a base64 chunk plus JSON overhead
}

// =============================================================================
// Storage Defaults
// =============================================================================

pub fn default_storage_root() -> String {
    "storage".to_string()
}

pub fn default_data_dir() -> String {
    "data".to_string()
}

pub fn default_temp_dir() -> String {
    "storage/.tmp".to_string()
}

// =============================================================================
// Transfer Defaults
// =============================================================================

pub const fn default_chunk_size() -> usize {
    4096
}

// =============================================================================
// Supervisor Defaults
// =============================================================================

pub fn default_supervisor_host() -> String {
    "127.0.0.1".to_string()
}

pub const fn default_spawn_delay_ms() -> u64 {
    2000
}

pub fn default_interpreter() -> String {
    "python3".to_string()
}

// =============================================================================
// Metrics Defaults
// =============================================================================

pub const fn default_metrics_snapshot_interval_ms() -> u64 {
    60_000
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "lobby-server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
