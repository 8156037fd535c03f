//! Root configuration types.

use super::logging::LoggingConfig;
use super::server::{
    EndpointConfig, MetricsConfig, StorageConfig, SupervisorConfig, TransferConfig,
};
use serde::{Deserialize, Serialize};

/// Root configuration struct for the lobby server.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub lobby: EndpointConfig,
    #[serde(default = "EndpointConfig::default_developer")]
    pub developer: EndpointConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lobby: EndpointConfig::default(),
            developer: EndpointConfig::default_developer(),
            storage: StorageConfig::default(),
            transfer: TransferConfig::default(),
            supervisor: SupervisorConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
