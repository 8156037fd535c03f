//! Configuration validation functions.

use super::Config;

/// Sanity-checks a loaded configuration; returns a human-readable error on the first
/// problem found rather than trying to collect every violation.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    if config.lobby.port == 0 {
        anyhow::bail!("lobby.port must not be 0");
    }
    if config.developer.port == 0 {
        anyhow::bail!("developer.port must not be 0");
    }
    if config.lobby.host == config.developer.host && config.lobby.port == config.developer.port {
        anyhow::bail!("lobby and developer listeners cannot share the same host:port");
    }
    if config.transfer.chunk_size == 0 {
        anyhow::bail!("transfer.chunk_size must be greater than 0");
    }
    if config.transfer.chunk_size > config.transfer.max_frame_size {
        anyhow::bail!("transfer.chunk_size cannot exceed transfer.max_frame_size");
    }
    if config.storage.root.trim().is_empty() {
        anyhow::bail!("storage.root must not be empty");
    }
    if let Some((low, high)) = config.supervisor.port_range {
        if low == 0 || high == 0 || low > high {
            anyhow::bail!("supervisor.port_range must be a non-zero, non-inverted range");
        }
    }
    if config.metrics.snapshot_interval_ms == 0 {
        anyhow::bail!("metrics.snapshot_interval_ms must be greater than 0");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let mut config = Config::default();
        config.transfer.chunk_size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_colliding_listeners() {
        let mut config = Config::default();
        config.developer.host = config.lobby.host.clone();
        config.developer.port = config.lobby.port;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_inverted_port_range() {
        let mut config = Config::default();
        config.supervisor.port_range = Some((5000, 4000));
        assert!(validate_config(&config).is_err());
    }
}
