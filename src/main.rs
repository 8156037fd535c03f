#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use lobby_server::config;
use lobby_server::logging;
use lobby_server::server;
use std::sync::Arc;

/// Lobby server -- accounts, catalog, matchmaking and game-server supervision
/// for a multiplayer game distribution platform.
#[derive(Parser, Debug)]
#[command(name = "lobby-server")]
#[command(about = "Lobby and distribution control plane for a multiplayer game platform")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = Arc::new(config::load());

    if cli.print_config {
        let json = serde_json::to_string_pretty(&*cfg)
            .map_err(|e| anyhow::anyhow!("failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Lobby: {}:{}", cfg.lobby.host, cfg.lobby.port);
                println!("  Developer: {}:{}", cfg.developer.host, cfg.developer.port);
                println!("  Storage root: {}", cfg.storage.root);
                println!("  Transfer chunk size: {}", cfg.transfer.chunk_size);
                println!("  Supervisor interpreter: {}", cfg.supervisor.interpreter);
                println!("  Supervisor spawn delay: {}ms", cfg.supervisor.spawn_delay_ms);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    logging::init_with_config(&cfg.logging);

    tracing::info!(
        lobby = %format!("{}:{}", cfg.lobby.host, cfg.lobby.port),
        developer = %format!("{}:{}", cfg.developer.host, cfg.developer.port),
        "starting lobby server"
    );

    server::run(cfg).await
}
