#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use duelgate::config;
use duelgate::logging;
use duelgate::server::{GameServer, SessionConfig};
use std::net::SocketAddr;

/// Duelgate -- lobby and session server for two-player turn-based battles
#[derive(Parser, Debug)]
#[command(name = "duelgate")]
#[command(about = "Server-authoritative lobby and session server for two-player turn-based battles")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from config.json / env if present; defaults otherwise.
    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = cfg.validate();

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Lobby capacity: {}", cfg.server.lobby_capacity);
                println!("  Session TTL: {}h", cfg.server.session_ttl_hours);
                println!("  Ping interval: {}s", cfg.websocket.ping_interval_secs);
                println!("  Read timeout: {}s", cfg.websocket.read_timeout_secs);
                println!("  CORS origins: {}", cfg.security.cors_origins);
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

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(%addr, "Starting Duelgate server");

    let server = GameServer::new(SessionConfig::from_config(&cfg)).await;
    let app = duelgate::api::create_router(&cfg.security.cors_origins).with_state(server);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        cors_origins = %cfg.security.cors_origins,
        "Server started - REST: /api/v1/lobbies, WebSocket: /ws/game/{{code}}"
    );

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod cli_tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn test_cli_default_no_flags() {
        let cli = Cli::try_parse_from(["duelgate"]).unwrap();
        assert!(!cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_flags() {
        let cli = Cli::try_parse_from(["duelgate", "--validate-config"]).unwrap();
        assert!(cli.validate_config);
        let cli = Cli::try_parse_from(["duelgate", "-c"]).unwrap();
        assert!(cli.validate_config);
    }

    #[test]
    fn test_cli_print_config() {
        let cli = Cli::try_parse_from(["duelgate", "--print-config"]).unwrap();
        assert!(cli.print_config);
        assert!(!cli.validate_config);
    }

    #[test]
    fn test_cli_flags_conflict() {
        let result = Cli::try_parse_from(["duelgate", "--validate-config", "--print-config"]);
        assert!(result.is_err());
    }
}
