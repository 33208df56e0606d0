//! Crossfire - two-combatant projectile duel
//!
//! Entry point. `GAME_MODE` selects how this process takes part:
//! - `local`: both combatants in this process, console controlled
//! - `server`: authoritative host with a WebSocket endpoint
//! - `client`: headless observer connected to a host

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crossfire::app::{local::run_local, AppState};
use crossfire::config::{Config, GameMode};
use crossfire::discovery;
use crossfire::game::GameSession;
use crossfire::http::build_router;
use crossfire::util::time::init_server_time;
use crossfire::ws::client::run_client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_json);

    // Initialize server time tracking
    init_server_time();

    info!(mode = ?config.mode, "Starting Crossfire");

    match config.mode {
        GameMode::Local => run_local(&config).await,
        GameMode::Server => run_server(config).await,
        GameMode::Client => {
            let host = resolve_host(&config).await?;
            run_client(host, None, &config.tuning).await?;
            Ok(())
        }
    }
}

/// Host the authoritative session until shutdown
async fn run_server(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = config.server_addr;

    let (session, handle) = GameSession::new(config.tuning);
    tokio::spawn(session.run());

    if config.announce {
        let port = config.discovery_port;
        let ip = discovery::local_ipv4();
        tokio::spawn(async move {
            if let Err(e) = discovery::announce(port, ip).await {
                warn!(error = %e, "LAN announcement stopped");
            }
        });
    }

    let state = AppState::new(config, handle);
    let router = build_router(state);

    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Host from `HOST_ADDR`, or the first one announced on the LAN
async fn resolve_host(config: &Config) -> anyhow::Result<SocketAddr> {
    if let Some(addr) = config.host_addr {
        return Ok(addr);
    }
    let ip = discovery::discover(config.discovery_port).await?;
    Ok(SocketAddr::new(ip, config.server_addr.port()))
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
