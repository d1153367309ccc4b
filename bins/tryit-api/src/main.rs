mod handlers;
mod metrics;
mod routes;

use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tryit_engine::config::LanguageConfigManager;
use tryit_engine::workspace::WorkspaceManager;
use tryit_engine::Engine;

pub struct AppState {
    pub engine: Engine,
}

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Try It API booting...");

    // Load language configurations
    let configs = match LanguageConfigManager::load_default() {
        Ok(configs) => configs,
        Err(e) => {
            error!("Failed to load language configurations: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Loaded language configurations for: {:?}",
        configs.list_languages()
    );

    // Fail at startup, not on the first request, if the temp dir is unusable
    let engine = Engine::new(WorkspaceManager::from_env(), configs);
    if let Err(e) = engine.prepare().await {
        error!("Failed to prepare the execution workspace: {}", e);
        std::process::exit(1);
    }
    info!(
        "Workspace directory ready at {}",
        engine.workspaces().base_dir().display()
    );

    let state = Arc::new(AppState { engine });

    // Build router
    let app = Router::new().merge(routes::routes()).with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!("HTTP server listening on {}", addr);
    info!("Ready to execute code");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    info!("Shutdown complete");
}

async fn shutdown_signal() {
    signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    warn!("Received shutdown signal, finishing in-flight requests...");
}
