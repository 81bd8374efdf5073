//! Main Entrypoint for the Mint API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Opening the hardware bridge, starting the action coordinator and
//!    hosting the MCP tool service.
//! 3. Resolving the API key for the hardware control routes.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use mint_api::{auth, config::Config, router::create_router, state::AppState, tools::ToolGateway};
use mint_core::{ActionCoordinator, ConnectionRegistry, HardwareBridge, tools::MintToolService};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing hardware...");

    // --- 3. Initialize Hardware and Coordinator ---
    let bridge = Arc::new(HardwareBridge::new(config.bridge_config()));
    bridge.initialize().await;
    let coordinator = Arc::new(ActionCoordinator::new(
        bridge.clone(),
        config.queue_config(),
    ));
    coordinator.start().await;
    let registry = Arc::new(ConnectionRegistry::new());
    let tools = ToolGateway::start(MintToolService::new(coordinator.clone(), registry.clone()))
        .await
        .context("Failed to start the tool service")?;

    // --- 4. Resolve API Key ---
    let api_key = if config.api_auth_enabled {
        let key = match &config.api_key {
            Some(key) => key.clone(),
            None => {
                let key = auth::generate_api_key();
                warn!(api_key = %key, "HARDWARE_API_KEY not set; generated a key for this run");
                key
            }
        };
        Some(Arc::new(key))
    } else {
        warn!("Hardware API authentication is disabled.");
        None
    };

    let app_state = Arc::new(AppState {
        registry,
        coordinator: coordinator.clone(),
        tools: Arc::new(tools),
        api_key,
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        bind_address = %config.bind_address,
        serial_open = bridge.serial_open(),
        queue_capacity = config.queue_capacity,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    coordinator.stop().await;
    bridge.close();
    info!("Server has shut down.");
    Ok(())
}
