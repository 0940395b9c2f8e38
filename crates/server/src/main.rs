mod api;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orderflow_core::courier::{CourierRegistry, VroongGateway};
use orderflow_core::order::{OrderStore, SqliteOrderStore};
use orderflow_core::query::OrderQueryService;
use orderflow_core::scheduler::DeliveryReconciler;
use orderflow_core::{load_config, validate_config, Config, ConfigError, OrderLifecycle};

use api::create_router;
use state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("ORDERFLOW_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration, falling back to defaults when no file exists
    let config = match load_config(&config_path) {
        Ok(config) => {
            info!("Loaded configuration from {:?}", config_path);
            config
        }
        Err(ConfigError::FileNotFound(_)) => {
            warn!(
                "No config file at {:?}, running with defaults",
                config_path
            );
            Config::default()
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to load config from {:?}", config_path))
        }
    };

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;
    info!("Database path: {:?}", config.database.path);

    // Create SQLite order store
    let store: Arc<dyn OrderStore> = Arc::new(
        SqliteOrderStore::new(&config.database.path).context("Failed to create order store")?,
    );
    info!("Order store initialized");

    // Register configured courier gateways
    let mut registry = CourierRegistry::new();
    if let Some(ref vroong_config) = config.couriers.vroong {
        info!("Initializing Vroong gateway at {}", vroong_config.base_url);
        registry.register(Arc::new(VroongGateway::new(vroong_config.clone())));
    }
    if registry.is_empty() {
        warn!("No courier agencies configured, dispatch will be unavailable");
    }
    let registry = Arc::new(registry);

    // Create lifecycle engine and query service
    let engine = Arc::new(OrderLifecycle::new(Arc::clone(&store), registry));
    let query = OrderQueryService::new(store);

    // Start the delivery reconciler if enabled
    let reconciler = if config.scheduler.enabled {
        let reconciler = Arc::new(DeliveryReconciler::new(
            config.scheduler.clone(),
            Arc::clone(&engine),
        ));
        reconciler.start().await;
        info!(
            interval_secs = config.scheduler.interval_secs,
            "Delivery reconciler started"
        );
        Some(reconciler)
    } else {
        info!("Delivery reconciler disabled in config");
        None
    };

    // Create app state
    let app_state = Arc::new(AppState::new(
        config.clone(),
        engine,
        query,
        reconciler.clone(),
    ));

    // Create router
    let app = create_router(app_state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop reconciler if running
    if let Some(ref reconciler) = reconciler {
        info!("Stopping delivery reconciler...");
        reconciler.stop().await;
        info!("Delivery reconciler stopped");
    }

    info!("Server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
