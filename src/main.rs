use anyhow::Result;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use donate_server::{
    config::{Config, LoggingConfig},
    DonateApp,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration decides the log format, so it is read before tracing starts
    let (mut config, source) = load_config().await?;
    config.apply_env_overrides();

    init_tracing(&config.logging);

    info!("Starting donate-server...");
    match source {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    let app = DonateApp::new(config).await?;

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    // Handle shutdown signals
    let app_clone = app.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal, initiating graceful shutdown...");
                let _ = shutdown_tx.send(());
                if let Err(e) = app_clone.shutdown().await {
                    error!("Error during shutdown: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        }
    });

    app.run_with_shutdown(shutdown_rx).await?;

    info!("donate-server stopped gracefully");
    Ok(())
}

/// Initialize tracing; `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match logging.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        "compact" => tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init(),
    }
}

/// Load configuration from file or use defaults
async fn load_config() -> Result<(Config, Option<PathBuf>)> {
    // Look for config in standard locations
    let config_paths = vec![
        PathBuf::from("./donate-server.toml"),
        PathBuf::from("/etc/donate-server/donate-server.toml"),
        dirs::config_dir()
            .map(|d| d.join("donate-server/donate-server.toml"))
            .unwrap_or_default(),
    ];

    for path in config_paths {
        if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            let config: Config = toml::from_str(&content)?;
            return Ok((config, Some(path)));
        }
    }

    Ok((Config::default(), None))
}
