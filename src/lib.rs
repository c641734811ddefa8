//! donate-server: backend for a creator donation platform
//!
//! Creators register, receive donations through a payment gateway, and
//! follow their supporters on monthly leaderboards:
//!
//! - **Donation lifecycle**: PENDING donations are created by the API and
//!   settled by signed payment-gateway webhooks
//! - **Notifications**: paid donations are broadcast in-process and relayed
//!   best-effort to the socket service that drives stream overlays
//! - **Media shares**: donor video requests are queued per creator
//! - **Archival**: aged terminal records move to history tables
//! - **Leaderboards**: monthly donor rankings, frozen once the month is over
//! - **Payouts**: balance checks, one pending request per creator, admin review
//!
//! # Architecture
//!
//! 1. `db` owns the SQLite store and its typed queries
//! 2. Services (`creator`, `donation`, `media`, `jobs`, `payout`) hold the rules
//! 3. `api` exposes them over HTTP; cron routes drive the batch jobs
//!
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod creator;
pub mod db;
pub mod donation;
pub mod jobs;
pub mod media;
pub mod notify;
pub mod overlay;
pub mod payout;

#[cfg(test)]
mod test_support;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use config::Config;
use db::Database;
use notify::NotificationHub;
use overlay::ReplayRegistry;

/// The main application state
#[derive(Clone)]
pub struct DonateApp {
    /// Application configuration
    pub config: Arc<Config>,
    /// Database connection
    pub db: Arc<Database>,
    /// Paid-donation notifications
    pub notifier: Arc<NotificationHub>,
    /// One-shot overlay replay triggers
    pub replay: Arc<ReplayRegistry>,
}

impl DonateApp {
    /// Create a new application instance, connecting to the configured database
    pub async fn new(config: Config) -> Result<Self> {
        info!("Initializing donate-server application...");

        let db_url = config.resolve_database_url();
        let db = Database::connect(&db_url).await?;

        let app = Self::with_database(config, db);
        info!("donate-server application initialized successfully");
        Ok(app)
    }

    /// Assemble the application around an already connected database
    pub fn with_database(config: Config, db: Database) -> Self {
        let config = Arc::new(config);
        let notifier = Arc::new(NotificationHub::new(&config.relay));
        let replay = Arc::new(ReplayRegistry::new(Duration::from_secs(
            config.overlay.replay_ttl_seconds,
        )));

        if config.relay.url.is_none() {
            info!("Socket relay not configured, notifications stay in-process");
        }

        Self {
            config,
            db: Arc::new(db),
            notifier,
            replay,
        }
    }

    /// Start the application
    pub async fn run(&self) -> Result<()> {
        self.run_with_shutdown(tokio::sync::oneshot::channel().1).await
    }

    /// Start the application with shutdown signal
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    ) -> Result<()> {
        info!("Starting donate-server...");

        let api_handle = tokio::spawn({
            let app = self.clone();
            async move {
                if let Err(e) = api::serve_with_shutdown(app, shutdown_rx).await {
                    warn!("API server error: {}", e);
                }
            }
        });

        info!(
            "donate-server running. API available at http://{}",
            self.config.api_bind_address()
        );

        api_handle.await?;

        Ok(())
    }

    /// Shutdown the application gracefully
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down donate-server...");
        self.db.close().await;
        info!("donate-server shutdown complete");
        Ok(())
    }
}

/// Error types for the donation platform
#[derive(thiserror::Error, Debug)]
pub enum DonateError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Malformed or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Input contradicts stored state (amount mismatch, illegal transition)
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Payable balance below the payout minimum
    #[error("Balance {balance} is below the minimum payout of {minimum}")]
    MinimumBalance {
        /// Current payable balance
        balance: i64,
        /// Configured minimum
        minimum: i64,
    },

    /// Missing or wrong credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Credentials present but not accepted (bad signature, bad admin token)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique value already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unexpected failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DonateError {
    /// Wrap a store failure with the operation that hit it
    pub(crate) fn database(context: &str) -> impl FnOnce(anyhow::Error) -> Self + '_ {
        move |e| DonateError::Database(format!("{}: {}", context, e))
    }
}

/// Result type alias for donation platform operations
pub type DonateResult<T> = std::result::Result<T, DonateError>;
