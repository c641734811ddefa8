//! HTTP API for the donation platform
//!
//! This module provides a RESTful API for:
//! - Creator registration and settings
//! - Creating donations and receiving payment gateway webhooks
//! - Leaderboards, balances and payout requests
//! - Media share playback and overlay replay triggers
//! - Cron and admin triggers for the batch jobs

use crate::{DonateApp, DonateError, DonateResult};
use axum::{
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

mod auth;
mod creators;
mod donations;
mod health;
mod jobs;
mod leaderboard;
mod media;
mod overlay;
mod payouts;
mod webhook;

#[cfg(test)]
mod tests;

pub use creators::*;
pub use donations::*;
pub use health::*;
pub use jobs::*;
pub use leaderboard::*;
pub use media::*;
pub use overlay::*;
pub use payouts::*;
pub use webhook::*;

/// API state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    /// The donation application
    pub app: DonateApp,
}

/// Build the API router
fn build_router(app: DonateApp) -> Router {
    let state = ApiState { app };

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Creators
        .route("/v1/creators", post(register_creator))
        .route(
            "/v1/creators/:username",
            get(get_creator).put(update_creator),
        )
        .route("/v1/creators/:username/rename", post(rename_creator))
        // Donations
        .route(
            "/v1/creators/:username/donations",
            post(create_donation).get(list_donations),
        )
        .route("/v1/donations/:merchant_ref", get(get_donation))
        // Payment webhook
        .route("/v1/webhook/payment", post(handle_payment_webhook))
        // Cron triggers
        .route("/v1/jobs/archive", post(run_archive_job))
        .route("/v1/jobs/leaderboard", post(run_leaderboard_job))
        // Leaderboards
        .route(
            "/v1/leaderboard/:username/current",
            get(get_current_leaderboard),
        )
        .route(
            "/v1/leaderboard/:username/:year/:month",
            get(get_leaderboard),
        )
        // Balance and payouts
        .route("/v1/creators/:username/balance", get(get_balance))
        .route(
            "/v1/creators/:username/payouts",
            get(list_creator_payouts).post(request_payout),
        )
        // Media shares
        .route("/v1/creators/:username/media-shares", get(list_media_shares))
        .route("/v1/media-shares/:id/status", put(update_media_share_status))
        // Overlay
        .route(
            "/v1/overlay/:username/replay",
            post(trigger_replay).get(take_replay),
        )
        // Admin
        .route(
            "/v1/admin/leaderboard/:username/:year/:month/refresh",
            post(refresh_leaderboard),
        )
        .route(
            "/v1/admin/leaderboard/:username/:year/:month/finalize",
            post(finalize_leaderboard),
        )
        .route("/v1/admin/jobs/archive", post(run_admin_archive))
        .route("/v1/admin/payouts", get(list_all_payouts))
        .route("/v1/admin/payouts/:id", put(process_payout))
        .layer(TraceLayer::new_for_http())
        // Add state
        .with_state(state)
}

/// Start the HTTP API server with graceful shutdown
pub async fn serve_with_shutdown(
    app: DonateApp,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let config = app.config.clone();

    let router = build_router(app);

    // Add CORS if enabled
    let router = if config.server.enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    let addr: std::net::SocketAddr = config
        .api_bind_address()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    info!("Starting HTTP API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
            info!("Received shutdown signal, stopping API server...");
        })
        .await?;

    info!("API server stopped gracefully");
    Ok(())
}

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (only present if success is true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message (only present if success is false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Convert DonateError to HTTP status code
pub fn error_to_status_code(err: &DonateError) -> StatusCode {
    match err {
        DonateError::Validation(_) => StatusCode::BAD_REQUEST,
        DonateError::Integrity(_) => StatusCode::BAD_REQUEST,
        DonateError::MinimumBalance { .. } => StatusCode::BAD_REQUEST,
        DonateError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        DonateError::Forbidden(_) => StatusCode::FORBIDDEN,
        DonateError::NotFound(_) => StatusCode::NOT_FOUND,
        DonateError::Conflict(_) => StatusCode::CONFLICT,
        DonateError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DonateError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DonateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Turn a service result into a status code and envelope.
///
/// Server-side failures are logged and answered with a generic message.
pub(crate) fn respond<T>(result: DonateResult<T>) -> (StatusCode, Json<ApiResponse<T>>) {
    respond_with(StatusCode::OK, result)
}

/// Like [`respond`], with a custom success status
pub(crate) fn respond_with<T>(
    success: StatusCode,
    result: DonateResult<T>,
) -> (StatusCode, Json<ApiResponse<T>>) {
    match result {
        Ok(data) => (success, Json(ApiResponse::success(data))),
        Err(e) => {
            let status = error_to_status_code(&e);
            if status.is_server_error() {
                error!("API: Request failed: {}", e);
                (status, Json(ApiResponse::error("Internal server error")))
            } else {
                (status, Json(ApiResponse::error(e.to_string())))
            }
        }
    }
}

/// Pagination parameters
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    /// Page number (1-based)
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

const MAX_PER_PAGE: u32 = 100;

impl PaginationParams {
    /// Page and page size clamped to sane bounds
    pub fn normalized(&self) -> (u32, u32) {
        (self.page.max(1), self.per_page.clamp(1, MAX_PER_PAGE))
    }

    /// Row offset of the first item on the page
    pub fn offset(&self) -> u32 {
        let (page, per_page) = self.normalized();
        (page - 1).saturating_mul(per_page)
    }
}

/// Paginated response
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    /// Items for this page
    pub items: Vec<T>,
    /// Total number of items
    pub total: u64,
    /// Current page
    pub page: u32,
    /// Items per page
    pub per_page: u32,
    /// Total pages
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T> {
    /// Create a paginated response
    pub fn new(items: Vec<T>, total: u64, page: u32, per_page: u32) -> Self {
        let total_pages = total.div_ceil(per_page.max(1) as u64) as u32;
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}
