//! Batch job triggers
//!
//! Job runs answer with a flat body instead of the usual envelope: the
//! report fields sit next to `success`, as in
//! `{success, archived, failed, donations_archived, media_shares_archived, errors?}`
//! or `{success, updated, failed, finalized, errors?}`. Failures keep the
//! `{success: false, error}` shape.

use super::{
    auth::{verify_admin_token, verify_cron_secret},
    respond, ApiState,
};
use crate::{
    jobs::{ArchiveReport, ArchiveService, LeaderboardReport, LeaderboardService},
    DonateResult,
};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Flat job response
#[derive(Debug, Serialize)]
pub struct JobResponse<T> {
    /// Whether the run went ahead
    pub success: bool,
    /// Report fields, inlined on success
    #[serde(flatten)]
    pub report: Option<T>,
    /// Error message on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Status code and flat body for a job result
fn respond_job<T: Serialize>(result: DonateResult<T>) -> (StatusCode, Json<JobResponse<T>>) {
    let (status, Json(envelope)) = respond(result);
    (
        status,
        Json(JobResponse {
            success: envelope.success,
            report: envelope.data,
            error: envelope.error,
        }),
    )
}

/// Manual archive parameters
#[derive(Debug, Deserialize)]
pub struct ArchiveParams {
    /// Age threshold override, in hours
    pub threshold_hours: Option<i64>,
}

/// Cron trigger for the archival job
pub async fn run_archive_job(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> (StatusCode, Json<JobResponse<ArchiveReport>>) {
    let config = &state.app.config;
    let result = async {
        verify_cron_secret(&headers, config)?;
        info!("API: Cron archive run");
        ArchiveService::new(state.app.db.clone())
            .archive_aged(config.jobs.archive_threshold_hours)
            .await
    }
    .await;
    respond_job(result)
}

/// Cron trigger for the leaderboard job
pub async fn run_leaderboard_job(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> (StatusCode, Json<JobResponse<LeaderboardReport>>) {
    let result = async {
        verify_cron_secret(&headers, &state.app.config)?;
        info!("API: Cron leaderboard run");
        LeaderboardService::new(state.app.config.clone(), state.app.db.clone())
            .run_scheduled(Utc::now())
            .await
    }
    .await;
    respond_job(result)
}

/// Admin trigger for the archival job with an optional threshold override
pub async fn run_admin_archive(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(params): Query<ArchiveParams>,
) -> (StatusCode, Json<JobResponse<ArchiveReport>>) {
    let config = &state.app.config;
    let result = async {
        verify_admin_token(&headers, config)?;
        let threshold = params
            .threshold_hours
            .unwrap_or(config.jobs.archive_threshold_hours);
        info!("API: Admin archive run: threshold_hours={}", threshold);
        ArchiveService::new(state.app.db.clone())
            .archive_aged(threshold)
            .await
    }
    .await;
    respond_job(result)
}
