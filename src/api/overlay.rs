//! Overlay replay endpoints

use super::{respond, ApiResponse, ApiState};
use crate::{
    creator::CreatorService,
    db::DonationQueries,
    overlay::ReplayTrigger,
    DonateError,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tracing::info;

/// Replay request body
#[derive(Debug, Deserialize)]
pub struct ReplayRequest {
    /// Donation to show again
    pub donation_id: String,
}

/// Ask the creator's overlay to replay a donation alert
pub async fn trigger_replay(
    State(state): State<ApiState>,
    Path(username): Path<String>,
    Json(req): Json<ReplayRequest>,
) -> (StatusCode, Json<ApiResponse<ReplayTrigger>>) {
    let result = async {
        let creator = CreatorService::new(state.app.db.clone())
            .get(&username)
            .await?;

        let queries = DonationQueries::new(&state.app.db);
        let owner = match queries
            .get_by_id(&req.donation_id)
            .await
            .map_err(DonateError::database("Failed to look up donation"))?
        {
            Some(donation) => Some(donation.creator_id),
            None => queries
                .get_history(&req.donation_id)
                .await
                .map_err(DonateError::database("Failed to look up donation"))?
                .map(|history| history.donation.creator_id),
        };
        if owner.as_deref() != Some(creator.id.as_str()) {
            return Err(DonateError::NotFound(format!(
                "Donation {} not found",
                req.donation_id
            )));
        }

        info!(
            "API: Replay trigger: creator={}, donation={}",
            creator.username, req.donation_id
        );
        Ok(state
            .app
            .replay
            .trigger(&creator.username, &req.donation_id)
            .await)
    }
    .await;
    respond(result)
}

/// Take the pending replay request, if any; `data` is null when none is live
pub async fn take_replay(
    State(state): State<ApiState>,
    Path(username): Path<String>,
) -> (StatusCode, Json<ApiResponse<Option<ReplayTrigger>>>) {
    let username = username.to_ascii_lowercase();
    respond(Ok(state.app.replay.take(&username).await))
}
