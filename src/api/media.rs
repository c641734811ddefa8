//! Media share API endpoints

use super::{respond, ApiResponse, ApiState};
use crate::{
    db::{MediaShareModel, MediaShareStatus},
    media::MediaShareService,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tracing::info;

/// Playback status update
#[derive(Debug, Deserialize)]
pub struct MediaShareStatusRequest {
    /// New status
    pub status: MediaShareStatus,
}

/// Live media share queue of a creator
pub async fn list_media_shares(
    State(state): State<ApiState>,
    Path(username): Path<String>,
) -> (StatusCode, Json<ApiResponse<Vec<MediaShareModel>>>) {
    respond(
        MediaShareService::new(state.app.db.clone())
            .list_queue(&username)
            .await,
    )
}

/// Report playback progress of a media share
pub async fn update_media_share_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<MediaShareStatusRequest>,
) -> (StatusCode, Json<ApiResponse<MediaShareModel>>) {
    info!("API: Media share status: id={}, status={}", id, req.status);

    respond(
        MediaShareService::new(state.app.db.clone())
            .update_status(&id, req.status)
            .await,
    )
}
