//! Creator API endpoints

use super::{respond, respond_with, ApiResponse, ApiState};
use crate::{
    creator::{CreatorService, RegisterCreator, UpdateProfile},
    db::CreatorModel,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tracing::info;

/// Rename request
#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    /// Desired username
    pub new_username: String,
}

/// Register a creator
pub async fn register_creator(
    State(state): State<ApiState>,
    Json(req): Json<RegisterCreator>,
) -> (StatusCode, Json<ApiResponse<CreatorModel>>) {
    info!("API: Register creator: username={}", req.username);

    let service = CreatorService::new(state.app.db.clone());
    respond_with(StatusCode::CREATED, service.register(req).await)
}

/// Get a creator
pub async fn get_creator(
    State(state): State<ApiState>,
    Path(username): Path<String>,
) -> (StatusCode, Json<ApiResponse<CreatorModel>>) {
    let service = CreatorService::new(state.app.db.clone());
    respond(service.get(&username).await)
}

/// Update a creator's profile and settings
pub async fn update_creator(
    State(state): State<ApiState>,
    Path(username): Path<String>,
    Json(req): Json<UpdateProfile>,
) -> (StatusCode, Json<ApiResponse<CreatorModel>>) {
    info!("API: Update creator profile: username={}", username);

    let service = CreatorService::new(state.app.db.clone());
    respond(service.update_profile(&username, req).await)
}

/// Rename a creator
pub async fn rename_creator(
    State(state): State<ApiState>,
    Path(username): Path<String>,
    Json(req): Json<RenameRequest>,
) -> (StatusCode, Json<ApiResponse<CreatorModel>>) {
    info!(
        "API: Rename creator: {} -> {}",
        username, req.new_username
    );

    let service = CreatorService::new(state.app.db.clone());
    respond(service.rename(&username, &req.new_username).await)
}
