//! Donation API endpoints

use super::{respond, respond_with, ApiResponse, ApiState, PaginatedResponse, PaginationParams};
use crate::{
    db::DonationModel,
    donation::{CreateDonation, DonationService},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use tracing::info;

fn donation_service(state: &ApiState) -> DonationService {
    DonationService::new(
        state.app.config.clone(),
        state.app.db.clone(),
        state.app.notifier.clone(),
    )
}

/// Create a PENDING donation
pub async fn create_donation(
    State(state): State<ApiState>,
    Path(username): Path<String>,
    Json(req): Json<CreateDonation>,
) -> (StatusCode, Json<ApiResponse<DonationModel>>) {
    info!(
        "API: Create donation: creator={}, amount={}, media={}",
        username,
        req.amount,
        req.media.is_some()
    );

    let result = donation_service(&state)
        .create_donation(&username, req)
        .await;
    respond_with(StatusCode::CREATED, result)
}

/// List a creator's live donations
pub async fn list_donations(
    State(state): State<ApiState>,
    Path(username): Path<String>,
    Query(params): Query<PaginationParams>,
) -> (StatusCode, Json<ApiResponse<PaginatedResponse<DonationModel>>>) {
    let (page, per_page) = params.normalized();

    let result = donation_service(&state)
        .list_for_creator(&username, per_page, params.offset())
        .await
        .map(|(items, total)| PaginatedResponse::new(items, total, page, per_page));
    respond(result)
}

/// Get a donation by merchant reference
pub async fn get_donation(
    State(state): State<ApiState>,
    Path(merchant_ref): Path<String>,
) -> (StatusCode, Json<ApiResponse<DonationModel>>) {
    respond(donation_service(&state).get_by_merchant_ref(&merchant_ref).await)
}
