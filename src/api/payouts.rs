//! Balance and payout API endpoints

use super::{auth::verify_admin_token, respond, respond_with, ApiResponse, ApiState};
use crate::{
    db::{PayoutModel, PayoutStatus},
    payout::{Balance, PayoutService},
    DonateError,
};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use tracing::info;

/// Payout request body
#[derive(Debug, Default, Deserialize)]
pub struct PayoutRequest {
    /// Amount to pay out; the whole balance when absent
    #[serde(default)]
    pub amount: Option<i64>,
}

/// Admin payout listing filter
#[derive(Debug, Deserialize)]
pub struct PayoutListParams {
    /// Only payouts with this status
    pub status: Option<String>,
}

/// Admin decision on a payout
#[derive(Debug, Deserialize)]
pub struct ProcessPayoutRequest {
    /// APPROVED, PROCESSED or REJECTED
    pub status: PayoutStatus,
    /// Optional notes for the creator
    #[serde(default)]
    pub notes: Option<String>,
}

fn payout_service(state: &ApiState) -> PayoutService {
    PayoutService::new(state.app.config.clone(), state.app.db.clone())
}

/// Payable balance of a creator
pub async fn get_balance(
    State(state): State<ApiState>,
    Path(username): Path<String>,
) -> (StatusCode, Json<ApiResponse<Balance>>) {
    respond(payout_service(&state).balance(&username).await)
}

/// Payouts of a creator
pub async fn list_creator_payouts(
    State(state): State<ApiState>,
    Path(username): Path<String>,
) -> (StatusCode, Json<ApiResponse<Vec<PayoutModel>>>) {
    respond(payout_service(&state).list_for_creator(&username).await)
}

/// Request a payout
pub async fn request_payout(
    State(state): State<ApiState>,
    Path(username): Path<String>,
    Json(req): Json<PayoutRequest>,
) -> (StatusCode, Json<ApiResponse<PayoutModel>>) {
    info!(
        "API: Payout request: creator={}, amount={:?}",
        username, req.amount
    );

    let result = payout_service(&state)
        .request_payout(&username, req.amount)
        .await;
    respond_with(StatusCode::CREATED, result)
}

/// Admin: list all payouts
pub async fn list_all_payouts(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(params): Query<PayoutListParams>,
) -> (StatusCode, Json<ApiResponse<Vec<PayoutModel>>>) {
    let result = async {
        verify_admin_token(&headers, &state.app.config)?;
        let status = params
            .status
            .as_deref()
            .map(str::parse::<PayoutStatus>)
            .transpose()
            .map_err(DonateError::Validation)?;
        payout_service(&state).list_all(status).await
    }
    .await;
    respond(result)
}

/// Admin: approve, process or reject a payout
pub async fn process_payout(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ProcessPayoutRequest>,
) -> (StatusCode, Json<ApiResponse<PayoutModel>>) {
    let result = async {
        verify_admin_token(&headers, &state.app.config)?;
        info!("API: Process payout: id={}, status={}", id, req.status);
        payout_service(&state)
            .process_payout(&id, req.status, req.notes)
            .await
    }
    .await;
    respond(result)
}
