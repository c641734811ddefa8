//! Payment webhook handler

use super::{respond, ApiResponse, ApiState};
use crate::donation::{DonationService, PaymentWebhook, WebhookOutcome};
use axum::{extract::State, http::StatusCode, response::Json};
use tracing::info;

/// Handle a payment gateway notification
///
/// The signature is checked before anything is read. Redelivered and
/// unmapped notifications are acknowledged with 200 so the gateway stops
/// retrying them.
pub async fn handle_payment_webhook(
    State(state): State<ApiState>,
    Json(req): Json<PaymentWebhook>,
) -> (StatusCode, Json<ApiResponse<WebhookOutcome>>) {
    info!(
        "API: Payment webhook: order_id={}, transaction_status={}, gross_amount={}",
        req.order_id, req.transaction_status, req.gross_amount
    );

    let service = DonationService::new(
        state.app.config.clone(),
        state.app.db.clone(),
        state.app.notifier.clone(),
    );
    respond(service.apply_webhook(req).await)
}
