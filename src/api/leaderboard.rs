//! Leaderboard API endpoints

use super::{auth::verify_admin_token, respond, ApiResponse, ApiState};
use crate::{
    db::MonthlyLeaderboardModel,
    jobs::{LeaderboardService, LeaderboardUpdate},
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Serialize;
use tracing::info;

/// Manual recompute result
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// Whether the board was finalized and left unchanged
    pub frozen: bool,
    /// The board after the call
    pub board: MonthlyLeaderboardModel,
}

impl From<LeaderboardUpdate> for RefreshResponse {
    fn from(update: LeaderboardUpdate) -> Self {
        match update {
            LeaderboardUpdate::Updated(board) => Self {
                frozen: false,
                board,
            },
            LeaderboardUpdate::Frozen(board) => Self {
                frozen: true,
                board,
            },
        }
    }
}

/// Manual finalize result
#[derive(Debug, Serialize)]
pub struct FinalizeResponse {
    /// False if the board was already finalized
    pub finalized: bool,
}

fn leaderboard_service(state: &ApiState) -> LeaderboardService {
    LeaderboardService::new(state.app.config.clone(), state.app.db.clone())
}

/// Current WIB month's board
pub async fn get_current_leaderboard(
    State(state): State<ApiState>,
    Path(username): Path<String>,
) -> (StatusCode, Json<ApiResponse<MonthlyLeaderboardModel>>) {
    respond(leaderboard_service(&state).current_board(&username).await)
}

/// One month's board
pub async fn get_leaderboard(
    State(state): State<ApiState>,
    Path((username, year, month)): Path<(String, i32, u32)>,
) -> (StatusCode, Json<ApiResponse<MonthlyLeaderboardModel>>) {
    respond(
        leaderboard_service(&state)
            .get_board(&username, year, month)
            .await,
    )
}

/// Admin: recompute a board
pub async fn refresh_leaderboard(
    State(state): State<ApiState>,
    Path((username, year, month)): Path<(String, i32, u32)>,
    headers: HeaderMap,
) -> (StatusCode, Json<ApiResponse<RefreshResponse>>) {
    let result = async {
        verify_admin_token(&headers, &state.app.config)?;
        info!(
            "API: Admin leaderboard refresh: creator={}, period={}-{:02}",
            username, year, month
        );
        leaderboard_service(&state)
            .refresh(&username, year, month)
            .await
            .map(RefreshResponse::from)
    }
    .await;
    respond(result)
}

/// Admin: finalize a board
pub async fn finalize_leaderboard(
    State(state): State<ApiState>,
    Path((username, year, month)): Path<(String, i32, u32)>,
    headers: HeaderMap,
) -> (StatusCode, Json<ApiResponse<FinalizeResponse>>) {
    let result = async {
        verify_admin_token(&headers, &state.app.config)?;
        info!(
            "API: Admin leaderboard finalize: creator={}, period={}-{:02}",
            username, year, month
        );
        leaderboard_service(&state)
            .finalize_for(&username, year, month)
            .await
            .map(|finalized| FinalizeResponse { finalized })
    }
    .await;
    respond(result)
}
