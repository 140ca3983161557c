//! Request handlers
//!
//! Thin adapters between HTTP and [`BettingService`]; all rules live in the
//! service.

use super::{errors::ApiError, middleware::RequestId, models::*, websocket::WebSocketManager};
use crate::chat::ChatResponder;
use crate::games::outcome::win_probability;
use crate::games::service::BettingService;
use crate::games::stats::{GameStats, LeaderboardEntry};
use crate::games::types::{BetRequest, GameResult, MAX_TARGET_MULTIPLIER, MIN_TARGET_MULTIPLIER};
use crate::games::GameConfig;
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub service: Arc<BettingService>,
    pub chat: ChatResponder,
    pub websocket_manager: Arc<WebSocketManager>,
    pub version: String,
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        version: state.version.clone(),
        connected_clients: state.websocket_manager.client_count(),
    })
}

/// GET /api/user/:username
pub async fn account_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state
        .service
        .account(&username)
        .await
        .map_err(|e| ApiError::from_game(request_id.0.clone(), e))?
        .ok_or_else(|| ApiError::not_found(request_id.0.clone(), format!("user {} not found", username)))?;

    let mut history = state
        .service
        .account_history(&account.username)
        .await
        .map_err(|e| ApiError::from_game(request_id.0.clone(), e))?;
    history.reverse();
    history.truncate(query.clamped());

    Ok(Json(AccountResponse { account, history }))
}

/// GET /api/stats
pub async fn stats_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<GameStats>, ApiError> {
    state
        .service
        .stats()
        .await
        .map(Json)
        .map_err(|e| ApiError::from_game(request_id.0, e))
}

/// GET /api/recent?limit=n
pub async fn recent_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<GameResult>>, ApiError> {
    state
        .service
        .recent_games(query.clamped())
        .await
        .map(Json)
        .map_err(|e| ApiError::from_game(request_id.0, e))
}

/// GET /api/leaderboard?limit=n
pub async fn leaderboard_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    state
        .service
        .leaderboard(query.clamped())
        .await
        .map(Json)
        .map_err(|e| ApiError::from_game(request_id.0, e))
}

/// GET /api/odds?target=x
pub async fn odds_handler(
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<OddsQuery>,
) -> Result<Json<OddsResponse>, ApiError> {
    let targets = match query.target {
        Some(target) => {
            let min = MIN_TARGET_MULTIPLIER.to_f64().unwrap_or(1.0);
            let max = MAX_TARGET_MULTIPLIER.to_f64().unwrap_or(50.0);
            if !(min..=max).contains(&target) {
                return Err(ApiError::bad_request(
                    request_id.0,
                    format!("target must be between {} and {}", min, max),
                ));
            }
            vec![target]
        }
        None => ODDS_LADDER.to_vec(),
    };

    let odds = targets
        .into_iter()
        .map(|target| OddsEntry {
            target,
            probability: win_probability(target),
        })
        .collect();
    Ok(Json(OddsResponse { odds }))
}

/// POST /api/register
pub async fn register_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    if request.username.trim().is_empty() {
        return Err(ApiError::bad_request(request_id.0, "username is required".to_string()));
    }

    let registration = match request.followers {
        Some(followers) => {
            state
                .service
                .register_with_followers(&request.username, followers)
                .await
        }
        None => state.service.register(&request.username).await,
    }
    .map_err(|e| ApiError::from_game(request_id.0, e))?;

    Ok(Json(RegisterResponse {
        username: registration.account.username,
        created: registration.created,
        balance: registration.account.balance,
        message: registration.message,
    }))
}

/// POST /api/bet
pub async fn bet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<BetRequest>,
) -> Result<Json<BetResponse>, ApiError> {
    let outcome = state
        .service
        .place(&request)
        .await
        .map_err(|e| ApiError::from_game(request_id.0, e))?;

    Ok(Json(BetResponse {
        message: outcome.announcement(),
        outcome,
    }))
}

/// POST /api/chat
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let reply = state.chat.handle(&request.username, &request.message).await;
    Json(ChatResponse {
        handled: reply.is_some(),
        reply,
    })
}

/// GET /admin/config
pub async fn get_config_handler(State(state): State<Arc<AppState>>) -> Json<GameConfig> {
    Json(state.service.config())
}

/// POST /admin/config
pub async fn update_config_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(config): Json<GameConfig>,
) -> Result<Json<GameConfig>, ApiError> {
    state
        .service
        .update_config(config)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_game(request_id.0, e))
}

/// POST /admin/balance
pub async fn set_balance_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetBalanceRequest>,
) -> Result<Json<SetBalanceResponse>, ApiError> {
    let (old_balance, account) = state
        .service
        .admin_set_balance(&request.username, request.balance)
        .await
        .map_err(|e| ApiError::from_game(request_id.0, e))?;

    Ok(Json(SetBalanceResponse {
        username: account.username,
        old_balance,
        new_balance: account.balance,
    }))
}

/// DELETE /admin/user/:username
pub async fn delete_user_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = state
        .service
        .admin_delete_account(&username)
        .await
        .map_err(|e| ApiError::from_game(request_id.0.clone(), e))?;

    if !deleted {
        return Err(ApiError::not_found(request_id.0, format!("user {} not found", username)));
    }
    Ok(Json(DeleteResponse { username, deleted }))
}

/// POST /admin/import
pub async fn import_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(document): Json<Value>,
) -> Result<Json<ImportResponse>, ApiError> {
    if !document.is_object() {
        return Err(ApiError::bad_request(
            request_id.0,
            "expected a JSON object keyed by username".to_string(),
        ));
    }

    let imported = state
        .service
        .import_legacy(&document)
        .await
        .map_err(|e| ApiError::from_game(request_id.0, e))?;
    Ok(Json(ImportResponse { imported }))
}
