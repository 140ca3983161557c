//! Request and response bodies for the HTTP surface

use crate::chat::ChatReply;
use crate::games::types::{Account, GameResult, SettlementOutcome};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

/// Targets listed by `GET /api/odds` when none is requested
pub const ODDS_LADDER: [f64; 7] = [1.5, 2.0, 3.0, 5.0, 10.0, 20.0, 50.0];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub connected_clients: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl LimitQuery {
    pub fn clamped(&self) -> usize {
        self.limit.clamp(1, MAX_LIMIT)
    }
}

/// Follow event. With `followers` set the channel lookup is skipped.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub followers: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub username: String,
    pub created: bool,
    pub balance: Decimal,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetResponse {
    #[serde(flatten)]
    pub outcome: SettlementOutcome,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub account: Account,
    pub history: Vec<GameResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub username: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// False when the message was ordinary chat
    pub handled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ChatReply>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsQuery {
    #[serde(default)]
    pub target: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsEntry {
    pub target: f64,
    pub probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsResponse {
    pub odds: Vec<OddsEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetBalanceRequest {
    pub username: String,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetBalanceResponse {
    pub username: String,
    pub old_balance: Decimal,
    pub new_balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub username: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResponse {
    pub imported: usize,
}
