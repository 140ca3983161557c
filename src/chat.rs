//! Chat command surface
//!
//! Parses viewer chat lines into commands and answers them through the
//! betting service. Malformed arguments are answered directly and never reach
//! the service.

use crate::errors::GameError;
use crate::games::outcome::win_probability;
use crate::games::service::BettingService;
use crate::games::types::normalize_username;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    Bet {
        stake: Decimal,
        target_multiplier: Decimal,
    },
    Balance,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatParseError {
    #[error("usage: !bet <stake> <multiplier>")]
    Usage,

    #[error("invalid number: {0}")]
    InvalidNumber(String),
}

fn parse_number(raw: &str) -> Result<Decimal, ChatParseError> {
    Decimal::from_str(raw).map_err(|_| ChatParseError::InvalidNumber(raw.to_string()))
}

/// Parse one chat line. Returns `None` for ordinary chat and unknown
/// commands.
pub fn parse(message: &str) -> Option<Result<ChatCommand, ChatParseError>> {
    let message = message.trim();
    if !message.starts_with('!') {
        return None;
    }

    let mut parts = message.split_whitespace();
    let command = parts.next()?.to_lowercase();

    match command.as_str() {
        "!bet" | "!bahis" => {
            let (Some(stake), Some(target)) = (parts.next(), parts.next()) else {
                return Some(Err(ChatParseError::Usage));
            };
            Some(parse_number(stake).and_then(|stake| {
                Ok(ChatCommand::Bet {
                    stake,
                    target_multiplier: parse_number(target)?,
                })
            }))
        }
        "!balance" | "!bakiye" => Some(Ok(ChatCommand::Balance)),
        "!help" | "!yardim" => Some(Ok(ChatCommand::Help)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatReplyKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub kind: ChatReplyKind,
    pub message: String,
}

impl ChatReply {
    fn info(message: String) -> Self {
        Self {
            kind: ChatReplyKind::Info,
            message,
        }
    }

    fn error(message: String) -> Self {
        Self {
            kind: ChatReplyKind::Error,
            message,
        }
    }
}

/// Answers chat commands on behalf of the game
#[derive(Clone)]
pub struct ChatResponder {
    service: Arc<BettingService>,
}

impl ChatResponder {
    pub fn new(service: Arc<BettingService>) -> Self {
        Self { service }
    }

    pub async fn handle(&self, username: &str, message: &str) -> Option<ChatReply> {
        let username = normalize_username(username);
        let command = match parse(message)? {
            Ok(command) => command,
            Err(ChatParseError::Usage) => {
                return Some(ChatReply::error(format!(
                    "❌ {}, bet format: !bet <stake> <multiplier>",
                    username
                )));
            }
            Err(ChatParseError::InvalidNumber(raw)) => {
                debug!(username = %username, raw = %raw, "Invalid number in chat command");
                return Some(ChatReply::error(format!(
                    "❌ {}, invalid bet format! Example: !bet 100 2.5",
                    username
                )));
            }
        };

        let reply = match command {
            ChatCommand::Bet {
                stake,
                target_multiplier,
            } => match self.service.place_bet(&username, stake, target_multiplier).await {
                Ok(outcome) => ChatReply::info(outcome.announcement()),
                Err(e) => self.failure(&username, e),
            },
            ChatCommand::Balance => match self.service.account(&username).await {
                Ok(Some(account)) => ChatReply::info(format!(
                    "💰 {}, your balance: {} points",
                    username,
                    account.balance.round_dp(0)
                )),
                Ok(None) => self.failure(
                    &username,
                    GameError::UnknownAccount {
                        username: username.clone(),
                    },
                ),
                Err(e) => self.failure(&username, e),
            },
            ChatCommand::Help => ChatReply::info(help_text()),
        };
        Some(reply)
    }

    fn failure(&self, username: &str, err: GameError) -> ChatReply {
        if !err.is_validation() {
            error!(username = %username, error = %err, "Chat command failed");
        }
        ChatReply::error(err.user_message(username))
    }
}

fn help_text() -> String {
    let odds: Vec<String> = [2.0, 5.0, 10.0]
        .iter()
        .map(|&target| format!("{}x ≈ {:.1}%", target, win_probability(target) * 100.0))
        .collect();
    format!(
        "ℹ️ Commands: !bet <stake> <multiplier>, !balance, !help. Odds: {}",
        odds.join(", ")
    )
}
