use crate::errors::{GameError, ZeppelinResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Smallest stake accepted for a single bet
pub const MIN_STAKE: Decimal = dec!(1);

/// Lowest target multiplier a viewer may bet on
pub const MIN_TARGET_MULTIPLIER: Decimal = dec!(1.0);

/// Highest target multiplier a viewer may bet on
pub const MAX_TARGET_MULTIPLIER: Decimal = dec!(50.0);

/// Lower-case and trim a username so every lookup hits the same ledger key
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Per-viewer ledger account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub username: String,
    pub balance: Decimal,
    pub total_wagered: Decimal,
    pub total_won: Decimal,
    pub games_played: u64,
    pub registered_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    /// Follower count observed when the account was created; never changes
    pub registration_follower_snapshot: u64,
}

impl Account {
    pub fn new(username: String, initial_balance: Decimal, follower_snapshot: u64) -> Self {
        let now = Utc::now();
        Self {
            username,
            balance: initial_balance,
            total_wagered: Decimal::ZERO,
            total_won: Decimal::ZERO,
            games_played: 0,
            registered_at: now,
            last_activity_at: now,
            registration_follower_snapshot: follower_snapshot,
        }
    }

    /// Apply a settlement to the account's balance and lifetime stats.
    /// On overflow the account is left untouched.
    pub fn apply(&mut self, mutation: &LedgerMutation, at: DateTime<Utc>) -> ZeppelinResult<()> {
        match *mutation {
            LedgerMutation::Win { payout } => {
                let overflow = || GameError::AmountOverflow { amount: payout };
                let balance = self.balance.checked_add(payout).ok_or_else(overflow)?;
                let total_won = self.total_won.checked_add(payout).ok_or_else(overflow)?;
                self.balance = balance;
                self.total_won = total_won;
            }
            LedgerMutation::Loss { stake } => {
                let overflow = || GameError::AmountOverflow { amount: stake };
                let balance = self.balance.checked_sub(stake).ok_or_else(overflow)?;
                let total_wagered = self.total_wagered.checked_add(stake).ok_or_else(overflow)?;
                self.balance = balance;
                self.total_wagered = total_wagered;
                self.games_played += 1;
            }
        }
        self.last_activity_at = at;
        Ok(())
    }
}

/// Balance change produced by one settled bet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerMutation {
    Win { payout: Decimal },
    Loss { stake: Decimal },
}

impl LedgerMutation {
    /// Signed balance delta
    pub fn delta(&self) -> Decimal {
        match *self {
            LedgerMutation::Win { payout } => payout,
            LedgerMutation::Loss { stake } => -stake,
        }
    }
}

/// A bet as submitted by a viewer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRequest {
    pub username: String,
    pub stake: Decimal,
    pub target_multiplier: Decimal,
}

/// Immutable record of one settled bet, appended to the history log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameResult {
    pub game_id: Uuid,
    pub username: String,
    pub stake: Decimal,
    pub target_multiplier: Decimal,
    pub drawn_multiplier: Decimal,
    pub won: bool,
    pub payout: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl GameResult {
    /// Ledger mutation this record implies
    pub fn mutation(&self) -> LedgerMutation {
        if self.won {
            LedgerMutation::Win {
                payout: self.payout,
            }
        } else {
            LedgerMutation::Loss { stake: self.stake }
        }
    }
}

/// What `place_bet` hands back to the caller and the broadcast sink
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettlementOutcome {
    pub game_id: Uuid,
    pub username: String,
    pub stake: Decimal,
    pub target_multiplier: Decimal,
    pub drawn_multiplier: Decimal,
    pub won: bool,
    pub payout: Decimal,
    pub new_balance: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl SettlementOutcome {
    pub fn from_record(record: &GameResult, new_balance: Decimal) -> Self {
        Self {
            game_id: record.game_id,
            username: record.username.clone(),
            stake: record.stake,
            target_multiplier: record.target_multiplier,
            drawn_multiplier: record.drawn_multiplier,
            won: record.won,
            payout: record.payout,
            new_balance,
            timestamp: record.timestamp,
        }
    }

    /// Chat-ready announcement of the result
    pub fn announcement(&self) -> String {
        if self.won {
            format!(
                "🎉 {}, the zeppelin reached {}x and you won! +{} points. New balance: {}",
                self.username,
                self.drawn_multiplier,
                self.payout.round_dp(0),
                self.new_balance.round_dp(0)
            )
        } else {
            format!(
                "💥 {}, the zeppelin burst at {}x! You lost. New balance: {}",
                self.username,
                self.drawn_multiplier,
                self.new_balance.round_dp(0)
            )
        }
    }
}

/// Outcome of a registration (follow) request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub account: Account,
    pub created: bool,
    pub message: String,
}

/// Events pushed to every connected viewer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    /// A bet was settled
    GameResult {
        #[serde(flatten)]
        outcome: SettlementOutcome,
        message: String,
    },

    /// A viewer followed and was registered (or was already registered)
    UserRegistered {
        username: String,
        message: String,
        balance: Decimal,
        timestamp: DateTime<Utc>,
    },

    /// Operator changed the game settings
    ConfigUpdated {
        win_rate: Decimal,
        min_multiplier: Decimal,
        max_multiplier: Decimal,
    },

    /// Keep-alive for idle connections
    Heartbeat { timestamp: DateTime<Utc> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("  Alice "), "alice");
        assert_eq!(normalize_username("BOB"), "bob");
    }

    #[test]
    fn test_account_apply_win_leaves_counters() {
        let mut account = Account::new("alice".to_string(), dec!(500), 150);
        account.apply(&LedgerMutation::Win { payout: dec!(200) }, Utc::now()).unwrap();

        assert_eq!(account.balance, dec!(700));
        assert_eq!(account.total_won, dec!(200));
        assert_eq!(account.total_wagered, Decimal::ZERO);
        assert_eq!(account.games_played, 0);
    }

    #[test]
    fn test_account_apply_loss() {
        let mut account = Account::new("alice".to_string(), dec!(700), 150);
        account.apply(&LedgerMutation::Loss { stake: dec!(300) }, Utc::now()).unwrap();

        assert_eq!(account.balance, dec!(400));
        assert_eq!(account.total_wagered, dec!(300));
        assert_eq!(account.games_played, 1);
        assert_eq!(account.registration_follower_snapshot, 150);
    }

    #[test]
    fn test_account_apply_overflow_leaves_account() {
        let mut account = Account::new("whale".to_string(), Decimal::MAX, 0);
        let before = account.clone();

        let err = account
            .apply(&LedgerMutation::Win { payout: dec!(1) }, Utc::now())
            .unwrap_err();
        assert!(matches!(err, GameError::AmountOverflow { .. }));
        assert_eq!(account, before);
    }

    #[test]
    fn test_game_event_serialization_tag() {
        let event = GameEvent::UserRegistered {
            username: "alice".to_string(),
            message: "hi".to_string(),
            balance: dec!(1000),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "user_registered");
        assert_eq!(json["username"], "alice");
    }
}
