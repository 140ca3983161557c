//! Error types for the Zeppelin betting engine
//!
//! Validation failures are ordinary outcomes of a bet request and carry enough
//! context to render a reply to the viewer. Storage failures wrap whatever the
//! backing repository reported.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by the betting core
#[derive(Debug, Error)]
pub enum GameError {
    /// No ledger account for this viewer; they must follow/register first
    #[error("unknown account: {username}")]
    UnknownAccount { username: String },

    #[error("stake {stake} is below the minimum of {minimum}")]
    StakeTooSmall { stake: Decimal, minimum: Decimal },

    #[error("target multiplier {target} is outside [{min}, {max}]")]
    MultiplierOutOfRange {
        target: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("insufficient balance: {balance} available, {stake} requested")]
    InsufficientBalance { balance: Decimal, stake: Decimal },

    /// Settling would exceed the range of a point amount
    #[error("amount out of range: {amount} cannot be settled")]
    AmountOverflow { amount: Decimal },

    #[error("invalid game configuration: {0}")]
    InvalidConfig(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StorageError),
}

impl GameError {
    /// True for the expected, user-facing rejections of a bet request
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GameError::UnknownAccount { .. }
                | GameError::StakeTooSmall { .. }
                | GameError::MultiplierOutOfRange { .. }
                | GameError::InsufficientBalance { .. }
                | GameError::AmountOverflow { .. }
        )
    }

    /// Stable machine-readable code used by the HTTP surface
    pub fn code(&self) -> &'static str {
        match self {
            GameError::UnknownAccount { .. } => "UNKNOWN_ACCOUNT",
            GameError::StakeTooSmall { .. } => "STAKE_TOO_SMALL",
            GameError::MultiplierOutOfRange { .. } => "MULTIPLIER_OUT_OF_RANGE",
            GameError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            GameError::AmountOverflow { .. } => "AMOUNT_OVERFLOW",
            GameError::InvalidConfig(_) => "INVALID_CONFIG",
            GameError::Persistence(_) => "PERSISTENCE_FAILURE",
        }
    }

    /// Human-readable message addressed to the viewer who sent the request.
    /// Persistence details are never leaked to viewers.
    pub fn user_message(&self, username: &str) -> String {
        match self {
            GameError::UnknownAccount { .. } => {
                format!("❌ {}, you need to follow the channel first!", username)
            }
            GameError::StakeTooSmall { minimum, .. } => {
                format!("❌ {}, the minimum stake is {} points!", username, minimum)
            }
            GameError::MultiplierOutOfRange { min, max, .. } => format!(
                "❌ {}, the multiplier must be between {}x and {}x!",
                username,
                min.round_dp(1),
                max.round_dp(1)
            ),
            GameError::InsufficientBalance { balance, .. } => format!(
                "❌ {}, not enough points! Current balance: {}",
                username,
                balance.round_dp(0)
            ),
            GameError::AmountOverflow { .. } => {
                format!("❌ {}, that bet is too large to settle!", username)
            }
            GameError::InvalidConfig(reason) => format!("❌ invalid settings: {}", reason),
            GameError::Persistence(_) => {
                format!("❌ {}, your bet could not be processed, please try again!", username)
            }
        }
    }
}

/// Errors reported by an account repository
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("account already exists: {0}")]
    AlreadyExists(String),

    #[error("account not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("missing required field: {0}")]
    MissingRequired(String),

    #[error("invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Channel-info lookup failures
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel lookup request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("channel lookup returned status {0}")]
    Status(u16),
}

pub type ZeppelinResult<T> = Result<T, GameError>;
pub type StorageResult<T> = Result<T, StorageError>;
pub type ConfigResult<T> = Result<T, ConfigurationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validation_classification() {
        let err = GameError::StakeTooSmall {
            stake: dec!(0.5),
            minimum: dec!(1),
        };
        assert!(err.is_validation());
        assert_eq!(err.code(), "STAKE_TOO_SMALL");

        let err = GameError::Persistence(StorageError::Backend("disk full".to_string()));
        assert!(!err.is_validation());
        assert!(!GameError::InvalidConfig("x".to_string()).is_validation());
    }

    #[test]
    fn test_user_message_hides_storage_details() {
        let err = GameError::Persistence(StorageError::Backend("disk full".to_string()));
        let message = err.user_message("alice");
        assert!(message.contains("alice"));
        assert!(!message.contains("disk full"));
    }

    #[test]
    fn test_insufficient_balance_message() {
        let err = GameError::InsufficientBalance {
            balance: dec!(40),
            stake: dec!(100),
        };
        assert!(err.user_message("bob").contains("40"));
        assert!(err.to_string().contains("100 requested"));
    }

    #[test]
    fn test_amount_overflow_is_a_rejection() {
        let err = GameError::AmountOverflow {
            amount: Decimal::MAX,
        };
        assert!(err.is_validation());
        assert_eq!(err.code(), "AMOUNT_OVERFLOW");
        assert!(err.user_message("whale").contains("too large"));
    }

    #[test]
    fn test_storage_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: GameError = StorageError::from(io).into();
        assert_eq!(err.code(), "PERSISTENCE_FAILURE");
    }
}
