//! Bet settlement
//!
//! A bet wins when the drawn multiplier reaches the viewer's target. A winning
//! bet pays `stake * target`: the declared target is the payout rate, not the
//! drawn value.

use crate::errors::{GameError, ZeppelinResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Win/loss decision and payout for one bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub won: bool,
    pub payout: Decimal,
}

/// Pure settlement rules
#[derive(Debug, Default, Clone, Copy)]
pub struct SettlementEngine;

impl SettlementEngine {
    /// Fails only when the payout does not fit in a `Decimal`
    pub fn settle(
        stake: Decimal,
        target_multiplier: Decimal,
        drawn_multiplier: Decimal,
    ) -> ZeppelinResult<Settlement> {
        let won = drawn_multiplier >= target_multiplier;
        let payout = if won {
            stake
                .checked_mul(target_multiplier)
                .ok_or(GameError::AmountOverflow { amount: stake })?
        } else {
            Decimal::ZERO
        };
        Ok(Settlement { won, payout })
    }
}
