//! Operator-tunable game settings
//!
//! The settings are read on every bet and written rarely. Readers always get
//! a full copy taken under one lock, so the three fields are never mixed
//! across updates.

use crate::errors::{GameError, ZeppelinResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::info;

const WIN_RATE_RANGE: (Decimal, Decimal) = (dec!(10), dec!(60));
const MIN_MULTIPLIER_RANGE: (Decimal, Decimal) = (dec!(1.0), dec!(5.0));
const MAX_MULTIPLIER_RANGE: (Decimal, Decimal) = (dec!(10.0), dec!(100.0));

/// Game settings. `win_rate` is a percentage.
///
/// None of these fields shape the multiplier draw; they are stored and
/// reported to operators only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub win_rate: Decimal,
    pub min_multiplier: Decimal,
    pub max_multiplier: Decimal,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            win_rate: dec!(35),
            min_multiplier: dec!(1.0),
            max_multiplier: dec!(50.0),
        }
    }
}

impl GameConfig {
    pub fn new(win_rate: Decimal, min_multiplier: Decimal, max_multiplier: Decimal) -> Self {
        Self {
            win_rate,
            min_multiplier,
            max_multiplier,
        }
    }

    pub fn validate(&self) -> ZeppelinResult<()> {
        if !in_range(self.win_rate, WIN_RATE_RANGE) {
            return Err(GameError::InvalidConfig(format!(
                "win rate must be between {}% and {}%, got {}%",
                WIN_RATE_RANGE.0, WIN_RATE_RANGE.1, self.win_rate
            )));
        }
        if !in_range(self.min_multiplier, MIN_MULTIPLIER_RANGE) {
            return Err(GameError::InvalidConfig(format!(
                "min multiplier must be between {} and {}, got {}",
                MIN_MULTIPLIER_RANGE.0, MIN_MULTIPLIER_RANGE.1, self.min_multiplier
            )));
        }
        if !in_range(self.max_multiplier, MAX_MULTIPLIER_RANGE) {
            return Err(GameError::InvalidConfig(format!(
                "max multiplier must be between {} and {}, got {}",
                MAX_MULTIPLIER_RANGE.0, MAX_MULTIPLIER_RANGE.1, self.max_multiplier
            )));
        }
        if self.min_multiplier >= self.max_multiplier {
            return Err(GameError::InvalidConfig(
                "min multiplier must be smaller than max multiplier".to_string(),
            ));
        }
        Ok(())
    }
}

fn in_range(value: Decimal, (low, high): (Decimal, Decimal)) -> bool {
    value >= low && value <= high
}

/// Shared, injectable handle to the current game settings
#[derive(Debug, Clone)]
pub struct GameConfigHandle {
    inner: Arc<RwLock<GameConfig>>,
}

impl GameConfigHandle {
    pub fn new(config: GameConfig) -> ZeppelinResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(config)),
        })
    }

    /// Consistent copy of all settings
    pub fn snapshot(&self) -> GameConfig {
        match self.inner.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Validate and replace the settings, returning the previous ones.
    /// On error the current settings stay active.
    pub fn update(&self, config: GameConfig) -> ZeppelinResult<GameConfig> {
        config.validate()?;

        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let previous = std::mem::replace(&mut *guard, config);
        drop(guard);

        info!(
            win_rate = %config.win_rate,
            min_multiplier = %config.min_multiplier,
            max_multiplier = %config.max_multiplier,
            "Game settings updated (draw distribution is fixed and unaffected)"
        );
        Ok(previous)
    }
}

impl Default for GameConfigHandle {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(GameConfig::default())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn test_update_accepts_valid_settings() {
        let handle = GameConfigHandle::default();
        let previous = handle
            .update(GameConfig::new(dec!(35), dec!(1.0), dec!(50.0)))
            .unwrap();
        assert_eq!(previous, GameConfig::default());
        assert_eq!(handle.snapshot().win_rate, dec!(35));
    }

    #[test]
    fn test_rejected_update_keeps_previous() {
        let handle = GameConfigHandle::default();
        handle
            .update(GameConfig::new(dec!(40), dec!(2.0), dec!(80.0)))
            .unwrap();

        let err = handle
            .update(GameConfig::new(dec!(5), dec!(1.0), dec!(50.0)))
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidConfig(_)));
        assert_eq!(
            handle.snapshot(),
            GameConfig::new(dec!(40), dec!(2.0), dec!(80.0))
        );
    }

    #[test]
    fn test_validation_bounds() {
        let cases = [
            (dec!(61), dec!(1.0), dec!(50.0)),
            (dec!(35), dec!(0.9), dec!(50.0)),
            (dec!(35), dec!(5.1), dec!(50.0)),
            (dec!(35), dec!(1.0), dec!(9.9)),
            (dec!(35), dec!(1.0), dec!(100.1)),
        ];
        for (win_rate, min, max) in cases {
            assert!(
                GameConfig::new(win_rate, min, max).validate().is_err(),
                "{} {} {} should be rejected",
                win_rate,
                min,
                max
            );
        }

        assert!(GameConfig::new(dec!(10), dec!(1.0), dec!(10.0)).validate().is_ok());
        assert!(GameConfig::new(dec!(60), dec!(5.0), dec!(100.0)).validate().is_ok());
    }

    #[test]
    fn test_concurrent_readers_see_whole_updates() {
        let handle = GameConfigHandle::default();
        let a = GameConfig::new(dec!(20), dec!(2.0), dec!(20.0));
        let b = GameConfig::new(dec!(50), dec!(4.0), dec!(90.0));

        std::thread::scope(|scope| {
            let writer = handle.clone();
            scope.spawn(move || {
                for i in 0..1_000 {
                    writer.update(if i % 2 == 0 { a } else { b }).unwrap();
                }
            });
            for _ in 0..2 {
                let reader = handle.clone();
                scope.spawn(move || {
                    for _ in 0..1_000 {
                        let seen = reader.snapshot();
                        assert!(seen == a || seen == b || seen == GameConfig::default());
                    }
                });
            }
        });
    }
}
