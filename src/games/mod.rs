pub mod game_config;
pub mod outcome;
pub mod service;
pub mod settlement;
pub mod stats;
pub mod types;

pub use game_config::{GameConfig, GameConfigHandle};
pub use outcome::{OutcomeGenerator, OutcomeSource};
pub use service::BettingService;
pub use settlement::{Settlement, SettlementEngine};
pub use types::*;
