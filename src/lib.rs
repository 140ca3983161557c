//! Zeppelin - chat-driven multiplier betting game
//!
//! Viewers hold a virtual point balance and bet on a target multiplier. The
//! server draws a multiplier, settles the bet against a per-viewer ledger and
//! broadcasts the result to everyone watching.

pub mod api;
pub mod broadcast;
pub mod channel;
pub mod chat;
pub mod config;
pub mod errors;
pub mod games;
pub mod ledger;
pub mod testing;

pub use broadcast::{BroadcastHub, EventSink};
pub use errors::{GameError, StorageError, ZeppelinResult};
pub use games::{BettingService, GameConfig, GameConfigHandle, OutcomeGenerator, SettlementEngine};
pub use ledger::{AccountRepository, LedgerStore};
