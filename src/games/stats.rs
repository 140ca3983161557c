//! Daily rollups and operator statistics
//!
//! The per-day counters are a derived view of the history log. They are kept
//! in process for cheap reads and can be rebuilt from the repository at any
//! time.

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::games::types::{Account, GameResult};

/// Totals for one calendar day (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub games: u64,
    pub total_stake: Decimal,
    pub total_payout: Decimal,
}

impl DailyAggregate {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            games: 0,
            total_stake: Decimal::ZERO,
            total_payout: Decimal::ZERO,
        }
    }

    /// Totals saturate at `Decimal::MAX` instead of overflowing
    pub fn record(&mut self, stake: Decimal, payout: Decimal) {
        self.games += 1;
        self.total_stake = self.total_stake.saturating_add(stake);
        self.total_payout = self.total_payout.saturating_add(payout);
    }
}

/// Process-wide daily counters
#[derive(Debug, Default)]
pub struct DailyAggregates {
    days: DashMap<NaiveDate, DailyAggregate>,
}

impl DailyAggregates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the counters with a rollup loaded from storage
    pub fn seed(&self, aggregates: Vec<DailyAggregate>) {
        self.days.clear();
        for aggregate in aggregates {
            self.days.insert(aggregate.date, aggregate);
        }
    }

    /// Count one settled bet. The increment happens under the day's shard
    /// lock, so concurrent settlements do not lose updates.
    pub fn record(&self, result: &GameResult) {
        let date = result.timestamp.date_naive();
        self.days
            .entry(date)
            .or_insert_with(|| DailyAggregate::empty(date))
            .record(result.stake, result.payout);
    }

    pub fn day(&self, date: NaiveDate) -> DailyAggregate {
        self.days
            .get(&date)
            .map(|entry| *entry)
            .unwrap_or_else(|| DailyAggregate::empty(date))
    }

    pub fn today(&self) -> DailyAggregate {
        self.day(Utc::now().date_naive())
    }

    /// All tracked days, oldest first
    pub fn snapshot(&self) -> Vec<DailyAggregate> {
        let mut days: Vec<DailyAggregate> = self.days.iter().map(|entry| *entry).collect();
        days.sort_by_key(|day| day.date);
        days
    }
}

fn saturating_sum(amounts: impl Iterator<Item = Decimal>) -> Decimal {
    amounts.fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Summary shown on the operator dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStats {
    pub total_games: u64,
    pub total_stake: Decimal,
    pub total_payout: Decimal,
    pub total_users: u64,
    /// Accounts with a positive balance
    pub active_users: u64,
    pub total_balance: Decimal,
    pub today: DailyAggregate,
}

impl GameStats {
    pub fn compute(accounts: &[Account], history: &[GameResult], today: DailyAggregate) -> Self {
        Self {
            total_games: history.len() as u64,
            total_stake: saturating_sum(history.iter().map(|r| r.stake)),
            total_payout: saturating_sum(history.iter().map(|r| r.payout)),
            total_users: accounts.len() as u64,
            active_users: accounts
                .iter()
                .filter(|a| a.balance > Decimal::ZERO)
                .count() as u64,
            total_balance: saturating_sum(accounts.iter().map(|a| a.balance)),
            today,
        }
    }
}

/// Leaderboard entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub username: String,
    pub balance: Decimal,
    pub games_played: u64,
    pub total_won: Decimal,
}

/// Top `limit` accounts by balance; ties broken by username
pub fn leaderboard(mut accounts: Vec<Account>, limit: usize) -> Vec<LeaderboardEntry> {
    accounts.sort_by(|a, b| {
        b.balance
            .cmp(&a.balance)
            .then_with(|| a.username.cmp(&b.username))
    });
    accounts
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, account)| LeaderboardEntry {
            rank: i + 1,
            username: account.username,
            balance: account.balance,
            games_played: account.games_played,
            total_won: account.total_won,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use uuid::Uuid;

    fn result(stake: Decimal, payout: Decimal) -> GameResult {
        GameResult {
            game_id: Uuid::new_v4(),
            username: "alice".to_string(),
            stake,
            target_multiplier: dec!(2),
            drawn_multiplier: dec!(2.5),
            won: payout > Decimal::ZERO,
            payout,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_record_counts_every_stake() {
        let aggregates = DailyAggregates::new();
        aggregates.record(&result(dec!(100), dec!(200)));
        aggregates.record(&result(dec!(50), Decimal::ZERO));

        let today = aggregates.today();
        assert_eq!(today.games, 2);
        assert_eq!(today.total_stake, dec!(150));
        assert_eq!(today.total_payout, dec!(200));
    }

    #[test]
    fn test_totals_saturate() {
        let aggregates = DailyAggregates::new();
        aggregates.record(&result(Decimal::MAX, Decimal::ZERO));
        aggregates.record(&result(Decimal::MAX, Decimal::ZERO));
        assert_eq!(aggregates.today().total_stake, Decimal::MAX);

        let history = vec![result(Decimal::MAX, Decimal::ZERO), result(dec!(1), Decimal::ZERO)];
        let stats = GameStats::compute(&[], &history, aggregates.today());
        assert_eq!(stats.total_stake, Decimal::MAX);
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let aggregates = Arc::new(DailyAggregates::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let aggregates = aggregates.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        aggregates.record(&result(dec!(1), Decimal::ZERO));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // A run straddling midnight would split across two days
        let total: u64 = aggregates.snapshot().iter().map(|d| d.games).sum();
        assert_eq!(total, 4_000);
    }

    #[test]
    fn test_seed_replaces_counters() {
        let aggregates = DailyAggregates::new();
        aggregates.record(&result(dec!(5), Decimal::ZERO));

        let date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let mut seeded = DailyAggregate::empty(date);
        seeded.record(dec!(10), dec!(20));
        aggregates.seed(vec![seeded]);

        assert_eq!(aggregates.snapshot(), vec![seeded]);
        assert_eq!(aggregates.day(date).total_payout, dec!(20));
    }

    #[test]
    fn test_game_stats_compute() {
        let accounts = vec![
            Account::new("alice".to_string(), dec!(700), 150),
            Account::new("bob".to_string(), Decimal::ZERO, 10),
        ];
        let history = vec![result(dec!(100), dec!(200)), result(dec!(300), Decimal::ZERO)];
        let today = DailyAggregate::empty(Utc::now().date_naive());

        let stats = GameStats::compute(&accounts, &history, today);
        assert_eq!(stats.total_games, 2);
        assert_eq!(stats.total_stake, dec!(400));
        assert_eq!(stats.total_payout, dec!(200));
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.active_users, 1);
        assert_eq!(stats.total_balance, dec!(700));
    }

    #[test]
    fn test_leaderboard_order() {
        let accounts = vec![
            Account::new("carol".to_string(), dec!(50), 0),
            Account::new("alice".to_string(), dec!(900), 0),
            Account::new("bob".to_string(), dec!(50), 0),
        ];
        let board = leaderboard(accounts, 2);
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].username, "alice");
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[1].username, "bob");
    }
}
