//! Storage interface for accounts and the settlement history log
//!
//! The ledger never depends on which backend is in use. Implementations must
//! be safe to share across tasks; per-account ordering is enforced one level
//! up by [`crate::ledger::LedgerStore`].

use crate::errors::StorageResult;
use crate::games::stats::DailyAggregate;
use crate::games::types::{Account, GameResult};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::error;

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Look up an account by normalized username
    async fn find(&self, username: &str) -> StorageResult<Option<Account>>;

    /// Insert a new account. Fails with `AlreadyExists` if the key is taken.
    async fn create(
        &self,
        username: &str,
        initial_balance: Decimal,
        follower_snapshot: u64,
    ) -> StorageResult<Account>;

    /// Insert an account exactly as given (used for imports)
    async fn insert(&self, account: Account) -> StorageResult<()>;

    /// Overwrite an existing account
    async fn save(&self, account: &Account) -> StorageResult<()>;

    /// Append one settled bet to the history log
    async fn append_history(&self, result: &GameResult) -> StorageResult<()>;

    /// Remove an account and its history; returns whether it existed
    async fn delete(&self, username: &str) -> StorageResult<bool>;

    /// All accounts, unordered
    async fn accounts(&self) -> StorageResult<Vec<Account>>;

    /// Most recent settled bets, newest first
    async fn recent_history(&self, limit: usize) -> StorageResult<Vec<GameResult>>;

    /// Full history of one account, oldest first
    async fn account_history(&self, username: &str) -> StorageResult<Vec<GameResult>>;

    /// Entire history log, oldest first
    async fn history(&self) -> StorageResult<Vec<GameResult>>;

    /// Persist an updated account and its history record as one unit.
    ///
    /// The default saves the account, then appends the record, and restores
    /// `previous` if the append fails. Backends that can write both at once
    /// should override this.
    async fn commit_settlement(
        &self,
        previous: &Account,
        updated: &Account,
        result: &GameResult,
    ) -> StorageResult<()> {
        self.save(updated).await?;

        if let Err(append_err) = self.append_history(result).await {
            if let Err(rollback_err) = self.save(previous).await {
                error!(
                    username = %previous.username,
                    error = %rollback_err,
                    "Failed to restore account after history append failure"
                );
            }
            return Err(append_err);
        }

        Ok(())
    }

    /// Per-day rollup recomputed from the history log, oldest day first
    async fn daily_aggregates(&self) -> StorageResult<Vec<DailyAggregate>> {
        let mut days: BTreeMap<chrono::NaiveDate, DailyAggregate> = BTreeMap::new();
        for result in self.history().await? {
            let date = result.timestamp.date_naive();
            days.entry(date)
                .or_insert_with(|| DailyAggregate::empty(date))
                .record(result.stake, result.payout);
        }
        Ok(days.into_values().collect())
    }
}
