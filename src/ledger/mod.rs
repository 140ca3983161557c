//! Balance ledger
//!
//! [`LedgerStore`] owns all account mutation. Every read-modify-write of an
//! account runs while holding that account's mutex, so two bets from the same
//! viewer can never both observe the pre-bet balance. Different accounts
//! never contend.

pub mod json_file;
pub mod legacy;
pub mod memory;
pub mod repository;

pub use json_file::JsonFileRepository;
pub use memory::InMemoryRepository;
pub use repository::AccountRepository;

use crate::config::RegistrationPolicy;
use crate::errors::{GameError, StorageError, ZeppelinResult};
use crate::games::types::{normalize_username, Account, GameResult};
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

/// Account state after a committed settlement
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub account: Account,
    pub record: GameResult,
}

/// Held account mutex; removes the registry entry on release when nobody
/// else holds or waits on it
struct AccountLock<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    username: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for AccountLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Only the registry's own handle left
        self.locks
            .remove_if(&self.username, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct LedgerStore {
    repository: Arc<dyn AccountRepository>,
    /// username -> account mutex
    locks: DashMap<String, Arc<Mutex<()>>>,
    policy: RegistrationPolicy,
}

impl LedgerStore {
    pub fn new(repository: Arc<dyn AccountRepository>, policy: RegistrationPolicy) -> Self {
        Self {
            repository,
            locks: DashMap::new(),
            policy,
        }
    }

    pub fn repository(&self) -> &Arc<dyn AccountRepository> {
        &self.repository
    }

    pub fn policy(&self) -> RegistrationPolicy {
        self.policy
    }

    /// Take the account's mutex. The registry entry is dropped again once the
    /// last holder or waiter lets go, so unknown names leave nothing behind.
    async fn lock_account(&self, username: &str) -> AccountLock<'_> {
        let lock = self.locks.entry(username.to_string()).or_default().clone();
        AccountLock {
            locks: &self.locks,
            username: username.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    pub async fn find(&self, username: &str) -> ZeppelinResult<Option<Account>> {
        let username = normalize_username(username);
        Ok(self.repository.find(&username).await?)
    }

    /// Return the viewer's account, creating it if needed. Re-registering
    /// never resets an existing account. The flag is true when the account
    /// was created by this call.
    pub async fn get_or_create(&self, username: &str, follower_count: u64) -> ZeppelinResult<(Account, bool)> {
        let username = normalize_username(username);
        let _lock = self.lock_account(&username).await;

        if let Some(existing) = self.repository.find(&username).await? {
            return Ok((existing, false));
        }

        let initial_balance = self.policy.initial_balance(follower_count);
        let account = self
            .repository
            .create(&username, initial_balance, follower_count)
            .await?;

        info!(
            username = %username,
            balance = %initial_balance,
            followers = follower_count,
            "Registered new account"
        );
        Ok((account, true))
    }

    /// Settle against an account as one critical section.
    ///
    /// `decide` sees the current account state and returns the history record
    /// to commit, or an error that leaves the account untouched. The balance
    /// change is derived from the record and persisted together with it.
    pub async fn apply_delta<F>(&self, username: &str, decide: F) -> ZeppelinResult<LedgerEntry>
    where
        F: FnOnce(&Account) -> ZeppelinResult<GameResult> + Send,
    {
        let username = normalize_username(username);
        let _lock = self.lock_account(&username).await;

        let previous = self
            .repository
            .find(&username)
            .await?
            .ok_or_else(|| GameError::UnknownAccount {
                username: username.clone(),
            })?;

        let record = decide(&previous)?;

        let mut updated = previous.clone();
        updated.apply(&record.mutation(), record.timestamp)?;

        if let Err(e) = self
            .repository
            .commit_settlement(&previous, &updated, &record)
            .await
        {
            error!(
                username = %username,
                game_id = %record.game_id,
                error = %e,
                "Failed to persist settlement; account left unchanged"
            );
            return Err(e.into());
        }

        debug!(
            username = %username,
            delta = %record.mutation().delta(),
            balance = %updated.balance,
            "Ledger updated"
        );
        Ok(LedgerEntry {
            account: updated,
            record,
        })
    }

    /// Operator override of a balance. Bypasses normal accounting: no history
    /// record is written and the lifetime stats are left alone.
    pub async fn admin_set_balance(&self, username: &str, balance: Decimal) -> ZeppelinResult<(Decimal, Account)> {
        let username = normalize_username(username);
        let _lock = self.lock_account(&username).await;

        let mut account = self
            .repository
            .find(&username)
            .await?
            .ok_or_else(|| GameError::UnknownAccount {
                username: username.clone(),
            })?;

        let old_balance = account.balance;
        account.balance = balance;
        account.last_activity_at = Utc::now();
        self.repository.save(&account).await?;

        warn!(
            username = %username,
            old_balance = %old_balance,
            new_balance = %balance,
            "Balance overridden by operator"
        );
        Ok((old_balance, account))
    }

    /// Remove an account and its history
    pub async fn delete(&self, username: &str) -> ZeppelinResult<bool> {
        let username = normalize_username(username);
        let _lock = self.lock_account(&username).await;

        let removed = self.repository.delete(&username).await?;
        if removed {
            warn!(username = %username, "Account deleted by operator");
        }
        Ok(removed)
    }

    /// Insert imported accounts, skipping usernames that already exist.
    /// Returns how many were imported.
    pub async fn import(&self, accounts: Vec<Account>) -> ZeppelinResult<usize> {
        let mut imported = 0;
        for account in accounts {
            let _lock = self.lock_account(&account.username).await;

            match self.repository.insert(account).await {
                Ok(()) => imported += 1,
                Err(StorageError::AlreadyExists(username)) => {
                    debug!(username = %username, "Import skipped existing account");
                }
                Err(e) => return Err(e.into()),
            }
        }
        info!(imported, "Imported legacy accounts");
        Ok(imported)
    }
}
