//! In-memory account repository

use crate::errors::{StorageError, StorageResult};
use crate::games::types::{Account, GameResult};
use crate::ledger::repository::AccountRepository;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default, Clone)]
pub(crate) struct LedgerSnapshot {
    pub accounts: HashMap<String, Account>,
    pub history: Vec<GameResult>,
}

impl LedgerSnapshot {
    pub fn create(
        &mut self,
        username: &str,
        initial_balance: Decimal,
        follower_snapshot: u64,
    ) -> StorageResult<Account> {
        if self.accounts.contains_key(username) {
            return Err(StorageError::AlreadyExists(username.to_string()));
        }
        let account = Account::new(username.to_string(), initial_balance, follower_snapshot);
        self.accounts.insert(username.to_string(), account.clone());
        Ok(account)
    }

    pub fn insert(&mut self, account: Account) -> StorageResult<()> {
        if self.accounts.contains_key(&account.username) {
            return Err(StorageError::AlreadyExists(account.username));
        }
        self.accounts.insert(account.username.clone(), account);
        Ok(())
    }

    pub fn save(&mut self, account: &Account) -> StorageResult<()> {
        match self.accounts.get_mut(&account.username) {
            Some(slot) => {
                *slot = account.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound(account.username.clone())),
        }
    }

    pub fn delete(&mut self, username: &str) -> bool {
        let existed = self.accounts.remove(username).is_some();
        if existed {
            self.history.retain(|r| r.username != username);
        }
        existed
    }

    pub fn recent(&self, limit: usize) -> Vec<GameResult> {
        self.history.iter().rev().take(limit).cloned().collect()
    }

    pub fn for_account(&self, username: &str) -> Vec<GameResult> {
        self.history
            .iter()
            .filter(|r| r.username == username)
            .cloned()
            .collect()
    }
}

/// Repository that keeps everything in process memory
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<LedgerSnapshot>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for InMemoryRepository {
    async fn find(&self, username: &str) -> StorageResult<Option<Account>> {
        Ok(self.state.read().await.accounts.get(username).cloned())
    }

    async fn create(
        &self,
        username: &str,
        initial_balance: Decimal,
        follower_snapshot: u64,
    ) -> StorageResult<Account> {
        self.state
            .write()
            .await
            .create(username, initial_balance, follower_snapshot)
    }

    async fn insert(&self, account: Account) -> StorageResult<()> {
        self.state.write().await.insert(account)
    }

    async fn save(&self, account: &Account) -> StorageResult<()> {
        self.state.write().await.save(account)
    }

    async fn append_history(&self, result: &GameResult) -> StorageResult<()> {
        self.state.write().await.history.push(result.clone());
        Ok(())
    }

    async fn delete(&self, username: &str) -> StorageResult<bool> {
        Ok(self.state.write().await.delete(username))
    }

    async fn accounts(&self) -> StorageResult<Vec<Account>> {
        Ok(self.state.read().await.accounts.values().cloned().collect())
    }

    async fn recent_history(&self, limit: usize) -> StorageResult<Vec<GameResult>> {
        Ok(self.state.read().await.recent(limit))
    }

    async fn account_history(&self, username: &str) -> StorageResult<Vec<GameResult>> {
        Ok(self.state.read().await.for_account(username))
    }

    async fn history(&self) -> StorageResult<Vec<GameResult>> {
        Ok(self.state.read().await.history.clone())
    }

    async fn commit_settlement(
        &self,
        _previous: &Account,
        updated: &Account,
        result: &GameResult,
    ) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.save(updated)?;
        state.history.push(result.clone());
        Ok(())
    }
}
