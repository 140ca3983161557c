//! Durable repository backed by a single JSON document
//!
//! Every mutation is applied to a copy of the ledger, the copy is written to
//! `<path>.tmp` and renamed over the data file, and only then does it become
//! the live view. A failed write therefore leaves both disk and memory as
//! they were.

use crate::errors::StorageResult;
use crate::games::types::{Account, GameResult};
use crate::ledger::memory::LedgerSnapshot;
use crate::ledger::repository::AccountRepository;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerDocument {
    accounts: HashMap<String, Account>,
    history: Vec<GameResult>,
}

pub struct JsonFileRepository {
    path: PathBuf,
    state: Mutex<LedgerSnapshot>,
}

impl JsonFileRepository {
    /// Open the data file, creating an empty ledger if it does not exist yet
    pub async fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let document: LedgerDocument = serde_json::from_slice(&bytes)?;
                info!(
                    path = %path.display(),
                    accounts = document.accounts.len(),
                    games = document.history.len(),
                    "Loaded ledger"
                );
                LedgerSnapshot {
                    accounts: document.accounts,
                    history: document.history,
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No ledger file found, starting empty");
                LedgerSnapshot::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            state: Mutex::new(snapshot),
        })
    }

    async fn persist(&self, snapshot: &LedgerSnapshot) -> StorageResult<()> {
        let document = LedgerDocumentRef {
            accounts: &snapshot.accounts,
            history: &snapshot.history,
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Ledger written");
        Ok(())
    }

    /// Run `mutate` against a copy of the ledger and commit it if both the
    /// mutation and the write succeed
    async fn transact<T, F>(&self, mutate: F) -> StorageResult<T>
    where
        F: FnOnce(&mut LedgerSnapshot) -> StorageResult<T> + Send,
        T: Send,
    {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let value = mutate(&mut next)?;
        self.persist(&next).await?;
        *state = next;
        Ok(value)
    }
}

#[derive(Serialize)]
struct LedgerDocumentRef<'a> {
    accounts: &'a HashMap<String, Account>,
    history: &'a Vec<GameResult>,
}

#[async_trait]
impl AccountRepository for JsonFileRepository {
    async fn find(&self, username: &str) -> StorageResult<Option<Account>> {
        Ok(self.state.lock().await.accounts.get(username).cloned())
    }

    async fn create(
        &self,
        username: &str,
        initial_balance: Decimal,
        follower_snapshot: u64,
    ) -> StorageResult<Account> {
        self.transact(|ledger| ledger.create(username, initial_balance, follower_snapshot))
            .await
    }

    async fn insert(&self, account: Account) -> StorageResult<()> {
        self.transact(move |ledger| ledger.insert(account)).await
    }

    async fn save(&self, account: &Account) -> StorageResult<()> {
        self.transact(|ledger| ledger.save(account)).await
    }

    async fn append_history(&self, result: &GameResult) -> StorageResult<()> {
        self.transact(|ledger| {
            ledger.history.push(result.clone());
            Ok(())
        })
        .await
    }

    async fn delete(&self, username: &str) -> StorageResult<bool> {
        self.transact(|ledger| Ok(ledger.delete(username))).await
    }

    async fn accounts(&self) -> StorageResult<Vec<Account>> {
        Ok(self.state.lock().await.accounts.values().cloned().collect())
    }

    async fn recent_history(&self, limit: usize) -> StorageResult<Vec<GameResult>> {
        Ok(self.state.lock().await.recent(limit))
    }

    async fn account_history(&self, username: &str) -> StorageResult<Vec<GameResult>> {
        Ok(self.state.lock().await.for_account(username))
    }

    async fn history(&self) -> StorageResult<Vec<GameResult>> {
        Ok(self.state.lock().await.history.clone())
    }

    async fn commit_settlement(
        &self,
        _previous: &Account,
        updated: &Account,
        result: &GameResult,
    ) -> StorageResult<()> {
        self.transact(|ledger| {
            ledger.save(updated)?;
            ledger.history.push(result.clone());
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_ledger_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ledger.json");

        {
            let repo = JsonFileRepository::open(&path).await.unwrap();
            let mut account = repo.create("alice", dec!(1000), 120).await.unwrap();
            let previous = account.clone();
            account.balance = dec!(1100);
            account.total_won = dec!(100);

            let result = GameResult {
                game_id: Uuid::new_v4(),
                username: "alice".to_string(),
                stake: dec!(50),
                target_multiplier: dec!(2.0),
                drawn_multiplier: dec!(4.20),
                won: true,
                payout: dec!(100),
                timestamp: Utc::now(),
            };
            repo.commit_settlement(&previous, &account, &result).await.unwrap();
        }

        let reopened = JsonFileRepository::open(&path).await.unwrap();
        let alice = reopened.find("alice").await.unwrap().unwrap();
        assert_eq!(alice.balance, dec!(1100));
        assert_eq!(alice.registration_follower_snapshot, 120);

        let history = reopened.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].drawn_multiplier, dec!(4.20));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_failed_mutation_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        let repo = JsonFileRepository::open(&path).await.unwrap();
        repo.create("alice", dec!(10), 0).await.unwrap();

        assert!(repo.create("alice", dec!(999), 0).await.is_err());

        let reopened = JsonFileRepository::open(&path).await.unwrap();
        assert_eq!(reopened.find("alice").await.unwrap().unwrap().balance, dec!(10));
    }

    #[tokio::test]
    async fn test_write_failure_keeps_memory_view() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        let repo = JsonFileRepository::open(&path).await.unwrap();
        repo.create("alice", dec!(10), 0).await.unwrap();

        // A directory squatting on the temp path makes the next write fail
        std::fs::create_dir(dir.path().join("ledger.json.tmp")).unwrap();

        let mut account = repo.find("alice").await.unwrap().unwrap();
        account.balance = dec!(0);
        assert!(repo.save(&account).await.is_err());
        assert_eq!(repo.find("alice").await.unwrap().unwrap().balance, dec!(10));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, b"{ not json").unwrap();

        assert!(JsonFileRepository::open(&path).await.is_err());
    }
}
