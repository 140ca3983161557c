//! Test doubles for the betting core
//!
//! Deterministic stand-ins for the random draw, the broadcast sink and the
//! repository, so settlement behaviour can be checked exactly.

use crate::broadcast::EventSink;
use crate::errors::{StorageError, StorageResult};
use crate::games::outcome::{OutcomeSource, MIN_DRAW};
use crate::games::types::{Account, GameEvent, GameResult, SettlementOutcome};
use crate::ledger::{AccountRepository, InMemoryRepository};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Semaphore;

pub use crate::channel::StaticChannelInfo;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Returns predetermined draws in order. Once the script runs out the last
/// draw repeats.
#[derive(Debug)]
pub struct ScriptedOutcomes {
    script: Mutex<VecDeque<Decimal>>,
    last: Mutex<Decimal>,
}

impl ScriptedOutcomes {
    pub fn new<I: IntoIterator<Item = Decimal>>(draws: I) -> Self {
        Self {
            script: Mutex::new(draws.into_iter().collect()),
            last: Mutex::new(MIN_DRAW),
        }
    }

    pub fn constant(draw: Decimal) -> Self {
        Self::new([draw])
    }

    /// Queue more draws behind the current script
    pub fn push(&self, draw: Decimal) {
        lock(&self.script).push_back(draw);
    }
}

impl OutcomeSource for ScriptedOutcomes {
    fn draw(&self) -> Decimal {
        let mut last = lock(&self.last);
        if let Some(next) = lock(&self.script).pop_front() {
            *last = next;
        }
        *last
    }
}

/// Keeps every published event
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<GameEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GameEvent> {
        lock(&self.events).clone()
    }

    pub fn settlements(&self) -> Vec<SettlementOutcome> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                GameEvent::GameResult { outcome, .. } => Some(outcome.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: GameEvent) {
        lock(&self.events).push(event);
    }
}

/// In-memory repository that can be told to fail saves or history appends.
///
/// It keeps the default two-step `commit_settlement`, so an append failure
/// exercises the compensating restore of the account.
#[derive(Debug, Default)]
pub struct FlakyRepository {
    inner: InMemoryRepository,
    fail_saves: AtomicBool,
    fail_appends: AtomicBool,
}

impl FlakyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    fn injected(flag: &AtomicBool, what: &str) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("injected {} failure", what)));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for FlakyRepository {
    async fn find(&self, username: &str) -> StorageResult<Option<Account>> {
        self.inner.find(username).await
    }

    async fn create(
        &self,
        username: &str,
        initial_balance: Decimal,
        follower_snapshot: u64,
    ) -> StorageResult<Account> {
        self.inner
            .create(username, initial_balance, follower_snapshot)
            .await
    }

    async fn insert(&self, account: Account) -> StorageResult<()> {
        self.inner.insert(account).await
    }

    async fn save(&self, account: &Account) -> StorageResult<()> {
        Self::injected(&self.fail_saves, "save")?;
        self.inner.save(account).await
    }

    async fn append_history(&self, result: &GameResult) -> StorageResult<()> {
        Self::injected(&self.fail_appends, "append")?;
        self.inner.append_history(result).await
    }

    async fn delete(&self, username: &str) -> StorageResult<bool> {
        self.inner.delete(username).await
    }

    async fn accounts(&self) -> StorageResult<Vec<Account>> {
        self.inner.accounts().await
    }

    async fn recent_history(&self, limit: usize) -> StorageResult<Vec<GameResult>> {
        self.inner.recent_history(limit).await
    }

    async fn account_history(&self, username: &str) -> StorageResult<Vec<GameResult>> {
        self.inner.account_history(username).await
    }

    async fn history(&self) -> StorageResult<Vec<GameResult>> {
        self.inner.history().await
    }
}

/// Wraps a repository and holds every settlement commit until a permit is
/// released, so tests can abandon a bet while its commit is in flight.
#[derive(Debug)]
pub struct GatedRepository<R> {
    inner: R,
    gate: Semaphore,
}

impl<R: AccountRepository> GatedRepository<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
        }
    }

    /// Let `commits` held settlements through
    pub fn release_commits(&self, commits: usize) {
        self.gate.add_permits(commits);
    }
}

#[async_trait]
impl<R: AccountRepository> AccountRepository for GatedRepository<R> {
    async fn find(&self, username: &str) -> StorageResult<Option<Account>> {
        self.inner.find(username).await
    }

    async fn create(
        &self,
        username: &str,
        initial_balance: Decimal,
        follower_snapshot: u64,
    ) -> StorageResult<Account> {
        self.inner
            .create(username, initial_balance, follower_snapshot)
            .await
    }

    async fn insert(&self, account: Account) -> StorageResult<()> {
        self.inner.insert(account).await
    }

    async fn save(&self, account: &Account) -> StorageResult<()> {
        self.inner.save(account).await
    }

    async fn append_history(&self, result: &GameResult) -> StorageResult<()> {
        self.inner.append_history(result).await
    }

    async fn delete(&self, username: &str) -> StorageResult<bool> {
        self.inner.delete(username).await
    }

    async fn accounts(&self) -> StorageResult<Vec<Account>> {
        self.inner.accounts().await
    }

    async fn recent_history(&self, limit: usize) -> StorageResult<Vec<GameResult>> {
        self.inner.recent_history(limit).await
    }

    async fn account_history(&self, username: &str) -> StorageResult<Vec<GameResult>> {
        self.inner.account_history(username).await
    }

    async fn history(&self) -> StorageResult<Vec<GameResult>> {
        self.inner.history().await
    }

    async fn commit_settlement(
        &self,
        previous: &Account,
        updated: &Account,
        result: &GameResult,
    ) -> StorageResult<()> {
        self.gate
            .acquire()
            .await
            .map_err(|e| StorageError::Backend(format!("commit gate closed: {}", e)))?
            .forget();
        self.inner.commit_settlement(previous, updated, result).await
    }
}
