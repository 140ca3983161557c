//! Betting orchestration
//!
//! `BettingService` wires the draw, the settlement rules and the ledger
//! together. Every collaborator is injected so tests can swap in doubles.

use crate::broadcast::EventSink;
use crate::channel::ChannelInfo;
use crate::errors::{GameError, StorageError, ZeppelinResult};
use crate::games::game_config::{GameConfig, GameConfigHandle};
use crate::games::outcome::OutcomeSource;
use crate::games::settlement::SettlementEngine;
use crate::games::stats::{leaderboard, DailyAggregates, GameStats, LeaderboardEntry};
use crate::games::types::{
    normalize_username, Account, BetRequest, GameEvent, GameResult, Registration,
    SettlementOutcome, MAX_TARGET_MULTIPLIER, MIN_STAKE, MIN_TARGET_MULTIPLIER,
};
use crate::ledger::legacy::parse_legacy_users;
use crate::ledger::LedgerStore;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Check a bet against the account it would settle on. The account lookup
/// itself has already succeeded at this point.
fn validate_bet(account: &Account, stake: Decimal, target: Decimal) -> ZeppelinResult<()> {
    if stake < MIN_STAKE {
        return Err(GameError::StakeTooSmall {
            stake,
            minimum: MIN_STAKE,
        });
    }
    if target < MIN_TARGET_MULTIPLIER || target > MAX_TARGET_MULTIPLIER {
        return Err(GameError::MultiplierOutOfRange {
            target,
            min: MIN_TARGET_MULTIPLIER,
            max: MAX_TARGET_MULTIPLIER,
        });
    }
    if account.balance < stake {
        return Err(GameError::InsufficientBalance {
            balance: account.balance,
            stake,
        });
    }
    Ok(())
}

/// Everything one settlement needs, detached from the caller's lifetime
struct BetTask {
    ledger: Arc<LedgerStore>,
    outcomes: Arc<dyn OutcomeSource>,
    events: Arc<dyn EventSink>,
    aggregates: Arc<DailyAggregates>,
}

impl BetTask {
    async fn run(
        self,
        username: String,
        stake: Decimal,
        target_multiplier: Decimal,
    ) -> ZeppelinResult<SettlementOutcome> {
        let outcomes = &self.outcomes;

        let settled = self
            .ledger
            .apply_delta(&username, |account| {
                validate_bet(account, stake, target_multiplier)?;

                let drawn = outcomes.draw();
                let settlement = SettlementEngine::settle(stake, target_multiplier, drawn)?;
                Ok(GameResult {
                    game_id: Uuid::new_v4(),
                    username: account.username.clone(),
                    stake,
                    target_multiplier,
                    drawn_multiplier: drawn,
                    won: settlement.won,
                    payout: settlement.payout,
                    timestamp: Utc::now(),
                })
            })
            .await;

        let entry = match settled {
            Ok(entry) => entry,
            Err(e) if e.is_validation() => {
                debug!(
                    username = %username,
                    stake = %stake,
                    target = %target_multiplier,
                    reason = e.code(),
                    "Bet rejected"
                );
                return Err(e);
            }
            Err(e) => {
                error!(username = %username, stake = %stake, error = %e, "Bet failed");
                return Err(e);
            }
        };

        self.aggregates.record(&entry.record);

        let outcome = SettlementOutcome::from_record(&entry.record, entry.account.balance);
        info!(
            username = %outcome.username,
            stake = %outcome.stake,
            target = %outcome.target_multiplier,
            drawn = %outcome.drawn_multiplier,
            won = outcome.won,
            payout = %outcome.payout,
            balance = %outcome.new_balance,
            "Bet settled"
        );

        self.events.publish(GameEvent::GameResult {
            message: outcome.announcement(),
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }
}

pub struct BettingService {
    ledger: Arc<LedgerStore>,
    outcomes: Arc<dyn OutcomeSource>,
    config: GameConfigHandle,
    events: Arc<dyn EventSink>,
    channel: Arc<dyn ChannelInfo>,
    /// Channel whose follower count decides the registration bonus
    channel_slug: Option<String>,
    aggregates: Arc<DailyAggregates>,
}

impl BettingService {
    pub fn new(
        ledger: Arc<LedgerStore>,
        outcomes: Arc<dyn OutcomeSource>,
        config: GameConfigHandle,
        events: Arc<dyn EventSink>,
        channel: Arc<dyn ChannelInfo>,
    ) -> Self {
        Self {
            ledger,
            outcomes,
            config,
            events,
            channel,
            channel_slug: None,
            aggregates: Arc::new(DailyAggregates::new()),
        }
    }

    pub fn with_channel_slug(mut self, slug: Option<String>) -> Self {
        self.channel_slug = slug;
        self
    }

    pub fn with_aggregates(mut self, aggregates: Arc<DailyAggregates>) -> Self {
        self.aggregates = aggregates;
        self
    }

    pub fn ledger(&self) -> &Arc<LedgerStore> {
        &self.ledger
    }

    pub fn aggregates(&self) -> &Arc<DailyAggregates> {
        &self.aggregates
    }

    /// Validate, draw, settle and commit one bet.
    ///
    /// The whole sequence runs inside the account's critical section; a
    /// rejection or a storage failure leaves the account as it was. The
    /// settlement event is only published once the commit is durable.
    ///
    /// The work runs on its own task, so a caller that gives up (timeout,
    /// disconnect) cannot cut a settlement off halfway through its commit.
    pub async fn place_bet(
        &self,
        username: &str,
        stake: Decimal,
        target_multiplier: Decimal,
    ) -> ZeppelinResult<SettlementOutcome> {
        let task = BetTask {
            ledger: self.ledger.clone(),
            outcomes: self.outcomes.clone(),
            events: self.events.clone(),
            aggregates: self.aggregates.clone(),
        };
        let username = normalize_username(username);

        match tokio::spawn(task.run(username.clone(), stake, target_multiplier)).await {
            Ok(result) => result,
            Err(e) => {
                error!(username = %username, error = %e, "Settlement task aborted");
                Err(GameError::Persistence(StorageError::Backend(format!(
                    "settlement task aborted: {}",
                    e
                ))))
            }
        }
    }

    pub async fn place(&self, request: &BetRequest) -> ZeppelinResult<SettlementOutcome> {
        self.place_bet(&request.username, request.stake, request.target_multiplier)
            .await
    }

    /// Register a viewer using the configured channel's follower count.
    /// A failed lookup counts as zero followers rather than failing.
    pub async fn register(&self, username: &str) -> ZeppelinResult<Registration> {
        let followers = match &self.channel_slug {
            Some(slug) => match self.channel.follower_count(slug).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(channel = %slug, error = %e, "Follower lookup failed, assuming 0");
                    0
                }
            },
            None => {
                debug!("No channel configured, assuming 0 followers");
                0
            }
        };
        self.register_with_followers(username, followers).await
    }

    /// Register a viewer with a known follower count. Idempotent: an
    /// existing account is returned unchanged.
    pub async fn register_with_followers(&self, username: &str, followers: u64) -> ZeppelinResult<Registration> {
        let (account, created) = self.ledger.get_or_create(username, followers).await?;
        let policy = self.ledger.policy();

        let message = if !created {
            format!(
                "🔄 {} is already registered! Current balance: {}",
                account.username,
                account.balance.round_dp(0)
            )
        } else if account.balance > Decimal::ZERO {
            format!(
                "🎉 {} joined with {}+ followers! {} points granted.",
                account.username,
                policy.follower_threshold,
                account.balance.round_dp(0)
            )
        } else {
            format!(
                "👋 {} joined the game! Points are granted once the channel reaches {} followers.",
                account.username, policy.follower_threshold
            )
        };

        self.events.publish(GameEvent::UserRegistered {
            username: account.username.clone(),
            message: message.clone(),
            balance: account.balance,
            timestamp: Utc::now(),
        });

        Ok(Registration {
            account,
            created,
            message,
        })
    }

    pub async fn account(&self, username: &str) -> ZeppelinResult<Option<Account>> {
        self.ledger.find(username).await
    }

    pub async fn account_history(&self, username: &str) -> ZeppelinResult<Vec<GameResult>> {
        let username = normalize_username(username);
        Ok(self.ledger.repository().account_history(&username).await?)
    }

    pub fn config(&self) -> GameConfig {
        self.config.snapshot()
    }

    /// Replace the game settings. Invalid settings are rejected and the
    /// current ones stay active.
    pub async fn update_config(&self, config: GameConfig) -> ZeppelinResult<GameConfig> {
        if let Err(e) = self.config.update(config) {
            warn!(error = %e, "Rejected game settings update");
            return Err(e);
        }

        self.events.publish(GameEvent::ConfigUpdated {
            win_rate: config.win_rate,
            min_multiplier: config.min_multiplier,
            max_multiplier: config.max_multiplier,
        });
        Ok(config)
    }

    /// Operator balance override. Returns the previous balance and the
    /// updated account.
    pub async fn admin_set_balance(&self, username: &str, balance: Decimal) -> ZeppelinResult<(Decimal, Account)> {
        self.ledger.admin_set_balance(username, balance).await
    }

    pub async fn admin_delete_account(&self, username: &str) -> ZeppelinResult<bool> {
        self.ledger.delete(username).await
    }

    /// Import accounts from a legacy user file; existing accounts win
    pub async fn import_legacy(&self, document: &Value) -> ZeppelinResult<usize> {
        let accounts = parse_legacy_users(document);
        self.ledger.import(accounts).await
    }

    /// Rebuild the daily counters from the history log
    pub async fn rebuild_aggregates(&self) -> ZeppelinResult<usize> {
        let days = self.ledger.repository().daily_aggregates().await?;
        let count = days.len();
        self.aggregates.seed(days);
        info!(days = count, "Daily aggregates rebuilt from history");
        Ok(count)
    }

    pub async fn stats(&self) -> ZeppelinResult<GameStats> {
        let repository = self.ledger.repository();
        let accounts = repository.accounts().await?;
        let history = repository.history().await?;
        Ok(GameStats::compute(&accounts, &history, self.aggregates.today()))
    }

    pub async fn recent_games(&self, limit: usize) -> ZeppelinResult<Vec<GameResult>> {
        Ok(self.ledger.repository().recent_history(limit).await?)
    }

    pub async fn leaderboard(&self, limit: usize) -> ZeppelinResult<Vec<LeaderboardEntry>> {
        let accounts = self.ledger.repository().accounts().await?;
        Ok(leaderboard(accounts, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistrationPolicy;
    use crate::ledger::InMemoryRepository;
    use crate::testing::{RecordingSink, ScriptedOutcomes, StaticChannelInfo};
    use rust_decimal_macros::dec;

    struct Harness {
        service: BettingService,
        outcomes: Arc<ScriptedOutcomes>,
        sink: Arc<RecordingSink>,
    }

    fn harness(channel: StaticChannelInfo) -> Harness {
        let ledger = Arc::new(LedgerStore::new(
            Arc::new(InMemoryRepository::new()),
            RegistrationPolicy::default(),
        ));
        let outcomes = Arc::new(ScriptedOutcomes::new(Vec::<Decimal>::new()));
        let sink = Arc::new(RecordingSink::new());
        let service = BettingService::new(
            ledger,
            outcomes.clone(),
            GameConfigHandle::default(),
            sink.clone(),
            Arc::new(channel),
        )
        .with_channel_slug(Some("zeppelin".to_string()));
        Harness {
            service,
            outcomes,
            sink,
        }
    }

    #[test]
    fn test_validate_bet_order() {
        let account = Account::new("alice".to_string(), dec!(10), 0);

        // Stake is checked before the multiplier and the balance
        let err = validate_bet(&account, dec!(0.5), dec!(99)).unwrap_err();
        assert!(matches!(err, GameError::StakeTooSmall { .. }));

        let err = validate_bet(&account, dec!(50), dec!(0.99)).unwrap_err();
        assert!(matches!(err, GameError::MultiplierOutOfRange { .. }));

        let err = validate_bet(&account, dec!(50), dec!(2)).unwrap_err();
        assert!(matches!(err, GameError::InsufficientBalance { .. }));

        assert!(validate_bet(&account, dec!(10), dec!(50)).is_ok());
        assert!(validate_bet(&account, dec!(1), dec!(1.0)).is_ok());
    }

    #[tokio::test]
    async fn test_register_uses_channel_followers() {
        let h = harness(StaticChannelInfo::constant(150));
        let registration = h.service.register("Alice").await.unwrap();
        assert!(registration.created);
        assert_eq!(registration.account.balance, dec!(1000));
        assert!(registration.message.contains("1000 points granted"));

        let again = h.service.register("alice").await.unwrap();
        assert!(!again.created);
        assert!(again.message.contains("already registered"));

        let events = h.sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], GameEvent::UserRegistered { .. }));
    }

    #[tokio::test]
    async fn test_register_lookup_failure_counts_as_zero() {
        let h = harness(StaticChannelInfo::unavailable());
        let registration = h.service.register("bob").await.unwrap();
        assert!(registration.created);
        assert_eq!(registration.account.balance, Decimal::ZERO);
        assert_eq!(registration.account.registration_follower_snapshot, 0);
    }

    #[tokio::test]
    async fn test_unknown_account_is_checked_first() {
        let h = harness(StaticChannelInfo::constant(0));
        let err = h.service.place_bet("ghost", dec!(0), dec!(0)).await.unwrap_err();
        assert!(matches!(err, GameError::UnknownAccount { .. }));
        assert!(h.sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_place_bet_publishes_and_records() {
        let h = harness(StaticChannelInfo::constant(150));
        h.service.register("alice").await.unwrap();
        h.sink.clear();
        h.outcomes.push(dec!(3.00));

        let outcome = h.service.place_bet("alice", dec!(100), dec!(2.5)).await.unwrap();
        assert!(outcome.won);
        assert_eq!(outcome.payout, dec!(250));
        assert_eq!(outcome.new_balance, dec!(1250));

        assert_eq!(h.sink.settlements(), vec![outcome.clone()]);

        let today = h.service.aggregates().today();
        assert_eq!(today.games, 1);
        assert_eq!(today.total_stake, dec!(100));
        assert_eq!(today.total_payout, dec!(250));

        let history = h.service.account_history("ALICE").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].game_id, outcome.game_id);
    }

    #[tokio::test]
    async fn test_update_config_publishes_event() {
        let h = harness(StaticChannelInfo::constant(0));
        let config = GameConfig::new(dec!(40), dec!(2.0), dec!(60.0));
        h.service.update_config(config).await.unwrap();
        assert_eq!(h.service.config(), config);
        assert!(matches!(
            h.sink.events().last(),
            Some(GameEvent::ConfigUpdated { .. })
        ));

        let bad = GameConfig::new(dec!(5), dec!(1.0), dec!(50.0));
        assert!(h.service.update_config(bad).await.is_err());
        assert_eq!(h.service.config(), config);
        assert_eq!(h.sink.events().len(), 1);
    }

    #[tokio::test]
    async fn test_stats_and_leaderboard() {
        let h = harness(StaticChannelInfo::constant(0));
        h.service.register_with_followers("alice", 150).await.unwrap();
        h.service.register_with_followers("bob", 10).await.unwrap();
        h.outcomes.push(dec!(1.20));
        h.service.place_bet("alice", dec!(100), dec!(2)).await.unwrap();

        let stats = h.service.stats().await.unwrap();
        assert_eq!(stats.total_games, 1);
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.active_users, 1);
        assert_eq!(stats.total_balance, dec!(900));
        assert_eq!(stats.today.games, 1);

        let board = h.service.leaderboard(10).await.unwrap();
        assert_eq!(board[0].username, "alice");
        assert_eq!(h.service.recent_games(5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rebuild_aggregates_from_history() {
        let h = harness(StaticChannelInfo::constant(0));
        h.service.register_with_followers("alice", 150).await.unwrap();
        h.outcomes.push(dec!(1.20));
        h.service.place_bet("alice", dec!(10), dec!(2)).await.unwrap();
        h.service.place_bet("alice", dec!(20), dec!(2)).await.unwrap();

        h.service.aggregates().seed(Vec::new());
        assert_eq!(h.service.aggregates().today().games, 0);

        assert_eq!(h.service.rebuild_aggregates().await.unwrap(), 1);
        assert_eq!(h.service.aggregates().today().total_stake, dec!(30));
    }

    #[tokio::test]
    async fn test_admin_operations() {
        let h = harness(StaticChannelInfo::constant(0));
        h.service.register_with_followers("alice", 0).await.unwrap();

        let (old, account) = h.service.admin_set_balance("alice", dec!(77)).await.unwrap();
        assert_eq!(old, Decimal::ZERO);
        assert_eq!(account.balance, dec!(77));

        let imported = h
            .service
            .import_legacy(&serde_json::json!({
                "alice": {"balance": 5},
                "carol": {"balance": 300, "games_played": 2}
            }))
            .await
            .unwrap();
        assert_eq!(imported, 1);
        assert_eq!(h.service.account("alice").await.unwrap().unwrap().balance, dec!(77));

        assert!(h.service.admin_delete_account("carol").await.unwrap());
        assert!(h.service.account("carol").await.unwrap().is_none());
    }
}
