//! Import of the legacy per-user JSON file
//!
//! The old format is a map keyed by username with point totals stored as
//! floats and naive ISO timestamps. A `_metadata` entry may be present and is
//! ignored.

use crate::games::types::{normalize_username, Account};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

const METADATA_KEY: &str = "_metadata";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyUser {
    balance: Decimal,
    total_bets: Decimal,
    total_winnings: Decimal,
    games_played: u64,
    registration_date: Option<String>,
    last_activity: Option<String>,
    subscriber_count_at_registration: u64,
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Convert a legacy user document into accounts. Malformed entries are
/// skipped with a warning.
pub fn parse_legacy_users(document: &Value) -> Vec<Account> {
    let Some(users) = document.as_object() else {
        warn!("Legacy user document is not a JSON object");
        return Vec::new();
    };

    let now = Utc::now();
    users
        .iter()
        .filter(|(key, _)| key.as_str() != METADATA_KEY)
        .filter_map(|(key, value)| {
            let username = normalize_username(key);
            if username.is_empty() {
                return None;
            }
            let user: LegacyUser = match serde_json::from_value(value.clone()) {
                Ok(user) => user,
                Err(e) => {
                    warn!(username = %username, error = %e, "Skipping malformed legacy user");
                    return None;
                }
            };

            let registered_at = parse_timestamp(user.registration_date.as_deref()).unwrap_or(now);
            let last_activity_at = parse_timestamp(user.last_activity.as_deref()).unwrap_or(registered_at);

            Some(Account {
                username,
                balance: user.balance,
                total_wagered: user.total_bets,
                total_won: user.total_winnings,
                games_played: user.games_played,
                registered_at,
                last_activity_at,
                registration_follower_snapshot: user.subscriber_count_at_registration,
            })
        })
        .collect()
}
