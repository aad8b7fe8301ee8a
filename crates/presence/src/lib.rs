// coedit-presence: read-side reduction of raw awareness entries.
//
// The relay distributes one awareness entry per connection-local client
// id; one human with two tabs therefore shows up twice. This crate is
// the contract the relay must satisfy for UI builds: it deduplicates
// raw entries into per-account presence with derived status. It is a
// pure projection: awareness remains the source of truth and status is
// recomputed on every read, never stored.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use coedit_common::ClientState;

/// Presence policy thresholds. The cadence and cutoffs are deployment
/// policy, not protocol invariants, so they stay configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresencePolicy {
    /// `last_seen` within this window reads as online.
    pub online_within: Duration,
    /// Within this window (but past `online_within`) reads as away.
    pub away_within: Duration,
    /// How often a client should republish its state to refresh
    /// `last_seen`. The relay does not enforce this; a silent client
    /// simply drifts to away and then offline.
    pub heartbeat_interval: Duration,
}

impl Default for PresencePolicy {
    fn default() -> Self {
        Self {
            online_within: Duration::from_secs(2 * 60),
            away_within: Duration::from_secs(10 * 60),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Away,
    Offline,
}

/// One raw awareness entry as distributed by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceUser {
    pub client_id: u64,
    pub name: String,
    pub color: String,
    /// Millisecond epoch of the owner's last heartbeat.
    pub last_seen: i64,
    pub is_typing: bool,
}

impl PresenceUser {
    /// Build a raw entry from a decoded awareness state.
    pub fn from_state(client_id: u64, state: &ClientState) -> Self {
        Self {
            client_id,
            name: if state.name.is_empty() { "Anonymous".into() } else { state.name.clone() },
            color: state.color.clone(),
            last_seen: state.last_seen,
            is_typing: state.is_typing,
        }
    }
}

/// One human account, after deduplication by display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceAccount {
    /// Client id of the representative entry (the freshest one).
    pub client_id: u64,
    pub name: String,
    pub color: String,
    pub last_seen: i64,
    pub status: PresenceStatus,
    /// True if any entry sharing this name is typing.
    pub is_typing: bool,
}

/// Current time as a millisecond epoch, the clock `reduce` expects.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Derive a status from elapsed time since `last_seen`.
pub fn status_at(last_seen: i64, now: i64, policy: &PresencePolicy) -> PresenceStatus {
    let elapsed = now.saturating_sub(last_seen);
    if elapsed < policy.online_within.as_millis() as i64 {
        PresenceStatus::Online
    } else if elapsed < policy.away_within.as_millis() as i64 {
        PresenceStatus::Away
    } else {
        PresenceStatus::Offline
    }
}

/// Deduplicate raw entries into per-account presence.
///
/// Grouping key is the display name: one person may hold several client
/// ids at once (one per tab). The entry with the greatest `last_seen`
/// wins as the representative record; `is_typing` is OR-ed across the
/// group. Output order follows first appearance in the input.
pub fn reduce(users: &[PresenceUser], now: i64, policy: &PresencePolicy) -> Vec<PresenceAccount> {
    let mut order: Vec<String> = Vec::new();
    let mut accounts: HashMap<String, PresenceAccount> = HashMap::new();

    for user in users {
        match accounts.get_mut(&user.name) {
            None => {
                order.push(user.name.clone());
                accounts.insert(
                    user.name.clone(),
                    PresenceAccount {
                        client_id: user.client_id,
                        name: user.name.clone(),
                        color: user.color.clone(),
                        last_seen: user.last_seen,
                        status: status_at(user.last_seen, now, policy),
                        is_typing: user.is_typing,
                    },
                );
            }
            Some(existing) => {
                if user.last_seen > existing.last_seen {
                    existing.client_id = user.client_id;
                    existing.color = user.color.clone();
                    existing.last_seen = user.last_seen;
                    existing.status = status_at(user.last_seen, now, policy);
                }
                existing.is_typing |= user.is_typing;
            }
        }
    }

    order.into_iter().filter_map(|name| accounts.remove(&name)).collect()
}
