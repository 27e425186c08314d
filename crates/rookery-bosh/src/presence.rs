//! Presence tracking.
//!
//! Records which users are actively polling and their advertised presence
//! state. Two things mutate a record: an explicit presence stanza from the
//! user, and the heartbeat performed at the start of every poll cycle,
//! which refreshes the last-active timestamp without touching the state.
//! Records are never deleted here; expiry is someone else's job.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// User presence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresenceState {
    /// Available
    #[default]
    Online,
    /// Away
    Away,
    /// Free for chat
    Chat,
    /// Do not disturb
    Dnd,
    /// Extended away
    Xa,
    /// Not connected
    Offline,
}

impl std::fmt::Display for PresenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PresenceState::Online => write!(f, "online"),
            PresenceState::Away => write!(f, "away"),
            PresenceState::Chat => write!(f, "chat"),
            PresenceState::Dnd => write!(f, "dnd"),
            PresenceState::Xa => write!(f, "xa"),
            PresenceState::Offline => write!(f, "offline"),
        }
    }
}

impl PresenceState {
    /// Parse the `show` value of a presence stanza, per RFC 6121.
    pub fn from_show(show: &str) -> Self {
        match show {
            "away" => PresenceState::Away,
            "chat" => PresenceState::Chat,
            "dnd" => PresenceState::Dnd,
            "xa" => PresenceState::Xa,
            _ => PresenceState::Online,
        }
    }
}

/// Stored presence for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceRecord {
    /// Current state
    pub state: PresenceState,
    /// Last time the user polled or sent presence
    pub last_active: DateTime<Utc>,
}

/// A state change produced by applying a presence stanza.
#[derive(Debug, Clone)]
pub struct PresenceTransition {
    /// The user whose presence changed
    pub user: String,
    /// State before the stanza was applied
    pub previous: PresenceState,
    /// State after the stanza was applied
    pub current: PresenceState,
}

impl PresenceTransition {
    /// Whether the stanza actually changed anything.
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Inactivity windows for presence aging.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Online-ish users fall to Away after this long without a heartbeat
    pub away_after: Duration,
    /// Any user falls to Offline after this long without a heartbeat
    pub offline_after: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            away_after: Duration::minutes(5),
            offline_after: Duration::minutes(15),
        }
    }
}

/// In-process presence table.
pub struct PresenceTracker {
    records: DashMap<String, PresenceRecord>,
    config: PresenceConfig,
}

impl PresenceTracker {
    /// Create a tracker with the given aging windows.
    pub fn new(config: PresenceConfig) -> Self {
        Self {
            records: DashMap::new(),
            config,
        }
    }

    /// Record that `user` is actively polling.
    ///
    /// Idempotent; refreshes the last-active timestamp without altering the
    /// presence state. A first-seen user starts Online, since a heartbeat
    /// only happens while the user is polling.
    pub fn heartbeat(&self, user: &str) {
        self.heartbeat_at(user, Utc::now());
    }

    fn heartbeat_at(&self, user: &str, now: DateTime<Utc>) {
        self.records
            .entry(user.to_string())
            .and_modify(|record| record.last_active = now)
            .or_insert_with(|| PresenceRecord {
                state: PresenceState::Online,
                last_active: now,
            });
    }

    /// Apply an explicit presence state from the user's own stanza.
    pub fn apply_presence(&self, user: &str, state: PresenceState) -> PresenceTransition {
        self.apply_presence_at(user, state, Utc::now())
    }

    fn apply_presence_at(
        &self,
        user: &str,
        state: PresenceState,
        now: DateTime<Utc>,
    ) -> PresenceTransition {
        let previous = self
            .records
            .get(user)
            .map(|record| record.state)
            .unwrap_or(PresenceState::Offline);

        self.records.insert(
            user.to_string(),
            PresenceRecord {
                state,
                last_active: now,
            },
        );

        let transition = PresenceTransition {
            user: user.to_string(),
            previous,
            current: state,
        };
        if transition.changed() {
            debug!(user, previous = %previous, current = %state, "presence changed");
        }
        transition
    }

    /// Age all records against the inactivity windows.
    ///
    /// Called once at the start of every request. Online-ish states decay
    /// to Away past `away_after`; anything decays to Offline past
    /// `offline_after`.
    pub fn refresh(&self) {
        self.refresh_at(Utc::now());
    }

    fn refresh_at(&self, now: DateTime<Utc>) {
        for mut entry in self.records.iter_mut() {
            let idle = now - entry.last_active;
            let record = entry.value_mut();
            if record.state == PresenceState::Offline {
                continue;
            }
            if idle >= self.config.offline_after {
                record.state = PresenceState::Offline;
            } else if idle >= self.config.away_after
                && matches!(record.state, PresenceState::Online | PresenceState::Chat)
            {
                record.state = PresenceState::Away;
            }
        }
    }

    /// Current record for `user`, if one exists.
    pub fn get(&self, user: &str) -> Option<PresenceRecord> {
        self.records.get(user).map(|record| record.clone())
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(PresenceConfig::default())
    }
}
