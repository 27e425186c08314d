//! Server configuration from environment variables.
//!
//! - `ROOKERY_BIND_ADDR`: listen address. Default: `127.0.0.1:5280`
//! - `ROOKERY_POLL_BACKOFF_SECS`: sleep between poll cycles. Default: `1`
//! - `ROOKERY_POLL_MAX_CYCLES`: poll cycles per request; `0` disables
//!   long polling. Default: `10`
//! - `ROOKERY_PRESENCE_AWAY_SECS`: idle window before a user shows as
//!   away. Default: `300`
//! - `ROOKERY_PRESENCE_OFFLINE_SECS`: idle window before a user shows as
//!   offline. Default: `900`

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use rookery_bosh::{PollConfig, PresenceConfig};
use tracing::info;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address for the HTTP binding
    pub bind_addr: SocketAddr,
    /// Long-poll backoff between store queries
    pub poll_backoff: Duration,
    /// Long-poll cycle budget per request (0 = disabled)
    pub poll_max_cycles: u32,
    /// Idle window before presence decays to away
    pub presence_away: Duration,
    /// Idle window before presence decays to offline
    pub presence_offline: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5280".parse().expect("valid default address"),
            poll_backoff: Duration::from_secs(1),
            poll_max_cycles: 10,
            presence_away: Duration::from_secs(300),
            presence_offline: Duration::from_secs(900),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let bind_addr = match std::env::var("ROOKERY_BIND_ADDR") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("invalid ROOKERY_BIND_ADDR: {}", raw))?,
            Err(_) => defaults.bind_addr,
        };

        Ok(Self {
            bind_addr,
            poll_backoff: Duration::from_secs(parse_env(
                "ROOKERY_POLL_BACKOFF_SECS",
                defaults.poll_backoff.as_secs(),
            )?),
            poll_max_cycles: parse_env("ROOKERY_POLL_MAX_CYCLES", defaults.poll_max_cycles)?,
            presence_away: Duration::from_secs(parse_env(
                "ROOKERY_PRESENCE_AWAY_SECS",
                defaults.presence_away.as_secs(),
            )?),
            presence_offline: Duration::from_secs(parse_env(
                "ROOKERY_PRESENCE_OFFLINE_SECS",
                defaults.presence_offline.as_secs(),
            )?),
        })
    }

    /// Long-poll tuning for the request controller.
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            backoff: self.poll_backoff,
            max_cycles: self.poll_max_cycles,
        }
    }

    /// Presence aging windows.
    pub fn presence_config(&self) -> PresenceConfig {
        PresenceConfig {
            away_after: chrono::Duration::from_std(self.presence_away)
                .unwrap_or_else(|_| chrono::Duration::seconds(300)),
            offline_after: chrono::Duration::from_std(self.presence_offline)
                .unwrap_or_else(|_| chrono::Duration::seconds(900)),
        }
    }

    /// Log the active configuration at startup.
    pub fn log_config(&self) {
        info!(
            bind_addr = %self.bind_addr,
            poll_backoff_secs = self.poll_backoff.as_secs(),
            poll_max_cycles = self.poll_max_cycles,
            presence_away_secs = self.presence_away.as_secs(),
            presence_offline_secs = self.presence_offline.as_secs(),
            "server configuration"
        );
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}
