//! Server configuration.
//!
//! Consolidates every environment variable read and validates the result.
//! All options are env-overridable; CLI flags win over the environment.

use holdem::game::Chips;
use holdem::table::TableConfig;
use std::time::Duration;

/// Complete server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// TCP port for the HTTP/WebSocket surface.
    pub port: u16,
    /// Steam Web API key. Absent means mock authentication.
    pub steam_api_key: Option<String>,
    /// Steam application id.
    pub steam_app_id: Option<u64>,
    /// Postgres connection string. Absent means the in-memory ledger.
    pub database_url: Option<String>,
    /// Starting balance for new accounts and the default buy-in.
    pub default_buy_in: Chips,
    pub default_small_blind: Chips,
    pub default_big_blind: Chips,
    pub turn_timeout: Duration,
    pub banter_phase: Duration,
    pub payout_animation: Duration,
    pub countdown: Duration,
    pub session_grace: Duration,
    pub social_tick_hz: u32,
    /// Ledger call timeout.
    pub ledger_timeout: Duration,
    /// Tables to create on startup.
    pub num_tables: usize,
}

impl ServerConfig {
    pub fn from_env(
        port_override: Option<u16>,
        database_url_override: Option<String>,
        num_tables_override: Option<usize>,
    ) -> Self {
        Self {
            port: port_override.unwrap_or_else(|| parse_env_or("PORT", 8080)),
            steam_api_key: env_nonempty("STEAM_API_KEY"),
            steam_app_id: std::env::var("STEAM_APP_ID")
                .ok()
                .and_then(|v| v.parse().ok()),
            database_url: database_url_override.or_else(|| env_nonempty("DATABASE_URL")),
            default_buy_in: parse_env_or("DEFAULT_BUY_IN", 1000),
            default_small_blind: parse_env_or("DEFAULT_SMALL_BLIND", 10),
            default_big_blind: parse_env_or("DEFAULT_BIG_BLIND", 20),
            turn_timeout: ms_env_or("TURN_TIMEOUT_MS", 30_000),
            banter_phase: ms_env_or("BANTER_PHASE_MS", 15_000),
            payout_animation: ms_env_or("PAYOUT_ANIMATION_MS", 5_000),
            countdown: ms_env_or("COUNTDOWN_MS", 3_000),
            session_grace: ms_env_or("SESSION_GRACE_MS", 60_000),
            social_tick_hz: parse_env_or("SOCIAL_TICK_HZ", 10),
            ledger_timeout: ms_env_or("LEDGER_TIMEOUT_MS", 2_000),
            num_tables: num_tables_override.unwrap_or_else(|| parse_env_or("NUM_TABLES", 1)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_small_blind <= 0 {
            return Err(ConfigError::Invalid {
                var: "DEFAULT_SMALL_BLIND",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.default_big_blind <= self.default_small_blind {
            return Err(ConfigError::Invalid {
                var: "DEFAULT_BIG_BLIND",
                reason: format!(
                    "must be greater than the small blind ({})",
                    self.default_small_blind
                ),
            });
        }
        if self.default_buy_in < self.default_big_blind {
            return Err(ConfigError::Invalid {
                var: "DEFAULT_BUY_IN",
                reason: "must cover at least one big blind".to_string(),
            });
        }
        if self.social_tick_hz == 0 || self.social_tick_hz > 60 {
            return Err(ConfigError::Invalid {
                var: "SOCIAL_TICK_HZ",
                reason: "must be 1..=60".to_string(),
            });
        }
        if self.num_tables == 0 {
            return Err(ConfigError::Invalid {
                var: "NUM_TABLES",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Table defaults derived from the server-wide options.
    pub fn table_config(&self, name: String) -> TableConfig {
        TableConfig {
            name,
            small_blind: self.default_small_blind,
            big_blind: self.default_big_blind,
            turn_timeout: self.turn_timeout,
            countdown: self.countdown,
            payout_animation: self.payout_animation,
            banter: self.banter_phase,
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn ms_env_or(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(parse_env_or(key, default_ms))
}
