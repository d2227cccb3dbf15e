//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::{EconomySettings, RoundSettings};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Concurrent action requests handled at once
    pub max_workers: usize,
    /// Allowed client origins for CORS; `None` allows any
    pub client_origin: Option<String>,
    /// Gameplay tuning
    pub game: GameSettings,
}

/// Match and round tuning
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GameSettings {
    /// Simulation ticks per second
    pub tick_rate: u32,
    pub starting_gold: u32,
    pub starting_lives: u32,
    /// Gold granted to each player every round
    pub round_income: u32,
    pub preparation_secs: f64,
    pub ack_timeout_secs: f64,
    pub min_combat_secs: f64,
    pub post_combat_delay_secs: f64,
    pub max_combat_secs: f64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            starting_gold: 200,
            starting_lives: 20,
            round_income: 50,
            preparation_secs: 20.0,
            ack_timeout_secs: 15.0,
            min_combat_secs: 3.0,
            post_combat_delay_secs: 1.0,
            max_combat_secs: 300.0,
        }
    }
}

impl GameSettings {
    pub fn economy(&self) -> EconomySettings {
        EconomySettings {
            starting_gold: self.starting_gold,
            starting_lives: self.starting_lives,
            tick_rate: self.tick_rate,
        }
    }

    pub fn rounds(&self) -> RoundSettings {
        RoundSettings {
            preparation: bounded_duration(self.preparation_secs),
            ack_timeout: bounded_duration(self.ack_timeout_secs),
            round_income: self.round_income,
            min_combat_secs: self.min_combat_secs,
            post_combat_delay_secs: self.post_combat_delay_secs,
            max_combat_secs: self.max_combat_secs,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let defaults = GameSettings::default();
        let game = GameSettings {
            tick_rate: parse_var("TICK_RATE", defaults.tick_rate)?,
            starting_gold: parse_var("STARTING_GOLD", defaults.starting_gold)?,
            starting_lives: parse_var("STARTING_LIVES", defaults.starting_lives)?,
            round_income: parse_var("ROUND_INCOME", defaults.round_income)?,
            preparation_secs: parse_secs("PREPARATION_SECS", defaults.preparation_secs)?,
            ack_timeout_secs: parse_secs("ACK_TIMEOUT_SECS", defaults.ack_timeout_secs)?,
            min_combat_secs: parse_secs("MIN_COMBAT_SECS", defaults.min_combat_secs)?,
            post_combat_delay_secs: parse_secs(
                "POST_COMBAT_DELAY_SECS",
                defaults.post_combat_delay_secs,
            )?,
            max_combat_secs: parse_secs("MAX_COMBAT_SECS", defaults.max_combat_secs)?,
        };
        if game.tick_rate == 0 {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }

        let max_workers: usize = parse_var("MAX_WORKERS", 10)?;
        if max_workers == 0 {
            return Err(ConfigError::Invalid("MAX_WORKERS"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            max_workers,
            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.trim().is_empty()),
            game,
        })
    }

    /// Configuration for an explicit host/port, everything else defaulted
    pub fn for_address(host: &str, port: u16, max_workers: usize) -> Result<Self, ConfigError> {
        let server_addr = format!("{}:{}", host, port)
            .parse()
            .map_err(|_| ConfigError::InvalidAddress)?;
        Ok(Self {
            server_addr,
            log_level: "info".to_string(),
            max_workers: max_workers.max(1),
            client_origin: None,
            game: GameSettings::default(),
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Longest accepted value for any duration setting: one day
pub const MAX_DURATION_SECS: f64 = 86_400.0;

fn parse_secs(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    let secs: f64 = parse_var(name, default)?;
    if !(0.0..=MAX_DURATION_SECS).contains(&secs) {
        return Err(ConfigError::Invalid(name));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::Invalid(name))?;
    Ok(secs)
}

/// Seconds to a `Duration`, clamped to `0..=MAX_DURATION_SECS`; NaN becomes zero
fn bounded_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.clamp(0.0, MAX_DURATION_SECS)).unwrap_or(Duration::ZERO)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
