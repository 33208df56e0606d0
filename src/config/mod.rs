//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::tuning::Tuning;

/// How this process takes part in a duel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameMode {
    /// Both combatants simulated in this process
    Local,
    /// Authoritative host for networked play
    Server,
    /// Observer connected to a host
    Client,
}

impl FromStr for GameMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "server" | "host" => Ok(Self::Server),
            "client" => Ok(Self::Client),
            _ => Err(ConfigError::Invalid("GAME_MODE")),
        }
    }
}

/// Who sits in each seat in local mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalMatchup {
    /// Human on the left, AI on the right
    VsAi,
    /// Two humans on one keyboard; the right one fights from the ceiling
    TwoPlayer,
    /// AI on both sides
    AiDuel,
}

impl FromStr for LocalMatchup {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vs_ai" => Ok(Self::VsAi),
            "two_player" => Ok(Self::TwoPlayer),
            "ai_duel" => Ok(Self::AiDuel),
            _ => Err(ConfigError::Invalid("LOCAL_MATCHUP")),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable text
    pub log_json: bool,

    pub mode: GameMode,
    pub matchup: LocalMatchup,

    /// Host to connect to in client mode; discovered on the LAN when unset
    pub host_addr: Option<SocketAddr>,
    /// UDP port for host announcements
    pub discovery_port: u16,
    /// Whether a server announces itself on the LAN
    pub announce: bool,

    /// Allowed client origin for CORS
    pub client_origin: String,

    pub tuning: Tuning,
    /// Fixed AI seed for reproducible local matches
    pub ai_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Some(port) = lookup("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string())
        };

        let mut tuning = Tuning::default();
        tuning.combatant.max_health = parse_or(&lookup, "MAX_HEALTH", tuning.combatant.max_health)?;
        tuning.projectile.damage = parse_or(&lookup, "PROJECTILE_DAMAGE", tuning.projectile.damage)?;
        tuning.projectile.speed = parse_or(&lookup, "PROJECTILE_SPEED", tuning.projectile.speed)?;
        tuning.weapon.cooldown = parse_or(&lookup, "FIRE_COOLDOWN_SECS", tuning.weapon.cooldown)?;
        tuning.dilation.slow_time_scale =
            parse_or(&lookup, "SLOW_TIME_SCALE", tuning.dilation.slow_time_scale)?;

        if tuning.combatant.max_health <= 0 {
            return Err(ConfigError::Invalid("MAX_HEALTH"));
        }
        if tuning.projectile.damage < 0 {
            return Err(ConfigError::Invalid("PROJECTILE_DAMAGE"));
        }
        if !(tuning.projectile.speed.is_finite() && tuning.projectile.speed > 0.0) {
            return Err(ConfigError::Invalid("PROJECTILE_SPEED"));
        }
        if !(tuning.weapon.cooldown.is_finite() && tuning.weapon.cooldown >= 0.0) {
            return Err(ConfigError::Invalid("FIRE_COOLDOWN_SECS"));
        }
        if !(tuning.dilation.slow_time_scale > 0.0 && tuning.dilation.slow_time_scale <= 1.0) {
            return Err(ConfigError::Invalid("SLOW_TIME_SCALE"));
        }

        let mode: GameMode = parse_or(&lookup, "GAME_MODE", GameMode::Local)?;
        if mode != GameMode::Local {
            tuning = tuning.networked();
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),

            mode,
            matchup: parse_or(&lookup, "LOCAL_MATCHUP", LocalMatchup::VsAi)?,

            host_addr: lookup("HOST_ADDR")
                .map(|addr| addr.parse().map_err(|_| ConfigError::Invalid("HOST_ADDR")))
                .transpose()?,
            discovery_port: parse_or(&lookup, "DISCOVERY_PORT", 47777)?,
            announce: parse_or(&lookup, "ANNOUNCE", true)?,

            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),

            tuning,
            ai_seed: lookup("AI_SEED")
                .map(|s| s.parse().map_err(|_| ConfigError::Invalid("AI_SEED")))
                .transpose()?,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
