//! # Configuration Management Module
//!
//! Loads and validates the TOML configuration that drives the roster server.
//!
//! ## Configuration Structure
//!
//! - [`ServerConfig`] - HTTP bind address and cookie behaviour
//! - [`StorageConfig`] - Data directory for the sled database
//! - [`GameConfig`] - Roster limits and character creation defaults
//! - [`LoggingConfig`] - Log level and log files
//! - [`SecurityConfig`] - Argon2 cost parameters
//!
//! ## Usage
//!
//! ```rust,no_run
//! use roster::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Listening on {}", config.server.bind);
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//! cookie_secure = false
//! session_timeout = 720
//!
//! [storage]
//! data_dir = "./data"
//!
//! [game]
//! max_characters = 5
//! character_storage = 16
//! default_location_id = 1
//! slot_bonus = 10
//! ```

use anyhow::{anyhow, Result};
use argon2::Params;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub game: GameConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    /// Mark the session cookie `Secure`. Enable when served behind TLS.
    #[serde(default)]
    pub cookie_secure: bool,
    /// Idle minutes before a session is discarded (0 disables expiry).
    #[serde(default = "default_session_timeout")]
    pub session_timeout: u32,
}

fn default_session_timeout() -> u32 {
    720
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Optional override for the sled database path; defaults to `<data_dir>/roster`.
    #[serde(default)]
    pub db_path: Option<String>,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        match &self.db_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.data_dir).join("roster"),
        }
    }
}

/// Roster limits and creation defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameConfig {
    /// Most characters one account may own.
    #[serde(default = "default_max_characters")]
    pub max_characters: usize,
    /// Size of the storage container every new character receives.
    #[serde(default = "default_character_storage")]
    pub character_storage: i16,
    /// Where characters spawn when their species has no starting zone.
    #[serde(default = "default_location_id")]
    pub default_location_id: u64,
    /// Amount each character slot adds to its counter on the character sheet.
    #[serde(default = "default_slot_bonus")]
    pub slot_bonus: i32,
}

fn default_max_characters() -> usize {
    5
}

fn default_character_storage() -> i16 {
    16
}

fn default_location_id() -> u64 {
    crate::game::DEFAULT_LOCATION_ID
}

fn default_slot_bonus() -> i32 {
    10
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_characters: default_max_characters(),
            character_storage: default_character_storage(),
            default_location_id: default_location_id(),
            slot_bonus: default_slot_bonus(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    #[serde(default)]
    pub security_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Argon2Config {
    #[serde(default)]
    pub memory_kib: Option<u32>,
    #[serde(default)]
    pub time_cost: Option<u32>,
    #[serde(default)]
    pub parallelism: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub argon2: Option<Argon2Config>,
}

impl SecurityConfig {
    /// Argon2 parameters from config, or `None` to use the library defaults.
    pub fn argon2_params(&self) -> Result<Option<Params>> {
        let Some(cfg) = &self.argon2 else {
            return Ok(None);
        };
        let params = Params::new(
            cfg.memory_kib.unwrap_or(Params::DEFAULT_M_COST),
            cfg.time_cost.unwrap_or(Params::DEFAULT_T_COST),
            cfg.parallelism.unwrap_or(Params::DEFAULT_P_COST),
            None,
        )
        .map_err(|e| anyhow!("Invalid argon2 parameters: {}", e))?;
        Ok(Some(params))
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        if self.game.max_characters == 0 {
            return Err(anyhow!("game.max_characters must be at least 1"));
        }
        if self.game.character_storage <= 0 {
            return Err(anyhow!("game.character_storage must be positive"));
        }
        if self.game.default_location_id == 0 {
            return Err(anyhow!("game.default_location_id must be a valid id"));
        }
        self.server
            .bind
            .parse::<std::net::SocketAddr>()
            .map_err(|e| anyhow!("Invalid server.bind '{}': {}", self.server.bind, e))?;
        self.security.argon2_params()?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                bind: "127.0.0.1:8080".to_string(),
                cookie_secure: false,
                session_timeout: default_session_timeout(),
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
                db_path: None,
            },
            game: GameConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("roster.log".to_string()),
                security_file: Some("roster-security.log".to_string()),
            },
            security: SecurityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.game.max_characters, 5);
        assert_eq!(config.game.character_storage, 16);
        assert_eq!(config.game.default_location_id, 1);
        assert_eq!(config.game.slot_bonus, 10);
    }

    #[test]
    fn game_section_is_optional() {
        let text = r#"
            [server]
            bind = "0.0.0.0:9000"

            [storage]
            data_dir = "/var/lib/roster"

            [logging]
            level = "debug"
        "#;
        let config: Config = toml::from_str(text).expect("parse");
        config.validate().expect("valid");
        assert_eq!(config.game, GameConfig::default());
        assert_eq!(config.server.session_timeout, 720);
        assert_eq!(
            config.storage.database_path(),
            PathBuf::from("/var/lib/roster").join("roster")
        );
    }

    #[test]
    fn zero_character_cap_is_rejected() {
        let mut config = Config::default();
        config.game.max_characters = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_bind_is_rejected() {
        let mut config = Config::default();
        config.server.bind = "not an address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn argon2_params_from_config() {
        let mut config = Config::default();
        assert!(config.security.argon2_params().expect("none").is_none());
        config.security.argon2 = Some(Argon2Config {
            memory_kib: Some(4096),
            time_cost: Some(2),
            parallelism: Some(1),
        });
        let params = config.security.argon2_params().expect("ok").expect("some");
        assert_eq!(params.m_cost(), 4096);
        assert_eq!(params.t_cost(), 2);
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).expect("serialize");
        let parsed: Config = toml::from_str(&text).expect("parse");
        assert_eq!(parsed.server.bind, "127.0.0.1:8080");
        assert_eq!(parsed.logging.file.as_deref(), Some("roster.log"));
    }
}
