//! # rf-configs
//!
//! Layered settings: built-in defaults, then an optional TOML file, then
//! `FORUM__SECTION__KEY` environment variables.

use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "config/forum.toml";
const ENV_PREFIX: &str = "FORUM";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub session: SessionSettings,
    pub throttle: ThrottleSettings,
    pub hashing: HashingSettings,
    pub log: LogSettings,
    #[serde(default)]
    pub bootstrap: BootstrapSettings,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct SessionSettings {
    pub ttl_hours: u32,
    pub sweep_interval_secs: u64,
    pub cookie_name: String,
    pub cookie_path: String,
}

impl SessionSettings {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct ThrottleSettings {
    pub max_failures: u32,
    pub window_secs: u64,
}

/// Argon2 cost parameters.
#[derive(Debug, Deserialize)]
pub struct HashingSettings {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

/// First admin account, created or promoted at startup when all three are set.
#[derive(Debug, Default, Deserialize)]
pub struct BootstrapSettings {
    pub admin_email: Option<String>,
    pub admin_username: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub admin_password: Option<SecretString>,
}

impl BootstrapSettings {
    pub fn admin(&self) -> Option<(&str, &str, &SecretString)> {
        match (&self.admin_email, &self.admin_username, &self.admin_password) {
            (Some(email), Some(username), Some(password)) => Some((email, username, password)),
            _ => None,
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    Config::builder()
        .set_default("database.url", "sqlite://rusty_forum.db")?
        .set_default("database.max_connections", 5)?
        .set_default("session.ttl_hours", 24)?
        .set_default("session.sweep_interval_secs", 3600)?
        .set_default("session.cookie_name", "session_id")?
        .set_default("session.cookie_path", "/")?
        .set_default("throttle.max_failures", 5)?
        .set_default("throttle.window_secs", 600)?
        .set_default("hashing.memory_kib", 19 * 1024)?
        .set_default("hashing.iterations", 2)?
        .set_default("hashing.parallelism", 1)?
        .set_default("log.level", "info")?
        .set_default("log.format", "pretty")
}

impl Settings {
    /// Reads `.env` if present, then layers defaults, `DEFAULT_CONFIG_PATH`
    /// and the environment.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Same layering with an explicit file path. A missing file is skipped.
    pub fn load_from(path: &str) -> Result<Self, SettingsError> {
        let builder = defaults()?
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::finish(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, SettingsError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |field, reason: &str| {
            Err(SettingsError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };

        if self.database.max_connections == 0 {
            return invalid("database.max_connections", "must be at least 1");
        }
        if self.session.ttl_hours == 0 {
            return invalid("session.ttl_hours", "must be at least 1");
        }
        if self.session.sweep_interval_secs == 0 {
            return invalid("session.sweep_interval_secs", "must be at least 1");
        }
        if self.throttle.max_failures == 0 {
            return invalid("throttle.max_failures", "must be at least 1");
        }
        if self.throttle.window_secs == 0 {
            return invalid("throttle.window_secs", "must be at least 1");
        }
        Ok(())
    }
}
