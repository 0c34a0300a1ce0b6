use std::env;
use std::time::Duration;

use config::{Environment, File};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::Protocol;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Path of the engine's backing store
    pub db_path: String,
    /// Prefix for event trace lines; random when unset
    pub logid: Option<String>,
    /// Protocols that get a worker loop
    pub protocols: Vec<Protocol>,
    /// Default wait for observed events; unbounded when unset
    pub event_timeout_secs: Option<u64>,
    /// Trace every dispatched event at debug level
    pub debug_events: bool,
    pub http_timeout_secs: u64,
    /// Idle-wait timeout of the bundled memory engine
    pub idle_timeout_secs: u64,
}

impl AccountConfig {
    pub fn event_timeout(&self) -> Option<Duration> {
        self.event_timeout_secs.map(Duration::from_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub log: LogConfig,
    pub account: AccountConfig,
}

impl Settings {
    pub fn new(config_path: Option<&str>) -> Result<Self, SettingsError> {
        let mut config_builder = config::Config::builder()
            // Account defaults
            .set_default("account.db_path", "data/account.db")?
            .set_default("account.protocols", vec!["imap", "smtp"])?
            .set_default("account.debug_events", true)?
            .set_default("account.http_timeout_secs", 30)?
            .set_default("account.idle_timeout_secs", 60)?
            // Log defaults
            .set_default("log.level", "info")?;

        if let Some(path) = config_path {
            config_builder = config_builder.add_source(File::with_name(path));
        }

        // e.g. `MAILACCOUNT_ACCOUNT__LOGID=alice` overrides `account.logid`
        config_builder = config_builder.add_source(
            Environment::with_prefix("MAILACCOUNT")
                .prefix_separator("_")
                .separator("__")
                .ignore_empty(true),
        );

        let env_vars = [
            ("MAILACCOUNT_DB_PATH", "account.db_path"),
            ("MAILACCOUNT_PROTOCOLS", "account.protocols"),
            ("EVENT_TIMEOUT_SECS", "account.event_timeout_secs"),
            ("LOG_LEVEL", "log.level"),
        ];

        for (env_var, config_path) in &env_vars {
            let Ok(value) = env::var(env_var) else {
                continue;
            };
            match *env_var {
                "EVENT_TIMEOUT_SECS" => match value.parse::<u64>() {
                    Ok(secs) => config_builder = config_builder.set_override(config_path, secs)?,
                    Err(_) => warn!("Invalid timeout value in {}: {}", env_var, value),
                },
                "MAILACCOUNT_PROTOCOLS" => {
                    let protocols: Vec<String> = value
                        .split(',')
                        .map(|p| p.trim().to_lowercase())
                        .filter(|p| !p.is_empty())
                        .collect();
                    config_builder = config_builder.set_override(config_path, protocols)?;
                }
                _ => config_builder = config_builder.set_override(config_path, value)?,
            }
        }

        Ok(config_builder.build()?.try_deserialize()?)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig { level: "info".to_string() }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            db_path: "data/account.db".to_string(),
            logid: None,
            protocols: Protocol::ALL.to_vec(),
            event_timeout_secs: None,
            debug_events: true,
            http_timeout_secs: 30,
            idle_timeout_secs: 60,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            account: AccountConfig::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load or parse configuration: {0}")]
    LoadError(#[from] config::ConfigError),
}
