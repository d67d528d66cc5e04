use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fs;
use std::time::Duration;

use serde::Deserialize;

use crate::config::StorageParams;
use crate::error::Error;
use crate::error::Result;
use crate::sync::CheckpointTunables;
use crate::sync::DEFAULT_MONITOR_INTERVAL;

/// Top-level TOML config: one `[log]` section plus one `[[database]]`
/// entry per primary database to replicate.
#[derive(Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default, rename = "database")]
    pub database: Vec<DbConfig>,
}

impl Config {
    pub fn load(config_file: &str) -> Result<Self> {
        let toml_str = fs::read_to_string(config_file).map_err(|e| {
            Error::ReadConfigFail(format!("read config file {} fail: {:?}", config_file, e))
        })?;

        let config: Config = toml::from_str(&toml_str)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.database.is_empty() {
            return Err(Error::InvalidConfig(
                "config must declare at least one [[database]]".into(),
            ));
        }
        for db in &self.database {
            if db.db.is_empty() {
                return Err(Error::InvalidConfig(
                    "database.db must not be empty".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn database(&self, name: &str) -> Option<&DbConfig> {
        self.database.iter().find(|db| db.db == name)
    }
}

/// One replicated database: its path, its replica targets, and optional
/// overrides of the Sync Engine's checkpoint/monitor tunables (spec §6
/// "Tunables").
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct DbConfig {
    pub db: String,
    #[serde(default, rename = "replicate")]
    pub replicate: Vec<StorageConfig>,
    #[serde(default, rename = "monitor-interval-secs")]
    pub monitor_interval_secs: Option<u64>,
    #[serde(default, rename = "min-checkpoint-page-n")]
    pub min_checkpoint_page_n: Option<u32>,
    #[serde(default, rename = "max-checkpoint-page-n")]
    pub max_checkpoint_page_n: Option<u32>,
    #[serde(default, rename = "checkpoint-interval-secs")]
    pub checkpoint_interval_secs: Option<u64>,
}

impl DbConfig {
    pub fn monitor_interval(&self) -> Duration {
        self.monitor_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_MONITOR_INTERVAL)
    }

    pub fn checkpoint_tunables(&self) -> CheckpointTunables {
        let defaults = CheckpointTunables::default();
        CheckpointTunables {
            min_checkpoint_page_n: self
                .min_checkpoint_page_n
                .unwrap_or(defaults.min_checkpoint_page_n),
            max_checkpoint_page_n: self
                .max_checkpoint_page_n
                .unwrap_or(defaults.max_checkpoint_page_n),
            checkpoint_interval: self
                .checkpoint_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.checkpoint_interval),
        }
    }
}

/// One replica target: a name (for logging/selection) plus the storage
/// backend it resolves to.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub params: StorageParams,
}

/// Config for logging.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default)]
    pub to_stderr: bool,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_dir() -> String {
    "/var/log/litesync".to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match &level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            dir: default_log_dir(),
            to_stderr: false,
        }
    }
}

impl Display for LogConfig {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "level={:?}, dir={}, to_stderr={}",
            self.level, self.dir, self.to_stderr
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_config() -> Result<()> {
        let toml_str = r#"
            [log]
            level = "Debug"
            dir = "/tmp/log"
            to_stderr = true

            [[database]]
            db = "/var/lib/app/app.db"

            [[database.replicate]]
            name = "local"
            type = "fs"
            root = "/backups/app"
        "#;
        let config: Config = toml::from_str(toml_str)?;
        assert_eq!(config.database.len(), 1);
        assert_eq!(config.database[0].db, "/var/lib/app/app.db");
        assert_eq!(config.database[0].replicate.len(), 1);
        assert_eq!(config.database[0].replicate[0].name, "local");
        Ok(())
    }

    #[test]
    fn checkpoint_tunables_fall_back_to_defaults() {
        let db = DbConfig {
            db: "x".into(),
            replicate: vec![],
            monitor_interval_secs: None,
            min_checkpoint_page_n: Some(500),
            max_checkpoint_page_n: None,
            checkpoint_interval_secs: None,
        };
        let tunables = db.checkpoint_tunables();
        assert_eq!(tunables.min_checkpoint_page_n, 500);
        assert_eq!(
            tunables.max_checkpoint_page_n,
            CheckpointTunables::default().max_checkpoint_page_n
        );
    }

    #[test]
    fn rejects_empty_database_list() {
        let config = Config {
            log: LogConfig::default(),
            database: vec![],
        };
        assert!(config.validate().is_err());
    }
}
