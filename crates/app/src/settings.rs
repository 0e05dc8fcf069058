//! Application settings, read from `settings.toml`.
//!
//! See `settings.example.toml` for a commented template.

use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Telegram {
    pub token: String,
    #[serde(default)]
    pub allowed_users: Vec<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Reports {
    /// Scheduled daily/weekly report delivery.
    #[serde(default = "default_true")]
    pub auto_enabled: bool,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Local wall-clock time of the daily report, "HH:MM".
    #[serde(default = "default_daily_time")]
    pub daily_time: String,
}

impl Default for Reports {
    fn default() -> Self {
        Reports {
            auto_enabled: true,
            timezone: default_timezone(),
            daily_time: default_daily_time(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub telegram: Telegram,
    #[serde(default)]
    pub reports: Reports,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings"))
            .build()?;

        settings.try_deserialize()
    }
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

fn default_timezone() -> String {
    "Asia/Jakarta".to_string()
}

fn default_daily_time() -> String {
    "21:00".to_string()
}
