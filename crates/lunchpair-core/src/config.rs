//! Lunchpair configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LunchError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LunchConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl LunchConfig {
    /// Load config from the default path (~/.lunchpair/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LunchError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| LunchError::Config(format!("Failed to parse config: {e}")))?;
        config.schedule.validate()?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| LunchError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Lunchpair home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".lunchpair")
    }
}

/// SQLite database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String { "~/.lunchpair/lunchpair.db".into() }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

impl DatabaseConfig {
    /// Database path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

/// Outbound SMTP configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// When false, notices are logged instead of sent.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_smtp_host() -> String { "smtp.gmail.com".into() }
fn default_smtp_port() -> u16 { 587 }
fn default_from_name() -> String { "Lunchpair".into() }

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from_name: default_from_name(),
        }
    }
}

/// Time of day (UTC) used when building weekly expressions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_hour")]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

fn default_hour() -> u32 { 12 }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            hour: default_hour(),
            minute: 0,
        }
    }
}

impl ScheduleConfig {
    fn validate(&self) -> Result<()> {
        if self.hour > 23 || self.minute > 59 {
            return Err(LunchError::Config(format!(
                "schedule time {:02}:{:02} is out of range",
                self.hour, self.minute
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LunchConfig::default();
        assert!(!config.mail.enabled);
        assert_eq!(config.mail.smtp_port, 587);
        assert_eq!(config.schedule.hour, 12);
        assert_eq!(config.schedule.minute, 0);
        assert!(config.database.path.ends_with("lunchpair.db"));
    }

    #[test]
    fn test_partial_toml() {
        let config = LunchConfig::from_toml(
            r#"
            [mail]
            enabled = true
            smtp_host = "mail.example.com"

            [schedule]
            hour = 11
            minute = 30
            "#,
        )
        .unwrap();
        assert!(config.mail.enabled);
        assert_eq!(config.mail.smtp_host, "mail.example.com");
        assert_eq!(config.mail.smtp_port, 587);
        assert_eq!(config.schedule.hour, 11);
        assert_eq!(config.schedule.minute, 30);
    }

    #[test]
    fn test_out_of_range_time() {
        let err = LunchConfig::from_toml("[schedule]\nhour = 24\n").unwrap_err();
        assert!(matches!(err, LunchError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = LunchConfig::load_from(Path::new("/nonexistent/lunchpair.toml")).unwrap_err();
        assert!(matches!(err, LunchError::Config(_)));
    }
}
