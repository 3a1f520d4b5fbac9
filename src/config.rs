//! Configuration loader and validator for the feed relay bot.
use crate::locale::Lang;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub telegram: Telegram,
    pub source: Source,
    #[serde(default)]
    pub conversation: Conversation,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Staging area for downloaded media; emptied as items are delivered.
    pub temp_dir: String,
    pub sync_interval_secs: u64,
    /// Unattended sweeps skip posts older than this many hours. 0 disables the bound.
    pub recent_window_hours: u64,
    /// Like/comment counts in `0..=hidden_count_max` are shown as hidden.
    pub hidden_count_max: i64,
    #[serde(default)]
    pub default_language: Option<Lang>,
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Telegram {
    pub bot_token: String,
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

/// Content-source gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub session_dir: String,
    pub timeout_secs: u64,
}

/// Conversation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub blocked_handles: Vec<String>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            blocked_handles: vec!["lncemep".into(), "crazyportes".into()],
        }
    }
}

impl Config {
    /// Ensure required directories exist (data, temp and session dirs).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        for dir in [&self.app.data_dir, &self.app.temp_dir, &self.source.session_dir] {
            if dir.trim().is_empty() {
                continue;
            }
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Replace secrets with values from the environment when present.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Ok(user) = std::env::var("SOURCE_USERNAME") {
            self.source.username = user;
        }
        if let Ok(pass) = std::env::var("SOURCE_PASSWORD") {
            self.source.password = pass;
        }
    }

    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/watchbot.db", self.app.data_dir))
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.app.sync_interval_secs)
    }

    pub fn recent_window(&self) -> Option<chrono::Duration> {
        match self.app.recent_window_hours {
            0 => None,
            hours => Some(chrono::Duration::hours(hours as i64)),
        }
    }
}

/// Load configuration from a YAML file, apply environment overrides and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    cfg.apply_env_overrides();
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.temp_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.temp_dir must be non-empty"));
    }
    if cfg.app.sync_interval_secs == 0 {
        return Err(ConfigError::Invalid("app.sync_interval_secs must be > 0"));
    }
    if cfg.app.hidden_count_max < 0 {
        return Err(ConfigError::Invalid("app.hidden_count_max must be >= 0"));
    }

    if cfg.telegram.bot_token.trim().is_empty() {
        return Err(ConfigError::Invalid("telegram.bot_token must be non-empty"));
    }

    if reqwest::Url::parse(&cfg.source.base_url).is_err() {
        return Err(ConfigError::Invalid("source.base_url must be a valid URL"));
    }
    if cfg.source.username.trim().is_empty() {
        return Err(ConfigError::Invalid("source.username must be non-empty"));
    }
    if cfg.source.password.is_empty() {
        return Err(ConfigError::Invalid("source.password must be non-empty"));
    }
    if cfg.source.session_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("source.session_dir must be non-empty"));
    }
    if cfg.source.timeout_secs == 0 {
        return Err(ConfigError::Invalid("source.timeout_secs must be > 0"));
    }

    if cfg
        .conversation
        .blocked_handles
        .iter()
        .any(|h| h.trim().is_empty())
    {
        return Err(ConfigError::Invalid("conversation.blocked_handles must not contain empty entries"));
    }

    Ok(())
}

/// Returns a complete example configuration.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  temp_dir: "./data/temp"
  sync_interval_secs: 86400
  recent_window_hours: 24
  hidden_count_max: 3

telegram:
  bot_token: "YOUR_TELEGRAM_BOT_TOKEN"
  allowed_users: []

source:
  base_url: "http://127.0.0.1:8700/"
  username: "YOUR_SOURCE_LOGIN"
  password: "YOUR_SOURCE_PASSWORD"
  session_dir: "./data/sessions"
  timeout_secs: 60

conversation:
  blocked_handles:
    - lncemep
    - crazyportes
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.app.default_language, None);
        assert_eq!(cfg.recent_window(), Some(chrono::Duration::hours(24)));
        assert_eq!(cfg.sync_interval(), Duration::from_secs(86400));
    }

    #[test]
    fn missing_conversation_section_uses_defaults() {
        let trimmed = example().split("conversation:").next().unwrap();
        let cfg: Config = serde_yaml::from_str(trimmed).unwrap();
        assert_eq!(cfg.conversation, Conversation::default());
    }

    #[test]
    fn invalid_bot_token() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.telegram.bot_token = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("telegram.bot_token")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_source_settings() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.source.base_url = "not a url".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("base_url")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.source.username = " ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.source.timeout_secs = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_app_settings() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.sync_interval_secs = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.hidden_count_max = -1;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.conversation.blocked_handles.push("".into());
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_window_disables_bound() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.recent_window_hours = 0;
        assert_eq!(cfg.recent_window(), None);
    }

    #[test]
    fn ensure_dirs_creates_all_dirs() {
        let td = tempdir().unwrap();
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = td.path().join("data").to_string_lossy().to_string();
        cfg.app.temp_dir = td.path().join("tmp").to_string_lossy().to_string();
        cfg.source.session_dir = td.path().join("sess").to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(td.path().join("data").exists());
        assert!(td.path().join("tmp").exists());
        assert!(td.path().join("sess").exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert!(cfg.telegram.allowed_users.is_empty());
        assert_eq!(cfg.conversation.blocked_handles.len(), 2);
    }
}
