//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::application::errors::ConfigError;
use crate::application::services::RateLimitSettings;

/// Bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub server: ServerConfig,
    pub bot: BotConfig,
    pub plugins: PluginConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ServerConfig {
    /// `host:port`
    pub address: String,
    pub nick: String,
    pub user: String,
    pub real_name: String,
    /// NickServ password, sent after registration when set
    pub password: Option<String>,
    pub channels: Vec<String>,
    pub connect_timeout_secs: u64,
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PluginConfig {
    pub directory: PathBuf,
    pub auto_load: bool,
    pub fetch_timeout_secs: u64,
    /// Temp download directories older than this are swept
    pub temp_max_age_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SecurityConfig {
    pub rate_limit: RateLimitConfig,
    /// Delay between registration and the owner challenge
    pub verification_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RateLimitConfig {
    pub message_window_secs: u64,
    pub max_messages: usize,
    pub command_window_secs: u64,
    pub max_commands: usize,
    pub warning_threshold: u32,
    pub warning_decay_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StorageConfig {
    pub settings_path: PathBuf,
    pub channel_settings_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "irc.libera.chat:6667".to_string(),
            nick: "mbot".to_string(),
            user: "mbot".to_string(),
            real_name: "mbot".to_string(),
            password: None,
            channels: vec!["#mbot".to_string()],
            connect_timeout_secs: 30,
            reconnect_delay_secs: 15,
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: "!".to_string(),
        }
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./plugins"),
            auto_load: true,
            fetch_timeout_secs: 60,
            temp_max_age_secs: 3600,
            sweep_interval_secs: 900,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            verification_delay_secs: 10,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let defaults = RateLimitSettings::default();
        Self {
            message_window_secs: defaults.message_window.as_secs(),
            max_messages: defaults.max_messages,
            command_window_secs: defaults.command_window.as_secs(),
            max_commands: defaults.max_commands,
            warning_threshold: defaults.warning_threshold,
            warning_decay_secs: defaults.warning_decay.as_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from("data/settings.yaml"),
            channel_settings_path: PathBuf::from("data/channel_settings.yaml"),
        }
    }
}

impl RateLimitConfig {
    pub fn to_settings(&self) -> RateLimitSettings {
        RateLimitSettings {
            message_window: Duration::from_secs(self.message_window_secs),
            max_messages: self.max_messages,
            command_window: Duration::from_secs(self.command_window_secs),
            max_commands: self.max_commands,
            warning_threshold: self.warning_threshold,
            warning_decay: Duration::from_secs(self.warning_decay_secs),
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_env() -> Self {
        // Load from environment variables
        let mut config = Config::default();

        if let Ok(address) = std::env::var("MBOT_SERVER") {
            config.server.address = address;
        }

        if let Ok(nick) = std::env::var("MBOT_NICK") {
            config.server.nick = nick;
        }

        if let Ok(channels) = std::env::var("MBOT_CHANNELS") {
            config.server.channels = channels
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Ok(password) = std::env::var("MBOT_PASSWORD") {
            config.server.password = Some(password);
        }

        if let Ok(prefix) = std::env::var("BOT_PREFIX") {
            config.bot.prefix = prefix;
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.address.is_empty() {
            return Err(ConfigError::MissingField("server.address".to_string()));
        }
        if self.server.nick.is_empty() {
            return Err(ConfigError::MissingField("server.nick".to_string()));
        }
        if self.bot.prefix.is_empty() {
            return Err(ConfigError::InvalidValue("bot.prefix must not be empty".to_string()));
        }
        let rl = &self.security.rate_limit;
        if rl.message_window_secs == 0 || rl.command_window_secs == 0 || rl.warning_decay_secs == 0 {
            return Err(ConfigError::InvalidValue("rate limit windows must be at least 1 second".to_string()));
        }
        if rl.max_messages == 0 || rl.max_commands == 0 || rl.warning_threshold == 0 {
            return Err(ConfigError::InvalidValue("rate limit maximums must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "server:\n  address: irc.example.net:6697\n  channels: ['#a', '#b']\nsecurity:\n  rate-limit:\n    max-messages: 8\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.address, "irc.example.net:6697");
        assert_eq!(config.server.nick, "mbot");
        assert_eq!(config.server.channels, vec!["#a", "#b"]);
        assert_eq!(config.bot.prefix, "!");
        assert_eq!(config.security.rate_limit.max_messages, 8);
        assert_eq!(config.security.rate_limit.command_window_secs, 30);
    }

    #[test]
    fn default_config_serializes_with_kebab_keys() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("real-name: mbot"));
        assert!(yaml.contains("channel-settings-path:"));
        assert!(yaml.contains("warning-threshold: 3"));
    }

    #[test]
    fn rejects_zero_windows() {
        let mut config = Config::default();
        config.security.rate_limit.message_window_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rate_limit_defaults_match_limiter() {
        assert_eq!(RateLimitConfig::default().to_settings(), RateLimitSettings::default());
    }
}
