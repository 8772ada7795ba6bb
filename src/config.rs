use anyhow::{Context, Result};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::sync::retry::RetryConfig;

/// Remote-store URL layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UrlScheme {
    /// One URL per key under the participant's data path
    #[default]
    Neptune,
    /// One page-level URL carrying variable/value/user/program/ordinal
    Yosemite,
}

impl std::str::FromStr for UrlScheme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "neptune" => Ok(UrlScheme::Neptune),
            "yosemite" => Ok(UrlScheme::Yosemite),
            other => anyhow::bail!("Unknown url scheme '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Platform domain, no trailing slash
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub url_scheme: UrlScheme,
    #[serde(default = "default_true")]
    pub automatic_save: bool,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub readiness: ReadinessSettings,
    #[serde(default)]
    pub navigation: NavigationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub retry_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Unset means poll until the host renders
    #[serde(default)]
    pub max_poll_attempts: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationSettings {
    #[serde(default = "default_min_margin_bottom")]
    pub min_margin_bottom: i32,
    #[serde(default = "default_counter_key")]
    pub counter_key: String,
    /// Cancel a pending block expiry when the page transitions
    #[serde(default)]
    pub cancel_on_transition: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_min_margin_bottom() -> i32 {
    30
}

fn default_counter_key() -> String {
    "blocked_nav_count".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: None,
            program: None,
            url_scheme: UrlScheme::default(),
            automatic_save: true,
            sync: SyncSettings::default(),
            readiness: ReadinessSettings::default(),
            navigation: NavigationSettings::default(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: 0,
            backoff_multiplier: default_backoff_multiplier(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: None,
        }
    }
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            min_margin_bottom: default_min_margin_bottom(),
            counter_key: default_counter_key(),
            cancel_on_transition: false,
        }
    }
}

impl SyncSettings {
    pub fn retry_config(&self) -> RetryConfig {
        let delay = Duration::from_millis(self.retry_delay_ms);
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            base_delay: delay,
            max_delay: delay.max(Duration::from_secs(30)),
            backoff_multiplier: self.backoff_multiplier,
            jitter: false,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl ReadinessSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("survey-bridge")
        } else {
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".survey-bridge")
        };

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
            info!("Created config directory: {:?}", config_dir);
        }

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(config_path: &PathBuf) -> Result<Self> {
        debug!("Loading config from: {:?}", config_path);

        if !config_path.exists() {
            info!("Config file doesn't exist, using default config");
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let mut config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        // Files edited by hand may still carry the slash
        if let Some(domain) = config.domain.take() {
            config.set_domain(&domain);
        }

        Ok(config)
    }

    /// Overlay `SURVEY_BRIDGE_DOMAIN` / `SURVEY_BRIDGE_PROGRAM`, reading `.env` if present
    pub fn apply_env(&mut self) {
        dotenvy::dotenv().ok();

        if let Ok(domain) = std::env::var("SURVEY_BRIDGE_DOMAIN") {
            debug!("Domain overridden from environment");
            self.set_domain(&domain);
        }
        if let Ok(program) = std::env::var("SURVEY_BRIDGE_PROGRAM") {
            debug!("Program overridden from environment");
            self.set_program(&program);
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        debug!("Saving config to: {:?}", config_path);

        let config_content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, config_content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        info!("Config saved successfully");
        Ok(())
    }

    pub fn set_domain(&mut self, domain: &str) {
        if domain.is_empty() {
            return;
        }
        let trimmed = domain.strip_suffix('/').unwrap_or(domain);
        self.domain = Some(trimmed.to_string());
    }

    pub fn set_program(&mut self, program: &str) {
        if !program.is_empty() {
            self.program = Some(program.to_string());
        }
    }

    /// The platform domain, or `""` with an error log when unset
    pub fn domain(&self) -> &str {
        match self.domain.as_deref() {
            Some(domain) => domain,
            None => {
                error!("Platform domain must be configured; cannot build remote-store urls");
                ""
            }
        }
    }

    /// The program identifier, or `""` with an error log when unset
    pub fn program(&self) -> &str {
        match self.program.as_deref() {
            Some(program) => program,
            None => {
                error!("Program identifier must be configured");
                ""
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.url_scheme, UrlScheme::Neptune);
        assert!(config.automatic_save);
        assert_eq!(config.sync.max_attempts, 3);
        assert_eq!(config.sync.retry_delay_ms, 0);
        assert_eq!(config.readiness.poll_interval(), Duration::from_millis(100));
        assert!(config.readiness.max_poll_attempts.is_none());
        assert_eq!(config.navigation.min_margin_bottom, 30);
        assert_eq!(config.navigation.counter_key, "blocked_nav_count");
        assert!(!config.navigation.cancel_on_transition);
    }

    #[test]
    fn test_domain_strips_trailing_slash() {
        let mut config = Config::default();
        config.set_domain("https://www.example.org/");
        assert_eq!(config.domain(), "https://www.example.org");
    }

    #[test]
    fn test_unset_domain_degrades_to_empty() {
        let config = Config::default();
        assert_eq!(config.domain(), "");
        assert_eq!(config.program(), "");
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            domain = "https://platform.example.org"
            url_scheme = "yosemite"

            [readiness]
            max_poll_attempts = 50

            [navigation]
            cancel_on_transition = true
            "#,
        )
        .unwrap();

        assert_eq!(config.url_scheme, UrlScheme::Yosemite);
        assert_eq!(config.readiness.max_poll_attempts, Some(50));
        assert_eq!(config.readiness.poll_interval_ms, 100);
        assert!(config.navigation.cancel_on_transition);
        assert_eq!(config.sync.max_attempts, 3);
    }

    #[test]
    fn test_retry_config_without_delay_is_immediate() {
        let retry = SyncSettings::default().retry_config();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.base_delay, Duration::ZERO);
        assert!(!retry.jitter);
    }

    #[test]
    fn test_url_scheme_from_str() {
        assert_eq!("Neptune".parse::<UrlScheme>().unwrap(), UrlScheme::Neptune);
        assert_eq!("yosemite".parse::<UrlScheme>().unwrap(), UrlScheme::Yosemite);
        assert!("other".parse::<UrlScheme>().is_err());
    }
}
