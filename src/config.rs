//! Application-level configuration loading: sweep cadence, provider budget and game defaults.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

use crate::state::{lobby::DEFAULT_MAX_MEMBERS, settings::GameSettings};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIVAI_BACK_CONFIG_PATH";

#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Idle time after which lobbies, games and disconnected players are reaped.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub stale_timeout: Duration,
    /// Interval between two sweeps.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub sweep_interval: Duration,
    /// Budget for a single question provider call before falling back.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub provider_timeout: Duration,
    /// Number of topics requested when a game is created.
    pub topic_count: usize,
    /// Member cap of new lobbies.
    pub max_lobby_members: usize,
    /// Settings every new lobby starts with.
    pub game_settings: GameSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stale_timeout: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
            provider_timeout: Duration::from_secs(20),
            topic_count: 15,
            max_lobby_members: DEFAULT_MAX_MEMBERS,
            game_settings: GameSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        stale_timeout_ms = config.stale_timeout.as_millis() as u64,
                        topic_count = config.topic_count,
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse and sanitize a JSON configuration document.
    pub fn from_json_str(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Self>(contents).map(Self::sanitized)
    }

    /// Clamp values that would make the server unusable.
    pub fn sanitized(mut self) -> Self {
        if self.game_settings.max_rounds == 0 {
            warn!("max_rounds must be at least 1; clamping");
            self.game_settings.max_rounds = 1;
        }
        if self.game_settings.questions_per_round == 0 {
            warn!("questions_per_round must be at least 1; clamping");
            self.game_settings.questions_per_round = 1;
        }
        if self.topic_count == 0 {
            warn!("topic_count must be at least 1; clamping");
            self.topic_count = 1;
        }
        if self.max_lobby_members == 0 {
            warn!("max_lobby_members must be at least 1; clamping");
            self.max_lobby_members = 1;
        }
        if self.sweep_interval.is_zero() {
            warn!("sweep_interval must be positive; using 1s");
            self.sweep_interval = Duration::from_secs(1);
        }
        self
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.stale_timeout, Duration::from_millis(1_800_000));
    }

    #[test]
    fn durations_are_milliseconds() {
        let config = AppConfig::from_json_str(
            r#"{ "sweep_interval": 5000, "provider_timeout": 250, "game_settings": { "max_rounds": 3 } }"#,
        )
        .unwrap();

        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.provider_timeout, Duration::from_millis(250));
        assert_eq!(config.game_settings.max_rounds, 3);
        assert_eq!(config.game_settings.base_points, 100);
    }

    #[test]
    fn zero_values_are_clamped() {
        let config = AppConfig::from_json_str(
            r#"{ "topic_count": 0, "game_settings": { "max_rounds": 0, "questions_per_round": 0 } }"#,
        )
        .unwrap();

        assert_eq!(config.topic_count, 1);
        assert_eq!(config.game_settings.max_rounds, 1);
        assert_eq!(config.game_settings.questions_per_round, 1);
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(AppConfig::from_json_str("{ not json").is_err());
    }
}
