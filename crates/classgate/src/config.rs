//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use classgate_monitor::{Locale, MonitorConfig, WarningConfig};
use classgate_session::{DEFAULT_WARNING_THRESHOLD_MINUTES, SessionConfig};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Environment variable overriding [`ClassgateConfig::api_base_url`].
pub const ENV_API_URI: &str = "CLASSGATE_API_URI";
/// Environment variable setting [`ClassgateConfig::storage_path`].
pub const ENV_STORAGE_PATH: &str = "CLASSGATE_STORAGE_PATH";
/// Environment variable overriding [`ClassgateConfig::warning_threshold_minutes`].
pub const ENV_WARNING_MINUTES: &str = "CLASSGATE_WARNING_MINUTES";
/// Environment variable overriding [`ClassgateConfig::locale`] (`en` or `pt-BR`).
pub const ENV_LOCALE: &str = "CLASSGATE_LOCALE";

/// Everything needed to assemble a [`Classgate`](crate::Classgate) client.
///
/// Deserializable with every field optional, so a config file only needs
/// the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassgateConfig {
    /// Base URL every API path is appended to.
    pub api_base_url: String,

    /// Upper bound on a whole request.
    pub request_timeout: Duration,

    /// Where the session is persisted. `None` keeps it in memory only.
    pub storage_path: Option<PathBuf>,

    /// Session monitor cadence.
    pub monitor_period: Duration,

    /// Warning policy cadence.
    pub warning_period: Duration,

    /// Lead time before expiry at which warnings start.
    pub warning_threshold_minutes: u64,

    pub locale: Locale,
}

impl Default for ClassgateConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".to_string(),
            request_timeout: Duration::from_secs(30),
            storage_path: None,
            monitor_period: Duration::from_secs(30),
            warning_period: Duration::from_secs(10),
            warning_threshold_minutes: DEFAULT_WARNING_THRESHOLD_MINUTES,
            locale: Locale::default(),
        }
    }
}

impl ClassgateConfig {
    /// Defaults overlaid with the `CLASSGATE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Overlays values from `lookup` (an environment, a map, ...) on top of
    /// `self`. Empty values are ignored.
    pub fn overlay(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_API_URI) {
            self.api_base_url = url;
        }
        if let Some(path) = get(ENV_STORAGE_PATH) {
            self.storage_path = Some(PathBuf::from(path));
        }
        if let Some(minutes) = get(ENV_WARNING_MINUTES) {
            let parsed = minutes.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_WARNING_MINUTES,
                value: minutes.clone(),
            })?;
            self.warning_threshold_minutes = parsed;
        }
        if let Some(locale) = get(ENV_LOCALE) {
            self.locale = match locale.trim() {
                "en" | "en-US" | "english" => Locale::English,
                "pt" | "pt-BR" => Locale::PortugueseBr,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_LOCALE,
                        value: locale,
                    });
                }
            };
        }
        Ok(self)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            warning_threshold_minutes: self.warning_threshold_minutes,
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            period: self.monitor_period,
            warning_threshold_minutes: self.warning_threshold_minutes,
            ..MonitorConfig::default()
        }
    }

    pub fn warning_config(&self) -> WarningConfig {
        WarningConfig {
            period: self.warning_period,
            threshold_minutes: self.warning_threshold_minutes,
            locale: self.locale,
            ..WarningConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_matches_backend_defaults() {
        let config = ClassgateConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8080/api");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.monitor_period, Duration::from_secs(30));
        assert_eq!(config.warning_period, Duration::from_secs(10));
        assert_eq!(config.warning_threshold_minutes, 5);
        assert_eq!(config.storage_path, None);
    }

    #[test]
    fn test_overlay_applies_each_variable() {
        let config = ClassgateConfig::default()
            .overlay(env(&[
                (ENV_API_URI, "https://escola.example/api"),
                (ENV_STORAGE_PATH, "/tmp/classgate.json"),
                (ENV_WARNING_MINUTES, " 10 "),
                (ENV_LOCALE, "pt-BR"),
            ]))
            .unwrap();

        assert_eq!(config.api_base_url, "https://escola.example/api");
        assert_eq!(config.storage_path, Some(PathBuf::from("/tmp/classgate.json")));
        assert_eq!(config.warning_threshold_minutes, 10);
        assert_eq!(config.locale, Locale::PortugueseBr);
    }

    #[test]
    fn test_overlay_ignores_empty_values() {
        let config = ClassgateConfig::default()
            .overlay(env(&[(ENV_API_URI, "  ")]))
            .unwrap();
        assert_eq!(config.api_base_url, ClassgateConfig::default().api_base_url);
    }

    #[test]
    fn test_overlay_rejects_bad_minutes() {
        let err = ClassgateConfig::default()
            .overlay(env(&[(ENV_WARNING_MINUTES, "five")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: ENV_WARNING_MINUTES, .. }
        ));
    }

    #[test]
    fn test_deserialize_partial_document() {
        let config: ClassgateConfig =
            serde_json::from_str(r#"{ "warning_threshold_minutes": 2 }"#).unwrap();
        assert_eq!(config.warning_threshold_minutes, 2);
        assert_eq!(config.api_base_url, "http://localhost:8080/api");
    }

    #[test]
    fn test_derived_configs_carry_threshold() {
        let config = ClassgateConfig {
            warning_threshold_minutes: 7,
            locale: Locale::PortugueseBr,
            ..ClassgateConfig::default()
        };
        assert_eq!(config.session_config().warning_threshold_minutes, 7);
        assert_eq!(config.monitor_config().warning_threshold_minutes, 7);
        let warning = config.warning_config();
        assert_eq!(warning.threshold_minutes, 7);
        assert_eq!(warning.locale, Locale::PortugueseBr);
    }
}
