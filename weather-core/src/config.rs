use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf};

use crate::{
    dashboard::{DashboardSettings, FailurePolicy},
    model::Units,
    provider::ProviderId,
    rate_limit::RateLimitConfig,
    validation::{Language, UserGroup},
};

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,

    /// Override for the provider's API root, mostly useful for testing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// User-facing preferences applied to every search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub language: Language,
    pub units: Units,
    pub user_group: UserGroup,
    pub failure_policy: FailurePolicy,
}

/// Where "my location" comes from when the user asks for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub use_ip_lookup: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_lookup_url: Option<String>,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Optional default provider id, e.g. "openweather" or "weatherapi".
    pub default_provider: Option<String>,

    /// Example TOML:
    /// [providers.openweather]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub preferences: Preferences,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub location: LocationConfig,
}

impl Config {
    /// Return the default provider as a strongly-typed ProviderId.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        let s = self.default_provider.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "No default provider configured.\n\
                 Hint: run `weather configure <provider>` (e.g. `weather configure openweather`) first."
            )
        })?;

        ProviderId::try_from(s.as_str())
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Store default provider as string.
    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = Some(id.as_str().to_string());
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Platform config directory shared by the config file and stored preferences.
    pub fn config_dir() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().to_path_buf())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Convenience helper: set/replace a provider API key and optionally set default provider.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        let base_url = self.provider_config(provider_id).and_then(|cfg| cfg.base_url.clone());
        self.providers
            .insert(provider_id.as_str().to_string(), ProviderConfig { api_key, base_url });

        if self.default_provider.is_none() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers.get(provider_id.as_str()).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        !provider_id.requires_api_key() || self.provider_api_key(provider_id).is_some()
    }

    /// Settings the orchestration layer runs with.
    pub fn dashboard_settings(&self) -> DashboardSettings {
        DashboardSettings {
            language: self.preferences.language,
            units: self.preferences.units,
            user_group: self.preferences.user_group,
            failure_policy: self.preferences.failure_policy,
            rate_limit: self.rate_limit,
            ..DashboardSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;
    use std::time::Duration;

    #[test]
    fn default_provider_id_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.default_provider_id().unwrap_err();

        assert!(err.to_string().contains("No default provider configured"));
    }

    #[test]
    fn set_api_key_and_default_for_provider() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OPEN_KEY".into());

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::OpenWeather);

        let key = cfg.provider_api_key(ProviderId::OpenWeather);
        assert_eq!(key, Some("OPEN_KEY"));
        assert!(cfg.is_provider_configured(ProviderId::OpenWeather));
        assert!(!cfg.is_provider_configured(ProviderId::WeatherApi));
        assert!(cfg.is_provider_configured(ProviderId::Mock));
    }

    #[test]
    fn set_default_provider_overrides_default() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OPEN_KEY".into());
        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "WEATHER_KEY".into());

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::OpenWeather);

        cfg.set_default_provider(ProviderId::WeatherApi);

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::WeatherApi);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            default_provider = "openweather"

            [providers.openweather]
            api_key = "abc"

            [preferences]
            language = "hi"
            user_group = "outdoor-workers"

            [rate_limit]
            max_requests = 3
            window_ms = 5000
            "#,
        )
        .unwrap();

        assert_eq!(cfg.preferences.language, Language::Hi);
        assert_eq!(cfg.preferences.user_group, UserGroup::OutdoorWorkers);
        assert_eq!(cfg.preferences.units, Units::Metric);
        assert_eq!(cfg.preferences.failure_policy, FailurePolicy::AllOrNothing);
        assert_eq!(cfg.rate_limit.max_requests, 3);
        assert_eq!(cfg.rate_limit.window, Duration::from_secs(5));
        assert!(cfg.location.latitude.is_none());
    }

    #[test]
    fn rate_limit_table_may_omit_window() {
        let cfg: Config = toml::from_str("[rate_limit]\nmax_requests = 20\n").unwrap();
        assert_eq!(cfg.rate_limit.max_requests, 20);
        assert_eq!(cfg.rate_limit.window, Duration::from_secs(60));
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "KEY".into());
        cfg.preferences.failure_policy = FailurePolicy::PartialDegradation;
        cfg.location.latitude = Some(19.07);
        cfg.location.longitude = Some(72.87);
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.default_provider_id().unwrap(), ProviderId::WeatherApi);
        assert_eq!(loaded.preferences, cfg.preferences);
        assert_eq!(loaded.location, cfg.location);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.default_provider.is_none());
        assert!(cfg.providers.is_empty());
    }
}
