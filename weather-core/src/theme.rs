//! Persisted display theme.
//!
//! The preference is a single key in a small key-value store. Anything that
//! goes wrong while reading it (missing file, unreadable store, unknown value)
//! is ignored and the caller falls back to its default theme.

use std::{collections::BTreeMap, fmt, fs, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    HighContrast,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::HighContrast => "high-contrast",
        }
    }

    pub const fn all() -> &'static [Theme] {
        &[Theme::Light, Theme::Dark, Theme::HighContrast]
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| anyhow::anyhow!("Unknown theme '{s}'. Supported themes: light, dark, high-contrast."))
    }
}

/// String key-value storage for user preferences.
pub trait PreferenceStore: Send + Sync {
    /// `None` when the key is absent or the store cannot be read.
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Preferences kept as a flat TOML table in a file.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `preferences.toml` next to the main config file.
    pub fn in_config_dir() -> Result<Self> {
        Ok(Self::new(crate::Config::config_dir()?.join("preferences.toml")))
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read preferences: {}", self.path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse preferences: {}", self.path.display()))
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.read_all() {
            Ok(mut values) => values.remove(key),
            Err(err) => {
                debug!(error = %err, "preference store unavailable");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        // A corrupt file is replaced rather than blocking the write.
        let mut values = self.read_all().unwrap_or_default();
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create preferences directory: {}", parent.display())
            })?;
        }
        let toml = toml::to_string(&values).context("Failed to serialize preferences")?;
        fs::write(&self.path, toml)
            .with_context(|| format!("Failed to write preferences: {}", self.path.display()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed access to the theme entry of a [`PreferenceStore`].
pub struct ThemePreference<S> {
    store: S,
}

impl<S: PreferenceStore> ThemePreference<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The stored theme, or `None` if nothing valid is stored.
    pub fn load(&self) -> Option<Theme> {
        let raw = self.store.get(THEME_KEY)?;
        match raw.parse() {
            Ok(theme) => Some(theme),
            Err(_) => {
                debug!(value = %raw, "ignoring invalid stored theme");
                None
            }
        }
    }

    pub fn load_or_default(&self) -> Theme {
        self.load().unwrap_or_default()
    }

    pub fn save(&self, theme: Theme) -> Result<()> {
        self.store.set(THEME_KEY, theme.as_str())
    }
}
