//! Core library for the `weather` dashboard.
//!
//! This crate defines:
//! - Input validation and a fixed-window rate limiter
//! - Abstraction over weather providers (OpenWeather, WeatherAPI.com, offline mock)
//! - Geolocation sources and a persisted theme preference
//! - The search orchestration that turns user actions into a [`ViewState`]
//!
//! It is used by `weather-cli`, but can also be reused by other front-ends.

pub mod advice;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod geolocation;
pub mod model;
pub mod provider;
pub mod rate_limit;
pub mod theme;
pub mod validation;

pub use config::{Config, LocationConfig, Preferences, ProviderConfig};
pub use dashboard::{
    Dashboard, DashboardSettings, ErrorCategory, FailurePolicy, LoadingFlags, Outcome, Phase,
    ViewError, ViewState,
};
pub use error::{ErrorKind, GeolocationError, ValidationError, WeatherError};
pub use geolocation::{Geolocator, GeolocationOptions};
pub use model::{
    AirQuality, Alert, AlertSeverity, Aqi, Coordinates, Forecast, ForecastEntry, LocationQuery,
    Units, WeatherRequest, WeatherSnapshot,
};
pub use provider::{Operation, ProviderId, WeatherProvider};
pub use theme::{Theme, ThemePreference};
pub use validation::{Language, UserGroup};
