//! Structured error types shared across the crate.
//!
//! Every failure carries its kind in the variant itself, so callers classify
//! errors with `match` instead of inspecting message text.

use thiserror::Error;

/// Rejection of malformed or unsafe user input, raised before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("city name must not be empty")]
    EmptyCityName,

    #[error("city name must be at most {max} characters")]
    CityNameTooLong { max: usize },

    #[error("city name contains a disallowed pattern")]
    UnsafeCityName,

    #[error("city name may only contain letters, spaces, hyphens and apostrophes")]
    InvalidCityName,

    #[error("invalid coordinates: latitude must be -90 to 90, longitude must be -180 to 180")]
    InvalidCoordinates,

    #[error("unknown user group '{0}'")]
    InvalidUserGroup(String),

    #[error("unsupported language code '{0}'")]
    InvalidLanguage(String),
}

/// Failure reported by a weather provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The provider does not know the requested location.
    #[error("location not found: {0}")]
    NotFound(String),

    #[error("the provider rejected the configured API key")]
    InvalidCredentials,

    #[error("the provider rate limit was exceeded")]
    RateLimited,

    /// No response was received at all.
    #[error("network error: {0}")]
    Network(String),

    #[error("failed to parse provider response: {0}")]
    Parse(String),

    #[error("provider request failed with status {status}: {body}")]
    Unknown { status: u16, body: String },
}

/// Flat tag describing which kind of failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InvalidCredentials,
    RateLimited,
    Network,
    Parse,
    Unknown,
}

impl WeatherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WeatherError::Validation(_) => ErrorKind::Validation,
            WeatherError::NotFound(_) => ErrorKind::NotFound,
            WeatherError::InvalidCredentials => ErrorKind::InvalidCredentials,
            WeatherError::RateLimited => ErrorKind::RateLimited,
            WeatherError::Network(_) => ErrorKind::Network,
            WeatherError::Parse(_) => ErrorKind::Parse,
            WeatherError::Unknown { .. } => ErrorKind::Unknown,
        }
    }
}

/// Failure of a one-shot position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("permission to access the location was denied")]
    PermissionDenied,

    #[error("the current position is unavailable")]
    PositionUnavailable,

    #[error("the position request timed out")]
    Timeout,

    #[error("geolocation is not supported")]
    Unsupported,
}
