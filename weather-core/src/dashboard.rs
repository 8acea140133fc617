//! Search orchestration: rate limiting, validation, the four-way fetch and
//! the resulting view state.
//!
//! Every user action starts a new cycle with a fresh generation number. A
//! cycle only writes its results if no newer action has started in the
//! meantime, so a slow earlier search can never overwrite a later one.
//! In-flight requests of superseded cycles are not cancelled.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    advice::advice_for,
    error::{GeolocationError, ValidationError, WeatherError},
    geolocation::{GeolocationOptions, Geolocator},
    model::{AirQuality, Alert, Forecast, LocationQuery, Units, WeatherRequest, WeatherSnapshot},
    provider::{Operation, WeatherProvider},
    rate_limit::{Clock, RateLimitConfig, RateLimiter, SystemClock},
    validation::{Language, UserGroup, validate_city_name, validate_coordinates},
};

/// Rate-limit key for city searches and explicit coordinates.
pub const SEARCH_KEY: &str = "search";
/// Rate-limit key for "use my location".
pub const LOCATION_KEY: &str = "location";

/// What happens when some of the four fetches fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Any failure empties every slot and reports the first failure.
    #[default]
    AllOrNothing,
    /// Successful slots are shown; the first failure is still reported.
    PartialDegradation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Validating,
    Fetching,
    Settled(Outcome),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadingFlags {
    pub current: bool,
    pub forecast: bool,
    pub air_quality: bool,
    pub alerts: bool,
}

impl LoadingFlags {
    pub fn all(value: bool) -> Self {
        Self { current: value, forecast: value, air_quality: value, alerts: value }
    }

    pub fn any(&self) -> bool {
        self.current || self.forecast || self.air_quality || self.alerts
    }
}

/// User-facing error classes. Each maps to one displayed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    EnterCityName,
    InvalidCityName,
    InvalidCoordinates,
    CityNotFound,
    NetworkError,
    RateLimitExceeded,
    LocationDenied,
    LocationUnavailable,
    LocationTimeout,
    LocationUnsupported,
    General,
}

impl ErrorCategory {
    pub fn message(&self, query: Option<&LocationQuery>) -> String {
        match self {
            ErrorCategory::EnterCityName => "Please enter a city name".to_string(),
            ErrorCategory::InvalidCityName => {
                "Invalid city name. Use letters, spaces, hyphens and apostrophes only".to_string()
            }
            ErrorCategory::InvalidCoordinates => "Received invalid coordinates".to_string(),
            ErrorCategory::CityNotFound => match query {
                Some(LocationQuery::City(city)) => format!("City \"{city}\" not found"),
                Some(LocationQuery::Coordinates(_)) => {
                    "No weather data found for this location".to_string()
                }
                None => "City not found".to_string(),
            },
            ErrorCategory::NetworkError => {
                "Network error. Check your connection and try again".to_string()
            }
            ErrorCategory::RateLimitExceeded => {
                "Rate limit exceeded. Please wait a moment before searching again".to_string()
            }
            ErrorCategory::LocationDenied => "Location access denied".to_string(),
            ErrorCategory::LocationUnavailable => "Location information is unavailable".to_string(),
            ErrorCategory::LocationTimeout => "Location request timed out".to_string(),
            ErrorCategory::LocationUnsupported => {
                "Geolocation is not supported on this device".to_string()
            }
            ErrorCategory::General => "Something went wrong. Please try again".to_string(),
        }
    }
}

impl From<&ValidationError> for ErrorCategory {
    fn from(err: &ValidationError) -> Self {
        match err {
            ValidationError::EmptyCityName => ErrorCategory::EnterCityName,
            ValidationError::CityNameTooLong { .. }
            | ValidationError::UnsafeCityName
            | ValidationError::InvalidCityName => ErrorCategory::InvalidCityName,
            ValidationError::InvalidCoordinates => ErrorCategory::InvalidCoordinates,
            ValidationError::InvalidUserGroup(_) | ValidationError::InvalidLanguage(_) => {
                ErrorCategory::General
            }
        }
    }
}

impl From<&WeatherError> for ErrorCategory {
    fn from(err: &WeatherError) -> Self {
        match err {
            WeatherError::Validation(v) => v.into(),
            WeatherError::NotFound(_) => ErrorCategory::CityNotFound,
            WeatherError::Network(_) => ErrorCategory::NetworkError,
            WeatherError::RateLimited => ErrorCategory::RateLimitExceeded,
            WeatherError::InvalidCredentials | WeatherError::Parse(_) | WeatherError::Unknown { .. } => {
                ErrorCategory::General
            }
        }
    }
}

impl From<GeolocationError> for ErrorCategory {
    fn from(err: GeolocationError) -> Self {
        match err {
            GeolocationError::PermissionDenied => ErrorCategory::LocationDenied,
            GeolocationError::PositionUnavailable => ErrorCategory::LocationUnavailable,
            GeolocationError::Timeout => ErrorCategory::LocationTimeout,
            GeolocationError::Unsupported => ErrorCategory::LocationUnsupported,
        }
    }
}

/// The single active error of a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewError {
    pub category: ErrorCategory,
    pub message: String,
    /// The fetch that failed, when the error came from the provider.
    pub operation: Option<Operation>,
    /// Underlying error text, for logs and verbose output.
    pub detail: Option<String>,
}

impl ViewError {
    pub fn new(category: ErrorCategory, query: Option<&LocationQuery>) -> Self {
        Self { category, message: category.message(query), operation: None, detail: None }
    }

    fn with_detail(mut self, detail: impl fmt::Display) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    fn from_fetch(operation: Operation, err: &WeatherError, query: &LocationQuery) -> Self {
        let mut view = Self::new(err.into(), Some(query)).with_detail(err);
        view.operation = Some(operation);
        view
    }
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Everything a front-end needs to draw the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewState {
    pub query: Option<LocationQuery>,
    pub current: Option<WeatherSnapshot>,
    pub forecast: Option<Forecast>,
    pub air_quality: Option<AirQuality>,
    pub alerts: Option<Vec<Alert>>,
    pub loading: LoadingFlags,
    pub error: Option<ViewError>,
    pub phase: Phase,
    #[serde(skip)]
    pub generation: u64,
}

impl ViewState {
    fn clear_data(&mut self) {
        self.current = None;
        self.forecast = None;
        self.air_quality = None;
        self.alerts = None;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DashboardSettings {
    pub language: Language,
    pub units: Units,
    pub user_group: UserGroup,
    pub failure_policy: FailurePolicy,
    pub rate_limit: RateLimitConfig,
    pub geolocation: GeolocationOptions,
}

/// Results of the four fetches of one cycle.
struct CycleResults {
    current: Result<WeatherSnapshot, WeatherError>,
    forecast: Result<Forecast, WeatherError>,
    air_quality: Result<AirQuality, WeatherError>,
    alerts: Result<Vec<Alert>, WeatherError>,
}

impl CycleResults {
    /// First failure in the fixed order current, forecast, air quality, alerts.
    fn first_error(&self) -> Option<(Operation, &WeatherError)> {
        [
            (Operation::CurrentWeather, self.current.as_ref().err()),
            (Operation::Forecast, self.forecast.as_ref().err()),
            (Operation::AirQuality, self.air_quality.as_ref().err()),
            (Operation::Alerts, self.alerts.as_ref().err()),
        ]
        .into_iter()
        .find_map(|(op, err)| err.map(|e| (op, e)))
    }
}

#[derive(Debug)]
pub struct Dashboard {
    provider: Arc<dyn WeatherProvider>,
    geolocator: Arc<dyn Geolocator>,
    settings: Mutex<DashboardSettings>,
    limiter: Mutex<RateLimiter>,
    state: Mutex<ViewState>,
    generation: AtomicU64,
}

impl Dashboard {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        geolocator: Arc<dyn Geolocator>,
        settings: DashboardSettings,
    ) -> Self {
        Self::with_clock(provider, geolocator, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        provider: Arc<dyn WeatherProvider>,
        geolocator: Arc<dyn Geolocator>,
        settings: DashboardSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            geolocator,
            limiter: Mutex::new(RateLimiter::new(settings.rate_limit, clock)),
            settings: Mutex::new(settings),
            state: Mutex::new(ViewState::default()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> DashboardSettings {
        *self.settings.lock()
    }

    /// Takes effect for [`Dashboard::advice`] immediately.
    pub fn set_user_group(&self, group: UserGroup) {
        self.settings.lock().user_group = group;
    }

    /// Takes effect from the next search.
    pub fn set_language(&self, language: Language) {
        self.settings.lock().language = language;
    }

    pub fn state(&self) -> ViewState {
        self.state.lock().clone()
    }

    /// Precautions for the current conditions and the configured user group.
    pub fn advice(&self) -> Vec<&'static str> {
        let settings = self.settings();
        let state = self.state.lock();
        let Some(current) = &state.current else {
            return Vec::new();
        };
        let celsius = match settings.units {
            Units::Metric => current.temperature,
            Units::Imperial => (current.temperature - 32.0) * 5.0 / 9.0,
        };
        advice_for(current, settings.user_group, Some(celsius))
    }

    /// Search by free-text city name.
    #[instrument(skip(self))]
    pub async fn search_city(&self, input: &str) -> ViewState {
        let generation = self.begin();

        if !self.admit(SEARCH_KEY) {
            return self.settle_error(generation, ViewError::new(ErrorCategory::RateLimitExceeded, None));
        }

        let city = match validate_city_name(input) {
            Ok(city) => city,
            Err(err) => {
                debug!(error = %err, "rejected city name");
                let view = ViewError::new((&err).into(), None).with_detail(&err);
                return self.settle_error(generation, view);
            }
        };

        self.run_cycle(generation, LocationQuery::City(city)).await
    }

    /// Search by an explicit coordinate pair.
    #[instrument(skip(self))]
    pub async fn search_coordinates(&self, lat: f64, lon: f64) -> ViewState {
        let generation = self.begin();

        if !self.admit(SEARCH_KEY) {
            return self.settle_error(generation, ViewError::new(ErrorCategory::RateLimitExceeded, None));
        }

        match validate_coordinates(lat, lon) {
            Ok(coords) => self.run_cycle(generation, LocationQuery::Coordinates(coords)).await,
            Err(err) => {
                let view = ViewError::new((&err).into(), None).with_detail(&err);
                self.settle_error(generation, view)
            }
        }
    }

    /// Search at the position reported by the geolocator.
    #[instrument(skip(self))]
    pub async fn search_location(&self) -> ViewState {
        let generation = self.begin();

        if !self.admit(LOCATION_KEY) {
            return self.settle_error(generation, ViewError::new(ErrorCategory::RateLimitExceeded, None));
        }

        let options = self.settings().geolocation;
        let located = tokio::time::timeout(options.timeout, self.geolocator.locate(&options))
            .await
            .unwrap_or(Err(GeolocationError::Timeout));

        let position = match located {
            Ok(position) => position,
            Err(err) => {
                warn!(error = %err, "geolocation failed");
                let view = ViewError::new(err.into(), None).with_detail(err);
                return self.settle_error(generation, view);
            }
        };

        // The source is trusted, but malformed values must not reach a provider.
        match validate_coordinates(position.lat, position.lon) {
            Ok(coords) => self.run_cycle(generation, LocationQuery::Coordinates(coords)).await,
            Err(err) => {
                warn!(lat = position.lat, lon = position.lon, "geolocator returned invalid coordinates");
                let view = ViewError::new((&err).into(), None).with_detail(&err);
                self.settle_error(generation, view)
            }
        }
    }

    /// Start a new cycle and enter `Validating`.
    fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock();
        state.generation = generation;
        state.phase = Phase::Validating;
        generation
    }

    fn admit(&self, key: &str) -> bool {
        let allowed = self.limiter.lock().is_allowed(key);
        if !allowed {
            warn!(key, "action rejected by rate limiter");
        }
        allowed
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Settle without fetching. Data from the previous cycle stays visible.
    fn settle_error(&self, generation: u64, error: ViewError) -> ViewState {
        let mut state = self.state.lock();
        if !self.is_current(generation) {
            return state.clone();
        }
        state.error = Some(error);
        state.loading = LoadingFlags::default();
        state.phase = Phase::Settled(Outcome::Error);
        state.clone()
    }

    async fn run_cycle(&self, generation: u64, query: LocationQuery) -> ViewState {
        {
            let mut state = self.state.lock();
            if !self.is_current(generation) {
                return state.clone();
            }
            state.query = Some(query.clone());
            state.clear_data();
            state.error = None;
            state.loading = LoadingFlags::all(true);
            state.phase = Phase::Fetching;
        }

        let settings = self.settings();
        let request = WeatherRequest {
            location: query,
            language: settings.language,
            units: settings.units,
        };
        debug!(generation, location = %request.location, provider = %self.provider.id(), "fetching");

        let (current, forecast, air_quality, alerts) = tokio::join!(
            self.provider.current_weather(&request),
            self.provider.forecast(&request),
            self.provider.air_quality(&request),
            self.provider.alerts(&request),
        );

        self.commit(generation, &request.location, CycleResults { current, forecast, air_quality, alerts })
    }

    fn commit(&self, generation: u64, query: &LocationQuery, results: CycleResults) -> ViewState {
        let mut state = self.state.lock();
        if !self.is_current(generation) {
            debug!(generation, latest = state.generation, "discarding results of superseded search");
            return state.clone();
        }

        let error = results
            .first_error()
            .map(|(op, err)| ViewError::from_fetch(op, err, query));

        match (&error, self.settings().failure_policy) {
            (Some(_), FailurePolicy::AllOrNothing) => state.clear_data(),
            _ => {
                state.current = results.current.ok();
                state.forecast = results.forecast.ok();
                state.air_quality = results.air_quality.ok();
                state.alerts = results.alerts.ok();
            }
        }

        match &error {
            Some(err) => {
                warn!(category = ?err.category, operation = ?err.operation, detail = ?err.detail, "search failed");
                state.phase = Phase::Settled(Outcome::Error);
            }
            None => {
                info!(location = %query, "search succeeded");
                state.phase = Phase::Settled(Outcome::Success);
            }
        }
        state.error = error;
        state.loading = LoadingFlags::default();
        state.clone()
    }
}
