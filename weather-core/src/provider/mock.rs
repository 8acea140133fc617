//! Offline provider with deterministic data.
//!
//! Used by the CLI's `mock` provider and by tests that need to steer failures
//! or response timing without a network.

use std::{
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    error::WeatherError,
    model::{
        AirQuality, Alert, AlertSeverity, Aqi, Forecast, ForecastEntry, LocationQuery,
        MAX_FORECAST_DAYS, WeatherRequest, WeatherSnapshot,
    },
    provider::{Operation, ProviderId, WeatherProvider},
};

/// City name that every operation answers with `NotFound`.
pub const NOT_FOUND_SENTINEL: &str = "invalidcity";

const CONDITIONS: &[(&str, &str)] = &[
    ("clear sky", "01d"),
    ("scattered clouds", "03d"),
    ("light rain", "10d"),
    ("haze", "50d"),
    ("thunderstorm", "11d"),
];

#[derive(Debug, Default)]
pub struct MockProvider {
    fetches: AtomicUsize,
    delays: Mutex<HashMap<String, Duration>>,
    failures: Mutex<HashMap<Operation, WeatherError>>,
    last_request: Mutex<Option<WeatherRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response for `city` (case-insensitive).
    pub fn with_delay(self, city: &str, delay: Duration) -> Self {
        self.delays.lock().insert(city.to_lowercase(), delay);
        self
    }

    /// Make `operation` fail with `error` for every location.
    pub fn fail(&self, operation: Operation, error: WeatherError) {
        self.failures.lock().insert(operation, error);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    /// Number of operations issued so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<WeatherRequest> {
        self.last_request.lock().clone()
    }

    async fn begin(&self, operation: Operation, request: &WeatherRequest) -> Result<(), WeatherError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());
        debug!(%operation, location = %request.location, "mock fetch");

        let delay = match &request.location {
            LocationQuery::City(city) => self.delays.lock().get(&city.to_lowercase()).copied(),
            LocationQuery::Coordinates(_) => None,
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let LocationQuery::City(city) = &request.location {
            if city.eq_ignore_ascii_case(NOT_FOUND_SENTINEL) {
                return Err(WeatherError::NotFound(city.clone()));
            }
        }

        if let Some(err) = self.failures.lock().get(&operation) {
            return Err(err.clone());
        }

        Ok(())
    }
}

fn seed(location: &LocationQuery) -> usize {
    location.to_string().bytes().map(usize::from).sum()
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).single().unwrap_or_default()
}

#[async_trait]
impl WeatherProvider for MockProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Mock
    }

    async fn current_weather(&self, request: &WeatherRequest) -> Result<WeatherSnapshot, WeatherError> {
        self.begin(Operation::CurrentWeather, request).await?;

        let seed = seed(&request.location);
        let (condition, icon) = CONDITIONS[seed % CONDITIONS.len()];
        let temperature = 15.0 + (seed % 20) as f64;

        Ok(WeatherSnapshot {
            location_name: request.location.to_string(),
            temperature,
            feels_like: temperature + 1.5,
            humidity_pct: (40 + seed % 50) as u8,
            wind_speed: 2.0 + (seed % 7) as f64,
            pressure_hpa: 1005.0 + (seed % 15) as f64,
            condition: condition.to_string(),
            icon: icon.to_string(),
            observed_at: base_time(),
        })
    }

    async fn forecast(&self, request: &WeatherRequest) -> Result<Forecast, WeatherError> {
        self.begin(Operation::Forecast, request).await?;

        let seed = seed(&request.location);
        let entries = (0..MAX_FORECAST_DAYS)
            .map(|day| {
                let (condition, icon) = CONDITIONS[(seed + day) % CONDITIONS.len()];
                ForecastEntry {
                    timestamp: base_time() + chrono::Duration::days(day as i64 + 1),
                    temperature: 14.0 + ((seed + day * 3) % 18) as f64,
                    condition: condition.to_string(),
                    icon: icon.to_string(),
                    rain_probability_pct: ((seed + day * 17) % 101) as u8,
                }
            })
            .collect();

        Ok(Forecast { location_name: request.location.to_string(), entries })
    }

    async fn air_quality(&self, request: &WeatherRequest) -> Result<AirQuality, WeatherError> {
        self.begin(Operation::AirQuality, request).await?;

        let seed = seed(&request.location);
        let components = BTreeMap::from([
            ("pm2_5".to_string(), 5.0 + (seed % 60) as f64),
            ("pm10".to_string(), 10.0 + (seed % 90) as f64),
            ("o3".to_string(), 20.0 + (seed % 40) as f64),
        ]);

        Ok(AirQuality { aqi: Aqi::saturating((1 + seed % 5) as u8), components })
    }

    async fn alerts(&self, request: &WeatherRequest) -> Result<Vec<Alert>, WeatherError> {
        self.begin(Operation::Alerts, request).await?;

        if seed(&request.location) % 2 == 1 {
            return Ok(Vec::new());
        }

        Ok(vec![Alert {
            event: "Heat Advisory".to_string(),
            description: format!("High temperatures expected around {}.", request.location),
            severity: AlertSeverity::Moderate,
            starts_at: base_time(),
            ends_at: base_time() + chrono::Duration::hours(12),
            tags: vec!["Extreme high temperature".to_string()],
            recommendations: crate::advice::alert_recommendations("Heat Advisory"),
        }])
    }
}
