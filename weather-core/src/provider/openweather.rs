use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::{
    advice::alert_recommendations,
    error::WeatherError,
    model::{
        AirQuality, Alert, AlertSeverity, Aqi, Coordinates, Forecast, ForecastEntry, LocationQuery,
        MAX_FORECAST_DAYS, WeatherRequest, WeatherSnapshot,
    },
    provider::{ProviderId, error_for_status, fetch_text, parse_json},
};

use super::WeatherProvider;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
    /// Geocoding results by lower-cased city name.
    geocoded: Arc<Mutex<HashMap<String, Coordinates>>>,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
            geocoded: Arc::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: Vec<(&'static str, String)>,
        location: &LocationQuery,
        operation: &str,
    ) -> Result<T, WeatherError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, operation, "requesting OpenWeather");

        let request = self
            .http
            .get(&url)
            .query(&params)
            .query(&[("appid", self.api_key.as_str())]);

        let (status, body) = fetch_text(request, operation).await?;
        if !status.is_success() {
            return Err(error_for_status(status, &body, location));
        }

        parse_json(&body, operation)
    }

    /// Air pollution and alerts only accept coordinates, so city queries go
    /// through the geocoding endpoint first.
    ///
    /// The cache lock is held across the lookup so that the concurrent air
    /// quality and alerts fetches of one search share a single request.
    async fn resolve(&self, request: &WeatherRequest) -> Result<Coordinates, WeatherError> {
        let city = match &request.location {
            LocationQuery::Coordinates(c) => return Ok(*c),
            LocationQuery::City(city) => city,
        };

        let key = city.to_lowercase();
        let mut geocoded = self.geocoded.lock().await;
        if let Some(coords) = geocoded.get(&key) {
            return Ok(*coords);
        }

        let hits: Vec<OwGeocodeHit> = self
            .get(
                "/geo/1.0/direct",
                vec![("q", city.clone()), ("limit", "1".to_string())],
                &request.location,
                "OpenWeather geocoding",
            )
            .await?;

        let coords = hits
            .first()
            .map(|hit| Coordinates { lat: hit.lat, lon: hit.lon })
            .ok_or_else(|| WeatherError::NotFound(city.clone()))?;
        geocoded.insert(key, coords);
        Ok(coords)
    }
}

fn common_params(request: &WeatherRequest) -> Vec<(&'static str, String)> {
    let mut params = location_params(&request.location);
    params.push(("units", request.units.as_str().to_string()));
    params.push(("lang", request.language.code().to_string()));
    params
}

fn location_params(location: &LocationQuery) -> Vec<(&'static str, String)> {
    match location {
        LocationQuery::City(city) => vec![("q", city.clone())],
        LocationQuery::Coordinates(c) => {
            vec![("lat", c.lat.to_string()), ("lon", c.lon.to_string())]
        }
    }
}

fn coordinate_params(c: Coordinates) -> Vec<(&'static str, String)> {
    location_params(&LocationQuery::Coordinates(c))
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    #[serde(default)]
    feels_like: Option<f64>,
    #[serde(default)]
    humidity: u8,
    #[serde(default)]
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    #[serde(default)]
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
    #[serde(default)]
    sys: Option<OwSys>,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    name: String,
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    #[serde(default)]
    pop: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct OwGeocodeHit {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwAirMain {
    aqi: u8,
}

#[derive(Debug, Deserialize)]
struct OwAirEntry {
    main: OwAirMain,
    #[serde(default)]
    components: HashMap<String, Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OwAirResponse {
    list: Vec<OwAirEntry>,
}

#[derive(Debug, Deserialize)]
struct OwAlert {
    event: String,
    start: i64,
    end: i64,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OwOneCallResponse {
    #[serde(default)]
    alerts: Vec<OwAlert>,
}

fn describe(weather: &[OwWeather]) -> (String, String) {
    weather
        .first()
        .map(|w| (w.description.clone(), w.icon.clone()))
        .unwrap_or_else(|| ("Unknown".to_string(), String::new()))
}

/// Reduce the 3-hourly list to one entry per day, preferring the midday slot.
fn daily_entries(list: &[OwForecastEntry]) -> Vec<ForecastEntry> {
    let mut days: BTreeMap<NaiveDate, &OwForecastEntry> = BTreeMap::new();

    for entry in list {
        let Some(ts) = unix_to_utc(entry.dt) else { continue };
        days.entry(ts.date_naive())
            .and_modify(|kept| {
                let kept_hour = unix_to_utc(kept.dt).map_or(0, |t| t.hour());
                if ts.hour() == 12 && kept_hour != 12 {
                    *kept = entry;
                }
            })
            .or_insert(entry);
    }

    days.into_values()
        .take(MAX_FORECAST_DAYS)
        .filter_map(|entry| {
            let (condition, icon) = describe(&entry.weather);
            Some(ForecastEntry {
                timestamp: unix_to_utc(entry.dt)?,
                temperature: entry.main.temp,
                condition,
                icon,
                rain_probability_pct: (entry.pop.clamp(0.0, 1.0) * 100.0).round() as u8,
            })
        })
        .collect()
}

fn alert_severity(alert: &OwAlert) -> AlertSeverity {
    std::iter::once(alert.event.as_str())
        .chain(alert.tags.iter().map(String::as_str))
        .find_map(AlertSeverity::from_text)
        .unwrap_or_else(|| {
            let event = alert.event.to_lowercase();
            if event.contains("warning") {
                AlertSeverity::Severe
            } else if event.contains("advisory") || event.contains("statement") {
                AlertSeverity::Minor
            } else {
                AlertSeverity::Moderate
            }
        })
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    #[instrument(skip(self, request), fields(location = %request.location))]
    async fn current_weather(&self, request: &WeatherRequest) -> Result<WeatherSnapshot, WeatherError> {
        let parsed: OwCurrentResponse = self
            .get("/data/2.5/weather", common_params(request), &request.location, "OpenWeather current")
            .await?;

        let (condition, icon) = describe(&parsed.weather);
        let location_name = match parsed.sys.and_then(|s| s.country) {
            Some(country) if !country.is_empty() => format!("{}, {}", parsed.name, country),
            _ => parsed.name,
        };

        Ok(WeatherSnapshot {
            location_name,
            temperature: parsed.main.temp,
            feels_like: parsed.main.feels_like.unwrap_or(parsed.main.temp),
            humidity_pct: parsed.main.humidity,
            wind_speed: parsed.wind.speed,
            pressure_hpa: parsed.main.pressure,
            condition,
            icon,
            observed_at: unix_to_utc(parsed.dt).unwrap_or_else(Utc::now),
        })
    }

    #[instrument(skip(self, request), fields(location = %request.location))]
    async fn forecast(&self, request: &WeatherRequest) -> Result<Forecast, WeatherError> {
        let parsed: OwForecastResponse = self
            .get("/data/2.5/forecast", common_params(request), &request.location, "OpenWeather forecast")
            .await?;

        let location_name = if parsed.city.country.is_empty() {
            parsed.city.name.clone()
        } else {
            format!("{}, {}", parsed.city.name, parsed.city.country)
        };

        Ok(Forecast { location_name, entries: daily_entries(&parsed.list) })
    }

    #[instrument(skip(self, request), fields(location = %request.location))]
    async fn air_quality(&self, request: &WeatherRequest) -> Result<AirQuality, WeatherError> {
        let coords = self.resolve(request).await?;
        let parsed: OwAirResponse = self
            .get(
                "/data/2.5/air_pollution",
                coordinate_params(coords),
                &request.location,
                "OpenWeather air pollution",
            )
            .await?;

        let entry = parsed
            .list
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::Parse("OpenWeather air pollution: empty list".into()))?;

        let components = entry
            .components
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();

        Ok(AirQuality { aqi: Aqi::saturating(entry.main.aqi), components })
    }

    #[instrument(skip(self, request), fields(location = %request.location))]
    async fn alerts(&self, request: &WeatherRequest) -> Result<Vec<Alert>, WeatherError> {
        let coords = self.resolve(request).await?;
        let mut params = coordinate_params(coords);
        params.push(("exclude", "current,minutely,hourly,daily".to_string()));
        params.push(("lang", request.language.code().to_string()));

        // One Call 3.0 is a separate subscription. Keys without it are
        // rejected here while the other endpoints work.
        let parsed: OwOneCallResponse = match self
            .get("/data/3.0/onecall", params, &request.location, "OpenWeather alerts")
            .await
        {
            Ok(parsed) => parsed,
            Err(err @ (WeatherError::InvalidCredentials | WeatherError::Unknown { status: 403, .. })) => {
                warn!(error = %err, "OpenWeather alerts unavailable for this key");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };

        let alerts = parsed
            .alerts
            .iter()
            .filter_map(|a| {
                Some(Alert {
                    event: a.event.clone(),
                    description: a.description.trim().to_string(),
                    severity: alert_severity(a),
                    starts_at: unix_to_utc(a.start)?,
                    ends_at: unix_to_utc(a.end)?,
                    tags: a.tags.clone(),
                    recommendations: alert_recommendations(&a.event),
                })
            })
            .collect();

        Ok(alerts)
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}
