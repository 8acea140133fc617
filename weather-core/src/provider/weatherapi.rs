use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    advice::alert_recommendations,
    error::WeatherError,
    model::{
        AirQuality, Alert, AlertSeverity, Aqi, Forecast, ForecastEntry, LocationQuery,
        MAX_FORECAST_DAYS, Units, WeatherRequest, WeatherSnapshot,
    },
    provider::{ProviderId, error_for_status, fetch_text, parse_json},
};

use super::WeatherProvider;

const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com/v1";

/// WeatherAPI.com answers unknown locations with 400 and this error code.
const NO_MATCHING_LOCATION: u32 = 1006;

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(api_key: String) -> Self {
        Self { api_key, base_url: DEFAULT_BASE_URL.to_string(), http: Client::new() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        request: &WeatherRequest,
        extra: &[(&str, &str)],
        operation: &str,
    ) -> Result<T, WeatherError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(%url, operation, "requesting WeatherAPI");

        let q = match &request.location {
            LocationQuery::City(city) => city.clone(),
            LocationQuery::Coordinates(c) => format!("{},{}", c.lat, c.lon),
        };

        let req = self
            .http
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", q.as_str()),
                ("lang", request.language.code()),
            ])
            .query(extra);

        let (status, body) = fetch_text(req, operation).await?;
        if !status.is_success() {
            return Err(map_error(status, &body, &request.location));
        }

        parse_json(&body, operation)
    }
}

fn map_error(status: StatusCode, body: &str, location: &LocationQuery) -> WeatherError {
    if status == StatusCode::BAD_REQUEST {
        let code = serde_json::from_str::<WaErrorResponse>(body).map(|e| e.error.code).ok();
        if code == Some(NO_MATCHING_LOCATION) {
            return WeatherError::NotFound(location.to_string());
        }
    }
    error_for_status(status, body, location)
}

#[derive(Debug, Deserialize)]
struct WaErrorBody {
    code: u32,
}

#[derive(Debug, Deserialize)]
struct WaErrorResponse {
    error: WaErrorBody,
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    country: String,
    localtime_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
    #[serde(default)]
    code: u32,
}

#[derive(Debug, Deserialize)]
struct WaAirQuality {
    #[serde(rename = "us-epa-index")]
    us_epa_index: Option<u8>,
    #[serde(flatten)]
    pollutants: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    temp_f: f64,
    feelslike_c: f64,
    feelslike_f: f64,
    humidity: u8,
    wind_kph: f64,
    wind_mph: f64,
    #[serde(default)]
    pressure_mb: f64,
    condition: WaCondition,
    last_updated_epoch: Option<i64>,
    air_quality: Option<WaAirQuality>,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: WaLocation,
    current: WaCurrent,
}

#[derive(Debug, Deserialize)]
struct WaDay {
    avgtemp_c: f64,
    avgtemp_f: f64,
    #[serde(default)]
    daily_chance_of_rain: u8,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date_epoch: i64,
    day: WaDay,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Default, Deserialize)]
struct WaAlerts {
    #[serde(default)]
    alert: Vec<WaAlert>,
}

#[derive(Debug, Deserialize)]
struct WaAlert {
    #[serde(default)]
    headline: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    event: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    urgency: String,
    effective: String,
    expires: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    instruction: String,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    location: WaLocation,
    forecast: WaForecast,
    #[serde(default)]
    alerts: WaAlerts,
}

fn location_name(location: &WaLocation) -> String {
    format!("{}, {}", location.name, location.country)
}

fn convert_alert(alert: &WaAlert) -> Option<Alert> {
    let starts_at = parse_rfc3339(&alert.effective)?;
    let ends_at = parse_rfc3339(&alert.expires)?;
    let event = if alert.event.is_empty() { alert.headline.clone() } else { alert.event.clone() };

    let mut recommendations: Vec<String> = alert
        .instruction
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if recommendations.is_empty() {
        recommendations = alert_recommendations(&event);
    }

    let tags = [&alert.category, &alert.urgency]
        .into_iter()
        .filter(|t| !t.is_empty())
        .cloned()
        .collect();

    Some(Alert {
        severity: AlertSeverity::from_text(&alert.severity).unwrap_or(AlertSeverity::Moderate),
        event,
        description: alert.desc.trim().to_string(),
        starts_at,
        ends_at,
        tags,
        recommendations,
    })
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
    }

    #[instrument(skip(self, request), fields(location = %request.location))]
    async fn current_weather(&self, request: &WeatherRequest) -> Result<WeatherSnapshot, WeatherError> {
        let parsed: WaResponse = self.get("current.json", request, &[], "WeatherAPI current").await?;

        let ts = parsed.current.last_updated_epoch.or(parsed.location.localtime_epoch);
        let observed_at = ts.and_then(unix_to_utc).unwrap_or_else(Utc::now);
        let current = parsed.current;

        let (temperature, feels_like, wind_speed) = match request.units {
            Units::Metric => (current.temp_c, current.feelslike_c, current.wind_kph / 3.6),
            Units::Imperial => (current.temp_f, current.feelslike_f, current.wind_mph),
        };

        Ok(WeatherSnapshot {
            location_name: location_name(&parsed.location),
            temperature,
            feels_like,
            humidity_pct: current.humidity,
            wind_speed,
            pressure_hpa: current.pressure_mb,
            condition: current.condition.text,
            icon: current.condition.code.to_string(),
            observed_at,
        })
    }

    #[instrument(skip(self, request), fields(location = %request.location))]
    async fn forecast(&self, request: &WeatherRequest) -> Result<Forecast, WeatherError> {
        let days = MAX_FORECAST_DAYS.to_string();
        let parsed: WaForecastResponse = self
            .get(
                "forecast.json",
                request,
                &[("days", days.as_str()), ("aqi", "no"), ("alerts", "no")],
                "WeatherAPI forecast",
            )
            .await?;

        let entries = parsed
            .forecast
            .forecastday
            .iter()
            .take(MAX_FORECAST_DAYS)
            .filter_map(|d| {
                Some(ForecastEntry {
                    timestamp: unix_to_utc(d.date_epoch)?,
                    temperature: match request.units {
                        Units::Metric => d.day.avgtemp_c,
                        Units::Imperial => d.day.avgtemp_f,
                    },
                    condition: d.day.condition.text.clone(),
                    icon: d.day.condition.code.to_string(),
                    rain_probability_pct: d.day.daily_chance_of_rain.min(100),
                })
            })
            .collect();

        Ok(Forecast { location_name: location_name(&parsed.location), entries })
    }

    #[instrument(skip(self, request), fields(location = %request.location))]
    async fn air_quality(&self, request: &WeatherRequest) -> Result<AirQuality, WeatherError> {
        let parsed: WaResponse = self
            .get("current.json", request, &[("aqi", "yes")], "WeatherAPI air quality")
            .await?;

        let air = parsed
            .current
            .air_quality
            .ok_or_else(|| WeatherError::Parse("WeatherAPI air quality: missing block".into()))?;

        // US-EPA index runs 1..=6; the dashboard scale stops at 5.
        let aqi = Aqi::saturating(air.us_epa_index.unwrap_or(1));
        let components = air
            .pollutants
            .into_iter()
            .filter(|(name, _)| !name.contains("index"))
            .filter_map(|(name, value)| value.as_f64().map(|v| (name, v)))
            .collect();

        Ok(AirQuality { aqi, components })
    }

    #[instrument(skip(self, request), fields(location = %request.location))]
    async fn alerts(&self, request: &WeatherRequest) -> Result<Vec<Alert>, WeatherError> {
        let parsed: WaForecastResponse = self
            .get(
                "forecast.json",
                request,
                &[("days", "1"), ("aqi", "no"), ("alerts", "yes")],
                "WeatherAPI alerts",
            )
            .await?;

        Ok(parsed.alerts.alert.iter().filter_map(convert_alert).collect())
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}
