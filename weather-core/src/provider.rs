use crate::{
    Config, ProviderConfig,
    error::WeatherError,
    model::{AirQuality, Alert, Forecast, LocationQuery, WeatherRequest, WeatherSnapshot},
    provider::{mock::MockProvider, openweather::OpenWeatherProvider, weatherapi::WeatherApiProvider},
};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::{convert::TryFrom, fmt::Debug, sync::Arc};

pub mod mock;
pub mod openweather;
pub mod weatherapi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    WeatherApi,
    Mock,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::WeatherApi => "weatherapi",
            ProviderId::Mock => "mock",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeather, ProviderId::WeatherApi, ProviderId::Mock]
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderId::Mock)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            "mock" => Ok(ProviderId::Mock),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, weatherapi, mock."
            )),
        }
    }
}

/// The four operations every provider offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CurrentWeather,
    Forecast,
    AirQuality,
    Alerts,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CurrentWeather => "current weather",
            Operation::Forecast => "forecast",
            Operation::AirQuality => "air quality",
            Operation::Alerts => "alerts",
        }
    }

    pub const fn all() -> &'static [Operation] {
        &[Operation::CurrentWeather, Operation::Forecast, Operation::AirQuality, Operation::Alerts]
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One weather backend. Each operation accepts either a city or coordinates
/// through [`WeatherRequest::location`].
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn current_weather(&self, request: &WeatherRequest) -> Result<WeatherSnapshot, WeatherError>;

    async fn forecast(&self, request: &WeatherRequest) -> Result<Forecast, WeatherError>;

    async fn air_quality(&self, request: &WeatherRequest) -> Result<AirQuality, WeatherError>;

    async fn alerts(&self, request: &WeatherRequest) -> Result<Vec<Alert>, WeatherError>;
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let provider: Arc<dyn WeatherProvider> = match id {
        ProviderId::Mock => Arc::new(MockProvider::new()),
        ProviderId::OpenWeather => {
            let cfg = configured(id, config)?;
            let mut p = OpenWeatherProvider::new(cfg.api_key.clone());
            if let Some(url) = &cfg.base_url {
                p = p.with_base_url(url.clone());
            }
            Arc::new(p)
        }
        ProviderId::WeatherApi => {
            let cfg = configured(id, config)?;
            let mut p = WeatherApiProvider::new(cfg.api_key.clone());
            if let Some(url) = &cfg.base_url {
                p = p.with_base_url(url.clone());
            }
            Arc::new(p)
        }
    };

    Ok(provider)
}

fn configured(id: ProviderId, config: &Config) -> anyhow::Result<&ProviderConfig> {
    config.provider_config(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `weather configure {id}` and enter your API key."
        )
    })
}

/// Construct the default provider from config, using `default_provider` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}

/// Send a request and read the body. Only a missing response becomes `Network`.
pub(crate) async fn fetch_text(
    request: RequestBuilder,
    operation: &str,
) -> Result<(StatusCode, String), WeatherError> {
    let res = request
        .send()
        .await
        .map_err(|e| WeatherError::Network(format!("{operation}: {e}")))?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| WeatherError::Network(format!("{operation}: failed to read body: {e}")))?;

    Ok((status, body))
}

/// Map a non-success status to a domain error.
pub(crate) fn error_for_status(status: StatusCode, body: &str, location: &LocationQuery) -> WeatherError {
    match status {
        StatusCode::NOT_FOUND => WeatherError::NotFound(location.to_string()),
        StatusCode::UNAUTHORIZED => WeatherError::InvalidCredentials,
        StatusCode::TOO_MANY_REQUESTS => WeatherError::RateLimited,
        other => WeatherError::Unknown { status: other.as_u16(), body: truncate_body(body) },
    }
}

pub(crate) fn parse_json<T: DeserializeOwned>(body: &str, operation: &str) -> Result<T, WeatherError> {
    serde_json::from_str(body).map_err(|e| WeatherError::Parse(format!("{operation}: {e}")))
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
