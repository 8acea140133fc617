//! Sources for "where am I", each reporting failures as [`GeolocationError`].

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    error::GeolocationError,
    model::Coordinates,
    rate_limit::{Clock, SystemClock},
};

const DEFAULT_IP_LOOKUP_URL: &str = "http://ip-api.com/json";

/// Options for a single position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeolocationOptions {
    /// How long the caller waits for a fix before giving up.
    pub timeout: Duration,
    /// A cached fix younger than this may be reused.
    pub maximum_age: Duration,
}

impl Default for GeolocationOptions {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(15), maximum_age: Duration::from_secs(5 * 60) }
    }
}

#[async_trait]
pub trait Geolocator: Send + Sync + std::fmt::Debug {
    async fn locate(&self, options: &GeolocationOptions) -> Result<Coordinates, GeolocationError>;
}

/// A position known ahead of time, e.g. from configuration.
#[derive(Debug, Clone, Copy)]
pub struct FixedGeolocator {
    position: Coordinates,
}

impl FixedGeolocator {
    pub fn new(position: Coordinates) -> Self {
        Self { position }
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn locate(&self, _options: &GeolocationOptions) -> Result<Coordinates, GeolocationError> {
        Ok(self.position)
    }
}

/// Used when no position source is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedGeolocator;

#[async_trait]
impl Geolocator for UnsupportedGeolocator {
    async fn locate(&self, _options: &GeolocationOptions) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

/// Approximate position from the public IP address (ip-api.com response shape).
#[derive(Debug, Clone)]
pub struct IpGeolocator {
    url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl IpGeolocator {
    pub fn new() -> Self {
        Self::with_url(DEFAULT_IP_LOOKUP_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into(), http: Client::new() }
    }
}

impl Default for IpGeolocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geolocator for IpGeolocator {
    async fn locate(&self, options: &GeolocationOptions) -> Result<Coordinates, GeolocationError> {
        debug!(url = %self.url, "looking up position by IP");

        let res = self
            .http
            .get(&self.url)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeolocationError::Timeout
                } else {
                    warn!(error = %e, "IP lookup failed");
                    GeolocationError::PositionUnavailable
                }
            })?;

        match res.status() {
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
                return Err(GeolocationError::PermissionDenied);
            }
            status if !status.is_success() => return Err(GeolocationError::PositionUnavailable),
            _ => {}
        }

        let body: IpLookupResponse =
            res.json().await.map_err(|_| GeolocationError::PositionUnavailable)?;

        if body.status != "success" {
            debug!(message = ?body.message, "IP lookup returned no position");
            return Err(GeolocationError::PositionUnavailable);
        }

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => Ok(Coordinates { lat, lon }),
            _ => Err(GeolocationError::PositionUnavailable),
        }
    }
}

/// Reuses the last successful fix while it is younger than `maximum_age`.
#[derive(Debug)]
pub struct CachingGeolocator<G> {
    inner: G,
    clock: Arc<dyn Clock>,
    last_fix: Mutex<Option<(std::time::Instant, Coordinates)>>,
}

impl<G: Geolocator> CachingGeolocator<G> {
    pub fn new(inner: G) -> Self {
        Self::with_clock(inner, Arc::new(SystemClock))
    }

    pub fn with_clock(inner: G, clock: Arc<dyn Clock>) -> Self {
        Self { inner, clock, last_fix: Mutex::new(None) }
    }
}

#[async_trait]
impl<G: Geolocator> Geolocator for CachingGeolocator<G> {
    async fn locate(&self, options: &GeolocationOptions) -> Result<Coordinates, GeolocationError> {
        let now = self.clock.now();
        let cached = *self.last_fix.lock();
        if let Some((at, position)) = cached {
            if now.duration_since(at) <= options.maximum_age {
                debug!("reusing cached position");
                return Ok(position);
            }
        }

        let position = self.inner.locate(options).await?;
        *self.last_fix.lock() = Some((self.clock.now(), position));
        Ok(position)
    }
}
