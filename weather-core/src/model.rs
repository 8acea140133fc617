use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::Language;

/// Upper bound on the number of daily forecast entries kept after normalization.
pub const MAX_FORECAST_DAYS: usize = 5;

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// What the user asked for: exactly one of a city name or a coordinate pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationQuery {
    City(String),
    Coordinates(Coordinates),
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationQuery::City(name) => f.write_str(name),
            LocationQuery::Coordinates(c) => c.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn speed_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "m/s",
            Units::Imperial => "mph",
        }
    }
}

/// Everything a provider needs to answer one of the four operations.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRequest {
    pub location: LocationQuery,
    pub language: Language,
    pub units: Units,
}

impl WeatherRequest {
    pub fn new(location: LocationQuery) -> Self {
        Self { location, language: Language::default(), units: Units::default() }
    }
}

/// Current conditions. Replaced wholesale on every successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location_name: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity_pct: u8,
    /// m/s for metric, mph for imperial.
    pub wind_speed: f64,
    pub pressure_hpa: f64,
    pub condition: String,
    pub icon: String,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub condition: String,
    pub icon: String,
    pub rain_probability_pct: u8,
}

/// Daily entries in chronological order, at most [`MAX_FORECAST_DAYS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub location_name: String,
    pub entries: Vec<ForecastEntry>,
}

/// Air Quality Index category, 1 (good) to 5 (very poor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Aqi(u8);

impl Aqi {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    /// Clamps out-of-range provider values into the 1..=5 scale.
    pub fn saturating(value: u8) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn label(&self) -> &'static str {
        match self.0 {
            1 => "Good",
            2 => "Fair",
            3 => "Moderate",
            4 => "Poor",
            _ => "Very Poor",
        }
    }
}

impl TryFrom<u8> for Aqi {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Aqi::new(value).ok_or_else(|| format!("AQI {value} is outside 1..=5"))
    }
}

impl From<Aqi> for u8 {
    fn from(aqi: Aqi) -> u8 {
        aqi.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQuality {
    pub aqi: Aqi,
    /// Pollutant name → concentration in μg/m³. May be partial or empty.
    pub components: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Minor,
    Moderate,
    Severe,
    Extreme,
}

impl AlertSeverity {
    /// Best-effort parse of the free-text severities providers emit.
    pub fn from_text(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains("extreme") {
            Some(AlertSeverity::Extreme)
        } else if lower.contains("severe") {
            Some(AlertSeverity::Severe)
        } else if lower.contains("moderate") {
            Some(AlertSeverity::Moderate)
        } else if lower.contains("minor") {
            Some(AlertSeverity::Minor)
        } else {
            None
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AlertSeverity::Minor => "minor",
            AlertSeverity::Moderate => "moderate",
            AlertSeverity::Severe => "severe",
            AlertSeverity::Extreme => "extreme",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub event: String,
    pub description: String,
    pub severity: AlertSeverity,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Alert {
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && at <= self.ends_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn aqi_rejects_out_of_range_values() {
        assert!(Aqi::new(0).is_none());
        assert!(Aqi::new(6).is_none());
        assert_eq!(Aqi::new(3).map(|a| a.label()), Some("Moderate"));
        assert_eq!(Aqi::saturating(6).value(), 5);
    }

    #[test]
    fn alert_severity_is_ordered() {
        assert!(AlertSeverity::Minor < AlertSeverity::Moderate);
        assert!(AlertSeverity::Severe < AlertSeverity::Extreme);
        assert_eq!(AlertSeverity::from_text("Severe thunderstorm"), Some(AlertSeverity::Severe));
        assert_eq!(AlertSeverity::from_text("unspecified"), None);
    }

    #[test]
    fn alert_activity_window_is_inclusive() {
        let start = Utc.with_ymd_and_hms(2024, 7, 1, 6, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 7, 1, 18, 0, 0).unwrap();
        let alert = Alert {
            event: "Heat".into(),
            description: String::new(),
            severity: AlertSeverity::Moderate,
            starts_at: start,
            ends_at: end,
            tags: vec![],
            recommendations: vec![],
        };
        assert!(alert.is_active_at(start));
        assert!(alert.is_active_at(end));
        assert!(!alert.is_active_at(end + chrono::Duration::seconds(1)));
    }

    #[test]
    fn location_query_display() {
        let city = LocationQuery::City("Mumbai".into());
        let coords = LocationQuery::Coordinates(Coordinates { lat: 19.076, lon: 72.8777 });
        assert_eq!(city.to_string(), "Mumbai");
        assert_eq!(coords.to_string(), "19.0760, 72.8777");
    }
}
