//! Input validation for everything a user can type or pick.
//!
//! All checks are pure and run before any request leaves the process.

use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{error::ValidationError, model::Coordinates};

pub const MAX_CITY_NAME_LEN: usize = 50;

static CITY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\s\-']+$").expect("city name regex is valid"));

static INJECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?ix)
        <\s*script
        | javascript\s*:
        | vbscript\s*:
        | data\s*:\s*text/html
        | \bon[a-z]+\s*=
    "#,
    )
    .expect("injection regex is valid")
});

/// Validate a free-text city name and return it trimmed.
pub fn validate_city_name(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyCityName);
    }

    if input.chars().count() > MAX_CITY_NAME_LEN {
        return Err(ValidationError::CityNameTooLong { max: MAX_CITY_NAME_LEN });
    }

    if INJECTION_RE.is_match(input) {
        return Err(ValidationError::UnsafeCityName);
    }

    if !CITY_NAME_RE.is_match(trimmed) {
        return Err(ValidationError::InvalidCityName);
    }

    Ok(trimmed.to_string())
}

/// Check that both values are finite and inside the WGS84 range (bounds inclusive).
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<Coordinates, ValidationError> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err(ValidationError::InvalidCoordinates);
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(ValidationError::InvalidCoordinates);
    }
    Ok(Coordinates { lat, lon })
}

pub fn validate_user_group(group: &str) -> Result<UserGroup, ValidationError> {
    group.parse()
}

pub fn validate_language_code(lang: &str) -> Result<Language, ValidationError> {
    lang.parse()
}

/// Audience the precaution advice is tailored to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserGroup {
    #[default]
    General,
    Children,
    Elderly,
    Pregnant,
    Athletes,
    OutdoorWorkers,
    Respiratory,
}

impl UserGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserGroup::General => "general",
            UserGroup::Children => "children",
            UserGroup::Elderly => "elderly",
            UserGroup::Pregnant => "pregnant",
            UserGroup::Athletes => "athletes",
            UserGroup::OutdoorWorkers => "outdoor-workers",
            UserGroup::Respiratory => "respiratory",
        }
    }

    pub const fn all() -> &'static [UserGroup] {
        &[
            UserGroup::General,
            UserGroup::Children,
            UserGroup::Elderly,
            UserGroup::Pregnant,
            UserGroup::Athletes,
            UserGroup::OutdoorWorkers,
            UserGroup::Respiratory,
        ]
    }
}

impl fmt::Display for UserGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserGroup {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        UserGroup::all()
            .iter()
            .copied()
            .find(|g| g.as_str() == wanted)
            .ok_or_else(|| ValidationError::InvalidUserGroup(s.to_string()))
    }
}

/// Languages the providers are asked to localize condition text into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
    Es,
    Fr,
    De,
    Zh,
    Ja,
    Ar,
    Pt,
    Ru,
    Bn,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hi => "hi",
            Language::Es => "es",
            Language::Fr => "fr",
            Language::De => "de",
            Language::Zh => "zh",
            Language::Ja => "ja",
            Language::Ar => "ar",
            Language::Pt => "pt",
            Language::Ru => "ru",
            Language::Bn => "bn",
        }
    }

    pub const fn all() -> &'static [Language] {
        &[
            Language::En,
            Language::Hi,
            Language::Es,
            Language::Fr,
            Language::De,
            Language::Zh,
            Language::Ja,
            Language::Ar,
            Language::Pt,
            Language::Ru,
            Language::Bn,
        ]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Language::all()
            .iter()
            .copied()
            .find(|l| l.code() == wanted)
            .ok_or_else(|| ValidationError::InvalidLanguage(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_city_names_and_trims() {
        assert_eq!(validate_city_name("  Mumbai ").unwrap(), "Mumbai");
        assert_eq!(validate_city_name("Saint-Étienne").unwrap_err(), ValidationError::InvalidCityName);
        assert_eq!(validate_city_name("O'Fallon").unwrap(), "O'Fallon");
        assert_eq!(validate_city_name("New York").unwrap(), "New York");
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert_eq!(validate_city_name("").unwrap_err(), ValidationError::EmptyCityName);
        assert_eq!(validate_city_name("   \t").unwrap_err(), ValidationError::EmptyCityName);
    }

    #[test]
    fn rejects_long_names() {
        let name = "a".repeat(51);
        assert_eq!(
            validate_city_name(&name).unwrap_err(),
            ValidationError::CityNameTooLong { max: 50 }
        );
        assert!(validate_city_name(&"a".repeat(50)).is_ok());
        // The limit applies to what was typed, padding included.
        assert!(validate_city_name(&format!(" {}", "a".repeat(50))).is_err());
    }

    #[test]
    fn rejects_injection_patterns() {
        for input in [
            "<script>alert(1)</script>",
            "javascript:alert",
            "JavaScript: void",
            "onload=steal",
            "data:text/html,hi",
            "vbscript:msgbox",
        ] {
            assert_eq!(
                validate_city_name(input).unwrap_err(),
                ValidationError::UnsafeCityName,
                "{input}"
            );
        }
    }

    #[test]
    fn rejects_digits_and_punctuation() {
        assert_eq!(validate_city_name("Area 51").unwrap_err(), ValidationError::InvalidCityName);
        assert_eq!(validate_city_name("Tom & Jerry").unwrap_err(), ValidationError::InvalidCityName);
    }

    #[test]
    fn coordinate_bounds_are_inclusive() {
        assert!(validate_coordinates(-90.0, -180.0).is_ok());
        assert!(validate_coordinates(90.0, 180.0).is_ok());
        assert!(validate_coordinates(90.01, 0.0).is_err());
        assert!(validate_coordinates(0.0, -180.5).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
        assert!(validate_coordinates(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn user_groups_and_languages_roundtrip() {
        assert_eq!(UserGroup::all().len(), 7);
        assert_eq!(Language::all().len(), 11);
        for group in UserGroup::all() {
            assert_eq!(validate_user_group(group.as_str()).unwrap(), *group);
        }
        for lang in Language::all() {
            assert_eq!(validate_language_code(lang.code()).unwrap(), *lang);
        }
    }

    #[test]
    fn unknown_group_and_language_are_rejected() {
        assert_eq!(
            validate_user_group("pilots").unwrap_err(),
            ValidationError::InvalidUserGroup("pilots".into())
        );
        assert_eq!(
            validate_language_code("EN").unwrap_err(),
            ValidationError::InvalidLanguage("EN".into())
        );
    }
}
