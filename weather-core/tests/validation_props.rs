//! Property tests for the input validators.

use proptest::prelude::*;
use weather_core::{
    ValidationError,
    validation::{MAX_CITY_NAME_LEN, validate_city_name, validate_coordinates},
};

proptest! {
    #[test]
    fn markup_characters_are_always_rejected(
        prefix in "[A-Za-z ]{0,20}",
        bad in prop::sample::select(vec!['<', '>', '"', '&']),
        suffix in "[A-Za-z ]{0,20}",
    ) {
        let input = format!("{prefix}{bad}{suffix}");
        prop_assert!(validate_city_name(&input).is_err());
    }

    #[test]
    fn names_longer_than_limit_are_rejected(name in "[A-Za-z]{51,80}") {
        prop_assert_eq!(
            validate_city_name(&name),
            Err(ValidationError::CityNameTooLong { max: MAX_CITY_NAME_LEN })
        );
    }

    #[test]
    fn valid_names_come_back_trimmed(
        core in "[A-Za-z][A-Za-z '-]{0,40}[A-Za-z]",
        lead in " {0,3}",
        trail in " {0,3}",
    ) {
        let input = format!("{lead}{core}{trail}");
        prop_assert!(input.chars().count() <= MAX_CITY_NAME_LEN);
        prop_assert_eq!(validate_city_name(&input), Ok(input.trim().to_string()));
    }

    #[test]
    fn out_of_range_latitude_is_rejected(
        lat in prop_oneof![-1000.0f64..-90.0001, 90.0001f64..1000.0],
        lon in -180.0f64..=180.0,
    ) {
        prop_assert_eq!(validate_coordinates(lat, lon), Err(ValidationError::InvalidCoordinates));
    }

    #[test]
    fn out_of_range_longitude_is_rejected(
        lat in -90.0f64..=90.0,
        lon in prop_oneof![-1000.0f64..-180.0001, 180.0001f64..1000.0],
    ) {
        prop_assert_eq!(validate_coordinates(lat, lon), Err(ValidationError::InvalidCoordinates));
    }

    #[test]
    fn in_range_coordinates_are_accepted(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
        let coords = validate_coordinates(lat, lon).unwrap();
        prop_assert_eq!((coords.lat, coords.lon), (lat, lon));
    }
}

#[test]
fn boundary_coordinates_are_accepted() {
    for (lat, lon) in [(-90.0, 0.0), (90.0, 0.0), (0.0, -180.0), (0.0, 180.0)] {
        assert!(validate_coordinates(lat, lon).is_ok(), "{lat}, {lon}");
    }
}
