//! OpenWeather client behaviour against a mock HTTP server.

use std::sync::Arc;

use weather_core::{
    AlertSeverity, Coordinates, Dashboard, DashboardSettings, Language, LocationQuery, Units,
    WeatherError, WeatherProvider, WeatherRequest, geolocation::UnsupportedGeolocator,
    provider::openweather::OpenWeatherProvider,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

fn provider(server: &MockServer) -> OpenWeatherProvider {
    OpenWeatherProvider::new("test-key".to_string()).with_base_url(server.uri())
}

fn city(name: &str) -> WeatherRequest {
    WeatherRequest::new(LocationQuery::City(name.to_string()))
}

fn current_body() -> serde_json::Value {
    serde_json::json!({
        "coord": { "lon": -0.1257, "lat": 51.5085 },
        "weather": [{ "id": 500, "main": "Rain", "description": "light rain", "icon": "10d" }],
        "main": { "temp": 12.3, "feels_like": 11.1, "pressure": 1008, "humidity": 81 },
        "wind": { "speed": 4.6 },
        "dt": 1_718_000_000,
        "sys": { "country": "GB" },
        "name": "London"
    })
}

async fn mount_geocode(server: &MockServer, city: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("q", city))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ============================================================================
// Success scenarios
// ============================================================================

#[tokio::test]
async fn current_weather_by_city_is_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "London"))
        .and(query_param("appid", "test-key"))
        .and(query_param("units", "metric"))
        .and(query_param("lang", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = provider(&server).current_weather(&city("London")).await.unwrap();

    assert_eq!(snapshot.location_name, "London, GB");
    assert_eq!(snapshot.temperature, 12.3);
    assert_eq!(snapshot.feels_like, 11.1);
    assert_eq!(snapshot.humidity_pct, 81);
    assert_eq!(snapshot.wind_speed, 4.6);
    assert_eq!(snapshot.pressure_hpa, 1008.0);
    assert_eq!(snapshot.condition, "light rain");
    assert_eq!(snapshot.icon, "10d");
    assert_eq!(snapshot.observed_at.timestamp(), 1_718_000_000);
}

#[tokio::test]
async fn current_weather_by_coordinates_sends_lat_lon() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("lat", "51.5"))
        .and(query_param("lon", "-0.12"))
        .and(query_param("units", "imperial"))
        .and(query_param("lang", "fr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
        .expect(1)
        .mount(&server)
        .await;

    let request = WeatherRequest {
        location: LocationQuery::Coordinates(Coordinates { lat: 51.5, lon: -0.12 }),
        language: Language::Fr,
        units: Units::Imperial,
    };
    let snapshot = provider(&server).current_weather(&request).await.unwrap();
    assert_eq!(snapshot.location_name, "London, GB");
}

#[tokio::test]
async fn forecast_is_reduced_to_daily_entries() {
    let server = MockServer::start().await;
    // 2024-01-01T00:00:00Z, 3-hourly for three days
    let base = 1_704_067_200_i64;
    let list: Vec<_> = (0..24)
        .map(|i| {
            serde_json::json!({
                "dt": base + i * 3 * 3600,
                "main": { "temp": i as f64, "feels_like": i as f64, "humidity": 70, "pressure": 1012 },
                "weather": [{ "description": "few clouds", "icon": "02d" }],
                "pop": 0.4
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "city": { "name": "London", "country": "GB" },
            "list": list
        })))
        .mount(&server)
        .await;

    let forecast = provider(&server).forecast(&city("London")).await.unwrap();

    assert_eq!(forecast.location_name, "London, GB");
    assert_eq!(forecast.entries.len(), 3);
    let temps: Vec<f64> = forecast.entries.iter().map(|e| e.temperature).collect();
    assert_eq!(temps, vec![4.0, 12.0, 20.0]);
    assert!(forecast.entries.iter().all(|e| e.rain_probability_pct == 40));
}

#[tokio::test]
async fn air_quality_for_city_geocodes_first() {
    let server = MockServer::start().await;
    mount_geocode(&server, "London", serde_json::json!([{ "name": "London", "lat": 51.5085, "lon": -0.1257 }]))
        .await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/air_pollution"))
        .and(query_param("lat", "51.5085"))
        .and(query_param("lon", "-0.1257"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "list": [{
                "main": { "aqi": 2 },
                "components": { "co": 201.94, "no2": 0.77, "pm2_5": 0.5, "nh3": null }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let air = provider(&server).air_quality(&city("London")).await.unwrap();

    assert_eq!(air.aqi.value(), 2);
    assert_eq!(air.aqi.label(), "Fair");
    assert_eq!(air.components.len(), 3);
    assert_eq!(air.components.get("co"), Some(&201.94));
    assert!(!air.components.contains_key("nh3"));
}

#[tokio::test]
async fn unknown_city_in_geocoding_is_not_found() {
    let server = MockServer::start().await;
    mount_geocode(&server, "Atlantis", serde_json::json!([])).await;

    let err = provider(&server).alerts(&city("Atlantis")).await.unwrap_err();
    assert_eq!(err, WeatherError::NotFound("Atlantis".into()));
}

#[tokio::test]
async fn alerts_are_converted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/3.0/onecall"))
        .and(query_param("lat", "19.07"))
        .and(query_param("lon", "72.87"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "lat": 19.07,
            "lon": 72.87,
            "alerts": [{
                "sender_name": "IMD",
                "event": "Heavy Rain Warning",
                "start": 1_718_000_000,
                "end": 1_718_043_200,
                "description": "Heavy to very heavy rainfall likely.\n",
                "tags": ["Rain", "Flood"]
            }]
        })))
        .mount(&server)
        .await;

    let request = WeatherRequest::new(LocationQuery::Coordinates(Coordinates { lat: 19.07, lon: 72.87 }));
    let alerts = provider(&server).alerts(&request).await.unwrap();

    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.event, "Heavy Rain Warning");
    assert_eq!(alert.description, "Heavy to very heavy rainfall likely.");
    assert_eq!(alert.severity, AlertSeverity::Severe);
    assert_eq!(alert.tags, vec!["Rain", "Flood"]);
    assert!(!alert.recommendations.is_empty());
    assert!(alert.starts_at < alert.ends_at);
}

#[tokio::test]
async fn missing_alerts_field_means_no_alerts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/3.0/onecall"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "lat": 1.0, "lon": 2.0 })))
        .mount(&server)
        .await;

    let request = WeatherRequest::new(LocationQuery::Coordinates(Coordinates { lat: 1.0, lon: 2.0 }));
    let alerts = provider(&server).alerts(&request).await.unwrap();
    assert!(alerts.is_empty());
}

#[tokio::test]
async fn city_is_geocoded_once_for_air_quality_and_alerts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("q", "London"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{ "name": "London", "lat": 51.5085, "lon": -0.1257 }])),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_air_and_alerts(&server, 200).await;

    let provider = provider(&server);
    let request = city("London");
    let (air, alerts) = tokio::join!(provider.air_quality(&request), provider.alerts(&request));

    assert!(air.is_ok());
    assert!(alerts.is_ok());
}

async fn mount_air_and_alerts(server: &MockServer, onecall_status: u16) {
    Mock::given(method("GET"))
        .and(path("/data/2.5/air_pollution"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "list": [{ "main": { "aqi": 1 }, "components": { "co": 200.0 } }]
        })))
        .mount(server)
        .await;
    let onecall = if onecall_status == 200 {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "lat": 51.5, "lon": -0.12 }))
    } else {
        ResponseTemplate::new(onecall_status)
            .set_body_string(r#"{"cod":401,"message":"Please note that using One Call 3.0 requires a separate subscription"}"#)
    };
    Mock::given(method("GET"))
        .and(path("/data/3.0/onecall"))
        .respond_with(onecall)
        .mount(server)
        .await;
}

#[tokio::test]
async fn alerts_without_one_call_subscription_are_empty() {
    for status in [401, 403] {
        let server = MockServer::start().await;
        mount_air_and_alerts(&server, status).await;

        let request = WeatherRequest::new(LocationQuery::Coordinates(Coordinates { lat: 51.5, lon: -0.12 }));
        let alerts = provider(&server).alerts(&request).await.unwrap();
        assert!(alerts.is_empty(), "status {status}");
    }
}

#[tokio::test]
async fn dashboard_search_succeeds_when_alerts_are_not_subscribed() {
    let server = MockServer::start().await;
    mount_geocode(&server, "London", serde_json::json!([{ "name": "London", "lat": 51.5085, "lon": -0.1257 }]))
        .await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "city": { "name": "London", "country": "GB" },
            "list": []
        })))
        .mount(&server)
        .await;
    mount_air_and_alerts(&server, 401).await;

    let dashboard = Dashboard::new(
        Arc::new(provider(&server)),
        Arc::new(UnsupportedGeolocator),
        DashboardSettings::default(),
    );
    let state = dashboard.search_city("London").await;

    assert!(state.error.is_none(), "{:?}", state.error);
    assert_eq!(state.current.as_ref().unwrap().location_name, "London, GB");
    assert!(state.air_quality.is_some());
    assert_eq!(state.alerts, Some(vec![]));
}

// ============================================================================
// Error scenarios
// ============================================================================

async fn current_with_status(status: u16, body: &str) -> WeatherError {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&server)
        .await;

    provider(&server).current_weather(&city("London")).await.unwrap_err()
}

#[tokio::test]
async fn status_404_is_not_found() {
    let err = current_with_status(404, r#"{"cod":"404","message":"city not found"}"#).await;
    assert_eq!(err, WeatherError::NotFound("London".into()));
}

#[tokio::test]
async fn status_401_is_invalid_credentials() {
    let err = current_with_status(401, r#"{"cod":401,"message":"Invalid API key"}"#).await;
    assert_eq!(err, WeatherError::InvalidCredentials);
}

#[tokio::test]
async fn status_429_is_rate_limited() {
    let err = current_with_status(429, "").await;
    assert_eq!(err, WeatherError::RateLimited);
}

#[tokio::test]
async fn other_statuses_are_unknown() {
    let err = current_with_status(503, "maintenance").await;
    assert_eq!(err, WeatherError::Unknown { status: 503, body: "maintenance".into() });
}

#[tokio::test]
async fn malformed_json_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let err = provider(&server).current_weather(&city("London")).await.unwrap_err();
    assert!(matches!(err, WeatherError::Parse(_)));
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let provider = OpenWeatherProvider::new("k".into()).with_base_url(uri);
    let err = provider.current_weather(&city("London")).await.unwrap_err();
    assert!(matches!(err, WeatherError::Network(_)), "{err:?}");
}
