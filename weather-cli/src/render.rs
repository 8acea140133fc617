//! Plain-text rendering of a [`ViewState`].

use std::fmt::Write;

use weather_core::{DashboardSettings, Theme, ViewState};

struct Style {
    heading_upper: bool,
    bullet: &'static str,
    rule: &'static str,
}

impl Style {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::HighContrast => Style { heading_upper: true, bullet: "*", rule: "==========" },
            Theme::Dark => Style { heading_upper: false, bullet: "•", rule: "──────────" },
            Theme::Light => Style { heading_upper: false, bullet: "-", rule: "----------" },
        }
    }

    fn heading(&self, out: &mut String, title: &str) {
        let title = if self.heading_upper { title.to_uppercase() } else { title.to_string() };
        let _ = writeln!(out, "\n{title}\n{}", self.rule);
    }
}

pub fn render(state: &ViewState, advice: &[&str], settings: DashboardSettings, theme: Theme) -> String {
    let style = Style::for_theme(theme);
    let units = settings.units;
    let mut out = String::new();

    if let Some(current) = &state.current {
        let _ = writeln!(out, "{} ({})", current.location_name, current.condition);
        let _ = writeln!(
            out,
            "  Temperature  {:.1}{t} (feels like {:.1}{t})",
            current.temperature,
            current.feels_like,
            t = units.temperature_symbol()
        );
        let _ = writeln!(out, "  Humidity     {}%", current.humidity_pct);
        let _ = writeln!(out, "  Wind         {:.1} {}", current.wind_speed, units.speed_symbol());
        let _ = writeln!(out, "  Pressure     {:.0} hPa", current.pressure_hpa);
        let _ = writeln!(out, "  Observed     {}", current.observed_at.format("%Y-%m-%d %H:%M UTC"));
    }

    if let Some(forecast) = &state.forecast {
        style.heading(&mut out, "Forecast");
        for entry in &forecast.entries {
            let _ = writeln!(
                out,
                "  {}  {:>6.1}{}  {:<24} rain {:>3}%",
                entry.timestamp.format("%a %d %b"),
                entry.temperature,
                units.temperature_symbol(),
                entry.condition,
                entry.rain_probability_pct
            );
        }
    }

    if let Some(air) = &state.air_quality {
        style.heading(&mut out, "Air quality");
        let _ = writeln!(out, "  AQI {} ({})", air.aqi.value(), air.aqi.label());
        for (name, value) in &air.components {
            let _ = writeln!(out, "  {name:<6} {value:>8.2} μg/m³");
        }
    }

    if let Some(alerts) = &state.alerts {
        style.heading(&mut out, "Alerts");
        if alerts.is_empty() {
            let _ = writeln!(out, "  No active alerts");
        }
        for alert in alerts {
            let _ = writeln!(
                out,
                "  [{}] {} ({} to {})",
                alert.severity,
                alert.event,
                alert.starts_at.format("%d %b %H:%M"),
                alert.ends_at.format("%d %b %H:%M UTC")
            );
            if !alert.description.is_empty() {
                let _ = writeln!(out, "    {}", alert.description);
            }
            for tip in &alert.recommendations {
                let _ = writeln!(out, "    {} {tip}", style.bullet);
            }
        }
    }

    if !advice.is_empty() {
        style.heading(&mut out, &format!("Precautions ({})", settings.user_group));
        for tip in advice {
            let _ = writeln!(out, "  {} {tip}", style.bullet);
        }
    }

    out
}
