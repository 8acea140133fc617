use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{ArgAction, Parser, Subcommand};
use inquire::{Confirm, Password, PasswordDisplayMode};
use tracing::info;
use weather_core::{
    Config, Dashboard, FailurePolicy, Geolocator, ProviderId, Theme, ThemePreference,
    geolocation::{CachingGeolocator, FixedGeolocator, IpGeolocator, UnsupportedGeolocator},
    provider::provider_from_config,
    theme::FilePreferenceStore,
    validation::{validate_coordinates, validate_language_code, validate_user_group},
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather dashboard in your terminal")]
pub struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name: "openweather", "weatherapi" or "mock".
        provider: String,
    },

    /// Show current weather, forecast, air quality and alerts.
    Show {
        /// City name. Omit together with --here or --lat/--lon.
        city: Option<String>,

        /// Use the configured or IP-derived location.
        #[arg(long, conflicts_with_all = ["city", "lat"])]
        here: bool,

        /// Latitude in degrees (-90..90).
        #[arg(long, requires = "lon", conflicts_with = "city", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude in degrees (-180..180).
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Provider to use instead of the configured default.
        #[arg(long)]
        provider: Option<String>,

        /// Tailor precautions to a user group, e.g. "elderly" or "outdoor-workers".
        #[arg(long)]
        group: Option<String>,

        /// Language code for condition descriptions, e.g. "hi" or "fr".
        #[arg(long)]
        lang: Option<String>,

        /// Show whatever succeeded even if some requests fail.
        #[arg(long)]
        partial: bool,

        /// Print the view state as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show or set the display theme (light, dark, high-contrast).
    Theme {
        value: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show { city, here, lat, lon, provider, group, lang, partial, json } => {
                let target = match (city, here, lat.zip(lon)) {
                    (Some(city), _, _) => Target::City(city),
                    (None, true, _) => Target::Here,
                    (None, false, Some((lat, lon))) => Target::Coordinates(lat, lon),
                    (None, false, None) => {
                        bail!("Nothing to show. Pass a city name, --here, or --lat/--lon.")
                    }
                };
                let opts = ShowOptions { provider, group, lang, partial, json };
                show(target, opts).await
            }
            Command::Theme { value } => theme(value.as_deref()),
        }
    }
}

enum Target {
    City(String),
    Here,
    Coordinates(f64, f64),
}

struct ShowOptions {
    provider: Option<String>,
    group: Option<String>,
    lang: Option<String>,
    partial: bool,
    json: bool,
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    if id.requires_api_key() {
        let api_key = Password::new(&format!("API key for {id}:"))
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()
            .context("Failed to read API key")?;

        if api_key.trim().is_empty() {
            bail!("API key must not be empty");
        }
        config.upsert_provider_api_key(id, api_key.trim().to_string());
    }

    let current_default = config.default_provider.clone();
    if current_default.as_deref() != Some(id.as_str()) {
        let make_default = Confirm::new(&format!("Use {id} as the default provider?"))
            .with_default(current_default.is_none())
            .prompt()
            .context("Failed to read answer")?;
        if make_default {
            config.set_default_provider(id);
        }
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn geolocator_from_config(config: &Config) -> anyhow::Result<Arc<dyn Geolocator>> {
    let loc = &config.location;
    let geolocator: Arc<dyn Geolocator> = match (loc.latitude, loc.longitude) {
        (Some(lat), Some(lon)) => {
            let position = validate_coordinates(lat, lon)
                .context("Configured [location] coordinates are invalid")?;
            Arc::new(FixedGeolocator::new(position))
        }
        _ if loc.use_ip_lookup => {
            let ip = match &loc.ip_lookup_url {
                Some(url) => IpGeolocator::with_url(url.clone()),
                None => IpGeolocator::new(),
            };
            Arc::new(CachingGeolocator::new(ip))
        }
        _ => Arc::new(UnsupportedGeolocator),
    };
    Ok(geolocator)
}

async fn show(target: Target, opts: ShowOptions) -> anyhow::Result<()> {
    let config = Config::load()?;

    let provider_id = match &opts.provider {
        Some(name) => ProviderId::try_from(name.as_str())?,
        None => config.default_provider_id()?,
    };
    let provider = provider_from_config(provider_id, &config)?;

    let mut settings = config.dashboard_settings();
    if let Some(group) = &opts.group {
        settings.user_group = validate_user_group(group)?;
    }
    if let Some(lang) = &opts.lang {
        settings.language = validate_language_code(lang)?;
    }
    if opts.partial {
        settings.failure_policy = FailurePolicy::PartialDegradation;
    }

    let dashboard = Dashboard::new(provider, geolocator_from_config(&config)?, settings);
    info!(provider = %provider_id, "running search");

    let state = match target {
        Target::City(city) => dashboard.search_city(&city).await,
        Target::Here => dashboard.search_location().await,
        Target::Coordinates(lat, lon) => dashboard.search_coordinates(lat, lon).await,
    };

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        let theme = ThemePreference::new(FilePreferenceStore::in_config_dir()?).load_or_default();
        print!("{}", render::render(&state, &dashboard.advice(), settings, theme));
    }

    match state.error {
        Some(err) => bail!("{err}"),
        None => Ok(()),
    }
}

fn theme(value: Option<&str>) -> anyhow::Result<()> {
    let pref = ThemePreference::new(FilePreferenceStore::in_config_dir()?);

    match value {
        None => println!("{}", pref.load_or_default()),
        Some(raw) => {
            let theme: Theme = raw.parse()?;
            pref.save(theme)?;
            println!("Theme set to {theme}");
        }
    }
    Ok(())
}
