//! Precaution advice derived from the current conditions and the user's group.

use serde::Serialize;

use crate::{model::WeatherSnapshot, validation::UserGroup};

/// Temperature at or below which otherwise-unclassified weather counts as cold.
const COLD_THRESHOLD_C: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCategory {
    Rain,
    Sunny,
    Cold,
    Snow,
    Storm,
    Fog,
}

impl WeatherCategory {
    /// Coarse category from condition text and icon key. Checks run in a fixed
    /// order, so "thunderstorm with rain" is a storm and "overcast clouds" is
    /// treated as rain risk.
    pub fn from_condition(condition: &str, icon: &str, temperature_c: Option<f64>) -> Option<Self> {
        let text = condition.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));
        let icon_is = |prefixes: &[&str]| prefixes.iter().any(|p| icon.starts_with(p));

        if has(&["thunder", "storm"]) || icon_is(&["11"]) {
            Some(WeatherCategory::Storm)
        } else if has(&["snow", "sleet", "blizzard"]) || icon_is(&["13"]) {
            Some(WeatherCategory::Snow)
        } else if has(&["rain", "drizzle", "shower", "cloud", "overcast"])
            || icon_is(&["02", "03", "04", "09", "10"])
        {
            Some(WeatherCategory::Rain)
        } else if has(&["mist", "fog", "haze", "smoke"]) || icon_is(&["50"]) {
            Some(WeatherCategory::Fog)
        } else if has(&["freez", "cold", "frost"])
            || temperature_c.is_some_and(|t| t <= COLD_THRESHOLD_C)
        {
            Some(WeatherCategory::Cold)
        } else if has(&["clear", "sun"]) || icon_is(&["01"]) {
            Some(WeatherCategory::Sunny)
        } else {
            None
        }
    }
}

pub fn precautions(category: WeatherCategory, group: UserGroup) -> &'static [&'static str] {
    use UserGroup as G;
    use WeatherCategory as C;

    match (category, group) {
        (C::Rain, G::General) => &["Carry an umbrella or raincoat.", "Drive slowly on wet roads."],
        (C::Rain, G::Children) => &["Keep children away from puddles and open drains.", "Pack a change of dry clothes."],
        (C::Rain, G::Elderly) => &["Wear shoes with good grip to avoid slipping.", "Avoid going out during heavy showers."],
        (C::Rain, G::Pregnant) => &["Avoid slippery surfaces and walk carefully.", "Drink only boiled or filtered water."],
        (C::Rain, G::Athletes) => &["Move training indoors if the track is waterlogged.", "Wear reflective gear in low light."],
        (C::Rain, G::OutdoorWorkers) => &["Use waterproof gear and insulated tools.", "Stop electrical work outdoors during rain."],
        (C::Rain, G::Respiratory) => &["Watch for mould and damp indoors.", "Keep your inhaler dry and within reach."],

        (C::Sunny, G::General) => &["Apply sunscreen and wear sunglasses.", "Stay hydrated through the day."],
        (C::Sunny, G::Children) => &["Keep children in the shade around midday.", "Make sure they drink water regularly."],
        (C::Sunny, G::Elderly) => &["Avoid going out between 11am and 4pm.", "Watch for dizziness or signs of heat stress."],
        (C::Sunny, G::Pregnant) => &["Wear loose cotton clothing.", "Rest in a cool place and drink plenty of fluids."],
        (C::Sunny, G::Athletes) => &["Train early in the morning or in the evening.", "Replace electrolytes after long sessions."],
        (C::Sunny, G::OutdoorWorkers) => &["Take regular breaks in the shade.", "Wear a wide-brimmed hat and light clothing."],
        (C::Sunny, G::Respiratory) => &["Ozone can peak in the afternoon; limit exertion.", "Keep rescue medication with you."],

        (C::Cold, G::General) => &["Dress in layers and cover your head.", "Keep an eye out for icy patches."],
        (C::Cold, G::Children) => &["Use gloves, hats and scarves outdoors.", "Limit time playing outside."],
        (C::Cold, G::Elderly) => &["Keep living spaces warm.", "Check on neighbours who live alone."],
        (C::Cold, G::Pregnant) => &["Wear warm, non-slip footwear.", "Eat warm meals and stay active indoors."],
        (C::Cold, G::Athletes) => &["Warm up longer before training.", "Protect extremities from frostbite."],
        (C::Cold, G::OutdoorWorkers) => &["Take warm-up breaks in heated areas.", "Wear insulated, waterproof gloves."],
        (C::Cold, G::Respiratory) => &["Cover your nose and mouth with a scarf.", "Cold air can trigger attacks; keep inhalers handy."],

        (C::Snow, G::General) => &["Travel only if necessary.", "Clear snow from walkways and vents."],
        (C::Snow, G::Children) => &["Dress children in waterproof layers.", "Supervise sledding and snow play."],
        (C::Snow, G::Elderly) => &["Avoid shovelling heavy snow.", "Stock up on food and medication."],
        (C::Snow, G::Pregnant) => &["Avoid icy paths and ask for help with errands.", "Keep emergency contacts nearby."],
        (C::Snow, G::Athletes) => &["Switch to indoor training.", "Wear traction devices if running outdoors."],
        (C::Snow, G::OutdoorWorkers) => &["Use traction aids on footwear.", "Rotate tasks to limit cold exposure."],
        (C::Snow, G::Respiratory) => &["Stay indoors during heavy snowfall.", "Breathe through a scarf when outside."],

        (C::Storm, G::General) => &["Stay indoors and away from windows.", "Unplug sensitive electronics."],
        (C::Storm, G::Children) => &["Keep children indoors until the storm passes.", "Prepare a torch in case of power cuts."],
        (C::Storm, G::Elderly) => &["Keep medicines and a phone charged and close.", "Have an emergency kit ready."],
        (C::Storm, G::Pregnant) => &["Stay indoors and keep your phone charged.", "Know the route to the nearest hospital."],
        (C::Storm, G::Athletes) => &["Cancel outdoor sessions until 30 minutes after the last thunder.", "Avoid open fields and water."],
        (C::Storm, G::OutdoorWorkers) => &["Stop work at heights and on metal structures.", "Shelter in a building, not under trees."],
        (C::Storm, G::Respiratory) => &["Thunderstorms can stir up pollen; stay indoors.", "Keep windows closed."],

        (C::Fog, G::General) => &["Use low-beam headlights when driving.", "Allow extra travel time."],
        (C::Fog, G::Children) => &["Dress children in bright clothing for visibility.", "Walk them to school if possible."],
        (C::Fog, G::Elderly) => &["Postpone non-essential trips.", "Carry a torch when walking."],
        (C::Fog, G::Pregnant) => &["Avoid driving in dense fog.", "Wear a mask if there is smoke or haze."],
        (C::Fog, G::Athletes) => &["Run on familiar, traffic-free routes.", "Wear reflective clothing."],
        (C::Fog, G::OutdoorWorkers) => &["Use high-visibility vests.", "Pause operating heavy machinery in poor visibility."],
        (C::Fog, G::Respiratory) => &["Haze carries pollutants; limit time outside.", "Wear an N95 mask outdoors."],
    }
}

/// Precautions for the current conditions. Empty when the condition is not recognized.
pub fn advice_for(snapshot: &WeatherSnapshot, group: UserGroup, temperature_c: Option<f64>) -> Vec<&'static str> {
    WeatherCategory::from_condition(&snapshot.condition, &snapshot.icon, temperature_c)
        .map(|category| precautions(category, group).to_vec())
        .unwrap_or_default()
}

/// Generic safety steps for an alert, chosen by keywords in the event name.
pub fn alert_recommendations(event: &str) -> Vec<String> {
    let event = event.to_lowercase();
    let tips: &[&str] = if event.contains("flood") {
        &["Move to higher ground.", "Do not walk or drive through flood water."]
    } else if event.contains("heat") {
        &["Stay hydrated and avoid strenuous activity.", "Check on vulnerable neighbours."]
    } else if event.contains("thunder") || event.contains("storm") || event.contains("wind") {
        &["Secure loose outdoor objects.", "Stay indoors away from windows."]
    } else if event.contains("snow") || event.contains("ice") || event.contains("winter") {
        &["Avoid unnecessary travel.", "Keep emergency supplies at home."]
    } else if event.contains("fog") {
        &["Drive slowly with low-beam headlights."]
    } else if event.contains("air") || event.contains("smoke") || event.contains("dust") {
        &["Limit outdoor activity.", "Keep windows closed."]
    } else {
        &["Follow instructions from local authorities."]
    };
    tips.iter().map(|t| t.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(condition: &str, icon: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            location_name: "Test".into(),
            temperature: 20.0,
            feels_like: 20.0,
            humidity_pct: 50,
            wind_speed: 1.0,
            pressure_hpa: 1013.0,
            condition: condition.into(),
            icon: icon.into(),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn ordered_checks_pick_the_first_match() {
        use WeatherCategory::*;
        assert_eq!(WeatherCategory::from_condition("thunderstorm with rain", "", None), Some(Storm));
        assert_eq!(WeatherCategory::from_condition("light snow showers", "", None), Some(Snow));
        assert_eq!(WeatherCategory::from_condition("broken clouds", "", None), Some(Rain));
        assert_eq!(WeatherCategory::from_condition("haze", "", None), Some(Fog));
        assert_eq!(WeatherCategory::from_condition("clear sky", "", Some(-2.0)), Some(Cold));
        assert_eq!(WeatherCategory::from_condition("clear sky", "", Some(25.0)), Some(Sunny));
        assert_eq!(WeatherCategory::from_condition("", "13n", None), Some(Snow));
    }

    #[test]
    fn every_pair_has_advice() {
        use WeatherCategory::*;
        for category in [Rain, Sunny, Cold, Snow, Storm, Fog] {
            for group in UserGroup::all() {
                assert!(!precautions(category, *group).is_empty(), "{category:?}/{group}");
            }
        }
    }

    #[test]
    fn unmapped_condition_yields_no_advice() {
        let advice = advice_for(&snapshot("volcanic ash", "99x"), UserGroup::General, Some(20.0));
        assert!(advice.is_empty());
    }

    #[test]
    fn advice_depends_on_group() {
        let snap = snapshot("light rain", "10d");
        let general = advice_for(&snap, UserGroup::General, None);
        let workers = advice_for(&snap, UserGroup::OutdoorWorkers, None);
        assert_eq!(general, precautions(WeatherCategory::Rain, UserGroup::General));
        assert_ne!(general, workers);
    }

    #[test]
    fn alert_recommendations_fall_back_to_authorities() {
        assert_eq!(alert_recommendations("Flash Flood Warning")[0], "Move to higher ground.");
        assert_eq!(
            alert_recommendations("Tsunami"),
            vec!["Follow instructions from local authorities."]
        );
    }
}
