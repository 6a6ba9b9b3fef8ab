//! Rendered tracker content.
//!
//! Pure string builders; delivery and chart rendering are collaborators.
//! Formatting uses chat markdown the way the status channel expects it.

use crate::processor::StockUpdate;
use crate::snapshot::{Category, StockSnapshot};

pub fn category_emoji(category: Category) -> &'static str {
    match category {
        Category::Seeds => "🌱",
        Category::Gear => "🛠️",
        Category::Eggs => "🥚",
    }
}

pub fn weather_icon(weather: &str) -> &'static str {
    match weather {
        "normal" | "Sunny" => "☀️",
        "Rain" | "rain" => "🌧️",
        "Thunderstorm" | "thunder" => "⛈️",
        "Frost" => "❄️",
        "Snow" => "☃️",
        "Night" => "🌙",
        "Blood Moon" => "🩸",
        "Meteor Shower" => "☄️",
        "Heatwave" | "heatwave" => "🔥",
        "Windy" => "💨",
        "Tropical Rain" => "💦",
        "Drought" => "🏜️",
        "Aurora" => "✨",
        "Bee Swarm" | "Working Bee Swarm" => "🐝",
        "Disco" => "🕺",
        "Tornado" => "🌪️",
        "Sheckle Rain" => "💰",
        "Chocolate Rain" => "🍫",
        "Black Hole" => "⚫",
        "Volcano Event" => "🌋",
        "Meteor Strike" => "💥",
        "Alien Invasion" => "👽",
        "Solar Flare" => "☀️",
        _ => "❓",
    }
}

/// Full status message: current weather plus every stocked category with
/// summed quantities.
pub fn status_content(snapshot: &StockSnapshot) -> String {
    let mut out = String::from("**Shop Stock**\n");
    out.push_str(&format!(
        "Current weather: {} {}\n",
        weather_icon(&snapshot.weather),
        snapshot.weather
    ));
    for category in Category::ALL {
        let totals = snapshot.totals(category);
        if totals.is_empty() {
            continue;
        }
        out.push_str(&format!(
            "\n{} **{} stock**\n",
            category_emoji(category),
            category.label()
        ));
        for (name, quantity) in totals {
            out.push_str(&format!("**{name}** `x{quantity}`\n"));
        }
    }
    out
}

/// Supplementary alert body listing the newly-stocked notable items, or
/// `None` when there is nothing to shout about.
pub fn alert_content(update: &StockUpdate) -> Option<String> {
    if update.notable.is_empty() {
        return None;
    }
    let mut out = String::from("New stock just dropped!\n\n**Rare items in the shop:**");
    for (category, names) in &update.notable {
        out.push_str(&format!(
            "\n**{} {}**\n",
            category_emoji(*category),
            category.label()
        ));
        for name in names {
            out.push_str(&format!("• {name}\n"));
        }
    }
    Some(out)
}
