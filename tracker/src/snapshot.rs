//! Feed snapshot model.
//!
//! Wire format: a JSON envelope whose top-level `data` object carries one
//! array of `{name, quantity}` entries per category, an optional
//! `weather.type` label, and an optional `weatherHistory` list. Unknown
//! fields are ignored; entries without a name are skipped.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Canonical weather label used when the feed omits or mangles the field.
pub const WEATHER_NORMAL: &str = "normal";

/// Shop categories the feed rotates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Seeds,
    Gear,
    Eggs,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Seeds, Category::Gear, Category::Eggs];

    /// Key used on the wire and in the fingerprint.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Seeds => "seeds",
            Category::Gear => "gear",
            Category::Eggs => "eggs",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Seeds => "Seeds",
            Category::Gear => "Gear",
            Category::Eggs => "Eggs",
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct StockItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: u64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct WeatherEvent {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, rename = "startTime")]
    pub start_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawData {
    #[serde(default)]
    seeds: Vec<StockItem>,
    #[serde(default)]
    gear: Vec<StockItem>,
    #[serde(default)]
    eggs: Vec<StockItem>,
    #[serde(default)]
    weather: Option<RawWeather>,
    #[serde(default, rename = "weatherHistory")]
    weather_history: Vec<WeatherEvent>,
}

#[derive(Debug, Default, Deserialize)]
struct RawWeather {
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// One decoded shop snapshot. Wire order of items is preserved per category;
/// duplicate names are kept as-is and only merged by [`StockSnapshot::totals`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StockSnapshot {
    items: BTreeMap<Category, Vec<StockItem>>,
    pub weather: String,
    pub weather_history: Vec<WeatherEvent>,
}

/// Decode a raw feed payload.
///
/// `Ok(None)` means the payload was well-formed but carried no `data` object
/// (startup noise the caller should skip); `Err` means it could not be
/// decoded at all.
pub fn parse_snapshot(raw: &str) -> Result<Option<StockSnapshot>, serde_json::Error> {
    let envelope: RawEnvelope = serde_json::from_str(raw)?;
    let data = match envelope.data {
        Some(serde_json::Value::Object(map)) if !map.is_empty() => {
            serde_json::Value::Object(map)
        }
        _ => return Ok(None),
    };
    let raw: RawData = serde_json::from_value(data)?;
    Ok(Some(StockSnapshot::from_raw(raw)))
}

impl StockSnapshot {
    fn from_raw(raw: RawData) -> Self {
        let mut items = BTreeMap::new();
        for (category, entries) in [
            (Category::Seeds, raw.seeds),
            (Category::Gear, raw.gear),
            (Category::Eggs, raw.eggs),
        ] {
            let entries: Vec<StockItem> =
                entries.into_iter().filter(|i| !i.name.is_empty()).collect();
            if !entries.is_empty() {
                items.insert(category, entries);
            }
        }
        let weather = raw
            .weather
            .and_then(|w| w.kind)
            .filter(|kind| !kind.is_empty())
            .unwrap_or_else(|| WEATHER_NORMAL.to_string());
        Self {
            items,
            weather,
            weather_history: raw.weather_history,
        }
    }

    pub fn items(&self, category: Category) -> &[StockItem] {
        self.items.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total quantity per distinct item name; duplicate entries are summed,
    /// never overwritten.
    pub fn totals(&self, category: Category) -> BTreeMap<String, u64> {
        let mut totals = BTreeMap::new();
        for item in self.items(category) {
            *totals.entry(item.name.clone()).or_insert(0) += item.quantity;
        }
        totals
    }

    /// Lower-cased distinct item names per category.
    pub fn name_sets(&self) -> BTreeMap<Category, BTreeSet<String>> {
        let mut sets = BTreeMap::new();
        for category in Category::ALL {
            let names: BTreeSet<String> = self
                .items(category)
                .iter()
                .map(|i| i.name.to_lowercase())
                .collect();
            if !names.is_empty() {
                sets.insert(category, names);
            }
        }
        sets
    }

    /// Deterministic digest of the weather label and the distinct item names
    /// per category. Quantities and ordering do not participate: a restock
    /// of the same items is not a change.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.weather.as_bytes());
        for (category, names) in self.name_sets() {
            hasher.update([0u8]);
            hasher.update(category.key().as_bytes());
            for name in names {
                hasher.update([0x1f]);
                hasher.update(name.as_bytes());
            }
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(data: &str) -> String {
        format!("{{\"data\":{data}}}")
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_snapshot("not json").is_err());
    }

    #[test]
    fn test_parse_skips_missing_or_empty_data() {
        assert_eq!(parse_snapshot("{}").unwrap(), None);
        assert_eq!(parse_snapshot(&payload("{}")).unwrap(), None);
        assert_eq!(parse_snapshot(&payload("null")).unwrap(), None);
    }

    #[test]
    fn test_parse_reads_categories_and_weather() {
        let raw = payload(
            r#"{"seeds":[{"name":"Cacao","quantity":2}],"weather":{"type":"Rain"},"extra":true}"#,
        );
        let snapshot = parse_snapshot(&raw).unwrap().unwrap();
        assert_eq!(snapshot.weather, "Rain");
        assert_eq!(snapshot.items(Category::Seeds).len(), 1);
        assert!(snapshot.items(Category::Gear).is_empty());
    }

    #[test]
    fn test_missing_weather_defaults_to_normal() {
        let raw = payload(r#"{"seeds":[{"name":"Cacao","quantity":2}]}"#);
        let snapshot = parse_snapshot(&raw).unwrap().unwrap();
        assert_eq!(snapshot.weather, WEATHER_NORMAL);
    }

    #[test]
    fn test_nameless_items_are_skipped() {
        let raw = payload(r#"{"gear":[{"quantity":3},{"name":"Lightning Rod","quantity":1}]}"#);
        let snapshot = parse_snapshot(&raw).unwrap().unwrap();
        let names: Vec<&str> = snapshot
            .items(Category::Gear)
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(names, vec!["Lightning Rod"]);
    }

    #[test]
    fn test_totals_sum_duplicate_entries() {
        let raw = payload(
            r#"{"seeds":[{"name":"Cacao","quantity":2},{"name":"Cacao","quantity":3},{"name":"Grape","quantity":1}]}"#,
        );
        let snapshot = parse_snapshot(&raw).unwrap().unwrap();
        let totals = snapshot.totals(Category::Seeds);
        assert_eq!(totals.get("Cacao"), Some(&5));
        assert_eq!(totals.get("Grape"), Some(&1));
    }

    #[test]
    fn test_fingerprint_ignores_quantity_and_order() {
        let a = parse_snapshot(&payload(
            r#"{"seeds":[{"name":"Cacao","quantity":2},{"name":"Grape","quantity":1}],"weather":{"type":"Rain"}}"#,
        ))
        .unwrap()
        .unwrap();
        let b = parse_snapshot(&payload(
            r#"{"seeds":[{"name":"Grape","quantity":9},{"name":"CACAO","quantity":1}],"weather":{"type":"Rain"}}"#,
        ))
        .unwrap()
        .unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_tracks_item_and_weather_changes() {
        let base = parse_snapshot(&payload(
            r#"{"seeds":[{"name":"Cacao","quantity":2}],"weather":{"type":"Rain"}}"#,
        ))
        .unwrap()
        .unwrap();
        let new_item = parse_snapshot(&payload(
            r#"{"seeds":[{"name":"Cacao","quantity":2},{"name":"Beanstalk","quantity":1}],"weather":{"type":"Rain"}}"#,
        ))
        .unwrap()
        .unwrap();
        let new_weather = parse_snapshot(&payload(
            r#"{"seeds":[{"name":"Cacao","quantity":2}],"weather":{"type":"Thunderstorm"}}"#,
        ))
        .unwrap()
        .unwrap();
        assert_ne!(base.fingerprint(), new_item.fingerprint());
        assert_ne!(base.fingerprint(), new_weather.fingerprint());
    }

    #[test]
    fn test_fingerprint_distinguishes_categories() {
        let seeds = parse_snapshot(&payload(r#"{"seeds":[{"name":"Cacao"}]}"#))
            .unwrap()
            .unwrap();
        let gear = parse_snapshot(&payload(r#"{"gear":[{"name":"Cacao"}]}"#))
            .unwrap()
            .unwrap();
        assert_ne!(seeds.fingerprint(), gear.fingerprint());
    }
}
