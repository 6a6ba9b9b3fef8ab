//! Snapshot change detection.
//!
//! The processor owns the dedupe state: the fingerprint of the last accepted
//! snapshot and its name-sets. The first snapshot only establishes a
//! baseline, so startup noise never triggers an update storm. Later snapshots
//! are dropped when the fingerprint is unchanged; a real change yields a
//! [`StockUpdate`] carrying the notable diff.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::snapshot::{parse_snapshot, Category, StockSnapshot};

/// Curated allow-list of items worth a supplementary alert, lower-cased.
#[derive(Clone, Debug)]
pub struct NotableList {
    names: BTreeMap<Category, BTreeSet<String>>,
}

impl NotableList {
    pub fn new(entries: impl IntoIterator<Item = (Category, Vec<&'static str>)>) -> Self {
        let names = entries
            .into_iter()
            .map(|(category, list)| {
                (
                    category,
                    list.into_iter().map(str::to_lowercase).collect(),
                )
            })
            .collect();
        Self { names }
    }

    /// Nothing is notable; alerts are effectively disabled.
    pub fn empty() -> Self {
        Self {
            names: BTreeMap::new(),
        }
    }

    pub fn contains(&self, category: Category, lower_name: &str) -> bool {
        self.names
            .get(&category)
            .is_some_and(|names| names.contains(lower_name))
    }
}

impl Default for NotableList {
    fn default() -> Self {
        Self::new([
            (
                Category::Seeds,
                vec![
                    "Beanstalk",
                    "Moon Blossom",
                    "Hive Fruit",
                    "Sugar Apple",
                    "Elephant Ears",
                    "Ember Lily",
                    "Cacao",
                    "Sunflower",
                    "Pepper",
                    "Grape",
                    "Mushroom",
                    "Traveler's Fruit",
                    "Rosy Delight",
                    "Dragon Pepper",
                    "Lotus",
                    "Firework Flower",
                    "Candy Blossom",
                ],
            ),
            (
                Category::Gear,
                vec![
                    "Advanced Sprinkler",
                    "Star Caller",
                    "Night Staff",
                    "Godly Sprinkler",
                    "Chocolate Sprinkler",
                    "Magnifying Glass",
                    "Master Sprinkler",
                    "Cleaning Spray",
                    "Favorite Tool",
                    "Harvest Tool",
                    "Friendship Pot",
                    "Honey Sprinkler",
                    "Lightning Rod",
                    "Recall Wrench",
                ],
            ),
            (
                Category::Eggs,
                vec![
                    "Legendary Egg",
                    "Mythical Egg",
                    "Paradise Egg",
                    "Bee Egg",
                    "Bug Egg",
                    "Night Egg",
                ],
            ),
        ])
    }
}

/// A change worth announcing.
#[derive(Clone, Debug)]
pub struct StockUpdate {
    pub snapshot: StockSnapshot,
    /// Allow-listed items that were not present in the previous snapshot,
    /// per category, in original casing.
    pub notable: BTreeMap<Category, Vec<String>>,
}

pub struct SnapshotProcessor {
    notable: NotableList,
    last_fingerprint: Option<String>,
    last_names: BTreeMap<Category, BTreeSet<String>>,
    latest: Option<StockSnapshot>,
}

impl SnapshotProcessor {
    pub fn new(notable: NotableList) -> Self {
        Self {
            notable,
            last_fingerprint: None,
            last_names: BTreeMap::new(),
            latest: None,
        }
    }

    /// The most recently decoded snapshot, changed or not.
    pub fn latest(&self) -> Option<&StockSnapshot> {
        self.latest.as_ref()
    }

    /// Feed one raw payload through the dedupe pipeline.
    ///
    /// Returns an update only for a genuine change. Malformed payloads are
    /// logged and dropped without touching any state.
    pub fn ingest(&mut self, raw: &str) -> Option<StockUpdate> {
        let snapshot = match parse_snapshot(raw) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!("feed payload carried no data, skipping");
                return None;
            }
            Err(err) => {
                warn!(%err, "failed to decode feed payload");
                return None;
            }
        };

        let fingerprint = snapshot.fingerprint();
        let names = snapshot.name_sets();
        self.latest = Some(snapshot.clone());

        match self.last_fingerprint.take() {
            None => {
                info!(%fingerprint, "stock baseline established");
                self.last_fingerprint = Some(fingerprint);
                self.last_names = names;
                None
            }
            Some(previous) if previous == fingerprint => {
                self.last_fingerprint = Some(previous);
                None
            }
            Some(previous) => {
                info!(old = %previous, new = %fingerprint, "stock change detected");
                let notable = self.notable_diff(&names, &snapshot);
                self.last_fingerprint = Some(fingerprint);
                self.last_names = names;
                Some(StockUpdate { snapshot, notable })
            }
        }
    }

    /// Newly-present allow-listed items, keyed by category. Comparison is
    /// case-insensitive; results keep the feed's casing.
    fn notable_diff(
        &self,
        names: &BTreeMap<Category, BTreeSet<String>>,
        snapshot: &StockSnapshot,
    ) -> BTreeMap<Category, Vec<String>> {
        let mut diff = BTreeMap::new();
        for (category, current) in names {
            let empty = BTreeSet::new();
            let previous = self.last_names.get(category).unwrap_or(&empty);
            let mut added: Vec<String> = current
                .difference(previous)
                .filter(|name| self.notable.contains(*category, name))
                .map(|lower| original_casing(snapshot, *category, lower))
                .collect();
            if !added.is_empty() {
                added.sort();
                diff.insert(*category, added);
            }
        }
        diff
    }
}

impl Default for SnapshotProcessor {
    fn default() -> Self {
        Self::new(NotableList::default())
    }
}

fn original_casing(snapshot: &StockSnapshot, category: Category, lower: &str) -> String {
    snapshot
        .items(category)
        .iter()
        .find(|item| item.name.to_lowercase() == lower)
        .map(|item| item.name.clone())
        .unwrap_or_else(|| lower.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds_payload(names: &[(&str, u64)], weather: &str) -> String {
        let items: Vec<String> = names
            .iter()
            .map(|(name, qty)| format!("{{\"name\":\"{name}\",\"quantity\":{qty}}}"))
            .collect();
        format!(
            "{{\"data\":{{\"seeds\":[{}],\"weather\":{{\"type\":\"{weather}\"}}}}}}",
            items.join(",")
        )
    }

    #[test]
    fn test_first_snapshot_is_baseline_only() {
        let mut processor = SnapshotProcessor::default();
        assert!(processor
            .ingest(&seeds_payload(&[("Cacao", 2)], "Rain"))
            .is_none());
        assert!(processor.latest().is_some());
    }

    #[test]
    fn test_same_item_set_with_new_quantities_is_not_a_change() {
        let mut processor = SnapshotProcessor::default();
        processor.ingest(&seeds_payload(&[("Cacao", 2)], "Rain"));
        assert!(processor
            .ingest(&seeds_payload(&[("Cacao", 7)], "Rain"))
            .is_none());
    }

    #[test]
    fn test_new_item_emits_exactly_one_update_with_notable_diff() {
        let mut processor = SnapshotProcessor::default();
        processor.ingest(&seeds_payload(&[("Cacao", 2)], "Rain"));

        let update = processor
            .ingest(&seeds_payload(&[("Cacao", 2), ("Beanstalk", 1)], "Rain"))
            .expect("a new item is a change");
        let notable = update.notable.get(&Category::Seeds).unwrap();
        // Beanstalk is newly present and allow-listed; Cacao was already there.
        assert_eq!(notable, &vec!["Beanstalk".to_string()]);

        // Re-ingesting the same set is quiet again.
        assert!(processor
            .ingest(&seeds_payload(&[("Cacao", 2), ("Beanstalk", 5)], "Rain"))
            .is_none());
    }

    #[test]
    fn test_non_notable_additions_change_without_alert() {
        let mut processor = SnapshotProcessor::default();
        processor.ingest(&seeds_payload(&[("Cacao", 2)], "Rain"));

        let update = processor
            .ingest(&seeds_payload(&[("Cacao", 2), ("Carrot", 4)], "Rain"))
            .expect("a new item is a change");
        assert!(update.notable.is_empty());
    }

    #[test]
    fn test_weather_change_alone_is_a_change() {
        let mut processor = SnapshotProcessor::default();
        processor.ingest(&seeds_payload(&[("Cacao", 2)], "Rain"));

        let update = processor
            .ingest(&seeds_payload(&[("Cacao", 2)], "Thunderstorm"))
            .expect("weather flip is a change");
        assert!(update.notable.is_empty());
    }

    #[test]
    fn test_malformed_payload_is_dropped_without_state_change() {
        let mut processor = SnapshotProcessor::default();
        processor.ingest(&seeds_payload(&[("Cacao", 2)], "Rain"));

        assert!(processor.ingest("{{{").is_none());
        // The baseline survives: an identical snapshot is still quiet.
        assert!(processor
            .ingest(&seeds_payload(&[("Cacao", 2)], "Rain"))
            .is_none());
    }

    #[test]
    fn test_notable_match_is_case_insensitive() {
        let mut processor = SnapshotProcessor::default();
        processor.ingest(&seeds_payload(&[("Grape", 1)], "Rain"));

        let update = processor
            .ingest(&seeds_payload(&[("Grape", 1), ("BEANSTALK", 1)], "Rain"))
            .unwrap();
        let notable = update.notable.get(&Category::Seeds).unwrap();
        assert_eq!(notable, &vec!["BEANSTALK".to_string()]);
    }
}
