//! Flat key/value persistence of history, favorites and settings.
//!
//! The document carries no version field. List entries live under indexed
//! keys (`h_0`, `h_1`, … and `f_0`, `f_1`, …) and settings under their own
//! names, so older or newer documents load with whatever keys they share.

use indexmap::IndexMap;
use kiln_catalog::{SingleInstanceTracker, TypeCatalog, TypeDescriptor};
use serde::{Deserialize, Serialize};

use crate::recency::{FavoritesStore, HistoryStore};
use crate::settings::{Setting, SettingsStore, Visibility};

pub const HISTORY_PREFIX: &str = "h_";
pub const FAVORITES_PREFIX: &str = "f_";

/// One stored value. Anything that is not a flag, an integer or a string is
/// kept as raw JSON so that foreign keys are written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedValue {
    Bool(bool),
    Int(i64),
    Str(String),
    Other(serde_json::Value),
}

impl PersistedValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PersistedValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PersistedValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PersistedValue::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for PersistedValue {
    fn from(value: bool) -> Self {
        PersistedValue::Bool(value)
    }
}

impl From<i64> for PersistedValue {
    fn from(value: i64) -> Self {
        PersistedValue::Int(value)
    }
}

impl From<usize> for PersistedValue {
    fn from(value: usize) -> Self {
        PersistedValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<&str> for PersistedValue {
    fn from(value: &str) -> Self {
        PersistedValue::Str(value.to_string())
    }
}

/// Ordered map written and read as one document.
pub type PersistedMap = IndexMap<String, PersistedValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Every key is written, replacing what the map held.
    #[default]
    Overwrite,
    /// Only keys absent from the map are written.
    FillMissing,
}

fn indexed_key(prefix: &str, index: usize) -> String {
    format!("{prefix}{index}")
}

fn write(map: &mut PersistedMap, key: String, value: PersistedValue, mode: WriteMode) {
    match mode {
        WriteMode::Overwrite => {
            map.insert(key, value);
        }
        WriteMode::FillMissing => {
            map.entry(key).or_insert(value);
        }
    }
}

fn write_list(map: &mut PersistedMap, prefix: &str, items: &[TypeDescriptor], mode: WriteMode) {
    for (index, item) in items.iter().enumerate() {
        write(map, indexed_key(prefix, index), item.key().as_str().into(), mode);
    }
    if mode == WriteMode::Overwrite {
        // A leftover run past the end would be read back as list entries.
        let mut index = items.len();
        while map.shift_remove(&indexed_key(prefix, index)).is_some() {
            index += 1;
        }
    }
}

/// Writes both lists (oldest first) and every setting into `map`.
pub fn serialize(
    history: &HistoryStore,
    favorites: &FavoritesStore,
    settings: &SettingsStore,
    map: &mut PersistedMap,
    mode: WriteMode,
) {
    write_list(map, HISTORY_PREFIX, &history.items(), mode);
    write_list(map, FAVORITES_PREFIX, &favorites.items(), mode);

    let record = settings.record();
    let fields: [(Setting, PersistedValue); 5] = [
        (Setting::HistoryCapacity, record.history_capacity.into()),
        (Setting::FavoritesCapacity, record.favorites_capacity.into()),
        (Setting::OverwriteExisting, record.overwrite_existing.into()),
        (Setting::PingOnCreate, record.ping_on_create.into()),
        (
            Setting::SingleInstanceVisibility,
            record.single_instance_visibility.index().into(),
        ),
    ];
    for (setting, value) in fields {
        write(map, setting.key().to_string(), value, mode);
    }
}

fn read_list(
    map: &PersistedMap,
    prefix: &str,
    catalog: &TypeCatalog,
    keep: impl Fn(&TypeDescriptor) -> bool,
) -> Vec<TypeDescriptor> {
    let mut items = Vec::new();
    for index in 0.. {
        let Some(value) = map.get(&indexed_key(prefix, index)) else {
            break;
        };
        let Some(identity) = value.as_str() else {
            continue;
        };
        match catalog.resolve(identity) {
            Some(descriptor) if keep(&descriptor) => items.push(descriptor),
            Some(_) => tracing::debug!(identity, "dropping instantiated single-instance favorite"),
            None => tracing::debug!(identity, "skipping unknown persisted type"),
        }
    }
    items
}

/// Replaces both lists and loads settings from `map`.
///
/// Each list is read until its own first missing index. Identities that no
/// longer resolve are skipped; favorites that are instantiated single-instance
/// types are dropped. Settings keys that are missing or of the wrong kind keep
/// their current value, and the capacities are clamped into their load bands.
pub fn deserialize(
    map: &PersistedMap,
    catalog: &TypeCatalog,
    tracker: &SingleInstanceTracker,
    history: &HistoryStore,
    favorites: &FavoritesStore,
    settings: &SettingsStore,
) {
    history.restore(read_list(map, HISTORY_PREFIX, catalog, |_| true));
    favorites.restore(read_list(map, FAVORITES_PREFIX, catalog, |descriptor| {
        !(descriptor.is_single_instance() && tracker.is_instantiated(descriptor))
    }));

    let get = |setting: Setting| map.get(setting.key());
    if let Some(value) = get(Setting::HistoryCapacity).and_then(PersistedValue::as_int) {
        settings.set_history_capacity(usize::try_from(value).unwrap_or(0));
    }
    if let Some(value) = get(Setting::FavoritesCapacity).and_then(PersistedValue::as_int) {
        settings.set_favorites_capacity(usize::try_from(value).unwrap_or(0));
    }
    if let Some(value) = get(Setting::OverwriteExisting).and_then(PersistedValue::as_bool) {
        settings.set_overwrite_existing(value);
    }
    if let Some(value) = get(Setting::PingOnCreate).and_then(PersistedValue::as_bool) {
        settings.set_ping_on_create(value);
    }
    let visibility = get(Setting::SingleInstanceVisibility).and_then(|value| match value {
        PersistedValue::Int(index) => Visibility::from_index(*index),
        PersistedValue::Str(label) => label.parse().ok(),
        PersistedValue::Bool(_) | PersistedValue::Other(_) => None,
    });
    if let Some(visibility) = visibility {
        settings.set_visibility(visibility);
    }
    settings.clamp_persisted_capacities();
}

#[cfg(test)]
mod tests {
    use kiln_catalog::{StaticProvider, TypeDefinition};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::events::EventBus;

    struct Fixture {
        catalog: TypeCatalog,
        tracker: SingleInstanceTracker,
        settings: SettingsStore,
        history: HistoryStore,
        favorites: FavoritesStore,
    }

    impl Fixture {
        fn new() -> Self {
            let catalog = TypeCatalog::new();
            catalog.rebuild(&StaticProvider::new(vec![
                TypeDefinition::creatable("t.A", "A"),
                TypeDefinition::creatable("t.B", "B"),
                TypeDefinition::creatable("t.C", "C"),
                TypeDefinition::creatable("t.X", "X"),
                TypeDefinition::creatable("t.Project", "Project").single_instance(),
            ]));
            let bus = EventBus::new();
            let settings = SettingsStore::new(bus.clone());
            Self {
                history: HistoryStore::new(&bus, settings.view()),
                favorites: FavoritesStore::new(&bus, settings.view()),
                tracker: SingleInstanceTracker::new(),
                settings,
                catalog,
            }
        }

        fn get(&self, key: &str) -> TypeDescriptor {
            self.catalog.resolve(key).unwrap()
        }

        fn load(&self, map: &PersistedMap) {
            deserialize(
                map,
                &self.catalog,
                &self.tracker,
                &self.history,
                &self.favorites,
                &self.settings,
            );
        }

        fn save(&self, map: &mut PersistedMap, mode: WriteMode) {
            serialize(&self.history, &self.favorites, &self.settings, map, mode);
        }
    }

    fn keys(items: Vec<TypeDescriptor>) -> Vec<String> {
        items.into_iter().map(|d| d.key().to_string()).collect()
    }

    #[test]
    fn lists_and_settings_survive_a_round_trip() {
        let source = Fixture::new();
        for key in ["t.A", "t.B", "t.C"] {
            source.history.touch(source.get(key));
        }
        source.favorites.touch(source.get("t.X"));
        source.settings.set_overwrite_existing(true);
        source.settings.set_visibility(Visibility::Hidden);
        let mut map = PersistedMap::new();
        source.save(&mut map, WriteMode::Overwrite);

        assert_eq!(map.get("h_0"), Some(&PersistedValue::Str("t.A".into())));
        assert_eq!(map.get("single_instance_visibility"), Some(&PersistedValue::Int(0)));

        let target = Fixture::new();
        target.load(&map);
        assert_eq!(keys(target.history.items()), vec!["t.A", "t.B", "t.C"]);
        assert_eq!(keys(target.favorites.items()), vec!["t.X"]);
        assert!(target.settings.overwrite_existing());
        assert_eq!(target.settings.visibility(), Visibility::Hidden);
    }

    #[test]
    fn each_list_stops_at_its_own_first_gap() {
        let fixture = Fixture::new();
        let mut map = PersistedMap::new();
        map.insert("h_0".into(), "t.A".into());
        map.insert("h_1".into(), "t.B".into());
        map.insert("h_3".into(), "t.C".into());
        for (index, key) in ["t.A", "t.B", "t.C", "t.X"].into_iter().enumerate() {
            map.insert(format!("f_{index}"), key.into());
        }

        fixture.load(&map);

        assert_eq!(fixture.history.len(), 2);
        assert_eq!(fixture.favorites.len(), 4);
    }

    #[test]
    fn unknown_identities_are_skipped_without_ending_the_scan() {
        let fixture = Fixture::new();
        let mut map = PersistedMap::new();
        map.insert("h_0".into(), "t.Gone".into());
        map.insert("h_1".into(), "t.B".into());
        map.insert("h_2".into(), PersistedValue::Int(4));
        map.insert("h_3".into(), "t.C".into());

        fixture.load(&map);

        assert_eq!(keys(fixture.history.items()), vec!["t.B", "t.C"]);
    }

    #[test]
    fn instantiated_single_instance_favorites_are_dropped() {
        let mut fixture = Fixture::new();
        fixture
            .tracker
            .refresh(&fixture.catalog, &|_: &TypeDescriptor| true);
        let mut map = PersistedMap::new();
        map.insert("h_0".into(), "t.Project".into());
        map.insert("f_0".into(), "t.Project".into());
        map.insert("f_1".into(), "t.A".into());

        fixture.load(&map);

        assert_eq!(keys(fixture.history.items()), vec!["t.Project"]);
        assert_eq!(keys(fixture.favorites.items()), vec!["t.A"]);
    }

    #[test]
    fn loaded_capacities_are_clamped_into_their_bands() {
        let fixture = Fixture::new();
        let mut map = PersistedMap::new();
        map.insert("history_capacity".into(), PersistedValue::Int(150));
        map.insert("favorites_capacity".into(), PersistedValue::Int(2));
        fixture.load(&map);
        assert_eq!(fixture.settings.history_capacity(), 100);
        assert_eq!(fixture.settings.favorites_capacity(), 5);

        map.insert("history_capacity".into(), PersistedValue::Int(-3));
        map.insert("favorites_capacity".into(), PersistedValue::Int(31));
        fixture.load(&map);
        assert_eq!(fixture.settings.history_capacity(), 10);
        assert_eq!(fixture.settings.favorites_capacity(), 30);
    }

    #[test]
    fn wrong_typed_settings_keep_their_value() {
        let fixture = Fixture::new();
        fixture.settings.set_ping_on_create(true);
        let mut map = PersistedMap::new();
        map.insert("ping_on_create".into(), "yes".into());
        map.insert("single_instance_visibility".into(), "Hidden".into());
        fixture.load(&map);
        assert!(fixture.settings.ping_on_create());
        assert_eq!(fixture.settings.visibility(), Visibility::Hidden);
    }

    #[test]
    fn documents_with_unrecognised_values_still_load() {
        let fixture = Fixture::new();
        let map: PersistedMap = serde_json::from_str(
            r#"{"h_0": "t.A", "h_1": 2.5, "h_2": "t.B", "window_scale": 1.5, "panes": [1, 2], "history_capacity": 42}"#,
        )
        .unwrap();
        assert_eq!(
            map.get("window_scale"),
            Some(&PersistedValue::Other(serde_json::json!(1.5)))
        );

        fixture.load(&map);

        assert_eq!(keys(fixture.history.items()), vec!["t.A", "t.B"]);
        assert_eq!(fixture.settings.history_capacity(), 42);
    }

    #[test]
    fn fill_missing_never_clobbers_existing_keys() {
        let fixture = Fixture::new();
        fixture.history.touch(fixture.get("t.A"));
        fixture.history.touch(fixture.get("t.B"));
        let mut map = PersistedMap::new();
        map.insert("h_0".into(), "t.C".into());
        map.insert("history_capacity".into(), PersistedValue::Int(42));

        fixture.save(&mut map, WriteMode::FillMissing);

        assert_eq!(map.get("h_0"), Some(&PersistedValue::Str("t.C".into())));
        assert_eq!(map.get("h_1"), Some(&PersistedValue::Str("t.B".into())));
        assert_eq!(map.get("history_capacity"), Some(&PersistedValue::Int(42)));
        assert_eq!(map.get("ping_on_create"), Some(&PersistedValue::Bool(false)));
    }

    #[test]
    fn overwrite_drops_entries_past_the_end_of_a_shorter_list() {
        let fixture = Fixture::new();
        fixture.history.touch(fixture.get("t.A"));
        let mut map = PersistedMap::new();
        for (index, key) in ["t.A", "t.B", "t.C"].into_iter().enumerate() {
            map.insert(format!("h_{index}"), key.into());
        }

        fixture.save(&mut map, WriteMode::Overwrite);

        assert!(map.contains_key("h_0"));
        assert!(!map.contains_key("h_1"));
        assert!(!map.contains_key("h_2"));
    }
}
