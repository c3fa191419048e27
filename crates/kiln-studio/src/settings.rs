use std::cell::RefCell;
use std::fmt;
use std::ops::RangeInclusive;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StudioError;
use crate::events::{EventBus, StudioEvent};

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;
pub const DEFAULT_FAVORITES_CAPACITY: usize = 10;

/// Range persisted history capacities are clamped into when loaded.
pub const PERSISTED_HISTORY_CAPACITY: RangeInclusive<usize> = 10..=100;
/// Range persisted favorites capacities are clamped into when loaded.
pub const PERSISTED_FAVORITES_CAPACITY: RangeInclusive<usize> = 5..=30;

/// How instantiated single-instance types are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Visibility {
    Hidden,
    #[default]
    Disabled,
}

impl Visibility {
    pub fn index(self) -> i64 {
        match self {
            Visibility::Hidden => 0,
            Visibility::Disabled => 1,
        }
    }

    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Visibility::Hidden),
            1 => Some(Visibility::Disabled),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Visibility::Hidden => "Hidden",
            Visibility::Disabled => "Disabled",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "hidden" | "0" => Ok(Visibility::Hidden),
            "disabled" | "1" => Ok(Visibility::Disabled),
            other => Err(format!("unknown visibility: {other}")),
        }
    }
}

/// Individual fields of [`SettingsRecord`], each with its own change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    HistoryCapacity,
    FavoritesCapacity,
    OverwriteExisting,
    PingOnCreate,
    SingleInstanceVisibility,
}

impl Setting {
    pub const ALL: [Setting; 5] = [
        Setting::HistoryCapacity,
        Setting::FavoritesCapacity,
        Setting::OverwriteExisting,
        Setting::PingOnCreate,
        Setting::SingleInstanceVisibility,
    ];

    /// Name used for the field in the persisted configuration map.
    pub fn key(self) -> &'static str {
        match self {
            Setting::HistoryCapacity => "history_capacity",
            Setting::FavoritesCapacity => "favorites_capacity",
            Setting::OverwriteExisting => "overwrite_existing",
            Setting::PingOnCreate => "ping_on_create",
            Setting::SingleInstanceVisibility => "single_instance_visibility",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|setting| setting.key() == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsRecord {
    pub history_capacity: usize,
    pub favorites_capacity: usize,
    pub overwrite_existing: bool,
    pub ping_on_create: bool,
    pub single_instance_visibility: Visibility,
}

impl Default for SettingsRecord {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            favorites_capacity: DEFAULT_FAVORITES_CAPACITY,
            overwrite_existing: false,
            ping_on_create: false,
            single_instance_visibility: Visibility::Disabled,
        }
    }
}

#[derive(Debug, Default)]
struct SettingsState {
    record: SettingsRecord,
    dirty: bool,
}

/// Read-only live view of the settings, handed to stores that only consume policy.
#[derive(Debug, Clone)]
pub struct SettingsView {
    state: Rc<RefCell<SettingsState>>,
}

impl SettingsView {
    pub fn record(&self) -> SettingsRecord {
        self.state.borrow().record.clone()
    }

    pub fn history_capacity(&self) -> usize {
        self.state.borrow().record.history_capacity
    }

    pub fn favorites_capacity(&self) -> usize {
        self.state.borrow().record.favorites_capacity
    }

    pub fn overwrite_existing(&self) -> bool {
        self.state.borrow().record.overwrite_existing
    }

    pub fn ping_on_create(&self) -> bool {
        self.state.borrow().record.ping_on_create
    }

    pub fn visibility(&self) -> Visibility {
        self.state.borrow().record.single_instance_visibility
    }
}

/// Operator-tunable policy shared by the studio stores.
///
/// Every setter is guarded: capacities are floored at 1, and a notification
/// (plus the dirty flag) only happens when the stored value really changes.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    state: Rc<RefCell<SettingsState>>,
    bus: EventBus,
}

impl SettingsStore {
    pub fn new(bus: EventBus) -> Self {
        Self {
            state: Rc::new(RefCell::new(SettingsState::default())),
            bus,
        }
    }

    pub fn view(&self) -> SettingsView {
        SettingsView {
            state: Rc::clone(&self.state),
        }
    }

    pub fn record(&self) -> SettingsRecord {
        self.state.borrow().record.clone()
    }

    pub fn history_capacity(&self) -> usize {
        self.state.borrow().record.history_capacity
    }

    pub fn favorites_capacity(&self) -> usize {
        self.state.borrow().record.favorites_capacity
    }

    pub fn overwrite_existing(&self) -> bool {
        self.state.borrow().record.overwrite_existing
    }

    pub fn ping_on_create(&self) -> bool {
        self.state.borrow().record.ping_on_create
    }

    pub fn visibility(&self) -> Visibility {
        self.state.borrow().record.single_instance_visibility
    }

    fn update<T: PartialEq>(
        &self,
        setting: Setting,
        field: impl FnOnce(&mut SettingsRecord) -> &mut T,
        value: T,
    ) -> bool {
        let changed = {
            let mut state = self.state.borrow_mut();
            let slot = field(&mut state.record);
            if *slot == value {
                false
            } else {
                *slot = value;
                state.dirty = true;
                true
            }
        };
        if changed {
            tracing::debug!(setting = setting.key(), "setting changed");
            self.bus.publish(StudioEvent::SettingChanged(setting));
        }
        changed
    }

    pub fn set_history_capacity(&self, value: usize) -> bool {
        self.update(
            Setting::HistoryCapacity,
            |record| &mut record.history_capacity,
            value.max(1),
        )
    }

    pub fn set_favorites_capacity(&self, value: usize) -> bool {
        self.update(
            Setting::FavoritesCapacity,
            |record| &mut record.favorites_capacity,
            value.max(1),
        )
    }

    pub fn set_overwrite_existing(&self, value: bool) -> bool {
        self.update(
            Setting::OverwriteExisting,
            |record| &mut record.overwrite_existing,
            value,
        )
    }

    pub fn set_ping_on_create(&self, value: bool) -> bool {
        self.update(Setting::PingOnCreate, |record| &mut record.ping_on_create, value)
    }

    pub fn set_visibility(&self, value: Visibility) -> bool {
        self.update(
            Setting::SingleInstanceVisibility,
            |record| &mut record.single_instance_visibility,
            value,
        )
    }

    /// Parses `raw` for `setting` and applies it through the guarded setter.
    pub fn set_from_str(&self, setting: Setting, raw: &str) -> Result<bool, StudioError> {
        let invalid = || StudioError::InvalidSetting {
            key: setting.key().to_string(),
            value: raw.to_string(),
        };
        let trimmed = raw.trim();
        let changed = match setting {
            Setting::HistoryCapacity => {
                self.set_history_capacity(trimmed.parse().map_err(|_| invalid())?)
            }
            Setting::FavoritesCapacity => {
                self.set_favorites_capacity(trimmed.parse().map_err(|_| invalid())?)
            }
            Setting::OverwriteExisting => {
                self.set_overwrite_existing(trimmed.parse().map_err(|_| invalid())?)
            }
            Setting::PingOnCreate => self.set_ping_on_create(trimmed.parse().map_err(|_| invalid())?),
            Setting::SingleInstanceVisibility => {
                self.set_visibility(trimmed.parse().map_err(|_| invalid())?)
            }
        };
        Ok(changed)
    }

    /// Restores the documented defaults.
    pub fn reset(&self) {
        let defaults = SettingsRecord::default();
        self.set_history_capacity(defaults.history_capacity);
        self.set_favorites_capacity(defaults.favorites_capacity);
        self.set_overwrite_existing(defaults.overwrite_existing);
        self.set_ping_on_create(defaults.ping_on_create);
        self.set_visibility(defaults.single_instance_visibility);
    }

    /// Applies the load-time capacity bands. Live edits only floor at 1; data
    /// coming back from disk is held to the tighter bands.
    pub fn clamp_persisted_capacities(&self) {
        let history = self.history_capacity().clamp(
            *PERSISTED_HISTORY_CAPACITY.start(),
            *PERSISTED_HISTORY_CAPACITY.end(),
        );
        let favorites = self.favorites_capacity().clamp(
            *PERSISTED_FAVORITES_CAPACITY.start(),
            *PERSISTED_FAVORITES_CAPACITY.end(),
        );
        self.set_history_capacity(history);
        self.set_favorites_capacity(favorites);
    }

    pub fn clear_history(&self) {
        self.bus.publish(StudioEvent::HistoryCleared);
    }

    pub fn clear_favorites(&self) {
        self.bus.publish(StudioEvent::FavoritesCleared);
    }

    pub fn is_dirty(&self) -> bool {
        self.state.borrow().dirty
    }

    pub fn mark_clean(&self) {
        self.state.borrow_mut().dirty = false;
    }
}
