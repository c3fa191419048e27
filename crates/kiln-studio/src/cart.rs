use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use kiln_catalog::{SingleInstanceTracker, TypeDescriptor};

use crate::creation::{
    AssetCreator, CreationError, CreationFailure, CreationReport, CreationRequest,
};
use crate::error::StudioError;
use crate::events::{EventBus, StudioEvent, Subscription, Topic};
use crate::settings::SettingsView;

/// One pending creation: a type, how many instances, and where to put them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartEntry {
    descriptor: TypeDescriptor,
    quantity: u32,
    target_path: Option<PathBuf>,
}

impl CartEntry {
    /// A pending creation of `quantity` units. Zero units is refused.
    pub fn new(descriptor: TypeDescriptor, quantity: u32) -> Result<Self, StudioError> {
        if quantity == 0 {
            return Err(StudioError::InvalidQuantity(quantity));
        }
        Ok(Self {
            descriptor,
            quantity,
            target_path: None,
        })
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn target_path(&self) -> Option<&Path> {
        self.target_path.as_deref()
    }

    /// File name of the target path, or the type name when no path is set.
    pub fn display_name(&self) -> String {
        self.target_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.descriptor.name().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decrement {
    Decremented(u32),
    Removed,
    Missing,
}

#[derive(Debug, Default)]
struct CartState {
    entries: Vec<CartEntry>,
    last_directory: Option<PathBuf>,
}

impl CartState {
    fn position(&self, descriptor: &TypeDescriptor) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| &entry.descriptor == descriptor)
    }

    /// Merges `entry` into the queue and returns the resulting quantity.
    /// Single-instance types never hold more than one unit.
    fn insert(&mut self, entry: CartEntry) -> u32 {
        let ceiling = if entry.descriptor.is_single_instance() {
            1
        } else {
            u32::MAX
        };
        match self.position(&entry.descriptor) {
            Some(index) => {
                let queued = &mut self.entries[index];
                queued.quantity = queued.quantity.saturating_add(entry.quantity).min(ceiling);
                queued.quantity
            }
            None => {
                let quantity = entry.quantity.min(ceiling);
                self.entries.push(CartEntry { quantity, ..entry });
                quantity
            }
        }
    }

    fn add(&mut self, descriptor: &TypeDescriptor) -> u32 {
        self.insert(CartEntry {
            descriptor: descriptor.clone(),
            quantity: 1,
            target_path: None,
        })
    }

    fn remove(&mut self, descriptor: &TypeDescriptor) -> bool {
        match self.position(descriptor) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Ordered queue of pending creations.
///
/// Listens for [`Topic::CartAdd`] and [`Topic::CartRemove`] on the bus; the
/// direct methods are the same operations for callers that own the store.
#[derive(Debug)]
pub struct CartStore {
    state: Rc<RefCell<CartState>>,
    _subscriptions: Vec<Subscription>,
}

impl CartStore {
    pub fn new(bus: &EventBus) -> Self {
        let state = Rc::new(RefCell::new(CartState::default()));
        let on_add = Rc::clone(&state);
        let on_remove = Rc::clone(&state);
        let subscriptions = vec![
            bus.subscribe(Topic::CartAdd, move |event| {
                if let StudioEvent::CartAdd(descriptor) = event {
                    on_add.borrow_mut().add(descriptor);
                }
            }),
            bus.subscribe(Topic::CartRemove, move |event| {
                if let StudioEvent::CartRemove(descriptor) = event {
                    on_remove.borrow_mut().remove(descriptor);
                }
            }),
        ];
        Self {
            state,
            _subscriptions: subscriptions,
        }
    }

    pub fn add(&self, descriptor: &TypeDescriptor) -> u32 {
        self.state.borrow_mut().add(descriptor)
    }

    /// Queues `quantity` units at once and returns the entry's new quantity.
    pub fn add_units(&self, descriptor: &TypeDescriptor, quantity: u32) -> Result<u32, StudioError> {
        let entry = CartEntry::new(descriptor.clone(), quantity)?;
        Ok(self.state.borrow_mut().insert(entry))
    }

    pub fn remove(&self, descriptor: &TypeDescriptor) -> bool {
        self.state.borrow_mut().remove(descriptor)
    }

    /// Raises the quantity by one. `None` when the entry is missing or is a
    /// single-instance type, which stays at one unit.
    pub fn increment(&self, descriptor: &TypeDescriptor) -> Option<u32> {
        let mut state = self.state.borrow_mut();
        let index = state.position(descriptor)?;
        let entry = &mut state.entries[index];
        if entry.descriptor.is_single_instance() {
            return None;
        }
        entry.quantity += 1;
        Some(entry.quantity)
    }

    /// Lowers the quantity by one; an entry that would reach zero is removed.
    pub fn decrement(&self, descriptor: &TypeDescriptor) -> Decrement {
        let mut state = self.state.borrow_mut();
        let Some(index) = state.position(descriptor) else {
            return Decrement::Missing;
        };
        if state.entries[index].quantity <= 1 {
            state.entries.remove(index);
            return Decrement::Removed;
        }
        let entry = &mut state.entries[index];
        entry.quantity -= 1;
        Decrement::Decremented(entry.quantity)
    }

    pub fn can_decrement(&self, descriptor: &TypeDescriptor) -> bool {
        self.quantity(descriptor).is_some_and(|quantity| quantity > 1)
    }

    /// Sets the target path of an existing entry and remembers its directory.
    pub fn set_path(&self, descriptor: &TypeDescriptor, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let mut state = self.state.borrow_mut();
        let Some(index) = state.position(descriptor) else {
            return false;
        };
        state.last_directory = path.parent().map(Path::to_path_buf);
        state.entries[index].target_path = Some(path);
        true
    }

    pub fn last_directory(&self) -> Option<PathBuf> {
        self.state.borrow().last_directory.clone()
    }

    pub fn clear(&self) {
        self.state.borrow_mut().entries.clear();
    }

    pub fn contains(&self, descriptor: &TypeDescriptor) -> bool {
        self.state.borrow().position(descriptor).is_some()
    }

    pub fn quantity(&self, descriptor: &TypeDescriptor) -> Option<u32> {
        let state = self.state.borrow();
        state
            .position(descriptor)
            .map(|index| state.entries[index].quantity)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().entries.is_empty()
    }

    pub fn entries(&self) -> Vec<CartEntry> {
        self.state.borrow().entries.clone()
    }

    /// Empties the cart and creates every queued unit through `creator`.
    ///
    /// Failures are logged and collected; the batch always runs to the end.
    /// A single-instance type that `tracker` reports as instantiated, or that
    /// this batch already created, is recorded as a failure instead.
    pub fn drain_and_create(
        &self,
        creator: &mut dyn AssetCreator,
        settings: &SettingsView,
        tracker: &SingleInstanceTracker,
        bus: &EventBus,
    ) -> CreationReport {
        let entries = std::mem::take(&mut self.state.borrow_mut().entries);
        let overwrite_existing = settings.overwrite_existing();
        let mut report = CreationReport::default();
        for entry in entries {
            if entry.descriptor.is_single_instance() {
                let created_here = report
                    .created
                    .iter()
                    .any(|asset| asset.descriptor == entry.descriptor);
                if created_here || tracker.is_instantiated(&entry.descriptor) {
                    tracing::warn!(asset_type = %entry.descriptor.key(), "single-instance type already instantiated");
                    report.failures.push(CreationFailure {
                        descriptor: entry.descriptor.clone(),
                        error: CreationError::SingleInstanceExists(entry.descriptor.key().to_string()),
                    });
                    continue;
                }
            }
            let request = CreationRequest {
                descriptor: entry.descriptor.clone(),
                path: entry.target_path.clone(),
                multiple: entry.quantity > 1,
                overwrite_existing,
            };
            for _ in 0..entry.quantity {
                match creator.create(&request) {
                    Ok(asset) => {
                        tracing::debug!(asset_type = %entry.descriptor.key(), path = %asset.path.display(), "asset created");
                        report.created.push(asset.clone());
                        bus.publish(StudioEvent::AssetCreated(asset));
                    }
                    Err(error) => {
                        tracing::error!(asset_type = %entry.descriptor.key(), %error, "asset creation failed");
                        report.failures.push(CreationFailure {
                            descriptor: entry.descriptor.clone(),
                            error,
                        });
                    }
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use kiln_catalog::{StaticProvider, TypeCatalog, TypeDefinition};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::creation::MemoryAssetStore;
    use crate::settings::SettingsStore;

    fn catalog() -> TypeCatalog {
        let catalog = TypeCatalog::new();
        catalog.rebuild(&StaticProvider::new(vec![
            TypeDefinition::creatable("game.Weapon", "Weapon"),
            TypeDefinition::creatable("game.Armor", "Armor"),
            TypeDefinition::creatable("game.Project", "Project").single_instance(),
        ]));
        catalog
    }

    #[test]
    fn adding_twice_yields_one_entry_with_quantity_two() {
        let bus = EventBus::new();
        let cart = CartStore::new(&bus);
        let weapon = catalog().resolve("game.Weapon").unwrap();

        bus.publish(StudioEvent::CartAdd(weapon.clone()));
        bus.publish(StudioEvent::CartAdd(weapon.clone()));

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.quantity(&weapon), Some(2));
        assert!(cart.can_decrement(&weapon));
    }

    #[test]
    fn zero_quantity_entries_are_rejected() {
        let weapon = catalog().resolve("game.Weapon").unwrap();
        assert!(matches!(
            CartEntry::new(weapon.clone(), 0),
            Err(StudioError::InvalidQuantity(0))
        ));
        assert_eq!(CartEntry::new(weapon, 3).unwrap().quantity(), 3);
    }

    #[test]
    fn decrementing_the_last_unit_removes_the_entry() {
        let bus = EventBus::new();
        let cart = CartStore::new(&bus);
        let weapon = catalog().resolve("game.Weapon").unwrap();
        cart.add(&weapon);
        cart.add(&weapon);

        assert_eq!(cart.decrement(&weapon), Decrement::Decremented(1));
        assert!(!cart.can_decrement(&weapon));
        assert_eq!(cart.decrement(&weapon), Decrement::Removed);
        assert_eq!(cart.decrement(&weapon), Decrement::Missing);
        assert!(cart.is_empty());
    }

    #[test]
    fn remove_event_deletes_regardless_of_quantity() {
        let bus = EventBus::new();
        let cart = CartStore::new(&bus);
        let weapon = catalog().resolve("game.Weapon").unwrap();
        cart.add(&weapon);
        cart.increment(&weapon);
        cart.increment(&weapon);

        bus.publish(StudioEvent::CartRemove(weapon.clone()));

        assert!(!cart.contains(&weapon));
    }

    #[test]
    fn set_path_records_the_last_directory() {
        let bus = EventBus::new();
        let cart = CartStore::new(&bus);
        let weapon = catalog().resolve("game.Weapon").unwrap();
        assert!(!cart.set_path(&weapon, "assets/items/Sword.asset"));
        cart.add(&weapon);
        assert!(cart.set_path(&weapon, "assets/items/Sword.asset"));

        assert_eq!(cart.last_directory(), Some(PathBuf::from("assets/items")));
        assert_eq!(cart.entries()[0].display_name(), "Sword.asset");
    }

    #[test]
    fn drain_creates_every_unit_and_survives_failures() {
        let bus = EventBus::new();
        let settings = SettingsStore::new(bus.clone());
        let cart = CartStore::new(&bus);
        let catalog = catalog();
        let weapon = catalog.resolve("game.Weapon").unwrap();
        let armor = catalog.resolve("game.Armor").unwrap();
        cart.add(&armor);
        cart.add(&weapon);
        cart.add(&weapon);
        let created = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&created);
        let _watch = bus.subscribe(Topic::AssetCreated, move |event| {
            if let StudioEvent::AssetCreated(asset) = event {
                sink.borrow_mut().push(asset.path.clone());
            }
        });
        let mut store = MemoryAssetStore::new("assets");
        store.reject("game.Armor");

        let report = cart.drain_and_create(
            &mut store,
            &settings.view(),
            &SingleInstanceTracker::new(),
            &bus,
        );

        assert!(cart.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].descriptor, armor);
        assert_eq!(
            *created.borrow(),
            vec![
                PathBuf::from("assets/Weapon.asset"),
                PathBuf::from("assets/Weapon 1.asset")
            ]
        );
        assert_eq!(store.count_of("game.Weapon"), 2);
    }

    #[test]
    fn single_instance_entries_hold_one_unit() {
        let bus = EventBus::new();
        let cart = CartStore::new(&bus);
        let catalog = catalog();
        let project = catalog.resolve("game.Project").unwrap();
        let weapon = catalog.resolve("game.Weapon").unwrap();

        bus.publish(StudioEvent::CartAdd(project.clone()));
        bus.publish(StudioEvent::CartAdd(project.clone()));
        assert_eq!(cart.increment(&project), None);
        assert_eq!(cart.add_units(&project, 3).unwrap(), 1);
        assert_eq!(cart.add_units(&weapon, 3).unwrap(), 3);

        assert_eq!(cart.quantity(&project), Some(1));
        assert!(matches!(
            cart.add_units(&weapon, 0),
            Err(StudioError::InvalidQuantity(0))
        ));
        assert_eq!(cart.quantity(&weapon), Some(3));
    }

    #[test]
    fn drain_refuses_single_instance_types_that_already_exist() {
        let bus = EventBus::new();
        let settings = SettingsStore::new(bus.clone());
        let cart = CartStore::new(&bus);
        let catalog = catalog();
        let project = catalog.resolve("game.Project").unwrap();
        let weapon = catalog.resolve("game.Weapon").unwrap();
        let mut store = MemoryAssetStore::new("assets");
        let mut tracker = SingleInstanceTracker::new();
        tracker.refresh(&catalog, &|d: &TypeDescriptor| d.key().as_str() == "game.Project");
        cart.add(&project);
        cart.add(&weapon);

        let report = cart.drain_and_create(&mut store, &settings.view(), &tracker, &bus);

        assert_eq!(report.created.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0].error,
            CreationError::SingleInstanceExists(_)
        ));
        assert_eq!(store.count_of("game.Project"), 0);
        assert!(cart.is_empty());
    }
}
