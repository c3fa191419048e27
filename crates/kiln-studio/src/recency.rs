use std::cell::RefCell;
use std::rc::Rc;

use kiln_catalog::{SingleInstanceTracker, TypeDescriptor};

use crate::events::{EventBus, StudioEvent, Subscription, Topic};
use crate::settings::{SettingsView, Visibility};

/// Bounded, de-duplicated list ordered from oldest to most recently touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecencyList {
    items: Vec<TypeDescriptor>,
}

impl RecencyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `item` to the back, then evicts from the front down to `capacity`.
    pub fn touch(&mut self, item: TypeDescriptor, capacity: usize) {
        self.items.retain(|existing| existing != &item);
        self.items.push(item);
        let capacity = capacity.max(1);
        if self.items.len() > capacity {
            let overflow = self.items.len() - capacity;
            self.items.drain(..overflow);
        }
    }

    pub fn remove(&mut self, item: &TypeDescriptor) -> bool {
        let before = self.items.len();
        self.items.retain(|existing| existing != item);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn contains(&self, item: &TypeDescriptor) -> bool {
        self.items.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.items.iter()
    }

    pub fn recent_first(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.items.iter().rev()
    }
}

/// A recency entry as presented to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedType {
    pub descriptor: TypeDescriptor,
    pub interactive: bool,
}

fn locked(descriptor: &TypeDescriptor, tracker: &SingleInstanceTracker) -> bool {
    descriptor.is_single_instance() && tracker.is_instantiated(descriptor)
}

/// Types recently created in this workspace.
#[derive(Debug)]
pub struct HistoryStore {
    list: Rc<RefCell<RecencyList>>,
    settings: SettingsView,
    _subscriptions: Vec<Subscription>,
}

impl HistoryStore {
    pub fn new(bus: &EventBus, settings: SettingsView) -> Self {
        let list = Rc::new(RefCell::new(RecencyList::new()));
        let on_created = Rc::clone(&list);
        let capacity = settings.clone();
        let on_cleared = Rc::clone(&list);
        let subscriptions = vec![
            bus.subscribe(Topic::AssetCreated, move |event| {
                if let StudioEvent::AssetCreated(asset) = event {
                    on_created
                        .borrow_mut()
                        .touch(asset.descriptor.clone(), capacity.history_capacity());
                }
            }),
            bus.subscribe(Topic::HistoryCleared, move |_| on_cleared.borrow_mut().clear()),
        ];
        Self {
            list,
            settings,
            _subscriptions: subscriptions,
        }
    }

    pub fn touch(&self, descriptor: TypeDescriptor) {
        let capacity = self.settings.history_capacity();
        self.list.borrow_mut().touch(descriptor, capacity);
    }

    /// Replaces the contents, oldest first. Capacity applies from the next touch on.
    pub fn restore(&self, items: impl IntoIterator<Item = TypeDescriptor>) {
        let mut list = self.list.borrow_mut();
        list.clear();
        for item in items {
            list.touch(item, usize::MAX);
        }
    }

    pub fn remove(&self, descriptor: &TypeDescriptor) -> bool {
        self.list.borrow_mut().remove(descriptor)
    }

    pub fn clear(&self) {
        self.list.borrow_mut().clear();
    }

    pub fn contains(&self, descriptor: &TypeDescriptor) -> bool {
        self.list.borrow().contains(descriptor)
    }

    pub fn len(&self) -> usize {
        self.list.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.borrow().is_empty()
    }

    /// Oldest first, the order used for persistence.
    pub fn items(&self) -> Vec<TypeDescriptor> {
        self.list.borrow().iter().cloned().collect()
    }

    /// Most recent first. Instantiated single-instance types cannot be created
    /// again, so they are listed but not interactive.
    pub fn listing(&self, tracker: &SingleInstanceTracker) -> Vec<ListedType> {
        self.list
            .borrow()
            .recent_first()
            .map(|descriptor| ListedType {
                descriptor: descriptor.clone(),
                interactive: !locked(descriptor, tracker),
            })
            .collect()
    }
}

/// Types the operator pinned for quick access.
#[derive(Debug)]
pub struct FavoritesStore {
    list: Rc<RefCell<RecencyList>>,
    settings: SettingsView,
    _subscriptions: Vec<Subscription>,
}

impl FavoritesStore {
    pub fn new(bus: &EventBus, settings: SettingsView) -> Self {
        let list = Rc::new(RefCell::new(RecencyList::new()));
        let on_added = Rc::clone(&list);
        let capacity = settings.clone();
        let on_removed = Rc::clone(&list);
        let on_cleared = Rc::clone(&list);
        let subscriptions = vec![
            bus.subscribe(Topic::FavoriteAdded, move |event| {
                if let StudioEvent::FavoriteAdded(descriptor) = event {
                    on_added
                        .borrow_mut()
                        .touch(descriptor.clone(), capacity.favorites_capacity());
                }
            }),
            bus.subscribe(Topic::FavoriteRemoved, move |event| {
                if let StudioEvent::FavoriteRemoved(descriptor) = event {
                    on_removed.borrow_mut().remove(descriptor);
                }
            }),
            bus.subscribe(Topic::FavoritesCleared, move |_| on_cleared.borrow_mut().clear()),
        ];
        Self {
            list,
            settings,
            _subscriptions: subscriptions,
        }
    }

    pub fn touch(&self, descriptor: TypeDescriptor) {
        let capacity = self.settings.favorites_capacity();
        self.list.borrow_mut().touch(descriptor, capacity);
    }

    /// Replaces the contents, oldest first. Capacity applies from the next touch on.
    pub fn restore(&self, items: impl IntoIterator<Item = TypeDescriptor>) {
        let mut list = self.list.borrow_mut();
        list.clear();
        for item in items {
            list.touch(item, usize::MAX);
        }
    }

    pub fn remove(&self, descriptor: &TypeDescriptor) -> bool {
        self.list.borrow_mut().remove(descriptor)
    }

    pub fn clear(&self) {
        self.list.borrow_mut().clear();
    }

    pub fn contains(&self, descriptor: &TypeDescriptor) -> bool {
        self.list.borrow().contains(descriptor)
    }

    pub fn len(&self) -> usize {
        self.list.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.borrow().is_empty()
    }

    pub fn items(&self) -> Vec<TypeDescriptor> {
        self.list.borrow().iter().cloned().collect()
    }

    /// Most recent first, adjusted by the single-instance visibility policy.
    /// Hidden entries are filtered from the listing, never deleted.
    pub fn listing(&self, tracker: &SingleInstanceTracker) -> Vec<ListedType> {
        let visibility = self.settings.visibility();
        self.list
            .borrow()
            .recent_first()
            .filter_map(|descriptor| {
                let locked = locked(descriptor, tracker);
                if locked && visibility == Visibility::Hidden {
                    return None;
                }
                Some(ListedType {
                    descriptor: descriptor.clone(),
                    interactive: !locked,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use kiln_catalog::{StaticProvider, TypeCatalog, TypeDefinition};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::creation::CreatedAsset;
    use crate::settings::SettingsStore;

    fn catalog() -> TypeCatalog {
        let catalog = TypeCatalog::new();
        catalog.rebuild(&StaticProvider::new(vec![
            TypeDefinition::creatable("t.A", "A"),
            TypeDefinition::creatable("t.B", "B"),
            TypeDefinition::creatable("t.C", "C"),
            TypeDefinition::creatable("t.D", "D"),
            TypeDefinition::creatable("t.Project", "Project").single_instance(),
        ]));
        catalog
    }

    fn names(items: impl IntoIterator<Item = TypeDescriptor>) -> Vec<String> {
        items.into_iter().map(|d| d.name().to_string()).collect()
    }

    #[test]
    fn touching_a_member_moves_it_to_the_back() {
        let catalog = catalog();
        let mut list = RecencyList::new();
        for key in ["t.A", "t.B", "t.C"] {
            list.touch(catalog.resolve(key).unwrap(), 5);
        }
        list.touch(catalog.resolve("t.A").unwrap(), 5);

        assert_eq!(names(list.iter().cloned()), vec!["B", "C", "A"]);
        assert_eq!(names(list.recent_first().cloned()), vec!["A", "C", "B"]);
    }

    #[test]
    fn touching_at_capacity_evicts_only_the_oldest() {
        let catalog = catalog();
        let mut list = RecencyList::new();
        for key in ["t.A", "t.B", "t.C", "t.D"] {
            list.touch(catalog.resolve(key).unwrap(), 3);
        }
        assert_eq!(names(list.iter().cloned()), vec!["B", "C", "D"]);
    }

    #[test]
    fn history_follows_asset_created_with_live_capacity() {
        let catalog = catalog();
        let bus = EventBus::new();
        let settings = SettingsStore::new(bus.clone());
        let history = HistoryStore::new(&bus, settings.view());
        settings.set_history_capacity(2);
        for key in ["t.A", "t.B", "t.C"] {
            bus.publish(StudioEvent::AssetCreated(CreatedAsset {
                descriptor: catalog.resolve(key).unwrap(),
                path: PathBuf::from(format!("{key}.asset")),
            }));
        }
        assert_eq!(names(history.items()), vec!["B", "C"]);

        settings.clear_history();
        assert!(history.is_empty());
    }

    #[test]
    fn lowering_capacity_trims_on_the_next_touch() {
        let catalog = catalog();
        let bus = EventBus::new();
        let settings = SettingsStore::new(bus.clone());
        let favorites = FavoritesStore::new(&bus, settings.view());
        for key in ["t.A", "t.B", "t.C"] {
            favorites.touch(catalog.resolve(key).unwrap());
        }
        settings.set_favorites_capacity(1);
        assert_eq!(favorites.len(), 3);

        bus.publish(StudioEvent::FavoriteAdded(catalog.resolve("t.D").unwrap()));
        assert_eq!(names(favorites.items()), vec!["D"]);
    }

    #[test]
    fn favorites_listing_applies_visibility_policy() {
        let catalog = catalog();
        let bus = EventBus::new();
        let settings = SettingsStore::new(bus.clone());
        let favorites = FavoritesStore::new(&bus, settings.view());
        let project = catalog.resolve("t.Project").unwrap();
        favorites.touch(catalog.resolve("t.A").unwrap());
        favorites.touch(project.clone());
        let mut tracker = SingleInstanceTracker::new();
        tracker.refresh(&catalog, &|d: &TypeDescriptor| d.key().as_str() == "t.Project");

        let disabled = favorites.listing(&tracker);
        assert_eq!(disabled.len(), 2);
        assert_eq!(disabled[0].descriptor, project);
        assert!(!disabled[0].interactive);
        assert!(disabled[1].interactive);

        settings.set_visibility(Visibility::Hidden);
        let hidden = favorites.listing(&tracker);
        assert_eq!(names(hidden.into_iter().map(|l| l.descriptor)), vec!["A"]);
        assert!(favorites.contains(&project));
    }

    #[test]
    fn favorite_removed_and_cleared_events() {
        let catalog = catalog();
        let bus = EventBus::new();
        let settings = SettingsStore::new(bus.clone());
        let favorites = FavoritesStore::new(&bus, settings.view());
        let a = catalog.resolve("t.A").unwrap();
        bus.publish(StudioEvent::FavoriteAdded(a.clone()));
        bus.publish(StudioEvent::FavoriteAdded(catalog.resolve("t.B").unwrap()));
        bus.publish(StudioEvent::FavoriteRemoved(a.clone()));
        assert_eq!(names(favorites.items()), vec!["B"]);

        settings.clear_favorites();
        assert!(favorites.is_empty());
    }

    #[test]
    fn history_listing_marks_instantiated_single_instance_types() {
        let catalog = catalog();
        let bus = EventBus::new();
        let settings = SettingsStore::new(bus.clone());
        let history = HistoryStore::new(&bus, settings.view());
        history.touch(catalog.resolve("t.Project").unwrap());
        history.touch(catalog.resolve("t.B").unwrap());
        let mut tracker = SingleInstanceTracker::new();
        tracker.refresh(&catalog, &|_: &TypeDescriptor| true);

        let listing = history.listing(&tracker);
        assert_eq!(
            listing.iter().map(|l| l.interactive).collect::<Vec<_>>(),
            vec![true, false]
        );
    }
}
