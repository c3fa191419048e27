use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kiln_catalog::{
    builtin_provider, ExistenceQuery, ManifestConfig, ManifestProvider, SingleInstanceTracker,
    TypeCatalog, TypeDescriptor, TypeProvider,
};

use crate::cart::CartStore;
use crate::codec::{self, PersistedMap, WriteMode};
use crate::config::ConfigFile;
use crate::creation::{AssetCreator, CreatedAsset, CreationReport, CreationRequest};
use crate::error::{ConfigError, StudioError};
use crate::events::{EventBus, StudioEvent, Subscription, Topic};
use crate::recency::{FavoritesStore, HistoryStore, ListedType};
use crate::search::{SearchEngine, SearchHit, QUIET_INTERVAL};
use crate::settings::SettingsStore;

/// Host collaborator that both creates assets and answers existence queries.
pub trait AssetStore: AssetCreator + ExistenceQuery {}

impl<T: AssetCreator + ExistenceQuery> AssetStore for T {}

#[derive(Debug, Clone)]
pub struct StudioOptions {
    /// Overrides the platform configuration document location.
    pub config_path: Option<PathBuf>,
    /// Directories searched for `*.type.json` manifests. When empty the stock
    /// types are used.
    pub manifest_roots: Vec<PathBuf>,
    pub quiet_interval: Duration,
}

impl Default for StudioOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            manifest_roots: Vec::new(),
            quiet_interval: QUIET_INTERVAL,
        }
    }
}

impl StudioOptions {
    pub fn provider(&self) -> Box<dyn TypeProvider> {
        if self.manifest_roots.is_empty() {
            Box::new(builtin_provider())
        } else {
            Box::new(ManifestProvider::new(ManifestConfig {
                roots: self.manifest_roots.clone(),
                ..ManifestConfig::default()
            }))
        }
    }
}

/// One workspace session: the bus, the catalog and every store built on it.
pub struct Studio {
    bus: EventBus,
    catalog: Arc<TypeCatalog>,
    provider: Box<dyn TypeProvider>,
    tracker: SingleInstanceTracker,
    settings: SettingsStore,
    cart: CartStore,
    history: HistoryStore,
    favorites: FavoritesStore,
    search: SearchEngine,
    config: Option<ConfigFile>,
    last_ping: Rc<RefCell<Option<PathBuf>>>,
    _ping: Subscription,
}

impl Studio {
    /// Wires the stores together without touching the catalog or disk.
    pub fn new(provider: Box<dyn TypeProvider>, options: &StudioOptions) -> Self {
        let bus = EventBus::new();
        let settings = SettingsStore::new(bus.clone());
        let cart = CartStore::new(&bus);
        let history = HistoryStore::new(&bus, settings.view());
        let favorites = FavoritesStore::new(&bus, settings.view());
        let search = SearchEngine::with_quiet_interval(&bus, settings.view(), options.quiet_interval);

        let last_ping = Rc::new(RefCell::new(None));
        let ping_slot = Rc::clone(&last_ping);
        let ping_policy = settings.view();
        let ping = bus.subscribe(Topic::AssetCreated, move |event| {
            if let StudioEvent::AssetCreated(asset) = event {
                if ping_policy.ping_on_create() {
                    tracing::info!(path = %asset.path.display(), "created");
                    *ping_slot.borrow_mut() = Some(asset.path.clone());
                }
            }
        });

        let config = match &options.config_path {
            Some(path) => Some(ConfigFile::new(path)),
            None => match ConfigFile::at_default_location() {
                Ok(file) => Some(file),
                Err(error) => {
                    tracing::warn!(%error, "settings will not persist");
                    None
                }
            },
        };

        Self {
            bus,
            catalog: Arc::new(TypeCatalog::new()),
            provider,
            tracker: SingleInstanceTracker::new(),
            settings,
            cart,
            history,
            favorites,
            search,
            config,
            last_ping,
            _ping: ping,
        }
    }

    /// Builds the session, scans the catalog and loads the persisted state.
    pub fn open(options: &StudioOptions, existence: &dyn ExistenceQuery) -> Self {
        let mut studio = Self::new(options.provider(), options);
        studio.assets_changed(existence);
        studio.load();
        tracing::info!(types = studio.catalog.len(), "studio session opened");
        studio
    }

    /// Change signal: rebuild the catalog, refresh the single-instance view,
    /// then schedule a search re-filter.
    pub fn assets_changed(&mut self, existence: &dyn ExistenceQuery) {
        self.catalog.rebuild(self.provider.as_ref());
        self.tracker.refresh(&self.catalog, existence);
        self.search.invalidate();
    }

    /// Recomputes the single-instance view without rebuilding the catalog.
    pub fn refresh_instances(&mut self, existence: &dyn ExistenceQuery) {
        self.tracker.refresh(&self.catalog, existence);
        self.search.invalidate();
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Catalog handle for readers on other threads.
    pub fn shared_catalog(&self) -> Arc<TypeCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn tracker(&self) -> &SingleInstanceTracker {
        &self.tracker
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn cart(&self) -> &CartStore {
        &self.cart
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    pub fn config(&self) -> Option<&ConfigFile> {
        self.config.as_ref()
    }

    pub fn resolve(&self, key: &str) -> Result<TypeDescriptor, StudioError> {
        self.catalog
            .resolve(key)
            .ok_or_else(|| StudioError::UnknownType(key.to_string()))
    }

    pub fn is_locked(&self, descriptor: &TypeDescriptor) -> bool {
        descriptor.is_single_instance() && self.tracker.is_instantiated(descriptor)
    }

    fn creatable(&self, key: &str) -> Result<TypeDescriptor, StudioError> {
        let descriptor = self.resolve(key)?;
        if self.is_locked(&descriptor) {
            return Err(StudioError::SingleInstanceExists(key.to_string()));
        }
        Ok(descriptor)
    }

    pub fn add_to_cart(&self, key: &str) -> Result<TypeDescriptor, StudioError> {
        let descriptor = self.creatable(key)?;
        self.bus.publish(StudioEvent::CartAdd(descriptor.clone()));
        Ok(descriptor)
    }

    /// Queues `quantity` units of a type and returns the entry's quantity.
    pub fn add_units_to_cart(&self, key: &str, quantity: u32) -> Result<u32, StudioError> {
        let descriptor = self.creatable(key)?;
        self.cart.add_units(&descriptor, quantity)
    }

    pub fn remove_from_cart(&self, key: &str) -> Result<bool, StudioError> {
        let descriptor = self.resolve(key)?;
        let present = self.cart.contains(&descriptor);
        self.bus.publish(StudioEvent::CartRemove(descriptor));
        Ok(present)
    }

    /// Adds the type when absent, removes it when present. Returns whether the
    /// type is in the cart afterwards.
    pub fn toggle_cart(&self, key: &str) -> Result<bool, StudioError> {
        let descriptor = self.resolve(key)?;
        if self.cart.contains(&descriptor) {
            self.bus.publish(StudioEvent::CartRemove(descriptor));
            Ok(false)
        } else {
            self.add_to_cart(key)?;
            Ok(true)
        }
    }

    pub fn set_cart_path(&self, key: &str, path: impl Into<PathBuf>) -> Result<bool, StudioError> {
        let descriptor = self.resolve(key)?;
        Ok(self.cart.set_path(&descriptor, path))
    }

    pub fn favorite(&self, key: &str) -> Result<TypeDescriptor, StudioError> {
        let descriptor = self.resolve(key)?;
        if descriptor.is_single_instance() {
            return Err(StudioError::SingleInstanceFavorite(key.to_string()));
        }
        self.bus.publish(StudioEvent::FavoriteAdded(descriptor.clone()));
        Ok(descriptor)
    }

    pub fn unfavorite(&self, key: &str) -> Result<bool, StudioError> {
        let descriptor = self.resolve(key)?;
        let present = self.favorites.contains(&descriptor);
        self.bus.publish(StudioEvent::FavoriteRemoved(descriptor));
        Ok(present)
    }

    pub fn clear_history(&self) {
        self.settings.clear_history();
    }

    pub fn clear_favorites(&self) {
        self.settings.clear_favorites();
    }

    /// Creates everything in the cart, then refreshes the single-instance view.
    pub fn create_cart<S: AssetStore>(&mut self, store: &mut S) -> CreationReport {
        let report =
            self.cart
                .drain_and_create(store, &self.settings.view(), &self.tracker, &self.bus);
        self.refresh_instances(store);
        report
    }

    /// Creates a single instance at the collaborator's default location.
    pub fn quick_create<S: AssetStore>(
        &mut self,
        key: &str,
        store: &mut S,
    ) -> Result<CreatedAsset, StudioError> {
        let descriptor = self.creatable(key)?;
        let request = CreationRequest {
            descriptor,
            path: None,
            multiple: false,
            overwrite_existing: self.settings.overwrite_existing(),
        };
        let asset = store.create(&request).map_err(|error| {
            tracing::error!(asset_type = key, %error, "asset creation failed");
            error
        })?;
        self.bus.publish(StudioEvent::AssetCreated(asset.clone()));
        self.refresh_instances(store);
        Ok(asset)
    }

    /// Path of the most recent asset created while ping-on-create was enabled.
    pub fn take_ping(&self) -> Option<PathBuf> {
        self.last_ping.borrow_mut().take()
    }

    pub fn history_listing(&self) -> Vec<ListedType> {
        self.history.listing(&self.tracker)
    }

    pub fn favorites_listing(&self) -> Vec<ListedType> {
        self.favorites.listing(&self.tracker)
    }

    pub fn on_keystroke(&mut self, text: impl Into<String>, now: Instant) {
        self.search.on_keystroke(text, now);
    }

    pub fn tick(&mut self, now: Instant) -> bool {
        self.search.tick(now, &self.catalog, &self.tracker)
    }

    /// Filters for `text` right away, as when the operator confirms the query.
    pub fn search_now(&mut self, text: impl Into<String>) -> &[SearchHit] {
        self.search.on_keystroke(text, Instant::now());
        self.search.flush(&self.catalog, &self.tracker);
        self.search.results()
    }

    pub fn search(&self) -> &SearchEngine {
        &self.search
    }

    pub fn search_results(&self) -> &[SearchHit] {
        self.search.results()
    }

    /// Applies a persisted map to the lists and settings.
    pub fn restore(&self, map: &PersistedMap) {
        codec::deserialize(
            map,
            &self.catalog,
            &self.tracker,
            &self.history,
            &self.favorites,
            &self.settings,
        );
    }

    /// Writes the lists and settings into `map`.
    pub fn snapshot_into(&self, map: &mut PersistedMap, mode: WriteMode) {
        codec::serialize(&self.history, &self.favorites, &self.settings, map, mode);
    }

    /// Loads the configuration document. Any failure leaves the defaults in
    /// place and is only reported as a warning.
    pub fn load(&self) {
        let Some(config) = &self.config else {
            return;
        };
        match config.load() {
            Ok(map) => {
                self.restore(&map);
                self.settings.mark_clean();
            }
            Err(error) => {
                tracing::warn!(path = %config.path().display(), %error, "using default configuration")
            }
        }
    }

    /// Writes the configuration document. Keys this session does not own are
    /// carried over from the existing document; a document that exists but
    /// cannot be read is left untouched and the error returned.
    pub fn save(&self) -> Result<(), ConfigError> {
        let Some(config) = &self.config else {
            return Ok(());
        };
        let mut map = match config.load() {
            Ok(map) => map,
            Err(ConfigError::Missing(_)) => PersistedMap::new(),
            Err(error) => {
                tracing::warn!(path = %config.path().display(), %error, "refusing to replace an unreadable configuration");
                return Err(error);
            }
        };
        self.snapshot_into(&mut map, WriteMode::Overwrite);
        config.save(&map)?;
        self.settings.mark_clean();
        tracing::debug!(path = %config.path().display(), "configuration saved");
        Ok(())
    }

    /// Ends the session, persisting its state.
    pub fn close(self) -> Result<(), ConfigError> {
        self.save()?;
        tracing::info!("studio session closed");
        Ok(())
    }
}
