use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{TypeDescriptor, TypeKey, TypeProvider};

/// Immutable result of one catalog rebuild.
#[derive(Debug)]
pub struct CatalogSnapshot {
    types: Vec<TypeDescriptor>,
    index: HashMap<TypeKey, usize>,
    generation: u64,
    rebuilt_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    fn empty() -> Self {
        Self {
            types: Vec::new(),
            index: HashMap::new(),
            generation: 0,
            rebuilt_at: Utc::now(),
        }
    }

    pub fn types(&self) -> &[TypeDescriptor] {
        &self.types
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.iter()
    }

    pub fn resolve(&self, key: &str) -> Option<&TypeDescriptor> {
        self.index.get(key).map(|&position| &self.types[position])
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn rebuilt_at(&self) -> DateTime<Utc> {
        self.rebuilt_at
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Authoritative list of creatable types.
///
/// A rebuild assembles a complete [`CatalogSnapshot`] before swapping it in,
/// so readers only ever observe the previous or the next catalog. Every
/// rebuild bumps the generation; derived views compare generations to notice
/// they have gone stale.
#[derive(Debug)]
pub struct TypeCatalog {
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(CatalogSnapshot::empty())),
        }
    }

    /// Replaces the catalog with every eligible definition from `provider`.
    pub fn rebuild(&self, provider: &dyn TypeProvider) -> Arc<CatalogSnapshot> {
        let mut types: Vec<TypeDescriptor> = Vec::new();
        let mut seen = HashSet::new();
        for definition in provider.definitions() {
            if !definition.is_eligible() {
                continue;
            }
            if !seen.insert(definition.id.clone()) {
                log::debug!("duplicate type definition {} ignored", definition.id);
                continue;
            }
            types.push(TypeDescriptor::from_definition(definition));
        }
        types.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.key().cmp(b.key())));
        let index = types
            .iter()
            .enumerate()
            .map(|(position, descriptor)| (descriptor.key().clone(), position))
            .collect();

        let mut guard = self.current.write();
        let snapshot = Arc::new(CatalogSnapshot {
            types,
            index,
            generation: guard.generation + 1,
            rebuilt_at: Utc::now(),
        });
        *guard = Arc::clone(&snapshot);
        drop(guard);

        log::info!(
            "type catalog rebuilt: {} creatable types (generation {})",
            snapshot.len(),
            snapshot.generation
        );
        snapshot
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.current.read())
    }

    pub fn resolve(&self, key: &str) -> Option<TypeDescriptor> {
        self.current.read().resolve(key).cloned()
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    pub fn rebuilt_at(&self) -> DateTime<Utc> {
        self.current.read().rebuilt_at
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    /// Returns a shareable handle that can be cloned across threads.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}
