use std::collections::HashSet;

use crate::{TypeCatalog, TypeDescriptor, TypeKey};

/// Answers whether the host's asset store holds at least one instance of a type.
pub trait ExistenceQuery {
    fn has_instance(&self, descriptor: &TypeDescriptor) -> bool;
}

impl<F> ExistenceQuery for F
where
    F: Fn(&TypeDescriptor) -> bool,
{
    fn has_instance(&self, descriptor: &TypeDescriptor) -> bool {
        self(descriptor)
    }
}

/// Tracks which single-instance types already have their one instance.
///
/// The view is tied to the catalog generation it was computed from and has to
/// be refreshed after every catalog rebuild.
#[derive(Debug, Default, Clone)]
pub struct SingleInstanceTracker {
    instantiated: HashSet<TypeKey>,
    generation: u64,
}

impl SingleInstanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh(&mut self, catalog: &TypeCatalog, query: &dyn ExistenceQuery) {
        let snapshot = catalog.snapshot();
        self.instantiated = snapshot
            .iter()
            .filter(|descriptor| descriptor.is_single_instance())
            .filter(|descriptor| query.has_instance(descriptor))
            .map(|descriptor| descriptor.key().clone())
            .collect();
        self.generation = snapshot.generation();
        log::debug!(
            "{} single-instance types already instantiated",
            self.instantiated.len()
        );
    }

    pub fn is_instantiated(&self, descriptor: &TypeDescriptor) -> bool {
        self.instantiated.contains(descriptor.key())
    }

    pub fn is_key_instantiated(&self, key: &str) -> bool {
        self.instantiated.contains(key)
    }

    pub fn is_stale(&self, catalog: &TypeCatalog) -> bool {
        self.generation != catalog.generation()
    }

    pub fn len(&self) -> usize {
        self.instantiated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instantiated.is_empty()
    }
}
