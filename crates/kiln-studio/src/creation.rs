use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use kiln_catalog::{ExistenceQuery, TypeDescriptor, TypeKey};
use thiserror::Error;

/// File extension of assets produced by the studio.
pub const ASSET_EXTENSION: &str = "asset";

/// What the studio asks the host to instantiate.
#[derive(Debug, Clone)]
pub struct CreationRequest {
    pub descriptor: TypeDescriptor,
    /// Requested location; `None` lets the collaborator pick its default.
    pub path: Option<PathBuf>,
    /// More than one instance of this type is being created in the batch.
    pub multiple: bool,
    pub overwrite_existing: bool,
}

impl CreationRequest {
    pub fn needs_unique_path(&self) -> bool {
        self.multiple || !self.overwrite_existing
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedAsset {
    pub descriptor: TypeDescriptor,
    pub path: PathBuf,
}

#[derive(Debug, Error)]
pub enum CreationError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode asset: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("creation rejected: {0}")]
    Rejected(String),
    #[error("{0} is single-instance and already has an instance")]
    SingleInstanceExists(String),
}

/// Host primitive that instantiates and saves an asset.
pub trait AssetCreator {
    fn create(&mut self, request: &CreationRequest) -> Result<CreatedAsset, CreationError>;
}

#[derive(Debug)]
pub struct CreationFailure {
    pub descriptor: TypeDescriptor,
    pub error: CreationError,
}

/// Outcome of a batch creation.
#[derive(Debug, Default)]
pub struct CreationReport {
    pub created: Vec<CreatedAsset>,
    pub failures: Vec<CreationFailure>,
}

impl CreationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// `<root>/<TypeName>.asset`
pub fn default_asset_path(root: &Path, descriptor: &TypeDescriptor) -> PathBuf {
    root.join(format!("{}.{}", descriptor.name(), ASSET_EXTENSION))
}

/// Returns `path` if free, otherwise the first free `"<stem> N.<ext>"` sibling.
pub fn unique_path(path: &Path, exists: impl Fn(&Path) -> bool) -> PathBuf {
    if !exists(path) {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned());
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut counter = 1u32;
    loop {
        let name = match &extension {
            Some(ext) => format!("{stem} {counter}.{ext}"),
            None => format!("{stem} {counter}"),
        };
        let candidate = parent.join(name);
        if !exists(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// In-memory asset store, used by embedding hosts without a disk and by tests.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    root: PathBuf,
    assets: HashMap<PathBuf, TypeKey>,
    rejected: HashSet<TypeKey>,
}

impl MemoryAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Every future creation of `key` fails with [`CreationError::Rejected`].
    pub fn reject(&mut self, key: impl Into<TypeKey>) {
        self.rejected.insert(key.into());
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, key: impl Into<TypeKey>) {
        self.assets.insert(path.into(), key.into());
    }

    pub fn remove(&mut self, path: &Path) -> Option<TypeKey> {
        self.assets.remove(path)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn count_of(&self, key: &str) -> usize {
        self.assets
            .values()
            .filter(|stored| stored.as_str() == key)
            .count()
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.assets.contains_key(path)
    }
}

impl AssetCreator for MemoryAssetStore {
    fn create(&mut self, request: &CreationRequest) -> Result<CreatedAsset, CreationError> {
        let key = request.descriptor.key();
        if self.rejected.contains(key) {
            return Err(CreationError::Rejected(format!("{key} is not accepted")));
        }
        let requested = request
            .path
            .clone()
            .unwrap_or_else(|| default_asset_path(&self.root, &request.descriptor));
        let path = if request.needs_unique_path() {
            unique_path(&requested, |candidate| self.assets.contains_key(candidate))
        } else {
            requested
        };
        self.assets.insert(path.clone(), key.clone());
        Ok(CreatedAsset {
            descriptor: request.descriptor.clone(),
            path,
        })
    }
}

impl ExistenceQuery for MemoryAssetStore {
    fn has_instance(&self, descriptor: &TypeDescriptor) -> bool {
        self.assets.values().any(|key| key == descriptor.key())
    }
}

#[cfg(test)]
mod tests {
    use kiln_catalog::{StaticProvider, TypeCatalog, TypeDefinition};
    use pretty_assertions::assert_eq;

    use super::*;

    fn weapon() -> TypeDescriptor {
        let catalog = TypeCatalog::new();
        catalog.rebuild(&StaticProvider::new(vec![TypeDefinition::creatable(
            "game.Weapon",
            "Weapon",
        )]));
        catalog.resolve("game.Weapon").unwrap()
    }

    fn request(path: Option<&str>, multiple: bool, overwrite_existing: bool) -> CreationRequest {
        CreationRequest {
            descriptor: weapon(),
            path: path.map(PathBuf::from),
            multiple,
            overwrite_existing,
        }
    }

    #[test]
    fn unique_path_appends_the_first_free_counter() {
        let taken = [PathBuf::from("a/Weapon.asset"), PathBuf::from("a/Weapon 1.asset")];
        let result = unique_path(Path::new("a/Weapon.asset"), |p| taken.iter().any(|t| t == p));
        assert_eq!(result, PathBuf::from("a/Weapon 2.asset"));
        let free = unique_path(Path::new("a/Other.asset"), |p| taken.iter().any(|t| t == p));
        assert_eq!(free, PathBuf::from("a/Other.asset"));
    }

    #[test]
    fn overwrite_reuses_the_requested_path() {
        let mut store = MemoryAssetStore::new("assets");
        store.create(&request(None, false, true)).unwrap();
        let second = store.create(&request(None, false, true)).unwrap();
        assert_eq!(second.path, PathBuf::from("assets/Weapon.asset"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn multiple_or_non_overwriting_requests_get_unique_paths() {
        let mut store = MemoryAssetStore::new("assets");
        store.create(&request(Some("x/W.asset"), true, true)).unwrap();
        let second = store.create(&request(Some("x/W.asset"), true, true)).unwrap();
        let third = store.create(&request(Some("x/W.asset"), false, false)).unwrap();
        assert_eq!(second.path, PathBuf::from("x/W 1.asset"));
        assert_eq!(third.path, PathBuf::from("x/W 2.asset"));
        assert_eq!(store.count_of("game.Weapon"), 3);
        assert!(store.has_instance(&weapon()));
    }

    #[test]
    fn rejected_types_fail() {
        let mut store = MemoryAssetStore::new("assets");
        store.reject("game.Weapon");
        assert!(matches!(
            store.create(&request(None, false, false)),
            Err(CreationError::Rejected(_))
        ));
        assert!(store.is_empty());
    }
}
