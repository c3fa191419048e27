use std::fs;
use std::path::{Path, PathBuf};

use kiln_catalog::{ExistenceQuery, TypeDescriptor};
use kiln_studio::{
    default_asset_path, unique_path, AssetCreator, CreatedAsset, CreationError, CreationRequest,
    ASSET_EXTENSION,
};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// Contents of an `.asset` file written by [`FsAssetStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDocument {
    #[serde(rename = "type")]
    pub type_id: String,
    pub name: String,
}

/// Asset store backed by a directory tree.
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve_target(&self, request: &CreationRequest) -> PathBuf {
        match &request.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.root.join(path),
            None => default_asset_path(&self.root, &request.descriptor),
        }
    }

    /// Every readable asset document below the root.
    pub fn documents(&self) -> Vec<(PathBuf, AssetDocument)> {
        if !self.root.exists() {
            return Vec::new();
        }
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == ASSET_EXTENSION)
            })
            .filter_map(|entry| {
                let raw = fs::read_to_string(entry.path()).ok()?;
                match serde_json::from_str::<AssetDocument>(&raw) {
                    Ok(document) => Some((entry.into_path(), document)),
                    Err(err) => {
                        tracing::debug!(path = %entry.path().display(), %err, "not a kiln asset");
                        None
                    }
                }
            })
            .collect()
    }
}

impl AssetCreator for FsAssetStore {
    fn create(&mut self, request: &CreationRequest) -> Result<CreatedAsset, CreationError> {
        let requested = self.resolve_target(request);
        let path = if request.needs_unique_path() {
            unique_path(&requested, Path::exists)
        } else {
            requested
        };
        let io_error = |source| CreationError::Io {
            path: path.clone(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_error)?;
        }
        let document = AssetDocument {
            type_id: request.descriptor.key().to_string(),
            name: request.descriptor.name().to_string(),
        };
        let json = serde_json::to_string_pretty(&document)?;
        fs::write(&path, json).map_err(io_error)?;
        Ok(CreatedAsset {
            descriptor: request.descriptor.clone(),
            path,
        })
    }
}

impl ExistenceQuery for FsAssetStore {
    fn has_instance(&self, descriptor: &TypeDescriptor) -> bool {
        self.documents()
            .iter()
            .any(|(_, document)| document.type_id == descriptor.key().as_str())
    }
}
