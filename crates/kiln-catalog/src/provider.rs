use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::TypeDefinition;

/// File name suffix identifying a type manifest on disk.
pub const MANIFEST_SUFFIX: &str = ".type.json";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Source of every type definition currently loaded by the host.
pub trait TypeProvider {
    fn definitions(&self) -> Vec<TypeDefinition>;
}

/// Fixed set of definitions, handy for embedding hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    definitions: Vec<TypeDefinition>,
}

impl StaticProvider {
    pub fn new(definitions: Vec<TypeDefinition>) -> Self {
        Self { definitions }
    }

    pub fn push(&mut self, definition: TypeDefinition) {
        self.definitions.push(definition);
    }

    pub fn retain(&mut self, keep: impl FnMut(&TypeDefinition) -> bool) {
        self.definitions.retain(keep);
    }
}

impl TypeProvider for StaticProvider {
    fn definitions(&self) -> Vec<TypeDefinition> {
        self.definitions.clone()
    }
}

#[derive(Debug, Clone)]
pub struct ManifestConfig {
    pub roots: Vec<PathBuf>,
    pub max_depth: usize,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            max_depth: 4,
        }
    }
}

/// Discovers `*.type.json` manifests below a set of roots.
#[derive(Debug, Clone, Default)]
pub struct ManifestProvider {
    config: ManifestConfig,
}

impl ManifestProvider {
    pub fn new(config: ManifestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ManifestConfig {
        &self.config
    }

    pub fn read_manifest(path: &Path) -> Result<TypeDefinition, CatalogError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn is_manifest(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(MANIFEST_SUFFIX))
            .unwrap_or(false)
}

impl TypeProvider for ManifestProvider {
    fn definitions(&self) -> Vec<TypeDefinition> {
        let mut definitions = Vec::new();
        for root in &self.config.roots {
            if !root.exists() {
                log::debug!("type root {} does not exist", root.display());
                continue;
            }
            let walker = WalkDir::new(root)
                .max_depth(self.config.max_depth)
                .sort_by_file_name()
                .into_iter();
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        if let Some(io) = err.io_error() {
                            log::debug!("skipping entry while scanning {}: {}", root.display(), io);
                        }
                        continue;
                    }
                };
                if !is_manifest(entry.path()) {
                    continue;
                }
                match Self::read_manifest(entry.path()) {
                    Ok(definition) => definitions.push(definition),
                    Err(err) => {
                        log::warn!("ignoring type manifest {}: {}", entry.path().display(), err)
                    }
                }
            }
        }
        definitions
    }
}

/// Concatenates the output of several providers in order.
#[derive(Default)]
pub struct ChainProvider {
    providers: Vec<Box<dyn TypeProvider>>,
}

impl ChainProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl TypeProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }
}

impl TypeProvider for ChainProvider {
    fn definitions(&self) -> Vec<TypeDefinition> {
        self.providers
            .iter()
            .flat_map(|provider| provider.definitions())
            .collect()
    }
}
