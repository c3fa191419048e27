use std::fs;
use std::path::{Path, PathBuf};

use crate::codec::PersistedMap;
use crate::error::ConfigError;

const APP_DIR_NAME: &str = "Kiln";
const CONFIG_FILE: &str = "configurations.json";

/// `<platform config dir>/Kiln/configurations.json`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE))
}

/// The persisted configuration document on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn at_default_location() -> Result<Self, ConfigError> {
        default_config_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<PersistedMap, ConfigError> {
        if !self.path.exists() {
            return Err(ConfigError::Missing(self.path.clone()));
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, map: &PersistedMap) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).map_err(write_error)?;
            }
        }
        let json = serde_json::to_string_pretty(map).map_err(ConfigError::Encode)?;
        fs::write(&self.path, json).map_err(write_error)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::codec::PersistedValue;

    #[test]
    fn save_creates_the_directory_and_load_reads_it_back() {
        let dir = tempdir().unwrap();
        let file = ConfigFile::new(dir.path().join("nested").join(CONFIG_FILE));
        let mut map = PersistedMap::new();
        map.insert("h_0".into(), "t.A".into());
        map.insert("history_capacity".into(), PersistedValue::Int(25));
        map.insert("ping_on_create".into(), PersistedValue::Bool(true));

        file.save(&map).unwrap();
        let loaded = file.load().unwrap();

        assert_eq!(loaded, map);
        assert_eq!(
            loaded.keys().collect::<Vec<_>>(),
            vec!["h_0", "history_capacity", "ping_on_create"]
        );
    }

    #[test]
    fn missing_and_malformed_files_are_reported() {
        let dir = tempdir().unwrap();
        let file = ConfigFile::new(dir.path().join(CONFIG_FILE));
        assert!(matches!(file.load(), Err(ConfigError::Missing(_))));

        fs::write(file.path(), "{ not json").unwrap();
        assert!(matches!(file.load(), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn default_location_ends_with_the_app_directory() {
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with(Path::new(APP_DIR_NAME).join(CONFIG_FILE)));
        }
    }
}
