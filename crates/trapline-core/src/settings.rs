//! Persisted user preferences

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{CoreError, CoreResult};

/// Preferences that persist across sessions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Show a desktop notification for every captured message
    #[serde(default)]
    pub notifications: bool,
}

/// Preferences backed by a JSON file
pub struct PreferenceStore {
    path: PathBuf,
    prefs: Mutex<Preferences>,
}

impl PreferenceStore {
    /// `preferences.json` in the platform config directory
    pub fn default_path() -> CoreResult<PathBuf> {
        let dirs = ProjectDirs::from("", "", "trapline").ok_or_else(|| {
            CoreError::SettingsError("cannot determine config directory".to_string())
        })?;
        Ok(dirs.config_dir().join("preferences.json"))
    }

    /// Load preferences from `path`.
    ///
    /// A missing or unreadable file yields the defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let prefs = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| match serde_json::from_str(&s) {
                Ok(prefs) => Some(prefs),
                Err(e) => {
                    warn!("Ignoring corrupt preferences at {}: {}", path.display(), e);
                    None
                }
            })
            .unwrap_or_default();
        debug!("Loaded preferences from {}: {:?}", path.display(), prefs);

        Self {
            path,
            prefs: Mutex::new(prefs),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Preferences> {
        self.prefs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> Preferences {
        self.lock().clone()
    }

    pub fn notifications(&self) -> bool {
        self.lock().notifications
    }

    pub fn set_notifications(&self, enabled: bool) -> CoreResult<()> {
        let snapshot = {
            let mut prefs = self.lock();
            prefs.notifications = enabled;
            prefs.clone()
        };
        self.save(&snapshot)
    }

    fn save(&self, prefs: &Preferences) -> CoreResult<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(prefs)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::load(dir.path().join("nope.json"));
        assert_eq!(store.get(), Preferences::default());
        assert!(!store.notifications());
    }

    #[test]
    fn test_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.json");

        let store = PreferenceStore::load(&path);
        store.set_notifications(true).unwrap();

        let reloaded = PreferenceStore::load(&path);
        assert!(reloaded.notifications());
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = PreferenceStore::load(&path);
        assert!(!store.notifications());
    }
}
