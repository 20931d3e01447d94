//! JSON-file preference store.
//!
//! Format: a flat JSON object of string values keyed by
//! [`PreferenceKey::as_str`].
//! ```text
//! { "voiceEnabled": "true", "speed": "fast" }
//! ```
//!
//! Writes go to `<file>.tmp` and are renamed into place, so a crash never
//! leaves a half-written file behind.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracecast_core::{PreferenceError, PreferenceKey, PreferenceStore};

type Entries = BTreeMap<String, String>;

/// [`PreferenceStore`] backed by a single JSON file.
pub struct JsonFilePreferenceStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file contents. A missing file is an empty store.
    async fn read(&self) -> Result<Entries, PreferenceError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Entries::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            PreferenceError::Storage(format!("{} is not valid JSON: {e}", self.path.display()))
        })
    }

    async fn write(&self, entries: &Entries) -> Result<(), PreferenceError> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).await?;
        }

        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| PreferenceError::Storage(e.to_string()))?;

        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for JsonFilePreferenceStore {
    async fn get(&self, key: PreferenceKey) -> Result<Option<String>, PreferenceError> {
        Ok(self.read().await?.remove(key.as_str()))
    }

    async fn set(&self, key: PreferenceKey, value: String) -> Result<(), PreferenceError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read().await?;
        entries.insert(key.as_str().to_string(), value);
        self.write(&entries).await?;
        tracing::debug!(%key, path = %self.path.display(), "Preference saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracecast_core::{PreferenceService, SpeedPreset, UserPreference};

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFilePreferenceStore::new(dir.path().join("prefs.json"));
        assert_eq!(store.get(PreferenceKey::Speed).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_creates_file_and_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");
        let store = JsonFilePreferenceStore::new(&path);

        store
            .set(PreferenceKey::Speed, "fast".to_string())
            .await
            .unwrap();
        store
            .set(PreferenceKey::VoiceEnabled, "false".to_string())
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let entries: Entries = serde_json::from_str(&content).unwrap();
        assert_eq!(entries.get("speed").map(String::as_str), Some("fast"));
        assert_eq!(entries.get("voiceEnabled").map(String::as_str), Some("false"));
        assert!(!dir.path().join("nested").join("prefs.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let service = PreferenceService::new(std::sync::Arc::new(JsonFilePreferenceStore::new(&path)));
        service
            .save(UserPreference {
                voice_enabled: false,
                speed: SpeedPreset::Slow,
            })
            .await
            .unwrap();

        let reopened = PreferenceService::new(std::sync::Arc::new(JsonFilePreferenceStore::new(&path)));
        let loaded = reopened.load().await.unwrap();
        assert!(!loaded.voice_enabled);
        assert_eq!(loaded.speed, SpeedPreset::Slow);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_storage_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFilePreferenceStore::new(&path);
        let result = store.get(PreferenceKey::Speed).await;
        assert!(matches!(result, Err(PreferenceError::Storage(_))));
    }
}
