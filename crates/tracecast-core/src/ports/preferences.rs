//! Preference store port.
//!
//! The store is a plain key/value contract over two keys. How values are
//! persisted (browser storage, a JSON file, a database row) is entirely the
//! implementation's business.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

/// The persisted preference keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceKey {
    /// `"voiceEnabled"`: `"true"` or `"false"`.
    VoiceEnabled,
    /// `"speed"`: `"slow"`, `"normal"` or `"fast"`.
    Speed,
}

impl PreferenceKey {
    /// All keys.
    pub const ALL: [Self; 2] = [Self::VoiceEnabled, Self::Speed];

    /// Storage key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VoiceEnabled => "voiceEnabled",
            Self::Speed => "speed",
        }
    }

    /// Parse a storage key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

impl fmt::Display for PreferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by preference storage.
#[derive(Debug, Error)]
pub enum PreferenceError {
    /// The backing store failed.
    #[error("Preference storage failed: {0}")]
    Storage(String),

    /// A stored value could not be interpreted.
    #[error("Invalid value '{value}' stored for '{key}'")]
    InvalidValue { key: PreferenceKey, value: String },

    /// IO error (preference file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key/value persistence for user preferences.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Read a raw value. `Ok(None)` means the key was never written.
    async fn get(&self, key: PreferenceKey) -> Result<Option<String>, PreferenceError>;

    /// Write a raw value.
    async fn set(&self, key: PreferenceKey, value: String) -> Result<(), PreferenceError>;
}

/// Non-persistent store for tests and embedders without storage.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: RwLock<HashMap<PreferenceKey, String>>,
}

impl MemoryPreferenceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self, key: PreferenceKey) -> Result<Option<String>, PreferenceError> {
        Ok(self.values.read().await.get(&key).cloned())
    }

    async fn set(&self, key: PreferenceKey, value: String) -> Result<(), PreferenceError> {
        self.values.write().await.insert(key, value);
        Ok(())
    }
}
