//! In-process settings store.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use super::{SettingsError, SettingsStore};

#[derive(Debug, Default)]
struct Entries {
    numbers: HashMap<String, f64>,
    sets: HashMap<String, Vec<String>>,
}

/// Settings kept in memory for tests and ephemeral sessions.
///
/// Clones share the same entries, so a test can hand one handle to a cache
/// and inspect what it persisted through another.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    entries: Arc<Mutex<Entries>>,
}

impl MemorySettingsStore {
    /// Whether any value is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        let entries = self.lock();
        entries.numbers.contains_key(key) || entries.sets.contains_key(key)
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load_f64(&self, key: &str) -> Result<Option<f64>, SettingsError> {
        Ok(self.lock().numbers.get(key).copied())
    }

    fn store_f64(&mut self, key: &str, value: f64) -> Result<(), SettingsError> {
        self.lock().numbers.insert(key.to_owned(), value);
        Ok(())
    }

    fn load_string_set(&self, key: &str) -> Result<Vec<String>, SettingsError> {
        Ok(self.lock().sets.get(key).cloned().unwrap_or_default())
    }

    fn replace_string_set(&mut self, key: &str, members: &[String]) -> Result<(), SettingsError> {
        self.lock().sets.insert(key.to_owned(), members.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), SettingsError> {
        let mut entries = self.lock();
        entries.numbers.remove(key);
        entries.sets.remove(key);
        Ok(())
    }
}
