//! Per-origin page storage.
//!
//! Backs the `localStorage` object of every non-incognito page. A page is
//! seeded with its origin's entries when it loads, and the store is updated
//! as guest code changes them. Incognito pages start empty and never
//! write back.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type StorageItems = BTreeMap<String, String>;

/// Shared handle to the persisted `localStorage` contents, keyed by origin.
///
/// Clones share the same data, so one store can back several bridges.
#[derive(Debug, Clone, Default)]
pub struct DataStore {
    origins: Arc<Mutex<HashMap<String, StorageItems>>>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn origins(&self) -> MutexGuard<'_, HashMap<String, StorageItems>> {
        self.origins.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, origin: &str, key: &str) -> Option<String> {
        self.origins().get(origin).and_then(|items| items.get(key).cloned())
    }

    pub fn set(&self, origin: &str, key: impl Into<String>, value: impl Into<String>) {
        self.origins()
            .entry(origin.to_string())
            .or_default()
            .insert(key.into(), value.into());
    }

    /// All entries stored for `origin`.
    pub fn snapshot(&self, origin: &str) -> StorageItems {
        self.origins().get(origin).cloned().unwrap_or_default()
    }

    /// Deletes one entry; an origin left without entries is forgotten.
    pub fn remove(&self, origin: &str, key: &str) {
        let mut origins = self.origins();
        let Some(items) = origins.get_mut(origin) else {
            return;
        };
        items.remove(key);
        if items.is_empty() {
            origins.remove(origin);
        }
    }

    /// Forgets everything stored for `origin`.
    pub fn clear(&self, origin: &str) {
        self.origins().remove(origin);
    }

    /// Origins that currently have stored entries, sorted.
    pub fn stored_origins(&self) -> Vec<String> {
        let mut origins: Vec<_> = self.origins().keys().cloned().collect();
        origins.sort();
        origins
    }
}
