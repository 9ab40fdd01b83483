//! Key-value persistence used by the viewport cache and the offline area.
//!
//! Each consumer owns one store instance scoped to its own namespace, so keys
//! only need to be unique per consumer. Writes replace values wholesale;
//! string sets keep their member order so insertion-order eviction survives a
//! restart.

use std::error::Error as StdError;

use thiserror::Error;

mod memory;
#[cfg(feature = "store-sqlite")]
mod sqlite;

pub use memory::MemorySettingsStore;
#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqliteSettingsStore, SqliteSettingsStoreError};

/// Keys written by the viewport cache and the offline area manager.
pub mod keys {
    /// Ordered set of cached cell keys.
    pub const CACHED_AREAS: &str = "cached_areas";
    /// Offline radius in metres.
    pub const MAX_RADIUS: &str = "max_radius";
    /// Offline centre latitude.
    pub const CENTER_LAT: &str = "center_lat";
    /// Offline centre longitude.
    pub const CENTER_LON: &str = "center_lon";
}

/// Namespaces isolating the two consumers inside a shared backend.
pub mod namespaces {
    /// Namespace holding [`super::keys::CACHED_AREAS`].
    pub const VIEWPORT_CACHE: &str = "viewport_cache";
    /// Namespace holding the offline centre and radius.
    pub const OFFLINE_AREA: &str = "offline_area";
}

/// Errors surfaced by [`SettingsStore`] implementations.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The backing storage rejected the operation.
    #[error("settings backend failed for key {key}: {source}")]
    Backend {
        /// Key being read or written.
        key: String,
        /// Backend-specific failure.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    /// A stored value could not be represented.
    #[error("invalid value for key {key}: {message}")]
    InvalidValue {
        /// Key being read or written.
        key: String,
        /// Description of the problem.
        message: String,
    },
}

impl SettingsError {
    /// Wrap a backend error for `key`.
    pub fn backend<E>(key: &str, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Backend {
            key: key.to_owned(),
            source: Box::new(source),
        }
    }
}

/// Durable key-value storage for numbers and ordered string sets.
///
/// # Examples
///
/// ```
/// use mirador_core::{MemorySettingsStore, SettingsStore};
///
/// let mut store = MemorySettingsStore::default();
/// store.store_f64("max_radius", 5_000.0).expect("store radius");
/// assert_eq!(store.load_f64("max_radius").expect("load radius"), Some(5_000.0));
/// ```
pub trait SettingsStore {
    /// Read a number, `None` when the key is absent.
    fn load_f64(&self, key: &str) -> Result<Option<f64>, SettingsError>;

    /// Write a number, replacing any previous value.
    fn store_f64(&mut self, key: &str, value: f64) -> Result<(), SettingsError>;

    /// Read an ordered string set, empty when the key is absent.
    fn load_string_set(&self, key: &str) -> Result<Vec<String>, SettingsError>;

    /// Atomically replace the whole set stored under `key`.
    fn replace_string_set(&mut self, key: &str, members: &[String]) -> Result<(), SettingsError>;

    /// Delete a key of either kind. Absent keys are not an error.
    fn remove(&mut self, key: &str) -> Result<(), SettingsError>;
}

impl<T> SettingsStore for Box<T>
where
    T: SettingsStore + ?Sized,
{
    fn load_f64(&self, key: &str) -> Result<Option<f64>, SettingsError> {
        (**self).load_f64(key)
    }

    fn store_f64(&mut self, key: &str, value: f64) -> Result<(), SettingsError> {
        (**self).store_f64(key, value)
    }

    fn load_string_set(&self, key: &str) -> Result<Vec<String>, SettingsError> {
        (**self).load_string_set(key)
    }

    fn replace_string_set(&mut self, key: &str, members: &[String]) -> Result<(), SettingsError> {
        (**self).replace_string_set(key, members)
    }

    fn remove(&mut self, key: &str) -> Result<(), SettingsError> {
        (**self).remove(key)
    }
}
