//! Facade crate for the Mirador places map data layer.
//!
//! This crate re-exports the grid, viewport cache and offline area types and
//! exposes the SQLite stores and the Overpass-backed repository behind
//! feature flags.

#![forbid(unsafe_code)]

pub use mirador_core::{
    BoundingBox, CacheStats, Connectivity, ConnectivityFlag, FetchError, GeoCell, Grid,
    OfflineAreaError, OfflineAreaInfo, OfflineAreaManager, Place, PlaceFetcher, PlaceKind,
    PlaceSearch, PlaceStore, PlaceStoreError, SettingsError, SettingsStore, ViewportCache,
    ViewportCacheConfig,
};

#[cfg(feature = "store-sqlite")]
pub use mirador_core::{
    SqlitePlaceStore, SqlitePlaceStoreError, SqliteSettingsStore, SqliteSettingsStoreError,
};

#[cfg(feature = "overpass")]
pub use mirador_data::{
    OverpassFetcher, OverpassFetcherConfig, PlacesRepository, RepositoryError, SyncOutcome,
};
