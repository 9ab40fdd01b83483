//! Core domain types for the Mirador map data layer.
//!
//! The crate partitions the world into a fixed-size grid, remembers which
//! grid cells have already been fetched from the geodata provider, and bounds
//! downloads to a configurable radius around the user's home location. The
//! provider, the record store and the key-value settings store are modelled as
//! traits so callers inject concrete implementations at the composition root.

#![forbid(unsafe_code)]

pub mod bbox;
pub mod cache;
pub mod fetch;
pub mod grid;
pub mod offline;
pub mod place;
pub mod settings;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
#[doc(hidden)]
pub mod test_support;

pub use bbox::{BoundingBox, BoundingBoxParseError};
pub use cache::{
    CacheCapacityError, CacheStats, DEFAULT_MAX_CACHED_CELLS, ViewportCache, ViewportCacheConfig,
};
pub use fetch::{Connectivity, ConnectivityFlag, FetchError, PlaceFetcher, PlaceSearch};
pub use grid::{
    CoverageError, DEFAULT_CELL_SIZE, DEFAULT_MAX_CELLS_PER_REQUEST, GeoCell, GeoCellParseError,
    Grid, GridError, align_to_grid, cell_key,
};
pub use offline::{
    DEFAULT_MAX_RADIUS, OfflineAreaError, OfflineAreaInfo, OfflineAreaManager, RADIUS_LARGE_CITY,
    RADIUS_MEDIUM_CITY, RADIUS_METROPOLIS, RADIUS_SMALL_CITY, distance_meters,
};
pub use place::{DEFAULT_SOURCE, Place, PlaceKind, Tags};
pub use settings::{MemorySettingsStore, SettingsError, SettingsStore};
pub use store::{PlaceStore, PlaceStoreError};

#[cfg(feature = "store-sqlite")]
pub use settings::{SqliteSettingsStore, SqliteSettingsStoreError};
#[cfg(feature = "store-sqlite")]
pub use store::{SqlitePlaceStore, SqlitePlaceStoreError};
