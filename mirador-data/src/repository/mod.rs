//! Viewport-driven download orchestration.
//!
//! [`PlacesRepository`] decides when the map needs fresh data: it consults
//! the viewport cache, bounds requests to the offline area, downloads the
//! missing regions through a [`PlaceFetcher`] and records them in a
//! [`PlaceStore`]. Reads always come from the store, so the map keeps
//! working offline with whatever was downloaded before.
//!
//! Network calls happen outside every lock. Fetch failures are logged and
//! leave the affected cells uncached so the next viewport query retries them.

use std::{
    collections::HashSet,
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

use mirador_core::{
    BoundingBox, Connectivity, DEFAULT_SOURCE, OfflineAreaError, OfflineAreaInfo,
    OfflineAreaManager, Place, PlaceFetcher, PlaceSearch, PlaceStore, PlaceStoreError,
    SettingsStore, ViewportCache,
};
use thiserror::Error;


/// Default ceiling on tiles fetched by one preload or sync.
pub const DEFAULT_MAX_PRELOAD_TILES: usize = 100;

/// Queries shorter than this many characters are not sent to the provider.
pub const MIN_SEARCH_CHARS: usize = 3;

/// Radii tried in turn by [`PlacesRepository::search_global`], in metres.
pub const SEARCH_RADII: [f64; 5] = [5_000.0, 20_000.0, 50_000.0, 100_000.0, 500_000.0];

/// Results per radius, and the count at which widening stops.
pub const SEARCH_LIMIT: usize = 20;

/// Results requested by the location-free fallback search.
pub const GLOBAL_SEARCH_LIMIT: usize = 50;

/// Radius index after which an empty search falls back to a global one.
const GLOBAL_FALLBACK_AFTER: usize = 1;

/// Errors surfaced by [`PlacesRepository`].
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The local place store failed.
    #[error(transparent)]
    Store(#[from] PlaceStoreError),
    /// The operation needs the network and the device is offline.
    #[error("no network connection")]
    Offline,
    /// A preload would need more requests than allowed.
    #[error("area needs {tiles} requests, more than the limit of {limit}")]
    AreaTooLarge {
        /// Tiles the area splits into.
        tiles: usize,
        /// Configured ceiling.
        limit: usize,
    },
    /// The offline area rejected a new centre or radius.
    #[error(transparent)]
    OfflineArea(#[from] OfflineAreaError),
}

/// Outcome of a batch of region downloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DownloadReport {
    /// Regions requested from the provider.
    pub requested: usize,
    /// Regions whose request failed.
    pub failed: usize,
    /// Regions skipped because they were already cached.
    pub skipped: usize,
    /// Places received and stored.
    pub places: usize,
}

/// Result of [`PlacesRepository::sync_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", content = "report", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Nothing was attempted because the device is offline.
    Offline,
    /// Nothing was attempted because no offline area is configured.
    Unconfigured,
    /// The offline area was downloaded again.
    Refreshed(DownloadReport),
}

/// Summary of cached data for display.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CacheInfo {
    /// Cells recorded as fetched.
    pub cached_cells: usize,
    /// Approximate area of those cells in km².
    pub cached_area_km2: f64,
    /// Whether an offline area centre is set.
    pub offline_configured: bool,
    /// Offline centre latitude, `0.0` when unconfigured.
    pub offline_center_lat: f64,
    /// Offline centre longitude, `0.0` when unconfigured.
    pub offline_center_lon: f64,
    /// Offline radius in kilometres.
    pub offline_radius_km: f64,
}

/// Serves map places from local storage, downloading missing regions first.
///
/// ```
/// use geo::Coord;
/// use mirador_core::{
///     BoundingBox, ConnectivityFlag, MemorySettingsStore, OfflineAreaManager, Place,
///     ViewportCache,
///     test_support::{MemoryPlaceStore, StubPlaceFetcher},
/// };
/// use mirador_data::PlacesRepository;
///
/// let settings = MemorySettingsStore::default();
/// let museum = Place::new("osm_node_1", "Museo del Oro", "museum", Coord { x: -74.0721, y: 4.6019 });
/// let repository = PlacesRepository::new(
///     ViewportCache::new(settings.clone()),
///     OfflineAreaManager::new(settings),
///     StubPlaceFetcher::with_places([museum]),
///     MemoryPlaceStore::default(),
///     ConnectivityFlag::new(true),
/// );
///
/// let places = repository.places_in_viewport(&BoundingBox::new(4.59, 4.61, -74.08, -74.06))?;
/// assert_eq!(places.len(), 1);
/// # Ok::<(), mirador_data::RepositoryError>(())
/// ```
pub struct PlacesRepository<F, P, C, S> {
    cache: ViewportCache<S>,
    offline: Mutex<OfflineAreaManager<S>>,
    fetcher: F,
    store: P,
    connectivity: C,
    max_preload_tiles: usize,
}

impl<F, P, C, S> fmt::Debug for PlacesRepository<F, P, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlacesRepository")
            .field("cache", &self.cache)
            .field("max_preload_tiles", &self.max_preload_tiles)
            .finish_non_exhaustive()
    }
}

impl<F, P, C, S> PlacesRepository<F, P, C, S>
where
    F: PlaceFetcher,
    P: PlaceStore,
    C: Connectivity,
    S: SettingsStore,
{
    /// Assemble a repository from its collaborators.
    pub fn new(
        cache: ViewportCache<S>,
        offline: OfflineAreaManager<S>,
        fetcher: F,
        store: P,
        connectivity: C,
    ) -> Self {
        Self {
            cache,
            offline: Mutex::new(offline),
            fetcher,
            store,
            connectivity,
            max_preload_tiles: DEFAULT_MAX_PRELOAD_TILES,
        }
    }

    /// Limit the number of requests one preload or sync may issue.
    #[must_use]
    pub fn with_max_preload_tiles(mut self, limit: usize) -> Self {
        self.max_preload_tiles = limit;
        self
    }

    /// The viewport cache.
    pub const fn cache(&self) -> &ViewportCache<S> {
        &self.cache
    }

    /// The local place store.
    pub const fn store(&self) -> &P {
        &self.store
    }

    /// The remote provider.
    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// The connectivity source.
    pub const fn connectivity(&self) -> &C {
        &self.connectivity
    }

    fn offline(&self) -> MutexGuard<'_, OfflineAreaManager<S>> {
        self.offline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the home location and radius that bound every download.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::OfflineArea`] when the centre or radius is invalid.
    /// A valid centre is kept even when the radius is rejected.
    pub fn set_offline_center(
        &self,
        lat: f64,
        lon: f64,
        radius_meters: f64,
    ) -> Result<(), RepositoryError> {
        let mut offline = self.offline();
        offline.set_offline_center(lat, lon)?;
        offline.set_max_radius(radius_meters)?;
        Ok(())
    }

    /// Current offline area configuration.
    pub fn offline_area_info(&self) -> OfflineAreaInfo {
        self.offline().offline_area_info()
    }

    /// Remove the offline area; downloads become unbounded.
    pub fn clear_offline_area(&self) {
        self.offline().clear_offline_area();
    }

    /// Places inside `bbox`, downloading the uncached parts first when online.
    ///
    /// The download is limited to the offline area. Regions small enough for
    /// the cache to track are fetched per missing area and marked as cached;
    /// larger regions are fetched in one request and left unmarked.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Store`] when storing or reading places fails.
    /// Download failures are logged, not returned.
    pub fn places_in_viewport(&self, bbox: &BoundingBox) -> Result<Vec<Place>, RepositoryError> {
        if self.cache.is_area_cached(bbox) {
            log::debug!("viewport {bbox} cached; serving local data");
        } else if !self.connectivity.is_online() {
            log::debug!("offline; serving local data for {bbox}");
        } else {
            let clipped = self.offline().clip_to_offline_area(bbox);
            match clipped {
                Some(clipped) => self.fetch_missing(&clipped)?,
                None => log::debug!("viewport {bbox} outside offline area; serving local data"),
            }
        }
        Ok(self.store.places_in_bounds(bbox)?)
    }

    fn fetch_missing(&self, clipped: &BoundingBox) -> Result<(), RepositoryError> {
        if !self.cache.grid().accepts(clipped) {
            log::debug!("{clipped} too large to track; fetching without caching");
            self.download(clipped, false)?;
            return Ok(());
        }
        let missing = self.cache.get_missing_areas(clipped);
        log::debug!("{} missing areas inside {clipped}", missing.len());
        for area in missing {
            let bounded = self.offline().clip_to_offline_area(&area);
            if let Some(bounded) = bounded {
                self.download(&bounded, true)?;
            }
        }
        Ok(())
    }

    /// Fetch and store one region. Returns the number of places stored, or
    /// `None` when the fetch failed.
    fn download(&self, bbox: &BoundingBox, mark: bool) -> Result<Option<usize>, PlaceStoreError> {
        let places = match self.fetcher.fetch_places(bbox) {
            Ok(places) => places,
            Err(err) => {
                log::warn!("failed to download places for {bbox}: {err}");
                return Ok(None);
            }
        };
        if !places.is_empty() {
            self.store.upsert_places(&places)?;
        }
        if mark {
            self.cache.mark_area_as_cached(bbox);
        }
        log::debug!("stored {} places for {bbox}", places.len());
        Ok(Some(places.len()))
    }

    /// Download a region for offline use, tile by tile.
    ///
    /// The region is limited to the offline area and split into tiles the
    /// cache can track. Tiles already cached are skipped.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Offline`] without a connection,
    /// [`RepositoryError::AreaTooLarge`] when the region needs more tiles than
    /// allowed and [`RepositoryError::Store`] when storing fails.
    pub fn preload_area(&self, bbox: &BoundingBox) -> Result<DownloadReport, RepositoryError> {
        if !self.connectivity.is_online() {
            return Err(RepositoryError::Offline);
        }
        let clipped = self.offline().clip_to_offline_area(bbox);
        let Some(clipped) = clipped else {
            log::debug!("preload {bbox} outside offline area; nothing to do");
            return Ok(DownloadReport::default());
        };
        self.download_tiles(&clipped, true)
    }

    fn download_tiles(
        &self,
        region: &BoundingBox,
        skip_cached: bool,
    ) -> Result<DownloadReport, RepositoryError> {
        let grid = self.cache.grid();
        let tile_count = grid.partition_len(region);
        if tile_count > self.max_preload_tiles {
            return Err(RepositoryError::AreaTooLarge {
                tiles: tile_count,
                limit: self.max_preload_tiles,
            });
        }
        let tiles = grid.partition(region);
        let mut report = DownloadReport::default();
        for tile in tiles {
            let Some(tile) = tile.intersection(region) else {
                continue;
            };
            if skip_cached && self.cache.is_area_cached(&tile) {
                report.skipped += 1;
                continue;
            }
            report.requested += 1;
            match self.download(&tile, true)? {
                Some(count) => report.places += count,
                None => report.failed += 1,
            }
        }
        log::debug!("downloaded {region}: {report:?}");
        Ok(report)
    }

    /// Refresh the whole offline area, ignoring what is already cached.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::AreaTooLarge`] when the area needs more tiles than
    /// allowed and [`RepositoryError::Store`] when storing fails.
    pub fn sync_once(&self) -> Result<SyncOutcome, RepositoryError> {
        if !self.connectivity.is_online() {
            return Ok(SyncOutcome::Offline);
        }
        let bounds = self.offline().offline_area_bounds();
        let Some(bounds) = bounds else {
            return Ok(SyncOutcome::Unconfigured);
        };
        self.download_tiles(&bounds, false)
            .map(SyncOutcome::Refreshed)
    }

    /// Search the provider for places named like `name`, nearest first.
    ///
    /// The search widens through [`SEARCH_RADII`] around `(lat, lon)` until
    /// [`SEARCH_LIMIT`] distinct places are found. If the first two radii find
    /// nothing, one location-free search is made instead. Results are stored
    /// locally. Short queries and offline devices get no results.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Store`] when storing the results fails. Provider
    /// failures are logged and the search moves on.
    pub fn search_global(
        &self,
        name: &str,
        lat: f64,
        lon: f64,
    ) -> Result<Vec<Place>, RepositoryError> {
        if name.chars().count() < MIN_SEARCH_CHARS {
            return Ok(Vec::new());
        }
        if !self.connectivity.is_online() {
            log::debug!("offline; skipping remote search for {name:?}");
            return Ok(Vec::new());
        }

        let mut results = SearchResults::default();
        for (index, radius_meters) in SEARCH_RADII.into_iter().enumerate() {
            results.extend(self.search(&PlaceSearch::Around {
                name: name.to_owned(),
                lat,
                lon,
                radius_meters,
                limit: SEARCH_LIMIT,
            }));
            if results.len() >= SEARCH_LIMIT {
                break;
            }
            if results.is_empty() && index == GLOBAL_FALLBACK_AFTER {
                log::debug!("no nearby matches for {name:?}; searching globally");
                results.extend(self.search(&PlaceSearch::Global {
                    name: name.to_owned(),
                    limit: GLOBAL_SEARCH_LIMIT,
                }));
                break;
            }
        }

        let places = results.places;
        if !places.is_empty() {
            self.store.upsert_places(&places)?;
        }
        Ok(places)
    }

    fn search(&self, search: &PlaceSearch) -> Vec<Place> {
        self.fetcher.search_places(search).unwrap_or_else(|err| {
            log::warn!("place search {search:?} failed: {err}");
            Vec::new()
        })
    }

    /// Stored places of one kind.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Store`] when the query fails.
    pub fn places_by_kind(&self, kind: &str) -> Result<Vec<Place>, RepositoryError> {
        Ok(self.store.places_by_kind(kind)?)
    }

    /// Stored places whose name or description contains `text`.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Store`] when the query fails.
    pub fn search_local(&self, text: &str) -> Result<Vec<Place>, RepositoryError> {
        Ok(self.store.search(text)?)
    }

    /// Star or unstar a stored place. Returns `false` for unknown ids.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Store`] when the update fails.
    pub fn set_favorite(&self, id: &str, is_favorite: bool) -> Result<bool, RepositoryError> {
        Ok(self.store.set_favorite(id, is_favorite)?)
    }

    /// Starred places.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Store`] when the query fails.
    pub fn favorites(&self) -> Result<Vec<Place>, RepositoryError> {
        Ok(self.store.favorites()?)
    }

    /// Uncached parts of `bbox`, as the next viewport query would fetch them.
    pub fn missing_areas(&self, bbox: &BoundingBox) -> Vec<BoundingBox> {
        self.cache.get_missing_areas(bbox)
    }

    /// Cached footprint and offline area in one snapshot.
    pub fn cache_info(&self) -> CacheInfo {
        let stats = self.cache.cache_stats();
        let offline = self.offline_area_info();
        CacheInfo {
            cached_cells: stats.cached_cells,
            cached_area_km2: stats.approximate_area_km2,
            offline_configured: offline.is_configured,
            offline_center_lat: offline.center_lat,
            offline_center_lon: offline.center_lon,
            offline_radius_km: offline.radius_meters / 1000.0,
        }
    }

    /// Forget which cells were fetched. Stored places are kept.
    pub fn clear_cache(&self) {
        self.cache.clear_cache();
        log::debug!("viewport cache cleared");
    }

    /// Delete downloaded places and forget every cached cell. Returns the
    /// number of places removed.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Store`] when the delete fails; the cache is left
    /// untouched in that case.
    pub fn clear_all_data(&self) -> Result<usize, RepositoryError> {
        let removed = self.store.delete_by_source(DEFAULT_SOURCE)?;
        self.cache.clear_cache();
        log::debug!("removed {removed} downloaded places and cleared the cache");
        Ok(removed)
    }
}

/// Places collected across searches, first occurrence of each id kept.
#[derive(Default)]
struct SearchResults {
    places: Vec<Place>,
    seen: HashSet<String>,
}

impl SearchResults {
    fn extend(&mut self, found: Vec<Place>) {
        for place in found {
            if self.seen.insert(place.id.clone()) {
                self.places.push(place);
            }
        }
    }

    fn len(&self) -> usize {
        self.places.len()
    }

    fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}
