//! Viewport cache: which grid cells have already been fetched.
//!
//! The cache answers three questions for a viewport box: is it fully covered,
//! which parts are missing (grouped into as few boxes as adjacency allows),
//! and how large the cached footprint is. Every public operation runs under
//! one mutex, so concurrent callers observe a consistent cell set. The set is
//! persisted through a [`SettingsStore`] after every mutation; persistence
//! failures are logged and never surfaced to callers.
//!
//! Resource exhaustion is treated as a degraded environment rather than an
//! error: the cache drops every cell, persists the empty set and answers with
//! the safe default (`false` or an empty list). A poisoned lock is handled the
//! same way.

use std::{
    collections::TryReserveError,
    fmt,
    sync::{Mutex, MutexGuard},
};

use thiserror::Error;

use crate::{
    BoundingBox, GeoCell, Grid,
    grid::CoverageError,
    settings::{SettingsStore, keys},
};

mod cell_set;
mod grouping;

use cell_set::CachedCellSet;
use grouping::group_missing_cells;

/// Default ceiling on remembered cells.
pub const DEFAULT_MAX_CACHED_CELLS: usize = 1000;

/// Kilometres covered by one degree of latitude.
const KM_PER_DEGREE: f64 = 111.0;

/// Raised internally when memory for the cell set cannot be reserved.
#[derive(Debug, Error)]
pub enum CacheCapacityError {
    /// A reservation failed.
    #[error("viewport cache ran out of memory: {0}")]
    Allocation(#[from] TryReserveError),
}

/// Tunables for [`ViewportCache`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportCacheConfig {
    /// Grid geometry and per-request guard.
    pub grid: Grid,
    /// Cell count above which the oldest half is evicted.
    pub max_cached_cells: usize,
}

impl Default for ViewportCacheConfig {
    fn default() -> Self {
        Self {
            grid: Grid::default(),
            max_cached_cells: DEFAULT_MAX_CACHED_CELLS,
        }
    }
}

/// Summary of the cache footprint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheStats {
    /// Number of cached cells.
    pub cached_cells: usize,
    /// `cached_cells * (cell_size * 111 km)^2`.
    pub approximate_area_km2: f64,
    /// Configured capacity.
    pub max_cells: usize,
}

struct CacheState<S> {
    cells: CachedCellSet,
    store: S,
}

impl<S: SettingsStore> CacheState<S> {
    fn persist(&mut self) {
        let keys = self.cells.keys();
        if let Err(err) = self.store.replace_string_set(keys::CACHED_AREAS, &keys) {
            log::warn!("failed to persist {} cached cells: {err}", keys.len());
        }
    }

    fn reset(&mut self) {
        self.cells.clear();
        self.persist();
    }
}

/// Thread-safe record of fetched grid cells.
///
/// # Examples
///
/// ```
/// use mirador_core::{BoundingBox, MemorySettingsStore, ViewportCache};
///
/// let cache = ViewportCache::new(MemorySettingsStore::default());
/// let viewport = BoundingBox::new(4.60, 4.61, -74.08, -74.07);
/// assert!(!cache.is_area_cached(&viewport));
/// cache.mark_area_as_cached(&viewport);
/// assert!(cache.is_area_cached(&viewport));
/// ```
pub struct ViewportCache<S> {
    grid: Grid,
    max_cached_cells: usize,
    state: Mutex<CacheState<S>>,
}

impl<S> fmt::Debug for ViewportCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewportCache")
            .field("grid", &self.grid)
            .field("max_cached_cells", &self.max_cached_cells)
            .finish_non_exhaustive()
    }
}

impl<S: SettingsStore> ViewportCache<S> {
    /// Create a cache with default grid and capacity, restoring persisted
    /// cells from `store`.
    pub fn new(store: S) -> Self {
        Self::with_config(store, ViewportCacheConfig::default())
    }

    /// Create a cache with explicit tunables.
    ///
    /// Persisted keys that fail to parse are skipped with a warning. If more
    /// cells were persisted than `max_cached_cells`, the oldest are evicted
    /// immediately.
    pub fn with_config(store: S, config: ViewportCacheConfig) -> Self {
        let cells = load_cells(&store);
        let mut state = CacheState { cells, store };
        if state.cells.len() > config.max_cached_cells {
            let evicted = state.cells.evict_oldest(config.max_cached_cells / 2);
            log::debug!("evicted {evicted} persisted cells above capacity");
            state.persist();
        }
        Self {
            grid: config.grid,
            max_cached_cells: config.max_cached_cells,
            state: Mutex::new(state),
        }
    }

    /// Grid used to map boxes to cells.
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Whether every cell covering `bbox` has been fetched.
    ///
    /// Returns `false` for boxes refused by the request guard.
    pub fn is_area_cached(&self, bbox: &BoundingBox) -> bool {
        self.with_state("is_area_cached", |state| {
            let Some(cells) = self.covering_cells(bbox, "is_area_cached")? else {
                return Ok(false);
            };
            Ok(!cells.is_empty() && cells.iter().all(|cell| state.cells.contains(cell)))
        })
        .unwrap_or(false)
    }

    /// Record every cell covering `bbox` as fetched.
    ///
    /// Oversized boxes are ignored with a warning. When the set grows past its
    /// capacity the oldest cells are evicted down to half of it.
    pub fn mark_area_as_cached(&self, bbox: &BoundingBox) {
        self.with_state("mark_area_as_cached", |state| {
            let Some(cells) = self.covering_cells(bbox, "mark_area_as_cached")? else {
                return Ok(());
            };
            let added = state.cells.try_insert_all(&cells)?;
            if state.cells.len() > self.max_cached_cells {
                let evicted = state.cells.evict_oldest(self.max_cached_cells / 2);
                log::debug!("evicted {evicted} oldest cells, {} remain", state.cells.len());
            }
            if added > 0 {
                state.persist();
            }
            Ok(())
        });
    }

    /// Boxes covering the cells of `bbox` that have not been fetched.
    ///
    /// Missing cells are grouped by 4-adjacency; each group yields its
    /// cell-aligned bounding rectangle. Returns an empty list when everything
    /// is cached or when the box is refused by the request guard.
    pub fn get_missing_areas(&self, bbox: &BoundingBox) -> Vec<BoundingBox> {
        self.with_state("get_missing_areas", |state| {
            let Some(cells) = self.covering_cells(bbox, "get_missing_areas")? else {
                return Ok(Vec::new());
            };
            let missing: Vec<GeoCell> = cells
                .into_iter()
                .filter(|cell| !state.cells.contains(cell))
                .collect();
            group_missing_cells(&self.grid, &missing).map_err(CacheCapacityError::from)
        })
        .unwrap_or_default()
    }

    /// Forget every cached cell.
    pub fn clear_cache(&self) {
        self.with_state("clear_cache", |state| {
            state.reset();
            Ok(())
        });
    }

    /// Forget the cells covering `bbox` so the next viewport query refetches
    /// them.
    pub fn clear_area_cache(&self, bbox: &BoundingBox) {
        self.with_state("clear_area_cache", |state| {
            let Some(cells) = self.covering_cells(bbox, "clear_area_cache")? else {
                return Ok(());
            };
            if state.cells.remove_all(&cells) > 0 {
                state.persist();
            }
            Ok(())
        });
    }

    /// Size of the cached footprint.
    pub fn cache_stats(&self) -> CacheStats {
        let cached_cells = self
            .with_state("cache_stats", |state| Ok(state.cells.len()))
            .unwrap_or(0);
        let cell_km = self.grid.cell_size() * KM_PER_DEGREE;
        CacheStats {
            cached_cells,
            approximate_area_km2: count_as_f64(cached_cells) * cell_km * cell_km,
            max_cells: self.max_cached_cells,
        }
    }

    /// Cells covering `bbox`, `None` when the grid refuses to enumerate it.
    fn covering_cells(
        &self,
        bbox: &BoundingBox,
        operation: &str,
    ) -> Result<Option<Vec<GeoCell>>, CacheCapacityError> {
        match self.grid.try_cells_covering(bbox) {
            Ok(cells) => Ok(Some(cells)),
            Err(CoverageError::Allocation(err)) => Err(CacheCapacityError::Allocation(err)),
            Err(err) => {
                log::warn!("{operation} ignored {bbox}: {err}");
                Ok(None)
            }
        }
    }

    /// Run `op` under the lock. A poisoned lock or a capacity failure resets
    /// the cache and yields `None`.
    fn with_state<T, F>(&self, operation: &str, op: F) -> Option<T>
    where
        F: FnOnce(&mut CacheState<S>) -> Result<T, CacheCapacityError>,
    {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::error!("viewport cache lock poisoned during {operation}; starting cold");
                let mut guard: MutexGuard<'_, CacheState<S>> = poisoned.into_inner();
                guard.reset();
                self.state.clear_poison();
                return None;
            }
        };
        match op(&mut guard) {
            Ok(value) => Some(value),
            Err(err) => {
                log::error!("{operation} failed: {err}; clearing the viewport cache");
                guard.reset();
                None
            }
        }
    }
}

fn load_cells<S: SettingsStore>(store: &S) -> CachedCellSet {
    let keys = match store.load_string_set(keys::CACHED_AREAS) {
        Ok(keys) => keys,
        Err(err) => {
            log::warn!("failed to load cached cells, starting cold: {err}");
            return CachedCellSet::default();
        }
    };
    CachedCellSet::from_cells(keys.iter().filter_map(|key| match key.parse::<GeoCell>() {
        Ok(cell) => Some(cell),
        Err(err) => {
            log::warn!("skipping persisted cell: {err}");
            None
        }
    }))
}

// Cell counts are bounded by the cache capacity.
const fn count_as_f64(count: usize) -> f64 {
    count as f64
}
