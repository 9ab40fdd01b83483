//! In-memory collaborators used by unit and behaviour tests.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{
    BoundingBox, FetchError, Place, PlaceFetcher, PlaceSearch, PlaceStore, PlaceStoreError,
    SettingsError, SettingsStore, distance_meters,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `PlaceStore` keeping places in a map ordered by id.
///
/// Linear scans only; intended for small datasets.
#[derive(Debug, Default)]
pub struct MemoryPlaceStore {
    places: Mutex<BTreeMap<String, Place>>,
}

impl MemoryPlaceStore {
    /// Create a store holding `places`.
    pub fn with_places<I>(places: I) -> Self
    where
        I: IntoIterator<Item = Place>,
    {
        Self {
            places: Mutex::new(
                places
                    .into_iter()
                    .map(|place| (place.id.clone(), place))
                    .collect(),
            ),
        }
    }

    fn filtered<F>(&self, keep: F) -> Vec<Place>
    where
        F: Fn(&Place) -> bool,
    {
        lock(&self.places)
            .values()
            .filter(|place| keep(place))
            .cloned()
            .collect()
    }
}

impl PlaceStore for MemoryPlaceStore {
    fn upsert_places(&self, places: &[Place]) -> Result<(), PlaceStoreError> {
        let mut stored = lock(&self.places);
        for place in places {
            let mut incoming = place.clone();
            if let Some(existing) = stored.get(&place.id) {
                incoming.is_favorite = existing.is_favorite;
            }
            stored.insert(incoming.id.clone(), incoming);
        }
        Ok(())
    }

    fn places_in_bounds(&self, bbox: &BoundingBox) -> Result<Vec<Place>, PlaceStoreError> {
        Ok(self.filtered(|place| bbox.contains(place.lat(), place.lon())))
    }

    fn places_by_kind(&self, kind: &str) -> Result<Vec<Place>, PlaceStoreError> {
        let mut places = self.filtered(|place| place.kind == kind);
        places.sort_by(|a, b| b.last_updated_ms.cmp(&a.last_updated_ms));
        Ok(places)
    }

    fn search(&self, text: &str) -> Result<Vec<Place>, PlaceStoreError> {
        let needle = text.to_lowercase();
        let mut places = self.filtered(|place| {
            place.name.to_lowercase().contains(&needle)
                || place
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
        });
        places.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(places)
    }

    fn favorites(&self) -> Result<Vec<Place>, PlaceStoreError> {
        let mut places = self.filtered(|place| place.is_favorite);
        places.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(places)
    }

    fn set_favorite(&self, id: &str, is_favorite: bool) -> Result<bool, PlaceStoreError> {
        Ok(lock(&self.places).get_mut(id).is_some_and(|place| {
            place.is_favorite = is_favorite;
            true
        }))
    }

    fn delete_by_source(&self, source: &str) -> Result<usize, PlaceStoreError> {
        let mut stored = lock(&self.places);
        let before = stored.len();
        stored.retain(|_, place| place.source != source);
        Ok(before - stored.len())
    }

    fn count(&self) -> Result<usize, PlaceStoreError> {
        Ok(lock(&self.places).len())
    }
}

/// `PlaceFetcher` serving a fixed set of places and recording every request.
#[derive(Debug, Default)]
pub struct StubPlaceFetcher {
    places: Vec<Place>,
    failure: Mutex<Option<FetchError>>,
    requests: Mutex<Vec<BoundingBox>>,
    searches: Mutex<Vec<PlaceSearch>>,
}

impl StubPlaceFetcher {
    /// Serve `places` to region and name queries.
    pub fn with_places<I>(places: I) -> Self
    where
        I: IntoIterator<Item = Place>,
    {
        Self {
            places: places.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Fail every request with `error`.
    pub fn with_error(error: FetchError) -> Self {
        Self {
            failure: Mutex::new(Some(error)),
            ..Self::default()
        }
    }

    /// Start or stop failing requests.
    pub fn set_failure(&self, error: Option<FetchError>) {
        *lock(&self.failure) = error;
    }

    /// Every box passed to [`PlaceFetcher::fetch_places`], in call order.
    pub fn requested_boxes(&self) -> Vec<BoundingBox> {
        lock(&self.requests).clone()
    }

    /// Every search passed to [`PlaceFetcher::search_places`], in call order.
    pub fn searches(&self) -> Vec<PlaceSearch> {
        lock(&self.searches).clone()
    }

    fn check_failure(&self) -> Result<(), FetchError> {
        lock(&self.failure).clone().map_or(Ok(()), Err)
    }
}

impl PlaceFetcher for StubPlaceFetcher {
    fn fetch_places(&self, bbox: &BoundingBox) -> Result<Vec<Place>, FetchError> {
        lock(&self.requests).push(*bbox);
        self.check_failure()?;
        Ok(self
            .places
            .iter()
            .filter(|place| bbox.contains(place.lat(), place.lon()))
            .cloned()
            .collect())
    }

    fn search_places(&self, search: &PlaceSearch) -> Result<Vec<Place>, FetchError> {
        lock(&self.searches).push(search.clone());
        self.check_failure()?;
        let (name, limit) = match search {
            PlaceSearch::Around { name, limit, .. } | PlaceSearch::Global { name, limit } => {
                (name.to_lowercase(), *limit)
            }
        };
        Ok(self
            .places
            .iter()
            .filter(|place| place.name.to_lowercase().contains(&name))
            .filter(|place| match search {
                PlaceSearch::Around {
                    lat,
                    lon,
                    radius_meters,
                    ..
                } => distance_meters(*lat, *lon, place.lat(), place.lon()) <= *radius_meters,
                PlaceSearch::Global { .. } => true,
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

/// `SettingsStore` whose every operation fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSettingsStore;

impl FailingSettingsStore {
    fn error(key: &str) -> SettingsError {
        SettingsError::backend(
            key,
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only storage"),
        )
    }
}

impl SettingsStore for FailingSettingsStore {
    fn load_f64(&self, key: &str) -> Result<Option<f64>, SettingsError> {
        Err(Self::error(key))
    }

    fn store_f64(&mut self, key: &str, _value: f64) -> Result<(), SettingsError> {
        Err(Self::error(key))
    }

    fn load_string_set(&self, key: &str) -> Result<Vec<String>, SettingsError> {
        Err(Self::error(key))
    }

    fn replace_string_set(&mut self, key: &str, _members: &[String]) -> Result<(), SettingsError> {
        Err(Self::error(key))
    }

    fn remove(&mut self, key: &str) -> Result<(), SettingsError> {
        Err(Self::error(key))
    }
}
