//! Local record store for downloaded places.
//!
//! The [`PlaceStore`] trait is the persistence seam used by the repository:
//! everything shown on the map is read back from the store, so the map keeps
//! working offline with whatever was downloaded before.

use std::error::Error as StdError;

use thiserror::Error;

use crate::{BoundingBox, Place};

#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqlitePlaceStore, SqlitePlaceStoreError};

/// Errors surfaced by [`PlaceStore`] implementations.
#[derive(Debug, Error)]
pub enum PlaceStoreError {
    /// The backing storage rejected the operation.
    #[error("place store failed to {operation}: {source}")]
    Backend {
        /// Operation that failed, e.g. `"upsert places"`.
        operation: &'static str,
        /// Backend-specific failure.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl PlaceStoreError {
    /// Wrap a backend error raised during `operation`.
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Backend {
            operation,
            source: Box::new(source),
        }
    }
}

/// Read-write access to locally stored places.
///
/// Bounds queries include places on the box edges.
pub trait PlaceStore {
    /// Insert places, or refresh those with a known id. A refresh keeps the
    /// stored favourite flag.
    fn upsert_places(&self, places: &[Place]) -> Result<(), PlaceStoreError>;

    /// Places inside `bbox`, edges included.
    fn places_in_bounds(&self, bbox: &BoundingBox) -> Result<Vec<Place>, PlaceStoreError>;

    /// Places of one kind, most recently updated first.
    fn places_by_kind(&self, kind: &str) -> Result<Vec<Place>, PlaceStoreError>;

    /// Places whose name or description contains `text`.
    fn search(&self, text: &str) -> Result<Vec<Place>, PlaceStoreError>;

    /// Starred places ordered by name.
    fn favorites(&self) -> Result<Vec<Place>, PlaceStoreError>;

    /// Star or unstar a place. Returns `false` when no place has `id`.
    fn set_favorite(&self, id: &str, is_favorite: bool) -> Result<bool, PlaceStoreError>;

    /// Delete every place from `source`. Returns the number removed.
    fn delete_by_source(&self, source: &str) -> Result<usize, PlaceStoreError>;

    /// Number of stored places.
    fn count(&self) -> Result<usize, PlaceStoreError>;
}

impl<T> PlaceStore for Box<T>
where
    T: PlaceStore + ?Sized,
{
    fn upsert_places(&self, places: &[Place]) -> Result<(), PlaceStoreError> {
        (**self).upsert_places(places)
    }

    fn places_in_bounds(&self, bbox: &BoundingBox) -> Result<Vec<Place>, PlaceStoreError> {
        (**self).places_in_bounds(bbox)
    }

    fn places_by_kind(&self, kind: &str) -> Result<Vec<Place>, PlaceStoreError> {
        (**self).places_by_kind(kind)
    }

    fn search(&self, text: &str) -> Result<Vec<Place>, PlaceStoreError> {
        (**self).search(text)
    }

    fn favorites(&self) -> Result<Vec<Place>, PlaceStoreError> {
        (**self).favorites()
    }

    fn set_favorite(&self, id: &str, is_favorite: bool) -> Result<bool, PlaceStoreError> {
        (**self).set_favorite(id, is_favorite)
    }

    fn delete_by_source(&self, source: &str) -> Result<usize, PlaceStoreError> {
        (**self).delete_by_source(source)
    }

    fn count(&self) -> Result<usize, PlaceStoreError> {
        (**self).count()
    }
}

#[cfg(test)]
mod tests {
    use super::PlaceStore;
    use crate::{BoundingBox, Place, test_support::MemoryPlaceStore};
    use geo::Coord;
    use rstest::rstest;

    fn place(id: &str, lat: f64, lon: f64) -> Place {
        Place::new(id, id, "museum", Coord { x: lon, y: lat })
    }

    #[rstest]
    #[case(-1.0, 0.0)] // south edge
    #[case(1.0, 0.0)] // north edge
    #[case(0.0, -1.0)] // west edge
    #[case(0.0, 1.0)] // east edge
    #[case(1.0, 1.0)] // north-east corner
    fn bounds_include_edges(#[case] lat: f64, #[case] lon: f64) {
        let store = MemoryPlaceStore::with_places([place("edge", lat, lon)]);
        let bbox = BoundingBox::new(-1.0, 1.0, -1.0, 1.0);
        let found = store.places_in_bounds(&bbox).expect("query bounds");
        assert_eq!(found.len(), 1);
    }

    #[rstest]
    fn upsert_replaces_by_id() {
        let store = MemoryPlaceStore::default();
        store
            .upsert_places(&[place("a", 0.0, 0.0)])
            .expect("first upsert");
        let mut moved = place("a", 0.5, 0.5);
        moved.name = "renamed".to_owned();
        store.upsert_places(&[moved]).expect("second upsert");
        assert_eq!(store.count().expect("count"), 1);
        let found = store
            .places_in_bounds(&BoundingBox::new(0.4, 0.6, 0.4, 0.6))
            .expect("query bounds");
        assert_eq!(found.first().map(|p| p.name.as_str()), Some("renamed"));
    }
}
