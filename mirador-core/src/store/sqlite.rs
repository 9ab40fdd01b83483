//! SQLite-backed place store.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use geo::Coord;
use rusqlite::{Connection, Row, params};
use thiserror::Error;

use crate::{BoundingBox, Place};

use super::{PlaceStore, PlaceStoreError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS places (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        lat REAL NOT NULL,
        lon REAL NOT NULL,
        description TEXT,
        address TEXT,
        phone TEXT,
        website TEXT,
        opening_hours TEXT,
        source TEXT NOT NULL,
        last_updated INTEGER NOT NULL,
        is_favorite INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS places_kind_idx ON places (kind);
    CREATE INDEX IF NOT EXISTS places_name_idx ON places (name);
    CREATE INDEX IF NOT EXISTS places_lat_lon_idx ON places (lat, lon);
";

const COLUMNS: &str = "id, name, kind, lat, lon, description, address, phone, website, \
                       opening_hours, source, last_updated, is_favorite";

// Re-downloads refresh every column except the user's favourite flag.
const UPSERT: &str = "
    INSERT INTO places (id, name, kind, lat, lon, description, address, phone, website,
                        opening_hours, source, last_updated, is_favorite)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
    ON CONFLICT (id) DO UPDATE SET
        name = excluded.name,
        kind = excluded.kind,
        lat = excluded.lat,
        lon = excluded.lon,
        description = excluded.description,
        address = excluded.address,
        phone = excluded.phone,
        website = excluded.website,
        opening_hours = excluded.opening_hours,
        source = excluded.source,
        last_updated = excluded.last_updated
";

/// Errors raised while opening a [`SqlitePlaceStore`].
#[derive(Debug, Error)]
pub enum SqlitePlaceStoreError {
    /// Opening the database file failed.
    #[error("failed to open place database at {path}: {source}")]
    Open {
        /// Location of the database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Creating the `places` table or its indexes failed.
    #[error("failed to create place schema: {source}")]
    CreateSchema {
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
}

/// Places persisted in a SQLite database.
///
/// The connection sits behind a mutex so the store can be shared between
/// threads through `&self`.
pub struct SqlitePlaceStore {
    connection: Mutex<Connection>,
}

impl fmt::Debug for SqlitePlaceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlitePlaceStore").finish_non_exhaustive()
    }
}

impl SqlitePlaceStore {
    /// Open (creating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SqlitePlaceStoreError`] when the file cannot be opened or the
    /// schema cannot be created.
    pub fn open<P>(path: P) -> Result<Self, SqlitePlaceStoreError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let connection = Connection::open(path).map_err(|source| SqlitePlaceStoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(connection)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`SqlitePlaceStoreError`] when SQLite cannot allocate it.
    pub fn open_in_memory() -> Result<Self, SqlitePlaceStoreError> {
        let connection =
            Connection::open_in_memory().map_err(|source| SqlitePlaceStoreError::Open {
                path: PathBuf::from(":memory:"),
                source,
            })?;
        Self::with_connection(connection)
    }

    fn with_connection(connection: Connection) -> Result<Self, SqlitePlaceStoreError> {
        connection
            .execute_batch(SCHEMA)
            .map_err(|source| SqlitePlaceStoreError::CreateSchema { source })?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn query_places<P>(
        &self,
        operation: &'static str,
        filter: &str,
        params: P,
    ) -> Result<Vec<Place>, PlaceStoreError>
    where
        P: rusqlite::Params,
    {
        let connection = self.connection();
        let sql = format!("SELECT {COLUMNS} FROM places {filter}");
        let mut stmt = connection
            .prepare(&sql)
            .map_err(|err| PlaceStoreError::backend(operation, err))?;
        let rows = stmt
            .query_map(params, place_from_row)
            .map_err(|err| PlaceStoreError::backend(operation, err))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| PlaceStoreError::backend(operation, err))
    }
}

fn place_from_row(row: &Row<'_>) -> rusqlite::Result<Place> {
    Ok(Place {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: row.get(2)?,
        location: Coord {
            x: row.get(4)?,
            y: row.get(3)?,
        },
        description: row.get(5)?,
        address: row.get(6)?,
        phone: row.get(7)?,
        website: row.get(8)?,
        opening_hours: row.get(9)?,
        source: row.get(10)?,
        last_updated_ms: row.get(11)?,
        is_favorite: row.get(12)?,
    })
}

impl PlaceStore for SqlitePlaceStore {
    fn upsert_places(&self, places: &[Place]) -> Result<(), PlaceStoreError> {
        const OPERATION: &str = "upsert places";
        let mut connection = self.connection();
        let tx = connection
            .transaction()
            .map_err(|err| PlaceStoreError::backend(OPERATION, err))?;
        {
            let mut stmt = tx
                .prepare(UPSERT)
                .map_err(|err| PlaceStoreError::backend(OPERATION, err))?;
            for place in places {
                stmt.execute(params![
                    place.id,
                    place.name,
                    place.kind,
                    place.lat(),
                    place.lon(),
                    place.description,
                    place.address,
                    place.phone,
                    place.website,
                    place.opening_hours,
                    place.source,
                    place.last_updated_ms,
                    place.is_favorite,
                ])
                .map_err(|err| PlaceStoreError::backend(OPERATION, err))?;
            }
        }
        tx.commit()
            .map_err(|err| PlaceStoreError::backend(OPERATION, err))
    }

    fn places_in_bounds(&self, bbox: &BoundingBox) -> Result<Vec<Place>, PlaceStoreError> {
        self.query_places(
            "query places in bounds",
            "WHERE lat BETWEEN ?1 AND ?2 AND lon BETWEEN ?3 AND ?4 ORDER BY id",
            params![bbox.min_lat(), bbox.max_lat(), bbox.min_lon(), bbox.max_lon()],
        )
    }

    fn places_by_kind(&self, kind: &str) -> Result<Vec<Place>, PlaceStoreError> {
        self.query_places(
            "query places by kind",
            "WHERE kind = ?1 ORDER BY last_updated DESC, id",
            params![kind],
        )
    }

    fn search(&self, text: &str) -> Result<Vec<Place>, PlaceStoreError> {
        self.query_places(
            "search places",
            "WHERE name LIKE '%' || ?1 || '%' OR description LIKE '%' || ?1 || '%' \
             ORDER BY name, id",
            params![text],
        )
    }

    fn favorites(&self) -> Result<Vec<Place>, PlaceStoreError> {
        self.query_places(
            "query favourites",
            "WHERE is_favorite = 1 ORDER BY name, id",
            [],
        )
    }

    fn set_favorite(&self, id: &str, is_favorite: bool) -> Result<bool, PlaceStoreError> {
        self.connection()
            .execute(
                "UPDATE places SET is_favorite = ?2 WHERE id = ?1",
                params![id, is_favorite],
            )
            .map(|changed| changed > 0)
            .map_err(|err| PlaceStoreError::backend("update favourite", err))
    }

    fn delete_by_source(&self, source: &str) -> Result<usize, PlaceStoreError> {
        self.connection()
            .execute("DELETE FROM places WHERE source = ?1", params![source])
            .map_err(|err| PlaceStoreError::backend("delete places by source", err))
    }

    fn count(&self) -> Result<usize, PlaceStoreError> {
        let count: i64 = self
            .connection()
            .query_row("SELECT COUNT(*) FROM places", [], |row| row.get(0))
            .map_err(|err| PlaceStoreError::backend("count places", err))?;
        usize::try_from(count).map_err(|err| PlaceStoreError::backend("count places", err))
    }
}
