//! SQLite-backed settings store.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use super::{SettingsError, SettingsStore};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS settings (
        namespace TEXT NOT NULL,
        key TEXT NOT NULL,
        value REAL NOT NULL,
        PRIMARY KEY (namespace, key)
    );
    CREATE TABLE IF NOT EXISTS settings_sets (
        namespace TEXT NOT NULL,
        key TEXT NOT NULL,
        position INTEGER NOT NULL,
        member TEXT NOT NULL,
        PRIMARY KEY (namespace, key, position)
    );
";

/// Errors raised while opening a [`SqliteSettingsStore`].
#[derive(Debug, Error)]
pub enum SqliteSettingsStoreError {
    /// Opening the database file failed.
    #[error("failed to open settings database at {path}: {source}")]
    Open {
        /// Location of the database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Creating the settings tables failed.
    #[error("failed to create settings schema: {source}")]
    CreateSchema {
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
}

/// Settings persisted in a SQLite database, scoped to one namespace.
///
/// Several stores with different namespaces may share a database file.
pub struct SqliteSettingsStore {
    connection: Connection,
    namespace: String,
}

impl fmt::Debug for SqliteSettingsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteSettingsStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl SqliteSettingsStore {
    /// Open (creating if needed) the database at `path`.
    ///
    /// The parent directory must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSettingsStoreError`] when the file cannot be opened or
    /// the schema cannot be created.
    pub fn open<P>(path: P, namespace: &str) -> Result<Self, SqliteSettingsStoreError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let connection =
            Connection::open(path).map_err(|source| SqliteSettingsStoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Self::with_connection(connection, namespace)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSettingsStoreError`] when SQLite cannot allocate the
    /// database.
    pub fn open_in_memory(namespace: &str) -> Result<Self, SqliteSettingsStoreError> {
        let connection =
            Connection::open_in_memory().map_err(|source| SqliteSettingsStoreError::Open {
                path: PathBuf::from(":memory:"),
                source,
            })?;
        Self::with_connection(connection, namespace)
    }

    fn with_connection(
        connection: Connection,
        namespace: &str,
    ) -> Result<Self, SqliteSettingsStoreError> {
        connection
            .execute_batch(SCHEMA)
            .map_err(|source| SqliteSettingsStoreError::CreateSchema { source })?;
        Ok(Self {
            connection,
            namespace: namespace.to_owned(),
        })
    }

    /// Namespace all keys are scoped to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn load_f64(&self, key: &str) -> Result<Option<f64>, SettingsError> {
        self.connection
            .query_row(
                "SELECT value FROM settings WHERE namespace = ?1 AND key = ?2",
                params![self.namespace, key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SettingsError::backend(key, err))
    }

    fn store_f64(&mut self, key: &str, value: f64) -> Result<(), SettingsError> {
        self.connection
            .execute(
                "INSERT OR REPLACE INTO settings (namespace, key, value) VALUES (?1, ?2, ?3)",
                params![self.namespace, key, value],
            )
            .map(|_| ())
            .map_err(|err| SettingsError::backend(key, err))
    }

    fn load_string_set(&self, key: &str) -> Result<Vec<String>, SettingsError> {
        let mut stmt = self
            .connection
            .prepare(
                "SELECT member FROM settings_sets WHERE namespace = ?1 AND key = ?2 \
                 ORDER BY position",
            )
            .map_err(|err| SettingsError::backend(key, err))?;
        let rows = stmt
            .query_map(params![self.namespace, key], |row| row.get::<_, String>(0))
            .map_err(|err| SettingsError::backend(key, err))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|err| SettingsError::backend(key, err))
    }

    fn replace_string_set(&mut self, key: &str, members: &[String]) -> Result<(), SettingsError> {
        let tx = self
            .connection
            .transaction()
            .map_err(|err| SettingsError::backend(key, err))?;
        tx.execute(
            "DELETE FROM settings_sets WHERE namespace = ?1 AND key = ?2",
            params![self.namespace, key],
        )
        .map_err(|err| SettingsError::backend(key, err))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO settings_sets (namespace, key, position, member) \
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(|err| SettingsError::backend(key, err))?;
            for (position, member) in members.iter().enumerate() {
                let position = i64::try_from(position).map_err(|_| SettingsError::InvalidValue {
                    key: key.to_owned(),
                    message: "set too large to persist".to_owned(),
                })?;
                stmt.execute(params![self.namespace, key, position, member])
                    .map_err(|err| SettingsError::backend(key, err))?;
            }
        }
        tx.commit().map_err(|err| SettingsError::backend(key, err))
    }

    fn remove(&mut self, key: &str) -> Result<(), SettingsError> {
        let tx = self
            .connection
            .transaction()
            .map_err(|err| SettingsError::backend(key, err))?;
        for sql in [
            "DELETE FROM settings WHERE namespace = ?1 AND key = ?2",
            "DELETE FROM settings_sets WHERE namespace = ?1 AND key = ?2",
        ] {
            tx.execute(sql, params![self.namespace, key])
                .map_err(|err| SettingsError::backend(key, err))?;
        }
        tx.commit().map_err(|err| SettingsError::backend(key, err))
    }
}
