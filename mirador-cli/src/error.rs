//! Error types emitted by the Mirador CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use mirador_core::{BoundingBoxParseError, SqlitePlaceStoreError, SqliteSettingsStoreError};
use mirador_data::{OverpassBuildError, RepositoryError};
use thiserror::Error;

/// Errors emitted by the Mirador CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A bounding box argument could not be parsed.
    #[error("invalid {field} {value:?}: {source}")]
    InvalidBoundingBox {
        field: &'static str,
        value: String,
        #[source]
        source: BoundingBoxParseError,
    },
    /// The state directory could not be created.
    #[error("failed to create state directory {path:?}: {source}")]
    CreateStateDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The state directory path exists but is not a directory.
    #[error("state directory {path:?} is not a directory")]
    StateDirNotDirectory { path: Utf8PathBuf },
    /// Opening the settings database failed.
    #[error(transparent)]
    OpenSettings(#[from] SqliteSettingsStoreError),
    /// Opening the place database failed.
    #[error(transparent)]
    OpenPlaceStore(#[from] SqlitePlaceStoreError),
    /// Constructing the Overpass client failed.
    #[error("failed to build Overpass client for {base_url:?}: {source}")]
    BuildFetcher {
        base_url: String,
        #[source]
        source: OverpassBuildError,
    },
    /// A repository operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// Serialising command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
