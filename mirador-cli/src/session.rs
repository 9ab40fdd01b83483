//! Shared state for every subcommand: the state directory, the Overpass
//! endpoint and the assembled places repository.

use std::{path::Component, time::Duration};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use clap::Args;
use mirador_core::{
    ConnectivityFlag, OfflineAreaManager, PlaceFetcher, SqlitePlaceStore, SqliteSettingsStore,
    ViewportCache, settings::namespaces,
};
use mirador_data::{OverpassFetcher, OverpassFetcherConfig, PlacesRepository, overpass};

use crate::{
    ARG_OFFLINE, ARG_OVERPASS_URL, ARG_STATE_DIR, ARG_TIMEOUT_SECS, CliError, ENV_OFFLINE,
    ENV_OVERPASS_URL, ENV_STATE_DIR, ENV_TIMEOUT_SECS,
};

/// Directory used when `--state-dir` is not given.
pub(crate) const DEFAULT_STATE_DIR: &str = ".mirador";

/// Settings database inside the state directory.
pub(crate) const SETTINGS_FILE: &str = "settings.db";

/// Place database inside the state directory.
pub(crate) const PLACES_FILE: &str = "places.db";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Repository as assembled by the CLI.
pub(crate) type CliRepository = PlacesRepository<
    Box<dyn PlaceFetcher>,
    SqlitePlaceStore,
    ConnectivityFlag,
    SqliteSettingsStore,
>;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct SessionArgs {
    /// Directory holding the settings and place databases.
    #[arg(long = ARG_STATE_DIR, env = ENV_STATE_DIR, value_name = "dir", global = true)]
    pub(crate) state_dir: Option<Utf8PathBuf>,
    /// Base URL of the Overpass instance.
    #[arg(long = ARG_OVERPASS_URL, env = ENV_OVERPASS_URL, value_name = "url", global = true)]
    pub(crate) overpass_url: Option<String>,
    /// Request timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, env = ENV_TIMEOUT_SECS, value_name = "secs", global = true)]
    pub(crate) timeout_secs: Option<u64>,
    /// Never contact the network; serve local data only.
    #[arg(long = ARG_OFFLINE, env = ENV_OFFLINE, global = true)]
    pub(crate) offline: bool,
}

/// Resolved session options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionConfig {
    pub(crate) state_dir: Utf8PathBuf,
    pub(crate) overpass_url: String,
    pub(crate) timeout: Duration,
    pub(crate) online: bool,
}

impl From<SessionArgs> for SessionConfig {
    fn from(args: SessionArgs) -> Self {
        Self {
            state_dir: args
                .state_dir
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_STATE_DIR)),
            overpass_url: args
                .overpass_url
                .unwrap_or_else(|| overpass::DEFAULT_BASE_URL.to_owned()),
            timeout: Duration::from_secs(args.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            online: !args.offline,
        }
    }
}

impl SessionConfig {
    pub(crate) fn settings_path(&self) -> Utf8PathBuf {
        self.state_dir.join(SETTINGS_FILE)
    }

    pub(crate) fn places_path(&self) -> Utf8PathBuf {
        self.state_dir.join(PLACES_FILE)
    }
}

/// Builds the place fetcher for the current invocation.
pub(crate) trait FetcherFactory {
    fn build(&self, config: &SessionConfig) -> Result<Box<dyn PlaceFetcher>, CliError>;
}

/// Factory producing an [`OverpassFetcher`].
pub(crate) struct OverpassFetcherFactory;

impl FetcherFactory for OverpassFetcherFactory {
    fn build(&self, config: &SessionConfig) -> Result<Box<dyn PlaceFetcher>, CliError> {
        let fetcher_config =
            OverpassFetcherConfig::new(config.overpass_url.clone()).with_timeout(config.timeout);
        let fetcher =
            OverpassFetcher::with_config(fetcher_config).map_err(|source| {
                CliError::BuildFetcher {
                    base_url: config.overpass_url.clone(),
                    source,
                }
            })?;
        Ok(Box::new(fetcher))
    }
}

/// Create the state directory and open the repository inside it.
pub(crate) fn open_repository(
    config: &SessionConfig,
    factory: &dyn FetcherFactory,
) -> Result<CliRepository, CliError> {
    ensure_dir(&config.state_dir)?;
    let settings_path = config.settings_path();
    let cache_settings = SqliteSettingsStore::open(&settings_path, namespaces::VIEWPORT_CACHE)?;
    let offline_settings = SqliteSettingsStore::open(&settings_path, namespaces::OFFLINE_AREA)?;
    let store = SqlitePlaceStore::open(config.places_path())?;
    let fetcher = factory.build(config)?;
    log::debug!("opened state in {}", config.state_dir);
    Ok(PlacesRepository::new(
        ViewportCache::new(cache_settings),
        OfflineAreaManager::new(offline_settings),
        fetcher,
        store,
        ConnectivityFlag::new(config.online),
    ))
}

/// Create `path` and its parents using capability-based IO.
fn ensure_dir(path: &Utf8Path) -> Result<(), CliError> {
    let create_error = |source| CliError::CreateStateDir {
        path: path.to_path_buf(),
        source,
    };
    let (base_dir, relative) = base_dir_and_relative(path).map_err(create_error)?;
    if relative.as_os_str().is_empty() {
        return Ok(());
    }
    base_dir.create_dir_all(&relative).map_err(create_error)?;
    let metadata = base_dir.metadata(&relative).map_err(create_error)?;
    if metadata.is_dir() {
        Ok(())
    } else {
        Err(CliError::StateDirNotDirectory {
            path: path.to_path_buf(),
        })
    }
}

/// Split a path into an ambient base directory and a relative suffix.
fn base_dir_and_relative(path: &Utf8Path) -> std::io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let (base, relative) = match path.as_std_path().components().next() {
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = path
                .strip_prefix(&base)
                .map_err(|_| std::io::Error::other("failed to strip root from absolute path"))?
                .to_path_buf();
            (base, relative)
        }
        Some(Component::Prefix(_)) => {
            let mut components = path.components();
            let prefix = components
                .next()
                .ok_or_else(|| std::io::Error::other("missing path prefix"))?;
            let base = Utf8PathBuf::from(prefix.as_str()).join(std::path::MAIN_SEPARATOR.to_string());
            let relative: Utf8PathBuf = components
                .filter(|component| !matches!(component, camino::Utf8Component::RootDir))
                .collect();
            (base, relative)
        }
        _ => (Utf8PathBuf::from("."), path.to_path_buf()),
    };
    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    Ok((dir, relative))
}
