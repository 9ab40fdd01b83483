//! Subcommand arguments and handlers.

use std::io::Write;

use clap::{Parser, Subcommand, ValueEnum};
use mirador_core::{
    BoundingBox, RADIUS_LARGE_CITY, RADIUS_MEDIUM_CITY, RADIUS_METROPOLIS, RADIUS_SMALL_CITY,
};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_BBOX, ARG_SEARCH_LAT, ARG_SEARCH_LON, ARG_SEARCH_NAME, CliError, ENV_MISSING_BBOX,
    ENV_PRELOAD_BBOX, ENV_SEARCH_LAT, ENV_SEARCH_LON, ENV_SEARCH_NAME, ENV_VIEWPORT_BBOX,
    session::{FetcherFactory, SessionConfig, open_repository},
};

/// CLI arguments for the `viewport` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "viewport",
    long_about = "Print the stored places inside a viewport as JSON. Uncached \
                 parts inside the offline area are downloaded first unless \
                 --offline is set.",
    about = "Print the places in a viewport"
)]
#[ortho_config(prefix = "MIRADOR")]
pub(crate) struct ViewportArgs {
    /// Viewport as `min_lat,max_lat,min_lon,max_lon`.
    #[arg(value_name = ARG_BBOX, allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) bbox: Option<String>,
}

/// CLI arguments for the `preload` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "preload",
    long_about = "Download a region tile by tile so it is available offline. \
                 The region is limited to the offline area and tiles that \
                 are already cached are skipped.",
    about = "Download a region for offline use"
)]
#[ortho_config(prefix = "MIRADOR")]
pub(crate) struct PreloadArgs {
    /// Region as `min_lat,max_lat,min_lon,max_lon`.
    #[arg(value_name = ARG_BBOX, allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) bbox: Option<String>,
}

/// CLI arguments for the `missing` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(name = "missing", about = "Print the uncached parts of a viewport")]
#[ortho_config(prefix = "MIRADOR")]
pub(crate) struct MissingArgs {
    /// Viewport as `min_lat,max_lat,min_lon,max_lon`.
    #[arg(value_name = ARG_BBOX, allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) bbox: Option<String>,
}

/// CLI arguments for the `search` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "search",
    long_about = "Search the provider for places whose name matches, widening \
                 the radius around the given point until enough results are \
                 found. With --offline only stored places are searched.",
    about = "Search for places by name"
)]
#[ortho_config(prefix = "MIRADOR")]
pub(crate) struct SearchArgs {
    /// Name fragment to search for.
    #[arg(value_name = ARG_SEARCH_NAME)]
    #[serde(default)]
    pub(crate) name: Option<String>,
    /// Latitude to search around.
    #[arg(long = ARG_SEARCH_LAT, allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) lat: Option<f64>,
    /// Longitude to search around.
    #[arg(long = ARG_SEARCH_LON, allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) lon: Option<f64>,
}

/// `offline` subcommands.
#[derive(Debug, Clone, Subcommand)]
pub(crate) enum OfflineCommand {
    /// Set the home location that bounds downloads.
    Set {
        /// Centre latitude.
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Centre longitude.
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Radius in metres.
        #[arg(
            long,
            value_name = "meters",
            allow_hyphen_values = true,
            conflicts_with = "preset"
        )]
        radius: Option<f64>,
        /// Named radius preset.
        #[arg(long, value_enum)]
        preset: Option<RadiusPreset>,
    },
    /// Print the offline area.
    Info,
    /// Remove the offline area.
    Clear,
}

/// Radius presets for typical city sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum RadiusPreset {
    /// 5 km.
    SmallCity,
    /// 15 km.
    MediumCity,
    /// 30 km.
    LargeCity,
    /// 50 km.
    Metropolis,
}

impl RadiusPreset {
    pub(crate) const fn meters(self) -> f64 {
        match self {
            Self::SmallCity => RADIUS_SMALL_CITY,
            Self::MediumCity => RADIUS_MEDIUM_CITY,
            Self::LargeCity => RADIUS_LARGE_CITY,
            Self::Metropolis => RADIUS_METROPOLIS,
        }
    }
}

/// `cache` subcommands.
#[derive(Debug, Clone, Subcommand)]
pub(crate) enum CacheCommand {
    /// Print the cached footprint and offline area.
    Stats,
    /// Forget cached cells; with `--all` also delete downloaded places.
    Clear {
        /// Delete downloaded places too.
        #[arg(long)]
        all: bool,
    },
}

#[derive(Debug, Serialize)]
struct ClearReport {
    removed_places: usize,
}

fn parse_bbox(value: Option<String>, env: &'static str) -> Result<BoundingBox, CliError> {
    let value = value.ok_or(CliError::MissingArgument {
        field: ARG_BBOX,
        env,
    })?;
    value
        .parse()
        .map_err(|source| CliError::InvalidBoundingBox {
            field: ARG_BBOX,
            value,
            source,
        })
}

impl ViewportArgs {
    pub(crate) fn into_bbox(self) -> Result<BoundingBox, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        parse_bbox(merged.bbox, ENV_VIEWPORT_BBOX)
    }
}

impl PreloadArgs {
    pub(crate) fn into_bbox(self) -> Result<BoundingBox, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        parse_bbox(merged.bbox, ENV_PRELOAD_BBOX)
    }
}

impl MissingArgs {
    pub(crate) fn into_bbox(self) -> Result<BoundingBox, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        parse_bbox(merged.bbox, ENV_MISSING_BBOX)
    }
}

/// Resolved `search` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SearchConfig {
    pub(crate) name: String,
    pub(crate) lat: f64,
    pub(crate) lon: f64,
}

impl TryFrom<SearchArgs> for SearchConfig {
    type Error = CliError;

    fn try_from(args: SearchArgs) -> Result<Self, Self::Error> {
        let name = args.name.ok_or(CliError::MissingArgument {
            field: ARG_SEARCH_NAME,
            env: ENV_SEARCH_NAME,
        })?;
        let lat = args.lat.ok_or(CliError::MissingArgument {
            field: ARG_SEARCH_LAT,
            env: ENV_SEARCH_LAT,
        })?;
        let lon = args.lon.ok_or(CliError::MissingArgument {
            field: ARG_SEARCH_LON,
            env: ENV_SEARCH_LON,
        })?;
        Ok(Self { name, lat, lon })
    }
}

impl SearchArgs {
    pub(crate) fn into_config(self) -> Result<SearchConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SearchConfig::try_from(merged)
    }
}

pub(crate) fn run_viewport(
    args: ViewportArgs,
    session: &SessionConfig,
    factory: &dyn FetcherFactory,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let bbox = args.into_bbox()?;
    let repository = open_repository(session, factory)?;
    let places = repository.places_in_viewport(&bbox)?;
    write_json(writer, &places)
}

pub(crate) fn run_preload(
    args: PreloadArgs,
    session: &SessionConfig,
    factory: &dyn FetcherFactory,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let bbox = args.into_bbox()?;
    let repository = open_repository(session, factory)?;
    let report = repository.preload_area(&bbox)?;
    write_json(writer, &report)
}

pub(crate) fn run_missing(
    args: MissingArgs,
    session: &SessionConfig,
    factory: &dyn FetcherFactory,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let bbox = args.into_bbox()?;
    let repository = open_repository(session, factory)?;
    write_json(writer, &repository.missing_areas(&bbox))
}

pub(crate) fn run_offline(
    command: OfflineCommand,
    session: &SessionConfig,
    factory: &dyn FetcherFactory,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let repository = open_repository(session, factory)?;
    match command {
        OfflineCommand::Set {
            lat,
            lon,
            radius,
            preset,
        } => {
            let radius = radius
                .or_else(|| preset.map(RadiusPreset::meters))
                .unwrap_or(RADIUS_MEDIUM_CITY);
            repository.set_offline_center(lat, lon, radius)?;
        }
        OfflineCommand::Info => {}
        OfflineCommand::Clear => repository.clear_offline_area(),
    }
    write_json(writer, &repository.offline_area_info())
}

pub(crate) fn run_cache(
    command: CacheCommand,
    session: &SessionConfig,
    factory: &dyn FetcherFactory,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let repository = open_repository(session, factory)?;
    match command {
        CacheCommand::Stats => write_json(writer, &repository.cache_info()),
        CacheCommand::Clear { all: false } => {
            repository.clear_cache();
            write_json(writer, &repository.cache_info())
        }
        CacheCommand::Clear { all: true } => {
            let removed_places = repository.clear_all_data()?;
            write_json(writer, &ClearReport { removed_places })
        }
    }
}

pub(crate) fn run_search(
    args: SearchArgs,
    session: &SessionConfig,
    factory: &dyn FetcherFactory,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    let repository = open_repository(session, factory)?;
    let places = if session.online {
        repository.search_global(&config.name, config.lat, config.lon)?
    } else {
        repository.search_local(&config.name)?
    };
    write_json(writer, &places)
}

pub(crate) fn run_sync(
    session: &SessionConfig,
    factory: &dyn FetcherFactory,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let repository = open_repository(session, factory)?;
    let outcome = repository.sync_once()?;
    write_json(writer, &outcome)
}

fn write_json<T: Serialize + ?Sized>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn search_config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<SearchConfig, CliError> {
    let merged = SearchArgs::merge_from_layers(layers).map_err(CliError::from)?;
    SearchConfig::try_from(merged)
}
