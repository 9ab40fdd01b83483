//! Command-line interface for the Mirador places map.
//!
//! Every subcommand opens the state directory (settings and place databases),
//! assembles a [`mirador_data::PlacesRepository`] and prints its result as
//! JSON on standard output.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};

mod commands;
mod error;
mod session;

pub use error::CliError;

use commands::{
    CacheCommand, MissingArgs, OfflineCommand, PreloadArgs, SearchArgs, ViewportArgs, run_cache,
    run_missing, run_offline, run_preload, run_search, run_sync, run_viewport,
};
use session::{FetcherFactory, OverpassFetcherFactory, SessionArgs, SessionConfig};

const ARG_STATE_DIR: &str = "state-dir";
const ARG_OVERPASS_URL: &str = "overpass-url";
const ARG_TIMEOUT_SECS: &str = "timeout-secs";
const ARG_OFFLINE: &str = "offline";
const ARG_BBOX: &str = "bbox";
const ARG_SEARCH_NAME: &str = "name";
const ARG_SEARCH_LAT: &str = "lat";
const ARG_SEARCH_LON: &str = "lon";
const ENV_STATE_DIR: &str = "MIRADOR_STATE_DIR";
const ENV_OVERPASS_URL: &str = "MIRADOR_OVERPASS_URL";
const ENV_TIMEOUT_SECS: &str = "MIRADOR_TIMEOUT_SECS";
const ENV_OFFLINE: &str = "MIRADOR_OFFLINE";
const ENV_VIEWPORT_BBOX: &str = "MIRADOR_CMDS_VIEWPORT_BBOX";
const ENV_PRELOAD_BBOX: &str = "MIRADOR_CMDS_PRELOAD_BBOX";
const ENV_MISSING_BBOX: &str = "MIRADOR_CMDS_MISSING_BBOX";
const ENV_SEARCH_NAME: &str = "MIRADOR_CMDS_SEARCH_NAME";
const ENV_SEARCH_LAT: &str = "MIRADOR_CMDS_SEARCH_LAT";
const ENV_SEARCH_LON: &str = "MIRADOR_CMDS_SEARCH_LON";

/// Run the Mirador CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns a [`CliError`] when arguments are invalid, the state directory
/// cannot be opened or the command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    run_with(cli, &OverpassFetcherFactory, &mut stdout)
}

fn run_with(
    cli: Cli,
    factory: &dyn FetcherFactory,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let session = SessionConfig::from(cli.session);
    match cli.command {
        Command::Viewport(args) => run_viewport(args, &session, factory, writer),
        Command::Preload(args) => run_preload(args, &session, factory, writer),
        Command::Missing(args) => run_missing(args, &session, factory, writer),
        Command::Offline { command } => run_offline(command, &session, factory, writer),
        Command::Cache { command } => run_cache(command, &session, factory, writer),
        Command::Search(args) => run_search(args, &session, factory, writer),
        Command::Sync => run_sync(&session, factory, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "mirador",
    about = "Viewport cache and offline area tooling for the Mirador places map",
    version
)]
struct Cli {
    #[command(flatten)]
    session: SessionArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the places in a viewport, downloading uncached parts first.
    Viewport(ViewportArgs),
    /// Download a region for offline use.
    Preload(PreloadArgs),
    /// Print the uncached parts of a viewport.
    Missing(MissingArgs),
    /// Manage the offline area.
    Offline {
        #[command(subcommand)]
        command: OfflineCommand,
    },
    /// Inspect or clear the viewport cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    /// Search the provider for places by name.
    Search(SearchArgs),
    /// Download the whole offline area again.
    Sync,
}

#[cfg(test)]
mod tests;
