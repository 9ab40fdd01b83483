//! Test helpers for running commands against a temporary state directory.

use super::*;
use camino::Utf8PathBuf;
use geo::Coord;
use mirador_core::{FetchError, Place, PlaceFetcher, test_support::StubPlaceFetcher};
use tempfile::TempDir;

/// Fetcher factory serving a fixed set of places.
#[derive(Debug, Default)]
pub(super) struct StubFetcherFactory {
    places: Vec<Place>,
    failure: Option<FetchError>,
}

impl StubFetcherFactory {
    pub(super) fn with_places(places: Vec<Place>) -> Self {
        Self {
            places,
            failure: None,
        }
    }

    pub(super) fn failing(error: FetchError) -> Self {
        Self {
            places: Vec::new(),
            failure: Some(error),
        }
    }
}

impl FetcherFactory for StubFetcherFactory {
    fn build(&self, _config: &SessionConfig) -> Result<Box<dyn PlaceFetcher>, CliError> {
        let fetcher = StubPlaceFetcher::with_places(self.places.clone());
        fetcher.set_failure(self.failure.clone());
        Ok(Box::new(fetcher))
    }
}

/// Temporary state directory removed on drop.
pub(super) struct StateDir {
    _dir: TempDir,
    path: Utf8PathBuf,
}

impl StateDir {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("state")).expect("utf-8 state dir");
        Self { _dir: dir, path }
    }

    pub(super) fn path(&self) -> &Utf8PathBuf {
        &self.path
    }

    /// Run `mirador --state-dir <dir> <args>` and return its JSON output.
    pub(super) fn run(
        &self,
        factory: &dyn FetcherFactory,
        args: &[&str],
    ) -> Result<serde_json::Value, CliError> {
        let mut argv = vec!["mirador", "--state-dir", self.path.as_str()];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).map_err(CliError::ArgumentParsing)?;
        let mut output = Vec::new();
        run_with(cli, factory, &mut output)?;
        let text = String::from_utf8(output).expect("utf-8 output");
        assert!(text.ends_with('\n'), "output should end with a newline");
        Ok(serde_json::from_str(&text).expect("JSON output"))
    }
}

pub(super) fn place(id: &str, name: &str, lat: f64, lon: f64) -> Place {
    Place::new(id, name, "museum", Coord { x: lon, y: lat })
}

/// Museo del Oro and Museo Botero in central Bogotá.
pub(super) fn bogota_museums() -> Vec<Place> {
    vec![
        place("osm_node_1", "Museo del Oro", 4.6019, -74.0721),
        place("osm_node_2", "Museo Botero", 4.5966, -74.0731),
    ]
}

pub(super) const DOWNTOWN: &str = "4.59,4.61,-74.08,-74.06";
