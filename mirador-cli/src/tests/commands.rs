//! Command flows exercised end to end against SQLite state on disk.

use super::helpers::{DOWNTOWN, StateDir, StubFetcherFactory, bogota_museums, place};
use super::*;
use mirador_core::FetchError;
use mirador_data::RepositoryError;
use rstest::{fixture, rstest};
use serde_json::json;

#[fixture]
fn state() -> StateDir {
    StateDir::new()
}

#[fixture]
fn museums() -> StubFetcherFactory {
    StubFetcherFactory::with_places(bogota_museums())
}

fn names(output: &serde_json::Value) -> Vec<String> {
    let mut names: Vec<String> = output
        .as_array()
        .expect("array output")
        .iter()
        .filter_map(|place| place.get("name").and_then(serde_json::Value::as_str))
        .map(str::to_owned)
        .collect();
    names.sort();
    names
}

#[rstest]
fn viewport_downloads_and_caches(state: StateDir, museums: StubFetcherFactory) {
    let places = state
        .run(&museums, &["viewport", DOWNTOWN])
        .expect("viewport should succeed");
    assert_eq!(names(&places), ["Museo Botero", "Museo del Oro"]);
    assert!(state.path().join("settings.db").exists());
    assert!(state.path().join("places.db").exists());

    let missing = state
        .run(&museums, &["missing", DOWNTOWN])
        .expect("missing should succeed");
    assert_eq!(missing, json!([]));

    let stats = state
        .run(&museums, &["cache", "stats"])
        .expect("stats should succeed");
    let cached = stats["cached_cells"].as_u64().expect("cached cell count");
    assert!(cached > 0);
}

#[rstest]
fn offline_viewport_serves_stored_places_only(state: StateDir, museums: StubFetcherFactory) {
    let before = state
        .run(&museums, &["--offline", "viewport", DOWNTOWN])
        .expect("offline viewport should succeed");
    assert_eq!(before, json!([]));

    state
        .run(&museums, &["viewport", DOWNTOWN])
        .expect("online viewport should succeed");
    let after = state
        .run(
            &StubFetcherFactory::failing(FetchError::Parse {
                message: "unused".to_owned(),
            }),
            &["--offline", "viewport", DOWNTOWN],
        )
        .expect("offline viewport should succeed");
    assert_eq!(names(&after), ["Museo Botero", "Museo del Oro"]);
}

#[rstest]
fn failed_downloads_leave_the_viewport_missing(state: StateDir) {
    let failing = StubFetcherFactory::failing(FetchError::Network {
        url: "http://127.0.0.1:9/api/interpreter".to_owned(),
        message: "connection refused".to_owned(),
    });
    let places = state
        .run(&failing, &["viewport", DOWNTOWN])
        .expect("fetch failures are not fatal");
    assert_eq!(places, json!([]));

    let missing = state
        .run(&failing, &["missing", DOWNTOWN])
        .expect("missing should succeed");
    assert_eq!(missing.as_array().map(Vec::len), Some(1));
}

#[rstest]
fn offline_area_round_trips_through_settings(state: StateDir, museums: StubFetcherFactory) {
    let unset = state
        .run(&museums, &["offline", "info"])
        .expect("info should succeed");
    assert_eq!(unset["is_configured"], json!(false));

    state
        .run(
            &museums,
            &["offline", "set", "--lat", "4.7110", "--lon", "-74.0721", "--preset", "metropolis"],
        )
        .expect("set should succeed");
    let info = state
        .run(&museums, &["offline", "info"])
        .expect("info should succeed");
    assert_eq!(info["is_configured"], json!(true));
    assert_eq!(info["center_lat"], json!(4.711));
    assert_eq!(info["radius_meters"], json!(50_000.0));

    let cleared = state
        .run(&museums, &["offline", "clear"])
        .expect("clear should succeed");
    assert_eq!(cleared["is_configured"], json!(false));
}

#[rstest]
fn offline_set_rejects_invalid_radius(state: StateDir, museums: StubFetcherFactory) {
    let err = state
        .run(
            &museums,
            &["offline", "set", "--lat", "4.7", "--lon", "-74.0", "--radius", "-5"],
        )
        .expect_err("negative radius should fail");
    match err {
        CliError::Repository(RepositoryError::OfflineArea(_)) => {}
        other => panic!("expected OfflineArea error, found {other:?}"),
    }
}

#[rstest]
fn viewports_outside_the_offline_area_are_not_downloaded(state: StateDir) {
    let medellin = StubFetcherFactory::with_places(vec![place(
        "osm_node_9",
        "Museo de Antioquia",
        6.2526,
        -75.5686,
    )]);
    state
        .run(
            &medellin,
            &["offline", "set", "--lat", "4.7110", "--lon", "-74.0721", "--radius", "15000"],
        )
        .expect("set should succeed");
    let places = state
        .run(&medellin, &["viewport", "6.24,6.26,-75.58,-75.56"])
        .expect("viewport should succeed");
    assert_eq!(places, json!([]));
}

#[rstest]
fn sync_reports_status(state: StateDir, museums: StubFetcherFactory) {
    let unconfigured = state.run(&museums, &["sync"]).expect("sync should succeed");
    assert_eq!(unconfigured, json!({ "status": "unconfigured" }));

    let offline = state
        .run(&museums, &["--offline", "sync"])
        .expect("sync should succeed");
    assert_eq!(offline, json!({ "status": "offline" }));

    state
        .run(
            &museums,
            &["offline", "set", "--lat", "4.6019", "--lon", "-74.0721", "--radius", "500"],
        )
        .expect("set should succeed");
    let refreshed = state.run(&museums, &["sync"]).expect("sync should succeed");
    assert_eq!(refreshed["status"], json!("refreshed"));
    assert_eq!(refreshed["report"]["failed"], json!(0));
    assert!(refreshed["report"]["places"].as_u64().is_some_and(|n| n >= 1));
}

#[rstest]
fn preload_requires_connectivity(state: StateDir, museums: StubFetcherFactory) {
    let err = state
        .run(&museums, &["--offline", "preload", DOWNTOWN])
        .expect_err("preload needs the network");
    match err {
        CliError::Repository(RepositoryError::Offline) => {}
        other => panic!("expected Offline, found {other:?}"),
    }
}

#[rstest]
fn preload_skips_cached_tiles(state: StateDir, museums: StubFetcherFactory) {
    let first = state
        .run(&museums, &["preload", DOWNTOWN])
        .expect("preload should succeed");
    assert_eq!(first["skipped"], json!(0));
    let requested = first["requested"].as_u64().expect("requested count");
    assert!(requested > 0);

    let second = state
        .run(&museums, &["preload", DOWNTOWN])
        .expect("preload should succeed");
    assert_eq!(second["requested"], json!(0));
    assert_eq!(second["skipped"], json!(requested));
}

#[rstest]
fn cache_clear_all_removes_downloaded_places(state: StateDir, museums: StubFetcherFactory) {
    state
        .run(&museums, &["viewport", DOWNTOWN])
        .expect("viewport should succeed");
    let report = state
        .run(&museums, &["cache", "clear", "--all"])
        .expect("clear should succeed");
    assert_eq!(report, json!({ "removed_places": 2 }));

    let stats = state
        .run(&museums, &["cache", "stats"])
        .expect("stats should succeed");
    assert_eq!(stats["cached_cells"], json!(0));
}

#[rstest]
fn offline_search_reads_the_local_store(state: StateDir, museums: StubFetcherFactory) {
    state
        .run(&museums, &["viewport", DOWNTOWN])
        .expect("viewport should succeed");
    let found = state
        .run(
            &museums,
            &["--offline", "search", "botero", "--lat", "4.6", "--lon", "-74.07"],
        )
        .expect("search should succeed");
    assert_eq!(names(&found), ["Museo Botero"]);
}

#[rstest]
fn online_search_queries_the_provider(state: StateDir, museums: StubFetcherFactory) {
    let found = state
        .run(&museums, &["search", "museo", "--lat", "4.6", "--lon", "-74.07"])
        .expect("search should succeed");
    assert_eq!(names(&found), ["Museo Botero", "Museo del Oro"]);
}

#[rstest]
fn state_dir_that_is_a_file_is_rejected(museums: StubFetcherFactory) {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let file = dir.path().join("state");
    std::fs::write(&file, b"not a directory").expect("write file");
    let path = file.to_str().expect("utf-8 path");
    let cli = Cli::try_parse_from(["mirador", "--state-dir", path, "cache", "stats"])
        .expect("arguments should parse");
    let err = run_with(cli, &museums, &mut Vec::new()).expect_err("file is not a state dir");
    match err {
        CliError::CreateStateDir { .. } | CliError::StateDirNotDirectory { .. } => {}
        other => panic!("expected a state directory error, found {other:?}"),
    }
}
