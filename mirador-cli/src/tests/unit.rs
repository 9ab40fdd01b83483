//! Focused unit tests covering argument resolution.

use super::*;
use crate::commands::{RadiusPreset, SearchConfig, search_config_from_layers_for_test};
use mirador_core::BoundingBoxParseError;
use rstest::rstest;
use std::time::Duration;

#[rstest]
fn session_defaults_apply_without_flags() {
    let config = SessionConfig::from(SessionArgs::default());
    assert_eq!(config.state_dir.as_str(), session::DEFAULT_STATE_DIR);
    assert_eq!(config.overpass_url, mirador_data::overpass::DEFAULT_BASE_URL);
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert!(config.online);
}

#[rstest]
fn session_paths_live_in_the_state_dir() {
    let config = SessionConfig::from(SessionArgs {
        state_dir: Some("/tmp/mirador-state".into()),
        offline: true,
        ..SessionArgs::default()
    });
    assert_eq!(config.settings_path().as_str(), "/tmp/mirador-state/settings.db");
    assert_eq!(config.places_path().as_str(), "/tmp/mirador-state/places.db");
    assert!(!config.online);
}

#[rstest]
#[case(RadiusPreset::SmallCity, 5_000.0)]
#[case(RadiusPreset::MediumCity, 15_000.0)]
#[case(RadiusPreset::LargeCity, 30_000.0)]
#[case(RadiusPreset::Metropolis, 50_000.0)]
fn presets_map_to_metres(#[case] preset: RadiusPreset, #[case] meters: f64) {
    assert!((preset.meters() - meters).abs() < f64::EPSILON);
}

#[rstest]
#[case(None, Some(4.6), Some(-74.07), ARG_SEARCH_NAME, ENV_SEARCH_NAME)]
#[case(Some("Oro"), None, Some(-74.07), ARG_SEARCH_LAT, ENV_SEARCH_LAT)]
#[case(Some("Oro"), Some(4.6), None, ARG_SEARCH_LON, ENV_SEARCH_LON)]
fn search_without_required_fields_errors(
    #[case] name: Option<&str>,
    #[case] lat: Option<f64>,
    #[case] lon: Option<f64>,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let args = SearchArgs {
        name: name.map(str::to_owned),
        lat,
        lon,
    };
    let err = SearchConfig::try_from(args).expect_err("missing field should error");
    match err {
        CliError::MissingArgument {
            field: missing,
            env,
        } => {
            assert_eq!(missing, field);
            assert_eq!(env, env_var);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn search_layers_honour_precedence() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let mut composer = MergeComposer::new();
    composer.push_file(json!({ "name": "from-file", "lat": 1.0, "lon": 2.0 }), None);
    composer.push_environment(json!({ "lat": 4.6 }));
    composer.push_cli(json!({ "name": "Oro" }));

    let config = search_config_from_layers_for_test(composer.layers())
        .expect("merged config should build");
    assert_eq!(
        config,
        SearchConfig {
            name: "Oro".to_owned(),
            lat: 4.6,
            lon: 2.0,
        }
    );
}

#[rstest]
fn search_layers_map_configuration_errors() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "lat": "north" }));

    let err = search_config_from_layers_for_test(composer.layers())
        .expect_err("invalid layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn bbox_accepts_negative_coordinates() {
    let cli = Cli::try_parse_from(["mirador", "missing", "-34.62,-34.58,-58.40,-58.36"])
        .expect("negative coordinates should parse");
    match cli.command {
        Command::Missing(args) => {
            assert_eq!(args.bbox.as_deref(), Some("-34.62,-34.58,-58.40,-58.36"));
        }
        other => panic!("expected missing command, found {other:?}"),
    }
}

#[rstest]
fn radius_and_preset_conflict() {
    let err = Cli::try_parse_from([
        "mirador", "offline", "set", "--lat", "4.7", "--lon", "-74.0", "--radius", "1000",
        "--preset", "metropolis",
    ])
    .expect_err("radius and preset are exclusive");
    assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
}

#[rstest]
fn invalid_bbox_reports_the_value() {
    let args = ViewportArgs {
        bbox: Some("4.6,4.7,-74.1".to_owned()),
    };
    let err = args.into_bbox().expect_err("three numbers are not a box");
    match err {
        CliError::InvalidBoundingBox { field, value, source } => {
            assert_eq!(field, ARG_BBOX);
            assert_eq!(value, "4.6,4.7,-74.1");
            assert!(matches!(source, BoundingBoxParseError::WrongArity { found: 3 }));
        }
        other => panic!("expected InvalidBoundingBox, found {other:?}"),
    }
}

#[rstest]
#[case("NaN,2,3,4")]
#[case("1,2,3,inf")]
fn non_finite_bbox_is_rejected(#[case] input: &str) {
    let args = ViewportArgs {
        bbox: Some(input.to_owned()),
    };
    let err = args.into_bbox().expect_err("non-finite bounds are not a box");
    match err {
        CliError::InvalidBoundingBox { source, .. } => {
            assert_eq!(source, BoundingBoxParseError::NonFinite);
        }
        other => panic!("expected InvalidBoundingBox, found {other:?}"),
    }
}
