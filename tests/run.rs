//! Integration tests for the `run` command.
use steelplan::cli::{RunOpts, Task, handle_run_command};
use steelplan::normalise::ModelVariant;
use steelplan::scenario::MalformedScenario;
use steelplan::settings::Settings;
use std::path::PathBuf;
use tempfile::tempdir;

/// Get the path to the demo scenario.
fn get_scenario_dir() -> PathBuf {
    PathBuf::from("demos/stainless")
}

/// An integration test for the `run` command.
#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("STEELPLAN_LOG_LEVEL", "off") };

    let task = Task::Solve {
        variant: ModelVariant::Refining,
        copper_limit: None,
    };

    // Save results to non-existent directory to check that directory creation works
    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = RunOpts {
        output_dir: Some(output_dir.clone()),
        write_procurement: true,
        ..Default::default()
    };
    handle_run_command(&get_scenario_dir(), task, &opts, Some(Settings::default())).unwrap();

    for file_name in [
        "production.csv",
        "procurement.csv",
        "refining.csv",
        "costs.csv",
        "metadata.toml",
        "steelplan_info.log",
        "steelplan_error.log",
    ] {
        assert!(output_dir.join(file_name).is_file(), "Missing {file_name}");
    }

    // Second time will fail because the logging is already initialised
    let opts = RunOpts {
        output_dir: Some(tempdir.path().join("again")),
        ..Default::default()
    };
    assert_eq!(
        handle_run_command(&get_scenario_dir(), task, &opts, Some(Settings::default()))
            .unwrap_err()
            .chain()
            .next()
            .unwrap()
            .to_string(),
        "Failed to initialise logging."
    );
}

/// A copper limit given on the command line must be a fraction, and is rejected before anything
/// is written or solved.
#[test]
fn test_handle_run_command_bad_copper_limit() {
    for limit in [-0.5, 2.0] {
        let task = Task::Solve {
            variant: ModelVariant::Refining,
            copper_limit: Some(limit),
        };
        let tempdir = tempdir().unwrap();
        let output_dir = tempdir.path().join("results");
        let opts = RunOpts {
            output_dir: Some(output_dir.clone()),
            ..Default::default()
        };

        let err = handle_run_command(&get_scenario_dir(), task, &opts, Some(Settings::default()))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid copper limit.");
        assert!(matches!(
            err.downcast_ref::<MalformedScenario>(),
            Some(MalformedScenario::FractionOutOfRange {
                field: "copper_limit",
                ..
            })
        ));
        assert!(!output_dir.exists());
    }
}
