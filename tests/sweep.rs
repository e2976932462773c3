//! Integration tests for the `sweep` command.
use steelplan::cli::{RunOpts, Task, handle_run_command};
use steelplan::settings::Settings;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

/// Get the path to the demo scenario.
fn get_scenario_dir() -> PathBuf {
    PathBuf::from("demos/stainless")
}

/// Count the data rows in a CSV file
fn count_rows(file_path: &std::path::Path) -> usize {
    fs::read_to_string(file_path).unwrap().lines().count() - 1
}

/// An integration test for the `sweep` command.
#[test]
fn test_handle_sweep_command() {
    unsafe { std::env::set_var("STEELPLAN_LOG_LEVEL", "off") };

    let tempdir = tempdir().unwrap();
    let opts = RunOpts {
        output_dir: Some(tempdir.path().to_path_buf()),
        ..Default::default()
    };
    handle_run_command(
        &get_scenario_dir(),
        Task::Sweep,
        &opts,
        Some(Settings::default()),
    )
    .unwrap();

    // 3 capacities * 2 * 1 * 2 storage cost combinations
    assert_eq!(count_rows(&tempdir.path().join("sweep_results.csv")), 12);
}
