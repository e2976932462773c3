//! Integration tests for the `validate` command.
use steelplan::cli::handle_validate_command;
use steelplan::log::is_logger_initialised;
use steelplan::settings::Settings;
use std::path::PathBuf;

/// Get the path to the demo scenario.
fn get_scenario_dir() -> PathBuf {
    PathBuf::from("demos/stainless")
}

/// An integration test for the `validate` command.
///
/// We also check that the logger is initialised after it is run.
#[test]
fn test_handle_validate_command() {
    unsafe { std::env::set_var("STEELPLAN_LOG_LEVEL", "off") };

    assert!(!is_logger_initialised());

    handle_validate_command(&get_scenario_dir(), Some(Settings::default())).unwrap();

    assert!(is_logger_initialised());
}
