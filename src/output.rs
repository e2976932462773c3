//! The module responsible for writing output data to disk.
use crate::results::PlanResults;
use anyhow::{Context, Result, ensure};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which scenario-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "steelplan_results";

/// The output file name for the production plan
pub const PRODUCTION_FILE_NAME: &str = "production.csv";

/// The output file name for the procurement plan
pub const PROCUREMENT_FILE_NAME: &str = "procurement.csv";

/// The output file name for the refining plan
pub const REFINING_FILE_NAME: &str = "refining.csv";

/// The output file name for the cost breakdown
pub const COSTS_FILE_NAME: &str = "costs.csv";

/// The output file name for the steps of the copper limit search
pub const SEARCH_STEPS_FILE_NAME: &str = "search_steps.csv";

/// The output file name for sweep results
pub const SWEEP_RESULTS_FILE_NAME: &str = "sweep_results.csv";

/// The output file name for copper limit scan results
pub const SCAN_RESULTS_FILE_NAME: &str = "copper_limit_scan.csv";

/// Get the default output directory for the named scenario
pub fn get_output_dir(scenario_name: &str) -> PathBuf {
    [OUTPUT_DIRECTORY_ROOT, scenario_name].iter().collect()
}

/// Create a new output directory, with parents.
///
/// If the directory already exists and contains files, it is only replaced if `allow_overwrite` is
/// true.
///
/// # Returns
///
/// True if an existing directory was overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut entries) = fs::read_dir(output_dir) {
        if entries.next().is_none() {
            // Already exists and is empty
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. \
            Please delete the folder or pass the --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Write rows to a CSV file, with a header line taken from the row type
pub fn write_csv<T, I>(file_path: &Path, rows: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::Writer::from_path(file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Write a solved plan to CSV files in `output_path`.
///
/// The refining plan is only written if there is one.
///
/// # Arguments
///
/// * `output_path` - Folder where files will be saved
/// * `results` - The plan to write
/// * `write_procurement` - Whether to write the per-supplier procurement plan
pub fn write_plan(
    output_path: &Path,
    results: &PlanResults,
    write_procurement: bool,
) -> Result<()> {
    write_csv(&output_path.join(PRODUCTION_FILE_NAME), &results.production)?;
    if write_procurement {
        write_csv(&output_path.join(PROCUREMENT_FILE_NAME), &results.procurement)?;
    }
    if !results.refining.is_empty() {
        write_csv(&output_path.join(REFINING_FILE_NAME), &results.refining)?;
    }
    write_csv(&output_path.join(COSTS_FILE_NAME), results.cost_rows())?;

    Ok(())
}
