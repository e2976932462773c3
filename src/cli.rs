//! The command line interface for the planner.
use crate::input::{LoadedScenario, load_scenario};
use crate::log;
use crate::normalise::{ModelVariant, NormalisedData};
use crate::optimisation::{SolveOutcome, build_and_solve};
use crate::output::metadata::write_metadata;
use crate::output::{
    SCAN_RESULTS_FILE_NAME, SEARCH_STEPS_FILE_NAME, SWEEP_RESULTS_FILE_NAME,
    create_output_directory, get_output_dir, write_csv, write_plan,
};
use crate::results::PlanResults;
use crate::scenario::Scenario;
use crate::search::{RefiningOracle, find_minimum_limit};
use crate::settings::Settings;
use crate::sweep::{run_scan, run_sweep};
use crate::units::Dimensionless;
use ::log::{info, warn};
use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the planner.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options shared by the commands which write output files
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Whether to write the per-supplier procurement plan
    #[arg(long)]
    pub write_procurement: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Solve a scenario once.
    Run {
        /// Path to the scenario directory.
        scenario_dir: PathBuf,
        /// Include the optional refining process in the model
        #[arg(long)]
        refining: bool,
        /// Copper limit to apply to every product (implies --refining)
        #[arg(long)]
        copper_limit: Option<f64>,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Find the lowest copper limit which doesn't increase cost.
    Search {
        /// Path to the scenario directory.
        scenario_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Solve the scenario for every combination in its `[sweep]` section.
    Sweep {
        /// Path to the scenario directory.
        scenario_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Solve the refining model over a range of copper limits.
    Scan {
        /// Path to the scenario directory.
        scenario_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Validate a scenario.
    Validate {
        /// The path to the scenario directory.
        scenario_dir: PathBuf,
    },
    /// Manage example scenarios.
    Example {
        /// The available subcommands for managing example scenarios.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run {
                scenario_dir,
                refining,
                copper_limit,
                opts,
            } => {
                let variant = if refining || copper_limit.is_some() {
                    ModelVariant::Refining
                } else {
                    ModelVariant::Baseline
                };
                let task = Task::Solve {
                    variant,
                    copper_limit,
                };
                handle_run_command(&scenario_dir, task, &opts, None)
            }
            Self::Search { scenario_dir, opts } => {
                handle_run_command(&scenario_dir, Task::Search, &opts, None)
            }
            Self::Sweep { scenario_dir, opts } => {
                handle_run_command(&scenario_dir, Task::Sweep, &opts, None)
            }
            Self::Scan { scenario_dir, opts } => {
                handle_run_command(&scenario_dir, Task::Scan, &opts, None)
            }
            Self::Validate { scenario_dir } => handle_validate_command(&scenario_dir, None),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start the planner
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ steelplan --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        // Output program help in markdown format
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// What to do with a loaded scenario
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Task {
    /// Solve the scenario once
    Solve {
        /// Which model to build
        variant: ModelVariant,
        /// Copper limit for every product, replacing any given in the scenario
        copper_limit: Option<f64>,
    },
    /// Search for the lowest copper limit which doesn't increase cost
    Search,
    /// Solve every combination in the scenario's sweep
    Sweep,
    /// Solve the refining model over a range of copper limits
    Scan,
}

impl Task {
    /// The name of the CLI command for this task
    fn command_name(self) -> &'static str {
        match self {
            Self::Solve { .. } => "run",
            Self::Search => "search",
            Self::Sweep => "sweep",
            Self::Scan => "scan",
        }
    }
}

/// Handle the commands which load a scenario and write results.
pub fn handle_run_command(
    scenario_path: &Path,
    task: Task,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    // Load program settings, if not provided
    let mut settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // These settings can be overridden by command-line arguments
    if opts.overwrite {
        settings.overwrite = true;
    }
    if opts.write_procurement {
        settings.write_procurement = true;
    }

    // Load the scenario to run
    let mut loaded = load_scenario(scenario_path).context("Failed to load scenario.")?;
    if let Task::Solve {
        copper_limit: Some(limit),
        ..
    } = task
    {
        loaded.scenario = loaded
            .scenario
            .with_copper_limit(Dimensionless(limit))
            .context("Invalid copper limit.")?;
    }

    // Get path to output folder
    let output_path = opts
        .output_dir
        .clone()
        .unwrap_or_else(|| get_output_dir(loaded.scenario.name()));

    let overwrite =
        create_output_directory(&output_path, settings.overwrite).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    // Initialise program logger
    log::init(&settings.log_level, Some(&output_path))
        .context("Failed to initialise logging.")?;

    let scenario_name = loaded.scenario.name().to_string();
    info!("Loaded scenario from {}", scenario_path.display());
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    write_metadata(
        &output_path,
        scenario_path,
        &scenario_name,
        task.command_name(),
    )
    .context("Failed to save metadata.")?;

    match task {
        Task::Solve { variant, .. } => {
            solve_and_write(
                &loaded.scenario,
                variant,
                &output_path,
                settings.write_procurement,
            )?;
        }
        Task::Search => run_search(&loaded, &output_path, settings.write_procurement)?,
        Task::Sweep => {
            let params = loaded
                .sweep
                .as_ref()
                .context("Scenario has no [sweep] section")?;
            let rows = run_sweep(&loaded.scenario, params)?;
            write_csv(&output_path.join(SWEEP_RESULTS_FILE_NAME), rows)?;
        }
        Task::Scan => {
            let rows = run_scan(&loaded.scenario, &loaded.scan)?;
            write_csv(&output_path.join(SCAN_RESULTS_FILE_NAME), rows)?;
        }
    }

    info!("Finished {} for scenario {scenario_name}", task.command_name());

    Ok(())
}

/// Solve a scenario and write the resulting plan.
///
/// A scenario with no plan isn't an error: it is reported and nothing is written.
fn solve_and_write(
    scenario: &Scenario,
    variant: ModelVariant,
    output_path: &Path,
    write_procurement: bool,
) -> Result<()> {
    let data = NormalisedData::new(scenario, variant)?;
    match build_and_solve(&data) {
        SolveOutcome::Optimal(solution) => {
            let results = PlanResults::new(&data, &solution);
            let costs = results.total_costs();
            info!(
                "Total cost: {:.2} (procurement {:.2}, storage {:.2}, refining {:.2})",
                costs.total().value(),
                costs.procurement.value(),
                costs.storage.value(),
                costs.refining().value()
            );
            write_plan(output_path, &results, write_procurement)
        }
        SolveOutcome::Error(reason) => bail!("Solver failed: {reason}"),
        outcome => {
            warn!("No plan for this scenario: model is {}", outcome.status());
            Ok(())
        }
    }
}

/// Run the minimum copper limit search and write the steps, along with the plan at the limit found
fn run_search(loaded: &LoadedScenario, output_path: &Path, write_procurement: bool) -> Result<()> {
    let mut oracle = RefiningOracle::new(&loaded.scenario)?;
    let outcome = find_minimum_limit(&mut oracle, &loaded.search)?;
    write_csv(&output_path.join(SEARCH_STEPS_FILE_NAME), &outcome.steps)?;

    if outcome.found {
        info!(
            "Minimum copper limit: {:.6} (baseline cost {:.2}, {} steps)",
            outcome.limit,
            outcome.baseline_cost,
            outcome.steps.len()
        );
    } else {
        info!(
            "No copper limit in the search bracket keeps the baseline cost of {:.2}",
            outcome.baseline_cost
        );
    }

    let scenario = loaded
        .scenario
        .with_copper_limit(Dimensionless(outcome.limit))?;
    solve_and_write(
        &scenario,
        ModelVariant::Refining,
        output_path,
        write_procurement,
    )
}

/// Handle the `validate` command.
pub fn handle_validate_command(scenario_path: &Path, settings: Option<Settings>) -> Result<()> {
    // Load program settings, if not provided
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;

    // Load/validate the scenario
    let loaded = load_scenario(scenario_path).context("Failed to validate scenario.")?;
    let scenario = &loaded.scenario;
    NormalisedData::new(scenario, ModelVariant::Baseline)
        .context("Failed to validate scenario.")?;
    if scenario.refining().is_some() {
        RefiningOracle::new(scenario).context("Failed to validate refining parameters.")?;
    }
    if let Some(sweep) = &loaded.sweep {
        sweep
            .validate(scenario.products().len())
            .context("Failed to validate sweep.")?;
    }
    loaded.scan.validate().context("Failed to validate scan.")?;

    info!("Scenario validation successful!");

    Ok(())
}
