//! Code related to the demo scenarios and the CLI commands for interacting with them.
use super::{RunOpts, Task, handle_run_command};
use crate::normalise::ModelVariant;
use crate::settings::Settings;
use anyhow::{Context, Result, bail, ensure};
use clap::Subcommand;
use include_dir::{Dir, DirEntry, include_dir};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The directory containing the demo scenarios.
const DEMOS_DIR: Dir = include_dir!("demos");

/// The available subcommands for managing example scenarios.
#[derive(Subcommand)]
pub enum ExampleSubcommands {
    /// List available examples.
    List,
    /// Provide information about the specified example.
    Info {
        /// The name of the example.
        name: String,
    },
    /// Extract an example scenario to a new directory.
    Extract {
        /// The name of the example to extract.
        name: String,
        /// The destination folder for the example.
        new_path: Option<PathBuf>,
    },
    /// Run an example.
    Run {
        /// The name of the example to run.
        name: String,
        /// Include the optional refining process in the model
        #[arg(long)]
        refining: bool,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
}

impl ExampleSubcommands {
    /// Execute the supplied example subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::List => handle_example_list_command(),
            Self::Info { name } => handle_example_info_command(&name)?,
            Self::Extract {
                name,
                new_path: dest,
            } => handle_example_extract_command(&name, dest.as_deref())?,
            Self::Run {
                name,
                refining,
                opts,
            } => {
                let variant = if refining {
                    ModelVariant::Refining
                } else {
                    ModelVariant::Baseline
                };
                let task = Task::Solve {
                    variant,
                    copper_limit: None,
                };
                handle_example_run_command(&name, task, &opts, None)?;
            }
        }

        Ok(())
    }
}

/// Handle the `example list` command.
fn handle_example_list_command() {
    for entry in DEMOS_DIR.dirs() {
        println!("{}", entry.path().display());
    }
}

/// Handle the `example info` command.
fn handle_example_info_command(name: &str) -> Result<()> {
    let path: PathBuf = [name, "README.txt"].iter().collect();
    let readme = DEMOS_DIR
        .get_file(path)
        .context("Example not found.")?
        .contents_utf8()
        .context("README.txt is not UTF-8 encoded")?;

    println!("{readme}");

    Ok(())
}

/// Handle the `example extract` command
fn handle_example_extract_command(name: &str, dest: Option<&Path>) -> Result<()> {
    let dest = dest.unwrap_or(Path::new(name));
    extract_example(name, dest)
}

/// Extract the specified example to a new directory
fn extract_example(name: &str, new_path: &Path) -> Result<()> {
    // Find the subdirectory in DEMOS_DIR whose name matches `name`.
    let sub_dir = DEMOS_DIR.get_dir(name).context("Example not found.")?;

    ensure!(
        !new_path.exists(),
        "Destination directory {} already exists",
        new_path.display()
    );

    // Copy the contents of the subdirectory to the destination
    fs::create_dir(new_path)?;
    for entry in sub_dir.entries() {
        match entry {
            DirEntry::Dir(_) => bail!("Subdirectories in examples not supported"),
            DirEntry::File(f) => {
                let file_name = f
                    .path()
                    .file_name()
                    .context("Example file has no name")?;
                fs::write(new_path.join(file_name), f.contents())?;
            }
        }
    }

    Ok(())
}

/// Handle the `example run` command.
pub fn handle_example_run_command(
    name: &str,
    task: Task,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let temp_dir = TempDir::new().context("Failed to create temporary directory.")?;
    let scenario_path = temp_dir.path().join(name);
    extract_example(name, &scenario_path)?;
    handle_run_command(&scenario_path, task, opts, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::load_scenario;
    use tempfile::tempdir;

    #[test]
    fn test_demos_have_readmes() {
        for entry in DEMOS_DIR.dirs() {
            let name = entry.path().to_str().unwrap();
            assert!(
                handle_example_info_command(name).is_ok(),
                "Demo {name} has no README.txt"
            );
        }
    }

    #[test]
    fn test_extract_and_load_demos() {
        let dir = tempdir().unwrap();
        for entry in DEMOS_DIR.dirs() {
            let name = entry.path().to_str().unwrap();
            let dest = dir.path().join(name);
            extract_example(name, &dest).unwrap();
            load_scenario(&dest).unwrap();

            // Extracting again over the top isn't allowed
            assert!(extract_example(name, &dest).is_err());
        }
    }

    #[test]
    fn test_extract_unknown_example() {
        let dir = tempdir().unwrap();
        assert!(extract_example("missing", &dir.path().join("missing")).is_err());
    }
}
