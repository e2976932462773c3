//! Common functionality for steelplan, a production planner for stainless steel made from scrap.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod id;
pub mod input;
pub mod log;
pub mod normalise;
pub mod optimisation;
pub mod output;
pub mod results;
pub mod scenario;
pub mod search;
pub mod settings;
pub mod sweep;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the config folder for the program.
///
/// This will be something like, e.g.: `~/.config/steelplan` on Linux.
pub fn get_steelplan_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        // Use the current directory if the platform has no config dir
        return PathBuf::new();
    };
    config_dir.push("steelplan");

    config_dir
}
