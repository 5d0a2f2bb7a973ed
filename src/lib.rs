//! Common functionality for gmselect: conditional-spectrum selection of ground-motion records.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod case;
pub mod cli;
pub mod correlation;
pub mod error;
pub mod gmpe;
pub mod hazard;
pub mod id;
pub mod input;
pub mod intensity_measure;
pub mod job;
pub mod log;
pub mod output;
pub mod parameters;
pub mod recording;
pub mod selection;
pub mod settings;
pub mod stats;

#[cfg(test)]
mod fixture;

/// Get the config directory for gmselect.
///
/// Falls back to the current directory if the platform has no config directory.
pub fn get_gmselect_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_default();
    path.push("gmselect");
    path
}
