//! The module responsible for writing output data to disk.
use crate::case::CaseName;
use crate::gmpe::GmmContext;
use crate::selection::CaseResult;
use anyhow::{Context, Result, ensure};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which job-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "gmselect_results";

/// The output file name for the selected records
const SELECTION_FILE_NAME: &str = "selection.csv";

/// The output file name for the target spectrum
const TARGET_SPECTRUM_FILE_NAME: &str = "target_spectrum.csv";

/// The output file name for the scaled spectra of the selected records
const SELECTED_SPECTRA_FILE_NAME: &str = "selected_spectra.csv";

/// The output file name for the summary of a case
const CASE_INFO_FILE_NAME: &str = "case_info.toml";

/// Number of standard deviations either side of the median in the target spectrum output
const TARGET_BAND_SIGMAS: f64 = 2.0;

/// Get the default output folder for the job file at `job_file`
pub fn get_output_dir(job_file: &Path) -> Result<PathBuf> {
    let job_name = job_file
        .file_stem()
        .context("Job file path has no file name")?
        .to_str()
        .context("Invalid chars in job file name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, job_name].iter().collect())
}

/// Create a new output directory, deleting any existing one if `allow_overwrite` is set.
///
/// # Returns
///
/// Whether a non-empty existing folder was deleted
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut entries) = fs::read_dir(output_dir) {
        if entries.next().is_none() {
            // Already exists and is empty
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Rerun with --overwrite or set \
            overwrite = true in settings.toml."
        );
        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// A row of the selection CSV file
#[derive(Serialize, Debug, PartialEq)]
struct SelectionRow<'a> {
    slot: usize,
    source: &'a str,
    record_id: &'a str,
    event_id: &'a str,
    station_id: &'a str,
    magnitude: f64,
    rjb: f64,
    vs30: f64,
    ec8: Option<String>,
    scale_factor: f64,
}

/// A row of the target spectrum CSV file
#[derive(Serialize, Debug, PartialEq)]
struct TargetSpectrumRow {
    period: f64,
    ln_mean: f64,
    ln_stdev: f64,
    median: f64,
    lower: f64,
    upper: f64,
}

/// A row of the selected spectra CSV file
#[derive(Serialize, Debug, PartialEq)]
struct SelectedSpectrumRow<'a> {
    slot: usize,
    source: &'a str,
    record_id: &'a str,
    period: f64,
    sa: f64,
}

/// The contents of the case summary file
#[derive(Serialize, Debug, PartialEq)]
struct CaseInfo<'a> {
    case: String,
    n_candidates: usize,
    objective_history: &'a [f64],
    conditioning: ConditioningInfo,
    gmm_context: &'a GmmContext,
}

/// The conditioning value and controlling earthquake
#[derive(Serialize, Debug, PartialEq)]
struct ConditioningInfo {
    im_star: f64,
    magnitude: f64,
    rjb: f64,
}

/// Write the output files for a case into a folder named after it.
///
/// # Returns
///
/// The path to the case's folder
pub fn write_case_outputs(
    output_path: &Path,
    name: &CaseName,
    result: &CaseResult,
) -> Result<PathBuf> {
    let case_dir = output_path.join(name.to_string());
    fs::create_dir_all(&case_dir)
        .with_context(|| format!("Failed to create folder {}", case_dir.display()))?;

    write_selection(&case_dir.join(SELECTION_FILE_NAME), result)?;
    write_target_spectrum(&case_dir.join(TARGET_SPECTRUM_FILE_NAME), result)?;
    write_selected_spectra(&case_dir.join(SELECTED_SPECTRA_FILE_NAME), result)?;
    write_case_info(&case_dir.join(CASE_INFO_FILE_NAME), name, result)?;

    Ok(case_dir)
}

/// Write the identities, metadata and scale factors of the selected records
fn write_selection(file_path: &Path, result: &CaseResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;
    for (slot, record) in result.selection.records.iter().enumerate() {
        let recording = &result.candidates.candidates[record.candidate].recording;
        let identity = &recording.identity;
        writer.serialize(SelectionRow {
            slot: slot + 1,
            source: &identity.source.0,
            record_id: &identity.record_id.0,
            event_id: &identity.event_id.0,
            station_id: &identity.station_id.0,
            magnitude: recording.magnitude,
            rjb: recording.rjb,
            vs30: recording.vs30,
            ec8: recording.ec8.map(|class| class.to_string()),
            scale_factor: record.scale_factor,
        })?;
    }
    writer.flush()?;

    Ok(())
}

/// Write the target spectrum, with its median and a band of two standard deviations in g
fn write_target_spectrum(file_path: &Path, result: &CaseResult) -> Result<()> {
    let target = &result.target;
    let mut writer = csv::Writer::from_path(file_path)?;
    for ((period, ln_mean), ln_stdev) in target.periods.iter().zip(&target.mean).zip(&target.stdev)
    {
        writer.serialize(TargetSpectrumRow {
            period: *period,
            ln_mean: *ln_mean,
            ln_stdev: *ln_stdev,
            median: ln_mean.exp(),
            lower: (ln_mean - TARGET_BAND_SIGMAS * ln_stdev).exp(),
            upper: (ln_mean + TARGET_BAND_SIGMAS * ln_stdev).exp(),
        })?;
    }
    writer.flush()?;

    Ok(())
}

/// Write the scaled spectra (g) of the selected records
fn write_selected_spectra(file_path: &Path, result: &CaseResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;
    for (slot, record) in result.selection.records.iter().enumerate() {
        let identity = &result.candidates.candidates[record.candidate].recording.identity;
        for (period, ln_sa) in result.grid.periods.iter().zip(&record.ln_spectrum) {
            writer.serialize(SelectedSpectrumRow {
                slot: slot + 1,
                source: &identity.source.0,
                record_id: &identity.record_id.0,
                period: *period,
                sa: ln_sa.exp(),
            })?;
        }
    }
    writer.flush()?;

    Ok(())
}

/// Write the summary of the case in TOML format
fn write_case_info(file_path: &Path, name: &CaseName, result: &CaseResult) -> Result<()> {
    let info = CaseInfo {
        case: name.to_string(),
        n_candidates: result.candidates.len(),
        conditioning: ConditioningInfo {
            im_star: result.conditioning.im_star,
            magnitude: result.conditioning.magnitude,
            rjb: result.conditioning.rjb,
        },
        objective_history: &result.objective_history,
        gmm_context: &result.gmm_context,
    };
    fs::write(file_path, toml::to_string(&info)?)?;

    Ok(())
}
