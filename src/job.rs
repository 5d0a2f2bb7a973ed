//! Running a selection job: loading its input data and running every case.
use crate::case::enumerate_cases;
use crate::correlation::{CorrelationModel, create_correlation_model};
use crate::gmpe::{GroundMotionModel, create_gmpe};
use crate::input::database::read_database;
use crate::input::hazard::CsvHazardResults;
use crate::output::write_case_outputs;
use crate::parameters::JobParameters;
use crate::recording::RecordingDatabase;
use crate::selection::{SelectionInputs, run_case};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{error, info};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// The outcome of each case, keyed by case name, in case order.
///
/// A successful case maps to the folder its outputs were written to.
pub type JobOutcomes = IndexMap<String, Result<PathBuf>>;

/// The data shared by every case of a job
pub struct JobData {
    /// Hazard results for the job's calculations
    pub hazard: CsvHazardResults,
    /// The full recording database
    pub database: RecordingDatabase,
    /// The GMPE used for the target spectra
    pub gmpe: Box<dyn GroundMotionModel>,
    /// The inter-period correlation model
    pub correlation: Box<dyn CorrelationModel>,
}

impl JobData {
    /// Read all the data files referred to by the job parameters
    pub fn load(params: &JobParameters) -> Result<Self> {
        let hazard = CsvHazardResults::from_dir(
            &params.hazard.results_dir,
            params.hazard.disaggregation_calc_id,
            params.hazard.classical_calc_id,
        )?;
        let database = read_database(&params.database.path)?;
        let gmpe = create_gmpe(&params.gmpe)?;
        let correlation = create_correlation_model(
            params.correlation_model,
            params.correlation_table_file.as_deref(),
        )?;

        Ok(Self {
            hazard,
            database,
            gmpe,
            correlation,
        })
    }

    /// The inputs to the selection of each case
    pub fn selection_inputs<'a>(&'a self, params: &'a JobParameters) -> SelectionInputs<'a> {
        SelectionInputs {
            params,
            hazard: &self.hazard,
            database: &self.database,
            gmpe: self.gmpe.as_ref(),
            correlation: self.correlation.as_ref(),
        }
    }
}

/// Run every case of the job in parallel, writing each one's outputs to a folder in
/// `output_path`.
///
/// A failing case does not stop the others. Its error is logged and returned in the outcomes.
pub fn run_job(params: &JobParameters, data: &JobData, output_path: &Path) -> JobOutcomes {
    let inputs = data.selection_inputs(params);
    let cases = enumerate_cases(params);
    let n_cases = cases.len();
    info!("Running {n_cases} cases");

    let outcomes: Vec<_> = cases
        .par_iter()
        .enumerate()
        .map(|(idx, case)| {
            let name = case.name();
            info!("Processing case {}/{n_cases}: {name}", idx + 1);

            let outcome = run_case(&inputs, case)
                .and_then(|result| write_case_outputs(output_path, &name, &result))
                .with_context(|| format!("Case {name} failed"));
            if let Err(err) = &outcome {
                error!("{err:#}");
            }

            (name.to_string(), outcome)
        })
        .collect();

    outcomes.into_iter().collect()
}

/// The number of cases which failed
pub fn count_failures(outcomes: &JobOutcomes) -> usize {
    outcomes.values().filter(|outcome| outcome.is_err()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SelectionError, selection_error};
    use crate::fixture::{DATABASE_CSV, GMPE_COEFFICIENTS_CSV, job_parameters, write_hazard_files};
    use rstest::rstest;
    use std::fs;
    use tempfile::tempdir;

    /// Write the fixture data files to `dir` and point the parameters at them
    fn write_data_files(params: &mut JobParameters, dir: &Path) {
        write_hazard_files(dir);
        fs::write(dir.join("database.csv"), DATABASE_CSV).unwrap();
        fs::write(dir.join("gmpe.csv"), GMPE_COEFFICIENTS_CSV).unwrap();
        params.hazard.results_dir = dir.to_path_buf();
        params.database.path = dir.join("database.csv");
        params.gmpe.coefficients_file = dir.join("gmpe.csv");
    }

    #[rstest]
    fn test_job_data_load(mut job_parameters: JobParameters) {
        let dir = tempdir().unwrap();
        write_data_files(&mut job_parameters, dir.path());
        let data = JobData::load(&job_parameters).unwrap();
        assert_eq!(data.database.recordings.len(), 8);
    }

    #[rstest]
    fn test_job_data_load_missing_hazard(mut job_parameters: JobParameters) {
        let dir = tempdir().unwrap();
        write_data_files(&mut job_parameters, dir.path());
        fs::remove_file(dir.path().join("disagg_1.csv")).unwrap();
        let err = JobData::load(&job_parameters).err().unwrap();
        assert!(matches!(
            selection_error(&err),
            Some(SelectionError::InputData(_))
        ));
    }

    #[rstest]
    fn test_run_job_failures_are_per_case(mut job_parameters: JobParameters) {
        let dir = tempdir().unwrap();
        write_data_files(&mut job_parameters, dir.path());
        let data = JobData::load(&job_parameters).unwrap();

        // The hazard files have no results for site 1, so every case fails
        let output_dir = dir.path().join("output");
        let outcomes = run_job(&job_parameters, &data, &output_dir);
        assert_eq!(outcomes.len(), 4);
        assert_eq!(count_failures(&outcomes), 4);
        assert_eq!(
            outcomes.keys().collect::<Vec<_>>(),
            [
                "SA(0.5)-site_1-poe-0",
                "AvgSA-site_1-poe-0",
                "SA(0.5)-site_1-poe-1",
                "AvgSA-site_1-poe-1"
            ]
        );
        for outcome in outcomes.values() {
            let err = outcome.as_ref().unwrap_err();
            assert!(matches!(
                selection_error(err),
                Some(SelectionError::InputData(_))
            ));
        }
    }
}
