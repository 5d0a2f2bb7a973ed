//! Code for reading hazard results from CSV files.
use super::{input_err_msg, read_csv};
use crate::error::SelectionError;
use crate::hazard::{DisaggregationBin, HazardCurve, HazardKey, HazardResults};
use crate::intensity_measure::IntensityMeasure;
use anyhow::{Context, Result, bail};
use itertools::Itertools;
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// A row of the disaggregation file
#[derive(Debug, Deserialize, PartialEq)]
struct DisaggregationRow {
    rlz: u32,
    site: u32,
    imt: IntensityMeasure,
    poe_id: u32,
    mag: f64,
    dist: f64,
    poe: f64,
}

/// A row of the hazard curves file
#[derive(Debug, Deserialize, PartialEq)]
struct HazardCurveRow {
    rlz: u32,
    site: u32,
    imt: IntensityMeasure,
    iml: f64,
    poe: f64,
}

/// Map key for results. IMs are keyed by their canonical label.
type ResultKey = (u32, u32, String);

fn result_key(key: &HazardKey) -> ResultKey {
    (key.rlz, key.site, key.im.hazard_label())
}

/// Get the path to the disaggregation file for a calculation
pub fn disaggregation_file_path(results_dir: &Path, calc_id: u32) -> std::path::PathBuf {
    results_dir.join(format!("disagg_{calc_id}.csv"))
}

/// Get the path to the hazard curves file for a calculation
pub fn hazard_curves_file_path(results_dir: &Path, calc_id: u32) -> std::path::PathBuf {
    results_dir.join(format!("hazard_curves_{calc_id}.csv"))
}

/// Hazard results read from the CSV files of a disaggregation and a classical calculation.
///
/// The disaggregation file (`disagg_<calc_id>.csv`) has columns
/// `rlz,site,imt,poe_id,mag,dist,poe`; the hazard curves file (`hazard_curves_<calc_id>.csv`)
/// has columns `rlz,site,imt,iml,poe`.
#[derive(Debug, Default)]
pub struct CsvHazardResults {
    disaggregation: HashMap<(ResultKey, u32), Vec<DisaggregationBin>>,
    curves: HashMap<ResultKey, HazardCurve>,
}

impl CsvHazardResults {
    /// Read the results for the given calculations from `results_dir`
    pub fn from_dir(
        results_dir: &Path,
        disaggregation_calc_id: u32,
        classical_calc_id: u32,
    ) -> Result<Self> {
        let disagg_path = disaggregation_file_path(results_dir, disaggregation_calc_id);
        let disaggregation = read_disaggregation(&disagg_path)
            .with_context(|| input_err_msg(&disagg_path))
            .map_err(input_data_error)?;

        let curves_path = hazard_curves_file_path(results_dir, classical_calc_id);
        let curves = read_hazard_curves(&curves_path)
            .with_context(|| input_err_msg(&curves_path))
            .map_err(input_data_error)?;

        debug!(
            "Read {} disaggregations and {} hazard curves from {}",
            disaggregation.len(),
            curves.len(),
            results_dir.display()
        );

        Ok(Self {
            disaggregation,
            curves,
        })
    }
}

/// Wrap a failure to read hazard data as an input data error
fn input_data_error(err: anyhow::Error) -> anyhow::Error {
    SelectionError::InputData(format!("{err:#}")).into()
}

fn read_disaggregation(
    file_path: &Path,
) -> Result<HashMap<(ResultKey, u32), Vec<DisaggregationBin>>> {
    let map = read_csv::<DisaggregationRow>(file_path)?
        .map(|row| {
            let key = ((row.rlz, row.site, row.imt.hazard_label()), row.poe_id);
            let bin = DisaggregationBin {
                mag: row.mag,
                dist: row.dist,
                poe: row.poe,
            };
            (key, bin)
        })
        .into_group_map();

    Ok(map)
}

fn read_hazard_curves(file_path: &Path) -> Result<HashMap<ResultKey, HazardCurve>> {
    let grouped = read_csv::<HazardCurveRow>(file_path)?
        .map(|row| ((row.rlz, row.site, row.imt.hazard_label()), (row.iml, row.poe)))
        .into_group_map();

    let mut curves = HashMap::new();
    for (key, mut points) in grouped {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (imls, poes): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
        curves.insert(key, HazardCurve { imls, poes });
    }

    Ok(curves)
}

impl HazardResults for CsvHazardResults {
    fn disaggregation(&self, key: &HazardKey, poe_id: u32) -> Result<Vec<DisaggregationBin>> {
        let Some(bins) = self.disaggregation.get(&(result_key(key), poe_id)) else {
            bail!(SelectionError::InputData(format!(
                "No disaggregation results for rlz {}, site {}, IM {} and poe ID {poe_id}",
                key.rlz, key.site, key.im
            )));
        };

        Ok(bins.clone())
    }

    fn hazard_curve(&self, key: &HazardKey) -> Result<HazardCurve> {
        let Some(curve) = self.curves.get(&result_key(key)) else {
            bail!(SelectionError::InputData(format!(
                "No hazard curve for rlz {}, site {} and IM {}",
                key.rlz, key.site, key.im
            )));
        };

        Ok(curve.clone())
    }
}
