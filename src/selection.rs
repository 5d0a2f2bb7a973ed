//! The record selection pipeline, run once per case.
//!
//! The stages are run in order: the conditioning value is derived from the hazard results, the
//! GMPE context is built, the database is screened, the target spectrum is computed, spectra are
//! simulated from it, records are matched to the simulated spectra and finally the selected set is
//! optimised.
use crate::case::Case;
use crate::correlation::CorrelationModel;
use crate::gmpe::{GmmContext, GroundMotionModel};
use crate::hazard::{HazardKey, HazardResults};
use crate::intensity_measure::IntensityMeasure;
use crate::parameters::JobParameters;
use crate::recording::RecordingDatabase;
use crate::stats::{find_period, merge_periods};
use anyhow::Result;
use log::info;

pub mod conditioning;
use conditioning::{ConditioningValue, compute_conditioning_value};
pub mod gmm;
use gmm::build_gmm_context;
pub mod screen;
use screen::{CandidateSet, ScreeningCriteria, screen_database};
pub mod target;
use target::{TargetDistribution, compute_target_distribution};
pub mod simulate;
use simulate::simulate_spectra;
pub mod matcher;
use matcher::{SelectedSet, match_records};
pub mod optimise;
use optimise::{OptimisationSettings, optimise_selection};

/// The periods at which a case's spectra are defined
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodGrid {
    /// Sorted union of the target periods and the periods defining the IM
    pub periods: Vec<f64>,
    /// Indices into `periods` of the periods defining the IM. The log of the IM is the mean of the
    /// log spectrum over these.
    pub im_indices: Vec<usize>,
}

impl PeriodGrid {
    /// Build the period grid for the given intensity measure.
    ///
    /// For PGA and SA the conditioning period is added to the target periods; for AvgSA the
    /// averaging periods are.
    pub fn new(im: IntensityMeasure, target_periods: &[f64], avg_periods: &[f64]) -> Result<Self> {
        let im_periods = match im.conditioning_period() {
            Some(period) => vec![period],
            None => avg_periods.to_vec(),
        };
        let periods = merge_periods([target_periods, im_periods.as_slice()]);
        let im_indices = im_periods
            .iter()
            .map(|period| find_period(&periods, *period))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            periods,
            im_indices,
        })
    }

    /// The natural log of the IM for the given log spectrum
    pub fn ln_im(&self, ln_spectrum: &[f64]) -> f64 {
        let sum: f64 = self.im_indices.iter().map(|idx| ln_spectrum[*idx]).sum();
        sum / self.im_indices.len() as f64
    }
}

/// The shared, read-only inputs of every case
pub struct SelectionInputs<'a> {
    /// The job parameters
    pub params: &'a JobParameters,
    /// Hazard results
    pub hazard: &'a dyn HazardResults,
    /// The full recording database
    pub database: &'a RecordingDatabase,
    /// The GMPE used for the target spectrum
    pub gmpe: &'a dyn GroundMotionModel,
    /// The inter-period correlation model
    pub correlation: &'a dyn CorrelationModel,
}

/// Everything produced by a case
#[derive(Debug, Clone)]
pub struct CaseResult {
    /// The conditioning value with its magnitude and distance
    pub conditioning: ConditioningValue,
    /// The GMPE context used for the target spectrum
    pub gmm_context: GmmContext,
    /// The case's period grid
    pub grid: PeriodGrid,
    /// The target distribution of the log spectrum
    pub target: TargetDistribution,
    /// The screened candidate recordings
    pub candidates: CandidateSet,
    /// The final selection
    pub selection: SelectedSet,
    /// Value of the optimisation objective, initially and after each pass
    pub objective_history: Vec<f64>,
}

/// Run the selection pipeline for a single case
pub fn run_case(inputs: &SelectionInputs, case: &Case) -> Result<CaseResult> {
    let params = inputs.params;
    let selection = &params.selection;

    let key = HazardKey {
        rlz: case.site.rlz,
        site: case.site.id,
        im: case.im,
    };
    let conditioning = compute_conditioning_value(
        inputs.hazard,
        &key,
        case.level,
        params.investigation_time,
    )?;
    info!(
        "Conditioning value: {:.4} g (M = {:.2}, Rjb = {:.1} km)",
        conditioning.im_star, conditioning.magnitude, conditioning.rjb
    );

    let gmm_context = build_gmm_context(
        &params.rupture,
        case.site,
        conditioning.magnitude,
        conditioning.rjb,
    )?;

    let grid = PeriodGrid::new(case.im, &params.target_periods, &params.avg_periods)?;
    let criteria = ScreeningCriteria::new(&params.database, case.site, case.level, &conditioning)?;
    let candidates = screen_database(inputs.database, &criteria, &grid, selection.n_gm)?;

    let target = compute_target_distribution(
        inputs.gmpe,
        inputs.correlation,
        &gmm_context,
        &grid,
        conditioning.im_star,
    )?;

    let mut rng = case.rng(selection.random_seed);
    let simulated = simulate_spectra(
        &target,
        selection.n_gm,
        selection.n_trials,
        &selection.weights,
        &mut rng,
    );

    let initial = match_records(&candidates, &simulated.spectra, &grid, case.level.maxsf)?;
    let settings = OptimisationSettings {
        maxsf: case.level.maxsf,
        weights: selection.weights,
        penalty: selection.penalty,
        n_loop: selection.n_loop,
    };
    let optimised = optimise_selection(&candidates, &target, &grid, initial, &settings);
    if let (Some(first), Some(last)) = (
        optimised.objective_history.first(),
        optimised.objective_history.last(),
    ) {
        info!("Optimisation objective: {first:.4} -> {last:.4}");
    }

    Ok(CaseResult {
        conditioning,
        gmm_context,
        grid,
        target,
        candidates,
        selection: optimised.selection,
        objective_history: optimised.objective_history,
    })
}
