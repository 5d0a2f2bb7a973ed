//! Greedy optimisation of the selected set.
use super::PeriodGrid;
use super::matcher::{SelectedRecord, SelectedSet, scale_factor};
use super::screen::CandidateSet;
use super::target::TargetDistribution;
use crate::parameters::MomentWeights;
use crate::stats::{mean_and_stdev, sum_squared_diff};
use log::debug;

/// Number of standard deviations above the target mean beyond which a spectrum is penalised
const PENALTY_SIGMAS: f64 = 3.0;

/// Tolerance for the penalty bounds, so that spectra fixed at the conditioning value are not
/// penalised
const PENALTY_TOLERANCE: f64 = 1e-8;

/// Settings for [`optimise_selection`]
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisationSettings {
    /// Maximum allowable scale factor
    pub maxsf: f64,
    /// Weights of the mean and standard deviation errors (the skewness weight is unused)
    pub weights: MomentWeights,
    /// Penalty per spectral ordinate more than three standard deviations above the target mean
    pub penalty: f64,
    /// Number of passes
    pub n_loop: u32,
}

/// The optimised selection
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisationResult {
    /// The final selected set
    pub selection: SelectedSet,
    /// The objective for the initial set, followed by its value after each pass
    pub objective_history: Vec<f64>,
}

/// The objective minimised by the optimisation.
///
/// This is the weighted sum of squared errors of the set's mean and (population) standard
/// deviation of the log spectra, plus the penalty for each spectral ordinate more than three
/// standard deviations above the target mean. Ordinates below the target are not penalised.
pub fn objective(
    selection: &SelectedSet,
    target: &TargetDistribution,
    settings: &OptimisationSettings,
) -> f64 {
    let (mean, stdev) = mean_and_stdev(selection.ln_spectra());
    let mut value = settings.weights.mean * sum_squared_diff(&mean, &target.mean)
        + settings.weights.stdev * sum_squared_diff(&stdev, &target.stdev);

    if settings.penalty > 0.0 {
        let outliers = selection
            .ln_spectra()
            .flat_map(|spectrum| spectrum.iter().zip(&target.mean).zip(&target.stdev))
            .filter(|((sa, mean), stdev)| {
                *sa - *mean > PENALTY_SIGMAS * *stdev + PENALTY_TOLERANCE
            })
            .count();
        value += settings.penalty * outliers as f64;
    }

    value
}

/// Improve the selection by swapping records for unused candidates.
///
/// Each of the `n_loop` passes visits every slot in turn and tries every candidate not already
/// selected, scaled so that its IM equals the target's median IM. The candidate giving the lowest
/// objective replaces the incumbent only if it strictly improves on it. The number of passes is
/// fixed; there is no test for convergence.
pub fn optimise_selection(
    candidates: &CandidateSet,
    target: &TargetDistribution,
    grid: &PeriodGrid,
    initial: SelectedSet,
    settings: &OptimisationSettings,
) -> OptimisationResult {
    let ln_im = grid.ln_im(&target.mean);
    let mut selection = initial;
    let mut current = objective(&selection, target, settings);
    let mut objective_history = vec![current];

    for pass in 0..settings.n_loop {
        for slot in 0..selection.records.len() {
            let mut best: Option<(f64, SelectedRecord)> = None;
            for (idx, candidate) in candidates.candidates.iter().enumerate() {
                if selection.contains(idx) {
                    continue;
                }
                let Some(sf) = scale_factor(candidate, ln_im, settings.maxsf) else {
                    continue;
                };

                let incumbent = std::mem::replace(
                    &mut selection.records[slot],
                    SelectedRecord::new(idx, candidate, sf),
                );
                let value = objective(&selection, target, settings);
                let trial = std::mem::replace(&mut selection.records[slot], incumbent);

                let threshold = best.as_ref().map_or(current, |(value, _)| *value);
                if value < threshold {
                    best = Some((value, trial));
                }
            }

            if let Some((value, record)) = best {
                selection.records[slot] = record;
                current = value;
            }
        }

        debug!("Optimisation pass {}: objective {current}", pass + 1);
        objective_history.push(current);
    }

    OptimisationResult {
        selection,
        objective_history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{candidate_set, target_distribution};
    use crate::intensity_measure::IntensityMeasure;
    use crate::selection::matcher::match_records;
    use float_cmp::assert_approx_eq;
    use itertools::Itertools;
    use rstest::{fixture, rstest};

    #[fixture]
    fn grid() -> PeriodGrid {
        PeriodGrid::new(IntensityMeasure::Sa(0.5), &[0.1, 0.5, 1.0], &[]).unwrap()
    }

    #[fixture]
    fn settings() -> OptimisationSettings {
        OptimisationSettings {
            maxsf: 5.0,
            weights: MomentWeights::from([1.0, 2.0, 0.3]),
            penalty: 0.0,
            n_loop: 5,
        }
    }

    /// Initial selection made by matching to the target mean
    fn initial(
        candidates: &CandidateSet,
        target: &TargetDistribution,
        grid: &PeriodGrid,
        n_gm: usize,
    ) -> SelectedSet {
        let simulated = vec![target.mean.clone(); n_gm];
        match_records(candidates, &simulated, grid, 5.0).unwrap()
    }

    #[rstest]
    fn test_objective_non_increasing(
        candidate_set: CandidateSet,
        target_distribution: TargetDistribution,
        grid: PeriodGrid,
        settings: OptimisationSettings,
    ) {
        let initial = initial(&candidate_set, &target_distribution, &grid, 3);
        let result = optimise_selection(&candidate_set, &target_distribution, &grid, initial, &settings);

        assert_eq!(result.objective_history.len(), 6);
        assert!(result.objective_history.windows(2).all(|w| w[1] <= w[0]));
        assert_approx_eq!(
            f64,
            *result.objective_history.last().unwrap(),
            objective(&result.selection, &target_distribution, &settings),
            epsilon = 1e-12
        );
    }

    #[rstest]
    fn test_selection_stays_unique_and_within_cap(
        candidate_set: CandidateSet,
        target_distribution: TargetDistribution,
        grid: PeriodGrid,
        settings: OptimisationSettings,
    ) {
        let initial = initial(&candidate_set, &target_distribution, &grid, 3);
        let result = optimise_selection(&candidate_set, &target_distribution, &grid, initial, &settings);

        assert_eq!(result.selection.records.len(), 3);
        assert!(result.selection.records.iter().map(|r| r.candidate).all_unique());
        for record in &result.selection.records {
            assert!(record.scale_factor > 0.0 && record.scale_factor <= settings.maxsf);
        }
    }

    #[rstest]
    fn test_zero_loops_returns_initial_selection(
        candidate_set: CandidateSet,
        target_distribution: TargetDistribution,
        grid: PeriodGrid,
        mut settings: OptimisationSettings,
    ) {
        settings.n_loop = 0;
        let initial = initial(&candidate_set, &target_distribution, &grid, 2);
        let result = optimise_selection(
            &candidate_set,
            &target_distribution,
            &grid,
            initial.clone(),
            &settings,
        );
        assert_eq!(result.selection, initial);
        assert_eq!(result.objective_history.len(), 1);
    }

    #[rstest]
    fn test_no_swap_without_improvement(
        candidate_set: CandidateSet,
        target_distribution: TargetDistribution,
        grid: PeriodGrid,
        settings: OptimisationSettings,
    ) {
        // When every candidate is already selected there is nothing to swap in
        let n = candidate_set.len();
        let initial = initial(&candidate_set, &target_distribution, &grid, n);
        let result = optimise_selection(
            &candidate_set,
            &target_distribution,
            &grid,
            initial.clone(),
            &settings,
        );
        assert_eq!(result.selection, initial);
    }

    #[rstest]
    fn test_penalty(
        target_distribution: TargetDistribution,
        settings: OptimisationSettings,
    ) {
        let far = target_distribution
            .mean
            .iter()
            .zip(&target_distribution.stdev)
            .map(|(m, s)| m + 4.0 * s)
            .collect_vec();
        let n_outliers = target_distribution.stdev.iter().filter(|s| **s > 0.0).count();
        let selection = SelectedSet {
            records: vec![SelectedRecord {
                candidate: 0,
                scale_factor: 1.0,
                ln_spectrum: far,
            }],
        };

        let without = objective(&selection, &target_distribution, &settings);
        let with = objective(
            &selection,
            &target_distribution,
            &OptimisationSettings {
                penalty: 10.0,
                ..settings
            },
        );
        assert_approx_eq!(f64, with - without, 10.0 * n_outliers as f64, epsilon = 1e-9);
    }

    #[rstest]
    fn test_penalty_ignores_low_ordinates(
        target_distribution: TargetDistribution,
        settings: OptimisationSettings,
    ) {
        let low = target_distribution
            .mean
            .iter()
            .zip(&target_distribution.stdev)
            .map(|(m, s)| m - 4.0 * s)
            .collect_vec();
        let selection = SelectedSet {
            records: vec![SelectedRecord {
                candidate: 0,
                scale_factor: 1.0,
                ln_spectrum: low,
            }],
        };

        let without = objective(&selection, &target_distribution, &settings);
        let with = objective(
            &selection,
            &target_distribution,
            &OptimisationSettings {
                penalty: 10.0,
                ..settings
            },
        );
        assert_approx_eq!(f64, with, without, epsilon = 1e-12);
    }
}
