//! Simulation of spectra from the target distribution.
use super::target::TargetDistribution;
use crate::parameters::MomentWeights;
use crate::stats::{SampleMoments, sum_squared_diff};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::Rng;
use rand_distr::StandardNormal;

/// Standard deviations below this are treated as zero, i.e. the period is fixed by the conditioning
const MIN_STDEV: f64 = 1e-8;

/// Relative weight of the skewness error, on top of the user's weight
const SKEWNESS_FACTOR: f64 = 0.1;

/// The set of simulated log spectra whose statistics best match the target
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedSpectra {
    /// The simulated ln SA spectra, each over the target's periods
    pub spectra: Vec<Vec<f64>>,
    /// Weighted error of the set's statistics
    pub error: f64,
}

/// A matrix `L` with `L L^T` equal to the covariance.
///
/// The conditional covariance is singular, so this uses the eigendecomposition (with negative
/// eigenvalues from rounding set to zero) rather than a Cholesky factorisation.
fn covariance_factor(covariance: &DMatrix<f64>) -> DMatrix<f64> {
    let eigen = SymmetricEigen::new(covariance.clone());
    let scale = DMatrix::from_diagonal(&eigen.eigenvalues.map(|lambda| lambda.max(0.0).sqrt()));
    eigen.eigenvectors * scale
}

/// Weighted error of the statistics of a set of log spectra relative to the target.
///
/// The target skewness is zero.
pub fn moments_error(
    spectra: &[Vec<f64>],
    target: &TargetDistribution,
    weights: &MomentWeights,
) -> f64 {
    let moments = SampleMoments::from_spectra(spectra.iter().map(Vec::as_slice));
    let skewness_error: f64 = moments.skewness.iter().map(|skew| skew.powi(2)).sum();

    weights.mean * sum_squared_diff(&moments.mean, &target.mean)
        + weights.stdev * sum_squared_diff(&moments.stdev, &target.stdev)
        + SKEWNESS_FACTOR * weights.skewness * skewness_error
}

/// Draw a single log spectrum from the target distribution
fn draw_spectrum<R: Rng>(target: &TargetDistribution, factor: &DMatrix<f64>, rng: &mut R) -> Vec<f64> {
    let n = target.periods.len();
    let z = DVector::from_fn(n, |_, _| rng.sample::<f64, _>(StandardNormal));
    let deviation = factor * z;

    target
        .mean
        .iter()
        .zip(&target.stdev)
        .zip(deviation.iter())
        .map(|((mean, stdev), dev)| if *stdev < MIN_STDEV { *mean } else { mean + dev })
        .collect()
}

/// Simulate `n_trials` sets of `n_gm` spectra from the target distribution and return the set
/// whose mean, standard deviation and skewness best match the target.
///
/// Ties are resolved in favour of the earliest trial.
pub fn simulate_spectra<R: Rng>(
    target: &TargetDistribution,
    n_gm: usize,
    n_trials: usize,
    weights: &MomentWeights,
    rng: &mut R,
) -> SimulatedSpectra {
    let factor = covariance_factor(&target.covariance);

    let mut best: Option<SimulatedSpectra> = None;
    for _ in 0..n_trials {
        let spectra = (0..n_gm)
            .map(|_| draw_spectrum(target, &factor, rng))
            .collect::<Vec<_>>();
        let error = moments_error(&spectra, target, weights);
        if best.as_ref().is_none_or(|best| error < best.error) {
            best = Some(SimulatedSpectra { spectra, error });
        }
    }

    best.unwrap_or(SimulatedSpectra {
        spectra: Vec::new(),
        error: f64::INFINITY,
    })
}
