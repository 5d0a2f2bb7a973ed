//! Computation of the target (conditional) spectrum.
use super::PeriodGrid;
use crate::correlation::CorrelationModel;
use crate::gmpe::{GmmContext, GroundMotionModel};
use crate::error::SelectionError;
use anyhow::{Result, bail};
use itertools::Itertools;
use nalgebra::DMatrix;

/// Distribution of the log spectrum conditioned on the IM value
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDistribution {
    /// The periods (s) of the distribution
    pub periods: Vec<f64>,
    /// Conditional mean of ln SA at each period
    pub mean: Vec<f64>,
    /// Conditional covariance of ln SA between periods
    pub covariance: DMatrix<f64>,
    /// Conditional standard deviation of ln SA at each period
    pub stdev: Vec<f64>,
}

/// Compute the conditional spectrum for an IM value of `im_star` (g).
///
/// The unconditional ln SA distribution at each period comes from the GMPE and the correlations
/// from the correlation model. The IM is the geometric mean of SA over the grid's IM periods (a
/// single period for PGA and SA), so the conditioning is done on the mean of ln SA over those.
pub fn compute_target_distribution(
    gmpe: &dyn GroundMotionModel,
    correlation: &dyn CorrelationModel,
    ctx: &GmmContext,
    grid: &PeriodGrid,
    im_star: f64,
) -> Result<TargetDistribution> {
    if !(im_star.is_finite() && im_star > 0.0) {
        bail!(SelectionError::InputData(format!(
            "Conditioning value must be positive, got {im_star}"
        )));
    }

    let (mu, sigma): (Vec<f64>, Vec<f64>) = grid
        .periods
        .iter()
        .map(|period| gmpe.ln_mean_and_stdev(ctx, *period))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .unzip();
    let rho = correlation.matrix(&grid.periods, ctx.rupture.mag);

    // Distribution of the log IM and its correlation with each period
    let k = &grid.im_indices;
    let n_im = k.len() as f64;
    let mu_im = k.iter().map(|i| mu[*i]).sum::<f64>() / n_im;
    let var_im = k
        .iter()
        .cartesian_product(k)
        .map(|(i, j)| rho[(*i, *j)] * sigma[*i] * sigma[*j])
        .sum::<f64>()
        / n_im.powi(2);
    if var_im.is_nan() || var_im <= 0.0 {
        bail!(SelectionError::InputData(format!(
            "Variance of the intensity measure predicted by {} must be positive",
            gmpe.name()
        )));
    }
    let sigma_im = var_im.sqrt();
    let rho_im = (0..grid.periods.len())
        .map(|i| k.iter().map(|j| rho[(i, *j)] * sigma[*j]).sum::<f64>() / (n_im * sigma_im))
        .collect_vec();

    let epsilon = (im_star.ln() - mu_im) / sigma_im;
    let mean = mu
        .iter()
        .zip(&sigma)
        .zip(&rho_im)
        .map(|((mu, sigma), rho)| mu + rho * sigma * epsilon)
        .collect_vec();

    let n = grid.periods.len();
    let mut covariance = DMatrix::from_fn(n, n, |i, j| {
        sigma[i] * sigma[j] * (rho[(i, j)] - rho_im[i] * rho_im[j])
    });
    // Remove rounding errors, which would otherwise break symmetry and positive semi-definiteness
    covariance = (&covariance + covariance.transpose()) * 0.5;
    for i in 0..n {
        covariance[(i, i)] = covariance[(i, i)].max(0.0);
    }
    let stdev = covariance.diagonal().iter().map(|var| var.sqrt()).collect();

    Ok(TargetDistribution {
        periods: grid.periods.clone(),
        mean,
        covariance,
        stdev,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::BakerJayaram;
    use crate::error::selection_error;
    use crate::fixture::{gmm_context, gmpe};
    use crate::gmpe::CoefficientTableGmpe;
    use crate::intensity_measure::IntensityMeasure;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn target(
        gmpe: &CoefficientTableGmpe,
        ctx: &GmmContext,
        im: IntensityMeasure,
        im_star: f64,
    ) -> TargetDistribution {
        let grid = PeriodGrid::new(im, &[0.1, 0.2, 0.5, 1.0, 2.0], &[0.2, 0.5, 1.0]).unwrap();
        compute_target_distribution(gmpe, &BakerJayaram, ctx, &grid, im_star).unwrap()
    }

    #[rstest]
    #[case(IntensityMeasure::Sa(0.5))]
    #[case(IntensityMeasure::Pga)]
    #[case(IntensityMeasure::AvgSa)]
    fn test_covariance_symmetric_with_variance_diagonal(
        gmpe: CoefficientTableGmpe,
        gmm_context: GmmContext,
        #[case] im: IntensityMeasure,
    ) {
        let target = target(&gmpe, &gmm_context, im, 0.3);
        let n = target.periods.len();
        assert_eq!(target.covariance.shape(), (n, n));
        assert_eq!(target.mean.len(), n);
        for i in 0..n {
            assert_approx_eq!(
                f64,
                target.covariance[(i, i)],
                target.stdev[i].powi(2),
                epsilon = 1e-12
            );
            for j in 0..n {
                assert_eq!(target.covariance[(i, j)], target.covariance[(j, i)]);
            }
        }
    }

    #[rstest]
    fn test_conditioning_period_is_fixed(gmpe: CoefficientTableGmpe, gmm_context: GmmContext) {
        let target = target(&gmpe, &gmm_context, IntensityMeasure::Sa(0.5), 0.3);
        let idx = target.periods.iter().position(|t| *t == 0.5).unwrap();
        assert_approx_eq!(f64, target.mean[idx], 0.3f64.ln(), epsilon = 1e-12);
        assert_approx_eq!(f64, target.stdev[idx], 0.0, epsilon = 1e-6);

        // Elsewhere the conditional stdev is reduced, not removed
        let (_, sigma) = gmpe.ln_mean_and_stdev(&gmm_context, 2.0).unwrap();
        let last = target.periods.len() - 1;
        assert!(target.stdev[last] > 0.0 && target.stdev[last] < sigma);
    }

    #[rstest]
    fn test_avg_sa_mean_matches_conditioning_value(
        gmpe: CoefficientTableGmpe,
        gmm_context: GmmContext,
    ) {
        let target = target(&gmpe, &gmm_context, IntensityMeasure::AvgSa, 0.2);
        let grid = PeriodGrid::new(IntensityMeasure::AvgSa, &target.periods, &[0.2, 0.5, 1.0])
            .unwrap();
        assert_approx_eq!(f64, grid.ln_im(&target.mean), 0.2f64.ln(), epsilon = 1e-12);
    }

    #[rstest]
    fn test_higher_conditioning_value_raises_mean(
        gmpe: CoefficientTableGmpe,
        gmm_context: GmmContext,
    ) {
        let low = target(&gmpe, &gmm_context, IntensityMeasure::Sa(0.5), 0.1);
        let high = target(&gmpe, &gmm_context, IntensityMeasure::Sa(0.5), 1.0);
        assert!(low.mean.iter().zip(&high.mean).all(|(lo, hi)| lo < hi));
        assert_eq!(low.stdev, high.stdev);
    }

    #[rstest]
    fn test_invalid_conditioning_value(gmpe: CoefficientTableGmpe, gmm_context: GmmContext) {
        let grid = PeriodGrid::new(IntensityMeasure::Sa(0.5), &[0.1, 1.0], &[]).unwrap();
        let err =
            compute_target_distribution(&gmpe, &BakerJayaram, &gmm_context, &grid, 0.0).unwrap_err();
        assert!(matches!(
            selection_error(&err),
            Some(SelectionError::InputData(_))
        ));
    }

    /// A GMPE predicting no variability
    struct ZeroSigmaGmpe;

    impl GroundMotionModel for ZeroSigmaGmpe {
        fn name(&self) -> &str {
            "zero_sigma"
        }

        fn ln_mean_and_stdev(&self, _ctx: &GmmContext, _period: f64) -> Result<(f64, f64)> {
            Ok((-1.0, 0.0))
        }
    }

    #[rstest]
    fn test_zero_sigma_gmpe(gmm_context: GmmContext) {
        let grid = PeriodGrid::new(IntensityMeasure::Sa(0.5), &[0.1, 1.0], &[]).unwrap();
        let err = compute_target_distribution(&ZeroSigmaGmpe, &BakerJayaram, &gmm_context, &grid, 0.3)
            .unwrap_err();
        assert!(matches!(
            selection_error(&err),
            Some(SelectionError::InputData(_))
        ));
    }
}
