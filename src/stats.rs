//! Sample statistics and interpolation helpers shared by the selection stages.
use anyhow::{Context, Result};
use itertools::Itertools;

/// Per-period sample moments of a set of (log) spectra.
///
/// Standard deviation and skewness are population statistics, i.e. no bias correction is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMoments {
    /// Mean of each period's ordinates
    pub mean: Vec<f64>,
    /// Standard deviation of each period's ordinates
    pub stdev: Vec<f64>,
    /// Skewness of each period's ordinates (zero where the ordinates do not vary)
    pub skewness: Vec<f64>,
}

impl SampleMoments {
    /// Calculate moments for the given spectra, all of which must have the same length.
    pub fn from_spectra<'a, I>(spectra: I) -> Self
    where
        I: IntoIterator<Item = &'a [f64]>,
        I::IntoIter: Clone,
    {
        let spectra = spectra.into_iter();
        let (mean, stdev) = mean_and_stdev(spectra.clone());
        let n = spectra.clone().count() as f64;
        let mut m3 = vec![0.0; mean.len()];
        for spectrum in spectra {
            for (acc, (value, mu)) in m3.iter_mut().zip(spectrum.iter().zip(&mean)) {
                *acc += (value - mu).powi(3);
            }
        }
        let skewness = m3
            .iter()
            .zip(&stdev)
            .map(|(m3, sd)| {
                if *sd > 0.0 {
                    (m3 / n) / sd.powi(3)
                } else {
                    0.0
                }
            })
            .collect();

        Self {
            mean,
            stdev,
            skewness,
        }
    }
}

/// Calculate the per-period mean and population standard deviation of a set of spectra
pub fn mean_and_stdev<'a, I>(spectra: I) -> (Vec<f64>, Vec<f64>)
where
    I: IntoIterator<Item = &'a [f64]>,
    I::IntoIter: Clone,
{
    let spectra = spectra.into_iter();
    let mut count = 0usize;
    let mut sum: Vec<f64> = Vec::new();
    for spectrum in spectra.clone() {
        if sum.is_empty() {
            sum = vec![0.0; spectrum.len()];
        }
        for (acc, value) in sum.iter_mut().zip(spectrum) {
            *acc += value;
        }
        count += 1;
    }
    if count == 0 {
        return (Vec::new(), Vec::new());
    }

    let n = count as f64;
    let mean = sum.into_iter().map(|s| s / n).collect_vec();
    let mut m2 = vec![0.0; mean.len()];
    for spectrum in spectra {
        for (acc, (value, mu)) in m2.iter_mut().zip(spectrum.iter().zip(&mean)) {
            *acc += (value - mu).powi(2);
        }
    }
    let stdev = m2.into_iter().map(|m2| (m2 / n).sqrt()).collect();

    (mean, stdev)
}

/// Sum of squared element-wise differences between two equal-length vectors
pub fn sum_squared_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Linear interpolation of `y(x)` at `x0`, where `xs` is strictly increasing.
///
/// Returns `None` if `x0` lies outside `[xs[0], xs[n - 1]]`.
pub fn interpolate(xs: &[f64], ys: &[f64], x0: f64) -> Option<f64> {
    debug_assert_eq!(xs.len(), ys.len());
    let first = *xs.first()?;
    let last = *xs.last()?;
    if !(first..=last).contains(&x0) {
        return None;
    }

    // Exact hits avoid a needless division (and handle single-point tables)
    if let Some(i) = xs.iter().position(|x| *x == x0) {
        return Some(ys[i]);
    }

    let upper = xs.partition_point(|x| *x < x0);
    let (x1, x2) = (xs[upper - 1], xs[upper]);
    let (y1, y2) = (ys[upper - 1], ys[upper]);
    Some(y1 + (y2 - y1) * (x0 - x1) / (x2 - x1))
}

/// Log-log interpolation of a positive function `y(x)` at positive `x0`.
///
/// `xs` must be strictly increasing and all values positive.
pub fn interpolate_log_log(xs: &[f64], ys: &[f64], x0: f64) -> Option<f64> {
    let ln_xs = xs.iter().map(|x| x.ln()).collect_vec();
    let ln_ys = ys.iter().map(|y| y.ln()).collect_vec();
    interpolate(&ln_xs, &ln_ys, x0.ln()).map(f64::exp)
}

/// Return the sorted union of the given period lists, merging values that agree to within 1e-9 s.
pub fn merge_periods<'a, I>(lists: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let mut periods = lists.into_iter().flatten().copied().collect_vec();
    periods.sort_by(f64::total_cmp);
    periods.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    periods
}

/// Find the index of `period` in `periods`, tolerating rounding error
pub fn find_period(periods: &[f64], period: f64) -> Result<usize> {
    periods
        .iter()
        .position(|p| (p - period).abs() < 1e-9)
        .with_context(|| format!("Period {period} s is not on the period grid"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[test]
    fn test_mean_and_stdev() {
        let spectra = [vec![1.0, 2.0], vec![3.0, 2.0]];
        let (mean, stdev) = mean_and_stdev(spectra.iter().map(Vec::as_slice));
        assert_eq!(mean, [2.0, 2.0]);
        assert_eq!(stdev, [1.0, 0.0]);
    }

    #[test]
    fn test_mean_and_stdev_empty() {
        let spectra: [Vec<f64>; 0] = [];
        let (mean, stdev) = mean_and_stdev(spectra.iter().map(Vec::as_slice));
        assert!(mean.is_empty());
        assert!(stdev.is_empty());
    }

    #[test]
    fn test_sample_moments_skewness() {
        // Symmetric sample has zero skewness; one with a long right tail has positive skewness
        let symmetric = [vec![-1.0], vec![0.0], vec![1.0]];
        let moments = SampleMoments::from_spectra(symmetric.iter().map(Vec::as_slice));
        assert_approx_eq!(f64, moments.skewness[0], 0.0);

        let skewed = [vec![0.0], vec![0.0], vec![0.0], vec![4.0]];
        let moments = SampleMoments::from_spectra(skewed.iter().map(Vec::as_slice));
        // m2 = 3, m3 = 6, skewness = 6 / 3^1.5
        assert_approx_eq!(f64, moments.skewness[0], 6.0 / 3f64.powf(1.5), epsilon = 1e-12);
    }

    #[test]
    fn test_sample_moments_constant() {
        let constant = [vec![2.0], vec![2.0]];
        let moments = SampleMoments::from_spectra(constant.iter().map(Vec::as_slice));
        assert_eq!(moments.stdev, [0.0]);
        assert_eq!(moments.skewness, [0.0]);
    }

    #[rstest]
    #[case(1.0, Some(10.0))]
    #[case(1.5, Some(15.0))]
    #[case(3.0, Some(40.0))]
    #[case(0.5, None)]
    #[case(3.5, None)]
    fn test_interpolate(#[case] x0: f64, #[case] expected: Option<f64>) {
        let xs = [1.0, 2.0, 3.0];
        let ys = [10.0, 20.0, 40.0];
        assert_eq!(interpolate(&xs, &ys, x0), expected);
    }

    #[test]
    fn test_interpolate_log_log() {
        // A power law is linear in log-log space
        let xs = [0.1, 1.0];
        let ys = [0.01, 1.0];
        assert_approx_eq!(
            f64,
            interpolate_log_log(&xs, &ys, 0.5).unwrap(),
            0.25,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_merge_periods() {
        let a = [0.1, 0.5, 1.0];
        let b = [0.5, 0.2];
        assert_eq!(merge_periods([&a[..], &b[..]]), [0.1, 0.2, 0.5, 1.0]);
    }

    #[test]
    fn test_find_period() {
        let periods = [0.1, 0.2, 0.5];
        assert_eq!(find_period(&periods, 0.2).unwrap(), 1);
        assert!(find_period(&periods, 0.3).is_err());
    }
}
