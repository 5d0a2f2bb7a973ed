//! Models of the correlation between spectral accelerations at different periods.
use crate::input::correlation::read_correlation_table;
use crate::parameters::CorrelationModelName;
use anyhow::{Context, Result};
use nalgebra::DMatrix;
use std::f64::consts::{FRAC_PI_2, PI};
use std::path::Path;

/// Correlation of ln spectral acceleration residuals between two periods.
///
/// Implementations must return values in [-1, 1] and be symmetric in the two periods. A period
/// of zero refers to PGA.
pub trait CorrelationModel: Send + Sync {
    /// Correlation coefficient between periods `t1` and `t2` (s) for an event of magnitude `mag`
    fn rho(&self, t1: f64, t2: f64, mag: f64) -> f64;

    /// The full correlation matrix for the given periods
    fn matrix(&self, periods: &[f64], mag: f64) -> DMatrix<f64> {
        let n = periods.len();
        DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                1.0
            } else {
                self.rho(periods[i], periods[j], mag)
            }
        })
    }
}

/// Create the correlation model named in the job file
pub fn create_correlation_model(
    name: CorrelationModelName,
    table_file: Option<&Path>,
) -> Result<Box<dyn CorrelationModel>> {
    match name {
        CorrelationModelName::BakerJayaram => Ok(Box::new(BakerJayaram)),
        CorrelationModelName::Akkar => {
            let file_path = table_file.context("No correlation table given for akkar model")?;
            Ok(Box::new(read_correlation_table(file_path)?))
        }
    }
}

/// The predictive model of Baker & Jayaram (2008), valid for periods of 0.01-10 s.
#[derive(Debug, Clone, Copy, Default)]
pub struct BakerJayaram;

impl CorrelationModel for BakerJayaram {
    fn rho(&self, t1: f64, t2: f64, _mag: f64) -> f64 {
        let t_min = t1.min(t2);
        let t_max = t1.max(t2);

        let c1 = 1.0 - (FRAC_PI_2 - 0.366 * (t_max / t_min.max(0.109)).ln()).cos();
        let c2 = if t_max < 0.2 {
            1.0 - 0.105
                * (1.0 - 1.0 / (1.0 + (100.0 * t_max - 5.0).exp()))
                * (t_max - t_min)
                / (t_max - 0.0099)
        } else {
            0.0
        };
        let c3 = if t_max < 0.109 { c2 } else { c1 };
        let c4 = c1 + 0.5 * (c3.sqrt() - c3) * (1.0 + (PI * t_min / 0.109).cos());

        let rho = if t_max < 0.109 {
            c2
        } else if t_min > 0.109 {
            c1
        } else if t_max < 0.2 {
            c2.min(c4)
        } else {
            c4
        };

        rho.clamp(-1.0, 1.0)
    }
}

/// Correlation coefficients tabulated on a period grid, interpolated bilinearly in ln(T).
///
/// Periods outside the table are clamped to its edges. If the first tabulated period is zero, it
/// is used only for PGA.
#[derive(Debug, Clone, PartialEq)]
pub struct TabulatedCorrelation {
    periods: Vec<f64>,
    coefficients: DMatrix<f64>,
}

impl TabulatedCorrelation {
    /// Create a new [`TabulatedCorrelation`].
    ///
    /// The caller is responsible for checking that the table is valid (see
    /// [`read_correlation_table`]).
    pub fn new(periods: Vec<f64>, coefficients: DMatrix<f64>) -> Self {
        Self {
            periods,
            coefficients,
        }
    }

    /// Find the table indices either side of `period` and the weight of the upper one
    fn bracket(&self, period: f64) -> (usize, usize, f64) {
        let has_pga = self.periods[0] == 0.0;
        if period <= 0.0 && has_pga {
            return (0, 0, 0.0);
        }

        let first = usize::from(has_pga);
        let last = self.periods.len() - 1;
        if first > last || period <= self.periods[first] {
            let edge = first.min(last);
            return (edge, edge, 0.0);
        }
        if period >= self.periods[last] {
            return (last, last, 0.0);
        }

        let upper = first + self.periods[first..].partition_point(|t| *t < period);
        let lower = upper - 1;
        let (ln_lo, ln_hi) = (self.periods[lower].ln(), self.periods[upper].ln());
        (lower, upper, (period.ln() - ln_lo) / (ln_hi - ln_lo))
    }
}

impl CorrelationModel for TabulatedCorrelation {
    fn rho(&self, t1: f64, t2: f64, _mag: f64) -> f64 {
        let (i0, i1, wi) = self.bracket(t1);
        let (j0, j1, wj) = self.bracket(t2);
        let c = &self.coefficients;

        let rho = (1.0 - wi) * (1.0 - wj) * c[(i0, j0)]
            + (1.0 - wi) * wj * c[(i0, j1)]
            + wi * (1.0 - wj) * c[(i1, j0)]
            + wi * wj * c[(i1, j1)];
        rho.clamp(-1.0, 1.0)
    }
}
