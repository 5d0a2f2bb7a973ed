//! Code for reading GMPE coefficient tables.
use super::{input_err_msg, is_sorted_and_unique, read_csv};
use crate::error::SelectionError;
use crate::gmpe::{GmpeCoefficientRow, TabulatedGmpe};
use anyhow::{Result, ensure};
use std::path::Path;

/// Read the coefficient table of a [`TabulatedGmpe`] from a CSV file.
///
/// # Arguments
///
/// * `file_path` - Path to a CSV file with a `period` column and one column per coefficient
pub fn read_gmpe_coefficients<C: GmpeCoefficientRow>(file_path: &Path) -> Result<TabulatedGmpe<C>> {
    let coefficients = read_csv::<C>(file_path)
        .and_then(|iter| check_gmpe_coefficients(iter.collect()))
        .map_err(|err| {
            SelectionError::InputData(format!("{}: {:#}", input_err_msg(file_path), err))
        })?;

    Ok(TabulatedGmpe::new(coefficients))
}

fn check_gmpe_coefficients<C: GmpeCoefficientRow>(coefficients: Vec<C>) -> Result<Vec<C>> {
    ensure!(
        coefficients.iter().all(|coeffs| coeffs.period() >= 0.0),
        "GMPE periods must not be negative"
    );
    ensure!(
        is_sorted_and_unique(coefficients.iter().map(GmpeCoefficientRow::period)),
        "GMPE periods must be unique and in increasing order"
    );
    ensure!(
        coefficients
            .iter()
            .all(|coeffs| coeffs.ln_stdev().is_finite() && coeffs.ln_stdev() > 0.0),
        "GMPE sigma must be greater than zero"
    );
    for coeffs in &coefficients {
        coeffs.check()?;
    }

    Ok(coefficients)
}
