//! Code for reading tabulated correlation coefficients.
use super::input_err_msg;
use crate::correlation::TabulatedCorrelation;
use crate::error::SelectionError;
use crate::input::is_sorted_and_unique;
use anyhow::{Context, Result, ensure};
use nalgebra::DMatrix;
use std::path::Path;

/// Tolerance used when checking the table is symmetric with a unit diagonal
const TABLE_TOLERANCE: f64 = 1e-6;

/// Read a correlation table from a CSV file.
///
/// The header is `period` followed by one column per period; each row starts with the row's
/// period. Rows must be in the same order as the columns. A period of zero denotes PGA.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_correlation_table(file_path: &Path) -> Result<TabulatedCorrelation> {
    read_correlation_table_inner(file_path).map_err(|err| {
        SelectionError::InputData(format!("{}: {:#}", input_err_msg(file_path), err)).into()
    })
}

fn read_correlation_table_inner(file_path: &Path) -> Result<TabulatedCorrelation> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)?;

    let periods = reader
        .headers()?
        .iter()
        .skip(1)
        .map(|header| {
            header
                .parse::<f64>()
                .with_context(|| format!("Invalid period in header: {header}"))
        })
        .collect::<Result<Vec<_>>>()?;
    let n = periods.len();
    ensure!(n > 0, "Correlation table has no periods");
    ensure!(
        periods[0] >= 0.0 && is_sorted_and_unique(&periods),
        "Periods must be non-negative, unique and in order"
    );

    let mut values = Vec::with_capacity(n * n);
    let mut row_count = 0;
    for record in reader.records() {
        let record = record?;
        ensure!(
            record.len() == n + 1,
            "Row {} has {} columns, expected {}",
            row_count + 1,
            record.len(),
            n + 1
        );
        let row_period: f64 = record[0].parse().context("Invalid row period")?;
        ensure!(
            row_count < n && (row_period - periods[row_count]).abs() < TABLE_TOLERANCE,
            "Row periods must match column periods"
        );
        for value in record.iter().skip(1) {
            values.push(
                value
                    .parse::<f64>()
                    .with_context(|| format!("Invalid correlation coefficient: {value}"))?,
            );
        }
        row_count += 1;
    }
    ensure!(row_count == n, "Correlation table must be square");

    let coefficients = DMatrix::from_row_slice(n, n, &values);
    check_correlation_matrix(&coefficients)?;

    Ok(TabulatedCorrelation::new(periods, coefficients))
}

/// Check that a matrix contains valid correlation coefficients
fn check_correlation_matrix(matrix: &DMatrix<f64>) -> Result<()> {
    for i in 0..matrix.nrows() {
        ensure!(
            (matrix[(i, i)] - 1.0).abs() < TABLE_TOLERANCE,
            "Diagonal coefficients must be 1"
        );
        for j in 0..matrix.ncols() {
            let value = matrix[(i, j)];
            ensure!(
                (-1.0..=1.0).contains(&value),
                "Correlation coefficients must be in [-1, 1]"
            );
            ensure!(
                (value - matrix[(j, i)]).abs() < TABLE_TOLERANCE,
                "Correlation table must be symmetric"
            );
        }
    }

    Ok(())
}
