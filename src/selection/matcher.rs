//! Matching of database recordings to simulated spectra.
use super::PeriodGrid;
use super::screen::{Candidate, CandidateSet};
use crate::error::SelectionError;
use crate::stats::sum_squared_diff;
use anyhow::{Result, bail};

/// A recording in the selected set
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedRecord {
    /// Index of the recording in the [`CandidateSet`]
    pub candidate: usize,
    /// Factor by which the recording is scaled
    pub scale_factor: f64,
    /// Natural log of the scaled spectrum
    pub ln_spectrum: Vec<f64>,
}

impl SelectedRecord {
    /// Select a candidate, scaling it by `scale_factor`
    pub fn new(candidate_idx: usize, candidate: &Candidate, scale_factor: f64) -> Self {
        let ln_sf = scale_factor.ln();
        Self {
            candidate: candidate_idx,
            scale_factor,
            ln_spectrum: candidate.ln_spectrum.iter().map(|sa| sa + ln_sf).collect(),
        }
    }
}

/// The selected recordings, one per slot.
///
/// Each candidate appears at most once.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedSet {
    /// The selected recordings
    pub records: Vec<SelectedRecord>,
}

impl SelectedSet {
    /// Whether the candidate is already part of the set
    pub fn contains(&self, candidate: usize) -> bool {
        self.records.iter().any(|record| record.candidate == candidate)
    }

    /// The scaled log spectra of the selected records
    pub fn ln_spectra(&self) -> impl Iterator<Item = &[f64]> + Clone {
        self.records.iter().map(|record| record.ln_spectrum.as_slice())
    }
}

/// The factor which scales the candidate's IM to `exp(ln_im)`, or `None` if it exceeds `maxsf`
pub fn scale_factor(candidate: &Candidate, ln_im: f64, maxsf: f64) -> Option<f64> {
    let scale_factor = (ln_im - candidate.ln_im).exp();
    (scale_factor.is_finite() && scale_factor > 0.0 && scale_factor <= maxsf)
        .then_some(scale_factor)
}

/// Assign a different candidate to each simulated spectrum.
///
/// Each candidate is scaled so that its IM equals that of the simulated spectrum. The candidate
/// with the smallest sum of squared differences of the log spectra is chosen, from among those
/// not yet selected and with a scale factor of at most `maxsf`. Ties go to the first candidate.
///
/// # Returns
///
/// The selected set, or an insufficient data error if no candidate is eligible for some
/// simulated spectrum
pub fn match_records(
    candidates: &CandidateSet,
    simulated: &[Vec<f64>],
    grid: &PeriodGrid,
    maxsf: f64,
) -> Result<SelectedSet> {
    let mut selection = SelectedSet {
        records: Vec::with_capacity(simulated.len()),
    };

    for (slot, spectrum) in simulated.iter().enumerate() {
        let ln_im = grid.ln_im(spectrum);
        let best = candidates
            .candidates
            .iter()
            .enumerate()
            .filter(|(idx, _)| !selection.contains(*idx))
            .filter_map(|(idx, candidate)| {
                let sf = scale_factor(candidate, ln_im, maxsf)?;
                let record = SelectedRecord::new(idx, candidate, sf);
                let error = sum_squared_diff(&record.ln_spectrum, spectrum);
                Some((error, record))
            })
            .min_by(|(a, _), (b, _)| a.total_cmp(b));

        let Some((_, record)) = best else {
            bail!(SelectionError::InsufficientData(format!(
                "No eligible recording for simulated spectrum {} (maximum scale factor {maxsf})",
                slot + 1
            )));
        };
        selection.records.push(record);
    }

    Ok(selection)
}
