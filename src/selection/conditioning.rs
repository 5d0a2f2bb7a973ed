//! Derivation of the conditioning value and the controlling earthquake from hazard results.
use crate::error::SelectionError;
use crate::hazard::{DisaggregationBin, HazardCurve, HazardKey, HazardResults};
use crate::parameters::HazardLevel;
use crate::stats::interpolate_log_log;
use anyhow::{Result, bail};
use itertools::Itertools;

/// The conditioning intensity value and the earthquake which controls it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditioningValue {
    /// Value of the intensity measure (g) at the requested probability of exceedance
    pub im_star: f64,
    /// Mean magnitude from the disaggregation
    pub magnitude: f64,
    /// Mean Joyner-Boore distance (km) from the disaggregation
    pub rjb: f64,
}

/// Compute the conditioning value for a case.
///
/// The magnitude and distance are means over the disaggregation bins, weighted by the annual rate
/// of exceedance each bin contributes. The conditioning value is read from the hazard curve at the
/// hazard level's probability of exceedance, interpolating log-log.
pub fn compute_conditioning_value(
    hazard: &dyn HazardResults,
    key: &HazardKey,
    level: &HazardLevel,
    investigation_time: f64,
) -> Result<ConditioningValue> {
    let bins = hazard.disaggregation(key, level.poe_id)?;
    let (magnitude, rjb) = mean_magnitude_and_distance(&bins, investigation_time)?;

    let curve = hazard.hazard_curve(key)?;
    let im_star = iml_at_poe(&curve, level.probability_of_exceedance)?;

    Ok(ConditioningValue {
        im_star,
        magnitude,
        rjb,
    })
}

/// Convert a probability of exceedance within `investigation_time` to an annual rate, assuming a
/// Poisson process
pub fn poe_to_rate(poe: f64, investigation_time: f64) -> f64 {
    -(1.0 - poe).ln() / investigation_time
}

/// Rate-weighted mean magnitude and distance of the disaggregation bins
fn mean_magnitude_and_distance(
    bins: &[DisaggregationBin],
    investigation_time: f64,
) -> Result<(f64, f64)> {
    let rates = bins
        .iter()
        .map(|bin| {
            if bin.poe.is_finite() && bin.poe > 0.0 && bin.poe < 1.0 {
                poe_to_rate(bin.poe, investigation_time)
            } else {
                0.0
            }
        })
        .collect_vec();
    let total: f64 = rates.iter().sum();
    if total <= 0.0 {
        bail!(SelectionError::InputData(
            "Disaggregation results contain no contributing bins".into()
        ));
    }

    let magnitude = bins.iter().zip(&rates).map(|(bin, rate)| bin.mag * rate).sum::<f64>() / total;
    let distance = bins.iter().zip(&rates).map(|(bin, rate)| bin.dist * rate).sum::<f64>() / total;

    Ok((magnitude, distance))
}

/// The intensity measure level with the given probability of exceedance.
///
/// Flat parts of the curve (e.g. a probability of 1 at the lowest levels) are reduced to the
/// single point next to the rest of the curve before interpolating.
fn iml_at_poe(curve: &HazardCurve, poe: f64) -> Result<f64> {
    // Probabilities decrease with intensity, so reverse the curve to interpolate over them
    let points = curve
        .poes
        .iter()
        .zip(&curve.imls)
        .filter(|(p, iml)| **p > 0.0 && **iml > 0.0)
        .rev()
        .map(|(p, iml)| (*p, *iml))
        .collect_vec();
    let runs = points.iter().chunk_by(|(p, _)| *p);
    let mut reduced = Vec::with_capacity(points.len());
    for (idx, (_, run)) in runs.into_iter().enumerate() {
        let run = run.collect_vec();
        let point = if idx == 0 { run.last() } else { run.first() };
        reduced.extend(point.copied().copied());
    }
    let (poes, imls): (Vec<f64>, Vec<f64>) = reduced.into_iter().unzip();

    if !poes.iter().tuple_windows().all(|(a, b)| a < b) {
        bail!(SelectionError::InputData(
            "Hazard curve probabilities must decrease with intensity".into()
        ));
    }

    let Some(iml) = interpolate_log_log(&poes, &imls, poe) else {
        bail!(SelectionError::InputData(format!(
            "Probability of exceedance {poe} is outside the range of the hazard curve"
        )));
    };

    Ok(iml)
}
