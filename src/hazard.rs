//! Results of probabilistic seismic hazard analysis consumed by the selection.
use crate::intensity_measure::IntensityMeasure;
use anyhow::Result;

/// A magnitude-distance bin of a disaggregation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisaggregationBin {
    /// Magnitude at the bin centre
    pub mag: f64,
    /// Distance (km) at the bin centre
    pub dist: f64,
    /// Probability of exceedance contributed by the bin
    pub poe: f64,
}

/// A hazard curve, with intensity levels in increasing order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HazardCurve {
    /// Intensity measure levels (g)
    pub imls: Vec<f64>,
    /// Probability of exceeding each level within the investigation time
    pub poes: Vec<f64>,
}

/// The keys identifying a set of hazard results
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardKey {
    /// Logic-tree realisation
    pub rlz: u32,
    /// Site ID
    pub site: u32,
    /// The intensity measure
    pub im: IntensityMeasure,
}

/// A source of disaggregation and classical PSHA results.
///
/// Implementations are shared read-only between cases.
pub trait HazardResults: Send + Sync {
    /// Magnitude-distance disaggregation for the given key and probability-of-exceedance ID
    fn disaggregation(&self, key: &HazardKey, poe_id: u32) -> Result<Vec<DisaggregationBin>>;

    /// The hazard curve for the given key
    fn hazard_curve(&self, key: &HazardKey) -> Result<HazardCurve>;
}
