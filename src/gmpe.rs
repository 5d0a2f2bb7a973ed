//! Ground-motion prediction equations (GMPEs).
//!
//! A GMPE gives the distribution of ln spectral acceleration for a rupture, site and set of
//! distances. Models are looked up by name, so that new ones can be added without touching the
//! selection stages.
use crate::error::SelectionError;
use crate::input::gmpe::read_gmpe_coefficients;
use crate::parameters::GmpeParameters;
use anyhow::{Result, bail, ensure};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::f64::consts::LN_10;

/// The name under which [`CoefficientTableGmpe`] is registered
pub const COEFFICIENT_TABLE_GMPE: &str = "coefficient_table";

/// The name under which [`AkkarBommer2010`] is registered
pub const AKKAR_BOMMER_2010_GMPE: &str = "AkkarBommer2010";

/// The names of all available GMPEs
pub const KNOWN_GMPES: [&str; 2] = [COEFFICIENT_TABLE_GMPE, AKKAR_BOMMER_2010_GMPE];

/// Standard acceleration of gravity (m/s^2)
const GRAVITY: f64 = 9.80665;

/// Rupture parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuptureContext {
    /// Moment magnitude
    pub mag: f64,
    /// Rake (degrees)
    pub rake: f64,
    /// Hypocentral depth (km)
    pub hypo_depth: f64,
    /// Dip (degrees)
    pub dip: f64,
    /// Depth to top of rupture (km)
    pub ztor: f64,
    /// Down-dip rupture width (km)
    pub width: f64,
}

/// Site parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteContext {
    /// Vs30 (m/s)
    pub vs30: f64,
    /// Whether Vs30 was measured (rather than inferred)
    pub vs30_measured: bool,
    /// Depth (m) to Vs = 1.0 km/s
    pub z1pt0: f64,
    /// Depth (km) to Vs = 2.5 km/s
    pub z2pt5: f64,
}

/// Source-to-site distances (km)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceContext {
    /// Joyner-Boore distance
    pub rjb: f64,
    /// Closest distance to the rupture plane
    pub rrup: f64,
    /// Horizontal distance from the top edge of the rupture, measured perpendicular to strike
    pub rx: f64,
}

/// Everything a GMPE needs to make a prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GmmContext {
    /// Rupture parameters
    pub rupture: RuptureContext,
    /// Site parameters
    pub site: SiteContext,
    /// Distances
    pub distances: DistanceContext,
}

/// The style of faulting implied by a rake angle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultingStyle {
    /// Strike-slip
    StrikeSlip,
    /// Normal
    Normal,
    /// Reverse or thrust
    Reverse,
}

impl FaultingStyle {
    /// Classify a rake angle (degrees)
    pub fn from_rake(rake: f64) -> Self {
        if rake > -150.0 && rake < -30.0 {
            Self::Normal
        } else if rake > 30.0 && rake < 150.0 {
            Self::Reverse
        } else {
            Self::StrikeSlip
        }
    }
}

/// A model predicting the distribution of spectral acceleration
pub trait GroundMotionModel: Send + Sync {
    /// The name of the model
    fn name(&self) -> &str;

    /// Mean and standard deviation of ln SA (g) at `period` (s). A period of zero refers to PGA.
    fn ln_mean_and_stdev(&self, ctx: &GmmContext, period: f64) -> Result<(f64, f64)>;
}

fn unknown_gmpe(name: &str) -> SelectionError {
    SelectionError::Configuration(format!(
        "Unknown GMPE {name}. Known GMPEs are: {}",
        KNOWN_GMPES.iter().join(", ")
    ))
}

/// Check that `name` refers to a known GMPE
pub fn check_gmpe_name(name: &str) -> Result<()> {
    if !KNOWN_GMPES.contains(&name) {
        bail!(unknown_gmpe(name));
    }

    Ok(())
}

/// Create the GMPE described in the job file
pub fn create_gmpe(params: &GmpeParameters) -> Result<Box<dyn GroundMotionModel>> {
    match params.name.as_str() {
        COEFFICIENT_TABLE_GMPE => Ok(Box::new(read_gmpe_coefficients::<GmpeCoefficients>(
            &params.coefficients_file,
        )?)),
        AKKAR_BOMMER_2010_GMPE => Ok(Box::new(
            read_gmpe_coefficients::<AkkarBommer2010Coefficients>(&params.coefficients_file)?,
        )),
        name => bail!(unknown_gmpe(name)),
    }
}

/// One row of a GMPE's coefficient table
pub trait GmpeCoefficientRow: DeserializeOwned + Send + Sync {
    /// The name of the GMPE these coefficients belong to
    const NAME: &'static str;

    /// Period (s); zero for PGA
    fn period(&self) -> f64;

    /// ln SA (g) predicted with these coefficients
    fn ln_mean(&self, ctx: &GmmContext) -> f64;

    /// Standard deviation of ln SA
    fn ln_stdev(&self) -> f64;

    /// Check model-specific constraints on the coefficients
    fn check(&self) -> Result<()> {
        Ok(())
    }
}

/// Coefficients of [`CoefficientTableGmpe`] at a single period
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GmpeCoefficients {
    /// Period (s); zero for PGA
    pub period: f64,
    /// Constant term
    pub c0: f64,
    /// Linear magnitude scaling
    pub c1: f64,
    /// Quadratic magnitude scaling
    pub c2: f64,
    /// Geometric spreading
    pub c3: f64,
    /// Magnitude dependence of geometric spreading
    pub c4: f64,
    /// Linear site amplification
    pub c5: f64,
    /// Normal faulting term
    pub c6: f64,
    /// Reverse faulting term
    pub c7: f64,
    /// Fictitious depth (km)
    pub h: f64,
    /// Total standard deviation of ln SA
    pub sigma: f64,
}

impl GmpeCoefficientRow for GmpeCoefficients {
    const NAME: &'static str = COEFFICIENT_TABLE_GMPE;

    fn period(&self) -> f64 {
        self.period
    }

    fn ln_mean(&self, ctx: &GmmContext) -> f64 {
        let mag = ctx.rupture.mag;
        let distance = ctx.distances.rjb.hypot(self.h);
        let (f_n, f_r) = match FaultingStyle::from_rake(ctx.rupture.rake) {
            FaultingStyle::Normal => (1.0, 0.0),
            FaultingStyle::Reverse => (0.0, 1.0),
            FaultingStyle::StrikeSlip => (0.0, 0.0),
        };

        self.c0
            + self.c1 * (mag - 6.0)
            + self.c2 * (mag - 6.0).powi(2)
            + (self.c3 + self.c4 * (mag - 4.5)) * distance.ln()
            + self.c5 * (ctx.site.vs30 / 760.0).ln()
            + self.c6 * f_n
            + self.c7 * f_r
    }

    fn ln_stdev(&self) -> f64 {
        self.sigma
    }

    fn check(&self) -> Result<()> {
        ensure!(self.h >= 0.0, "GMPE fictitious depth h must not be negative");
        Ok(())
    }
}

/// Coefficients of [`AkkarBommer2010`] at a single period
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AkkarBommer2010Coefficients {
    /// Period (s); zero for PGA
    pub period: f64,
    /// Constant term
    pub b1: f64,
    /// Linear magnitude scaling
    pub b2: f64,
    /// Quadratic magnitude scaling
    pub b3: f64,
    /// Geometric spreading
    pub b4: f64,
    /// Magnitude dependence of geometric spreading
    pub b5: f64,
    /// Fictitious depth (km)
    pub b6: f64,
    /// Soft soil term (Vs30 < 360 m/s)
    pub b7: f64,
    /// Stiff soil term (360 <= Vs30 <= 750 m/s)
    pub b8: f64,
    /// Normal faulting term
    pub b9: f64,
    /// Reverse faulting term
    pub b10: f64,
    /// Intra-event standard deviation of log10 SA
    pub sigma1: f64,
    /// Inter-event standard deviation of log10 SA
    pub sigma2: f64,
}

impl AkkarBommer2010Coefficients {
    /// Soft and stiff soil dummy variables for a Vs30 (m/s)
    fn site_terms(vs30: f64) -> (f64, f64) {
        if vs30 < 360.0 {
            (1.0, 0.0)
        } else if vs30 <= 750.0 {
            (0.0, 1.0)
        } else {
            (0.0, 0.0)
        }
    }

    /// Normal and reverse faulting dummy variables for a rake (degrees)
    fn faulting_terms(rake: f64) -> (f64, f64) {
        if rake > -135.0 && rake < -45.0 {
            (1.0, 0.0)
        } else if rake > 45.0 && rake < 135.0 {
            (0.0, 1.0)
        } else {
            (0.0, 0.0)
        }
    }

    /// log10 SA (cm/s^2)
    fn log10_mean(&self, ctx: &GmmContext) -> f64 {
        let mag = ctx.rupture.mag;
        let distance = ctx.distances.rjb.hypot(self.b6);
        let (s_s, s_a) = Self::site_terms(ctx.site.vs30);
        let (f_n, f_r) = Self::faulting_terms(ctx.rupture.rake);

        self.b1
            + self.b2 * mag
            + self.b3 * mag * mag
            + (self.b4 + self.b5 * mag) * distance.log10()
            + self.b7 * s_s
            + self.b8 * s_a
            + self.b9 * f_n
            + self.b10 * f_r
    }
}

impl GmpeCoefficientRow for AkkarBommer2010Coefficients {
    const NAME: &'static str = AKKAR_BOMMER_2010_GMPE;

    fn period(&self) -> f64 {
        self.period
    }

    fn ln_mean(&self, ctx: &GmmContext) -> f64 {
        // cm/s^2 to g
        (self.log10_mean(ctx) - 2.0) * LN_10 - GRAVITY.ln()
    }

    fn ln_stdev(&self) -> f64 {
        self.sigma1.hypot(self.sigma2) * LN_10
    }

    fn check(&self) -> Result<()> {
        ensure!(self.b6 >= 0.0, "GMPE fictitious depth b6 must not be negative");
        Ok(())
    }
}

/// A GMPE whose coefficients are tabulated by period.
///
/// Between tabulated periods, the predicted ln mean and sigma are interpolated linearly in ln(T).
#[derive(Debug, Clone, PartialEq)]
pub struct TabulatedGmpe<C> {
    /// Coefficients, sorted by period
    coefficients: Vec<C>,
}

impl<C: GmpeCoefficientRow> TabulatedGmpe<C> {
    /// Create a new GMPE from coefficients sorted by period
    pub fn new(coefficients: Vec<C>) -> Self {
        Self { coefficients }
    }
}

/// A GMPE with the functional form
///
/// ```text
/// ln SA = c0 + c1 (M - 6) + c2 (M - 6)^2 + (c3 + c4 (M - 4.5)) ln sqrt(Rjb^2 + h^2)
///         + c5 ln(Vs30 / 760) + c6 F_N + c7 F_R
/// ```
pub type CoefficientTableGmpe = TabulatedGmpe<GmpeCoefficients>;

/// The Akkar & Bommer (2010) GMPE for Europe and the Middle East:
///
/// ```text
/// log10 SA = b1 + b2 M + b3 M^2 + (b4 + b5 M) log10 sqrt(Rjb^2 + b6^2)
///            + b7 S_S + b8 S_A + b9 F_N + b10 F_R
/// ```
///
/// with SA in cm/s^2, soil classes from Vs30 and a total sigma combining the intra- and
/// inter-event terms. Coefficients are read from a CSV table.
pub type AkkarBommer2010 = TabulatedGmpe<AkkarBommer2010Coefficients>;

impl<C: GmpeCoefficientRow> GroundMotionModel for TabulatedGmpe<C> {
    fn name(&self) -> &str {
        C::NAME
    }

    fn ln_mean_and_stdev(&self, ctx: &GmmContext, period: f64) -> Result<(f64, f64)> {
        if let Some(exact) = self
            .coefficients
            .iter()
            .find(|coeffs| (coeffs.period() - period).abs() < 1e-9)
        {
            return Ok((exact.ln_mean(ctx), exact.ln_stdev()));
        }

        let Some((lower, upper)) = self
            .coefficients
            .iter()
            .filter(|coeffs| coeffs.period() > 0.0)
            .tuple_windows()
            .find(|(lower, upper)| lower.period() < period && period < upper.period())
        else {
            bail!(SelectionError::Configuration(format!(
                "Period {period} s is outside the range of the GMPE coefficients"
            )));
        };

        let weight =
            (period.ln() - lower.period().ln()) / (upper.period().ln() - lower.period().ln());
        let mean = lower.ln_mean(ctx) + weight * (upper.ln_mean(ctx) - lower.ln_mean(ctx));
        let sigma = lower.ln_stdev() + weight * (upper.ln_stdev() - lower.ln_stdev());

        Ok((mean, sigma))
    }
}
