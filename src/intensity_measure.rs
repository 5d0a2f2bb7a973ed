//! Intensity measures on which a target spectrum can be conditioned.
use anyhow::{Context, Result, bail};
use std::fmt;
use std::str::FromStr;

/// An intensity measure (IM) used for conditioning.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
#[serde(try_from = "String")]
pub enum IntensityMeasure {
    /// Peak ground acceleration (treated as spectral acceleration at T = 0 s)
    Pga,
    /// Spectral acceleration at the given period (s)
    Sa(f64),
    /// Geometric mean of spectral accelerations over the `avg_periods` of the job
    AvgSa,
}

impl IntensityMeasure {
    /// The conditioning period, if the IM is defined at a single period
    pub fn conditioning_period(&self) -> Option<f64> {
        match self {
            Self::Pga => Some(0.0),
            Self::Sa(period) => Some(*period),
            Self::AvgSa => None,
        }
    }

    /// The label used for this IM in hazard result files
    pub fn hazard_label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IntensityMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pga => write!(f, "PGA"),
            Self::Sa(period) => write!(f, "SA({period})"),
            Self::AvgSa => write!(f, "AvgSA"),
        }
    }
}

impl FromStr for IntensityMeasure {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "PGA" {
            return Ok(Self::Pga);
        }
        if s == "AvgSA" {
            return Ok(Self::AvgSa);
        }
        if let Some(period) = s.strip_prefix("SA(").and_then(|rest| rest.strip_suffix(')')) {
            let period: f64 = period
                .trim()
                .parse()
                .with_context(|| format!("Invalid period in intensity measure {s}"))?;
            if !(period.is_finite() && period > 0.0) {
                bail!("The period of intensity measure {s} must be greater than zero");
            }
            return Ok(Self::Sa(period));
        }

        bail!("Intensity measure type {s} is not supported")
    }
}

impl TryFrom<String> for IntensityMeasure {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}
