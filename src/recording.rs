//! Recorded ground motions and their known response spectra.
use crate::id::RecordIdentity;
use crate::stats::interpolate_log_log;
use itertools::Itertools;
use std::sync::Arc;

/// Eurocode 8 ground type
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::EnumString,
    strum::Display,
)]
pub enum Ec8Class {
    /// Rock (Vs30 > 800 m/s)
    A,
    /// Very dense sand, gravel or very stiff clay (360-800 m/s)
    B,
    /// Dense or medium-dense sand, gravel or stiff clay (180-360 m/s)
    C,
    /// Loose-to-medium cohesionless soil (< 180 m/s)
    D,
    /// Surface alluvium layer over stiffer material
    E,
}

impl Ec8Class {
    /// The ground type implied by a site's Vs30 (m/s).
    ///
    /// Class E cannot be inferred from Vs30 alone, so is never returned.
    pub fn from_vs30(vs30: f64) -> Self {
        if vs30 > 800.0 {
            Self::A
        } else if vs30 >= 360.0 {
            Self::B
        } else if vs30 >= 180.0 {
            Self::C
        } else {
            Self::D
        }
    }
}

/// The 5%-damped response spectrum provided for a recording.
///
/// Spectral accelerations are in g. Missing ordinates are stored as NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpectrum {
    /// The database's period grid (s), shared by all recordings
    pub periods: Arc<[f64]>,
    /// Spectral acceleration at each period
    pub ordinates: Vec<f64>,
    /// Peak ground acceleration, if known
    pub pga: Option<f64>,
}

impl ResponseSpectrum {
    /// Spectral acceleration at `period`, interpolating log-log between known ordinates.
    ///
    /// A period of zero refers to PGA. Returns `None` if the value cannot be determined.
    pub fn at(&self, period: f64) -> Option<f64> {
        if period == 0.0 {
            return self.pga.filter(|pga| is_valid_ordinate(*pga));
        }

        let (periods, ordinates): (Vec<f64>, Vec<f64>) = self
            .periods
            .iter()
            .zip(&self.ordinates)
            .filter(|(_, sa)| is_valid_ordinate(**sa))
            .map(|(t, sa)| (*t, *sa))
            .unzip();
        interpolate_log_log(&periods, &ordinates, period)
    }

    /// Natural logarithm of the spectrum at each of `periods`, or `None` if any are unavailable
    pub fn ln_at(&self, periods: &[f64]) -> Option<Vec<f64>> {
        periods
            .iter()
            .map(|period| self.at(*period).map(f64::ln))
            .collect::<Option<Vec<_>>>()
    }
}

fn is_valid_ordinate(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// A ground motion recording with its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    /// Unique identity of the recording
    pub identity: RecordIdentity,
    /// Moment magnitude of the causative event
    pub magnitude: f64,
    /// Joyner-Boore distance (km)
    pub rjb: f64,
    /// Vs30 at the recording station (m/s)
    pub vs30: f64,
    /// EC8 ground type at the station, if known
    pub ec8: Option<Ec8Class>,
    /// Hypocentral depth of the event (km)
    pub depth: f64,
    /// The known response spectrum
    pub spectrum: ResponseSpectrum,
}

/// The full ground-motion database
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordingDatabase {
    /// All recordings, in file order
    pub recordings: Vec<Recording>,
}

impl RecordingDatabase {
    /// The names of the source databases present, in order of first appearance
    pub fn sources(&self) -> Vec<&str> {
        self.recordings
            .iter()
            .map(|rec| &*rec.identity.source.0)
            .unique()
            .collect()
    }
}
