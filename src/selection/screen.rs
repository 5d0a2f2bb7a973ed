//! Screening of the recording database for a case.
use super::PeriodGrid;
use super::conditioning::ConditioningValue;
use crate::error::SelectionError;
use crate::parameters::{DatabaseParameters, HazardLevel, SiteParameters, parse_ec8_codes};
use crate::recording::{Ec8Class, Recording, RecordingDatabase};
use anyhow::{Result, bail};
use log::{info, warn};
use std::collections::HashSet;
use unicase::UniCase;

/// Criteria which a recording must satisfy to be a candidate
#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningCriteria {
    /// Allowed source databases, compared case-insensitively
    pub allowed_databases: Vec<UniCase<String>>,
    /// Allowed event depths (km)
    pub depth: [f64; 2],
    /// Allowed Vs30 (m/s)
    pub vs30: [f64; 2],
    /// Allowed EC8 ground types (`None` for all)
    pub ec8: Option<Vec<Ec8Class>>,
    /// Allowed magnitudes
    pub magnitude: [f64; 2],
    /// Allowed Joyner-Boore distances (km)
    pub rjb: [f64; 2],
}

impl ScreeningCriteria {
    /// Build the screening criteria for a case.
    ///
    /// If not given explicitly, the Vs30 range is the site's Vs30 plus or minus the tolerance and
    /// the EC8 ground type is that implied by the site's Vs30. Magnitude and distance windows are
    /// centred on the values from the disaggregation.
    pub fn new(
        database: &DatabaseParameters,
        site: &SiteParameters,
        level: &HazardLevel,
        conditioning: &ConditioningValue,
    ) -> Result<Self> {
        let vs30 = database.allowed_vs30.unwrap_or([
            site.vs30 - database.vs30_tolerance,
            site.vs30 + database.vs30_tolerance,
        ]);
        let ec8 = match &database.allowed_ec8_codes {
            Some(codes) => parse_ec8_codes(codes)
                .map_err(|err| SelectionError::Configuration(format!("{err:#}")))?,
            None => Some(vec![Ec8Class::from_vs30(site.vs30)]),
        };

        Ok(Self {
            allowed_databases: database
                .allowed_databases
                .iter()
                .map(|name| UniCase::new(name.clone()))
                .collect(),
            depth: database.allowed_depth,
            vs30,
            ec8,
            magnitude: [
                conditioning.magnitude - level.radius_mag,
                conditioning.magnitude + level.radius_mag,
            ],
            rjb: [
                conditioning.rjb - level.radius_dist,
                conditioning.rjb + level.radius_dist,
            ],
        })
    }

    /// Whether the recording's metadata satisfy the criteria
    pub fn accepts(&self, recording: &Recording) -> bool {
        let within = |[lower, upper]: [f64; 2], value: f64| lower <= value && value <= upper;
        let source = UniCase::new(recording.identity.source.0.to_string());

        self.allowed_databases.contains(&source)
            && within(self.depth, recording.depth)
            && within(self.vs30, recording.vs30)
            && within(self.magnitude, recording.magnitude)
            && within(self.rjb, recording.rjb)
            && self.ec8.as_ref().is_none_or(|classes| {
                let class = recording
                    .ec8
                    .unwrap_or_else(|| Ec8Class::from_vs30(recording.vs30));
                classes.contains(&class)
            })
    }
}

/// A recording which passed screening
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// The recording
    pub recording: Recording,
    /// Natural log of the recording's spectrum on the case's period grid
    pub ln_spectrum: Vec<f64>,
    /// Natural log of the recording's IM
    pub ln_im: f64,
}

/// The recordings which passed screening, in database order
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSet {
    /// The candidates
    pub candidates: Vec<Candidate>,
}

impl CandidateSet {
    /// Number of candidates
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether there are no candidates
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Screen the database, keeping recordings which satisfy the criteria and have a spectrum defined
/// at every period of the grid.
///
/// Recordings whose identity has already been seen are skipped, so each identity appears at most
/// once among the candidates.
///
/// # Returns
///
/// The candidates, or an insufficient data error if there are fewer than `n_gm`
pub fn screen_database(
    database: &RecordingDatabase,
    criteria: &ScreeningCriteria,
    grid: &PeriodGrid,
    n_gm: usize,
) -> Result<CandidateSet> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for recording in &database.recordings {
        if !criteria.accepts(recording) || !seen.insert(&recording.identity) {
            continue;
        }

        let Some(ln_spectrum) = recording.spectrum.ln_at(&grid.periods) else {
            continue;
        };
        candidates.push(Candidate {
            recording: recording.clone(),
            ln_im: grid.ln_im(&ln_spectrum),
            ln_spectrum,
        });
    }

    if candidates.len() < n_gm {
        bail!(SelectionError::InsufficientData(format!(
            "Only {} recordings passed screening but {n_gm} are required",
            candidates.len()
        )));
    }

    info!("{} recordings passed screening", candidates.len());
    if candidates.len() < 2 * n_gm {
        warn!(
            "Only {} candidate recordings for {n_gm} ground motions; the selection may be poor",
            candidates.len()
        );
    }

    Ok(CandidateSet { candidates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::selection_error;
    use crate::fixture::{recording_database, screening_criteria};
    use crate::intensity_measure::IntensityMeasure;
    use rstest::rstest;

    fn grid() -> PeriodGrid {
        PeriodGrid::new(IntensityMeasure::Sa(0.5), &[0.1, 0.5, 1.0], &[]).unwrap()
    }

    #[rstest]
    fn test_screen_database(
        recording_database: RecordingDatabase,
        screening_criteria: ScreeningCriteria,
    ) {
        let candidates = screen_database(&recording_database, &screening_criteria, &grid(), 2)
            .unwrap();
        assert_eq!(candidates.len(), recording_database.recordings.len());
        for candidate in &candidates.candidates {
            assert_eq!(candidate.ln_spectrum.len(), 3);
            assert_eq!(candidate.ln_im, candidate.ln_spectrum[1]);
        }
    }

    #[rstest]
    fn test_screen_database_insufficient(
        recording_database: RecordingDatabase,
        screening_criteria: ScreeningCriteria,
    ) {
        let mut database = recording_database;
        database.recordings.truncate(3);
        let err = screen_database(&database, &screening_criteria, &grid(), 5).unwrap_err();
        assert!(matches!(
            selection_error(&err),
            Some(SelectionError::InsufficientData(_))
        ));
    }

    #[rstest]
    fn test_screen_database_duplicate_identity(
        recording_database: RecordingDatabase,
        screening_criteria: ScreeningCriteria,
    ) {
        let mut database = recording_database;
        let n = database.recordings.len();
        database.recordings.push(database.recordings[0].clone());
        let candidates = screen_database(&database, &screening_criteria, &grid(), 1).unwrap();
        assert_eq!(candidates.len(), n);
    }

    #[rstest]
    fn test_screen_database_skips_missing_ordinates(
        recording_database: RecordingDatabase,
        screening_criteria: ScreeningCriteria,
    ) {
        let mut database = recording_database;
        let n = database.recordings.len();
        database.recordings[0].spectrum.ordinates.fill(f64::NAN);
        let candidates = screen_database(&database, &screening_criteria, &grid(), 1).unwrap();
        assert_eq!(candidates.len(), n - 1);
    }

    #[rstest]
    #[case::source(|rec: &mut Recording| rec.identity.source = "KiK-net".into())]
    #[case::magnitude(|rec: &mut Recording| rec.magnitude = 8.5)]
    #[case::distance(|rec: &mut Recording| rec.rjb = 500.0)]
    #[case::depth(|rec: &mut Recording| rec.depth = 100.0)]
    #[case::vs30(|rec: &mut Recording| rec.vs30 = 2000.0)]
    #[case::ec8(|rec: &mut Recording| rec.ec8 = Some(Ec8Class::E))]
    fn test_criteria_rejects(
        recording_database: RecordingDatabase,
        screening_criteria: ScreeningCriteria,
        #[case] modify: fn(&mut Recording),
    ) {
        let mut recording = recording_database.recordings[0].clone();
        assert!(screening_criteria.accepts(&recording));
        modify(&mut recording);
        assert!(!screening_criteria.accepts(&recording));
    }

    #[rstest]
    fn test_criteria_source_case_insensitive(
        recording_database: RecordingDatabase,
        screening_criteria: ScreeningCriteria,
    ) {
        let mut recording = recording_database.recordings[0].clone();
        recording.identity.source = recording.identity.source.0.to_lowercase().into();
        assert!(screening_criteria.accepts(&recording));
    }
}
