//! Fixtures for tests

use crate::error::SelectionError;
use crate::gmpe::{
    CoefficientTableGmpe, DistanceContext, GmmContext, GmpeCoefficients, RuptureContext,
    SiteContext,
};
use crate::hazard::{DisaggregationBin, HazardCurve, HazardKey, HazardResults};
use crate::id::RecordIdentity;
use crate::intensity_measure::IntensityMeasure;
use crate::parameters::{HazardLevel, JobParameters, RuptureParameters, SiteParameters, Vs30Type};
use crate::recording::{Ec8Class, Recording, RecordingDatabase, ResponseSpectrum};
use crate::selection::PeriodGrid;
use crate::selection::screen::{CandidateSet, ScreeningCriteria, screen_database};
use crate::selection::target::TargetDistribution;
use anyhow::{Result, bail};
use nalgebra::DMatrix;
use rstest::fixture;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use unicase::UniCase;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// A valid job file. Paths are relative to the job file.
pub const JOB_FILE_CONTENTS: &str = r#"description = "Test selection job"
intensity_measures = ["SA(0.5)", "AvgSA"]
investigation_time = 50.0
target_periods = [0.1, 0.2, 0.5, 1.0, 2.0]
avg_periods = [0.2, 0.5, 1.0]
correlation_model = "baker_jayaram"

[[sites]]
id = 1
rlz = 0
vs30 = 400.0
vs30_type = "measured"

[[hazard_levels]]
poe_id = 0
probability_of_exceedance = 0.1
maxsf = 3.0
radius_dist = 50.0
radius_mag = 1.0

[[hazard_levels]]
poe_id = 1
probability_of_exceedance = 0.02
maxsf = 5.0
radius_dist = 50.0
radius_mag = 1.0

[hazard]
results_dir = "hazard"
disaggregation_calc_id = 1
classical_calc_id = 2

[gmpe]
name = "coefficient_table"
coefficients_file = "gmpe_coefficients.csv"

[rupture]
rake = 0.0
azimuth = 50.0

[database]
path = "database.csv"
allowed_databases = ["ESM", "NGA-West2"]
allowed_depth = [0.0, 30.0]

[selection]
n_gm = 3
n_trials = 5
n_loop = 2
penalty = 0.0
random_seed = 333
"#;

/// Coefficients for a [`CoefficientTableGmpe`]
pub const GMPE_COEFFICIENTS_CSV: &str = "period,c0,c1,c2,c3,c4,c5,c6,c7,h,sigma
0.0,0.5,0.6,-0.1,-1.1,0.1,-0.5,-0.1,0.1,4.5,0.65
0.1,1.2,0.5,-0.1,-1.2,0.1,-0.4,-0.1,0.1,5.0,0.6
1.0,-1.5,0.9,-0.1,-1.0,0.0,-0.7,-0.1,0.1,5.0,0.7
3.0,-3.0,1.1,-0.1,-0.9,0.0,-0.8,-0.1,0.1,5.0,0.72";

/// Coefficients for an [`AkkarBommer2010`](crate::gmpe::AkkarBommer2010) GMPE at PGA and 0.1 s
pub const AKKAR_BOMMER_2010_CSV: &str = "period,b1,b2,b3,b4,b5,b6,b7,b8,b9,b10,sigma1,sigma2
0.0,1.04159,0.91333,-0.08140,-2.92728,0.28120,7.86638,0.08753,0.01527,-0.04189,0.08015,0.2610,0.0994
0.1,2.11994,0.75179,-0.07448,-3.10538,0.30253,8.21405,0.02667,-0.00062,-0.04906,0.07910,0.2728,0.1167";

/// A small recording database flat-file
pub const DATABASE_CSV: &str = "source,record_id,event_id,station_id,magnitude,rjb,vs30,ec8,depth,PGA,T0.1,T0.2,T0.5,T1.0,T2.0
ESM,R1,EV1,ST1,6.1,12.0,420,B,8.0,0.21,0.35,0.42,0.30,0.15,0.05
ESM,R2,EV1,ST2,6.1,25.0,510,B,8.0,0.12,0.20,0.26,0.18,0.09,0.03
ESM,R3,EV2,ST1,5.6,8.0,420,B,11.0,0.18,0.30,0.33,0.17,0.06,0.02
ESM,R4,EV3,ST3,6.6,30.0,300,C,15.0,0.09,0.14,0.20,0.16,0.10,0.04
NGA-West2,R1,EV4,ST4,6.9,18.0,760,B,12.0,0.25,0.40,0.52,0.45,0.28,0.12
NGA-West2,R2,EV4,ST5,6.9,40.0,350,C,12.0,0.10,0.16,0.21,0.19,0.12,0.06
NGA-West2,R3,EV5,ST6,5.9,15.0,900,A,6.0,0.15,0.27,0.25,0.12,0.05,
NGA-West2,R4,EV6,ST7,6.3,22.0,450,,9.0,0.11,0.19,0.23,0.15,0.08,0.03";

/// Write disaggregation (calc 1) and hazard curve (calc 2) files for site 0 to `dir`
pub fn write_hazard_files(dir: &Path) {
    fs::write(
        dir.join("disagg_1.csv"),
        "rlz,site,imt,poe_id,mag,dist,poe
0,0,SA(0.5),0,5.5,10.0,0.01
0,0,SA(0.5),0,6.5,30.0,0.02
0,1,SA(0.5),0,6.0,20.0,0.05",
    )
    .unwrap();
    fs::write(
        dir.join("hazard_curves_2.csv"),
        "rlz,site,imt,iml,poe
0,0,SA(0.5),0.1,0.3
0,0,SA(0.5),0.01,0.8
0,0,SA(0.5),1.0,0.01",
    )
    .unwrap();
}

/// Hazard results which are only available for site 1.
///
/// The disaggregation has two equally-weighted bins (M 5, 10 km and M 7, 30 km).
#[derive(Debug, Default)]
pub struct FakeHazard;

impl HazardResults for FakeHazard {
    fn disaggregation(&self, key: &HazardKey, _poe_id: u32) -> Result<Vec<DisaggregationBin>> {
        if key.site != 1 {
            bail!(SelectionError::InputData("No such site".into()));
        }

        Ok(vec![
            DisaggregationBin {
                mag: 5.0,
                dist: 10.0,
                poe: 0.01,
            },
            DisaggregationBin {
                mag: 7.0,
                dist: 30.0,
                poe: 0.01,
            },
        ])
    }

    fn hazard_curve(&self, key: &HazardKey) -> Result<HazardCurve> {
        if key.site != 1 {
            bail!(SelectionError::InputData("No such site".into()));
        }

        Ok(HazardCurve {
            imls: vec![0.01, 0.1, 1.0],
            poes: vec![0.5, 0.1, 0.001],
        })
    }
}

#[fixture]
pub fn job_parameters() -> JobParameters {
    toml::from_str(JOB_FILE_CONTENTS).unwrap()
}

#[fixture]
pub fn hazard_level() -> HazardLevel {
    HazardLevel {
        poe_id: 0,
        probability_of_exceedance: 0.1,
        maxsf: 3.0,
        radius_dist: 50.0,
        radius_mag: 1.0,
    }
}

#[fixture]
pub fn rupture_parameters() -> RuptureParameters {
    RuptureParameters {
        rake: 0.0,
        azimuth: Some(50.0),
        ..Default::default()
    }
}

#[fixture]
pub fn site_parameters() -> SiteParameters {
    SiteParameters {
        id: 1,
        rlz: 0,
        vs30: 400.0,
        vs30_type: Vs30Type::Inferred,
        z1pt0: None,
        z2pt5: None,
    }
}

#[fixture]
pub fn gmpe() -> CoefficientTableGmpe {
    let mut reader = csv::Reader::from_reader(GMPE_COEFFICIENTS_CSV.as_bytes());
    let coefficients = reader
        .deserialize::<GmpeCoefficients>()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    CoefficientTableGmpe::new(coefficients)
}

#[fixture]
pub fn gmm_context() -> GmmContext {
    GmmContext {
        rupture: RuptureContext {
            mag: 6.0,
            rake: 0.0,
            hypo_depth: 9.71,
            dip: 90.0,
            ztor: 5.0,
            width: 8.0,
        },
        site: SiteContext {
            vs30: 760.0,
            vs30_measured: true,
            z1pt0: 40.0,
            z2pt5: 0.6,
        },
        distances: DistanceContext {
            rjb: 20.0,
            rrup: 20.6,
            rx: 15.0,
        },
    }
}

/// Build an ESM recording with a spectrum at 0.1, 0.5 and 1.0 s
fn recording(record_id: &str, magnitude: f64, rjb: f64, ordinates: [f64; 3]) -> Recording {
    Recording {
        identity: RecordIdentity::new("ESM", record_id, &format!("EV_{record_id}"), "ST1"),
        magnitude,
        rjb,
        vs30: 400.0,
        ec8: Some(Ec8Class::B),
        depth: 10.0,
        spectrum: ResponseSpectrum {
            periods: Arc::from([0.1, 0.5, 1.0].as_slice()),
            ordinates: ordinates.to_vec(),
            pga: Some(0.8 * ordinates[0]),
        },
    }
}

/// Five recordings, all of which satisfy [`screening_criteria`]
#[fixture]
pub fn recording_database() -> RecordingDatabase {
    RecordingDatabase {
        recordings: vec![
            recording("R1", 5.5, 10.0, [0.20, 0.30, 0.15]),
            recording("R2", 6.0, 20.0, [0.50, 0.60, 0.20]),
            recording("R3", 6.2, 15.0, [0.30, 0.40, 0.35]),
            recording("R4", 6.8, 35.0, [0.80, 0.90, 0.40]),
            recording("R5", 5.8, 25.0, [0.25, 0.50, 0.30]),
        ],
    }
}

#[fixture]
pub fn screening_criteria() -> ScreeningCriteria {
    ScreeningCriteria {
        allowed_databases: vec![UniCase::new("ESM".into())],
        depth: [0.0, 30.0],
        vs30: [300.0, 500.0],
        ec8: Some(vec![Ec8Class::B]),
        magnitude: [5.0, 7.0],
        rjb: [0.0, 50.0],
    }
}

/// The screened [`recording_database`] for SA(0.5) with periods 0.1, 0.5 and 1.0 s
#[fixture]
pub fn candidate_set(
    recording_database: RecordingDatabase,
    screening_criteria: ScreeningCriteria,
) -> CandidateSet {
    let grid = PeriodGrid::new(IntensityMeasure::Sa(0.5), &[0.1, 0.5, 1.0], &[]).unwrap();
    screen_database(&recording_database, &screening_criteria, &grid, 1).unwrap()
}

/// A target for SA(0.5) = 0.6 g with periods 0.1, 0.5 and 1.0 s
#[fixture]
pub fn target_distribution() -> TargetDistribution {
    let stdev = vec![0.3, 0.0, 0.4];
    let correlation = 0.6;
    let covariance = DMatrix::from_row_slice(
        3,
        3,
        &[
            stdev[0] * stdev[0],
            0.0,
            correlation * stdev[0] * stdev[2],
            0.0,
            0.0,
            0.0,
            correlation * stdev[0] * stdev[2],
            0.0,
            stdev[2] * stdev[2],
        ],
    );

    TargetDistribution {
        periods: vec![0.1, 0.5, 1.0],
        mean: vec![0.5f64.ln(), 0.6f64.ln(), 0.3f64.ln()],
        covariance,
        stdev,
    }
}
