//! Cases: the (intensity measure, site, hazard level) combinations for which records are selected.
use crate::intensity_measure::IntensityMeasure;
use crate::parameters::{HazardLevel, JobParameters, SiteParameters};
use rand::SeedableRng;
use rand::rngs::StdRng;
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// The name of a case, which is also the name of its output folder
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
#[display("{im}-site_{site_id}-poe-{poe_id}")]
pub struct CaseName {
    /// The conditioning intensity measure
    pub im: IntensityMeasure,
    /// The site ID
    pub site_id: u32,
    /// The hazard level ID
    pub poe_id: u32,
}

/// A single record selection problem
#[derive(Debug, Clone, PartialEq)]
pub struct Case<'a> {
    /// The conditioning intensity measure
    pub im: IntensityMeasure,
    /// The site
    pub site: &'a SiteParameters,
    /// The hazard level
    pub level: &'a HazardLevel,
}

impl Case<'_> {
    /// The name of this case
    pub fn name(&self) -> CaseName {
        CaseName {
            im: self.im,
            site_id: self.site.id,
            poe_id: self.level.poe_id,
        }
    }

    /// Create the random number generator for this case.
    ///
    /// The seed is derived from the job's seed and the case name, so that each case gets an
    /// independent stream regardless of the order in which cases are run.
    pub fn rng(&self, random_seed: u64) -> StdRng {
        StdRng::seed_from_u64(derive_case_seed(random_seed, &self.name().to_string()))
    }
}

/// Derive the seed for a case's random stream with SipHash-1-3
pub fn derive_case_seed(random_seed: u64, case_name: &str) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(random_seed);
    hasher.write(case_name.as_bytes());
    hasher.finish()
}

/// Enumerate the cases of a job, ordered by site, then hazard level, then intensity measure
pub fn enumerate_cases(params: &JobParameters) -> Vec<Case<'_>> {
    let mut cases = Vec::new();
    for site in &params.sites {
        for level in &params.hazard_levels {
            for im in &params.intensity_measures {
                cases.push(Case {
                    im: *im,
                    site,
                    level,
                });
            }
        }
    }

    cases
}
