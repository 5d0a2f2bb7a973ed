//! Defines the `JobParameters` struct, which represents the contents of a selection job file.
use crate::error::SelectionError;
use crate::input::{
    check_periods, deserialise_non_negative, deserialise_positive, input_err_msg, read_toml,
};
use crate::intensity_measure::IntensityMeasure;
use crate::recording::Ec8Class;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use log::warn;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::path::{Path, PathBuf};

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_vs30_tolerance, f64, 100.0);
define_param_default!(default_n_trials, usize, 10);
define_param_default!(default_n_loop, u32, 10);
define_param_default!(default_weights, MomentWeights, MomentWeights::from([1.0, 2.0, 0.3]));

/// Represents the contents of an entire selection job file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct JobParameters {
    /// Free-text description of the job
    #[serde(default)]
    pub description: Option<String>,
    /// Intensity measures on which to condition the target spectrum
    pub intensity_measures: Vec<IntensityMeasure>,
    /// Period of time (years) to which the hazard probabilities refer
    #[serde(deserialize_with = "deserialise_positive")]
    pub investigation_time: f64,
    /// Periods (s) at which the target spectrum is defined
    pub target_periods: Vec<f64>,
    /// Periods (s) over which AvgSA is computed
    #[serde(default)]
    pub avg_periods: Vec<f64>,
    /// Inter-period correlation model
    pub correlation_model: CorrelationModelName,
    /// Tabulated correlation coefficients, required by the `akkar` model
    #[serde(default)]
    pub correlation_table_file: Option<PathBuf>,
    /// The sites for which to select records
    pub sites: Vec<SiteParameters>,
    /// The hazard levels (probabilities of exceedance) to consider
    pub hazard_levels: Vec<HazardLevel>,
    /// Where to find the hazard results
    pub hazard: HazardParameters,
    /// The ground-motion prediction equation
    pub gmpe: GmpeParameters,
    /// Source parameters used to evaluate the GMPE
    pub rupture: RuptureParameters,
    /// The recording database and its screening options
    pub database: DatabaseParameters,
    /// Parameters of the selection algorithm
    pub selection: SelectionParameters,
}

/// The inter-period correlation model used to build the target covariance
#[derive(DeserializeLabeledStringEnum, Debug, PartialEq, Clone, Copy)]
pub enum CorrelationModelName {
    /// Baker & Jayaram (2008)
    #[string = "baker_jayaram"]
    BakerJayaram,
    /// Tabulated coefficients of Akkar et al.
    #[string = "akkar"]
    Akkar,
}

/// How the Vs30 at a site was obtained
#[derive(DeserializeLabeledStringEnum, Debug, PartialEq, Clone, Copy, Default)]
pub enum Vs30Type {
    /// Vs30 was measured on site
    #[string = "measured"]
    Measured,
    /// Vs30 was inferred from proxies
    #[default]
    #[string = "inferred"]
    Inferred,
}

/// A site at which hazard was computed
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct SiteParameters {
    /// The site ID used in the hazard results
    pub id: u32,
    /// The hazard realisation to use for this site
    pub rlz: u32,
    /// Vs30 at the site (m/s)
    #[serde(deserialize_with = "deserialise_positive")]
    pub vs30: f64,
    /// Whether `vs30` was measured or inferred
    #[serde(default)]
    pub vs30_type: Vs30Type,
    /// Depth (m) to Vs = 1.0 km/s. Derived from Vs30 if absent.
    #[serde(default)]
    pub z1pt0: Option<f64>,
    /// Depth (km) to Vs = 2.5 km/s. Derived from Vs30 if absent.
    #[serde(default)]
    pub z2pt5: Option<f64>,
}

/// A hazard level, with the screening options which depend on it
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct HazardLevel {
    /// Identifier of the probability of exceedance in the hazard results
    pub poe_id: u32,
    /// Probability of exceedance within the investigation time
    pub probability_of_exceedance: f64,
    /// Maximum allowable scale factor
    #[serde(deserialize_with = "deserialise_positive")]
    pub maxsf: f64,
    /// Allowed deviation (km) of recording distance from the target distance
    #[serde(deserialize_with = "deserialise_non_negative")]
    pub radius_dist: f64,
    /// Allowed deviation of recording magnitude from the target magnitude
    #[serde(deserialize_with = "deserialise_non_negative")]
    pub radius_mag: f64,
}

/// Location of the hazard results
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct HazardParameters {
    /// Folder containing the hazard result files
    pub results_dir: PathBuf,
    /// Calculation ID of the disaggregation results
    pub disaggregation_calc_id: u32,
    /// Calculation ID of the classical PSHA results
    pub classical_calc_id: u32,
}

/// The GMPE to use for the target spectrum
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct GmpeParameters {
    /// Registered name of the model
    pub name: String,
    /// File of period-dependent coefficients
    pub coefficients_file: PathBuf,
}

/// Rupture parameters. Those not given are derived by the GMM initialisation.
#[derive(Debug, Deserialize, PartialEq, Clone, Default)]
pub struct RuptureParameters {
    /// Fault rake (degrees)
    pub rake: f64,
    /// Hypocentral depth (km)
    #[serde(default)]
    pub hypo_depth: Option<f64>,
    /// Fault dip (degrees)
    #[serde(default)]
    pub dip: Option<f64>,
    /// Source-to-site azimuth (degrees). Mutually exclusive with `hanging_wall_flag`.
    #[serde(default)]
    pub azimuth: Option<f64>,
    /// 1 for a site on the hanging wall, -1 for the footwall
    #[serde(default)]
    pub hanging_wall_flag: Option<i8>,
    /// Upper seismogenic depth (km)
    #[serde(default)]
    pub upper_sd: Option<f64>,
    /// Lower seismogenic depth (km)
    #[serde(default)]
    pub lower_sd: Option<f64>,
}

/// The recording database and the screening criteria applied to it
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct DatabaseParameters {
    /// Path to the database flat-file
    pub path: PathBuf,
    /// Source databases from which recordings may be taken (e.g. "ESM")
    pub allowed_databases: Vec<String>,
    /// Lower and upper bounds of event depth (km)
    pub allowed_depth: [f64; 2],
    /// Lower and upper bounds of recording Vs30 (m/s). Derived from the site Vs30 if absent.
    #[serde(default)]
    pub allowed_vs30: Option<[f64; 2]>,
    /// Half-width of the Vs30 range derived from the site Vs30
    #[serde(default = "default_vs30_tolerance")]
    #[serde(deserialize_with = "deserialise_non_negative")]
    pub vs30_tolerance: f64,
    /// Allowed EC8 ground types, or `All`. Derived from the site Vs30 if absent.
    #[serde(default)]
    pub allowed_ec8_codes: Option<Vec<String>>,
}

/// Weights of the mean, standard deviation and skewness errors
#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(from = "[f64; 3]")]
pub struct MomentWeights {
    /// Weight for the error in the mean
    pub mean: f64,
    /// Weight for the error in the standard deviation
    pub stdev: f64,
    /// Weight for the error in the skewness
    pub skewness: f64,
}

impl From<[f64; 3]> for MomentWeights {
    fn from([mean, stdev, skewness]: [f64; 3]) -> Self {
        Self {
            mean,
            stdev,
            skewness,
        }
    }
}

/// Parameters of the selection algorithm
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct SelectionParameters {
    /// Number of records to select
    pub n_gm: usize,
    /// Number of sets of spectra to simulate
    #[serde(default = "default_n_trials")]
    pub n_trials: usize,
    /// Weights for the mean, standard deviation and skewness errors
    #[serde(default = "default_weights")]
    pub weights: MomentWeights,
    /// Number of optimisation passes
    #[serde(default = "default_n_loop")]
    pub n_loop: u32,
    /// Penalty for selected spectra more than 3 sigma above the target (0 to disable)
    #[serde(default)]
    #[serde(deserialize_with = "deserialise_non_negative")]
    pub penalty: f64,
    /// Seed for the spectrum simulation
    pub random_seed: u64,
}

/// Parse the `allowed_ec8_codes` option. `None` means that all ground types are allowed.
pub fn parse_ec8_codes(codes: &[String]) -> Result<Option<Vec<Ec8Class>>> {
    if codes.iter().any(|code| code.eq_ignore_ascii_case("all")) {
        return Ok(None);
    }

    let classes = codes
        .iter()
        .map(|code| {
            code.trim()
                .parse()
                .with_context(|| format!("Invalid EC8 code: {code}"))
        })
        .collect::<Result<Vec<Ec8Class>>>()?;

    Ok(Some(classes))
}

/// Check that the rupture parameters are consistent
pub fn check_rupture_parameters(rupture: &RuptureParameters) -> Result<()> {
    ensure!(
        rupture.azimuth.is_none() || rupture.hanging_wall_flag.is_none(),
        "Only one of `azimuth` and `hanging_wall_flag` may be defined"
    );
    ensure!(
        rupture.azimuth.is_some() || rupture.hanging_wall_flag.is_some(),
        "Either `azimuth` or `hanging_wall_flag` must be defined"
    );
    if let Some(flag) = rupture.hanging_wall_flag {
        ensure!(flag == 1 || flag == -1, "`hanging_wall_flag` must be 1 or -1");
    }
    if let Some(dip) = rupture.dip {
        ensure!(dip > 0.0 && dip <= 90.0, "`dip` must be in (0, 90]");
    }
    if let (Some(upper), Some(lower)) = (rupture.upper_sd, rupture.lower_sd) {
        ensure!(upper < lower, "`upper_sd` must be less than `lower_sd`");
    }

    Ok(())
}

/// Check that the `hazard_levels` parameter is valid
fn check_hazard_levels(levels: &[HazardLevel]) -> Result<()> {
    ensure!(!levels.is_empty(), "`hazard_levels` is empty");
    ensure!(
        levels.iter().map(|level| level.poe_id).all_unique(),
        "`poe_id`s of hazard levels must be unique"
    );
    for level in levels {
        ensure!(
            level.probability_of_exceedance > 0.0 && level.probability_of_exceedance < 1.0,
            "`probability_of_exceedance` must be between 0 and 1 (exclusive)"
        );
    }

    Ok(())
}

/// Check that the `sites` parameter is valid
fn check_sites(sites: &[SiteParameters]) -> Result<()> {
    ensure!(!sites.is_empty(), "`sites` is empty");
    ensure!(
        sites.iter().map(|site| site.id).all_unique(),
        "Site IDs must be unique"
    );
    for site in sites {
        if let Some(z1pt0) = site.z1pt0 {
            ensure!(z1pt0 >= 0.0, "`z1pt0` must not be negative (site {})", site.id);
        }
        if let Some(z2pt5) = site.z2pt5 {
            ensure!(z2pt5 >= 0.0, "`z2pt5` must not be negative (site {})", site.id);
        }
    }

    Ok(())
}

/// Check that the `[selection]` section is valid
fn check_selection_parameters(selection: &SelectionParameters) -> Result<()> {
    ensure!(selection.n_gm > 0, "`n_gm` must be greater than zero");
    ensure!(selection.n_trials > 0, "`n_trials` must be greater than zero");

    let weights = selection.weights;
    ensure!(
        [weights.mean, weights.stdev, weights.skewness]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0),
        "`weights` must be finite and non-negative"
    );

    Ok(())
}

/// Check that the `[database]` section is valid
fn check_database_parameters(database: &DatabaseParameters) -> Result<()> {
    ensure!(
        !database.allowed_databases.is_empty(),
        "`allowed_databases` is empty"
    );
    let [lower, upper] = database.allowed_depth;
    ensure!(lower <= upper, "`allowed_depth` must be given as [lower, upper]");
    if let Some([lower, upper]) = database.allowed_vs30 {
        ensure!(lower <= upper, "`allowed_vs30` must be given as [lower, upper]");
    }
    if let Some(codes) = &database.allowed_ec8_codes {
        parse_ec8_codes(codes)?;
    }

    Ok(())
}

impl JobParameters {
    /// Read a job file from the specified path.
    ///
    /// Relative paths in the file are resolved against the folder containing it.
    ///
    /// # Returns
    ///
    /// The job file contents as a [`JobParameters`] struct or a configuration error if the file is
    /// invalid
    pub fn from_path<P: AsRef<Path>>(file_path: P) -> Result<JobParameters> {
        let file_path = file_path.as_ref();
        let mut params: JobParameters = read_toml(file_path).map_err(|err| {
            SelectionError::Configuration(format!("{}: {:#}", input_err_msg(file_path), err))
        })?;

        params.validate().map_err(|err| {
            SelectionError::Configuration(format!("{}: {:#}", input_err_msg(file_path), err))
        })?;

        let base_dir = file_path.parent().unwrap_or(Path::new(""));
        params.resolve_paths(base_dir);

        Ok(params)
    }

    /// Validate parameters after reading in file
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.intensity_measures.is_empty(),
            "`intensity_measures` is empty"
        );
        ensure!(
            self.intensity_measures
                .iter()
                .map(IntensityMeasure::to_string)
                .all_unique(),
            "`intensity_measures` contains duplicates"
        );
        check_periods("target_periods", &self.target_periods)?;

        if self.intensity_measures.contains(&IntensityMeasure::AvgSa) {
            check_periods("avg_periods", &self.avg_periods)?;
        } else if !self.avg_periods.is_empty() {
            warn!("`avg_periods` is only used for the AvgSA intensity measure and will be ignored");
        }

        if self.correlation_model == CorrelationModelName::Akkar {
            ensure!(
                self.correlation_table_file.is_some(),
                "The akkar correlation model requires `correlation_table_file`"
            );
        }

        check_sites(&self.sites)?;
        check_hazard_levels(&self.hazard_levels)?;
        check_rupture_parameters(&self.rupture)?;
        check_database_parameters(&self.database)?;
        check_selection_parameters(&self.selection)?;
        crate::gmpe::check_gmpe_name(&self.gmpe.name)?;

        Ok(())
    }

    /// Make relative paths relative to `base_dir`
    fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        };

        resolve(&mut self.hazard.results_dir);
        resolve(&mut self.gmpe.coefficients_file);
        resolve(&mut self.database.path);
        if let Some(path) = self.correlation_table_file.as_mut() {
            resolve(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::selection_error;
    use crate::fixture::{
        JOB_FILE_CONTENTS, assert_error, hazard_level, rupture_parameters, site_parameters,
    };
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    /// Write a job file with the given contents and read it back
    fn load(contents: &str) -> Result<JobParameters> {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("job.toml");
        {
            let mut file = File::create(&file_path).unwrap();
            write!(file, "{contents}").unwrap();
        }
        JobParameters::from_path(&file_path)
    }

    #[test]
    fn test_job_parameters_from_path() {
        let params = load(JOB_FILE_CONTENTS).unwrap();
        assert_eq!(
            params.intensity_measures,
            [IntensityMeasure::Sa(0.5), IntensityMeasure::AvgSa]
        );
        assert_eq!(params.correlation_model, CorrelationModelName::BakerJayaram);
        assert_eq!(params.sites.len(), 1);
        assert_eq!(params.selection.n_gm, 3);
        assert_eq!(params.selection.weights, MomentWeights::from([1.0, 2.0, 0.3]));
        assert_eq!(params.database.vs30_tolerance, 100.0);
        assert!(params.database.path.is_absolute());
    }

    #[test]
    fn test_job_parameters_invalid_is_configuration_error() {
        let contents = JOB_FILE_CONTENTS.replace("n_gm = 3", "n_gm = 0");
        let err = load(&contents).unwrap_err();
        assert!(matches!(
            selection_error(&err),
            Some(SelectionError::Configuration(_))
        ));
    }

    #[test]
    fn test_job_parameters_bad_syntax_is_configuration_error() {
        let err = load("not valid = = toml").unwrap_err();
        assert!(matches!(
            selection_error(&err),
            Some(SelectionError::Configuration(_))
        ));
    }

    #[test]
    fn test_job_parameters_unknown_gmpe() {
        let contents = JOB_FILE_CONTENTS.replace("coefficient_table", "NoSuchGmpe2099");
        let err = load(&contents).unwrap_err();
        assert!(matches!(
            selection_error(&err),
            Some(SelectionError::Configuration(_))
        ));
    }

    #[test]
    fn test_job_parameters_avg_sa_requires_avg_periods() {
        let contents = JOB_FILE_CONTENTS.replace("avg_periods = [0.2, 0.5, 1.0]\n", "");
        assert!(load(&contents).is_err());
    }

    #[rstest]
    #[case(Some(50.0), None, true)]
    #[case(None, Some(1), true)]
    #[case(None, Some(-1), true)]
    #[case(Some(50.0), Some(1), false)] // Conflicting
    #[case(None, None, false)] // Neither
    #[case(None, Some(2), false)] // Invalid flag
    fn test_check_rupture_parameters(
        mut rupture_parameters: RuptureParameters,
        #[case] azimuth: Option<f64>,
        #[case] flag: Option<i8>,
        #[case] expected_valid: bool,
    ) {
        rupture_parameters.azimuth = azimuth;
        rupture_parameters.hanging_wall_flag = flag;
        assert_eq!(
            check_rupture_parameters(&rupture_parameters).is_ok(),
            expected_valid
        );
    }

    #[test]
    fn test_parse_ec8_codes() {
        assert_eq!(
            parse_ec8_codes(&["A".into(), "B".into()]).unwrap(),
            Some(vec![Ec8Class::A, Ec8Class::B])
        );
        assert_eq!(parse_ec8_codes(&["All".into()]).unwrap(), None);
        assert!(parse_ec8_codes(&["Z".into()]).is_err());
    }

    #[rstest]
    #[case(0.1, true)]
    #[case(0.0, false)]
    #[case(1.0, false)]
    fn test_check_hazard_levels(#[case] poe: f64, #[case] expected_valid: bool) {
        let levels = [HazardLevel {
            poe_id: 0,
            probability_of_exceedance: poe,
            maxsf: 3.0,
            radius_dist: 50.0,
            radius_mag: 0.5,
        }];
        assert_eq!(check_hazard_levels(&levels).is_ok(), expected_valid);
    }

    #[rstest]
    fn test_check_hazard_levels_duplicate_poe_id(hazard_level: HazardLevel) {
        let levels = [hazard_level.clone(), hazard_level];
        assert_error!(
            check_hazard_levels(&levels),
            "`poe_id`s of hazard levels must be unique"
        );
    }

    #[rstest]
    fn test_check_sites_duplicate_id(site_parameters: SiteParameters) {
        let sites = [site_parameters.clone(), site_parameters];
        assert_error!(check_sites(&sites), "Site IDs must be unique");
    }

    #[test]
    fn test_validate_duplicate_intensity_measures() {
        let contents =
            JOB_FILE_CONTENTS.replace(r#"["SA(0.5)", "AvgSA"]"#, r#"["SA(0.5)", "SA(0.5)"]"#);
        let params: JobParameters = toml::from_str(&contents).unwrap();
        assert_error!(params.validate(), "`intensity_measures` contains duplicates");
    }
}
