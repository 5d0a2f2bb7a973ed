//! Initialisation of the GMPE context for a case.
//!
//! Rupture and site parameters not given in the job file are derived from the magnitude, rake
//! and Vs30 with the default policies below.
use crate::error::SelectionError;
use crate::gmpe::{DistanceContext, FaultingStyle, GmmContext, RuptureContext, SiteContext};
use crate::parameters::{RuptureParameters, SiteParameters, Vs30Type, check_rupture_parameters};
use anyhow::{Result, bail};

/// Default upper seismogenic depth (km)
const DEFAULT_UPPER_SD: f64 = 0.0;

/// Default lower seismogenic depth (km)
const DEFAULT_LOWER_SD: f64 = 20.0;

/// Azimuth (degrees) used for sites on the hanging wall (or, negated, the footwall)
const HANGING_WALL_AZIMUTH: f64 = 50.0;

/// Tolerance used when comparing angles (degrees)
const ANGLE_TOLERANCE: f64 = 1e-9;

/// Build the GMPE context for a rupture of magnitude `mag` at Joyner-Boore distance `rjb` (km)
pub fn build_gmm_context(
    rupture: &RuptureParameters,
    site: &SiteParameters,
    mag: f64,
    rjb: f64,
) -> Result<GmmContext> {
    check_rupture_parameters(rupture)
        .map_err(|err| SelectionError::Configuration(format!("{err:#}")))?;

    let style = FaultingStyle::from_rake(rupture.rake);
    let hypo_depth = rupture
        .hypo_depth
        .unwrap_or_else(|| default_hypo_depth(style, mag));
    let dip = rupture.dip.unwrap_or_else(|| default_dip(style));
    let upper_sd = rupture.upper_sd.unwrap_or(DEFAULT_UPPER_SD);
    let lower_sd = rupture.lower_sd.unwrap_or(DEFAULT_LOWER_SD);
    let width = rupture_width(mag, dip, upper_sd, lower_sd);
    let ztor = top_of_rupture_depth(hypo_depth, width, dip, upper_sd);

    let azimuth = match (rupture.azimuth, rupture.hanging_wall_flag) {
        (Some(azimuth), None) => azimuth,
        (None, Some(flag)) => f64::from(flag) * HANGING_WALL_AZIMUTH,
        _ => bail!(SelectionError::Configuration(
            "Exactly one of `azimuth` and `hanging_wall_flag` must be defined".into()
        )),
    };
    let rx = rx_from_rjb(rjb, azimuth, dip, width);
    let rrup = rrup_from_rjb(rjb, rx, azimuth, dip, width, ztor);

    Ok(GmmContext {
        rupture: RuptureContext {
            mag,
            rake: rupture.rake,
            hypo_depth,
            dip,
            ztor,
            width,
        },
        site: SiteContext {
            vs30: site.vs30,
            vs30_measured: site.vs30_type == Vs30Type::Measured,
            z1pt0: site.z1pt0.unwrap_or_else(|| z1pt0_from_vs30(site.vs30)),
            z2pt5: site.z2pt5.unwrap_or_else(|| z2pt5_from_vs30(site.vs30)),
        },
        distances: DistanceContext { rjb, rrup, rx },
    })
}

/// Default hypocentral depth (km) (Scherbaum et al. 2004)
pub fn default_hypo_depth(style: FaultingStyle, mag: f64) -> f64 {
    match style {
        FaultingStyle::StrikeSlip => 5.63 + 0.68 * mag,
        FaultingStyle::Normal | FaultingStyle::Reverse => 11.24 - 0.2 * mag,
    }
}

/// Default dip (degrees) for the style of faulting
pub fn default_dip(style: FaultingStyle) -> f64 {
    match style {
        FaultingStyle::StrikeSlip => 90.0,
        FaultingStyle::Normal => 50.0,
        FaultingStyle::Reverse => 40.0,
    }
}

/// Down-dip rupture width (km) from magnitude (Wells & Coppersmith 1994), limited by the thickness
/// of the seismogenic layer
pub fn rupture_width(mag: f64, dip: f64, upper_sd: f64, lower_sd: f64) -> f64 {
    let width = 10f64.powf(-1.01 + 0.32 * mag);
    width.min((lower_sd - upper_sd) / dip.to_radians().sin())
}

/// Depth to the top of the rupture (km), assuming the hypocentre is 60% of the way down-dip
pub fn top_of_rupture_depth(hypo_depth: f64, width: f64, dip: f64, upper_sd: f64) -> f64 {
    (hypo_depth - 0.6 * width * dip.to_radians().sin()).max(upper_sd)
}

/// Depth (m) to Vs = 1.0 km/s (Chiou & Youngs 2014, California model)
pub fn z1pt0_from_vs30(vs30: f64) -> f64 {
    (-7.15 / 4.0 * ((vs30.powi(4) + 571f64.powi(4)) / (1360f64.powi(4) + 571f64.powi(4))).ln()).exp()
}

/// Depth (km) to Vs = 2.5 km/s (Campbell & Bozorgnia 2014, California model)
pub fn z2pt5_from_vs30(vs30: f64) -> f64 {
    (7.089 - 1.144 * vs30.ln()).exp()
}

/// Normalise an angle (degrees) to [-180, 180)
fn normalise_azimuth(azimuth: f64) -> f64 {
    (azimuth + 180.0).rem_euclid(360.0) - 180.0
}

fn is_angle(value: f64, angle: f64) -> bool {
    (value - angle).abs() < ANGLE_TOLERANCE
}

/// Horizontal distance (km) to the surface projection of the top edge of the rupture, measured
/// perpendicular to strike (Kaklamanos et al. 2011). Negative on the footwall.
pub fn rx_from_rjb(rjb: f64, azimuth: f64, dip: f64, width: f64) -> f64 {
    let alpha = normalise_azimuth(azimuth);
    let alpha_rad = alpha.to_radians();
    let horizontal_width = width * dip.to_radians().cos();

    if is_angle(dip, 90.0) || alpha < 0.0 {
        return rjb * alpha_rad.sin();
    }

    if is_angle(alpha, 90.0) {
        return if rjb > 0.0 {
            rjb + horizontal_width
        } else {
            0.5 * horizontal_width
        };
    }

    let tan_alpha = alpha_rad.tan();
    if rjb * tan_alpha.abs() <= horizontal_width {
        rjb * tan_alpha.abs()
    } else {
        rjb * tan_alpha * (alpha_rad - (horizontal_width * alpha_rad.cos() / rjb).asin()).cos()
    }
}

/// Closest distance (km) to the rupture plane (Kaklamanos et al. 2011)
pub fn rrup_from_rjb(rjb: f64, rx: f64, azimuth: f64, dip: f64, width: f64, ztor: f64) -> f64 {
    if is_angle(dip, 90.0) {
        return rjb.hypot(ztor);
    }

    let dip_rad = dip.to_radians();
    let rrup_prime = if rx < ztor * dip_rad.tan() {
        rx.hypot(ztor)
    } else if rx <= ztor * dip_rad.tan() + width / dip_rad.cos() {
        rx * dip_rad.sin() + ztor * dip_rad.cos()
    } else {
        (rx - width * dip_rad.cos()).hypot(ztor + width * dip_rad.sin())
    };

    let alpha = normalise_azimuth(azimuth);
    let ry = if is_angle(alpha.abs(), 90.0) {
        0.0
    } else if is_angle(alpha, 0.0) || is_angle(alpha.abs(), 180.0) {
        rjb
    } else {
        (rx / alpha.to_radians().tan()).abs()
    };

    rrup_prime.hypot(ry)
}
