//! Density and viscosity of water
//!
//! The viscosity of water relative to its value at standard conditions scales the
//! cost of transpiration in the optimal χ models.
//!
//! # Methods
//!
//! Density follows either the Tumlirz equation with the coefficients of
//! Fisher and Dial (1975) or the formulation of Chen et al. (2008), selected by
//! [`CoreConst::water_density_method`]. Viscosity follows Huber et al. (2009).
//!
//! Both density formulations are numerically unstable at very low temperatures, so
//! [`density_h2o`] refuses temperatures below -30 °C.

use crate::constants::{CoreConst, WaterDensityMethod};
use crate::errors::{RSPMError, RSPMResult};
use crate::timeseries::{zip_map2, FloatValue, Series};

const MIN_SAFE_TEMPERATURE: FloatValue = -30.0;

/// Evaluate a polynomial using Horner's method.
///
/// Coefficients are ordered from the constant term upwards.
pub fn evaluate_horner_polynomial(x: FloatValue, coefficients: &[FloatValue]) -> FloatValue {
    coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, coefficient| acc * x + coefficient)
}

fn density_fisher_kernel(tc: FloatValue, patm: FloatValue, consts: &CoreConst) -> FloatValue {
    // lambda (bar cm^3 / g), po (bar), vinf (cm^3 / g)
    let lambda = evaluate_horner_polynomial(tc, &consts.fisher_dial_lambda);
    let po = evaluate_horner_polynomial(tc, &consts.fisher_dial_po);
    let vinf = evaluate_horner_polynomial(tc, &consts.fisher_dial_vinf);

    let pbar = 1e-5 * patm;
    let specific_volume = vinf + lambda / (po + pbar);
    1e3 / specific_volume
}

fn density_chen_kernel(tc: FloatValue, patm: FloatValue, consts: &CoreConst) -> FloatValue {
    let po = evaluate_horner_polynomial(tc, &consts.chen_po);
    let ko = evaluate_horner_polynomial(tc, &consts.chen_ko);
    let ca = evaluate_horner_polynomial(tc, &consts.chen_ca);
    let cb = evaluate_horner_polynomial(tc, &consts.chen_cb);

    let pbar = 1e-5 * patm;
    let bulk = ko + ca * pbar + cb * pbar.powi(2);
    bulk / (bulk - pbar) * 1e3 * po
}

fn viscosity_kernel(tc: FloatValue, rho: FloatValue, consts: &CoreConst) -> FloatValue {
    let tbar = (tc + consts.k_ctok) / consts.huber_tk_ast;
    let rbar = rho / consts.huber_rho_ast;

    // Eq. 11 and Table 2
    let mu0_denominator: FloatValue = consts
        .huber_h_i
        .iter()
        .enumerate()
        .map(|(i, h)| h / tbar.powi(i as i32))
        .sum();
    let mu0 = 1e2 * tbar.sqrt() / mu0_denominator;

    // Eq. 12 and Table 3
    let ctbar = 1.0 / tbar - 1.0;
    let n_temperature_terms = consts.huber_h_ij[0].len();
    let mut mu1 = 0.0;
    for i in 0..n_temperature_terms {
        let density_sum: FloatValue = consts
            .huber_h_ij
            .iter()
            .enumerate()
            .map(|(j, row)| row[i] * (rbar - 1.0).powi(j as i32))
            .sum();
        mu1 += ctbar.powi(i as i32) * density_sum;
    }
    let mu1 = (rbar * mu1).exp();

    mu0 * mu1 * consts.huber_mu_ast
}

/// Density of water (kg / m^3) following Fisher and Dial (1975)
///
/// # Arguments
///
/// * `tc` - Air temperature (°C)
/// * `patm` - Atmospheric pressure (Pa)
pub fn density_h2o_fisher(tc: &Series, patm: &Series, consts: &CoreConst) -> RSPMResult<Series> {
    zip_map2(tc, patm, |t, p| density_fisher_kernel(t, p, consts))
}

/// Density of water (kg / m^3) following Chen et al. (2008)
pub fn density_h2o_chen(tc: &Series, patm: &Series, consts: &CoreConst) -> RSPMResult<Series> {
    zip_map2(tc, patm, |t, p| density_chen_kernel(t, p, consts))
}

/// Density of water (kg / m^3) using the method configured in `consts`.
///
/// Fails with [`RSPMError::InvalidInput`] if any temperature is below -30 °C.
pub fn density_h2o(tc: &Series, patm: &Series, consts: &CoreConst) -> RSPMResult<Series> {
    let min_temperature = tc
        .iter()
        .filter(|v| !v.is_nan())
        .fold(FloatValue::INFINITY, |acc, &v| acc.min(v));
    if min_temperature < MIN_SAFE_TEMPERATURE {
        return Err(RSPMError::InvalidInput(format!(
            "water density calculations below {} °C are unstable (minimum temperature {})",
            MIN_SAFE_TEMPERATURE, min_temperature
        )));
    }

    match consts.water_density_method {
        WaterDensityMethod::Fisher => density_h2o_fisher(tc, patm, consts),
        WaterDensityMethod::Chen => density_h2o_chen(tc, patm, consts),
    }
}

/// Viscosity of water (Pa s) following Huber et al. (2009)
///
/// When [`CoreConst::simple_viscosity`] is set an exponential approximation is used
/// instead. It is independent of pressure and returns values in mPa s, so it is
/// only meaningful in ratios such as [`crate::functions::ns_star`].
///
/// # Examples
///
/// ```rust
/// use rspm_core::constants::CoreConst;
/// use rspm_core::timeseries::scalar;
/// use rspm_core::water::viscosity_h2o;
///
/// let mu = viscosity_h2o(&scalar(20.0), &scalar(101325.0), &CoreConst::default()).unwrap();
/// assert!((mu.sum() - 0.0010016).abs() < 1e-7);
/// ```
pub fn viscosity_h2o(tc: &Series, patm: &Series, consts: &CoreConst) -> RSPMResult<Series> {
    if consts.simple_viscosity {
        return zip_map2(tc, patm, |t, _| {
            (-3.719 + 580.0 / ((t + 273.0) - 138.0)).exp()
        });
    }

    let rho = density_h2o(tc, patm, consts)?;
    zip_map2(tc, &rho, |t, r| viscosity_kernel(t, r, consts))
}
