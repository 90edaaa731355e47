//! Elementary photosynthesis functions
//!
//! Temperature and pressure dependencies shared by the daily optimality model and the
//! subdaily acclimation pipeline. Functions of two variables broadcast 0-d arrays
//! (see [`crate::timeseries::scalar`]) and otherwise require matching shapes.

use crate::constants::{CoreConst, PModelConst};
use crate::errors::RSPMResult;
use crate::timeseries::{zip_map2, FloatValue, Series};
use crate::water::viscosity_h2o;

fn simple_arrhenius(
    tk: FloatValue,
    tk_ref: FloatValue,
    ha: FloatValue,
    k_r: FloatValue,
) -> FloatValue {
    (ha * (tk - tk_ref) / (tk_ref * k_r * tk)).exp()
}

/// Arrhenius scaling factor relative to a reference temperature.
///
/// # Arguments
///
/// * `tk` - Temperature (K)
/// * `tk_ref` - Reference temperature (K)
/// * `ha` - Activation energy (J / mol)
pub fn simple_arrhenius_factor(
    tk: &Series,
    tk_ref: FloatValue,
    ha: FloatValue,
    core_const: &CoreConst,
) -> Series {
    tk.mapv(|t| simple_arrhenius(t, tk_ref, ha, core_const.k_r))
}

/// Peaked Arrhenius scaling factor of Kattge and Knorr (2007).
///
/// The deactivation term depends on an entropy factor that varies linearly with the
/// growth temperature of the plant.
///
/// # Arguments
///
/// * `tk_leaf` - Leaf temperature (K)
/// * `tk_ref` - Reference temperature (K)
/// * `tc_growth` - Mean growth temperature (°C)
#[allow(clippy::too_many_arguments)]
pub fn kattge_knorr_arrhenius_factor(
    tk_leaf: &Series,
    tk_ref: FloatValue,
    tc_growth: &Series,
    ha: FloatValue,
    hd: FloatValue,
    entropy_intercept: FloatValue,
    entropy_slope: FloatValue,
    core_const: &CoreConst,
) -> RSPMResult<Series> {
    let k_r = core_const.k_r;
    zip_map2(tk_leaf, tc_growth, |tk, tc_growth| {
        let entropy = entropy_intercept + entropy_slope * tc_growth;
        let fva = simple_arrhenius(tk, tk_ref, ha, k_r);
        let fvb = (1.0 + ((tk_ref * entropy - hd) / (k_r * tk_ref)).exp())
            / (1.0 + ((tk * entropy - hd) / (k_r * tk)).exp());
        fva * fvb
    })
}

/// Instantaneous temperature scaling of dark respiration (Heskel et al. 2016)
pub fn ftemp_inst_rd(tc: &Series, pmodel_const: &PModelConst) -> Series {
    let t_ref = pmodel_const.plant_t_ref;
    tc.mapv(|t| {
        (pmodel_const.heskel_b * (t - t_ref) - pmodel_const.heskel_c * (t.powi(2) - t_ref.powi(2)))
            .exp()
    })
}

/// Temperature dependence of the quantum yield efficiency.
///
/// A quadratic in temperature, clipped at zero.
pub fn ftemp_kphio(tc: &Series, c4: bool, pmodel_const: &PModelConst) -> Series {
    let coef = if c4 {
        pmodel_const.kphio_c4
    } else {
        pmodel_const.kphio_c3
    };
    tc.mapv(|t| (coef[0] + coef[1] * t + coef[2] * t.powi(2)).max(0.0))
}

/// Photorespiratory CO2 compensation point, Γ* (Pa)
///
/// Scales with the ratio of atmospheric pressure to standard pressure.
pub fn gammastar(
    tc: &Series,
    patm: &Series,
    pmodel_const: &PModelConst,
    core_const: &CoreConst,
) -> RSPMResult<Series> {
    let tk_ref = pmodel_const.plant_t_ref + core_const.k_ctok;
    zip_map2(tc, patm, |t, p| {
        pmodel_const.bernacchi_gs25_0 * p / core_const.k_po
            * simple_arrhenius(
                t + core_const.k_ctok,
                tk_ref,
                pmodel_const.bernacchi_dha,
                core_const.k_r,
            )
    })
}

/// Viscosity of water relative to its value at standard temperature and pressure
pub fn ns_star(tc: &Series, patm: &Series, core_const: &CoreConst) -> RSPMResult<Series> {
    let visc_env = viscosity_h2o(tc, patm, core_const)?;
    let visc_std = viscosity_h2o(
        &crate::timeseries::scalar(core_const.k_to - core_const.k_ctok),
        &crate::timeseries::scalar(core_const.k_po),
        core_const,
    )?;
    zip_map2(&visc_env, &visc_std, |env, std| env / std)
}

/// Michaelis-Menten coefficient of Rubisco-limited assimilation, K (Pa)
///
/// Uses the absolute O2 partial pressure, `k_co * 1e-6 * patm`.
pub fn kmm(
    tc: &Series,
    patm: &Series,
    pmodel_const: &PModelConst,
    core_const: &CoreConst,
) -> RSPMResult<Series> {
    let tk_ref = pmodel_const.plant_t_ref + core_const.k_ctok;
    zip_map2(tc, patm, |t, p| {
        let tk = t + core_const.k_ctok;
        let kc = pmodel_const.bernacchi_kc25
            * simple_arrhenius(tk, tk_ref, pmodel_const.bernacchi_dhac, core_const.k_r);
        let ko = pmodel_const.bernacchi_ko25
            * simple_arrhenius(tk, tk_ref, pmodel_const.bernacchi_dhao, core_const.k_r);
        let po = core_const.k_co * 1e-6 * p;
        kc * (1.0 + po / ko)
    })
}

/// Michaelis constant of PEP carboxylase for C4 plants (Pa), Boyd et al. (2015)
pub fn kp_c4(tc: &Series, pmodel_const: &PModelConst, core_const: &CoreConst) -> Series {
    let tk_ref = pmodel_const.plant_t_ref + core_const.k_ctok;
    tc.mapv(|t| {
        pmodel_const.boyd_kp25_c4
            * simple_arrhenius(
                t + core_const.k_ctok,
                tk_ref,
                pmodel_const.boyd_dhac_c4,
                core_const.k_r,
            )
    })
}

/// Empirical soil moisture stress factor of Stocker et al. (2020)
///
/// # Arguments
///
/// * `soilm` - Relative soil moisture, as a fraction of field capacity
/// * `meanalpha` - Local annual mean ratio of actual to potential evapotranspiration
pub fn soilmstress_stocker(
    soilm: &Series,
    meanalpha: &Series,
    pmodel_const: &PModelConst,
) -> RSPMResult<Series> {
    let thetastar = pmodel_const.soilmstress_thetastar;
    zip_map2(soilm, meanalpha, |theta, alpha| {
        if theta > thetastar {
            return 1.0;
        }
        let y0 = pmodel_const.soilmstress_a + pmodel_const.soilmstress_b * alpha;
        let beta = (1.0 - y0) / (pmodel_const.soilmstress_theta0 - thetastar).powi(2);
        (1.0 - beta * (theta - thetastar).powi(2)).clamp(0.0, 1.0)
    })
}

/// Soil moisture stress factor of Mengoli et al. (2023)
///
/// The plateau and the threshold of the response both depend on the aridity index.
pub fn soilmstress_mengoli(
    soilm: &Series,
    aridity_index: &Series,
    pmodel_const: &PModelConst,
) -> RSPMResult<Series> {
    zip_map2(soilm, aridity_index, |theta, ai| {
        let y = (pmodel_const.soilm_mengoli_y_a * ai.powf(pmodel_const.soilm_mengoli_y_b)).min(1.0);
        let psi =
            (pmodel_const.soilm_mengoli_psi_a * ai.powf(pmodel_const.soilm_mengoli_psi_b)).min(1.0);
        if theta >= psi {
            y
        } else {
            y / psi * theta
        }
    })
}

/// Convert a CO2 concentration (ppm) into a partial pressure (Pa)
pub fn co2_to_ca(co2: &Series, patm: &Series) -> RSPMResult<Series> {
    zip_map2(co2, patm, |c, p| 1.0e-6 * c * p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::scalar;
    use approx::assert_relative_eq;
    use is_close::is_close;
    use ndarray::array;

    fn defaults() -> (PModelConst, CoreConst) {
        (PModelConst::default(), CoreConst::default())
    }

    #[test]
    fn test_simple_arrhenius_is_one_at_reference() {
        let core = CoreConst::default();
        let factor = simple_arrhenius_factor(&scalar(298.15), 298.15, 100000.0, &core);
        assert_eq!(factor.sum(), 1.0);

        let colder = simple_arrhenius_factor(&scalar(283.15), 298.15, 100000.0, &core);
        assert!(colder.sum() < 1.0);
    }

    #[test]
    fn test_kattge_knorr() {
        let (pmodel, core) = defaults();
        let coef = &pmodel.arrhenius_vcmax.kattge_knorr;
        let factor = kattge_knorr_arrhenius_factor(
            &scalar(283.15),
            298.15,
            &scalar(10.0),
            coef.ha,
            coef.hd,
            coef.entropy_intercept,
            coef.entropy_slope,
            &core,
        )
        .unwrap();
        assert_relative_eq!(factor.sum(), 0.261, epsilon = 1e-3);
    }

    #[test]
    fn test_ftemp_inst_rd() {
        let (pmodel, _) = defaults();
        let value = ftemp_inst_rd(&scalar(30.0), &pmodel);
        assert!(is_close!(value.sum(), 1.4455646406287255));
    }

    #[test]
    fn test_ftemp_kphio() {
        let (pmodel, _) = defaults();
        let tc = array![5.0, 25.0].into_dyn();

        // Percentage increase from 5 °C to 25 °C
        let c3 = ftemp_kphio(&tc, false, &pmodel);
        assert_relative_eq!((c3[[1]] / c3[[0]] - 1.0) * 100.0, 52.03969, epsilon = 1e-4);

        let c4 = ftemp_kphio(&tc, true, &pmodel);
        assert_relative_eq!((c4[[1]] / c4[[0]] - 1.0) * 100.0, 432.25806, epsilon = 1e-4);
    }

    #[test]
    fn test_ftemp_kphio_clipped() {
        let (pmodel, _) = defaults();
        let value = ftemp_kphio(&scalar(-10.0), true, &pmodel);
        assert_eq!(value.sum(), 0.0);
    }

    #[test]
    fn test_gammastar() {
        let (pmodel, core) = defaults();
        let value = gammastar(&scalar(30.0), &scalar(123456.0), &pmodel, &core).unwrap();
        assert!(is_close!(value.sum(), 6.7888247955597));
    }

    #[test]
    fn test_ns_star() {
        let (_, core) = defaults();
        let value = ns_star(&scalar(30.0), &scalar(123456.0), &core).unwrap();
        assert_relative_eq!(value.sum(), 0.8957314409463492, max_relative = 1e-9);

        let standard = ns_star(&scalar(25.0), &scalar(101325.0), &core).unwrap();
        assert_eq!(standard.sum(), 1.0);
    }

    #[test]
    fn test_kmm() {
        let (pmodel, core) = defaults();
        let value = kmm(&scalar(30.0), &scalar(123456.0), &pmodel, &core).unwrap();
        assert!(is_close!(value.sum(), 117.8937532160903));

        let standard = kmm(&scalar(20.0), &scalar(101325.0), &pmodel, &core).unwrap();
        assert_relative_eq!(standard.sum(), 46.09928, epsilon = 1e-4);
    }

    #[test]
    fn test_kp_c4() {
        let (pmodel, core) = defaults();
        let value = kp_c4(&scalar(20.0), &pmodel, &core);
        assert_relative_eq!(value.sum(), 12.46385, epsilon = 1e-4);
    }

    #[test]
    fn test_soilmstress_stocker() {
        let (pmodel, _) = defaults();
        let soilm = array![0.2, 0.3, 0.7].into_dyn();
        let value = soilmstress_stocker(&soilm, &scalar(1.0), &pmodel).unwrap();

        assert_relative_eq!(value[[0]], 0.88133, epsilon = 1e-5);
        assert_relative_eq!(value[[1]], 0.93325, epsilon = 1e-5);
        assert_eq!(value[[2]], 1.0);
    }

    #[test]
    fn test_soilmstress_mengoli() {
        let (pmodel, _) = defaults();
        let dry = soilmstress_mengoli(&scalar(0.3), &scalar(1.0), &pmodel).unwrap();
        assert_relative_eq!(dry.sum(), 0.54705882, epsilon = 1e-6);

        let wet = soilmstress_mengoli(&scalar(0.6), &scalar(0.6), &pmodel).unwrap();
        assert_relative_eq!(wet.sum(), 0.78023, epsilon = 1e-4);
    }

    #[test]
    fn test_co2_to_ca() {
        let value = co2_to_ca(&scalar(400.0), &scalar(123456.0)).unwrap();
        assert_relative_eq!(value.sum(), 49.3824, epsilon = 1e-9);

        let value = co2_to_ca(&scalar(413.03), &scalar(101325.0)).unwrap();
        assert_relative_eq!(value.sum(), 41.850265, epsilon = 1e-6);
    }

    #[test]
    fn test_binary_functions_check_shapes() {
        let (pmodel, core) = defaults();
        let tc = array![20.0, 21.0, 22.0].into_dyn();
        let patm = array![101325.0, 101325.0].into_dyn();
        assert!(gammastar(&tc, &patm, &pmodel, &core).is_err());
        assert!(kmm(&tc, &patm, &pmodel, &core).is_err());
        assert!(co2_to_ca(&tc, &patm).is_err());
    }
}
