//! Physical constants and model parameters
//!
//! Two parameter sets are used throughout the crate:
//!
//! - [`CoreConst`]: physical constants and the coefficients of the water density
//!   and viscosity equations.
//! - [`PModelConst`]: parameters of the photosynthesis sub-models (enzyme kinetics,
//!   temperature responses, cost ratios, soil moisture stress).
//!
//! Both provide defaults matching the published parameterisations and can be
//! partially overridden from TOML, with missing keys falling back to the defaults:
//!
//! ```rust
//! use rspm_core::constants::{load_toml, PModelConst};
//!
//! let consts: PModelConst = load_toml("plant_t_ref = 20.0").unwrap();
//! assert_eq!(consts.plant_t_ref, 20.0);
//! assert_eq!(consts.wang17_c, 0.41);
//! ```

use crate::errors::RSPMResult;
use crate::timeseries::FloatValue;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Parse a parameter struct from a TOML document.
pub fn load_toml<T: DeserializeOwned>(source: &str) -> RSPMResult<T> {
    Ok(toml::from_str(source)?)
}

/// Method used to calculate the density of water
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterDensityMethod {
    /// Tumlirz equation with the Fisher and Dial (1975) coefficients
    Fisher,
    /// Chen et al. (2008)
    Chen,
}

/// Physical constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConst {
    /// Universal gas constant
    /// unit: J / mol / K
    pub k_r: FloatValue,
    /// Standard O2 concentration
    /// unit: ppm
    pub k_co: FloatValue,
    /// Molecular mass of carbon
    /// unit: g / mol
    pub k_c_molmass: FloatValue,
    /// Standard atmospheric pressure
    /// unit: Pa
    pub k_po: FloatValue,
    /// Standard reference temperature
    /// unit: K
    pub k_to: FloatValue,
    /// Conversion from °C to K
    pub k_ctok: FloatValue,
    /// Molecular mass of water
    /// unit: g / mol
    pub k_water_molmass: FloatValue,

    pub water_density_method: WaterDensityMethod,
    /// Use the simple exponential viscosity approximation instead of Huber et al. (2009)
    pub simple_viscosity: bool,

    /// Fisher and Dial (1975) polynomial coefficients for lambda, lowest order first
    pub fisher_dial_lambda: Vec<FloatValue>,
    /// Fisher and Dial (1975) polynomial coefficients for Po
    pub fisher_dial_po: Vec<FloatValue>,
    /// Fisher and Dial (1975) polynomial coefficients for Vinf
    pub fisher_dial_vinf: Vec<FloatValue>,

    /// Chen et al. (2008) coefficients for density at 1 atm
    pub chen_po: Vec<FloatValue>,
    /// Chen et al. (2008) coefficients for the bulk modulus at 1 atm
    pub chen_ko: Vec<FloatValue>,
    pub chen_ca: Vec<FloatValue>,
    pub chen_cb: Vec<FloatValue>,

    /// Huber et al. (2009) reference temperature
    /// unit: K
    pub huber_tk_ast: FloatValue,
    /// Huber et al. (2009) reference density
    /// unit: kg / m^3
    pub huber_rho_ast: FloatValue,
    /// Huber et al. (2009) reference viscosity
    /// unit: Pa s
    pub huber_mu_ast: FloatValue,
    /// Huber et al. (2009) Table 2 coefficients
    pub huber_h_i: [FloatValue; 4],
    /// Huber et al. (2009) Table 3 coefficients, indexed `[density power][temperature power]`
    pub huber_h_ij: [[FloatValue; 6]; 7],
}

impl Default for CoreConst {
    fn default() -> Self {
        Self {
            k_r: 8.3145,
            k_co: 209476.0,
            k_c_molmass: 12.0107,
            k_po: 101325.0,
            k_to: 298.15,
            k_ctok: 273.15,
            k_water_molmass: 18.01528,
            water_density_method: WaterDensityMethod::Fisher,
            simple_viscosity: false,
            fisher_dial_lambda: vec![
                1788.316,
                21.55053,
                -0.4695911,
                0.003096363,
                -7.341182e-06,
            ],
            fisher_dial_po: vec![
                5918.499,
                58.05267,
                -1.1253317,
                0.0066123869,
                -1.4661625e-05,
            ],
            fisher_dial_vinf: vec![
                0.6980547,
                -0.0007435626,
                3.704258e-05,
                -6.315724e-07,
                9.829576e-09,
                -1.197269e-10,
                1.005461e-12,
                -5.437898e-15,
                1.69946e-17,
                -2.295063e-20,
            ],
            chen_po: vec![
                0.99983952,
                6.788260e-5,
                -9.08659e-6,
                1.022130e-7,
                -1.35439e-9,
                1.471150e-11,
                -1.11663e-13,
                5.044070e-16,
                -1.00659e-18,
            ],
            chen_ko: vec![
                19652.17,
                148.1830,
                -2.29995,
                0.01281,
                -4.91564e-5,
                1.035530e-7,
            ],
            chen_ca: vec![3.26138, 5.223e-4, 1.324e-4, -7.655e-7, 8.584e-10],
            chen_cb: vec![7.2061e-5, -5.8948e-6, 8.69900e-8, -1.0100e-9, 4.3220e-12],
            huber_tk_ast: 647.096,
            huber_rho_ast: 322.0,
            huber_mu_ast: 1e-6,
            huber_h_i: [1.67752, 2.20462, 0.6366564, -0.241605],
            huber_h_ij: [
                [0.520094, 0.0850895, -1.08374, -0.289555, 0.0, 0.0],
                [0.222531, 0.999115, 1.88797, 1.26613, 0.0, 0.120573],
                [-0.281378, -0.906851, -0.772479, -0.489837, -0.25704, 0.0],
                [0.161913, 0.257399, 0.0, 0.0, 0.0, 0.0],
                [-0.0325372, 0.0, 0.0, 0.0698452, 0.0, 0.0],
                [0.0, 0.0, 0.0, 0.0, 0.00872102, 0.0],
                [0.0, 0.0, 0.0, -0.00435673, 0.0, -0.000593264],
            ],
        }
    }
}

/// Coefficients for the simple Arrhenius response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleArrheniusCoefficients {
    /// Activation energy
    /// unit: J / mol
    pub ha: FloatValue,
}

/// Coefficients for the peaked Arrhenius response of Kattge and Knorr (2007)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KattgeKnorrCoefficients {
    /// Activation energy
    /// unit: J / mol
    pub ha: FloatValue,
    /// Deactivation energy
    /// unit: J / mol
    pub hd: FloatValue,
    /// Intercept of the entropy relationship with growth temperature
    /// unit: J / mol / K
    pub entropy_intercept: FloatValue,
    /// Slope of the entropy relationship with growth temperature
    /// unit: J / mol / K^2
    pub entropy_slope: FloatValue,
}

/// Temperature response coefficients for one enzyme rate, one entry per
/// Arrhenius method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrheniusCoefficients {
    pub simple: SimpleArrheniusCoefficients,
    pub kattge_knorr: KattgeKnorrCoefficients,
}

/// Parameters of the photosynthesis sub-models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PModelConst {
    /// Reference temperature for photosynthetic capacities
    /// unit: °C
    /// default: 25.0
    pub plant_t_ref: FloatValue,

    /// Heskel et al. (2016) dark respiration temperature coefficients
    pub heskel_b: FloatValue,
    pub heskel_c: FloatValue,

    /// Quadratic temperature dependence of quantum yield for C3 plants
    /// (Bernacchi et al. 2003), lowest order first
    pub kphio_c3: [FloatValue; 3],
    /// Quadratic temperature dependence of quantum yield for C4 plants (Cai and
    /// Prentice 2020)
    pub kphio_c4: [FloatValue; 3],

    /// Activation energy of Kc
    /// unit: J / mol
    pub bernacchi_dhac: FloatValue,
    /// Activation energy of Ko
    /// unit: J / mol
    pub bernacchi_dhao: FloatValue,
    /// Activation energy of the CO2 compensation point
    /// unit: J / mol
    pub bernacchi_dha: FloatValue,
    /// Michaelis constant for CO2 at the reference temperature
    /// unit: Pa
    pub bernacchi_kc25: FloatValue,
    /// Michaelis constant for O2 at the reference temperature
    /// unit: Pa
    pub bernacchi_ko25: FloatValue,
    /// CO2 compensation point at the reference temperature and standard pressure
    /// unit: Pa
    pub bernacchi_gs25_0: FloatValue,

    /// Michaelis constant of PEPc at the reference temperature (Boyd et al. 2015)
    /// unit: Pa
    pub boyd_kp25_c4: FloatValue,
    /// Activation energy of the PEPc Michaelis constant
    /// unit: J / mol
    pub boyd_dhac_c4: FloatValue,

    /// Stocker et al. (2020) soil moisture stress parameters
    pub soilmstress_theta0: FloatValue,
    pub soilmstress_thetastar: FloatValue,
    pub soilmstress_a: FloatValue,
    pub soilmstress_b: FloatValue,

    /// Mengoli et al. (2023) soil moisture stress parameters
    pub soilm_mengoli_y_a: FloatValue,
    pub soilm_mengoli_y_b: FloatValue,
    pub soilm_mengoli_psi_a: FloatValue,
    pub soilm_mengoli_psi_b: FloatValue,

    /// Unit cost ratio of carboxylation to transpiration for C3 plants
    /// default: 146.0
    pub beta_cost_ratio_prentice14: FloatValue,
    /// Unit cost ratio for C4 plants
    /// default: 146.0 / 9
    pub beta_cost_ratio_c4: FloatValue,
    /// Lavergne et al. (2020) soil moisture response of beta: ln(beta) = b theta + a
    pub lavergne_2020_b_c3: FloatValue,
    pub lavergne_2020_a_c3: FloatValue,

    /// Wang et al. (2017) cost of electron transport capacity
    pub wang17_c: FloatValue,
    /// Smith et al. (2019) curvature of the light response
    pub smith19_theta: FloatValue,
    /// Smith et al. (2019) cost of electron transport capacity
    pub smith19_c_cost: FloatValue,

    /// Temperature response of Vcmax
    pub arrhenius_vcmax: ArrheniusCoefficients,
    /// Temperature response of Jmax
    pub arrhenius_jmax: ArrheniusCoefficients,
}

impl Default for PModelConst {
    fn default() -> Self {
        Self {
            plant_t_ref: 25.0,
            heskel_b: 0.1012,
            heskel_c: 0.0005,
            kphio_c3: [0.352, 0.022, -0.00034],
            kphio_c4: [-0.064, 0.03, -0.000464],
            bernacchi_dhac: 79430.0,
            bernacchi_dhao: 36380.0,
            bernacchi_dha: 37830.0,
            bernacchi_kc25: 39.97,
            bernacchi_ko25: 27480.0,
            bernacchi_gs25_0: 4.332,
            boyd_kp25_c4: 16.0,
            boyd_dhac_c4: 36300.0,
            soilmstress_theta0: 0.0,
            soilmstress_thetastar: 0.6,
            soilmstress_a: 0.0,
            soilmstress_b: 0.733,
            soilm_mengoli_y_a: 0.62,
            soilm_mengoli_y_b: -0.45,
            soilm_mengoli_psi_a: 0.34,
            soilm_mengoli_psi_b: 0.60,
            beta_cost_ratio_prentice14: 146.0,
            beta_cost_ratio_c4: 146.0 / 9.0,
            lavergne_2020_b_c3: 1.73,
            lavergne_2020_a_c3: 4.55,
            wang17_c: 0.41,
            smith19_theta: 0.85,
            smith19_c_cost: 0.05336251,
            arrhenius_vcmax: ArrheniusCoefficients {
                simple: SimpleArrheniusCoefficients { ha: 65330.0 },
                kattge_knorr: KattgeKnorrCoefficients {
                    ha: 71513.0,
                    hd: 200000.0,
                    entropy_intercept: 668.39,
                    entropy_slope: -1.07,
                },
            },
            arrhenius_jmax: ArrheniusCoefficients {
                simple: SimpleArrheniusCoefficients { ha: 43900.0 },
                kattge_knorr: KattgeKnorrCoefficients {
                    ha: 49884.0,
                    hd: 200000.0,
                    entropy_intercept: 659.7,
                    entropy_slope: -0.75,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RSPMError;

    #[test]
    fn test_partial_override_keeps_defaults() {
        let consts: CoreConst = load_toml(
            r#"
            k_c_molmass = 12.0
            water_density_method = "chen"
            "#,
        )
        .unwrap();

        assert_eq!(consts.k_c_molmass, 12.0);
        assert_eq!(consts.water_density_method, WaterDensityMethod::Chen);
        assert_eq!(consts.k_po, CoreConst::default().k_po);
    }

    #[test]
    fn test_nested_arrhenius_override() {
        let consts: PModelConst = load_toml(
            r#"
            [arrhenius_vcmax.simple]
            ha = 60000.0

            [arrhenius_vcmax.kattge_knorr]
            ha = 71513.0
            hd = 200000.0
            entropy_intercept = 668.39
            entropy_slope = -1.07
            "#,
        )
        .unwrap();

        assert_eq!(consts.arrhenius_vcmax.simple.ha, 60000.0);
        assert_eq!(
            consts.arrhenius_jmax,
            PModelConst::default().arrhenius_jmax
        );
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result: RSPMResult<PModelConst> = load_toml("plant_t_ref = \"warm\"");
        assert!(matches!(result, Err(RSPMError::Config(_))));
    }

    #[test]
    fn test_round_trip_json() {
        let consts = PModelConst::default();
        let serialised = serde_json::to_string(&consts).unwrap();
        let deserialised: PModelConst = serde_json::from_str(&serialised).unwrap();
        assert_eq!(consts, deserialised);
    }
}
