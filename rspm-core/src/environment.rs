//! Photosynthetic environment
//!
//! A [`PModelEnvironment`] bundles the forcing variables with the quantities derived
//! from them (CO2 partial pressure, Γ*, K, η* and the C4 PEPc constant). It is
//! constructed through an [`EnvironmentBuilder`], which checks that every supplied
//! variable has the same shape before deriving anything.
//!
//! ```rust
//! use ndarray::array;
//! use rspm_core::environment::{EnvironmentBuilder, EnvVar};
//!
//! let env = EnvironmentBuilder::new(
//!     array![20.0, 25.0].into_dyn(),
//!     array![1000.0, 1200.0].into_dyn(),
//!     array![400.0, 400.0].into_dyn(),
//!     array![101325.0, 101325.0].into_dyn(),
//! )
//! .build()
//! .unwrap();
//!
//! assert!(env.get(EnvVar::Theta).is_none());
//! assert_eq!(env.ca.shape(), &[2]);
//! ```

use crate::constants::{CoreConst, PModelConst};
use crate::errors::{RSPMError, RSPMResult};
use crate::functions::{co2_to_ca, gammastar, kmm, kp_c4, ns_star};
use crate::timeseries::Series;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Forcing variables that models may require from an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvVar {
    Tc,
    Vpd,
    Co2,
    Patm,
    Theta,
    MeanGrowthTemperature,
    AridityIndex,
}

impl EnvVar {
    pub fn name(&self) -> &'static str {
        match self {
            EnvVar::Tc => "tc",
            EnvVar::Vpd => "vpd",
            EnvVar::Co2 => "co2",
            EnvVar::Patm => "patm",
            EnvVar::Theta => "theta",
            EnvVar::MeanGrowthTemperature => "mean_growth_temperature",
            EnvVar::AridityIndex => "aridity_index",
        }
    }
}

impl fmt::Display for EnvVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Forcing variables and derived photosynthetic parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PModelEnvironment {
    /// Air temperature
    /// unit: °C
    pub tc: Series,
    /// Vapour pressure deficit
    /// unit: Pa
    pub vpd: Series,
    /// Atmospheric CO2 concentration
    /// unit: ppm
    pub co2: Series,
    /// Atmospheric pressure
    /// unit: Pa
    pub patm: Series,
    /// Relative soil moisture
    pub theta: Option<Series>,
    /// Mean growth temperature, used by the Kattge and Knorr temperature response
    /// unit: °C
    pub mean_growth_temperature: Option<Series>,
    pub aridity_index: Option<Series>,

    /// Ambient CO2 partial pressure
    /// unit: Pa
    pub ca: Series,
    /// Photorespiratory compensation point
    /// unit: Pa
    pub gammastar: Series,
    /// Michaelis-Menten coefficient for Rubisco-limited photosynthesis
    /// unit: Pa
    pub kmm: Series,
    /// Viscosity of water relative to standard conditions
    pub ns_star: Series,
    /// Michaelis constant of PEPc for C4 photosynthesis
    /// unit: Pa
    pub kp_c4: Series,

    pub core_const: CoreConst,
    pub pmodel_const: PModelConst,
}

impl PModelEnvironment {
    /// Look up a forcing variable, returning `None` for optional variables that were
    /// not provided.
    pub fn get(&self, variable: EnvVar) -> Option<&Series> {
        match variable {
            EnvVar::Tc => Some(&self.tc),
            EnvVar::Vpd => Some(&self.vpd),
            EnvVar::Co2 => Some(&self.co2),
            EnvVar::Patm => Some(&self.patm),
            EnvVar::Theta => self.theta.as_ref(),
            EnvVar::MeanGrowthTemperature => self.mean_growth_temperature.as_ref(),
            EnvVar::AridityIndex => self.aridity_index.as_ref(),
        }
    }

    /// Look up a variable that a model cannot run without
    pub fn require(&self, variable: EnvVar) -> RSPMResult<&Series> {
        self.get(variable).ok_or_else(|| {
            RSPMError::InvalidInput(format!(
                "the environment does not provide {}",
                variable.name()
            ))
        })
    }

    /// Shape shared by the forcing variables
    pub fn shape(&self) -> &[usize] {
        self.tc.shape()
    }
}

/// Build a [`PModelEnvironment`] from forcing data.
pub struct EnvironmentBuilder {
    tc: Series,
    vpd: Series,
    co2: Series,
    patm: Series,
    theta: Option<Series>,
    mean_growth_temperature: Option<Series>,
    aridity_index: Option<Series>,
    core_const: CoreConst,
    pmodel_const: PModelConst,
}

impl EnvironmentBuilder {
    /// Start a new environment from the four required forcing variables.
    ///
    /// # Arguments
    ///
    /// * `tc` - Air temperature (°C)
    /// * `vpd` - Vapour pressure deficit (Pa)
    /// * `co2` - Atmospheric CO2 concentration (ppm)
    /// * `patm` - Atmospheric pressure (Pa)
    pub fn new(tc: Series, vpd: Series, co2: Series, patm: Series) -> Self {
        Self {
            tc,
            vpd,
            co2,
            patm,
            theta: None,
            mean_growth_temperature: None,
            aridity_index: None,
            core_const: CoreConst::default(),
            pmodel_const: PModelConst::default(),
        }
    }

    pub fn with_theta(&mut self, theta: Series) -> &mut Self {
        self.theta = Some(theta);
        self
    }

    pub fn with_mean_growth_temperature(&mut self, temperature: Series) -> &mut Self {
        self.mean_growth_temperature = Some(temperature);
        self
    }

    pub fn with_aridity_index(&mut self, aridity_index: Series) -> &mut Self {
        self.aridity_index = Some(aridity_index);
        self
    }

    pub fn with_core_const(&mut self, core_const: CoreConst) -> &mut Self {
        self.core_const = core_const;
        self
    }

    pub fn with_pmodel_const(&mut self, pmodel_const: PModelConst) -> &mut Self {
        self.pmodel_const = pmodel_const;
        self
    }

    fn variables(&self) -> Vec<(EnvVar, &Series)> {
        let mut variables = vec![
            (EnvVar::Tc, &self.tc),
            (EnvVar::Vpd, &self.vpd),
            (EnvVar::Co2, &self.co2),
            (EnvVar::Patm, &self.patm),
        ];
        let optional = [
            (EnvVar::Theta, &self.theta),
            (EnvVar::MeanGrowthTemperature, &self.mean_growth_temperature),
            (EnvVar::AridityIndex, &self.aridity_index),
        ];
        for (name, values) in optional {
            if let Some(values) = values {
                variables.push((name, values));
            }
        }
        variables
    }

    /// Check shapes and calculate the derived variables.
    ///
    /// Every variable must share the shape of `tc`.
    pub fn build(&self) -> RSPMResult<PModelEnvironment> {
        let expected = self.tc.shape();
        for (name, values) in self.variables() {
            if values.shape() != expected {
                return Err(RSPMError::ShapeMismatch(format!(
                    "{} has shape {:?} but tc has shape {:?}",
                    name,
                    values.shape(),
                    expected
                )));
            }
        }

        let pmodel_const = &self.pmodel_const;
        let core_const = &self.core_const;

        Ok(PModelEnvironment {
            ca: co2_to_ca(&self.co2, &self.patm)?,
            gammastar: gammastar(&self.tc, &self.patm, pmodel_const, core_const)?,
            kmm: kmm(&self.tc, &self.patm, pmodel_const, core_const)?,
            ns_star: ns_star(&self.tc, &self.patm, core_const)?,
            kp_c4: kp_c4(&self.tc, pmodel_const, core_const),
            tc: self.tc.clone(),
            vpd: self.vpd.clone(),
            co2: self.co2.clone(),
            patm: self.patm.clone(),
            theta: self.theta.clone(),
            mean_growth_temperature: self.mean_growth_temperature.clone(),
            aridity_index: self.aridity_index.clone(),
            core_const: self.core_const.clone(),
            pmodel_const: self.pmodel_const.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::new(
            array![20.0, 30.0].into_dyn(),
            array![1000.0, 1000.0].into_dyn(),
            array![400.0, 400.0].into_dyn(),
            array![101325.0, 123456.0].into_dyn(),
        )
    }

    #[test]
    fn test_derived_variables() {
        let env = builder().build().unwrap();

        assert_relative_eq!(env.ca[[1]], 49.3824, epsilon = 1e-9);
        assert_relative_eq!(env.gammastar[[1]], 6.7888247955597, epsilon = 1e-9);
        assert_relative_eq!(env.kmm[[0]], 46.09928, epsilon = 1e-4);
        assert_relative_eq!(env.ns_star[[1]], 0.8957314409463492, max_relative = 1e-9);
        assert_relative_eq!(env.kp_c4[[0]], 12.46385, epsilon = 1e-4);
    }

    #[test]
    fn test_optional_variables() {
        let env = builder()
            .with_theta(array![0.5, 0.6].into_dyn())
            .build()
            .unwrap();

        assert!(env.get(EnvVar::Theta).is_some());
        assert!(env.get(EnvVar::AridityIndex).is_none());
        assert!(matches!(
            env.require(EnvVar::MeanGrowthTemperature),
            Err(RSPMError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let result = builder().with_theta(array![0.5].into_dyn()).build();
        match result {
            Err(RSPMError::ShapeMismatch(msg)) => {
                assert!(msg.contains("theta"), "unexpected message: {}", msg)
            }
            other => panic!("Expected ShapeMismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_custom_constants_flow_through() {
        let pmodel_const = PModelConst {
            bernacchi_gs25_0: 8.664,
            ..PModelConst::default()
        };
        let default_env = builder().build().unwrap();
        let env = builder().with_pmodel_const(pmodel_const).build().unwrap();

        assert_relative_eq!(env.gammastar[[0]], 2.0 * default_env.gammastar[[0]], epsilon = 1e-12);
    }
}
