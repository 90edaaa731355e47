//! Temperature scaling of enzyme rates
//!
//! Photosynthetic capacities are reported at a reference temperature (Vcmax25,
//! Jmax25) and converted to the actual leaf temperature with an Arrhenius-type
//! factor. Two responses are available:
//!
//! * [`ArrheniusMethod::Simple`]: `exp(Ha (T - T_ref) / (T_ref R T))`
//! * [`ArrheniusMethod::KattgeKnorr`]: the peaked response of Kattge and Knorr (2007),
//!   which also depends on the mean growth temperature.
//!
//! A method is turned into a calculator bound to an environment with
//! [`ArrheniusMethod::create`].

use rspm_core::constants::ArrheniusCoefficients;
use rspm_core::environment::{EnvVar, PModelEnvironment};
use rspm_core::errors::{RSPMError, RSPMResult};
use rspm_core::functions::{kattge_knorr_arrhenius_factor, simple_arrhenius_factor};
use rspm_core::timeseries::{FloatValue, Series};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Calculates temperature scaling factors for an environment
pub trait ArrheniusFactor {
    /// Factor converting a rate at the reference temperature to the environment
    /// temperature
    fn calculate_arrhenius_factor(
        &self,
        coefficients: &ArrheniusCoefficients,
    ) -> RSPMResult<Series>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrheniusMethod {
    #[default]
    Simple,
    KattgeKnorr,
}

impl ArrheniusMethod {
    /// Environment variables needed beyond temperature
    pub fn requires(&self) -> &'static [EnvVar] {
        match self {
            ArrheniusMethod::Simple => &[],
            ArrheniusMethod::KattgeKnorr => &[EnvVar::MeanGrowthTemperature],
        }
    }

    /// Bind the method to an environment.
    ///
    /// # Arguments
    ///
    /// * `env` - Environment providing leaf temperature (and growth temperature if
    ///   required)
    /// * `reference_temperature` - Reference temperature (°C)
    pub fn create<'a>(
        &self,
        env: &'a PModelEnvironment,
        reference_temperature: FloatValue,
    ) -> RSPMResult<Box<dyn ArrheniusFactor + 'a>> {
        match self {
            ArrheniusMethod::Simple => Ok(Box::new(SimpleArrhenius {
                env,
                reference_temperature,
            })),
            ArrheniusMethod::KattgeKnorr => {
                log::warn!(
                    "The Kattge and Knorr temperature response is experimental and may change"
                );
                let growth_temperature = env.require(EnvVar::MeanGrowthTemperature)?;
                Ok(Box::new(KattgeKnorrArrhenius {
                    env,
                    growth_temperature,
                    reference_temperature,
                }))
            }
        }
    }
}

impl FromStr for ArrheniusMethod {
    type Err = RSPMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(ArrheniusMethod::Simple),
            "kattge_knorr" => Ok(ArrheniusMethod::KattgeKnorr),
            _ => Err(RSPMError::unknown_method("Arrhenius", s)),
        }
    }
}

fn leaf_temperature_kelvin(env: &PModelEnvironment) -> Series {
    let k_ctok = env.core_const.k_ctok;
    env.tc.mapv(|t| t + k_ctok)
}

struct SimpleArrhenius<'a> {
    env: &'a PModelEnvironment,
    reference_temperature: FloatValue,
}

impl ArrheniusFactor for SimpleArrhenius<'_> {
    fn calculate_arrhenius_factor(
        &self,
        coefficients: &ArrheniusCoefficients,
    ) -> RSPMResult<Series> {
        let core_const = &self.env.core_const;
        Ok(simple_arrhenius_factor(
            &leaf_temperature_kelvin(self.env),
            self.reference_temperature + core_const.k_ctok,
            coefficients.simple.ha,
            core_const,
        ))
    }
}

struct KattgeKnorrArrhenius<'a> {
    env: &'a PModelEnvironment,
    growth_temperature: &'a Series,
    reference_temperature: FloatValue,
}

impl ArrheniusFactor for KattgeKnorrArrhenius<'_> {
    fn calculate_arrhenius_factor(
        &self,
        coefficients: &ArrheniusCoefficients,
    ) -> RSPMResult<Series> {
        let core_const = &self.env.core_const;
        let coef = &coefficients.kattge_knorr;
        kattge_knorr_arrhenius_factor(
            &leaf_temperature_kelvin(self.env),
            self.reference_temperature + core_const.k_ctok,
            self.growth_temperature,
            coef.ha,
            coef.hd,
            coef.entropy_intercept,
            coef.entropy_slope,
            core_const,
        )
    }
}
