//! Intrinsic quantum yield of photosynthesis (φ0)

use rspm_core::environment::{EnvVar, PModelEnvironment};
use rspm_core::errors::{RSPMError, RSPMResult};
use rspm_core::functions::ftemp_kphio;
use rspm_core::timeseries::{check_shape, FloatValue, Series};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Reference quantum yield, either one value or one value per observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferenceKphio {
    Scalar(FloatValue),
    Array(Series),
}

impl ReferenceKphio {
    pub fn is_scalar(&self) -> bool {
        matches!(self, ReferenceKphio::Scalar(_))
    }

    /// Expand to the shape of an environment
    fn broadcast(&self, env: &PModelEnvironment) -> RSPMResult<Series> {
        match self {
            ReferenceKphio::Scalar(value) => Ok(Series::from_elem(env.shape(), *value)),
            ReferenceKphio::Array(values) => {
                check_shape("reference kphio", values, env.shape())?;
                Ok(values.clone())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantumYieldMethod {
    /// Use the reference value unchanged
    Fixed,
    /// Scale the reference value with a quadratic temperature response
    #[default]
    Temperature,
}

impl QuantumYieldMethod {
    /// Reference value used when none is given
    pub fn default_reference(&self) -> FloatValue {
        match self {
            QuantumYieldMethod::Fixed => 0.049977,
            QuantumYieldMethod::Temperature => 0.081785,
        }
    }

    pub fn requires(&self) -> &'static [EnvVar] {
        &[]
    }

    /// Calculate φ0 for an environment.
    ///
    /// # Arguments
    ///
    /// * `env` - Photosynthetic environment
    /// * `use_c4` - Use the C4 temperature response
    /// * `reference` - Reference φ0, defaulting to [`QuantumYieldMethod::default_reference`]
    pub fn estimate(
        &self,
        env: &PModelEnvironment,
        use_c4: bool,
        reference: Option<&ReferenceKphio>,
    ) -> RSPMResult<QuantumYield> {
        let reference_kphio = reference
            .cloned()
            .unwrap_or(ReferenceKphio::Scalar(self.default_reference()));
        let reference_values = reference_kphio.broadcast(env)?;

        let kphio = match self {
            QuantumYieldMethod::Fixed => reference_values,
            QuantumYieldMethod::Temperature => {
                ftemp_kphio(&env.tc, use_c4, &env.pmodel_const) * &reference_values
            }
        };

        Ok(QuantumYield {
            kphio,
            reference_kphio,
        })
    }
}

impl FromStr for QuantumYieldMethod {
    type Err = RSPMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(QuantumYieldMethod::Fixed),
            "temperature" => Ok(QuantumYieldMethod::Temperature),
            _ => Err(RSPMError::unknown_method("quantum yield", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantumYield {
    /// φ0 for each observation
    pub kphio: Series,
    pub reference_kphio: ReferenceKphio,
}
