//! The daily optimality model
//!
//! [`PModel`] predicts the optimal χ, light use efficiency and photosynthetic
//! capacities for plants at instantaneous equilibrium with their environment. It is
//! fitted once for an environment and then used to estimate productivity for given
//! absorbed light:
//!
//! ```rust
//! use ndarray::array;
//! use rspm_components::pmodel::{PModel, PModelOptions};
//! use rspm_core::environment::EnvironmentBuilder;
//!
//! let env = EnvironmentBuilder::new(
//!     array![20.0].into_dyn(),
//!     array![1000.0].into_dyn(),
//!     array![400.0].into_dyn(),
//!     array![101325.0].into_dyn(),
//! )
//! .build()
//! .unwrap();
//!
//! let model = PModel::new(env, PModelOptions::default()).unwrap();
//! let productivity = model
//!     .estimate_productivity(&array![1.0].into_dyn(), &array![1000.0].into_dyn())
//!     .unwrap();
//! assert!(productivity.gpp[[0]] > 0.0);
//! ```

use crate::arrhenius::ArrheniusMethod;
use crate::jmax_limitation::{JmaxLimitation, JmaxLimitationMethod};
use crate::optimal_chi::{OptimalChiEstimate, OptimalChiMethod};
use crate::quantum_yield::{QuantumYield, QuantumYieldMethod, ReferenceKphio};
use ndarray::{IxDyn, Zip};
use rspm_core::environment::PModelEnvironment;
use rspm_core::errors::{RSPMError, RSPMResult};
use rspm_core::timeseries::Series;
use serde::{Deserialize, Serialize};

/// Choice of sub-models for a [`PModel`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PModelOptions {
    pub method_optchi: OptimalChiMethod,
    pub method_jmaxlim: JmaxLimitationMethod,
    pub method_kphio: QuantumYieldMethod,
    pub method_arrhenius: ArrheniusMethod,
    /// Reference quantum yield, defaulting to the value for `method_kphio`
    pub reference_kphio: Option<ReferenceKphio>,
}

/// Productivity for a given amount of absorbed light
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Productivity {
    pub fapar: Series,
    /// Photosynthetic photon flux density
    /// unit: µmol / m^2 / s
    pub ppfd: Series,
    /// Absorbed photosynthetically active radiation
    /// unit: µmol / m^2 / s
    pub iabs: Series,
    /// Gross primary productivity
    /// unit: µg C / m^2 / s
    pub gpp: Series,
    /// Maximum rate of carboxylation
    /// unit: µmol / m^2 / s
    pub vcmax: Series,
    /// Maximum rate of electron transport
    /// unit: µmol / m^2 / s
    pub jmax: Series,
    /// `vcmax` at the reference temperature
    pub vcmax25: Series,
    /// `jmax` at the reference temperature
    pub jmax25: Series,
}

/// A fitted daily optimality model
#[derive(Debug, Clone)]
pub struct PModel {
    pub env: PModelEnvironment,
    pub options: PModelOptions,
    pub optchi: OptimalChiEstimate,
    pub kphio: QuantumYield,
    pub jmaxlim: JmaxLimitation,
    /// Light use efficiency
    /// unit: g C / mol photons
    pub lue: Series,
}

impl PModel {
    pub fn new(env: PModelEnvironment, options: PModelOptions) -> RSPMResult<Self> {
        let optchi = options.method_optchi.create().estimate(&env, None)?;
        let kphio = options.method_kphio.estimate(
            &env,
            options.method_optchi.is_c4(),
            options.reference_kphio.as_ref(),
        )?;
        let jmaxlim = options.method_jmaxlim.estimate(&optchi, &env.pmodel_const);

        let k_c_molmass = env.core_const.k_c_molmass;
        let lue = Zip::from(&kphio.kphio)
            .and(&optchi.mj)
            .and(&jmaxlim.f_v)
            .map_collect(|&kphio, &mj, &f_v| kphio * mj * f_v * k_c_molmass);

        log::debug!(
            "Fitted P Model ({:?}, {:?}, {:?}) with shape {:?}",
            options.method_optchi,
            options.method_jmaxlim,
            options.method_kphio,
            env.shape()
        );

        Ok(Self {
            env,
            options,
            optchi,
            kphio,
            jmaxlim,
            lue,
        })
    }

    /// Estimate productivity given the fraction of absorbed light and the incoming
    /// photon flux.
    ///
    /// Both inputs must match the shape of the environment or be 0-dimensional.
    pub fn estimate_productivity(&self, fapar: &Series, ppfd: &Series) -> RSPMResult<Productivity> {
        let fapar = expand("fapar", fapar, self.env.shape())?;
        let ppfd = expand("ppfd", ppfd, self.env.shape())?;
        let iabs = &fapar * &ppfd;

        let gpp = &self.lue * &iabs;

        let vcmax = Zip::from(&self.kphio.kphio)
            .and(&iabs)
            .and(&self.optchi.mjoc)
            .and(&self.jmaxlim.f_v)
            .map_collect(|&kphio, &iabs, &mjoc, &f_v| kphio * iabs * mjoc * f_v);

        let light = &self.kphio.kphio * &iabs;
        let limitation = Zip::from(&vcmax)
            .and(&self.optchi.ci)
            .and(&self.env.gammastar)
            .and(&self.env.kmm)
            .and(&light)
            .map_collect(|&vcmax, &ci, &gammastar, &kmm, &light| {
                vcmax * (ci + 2.0 * gammastar) / (light * (ci + kmm))
            });
        let jmax = Zip::from(&light)
            .and(&limitation)
            .map_collect(|&light, &limitation| {
                4.0 * light / ((1.0 / limitation).powi(2) - 1.0).sqrt()
            });

        let arrhenius = self
            .options
            .method_arrhenius
            .create(&self.env, self.env.pmodel_const.plant_t_ref)?;
        let vcmax25 = &vcmax
            / &arrhenius.calculate_arrhenius_factor(&self.env.pmodel_const.arrhenius_vcmax)?;
        let jmax25 =
            &jmax / &arrhenius.calculate_arrhenius_factor(&self.env.pmodel_const.arrhenius_jmax)?;

        Ok(Productivity {
            fapar,
            ppfd,
            iabs,
            gpp,
            vcmax,
            jmax,
            vcmax25,
            jmax25,
        })
    }
}

/// Broadcast an input to the shape of the environment
fn expand(name: &str, values: &Series, shape: &[usize]) -> RSPMResult<Series> {
    if values.shape() == shape {
        return Ok(values.clone());
    }
    values
        .broadcast(IxDyn(shape))
        .map(|view| view.to_owned())
        .ok_or_else(|| {
            RSPMError::ShapeMismatch(format!(
                "{} has shape {:?} but the environment has shape {:?}",
                name,
                values.shape(),
                shape
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rspm_core::environment::EnvironmentBuilder;
    use rspm_core::timeseries::scalar;

    fn environment() -> PModelEnvironment {
        EnvironmentBuilder::new(
            array![10.0, 20.0, 30.0].into_dyn(),
            array![800.0, 1000.0, 1500.0].into_dyn(),
            array![400.0, 400.0, 400.0].into_dyn(),
            array![101325.0, 101325.0, 101325.0].into_dyn(),
        )
        .build()
        .unwrap()
    }

    #[test]
    fn test_gpp_is_lue_times_iabs() {
        let model = PModel::new(environment(), PModelOptions::default()).unwrap();
        let productivity = model
            .estimate_productivity(&scalar(0.9), &array![500.0, 1000.0, 1500.0].into_dyn())
            .unwrap();

        for i in 0..3 {
            assert_relative_eq!(
                productivity.gpp[[i]],
                model.lue[[i]] * 0.9 * productivity.ppfd[[i]],
                epsilon = 1e-9
            );
            assert!(productivity.jmax[[i]] > productivity.vcmax[[i]]);
        }
        assert_eq!(productivity.fapar.shape(), &[3]);
    }

    #[test]
    fn test_assimilation_rates_are_colimited() {
        // At the optimum the Rubisco and electron transport limited rates are equal
        let model = PModel::new(environment(), PModelOptions::default()).unwrap();
        let productivity = model
            .estimate_productivity(&scalar(1.0), &scalar(1000.0))
            .unwrap();

        for i in 0..3 {
            let ac = productivity.vcmax[[i]] * model.optchi.mc[[i]];
            let j = 4.0 * model.kphio.kphio[[i]] * productivity.iabs[[i]]
                / (1.0
                    + (4.0 * model.kphio.kphio[[i]] * productivity.iabs[[i]]
                        / productivity.jmax[[i]])
                        .powi(2))
                .sqrt();
            let aj = j / 4.0 * model.optchi.mj[[i]];
            assert_relative_eq!(ac, aj, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_vcmax25_at_reference_temperature() {
        let env = EnvironmentBuilder::new(
            array![25.0].into_dyn(),
            array![1000.0].into_dyn(),
            array![400.0].into_dyn(),
            array![101325.0].into_dyn(),
        )
        .build()
        .unwrap();
        let model = PModel::new(env, PModelOptions::default()).unwrap();
        let productivity = model
            .estimate_productivity(&scalar(1.0), &scalar(800.0))
            .unwrap();
        assert_relative_eq!(productivity.vcmax25[[0]], productivity.vcmax[[0]], epsilon = 1e-12);
        assert_relative_eq!(productivity.jmax25[[0]], productivity.jmax[[0]], epsilon = 1e-12);
    }

    #[test]
    fn test_c4_options() {
        let options = PModelOptions {
            method_optchi: OptimalChiMethod::C4,
            method_jmaxlim: JmaxLimitationMethod::Simple,
            ..PModelOptions::default()
        };
        let model = PModel::new(environment(), options).unwrap();
        for i in 0..3 {
            assert_relative_eq!(model.lue[[i]], model.kphio.kphio[[i]] * 12.0107, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_input_shape_mismatch() {
        let model = PModel::new(environment(), PModelOptions::default()).unwrap();
        let result = model.estimate_productivity(&array![1.0, 1.0].into_dyn(), &scalar(1000.0));
        assert!(matches!(result, Err(RSPMError::ShapeMismatch(_))));
    }

    #[test]
    fn test_options_from_toml() {
        let options: PModelOptions = toml::from_str(
            r#"
            method_optchi = "lavergne20_c3"
            method_kphio = "fixed"
            reference_kphio = 0.06
            "#,
        )
        .unwrap();
        assert_eq!(options.method_optchi, OptimalChiMethod::Lavergne20C3);
        assert_eq!(options.method_jmaxlim, JmaxLimitationMethod::Wang17);
        assert_eq!(options.reference_kphio, Some(ReferenceKphio::Scalar(0.06)));
    }
}
