//! Subdaily P Model with slow acclimation
//!
//! Plants cannot adjust ξ, Vcmax and Jmax instantly to fast changes in their
//! environment. Instead these parameters acclimate towards the optimum for typical
//! conditions during a daily window (usually around noon) with a lag. This module
//! combines those slow responses with fast responses to subdaily temperature, light,
//! vapour pressure deficit and CO2 to predict subdaily GPP.
//!
//! # Pipeline
//!
//! [`SubdailyPModelBuilder::build`] runs the following steps:
//!
//! 1. Check that the forcing data, the scaler and any previous realised values agree.
//! 2. Average the forcing over the acclimation window of each day.
//! 3. Fit a [`PModel`] to the daily conditions and estimate productivity for the
//!    daily mean fAPAR and PPFD.
//! 4. Convert the daily optimal Vcmax and Jmax to the reference temperature.
//! 5. Apply the memory effect to ξ, Vcmax25 and Jmax25 to give realised values.
//! 6. Fill the realised values back onto the subdaily timestamps.
//! 7. Convert Vcmax25 and Jmax25 to the subdaily temperature.
//! 8. Recalculate χ from the realised ξ and the subdaily environment.
//! 9. Calculate the Rubisco- and light-limited assimilation rates and GPP.
//!
//! # Continuing a run
//!
//! Long series can be fitted in chunks by passing
//! [`SubdailyPModel::final_realised`] from one chunk to the next with
//! [`SubdailyPModelBuilder::with_previous_realised`]. Each chunk must start at
//! midnight following the end of the previous chunk.

use crate::arrhenius::ArrheniusMethod;
use crate::jmax_limitation::JmaxLimitationMethod;
use crate::optimal_chi::{OptimalChiEstimate, OptimalChiMethod};
use crate::pmodel::{PModel, PModelOptions, Productivity};
use crate::quantum_yield::{QuantumYield, QuantumYieldMethod, ReferenceKphio};
use ndarray::{Array1, Axis, Zip};
use rspm_core::environment::{EnvVar, EnvironmentBuilder, PModelEnvironment};
use rspm_core::errors::{RSPMError, RSPMResult};
use rspm_core::memory_effect::{memory_effect, MemoryEffect};
use rspm_core::scaler::{FillMethod, FillOptions, SubdailyScaler, UpdatePoint};
use rspm_core::timeseries::{
    check_shape, nan_min, slice_shape, time_length, FloatValue, Series, Timestamp,
};
use serde::{Deserialize, Serialize};

/// How ξ responds to the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XiResponse {
    /// ξ acclimates slowly through the memory effect and internal CO2 follows the
    /// subdaily environment
    #[default]
    Acclimated,
    /// ξ takes the daily optimal value with no memory effect. Internal CO2 is
    /// calculated from the daily ξ, ambient CO2 and Γ* (filled from midnight) and the
    /// subdaily vapour pressure deficit. Only available for C3 plants.
    DailyOptimal,
}

/// Settings for a subdaily model fit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubdailyConfig {
    pub method_optchi: OptimalChiMethod,
    pub method_jmaxlim: JmaxLimitationMethod,
    pub method_kphio: QuantumYieldMethod,
    pub method_arrhenius: ArrheniusMethod,
    /// Weighting and missing data handling of the acclimation lag
    pub memory_effect: MemoryEffect,
    /// Calculate daily conditions from incomplete acclimation windows
    pub allow_partial_data: bool,
    /// How realised daily values are filled back to the subdaily timestamps
    pub fill: FillOptions,
    pub xi_response: XiResponse,
}

impl SubdailyConfig {
    /// Settings reproducing the earlier formulation used to validate the model.
    ///
    /// ξ uses the daily optimum and only Vcmax and Jmax have a slow response. That
    /// formulation used a reference quantum yield of 1/8 with the temperature
    /// response, which can be set with [`SubdailyPModelBuilder::with_reference_kphio`].
    pub fn legacy() -> Self {
        Self {
            method_kphio: QuantumYieldMethod::Temperature,
            xi_response: XiResponse::DailyOptimal,
            ..Self::default()
        }
    }
}

/// Realised values of the slowly acclimating parameters, one time slice per day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealisedState {
    pub xi: Series,
    pub vcmax25: Series,
    pub jmax25: Series,
}

/// A fitted subdaily model
#[derive(Debug, Clone)]
pub struct SubdailyPModel {
    pub datetimes: Array1<Timestamp>,
    pub config: SubdailyConfig,

    /// Model fitted to the daily acclimation conditions
    pub pmodel_acclim: PModel,
    /// Productivity for the daily mean fAPAR and PPFD
    pub productivity_acclim: Productivity,

    /// Daily optimal ξ
    pub xi_opt: Series,
    /// Daily optimal Vcmax at the reference temperature
    pub vcmax25_opt: Series,
    /// Daily optimal Jmax at the reference temperature
    pub jmax25_opt: Series,
    /// Daily realised values after the memory effect
    pub realised: RealisedState,

    pub subdaily_xi: Series,
    pub subdaily_vcmax25: Series,
    pub subdaily_jmax25: Series,
    pub subdaily_vcmax: Series,
    pub subdaily_jmax: Series,

    /// Subdaily quantum yield
    pub kphio: QuantumYield,
    /// χ and limitation terms for the subdaily environment
    pub optimal_chi: OptimalChiEstimate,

    /// Rubisco-limited assimilation
    pub subdaily_ac: Series,
    /// Light-limited assimilation
    pub subdaily_aj: Series,
    /// Gross primary productivity
    /// unit: µg C / m^2 / s
    pub gpp: Series,
}

impl SubdailyPModel {
    /// Realised values for the last day, used to continue fitting with later data
    pub fn final_realised(&self) -> RealisedState {
        let last = |values: &Series| {
            values
                .index_axis(Axis(0), time_length(values) - 1)
                .to_owned()
        };
        RealisedState {
            xi: last(&self.realised.xi),
            vcmax25: last(&self.realised.vcmax25),
            jmax25: last(&self.realised.jmax25),
        }
    }
}

/// Electron transport rate given absorbed light and Jmax
///
/// Saturates towards Jmax as the absorbed light increases.
pub fn electron_transport(kphio: FloatValue, iabs: FloatValue, jmax: FloatValue) -> FloatValue {
    let potential = 4.0 * kphio * iabs;
    potential / (1.0 + (potential / jmax).powi(2)).sqrt()
}

/// Configure and fit a [`SubdailyPModel`]
pub struct SubdailyPModelBuilder<'a> {
    env: &'a PModelEnvironment,
    scaler: &'a SubdailyScaler,
    fapar: &'a Series,
    ppfd: &'a Series,
    config: SubdailyConfig,
    reference_kphio: Option<ReferenceKphio>,
    previous_realised: Option<RealisedState>,
    vpd_scaler: Option<&'a SubdailyScaler>,
}

impl<'a> SubdailyPModelBuilder<'a> {
    /// # Arguments
    ///
    /// * `env` - Subdaily photosynthetic environment
    /// * `scaler` - Timestamps of the observations and the acclimation window
    /// * `fapar` - Fraction of absorbed photosynthetically active radiation
    /// * `ppfd` - Photosynthetic photon flux density (µmol / m^2 / s)
    pub fn new(
        env: &'a PModelEnvironment,
        scaler: &'a SubdailyScaler,
        fapar: &'a Series,
        ppfd: &'a Series,
    ) -> Self {
        Self {
            env,
            scaler,
            fapar,
            ppfd,
            config: SubdailyConfig::default(),
            reference_kphio: None,
            previous_realised: None,
            vpd_scaler: None,
        }
    }

    /// Refit a daily-resolution model with slow acclimation.
    ///
    /// The sub-model choices and reference quantum yield are taken from `pmodel`, and
    /// fAPAR and PPFD from `productivity`.
    pub fn from_pmodel(
        pmodel: &'a PModel,
        productivity: &'a Productivity,
        scaler: &'a SubdailyScaler,
    ) -> Self {
        let options = &pmodel.options;
        let mut builder = Self::new(&pmodel.env, scaler, &productivity.fapar, &productivity.ppfd);
        builder.config = SubdailyConfig {
            method_optchi: options.method_optchi,
            method_jmaxlim: options.method_jmaxlim,
            method_kphio: options.method_kphio,
            method_arrhenius: options.method_arrhenius,
            ..SubdailyConfig::default()
        };
        builder.reference_kphio = Some(pmodel.kphio.reference_kphio.clone());
        builder
    }

    pub fn with_config(&mut self, config: SubdailyConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn with_reference_kphio(&mut self, reference_kphio: ReferenceKphio) -> &mut Self {
        self.reference_kphio = Some(reference_kphio);
        self
    }

    /// Realised values from the end of an earlier fit
    pub fn with_previous_realised(&mut self, previous: RealisedState) -> &mut Self {
        self.previous_realised = Some(previous);
        self
    }

    /// Use a different acclimation window for vapour pressure deficit
    pub fn with_vpd_scaler(&mut self, vpd_scaler: &'a SubdailyScaler) -> &mut Self {
        self.vpd_scaler = Some(vpd_scaler);
        self
    }

    fn check_inputs(&self) -> RSPMResult<()> {
        let n_datetimes = self.scaler.n_datetimes();
        if self.env.tc.ndim() == 0 || time_length(&self.env.tc) != n_datetimes {
            return Err(RSPMError::ShapeMismatch(format!(
                "the environment has shape {:?} but the scaler has {} datetimes",
                self.env.shape(),
                n_datetimes
            )));
        }
        check_shape("fapar", self.fapar, self.env.shape())?;
        check_shape("ppfd", self.ppfd, self.env.shape())?;

        if !self.scaler.is_configured() {
            return Err(RSPMError::NotConfigured(
                "the acclimation window of the scaler".to_string(),
            ));
        }
        if let Some(vpd_scaler) = self.vpd_scaler {
            if vpd_scaler.n_datetimes() != n_datetimes {
                return Err(RSPMError::ShapeMismatch(format!(
                    "the VPD scaler has {} datetimes but the scaler has {}",
                    vpd_scaler.n_datetimes(),
                    n_datetimes
                )));
            }
            if !vpd_scaler.is_configured() {
                return Err(RSPMError::NotConfigured(
                    "the acclimation window of the VPD scaler".to_string(),
                ));
            }
        }

        if let Some(previous) = &self.previous_realised {
            if self.config.fill.method != FillMethod::Previous {
                return Err(RSPMError::NotImplemented(
                    "previous realised values can only be used with the previous fill method"
                        .to_string(),
                ));
            }
            let expected = slice_shape(&self.env.tc);
            for (name, values) in [
                ("previous xi", &previous.xi),
                ("previous vcmax25", &previous.vcmax25),
                ("previous jmax25", &previous.jmax25),
            ] {
                check_shape(name, values, expected)?;
            }
        }

        if self.config.xi_response == XiResponse::DailyOptimal
            && self.config.method_optchi.is_c4()
        {
            return Err(RSPMError::NotImplemented(
                "daily optimal xi is only available for C3 plants".to_string(),
            ));
        }
        Ok(())
    }

    /// Average the forcing over the acclimation window
    fn daily_environment(&self) -> RSPMResult<PModelEnvironment> {
        let allow_partial = self.config.allow_partial_data;
        let daily_mean = |variable: EnvVar| -> RSPMResult<Series> {
            let scaler = match (variable, self.vpd_scaler) {
                (EnvVar::Vpd, Some(vpd_scaler)) => vpd_scaler,
                _ => self.scaler,
            };
            scaler.daily_means(self.env.require(variable)?, allow_partial)
        };

        let mut builder = EnvironmentBuilder::new(
            daily_mean(EnvVar::Tc)?,
            daily_mean(EnvVar::Vpd)?,
            daily_mean(EnvVar::Co2)?,
            daily_mean(EnvVar::Patm)?,
        );
        builder
            .with_core_const(self.env.core_const.clone())
            .with_pmodel_const(self.env.pmodel_const.clone());

        let mut extra: Vec<EnvVar> = Vec::new();
        for variable in self
            .config
            .method_optchi
            .requires()
            .iter()
            .chain(self.config.method_kphio.requires())
            .chain(self.config.method_arrhenius.requires())
        {
            if !extra.contains(variable) {
                extra.push(*variable);
            }
        }

        for variable in extra {
            let values = daily_mean(variable)?;
            match variable {
                EnvVar::Theta => {
                    builder.with_theta(values);
                }
                EnvVar::MeanGrowthTemperature => {
                    builder.with_mean_growth_temperature(values);
                }
                EnvVar::AridityIndex => {
                    builder.with_aridity_index(values);
                }
                EnvVar::Tc | EnvVar::Vpd | EnvVar::Co2 | EnvVar::Patm => {}
            }
        }

        builder.build()
    }

    /// Fit the model
    pub fn build(&self) -> RSPMResult<SubdailyPModel> {
        let config = &self.config;
        let env = self.env;
        let scaler = self.scaler;

        self.check_inputs()?;
        if config.xi_response == XiResponse::DailyOptimal {
            log::warn!(
                "Daily optimal xi reproduces an earlier formulation and is not recommended"
            );
        }
        if config.method_optchi != OptimalChiMethod::Prentice14 {
            log::warn!(
                "Slow acclimation has not been validated for the {:?} optimal chi method",
                config.method_optchi
            );
        }

        // Daily acclimation conditions and the daily optimal model
        let daily_env = self.daily_environment()?;
        log::debug!("Calculated acclimation conditions for {} days", scaler.n_days());

        let kphio = config.method_kphio.estimate(
            env,
            config.method_optchi.is_c4(),
            self.reference_kphio.as_ref(),
        )?;
        // An array of reference values cannot be reused for daily conditions, so use
        // the window mean of the subdaily values with a fixed yield.
        let (daily_method_kphio, daily_reference_kphio) = if kphio.reference_kphio.is_scalar() {
            (config.method_kphio, kphio.reference_kphio.clone())
        } else {
            (
                QuantumYieldMethod::Fixed,
                ReferenceKphio::Array(scaler.daily_means(&kphio.kphio, config.allow_partial_data)?),
            )
        };

        let pmodel_acclim = PModel::new(
            daily_env,
            PModelOptions {
                method_optchi: config.method_optchi,
                method_jmaxlim: config.method_jmaxlim,
                method_kphio: daily_method_kphio,
                method_arrhenius: config.method_arrhenius,
                reference_kphio: Some(daily_reference_kphio),
            },
        )?;
        let productivity_acclim = pmodel_acclim.estimate_productivity(
            &scaler.daily_means(self.fapar, config.allow_partial_data)?,
            &scaler.daily_means(self.ppfd, config.allow_partial_data)?,
        )?;

        // Daily optimal values, with capacities at the reference temperature
        let xi_opt = pmodel_acclim.optchi.xi.clone();
        let vcmax25_opt = productivity_acclim.vcmax25.clone();
        let jmax25_opt = productivity_acclim.jmax25.clone();

        // Memory effect
        let alpha = config.memory_effect.alpha;
        let allow_holdover = config.memory_effect.allow_holdover;
        let previous = self.previous_realised.as_ref();

        let realised = RealisedState {
            xi: match config.xi_response {
                XiResponse::Acclimated => {
                    memory_effect(&xi_opt, previous.map(|p| &p.xi), alpha, allow_holdover)?
                }
                XiResponse::DailyOptimal => xi_opt.clone(),
            },
            vcmax25: memory_effect(
                &vcmax25_opt,
                previous.map(|p| &p.vcmax25),
                alpha,
                allow_holdover,
            )?,
            jmax25: memory_effect(
                &jmax25_opt,
                previous.map(|p| &p.jmax25),
                alpha,
                allow_holdover,
            )?,
        };
        log::debug!("Applied memory effect with alpha = {}", alpha);

        // Fill to subdaily and convert to subdaily temperature
        let subdaily_vcmax25 = scaler.fill_daily_to_subdaily(
            &realised.vcmax25,
            previous.map(|p| &p.vcmax25),
            &config.fill,
        )?;
        let subdaily_jmax25 = scaler.fill_daily_to_subdaily(
            &realised.jmax25,
            previous.map(|p| &p.jmax25),
            &config.fill,
        )?;

        let arrhenius = config
            .method_arrhenius
            .create(env, env.pmodel_const.plant_t_ref)?;
        let subdaily_vcmax = &subdaily_vcmax25
            * &arrhenius.calculate_arrhenius_factor(&env.pmodel_const.arrhenius_vcmax)?;
        let subdaily_jmax = &subdaily_jmax25
            * &arrhenius.calculate_arrhenius_factor(&env.pmodel_const.arrhenius_jmax)?;

        // Internal CO2 for the subdaily environment
        let (subdaily_xi, optimal_chi) = match config.xi_response {
            XiResponse::Acclimated => {
                let subdaily_xi = scaler.fill_daily_to_subdaily(
                    &realised.xi,
                    previous.map(|p| &p.xi),
                    &config.fill,
                )?;
                let optimal_chi = config
                    .method_optchi
                    .create()
                    .estimate(env, Some(&subdaily_xi))?;
                (subdaily_xi, optimal_chi)
            }
            XiResponse::DailyOptimal => {
                let midnight = FillOptions {
                    method: FillMethod::Previous,
                    update_point: UpdatePoint::Max,
                    fill_from: Some(0),
                };
                let daily_env = &pmodel_acclim.env;
                let subdaily_xi = scaler.fill_daily_to_subdaily(&xi_opt, None, &midnight)?;
                let subdaily_ca = scaler.fill_daily_to_subdaily(&daily_env.ca, None, &midnight)?;
                let subdaily_gammastar =
                    scaler.fill_daily_to_subdaily(&daily_env.gammastar, None, &midnight)?;
                let optimal_chi =
                    daily_optimal_chi(env, subdaily_xi.clone(), &subdaily_ca, &subdaily_gammastar);
                (subdaily_xi, optimal_chi)
            }
        };
        log::debug!("Filled realised values to {} datetimes", scaler.n_datetimes());

        // Assimilation
        let subdaily_ac = &subdaily_vcmax * &optimal_chi.mc;
        let iabs = self.fapar * self.ppfd;
        let subdaily_aj = Zip::from(&kphio.kphio)
            .and(&iabs)
            .and(&subdaily_jmax)
            .and(&optimal_chi.mj)
            .map_collect(|&kphio, &iabs, &jmax, &mj| {
                electron_transport(kphio, iabs, jmax) / 4.0 * mj
            });
        let k_c_molmass = env.core_const.k_c_molmass;
        let gpp = Zip::from(&subdaily_aj)
            .and(&subdaily_ac)
            .map_collect(|&aj, &ac| nan_min(aj, ac) * k_c_molmass);

        Ok(SubdailyPModel {
            datetimes: scaler.datetimes().clone(),
            config: config.clone(),
            pmodel_acclim,
            productivity_acclim,
            xi_opt,
            vcmax25_opt,
            jmax25_opt,
            realised,
            subdaily_xi,
            subdaily_vcmax25,
            subdaily_jmax25,
            subdaily_vcmax,
            subdaily_jmax,
            kphio,
            optimal_chi,
            subdaily_ac,
            subdaily_aj,
            gpp,
        })
    }
}

/// Limitation terms from daily ξ, ambient CO2 and Γ* with the subdaily vapour
/// pressure deficit, Γ* and K
fn daily_optimal_chi(
    env: &PModelEnvironment,
    xi: Series,
    daily_ca: &Series,
    daily_gammastar: &Series,
) -> OptimalChiEstimate {
    let ci = Zip::from(&xi)
        .and(daily_ca)
        .and(daily_gammastar)
        .and(&env.vpd)
        .map_collect(|&xi, &ca, &gammastar, &vpd| {
            (xi * ca + gammastar * vpd.sqrt()) / (xi + vpd.sqrt())
        });
    let chi = &ci / &env.ca;
    let mc = Zip::from(&ci)
        .and(&env.gammastar)
        .and(&env.kmm)
        .map_collect(|&ci, &gammastar, &kmm| (ci - gammastar) / (ci + kmm));
    let mj = Zip::from(&ci)
        .and(&env.gammastar)
        .map_collect(|&ci, &gammastar| (ci - gammastar) / (ci + 2.0 * gammastar));
    let mjoc = Zip::from(&ci)
        .and(&env.gammastar)
        .and(&env.kmm)
        .map_collect(|&ci, &gammastar, &kmm| (ci + kmm) / (ci + 2.0 * gammastar));

    OptimalChiEstimate {
        xi,
        chi,
        ci,
        mc,
        mj,
        mjoc,
    }
}
