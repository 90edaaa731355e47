//! Optimal ratio of internal to ambient CO2 partial pressure
//!
//! Each method estimates ξ, the sensitivity of χ to the vapour pressure deficit,
//! from the environment and then derives χ, the internal CO2 partial pressure and the
//! CO2 limitation terms used for Rubisco- (`mc`) and light-limited (`mj`)
//! assimilation.
//!
//! # Methods
//!
//! | Method          | Pathway | Extra variables |
//! |-----------------|---------|-----------------|
//! | `prentice14`    | C3      |                 |
//! | `lavergne20_c3` | C3      | soil moisture   |
//! | `c4`            | C4      |                 |
//! | `c4_no_gamma`   | C4      |                 |
//!
//! ξ can also be supplied directly, which is how realised (acclimated) values of ξ
//! are combined with fast changes in the environment.

use ndarray::Zip;
use rspm_core::environment::{EnvVar, PModelEnvironment};
use rspm_core::errors::{RSPMError, RSPMResult};
use rspm_core::timeseries::{check_shape, Series};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Optimal χ and the resulting CO2 limitation terms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimalChiEstimate {
    pub xi: Series,
    pub chi: Series,
    /// Internal CO2 partial pressure
    /// unit: Pa
    pub ci: Series,
    /// CO2 limitation of Rubisco-limited assimilation
    pub mc: Series,
    /// CO2 limitation of light-limited assimilation
    pub mj: Series,
    /// Ratio of `mj` to `mc`
    pub mjoc: Series,
}

/// A model of optimal χ
pub trait OptimalChiModel {
    fn method(&self) -> OptimalChiMethod;

    /// Optimal ξ for the environment
    fn optimal_xi(&self, env: &PModelEnvironment) -> RSPMResult<Series>;

    /// χ and the limitation terms given ξ
    fn estimate_from_xi(
        &self,
        env: &PModelEnvironment,
        xi: Series,
    ) -> RSPMResult<OptimalChiEstimate>;

    /// Estimate χ, using `xi` in place of the optimal ξ when given.
    fn estimate(
        &self,
        env: &PModelEnvironment,
        xi: Option<&Series>,
    ) -> RSPMResult<OptimalChiEstimate> {
        let xi = match xi {
            Some(xi) => {
                check_shape("xi", xi, env.shape())?;
                xi.clone()
            }
            None => self.optimal_xi(env)?,
        };
        self.estimate_from_xi(env, xi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimalChiMethod {
    /// Prentice et al. (2014)
    #[default]
    Prentice14,
    /// Lavergne et al. (2020), with the cost ratio depending on soil moisture
    #[serde(rename = "lavergne20_c3")]
    Lavergne20C3,
    /// C4 photosynthesis with the PEPc Michaelis constant
    C4,
    /// C4 photosynthesis without photorespiration
    C4NoGamma,
}

impl OptimalChiMethod {
    pub fn is_c4(&self) -> bool {
        matches!(self, OptimalChiMethod::C4 | OptimalChiMethod::C4NoGamma)
    }

    /// Environment variables needed beyond the core forcing
    pub fn requires(&self) -> &'static [EnvVar] {
        match self {
            OptimalChiMethod::Lavergne20C3 => &[EnvVar::Theta],
            _ => &[],
        }
    }

    pub fn create(&self) -> Box<dyn OptimalChiModel> {
        match self {
            OptimalChiMethod::Prentice14 => Box::new(Prentice14),
            OptimalChiMethod::Lavergne20C3 => Box::new(Lavergne20C3),
            OptimalChiMethod::C4 => Box::new(C4),
            OptimalChiMethod::C4NoGamma => Box::new(C4NoGamma),
        }
    }
}

impl FromStr for OptimalChiMethod {
    type Err = RSPMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prentice14" => Ok(OptimalChiMethod::Prentice14),
            "lavergne20_c3" => Ok(OptimalChiMethod::Lavergne20C3),
            "c4" => Ok(OptimalChiMethod::C4),
            "c4_no_gamma" => Ok(OptimalChiMethod::C4NoGamma),
            _ => Err(RSPMError::unknown_method("optimal chi", s)),
        }
    }
}

/// ξ for C3 plants given the cost ratio β
fn c3_xi(env: &PModelEnvironment, beta: &Series) -> Series {
    Zip::from(beta)
        .and(&env.kmm)
        .and(&env.gammastar)
        .and(&env.ns_star)
        .map_collect(|&beta, &kmm, &gammastar, &ns_star| {
            (beta * (kmm + gammastar) / (1.6 * ns_star)).sqrt()
        })
}

/// χ and limitation terms for C3 plants
fn c3_estimate(env: &PModelEnvironment, xi: Series) -> OptimalChiEstimate {
    let chi = Zip::from(&xi)
        .and(&env.gammastar)
        .and(&env.ca)
        .and(&env.vpd)
        .map_collect(|&xi, &gammastar, &ca, &vpd| {
            gammastar / ca + (1.0 - gammastar / ca) * xi / (xi + vpd.sqrt())
        });
    let ci = &chi * &env.ca;

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

/// ξ for C4 plants with cost ratio β, limited by the PEPc Michaelis constant
fn c4_xi(env: &PModelEnvironment) -> Series {
    let beta = env.pmodel_const.beta_cost_ratio_c4;
    Zip::from(&env.kp_c4)
        .and(&env.ns_star)
        .map_collect(|&kp_c4, &ns_star| (beta * kp_c4 / (1.6 * ns_star)).sqrt())
}

fn c4_chi(env: &PModelEnvironment, xi: &Series) -> Series {
    Zip::from(xi)
        .and(&env.vpd)
        .map_collect(|&xi, &vpd| xi / (xi + vpd.sqrt()))
}

pub struct Prentice14;

impl OptimalChiModel for Prentice14 {
    fn method(&self) -> OptimalChiMethod {
        OptimalChiMethod::Prentice14
    }

    fn optimal_xi(&self, env: &PModelEnvironment) -> RSPMResult<Series> {
        let beta = Series::from_elem(
            env.shape(),
            env.pmodel_const.beta_cost_ratio_prentice14,
        );
        Ok(c3_xi(env, &beta))
    }

    fn estimate_from_xi(
        &self,
        env: &PModelEnvironment,
        xi: Series,
    ) -> RSPMResult<OptimalChiEstimate> {
        Ok(c3_estimate(env, xi))
    }
}

pub struct Lavergne20C3;

impl OptimalChiModel for Lavergne20C3 {
    fn method(&self) -> OptimalChiMethod {
        OptimalChiMethod::Lavergne20C3
    }

    fn optimal_xi(&self, env: &PModelEnvironment) -> RSPMResult<Series> {
        let theta = env.require(EnvVar::Theta)?;
        let a = env.pmodel_const.lavergne_2020_a_c3;
        let b = env.pmodel_const.lavergne_2020_b_c3;
        let beta = theta.mapv(|theta| (b * theta + a).exp());
        Ok(c3_xi(env, &beta))
    }

    fn estimate_from_xi(
        &self,
        env: &PModelEnvironment,
        xi: Series,
    ) -> RSPMResult<OptimalChiEstimate> {
        Ok(c3_estimate(env, xi))
    }
}

pub struct C4;

impl OptimalChiModel for C4 {
    fn method(&self) -> OptimalChiMethod {
        OptimalChiMethod::C4
    }

    fn optimal_xi(&self, env: &PModelEnvironment) -> RSPMResult<Series> {
        Ok(c4_xi(env))
    }

    fn estimate_from_xi(
        &self,
        env: &PModelEnvironment,
        xi: Series,
    ) -> RSPMResult<OptimalChiEstimate> {
        let chi = c4_chi(env, &xi);
        let ci = &chi * &env.ca;
        let ones = Series::ones(env.shape());
        Ok(OptimalChiEstimate {
            xi,
            chi,
            ci,
            mc: ones.clone(),
            mj: ones.clone(),
            mjoc: ones,
        })
    }
}

pub struct C4NoGamma;

impl OptimalChiModel for C4NoGamma {
    fn method(&self) -> OptimalChiMethod {
        OptimalChiMethod::C4NoGamma
    }

    fn optimal_xi(&self, env: &PModelEnvironment) -> RSPMResult<Series> {
        Ok(c4_xi(env))
    }

    fn estimate_from_xi(
        &self,
        env: &PModelEnvironment,
        xi: Series,
    ) -> RSPMResult<OptimalChiEstimate> {
        let chi = c4_chi(env, &xi);
        let ci = &chi * &env.ca;
        let mc = Zip::from(&ci)
            .and(&env.kp_c4)
            .map_collect(|&ci, &kp_c4| ci / (ci + kp_c4));
        let mjoc = mc.mapv(|mc| 1.0 / mc);
        Ok(OptimalChiEstimate {
            xi,
            chi,
            ci,
            mc,
            mj: Series::ones(env.shape()),
            mjoc,
        })
    }
}
