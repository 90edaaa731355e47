//! Limitation of light use efficiency by electron transport capacity
//!
//! Produces two factors: `f_j` scales Jmax and `f_v` scales Vcmax (and the light
//! use efficiency). Where a method is undefined for the CO2 limitation term `mj`
//! the factors are `NaN`.

use crate::optimal_chi::OptimalChiEstimate;
use rspm_core::constants::PModelConst;
use rspm_core::errors::RSPMError;
use rspm_core::timeseries::{FloatValue, Series};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JmaxLimitationMethod {
    /// Wang et al. (2017)
    #[default]
    Wang17,
    /// Smith et al. (2019)
    Smith19,
    /// No limitation
    Simple,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JmaxLimitation {
    pub f_j: Series,
    pub f_v: Series,
}

impl JmaxLimitationMethod {
    pub fn estimate(
        &self,
        optchi: &OptimalChiEstimate,
        pmodel_const: &PModelConst,
    ) -> JmaxLimitation {
        match self {
            JmaxLimitationMethod::Wang17 => {
                let c = pmodel_const.wang17_c;
                let defined = |mj: FloatValue| mj > c;
                JmaxLimitation {
                    f_j: optchi.mj.mapv(|mj| {
                        if defined(mj) {
                            ((mj / c).powf(2.0 / 3.0) - 1.0).sqrt()
                        } else {
                            FloatValue::NAN
                        }
                    }),
                    f_v: optchi.mj.mapv(|mj| {
                        if defined(mj) {
                            (1.0 - (c / mj).powf(2.0 / 3.0)).sqrt()
                        } else {
                            FloatValue::NAN
                        }
                    }),
                }
            }
            JmaxLimitationMethod::Smith19 => {
                let theta = pmodel_const.smith19_theta;
                let c_cost = pmodel_const.smith19_c_cost;
                let m_star = smith19_m_star(theta, c_cost);

                let f_j = optchi.mj.mapv(|mj| smith19_omega(theta, c_cost, m_star, mj));
                let f_v = f_j.mapv(|omega| {
                    let omega_star =
                        1.0 + omega - ((1.0 + omega).powi(2) - 4.0 * theta * omega).sqrt();
                    omega_star / (2.0 * theta)
                });
                JmaxLimitation { f_j, f_v }
            }
            JmaxLimitationMethod::Simple => JmaxLimitation {
                f_j: Series::ones(optchi.mj.raw_dim()),
                f_v: Series::ones(optchi.mj.raw_dim()),
            },
        }
    }
}

/// Threshold of `mj` at which the Smith et al. (2019) solution switches branch.
///
/// The smaller root of `P θ x^2 - P x + 1 = 0`. If the roots are complex their real
/// part is used.
fn smith19_m_star(theta: FloatValue, c_cost: FloatValue) -> FloatValue {
    let cap_p = (1.0_f64 / 1.4 - 0.7).powi(2) / (1.0 - theta) + 3.4;
    let a = cap_p * theta;
    let b = -cap_p;
    let discriminant = b * b - 4.0 * a;
    let root = if discriminant >= 0.0 {
        (-b - discriminant.sqrt()) / (2.0 * a)
    } else {
        -b / (2.0 * a)
    };
    4.0 * c_cost / root
}

fn smith19_omega(
    theta: FloatValue,
    c_cost: FloatValue,
    m_star: FloatValue,
    mj: FloatValue,
) -> FloatValue {
    let cm = 4.0 * c_cost / mj;
    let v = 1.0 / (cm * (1.0 - theta * cm)) - 4.0 * theta;
    let spread = ((1.0 - theta) * v).sqrt();
    if mj < m_star {
        -(1.0 - 2.0 * theta) - spread
    } else {
        -(1.0 - 2.0 * theta) + spread
    }
}

impl FromStr for JmaxLimitationMethod {
    type Err = RSPMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wang17" => Ok(JmaxLimitationMethod::Wang17),
            "smith19" => Ok(JmaxLimitationMethod::Smith19),
            "simple" => Ok(JmaxLimitationMethod::Simple),
            _ => Err(RSPMError::unknown_method("Jmax limitation", s)),
        }
    }
}
