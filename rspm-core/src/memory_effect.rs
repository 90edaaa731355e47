//! Memory effect on slowly acclimating parameters
//!
//! Photosynthetic capacity does not track the daily optimum instantaneously. The
//! realised value of a parameter is an exponentially weighted moving average of the
//! daily optimal values:
//!
//! ```text
//! R[0] = O[0]                         (no previous value)
//! R[0] = S (1 - α) + O[0] α           (previous realised value S)
//! R[t] = R[t - 1] (1 - α) + O[t] α
//! ```
//!
//! `α` lies in (0, 1]. At `α = 1` the realised values equal the optimal values and as
//! `α` approaches zero they retain the first value.
//!
//! # Missing data
//!
//! Missing values are rejected unless holdover is enabled. With holdover, each
//! element is handled independently at each step after the first:
//!
//! | R[t - 1] | O[t]    | R[t]      |
//! |----------|---------|-----------|
//! | missing  | missing | missing   |
//! | missing  | present | O[t]      |
//! | present  | missing | R[t - 1]  |
//! | present  | present | weighted  |

use crate::errors::{RSPMError, RSPMResult};
use crate::timeseries::{has_missing, FloatValue, Series};
use ndarray::{ArrayD, Axis, Zip};
use num::Float;
use serde::{Deserialize, Serialize};

fn blend<F: Float>(previous: F, current: F, alpha: F) -> F {
    previous * (F::one() - alpha) + current * alpha
}

fn blend_with_holdover<F: Float>(previous: F, current: F, alpha: F) -> F {
    match (previous.is_nan(), current.is_nan()) {
        (true, _) => current,
        (false, true) => previous,
        (false, false) => blend(previous, current, alpha),
    }
}

/// Apply the memory effect along the first axis of `values`.
///
/// # Arguments
///
/// * `values` - Optimal values with time along the first axis. Trailing axes are
///   processed independently.
/// * `previous` - Realised value from before the first time step, with the shape of a
///   single time slice
/// * `alpha` - Weight given to the newest optimal value, in (0, 1]
/// * `allow_holdover` - Carry realised values across missing data instead of failing
///
/// # Examples
///
/// ```rust
/// use ndarray::array;
/// use rspm_core::memory_effect::memory_effect;
///
/// let optimal = array![1.0, 2.0, 3.0].into_dyn();
/// let realised = memory_effect(&optimal, None, 0.5, false).unwrap();
/// assert_eq!(realised.as_slice().unwrap(), &[1.0, 1.5, 2.25]);
/// ```
pub fn memory_effect<F: Float>(
    values: &ArrayD<F>,
    previous: Option<&ArrayD<F>>,
    alpha: F,
    allow_holdover: bool,
) -> RSPMResult<ArrayD<F>> {
    if !(alpha > F::zero() && alpha <= F::one()) {
        return Err(RSPMError::InvalidInput(
            "alpha must be greater than zero and no more than one".to_string(),
        ));
    }
    let n_steps = values.shape().first().copied().unwrap_or(0);
    if n_steps == 0 {
        return Err(RSPMError::InvalidInput(
            "the memory effect needs at least one time step".to_string(),
        ));
    }
    if let Some(previous) = previous {
        if previous.shape() != &values.shape()[1..] {
            return Err(RSPMError::ShapeMismatch(format!(
                "previous values have shape {:?} but time slices have shape {:?}",
                previous.shape(),
                &values.shape()[1..]
            )));
        }
    }
    if !allow_holdover && has_missing(values) {
        return Err(RSPMError::InvalidInput(
            "missing values found but holdover is not allowed".to_string(),
        ));
    }

    let step = if allow_holdover {
        blend_with_holdover::<F>
    } else {
        blend::<F>
    };

    let mut realised = values.to_owned();

    if let Some(previous) = previous {
        let mut first = realised.index_axis_mut(Axis(0), 0);
        // Holdover applies between steps only; a missing seed or first value stays missing.
        Zip::from(&mut first)
            .and(previous)
            .for_each(|r, &p| *r = blend(p, *r, alpha));
    }

    for t in 1..n_steps {
        let (before, mut after) = realised.view_mut().split_at(Axis(0), t);
        let last = before.index_axis(Axis(0), t - 1);
        let mut current = after.index_axis_mut(Axis(0), 0);
        Zip::from(&mut current)
            .and(&last)
            .for_each(|r, &p| *r = step(p, *r, alpha));
    }

    Ok(realised)
}

/// Configuration of the memory effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryEffect {
    /// Weight of the newest optimal value
    /// default: 1 / 15
    pub alpha: FloatValue,
    /// Carry realised values across missing data
    /// default: false
    pub allow_holdover: bool,
}

impl Default for MemoryEffect {
    fn default() -> Self {
        Self {
            alpha: 1.0 / 15.0,
            allow_holdover: false,
        }
    }
}

impl MemoryEffect {
    pub fn apply(&self, values: &Series, previous: Option<&Series>) -> RSPMResult<Series> {
        memory_effect(values, previous, self.alpha, self.allow_holdover)
    }
}
