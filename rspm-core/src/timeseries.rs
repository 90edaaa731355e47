//! Shared array types and element-wise helpers
//!
//! Forcing and model variables are held as dynamically-dimensioned arrays
//! ([`ndarray::ArrayD`]). When an array represents a time series the first axis is
//! time and any trailing axes (sites, grid cells, replicates) are processed
//! independently. Missing observations are represented by `NaN`.

use crate::errors::{RSPMError, RSPMResult};
use ndarray::{ArrayD, IxDyn, Zip};
use num::Float;

pub type FloatValue = f64;

/// An n-dimensional array of values, time first when it is a time series
pub type Series = ArrayD<FloatValue>;

/// Seconds since the Unix epoch (UTC)
pub type Timestamp = i64;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Create a 0-dimensional array holding a single value.
///
/// 0-d arrays broadcast against any shape in the element-wise helpers below.
pub fn scalar(value: FloatValue) -> Series {
    ArrayD::from_elem(IxDyn(&[]), value)
}

/// Does an array contain any missing values
pub fn has_missing<F: Float>(values: &ArrayD<F>) -> bool {
    values.iter().any(|v| v.is_nan())
}

/// Shape of a single time slice of a series (all axes except the first).
pub fn slice_shape(values: &Series) -> &[usize] {
    if values.ndim() == 0 {
        &[]
    } else {
        &values.shape()[1..]
    }
}

/// Number of entries along the time axis
pub fn time_length(values: &Series) -> usize {
    values.shape().first().copied().unwrap_or(1)
}

/// Check that an array has exactly the expected shape
pub fn check_shape(name: &str, values: &Series, expected: &[usize]) -> RSPMResult<()> {
    if values.shape() != expected {
        return Err(RSPMError::ShapeMismatch(format!(
            "{} has shape {:?}, expected {:?}",
            name,
            values.shape(),
            expected
        )));
    }
    Ok(())
}

/// Minimum of two values, propagating `NaN` from either side.
///
/// [`f64::min`] silently discards `NaN`, which would hide missing data.
pub fn nan_min(a: FloatValue, b: FloatValue) -> FloatValue {
    if a.is_nan() || b.is_nan() {
        FloatValue::NAN
    } else {
        a.min(b)
    }
}

/// Find the common shape of a set of arrays.
///
/// The target is the shape of the array with the most dimensions (and then the
/// most elements); every array must broadcast to it.
fn broadcast_shape(arrays: &[&Series]) -> RSPMResult<Vec<usize>> {
    let target = arrays
        .iter()
        .max_by_key(|a| (a.ndim(), a.len()))
        .map(|a| a.shape().to_vec())
        .unwrap_or_default();

    for array in arrays {
        if array.broadcast(IxDyn(&target)).is_none() {
            return Err(RSPMError::ShapeMismatch(format!(
                "cannot broadcast shape {:?} to {:?}",
                array.shape(),
                target
            )));
        }
    }
    Ok(target)
}

/// Apply a function element-wise over two arrays.
///
/// Arrays must either share a shape or broadcast to a common shape (typically a
/// 0-d array created with [`scalar`]).
pub fn zip_map2<F>(a: &Series, b: &Series, f: F) -> RSPMResult<Series>
where
    F: Fn(FloatValue, FloatValue) -> FloatValue,
{
    let shape = broadcast_shape(&[a, b])?;
    let dim = IxDyn(&shape);
    // Both broadcasts were validated by broadcast_shape
    match (a.broadcast(dim.clone()), b.broadcast(dim)) {
        (Some(a), Some(b)) => Ok(Zip::from(a).and(b).map_collect(|&x, &y| f(x, y))),
        _ => Err(RSPMError::ShapeMismatch(
            "arrays could not be broadcast together".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array};

    #[test]
    fn test_zip_map2_broadcasts_scalar() {
        let a = array![1.0, 2.0, 3.0].into_dyn();
        let result = zip_map2(&a, &scalar(2.0), |x, y| x * y).unwrap();
        assert_eq!(result, array![2.0, 4.0, 6.0].into_dyn());
    }

    #[test]
    fn test_zip_map2_broadcasts_trailing_axis() {
        let a = Array::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap()
            .into_dyn();
        let b = array![10.0, 20.0, 30.0].into_dyn();
        let result = zip_map2(&a, &b, |x, y| x + y).unwrap();
        assert_eq!(result.shape(), &[2, 3]);
        assert_eq!(result[[1, 2]], 36.0);
    }

    #[test]
    fn test_zip_map2_incompatible_shapes() {
        let a = array![1.0, 2.0, 3.0].into_dyn();
        let b = array![1.0, 2.0].into_dyn();
        assert!(matches!(
            zip_map2(&a, &b, |x, y| x + y),
            Err(RSPMError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_nan_min_propagates() {
        assert!(nan_min(FloatValue::NAN, 1.0).is_nan());
        assert!(nan_min(1.0, FloatValue::NAN).is_nan());
        assert_eq!(nan_min(1.0, 2.0), 1.0);
    }

    #[test]
    fn test_slice_shape() {
        let a = Series::zeros(IxDyn(&[5, 2, 3]));
        assert_eq!(slice_shape(&a), &[2, 3]);
        assert_eq!(time_length(&a), 5);
        assert!(!has_missing(&a));
    }

    #[test]
    fn test_has_missing() {
        assert!(has_missing(&array![1.0, FloatValue::NAN].into_dyn()));
        assert!(has_missing(&array![f32::NAN].into_dyn()));
        assert!(!has_missing(&scalar(0.0)));
    }
}
