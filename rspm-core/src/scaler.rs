//! Acclimation windows and conversion between subdaily and daily time scales
//!
//! A [`SubdailyScaler`] holds the timestamps of a regular subdaily time series and an
//! inclusion rule that selects which observations within each day form the
//! acclimation window. It provides the two conversions used by the acclimation
//! pipeline:
//!
//! * [`SubdailyScaler::daily_means`] reduces a subdaily series to one value per day,
//!   averaging over the acclimation window.
//! * [`SubdailyScaler::fill_daily_to_subdaily`] expands one value per day back onto
//!   the subdaily timestamps.
//!
//! # Padding
//!
//! Series do not need to start or end at midnight. Internally the observations are
//! padded with missing values to whole days, so a window that falls outside the data
//! on the first or last day is treated as missing.
//!
//! ```rust
//! use ndarray::Array;
//! use rspm_core::scaler::SubdailyScaler;
//!
//! // Two days of hourly data
//! let mut scaler = SubdailyScaler::regular(0, 3600, 48).unwrap();
//! scaler.set_window(12 * 3600, 3600).unwrap();
//!
//! let values = Array::range(0.0, 48.0, 1.0).into_dyn();
//! let daily = scaler.daily_means(&values, false).unwrap();
//! assert_eq!(daily.as_slice().unwrap(), &[12.0, 36.0]);
//! ```

use crate::errors::{RSPMError, RSPMResult};
use crate::timeseries::{slice_shape, time_length, FloatValue, Series, Timestamp, SECONDS_PER_DAY};
use ndarray::{Array1, ArrayD, Axis, IxDyn, Zip};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How daily values are expanded onto subdaily timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMethod {
    /// Hold each daily value from its update time until the next update
    #[default]
    Previous,
    /// Interpolate linearly between update times
    Linear,
}

impl FromStr for FillMethod {
    type Err = RSPMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "previous" => Ok(FillMethod::Previous),
            "linear" => Ok(FillMethod::Linear),
            _ => Err(RSPMError::unknown_method("fill", s)),
        }
    }
}

/// Point within the acclimation window at which daily values take effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePoint {
    /// The last observation in the window
    #[default]
    Max,
    /// The mean time of the observations in the window
    Mean,
}

impl FromStr for UpdatePoint {
    type Err = RSPMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max" => Ok(UpdatePoint::Max),
            "mean" => Ok(UpdatePoint::Mean),
            _ => Err(RSPMError::unknown_method("update point", s)),
        }
    }
}

/// Options for [`SubdailyScaler::fill_daily_to_subdaily`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FillOptions {
    pub method: FillMethod,
    pub update_point: UpdatePoint,
    /// Seconds after midnight at which daily values take effect.
    ///
    /// Overrides `update_point` when set.
    pub fill_from: Option<i64>,
}

/// Regular subdaily timestamps with a daily acclimation window
#[derive(Debug, Clone)]
pub struct SubdailyScaler {
    datetimes: Array1<Timestamp>,
    /// Seconds between observations
    spacing: i64,
    obs_per_day: usize,
    /// Missing observations added before the first timestamp to reach midnight
    start_padding: usize,
    /// Missing observations added after the last timestamp to complete the day
    end_padding: usize,
    n_days: usize,
    /// Midnight of each day covered by the data
    day_starts: Vec<Timestamp>,
    include: Option<Vec<bool>>,
}

impl SubdailyScaler {
    /// Create a scaler from a set of timestamps.
    ///
    /// Timestamps must be strictly increasing and evenly spaced, and the spacing must
    /// divide a day exactly.
    pub fn new(datetimes: Array1<Timestamp>) -> RSPMResult<Self> {
        if datetimes.len() < 2 {
            return Err(RSPMError::InvalidInput(
                "at least two timestamps are needed to determine the sampling frequency"
                    .to_string(),
            ));
        }

        let spacing = datetimes[1] - datetimes[0];
        if spacing <= 0 {
            return Err(RSPMError::InvalidInput(
                "timestamps must be strictly increasing".to_string(),
            ));
        }
        if datetimes
            .windows(2)
            .into_iter()
            .any(|pair| pair[1] - pair[0] != spacing)
        {
            return Err(RSPMError::InvalidInput(
                "timestamps are not evenly spaced".to_string(),
            ));
        }
        if SECONDS_PER_DAY % spacing != 0 {
            return Err(RSPMError::InvalidInput(format!(
                "a spacing of {} seconds does not divide a day",
                spacing
            )));
        }

        let obs_per_day = (SECONDS_PER_DAY / spacing) as usize;
        let first_midnight = datetimes[0].div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY;
        let since_midnight = datetimes[0] - first_midnight;
        if since_midnight % spacing != 0 {
            return Err(RSPMError::InvalidInput(format!(
                "timestamps are not aligned to a {} second grid from midnight",
                spacing
            )));
        }
        let start_padding = (since_midnight / spacing) as usize;
        let padded_length = start_padding + datetimes.len();
        let n_days = padded_length.div_ceil(obs_per_day);
        let end_padding = n_days * obs_per_day - padded_length;

        let day_starts = (0..n_days as i64)
            .map(|day| first_midnight + day * SECONDS_PER_DAY)
            .collect();

        log::debug!(
            "Subdaily scaler: {} observations per day over {} days",
            obs_per_day,
            n_days
        );

        Ok(Self {
            datetimes,
            spacing,
            obs_per_day,
            start_padding,
            end_padding,
            n_days,
            day_starts,
            include: None,
        })
    }

    /// Create a scaler for `count` observations every `spacing` seconds from `start`.
    pub fn regular(start: Timestamp, spacing: i64, count: usize) -> RSPMResult<Self> {
        let datetimes = Array1::from_iter((0..count as i64).map(|i| start + i * spacing));
        Self::new(datetimes)
    }

    pub fn datetimes(&self) -> &Array1<Timestamp> {
        &self.datetimes
    }

    pub fn n_datetimes(&self) -> usize {
        self.datetimes.len()
    }

    pub fn n_days(&self) -> usize {
        self.n_days
    }

    /// Midnight of each day covered by the timestamps
    pub fn day_starts(&self) -> &[Timestamp] {
        &self.day_starts
    }

    /// Has an acclimation window been set
    pub fn is_configured(&self) -> bool {
        self.include.is_some()
    }

    /// Seconds after midnight of each observation in a day
    fn sample_offsets(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.obs_per_day as i64).map(move |i| i * self.spacing)
    }

    fn set_validated_include(&mut self, include: Vec<bool>) -> RSPMResult<()> {
        if !include.iter().any(|&v| v) {
            return Err(RSPMError::InvalidInput(
                "the acclimation window does not include any observations".to_string(),
            ));
        }
        self.include = Some(include);
        Ok(())
    }

    /// Include all observations within `half_width` seconds of `center` seconds after
    /// midnight.
    ///
    /// The window must lie within a single day.
    pub fn set_window(&mut self, center: i64, half_width: i64) -> RSPMResult<()> {
        let window_start = center - half_width;
        let window_end = center + half_width;
        if half_width < 0 || window_start < 0 || window_end > SECONDS_PER_DAY {
            return Err(RSPMError::InvalidInput(format!(
                "window from {} to {} seconds does not lie within a day",
                window_start, window_end
            )));
        }

        let include = self
            .sample_offsets()
            .map(|offset| offset >= window_start && offset <= window_end)
            .collect();
        self.set_validated_include(include)
    }

    /// Set the acclimation window directly, one flag per observation in a day.
    pub fn set_include(&mut self, include: Vec<bool>) -> RSPMResult<()> {
        if include.len() != self.obs_per_day {
            return Err(RSPMError::ShapeMismatch(format!(
                "include has {} entries but there are {} observations per day",
                include.len(),
                self.obs_per_day
            )));
        }
        self.set_validated_include(include)
    }

    /// Use the single observation closest to `time` seconds after midnight.
    pub fn set_nearest(&mut self, time: i64) -> RSPMResult<()> {
        if !(0..SECONDS_PER_DAY).contains(&time) {
            return Err(RSPMError::InvalidInput(format!(
                "{} seconds is not a time of day",
                time
            )));
        }

        let nearest = self
            .sample_offsets()
            .enumerate()
            .min_by_key(|(_, offset)| (offset - time).abs())
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        let include = (0..self.obs_per_day).map(|idx| idx == nearest).collect();
        self.set_validated_include(include)
    }

    fn include(&self) -> RSPMResult<&[bool]> {
        self.include
            .as_deref()
            .ok_or_else(|| RSPMError::NotConfigured("the acclimation window".to_string()))
    }

    /// Map a position in the padded daily grid onto an observation index
    fn observation_index(&self, day: usize, position: usize) -> Option<usize> {
        let padded = day * self.obs_per_day + position;
        padded
            .checked_sub(self.start_padding)
            .filter(|&idx| idx < self.datetimes.len())
    }

    fn check_leading_axis(&self, name: &str, values: &Series, expected: usize) -> RSPMResult<()> {
        if values.ndim() == 0 || time_length(values) != expected {
            return Err(RSPMError::ShapeMismatch(format!(
                "{} has shape {:?} but {} entries are expected along the time axis",
                name,
                values.shape(),
                expected
            )));
        }
        Ok(())
    }

    /// Average a subdaily series over the acclimation window of each day.
    ///
    /// # Arguments
    ///
    /// * `values` - Series with time along the first axis, matching the timestamps
    /// * `allow_partial` - Ignore missing values within a window. Days with no values
    ///   at all are still missing. Otherwise any missing value (including padding)
    ///   makes the daily mean missing.
    pub fn daily_means(&self, values: &Series, allow_partial: bool) -> RSPMResult<Series> {
        let include = self.include()?;
        self.check_leading_axis("values", values, self.n_datetimes())?;

        let trailing = slice_shape(values).to_vec();
        let mut out_shape = vec![self.n_days];
        out_shape.extend_from_slice(&trailing);
        let mut means = Series::zeros(IxDyn(&out_shape));

        let window: Vec<usize> = include
            .iter()
            .enumerate()
            .filter_map(|(position, &included)| included.then_some(position))
            .collect();

        for (day, mut day_mean) in means.axis_iter_mut(Axis(0)).enumerate() {
            let mut sum = ArrayD::<FloatValue>::zeros(IxDyn(&trailing));
            let mut count = ArrayD::<FloatValue>::zeros(IxDyn(&trailing));
            let mut padded = false;

            for &position in &window {
                match self.observation_index(day, position) {
                    Some(idx) => {
                        let observation = values.index_axis(Axis(0), idx);
                        Zip::from(&mut sum)
                            .and(&mut count)
                            .and(&observation)
                            .for_each(|s, c, &v| {
                                if !(allow_partial && v.is_nan()) {
                                    *s += v;
                                    *c += 1.0;
                                }
                            });
                    }
                    None => padded = true,
                }
            }

            if padded && !allow_partial {
                day_mean.fill(FloatValue::NAN);
            } else {
                Zip::from(&mut day_mean)
                    .and(&sum)
                    .and(&count)
                    .for_each(|m, &s, &c| {
                        *m = if c > 0.0 { s / c } else { FloatValue::NAN };
                    });
            }
        }

        Ok(means)
    }

    /// Timestamps at which each daily value takes effect
    fn update_times(&self, options: &FillOptions) -> RSPMResult<Vec<Timestamp>> {
        let offset = match options.fill_from {
            Some(fill_from) => {
                if !(0..SECONDS_PER_DAY).contains(&fill_from) {
                    return Err(RSPMError::InvalidInput(format!(
                        "fill_from of {} seconds is not a time of day",
                        fill_from
                    )));
                }
                fill_from
            }
            None => {
                let included: Vec<i64> = self
                    .sample_offsets()
                    .zip(self.include()?.iter())
                    .filter_map(|(offset, &included)| included.then_some(offset))
                    .collect();
                match options.update_point {
                    UpdatePoint::Max => included.iter().copied().max().unwrap_or(0),
                    UpdatePoint::Mean => {
                        included.iter().sum::<i64>() / included.len().max(1) as i64
                    }
                }
            }
        };
        Ok(self.day_starts.iter().map(|start| start + offset).collect())
    }

    /// Expand one value per day back onto the subdaily timestamps.
    ///
    /// # Arguments
    ///
    /// * `values` - Daily values with one entry per day along the first axis
    /// * `previous` - Value to use before the first update, for example the last
    ///   realised value of an earlier run. Only supported with [`FillMethod::Previous`].
    /// * `options` - Fill method and the time at which daily values take effect
    ///
    /// With [`FillMethod::Previous`] the last daily value is held until the end of the
    /// series. With [`FillMethod::Linear`] times outside the update times are missing.
    pub fn fill_daily_to_subdaily(
        &self,
        values: &Series,
        previous: Option<&Series>,
        options: &FillOptions,
    ) -> RSPMResult<Series> {
        if previous.is_some() && options.method != FillMethod::Previous {
            return Err(RSPMError::NotImplemented(
                "a previous value can only be used with the previous fill method".to_string(),
            ));
        }
        self.check_leading_axis("daily values", values, self.n_days)?;
        let trailing = slice_shape(values).to_vec();
        if let Some(previous) = previous {
            if previous.shape() != trailing.as_slice() {
                return Err(RSPMError::ShapeMismatch(format!(
                    "previous value has shape {:?} but daily values have slices of shape {:?}",
                    previous.shape(),
                    trailing
                )));
            }
        }
        let update_times = self.update_times(options)?;

        let mut out_shape = vec![self.n_datetimes()];
        out_shape.extend_from_slice(&trailing);
        let mut filled = Series::from_elem(IxDyn(&out_shape), FloatValue::NAN);

        for (&time, mut slot) in self.datetimes.iter().zip(filled.axis_iter_mut(Axis(0))) {
            // Number of updates at or before this time
            let k = update_times.partition_point(|&update| update <= time);
            match options.method {
                FillMethod::Previous => {
                    if k > 0 {
                        slot.assign(&values.index_axis(Axis(0), k - 1));
                    } else if let Some(previous) = previous {
                        slot.assign(previous);
                    }
                }
                FillMethod::Linear => {
                    if k == 0 {
                        continue;
                    }
                    if k == update_times.len() {
                        if time == update_times[k - 1] {
                            slot.assign(&values.index_axis(Axis(0), k - 1));
                        }
                        continue;
                    }
                    let lower = update_times[k - 1];
                    let upper = update_times[k];
                    let weight = (time - lower) as FloatValue / (upper - lower) as FloatValue;
                    Zip::from(&mut slot)
                        .and(&values.index_axis(Axis(0), k - 1))
                        .and(&values.index_axis(Axis(0), k))
                        .for_each(|out, &a, &b| *out = a + weight * (b - a));
                }
            }
        }

        Ok(filled)
    }

    /// Number of padding observations added at the start and end of the series
    pub fn padding(&self) -> (usize, usize) {
        (self.start_padding, self.end_padding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::scalar;
    use ndarray::{array, Array};

    const HOUR: i64 = 3600;

    fn hourly(days: usize) -> SubdailyScaler {
        SubdailyScaler::regular(0, HOUR, 24 * days).unwrap()
    }

    #[test]
    fn test_new_validates_spacing() {
        assert!(matches!(
            SubdailyScaler::new(array![0]),
            Err(RSPMError::InvalidInput(_))
        ));
        assert!(matches!(
            SubdailyScaler::new(array![0, 3600, 7300]),
            Err(RSPMError::InvalidInput(_))
        ));
        // 7 hours does not divide a day
        assert!(matches!(
            SubdailyScaler::regular(0, 7 * HOUR, 10),
            Err(RSPMError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_padding() {
        // Starts at 06:00 on day 0 and ends at 17:00 on day 1
        let scaler = SubdailyScaler::regular(6 * HOUR, HOUR, 36).unwrap();
        assert_eq!(scaler.n_days(), 2);
        assert_eq!(scaler.padding(), (6, 6));
        assert_eq!(scaler.day_starts(), &[0, SECONDS_PER_DAY]);
    }

    #[test]
    fn test_set_window() {
        let mut scaler = hourly(1);
        scaler.set_window(12 * HOUR, HOUR).unwrap();
        assert!(scaler.is_configured());

        let included: Vec<usize> = scaler
            .include()
            .unwrap()
            .iter()
            .enumerate()
            .filter_map(|(idx, &v)| v.then_some(idx))
            .collect();
        assert_eq!(included, vec![11, 12, 13]);

        assert!(matches!(
            scaler.set_window(HOUR, 2 * HOUR),
            Err(RSPMError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_set_include_and_nearest() {
        let mut scaler = hourly(1);
        assert!(matches!(
            scaler.set_include(vec![true; 12]),
            Err(RSPMError::ShapeMismatch(_))
        ));
        assert!(matches!(
            scaler.set_include(vec![false; 24]),
            Err(RSPMError::InvalidInput(_))
        ));

        scaler.set_nearest(12 * HOUR + 1000).unwrap();
        assert_eq!(
            scaler.include().unwrap().iter().position(|&v| v),
            Some(12)
        );
    }

    #[test]
    fn test_daily_means_requires_window() {
        let scaler = hourly(1);
        let values = Array::zeros(IxDyn(&[24]));
        assert!(matches!(
            scaler.daily_means(&values, false),
            Err(RSPMError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_daily_means_checks_length() {
        let mut scaler = hourly(1);
        scaler.set_window(12 * HOUR, HOUR).unwrap();
        let values = Array::zeros(IxDyn(&[23]));
        assert!(matches!(
            scaler.daily_means(&values, false),
            Err(RSPMError::ShapeMismatch(_))
        ));
        assert!(matches!(
            scaler.daily_means(&scalar(1.0), false),
            Err(RSPMError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_daily_means_partial_data() {
        let mut scaler = hourly(2);
        scaler.set_window(12 * HOUR, HOUR).unwrap();
        let mut values = Array::range(0.0, 48.0, 1.0).into_dyn();
        values[[11]] = FloatValue::NAN;

        let strict = scaler.daily_means(&values, false).unwrap();
        assert!(strict[[0]].is_nan());
        assert_eq!(strict[[1]], 36.0);

        let partial = scaler.daily_means(&values, true).unwrap();
        assert_eq!(partial[[0]], 12.5);
    }

    #[test]
    fn test_daily_means_padding_is_missing() {
        // Data starts at 12:00 so the first window is only partly observed
        let mut scaler = SubdailyScaler::regular(12 * HOUR, HOUR, 36).unwrap();
        scaler.set_window(12 * HOUR, HOUR).unwrap();
        let values = Array::from_elem(IxDyn(&[36]), 1.0);

        let strict = scaler.daily_means(&values, false).unwrap();
        assert!(strict[[0]].is_nan());
        assert_eq!(strict[[1]], 1.0);

        let partial = scaler.daily_means(&values, true).unwrap();
        assert_eq!(partial[[0]], 1.0);
    }

    #[test]
    fn test_daily_means_trailing_axes() {
        let mut scaler = hourly(1);
        scaler.set_nearest(6 * HOUR).unwrap();
        let values = Array::from_shape_fn((24, 2), |(t, site)| (t * 10 + site) as f64).into_dyn();
        let daily = scaler.daily_means(&values, false).unwrap();
        assert_eq!(daily.shape(), &[1, 2]);
        assert_eq!(daily[[0, 1]], 61.0);
    }

    #[test]
    fn test_fill_previous() {
        let mut scaler = hourly(2);
        scaler.set_window(12 * HOUR, HOUR).unwrap();
        let daily = array![1.0, 2.0].into_dyn();

        let filled = scaler
            .fill_daily_to_subdaily(&daily, None, &FillOptions::default())
            .unwrap();
        assert_eq!(filled.shape(), &[48]);
        // Updates take effect at the end of the window, 13:00
        assert!(filled[[12]].is_nan());
        assert_eq!(filled[[13]], 1.0);
        assert_eq!(filled[[36]], 1.0);
        assert_eq!(filled[[37]], 2.0);
        assert_eq!(filled[[47]], 2.0);

        let seeded = scaler
            .fill_daily_to_subdaily(&daily, Some(&scalar(0.5)), &FillOptions::default())
            .unwrap();
        assert_eq!(seeded[[0]], 0.5);
        assert_eq!(seeded[[12]], 0.5);
    }

    #[test]
    fn test_fill_update_point_and_fill_from() {
        let mut scaler = hourly(2);
        scaler.set_window(12 * HOUR, HOUR).unwrap();
        let daily = array![1.0, 2.0].into_dyn();

        let mean = FillOptions {
            update_point: UpdatePoint::Mean,
            ..FillOptions::default()
        };
        let filled = scaler.fill_daily_to_subdaily(&daily, None, &mean).unwrap();
        assert!(filled[[11]].is_nan());
        assert_eq!(filled[[12]], 1.0);

        let midnight = FillOptions {
            fill_from: Some(0),
            ..FillOptions::default()
        };
        let filled = scaler.fill_daily_to_subdaily(&daily, None, &midnight).unwrap();
        assert_eq!(filled[[0]], 1.0);
        assert_eq!(filled[[24]], 2.0);

        let invalid = FillOptions {
            fill_from: Some(SECONDS_PER_DAY),
            ..FillOptions::default()
        };
        assert!(matches!(
            scaler.fill_daily_to_subdaily(&daily, None, &invalid),
            Err(RSPMError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_fill_linear() {
        let mut scaler = hourly(3);
        scaler.set_nearest(12 * HOUR).unwrap();
        let daily = array![0.0, 24.0, 48.0].into_dyn();
        let options = FillOptions {
            method: FillMethod::Linear,
            ..FillOptions::default()
        };

        let filled = scaler.fill_daily_to_subdaily(&daily, None, &options).unwrap();
        assert!(filled[[11]].is_nan());
        assert_eq!(filled[[12]], 0.0);
        assert_eq!(filled[[18]], 6.0);
        assert_eq!(filled[[60]], 48.0);
        assert!(filled[[61]].is_nan());
    }

    #[test]
    fn test_fill_errors() {
        let mut scaler = hourly(2);
        scaler.set_window(12 * HOUR, HOUR).unwrap();
        let linear = FillOptions {
            method: FillMethod::Linear,
            ..FillOptions::default()
        };

        // Unsupported combinations are reported before shapes are checked
        let wrong_length = array![1.0, 2.0, 3.0].into_dyn();
        assert!(matches!(
            scaler.fill_daily_to_subdaily(&wrong_length, Some(&scalar(0.0)), &linear),
            Err(RSPMError::NotImplemented(_))
        ));
        assert!(matches!(
            scaler.fill_daily_to_subdaily(&wrong_length, None, &FillOptions::default()),
            Err(RSPMError::ShapeMismatch(_))
        ));

        let daily = array![1.0, 2.0].into_dyn();
        let bad_seed = array![1.0, 2.0].into_dyn();
        assert!(matches!(
            scaler.fill_daily_to_subdaily(&daily, Some(&bad_seed), &FillOptions::default()),
            Err(RSPMError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_parse_options() {
        assert_eq!("linear".parse::<FillMethod>().unwrap(), FillMethod::Linear);
        assert_eq!("mean".parse::<UpdatePoint>().unwrap(), UpdatePoint::Mean);
        assert!(matches!(
            "cubic".parse::<FillMethod>(),
            Err(RSPMError::UnknownMethod { .. })
        ));
    }
}
