//! Tests combining the acclimation window and the memory effect.
//!
//! These follow a subdaily series through the daily reduction, the memory effect and
//! the expansion back to subdaily timestamps.

use approx::assert_relative_eq;
use ndarray::{Array, Axis, IxDyn};
use rspm_core::errors::RSPMError;
use rspm_core::memory_effect::{memory_effect, MemoryEffect};
use rspm_core::scaler::{FillMethod, FillOptions, SubdailyScaler};
use rspm_core::timeseries::{Series, SECONDS_PER_DAY};

const HALF_HOUR: i64 = 1800;

fn half_hourly_scaler(days: usize) -> SubdailyScaler {
    let mut scaler = SubdailyScaler::regular(0, HALF_HOUR, 48 * days).unwrap();
    scaler.set_window(12 * 3600, 3600).unwrap();
    scaler
}

/// A value that steps up by one each day
fn daily_step(days: usize) -> Series {
    Array::from_shape_fn(48 * days, |i| (i / 48) as f64).into_dyn()
}

mod window_round_trip {
    use super::*;

    #[test]
    fn test_daily_values_survive_round_trip() {
        let scaler = half_hourly_scaler(4);
        let values = daily_step(4);

        let daily = scaler.daily_means(&values, false).unwrap();
        assert_eq!(daily.as_slice().unwrap(), &[0.0, 1.0, 2.0, 3.0]);

        let filled = scaler
            .fill_daily_to_subdaily(&daily, None, &FillOptions::default())
            .unwrap();
        assert_eq!(filled.shape(), values.shape());

        // The window ends at 13:00, observation 26 of each day
        for day in 1..4 {
            assert_eq!(filled[[day * 48 + 25]], (day - 1) as f64);
            assert_eq!(filled[[day * 48 + 26]], day as f64);
        }
    }

    #[test]
    fn test_realised_values_lag_optimal_values() {
        let scaler = half_hourly_scaler(10);
        let values = daily_step(10);

        let daily = scaler.daily_means(&values, false).unwrap();
        let realised = MemoryEffect::default().apply(&daily, None).unwrap();

        for (optimal, realised) in daily.iter().zip(realised.iter()).skip(1) {
            assert!(
                realised < optimal,
                "realised {} should lag optimal {}",
                realised,
                optimal
            );
        }
    }

    #[test]
    fn test_chunked_memory_effect_matches_single_pass() {
        let scaler = half_hourly_scaler(6);
        let daily = scaler.daily_means(&daily_step(6), false).unwrap();
        let alpha = 0.2;

        let whole = memory_effect(&daily, None, alpha, false).unwrap();

        let first = daily.slice_axis(Axis(0), (0..3).into()).to_owned();
        let second = daily.slice_axis(Axis(0), (3..6).into()).to_owned();
        let first_realised = memory_effect(&first, None, alpha, false).unwrap();
        let seed = first_realised.index_axis(Axis(0), 2).to_owned();
        let second_realised = memory_effect(&second, Some(&seed), alpha, false).unwrap();

        for t in 0..3 {
            assert_relative_eq!(whole[[t + 3]], second_realised[[t]], epsilon = 1e-12);
        }
    }
}

mod trailing_axes {
    use super::*;

    #[test]
    fn test_sites_are_independent() {
        let scaler = half_hourly_scaler(3);
        let values = Array::from_shape_fn((144, 3), |(t, site)| {
            if site == 1 && t / 48 == 1 {
                f64::NAN
            } else {
                (site * 10 + t / 48) as f64
            }
        })
        .into_dyn();

        let daily = scaler.daily_means(&values, false).unwrap();
        assert_eq!(daily.shape(), &[3, 3]);
        assert!(daily[[1, 1]].is_nan());

        assert!(matches!(
            memory_effect(&daily, None, 0.5, false),
            Err(RSPMError::InvalidInput(_))
        ));

        let realised = memory_effect(&daily, None, 0.5, true).unwrap();
        assert_eq!(realised[[1, 1]], realised[[0, 1]]);
        assert_eq!(realised[[2, 0]], 1.25);
        assert_eq!(realised[[2, 2]], 21.25);
    }

    #[test]
    fn test_linear_fill_with_sites() {
        let scaler = half_hourly_scaler(2);
        let daily = Array::from_shape_vec((2, 2), vec![0.0, 10.0, 48.0, 20.0])
            .unwrap()
            .into_dyn();
        let options = FillOptions {
            method: FillMethod::Linear,
            ..FillOptions::default()
        };

        let filled = scaler.fill_daily_to_subdaily(&daily, None, &options).unwrap();
        assert_eq!(filled.shape(), &[96, 2]);
        // Halfway between the two update times
        assert_eq!(filled[[50, 0]], 24.0);
        assert_eq!(filled[[50, 1]], 15.0);
        assert!(filled[[0, 0]].is_nan());
    }
}

mod offsets {
    use super::*;

    #[test]
    fn test_series_starting_mid_morning() {
        let start = 10 * SECONDS_PER_DAY + 9 * 3600;
        let mut scaler = SubdailyScaler::regular(start, HALF_HOUR, 96).unwrap();
        scaler.set_window(12 * 3600, 3600).unwrap();
        assert_eq!(scaler.n_days(), 3);
        assert_eq!(scaler.day_starts()[0], 10 * SECONDS_PER_DAY);

        let values = Series::ones(IxDyn(&[96]));
        let daily = scaler.daily_means(&values, false).unwrap();
        assert_eq!(daily[[0]], 1.0);
        assert_eq!(daily[[1]], 1.0);
        // The data end at 08:30 on the third day, before the window
        assert!(daily[[2]].is_nan());
    }

    #[test]
    fn test_misaligned_timestamps_are_rejected() {
        let result = SubdailyScaler::regular(600, HALF_HOUR, 96);
        assert!(matches!(result, Err(RSPMError::InvalidInput(_))));
    }
}
