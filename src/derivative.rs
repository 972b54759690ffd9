//! # Differentiation and Smoothing
//!
//! Per-component time differentiation of channel data. Velocities and
//! accelerations are expressed per second by scaling sample-step differences
//! with the sampling rate. Rows whose stencil reaches outside the series are
//! null, so trial boundaries never leak into each other when transforms are
//! applied per trial segment.

use crate::savgol::{pad_series, savgol_series, Padding};
use crate::transform::TransformError;

/// Differentiation method for velocity computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VelocityMethod {
    /// Backward difference over one sample step. The first row is null.
    Preceding,
    /// Central difference over two sample steps. The first and last rows are
    /// null.
    Neighbors,
    /// Five-point central difference. Two rows at each end are null.
    #[default]
    FivePoint,
    /// Savitzky-Golay first derivative. Requires `window_length` and
    /// `degree`.
    SavitzkyGolay,
}

impl VelocityMethod {
    /// Parses a velocity method name.
    pub fn parse(name: &str) -> Result<Self, TransformError> {
        match name {
            "preceding" => Ok(Self::Preceding),
            "neighbors" => Ok(Self::Neighbors),
            "fivepoint" | "smooth" => Ok(Self::FivePoint),
            "savitzky_golay" => Ok(Self::SavitzkyGolay),
            other => Err(TransformError::UnknownMethod {
                parameter: "method",
                method: other.to_string(),
                valid: "preceding, neighbors, fivepoint, smooth, savitzky_golay",
            }),
        }
    }
}

/// Smoothing method for channel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmoothMethod {
    /// Centered rolling mean over the full window.
    #[default]
    MovingAverage,
    /// Exponentially weighted mean with `alpha = 2 / (window_length + 1)`.
    ExponentialMovingAverage,
    /// Savitzky-Golay smoothing (zeroth derivative). Requires `degree`.
    SavitzkyGolay,
}

impl SmoothMethod {
    /// Parses a smoothing method name.
    pub fn parse(name: &str) -> Result<Self, TransformError> {
        match name {
            "moving_average" => Ok(Self::MovingAverage),
            "exponential_moving_average" => Ok(Self::ExponentialMovingAverage),
            "savitzky_golay" => Ok(Self::SavitzkyGolay),
            other => Err(TransformError::UnknownMethod {
                parameter: "method",
                method: other.to_string(),
                valid: "moving_average, exponential_moving_average, savitzky_golay",
            }),
        }
    }
}

/// Differentiates position components into velocity components.
pub(crate) fn pos2vel(
    components: &[Vec<Option<f64>>],
    method: VelocityMethod,
    rate: f64,
    window_length: Option<usize>,
    degree: Option<usize>,
    padding: &Padding,
) -> Result<Vec<Vec<Option<f64>>>, TransformError> {
    check_rate(rate)?;
    components
        .iter()
        .map(|series| match method {
            VelocityMethod::Preceding => Ok(preceding_diff(series, rate)),
            VelocityMethod::Neighbors => Ok(neighbors_diff(series, rate)),
            VelocityMethod::FivePoint => Ok(fivepoint_diff(series, rate)),
            VelocityMethod::SavitzkyGolay => {
                let window = required(window_length, "window_length", "savitzky_golay")?;
                let degree = required(degree, "degree", "savitzky_golay")?;
                savgol_series(series, window, degree, 1, rate, padding)
            }
        })
        .collect()
}

/// Differentiates position components into acceleration components using the
/// Savitzky-Golay second derivative.
pub(crate) fn pos2acc(
    components: &[Vec<Option<f64>>],
    rate: f64,
    window_length: usize,
    degree: usize,
    padding: &Padding,
) -> Result<Vec<Vec<Option<f64>>>, TransformError> {
    check_rate(rate)?;
    components
        .iter()
        .map(|series| savgol_series(series, window_length, degree, 2, rate, padding))
        .collect()
}

/// Smooths channel components with the given method.
pub(crate) fn smooth(
    components: &[Vec<Option<f64>>],
    method: SmoothMethod,
    window_length: usize,
    degree: Option<usize>,
    padding: &Padding,
) -> Result<Vec<Vec<Option<f64>>>, TransformError> {
    if window_length == 0 {
        return Err(TransformError::InvalidParameter {
            parameter: "window_length",
            reason: "must be greater than zero, but is 0".to_string(),
        });
    }
    components
        .iter()
        .map(|series| match method {
            SmoothMethod::MovingAverage => Ok(moving_average(series, window_length, padding)),
            SmoothMethod::ExponentialMovingAverage => {
                Ok(exponential_moving_average(series, window_length, padding))
            }
            SmoothMethod::SavitzkyGolay => {
                let degree = required(degree, "degree", "savitzky_golay")?;
                savgol_series(series, window_length, degree, 0, 1.0, padding)
            }
        })
        .collect()
}

fn required<T>(
    value: Option<T>,
    parameter: &'static str,
    method: &'static str,
) -> Result<T, TransformError> {
    value.ok_or(TransformError::MissingMethodParameter { parameter, method })
}

fn check_rate(rate: f64) -> Result<(), TransformError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(TransformError::InvalidParameter {
            parameter: "sampling_rate",
            reason: format!("must be a positive finite number, but is {rate}"),
        });
    }
    Ok(())
}

fn preceding_diff(series: &[Option<f64>], rate: f64) -> Vec<Option<f64>> {
    (0..series.len())
        .map(|i| {
            if i == 0 {
                return None;
            }
            Some((series[i]? - series[i - 1]?) * rate)
        })
        .collect()
}

fn neighbors_diff(series: &[Option<f64>], rate: f64) -> Vec<Option<f64>> {
    let n = series.len();
    (0..n)
        .map(|i| {
            if i == 0 || i + 1 == n {
                return None;
            }
            Some((series[i + 1]? - series[i - 1]?) * rate / 2.0)
        })
        .collect()
}

fn fivepoint_diff(series: &[Option<f64>], rate: f64) -> Vec<Option<f64>> {
    let n = series.len();
    (0..n)
        .map(|i| {
            if i < 2 || i + 2 >= n {
                return None;
            }
            Some((series[i + 2]? + series[i + 1]? - series[i - 1]? - series[i - 2]?) * rate / 6.0)
        })
        .collect()
}

/// Centered rolling mean. A window with any missing value yields null.
fn moving_average(
    series: &[Option<f64>],
    window_length: usize,
    padding: &Padding,
) -> Vec<Option<f64>> {
    let n = series.len();
    if n == 0 {
        return Vec::new();
    }
    let left = (window_length - 1) / 2;
    let pad = (window_length + 1) / 2;

    let window_mean = |values: &[Option<f64>], start: isize| -> Option<f64> {
        if start < 0 || start as usize + window_length > values.len() {
            return None;
        }
        let window = &values[start as usize..start as usize + window_length];
        let mut sum = 0.0;
        for value in window {
            sum += (*value)?;
        }
        Some(sum / window_length as f64)
    };

    match pad_series(series, pad, padding) {
        Some(padded) => (0..n)
            .map(|i| window_mean(&padded, (i + pad) as isize - left as isize))
            .collect(),
        None => (0..n)
            .map(|i| window_mean(series, i as isize - left as isize))
            .collect(),
    }
}

/// Exponentially weighted mean, seeded from the first observed value. Rows
/// before `window_length` observations have accumulated are null.
fn exponential_moving_average(
    series: &[Option<f64>],
    window_length: usize,
    padding: &Padding,
) -> Vec<Option<f64>> {
    let n = series.len();
    if n == 0 {
        return Vec::new();
    }
    let pad = (window_length + 1) / 2;

    let ewm = |values: &[Option<f64>]| -> Vec<Option<f64>> {
        let alpha = 2.0 / (window_length as f64 + 1.0);
        let mut state: Option<f64> = None;
        let mut observed = 0usize;
        values
            .iter()
            .map(|value| match value {
                Some(v) => {
                    state = Some(match state {
                        Some(prev) => (1.0 - alpha) * prev + alpha * v,
                        None => *v,
                    });
                    observed += 1;
                    if observed >= window_length {
                        state
                    } else {
                        None
                    }
                }
                None => None,
            })
            .collect()
    };

    match pad_series(series, pad, padding) {
        Some(padded) => {
            let smoothed = ewm(&padded);
            smoothed[pad..pad + n].to_vec()
        }
        None => ewm(series),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_preceding_step_change() {
        // A unit step at 1000 Hz yields a 1000 deg/s spike.
        let series = vec![Some(0.0), Some(1.0), Some(2.0)];
        let velocity = preceding_diff(&series, 1000.0);
        assert_eq!(velocity[0], None);
        assert_close(velocity[1].unwrap(), 1000.0);
        assert_close(velocity[2].unwrap(), 1000.0);
    }

    #[test]
    fn test_neighbors_boundary_nulls() {
        let series: Vec<Option<f64>> = (0..5).map(|i| Some(i as f64)).collect();
        let velocity = neighbors_diff(&series, 2.0);
        assert_eq!(velocity[0], None);
        assert_eq!(velocity[4], None);
        assert_close(velocity[2].unwrap(), 2.0);
    }

    #[test]
    fn test_fivepoint_boundary_nulls() {
        let series: Vec<Option<f64>> = (0..7).map(|i| Some(3.0 * i as f64)).collect();
        let velocity = fivepoint_diff(&series, 1.0);
        assert_eq!(velocity[0], None);
        assert_eq!(velocity[1], None);
        assert_eq!(velocity[5], None);
        assert_eq!(velocity[6], None);
        // (p[i+2] + p[i+1] - p[i-1] - p[i-2]) / 6 recovers the slope.
        assert_close(velocity[3].unwrap(), 3.0);
    }

    #[test]
    fn test_null_propagates_through_stencil() {
        let mut series: Vec<Option<f64>> = (0..5).map(|i| Some(i as f64)).collect();
        series[2] = None;
        let velocity = neighbors_diff(&series, 1.0);
        assert_eq!(velocity[1], None);
        assert_eq!(velocity[3], None);
        assert_close(velocity[2].unwrap(), 1.0);
    }

    #[test]
    fn test_pos2vel_savitzky_golay_requires_parameters() {
        let components = vec![vec![Some(0.0); 8]];
        let error = pos2vel(
            &components,
            VelocityMethod::SavitzkyGolay,
            1000.0,
            None,
            Some(2),
            &Padding::Nearest,
        )
        .unwrap_err();
        assert!(error.to_string().contains("window_length"));
    }

    #[test]
    fn test_pos2acc_constant_acceleration() {
        // p(t) = t^2 has second derivative 2 per sample step squared.
        let components: Vec<Vec<Option<f64>>> =
            vec![(0..11).map(|i| Some((i * i) as f64)).collect()];
        let acceleration = pos2acc(&components, 1.0, 5, 2, &Padding::None).unwrap();
        for value in &acceleration[0] {
            assert_close(value.unwrap(), 2.0);
        }
    }

    #[test]
    fn test_moving_average_constant_series() {
        let components = vec![vec![Some(5.0); 6]];
        let smoothed = smooth(
            &components,
            SmoothMethod::MovingAverage,
            3,
            None,
            &Padding::Nearest,
        )
        .unwrap();
        for value in &smoothed[0] {
            assert_close(value.unwrap(), 5.0);
        }
    }

    #[test]
    fn test_moving_average_without_padding_nulls_edges() {
        let series: Vec<Option<f64>> = (0..5).map(|i| Some(i as f64)).collect();
        let smoothed = moving_average(&series, 3, &Padding::None);
        assert_eq!(smoothed[0], None);
        assert_eq!(smoothed[4], None);
        assert_close(smoothed[2].unwrap(), 2.0);
    }

    #[test]
    fn test_exponential_moving_average_warmup() {
        let series: Vec<Option<f64>> = (0..6).map(|i| Some(i as f64)).collect();
        let smoothed = exponential_moving_average(&series, 3, &Padding::None);
        // Rows before three observations are null.
        assert_eq!(smoothed[0], None);
        assert_eq!(smoothed[1], None);
        assert!(smoothed[2].is_some());
        // alpha = 0.5; state after [0, 1, 2] is 0 -> 0.5 -> 1.25.
        assert_close(smoothed[2].unwrap(), 1.25);
    }

    #[test]
    fn test_unknown_method_lists_valid_names() {
        let error = VelocityMethod::parse("sliding").unwrap_err();
        let message = error.to_string();
        assert!(message.contains("sliding"));
        assert!(message.contains("fivepoint"));
    }
}
