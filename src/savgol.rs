//! # Savitzky-Golay Filtering
//!
//! Least-squares polynomial filtering over a sliding window, used for
//! smoothing and for noise-robust differentiation. The filter fits a
//! polynomial of the configured degree to each window and evaluates its
//! `derivative`-th derivative at the window center, which reduces to a single
//! convolution with precomputed weights.
//!
//! Window edges are handled by the [`Padding`] mode. With [`Padding::None`]
//! no values are fabricated: the first and last half-windows are instead
//! filled by fitting a polynomial to the edge window and evaluating it at the
//! edge positions.

use crate::transform::TransformError;

/// Edge handling for windowed filters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Padding {
    /// No padding. Edge values are reconstructed from a polynomial fit over
    /// the first and last window.
    None,
    /// Pad with a constant value.
    Constant(f64),
    /// Repeat the edge value.
    #[default]
    Nearest,
    /// Reflect about the edge value, excluding the edge value itself.
    Mirror,
    /// Wrap around to the opposite end of the series.
    Wrap,
}

impl Padding {
    /// Parses a padding mode name.
    pub fn parse(name: &str) -> Result<Self, TransformError> {
        match name {
            "none" => Ok(Self::None),
            "nearest" => Ok(Self::Nearest),
            "mirror" => Ok(Self::Mirror),
            "wrap" => Ok(Self::Wrap),
            other => Err(TransformError::UnknownMethod {
                parameter: "padding",
                method: other.to_string(),
                valid: "none, nearest, mirror, wrap, or a constant number",
            }),
        }
    }
}

pub(crate) fn check_window_and_degree(
    window_length: usize,
    degree: usize,
) -> Result<(), TransformError> {
    if window_length == 0 || window_length % 2 == 0 {
        return Err(TransformError::InvalidParameter {
            parameter: "window_length",
            reason: format!("must be a positive odd number, but is {window_length}"),
        });
    }
    if degree >= window_length {
        return Err(TransformError::InvalidParameter {
            parameter: "degree",
            reason: format!(
                "must be less than window_length ({window_length}), but is {degree}"
            ),
        });
    }
    Ok(())
}

/// Applies the Savitzky-Golay filter to one component series.
///
/// The `derivative`-th derivative is taken with respect to time, scaled by
/// `rate.powi(derivative)` to convert from per-sample to per-second units.
/// Null values enter the fit as NaN and poison every window they touch.
pub(crate) fn savgol_series(
    series: &[Option<f64>],
    window_length: usize,
    degree: usize,
    derivative: usize,
    rate: f64,
    padding: &Padding,
) -> Result<Vec<Option<f64>>, TransformError> {
    check_window_and_degree(window_length, degree)?;

    let n = series.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    if matches!(padding, Padding::None) && n < window_length {
        return Err(TransformError::InvalidParameter {
            parameter: "window_length",
            reason: format!(
                "must not exceed the series length ({n}) when padding is none, \
                 but is {window_length}"
            ),
        });
    }

    let values: Vec<f64> = series.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
    let half = window_length / 2;
    let weights = central_weights(window_length, degree, derivative)?;
    let scale = rate.powi(derivative as i32);

    let mut out = vec![f64::NAN; n];
    match padding {
        Padding::None => {
            for i in half..n.saturating_sub(half) {
                out[i] = convolve(&values[i - half..i + half + 1], &weights) * scale;
            }
            // Edge rows come from a polynomial fit over the boundary window.
            let head = polyfit(&values[..window_length], degree)?;
            for (i, slot) in out.iter_mut().take(half).enumerate() {
                *slot = poly_derivative_at(&head, derivative, i as f64) * scale;
            }
            let tail_start = n - window_length;
            let tail = polyfit(&values[tail_start..], degree)?;
            for i in n - half..n {
                out[i] = poly_derivative_at(&tail, derivative, (i - tail_start) as f64) * scale;
            }
        }
        _ => {
            for (i, slot) in out.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (j, weight) in weights.iter().enumerate() {
                    let virtual_index = i as isize - half as isize + j as isize;
                    acc += weight * padded_value(&values, virtual_index, padding);
                }
                *slot = acc * scale;
            }
        }
    }

    Ok(out
        .into_iter()
        .map(|v| if v.is_nan() { None } else { Some(v) })
        .collect())
}

/// Pads a nullable series on both ends, or returns `None` for
/// [`Padding::None`].
pub(crate) fn pad_series(
    series: &[Option<f64>],
    pad: usize,
    padding: &Padding,
) -> Option<Vec<Option<f64>>> {
    if matches!(padding, Padding::None) || series.is_empty() {
        return None;
    }
    let n = series.len() as isize;
    let mut padded = Vec::with_capacity(series.len() + 2 * pad);
    for virtual_index in -(pad as isize)..n + pad as isize {
        padded.push(match padding {
            Padding::None => unreachable!(),
            Padding::Constant(c) => {
                if (0..n).contains(&virtual_index) {
                    series[virtual_index as usize]
                } else {
                    Some(*c)
                }
            }
            _ => series[resolve_index(virtual_index, series.len(), padding)],
        });
    }
    Some(padded)
}

fn padded_value(values: &[f64], virtual_index: isize, padding: &Padding) -> f64 {
    let n = values.len() as isize;
    if (0..n).contains(&virtual_index) {
        return values[virtual_index as usize];
    }
    match padding {
        Padding::Constant(c) => *c,
        _ => values[resolve_index(virtual_index, values.len(), padding)],
    }
}

fn resolve_index(virtual_index: isize, len: usize, padding: &Padding) -> usize {
    let n = len as isize;
    if (0..n).contains(&virtual_index) {
        return virtual_index as usize;
    }
    match padding {
        Padding::Nearest => {
            if virtual_index < 0 {
                0
            } else {
                len - 1
            }
        }
        Padding::Mirror => {
            if len == 1 {
                return 0;
            }
            let mut v = virtual_index;
            while !(0..n).contains(&v) {
                if v < 0 {
                    v = -v;
                } else {
                    v = 2 * (n - 1) - v;
                }
            }
            v as usize
        }
        Padding::Wrap => virtual_index.rem_euclid(n) as usize,
        Padding::None | Padding::Constant(_) => unreachable!(),
    }
}

fn convolve(window: &[f64], weights: &[f64]) -> f64 {
    window.iter().zip(weights).map(|(v, w)| v * w).sum()
}

/// Convolution weights evaluating the `derivative`-th derivative of the
/// least-squares polynomial fit at the window center.
fn central_weights(
    window_length: usize,
    degree: usize,
    derivative: usize,
) -> Result<Vec<f64>, TransformError> {
    if derivative > degree {
        return Ok(vec![0.0; window_length]);
    }
    let half = window_length as isize / 2;
    let offsets: Vec<f64> = (-half..=half).map(|m| m as f64).collect();

    // Normal equations of the Vandermonde system over the window offsets.
    let size = degree + 1;
    let mut gram = vec![vec![0.0; size]; size];
    for (k, row) in gram.iter_mut().enumerate() {
        for (l, entry) in row.iter_mut().enumerate() {
            *entry = offsets.iter().map(|m| m.powi((k + l) as i32)).sum();
        }
    }
    let mut rhs = vec![0.0; size];
    rhs[derivative] = 1.0;
    let solution = solve(gram, rhs).ok_or(TransformError::InvalidParameter {
        parameter: "window_length",
        reason: "polynomial fit is singular for the given window and degree".to_string(),
    })?;

    let scale = factorial(derivative);
    Ok(offsets
        .iter()
        .map(|m| scale * solution.iter().enumerate().map(|(k, y)| y * m.powi(k as i32)).sum::<f64>())
        .collect())
}

/// Least-squares polynomial coefficients for values at positions `0..len`.
fn polyfit(values: &[f64], degree: usize) -> Result<Vec<f64>, TransformError> {
    let size = degree + 1;
    let mut gram = vec![vec![0.0; size]; size];
    let mut rhs = vec![0.0; size];
    for (i, y) in values.iter().enumerate() {
        let x = i as f64;
        for k in 0..size {
            rhs[k] += y * x.powi(k as i32);
            for l in 0..size {
                gram[k][l] += x.powi((k + l) as i32);
            }
        }
    }
    solve(gram, rhs).ok_or(TransformError::InvalidParameter {
        parameter: "degree",
        reason: "polynomial fit over the edge window is singular".to_string(),
    })
}

fn poly_derivative_at(coefficients: &[f64], derivative: usize, x: f64) -> f64 {
    coefficients
        .iter()
        .enumerate()
        .skip(derivative)
        .map(|(k, b)| {
            b * (factorial(k) / factorial(k - derivative)) * x.powi((k - derivative) as i32)
        })
        .sum()
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

/// Gaussian elimination with partial pivoting.
fn solve(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Option<Vec<f64>> {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&a, &b| {
            matrix[a][col]
                .abs()
                .partial_cmp(&matrix[b][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if matrix[pivot][col].abs() < 1e-12 {
            return None;
        }
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);
        for row in col + 1..n {
            let factor = matrix[row][col] / matrix[col][col];
            for k in col..n {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }
    let mut solution = vec![0.0; n];
    for col in (0..n).rev() {
        let mut value = rhs[col];
        for k in col + 1..n {
            value -= matrix[col][k] * solution[k];
        }
        solution[col] = value / matrix[col][col];
    }
    Some(solution)
}
