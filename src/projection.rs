//! # Pixel / Visual-Angle Projection
//!
//! Conversion between pixel screen coordinates and degrees of visual angle
//! (dva), given the screen geometry and the eye-to-screen distance.
//!
//! The projection treats each channel component independently: component
//! `c` lives on screen axis `c % 2` (x components on the horizontal axis, y
//! components on the vertical axis). Pixel coordinates are first recentered
//! about the configured origin, then related to the viewing angle through the
//! "virtual distance" of the eye in pixel units:
//!
//! ```text
//! virtual_distance = distance_cm * resolution[axis] / size_cm[axis]
//! angle            = atan2(centered_pixel, virtual_distance)
//! ```
//!
//! [`deg2pix`] is the exact inverse: `tan(angle) * virtual_distance` plus the
//! origin offset.

use crate::experiment::Origin;
use crate::transform::TransformError;

/// Eye-to-screen distance resolved to per-sample centimeter values.
#[derive(Debug, Clone)]
pub(crate) enum DistanceValues {
    Constant(f64),
    PerSample(Vec<Option<f64>>),
}

impl DistanceValues {
    fn cm(&self, row: usize) -> Option<f64> {
        match self {
            Self::Constant(value) => Some(*value),
            Self::PerSample(values) => values[row],
        }
    }

    fn validate(&self) -> Result<(), TransformError> {
        if let Self::Constant(value) = self {
            if !value.is_finite() || *value <= 0.0 {
                return Err(TransformError::InvalidParameter {
                    parameter: "distance",
                    reason: format!("must be a positive finite number, but is {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Checks that a screen tuple has two strictly positive entries.
pub(crate) fn check_screen_tuple(
    parameter: &'static str,
    value: (f64, f64),
) -> Result<(), TransformError> {
    for axis_value in [value.0, value.1] {
        if !axis_value.is_finite() || axis_value <= 0.0 {
            return Err(TransformError::InvalidParameter {
                parameter,
                reason: format!(
                    "both entries must be greater than zero, but value is ({}, {})",
                    value.0, value.1
                ),
            });
        }
    }
    Ok(())
}

/// Recenters pixel components about the given origin.
///
/// Centered pixel data has `(0, 0)` at the screen center.
pub(crate) fn center_origin(
    pixel: &[Vec<Option<f64>>],
    resolution: (f64, f64),
    origin: Origin,
) -> Vec<Vec<Option<f64>>> {
    let offset = origin.pixel_offset(resolution);
    pixel
        .iter()
        .enumerate()
        .map(|(component, series)| {
            let axis_offset = if component % 2 == 0 { offset.0 } else { offset.1 };
            series.iter().map(|v| v.map(|px| px - axis_offset)).collect()
        })
        .collect()
}

/// Converts pixel screen coordinates to degrees of visual angle.
pub(crate) fn pix2deg(
    pixel: &[Vec<Option<f64>>],
    resolution: (f64, f64),
    size_cm: (f64, f64),
    distance: &DistanceValues,
    origin: Origin,
) -> Result<Vec<Vec<Option<f64>>>, TransformError> {
    check_screen_tuple("screen_resolution", resolution)?;
    check_screen_tuple("screen_size", size_cm)?;
    distance.validate()?;

    let centered = center_origin(pixel, resolution, origin);
    let position = centered
        .iter()
        .enumerate()
        .map(|(component, series)| {
            let pixels_per_cm = axis(resolution, component) / axis(size_cm, component);
            series
                .iter()
                .enumerate()
                .map(|(row, centered_px)| {
                    let px = (*centered_px)?;
                    let virtual_distance = distance.cm(row)? * pixels_per_cm;
                    Some(px.atan2(virtual_distance).to_degrees())
                })
                .collect()
        })
        .collect();
    Ok(position)
}

/// Converts degrees of visual angle back to pixel screen coordinates.
pub(crate) fn deg2pix(
    position: &[Vec<Option<f64>>],
    resolution: (f64, f64),
    size_cm: (f64, f64),
    distance: &DistanceValues,
    origin: Origin,
) -> Result<Vec<Vec<Option<f64>>>, TransformError> {
    check_screen_tuple("screen_resolution", resolution)?;
    check_screen_tuple("screen_size", size_cm)?;
    distance.validate()?;

    let offset = origin.pixel_offset(resolution);
    let pixel = position
        .iter()
        .enumerate()
        .map(|(component, series)| {
            let pixels_per_cm = axis(resolution, component) / axis(size_cm, component);
            let axis_offset = if component % 2 == 0 { offset.0 } else { offset.1 };
            series
                .iter()
                .enumerate()
                .map(|(row, angle)| {
                    let degrees = (*angle)?;
                    let virtual_distance = distance.cm(row)? * pixels_per_cm;
                    Some(degrees.to_radians().tan() * virtual_distance + axis_offset)
                })
                .collect()
        })
        .collect();
    Ok(pixel)
}

fn axis(value: (f64, f64), component: usize) -> f64 {
    if component % 2 == 0 {
        value.0
    } else {
        value.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-4;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < TOLERANCE,
            "expected {expected}, got {actual}"
        );
    }

    fn square_screen() -> ((f64, f64), (f64, f64)) {
        ((100.0, 100.0), (100.0, 100.0))
    }

    #[test]
    fn test_pix2deg_center_origin() {
        let (resolution, size) = square_screen();
        let pixel = vec![vec![Some(49.5)], vec![Some(0.0)]];
        let distance = DistanceValues::Constant(100.0);
        let position = pix2deg(&pixel, resolution, size, &distance, Origin::Center).unwrap();

        assert_close(position[0][0].unwrap(), 26.3354);
        assert_close(position[1][0].unwrap(), 0.0);
    }

    #[test]
    fn test_pix2deg_upper_left_origin() {
        let (resolution, size) = square_screen();
        let pixel = vec![vec![Some(49.5)], vec![Some(0.0)]];
        let distance = DistanceValues::Constant(100.0);
        let position = pix2deg(&pixel, resolution, size, &distance, Origin::UpperLeft).unwrap();

        assert_close(position[0][0].unwrap(), 0.0);
        assert_close(position[1][0].unwrap(), -26.3354);
    }

    #[test]
    fn test_round_trip_all_widths_and_origins() {
        let (resolution, size) = square_screen();
        let distance = DistanceValues::Constant(68.0);
        for width in [2, 4, 6] {
            for origin in [Origin::Center, Origin::UpperLeft] {
                let pixel: Vec<Vec<Option<f64>>> = (0..width)
                    .map(|c| vec![Some(10.0 + c as f64), Some(73.5 - c as f64), None])
                    .collect();
                let position = pix2deg(&pixel, resolution, size, &distance, origin).unwrap();
                let restored = deg2pix(&position, resolution, size, &distance, origin).unwrap();
                for component in 0..width {
                    for row in 0..3 {
                        match (pixel[component][row], restored[component][row]) {
                            (Some(expected), Some(actual)) => assert_close(actual, expected),
                            (None, None) => {}
                            other => panic!("null mismatch: {other:?}"),
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_per_sample_distance_matches_constant() {
        let (resolution, size) = square_screen();
        let per_sample = DistanceValues::PerSample(vec![Some(100.0)]);
        let constant = DistanceValues::Constant(100.0);
        let pixel = vec![vec![Some(49.5)], vec![Some(0.0)]];

        let a = pix2deg(&pixel, resolution, size, &per_sample, Origin::Center).unwrap();
        let b = pix2deg(&pixel, resolution, size, &constant, Origin::Center).unwrap();
        assert_close(a[0][0].unwrap(), b[0][0].unwrap());
    }

    #[test]
    fn test_validation() {
        let pixel = vec![vec![Some(1.0)], vec![Some(1.0)]];
        let distance = DistanceValues::Constant(100.0);
        assert!(pix2deg(&pixel, (0.0, 100.0), (100.0, 100.0), &distance, Origin::Center).is_err());
        assert!(pix2deg(&pixel, (100.0, 100.0), (-1.0, 100.0), &distance, Origin::Center).is_err());
        assert!(pix2deg(
            &pixel,
            (100.0, 100.0),
            (100.0, 100.0),
            &DistanceValues::Constant(0.0),
            Origin::Center
        )
        .is_err());
    }
}
