//! # Transform Dispatcher
//!
//! Applies named transforms to a [`GazeFrame`]. The dispatcher resolves
//! missing parameters from the attached experiment, validates the input
//! columns up front and commits results only on success, so a failed
//! transform leaves the frame untouched.
//!
//! When the frame carries trial key columns, every transform except
//! `downsample` is applied per trial segment: the table is partitioned by
//! key, each partition is transformed independently and the partitions are
//! concatenated back in first-appearance order. Windowed transforms
//! therefore never mix samples across trial boundaries.

use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::DataType;
use thiserror::Error;

use crate::derivative::{self, SmoothMethod, VelocityMethod};
use crate::experiment::{GeometryError, Origin};
use crate::frame::{
    build_channel, channel_components, numeric_column_values, FrameError, GazeFrame,
};
use crate::projection::{self, DistanceValues};
use crate::resample::{self, FillNullStrategy};
use crate::savgol::{savgol_series, Padding};
use crate::schema::columns;

/// Errors raised while dispatching or applying a transform.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The transform name is not recognized.
    #[error(
        "unknown transform '{name}'. Valid transforms are: center_origin, pix2deg, deg2pix, \
         pos2vel, pos2acc, savitzky_golay, smooth, norm, clip, resample, downsample"
    )]
    UnknownOperation {
        /// The unrecognized name.
        name: String,
    },

    /// A method-like parameter has an unrecognized value.
    #[error("unknown {parameter} '{method}'. Valid values are: {valid}")]
    UnknownMethod {
        /// Name of the parameter.
        parameter: &'static str,
        /// The unrecognized value.
        method: String,
        /// The accepted values.
        valid: &'static str,
    },

    /// A required parameter was not given.
    #[error("'{parameter}' must not be none")]
    MissingParameter {
        /// Name of the missing parameter.
        parameter: &'static str,
    },

    /// A parameter required by the chosen method was not given.
    #[error("'{parameter}' must not be none for method '{method}'")]
    MissingMethodParameter {
        /// Name of the missing parameter.
        parameter: &'static str,
        /// The method that requires it.
        method: &'static str,
    },

    /// A parameter value is out of range or inconsistent.
    #[error("'{parameter}' {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A required input column is missing.
    #[error("column '{column}' not found. Available columns are: {available:?}.{hint}")]
    ColumnNotFound {
        /// The missing column.
        column: String,
        /// The columns that do exist.
        available: Vec<String>,
        /// A remediation hint, prefixed with a space, or empty.
        hint: String,
    },

    /// A parameter was neither given nor available from the experiment.
    #[error("no '{parameter}' was given and it could not be taken from the frame's experiment")]
    ContextUnavailable {
        /// Name of the parameter.
        parameter: &'static str,
    },

    /// No eye-to-screen distance source is available.
    #[error(
        "neither a distance column is present nor does the experiment define an \
         eye-to-screen distance"
    )]
    MissingDistance,

    /// The target sampling rate has no whole-microsecond period.
    #[error("sampling rate {rate} Hz has no whole-microsecond period (off by {error_us:.3} us)")]
    UnrepresentableRate {
        /// The rejected rate in Hz.
        rate: f64,
        /// Distance to the nearest whole-microsecond period.
        error_us: f64,
    },

    /// A sample-table operation failed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The experiment geometry is invalid.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// An Arrow kernel failed.
    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
}

/// A named transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Recenter pixel coordinates about the screen center.
    CenterOrigin,
    /// Convert pixel coordinates to degrees of visual angle.
    Pix2Deg,
    /// Convert degrees of visual angle to pixel coordinates.
    Deg2Pix,
    /// Differentiate position into velocity.
    Pos2Vel,
    /// Differentiate position into acceleration.
    Pos2Acc,
    /// Apply a Savitzky-Golay filter to a channel column.
    SavitzkyGolay,
    /// Smooth a channel column.
    Smooth,
    /// Euclidean norm of a two-component channel.
    Norm,
    /// Clamp a channel or numeric scalar column to bounds.
    Clip,
    /// Resample onto a uniform time grid.
    Resample,
    /// Keep every n-th row.
    Downsample,
}

impl Operation {
    /// The transform name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CenterOrigin => "center_origin",
            Self::Pix2Deg => "pix2deg",
            Self::Deg2Pix => "deg2pix",
            Self::Pos2Vel => "pos2vel",
            Self::Pos2Acc => "pos2acc",
            Self::SavitzkyGolay => "savitzky_golay",
            Self::Smooth => "smooth",
            Self::Norm => "norm",
            Self::Clip => "clip",
            Self::Resample => "resample",
            Self::Downsample => "downsample",
        }
    }
}

impl FromStr for Operation {
    type Err = TransformError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "center_origin" => Ok(Self::CenterOrigin),
            "pix2deg" => Ok(Self::Pix2Deg),
            "deg2pix" => Ok(Self::Deg2Pix),
            "pos2vel" => Ok(Self::Pos2Vel),
            "pos2acc" => Ok(Self::Pos2Acc),
            "savitzky_golay" => Ok(Self::SavitzkyGolay),
            "smooth" => Ok(Self::Smooth),
            "norm" => Ok(Self::Norm),
            "clip" => Ok(Self::Clip),
            "resample" => Ok(Self::Resample),
            "downsample" => Ok(Self::Downsample),
            other => Err(TransformError::UnknownOperation {
                name: other.to_string(),
            }),
        }
    }
}

/// Parameters for [`GazeFrame::transform`].
///
/// Every field is optional. Fields left as `None` fall back to the frame's
/// experiment where possible, or to the per-transform default.
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Input column. Defaults to the transform's conventional channel.
    pub input_column: Option<String>,
    /// Output column. Defaults per transform; existing columns are replaced.
    pub output_column: Option<String>,
    /// Method name for `pos2vel` and `smooth`.
    pub method: Option<String>,
    /// Sampling rate in Hz. Falls back to the experiment.
    pub sampling_rate: Option<f64>,
    /// Expected channel width, checked against the input column.
    pub n_components: Option<usize>,
    /// Screen resolution in pixels. Falls back to the experiment.
    pub screen_resolution: Option<(f64, f64)>,
    /// Screen size in centimeters. Falls back to the experiment.
    pub screen_size: Option<(f64, f64)>,
    /// Constant eye-to-screen distance in centimeters. Overrides both the
    /// distance column and the experiment.
    pub distance: Option<f64>,
    /// Pixel origin. Falls back to the experiment.
    pub origin: Option<Origin>,
    /// Filter window length in samples.
    pub window_length: Option<usize>,
    /// Polynomial degree for Savitzky-Golay filtering.
    pub degree: Option<usize>,
    /// Derivative order for the `savitzky_golay` transform.
    pub derivative: Option<usize>,
    /// Window edge handling.
    pub padding: Option<Padding>,
    /// Lower clip bound.
    pub lower_bound: Option<f64>,
    /// Upper clip bound.
    pub upper_bound: Option<f64>,
    /// Target rate for `resample` in Hz.
    pub resampling_rate: Option<f64>,
    /// Columns to fill after resampling. Defaults to all columns.
    pub fill_columns: Option<Vec<String>>,
    /// Fill strategy for inserted rows.
    pub fill_null_strategy: Option<FillNullStrategy>,
    /// Decimation factor for `downsample`.
    pub factor: Option<usize>,
}

impl GazeFrame {
    /// Applies a transform to the frame.
    ///
    /// On error the frame is left exactly as it was.
    pub fn transform(
        &mut self,
        operation: Operation,
        options: &TransformOptions,
    ) -> Result<(), TransformError> {
        match operation {
            Operation::Resample => apply_resample(self, options),
            Operation::Downsample => apply_downsample(self, options),
            _ => apply_columnwise(self, operation, options),
        }
    }

    /// Applies a transform by name.
    pub fn transform_by_name(
        &mut self,
        operation: &str,
        options: &TransformOptions,
    ) -> Result<(), TransformError> {
        self.transform(operation.parse()?, options)
    }

    /// Recenters the pixel channel about the screen center.
    pub fn center_origin(&mut self) -> Result<(), TransformError> {
        self.transform(Operation::CenterOrigin, &TransformOptions::default())
    }

    /// Converts the pixel channel to degrees of visual angle.
    pub fn pix2deg(&mut self) -> Result<(), TransformError> {
        self.transform(Operation::Pix2Deg, &TransformOptions::default())
    }

    /// Converts the position channel back to pixel coordinates.
    pub fn deg2pix(&mut self) -> Result<(), TransformError> {
        self.transform(Operation::Deg2Pix, &TransformOptions::default())
    }

    /// Differentiates the position channel into velocity.
    pub fn pos2vel(&mut self, method: &str) -> Result<(), TransformError> {
        self.transform(
            Operation::Pos2Vel,
            &TransformOptions {
                method: Some(method.to_string()),
                ..TransformOptions::default()
            },
        )
    }

    /// Differentiates the position channel into acceleration.
    pub fn pos2acc(&mut self) -> Result<(), TransformError> {
        self.transform(Operation::Pos2Acc, &TransformOptions::default())
    }

    /// Smooths the position channel.
    pub fn smooth(&mut self, method: &str, window_length: usize) -> Result<(), TransformError> {
        self.transform(
            Operation::Smooth,
            &TransformOptions {
                method: Some(method.to_string()),
                window_length: Some(window_length),
                ..TransformOptions::default()
            },
        )
    }

    /// Computes the Euclidean norm of a two-component channel into a scalar
    /// column named `<input>_norm`.
    pub fn norm(&mut self, input_column: &str) -> Result<(), TransformError> {
        self.transform(
            Operation::Norm,
            &TransformOptions {
                input_column: Some(input_column.to_string()),
                ..TransformOptions::default()
            },
        )
    }

    /// Clamps a channel or numeric scalar column to the given bounds.
    pub fn clip(
        &mut self,
        input_column: &str,
        output_column: &str,
        lower_bound: Option<f64>,
        upper_bound: Option<f64>,
    ) -> Result<(), TransformError> {
        self.transform(
            Operation::Clip,
            &TransformOptions {
                input_column: Some(input_column.to_string()),
                output_column: Some(output_column.to_string()),
                lower_bound,
                upper_bound,
                ..TransformOptions::default()
            },
        )
    }

    /// Resamples the frame onto the uniform grid of the given rate.
    pub fn resample(&mut self, resampling_rate: f64) -> Result<(), TransformError> {
        self.transform(
            Operation::Resample,
            &TransformOptions {
                resampling_rate: Some(resampling_rate),
                ..TransformOptions::default()
            },
        )
    }

    /// Keeps every `factor`-th row.
    pub fn downsample(&mut self, factor: usize) -> Result<(), TransformError> {
        self.transform(
            Operation::Downsample,
            &TransformOptions {
                factor: Some(factor),
                ..TransformOptions::default()
            },
        )
    }
}

/// Applies a column-producing transform, per trial segment when trial keys
/// are set.
fn apply_columnwise(
    frame: &mut GazeFrame,
    operation: Operation,
    options: &TransformOptions,
) -> Result<(), TransformError> {
    validate_input(frame, operation, options)?;

    match frame.trial_columns().map(<[String]>::to_vec) {
        None => {
            let (name, array) = compute(frame, operation, options)?;
            frame.with_column(&name, array);
            Ok(())
        }
        Some(keys) => {
            let partitions = frame.partition_indices(&keys)?;
            if partitions.is_empty() {
                return Ok(());
            }
            let mut parts = Vec::with_capacity(partitions.len());
            for indices in &partitions {
                let mut part = frame.take_rows(indices)?;
                let (name, array) = compute(&part, operation, options)?;
                part.with_column(&name, array);
                parts.push(part);
            }
            *frame = GazeFrame::concat(&parts)?;
            Ok(())
        }
    }
}

fn apply_resample(frame: &mut GazeFrame, options: &TransformOptions) -> Result<(), TransformError> {
    let rate = options
        .resampling_rate
        .ok_or(TransformError::MissingParameter {
            parameter: "resampling_rate",
        })?;
    let strategy = options.fill_null_strategy.unwrap_or_default();
    let fill_columns = options.fill_columns.as_deref();

    let resampled = match frame.trial_columns().map(<[String]>::to_vec) {
        None => resample::resample(frame, rate, fill_columns, strategy)?,
        Some(keys) => {
            let partitions = frame.partition_indices(&keys)?;
            if partitions.is_empty() {
                // Validate the rate even when there is nothing to resample.
                resample::grid_step_us(rate)?;
                frame.clone()
            } else {
                let mut parts = Vec::with_capacity(partitions.len());
                for indices in &partitions {
                    let part = frame.take_rows(indices)?;
                    parts.push(resample::resample(&part, rate, fill_columns, strategy)?);
                }
                GazeFrame::concat(&parts)?
            }
        }
    };
    *frame = resampled;
    if let Some(experiment) = frame.experiment.as_mut() {
        experiment.sampling_rate = Some(rate);
    }
    Ok(())
}

fn apply_downsample(
    frame: &mut GazeFrame,
    options: &TransformOptions,
) -> Result<(), TransformError> {
    let factor = options.factor.ok_or(TransformError::MissingParameter {
        parameter: "factor",
    })?;
    *frame = resample::downsample(frame, factor)?;
    if let Some(experiment) = frame.experiment.as_mut() {
        if let Some(rate) = experiment.sampling_rate {
            experiment.sampling_rate = Some(rate / factor as f64);
        }
    }
    Ok(())
}

/// Checks that the transform's input column exists, with a remediation hint
/// when an obvious upstream transform is missing.
fn validate_input(
    frame: &GazeFrame,
    operation: Operation,
    options: &TransformOptions,
) -> Result<(), TransformError> {
    let input = input_column(operation, options)?;
    if frame.has_column(&input) {
        return Ok(());
    }
    let hint = match operation {
        Operation::Pos2Vel | Operation::Pos2Acc | Operation::Deg2Pix | Operation::Norm
            if input == columns::POSITION && frame.has_column(columns::PIXEL) =>
        {
            " Compute position from pixel first, for example with pix2deg()."
        }
        Operation::Pix2Deg | Operation::CenterOrigin if input == columns::PIXEL => {
            " Map the pixel component columns when constructing the frame."
        }
        _ => "",
    };
    Err(TransformError::ColumnNotFound {
        column: input,
        available: frame.column_names(),
        hint: hint.to_string(),
    })
}

/// Resolves the input column name for a transform.
fn input_column(
    operation: Operation,
    options: &TransformOptions,
) -> Result<String, TransformError> {
    if let Some(input) = &options.input_column {
        return Ok(input.clone());
    }
    match operation {
        Operation::CenterOrigin | Operation::Pix2Deg => Ok(columns::PIXEL.to_string()),
        Operation::Deg2Pix
        | Operation::Pos2Vel
        | Operation::Pos2Acc
        | Operation::SavitzkyGolay
        | Operation::Smooth
        | Operation::Norm => Ok(columns::POSITION.to_string()),
        Operation::Clip => Err(TransformError::MissingParameter {
            parameter: "input_column",
        }),
        Operation::Resample | Operation::Downsample => Ok(columns::TIME.to_string()),
    }
}

/// Computes the output column of a column-producing transform.
fn compute(
    frame: &GazeFrame,
    operation: Operation,
    options: &TransformOptions,
) -> Result<(String, ArrayRef), TransformError> {
    let input = input_column(operation, options)?;
    if operation == Operation::Clip {
        return clip_column(frame, &input, options);
    }
    let components = input_components(frame, &input, options)?;

    match operation {
        Operation::CenterOrigin => {
            let resolution = resolve_resolution(frame, options)?;
            let origin = resolve_origin(frame, options)?;
            projection::check_screen_tuple("screen_resolution", resolution)?;
            let centered = projection::center_origin(&components, resolution, origin);
            Ok((output_column(options, &input), build_channel(&centered)))
        }
        Operation::Pix2Deg => {
            let resolution = resolve_resolution(frame, options)?;
            let size = resolve_size(frame, options)?;
            let origin = resolve_origin(frame, options)?;
            let distance = resolve_distance(frame, options)?;
            let position =
                projection::pix2deg(&components, resolution, size, &distance, origin)?;
            Ok((
                output_column(options, columns::POSITION),
                build_channel(&position),
            ))
        }
        Operation::Deg2Pix => {
            let resolution = resolve_resolution(frame, options)?;
            let size = resolve_size(frame, options)?;
            let origin = resolve_origin(frame, options)?;
            let distance = resolve_distance(frame, options)?;
            let pixel = projection::deg2pix(&components, resolution, size, &distance, origin)?;
            Ok((
                output_column(options, columns::PIXEL),
                build_channel(&pixel),
            ))
        }
        Operation::Pos2Vel => {
            let method = match &options.method {
                Some(name) => VelocityMethod::parse(name)?,
                None => VelocityMethod::default(),
            };
            let rate = resolve_rate(frame, options)?;
            let padding = options.padding.unwrap_or_default();
            let velocity = derivative::pos2vel(
                &components,
                method,
                rate,
                options.window_length,
                options.degree,
                &padding,
            )?;
            Ok((
                output_column(options, columns::VELOCITY),
                build_channel(&velocity),
            ))
        }
        Operation::Pos2Acc => {
            let rate = resolve_rate(frame, options)?;
            let window_length = options.window_length.unwrap_or(7);
            let degree = options.degree.unwrap_or(2);
            let padding = options.padding.unwrap_or_default();
            let acceleration =
                derivative::pos2acc(&components, rate, window_length, degree, &padding)?;
            Ok((
                output_column(options, columns::ACCELERATION),
                build_channel(&acceleration),
            ))
        }
        Operation::SavitzkyGolay => {
            let window_length =
                options
                    .window_length
                    .ok_or(TransformError::MissingParameter {
                        parameter: "window_length",
                    })?;
            let degree = options.degree.ok_or(TransformError::MissingParameter {
                parameter: "degree",
            })?;
            let derivative = options.derivative.unwrap_or(0);
            let rate = if derivative > 0 {
                resolve_rate(frame, options)?
            } else {
                1.0
            };
            let padding = options.padding.unwrap_or_default();
            let filtered = components
                .iter()
                .map(|series| {
                    savgol_series(series, window_length, degree, derivative, rate, &padding)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok((output_column(options, &input), build_channel(&filtered)))
        }
        Operation::Smooth => {
            let method = match &options.method {
                Some(name) => SmoothMethod::parse(name)?,
                None => SmoothMethod::SavitzkyGolay,
            };
            let window_length = options.window_length.unwrap_or(7);
            let degree = options.degree.or(Some(2));
            let padding = options.padding.unwrap_or_default();
            let smoothed =
                derivative::smooth(&components, method, window_length, degree, &padding)?;
            Ok((output_column(options, &input), build_channel(&smoothed)))
        }
        Operation::Norm => {
            if components.len() != 2 {
                return Err(TransformError::InvalidParameter {
                    parameter: "input_column",
                    reason: format!(
                        "must name a two-component channel for norm, but '{input}' has {} \
                         components",
                        components.len()
                    ),
                });
            }
            let norm: Float64Array = (0..components[0].len())
                .map(|row| Some(components[0][row]?.hypot(components[1][row]?)))
                .collect();
            Ok((
                output_column(options, &format!("{input}_norm")),
                Arc::new(norm) as ArrayRef,
            ))
        }
        Operation::Clip | Operation::Resample | Operation::Downsample => {
            unreachable!("dispatched on a separate path")
        }
    }
}

/// Clamps a channel or numeric scalar column to the configured bounds.
///
/// Integer scalar columns widen to Float64, matching how resampling widens
/// integers under interpolation.
fn clip_column(
    frame: &GazeFrame,
    input: &str,
    options: &TransformOptions,
) -> Result<(String, ArrayRef), TransformError> {
    let lower = options.lower_bound.unwrap_or(f64::NEG_INFINITY);
    let upper = options.upper_bound.unwrap_or(f64::INFINITY);
    if lower > upper {
        return Err(TransformError::InvalidParameter {
            parameter: "lower_bound",
            reason: format!("must not exceed upper_bound, but {lower} > {upper}"),
        });
    }
    let array = frame.column(input)?;
    match array.data_type() {
        DataType::FixedSizeList(_, _) => {
            let components = input_components(frame, input, options)?;
            let clipped: Vec<Vec<Option<f64>>> = components
                .iter()
                .map(|series| series.iter().map(|v| v.map(|x| x.clamp(lower, upper))).collect())
                .collect();
            Ok((output_column(options, input), build_channel(&clipped)))
        }
        DataType::Float64 | DataType::Int64 => {
            let values = numeric_column_values(array, input)?;
            let clipped: Float64Array = values
                .iter()
                .map(|v| v.map(|x| x.clamp(lower, upper)))
                .collect();
            Ok((output_column(options, input), Arc::new(clipped) as ArrayRef))
        }
        other => Err(TransformError::Frame(FrameError::UnsupportedType {
            column: input.to_string(),
            data_type: other.clone(),
        })),
    }
}

/// Reads the input channel and checks it against the expected width.
fn input_components(
    frame: &GazeFrame,
    input: &str,
    options: &TransformOptions,
) -> Result<Vec<Vec<Option<f64>>>, TransformError> {
    let array = frame.column(input)?;
    if !matches!(array.data_type(), DataType::FixedSizeList(_, _)) {
        return Err(TransformError::Frame(FrameError::NotAChannel {
            column: input.to_string(),
            data_type: array.data_type().clone(),
        }));
    }
    let components = channel_components(array, input)?;
    if let Some(expected) = options.n_components {
        if expected != components.len() {
            return Err(TransformError::InvalidParameter {
                parameter: "n_components",
                reason: format!(
                    "is {expected} but column '{input}' has {} components",
                    components.len()
                ),
            });
        }
    }
    Ok(components)
}

fn output_column(options: &TransformOptions, default: &str) -> String {
    options
        .output_column
        .clone()
        .unwrap_or_else(|| default.to_string())
}

fn resolve_rate(frame: &GazeFrame, options: &TransformOptions) -> Result<f64, TransformError> {
    options
        .sampling_rate
        .or_else(|| frame.experiment.as_ref().and_then(|e| e.sampling_rate))
        .ok_or(TransformError::ContextUnavailable {
            parameter: "sampling_rate",
        })
}

fn resolve_origin(frame: &GazeFrame, options: &TransformOptions) -> Result<Origin, TransformError> {
    options
        .origin
        .or_else(|| frame.experiment.as_ref().map(|e| e.screen.origin))
        .ok_or(TransformError::ContextUnavailable { parameter: "origin" })
}

fn resolve_resolution(
    frame: &GazeFrame,
    options: &TransformOptions,
) -> Result<(f64, f64), TransformError> {
    options
        .screen_resolution
        .or_else(|| frame.experiment.as_ref().map(|e| e.screen.resolution()))
        .ok_or(TransformError::ContextUnavailable {
            parameter: "screen_resolution",
        })
}

fn resolve_size(
    frame: &GazeFrame,
    options: &TransformOptions,
) -> Result<(f64, f64), TransformError> {
    options
        .screen_size
        .or_else(|| frame.experiment.as_ref().map(|e| e.screen.size_cm()))
        .ok_or(TransformError::ContextUnavailable {
            parameter: "screen_size",
        })
}

/// Resolves the eye-to-screen distance.
///
/// An explicit option wins. Otherwise a `distance` column takes precedence
/// over the experiment's constant distance; the column holds millimeters and
/// is converted to centimeters here.
fn resolve_distance(
    frame: &GazeFrame,
    options: &TransformOptions,
) -> Result<DistanceValues, TransformError> {
    if let Some(cm) = options.distance {
        return Ok(DistanceValues::Constant(cm));
    }
    if frame.has_column(columns::DISTANCE) {
        let constant = frame
            .experiment
            .as_ref()
            .and_then(|e| e.screen.distance_cm);
        if constant.is_some() {
            log::warn!(
                "both a distance column and an experiment eye-to-screen distance are \
                 present, using the distance column"
            );
        }
        let millimeters =
            numeric_column_values(frame.column(columns::DISTANCE)?, columns::DISTANCE)?;
        return Ok(DistanceValues::PerSample(
            millimeters.iter().map(|v| v.map(|mm| mm / 10.0)).collect(),
        ));
    }
    match frame.experiment.as_ref() {
        None => Err(TransformError::ContextUnavailable {
            parameter: "distance",
        }),
        Some(experiment) => experiment
            .screen
            .distance_cm
            .map(DistanceValues::Constant)
            .ok_or(TransformError::MissingDistance),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{Experiment, Screen};
    use crate::frame::FrameOptions;
    use arrow::array::{Array, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn experiment_1000hz() -> Experiment {
        let screen = Screen::new(100, 100, 100.0, 100.0, Some(100.0), Origin::Center).unwrap();
        Experiment::new(screen, Some(1000.0)).unwrap()
    }

    fn frame_with_pixel(values_x: Vec<Option<f64>>, values_y: Vec<Option<f64>>) -> GazeFrame {
        let n = values_x.len();
        let schema = Arc::new(Schema::new(vec![
            Field::new("time", DataType::Int64, false),
            Field::new("x", DataType::Float64, true),
            Field::new("y", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from_iter_values(0..n as i64)),
                Arc::new(Float64Array::from(values_x)),
                Arc::new(Float64Array::from(values_y)),
            ],
        )
        .unwrap();
        GazeFrame::new(
            &batch,
            Some(experiment_1000hz()),
            FrameOptions {
                pixel_columns: Some(vec!["x".to_string(), "y".to_string()]),
                ..FrameOptions::default()
            },
        )
        .unwrap()
    }

    fn component(frame: &GazeFrame, column: &str, index: usize) -> Vec<Option<f64>> {
        channel_components(frame.column(column).unwrap(), column).unwrap()[index].clone()
    }

    #[test]
    fn test_operation_round_trips_names() {
        for name in [
            "center_origin",
            "pix2deg",
            "deg2pix",
            "pos2vel",
            "pos2acc",
            "savitzky_golay",
            "smooth",
            "norm",
            "clip",
            "resample",
            "downsample",
        ] {
            let operation: Operation = name.parse().unwrap();
            assert_eq!(operation.as_str(), name);
        }
        let error = "pix2mm".parse::<Operation>().unwrap_err();
        assert!(error.to_string().contains("pix2mm"));
        assert!(error.to_string().contains("pix2deg"));
    }

    #[test]
    fn test_pix2deg_uses_experiment_geometry() {
        let mut frame = frame_with_pixel(vec![Some(49.5)], vec![Some(0.0)]);
        frame.pix2deg().unwrap();
        let x = component(&frame, "position", 0)[0].unwrap();
        assert!((x - 26.3354).abs() < 1e-4);
    }

    #[test]
    fn test_pix2deg_then_pos2vel_pipeline() {
        let mut frame = frame_with_pixel(
            vec![Some(0.0), Some(1.0), Some(2.0), Some(3.0)],
            vec![Some(0.0); 4],
        );
        frame.pix2deg().unwrap();
        frame.pos2vel("preceding").unwrap();
        let velocity = component(&frame, "velocity", 0);
        assert!(velocity[0].is_none());
        assert!(velocity[1].unwrap() > 0.0);
    }

    #[test]
    fn test_pos2vel_without_position_hints_at_pix2deg() {
        let mut frame = frame_with_pixel(vec![Some(0.0); 3], vec![Some(0.0); 3]);
        let error = frame.pos2vel("preceding").unwrap_err();
        let message = error.to_string();
        assert!(message.contains("'position' not found"));
        assert!(message.contains("pix2deg"));
    }

    #[test]
    fn test_failed_transform_leaves_frame_untouched() {
        let mut frame = frame_with_pixel(vec![Some(0.0); 3], vec![Some(0.0); 3]);
        let columns_before = frame.column_names();
        assert!(frame.pos2vel("preceding").is_err());
        assert_eq!(frame.column_names(), columns_before);
        assert_eq!(frame.n_rows(), 3);
    }

    #[test]
    fn test_distance_column_overrides_experiment_constant() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut frame = frame_with_pixel(vec![Some(49.5)], vec![Some(0.0)]);
        // 2000 mm per-sample distance, twice the experiment's 100 cm.
        frame.with_column(
            "distance",
            Arc::new(Float64Array::from(vec![Some(2000.0)])) as ArrayRef,
        );
        frame.pix2deg().unwrap();
        let x = component(&frame, "position", 0)[0].unwrap();
        let expected = (49.5f64).atan2(200.0).to_degrees();
        assert!((x - expected).abs() < 1e-9);
    }

    #[test]
    fn test_n_components_mismatch_rejected() {
        let mut frame = frame_with_pixel(vec![Some(1.0)], vec![Some(2.0)]);
        let error = frame
            .transform(
                Operation::Pix2Deg,
                &TransformOptions {
                    n_components: Some(4),
                    ..TransformOptions::default()
                },
            )
            .unwrap_err();
        assert!(error.to_string().contains("n_components"));
    }

    #[test]
    fn test_norm_of_two_component_channel() {
        let mut frame = frame_with_pixel(
            vec![Some(3.0), None, Some(0.0)],
            vec![Some(4.0), Some(1.0), Some(-2.0)],
        );
        frame.norm("pixel").unwrap();

        let norm = frame.column("pixel_norm").unwrap();
        assert_eq!(norm.data_type(), &DataType::Float64);
        let norm = norm.as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(norm.value(0), 5.0);
        // A null in either component nulls the norm.
        assert!(norm.is_null(1));
        assert_eq!(norm.value(2), 2.0);
    }

    #[test]
    fn test_norm_rejects_wider_channels() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("xl", DataType::Float64, true),
            Field::new("yl", DataType::Float64, true),
            Field::new("xr", DataType::Float64, true),
            Field::new("yr", DataType::Float64, true),
        ]));
        let column: ArrayRef = Arc::new(Float64Array::from(vec![1.0]));
        let batch =
            RecordBatch::try_new(schema, (0..4).map(|_| Arc::clone(&column)).collect()).unwrap();
        let mut frame = GazeFrame::from_batch(&batch).unwrap();
        frame.nest(&["xl", "yl", "xr", "yr"], "velocity").unwrap();

        let error = frame.norm("velocity").unwrap_err();
        assert!(error.to_string().contains("two-component"));
    }

    #[test]
    fn test_clip_scalar_column() {
        let mut frame = frame_with_pixel(vec![Some(0.0); 3], vec![Some(0.0); 3]);
        frame.with_column(
            "pupil",
            Arc::new(Float64Array::from(vec![Some(-3.0), None, Some(250.0)])) as ArrayRef,
        );
        frame
            .clip("pupil", "pupil_clipped", Some(0.0), Some(100.0))
            .unwrap();

        let clipped = frame.column("pupil_clipped").unwrap();
        let clipped = clipped.as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(clipped.value(0), 0.0);
        assert!(clipped.is_null(1));
        assert_eq!(clipped.value(2), 100.0);
    }

    #[test]
    fn test_clip_bounds() {
        let mut frame = frame_with_pixel(
            vec![Some(-5.0), Some(50.0), Some(200.0)],
            vec![Some(0.0); 3],
        );
        frame.clip("pixel", "pixel", Some(0.0), Some(100.0)).unwrap();
        assert_eq!(
            component(&frame, "pixel", 0),
            vec![Some(0.0), Some(50.0), Some(100.0)]
        );
        assert!(frame.clip("pixel", "pixel", Some(1.0), Some(0.0)).is_err());
    }

    #[test]
    fn test_per_trial_velocity_keeps_boundaries_null() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("time", DataType::Int64, false),
            Field::new("trial", DataType::Utf8, true),
            Field::new("x", DataType::Float64, true),
            Field::new("y", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![0, 1, 2, 3, 4, 5])),
                Arc::new(StringArray::from(vec!["a", "a", "a", "b", "b", "b"])),
                Arc::new(Float64Array::from(vec![0.0, 1.0, 2.0, 100.0, 101.0, 102.0])),
                Arc::new(Float64Array::from(vec![0.0; 6])),
            ],
        )
        .unwrap();
        let mut frame = GazeFrame::new(
            &batch,
            Some(experiment_1000hz()),
            FrameOptions {
                trial_columns: Some(vec!["trial".to_string()]),
                position_columns: Some(vec!["x".to_string(), "y".to_string()]),
                ..FrameOptions::default()
            },
        )
        .unwrap();

        frame.pos2vel("preceding").unwrap();
        let velocity = component(&frame, "velocity", 0);
        // The first row of each trial is null; the jump between trials never
        // produces a spike.
        assert!(velocity[0].is_none());
        assert_eq!(velocity[1], Some(1000.0));
        assert!(velocity[3].is_none());
        assert_eq!(velocity[4], Some(1000.0));
    }

    #[test]
    fn test_resample_updates_sampling_rate() {
        let mut frame = frame_with_pixel(vec![Some(0.0), Some(2.0)], vec![Some(0.0); 2]);
        frame.resample(2000.0).unwrap();
        assert_eq!(frame.n_rows(), 3);
        assert_eq!(
            frame.experiment.as_ref().unwrap().sampling_rate,
            Some(2000.0)
        );
    }

    #[test]
    fn test_downsample_divides_sampling_rate() {
        let mut frame = frame_with_pixel(
            vec![Some(0.0), Some(1.0), Some(2.0), Some(3.0)],
            vec![Some(0.0); 4],
        );
        frame.downsample(2).unwrap();
        assert_eq!(frame.n_rows(), 2);
        assert_eq!(
            frame.experiment.as_ref().unwrap().sampling_rate,
            Some(500.0)
        );
    }

    #[test]
    fn test_smooth_in_place_default_savitzky_golay() {
        let mut frame = frame_with_pixel(
            (0..10).map(|i| Some(i as f64)).collect(),
            vec![Some(0.0); 10],
        );
        frame.pix2deg().unwrap();
        let before = component(&frame, "position", 0);
        frame.smooth("savitzky_golay", 7).unwrap();
        let after = component(&frame, "position", 0);
        assert_eq!(before.len(), after.len());
        // Degree-2 smoothing preserves the linear-in-pixels center region
        // closely but the column was rewritten in place.
        assert!(frame.has_column("position"));
        assert!(after[5].is_some());
    }
}
