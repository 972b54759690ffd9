//! # Uniform-Grid Resampling
//!
//! Rebuilds the sample table on a uniform time grid. Timestamps are converted
//! to integer microsecond instants, the grid step is the rounded microsecond
//! period of the target rate, and original rows are matched to grid slots by
//! exact instant. Grid slots without a matching row start out null and are
//! then filled per column according to the [`FillNullStrategy`].
//!
//! Original nulls and inserted nulls are kept apart throughout: a value that
//! was null before resampling is still null afterwards, regardless of the
//! fill strategy.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array, StringArray, UInt32Array};
use arrow::compute;
use arrow::datatypes::DataType;

use crate::frame::{
    build_channel, channel_components, millisecond_array, numeric_column_values, GazeFrame,
};
use crate::schema::columns;
use crate::transform::TransformError;

/// Maximum tolerated gap between the exact sample period and its rounded
/// microsecond value.
const ROUNDING_BUDGET_US: f64 = 1.0;

/// Strategy for filling grid slots that have no matching original sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillNullStrategy {
    /// Carry the previous value forward.
    Forward,
    /// Carry the next value backward.
    Backward,
    /// Linear interpolation between the surrounding values.
    #[default]
    InterpolateLinear,
    /// Copy the nearest surrounding value, preferring the later one on ties.
    InterpolateNearest,
}

impl FillNullStrategy {
    /// Parses a fill strategy name.
    pub fn parse(name: &str) -> Result<Self, TransformError> {
        match name {
            "forward" => Ok(Self::Forward),
            "backward" => Ok(Self::Backward),
            "interpolate_linear" => Ok(Self::InterpolateLinear),
            "interpolate_nearest" => Ok(Self::InterpolateNearest),
            other => Err(TransformError::UnknownMethod {
                parameter: "fill_null_strategy",
                method: other.to_string(),
                valid: "forward, backward, interpolate_linear, interpolate_nearest",
            }),
        }
    }

    fn interpolates(&self) -> bool {
        matches!(self, Self::InterpolateLinear | Self::InterpolateNearest)
    }
}

/// Resamples a frame onto the uniform grid of the given rate.
///
/// Only rows whose timestamp lies exactly on the grid survive; the remaining
/// grid slots are inserted and filled. When `fill_columns` is `None`, every
/// column is filled. Trial key columns are always filled forward and backward
/// so that partitions stay intact.
pub(crate) fn resample(
    frame: &GazeFrame,
    rate: f64,
    fill_columns: Option<&[String]>,
    strategy: FillNullStrategy,
) -> Result<GazeFrame, TransformError> {
    let step_us = grid_step_us(rate)?;
    if frame.n_rows() == 0 {
        return Ok(frame.clone());
    }

    let times = numeric_column_values(frame.column(columns::TIME)?, columns::TIME)
        .map_err(TransformError::from)?;
    let mut instants = Vec::with_capacity(times.len());
    for time in &times {
        match time {
            Some(ms) => instants.push((ms * 1000.0).round() as i64),
            None => {
                return Err(TransformError::InvalidParameter {
                    parameter: "time",
                    reason: "column must not contain null values".to_string(),
                })
            }
        }
    }

    let min = *instants.iter().min().expect("non-empty");
    let max = *instants.iter().max().expect("non-empty");
    let mut row_at_instant: HashMap<i64, u32> = HashMap::with_capacity(instants.len());
    for (row, instant) in instants.iter().enumerate() {
        // The first row at a given instant wins.
        row_at_instant.entry(*instant).or_insert(row as u32);
    }

    let mut grid = Vec::new();
    let mut instant = min;
    while instant <= max {
        grid.push(instant);
        instant += step_us;
    }
    let indices: Vec<Option<u32>> = grid
        .iter()
        .map(|instant| row_at_instant.get(instant).copied())
        .collect();
    let take_indices = UInt32Array::from(indices.clone());

    let fill_set: Option<HashSet<&str>> =
        fill_columns.map(|names| names.iter().map(String::as_str).collect());
    let should_fill = |name: &str| fill_set.as_ref().map_or(true, |set| set.contains(name));
    let trial_keys: HashSet<&str> = frame
        .trial_columns()
        .map(|keys| keys.iter().map(String::as_str).collect())
        .unwrap_or_default();

    let mut new_arrays = Vec::new();
    for name in frame.column_names() {
        let array = frame.column(&name)?;
        let new_array = if name == columns::TIME {
            millisecond_array(
                &grid.iter().map(|us| Some(*us as f64 / 1000.0)).collect::<Vec<_>>(),
            )
        } else if trial_keys.contains(name.as_str()) {
            // Trial keys are constant within a partition; broadcast them over
            // the inserted rows.
            let regridded = compute::take(array, &take_indices, None)?;
            broadcast_fill(&regridded)
        } else if should_fill(&name) {
            let regridded = compute::take(array, &take_indices, None)?;
            fill_column(&regridded, &name, &indices, strategy)?.unwrap_or(regridded)
        } else {
            compute::take(array, &take_indices, None)?
        };
        new_arrays.push(new_array);
    }

    let mut out = frame.clone();
    out.set_columns(new_arrays);
    Ok(out)
}

/// Keeps every `factor`-th row, starting at the first.
pub(crate) fn downsample(frame: &GazeFrame, factor: usize) -> Result<GazeFrame, TransformError> {
    if factor == 0 {
        return Err(TransformError::InvalidParameter {
            parameter: "factor",
            reason: "must be a positive integer, but is 0".to_string(),
        });
    }
    let indices: UInt32Array = (0..frame.n_rows() as u32)
        .step_by(factor)
        .map(Some)
        .collect();
    Ok(frame.take_rows(&indices)?)
}

/// Rounds the sample period of `rate` to whole microseconds, rejecting rates
/// whose rounding error exceeds the budget.
pub(crate) fn grid_step_us(rate: f64) -> Result<i64, TransformError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(TransformError::InvalidParameter {
            parameter: "resampling_rate",
            reason: format!("must be a positive finite number, but is {rate}"),
        });
    }
    let exact = 1e6 / rate;
    let step = exact.round();
    if step < 1.0 || (exact - step).abs() > ROUNDING_BUDGET_US {
        return Err(TransformError::UnrepresentableRate {
            rate,
            error_us: (exact - step).abs(),
        });
    }
    Ok(step as i64)
}

/// Fills the inserted nulls of a regridded column.
///
/// Returns `Ok(None)` when the column type does not support the strategy
/// (text under interpolation), leaving the regridded column as is. Original
/// nulls are carried through a sentinel so they survive the fill.
fn fill_column(
    regridded: &ArrayRef,
    name: &str,
    indices: &[Option<u32>],
    strategy: FillNullStrategy,
) -> Result<Option<ArrayRef>, TransformError> {
    match regridded.data_type() {
        DataType::Float64 => {
            let mut slots = float_slots(
                &numeric_column_values(regridded, name).map_err(TransformError::from)?,
                indices,
            );
            fill_float(&mut slots, strategy);
            let restored: arrow::array::Float64Array = slots
                .into_iter()
                .map(|slot| slot.filter(|v| !v.is_nan()))
                .collect();
            Ok(Some(Arc::new(restored)))
        }
        DataType::Int64 => {
            if strategy.interpolates() {
                // Interpolated values are fractional in general; widen to
                // Float64.
                let mut slots = float_slots(
                    &numeric_column_values(regridded, name).map_err(TransformError::from)?,
                    indices,
                );
                fill_float(&mut slots, strategy);
                let restored: arrow::array::Float64Array = slots
                    .into_iter()
                    .map(|slot| slot.filter(|v| !v.is_nan()))
                    .collect();
                Ok(Some(Arc::new(restored)))
            } else {
                let ints = regridded
                    .as_any()
                    .downcast_ref::<Int64Array>()
                    .expect("checked type");
                let mut slots: Vec<Option<i64>> = ints
                    .iter()
                    .zip(indices)
                    .map(|(value, index)| match index {
                        Some(_) => Some(value.unwrap_or(i64::MIN)),
                        None => None,
                    })
                    .collect();
                fill_carry(&mut slots, strategy == FillNullStrategy::Backward);
                let restored: Int64Array = slots
                    .into_iter()
                    .map(|slot| slot.filter(|v| *v != i64::MIN))
                    .collect();
                Ok(Some(Arc::new(restored)))
            }
        }
        DataType::Utf8 => {
            if strategy.interpolates() {
                return Ok(None);
            }
            let strings = regridded
                .as_any()
                .downcast_ref::<StringArray>()
                .expect("checked type");
            let mut slots: Vec<Option<&str>> = strings.iter().collect();
            fill_carry(&mut slots, strategy == FillNullStrategy::Backward);
            Ok(Some(Arc::new(slots.into_iter().collect::<StringArray>())))
        }
        DataType::FixedSizeList(_, _) => {
            let components = channel_components(regridded, name).map_err(TransformError::from)?;
            let filled: Vec<Vec<Option<f64>>> = components
                .iter()
                .map(|series| {
                    let mut slots = float_slots(series, indices);
                    fill_float(&mut slots, strategy);
                    slots
                        .into_iter()
                        .map(|slot| slot.filter(|v| !v.is_nan()))
                        .collect()
                })
                .collect();
            Ok(Some(build_channel(&filled)))
        }
        _ => Ok(None),
    }
}

/// Fills every null with the nearest value, forward first and backward for a
/// leading run. Only used for trial key columns, which never distinguish
/// original nulls from inserted ones.
fn broadcast_fill(regridded: &ArrayRef) -> ArrayRef {
    match regridded.data_type() {
        DataType::Int64 => {
            let ints = regridded
                .as_any()
                .downcast_ref::<Int64Array>()
                .expect("checked type");
            let mut slots: Vec<Option<i64>> = ints.iter().collect();
            fill_carry(&mut slots, false);
            fill_carry(&mut slots, true);
            Arc::new(slots.into_iter().collect::<Int64Array>())
        }
        DataType::Float64 => {
            let floats = regridded
                .as_any()
                .downcast_ref::<arrow::array::Float64Array>()
                .expect("checked type");
            let mut slots: Vec<Option<f64>> = floats.iter().collect();
            fill_carry(&mut slots, false);
            fill_carry(&mut slots, true);
            Arc::new(slots.into_iter().collect::<arrow::array::Float64Array>())
        }
        DataType::Utf8 => {
            let strings = regridded
                .as_any()
                .downcast_ref::<StringArray>()
                .expect("checked type");
            let mut slots: Vec<Option<&str>> = strings.iter().collect();
            fill_carry(&mut slots, false);
            fill_carry(&mut slots, true);
            Arc::new(slots.into_iter().collect::<StringArray>())
        }
        _ => regridded.clone(),
    }
}

/// Maps a regridded series to fill slots: matched rows become values (with
/// NaN standing in for original nulls), unmatched rows become `None`.
fn float_slots(series: &[Option<f64>], indices: &[Option<u32>]) -> Vec<Option<f64>> {
    series
        .iter()
        .zip(indices)
        .map(|(value, index)| match index {
            Some(_) => Some(value.unwrap_or(f64::NAN)),
            None => None,
        })
        .collect()
}

fn fill_float(slots: &mut [Option<f64>], strategy: FillNullStrategy) {
    match strategy {
        FillNullStrategy::Forward => fill_carry(slots, false),
        FillNullStrategy::Backward => fill_carry(slots, true),
        FillNullStrategy::InterpolateLinear => fill_interpolate(slots, true),
        FillNullStrategy::InterpolateNearest => fill_interpolate(slots, false),
    }
}

fn fill_carry<T: Copy>(slots: &mut [Option<T>], backward: bool) {
    let mut last: Option<T> = None;
    let indices: Vec<usize> = if backward {
        (0..slots.len()).rev().collect()
    } else {
        (0..slots.len()).collect()
    };
    for i in indices {
        match slots[i] {
            Some(value) => last = Some(value),
            None => slots[i] = last,
        }
    }
}

/// Fills null runs between known slots. The grid is uniform, so slot index
/// distance is proportional to time distance. Runs before the first or after
/// the last known slot stay null.
fn fill_interpolate(slots: &mut [Option<f64>], linear: bool) {
    let n = slots.len();
    let mut prev_known: Option<usize> = None;
    let mut i = 0;
    while i < n {
        if slots[i].is_some() {
            prev_known = Some(i);
            i += 1;
            continue;
        }
        let run_start = i;
        while i < n && slots[i].is_none() {
            i += 1;
        }
        let (Some(a), true) = (prev_known, i < n) else {
            continue;
        };
        let b = i;
        let left = slots[a].expect("known");
        let right = slots[b].expect("known");
        for slot in run_start..b {
            slots[slot] = Some(if linear {
                let fraction = (slot - a) as f64 / (b - a) as f64;
                left + (right - left) * fraction
            } else if slot - a < b - slot {
                left
            } else {
                right
            });
        }
    }
}
