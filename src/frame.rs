//! # Gaze Sample Table
//!
//! The [`GazeFrame`] is the central data structure of the crate: an ordered,
//! columnar table of eye-tracker samples backed by Apache Arrow arrays.
//!
//! ## Design Principles
//!
//! 1. **Columnar storage**: every signal is a whole Arrow array; transforms
//!    operate on full columns instead of row by row.
//!
//! 2. **Channel nesting**: multi-component signals are held as
//!    `FixedSizeList` channels of width 2, 4 or 6 (see [`crate::schema`]).
//!    [`GazeFrame::nest`] and [`GazeFrame::unnest`] convert between the
//!    scalar-column and channel representations in place.
//!
//! 3. **Exclusive-reference mutation**: every mutating operation takes
//!    `&mut self` and commits fully-built replacement columns, so a failed
//!    operation leaves the table untouched.
//!
//! 4. **Arrow interop**: frames are created from and exported to
//!    [`RecordBatch`], which is the hand-off point to the excluded I/O layer.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, FixedSizeListArray, Float64Array, Int64Array, StringArray, UInt32Array,
};
use arrow::compute;
use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use arrow::record_batch::RecordBatch;

use crate::experiment::Experiment;
use crate::schema::{self, columns};

/// Errors raised by sample-table and channel-model operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A referenced column does not exist in the table.
    #[error("column '{column}' is not available in the samples table. Available columns are: {available:?}")]
    ColumnNotFound {
        /// The missing column name.
        column: String,
        /// The columns that do exist.
        available: Vec<String>,
    },

    /// An output column name is already taken.
    #[error("column '{0}' already exists in the samples table")]
    DuplicateColumn(String),

    /// A channel operation received an unsupported number of components.
    #[error("'{name}' must contain either 2, 4 or 6 columns, but has {count}")]
    InvalidComponentCount {
        /// Name of the channel or column list being checked.
        name: String,
        /// The rejected component count.
        count: usize,
    },

    /// Columns nested into one channel do not share a scalar type.
    #[error("all columns nested into '{name}' must be of the same type, but types are {types:?}")]
    MixedComponentTypes {
        /// Name of the channel being built.
        name: String,
        /// The distinct types encountered, in sorted order.
        types: Vec<String>,
    },

    /// A column has a type the channel model cannot nest or unnest.
    #[error("column '{column}' has unsupported type {data_type} (expected Float64 or Int64)")]
    UnsupportedType {
        /// The offending column name.
        column: String,
        /// The rejected data type.
        data_type: DataType,
    },

    /// A column expected to be a channel is not a fixed-size list.
    #[error("column '{column}' is not a channel column (type is {data_type}, expected FixedSizeList)")]
    NotAChannel {
        /// The offending column name.
        column: String,
        /// The actual data type.
        data_type: DataType,
    },

    /// Channels present in the table disagree on their component count.
    #[error("inconsistent number of components inferred: {widths:?}")]
    InconsistentComponents {
        /// The distinct widths encountered.
        widths: Vec<usize>,
    },

    /// A component count is required but no channel column is present.
    #[error(
        "number of components required but no gaze channel could be inferred. \
         Nest scalar columns into one of the channel columns \
         ('pixel', 'position', 'velocity', 'acceleration') first"
    )]
    NoComponents,

    /// Unnest output names collide with each other or with existing columns.
    #[error("output columns / suffixes must be unique, but got {names:?}")]
    OutputNameCollision {
        /// The colliding output names.
        names: Vec<String>,
    },

    /// The number of unnest output names does not match the channel width.
    #[error("number of output columns / suffixes ({got}) must match number of components ({expected})")]
    OutputCountMismatch {
        /// The channel width.
        expected: usize,
        /// The number of names supplied.
        got: usize,
    },

    /// A time column is needed but the sampling rate to synthesize one is not known.
    #[error(
        "no time column present and no sampling rate available to synthesize one; \
         attach an experiment with a sampling rate or provide a time column"
    )]
    CannotSynthesizeTime,

    /// Frames passed to `concat` do not share a schema.
    #[error("cannot concatenate frames with differing columns: {0:?} vs {1:?}")]
    SchemaMismatch(Vec<String>, Vec<String>),

    /// `concat` was called with no frames.
    #[error("cannot concatenate an empty list of frames")]
    EmptyConcat,

    /// An underlying Arrow kernel failed.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// Unit of the timestamps supplied at frame construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeUnit {
    /// Seconds; values are multiplied by 1000.
    Seconds,
    /// Milliseconds; values are taken as-is.
    #[default]
    Milliseconds,
    /// Sample indices; converted via the experiment sampling rate.
    Steps,
}

/// Column mapping options applied when constructing a [`GazeFrame`].
///
/// All fields are optional; `Default` leaves the input batch untouched apart
/// from NaN-to-null normalization.
#[derive(Debug, Clone, Default)]
pub struct FrameOptions {
    /// Columns identifying independent trials. Windowed transforms never mix
    /// values across rows with differing trial keys.
    pub trial_columns: Option<Vec<String>>,
    /// Name of the timestamp column, renamed to `time`.
    pub time_column: Option<String>,
    /// Unit of the timestamp column, defaults to milliseconds.
    pub time_unit: Option<TimeUnit>,
    /// Scalar columns nested into the `pixel` channel.
    pub pixel_columns: Option<Vec<String>>,
    /// Scalar columns nested into the `position` channel.
    pub position_columns: Option<Vec<String>>,
    /// Scalar columns nested into the `velocity` channel.
    pub velocity_columns: Option<Vec<String>>,
    /// Scalar columns nested into the `acceleration` channel.
    pub acceleration_columns: Option<Vec<String>>,
    /// Per-sample eye-to-screen distance column (millimeters), renamed to
    /// `distance`.
    pub distance_column: Option<String>,
}

/// Columnar table of gaze samples with optional experiment context.
#[derive(Debug, Clone)]
pub struct GazeFrame {
    fields: Vec<FieldRef>,
    arrays: Vec<ArrayRef>,
    n_rows: usize,
    /// The experiment definition supplying geometry context, if any.
    pub experiment: Option<Experiment>,
    trial_columns: Option<Vec<String>>,
}

impl GazeFrame {
    /// Creates a frame from a record batch, applying the given column mapping.
    ///
    /// The mapping nests component columns into channels, normalizes the time
    /// column to milliseconds (synthesizing one from the sampling rate when
    /// absent) and renames the distance column. Float columns have NaN values
    /// normalized to null.
    pub fn new(
        batch: &RecordBatch,
        experiment: Option<Experiment>,
        options: FrameOptions,
    ) -> Result<Self, FrameError> {
        let mut frame = Self {
            fields: batch.schema().fields().iter().cloned().collect(),
            arrays: batch.columns().to_vec(),
            n_rows: batch.num_rows(),
            experiment,
            trial_columns: None,
        };

        frame.normalize_nans();

        if let Some(trial_columns) = &options.trial_columns {
            for column in trial_columns {
                frame.column(column)?;
            }
            if !trial_columns.is_empty() {
                frame.trial_columns = Some(trial_columns.clone());
            }
        }

        frame.init_time(options.time_column.as_deref(), options.time_unit)?;

        if let Some(distance_column) = &options.distance_column {
            frame.rename_column(distance_column, columns::DISTANCE)?;
        }

        let nest_specs = [
            (columns::PIXEL, &options.pixel_columns),
            (columns::POSITION, &options.position_columns),
            (columns::VELOCITY, &options.velocity_columns),
            (columns::ACCELERATION, &options.acceleration_columns),
        ];
        for (channel, spec) in nest_specs {
            if let Some(component_columns) = spec {
                if !component_columns.is_empty() {
                    let refs: Vec<&str> =
                        component_columns.iter().map(String::as_str).collect();
                    frame.nest(&refs, channel)?;
                }
            }
        }

        Ok(frame)
    }

    /// Creates a frame from a record batch without any column mapping.
    pub fn from_batch(batch: &RecordBatch) -> Result<Self, FrameError> {
        Self::new(batch, None, FrameOptions::default())
    }

    /// Exports the frame as an Arrow record batch.
    pub fn to_record_batch(&self) -> Result<RecordBatch, FrameError> {
        let schema = Arc::new(Schema::new(self.fields.clone()));
        if self.n_rows == 0 && self.arrays.is_empty() {
            return Ok(RecordBatch::new_empty(schema));
        }
        Ok(RecordBatch::try_new(schema, self.arrays.clone())?)
    }

    /// Number of sample rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Names of all columns, in table order.
    pub fn column_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name().clone()).collect()
    }

    /// Returns true if a column with the given name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name() == name)
    }

    /// The trial key columns, if any.
    pub fn trial_columns(&self) -> Option<&[String]> {
        self.trial_columns.as_deref()
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Result<&ArrayRef, FrameError> {
        self.index_of(name)
            .map(|idx| &self.arrays[idx])
            .ok_or_else(|| FrameError::ColumnNotFound {
                column: name.to_string(),
                available: self.column_names(),
            })
    }

    /// Adds a column, or replaces it if a column of the same name exists.
    pub fn with_column(&mut self, name: &str, array: ArrayRef) {
        let field = Arc::new(Field::new(name, array.data_type().clone(), true));
        match self.index_of(name) {
            Some(idx) => {
                self.fields[idx] = field;
                self.arrays[idx] = array;
            }
            None => {
                if self.arrays.is_empty() {
                    self.n_rows = array.len();
                }
                self.fields.push(field);
                self.arrays.push(array);
            }
        }
    }

    /// Replaces every column at once, keeping names and table order. Used when
    /// an operation rebuilds the whole table on a new row grid.
    pub(crate) fn set_columns(&mut self, arrays: Vec<ArrayRef>) {
        debug_assert_eq!(arrays.len(), self.fields.len());
        self.n_rows = arrays.first().map(|a| a.len()).unwrap_or(0);
        self.fields = self
            .fields
            .iter()
            .zip(&arrays)
            .map(|(field, array)| {
                Arc::new(Field::new(field.name(), array.data_type().clone(), true)) as FieldRef
            })
            .collect();
        self.arrays = arrays;
    }

    /// Removes a column by name. Missing columns are ignored.
    pub fn drop_column(&mut self, name: &str) {
        if let Some(idx) = self.index_of(name) {
            self.fields.remove(idx);
            self.arrays.remove(idx);
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    fn rename_column(&mut self, from: &str, to: &str) -> Result<(), FrameError> {
        let idx = self.index_of(from).ok_or_else(|| FrameError::ColumnNotFound {
            column: from.to_string(),
            available: self.column_names(),
        })?;
        if from != to && self.has_column(to) {
            return Err(FrameError::DuplicateColumn(to.to_string()));
        }
        let field = &self.fields[idx];
        self.fields[idx] =
            Arc::new(Field::new(to, field.data_type().clone(), field.is_nullable()));
        Ok(())
    }

    /// Replaces NaN by null in every Float64 scalar column.
    ///
    /// NaN and null both mean "no signal" in raw recordings; nulls are the
    /// canonical representation here.
    fn normalize_nans(&mut self) {
        for idx in 0..self.arrays.len() {
            if self.arrays[idx].data_type() != &DataType::Float64 {
                continue;
            }
            let values = self.arrays[idx]
                .as_any()
                .downcast_ref::<Float64Array>()
                .expect("checked Float64 type");
            if values.iter().flatten().any(f64::is_nan) {
                let cleaned: Float64Array = values
                    .iter()
                    .map(|v| v.filter(|value| !value.is_nan()))
                    .collect();
                self.arrays[idx] = Arc::new(cleaned);
            }
        }
    }

    fn init_time(
        &mut self,
        time_column: Option<&str>,
        time_unit: Option<TimeUnit>,
    ) -> Result<(), FrameError> {
        let unit = time_unit.unwrap_or_default();

        if let Some(source) = time_column {
            self.rename_column(source, columns::TIME)?;
            let times = numeric_column_values(self.column(columns::TIME)?, columns::TIME)?;
            let scale = match unit {
                TimeUnit::Seconds => 1000.0,
                TimeUnit::Milliseconds => 1.0,
                TimeUnit::Steps => {
                    let rate = self
                        .experiment
                        .as_ref()
                        .and_then(|e| e.sampling_rate)
                        .ok_or(FrameError::CannotSynthesizeTime)?;
                    1000.0 / rate
                }
            };
            if scale != 1.0 {
                let scaled: Vec<Option<f64>> =
                    times.iter().map(|t| t.map(|v| v * scale)).collect();
                self.with_column(columns::TIME, millisecond_array(&scaled));
            }
            return Ok(());
        }

        // Without a time column the frame is still usable for purely spatial
        // transforms; only synthesize when a sampling rate is known.
        if !self.has_column(columns::TIME) {
            if let Some(rate) = self.experiment.as_ref().and_then(|e| e.sampling_rate) {
                let step = 1000.0 / rate;
                let times: Vec<Option<f64>> =
                    (0..self.n_rows).map(|i| Some(i as f64 * step)).collect();
                self.with_column(columns::TIME, millisecond_array(&times));
            }
        }
        Ok(())
    }

    /// Nests scalar component columns into a single channel column.
    ///
    /// The input columns must all be Float64 or all Int64, and their count
    /// must be a supported channel width (2, 4 or 6) in the canonical
    /// component order. The inputs are dropped from the table.
    pub fn nest(&mut self, input_columns: &[&str], output_column: &str) -> Result<(), FrameError> {
        if !schema::is_valid_width(input_columns.len()) {
            return Err(FrameError::InvalidComponentCount {
                name: output_column.to_string(),
                count: input_columns.len(),
            });
        }

        if self.has_column(output_column) && !input_columns.contains(&output_column) {
            return Err(FrameError::DuplicateColumn(output_column.to_string()));
        }

        let mut component_arrays = Vec::with_capacity(input_columns.len());
        for name in input_columns {
            component_arrays.push(Arc::clone(self.column(name)?));
        }

        let mut types: Vec<String> = component_arrays
            .iter()
            .map(|a| a.data_type().to_string())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if types.len() != 1 {
            types.sort();
            return Err(FrameError::MixedComponentTypes {
                name: output_column.to_string(),
                types,
            });
        }

        let item_type = component_arrays[0].data_type().clone();
        let channel: ArrayRef = match item_type {
            DataType::Float64 => {
                let components: Vec<&Float64Array> = component_arrays
                    .iter()
                    .map(|a| a.as_any().downcast_ref::<Float64Array>().expect("checked type"))
                    .collect();
                let interleaved: Float64Array = (0..self.n_rows)
                    .flat_map(|row| {
                        components.iter().map(move |c| {
                            if c.is_null(row) {
                                None
                            } else {
                                Some(c.value(row))
                            }
                        })
                    })
                    .collect();
                Arc::new(FixedSizeListArray::new(
                    Arc::new(Field::new("item", DataType::Float64, true)),
                    input_columns.len() as i32,
                    Arc::new(interleaved),
                    None,
                ))
            }
            DataType::Int64 => {
                let components: Vec<&Int64Array> = component_arrays
                    .iter()
                    .map(|a| a.as_any().downcast_ref::<Int64Array>().expect("checked type"))
                    .collect();
                let interleaved: Int64Array = (0..self.n_rows)
                    .flat_map(|row| {
                        components.iter().map(move |c| {
                            if c.is_null(row) {
                                None
                            } else {
                                Some(c.value(row))
                            }
                        })
                    })
                    .collect();
                Arc::new(FixedSizeListArray::new(
                    Arc::new(Field::new("item", DataType::Int64, true)),
                    input_columns.len() as i32,
                    Arc::new(interleaved),
                    None,
                ))
            }
            other => {
                return Err(FrameError::UnsupportedType {
                    column: input_columns[0].to_string(),
                    data_type: other,
                })
            }
        };

        for name in input_columns {
            self.drop_column(name);
        }
        self.with_column(output_column, channel);
        Ok(())
    }

    /// Unnests channel columns back into scalar component columns.
    ///
    /// Output names are formed by appending `output_suffixes` to each input
    /// column name; when `None`, the canonical suffixes for the channel width
    /// are used (see [`schema::component_suffixes`]). The input channels are
    /// dropped and the scalar type of the original components is restored.
    pub fn unnest(
        &mut self,
        input_columns: &[&str],
        output_suffixes: Option<&[&str]>,
    ) -> Result<(), FrameError> {
        for input in input_columns {
            let width = self.channel_width_of(input)?;

            let names: Vec<String> = match output_suffixes {
                Some(suffixes) => {
                    if suffixes.len() != width {
                        return Err(FrameError::OutputCountMismatch {
                            expected: width,
                            got: suffixes.len(),
                        });
                    }
                    suffixes.iter().map(|s| format!("{input}{s}")).collect()
                }
                None => {
                    let suffixes = schema::component_suffixes(width).ok_or(
                        FrameError::InvalidComponentCount {
                            name: input.to_string(),
                            count: width,
                        },
                    )?;
                    suffixes.iter().map(|s| format!("{input}{s}")).collect()
                }
            };

            self.unnest_into(input, &names)?;
        }
        Ok(())
    }

    /// Unnests one channel column into explicitly named scalar columns.
    pub fn unnest_into(
        &mut self,
        input_column: &str,
        output_columns: &[String],
    ) -> Result<(), FrameError> {
        let array = Arc::clone(self.column(input_column)?);
        let list = array
            .as_any()
            .downcast_ref::<FixedSizeListArray>()
            .ok_or_else(|| FrameError::NotAChannel {
                column: input_column.to_string(),
                data_type: array.data_type().clone(),
            })?;
        let width = list.value_length() as usize;

        if output_columns.len() != width {
            return Err(FrameError::OutputCountMismatch {
                expected: width,
                got: output_columns.len(),
            });
        }
        let unique: HashSet<&String> = output_columns.iter().collect();
        if unique.len() != output_columns.len() {
            return Err(FrameError::OutputNameCollision {
                names: output_columns.to_vec(),
            });
        }
        for name in output_columns {
            if self.has_column(name) && name != input_column {
                return Err(FrameError::DuplicateColumn(name.clone()));
            }
        }

        let mut outputs: Vec<ArrayRef> = Vec::with_capacity(width);
        match list.values().data_type() {
            DataType::Float64 => {
                let values = list
                    .values()
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .expect("checked item type");
                for component in 0..width {
                    let column: Float64Array = (0..list.len())
                        .map(|row| {
                            if list.is_null(row) {
                                return None;
                            }
                            let idx = list.value_offset(row) as usize + component;
                            if values.is_null(idx) {
                                None
                            } else {
                                Some(values.value(idx))
                            }
                        })
                        .collect();
                    outputs.push(Arc::new(column));
                }
            }
            DataType::Int64 => {
                let values = list
                    .values()
                    .as_any()
                    .downcast_ref::<Int64Array>()
                    .expect("checked item type");
                for component in 0..width {
                    let column: Int64Array = (0..list.len())
                        .map(|row| {
                            if list.is_null(row) {
                                return None;
                            }
                            let idx = list.value_offset(row) as usize + component;
                            if values.is_null(idx) {
                                None
                            } else {
                                Some(values.value(idx))
                            }
                        })
                        .collect();
                    outputs.push(Arc::new(column));
                }
            }
            other => {
                return Err(FrameError::UnsupportedType {
                    column: input_column.to_string(),
                    data_type: other.clone(),
                })
            }
        }

        self.drop_column(input_column);
        for (name, column) in output_columns.iter().zip(outputs) {
            self.with_column(name, column);
        }
        Ok(())
    }

    fn channel_width_of(&self, name: &str) -> Result<usize, FrameError> {
        let array = self.column(name)?;
        schema::channel_width(array.data_type()).ok_or_else(|| FrameError::NotAChannel {
            column: name.to_string(),
            data_type: array.data_type().clone(),
        })
    }

    /// Infers the common component count of all present channel columns.
    ///
    /// Returns `Ok(None)` when no channel column exists, and an error when
    /// the present channels disagree on their width.
    pub fn n_components(&self) -> Result<Option<usize>, FrameError> {
        let mut widths: Vec<usize> = Vec::new();
        for name in schema::CHANNEL_COLUMNS {
            if self.has_column(name) {
                let width = self.channel_width_of(name)?;
                if !widths.contains(&width) {
                    widths.push(width);
                }
            }
        }
        match widths.len() {
            0 => Ok(None),
            1 => {
                let width = widths[0];
                if schema::is_valid_width(width) {
                    Ok(Some(width))
                } else {
                    Err(FrameError::InvalidComponentCount {
                        name: "channel".to_string(),
                        count: width,
                    })
                }
            }
            _ => {
                widths.sort_unstable();
                Err(FrameError::InconsistentComponents { widths })
            }
        }
    }

    /// Selects rows by index, producing a new frame.
    pub fn take_rows(&self, indices: &UInt32Array) -> Result<GazeFrame, FrameError> {
        let mut arrays = Vec::with_capacity(self.arrays.len());
        for array in &self.arrays {
            arrays.push(compute::take(array.as_ref(), indices, None)?);
        }
        Ok(GazeFrame {
            fields: self.fields.clone(),
            arrays,
            n_rows: indices.len(),
            experiment: self.experiment.clone(),
            trial_columns: self.trial_columns.clone(),
        })
    }

    /// Partitions row indices by the given key columns.
    ///
    /// Partitions are returned in order of first appearance of each key
    /// tuple; within a partition the original row order is preserved. This is
    /// deliberately not a sort: trial identifiers need not be monotonic.
    pub fn partition_indices(&self, keys: &[String]) -> Result<Vec<UInt32Array>, FrameError> {
        let mut key_arrays = Vec::with_capacity(keys.len());
        for key in keys {
            key_arrays.push(Arc::clone(self.column(key)?));
        }

        let mut groups: Vec<Vec<u32>> = Vec::new();
        let mut seen: HashMap<Vec<KeyValue>, usize> = HashMap::new();
        for row in 0..self.n_rows {
            let key: Vec<KeyValue> = key_arrays
                .iter()
                .map(|array| KeyValue::from_array(array, row))
                .collect::<Result<_, _>>()?;
            let group = *seen.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[group].push(row as u32);
        }

        Ok(groups
            .into_iter()
            .map(|indices| UInt32Array::from(indices))
            .collect())
    }

    /// Concatenates frames produced from partitions of one table.
    ///
    /// The frames must share the same column layout; the order of the input
    /// slice is preserved.
    pub fn concat(parts: &[GazeFrame]) -> Result<GazeFrame, FrameError> {
        let first = parts.first().ok_or(FrameError::EmptyConcat)?;
        let names = first.column_names();
        for part in &parts[1..] {
            let part_names = part.column_names();
            if part_names != names {
                return Err(FrameError::SchemaMismatch(names, part_names));
            }
        }

        let mut arrays = Vec::with_capacity(first.arrays.len());
        for idx in 0..first.arrays.len() {
            let columns: Vec<&dyn Array> =
                parts.iter().map(|p| p.arrays[idx].as_ref()).collect();
            arrays.push(compute::concat(&columns)?);
        }
        Ok(GazeFrame {
            fields: first.fields.clone(),
            arrays,
            n_rows: parts.iter().map(|p| p.n_rows).sum(),
            experiment: first.experiment.clone(),
            trial_columns: first.trial_columns.clone(),
        })
    }
}

/// Hashable per-row key value used for trial partitioning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyValue {
    Null,
    Int(i64),
    /// Float keys hashed by bit pattern.
    Float(u64),
    Str(String),
}

impl KeyValue {
    fn from_array(array: &ArrayRef, row: usize) -> Result<Self, FrameError> {
        if array.is_null(row) {
            return Ok(Self::Null);
        }
        match array.data_type() {
            DataType::Int64 => {
                let values = array.as_any().downcast_ref::<Int64Array>().expect("checked type");
                Ok(Self::Int(values.value(row)))
            }
            DataType::Float64 => {
                let values = array
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .expect("checked type");
                Ok(Self::Float(values.value(row).to_bits()))
            }
            DataType::Utf8 => {
                let values = array.as_any().downcast_ref::<StringArray>().expect("checked type");
                Ok(Self::Str(values.value(row).to_string()))
            }
            other => Err(FrameError::UnsupportedType {
                column: "trial key".to_string(),
                data_type: other.clone(),
            }),
        }
    }
}

/// Reads a numeric (Int64 or Float64) column as `f64` values.
pub(crate) fn numeric_column_values(
    array: &ArrayRef,
    name: &str,
) -> Result<Vec<Option<f64>>, FrameError> {
    match array.data_type() {
        DataType::Float64 => {
            let values = array
                .as_any()
                .downcast_ref::<Float64Array>()
                .expect("checked type");
            Ok(values.iter().collect())
        }
        DataType::Int64 => {
            let values = array.as_any().downcast_ref::<Int64Array>().expect("checked type");
            Ok(values.iter().map(|v| v.map(|i| i as f64)).collect())
        }
        other => Err(FrameError::UnsupportedType {
            column: name.to_string(),
            data_type: other.clone(),
        }),
    }
}

/// Builds a millisecond time array, collapsing to Int64 when every value is
/// integral.
pub(crate) fn millisecond_array(values: &[Option<f64>]) -> ArrayRef {
    let integral = values
        .iter()
        .flatten()
        .all(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64);
    if integral {
        let ints: Int64Array = values.iter().map(|v| v.map(|t| t as i64)).collect();
        Arc::new(ints)
    } else {
        let floats: Float64Array = values.iter().copied().collect();
        Arc::new(floats)
    }
}

/// Extracts the components of a channel column as per-component `f64` series.
///
/// Int64 channels are widened to `f64`. A null list entry yields null for all
/// of its components.
pub fn channel_components(
    array: &ArrayRef,
    name: &str,
) -> Result<Vec<Vec<Option<f64>>>, FrameError> {
    let list = array
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| FrameError::NotAChannel {
            column: name.to_string(),
            data_type: array.data_type().clone(),
        })?;
    let width = list.value_length() as usize;
    let mut components = vec![Vec::with_capacity(list.len()); width];

    match list.values().data_type() {
        DataType::Float64 => {
            let values = list
                .values()
                .as_any()
                .downcast_ref::<Float64Array>()
                .expect("checked item type");
            for row in 0..list.len() {
                for (component, series) in components.iter_mut().enumerate() {
                    if list.is_null(row) {
                        series.push(None);
                        continue;
                    }
                    let idx = list.value_offset(row) as usize + component;
                    if values.is_null(idx) || values.value(idx).is_nan() {
                        series.push(None);
                    } else {
                        series.push(Some(values.value(idx)));
                    }
                }
            }
        }
        DataType::Int64 => {
            let values = list
                .values()
                .as_any()
                .downcast_ref::<Int64Array>()
                .expect("checked item type");
            for row in 0..list.len() {
                for (component, series) in components.iter_mut().enumerate() {
                    if list.is_null(row) {
                        series.push(None);
                        continue;
                    }
                    let idx = list.value_offset(row) as usize + component;
                    if values.is_null(idx) {
                        series.push(None);
                    } else {
                        series.push(Some(values.value(idx) as f64));
                    }
                }
            }
        }
        other => {
            return Err(FrameError::UnsupportedType {
                column: name.to_string(),
                data_type: other.clone(),
            })
        }
    }
    Ok(components)
}

/// Builds a Float64 channel column from per-component series.
///
/// NaN results are stored as null, matching the frame-wide convention.
pub(crate) fn build_channel(components: &[Vec<Option<f64>>]) -> ArrayRef {
    let width = components.len();
    let n_rows = components.first().map_or(0, Vec::len);
    let interleaved: Float64Array = (0..n_rows)
        .flat_map(|row| {
            components
                .iter()
                .map(move |series| series[row].filter(|v| !v.is_nan()))
        })
        .collect();
    Arc::new(FixedSizeListArray::new(
        Arc::new(Field::new("item", DataType::Float64, true)),
        width as i32,
        Arc::new(interleaved),
        None,
    ))
}
