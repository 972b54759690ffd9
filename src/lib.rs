//! # GazeKit - Gaze Signal Transformation Engine
//!
//! `gazekit` transforms and resamples eye-tracking signals held in columnar
//! Apache Arrow tables: pixel coordinates to degrees of visual angle and
//! back, positions to velocities and accelerations, smoothing, clipping and
//! uniform-grid resampling.
//!
//! ## Key Features
//!
//! - **Columnar Sample Table**: Gaze recordings live in a [`frame::GazeFrame`],
//!   an ordered Arrow-backed table created from and exported to
//!   [`arrow::record_batch::RecordBatch`].
//!
//! - **Channel Model**: Multi-component signals (one eye, both eyes, or both
//!   eyes plus averages) are nested into `FixedSizeList` channels of width 2,
//!   4 or 6, so a transform applies to every component at once.
//!
//! - **Experiment Geometry**: Screen resolution, physical size, pixel origin,
//!   eye-to-screen distance and sampling rate are carried by an
//!   [`experiment::Experiment`] and fill in transform parameters that are not
//!   given explicitly.
//!
//! - **Trial Awareness**: When trial key columns are declared, transforms are
//!   applied per trial segment, so differentiation windows and resampling
//!   grids never cross a trial boundary.
//!
//! - **Strict Null Discipline**: Missing samples stay missing. Differentiation
//!   stencils that touch a null produce null, and resampling keeps original
//!   nulls apart from inserted grid rows.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use arrow::array::{Float64Array, Int64Array};
//! use arrow::datatypes::{DataType, Field, Schema};
//! use arrow::record_batch::RecordBatch;
//! use gazekit::prelude::*;
//!
//! // A 1280x1024 screen, 38x30 cm, viewed from 68 cm.
//! let screen = Screen::new(1280, 1024, 38.0, 30.0, Some(68.0), Origin::UpperLeft)?;
//! let experiment = Experiment::new(screen, Some(1000.0))?;
//!
//! let schema = Arc::new(Schema::new(vec![
//!     Field::new("t", DataType::Int64, false),
//!     Field::new("x", DataType::Float64, true),
//!     Field::new("y", DataType::Float64, true),
//! ]));
//! let batch = RecordBatch::try_new(
//!     schema,
//!     vec![
//!         Arc::new(Int64Array::from(vec![0, 1, 2, 3, 4])),
//!         Arc::new(Float64Array::from(vec![640.0, 641.0, 642.0, 643.0, 644.0])),
//!         Arc::new(Float64Array::from(vec![512.0; 5])),
//!     ],
//! )?;
//!
//! let mut frame = GazeFrame::new(
//!     &batch,
//!     Some(experiment),
//!     FrameOptions {
//!         time_column: Some("t".to_string()),
//!         pixel_columns: Some(vec!["x".to_string(), "y".to_string()]),
//!         ..FrameOptions::default()
//!     },
//! )?;
//!
//! frame.pix2deg()?;
//! frame.pos2vel("fivepoint")?;
//! assert!(frame.has_column("velocity"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`schema`]: Channel column names, valid widths and component suffixes
//! - [`experiment`]: Screen geometry, pixel origin and sampling rate
//! - [`frame`]: The Arrow-backed sample table and channel nesting
//! - [`projection`]: Pixel / visual-angle conversion
//! - [`savgol`]: Savitzky-Golay filtering and window padding
//! - [`derivative`]: Velocity, acceleration and smoothing methods
//! - [`resample`]: Uniform-grid resampling and decimation
//! - [`transform`]: The named-transform dispatcher
//!
//! ## Channel Widths
//!
//! | Width | Components | Suffixes |
//! |-------|------------|----------|
//! | 2 | one eye | `_x`, `_y` |
//! | 4 | both eyes | `_xl`, `_yl`, `_xr`, `_yr` |
//! | 6 | both eyes plus average | `..., _xa, _ya` |

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
// Allow some patterns common in scientific code
#![allow(clippy::too_many_arguments)]

pub mod derivative;
pub mod experiment;
pub mod frame;
pub mod projection;
pub mod resample;
pub mod savgol;
pub mod schema;
pub mod transform;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::derivative::{SmoothMethod, VelocityMethod};
    pub use crate::experiment::{Experiment, GeometryError, Origin, Screen};
    pub use crate::frame::{FrameError, FrameOptions, GazeFrame, TimeUnit};
    pub use crate::resample::FillNullStrategy;
    pub use crate::savgol::Padding;
    pub use crate::schema::{columns, component_suffixes, CHANNEL_COLUMNS, VALID_WIDTHS};
    pub use crate::transform::{Operation, TransformError, TransformOptions};
}
