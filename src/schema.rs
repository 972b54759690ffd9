//! # Gaze Schema Conventions
//!
//! This module defines the column-name and channel conventions shared by the
//! whole crate.
//!
//! ## Design Rationale
//!
//! A gaze recording is a "wide" table: one row per sample, one column per
//! signal. Multi-component signals (pixel position, dva position, velocity,
//! acceleration) are stored as a single `FixedSizeList` column (a "channel")
//! rather than as loose scalar columns, so that every transformation can
//! operate on all components of one signal at once.
//!
//! ## Channel Widths
//!
//! | Width | Meaning | Component order |
//! |-------|---------|-----------------|
//! | 2 | monocular | x, y |
//! | 4 | binocular | x left, y left, x right, y right |
//! | 6 | binocular + cyclopean | ..., x cyclopean, y cyclopean |
//!
//! Every channel simultaneously present in one table must report the same
//! width. The x component of a pair always maps to the horizontal screen axis
//! and the y component to the vertical axis, which is why per-axis screen
//! geometry is indexed by `component % 2` throughout the crate.

use arrow::datatypes::DataType;

/// Column names as constants for type safety
pub mod columns {
    /// Timestamp column, always in milliseconds.
    pub const TIME: &str = "time";
    /// Pixel screen coordinates channel.
    pub const PIXEL: &str = "pixel";
    /// Position channel in degrees of visual angle.
    pub const POSITION: &str = "position";
    /// Velocity channel in dva/s.
    pub const VELOCITY: &str = "velocity";
    /// Acceleration channel in dva/s^2.
    pub const ACCELERATION: &str = "acceleration";
    /// Per-sample eye-to-screen distance in millimeters.
    pub const DISTANCE: &str = "distance";
}

/// Channel column names considered when inferring the component count.
pub const CHANNEL_COLUMNS: [&str; 4] = [
    columns::PIXEL,
    columns::POSITION,
    columns::VELOCITY,
    columns::ACCELERATION,
];

/// Channel widths supported by the data model.
pub const VALID_WIDTHS: [usize; 3] = [2, 4, 6];

/// Returns true if `width` is a supported channel width.
pub fn is_valid_width(width: usize) -> bool {
    VALID_WIDTHS.contains(&width)
}

/// Canonical component suffixes for a channel of the given width.
///
/// These are the suffixes used when unnesting a channel back into scalar
/// columns, e.g. `position` with width 4 becomes `position_xl`, `position_yl`,
/// `position_xr`, `position_yr`.
pub fn component_suffixes(width: usize) -> Option<&'static [&'static str]> {
    match width {
        2 => Some(&["_x", "_y"]),
        4 => Some(&["_xl", "_yl", "_xr", "_yr"]),
        6 => Some(&["_xl", "_yl", "_xr", "_yr", "_xa", "_ya"]),
        _ => None,
    }
}

/// Returns the channel width of a data type, if it is a channel type.
pub fn channel_width(data_type: &DataType) -> Option<usize> {
    match data_type {
        DataType::FixedSizeList(_, width) => Some(*width as usize),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::Field;
    use std::sync::Arc;

    #[test]
    fn test_valid_widths() {
        assert!(is_valid_width(2));
        assert!(is_valid_width(4));
        assert!(is_valid_width(6));
        assert!(!is_valid_width(0));
        assert!(!is_valid_width(3));
        assert!(!is_valid_width(8));
    }

    #[test]
    fn test_component_suffixes() {
        assert_eq!(component_suffixes(2), Some(["_x", "_y"].as_slice()));
        assert_eq!(component_suffixes(6).unwrap().len(), 6);
        assert_eq!(component_suffixes(3), None);
    }

    #[test]
    fn test_channel_width() {
        let channel = DataType::FixedSizeList(
            Arc::new(Field::new("item", DataType::Float64, true)),
            4,
        );
        assert_eq!(channel_width(&channel), Some(4));
        assert_eq!(channel_width(&DataType::Float64), None);
    }
}
