//! # Experiment Geometry
//!
//! Screen and recording properties of an eye-tracking experiment.
//!
//! The [`Experiment`] record supplies the context that coordinate
//! transformations cannot derive from the sample table itself: screen
//! resolution and physical size, the constant eye-to-screen distance (when no
//! per-sample distance column exists), the location of the pixel origin and
//! the nominal sampling rate.
//!
//! The record serializes to JSON so that callers can carry it alongside
//! exported sample tables.

use serde::{Deserialize, Serialize};

/// Errors raised when validating experiment geometry.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    /// A geometry parameter that must be strictly positive was not.
    #[error("'{parameter}' must be greater than zero, but is {value}")]
    NonPositive {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// An unknown pixel origin string was supplied.
    #[error("value '{value}' for argument 'origin' is invalid. Valid values are: ['center', 'upper left']")]
    InvalidOrigin {
        /// The rejected origin string.
        value: String,
    },

    /// The retired 'lower left' origin was supplied.
    ///
    /// Earlier recordings labelled the pixel origin 'lower left' while the
    /// offset actually applied was the upper-left one. The value is rejected
    /// outright instead of being reinterpreted, so that affected metadata is
    /// corrected at the source.
    #[error(
        "origin 'lower left' is no longer supported; recordings that used it were \
         actually anchored at the upper left corner. Use origin 'upper left' instead"
    )]
    LowerLeftOrigin,

    /// JSON (de)serialization of the experiment record failed.
    #[error("experiment serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Location of the pixel coordinate origin on the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Origin at the screen center; coordinates are already centered.
    #[serde(rename = "center")]
    Center,
    /// Origin at the upper left corner; the first pixel has coordinate 0.
    #[serde(rename = "upper left")]
    UpperLeft,
}

impl Origin {
    /// Parses an origin from its string form.
    ///
    /// `"lower left"` is rejected with a dedicated error rather than falling
    /// through to the generic invalid-value error, see
    /// [`GeometryError::LowerLeftOrigin`].
    pub fn parse(value: &str) -> Result<Self, GeometryError> {
        match value {
            "center" => Ok(Self::Center),
            "upper left" => Ok(Self::UpperLeft),
            "lower left" => Err(GeometryError::LowerLeftOrigin),
            other => Err(GeometryError::InvalidOrigin {
                value: other.to_string(),
            }),
        }
    }

    /// Per-axis offset that recenters pixel coordinates about this origin.
    ///
    /// Centered coordinates have `(0, 0)` at the screen center. With an
    /// upper-left origin the offset is `(resolution - 1) / 2` per axis, since
    /// pixel indices run from `0` to `resolution - 1`.
    pub fn pixel_offset(self, resolution: (f64, f64)) -> (f64, f64) {
        match self {
            Self::Center => (0.0, 0.0),
            Self::UpperLeft => ((resolution.0 - 1.0) / 2.0, (resolution.1 - 1.0) / 2.0),
        }
    }

    /// The canonical string form of this origin.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::UpperLeft => "upper left",
        }
    }
}

impl std::str::FromStr for Origin {
    type Err = GeometryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical and pixel geometry of the presentation screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    /// Screen width in pixels.
    pub width_px: u32,
    /// Screen height in pixels.
    pub height_px: u32,
    /// Screen width in centimeters.
    pub width_cm: f64,
    /// Screen height in centimeters.
    pub height_cm: f64,
    /// Constant eye-to-screen distance in centimeters.
    ///
    /// `None` means the distance varies per sample and must be supplied as a
    /// `distance` column (in millimeters) in the sample table.
    pub distance_cm: Option<f64>,
    /// Location of the pixel origin.
    pub origin: Origin,
}

impl Screen {
    /// Creates a screen definition, validating that all extents are positive.
    pub fn new(
        width_px: u32,
        height_px: u32,
        width_cm: f64,
        height_cm: f64,
        distance_cm: Option<f64>,
        origin: Origin,
    ) -> Result<Self, GeometryError> {
        check_positive("screen_width_px", width_px as f64)?;
        check_positive("screen_height_px", height_px as f64)?;
        check_positive("screen_width_cm", width_cm)?;
        check_positive("screen_height_cm", height_cm)?;
        if let Some(distance) = distance_cm {
            check_positive("distance_cm", distance)?;
        }

        Ok(Self {
            width_px,
            height_px,
            width_cm,
            height_cm,
            distance_cm,
            origin,
        })
    }

    /// Screen resolution as a `(width, height)` tuple in pixels.
    pub fn resolution(&self) -> (f64, f64) {
        (self.width_px as f64, self.height_px as f64)
    }

    /// Physical screen size as a `(width, height)` tuple in centimeters.
    pub fn size_cm(&self) -> (f64, f64) {
        (self.width_cm, self.height_cm)
    }
}

/// Experiment definition: screen geometry plus recording properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// The presentation screen.
    pub screen: Screen,
    /// Nominal sampling rate of the eye tracker in Hz.
    ///
    /// Required for velocity and acceleration computation when no explicit
    /// rate is passed, and for synthesizing a time column.
    pub sampling_rate: Option<f64>,
}

impl Experiment {
    /// Creates an experiment definition, validating the sampling rate.
    pub fn new(screen: Screen, sampling_rate: Option<f64>) -> Result<Self, GeometryError> {
        if let Some(rate) = sampling_rate {
            check_positive("sampling_rate", rate)?;
        }
        Ok(Self {
            screen,
            sampling_rate,
        })
    }

    /// Serializes the experiment record to a JSON string.
    pub fn to_json(&self) -> Result<String, GeometryError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserializes an experiment record from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, GeometryError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn check_positive(parameter: &'static str, value: f64) -> Result<(), GeometryError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(GeometryError::NonPositive { parameter, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_screen() -> Screen {
        Screen::new(1280, 1024, 38.0, 30.2, Some(68.0), Origin::UpperLeft).unwrap()
    }

    #[test]
    fn test_origin_parse() {
        assert_eq!(Origin::parse("center").unwrap(), Origin::Center);
        assert_eq!(Origin::parse("upper left").unwrap(), Origin::UpperLeft);
        assert!(matches!(
            Origin::parse("top"),
            Err(GeometryError::InvalidOrigin { .. })
        ));
    }

    #[test]
    fn test_lower_left_origin_rejected() {
        let err = Origin::parse("lower left").unwrap_err();
        assert!(matches!(err, GeometryError::LowerLeftOrigin));
        assert!(err.to_string().contains("upper left"));
    }

    #[test]
    fn test_pixel_offset() {
        assert_eq!(Origin::Center.pixel_offset((100.0, 100.0)), (0.0, 0.0));
        assert_eq!(
            Origin::UpperLeft.pixel_offset((100.0, 200.0)),
            (49.5, 99.5)
        );
    }

    #[test]
    fn test_screen_validation() {
        assert!(Screen::new(0, 1024, 38.0, 30.2, None, Origin::Center).is_err());
        assert!(Screen::new(1280, 1024, -1.0, 30.2, None, Origin::Center).is_err());
        assert!(Screen::new(1280, 1024, 38.0, 30.2, Some(0.0), Origin::Center).is_err());
        assert!(Screen::new(1280, 1024, 38.0, 30.2, None, Origin::Center).is_ok());
    }

    #[test]
    fn test_experiment_validation() {
        assert!(Experiment::new(test_screen(), Some(-100.0)).is_err());
        let experiment = Experiment::new(test_screen(), Some(1000.0)).unwrap();
        assert_eq!(experiment.sampling_rate, Some(1000.0));
    }

    #[test]
    fn test_json_round_trip() {
        let experiment = Experiment::new(test_screen(), Some(500.0)).unwrap();
        let json = experiment.to_json().unwrap();
        assert!(json.contains("upper left"));
        let restored = Experiment::from_json(&json).unwrap();
        assert_eq!(restored, experiment);
    }
}
