//! Property-based tests for the projection and differentiation math.

use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use proptest::prelude::*;

use gazekit::frame::channel_components;
use gazekit::prelude::*;

fn pixel_frame(x: f64, y: f64, origin: Origin) -> GazeFrame {
    let screen = Screen::new(1920, 1080, 52.0, 30.0, Some(68.0), origin).unwrap();
    let experiment = Experiment::new(screen, Some(1000.0)).unwrap();
    let schema = Arc::new(Schema::new(vec![
        Field::new("time", DataType::Int64, false),
        Field::new("x", DataType::Float64, true),
        Field::new("y", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![0])),
            Arc::new(Float64Array::from(vec![x])),
            Arc::new(Float64Array::from(vec![y])),
        ],
    )
    .unwrap();
    GazeFrame::new(
        &batch,
        Some(experiment),
        FrameOptions {
            pixel_columns: Some(vec!["x".to_string(), "y".to_string()]),
            ..FrameOptions::default()
        },
    )
    .unwrap()
}

fn component(frame: &GazeFrame, column: &str, index: usize) -> f64 {
    channel_components(frame.column(column).unwrap(), column).unwrap()[index][0].unwrap()
}

proptest! {
    /// deg2pix inverts pix2deg for any on-screen pixel and either origin.
    #[test]
    fn prop_projection_round_trip(
        x in 0.0f64..1919.0,
        y in 0.0f64..1079.0,
        upper_left in any::<bool>(),
    ) {
        let origin = if upper_left { Origin::UpperLeft } else { Origin::Center };
        let mut frame = pixel_frame(x, y, origin);
        frame.pix2deg().unwrap();
        frame.transform(
            Operation::Deg2Pix,
            &TransformOptions {
                output_column: Some("pixel_restored".to_string()),
                ..TransformOptions::default()
            },
        )
        .unwrap();

        let restored_x = component(&frame, "pixel_restored", 0);
        let restored_y = component(&frame, "pixel_restored", 1);
        prop_assert!((restored_x - x).abs() < 1e-6);
        prop_assert!((restored_y - y).abs() < 1e-6);
    }

    /// The preceding difference of a linear position series is its slope
    /// scaled by the sampling rate, on every non-boundary row.
    #[test]
    fn prop_preceding_velocity_of_linear_series(
        slope in -10.0f64..10.0,
        intercept in -100.0f64..100.0,
        n in 3usize..40,
    ) {
        let schema = Arc::new(Schema::new(vec![
            Field::new("time", DataType::Int64, false),
            Field::new("px", DataType::Float64, true),
            Field::new("py", DataType::Float64, true),
        ]));
        let series: Vec<f64> = (0..n).map(|i| intercept + slope * i as f64).collect();
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from_iter_values(0..n as i64)),
                Arc::new(Float64Array::from(series)),
                Arc::new(Float64Array::from(vec![0.0; n])),
            ],
        )
        .unwrap();
        let mut frame = GazeFrame::new(
            &batch,
            None,
            FrameOptions {
                position_columns: Some(vec!["px".to_string(), "py".to_string()]),
                ..FrameOptions::default()
            },
        )
        .unwrap();

        frame.transform(
            Operation::Pos2Vel,
            &TransformOptions {
                method: Some("preceding".to_string()),
                sampling_rate: Some(500.0),
                ..TransformOptions::default()
            },
        )
        .unwrap();

        let velocity = channel_components(frame.column("velocity").unwrap(), "velocity")
            .unwrap()[0]
            .clone();
        prop_assert!(velocity[0].is_none());
        for value in velocity.iter().skip(1) {
            let expected = slope * 500.0;
            prop_assert!((value.unwrap() - expected).abs() < 1e-6 * (1.0 + expected.abs()));
        }
    }
}
