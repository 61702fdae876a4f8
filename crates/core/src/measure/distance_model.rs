//! Pinhole-camera distance model.
//!
//! A single scalar focal length relates the observed pixel width of a face
//! to its known physical width and distance: `width ∝ focal / distance`.
//! Calibration solves for the focal length once; every later measurement
//! inverts the same proportionality.

use thiserror::Error;

use crate::measure::MeasureConfig;

/// Height/width ratio of the drawn reference box.
pub const REFERENCE_BOX_ASPECT: f64 = 1.5;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("observed face width must be positive, got {0}")]
    NonPositiveWidth(f64),
}

/// Expected bounding box of a face standing at the configured target
/// distance. Derived and ephemeral; only meaningful while a focal length is
/// set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceBox {
    pub width: i32,
    pub height: i32,
}

/// Solve for the focal length from one observed face width at a known
/// distance: `focal = observed_width × known_distance / known_face_width`.
pub fn calibrate(
    observed_width: f64,
    known_distance: f64,
    known_face_width: f64,
) -> Result<f64, CalibrationError> {
    if observed_width <= 0.0 {
        return Err(CalibrationError::NonPositiveWidth(observed_width));
    }
    Ok(observed_width * known_distance / known_face_width)
}

/// Distance to a face of the given observed pixel width, rounded to two
/// decimal places. `None` when the focal length is unset or the width is
/// degenerate; the caller must treat that as "unknown", never as zero.
pub fn estimate_distance(
    observed_width: f64,
    focal_length: Option<f64>,
    known_face_width: f64,
) -> Option<f64> {
    let focal = focal_length?;
    if observed_width <= 0.0 {
        return None;
    }
    Some(round2(known_face_width * focal / observed_width))
}

/// Inverse relation: the pixel width a face would have at `distance`.
/// Returns 0 when the focal length is unset.
pub fn expected_width_at_distance(
    distance: f64,
    focal_length: Option<f64>,
    known_face_width: f64,
) -> i32 {
    match focal_length {
        Some(focal) => (known_face_width * focal / distance) as i32,
        None => 0,
    }
}

/// The reference box for the configured target distance, or `None` when no
/// usable focal length is set.
pub fn reference_box(focal_length: Option<f64>, config: &MeasureConfig) -> Option<ReferenceBox> {
    let width = expected_width_at_distance(config.target_distance, focal_length, config.known_face_width);
    if width <= 0 {
        return None;
    }
    Some(ReferenceBox {
        width,
        height: (width as f64 * REFERENCE_BOX_ASPECT) as i32,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_calibrate_reference_scenario() {
        // 200 px at the 0.7 m arm's-length distance
        let focal = calibrate(200.0, 0.7, 0.15).unwrap();
        assert_relative_eq!(focal, 933.3333333333334, max_relative = 1e-9);
    }

    #[test]
    fn test_estimate_after_reference_calibration() {
        let focal = calibrate(200.0, 0.7, 0.15).unwrap();
        let distance = estimate_distance(50.0, Some(focal), 0.15).unwrap();
        assert_relative_eq!(distance, 2.8);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-5.0)]
    fn test_calibrate_rejects_non_positive_width(#[case] width: f64) {
        assert!(calibrate(width, 0.7, 0.15).is_err());
    }

    #[rstest]
    #[case(200.0, 0.7, 0.15)]
    #[case(80.0, 1.0, 0.16)]
    #[case(333.0, 0.5, 0.14)]
    fn test_round_trip_law(
        #[case] observed_width: f64,
        #[case] known_distance: f64,
        #[case] known_face_width: f64,
    ) {
        // Estimating at the same observed width must give back the
        // calibration distance, within the 2-decimal rounding
        let focal = calibrate(observed_width, known_distance, known_face_width).unwrap();
        let distance = estimate_distance(observed_width, Some(focal), known_face_width).unwrap();
        assert_relative_eq!(distance, known_distance, epsilon = 0.005);
    }

    #[test]
    fn test_estimate_without_focal_is_unknown() {
        assert!(estimate_distance(100.0, None, 0.15).is_none());
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    fn test_estimate_degenerate_width_is_unknown(#[case] width: f64) {
        assert!(estimate_distance(width, Some(900.0), 0.15).is_none());
    }

    #[test]
    fn test_estimate_rounds_to_two_decimals() {
        // 0.15 * 1000 / 70 = 2.142857...
        let distance = estimate_distance(70.0, Some(1000.0), 0.15).unwrap();
        assert_relative_eq!(distance, 2.14);
    }

    #[test]
    fn test_expected_width_without_focal_is_zero() {
        assert_eq!(expected_width_at_distance(4.0, None, 0.15), 0);
    }

    #[test]
    fn test_expected_width_truncates() {
        // 0.15 * 933.33... / 4.0 = 35.0
        let focal = calibrate(200.0, 0.7, 0.15).unwrap();
        assert_eq!(expected_width_at_distance(4.0, Some(focal), 0.15), 35);
    }

    #[rstest]
    #[case(2.0)]
    #[case(4.0)]
    #[case(7.5)]
    fn test_expected_width_inverts_distance_estimate(#[case] target: f64) {
        // Feeding the expected width back into distance estimation must
        // reproduce the target distance within integer-rounding error
        let focal = calibrate(250.0, 0.7, 0.15).unwrap();
        let width = expected_width_at_distance(target, Some(focal), 0.15);
        assert!(width > 0);
        let distance = estimate_distance(width as f64, Some(focal), 0.15).unwrap();
        let tolerance = target / width as f64; // one pixel of rounding
        assert!(
            (distance - target).abs() <= tolerance + 0.005,
            "distance {distance} too far from target {target}"
        );
    }

    #[test]
    fn test_reference_box_aspect() {
        let focal = calibrate(200.0, 0.7, 0.15).unwrap();
        let config = MeasureConfig::default();
        let rb = reference_box(Some(focal), &config).unwrap();
        assert_eq!(rb.width, 35);
        assert_eq!(rb.height, 52); // floor(35 * 1.5)
    }

    #[test]
    fn test_reference_box_none_without_focal() {
        assert!(reference_box(None, &MeasureConfig::default()).is_none());
    }
}
