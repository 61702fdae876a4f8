pub mod distance_model;
pub mod session;

/// Calibration reference values and the detection acceptance threshold.
///
/// These are configuration, not hardwired physics: the server exposes each
/// one as a CLI flag.
#[derive(Clone, Copy, Debug)]
pub struct MeasureConfig {
    /// Average real-world face width used as the calibration reference, in
    /// meters.
    pub known_face_width: f64,
    /// Arm's-length distance the subject stands at during calibration, in
    /// meters.
    pub known_distance: f64,
    /// Distance the reference box is drawn for, in meters.
    pub target_distance: f64,
    /// Minimum detector confidence for a face to be accepted (inclusive).
    pub min_confidence: f64,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            known_face_width: 0.15,
            known_distance: 0.7,
            target_distance: 4.0,
            min_confidence: 0.4,
        }
    }
}
