//! Wire protocol for the measurement stream.
//!
//! Inbound messages are JSON objects carrying an optional `command` and an
//! optional data-URI `image`. Outbound messages expose only the fields
//! relevant to each branch; `reference_box` is the one field that can be
//! present-but-null, hence the double `Option`.

use serde::{Deserialize, Serialize};

use facerange_core::measure::distance_model::ReferenceBox;
use facerange_core::measure::session::{Command, FrameOutcome};
use facerange_core::measure::MeasureConfig;

#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Routing decision for one inbound message.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// Session command: processed immediately, acknowledged, never gated.
    Command(Command),
    /// Explicit single-shot frame request: processed, never gated.
    Capture(&'a str),
    /// Bare frame: subject to the frame gate.
    Frame(&'a str),
    /// Unknown command, capture without an image, or an empty message.
    Ignored,
}

pub fn classify(msg: &ClientMessage) -> Inbound<'_> {
    match msg.command.as_deref() {
        Some("start_calibration") => Inbound::Command(Command::StartCalibration),
        Some("start_distance") => Inbound::Command(Command::StartDistance),
        Some("stop_all") => Inbound::Command(Command::StopAll),
        Some("capture") => match msg.image.as_deref() {
            Some(image) => Inbound::Capture(image),
            None => Inbound::Ignored,
        },
        Some(_) => Inbound::Ignored,
        None => match msg.image.as_deref() {
            Some(image) => Inbound::Frame(image),
            None => Inbound::Ignored,
        },
    }
}

/// Immediate acknowledgement text for a session command.
pub fn ack_message(command: Command, config: &MeasureConfig) -> String {
    match command {
        Command::StartCalibration => {
            "Please stand at one-arm distance and click Capture".to_string()
        }
        Command::StartDistance => format!(
            "Distance measurement started. Try to fit your face in the red reference box ({}m)",
            format_distance(config.target_distance)
        ),
        Command::StopAll => "Measurement stopped".to_string(),
    }
}

fn format_distance(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct FacePayload {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f64,
    /// -1 signals "unknown" to the client, matching the wire contract.
    pub distance: f64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ReferenceBoxPayload {
    pub width: i32,
    pub height: i32,
}

impl From<ReferenceBox> for ReferenceBoxPayload {
    fn from(rb: ReferenceBox) -> Self {
        Self {
            width: rb.width,
            height: rb.height,
        }
    }
}

/// Outbound message. Every field is optional; each response branch fills in
/// its own subset.
#[derive(Debug, Default, Serialize)]
pub struct ServerMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faces: Option<Vec<FacePayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f64>,
    /// Outer `Option` controls key presence, inner one serializes as null.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_box: Option<Option<ReferenceBoxPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_image: Option<String>,
}

impl ServerMessage {
    pub fn ack(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            error: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn from_outcome(outcome: FrameOutcome) -> Self {
        match outcome {
            FrameOutcome::NoFace {
                reference_box,
                processed_image,
            } => Self {
                success: Some(false),
                message: Some("No face detected".to_string()),
                reference_box: Some(reference_box.map(Into::into)),
                processed_image: Some(processed_image),
                ..Default::default()
            },
            FrameOutcome::LowConfidence => Self {
                success: Some(false),
                message: Some("Face detected but confidence too low".to_string()),
                ..Default::default()
            },
            FrameOutcome::Calibrated {
                focal_length,
                processed_image,
            } => Self {
                success: Some(true),
                message: Some("Calibration complete".to_string()),
                focal_length: Some(focal_length),
                processed_image: Some(processed_image),
                ..Default::default()
            },
            FrameOutcome::Measured {
                face,
                focal_length,
                reference_box,
                processed_image,
            } => Self {
                success: Some(true),
                faces: Some(vec![FacePayload {
                    x: face.detection.x,
                    y: face.detection.y,
                    width: face.detection.width,
                    height: face.detection.height,
                    confidence: round2(face.detection.confidence),
                    distance: face.distance.unwrap_or(-1.0),
                }]),
                focal_length: Some(focal_length),
                reference_box: Some(reference_box.map(Into::into)),
                processed_image: Some(processed_image),
                ..Default::default()
            },
            FrameOutcome::MeasurementOff { processed_image } => Self {
                success: Some(true),
                message: Some("Face detected, but distance mode is off.".to_string()),
                processed_image: Some(processed_image),
                ..Default::default()
            },
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
