//! Per-connection measurement state machine.
//!
//! One `Session` exists per client connection and is owned exclusively by
//! its connection handler, so the state here is free of races by
//! construction. Calibration is a one-shot transition: computing a focal
//! length drops the session back into the neutral `Calibrated` state until
//! distance mode is explicitly requested.

use crate::annotate::frame_annotator::FrameAnnotator;
use crate::codec::scale::downscale_to_width;
use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::FaceDetector;
use crate::measure::distance_model::{self, ReferenceBox};
use crate::measure::MeasureConfig;
use crate::shared::constants::{ANNOTATED_JPEG_QUALITY, FALLBACK_JPEG_QUALITY, MAX_PROCESS_WIDTH};
use crate::shared::frame::Frame;

/// Session mode. `Calibrating` and `Measuring` are mutually exclusive;
/// `Calibrated` is the neutral steady state after a successful calibration
/// (focal length known, distance reporting off).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Calibrating,
    Calibrated,
    Measuring,
}

/// Client commands. Idempotent; the last command wins. Commands never carry
/// an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    StartCalibration,
    StartDistance,
    StopAll,
}

/// The measured face of a frame: the largest accepted detection plus its
/// estimated distance. `distance` is `None` when the box width is
/// degenerate and no estimate exists.
#[derive(Clone, Debug)]
pub struct MeasuredFace {
    pub detection: Detection,
    pub distance: Option<f64>,
}

/// Structured result of processing one frame.
#[derive(Clone, Debug)]
pub enum FrameOutcome {
    /// The detector found nothing. Still carries an annotated frame (at
    /// reduced quality) and, while measuring, the current reference box.
    NoFace {
        reference_box: Option<ReferenceBox>,
        processed_image: String,
    },
    /// The best face fell below the acceptance threshold. Message-only.
    LowConfidence,
    /// Calibration succeeded; the session has left `Calibrating`.
    Calibrated {
        focal_length: f64,
        processed_image: String,
    },
    /// Distance measured for the selected face.
    Measured {
        face: MeasuredFace,
        focal_length: f64,
        reference_box: Option<ReferenceBox>,
        processed_image: String,
    },
    /// A face was accepted but neither calibration nor measurement is
    /// active.
    MeasurementOff { processed_image: String },
}

pub struct Session {
    mode: Mode,
    focal_length: Option<f64>,
    config: MeasureConfig,
    annotator: FrameAnnotator,
}

impl Session {
    pub fn new(config: MeasureConfig) -> Self {
        Self {
            mode: Mode::Idle,
            focal_length: None,
            config,
            annotator: FrameAnnotator::new(config),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn focal_length(&self) -> Option<f64> {
        self.focal_length
    }

    pub fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartCalibration => {
                self.mode = Mode::Calibrating;
                // A stale focal length must not produce distance readings
                // mid-recalibration
                self.focal_length = None;
            }
            Command::StartDistance => {
                self.mode = Mode::Measuring;
            }
            Command::StopAll => {
                self.mode = if self.focal_length.is_some() {
                    Mode::Calibrated
                } else {
                    Mode::Idle
                };
            }
        }
    }

    /// Run one frame through the pipeline: downscale, detect, select,
    /// calibrate or measure, annotate.
    ///
    /// Errors are contained to this frame by the caller; the session itself
    /// stays valid.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        detector: &mut dyn FaceDetector,
    ) -> Result<FrameOutcome, Box<dyn std::error::Error>> {
        let frame = downscale_to_width(frame, MAX_PROCESS_WIDTH)?;
        let detections = detector.detect(&frame)?;

        let measuring = self.mode == Mode::Measuring;

        let Some(best) = Detection::largest(&detections).cloned() else {
            let reference_box = if measuring {
                distance_model::reference_box(self.focal_length, &self.config)
            } else {
                None
            };
            let processed_image = self.annotator.annotate(
                &frame,
                &[],
                self.focal_length,
                measuring,
                FALLBACK_JPEG_QUALITY,
            )?;
            return Ok(FrameOutcome::NoFace {
                reference_box,
                processed_image,
            });
        };

        // Threshold is inclusive: exactly min_confidence is accepted
        if best.confidence < self.config.min_confidence {
            return Ok(FrameOutcome::LowConfidence);
        }

        let processed_image = self.annotator.annotate(
            &frame,
            &detections,
            self.focal_length,
            measuring,
            ANNOTATED_JPEG_QUALITY,
        )?;

        match (self.mode, self.focal_length) {
            (Mode::Calibrating, _) => {
                let focal = distance_model::calibrate(
                    best.width as f64,
                    self.config.known_distance,
                    self.config.known_face_width,
                )?;
                self.focal_length = Some(focal);
                self.mode = Mode::Calibrated;
                log::info!("focal length calibrated: {focal}");
                Ok(FrameOutcome::Calibrated {
                    focal_length: focal,
                    processed_image,
                })
            }
            (Mode::Measuring, Some(focal)) => {
                let distance = distance_model::estimate_distance(
                    best.width as f64,
                    Some(focal),
                    self.config.known_face_width,
                );
                Ok(FrameOutcome::Measured {
                    face: MeasuredFace {
                        detection: best,
                        distance,
                    },
                    focal_length: focal,
                    reference_box: distance_model::reference_box(Some(focal), &self.config),
                    processed_image,
                })
            }
            _ => Ok(FrameOutcome::MeasurementOff { processed_image }),
        }
    }
}
